//! In-memory register map standing in for a device.
//!
//! `SimTransport` serves reads and writes from a window of holding registers
//! starting at `base_addr`. Requests outside the window fail with `Range`.
//! It can also answer raw RTU request frames, which lets the RTU client be
//! exercised end to end through a [`MockSerialPort`](super::MockSerialPort).

use std::time::Duration;

use async_trait::async_trait;

use crate::constants::{
    MODBUS_EXCEPTION_FLAG, MODBUS_FC_READ_HOLDING, MODBUS_FC_WRITE_MULTIPLE,
};
use crate::error::SunSpecError;
use crate::transport::crc::{append_crc, verify_crc};
use crate::transport::RegisterTransport;

/// Modbus exception code for an illegal data address.
const EXCEPTION_ILLEGAL_ADDRESS: u8 = 0x02;
/// Modbus exception code for an illegal function.
const EXCEPTION_ILLEGAL_FUNCTION: u8 = 0x01;

/// One request served by the simulator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimRequest {
    Read { addr: u16, count: u16 },
    Write { addr: u16, count: u16 },
}

#[derive(Debug, Clone)]
pub struct SimTransport {
    base_addr: u16,
    registers: Vec<u16>,
    slave_id: u8,
    journal: Vec<SimRequest>,
}

impl SimTransport {
    /// A zeroed window of `len` registers at `base_addr`.
    pub fn new(base_addr: u16, len: usize) -> Self {
        SimTransport {
            base_addr,
            registers: vec![0; len],
            slave_id: 1,
            journal: Vec::new(),
        }
    }

    /// A window holding `registers` at `base_addr`.
    pub fn with_registers(base_addr: u16, registers: Vec<u16>) -> Self {
        SimTransport {
            base_addr,
            registers,
            slave_id: 1,
            journal: Vec::new(),
        }
    }

    pub fn with_slave_id(mut self, slave_id: u8) -> Self {
        self.slave_id = slave_id;
        self
    }

    pub fn base_addr(&self) -> u16 {
        self.base_addr
    }

    pub fn registers(&self) -> &[u16] {
        &self.registers
    }

    /// Register at absolute address `addr`, if inside the window.
    pub fn register(&self, addr: u16) -> Option<u16> {
        let i = usize::from(addr.checked_sub(self.base_addr)?);
        self.registers.get(i).copied()
    }

    /// Requests served so far, oldest first.
    pub fn journal(&self) -> &[SimRequest] {
        &self.journal
    }

    pub fn clear_journal(&mut self) {
        self.journal.clear();
    }

    fn window(&self, addr: u16, count: usize) -> Result<std::ops::Range<usize>, SunSpecError> {
        let start = usize::from(addr.checked_sub(self.base_addr).ok_or(SunSpecError::Range)?);
        let end = start + count;
        if end > self.registers.len() {
            return Err(SunSpecError::Range);
        }
        Ok(start..end)
    }

    /// Copy `count` registers at `addr` out in network byte order.
    pub fn read(&mut self, addr: u16, count: u16) -> Result<Vec<u8>, SunSpecError> {
        let range = self.window(addr, usize::from(count))?;
        self.journal.push(SimRequest::Read { addr, count });
        Ok(self.registers[range]
            .iter()
            .flat_map(|r| r.to_be_bytes())
            .collect())
    }

    /// Store big-endian register bytes at `addr`.
    pub fn write(&mut self, addr: u16, data: &[u8]) -> Result<(), SunSpecError> {
        if data.len() % 2 != 0 {
            return Err(SunSpecError::Range);
        }
        let range = self.window(addr, data.len() / 2)?;
        self.journal.push(SimRequest::Write {
            addr,
            count: (data.len() / 2) as u16,
        });
        for (slot, pair) in self.registers[range].iter_mut().zip(data.chunks_exact(2)) {
            *slot = u16::from_be_bytes([pair[0], pair[1]]);
        }
        Ok(())
    }

    /// Answer a raw RTU request frame. Frames with a bad CRC or for another
    /// slave get no reply, as on a real bus.
    pub fn rtu_reply(&mut self, request: &[u8]) -> Option<Vec<u8>> {
        if request.len() < 8 || verify_crc(request).is_err() || request[0] != self.slave_id {
            return None;
        }
        let fc = request[1];
        let addr = u16::from_be_bytes([request[2], request[3]]);
        let count = u16::from_be_bytes([request[4], request[5]]);

        let mut reply = vec![self.slave_id];
        match fc {
            MODBUS_FC_READ_HOLDING => match self.read(addr, count) {
                Ok(data) if data.len() <= usize::from(u8::MAX) => {
                    reply.push(fc);
                    reply.push(data.len() as u8);
                    reply.extend_from_slice(&data);
                }
                _ => reply.extend([fc | MODBUS_EXCEPTION_FLAG, EXCEPTION_ILLEGAL_ADDRESS]),
            },
            MODBUS_FC_WRITE_MULTIPLE => {
                let nbytes = usize::from(*request.get(6)?);
                let data = request.get(7..7 + nbytes)?;
                match self.write(addr, data) {
                    Ok(()) => {
                        reply.push(fc);
                        reply.extend_from_slice(&addr.to_be_bytes());
                        reply.extend_from_slice(&count.to_be_bytes());
                    }
                    Err(_) => reply.extend([fc | MODBUS_EXCEPTION_FLAG, EXCEPTION_ILLEGAL_ADDRESS]),
                }
            }
            _ => reply.extend([fc | MODBUS_EXCEPTION_FLAG, EXCEPTION_ILLEGAL_FUNCTION]),
        }
        append_crc(&mut reply);
        Some(reply)
    }
}

#[async_trait]
impl RegisterTransport for SimTransport {
    async fn read_registers(
        &mut self,
        addr: u16,
        count: u16,
        _timeout: Option<Duration>,
    ) -> Result<Vec<u8>, SunSpecError> {
        self.read(addr, count)
    }

    async fn write_registers(
        &mut self,
        addr: u16,
        data: &[u8],
        _timeout: Option<Duration>,
    ) -> Result<(), SunSpecError> {
        self.write(addr, data)
    }
}
