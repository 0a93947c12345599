//! # Modbus RTU Client
//!
//! Holding-register read (function 3) and write-multiple (function 16) over
//! any [`ByteStream`]. Requests are packed with `bytes`, responses are parsed
//! with `nom` once a complete frame has been collected.
//!
//! ## Frame Layout
//!
//! ```text
//! request  : slave | fc | addr(BE) | count(BE) [| nbytes | data] | crc(LE)
//! read     : slave | 0x03 | nbytes | data | crc
//! write    : slave | 0x10 | addr | count | crc
//! exception: slave | fc|0x80 | code | crc
//! ```
//!
//! Validation runs CRC first, then the exception flag, then the echoed
//! slave id and function code, then the payload length or write echo.
//! Nothing is retried.

use std::time::Duration;

use async_trait::async_trait;
use bytes::{BufMut, BytesMut};
use log::{debug, warn};
use nom::multi::length_data;
use nom::number::complete::{be_u16, be_u8};
use nom::sequence::tuple;
use nom::IResult;
use tokio::time::Instant;

use crate::constants::{
    MODBUS_EXCEPTION_FLAG, MODBUS_FC_READ_HOLDING, MODBUS_FC_WRITE_MULTIPLE, MODBUS_MAX_REGISTERS,
    MODBUS_RTU_CRC_LEN, MODBUS_RTU_HEADER_LEN, MODBUS_RTU_WRITE_RESPONSE_LEN,
};
use crate::error::SunSpecError;
use crate::transport::crc::{append_crc, verify_crc};
use crate::transport::serial::{RtuConfig, SerialLink};
use crate::transport::{effective_timeout, ByteStream, RegisterTransport};
use crate::util::logging::log_frame_hex;

/// Register transport speaking Modbus RTU to one slave.
pub struct RtuTransport<S: ByteStream> {
    stream: S,
    slave_id: u8,
}

impl RtuTransport<SerialLink> {
    /// Open a serial port with `config` and connect to it.
    pub async fn open(port: &str, config: RtuConfig) -> Result<Self, SunSpecError> {
        let slave_id = config.slave_id;
        let timeout = config.timeout();
        let mut transport = RtuTransport::new(SerialLink::new(port, config), slave_id);
        transport.connect(timeout).await?;
        Ok(transport)
    }
}

impl<S: ByteStream> RtuTransport<S> {
    pub fn new(stream: S, slave_id: u8) -> Self {
        RtuTransport { stream, slave_id }
    }

    pub fn slave_id(&self) -> u8 {
        self.slave_id
    }

    pub fn stream(&self) -> &S {
        &self.stream
    }

    pub fn stream_mut(&mut self) -> &mut S {
        &mut self.stream
    }

    pub fn into_inner(self) -> S {
        self.stream
    }

    pub async fn connect(&mut self, timeout: Duration) -> Result<(), SunSpecError> {
        self.stream.connect(timeout).await
    }

    pub async fn disconnect(&mut self) -> Result<(), SunSpecError> {
        self.stream.disconnect().await
    }

    /// Read up to 125 registers in one transaction.
    async fn read_chunk(
        &mut self,
        addr: u16,
        count: u16,
        timeout: Duration,
    ) -> Result<Vec<u8>, SunSpecError> {
        let request = build_read_request(self.slave_id, addr, count);
        let frame = self.transact(&request, timeout).await?;
        let body = self.check_response(&frame, MODBUS_FC_READ_HOLDING)?;

        let (_, (_, _, payload)) = parse_read_response(body)
            .map_err(|_| SunSpecError::ModbusResponseMismatch)?;
        if payload.len() != usize::from(count) * 2 {
            return Err(SunSpecError::ModbusResponseMismatch);
        }
        Ok(payload.to_vec())
    }

    /// Send `request` and collect one complete response frame.
    async fn transact(&mut self, request: &[u8], timeout: Duration) -> Result<Vec<u8>, SunSpecError> {
        let deadline = Instant::now() + timeout;

        // Stale bytes from an earlier timed-out exchange would corrupt framing.
        self.stream.flush(true, true).await.map_err(|e| {
            warn!("Failed to flush transport: {e}");
            SunSpecError::Busy
        })?;

        log_frame_hex("RTU TX", request);
        self.stream.write(request, timeout).await?;

        let mut frame = vec![0u8; MODBUS_RTU_HEADER_LEN];
        self.fill(&mut frame, deadline).await?;

        let fc = frame[1];
        let total = if fc & MODBUS_EXCEPTION_FLAG != 0 {
            MODBUS_RTU_HEADER_LEN + MODBUS_RTU_CRC_LEN
        } else if fc == MODBUS_FC_READ_HOLDING {
            MODBUS_RTU_HEADER_LEN + usize::from(frame[2]) + MODBUS_RTU_CRC_LEN
        } else if fc == MODBUS_FC_WRITE_MULTIPLE {
            MODBUS_RTU_WRITE_RESPONSE_LEN
        } else {
            debug!("Unexpected function code 0x{fc:02X} in response");
            return Err(SunSpecError::ModbusResponseMismatch);
        };

        frame.resize(total, 0);
        self.fill(&mut frame[MODBUS_RTU_HEADER_LEN..], deadline).await?;
        log_frame_hex("RTU RX", &frame);
        Ok(frame)
    }

    async fn fill(&mut self, buf: &mut [u8], deadline: Instant) -> Result<(), SunSpecError> {
        let mut filled = 0;
        while filled < buf.len() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(SunSpecError::Timeout);
            }
            let n = self.stream.read(&mut buf[filled..], remaining).await?;
            if n == 0 {
                return Err(SunSpecError::Timeout);
            }
            filled += n;
        }
        Ok(())
    }

    /// Validate a complete frame and return it without its CRC.
    fn check_response<'a>(&self, frame: &'a [u8], fc: u8) -> Result<&'a [u8], SunSpecError> {
        verify_crc(frame)?;
        let body = &frame[..frame.len() - MODBUS_RTU_CRC_LEN];

        if body[1] & MODBUS_EXCEPTION_FLAG != 0 {
            let (_, (_, _, code)) =
                parse_exception(body).map_err(|_| SunSpecError::ModbusResponseMismatch)?;
            return Err(SunSpecError::ModbusException(code));
        }
        if body[0] != self.slave_id || body[1] != fc {
            return Err(SunSpecError::ModbusResponseMismatch);
        }
        Ok(body)
    }
}

#[async_trait]
impl<S: ByteStream> RegisterTransport for RtuTransport<S> {
    async fn read_registers(
        &mut self,
        addr: u16,
        count: u16,
        timeout: Option<Duration>,
    ) -> Result<Vec<u8>, SunSpecError> {
        if count == 0 || u32::from(addr) + u32::from(count) > u32::from(u16::MAX) + 1 {
            return Err(SunSpecError::Range);
        }
        let timeout = effective_timeout(timeout);

        let mut out = Vec::new();
        out.try_reserve_exact(usize::from(count) * 2)
            .map_err(|_| SunSpecError::AllocationFailure)?;

        let mut offset = 0u16;
        while offset < count {
            let chunk = (count - offset).min(MODBUS_MAX_REGISTERS);
            let data = self.read_chunk(addr + offset, chunk, timeout).await?;
            out.extend_from_slice(&data);
            offset += chunk;
        }
        Ok(out)
    }

    async fn write_registers(
        &mut self,
        addr: u16,
        data: &[u8],
        timeout: Option<Duration>,
    ) -> Result<(), SunSpecError> {
        if data.is_empty() || data.len() % 2 != 0 {
            return Err(SunSpecError::Range);
        }
        let capacity = usize::from(MODBUS_MAX_REGISTERS) * 2;
        if data.len() > capacity {
            return Err(SunSpecError::BufferTooSmall {
                needed: data.len(),
                capacity,
            });
        }
        let count = (data.len() / 2) as u16;
        let timeout = effective_timeout(timeout);

        let request = build_write_request(self.slave_id, addr, data);
        let frame = self.transact(&request, timeout).await?;
        let body = self.check_response(&frame, MODBUS_FC_WRITE_MULTIPLE)?;

        let (_, (_, _, echo_addr, echo_count)) =
            parse_write_response(body).map_err(|_| SunSpecError::ModbusResponseMismatch)?;
        if echo_addr != addr || echo_count != count {
            return Err(SunSpecError::ModbusResponseMismatch);
        }
        Ok(())
    }
}

/// Function 3 request frame including CRC.
pub fn build_read_request(slave_id: u8, addr: u16, count: u16) -> Vec<u8> {
    let mut buf = BytesMut::with_capacity(8);
    buf.put_u8(slave_id);
    buf.put_u8(MODBUS_FC_READ_HOLDING);
    buf.put_u16(addr);
    buf.put_u16(count);
    let mut frame = buf.to_vec();
    append_crc(&mut frame);
    frame
}

/// Function 16 request frame including CRC. `data` holds whole registers.
pub fn build_write_request(slave_id: u8, addr: u16, data: &[u8]) -> Vec<u8> {
    let mut buf = BytesMut::with_capacity(9 + data.len());
    buf.put_u8(slave_id);
    buf.put_u8(MODBUS_FC_WRITE_MULTIPLE);
    buf.put_u16(addr);
    buf.put_u16((data.len() / 2) as u16);
    buf.put_u8(data.len() as u8);
    buf.put_slice(data);
    let mut frame = buf.to_vec();
    append_crc(&mut frame);
    frame
}

/// Slave id, function code and payload of a read response body.
pub fn parse_read_response(input: &[u8]) -> IResult<&[u8], (u8, u8, &[u8])> {
    tuple((be_u8, be_u8, length_data(be_u8)))(input)
}

/// Slave id, function code, echoed address and echoed count.
pub fn parse_write_response(input: &[u8]) -> IResult<&[u8], (u8, u8, u16, u16)> {
    tuple((be_u8, be_u8, be_u16, be_u16))(input)
}

/// Slave id, function code and exception code.
pub fn parse_exception(input: &[u8]) -> IResult<&[u8], (u8, u8, u8)> {
    tuple((be_u8, be_u8, be_u8))(input)
}
