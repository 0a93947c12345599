//! # Modbus RTU CRC16
//!
//! Reflected polynomial 0xA001 (0x8005), seed 0xFFFF, transmitted low byte
//! first. The `crc` crate's table-driven `CRC_16_MODBUS` does the arithmetic.

use crc::{Crc, CRC_16_MODBUS};

use crate::error::SunSpecError;

const MODBUS_CRC: Crc<u16> = Crc::<u16>::new(&CRC_16_MODBUS);

/// CRC16 of `data`.
pub fn crc16(data: &[u8]) -> u16 {
    MODBUS_CRC.checksum(data)
}

/// Append the CRC of `frame` to it, low byte first.
pub fn append_crc(frame: &mut Vec<u8>) {
    let crc = crc16(frame);
    frame.extend_from_slice(&crc.to_le_bytes());
}

/// Check the trailing CRC of a complete frame.
pub fn verify_crc(frame: &[u8]) -> Result<(), SunSpecError> {
    if frame.len() < 2 {
        return Err(SunSpecError::Crc {
            expected: 0,
            calculated: 0,
        });
    }
    let (body, trailer) = frame.split_at(frame.len() - 2);
    let expected = u16::from_le_bytes([trailer[0], trailer[1]]);
    let calculated = crc16(body);
    if expected != calculated {
        return Err(SunSpecError::Crc {
            expected,
            calculated,
        });
    }
    Ok(())
}
