//! SunSpec and Modbus RTU Constants
//!
//! This module defines the register layout markers of the SunSpec device
//! information model and the framing limits of Modbus RTU.

use std::time::Duration;

/// Candidate base addresses searched for the SunSpec marker, in order.
pub const SUNSPEC_BASE_ADDRESSES: [u16; 3] = [40000, 0, 50000];

/// Marker stored in the two registers at the base address ("SunS").
pub const SUNSPEC_MAGIC: [u8; 4] = *b"SunS";

/// Length of the marker in registers.
pub const SUNSPEC_MAGIC_LEN: u16 = 2;

/// Model id terminating the model list.
pub const SUNSPEC_END_MODEL_ID: u16 = 0xFFFF;

/// Id of the common model, which every device starts with.
pub const SUNSPEC_COMMON_MODEL_ID: u16 = 1;

/// Registers occupied by a model header (id + length).
pub const SUNSPEC_MODEL_HEADER_LEN: u16 = 2;

/// Largest model length accepted during a scan.
pub const SUNSPEC_MAX_MODEL_LEN: u16 = 0x8000;

/// Largest byte count a single model read may transfer.
pub const SUNSPEC_MODEL_BUF_SIZE: usize = 4096;

/// Largest scale factor magnitude supported by float conversion.
pub const SUNSPEC_MAX_SCALE_FACTOR: i16 = 10;

/// Modbus function code: read holding registers.
pub const MODBUS_FC_READ_HOLDING: u8 = 0x03;

/// Modbus function code: write multiple registers.
pub const MODBUS_FC_WRITE_MULTIPLE: u8 = 0x10;

/// Bit set in the function code of an exception response.
pub const MODBUS_EXCEPTION_FLAG: u8 = 0x80;

/// Largest register count per read or write transaction.
pub const MODBUS_MAX_REGISTERS: u16 = 125;

/// Station id, function code and length/exception byte.
pub const MODBUS_RTU_HEADER_LEN: usize = 3;

/// CRC16 trailer.
pub const MODBUS_RTU_CRC_LEN: usize = 2;

/// A write response echoes address and count after station and function code.
pub const MODBUS_RTU_WRITE_RESPONSE_LEN: usize = 8;

/// Timeout used when a caller does not pass one.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(1000);

/// Default RTU station id.
pub const DEFAULT_SLAVE_ID: u8 = 1;

/// Default serial baud rate.
pub const DEFAULT_BAUDRATE: u32 = 9600;
