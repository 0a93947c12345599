//! # SunSpec Error Handling
//!
//! This module defines the `SunSpecError` enum, which represents the different
//! error kinds that can occur while scanning a device, accessing points or
//! talking Modbus RTU over a serial link.

use thiserror::Error;

/// Represents the different error types that can occur in the sunspec-rs crate.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SunSpecError {
    /// No point, model or device answered for the requested identifier.
    #[error("Not found")]
    NotFound,

    /// The point's base type differs from the type requested by the accessor.
    #[error("Type mismatch for point {point}: expected {expected}, found {actual}")]
    TypeMismatch {
        point: String,
        expected: &'static str,
        actual: &'static str,
    },

    /// A value or address lies outside the permitted range.
    #[error("Value out of range")]
    Range,

    /// The supplied scale factor does not match the point's linked scale factor.
    #[error("Scale factor mismatch: point uses {expected}, caller supplied {supplied}")]
    ScaleFactorMismatch { expected: i16, supplied: i16 },

    /// A point references a scale factor that exists neither in its block nor in the fixed block.
    #[error("Unable to resolve scale factor {sf} for point {point} in model {model}")]
    ScaleFactorResolve {
        model: u16,
        point: String,
        sf: String,
    },

    /// The declared model length is not the fixed length plus whole repeating blocks.
    #[error("Invalid length {len} for model {id}")]
    ModelLenInvalid { id: u16, len: u16 },

    /// No schema is available for the model id.
    #[error("Model definition not found: {0}")]
    ModelDefNotFound(u16),

    /// A device answered at a base address but did not carry the SunSpec marker.
    #[error("Device is not SunSpec compliant")]
    NotSunSpec,

    /// The request needs more buffer space than a single transaction allows.
    #[error("Buffer too small: needed {needed} bytes, capacity {capacity}")]
    BufferTooSmall { needed: usize, capacity: usize },

    /// Reserving a model buffer failed.
    #[error("Allocation failure")]
    AllocationFailure,

    /// The object was used before it was set up, or after a re-scan invalidated it.
    #[error("Not initialized")]
    NotInitialized,

    /// The remote device did not answer within the timeout.
    #[error("Timeout")]
    Timeout,

    /// The remote device answered with a Modbus exception.
    #[error("Modbus exception: 0x{0:02X}")]
    ModbusException(u8),

    /// The response did not echo the request (station, function, address or count).
    #[error("Modbus response does not match request")]
    ModbusResponseMismatch,

    /// The CRC16 at the end of a frame is wrong.
    #[error("Invalid CRC: expected 0x{expected:04X}, calculated 0x{calculated:04X}")]
    Crc { expected: u16, calculated: u16 },

    /// The link could not be flushed before a request.
    #[error("Transport busy")]
    Busy,

    /// The device does not implement the requested capability.
    #[error("Unimplemented")]
    Unimplemented,

    /// Schema text could not be turned into model definitions.
    #[error("Schema error: {0}")]
    Schema(String),

    /// Indicates an error related to the serial port communication.
    #[error("Serial port error: {0}")]
    SerialPort(String),

    /// Transport configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error reported by the underlying byte stream.
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for SunSpecError {
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::TimedOut => SunSpecError::Timeout,
            _ => SunSpecError::Io(e.to_string()),
        }
    }
}

impl From<serde_json::Error> for SunSpecError {
    fn from(e: serde_json::Error) -> Self {
        SunSpecError::Schema(e.to_string())
    }
}

impl From<tokio::time::error::Elapsed> for SunSpecError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        SunSpecError::Timeout
    }
}
