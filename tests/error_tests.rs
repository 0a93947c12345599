//! Unit tests for the `SunSpecError` enum, its `Display` output and its conversions.

use std::io;

use sunspec_rs::error::SunSpecError;

/// Tests that the `Crc` variant prints both checksums in hex.
#[test]
fn test_crc_error() {
    let err = SunSpecError::Crc {
        expected: 0xCDC5,
        calculated: 0x1234,
    };
    assert_eq!(err.to_string(), "Invalid CRC: expected 0xCDC5, calculated 0x1234");
}

/// Tests that the `ModbusException` variant prints the exception code.
#[test]
fn test_modbus_exception_error() {
    let err = SunSpecError::ModbusException(2);
    assert_eq!(err.to_string(), "Modbus exception: 0x02");
}

/// Tests that the `ModelLenInvalid` variant names the model and length.
#[test]
fn test_model_len_invalid_error() {
    let err = SunSpecError::ModelLenInvalid { id: 126, len: 11 };
    assert_eq!(err.to_string(), "Invalid length 11 for model 126");
}

/// Tests that the `ScaleFactorMismatch` variant shows both exponents.
#[test]
fn test_scale_factor_mismatch_error() {
    let err = SunSpecError::ScaleFactorMismatch {
        expected: -2,
        supplied: 0,
    };
    assert_eq!(
        err.to_string(),
        "Scale factor mismatch: point uses -2, caller supplied 0"
    );
}

/// Tests that the `BufferTooSmall` variant reports sizes.
#[test]
fn test_buffer_too_small_error() {
    let err = SunSpecError::BufferTooSmall {
        needed: 252,
        capacity: 250,
    };
    assert_eq!(err.to_string(), "Buffer too small: needed 252 bytes, capacity 250");
}

/// Tests that the `ModelDefNotFound` variant prints the model id.
#[test]
fn test_model_def_not_found_error() {
    assert_eq!(
        SunSpecError::ModelDefNotFound(700).to_string(),
        "Model definition not found: 700"
    );
}

/// Tests that the unit variants have stable messages.
#[test]
fn test_unit_variants() {
    assert_eq!(SunSpecError::NotSunSpec.to_string(), "Device is not SunSpec compliant");
    assert_eq!(SunSpecError::Timeout.to_string(), "Timeout");
    assert_eq!(SunSpecError::Busy.to_string(), "Transport busy");
    assert_eq!(SunSpecError::Range.to_string(), "Value out of range");
}

/// Tests that a timed-out I/O error becomes `Timeout` and other I/O errors keep their message.
#[test]
fn test_from_io_error() {
    let timeout: SunSpecError = io::Error::new(io::ErrorKind::TimedOut, "slow").into();
    assert_eq!(timeout, SunSpecError::Timeout);

    let other: SunSpecError = io::Error::new(io::ErrorKind::BrokenPipe, "unplugged").into();
    assert_eq!(other, SunSpecError::Io("unplugged".to_string()));
}

/// Tests that JSON errors surface as schema errors.
#[test]
fn test_from_serde_json_error() {
    let err: SunSpecError = serde_json::from_str::<serde_json::Value>("{").unwrap_err().into();
    assert!(matches!(err, SunSpecError::Schema(_)));
}
