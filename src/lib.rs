//! # sunspec-rs - A Rust Crate for SunSpec Devices over Modbus RTU
//!
//! The sunspec-rs crate implements the SunSpec information model, which
//! describes inverters, meters and other distributed energy devices as a chain
//! of self-describing register models, together with the Modbus RTU transport
//! used to reach them over a serial line.
//!
//! ## Features
//!
//! - Locate the SunSpec marker and walk the model chain of a device
//! - Build model, block and point trees from JSON model definitions
//! - Typed point access with scale factor resolution
//! - Read whole models and write back only the points that changed
//! - Modbus RTU framing with CRC16, chunked reads and exception reporting
//! - An in-memory simulator and a mock serial port for testing
//! - Helpers for common inverter controls (volt-var, power factor, power limit)
//!
//! ## Usage
//!
//! ```toml
//! [dependencies]
//! sunspec-rs = "0.1.0"
//! ```
//!
//! ```rust
//! use sunspec_rs::{Device, SchemaRegistry, SimTransport};
//!
//! # tokio_test::block_on(async {
//! let regs = vec![0x5375, 0x6E53, 0xFFFF, 0];
//! let mut device = Device::new(SimTransport::with_registers(40000, regs));
//! let models = device.scan(&mut SchemaRegistry::builtin()).await.unwrap();
//! assert_eq!(models, 0);
//! # });
//! ```

pub mod constants;
pub mod device;
pub mod error;
pub mod inverter;
pub mod logging;
pub mod model;
pub mod transport;
pub mod util;

pub use crate::error::SunSpecError;
pub use crate::logging::{init_logger, log_info};

pub use device::{Device, ModelHandle};
pub use model::{
    BuiltinSchemaSource, DirSchemaSource, Model, Point, SchemaRegistry, SchemaSource,
    StaticSchemaSource, Value,
};
pub use transport::{
    ByteStream, MockSerialPort, RegisterTransport, RtuConfig, RtuTransport, SerialLink,
    SimTransport,
};

/// Open a serial port and wrap it in an unscanned device.
///
/// # Arguments
/// * `port` - Serial port path (e.g., "/dev/ttyUSB0" on Linux, "COM3" on Windows)
/// * `config` - Line settings and slave id
pub async fn connect(
    port: &str,
    config: RtuConfig,
) -> Result<Device<RtuTransport<SerialLink>>, SunSpecError> {
    let timeout = config.timeout();
    let transport = RtuTransport::open(port, config).await?;
    Ok(Device::new(transport).with_timeout(Some(timeout)))
}

/// Close the serial port of a device.
pub async fn disconnect(device: &mut Device<RtuTransport<SerialLink>>) -> Result<(), SunSpecError> {
    device.transport_mut().disconnect().await
}
