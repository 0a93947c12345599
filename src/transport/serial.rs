//! # Serial Link
//!
//! `SerialLink` adapts a `tokio_serial::SerialStream` to the [`ByteStream`]
//! interface used by the RTU client. `RtuConfig` carries the line settings
//! and can be loaded from a JSON file.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::time::timeout;
use tokio_serial::{ClearBuffer, SerialPort, SerialPortBuilderExt, SerialStream};

use crate::constants::{DEFAULT_BAUDRATE, DEFAULT_SLAVE_ID, DEFAULT_TIMEOUT};
use crate::error::SunSpecError;
use crate::transport::ByteStream;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Parity {
    None,
    Odd,
    Even,
}

impl From<Parity> for tokio_serial::Parity {
    fn from(p: Parity) -> Self {
        match p {
            Parity::None => tokio_serial::Parity::None,
            Parity::Odd => tokio_serial::Parity::Odd,
            Parity::Even => tokio_serial::Parity::Even,
        }
    }
}

/// Line and addressing settings for an RTU link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RtuConfig {
    pub slave_id: u8,
    pub baudrate: u32,
    pub parity: Parity,
    pub data_bits: u8,
    pub stop_bits: u8,
    /// Per-call timeout in milliseconds.
    pub timeout_ms: u64,
}

impl Default for RtuConfig {
    fn default() -> Self {
        RtuConfig {
            slave_id: DEFAULT_SLAVE_ID,
            baudrate: DEFAULT_BAUDRATE,
            parity: Parity::None,
            data_bits: 8,
            stop_bits: 1,
            timeout_ms: DEFAULT_TIMEOUT.as_millis() as u64,
        }
    }
}

impl RtuConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Load settings from a JSON file. Missing fields take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<RtuConfig, SunSpecError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config: RtuConfig =
            serde_json::from_str(&text).map_err(|e| SunSpecError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), SunSpecError> {
        if !(1..=247).contains(&self.slave_id) {
            return Err(SunSpecError::Config(format!("invalid slave id {}", self.slave_id)));
        }
        if self.data_bits_setting().is_none() {
            return Err(SunSpecError::Config(format!("invalid data bits {}", self.data_bits)));
        }
        if self.stop_bits_setting().is_none() {
            return Err(SunSpecError::Config(format!("invalid stop bits {}", self.stop_bits)));
        }
        Ok(())
    }

    fn data_bits_setting(&self) -> Option<tokio_serial::DataBits> {
        match self.data_bits {
            5 => Some(tokio_serial::DataBits::Five),
            6 => Some(tokio_serial::DataBits::Six),
            7 => Some(tokio_serial::DataBits::Seven),
            8 => Some(tokio_serial::DataBits::Eight),
            _ => None,
        }
    }

    fn stop_bits_setting(&self) -> Option<tokio_serial::StopBits> {
        match self.stop_bits {
            1 => Some(tokio_serial::StopBits::One),
            2 => Some(tokio_serial::StopBits::Two),
            _ => None,
        }
    }
}

/// Serial port opened on `connect` and closed on `disconnect` or drop.
pub struct SerialLink {
    path: String,
    config: RtuConfig,
    port: Option<SerialStream>,
}

impl SerialLink {
    pub fn new(path: &str, config: RtuConfig) -> Self {
        SerialLink {
            path: path.to_string(),
            config,
            port: None,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn is_connected(&self) -> bool {
        self.port.is_some()
    }

    fn port(&mut self) -> Result<&mut SerialStream, SunSpecError> {
        self.port.as_mut().ok_or(SunSpecError::NotInitialized)
    }
}

#[async_trait]
impl ByteStream for SerialLink {
    async fn connect(&mut self, timeout: Duration) -> Result<(), SunSpecError> {
        self.config.validate()?;
        let data_bits = self
            .config
            .data_bits_setting()
            .ok_or(SunSpecError::Range)?;
        let stop_bits = self
            .config
            .stop_bits_setting()
            .ok_or(SunSpecError::Range)?;

        let port = tokio_serial::new(&self.path, self.config.baudrate)
            .data_bits(data_bits)
            .stop_bits(stop_bits)
            .parity(self.config.parity.into())
            .timeout(timeout)
            .open_native_async()
            .map_err(|e| SunSpecError::SerialPort(e.to_string()))?;

        debug!("Opened {} at {} baud", self.path, self.config.baudrate);
        self.port = Some(port);
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), SunSpecError> {
        // Dropping the stream closes the port.
        self.port = None;
        Ok(())
    }

    async fn read(&mut self, buf: &mut [u8], wait: Duration) -> Result<usize, SunSpecError> {
        let port = self.port()?;
        Ok(timeout(wait, port.read(buf)).await??)
    }

    async fn write(&mut self, data: &[u8], wait: Duration) -> Result<(), SunSpecError> {
        let port = self.port()?;
        timeout(wait, async {
            port.write_all(data).await?;
            port.flush().await
        })
        .await??;
        Ok(())
    }

    async fn flush(&mut self, tx: bool, rx: bool) -> Result<(), SunSpecError> {
        let which = match (tx, rx) {
            (true, true) => ClearBuffer::All,
            (true, false) => ClearBuffer::Output,
            (false, true) => ClearBuffer::Input,
            (false, false) => return Ok(()),
        };
        self.port()?
            .clear(which)
            .map_err(|e| SunSpecError::SerialPort(e.to_string()))
    }
}
