//! The transport module contains everything that moves registers between a
//! model and a device: the `RegisterTransport` abstraction consumed by models,
//! the Modbus RTU client built on a `ByteStream`, the serial link, and the
//! in-memory simulator and mock port used for testing.

pub mod crc;
pub mod mock;
pub mod rtu;
pub mod serial;
pub mod sim;

use std::time::Duration;

use async_trait::async_trait;

use crate::constants::DEFAULT_TIMEOUT;
use crate::error::SunSpecError;

pub use mock::MockSerialPort;
pub use rtu::RtuTransport;
pub use serial::{RtuConfig, SerialLink};
pub use sim::SimTransport;

/// Register-addressed read/write access to a device.
///
/// Buffers carry register contents in network byte order, two bytes per
/// register. A `None` timeout means [`DEFAULT_TIMEOUT`].
#[async_trait]
pub trait RegisterTransport: Send {
    /// Read `count` registers starting at `addr`.
    async fn read_registers(
        &mut self,
        addr: u16,
        count: u16,
        timeout: Option<Duration>,
    ) -> Result<Vec<u8>, SunSpecError>;

    /// Write `data` (an even number of bytes) starting at register `addr`.
    async fn write_registers(
        &mut self,
        addr: u16,
        data: &[u8],
        timeout: Option<Duration>,
    ) -> Result<(), SunSpecError>;
}

#[async_trait]
impl<T: RegisterTransport + ?Sized> RegisterTransport for Box<T> {
    async fn read_registers(
        &mut self,
        addr: u16,
        count: u16,
        timeout: Option<Duration>,
    ) -> Result<Vec<u8>, SunSpecError> {
        (**self).read_registers(addr, count, timeout).await
    }

    async fn write_registers(
        &mut self,
        addr: u16,
        data: &[u8],
        timeout: Option<Duration>,
    ) -> Result<(), SunSpecError> {
        (**self).write_registers(addr, data, timeout).await
    }
}

/// Byte-oriented link a register protocol runs over.
#[async_trait]
pub trait ByteStream: Send {
    async fn connect(&mut self, _timeout: Duration) -> Result<(), SunSpecError> {
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), SunSpecError> {
        Ok(())
    }

    /// Read whatever is available into `buf`, waiting at most `timeout`.
    async fn read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, SunSpecError>;

    /// Write all of `data`.
    async fn write(&mut self, data: &[u8], timeout: Duration) -> Result<(), SunSpecError>;

    /// Discard pending output and/or input.
    async fn flush(&mut self, tx: bool, rx: bool) -> Result<(), SunSpecError>;
}

/// Resolve an optional caller timeout.
pub fn effective_timeout(timeout: Option<Duration>) -> Duration {
    timeout.unwrap_or(DEFAULT_TIMEOUT)
}
