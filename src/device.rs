//! # SunSpec Device
//!
//! A `Device` owns a register transport and the models discovered on it.
//! [`Device::scan`] locates the SunSpec marker, walks the model chain and
//! instantiates every model it has a schema for. Models are then addressed
//! through [`ModelHandle`]s, which stop working once the device is scanned
//! again.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let mut device = Device::new(transport);
//! device.scan(&mut SchemaRegistry::builtin()).await?;
//!
//! let inverter = device.model_by_name("inverter", 1)?;
//! device.read_model(inverter).await?;
//! let watts = device.get(inverter)?.get_float32("W", 0)?;
//! ```

use std::fmt;
use std::time::Duration;

use log::{debug, error, info, warn};

use crate::constants::{
    SUNSPEC_BASE_ADDRESSES, SUNSPEC_END_MODEL_ID, SUNSPEC_MAGIC, SUNSPEC_MAGIC_LEN,
    SUNSPEC_MAX_MODEL_LEN, SUNSPEC_MODEL_HEADER_LEN,
};
use crate::error::SunSpecError;
use crate::model::instance::Model;
use crate::model::registry::SchemaRegistry;
use crate::transport::RegisterTransport;

/// Reference to a model of a device, valid until the next scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModelHandle {
    index: usize,
    generation: u64,
}

/// A SunSpec device reached through a register transport.
pub struct Device<T: RegisterTransport> {
    transport: T,
    base_addr: Option<u16>,
    models: Vec<Model>,
    generation: u64,
    timeout: Option<Duration>,
}

impl<T: RegisterTransport> Device<T> {
    pub fn new(transport: T) -> Self {
        Device {
            transport,
            base_addr: None,
            models: Vec::new(),
            generation: 0,
            timeout: None,
        }
    }

    /// Timeout passed to every transport call; `None` uses the transport default.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Address of the SunSpec marker found by the last successful scan.
    pub fn base_addr(&self) -> Option<u16> {
        self.base_addr
    }

    /// Models in discovery order.
    pub fn models(&self) -> &[Model] {
        &self.models
    }

    /// Discover the models on the device, replacing any earlier result.
    ///
    /// Models without a schema are skipped. Any other failure leaves the
    /// device without models. Returns the number of models instantiated.
    pub async fn scan(&mut self, registry: &mut SchemaRegistry) -> Result<usize, SunSpecError> {
        self.models.clear();
        self.base_addr = None;
        self.generation += 1;

        let result = self.scan_models(registry).await;
        if let Err(e) = &result {
            error!("Scan aborted: {e}");
            self.models.clear();
            self.base_addr = None;
        }
        result
    }

    async fn find_base(&mut self) -> Result<u16, SunSpecError> {
        let mut answered = false;
        for &addr in SUNSPEC_BASE_ADDRESSES.iter() {
            match self
                .transport
                .read_registers(addr, SUNSPEC_MAGIC_LEN, self.timeout)
                .await
            {
                Ok(buf) if buf.as_slice() == SUNSPEC_MAGIC.as_slice() => {
                    debug!("SunSpec marker found at {addr}");
                    return Ok(addr);
                }
                Ok(_) | Err(SunSpecError::ModbusException(_)) => {
                    debug!("No SunSpec marker at {addr}");
                    answered = true;
                }
                Err(e) => debug!("No answer at {addr}: {e}"),
            }
        }
        if answered {
            Err(SunSpecError::NotSunSpec)
        } else {
            Err(SunSpecError::NotFound)
        }
    }

    async fn scan_models(&mut self, registry: &mut SchemaRegistry) -> Result<usize, SunSpecError> {
        let base = self.find_base().await?;
        self.base_addr = Some(base);

        let mut cursor = u32::from(base) + u32::from(SUNSPEC_MAGIC_LEN);
        loop {
            let header_addr = u16::try_from(cursor).map_err(|_| SunSpecError::Range)?;
            let header = self
                .transport
                .read_registers(header_addr, SUNSPEC_MODEL_HEADER_LEN, self.timeout)
                .await?;
            if header.len() < 4 {
                return Err(SunSpecError::ModbusResponseMismatch);
            }
            let id = u16::from_be_bytes([header[0], header[1]]);
            let len = u16::from_be_bytes([header[2], header[3]]);
            if id == SUNSPEC_END_MODEL_ID {
                break;
            }
            if len == 0 || len > SUNSPEC_MAX_MODEL_LEN {
                return Err(SunSpecError::Range);
            }

            let addr = u16::try_from(cursor + u32::from(SUNSPEC_MODEL_HEADER_LEN))
                .map_err(|_| SunSpecError::Range)?;
            match registry.get_model_def(id) {
                Ok(def) => {
                    let index = self.models.iter().filter(|m| m.id() == id).count() as u16 + 1;
                    let model = Model::new(def, addr, len, index)?;
                    info!("Found model {} ({}) at {} len {}", id, model.name(), addr, len);
                    self.models.push(model);
                }
                Err(SunSpecError::ModelDefNotFound(_)) => {
                    warn!("Skipping model {id} at {addr}: no definition");
                }
                Err(e) => return Err(e),
            }

            cursor += u32::from(len) + u32::from(SUNSPEC_MODEL_HEADER_LEN);
        }
        Ok(self.models.len())
    }

    fn handle(&self, index: usize) -> ModelHandle {
        ModelHandle {
            index,
            generation: self.generation,
        }
    }

    fn slot(&self, handle: ModelHandle) -> Result<usize, SunSpecError> {
        if handle.generation != self.generation || handle.index >= self.models.len() {
            return Err(SunSpecError::NotInitialized);
        }
        Ok(handle.index)
    }

    /// The `index`th (1-based) model with id `id`.
    pub fn model(&self, id: u16, index: u16) -> Result<ModelHandle, SunSpecError> {
        self.models
            .iter()
            .position(|m| m.id() == id && m.index() == index)
            .map(|i| self.handle(i))
            .ok_or(SunSpecError::NotFound)
    }

    /// The `index`th (1-based) model whose definition is named `name`.
    pub fn model_by_name(&self, name: &str, index: u16) -> Result<ModelHandle, SunSpecError> {
        self.models
            .iter()
            .position(|m| m.name() == name && m.index() == index)
            .map(|i| self.handle(i))
            .ok_or(SunSpecError::NotFound)
    }

    pub fn get(&self, handle: ModelHandle) -> Result<&Model, SunSpecError> {
        let i = self.slot(handle)?;
        Ok(&self.models[i])
    }

    pub fn get_mut(&mut self, handle: ModelHandle) -> Result<&mut Model, SunSpecError> {
        let i = self.slot(handle)?;
        Ok(&mut self.models[i])
    }

    /// Refresh a model's point values from the device.
    pub async fn read_model(&mut self, handle: ModelHandle) -> Result<(), SunSpecError> {
        let i = self.slot(handle)?;
        self.models[i].read(&mut self.transport, self.timeout).await
    }

    /// Write a model's dirty points to the device.
    pub async fn write_model(&mut self, handle: ModelHandle) -> Result<(), SunSpecError> {
        let i = self.slot(handle)?;
        self.models[i].write(&mut self.transport, self.timeout).await
    }

    /// Refresh every model, stopping at the first failure.
    pub async fn read_all(&mut self) -> Result<(), SunSpecError> {
        for model in &mut self.models {
            model.read(&mut self.transport, self.timeout).await?;
        }
        Ok(())
    }

    /// Compare model values with another device scanned to the same layout.
    pub fn values_eq<U: RegisterTransport>(&self, other: &Device<U>) -> bool {
        self.models.len() == other.models.len()
            && self.models.iter().zip(&other.models).all(|(a, b)| a.values_eq(b))
    }
}

impl<T: RegisterTransport> fmt::Display for Device<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.base_addr {
            Some(base) => writeln!(f, "SunSpec device at base {base}, {} models", self.models.len())?,
            None => writeln!(f, "SunSpec device (not scanned)")?,
        }
        for model in &self.models {
            write!(f, "{model}")?;
        }
        Ok(())
    }
}
