//! # Schema Registry
//!
//! Cache of parsed model definitions keyed by model id. Definitions are
//! loaded lazily from a `SchemaSource` the first time a scan meets their id
//! and stay cached until the registry is explicitly reset.
//!
//! ## Usage
//!
//! ```rust
//! use sunspec_rs::model::registry::SchemaRegistry;
//!
//! let mut registry = SchemaRegistry::builtin();
//! let common = registry.get_model_def(1).unwrap();
//! assert_eq!(common.name, "common");
//! ```

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use log::debug;

use crate::error::SunSpecError;
use crate::model::schema::{parse_model_defs, ModelDef};

/// Provider of schema text for a model id.
pub trait SchemaSource: Send + Sync {
    /// Schema text describing `id`, or `None` if the source has no such model.
    fn load(&self, id: u16) -> Result<Option<String>, SunSpecError>;
}

/// Reads `model_<id>.json` (id zero-padded to five digits) from a directory.
#[derive(Debug, Clone)]
pub struct DirSchemaSource {
    dir: PathBuf,
}

impl DirSchemaSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        DirSchemaSource { dir: dir.into() }
    }

    pub fn path_for(&self, id: u16) -> PathBuf {
        self.dir.join(format!("model_{id:05}.json"))
    }
}

impl SchemaSource for DirSchemaSource {
    fn load(&self, id: u16) -> Result<Option<String>, SunSpecError> {
        let path = self.path_for(id);
        match std::fs::read_to_string(&path) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(SunSpecError::Io(format!("{}: {}", path.display(), e))),
        }
    }
}

/// In-memory schema texts, mostly for tests and embedded deployments.
#[derive(Debug, Clone, Default)]
pub struct StaticSchemaSource {
    texts: HashMap<u16, String>,
}

impl StaticSchemaSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, id: u16, text: impl Into<String>) -> Self {
        self.insert(id, text);
        self
    }

    pub fn insert(&mut self, id: u16, text: impl Into<String>) {
        self.texts.insert(id, text.into());
    }
}

impl SchemaSource for StaticSchemaSource {
    fn load(&self, id: u16) -> Result<Option<String>, SunSpecError> {
        Ok(self.texts.get(&id).cloned())
    }
}

/// Model definitions compiled into the crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinSchemaSource;

impl BuiltinSchemaSource {
    /// Ids of the bundled models.
    pub const MODEL_IDS: [u16; 8] = [1, 101, 120, 121, 123, 126, 132, 134];

    fn text(id: u16) -> Option<&'static str> {
        match id {
            1 => Some(include_str!("../../models/model_00001.json")),
            101 => Some(include_str!("../../models/model_00101.json")),
            120 => Some(include_str!("../../models/model_00120.json")),
            121 => Some(include_str!("../../models/model_00121.json")),
            123 => Some(include_str!("../../models/model_00123.json")),
            126 => Some(include_str!("../../models/model_00126.json")),
            132 => Some(include_str!("../../models/model_00132.json")),
            134 => Some(include_str!("../../models/model_00134.json")),
            _ => None,
        }
    }
}

impl SchemaSource for BuiltinSchemaSource {
    fn load(&self, id: u16) -> Result<Option<String>, SunSpecError> {
        Ok(Self::text(id).map(str::to_owned))
    }
}

/// Looks up sources in order and returns the first hit.
pub struct ChainedSchemaSource {
    sources: Vec<Box<dyn SchemaSource>>,
}

impl ChainedSchemaSource {
    pub fn new(sources: Vec<Box<dyn SchemaSource>>) -> Self {
        ChainedSchemaSource { sources }
    }
}

impl SchemaSource for ChainedSchemaSource {
    fn load(&self, id: u16) -> Result<Option<String>, SunSpecError> {
        for source in &self.sources {
            if let Some(text) = source.load(id)? {
                return Ok(Some(text));
            }
        }
        Ok(None)
    }
}

/// Cache of model definitions in front of a `SchemaSource`.
pub struct SchemaRegistry {
    source: Box<dyn SchemaSource>,
    /// Most recently loaded first.
    defs: Vec<Arc<ModelDef>>,
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl SchemaRegistry {
    pub fn new(source: impl SchemaSource + 'static) -> Self {
        SchemaRegistry {
            source: Box::new(source),
            defs: Vec::new(),
        }
    }

    /// Registry over the bundled model definitions.
    pub fn builtin() -> Self {
        Self::new(BuiltinSchemaSource)
    }

    /// Definition for `id`, loading and caching it on first use.
    pub fn get_model_def(&mut self, id: u16) -> Result<Arc<ModelDef>, SunSpecError> {
        if let Some(def) = self.cached(id) {
            return Ok(def);
        }

        let text = self.source.load(id)?.ok_or(SunSpecError::ModelDefNotFound(id))?;
        let parsed = parse_model_defs(&text)?;

        if let Some(dup) = parsed.iter().find(|d| self.cached(d.id).is_some()) {
            return Err(SunSpecError::Schema(format!("model {} is already loaded", dup.id)));
        }
        if !parsed.iter().any(|d| d.id == id) {
            return Err(SunSpecError::ModelDefNotFound(id));
        }

        for def in parsed {
            debug!("Loaded model definition {} ({})", def.id, def.name);
            self.defs.insert(0, Arc::new(def));
        }
        self.cached(id).ok_or(SunSpecError::ModelDefNotFound(id))
    }

    /// Cached definition for `id` without touching the source.
    pub fn cached(&self, id: u16) -> Option<Arc<ModelDef>> {
        self.defs.iter().find(|d| d.id == id).cloned()
    }

    /// Cached definition by model name.
    pub fn cached_by_name(&self, name: &str) -> Option<Arc<ModelDef>> {
        self.defs.iter().find(|d| d.name == name).cloned()
    }

    /// Drop every cached definition; the next lookup reloads from the source.
    pub fn reset(&mut self) {
        self.defs.clear();
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }
}
