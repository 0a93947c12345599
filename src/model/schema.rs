//! # Model Definitions
//!
//! Schema side of the data model: `ModelDef` -> `BlockDef` -> `PointDef`,
//! built once per model id and shared read-only by every model instance.
//!
//! Definitions are written as JSON, either a single model object or an object
//! with a `models` array:
//!
//! ```json
//! {
//!   "id": 126, "len": 10, "name": "volt_var",
//!   "blocks": [
//!     { "type": "fixed", "len": 10, "points": [
//!       { "id": "ActCrv", "offset": 0, "type": "uint16" },
//!       { "id": "V_SF", "offset": 7, "type": "sunssf" }
//!     ]},
//!     { "type": "repeating", "len": 54, "points": [
//!       { "id": "V1", "offset": 2, "type": "uint16", "sf": "V_SF", "units": "% VRef" }
//!     ]}
//!   ]
//! }
//! ```
//!
//! Scale factor names are resolved to offsets while parsing.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Deserialize;

use crate::error::SunSpecError;
use crate::model::data_type::{find_data_type, DataType};

/// Fixed or repeating block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Fixed,
    Repeating,
}

/// Point access mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Access {
    #[default]
    ReadOnly,
    ReadWrite,
}

/// Scale factor attached to a point definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScaleFactorDef {
    /// Constant exponent written in the schema.
    Literal(i16),
    /// Another point holding the exponent.
    Point {
        name: String,
        offset: u16,
        in_fixed_block: bool,
    },
}

#[derive(Debug, Clone)]
pub struct PointDef {
    pub id: String,
    /// Register offset within the block.
    pub offset: u16,
    pub data_type: &'static DataType,
    /// Length in registers.
    pub len: u16,
    pub sf: Option<ScaleFactorDef>,
    pub units: Option<String>,
    pub access: Access,
    pub mandatory: bool,
}

#[derive(Debug, Clone)]
pub struct BlockDef {
    pub kind: BlockKind,
    /// Length in registers.
    pub len: u16,
    /// Points in declared order, shared by every instance of the block.
    pub points: Vec<Arc<PointDef>>,
}

impl BlockDef {
    pub fn point(&self, id: &str) -> Option<&Arc<PointDef>> {
        self.points.iter().find(|p| p.id == id)
    }
}

#[derive(Debug, Clone)]
pub struct ModelDef {
    pub id: u16,
    /// Declared length of the fixed part.
    pub len: u16,
    pub name: String,
    pub fixed: Option<BlockDef>,
    pub repeating: Option<BlockDef>,
}

impl ModelDef {
    /// Length of the fixed block, or 0 when the model has none.
    pub fn fixed_len(&self) -> u16 {
        self.fixed.as_ref().map_or(0, |b| b.len)
    }

    /// Length of one repeating block, or 0 when the model has none.
    pub fn repeating_len(&self) -> u16 {
        self.repeating.as_ref().map_or(0, |b| b.len)
    }
}

#[derive(Deserialize)]
struct RawModel {
    id: Option<u16>,
    len: Option<u16>,
    name: Option<String>,
    #[serde(default)]
    blocks: Vec<RawBlock>,
}

#[derive(Deserialize)]
struct RawBlock {
    len: Option<u16>,
    #[serde(rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    points: Vec<RawPoint>,
}

#[derive(Deserialize)]
struct RawPoint {
    id: Option<String>,
    offset: Option<u16>,
    #[serde(rename = "type")]
    type_name: Option<String>,
    #[serde(alias = "size")]
    len: Option<u16>,
    sf: Option<RawScaleFactor>,
    units: Option<String>,
    access: Option<String>,
    #[serde(default)]
    mandatory: bool,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawScaleFactor {
    Literal(i16),
    Name(String),
}

fn missing(what: &str, owner: &str) -> SunSpecError {
    SunSpecError::Schema(format!("missing {what} in {owner}"))
}

/// Parse schema text into model definitions.
///
/// Either every model in the text is returned or the whole load fails.
pub fn parse_model_defs(text: &str) -> Result<Vec<ModelDef>, SunSpecError> {
    let doc: serde_json::Value = serde_json::from_str(text)?;
    let raw_models: Vec<RawModel> = match doc.get("models") {
        Some(models) => Vec::<RawModel>::deserialize(models)?,
        None => vec![RawModel::deserialize(&doc)?],
    };

    let mut seen = HashSet::new();
    let mut defs = Vec::with_capacity(raw_models.len());
    for raw in raw_models {
        let def = build_model_def(raw)?;
        if !seen.insert(def.id) {
            return Err(SunSpecError::Schema(format!("duplicate model id {}", def.id)));
        }
        defs.push(def);
    }
    Ok(defs)
}

fn build_model_def(raw: RawModel) -> Result<ModelDef, SunSpecError> {
    let id = raw.id.ok_or_else(|| missing("id", "model"))?;
    let owner = format!("model {id}");
    let len = raw.len.ok_or_else(|| missing("len", &owner))?;
    let name = raw.name.unwrap_or_else(|| format!("model_{id}"));

    let mut fixed_raw = None;
    let mut repeating_raw = None;
    for block in raw.blocks {
        let kind = match block.kind.as_deref() {
            None | Some("fixed") => BlockKind::Fixed,
            Some("repeating") => BlockKind::Repeating,
            Some(other) => {
                return Err(SunSpecError::Schema(format!(
                    "unknown block type '{other}' in {owner}"
                )))
            }
        };
        let slot = match kind {
            BlockKind::Fixed => &mut fixed_raw,
            BlockKind::Repeating => &mut repeating_raw,
        };
        if slot.is_some() {
            return Err(SunSpecError::Schema(format!(
                "more than one {kind:?} block in {owner}"
            )));
        }
        *slot = Some(block);
    }

    let fixed = fixed_raw
        .map(|raw| build_block_def(raw, BlockKind::Fixed, None, &owner))
        .transpose()?;
    let repeating = repeating_raw
        .map(|raw| build_block_def(raw, BlockKind::Repeating, fixed.as_ref(), &owner))
        .transpose()?;

    if repeating.as_ref().is_some_and(|b| b.len == 0) {
        return Err(SunSpecError::Schema(format!("empty repeating block in {owner}")));
    }

    Ok(ModelDef {
        id,
        len,
        name,
        fixed,
        repeating,
    })
}

fn build_block_def(
    raw: RawBlock,
    kind: BlockKind,
    fixed: Option<&BlockDef>,
    owner: &str,
) -> Result<BlockDef, SunSpecError> {
    let len = raw.len.ok_or_else(|| missing("len", &format!("block of {owner}")))?;
    let mut ids = HashSet::new();
    let mut points = Vec::with_capacity(raw.points.len());

    for p in raw.points {
        let id = p.id.ok_or_else(|| missing("id", &format!("point of {owner}")))?;
        let context = format!("point {id} of {owner}");
        let offset = p.offset.ok_or_else(|| missing("offset", &context))?;
        let type_name = p.type_name.ok_or_else(|| missing("type", &context))?;
        let data_type = find_data_type(&type_name).ok_or_else(|| {
            SunSpecError::Schema(format!("unknown type '{type_name}' for {context}"))
        })?;

        let point_len = if data_type.len == 0 {
            match p.len {
                Some(n) if n > 0 => n,
                _ => return Err(missing("len", &context)),
            }
        } else {
            data_type.len
        };
        if u32::from(offset) + u32::from(point_len) > u32::from(len) {
            return Err(SunSpecError::Schema(format!("{context} exceeds its block")));
        }

        let sf = match p.sf {
            None => None,
            Some(RawScaleFactor::Literal(v)) => Some(ScaleFactorDef::Literal(v)),
            Some(RawScaleFactor::Name(name)) => Some(match name.trim().parse::<i16>() {
                Ok(v) => ScaleFactorDef::Literal(v),
                Err(_) => ScaleFactorDef::Point {
                    name,
                    offset: 0,
                    in_fixed_block: false,
                },
            }),
        };

        let access = match p.access.as_deref() {
            None | Some("r") | Some("R") => Access::ReadOnly,
            Some("rw") | Some("RW") | Some("w") => Access::ReadWrite,
            Some(other) => {
                return Err(SunSpecError::Schema(format!("unknown access '{other}' for {context}")))
            }
        };

        if !ids.insert(id.clone()) {
            return Err(SunSpecError::Schema(format!("duplicate {context}")));
        }
        points.push(PointDef {
            id,
            offset,
            data_type,
            len: point_len,
            sf,
            units: p.units,
            access,
            mandatory: p.mandatory,
        });
    }

    // Scale factor names resolve against this block first, then the fixed block.
    let own_offsets: Vec<(String, u16)> = points.iter().map(|p| (p.id.clone(), p.offset)).collect();
    for point in &mut points {
        let Some(ScaleFactorDef::Point { name, offset, in_fixed_block }) = point.sf.as_mut() else {
            continue;
        };
        if let Some((_, o)) = own_offsets.iter().find(|(id, _)| id.as_str() == name.as_str()) {
            *offset = *o;
            *in_fixed_block = kind == BlockKind::Fixed;
        } else if let Some(sf_point) = fixed.and_then(|b| b.point(name)) {
            *offset = sf_point.offset;
            *in_fixed_block = true;
        } else {
            return Err(SunSpecError::Schema(format!(
                "unresolved scale factor {} for point {} of {}",
                name, point.id, owner
            )));
        }
    }

    Ok(BlockDef {
        kind,
        len,
        points: points.into_iter().map(Arc::new).collect(),
    })
}
