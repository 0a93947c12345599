//! # Model Instances
//!
//! A `Model` is a model definition instantiated at an absolute register
//! address on a device: one fixed block followed by as many repeating blocks
//! as the declared length allows. Points are reached by id and block index,
//! and their values move to and from the device with [`Model::read`] and
//! [`Model::write`].
//!
//! ## Usage
//!
//! ```rust,ignore
//! let (w, sf) = model.get_int16("W", 0)?;
//! model.set_uint16("ActCrv", 0, 2, 0)?;
//! model.write(&mut transport, None).await?;
//! ```

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};

use crate::constants::{SUNSPEC_COMMON_MODEL_ID, SUNSPEC_MODEL_BUF_SIZE};
use crate::error::SunSpecError;
use crate::model::block::Block;
use crate::model::point::{Point, PointRef, ScaleFactor};
use crate::model::schema::{BlockKind, ModelDef, ScaleFactorDef};
use crate::model::value::{BaseType, RegisterPrimitive, Value};
use crate::transport::RegisterTransport;

/// Instance of a model definition on a device.
#[derive(Debug, Clone)]
pub struct Model {
    def: Arc<ModelDef>,
    addr: u16,
    len: u16,
    index: u16,
    blocks: Vec<Block>,
}

macro_rules! typed_accessors {
    ($($get:ident, $set:ident, $t:ty;)*) => {
        $(
            #[doc = concat!("Value of a `", stringify!($t), "` point and its effective scale factor.")]
            pub fn $get(&self, id: &str, block: usize) -> Result<($t, i16), SunSpecError> {
                self.get::<$t>(id, block)
            }

            #[doc = concat!("Stage a new `", stringify!($t), "` value for the next write.")]
            pub fn $set(&mut self, id: &str, block: usize, value: $t, sf: i16) -> Result<(), SunSpecError> {
                self.set::<$t>(id, block, value, sf)
            }
        )*
    };
}

impl Model {
    /// Build the block and point tree for `def` at `addr` with the declared
    /// length `len`. `index` disambiguates models sharing an id on a device.
    pub fn new(def: Arc<ModelDef>, addr: u16, len: u16, index: u16) -> Result<Model, SunSpecError> {
        let invalid = SunSpecError::ModelLenInvalid { id: def.id, len };
        let mut fixed_len = def.fixed_len();
        let repeating_len = def.repeating_len();

        if len < fixed_len {
            // Legacy common models omit the trailing pad register.
            if def.id == SUNSPEC_COMMON_MODEL_ID && len + 1 == fixed_len {
                fixed_len = len;
            } else {
                return Err(invalid);
            }
        }

        let remainder = len - fixed_len;
        let repeating_count = match repeating_len {
            0 => 0,
            r if remainder % r != 0 => return Err(invalid),
            r => usize::from(remainder / r),
        };

        if u32::from(addr) + u32::from(len) > u32::from(u16::MAX) + 1 {
            return Err(SunSpecError::Range);
        }

        let mut blocks = Vec::with_capacity(repeating_count + 1);
        blocks.push(match &def.fixed {
            Some(fixed) => Block::new(fixed, 0, addr, fixed_len)?,
            None => Block::empty(addr),
        });
        if let Some(repeating) = &def.repeating {
            let mut block_addr = addr.wrapping_add(fixed_len);
            for index in 1..=repeating_count {
                blocks.push(Block::new(repeating, index, block_addr, repeating_len)?);
                block_addr = block_addr.wrapping_add(repeating_len);
            }
        }

        let mut model = Model {
            def,
            addr,
            len,
            index,
            blocks,
        };
        model.link_scale_factors()?;
        Ok(model)
    }

    /// Link every point with a scale factor to the point carrying it,
    /// looking in the point's own block first and then in the fixed block.
    fn link_scale_factors(&mut self) -> Result<(), SunSpecError> {
        let mut links = Vec::new();
        for (b, block) in self.blocks.iter().enumerate() {
            for (p, point) in block.points().iter().enumerate() {
                let link = match &point.def().sf {
                    None => continue,
                    Some(ScaleFactorDef::Literal(v)) => ScaleFactor::Literal(*v),
                    Some(ScaleFactorDef::Point { name, .. }) => {
                        let found = block
                            .position(name)
                            .map(|i| PointRef { block: b, point: i })
                            .or_else(|| {
                                if b == 0 {
                                    return None;
                                }
                                self.blocks[0].position(name).map(|i| PointRef { block: 0, point: i })
                            });
                        match found {
                            Some(r) => ScaleFactor::Point(r),
                            None => {
                                return Err(SunSpecError::ScaleFactorResolve {
                                    model: self.def.id,
                                    point: point.id().to_string(),
                                    sf: name.clone(),
                                })
                            }
                        }
                    }
                };
                links.push((PointRef { block: b, point: p }, link));
            }
        }

        for (at, link) in links {
            self.blocks[at.block].points[at.point].link_scale_factor(link);
        }
        Ok(())
    }

    pub fn id(&self) -> u16 {
        self.def.id
    }

    pub fn name(&self) -> &str {
        &self.def.name
    }

    pub fn def(&self) -> &Arc<ModelDef> {
        &self.def
    }

    /// Address of the first register after the model header.
    pub fn addr(&self) -> u16 {
        self.addr
    }

    /// Declared length in registers.
    pub fn len(&self) -> u16 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// 1-based index among models with the same id on the device.
    pub fn index(&self) -> u16 {
        self.index
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Number of repeating blocks.
    pub fn repeating_count(&self) -> usize {
        self.blocks.len() - 1
    }

    pub fn point(&self, id: &str, block: usize) -> Option<&Point> {
        self.blocks.get(block)?.point(id)
    }

    fn locate(&self, id: &str, block: usize) -> Result<PointRef, SunSpecError> {
        let point = self
            .blocks
            .get(block)
            .and_then(|b| b.position(id))
            .ok_or(SunSpecError::NotFound)?;
        Ok(PointRef { block, point })
    }

    fn at(&self, r: PointRef) -> &Point {
        &self.blocks[r.block].points[r.point]
    }

    fn at_mut(&mut self, r: PointRef) -> &mut Point {
        &mut self.blocks[r.block].points[r.point]
    }

    /// Exponent to apply to a point: its literal, the current value of its
    /// linked point, or 0 if there is none or the linked point is not implemented.
    pub fn effective_scale_factor(&self, point: &Point) -> i16 {
        match point.scale_factor() {
            None => 0,
            Some(ScaleFactor::Literal(v)) => v,
            Some(ScaleFactor::Point(r)) => self
                .blocks
                .get(r.block)
                .and_then(|b| b.points.get(r.point))
                .and_then(Point::as_scale_factor)
                .unwrap_or(0),
        }
    }

    /// Typed value of a point together with its effective scale factor.
    pub fn get<V: RegisterPrimitive>(&self, id: &str, block: usize) -> Result<(V, i16), SunSpecError> {
        let point = self.at(self.locate(id, block)?);
        point.check_type(V::BASE)?;
        let value = V::from_value(point.value()).ok_or(SunSpecError::TypeMismatch {
            point: point.id().to_string(),
            expected: V::BASE.name(),
            actual: point.value().base_type().name(),
        })?;
        Ok((value, self.effective_scale_factor(point)))
    }

    /// Stage a typed value for the next write.
    ///
    /// A point with a scale factor only accepts the exponent it currently
    /// uses; scale factors themselves are changed through their own point.
    /// The comparison is against the effective exponent, so while the linked
    /// point still holds its not-implemented sentinel (0x8000) the expected
    /// `sf` is 0, not the sentinel's raw value.
    pub fn set<V: RegisterPrimitive>(&mut self, id: &str, block: usize, value: V, sf: i16) -> Result<(), SunSpecError> {
        let at = self.locate(id, block)?;
        let point = self.at(at);
        point.check_type(V::BASE)?;
        if point.scale_factor().is_some() {
            let expected = self.effective_scale_factor(point);
            if expected != sf {
                return Err(SunSpecError::ScaleFactorMismatch { expected, supplied: sf });
            }
        }
        self.at_mut(at).store(value.into_value());
        Ok(())
    }

    typed_accessors! {
        get_int16, set_int16, i16;
        get_uint16, set_uint16, u16;
        get_int32, set_int32, i32;
        get_uint32, set_uint32, u32;
        get_int64, set_int64, i64;
        get_uint64, set_uint64, u64;
    }

    /// Value of a point as a float with its scale factor applied.
    pub fn get_float32(&self, id: &str, block: usize) -> Result<f32, SunSpecError> {
        let point = self.at(self.locate(id, block)?);
        let dt = point.data_type();
        if !dt.scalable {
            return Err(SunSpecError::TypeMismatch {
                point: point.id().to_string(),
                expected: BaseType::Float32.name(),
                actual: dt.base.name(),
            });
        }
        dt.to_f32(point.value(), self.effective_scale_factor(point))
            .ok_or(SunSpecError::Range)
    }

    /// Stage a float, converted with the point's current scale factor.
    pub fn set_float32(&mut self, id: &str, block: usize, value: f32) -> Result<(), SunSpecError> {
        let at = self.locate(id, block)?;
        let point = self.at(at);
        let dt = point.data_type();
        if !dt.scalable {
            return Err(SunSpecError::TypeMismatch {
                point: point.id().to_string(),
                expected: BaseType::Float32.name(),
                actual: dt.base.name(),
            });
        }
        let raw = dt
            .from_f32(value, self.effective_scale_factor(point))
            .ok_or(SunSpecError::Range)?;
        self.at_mut(at).store(raw);
        Ok(())
    }

    /// Raw bytes of a string point up to the first NUL, borrowed from the point.
    pub fn get_string_bytes(&self, id: &str, block: usize) -> Result<&[u8], SunSpecError> {
        let point = self.at(self.locate(id, block)?);
        point.check_type(BaseType::String)?;
        point.value().as_bytes().ok_or(SunSpecError::Range)
    }

    /// String contents up to the first NUL. Bytes that are not UTF-8 come
    /// back as U+FFFD; use [`Model::get_string_bytes`] for the exact bytes.
    pub fn get_string(&self, id: &str, block: usize) -> Result<Cow<'_, str>, SunSpecError> {
        self.get_string_bytes(id, block).map(String::from_utf8_lossy)
    }

    /// Stage a string; it is NUL padded to the point's length.
    pub fn set_string(&mut self, id: &str, block: usize, value: &str) -> Result<(), SunSpecError> {
        self.set_string_bytes(id, block, value.as_bytes())
    }

    /// Stage raw string bytes, NUL padded to the point's length.
    pub fn set_string_bytes(&mut self, id: &str, block: usize, value: &[u8]) -> Result<(), SunSpecError> {
        let at = self.locate(id, block)?;
        let point = self.at(at);
        point.check_type(BaseType::String)?;
        let capacity = usize::from(point.len()) * 2;
        if value.len() > capacity {
            return Err(SunSpecError::Range);
        }
        let mut bytes = value.to_vec();
        bytes.resize(capacity, 0);
        self.at_mut(at).store(Value::String(bytes));
        Ok(())
    }

    pub fn is_implemented(&self, id: &str, block: usize) -> Result<bool, SunSpecError> {
        Ok(self.at(self.locate(id, block)?).is_implemented())
    }

    /// Whether any point is waiting to be written.
    pub fn is_dirty(&self) -> bool {
        self.blocks.iter().flat_map(|b| b.points()).any(Point::is_dirty)
    }

    /// Refresh every point from the device in one transport read.
    ///
    /// On error the cached values are left untouched.
    pub async fn read<T>(&mut self, transport: &mut T, timeout: Option<Duration>) -> Result<(), SunSpecError>
    where
        T: RegisterTransport + ?Sized,
    {
        let needed = usize::from(self.len) * 2;
        if needed > SUNSPEC_MODEL_BUF_SIZE {
            return Err(SunSpecError::BufferTooSmall {
                needed,
                capacity: SUNSPEC_MODEL_BUF_SIZE,
            });
        }

        let buf = transport.read_registers(self.addr, self.len, timeout).await?;
        if buf.len() < needed {
            return Err(SunSpecError::ModbusResponseMismatch);
        }
        debug!("Read model {} ({} registers at {})", self.def.id, self.len, self.addr);

        let mut offset = 0usize;
        for block in &mut self.blocks {
            let end = (offset + usize::from(block.len()) * 2).min(buf.len());
            block.decode(&buf[offset.min(end)..end]);
            offset = end;
        }
        Ok(())
    }

    /// Write every dirty point, one transaction per contiguous run.
    ///
    /// The first failing write aborts the rest; points not yet written
    /// lose their dirty flag and their staged value is not sent.
    pub async fn write<T>(&mut self, transport: &mut T, timeout: Option<Duration>) -> Result<(), SunSpecError>
    where
        T: RegisterTransport + ?Sized,
    {
        let mut result = Ok(());
        for block in &mut self.blocks {
            if result.is_err() {
                block.clear_dirty();
                continue;
            }
            for run in block.take_dirty_runs() {
                debug!("Write {} registers at {}", run.registers(), run.addr);
                if let Err(e) = transport.write_registers(run.addr, &run.data, timeout).await {
                    warn!("Write to model {} at {} failed: {}", self.def.id, run.addr, e);
                    result = Err(e);
                    break;
                }
            }
        }
        result
    }

    /// Compare values with another instance of the same model.
    pub fn values_eq(&self, other: &Model) -> bool {
        self.def.id == other.def.id
            && self.blocks.len() == other.blocks.len()
            && self.blocks.iter().zip(&other.blocks).all(|(a, b)| a.values_eq(b))
    }

    /// Kind of the block at `index`.
    pub fn block_kind(&self, index: usize) -> Option<BlockKind> {
        self.blocks.get(index).map(Block::kind)
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "model {} ({}) index {} addr {} len {}",
            self.def.id, self.def.name, self.index, self.addr, self.len
        )?;
        for block in &self.blocks {
            writeln!(f, "  block {} addr {} len {}", block.index(), block.addr(), block.len())?;
            for point in block.points() {
                let sf = self.effective_scale_factor(point);
                writeln!(
                    f,
                    "    {:<16} {:>5}: {}",
                    point.id(),
                    point.addr(),
                    point.format_value(sf)
                )?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::schema::parse_model_defs;

    const CURVES: &str = r#"{
        "id": 700, "len": 3, "name": "curves",
        "blocks": [
            {"type": "fixed", "len": 3, "points": [
                {"id": "NCrv", "offset": 0, "type": "uint16"},
                {"id": "V_SF", "offset": 1, "type": "sunssf"},
                {"id": "Lit", "offset": 2, "type": "int16", "sf": -1}
            ]},
            {"type": "repeating", "len": 3, "points": [
                {"id": "V", "offset": 0, "type": "uint16", "sf": "V_SF"},
                {"id": "Y", "offset": 1, "type": "int16", "sf": "Y_SF"},
                {"id": "Y_SF", "offset": 2, "type": "sunssf"}
            ]}
        ]
    }"#;

    fn def() -> Arc<ModelDef> {
        Arc::new(parse_model_defs(CURVES).unwrap().remove(0))
    }

    #[test]
    fn test_repeating_block_count_and_addresses() {
        let model = Model::new(def(), 1000, 9, 1).unwrap();
        assert_eq!(model.repeating_count(), 2);
        assert_eq!(model.blocks()[1].addr(), 1003);
        assert_eq!(model.blocks()[2].addr(), 1006);
        assert_eq!(model.point("V", 2).unwrap().addr(), 1006);
    }

    #[test]
    fn test_uneven_length_is_invalid() {
        let err = Model::new(def(), 1000, 8, 1).unwrap_err();
        assert_eq!(err, SunSpecError::ModelLenInvalid { id: 700, len: 8 });
        assert!(Model::new(def(), 1000, 2, 1).is_err());
    }

    #[test]
    fn test_scale_factor_links() {
        let model = Model::new(def(), 0, 9, 1).unwrap();
        assert_eq!(
            model.point("V", 1).unwrap().scale_factor(),
            Some(ScaleFactor::Point(PointRef { block: 0, point: 1 }))
        );
        assert_eq!(
            model.point("Y", 2).unwrap().scale_factor(),
            Some(ScaleFactor::Point(PointRef { block: 2, point: 2 }))
        );
        assert_eq!(
            model.point("Lit", 0).unwrap().scale_factor(),
            Some(ScaleFactor::Literal(-1))
        );
    }

    #[test]
    fn test_unimplemented_scale_factor_reads_as_zero() {
        let model = Model::new(def(), 0, 6, 1).unwrap();
        let (_, sf) = model.get_uint16("V", 1).unwrap();
        assert_eq!(sf, 0);
    }

    #[test]
    fn test_setter_checks_scale_factor() {
        let mut model = Model::new(def(), 0, 6, 1).unwrap();
        model.set_int16("V_SF", 0, -2, 0).unwrap();
        assert_eq!(model.get_uint16("V", 1).unwrap().1, -2);

        assert_eq!(
            model.set_uint16("V", 1, 2300, 0).unwrap_err(),
            SunSpecError::ScaleFactorMismatch { expected: -2, supplied: 0 }
        );
        model.set_uint16("V", 1, 2300, -2).unwrap();
        assert_eq!(model.get_float32("V", 1).unwrap(), 23.0);
    }

    #[test]
    fn test_literal_scale_factor() {
        let mut model = Model::new(def(), 0, 3, 1).unwrap();
        model.set_float32("Lit", 0, -1.5).unwrap();
        assert_eq!(model.get_int16("Lit", 0).unwrap(), (-15, -1));
    }

    #[test]
    fn test_lookup_errors() {
        let mut model = Model::new(def(), 0, 3, 1).unwrap();
        assert_eq!(model.get_uint16("V", 1).unwrap_err(), SunSpecError::NotFound);
        assert_eq!(model.get_uint16("Nope", 0).unwrap_err(), SunSpecError::NotFound);
        assert!(matches!(
            model.get_int32("NCrv", 0),
            Err(SunSpecError::TypeMismatch { .. })
        ));
        assert!(matches!(
            model.set_string("NCrv", 0, "x"),
            Err(SunSpecError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_setters_mark_dirty() {
        let mut model = Model::new(def(), 0, 3, 1).unwrap();
        assert!(!model.is_dirty());
        model.set_uint16("NCrv", 0, 1, 0).unwrap();
        assert!(model.is_dirty());
        assert!(model.point("NCrv", 0).unwrap().is_dirty());
    }
}
