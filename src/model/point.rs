use std::fmt;
use std::sync::Arc;

use crate::error::SunSpecError;
use crate::model::data_type::DataType;
use crate::model::schema::{Access, PointDef};
use crate::model::value::{BaseType, Value};

/// Position of a point inside a model: block index and point index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PointRef {
    pub block: usize,
    pub point: usize,
}

/// Resolved scale factor of a point instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleFactor {
    Literal(i16),
    /// Another point of the same model holds the exponent.
    Point(PointRef),
}

/// Runtime value cell for one point of a block.
#[derive(Debug, Clone)]
pub struct Point {
    def: Arc<PointDef>,
    addr: u16,
    value: Value,
    dirty: bool,
    sf: Option<ScaleFactor>,
}

impl Point {
    pub(crate) fn new(def: Arc<PointDef>, block_addr: u16) -> Result<Point, SunSpecError> {
        let addr = block_addr.checked_add(def.offset).ok_or(SunSpecError::Range)?;
        let value = def.data_type.unimplemented_value(def.len);
        Ok(Point {
            def,
            addr,
            value,
            dirty: false,
            sf: None,
        })
    }

    pub fn id(&self) -> &str {
        &self.def.id
    }

    pub fn def(&self) -> &PointDef {
        &self.def
    }

    pub fn data_type(&self) -> &'static DataType {
        self.def.data_type
    }

    /// Absolute register address.
    pub fn addr(&self) -> u16 {
        self.addr
    }

    /// Length in registers.
    pub fn len(&self) -> u16 {
        self.def.len
    }

    pub fn is_empty(&self) -> bool {
        self.def.len == 0
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn is_writable(&self) -> bool {
        self.def.access == Access::ReadWrite
    }

    pub fn scale_factor(&self) -> Option<ScaleFactor> {
        self.sf
    }

    pub fn is_implemented(&self) -> bool {
        self.def.data_type.is_implemented(&self.value)
    }

    /// The value as a scale-factor exponent, if this point can serve as one.
    pub(crate) fn as_scale_factor(&self) -> Option<i16> {
        match self.value {
            Value::Int16(v) if self.is_implemented() => Some(v),
            _ => None,
        }
    }

    pub(crate) fn link_scale_factor(&mut self, sf: ScaleFactor) {
        self.sf = Some(sf);
    }

    pub(crate) fn check_type(&self, expected: BaseType) -> Result<(), SunSpecError> {
        let actual = self.def.data_type.base;
        if actual != expected {
            return Err(SunSpecError::TypeMismatch {
                point: self.def.id.clone(),
                expected: expected.name(),
                actual: actual.name(),
            });
        }
        Ok(())
    }

    /// Store a new value and mark the point for the next write.
    pub(crate) fn store(&mut self, value: Value) {
        self.value = value;
        self.dirty = true;
    }

    /// Update from register bytes starting at the point's offset.
    ///
    /// A buffer too short for the point leaves the cached value as is.
    pub(crate) fn decode(&mut self, buf: &[u8]) {
        if let Some(value) = self.def.data_type.decode(buf, self.def.len) {
            self.value = value;
        }
        self.dirty = false;
    }

    pub(crate) fn clear_dirty(&mut self) {
        self.dirty = false;
    }

    /// Compare values with another instance of the same point.
    pub fn value_eq(&self, other: &Point) -> bool {
        self.def.id == other.def.id && self.value == other.value
    }
}

impl Point {
    /// Rendering of the value with `sf` applied, followed by its units.
    pub fn format_value(&self, sf: i16) -> String {
        if !self.is_implemented() {
            return "<not implemented>".to_string();
        }
        let text = self.def.data_type.format(&self.value, sf);
        match &self.def.units {
            Some(units) => format!("{text} {units}"),
            None => text,
        }
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Without the owning model only literal scale factors are known.
        let sf = match self.sf {
            Some(ScaleFactor::Literal(v)) => v,
            _ => 0,
        };
        write!(f, "{:<16} {:>5}: {}", self.def.id, self.addr, self.format_value(sf))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::data_type::find_data_type;

    fn point_def(id: &str, offset: u16, type_name: &str, len: u16) -> Arc<PointDef> {
        let data_type = find_data_type(type_name).unwrap();
        Arc::new(PointDef {
            id: id.to_string(),
            offset,
            data_type,
            len: if data_type.len == 0 { len } else { data_type.len },
            sf: None,
            units: None,
            access: Access::ReadWrite,
            mandatory: false,
        })
    }

    #[test]
    fn test_new_point_is_unimplemented() {
        let p = Point::new(point_def("W", 3, "int16", 0), 40000).unwrap();
        assert_eq!(p.addr(), 40003);
        assert!(!p.is_implemented());
        assert!(!p.is_dirty());
    }

    #[test]
    fn test_address_overflow() {
        assert_eq!(
            Point::new(point_def("W", 3, "int16", 0), u16::MAX).unwrap_err(),
            SunSpecError::Range
        );
    }

    #[test]
    fn test_decode_clears_dirty_and_keeps_value_on_short_buffer() {
        let mut p = Point::new(point_def("WH", 0, "acc32", 0), 0).unwrap();
        p.store(Value::Uint32(7));
        assert!(p.is_dirty());

        p.decode(&[0x00, 0x01]);
        assert!(!p.is_dirty());
        assert_eq!(p.value(), &Value::Uint32(7));

        p.decode(&[0x00, 0x01, 0x00, 0x02]);
        assert_eq!(p.value(), &Value::Uint32(0x0001_0002));
    }

    #[test]
    fn test_type_check() {
        let p = Point::new(point_def("St", 0, "enum16", 0), 0).unwrap();
        assert!(p.check_type(BaseType::Uint16).is_ok());
        let err = p.check_type(BaseType::Int16).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Type mismatch for point St: expected int16, found uint16"
        );
    }

    #[test]
    fn test_display() {
        let mut p = Point::new(point_def("Mn", 0, "string", 4), 40004).unwrap();
        assert!(p.to_string().ends_with("<not implemented>"));
        p.decode(b"Acme\0\0\0\0");
        assert_eq!(p.to_string(), "Mn               40004: Acme");
    }
}
