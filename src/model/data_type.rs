//! # Data Type Catalog
//!
//! Static table of the primitive SunSpec wire types. Each entry names its
//! base representation, its register length and the bit pattern a device uses
//! to say "not implemented".
//!
//! ## Usage
//!
//! ```rust
//! use sunspec_rs::model::data_type::find_data_type;
//! use sunspec_rs::model::value::Value;
//!
//! let dt = find_data_type("uint16").unwrap();
//! assert!(!dt.is_implemented(&Value::Uint16(0xFFFF)));
//! assert!(dt.is_implemented(&Value::Uint16(230)));
//! ```

use std::net::{Ipv4Addr, Ipv6Addr};

use crate::model::value::{format_scaled_integer, BaseType, Value};

/// The individual wire types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Int16,
    Uint16,
    Acc16,
    Int32,
    Uint32,
    Acc32,
    Int64,
    Uint64,
    Acc64,
    Float32,
    String,
    ScaleFactor,
    Enum16,
    Enum32,
    Bitfield16,
    Bitfield32,
    Pad,
    IpAddr,
    Ipv6Addr,
}

/// How a type marks a value as not implemented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sentinel {
    /// Every value is implemented (accumulators, pad).
    None,
    /// Not implemented when the raw bits equal this pattern.
    Bits(u64),
    /// Not implemented when every byte is zero.
    Zeroed,
}

/// Descriptor of one wire type.
#[derive(Debug, PartialEq, Eq)]
pub struct DataType {
    pub name: &'static str,
    pub kind: TypeKind,
    pub base: BaseType,
    /// Length in registers; 0 for variable-length strings.
    pub len: u16,
    pub sentinel: Sentinel,
    /// Whether float conversion with a scale factor is meaningful.
    pub scalable: bool,
}

macro_rules! data_type {
    ($name:expr, $kind:ident, $base:ident, $len:expr, $sentinel:expr, $scalable:expr) => {
        DataType {
            name: $name,
            kind: TypeKind::$kind,
            base: BaseType::$base,
            len: $len,
            sentinel: $sentinel,
            scalable: $scalable,
        }
    };
}

/// The catalog, looked up by name.
pub static DATA_TYPES: &[DataType] = &[
    data_type!("int16", Int16, Int16, 1, Sentinel::Bits(0x8000), true),
    data_type!("uint16", Uint16, Uint16, 1, Sentinel::Bits(0xFFFF), true),
    data_type!("acc16", Acc16, Uint16, 1, Sentinel::None, true),
    data_type!("int32", Int32, Int32, 2, Sentinel::Bits(0x8000_0000), true),
    data_type!("uint32", Uint32, Uint32, 2, Sentinel::Bits(0xFFFF_FFFF), true),
    data_type!("acc32", Acc32, Uint32, 2, Sentinel::None, true),
    data_type!("int64", Int64, Int64, 4, Sentinel::Bits(0x8000_0000_0000_0000), true),
    data_type!("uint64", Uint64, Uint64, 4, Sentinel::Bits(u64::MAX), true),
    data_type!("acc64", Acc64, Uint64, 4, Sentinel::None, true),
    data_type!("float32", Float32, Float32, 2, Sentinel::Bits(0x7fc0_0000), true),
    data_type!("string", String, String, 0, Sentinel::Zeroed, false),
    data_type!("sunssf", ScaleFactor, Int16, 1, Sentinel::Bits(0x8000), true),
    data_type!("enum16", Enum16, Uint16, 1, Sentinel::Bits(0xFFFF), true),
    data_type!("enum32", Enum32, Uint32, 2, Sentinel::Bits(0xFFFF_FFFF), true),
    data_type!("bitfield16", Bitfield16, Uint16, 1, Sentinel::Bits(0xFFFF), true),
    data_type!("bitfield32", Bitfield32, Uint32, 2, Sentinel::Bits(0xFFFF_FFFF), true),
    data_type!("pad", Pad, Uint16, 1, Sentinel::None, false),
    data_type!("ipaddr", IpAddr, Uint32, 2, Sentinel::Bits(0), true),
    data_type!("ipv6addr", Ipv6Addr, String, 8, Sentinel::Zeroed, false),
];

/// Look up a data type by its schema name.
pub fn find_data_type(name: &str) -> Option<&'static DataType> {
    DATA_TYPES.iter().find(|dt| dt.name == name)
}

impl DataType {
    /// Whether `value` carries real data rather than the type's sentinel.
    pub fn is_implemented(&self, value: &Value) -> bool {
        match self.sentinel {
            Sentinel::None => true,
            Sentinel::Bits(pattern) => value.raw_bits() != Some(pattern),
            Sentinel::Zeroed => match value {
                Value::String(bytes) => bytes.iter().any(|&b| b != 0),
                other => other.raw_bits() != Some(0),
            },
        }
    }

    /// The value a point of this type holds before its first read.
    pub fn unimplemented_value(&self, len: u16) -> Value {
        match self.sentinel {
            Sentinel::Bits(pattern) => match self.base {
                BaseType::Int16 => Value::Int16(pattern as u16 as i16),
                BaseType::Uint16 => Value::Uint16(pattern as u16),
                BaseType::Int32 => Value::Int32(pattern as u32 as i32),
                BaseType::Uint32 => Value::Uint32(pattern as u32),
                BaseType::Int64 => Value::Int64(pattern as i64),
                BaseType::Uint64 => Value::Uint64(pattern),
                BaseType::Float32 => Value::Float32(f32::from_bits(pattern as u32)),
                BaseType::String => Value::zero(self.base, len),
            },
            Sentinel::None | Sentinel::Zeroed => Value::zero(self.base, len),
        }
    }

    /// Decode a value of this type from register bytes.
    pub fn decode(&self, buf: &[u8], len: u16) -> Option<Value> {
        Value::decode(self.base, buf, len)
    }

    /// Convert to float applying `sf`; `None` for types without a numeric meaning.
    pub fn to_f32(&self, value: &Value, sf: i16) -> Option<f32> {
        if !self.scalable {
            return None;
        }
        value.to_scaled_f32(sf)
    }

    /// Convert a float back to this type applying `sf`.
    pub fn from_f32(&self, f: f32, sf: i16) -> Option<Value> {
        if !self.scalable {
            return None;
        }
        Value::from_scaled_f32(self.base, f, sf)
    }

    /// Human readable rendering of `value` with `sf` applied.
    pub fn format(&self, value: &Value, sf: i16) -> String {
        match (self.kind, value) {
            (TypeKind::IpAddr, Value::Uint32(v)) => Ipv4Addr::from(*v).to_string(),
            (TypeKind::Ipv6Addr, Value::String(bytes)) => match <[u8; 16]>::try_from(&bytes[..]) {
                Ok(octets) => Ipv6Addr::from(octets).to_string(),
                Err(_) => crate::util::hex::encode_hex(bytes),
            },
            (TypeKind::Enum16 | TypeKind::Enum32 | TypeKind::Bitfield16 | TypeKind::Bitfield32, v) => {
                format!("0x{:X}", v.raw_bits().unwrap_or(0))
            }
            (_, Value::String(_)) => value.as_str().unwrap_or_default().into_owned(),
            (_, Value::Float32(v)) => format!("{v}"),
            (_, Value::Int16(v)) => format_scaled_integer(i128::from(*v), sf),
            (_, Value::Uint16(v)) => format_scaled_integer(i128::from(*v), sf),
            (_, Value::Int32(v)) => format_scaled_integer(i128::from(*v), sf),
            (_, Value::Uint32(v)) => format_scaled_integer(i128::from(*v), sf),
            (_, Value::Int64(v)) => format_scaled_integer(i128::from(*v), sf),
            (_, Value::Uint64(v)) => format_scaled_integer(i128::from(*v), sf),
        }
    }
}
