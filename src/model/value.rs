//! # Point Values
//!
//! A point stores its value as a `Value`, an explicit sum over the primitive
//! kinds SunSpec registers can carry. The active kind is always visible, so
//! decoding, scale-factor arithmetic and formatting never reinterpret raw bits
//! behind the caller's back.

use std::borrow::Cow;
use std::fmt;

use crate::constants::SUNSPEC_MAX_SCALE_FACTOR;

/// Powers of ten for scale factors `0..=10`.
const POW10: [f64; 11] = [
    1.0,
    10.0,
    100.0,
    1_000.0,
    10_000.0,
    100_000.0,
    1_000_000.0,
    10_000_000.0,
    100_000_000.0,
    1_000_000_000.0,
    10_000_000_000.0,
];

/// The primitive representation behind a data type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BaseType {
    Int16,
    Uint16,
    Int32,
    Uint32,
    Int64,
    Uint64,
    Float32,
    String,
}

impl BaseType {
    /// Name used in error messages.
    pub fn name(&self) -> &'static str {
        match self {
            BaseType::Int16 => "int16",
            BaseType::Uint16 => "uint16",
            BaseType::Int32 => "int32",
            BaseType::Uint32 => "uint32",
            BaseType::Int64 => "int64",
            BaseType::Uint64 => "uint64",
            BaseType::Float32 => "float32",
            BaseType::String => "string",
        }
    }
}

impl fmt::Display for BaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Live value of a point.
///
/// Strings hold the full zero-padded register contents (two bytes per
/// register), so their length never changes after instantiation.
#[derive(Debug, Clone)]
pub enum Value {
    Int16(i16),
    Uint16(u16),
    Int32(i32),
    Uint32(u32),
    Int64(i64),
    Uint64(u64),
    Float32(f32),
    String(Vec<u8>),
}

impl Value {
    /// Zero value of the given base type; strings get `len` registers of NUL.
    pub fn zero(base: BaseType, len: u16) -> Value {
        match base {
            BaseType::Int16 => Value::Int16(0),
            BaseType::Uint16 => Value::Uint16(0),
            BaseType::Int32 => Value::Int32(0),
            BaseType::Uint32 => Value::Uint32(0),
            BaseType::Int64 => Value::Int64(0),
            BaseType::Uint64 => Value::Uint64(0),
            BaseType::Float32 => Value::Float32(0.0),
            BaseType::String => Value::String(vec![0; usize::from(len) * 2]),
        }
    }

    pub fn base_type(&self) -> BaseType {
        match self {
            Value::Int16(_) => BaseType::Int16,
            Value::Uint16(_) => BaseType::Uint16,
            Value::Int32(_) => BaseType::Int32,
            Value::Uint32(_) => BaseType::Uint32,
            Value::Int64(_) => BaseType::Int64,
            Value::Uint64(_) => BaseType::Uint64,
            Value::Float32(_) => BaseType::Float32,
            Value::String(_) => BaseType::String,
        }
    }

    /// Raw bit pattern of a numeric value, zero-extended to 64 bits.
    pub fn raw_bits(&self) -> Option<u64> {
        match *self {
            Value::Int16(v) => Some(u64::from(v as u16)),
            Value::Uint16(v) => Some(u64::from(v)),
            Value::Int32(v) => Some(u64::from(v as u32)),
            Value::Uint32(v) => Some(u64::from(v)),
            Value::Int64(v) => Some(v as u64),
            Value::Uint64(v) => Some(v),
            Value::Float32(v) => Some(u64::from(v.to_bits())),
            Value::String(_) => None,
        }
    }

    /// Decode a value of `base` from big-endian register bytes.
    ///
    /// Returns `None` if `buf` is shorter than the value.
    pub fn decode(base: BaseType, buf: &[u8], len: u16) -> Option<Value> {
        fn take<const N: usize>(buf: &[u8]) -> Option<[u8; N]> {
            buf.get(..N)?.try_into().ok()
        }

        let value = match base {
            BaseType::Int16 => Value::Int16(i16::from_be_bytes(take(buf)?)),
            BaseType::Uint16 => Value::Uint16(u16::from_be_bytes(take(buf)?)),
            BaseType::Int32 => Value::Int32(i32::from_be_bytes(take(buf)?)),
            BaseType::Uint32 => Value::Uint32(u32::from_be_bytes(take(buf)?)),
            BaseType::Int64 => Value::Int64(i64::from_be_bytes(take(buf)?)),
            BaseType::Uint64 => Value::Uint64(u64::from_be_bytes(take(buf)?)),
            BaseType::Float32 => Value::Float32(f32::from_bits(u32::from_be_bytes(take(buf)?))),
            BaseType::String => Value::String(buf.get(..usize::from(len) * 2)?.to_vec()),
        };
        Some(value)
    }

    /// Append the big-endian register bytes of the value to `out`.
    pub fn encode(&self, out: &mut Vec<u8>) {
        match self {
            Value::Int16(v) => out.extend_from_slice(&v.to_be_bytes()),
            Value::Uint16(v) => out.extend_from_slice(&v.to_be_bytes()),
            Value::Int32(v) => out.extend_from_slice(&v.to_be_bytes()),
            Value::Uint32(v) => out.extend_from_slice(&v.to_be_bytes()),
            Value::Int64(v) => out.extend_from_slice(&v.to_be_bytes()),
            Value::Uint64(v) => out.extend_from_slice(&v.to_be_bytes()),
            Value::Float32(v) => out.extend_from_slice(&v.to_bits().to_be_bytes()),
            Value::String(bytes) => out.extend_from_slice(bytes),
        }
    }

    /// Apply a decimal scale factor: `value * 10^sf`.
    ///
    /// Floats are returned unchanged. Strings have no numeric meaning and
    /// yield `None`, as does a scale factor beyond +/-10.
    pub fn to_scaled_f32(&self, sf: i16) -> Option<f32> {
        let raw = match *self {
            Value::Float32(v) => return Some(v),
            Value::String(_) => return None,
            Value::Int16(v) => f64::from(v),
            Value::Uint16(v) => f64::from(v),
            Value::Int32(v) => f64::from(v),
            Value::Uint32(v) => f64::from(v),
            Value::Int64(v) => v as f64,
            Value::Uint64(v) => v as f64,
        };
        let factor = pow10(sf)?;
        let scaled = if sf < 0 { raw / factor } else { raw * factor };
        Some(scaled as f32)
    }

    /// Inverse of [`Value::to_scaled_f32`]: build a value of `base` holding
    /// `f / 10^sf`, rounded to the nearest integer and saturated to the type.
    ///
    /// NaN and infinities have no register form and yield `None`.
    pub fn from_scaled_f32(base: BaseType, f: f32, sf: i16) -> Option<Value> {
        if !f.is_finite() {
            return None;
        }
        if base == BaseType::Float32 {
            return Some(Value::Float32(f));
        }
        let factor = pow10(sf)?;
        let raw = f64::from(f);
        let native = (if sf < 0 { raw * factor } else { raw / factor }).round();

        let value = match base {
            BaseType::Int16 => Value::Int16(native as i16),
            BaseType::Uint16 => Value::Uint16(native as u16),
            BaseType::Int32 => Value::Int32(native as i32),
            BaseType::Uint32 => Value::Uint32(native as u32),
            BaseType::Int64 => Value::Int64(native as i64),
            BaseType::Uint64 => Value::Uint64(native as u64),
            BaseType::Float32 | BaseType::String => return None,
        };
        Some(value)
    }

    /// Raw string bytes up to the first NUL, if this is a string value.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::String(bytes) => {
                let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
                Some(&bytes[..end])
            }
            _ => None,
        }
    }

    /// String contents up to the first NUL. Devices are free to put any byte
    /// in a string register, so invalid UTF-8 is replaced rather than refused.
    pub fn as_str(&self) -> Option<Cow<'_, str>> {
        self.as_bytes().map(String::from_utf8_lossy)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::String(a), Value::String(b)) => a == b,
            (a, b) => a.base_type() == b.base_type() && a.raw_bits() == b.raw_bits(),
        }
    }
}

/// Rust primitives that map onto a `Value` variant.
pub trait RegisterPrimitive: Sized + Copy {
    const BASE: BaseType;

    fn from_value(value: &Value) -> Option<Self>;

    fn into_value(self) -> Value;
}

macro_rules! register_primitive {
    ($t:ty, $variant:ident) => {
        impl RegisterPrimitive for $t {
            const BASE: BaseType = BaseType::$variant;

            fn from_value(value: &Value) -> Option<Self> {
                match value {
                    Value::$variant(v) => Some(*v),
                    _ => None,
                }
            }

            fn into_value(self) -> Value {
                Value::$variant(self)
            }
        }
    };
}

register_primitive!(i16, Int16);
register_primitive!(u16, Uint16);
register_primitive!(i32, Int32);
register_primitive!(u32, Uint32);
register_primitive!(i64, Int64);
register_primitive!(u64, Uint64);
register_primitive!(f32, Float32);

/// `10^|sf|`, or `None` when the magnitude exceeds the supported table.
pub fn pow10(sf: i16) -> Option<f64> {
    if sf.unsigned_abs() > SUNSPEC_MAX_SCALE_FACTOR.unsigned_abs() {
        return None;
    }
    POW10.get(usize::from(sf.unsigned_abs())).copied()
}

/// Render an integer with a decimal scale factor without going through floats.
///
/// A negative sf places a decimal point `|sf|` digits from the right, a
/// positive sf appends zeros.
pub fn format_scaled_integer(value: i128, sf: i16) -> String {
    if sf == 0 {
        return value.to_string();
    }
    if sf > 0 {
        return format!("{}{}", value, "0".repeat(usize::from(sf.unsigned_abs())));
    }

    let digits = usize::from(sf.unsigned_abs());
    let sign = if value < 0 { "-" } else { "" };
    let magnitude = value.unsigned_abs().to_string();
    let padded = format!("{:0>width$}", magnitude, width = digits + 1);
    let split = padded.len() - digits;
    format!("{}{}.{}", sign, &padded[..split], &padded[split..])
}
