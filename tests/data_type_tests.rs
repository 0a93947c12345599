//! Tests for the data type catalog and its not-implemented sentinels.

use proptest::prelude::*;
use sunspec_rs::model::{find_data_type, BaseType, TypeKind, Value};

/// Tests that every catalog entry is found under its own name.
#[test]
fn test_catalog_lookup() {
    for name in [
        "int16", "uint16", "acc16", "int32", "uint32", "acc32", "int64", "uint64", "acc64",
        "float32", "string", "sunssf", "enum16", "enum32", "bitfield16", "bitfield32", "pad",
        "ipaddr", "ipv6addr",
    ] {
        let dt = find_data_type(name).unwrap_or_else(|| panic!("missing {name}"));
        assert_eq!(dt.name, name);
    }
}

/// Tests register lengths of the fixed-size types.
#[test]
fn test_register_lengths() {
    let len = |name| find_data_type(name).unwrap().len;
    assert_eq!(len("int16"), 1);
    assert_eq!(len("acc32"), 2);
    assert_eq!(len("uint64"), 4);
    assert_eq!(len("float32"), 2);
    assert_eq!(len("ipv6addr"), 8);
}

/// Tests the sentinel value of each integer family.
#[test]
fn test_integer_sentinels() {
    let check = |name: &str, sentinel: Value, real: Value| {
        let dt = find_data_type(name).unwrap();
        assert!(!dt.is_implemented(&sentinel), "{name} sentinel");
        assert!(dt.is_implemented(&real), "{name} real value");
    };
    check("int16", Value::Int16(i16::MIN), Value::Int16(0));
    check("uint16", Value::Uint16(0xFFFF), Value::Uint16(0));
    check("int32", Value::Int32(i32::MIN), Value::Int32(-1));
    check("uint32", Value::Uint32(u32::MAX), Value::Uint32(0));
    check("int64", Value::Int64(i64::MIN), Value::Int64(1));
    check("uint64", Value::Uint64(u64::MAX), Value::Uint64(0));
    check("sunssf", Value::Int16(i16::MIN), Value::Int16(-2));
    check("enum16", Value::Uint16(0xFFFF), Value::Uint16(3));
    check("bitfield32", Value::Uint32(u32::MAX), Value::Uint32(0));
    check("ipaddr", Value::Uint32(0), Value::Uint32(0xC0A8_0001));
}

/// Tests that the float sentinel is the quiet NaN bit pattern only.
#[test]
fn test_float_sentinel() {
    let dt = find_data_type("float32").unwrap();
    assert!(!dt.is_implemented(&Value::Float32(f32::from_bits(0x7fc0_0000))));
    assert!(dt.is_implemented(&Value::Float32(0.0)));
    assert!(dt.is_implemented(&Value::Float32(-1.5)));
}

/// Tests that accumulators and pads are always implemented.
#[test]
fn test_types_without_sentinel() {
    for name in ["acc16", "acc32", "acc64", "pad"] {
        let dt = find_data_type(name).unwrap();
        let value = dt.unimplemented_value(dt.len);
        assert!(dt.is_implemented(&value), "{name}");
    }
}

/// Tests that a string is implemented as soon as any byte is non-zero.
#[test]
fn test_string_sentinel() {
    let dt = find_data_type("string").unwrap();
    assert!(!dt.is_implemented(&Value::String(vec![0; 8])));
    assert!(dt.is_implemented(&Value::String(vec![0, 0, 0, b'x', 0, 0, 0, 0])));
}

/// Tests that the initial value of a point is the type's sentinel.
#[test]
fn test_unimplemented_value_matches_sentinel() {
    let dt = find_data_type("int32").unwrap();
    let value = dt.unimplemented_value(2);
    assert_eq!(value, Value::Int32(i32::MIN));
    assert_eq!(value.base_type(), BaseType::Int32);
    assert!(!dt.is_implemented(&value));
}

/// Tests that enum and bitfield types share their base type with the integers.
#[test]
fn test_kinds_map_to_base_types() {
    let enum32 = find_data_type("enum32").unwrap();
    assert_eq!(enum32.kind, TypeKind::Enum32);
    assert_eq!(enum32.base, BaseType::Uint32);
    assert_eq!(find_data_type("sunssf").unwrap().base, BaseType::Int16);
}

proptest! {
    /// Tests that every uint16 except 0xFFFF is implemented.
    #[test]
    fn prop_uint16_sentinel(v in any::<u16>()) {
        let dt = find_data_type("uint16").unwrap();
        prop_assert_eq!(dt.is_implemented(&Value::Uint16(v)), v != 0xFFFF);
    }

    /// Tests that every int16 except 0x8000 is implemented.
    #[test]
    fn prop_int16_sentinel(v in any::<i16>()) {
        let dt = find_data_type("int16").unwrap();
        prop_assert_eq!(dt.is_implemented(&Value::Int16(v)), v != i16::MIN);
    }
}
