//! Tests for moving model values to and from a register transport.

mod support;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use support::string_regs;
use sunspec_rs::error::SunSpecError;
use sunspec_rs::model::{parse_model_defs, ModelDef};
use sunspec_rs::transport::sim::SimRequest;
use sunspec_rs::{Model, RegisterTransport, SchemaRegistry, SimTransport};

const BASE: u16 = 100;

const SETTINGS: &str = r#"{
    "id": 860, "len": 8, "name": "settings",
    "blocks": [
        { "type": "fixed", "len": 8, "points": [
            { "id": "P0", "offset": 0, "type": "uint16", "access": "rw" },
            { "id": "P1", "offset": 1, "type": "uint16", "access": "rw" },
            { "id": "P2", "offset": 2, "type": "uint16", "access": "rw" },
            { "id": "P3", "offset": 3, "type": "uint16", "access": "rw" },
            { "id": "Total", "offset": 4, "type": "uint32", "access": "rw" },
            { "id": "Label", "offset": 6, "type": "string", "len": 2, "access": "rw" }
        ]}
    ]
}"#;

const LONG_TEXT: &str = r#"{
    "id": 861, "len": 130, "name": "long_text",
    "blocks": [
        { "type": "fixed", "len": 130, "points": [
            { "id": "A", "offset": 0, "type": "string", "len": 100, "access": "rw" },
            { "id": "B", "offset": 100, "type": "string", "len": 30, "access": "rw" }
        ]}
    ]
}"#;

fn def(text: &str) -> Arc<ModelDef> {
    Arc::new(parse_model_defs(text).unwrap().remove(0))
}

fn settings() -> Model {
    Model::new(def(SETTINGS), BASE, 8, 1).unwrap()
}

/// Simulator whose reads or writes can be made to fail.
struct Faulty {
    inner: SimTransport,
    fail_reads: bool,
    fail_writes: bool,
}

#[async_trait]
impl RegisterTransport for Faulty {
    async fn read_registers(
        &mut self,
        addr: u16,
        count: u16,
        timeout: Option<Duration>,
    ) -> Result<Vec<u8>, SunSpecError> {
        if self.fail_reads {
            return Err(SunSpecError::Timeout);
        }
        self.inner.read_registers(addr, count, timeout).await
    }

    async fn write_registers(
        &mut self,
        addr: u16,
        data: &[u8],
        timeout: Option<Duration>,
    ) -> Result<(), SunSpecError> {
        if self.fail_writes {
            return Err(SunSpecError::ModbusException(4));
        }
        self.inner.write_registers(addr, data, timeout).await
    }
}

/// Tests that a read decodes every point at its offset.
#[tokio::test]
async fn test_read_decodes_points() {
    let mut regs = vec![1, 2, 3, 4, 0x0001, 0x0002];
    regs.extend(string_regs("ok", 2));
    let mut sim = SimTransport::with_registers(BASE, regs);
    let mut model = settings();

    model.read(&mut sim, None).await.unwrap();
    assert_eq!(model.get_uint16("P3", 0).unwrap(), (4, 0));
    assert_eq!(model.get_uint32("Total", 0).unwrap(), (0x0001_0002, 0));
    assert_eq!(model.get_string("Label", 0).unwrap(), "ok");
    assert_eq!(sim.journal(), &[SimRequest::Read { addr: BASE, count: 8 }]);
}

/// Tests that a string register holding a non-UTF-8 byte stays readable.
#[tokio::test]
async fn test_read_non_utf8_string() {
    let mut sim = SimTransport::with_registers(BASE, vec![0, 0, 0, 0, 0, 0, 0x3235, 0xB043]);
    let mut model = settings();

    model.read(&mut sim, None).await.unwrap();
    assert!(model.is_implemented("Label", 0).unwrap());
    assert_eq!(model.get_string_bytes("Label", 0).unwrap(), &[b'2', b'5', 0xB0, b'C']);
    assert_eq!(model.get_string("Label", 0).unwrap(), "25\u{FFFD}C");

    let label = model.point("Label", 0).unwrap();
    assert!(label.format_value(0).starts_with("25\u{FFFD}C"));
    assert!(model.to_string().contains("25\u{FFFD}C"));
}

/// Tests that dirty points are coalesced into one write per contiguous run.
#[tokio::test]
async fn test_write_coalesces_contiguous_points() {
    let mut sim = SimTransport::new(BASE, 8);
    let mut model = settings();
    model.set_uint16("P0", 0, 10, 0).unwrap();
    model.set_uint16("P1", 0, 11, 0).unwrap();
    model.set_uint32("Total", 0, 0xDEAD_BEEF, 0).unwrap();
    model.set_string("Label", 0, "hi").unwrap();

    model.write(&mut sim, None).await.unwrap();

    assert_eq!(
        sim.journal(),
        &[
            SimRequest::Write { addr: BASE, count: 2 },
            SimRequest::Write { addr: BASE + 4, count: 4 },
        ]
    );
    assert_eq!(sim.register(BASE), Some(10));
    assert_eq!(sim.register(BASE + 2), Some(0));
    assert_eq!(sim.register(BASE + 4), Some(0xDEAD));
    assert_eq!(sim.register(BASE + 5), Some(0xBEEF));
    assert!(!model.is_dirty());
}

/// Tests that a clean model writes nothing.
#[tokio::test]
async fn test_clean_model_writes_nothing() {
    let mut sim = SimTransport::new(BASE, 8);
    let mut model = settings();
    model.write(&mut sim, None).await.unwrap();
    assert!(sim.journal().is_empty());
}

/// Tests that a run longer than one transaction allows is split.
#[tokio::test]
async fn test_long_run_is_split() {
    let mut sim = SimTransport::new(BASE, 130);
    let mut model = Model::new(def(LONG_TEXT), BASE, 130, 1).unwrap();
    model.set_string("A", 0, "first").unwrap();
    model.set_string("B", 0, "second").unwrap();

    model.write(&mut sim, None).await.unwrap();

    assert_eq!(
        sim.journal(),
        &[
            SimRequest::Write { addr: BASE, count: 100 },
            SimRequest::Write { addr: BASE + 100, count: 30 },
        ]
    );
}

/// Tests that a failed write clears every pending flag.
#[tokio::test]
async fn test_failed_write_clears_dirty_flags() {
    let mut faulty = Faulty {
        inner: SimTransport::new(BASE, 8),
        fail_reads: false,
        fail_writes: true,
    };
    let mut model = settings();
    model.set_uint16("P0", 0, 1, 0).unwrap();
    model.set_uint16("P3", 0, 3, 0).unwrap();

    assert_eq!(
        model.write(&mut faulty, None).await.unwrap_err(),
        SunSpecError::ModbusException(4)
    );
    assert!(!model.is_dirty());

    faulty.fail_writes = false;
    model.write(&mut faulty, None).await.unwrap();
    assert!(faulty.inner.journal().is_empty());
}

/// Tests that a failed read leaves cached values untouched.
#[tokio::test]
async fn test_failed_read_keeps_values() {
    let mut faulty = Faulty {
        inner: SimTransport::with_registers(BASE, vec![5, 6, 7, 8, 0, 0, 0, 0]),
        fail_reads: false,
        fail_writes: false,
    };
    let mut model = settings();
    model.read(&mut faulty, None).await.unwrap();

    faulty.fail_reads = true;
    assert_eq!(model.read(&mut faulty, None).await.unwrap_err(), SunSpecError::Timeout);
    assert_eq!(model.get_uint16("P2", 0).unwrap(), (7, 0));
}

/// Tests that a read replaces staged values and clears their flags.
#[tokio::test]
async fn test_read_discards_staged_values() {
    let mut sim = SimTransport::with_registers(BASE, vec![5, 6, 7, 8, 0, 0, 0, 0]);
    let mut model = settings();
    model.set_uint16("P0", 0, 99, 0).unwrap();
    model.read(&mut sim, None).await.unwrap();
    assert_eq!(model.get_uint16("P0", 0).unwrap(), (5, 0));
    assert!(!model.is_dirty());
}

/// Tests that written values read back identically into a second instance.
#[tokio::test]
async fn test_written_values_read_back() {
    let mut sim = SimTransport::new(BASE, 8);
    let mut writer = settings();
    writer.set_uint16("P2", 0, 0x1234, 0).unwrap();
    writer.set_string("Label", 0, "ab").unwrap();
    writer.write(&mut sim, None).await.unwrap();
    writer.read(&mut sim, None).await.unwrap();

    let mut reader = settings();
    reader.read(&mut sim, None).await.unwrap();
    assert!(reader.values_eq(&writer));
}

/// Tests that a model larger than the read buffer is refused.
#[tokio::test]
async fn test_oversized_model_read() {
    let def = SchemaRegistry::builtin().get_model_def(126).unwrap();
    let len = 10 + 54 * 38;
    let mut model = Model::new(def, 0, len, 1).unwrap();
    let mut sim = SimTransport::new(0, usize::from(len));

    assert_eq!(
        model.read(&mut sim, None).await.unwrap_err(),
        SunSpecError::BufferTooSmall {
            needed: usize::from(len) * 2,
            capacity: 4096,
        }
    );
    assert!(sim.journal().is_empty());
}
