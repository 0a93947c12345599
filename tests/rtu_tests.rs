//! End-to-end tests of the Modbus RTU client against a mock serial port.
//!
//! The mock port hands every written frame to a responder; most tests let
//! the in-memory simulator answer, others return hand-made replies.

mod support;

use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use support::MapBuilder;
use sunspec_rs::error::SunSpecError;
use sunspec_rs::transport::crc::append_crc;
use sunspec_rs::{Device, MockSerialPort, RegisterTransport, RtuTransport, SchemaRegistry, SimTransport};

const TIMEOUT: Option<Duration> = Some(Duration::from_millis(50));

type SharedSim = Arc<Mutex<SimTransport>>;

fn rtu_over_sim(sim: SimTransport) -> (RtuTransport<MockSerialPort>, MockSerialPort, SharedSim) {
    let sim = Arc::new(Mutex::new(sim));
    let responder_sim = sim.clone();
    let port = MockSerialPort::with_responder(move |request| {
        responder_sim
            .lock()
            .unwrap()
            .rtu_reply(request)
            .unwrap_or_default()
    });
    (RtuTransport::new(port.clone(), 1), port, sim)
}

fn rtu_with_reply(reply: Vec<u8>) -> (RtuTransport<MockSerialPort>, MockSerialPort) {
    let port = MockSerialPort::with_responder(move |_| reply.clone());
    (RtuTransport::new(port.clone(), 1), port)
}

fn with_crc(mut frame: Vec<u8>) -> Vec<u8> {
    append_crc(&mut frame);
    frame
}

fn request_window(frame: &[u8]) -> (u16, u16) {
    (
        u16::from_be_bytes([frame[2], frame[3]]),
        u16::from_be_bytes([frame[4], frame[5]]),
    )
}

/// Tests that a read of 300 registers goes out as three requests and reassembles in order.
#[tokio::test]
async fn test_large_read_is_chunked() {
    let regs: Vec<u16> = (0..300).map(|i| i * 3 + 1).collect();
    let mut direct = SimTransport::with_registers(40000, regs.clone());
    let (mut rtu, port, _) = rtu_over_sim(SimTransport::with_registers(40000, regs));

    let data = rtu.read_registers(40000, 300, TIMEOUT).await.unwrap();

    assert_eq!(data, direct.read(40000, 300).unwrap());
    let windows: Vec<(u16, u16)> = port.tx_frames().iter().map(|f| request_window(f)).collect();
    assert_eq!(windows, vec![(40000, 125), (40125, 125), (40250, 50)]);
}

/// Tests that the request for a small read has the documented layout.
#[tokio::test]
async fn test_read_request_frame() {
    let (mut rtu, port, _) = rtu_over_sim(SimTransport::new(0, 10));
    rtu.read_registers(0, 10, TIMEOUT).await.unwrap();
    assert_eq!(
        port.get_tx_data(),
        vec![0x01, 0x03, 0x00, 0x00, 0x00, 0x0A, 0xC5, 0xCD]
    );
}

/// Tests that a write reaches the simulator's registers.
#[tokio::test]
async fn test_write_round_trip() {
    let (mut rtu, _, sim) = rtu_over_sim(SimTransport::new(40000, 8));
    rtu.write_registers(40002, &[0x12, 0x34, 0xAB, 0xCD], TIMEOUT)
        .await
        .unwrap();

    let sim = sim.lock().unwrap();
    assert_eq!(sim.register(40002), Some(0x1234));
    assert_eq!(sim.register(40003), Some(0xABCD));
}

/// Tests that an exception reply surfaces its code.
#[tokio::test]
async fn test_exception_reply() {
    let (mut rtu, _, _) = rtu_over_sim(SimTransport::new(40000, 8));
    assert_eq!(
        rtu.read_registers(50000, 2, TIMEOUT).await.unwrap_err(),
        SunSpecError::ModbusException(2)
    );
}

/// Tests that a corrupted CRC is reported before anything else is checked.
#[tokio::test]
async fn test_corrupted_crc() {
    let mut reply = with_crc(vec![0x01, 0x03, 0x04, 0x53, 0x75, 0x6E, 0x53]);
    let last = reply.len() - 1;
    reply[last] ^= 0xFF;
    let (mut rtu, _) = rtu_with_reply(reply);

    assert!(matches!(
        rtu.read_registers(40000, 2, TIMEOUT).await,
        Err(SunSpecError::Crc { .. })
    ));
}

/// Tests that a reply from another slave is rejected.
#[tokio::test]
async fn test_wrong_slave_reply() {
    let (mut rtu, _) = rtu_with_reply(with_crc(vec![0x02, 0x03, 0x02, 0x00, 0x01]));
    assert_eq!(
        rtu.read_registers(40000, 1, TIMEOUT).await.unwrap_err(),
        SunSpecError::ModbusResponseMismatch
    );
}

/// Tests that a reply with an unexpected function code is rejected.
#[tokio::test]
async fn test_wrong_function_reply() {
    let (mut rtu, _) = rtu_with_reply(with_crc(vec![0x01, 0x04, 0x02, 0x00, 0x01]));
    assert_eq!(
        rtu.read_registers(40000, 1, TIMEOUT).await.unwrap_err(),
        SunSpecError::ModbusResponseMismatch
    );

    let (mut rtu, _) = rtu_with_reply(with_crc(vec![0x01, 0x10, 0x9C, 0x40, 0x00, 0x01]));
    assert_eq!(
        rtu.read_registers(40000, 1, TIMEOUT).await.unwrap_err(),
        SunSpecError::ModbusResponseMismatch
    );
}

/// Tests that a byte count different from the request is rejected.
#[tokio::test]
async fn test_short_payload_reply() {
    let (mut rtu, _) = rtu_with_reply(with_crc(vec![0x01, 0x03, 0x02, 0x00, 0x01]));
    assert_eq!(
        rtu.read_registers(40000, 2, TIMEOUT).await.unwrap_err(),
        SunSpecError::ModbusResponseMismatch
    );
}

/// Tests that a write echo with the wrong count is rejected.
#[tokio::test]
async fn test_write_echo_mismatch() {
    let (mut rtu, _) = rtu_with_reply(with_crc(vec![0x01, 0x10, 0x9C, 0x40, 0x00, 0x02]));
    assert_eq!(
        rtu.write_registers(40000, &[0, 1], TIMEOUT).await.unwrap_err(),
        SunSpecError::ModbusResponseMismatch
    );
}

/// Tests that bytes left over from an earlier exchange are discarded.
#[tokio::test]
async fn test_stale_bytes_are_flushed() {
    let (mut rtu, port, _) = rtu_over_sim(SimTransport::with_registers(40000, vec![0x5375, 0x6E53]));
    port.queue_rx_data(&[0x01, 0x03, 0x04, 0xDE, 0xAD]);

    let data = rtu.read_registers(40000, 2, TIMEOUT).await.unwrap();
    assert_eq!(data, b"SunS".to_vec());
}

/// Tests that a failed flush reports the transport as busy and sends nothing.
#[tokio::test]
async fn test_flush_failure_is_busy() {
    let (mut rtu, port, _) = rtu_over_sim(SimTransport::new(40000, 2));
    port.set_flush_error(io::Error::new(io::ErrorKind::Other, "locked"));

    assert_eq!(
        rtu.read_registers(40000, 2, TIMEOUT).await.unwrap_err(),
        SunSpecError::Busy
    );
    assert!(port.tx_frames().is_empty());
}

/// Tests that silence from the device is a timeout.
#[tokio::test]
async fn test_no_reply_times_out() {
    let (mut rtu, _, _) = rtu_over_sim(SimTransport::new(40000, 2).with_slave_id(9));
    assert_eq!(
        rtu.read_registers(40000, 2, TIMEOUT).await.unwrap_err(),
        SunSpecError::Timeout
    );
}

/// Tests that a truncated reply is a timeout.
#[tokio::test]
async fn test_truncated_reply_times_out() {
    let (mut rtu, _) = rtu_with_reply(vec![0x01, 0x03, 0x04, 0x53]);
    assert_eq!(
        rtu.read_registers(40000, 2, TIMEOUT).await.unwrap_err(),
        SunSpecError::Timeout
    );
}

/// Tests the argument checks that happen before anything is sent.
#[tokio::test]
async fn test_request_limits() {
    let (mut rtu, port, _) = rtu_over_sim(SimTransport::new(0, 8));

    assert_eq!(rtu.read_registers(0, 0, TIMEOUT).await.unwrap_err(), SunSpecError::Range);
    assert_eq!(
        rtu.read_registers(65535, 2, TIMEOUT).await.unwrap_err(),
        SunSpecError::Range
    );
    assert_eq!(rtu.write_registers(0, &[], TIMEOUT).await.unwrap_err(), SunSpecError::Range);
    assert_eq!(rtu.write_registers(0, &[1, 2, 3], TIMEOUT).await.unwrap_err(), SunSpecError::Range);
    assert_eq!(
        rtu.write_registers(0, &[0; 252], TIMEOUT).await.unwrap_err(),
        SunSpecError::BufferTooSmall {
            needed: 252,
            capacity: 250
        }
    );
    assert!(port.tx_frames().is_empty());
}

/// Tests a full device scan and model read over RTU framing.
#[tokio::test]
async fn test_scan_over_rtu() {
    let map = MapBuilder::new(40000).zeroed(1, 66).zeroed(101, 50).end();
    let (rtu, _, _) = rtu_over_sim(map.sim());
    let mut device = Device::new(rtu).with_timeout(TIMEOUT);

    assert_eq!(device.scan(&mut SchemaRegistry::builtin()).await.unwrap(), 2);
    device.read_all().await.unwrap();
    let inverter = device.model(101, 1).unwrap();
    assert_eq!(device.get(inverter).unwrap().addr(), 40072);
}
