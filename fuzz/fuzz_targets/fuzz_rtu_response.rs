#![no_main]

use std::time::Duration;

use libfuzzer_sys::fuzz_target;
use sunspec_rs::transport::rtu::{parse_exception, parse_read_response, parse_write_response};
use sunspec_rs::{MockSerialPort, RegisterTransport, RtuTransport};

fuzz_target!(|data: &[u8]| {
    // The parsers must reject malformed bodies without panicking
    let _ = parse_read_response(data);
    let _ = parse_write_response(data);
    let _ = parse_exception(data);

    // Feed the bytes as the device's answer to a read and to a write
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_time().build() {
        Ok(rt) => rt,
        Err(_) => return,
    };
    let reply = data.to_vec();
    let port = MockSerialPort::with_responder(move |_| reply.clone());
    let mut rtu = RtuTransport::new(port, 1);
    let timeout = Some(Duration::from_millis(5));

    runtime.block_on(async {
        let _ = rtu.read_registers(40000, 2, timeout).await;
        let _ = rtu.write_registers(40000, &[0, 1], timeout).await;
    });
});
