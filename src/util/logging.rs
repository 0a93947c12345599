//! # Frame Logging
//!
//! Debug-level hex dumps of RTU traffic. Enable with
//! `RUST_LOG=sunspec_rs::transport=debug`.

/// Longest frame prefix written to the log.
const MAX_LOG_BYTES: usize = 64;

/// Log a frame as hex at debug level, truncated to 64 bytes.
pub fn log_frame_hex(prefix: &str, data: &[u8]) {
    if !log::log_enabled!(log::Level::Debug) {
        return;
    }

    let display_data = &data[..data.len().min(MAX_LOG_BYTES)];
    let hex_str = crate::util::hex::format_hex_compact(display_data);
    let suffix = if data.len() > MAX_LOG_BYTES {
        format!(" ... ({} bytes total)", data.len())
    } else {
        String::new()
    };

    log::debug!("{prefix}: {hex_str}{suffix}");
}
