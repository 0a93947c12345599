//! # Utility Modules
//!
//! Hex encoding helpers and frame logging shared by the transports and the
//! model dump code.

pub mod hex;
pub mod logging;

pub use hex::{decode_hex, encode_hex, format_hex_compact, HexError};
pub use logging::log_frame_hex;
