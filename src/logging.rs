use log::{info, log_enabled, Level};

/// Initializes the logger with the `env_logger` crate.
///
/// Filtering follows `RUST_LOG`, e.g. `RUST_LOG=sunspec_rs=debug` to see
/// every RTU frame and scan step. A logger that is already installed is
/// kept.
pub fn init_logger() {
    let _ = try_init_logger();
}

/// Initializes the logger, reporting a logger that is already installed.
pub fn try_init_logger() -> Result<(), log::SetLoggerError> {
    env_logger::Builder::from_default_env().try_init()
}

/// Logs an informational message.
pub fn log_info(message: &str) {
    if log_enabled!(Level::Info) {
        info!("{message}");
    }
}
