//! Logging setup for the binary and for tests.
//!
//! `RUST_LOG` wins when set; otherwise the configured `logging.level` applies
//! to every target.

use std::str::FromStr;

use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Maps a configured level name to a `Level`. Unknown names mean `info`.
pub fn parse_level(level: &str) -> Level {
    match level.trim().to_ascii_lowercase().as_str() {
        "warning" => Level::WARN,
        other => Level::from_str(other).unwrap_or(Level::INFO),
    }
}

pub fn init(default_level: &str) {
    let level = parse_level(default_level);
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_ascii_lowercase()));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
