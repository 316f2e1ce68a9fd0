//! Log output for the CLI. Everything goes to stderr so `-o json` output on
//! stdout stays machine-readable.
//!
//! - no flag: `warn` (formula failures, low stock)
//! - `-v`: `info` (sessions, reports, payments)
//! - `-vv`: `debug` (dependency order, per-field results)
//! - `-vvv`: `trace`
//!
//! `RUST_LOG` overrides the flag.

use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub fn level_for(verbosity: u8) -> Level {
    match verbosity {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

pub fn init(verbosity: u8) {
    let layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time();

    tracing_subscriber::registry()
        .with(build_env_filter(level_for(verbosity)))
        .with(layer)
        .init();
}

fn build_env_filter(level: Level) -> EnvFilter {
    let level = level.as_str().to_lowercase();
    // dependencies stay at warn
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("warn,pipette={level},pipette_core={level}"))
    })
}
