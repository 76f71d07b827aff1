//! Command implementations for slotpool-cmd

use slotpool::workflow::{PoolConfig, RunOptions};
use tracing_subscriber::filter::LevelFilter;

pub mod digest;
pub mod sleep;

/// Installs the stderr log subscriber; library `log` records are forwarded to it.
pub fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

/// Resolves the requested slot count, falling back to the pool's default sizing.
pub fn resolve_slots(slots: Option<usize>) -> usize {
    slots.unwrap_or_else(|| PoolConfig::default().slots)
}

pub fn run_options(keep_going: bool) -> RunOptions {
    RunOptions::default()
        .with_abort_on_panic(!keep_going)
        .with_thread_name("slotpool-worker")
}
