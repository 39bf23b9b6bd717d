//! Command-line front-end for the LLE speech-practice client.

pub mod agent;
pub mod commands;
pub mod config;

use config::LogSection;
use tracing_subscriber::EnvFilter;

/// Installs the global `tracing` subscriber. Logs go to stderr so stdout
/// stays free for command output and join tickets.
pub fn init_logging(config: &LogSection) {
    let filter = EnvFilter::try_new(&config.level).unwrap_or_else(|_| EnvFilter::new("warn"));

    if config.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}
