//! Logging system configuration and initialization
//!
//! This module provides the logging setup with:
//! - Console and file output support
//! - Configuration based log level control
//! - Log files stored relative to executable location

use std::path::PathBuf;

use anyhow::{anyhow, Result};
use lazy_static::lazy_static;
use std::sync::Mutex;
use tracing::info;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{
    layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry,
};

pub use crate::infrastructure::config::LoggingConfig;

// Global guard to keep the log file writer alive
lazy_static! {
    static ref LOG_GUARDS: Mutex<Vec<tracing_appender::non_blocking::WorkerGuard>> =
        Mutex::new(Vec::new());
}

/// Get the log directory relative to the executable location
pub fn get_log_directory() -> PathBuf {
    let exe_dir = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(std::path::Path::to_path_buf))
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_default());

    exe_dir.join("logs")
}

/// Initialize logging from the application configuration.
///
/// `RUST_LOG` overrides the configured level when set. HTTP stack internals
/// (reqwest, hyper) are held at warn unless trace is requested explicitly.
pub fn init_logging_with_config(config: &LoggingConfig) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let mut filter = EnvFilter::new(&config.level);
        if !config.level.to_lowercase().contains("trace") {
            filter = filter
                .add_directive("reqwest=warn".parse().unwrap())
                .add_directive("hyper=warn".parse().unwrap())
                .add_directive("h2=warn".parse().unwrap());
        }
        filter
    });

    let registry = Registry::default().with(env_filter);

    match (config.file_output, config.console_output) {
        (true, true) => {
            let log_dir = get_log_directory();
            std::fs::create_dir_all(&log_dir)
                .map_err(|e| anyhow!("Failed to create log directory {:?}: {}", log_dir, e))?;

            let file_appender = rolling::never(&log_dir, "kindle-shelf.log");
            let (file_writer, file_guard) = non_blocking(file_appender);
            LOG_GUARDS.lock().unwrap().push(file_guard);

            let file_layer = tracing_subscriber::fmt::Layer::new()
                .with_writer(file_writer)
                .with_target(false)
                .with_ansi(false);
            let console_layer = tracing_subscriber::fmt::Layer::new()
                .with_writer(std::io::stdout)
                .with_target(false);

            registry.with(file_layer).with(console_layer).init();
        }
        (true, false) => {
            let log_dir = get_log_directory();
            std::fs::create_dir_all(&log_dir)
                .map_err(|e| anyhow!("Failed to create log directory {:?}: {}", log_dir, e))?;

            let file_appender = rolling::never(&log_dir, "kindle-shelf.log");
            let (file_writer, file_guard) = non_blocking(file_appender);
            LOG_GUARDS.lock().unwrap().push(file_guard);

            let file_layer = tracing_subscriber::fmt::Layer::new()
                .with_writer(file_writer)
                .with_target(false)
                .with_ansi(false);

            registry.with(file_layer).init();
        }
        (false, true) => {
            let console_layer = tracing_subscriber::fmt::Layer::new()
                .with_writer(std::io::stdout)
                .with_target(false);

            registry.with(console_layer).init();
        }
        (false, false) => {
            return Err(anyhow!("No logging output configured"));
        }
    }

    info!("Logging system initialized (level: {})", config.level);
    Ok(())
}
