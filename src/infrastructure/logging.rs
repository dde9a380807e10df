//! Logging system configuration and initialization
//!
//! This module provides the logging setup for the service:
//! - Console output with local timestamps
//! - Daily rotated log files written through a non-blocking appender
//! - Optional structured JSON output
//! - `RUST_LOG` override, otherwise the configured level with noisy
//!   dependencies quieted

#![allow(clippy::uninlined_format_args)]

use anyhow::{Result, anyhow};
use chrono::Local;
use lazy_static::lazy_static;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::{Subscriber, info};
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{
    EnvFilter, Layer, Registry,
    fmt::{self, time::FormatTime},
    registry::LookupSpan,
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

pub use crate::infrastructure::config::LoggingConfig;

// Keeps the file writer alive for the lifetime of the process
lazy_static! {
    static ref LOG_GUARDS: Mutex<Vec<tracing_appender::non_blocking::WorkerGuard>> = Mutex::new(Vec::new());
}

/// Local wall-clock timestamps with milliseconds
struct LocalTimeFormatter;

impl FormatTime for LocalTimeFormatter {
    fn format_time(&self, w: &mut fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", Local::now().format("%Y-%m-%d %H:%M:%S%.3f %:z"))
    }
}

fn console_layer<S>(enabled: bool) -> Option<impl Layer<S> + Send + Sync>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    enabled.then(|| {
        fmt::Layer::new()
            .with_writer(std::io::stdout)
            .with_timer(LocalTimeFormatter)
            .with_target(false)
    })
}

/// Get the default log directory, `logs/` next to the executable
pub fn get_log_directory() -> PathBuf {
    let exe_dir = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(std::path::Path::to_path_buf))
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_default());

    exe_dir.join("logs")
}

/// Initialize the logging system with default configuration
pub fn init_logging() -> Result<()> {
    init_logging_with_config(LoggingConfig::default())
}

/// Builds the level filter.
///
/// `RUST_LOG` wins when set. Otherwise the configured level applies to this
/// crate while SQL, HTTP and runtime internals stay quiet unless the level is
/// `trace`:
/// ```bash
/// RUST_LOG="debug,sqlx::query=debug" fragrance-stock
/// ```
pub fn build_env_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }

    let mut filter = EnvFilter::try_new(&config.level)
        .map_err(|e| anyhow!("Invalid log level '{}': {}", config.level, e))?;

    if !config.level.to_lowercase().contains("trace") {
        let mut directives: Vec<String> = vec![
            "sqlx::query=warn".into(),
            "sqlx::sqlite=warn".into(),
            "reqwest=info".into(),
            "hyper=warn".into(),
            "h2=warn".into(),
            "tokio=info".into(),
            "runtime=warn".into(),
        ];
        let mut modules: Vec<_> = config.module_filters.iter().collect();
        modules.sort();
        directives.extend(modules.into_iter().map(|(module, level)| format!("{}={}", module, level)));
        directives.push(format!("fragrance_stock_lib={}", config.level));
        directives.push(format!("fragrance_stock={}", config.level));

        for directive in directives {
            let parsed = directive
                .parse()
                .map_err(|e| anyhow!("Invalid log directive '{}': {}", directive, e))?;
            filter = filter.add_directive(parsed);
        }
    }

    Ok(filter)
}

/// Initialize logging with custom configuration
pub fn init_logging_with_config(config: LoggingConfig) -> Result<()> {
    let env_filter = build_env_filter(&config)?;
    let log_dir = config.log_dir.clone().unwrap_or_else(get_log_directory);
    let registry = Registry::default().with(env_filter);

    let file_writer = if config.file_output {
        std::fs::create_dir_all(&log_dir)
            .map_err(|e| anyhow!("Failed to create log directory {:?}: {}", log_dir, e))?;
        let file_appender = rolling::daily(&log_dir, &config.file_prefix);
        let (writer, guard) = non_blocking(file_appender);
        LOG_GUARDS
            .lock()
            .map_err(|_| anyhow!("Log guard registry poisoned"))?
            .push(guard);
        Some(writer)
    } else {
        None
    };

    let init_result = match (file_writer, config.json_format) {
        (Some(writer), true) => {
            let file_layer = fmt::Layer::new()
                .json()
                .with_writer(writer)
                .with_timer(LocalTimeFormatter)
                .with_target(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true)
                .with_ansi(false);
            registry
                .with(file_layer)
                .with(console_layer(config.console_output))
                .try_init()
        }
        (Some(writer), false) => {
            let file_layer = fmt::Layer::new()
                .with_writer(writer)
                .with_timer(LocalTimeFormatter)
                .with_target(true)
                .with_ansi(false);
            registry
                .with(file_layer)
                .with(console_layer(config.console_output))
                .try_init()
        }
        (None, _) if config.console_output => registry.with(console_layer(true)).try_init(),
        (None, _) => return Err(anyhow!("No logging output configured")),
    };
    init_result.map_err(|e| anyhow!("Failed to install tracing subscriber: {}", e))?;

    info!("📝 Logging system initialized");
    info!("Log level: {}", config.level);
    if config.file_output {
        info!("Log directory: {:?}", log_dir);
    }
    info!("JSON format: {}", config.json_format);

    Ok(())
}

/// Log system information for diagnostics
pub fn log_system_info() {
    info!("=== Fragrance Stock System Information ===");
    info!("Application version: {}", env!("CARGO_PKG_VERSION"));
    info!("Operating system: {}", std::env::consts::OS);
    info!("Architecture: {}", std::env::consts::ARCH);

    if let Ok(current_dir) = std::env::current_dir() {
        info!("Working directory: {:?}", current_dir);
    }
    info!("==========================================");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logging_config_default() {
        let config = LoggingConfig::default();
        assert_eq!(config.level, "info");
        assert!(config.console_output);
        assert!(config.module_filters.contains_key("sqlx"));
    }

    #[test]
    fn test_filter_builds_for_default_config() {
        assert!(build_env_filter(&LoggingConfig::default()).is_ok());
    }

    #[test]
    fn test_trace_level_skips_quieting_directives() {
        let config = LoggingConfig {
            level: "trace".into(),
            ..LoggingConfig::default()
        };
        assert!(build_env_filter(&config).is_ok());
    }

    #[test]
    fn test_no_output_is_an_error() {
        let config = LoggingConfig {
            console_output: false,
            file_output: false,
            ..LoggingConfig::default()
        };
        assert!(init_logging_with_config(config).is_err());
    }
}
