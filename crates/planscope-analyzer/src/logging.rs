//! Logging and tracing setup for hosts embedding the analyzer
//!
//! The analyzer itself only emits `tracing` events. This module is for hosts
//! that have no subscriber of their own:
//! - Pretty console output for development
//! - JSON files with daily rotation for production
//! - A plain-text report file fed only by the [`REPORT_TARGET`] target
//! - `RUST_LOG` overrides the default filter

use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter, Layer,
    filter::{LevelFilter, Targets},
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

/// Log target carrying formatted analysis reports
pub const REPORT_TARGET: &str = "planscope::report";

const LOG_FILE_PREFIX: &str = "planscope.log";
const REPORT_FILE_PREFIX: &str = "query-analysis.log";

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Directory where log files should be written
    pub log_dir: PathBuf,

    /// Whether to write JSON logs to rotating files
    pub enable_json_logs: bool,

    /// Whether to enable pretty console output
    pub enable_console_logs: bool,

    /// Whether to write analysis reports to their own plain-text file
    pub enable_report_file: bool,

    /// Whether to include file/line information in logs
    pub include_location: bool,

    /// Whether to log span open/close events
    pub enable_spans: bool,

    /// Default log level filter
    pub default_filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_dir: log_directory(),
            enable_json_logs: true,
            enable_console_logs: true,
            enable_report_file: true,
            include_location: cfg!(debug_assertions),
            enable_spans: cfg!(debug_assertions),
            default_filter: "info,planscope_analyzer=debug,planscope_core=debug".to_string(),
        }
    }
}

impl LoggingConfig {
    /// Production preset: no console, JSON logs and report file
    pub fn production() -> Self {
        Self {
            log_dir: log_directory(),
            enable_json_logs: true,
            enable_console_logs: false,
            enable_report_file: true,
            include_location: false,
            enable_spans: false,
            default_filter: "warn,planscope_analyzer=info,planscope_core=info".to_string(),
        }
    }

    /// Development preset: pretty console output, verbose logging
    pub fn development() -> Self {
        Self::default()
    }

    /// Testing preset: console only, no files
    pub fn testing() -> Self {
        Self {
            log_dir: std::env::temp_dir().join("planscope-tests"),
            enable_json_logs: false,
            enable_console_logs: true,
            enable_report_file: false,
            include_location: true,
            enable_spans: true,
            default_filter: "debug".to_string(),
        }
    }

    /// Returns true if any layer writes to `log_dir`
    pub fn writes_files(&self) -> bool {
        self.enable_json_logs || self.enable_report_file
    }
}

/// Keeps background log writers alive; dropping it flushes and stops them
#[must_use = "dropping the guard stops file logging"]
pub struct LoggingGuard {
    _writers: Vec<WorkerGuard>,
}

/// Installs the global subscriber described by `config`
///
/// Fails if a global subscriber is already installed.
pub fn init(config: LoggingConfig) -> anyhow::Result<LoggingGuard> {
    if config.writes_files() {
        std::fs::create_dir_all(&config.log_dir)?;
    }

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.default_filter));

    // NEW fires once per span; ENTER would repeat on every re-poll of an awaited future
    let span_events = if config.enable_spans {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let mut layers = Vec::new();
    let mut writers = Vec::new();

    if config.enable_console_logs {
        let console_layer = fmt::layer()
            .with_target(true)
            .with_file(config.include_location)
            .with_line_number(config.include_location)
            .with_span_events(span_events.clone())
            .with_ansi(true)
            .pretty()
            .with_filter(env_filter.clone())
            .boxed();
        layers.push(console_layer);
    }

    if config.enable_json_logs {
        let file_appender = tracing_appender::rolling::daily(&config.log_dir, LOG_FILE_PREFIX);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        writers.push(guard);

        let json_layer = fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_thread_names(true)
            .with_file(true)
            .with_line_number(true)
            .with_span_events(span_events)
            .with_ansi(false)
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_writer(non_blocking)
            .with_filter(env_filter)
            .boxed();
        layers.push(json_layer);
    }

    if config.enable_report_file {
        let report_appender =
            tracing_appender::rolling::daily(&config.log_dir, REPORT_FILE_PREFIX);
        let (non_blocking, guard) = tracing_appender::non_blocking(report_appender);
        writers.push(guard);

        let report_layer = fmt::layer()
            .with_target(false)
            .with_level(false)
            .with_ansi(false)
            .with_writer(non_blocking)
            .with_filter(Targets::new().with_target(REPORT_TARGET, LevelFilter::INFO))
            .boxed();
        layers.push(report_layer);
    }

    tracing_subscriber::registry().with(layers).try_init()?;

    tracing::info!(
        log_dir = %config.log_dir.display(),
        json_enabled = config.enable_json_logs,
        console_enabled = config.enable_console_logs,
        report_file_enabled = config.enable_report_file,
        "Logging system initialized"
    );

    Ok(LoggingGuard { _writers: writers })
}

/// Initializes logging with the preset matching the build profile
pub fn init_default() -> anyhow::Result<LoggingGuard> {
    let config = if cfg!(debug_assertions) {
        LoggingConfig::development()
    } else {
        LoggingConfig::production()
    };
    init(config)
}

/// Default directory for log and report files
pub fn log_directory() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("planscope")
        .join("logs")
}
