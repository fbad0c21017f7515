//! Logging configuration
//!
//! Console output through the `fmt` layer, an optional local log file, and
//! the remote audit channel through [`syslog::SyslogLayer`].

pub mod syslog;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::errors::ZtpError;
use crate::logs::syslog::{SyslogLayer, SyslogOptions};

/// Agent log level. Besides the filter names, Junos syslog severities
/// (`notice`, `warning`, `critical`, ...) are accepted and folded onto the
/// nearest level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn to_filter_string(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl TryFrom<String> for LogLevel {
    type Error = String;

    fn try_from(value: String) -> Result<Self, <LogLevel as TryFrom<String>>::Error> {
        value.parse()
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let level = match s.trim().to_ascii_lowercase().as_str() {
            "trace" | "any" => LogLevel::Trace,
            "debug" => LogLevel::Debug,
            "info" | "informational" | "notice" => LogLevel::Info,
            "warn" | "warning" => LogLevel::Warn,
            "error" | "critical" | "alert" | "emergency" => LogLevel::Error,
            other => return Err(format!("unknown log level {:?}", other)),
        };
        Ok(level)
    }
}

/// Logging options
#[derive(Debug, Clone)]
pub struct LogOptions {
    /// Log level
    pub log_level: LogLevel,

    /// Write logs to stdout
    pub stdout: bool,

    /// Optional local log file
    pub log_file: Option<PathBuf>,

    /// Enable JSON format on the console
    pub json_format: bool,

    /// Remote audit channel
    pub syslog: Option<SyslogOptions>,
}

impl Default for LogOptions {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            stdout: true,
            log_file: None,
            json_format: false,
            syslog: None,
        }
    }
}

/// Keeps the background log writer alive. Drop it before the process exits
/// so buffered lines are flushed.
pub struct LogGuard {
    _file_guard: Option<WorkerGuard>,
}

/// Initialize logging
pub fn init_logging(options: LogOptions) -> Result<LogGuard, ZtpError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(options.log_level.to_filter_string()));

    let console_text = (options.stdout && !options.json_format).then(|| fmt::layer());
    let console_json = (options.stdout && options.json_format).then(|| fmt::layer().json());

    let (file_layer, file_guard) = match &options.log_file {
        Some(path) => {
            let dir = path
                .parent()
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("."));
            let name = path
                .file_name()
                .ok_or_else(|| ZtpError::Settings(format!("invalid log file path: {:?}", path)))?;
            std::fs::create_dir_all(&dir)?;
            let appender = tracing_appender::rolling::never(dir, name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_writer(writer).with_ansi(false)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    let syslog_layer = match &options.syslog {
        Some(syslog) => Some(SyslogLayer::connect(syslog)?),
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console_text)
        .with(console_json)
        .with(file_layer)
        .with(syslog_layer)
        .try_init()
        .map_err(|e| ZtpError::Internal(e.to_string()))?;

    Ok(LogGuard {
        _file_guard: file_guard,
    })
}
