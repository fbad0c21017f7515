//! Remote audit channel
//!
//! Forwards this crate's `info`/`warn`/`error` events as RFC 3164 syslog
//! datagrams, each message prefixed with `ZTP - `.

use std::fmt::Write as _;
use std::net::UdpSocket;
#[cfg(unix)]
use std::os::unix::net::UnixDatagram;
use std::path::PathBuf;
use std::str::FromStr;

use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::Layer;

use crate::errors::ZtpError;

/// Fixed prefix identifying workflow messages in the remote log
pub const MESSAGE_PREFIX: &str = "ZTP - ";

const NOTICE: u8 = 5;
const WARNING: u8 = 4;
const ERR: u8 = 3;

/// Where syslog datagrams go
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyslogTarget {
    /// Local syslog socket, e.g. `/dev/log`
    Unix(PathBuf),

    /// Remote collector, `host:port`
    Udp(String),
}

impl FromStr for SyslogTarget {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(path) = s.strip_prefix("unix:") {
            return Ok(SyslogTarget::Unix(PathBuf::from(path)));
        }
        if let Some(addr) = s.strip_prefix("udp:") {
            let addr = if addr.contains(':') {
                addr.to_string()
            } else {
                format!("{}:514", addr)
            };
            return Ok(SyslogTarget::Udp(addr));
        }
        if s.starts_with('/') {
            return Ok(SyslogTarget::Unix(PathBuf::from(s)));
        }
        Err(format!("Invalid syslog target: {}", s))
    }
}

/// Numeric syslog facility from its name
pub fn facility_code(name: &str) -> Option<u8> {
    match name.to_lowercase().as_str() {
        "kern" => Some(0),
        "user" => Some(1),
        "daemon" => Some(3),
        "auth" => Some(4),
        "syslog" => Some(5),
        "local0" => Some(16),
        "local1" => Some(17),
        "local2" => Some(18),
        "local3" => Some(19),
        "local4" => Some(20),
        "local5" => Some(21),
        "local6" => Some(22),
        "local7" => Some(23),
        _ => None,
    }
}

/// Syslog layer options
#[derive(Debug, Clone)]
pub struct SyslogOptions {
    pub target: SyslogTarget,
    pub facility: u8,

    /// Only events whose target starts with this are forwarded
    pub target_prefix: String,
}

enum Transport {
    #[cfg(unix)]
    Unix(UnixDatagram, PathBuf),
    Udp(UdpSocket, String),
}

/// `tracing` layer writing the audit trail to syslog
pub struct SyslogLayer {
    transport: Transport,
    facility: u8,
    target_prefix: String,
    hostname: String,
    tag: String,
}

impl SyslogLayer {
    pub fn connect(options: &SyslogOptions) -> Result<Self, ZtpError> {
        let transport = match &options.target {
            #[cfg(unix)]
            SyslogTarget::Unix(path) => Transport::Unix(UnixDatagram::unbound()?, path.clone()),
            #[cfg(not(unix))]
            SyslogTarget::Unix(path) => {
                return Err(ZtpError::Settings(format!(
                    "unix syslog socket {:?} is not supported on this platform",
                    path
                )))
            }
            SyslogTarget::Udp(addr) => Transport::Udp(UdpSocket::bind("0.0.0.0:0")?, addr.clone()),
        };

        Ok(Self {
            transport,
            facility: options.facility,
            target_prefix: options.target_prefix.clone(),
            hostname: local_hostname(),
            tag: format!("ztp-agent[{}]", std::process::id()),
        })
    }

    fn send(&self, line: &str) {
        // Nowhere left to report a failed audit write; the console still has it.
        let _ = match &self.transport {
            #[cfg(unix)]
            Transport::Unix(socket, path) => socket.send_to(line.as_bytes(), path),
            Transport::Udp(socket, addr) => socket.send_to(line.as_bytes(), addr.as_str()),
        };
    }
}

impl<S> Layer<S> for SyslogLayer
where
    S: Subscriber,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if !metadata.target().starts_with(&self.target_prefix) {
            return;
        }
        let Some(severity) = severity_for(metadata.level()) else {
            return;
        };

        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);

        let timestamp = chrono::Local::now().format("%b %e %H:%M:%S").to_string();
        let line = format_message(
            self.facility,
            severity,
            &timestamp,
            &self.hostname,
            &self.tag,
            &visitor.finish(),
        );
        self.send(&line);
    }
}

fn severity_for(level: &Level) -> Option<u8> {
    match *level {
        Level::ERROR => Some(ERR),
        Level::WARN => Some(WARNING),
        Level::INFO => Some(NOTICE),
        _ => None,
    }
}

fn format_message(
    facility: u8,
    severity: u8,
    timestamp: &str,
    hostname: &str,
    tag: &str,
    message: &str,
) -> String {
    let priority = u16::from(facility) * 8 + u16::from(severity);
    format!(
        "<{}>{} {} {}: {}{}",
        priority, timestamp, hostname, tag, MESSAGE_PREFIX, message
    )
}

fn local_hostname() -> String {
    std::env::var("HOSTNAME")
        .ok()
        .filter(|h| !h.is_empty())
        .or_else(|| {
            std::fs::read_to_string("/etc/hostname")
                .ok()
                .map(|h| h.trim().to_string())
                .filter(|h| !h.is_empty())
        })
        .unwrap_or_else(|| "localhost".to_string())
}

#[derive(Default)]
struct MessageVisitor {
    message: String,
    fields: String,
}

impl MessageVisitor {
    fn finish(self) -> String {
        if self.fields.is_empty() {
            self.message
        } else {
            format!("{}{}", self.message, self.fields)
        }
    }
}

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message.push_str(value);
        } else {
            let _ = write!(self.fields, " {}={}", field.name(), value);
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            let _ = write!(self.message, "{:?}", value);
        } else {
            let _ = write!(self.fields, " {}={:?}", field.name(), value);
        }
    }
}
