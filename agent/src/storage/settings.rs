//! Settings file management

use serde::{Deserialize, Serialize};

use crate::logs::LogLevel;

pub const ENV_INVENTORY_URL: &str = "ZTP_INVENTORY_URL";
pub const ENV_INVENTORY_TOKEN: &str = "ZTP_INVENTORY_TOKEN";
pub const ENV_FIRMWARE_URL: &str = "ZTP_FIRMWARE_URL";
pub const ENV_LOG_LEVEL: &str = "ZTP_LOG_LEVEL";

/// Agent settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Optional local log file, in addition to the console
    #[serde(default)]
    pub log_file: Option<String>,

    /// Inventory service configuration
    #[serde(default)]
    pub inventory: InventorySettings,

    /// Software image server
    #[serde(default)]
    pub firmware: FirmwareSettings,

    /// Retry trigger configuration
    #[serde(default)]
    pub retry: RetrySettings,

    /// Software upgrade configuration
    #[serde(default)]
    pub upgrade: UpgradeSettings,

    /// Local device access
    #[serde(default)]
    pub device: DeviceSettings,

    /// Where provisioning directives come from
    #[serde(default)]
    pub directives: DirectiveSettings,

    /// Remote audit log
    #[serde(default)]
    pub syslog: SyslogSettings,
}

impl Settings {
    /// Apply `ZTP_*` environment overrides
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(ENV_INVENTORY_URL) {
            self.inventory.base_url = url;
        }
        if let Some(token) = lookup(ENV_INVENTORY_TOKEN) {
            self.inventory.token = Some(token);
        }
        if let Some(url) = lookup(ENV_FIRMWARE_URL) {
            self.firmware.base_url = url;
        }
        if let Some(level) = lookup(ENV_LOG_LEVEL).and_then(|l| l.parse().ok()) {
            self.log_level = level;
        }
    }
}

fn default_true() -> bool {
    true
}

/// Inventory (NetBox) API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventorySettings {
    /// Base URL of the device API, e.g. `https://netbox.example.net/api/dcim`
    #[serde(default = "default_inventory_url")]
    pub base_url: String,

    /// Static API token
    #[serde(default)]
    pub token: Option<String>,

    /// Authorization scheme placed before the token
    #[serde(default = "default_token_scheme")]
    pub token_scheme: String,

    /// Verify the server's TLS certificate
    #[serde(default = "default_true")]
    pub verify_tls: bool,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// `format` query value for the render-config endpoint
    #[serde(default = "default_render_format")]
    pub render_format: String,
}

fn default_inventory_url() -> String {
    "https://netbox.example.net/api/dcim".to_string()
}

fn default_token_scheme() -> String {
    "Bearer".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_render_format() -> String {
    "txt".to_string()
}

impl Default for InventorySettings {
    fn default() -> Self {
        Self {
            base_url: default_inventory_url(),
            token: None,
            token_scheme: default_token_scheme(),
            verify_tls: true,
            timeout_secs: default_timeout_secs(),
            render_format: default_render_format(),
        }
    }
}

/// Software image server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FirmwareSettings {
    /// Directory URL packages are downloaded from
    #[serde(default = "default_firmware_url")]
    pub base_url: String,
}

fn default_firmware_url() -> String {
    "http://files.example.net/juniper/firmware/".to_string()
}

impl Default for FirmwareSettings {
    fn default() -> Self {
        Self {
            base_url: default_firmware_url(),
        }
    }
}

/// Retry trigger settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    /// Name of the `event-options generate-event` that re-runs the agent
    #[serde(default = "default_event_name")]
    pub event_name: String,

    /// Interval the device's event policy is provisioned with; only reported in log messages
    #[serde(default = "default_retry_interval")]
    pub retry_interval_secs: u64,
}

fn default_event_name() -> String {
    "ZTP".to_string()
}

fn default_retry_interval() -> u64 {
    60
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            event_name: default_event_name(),
            retry_interval_secs: default_retry_interval(),
        }
    }
}

/// Software upgrade settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpgradeSettings {
    /// Wait after issuing a reboot before continuing
    #[serde(default = "default_reboot_settle")]
    pub reboot_settle_secs: u64,
}

fn default_reboot_settle() -> u64 {
    30
}

impl Default for UpgradeSettings {
    fn default() -> Self {
        Self {
            reboot_settle_secs: default_reboot_settle(),
        }
    }
}

/// Local device access settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceSettings {
    /// Path to the Junos `cli` binary
    #[serde(default = "default_cli_path")]
    pub cli_path: String,

    /// Directory for candidate configuration files
    #[serde(default = "default_scratch_dir")]
    pub scratch_dir: String,
}

fn default_cli_path() -> String {
    "/usr/sbin/cli".to_string()
}

fn default_scratch_dir() -> String {
    "/var/tmp".to_string()
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            cli_path: default_cli_path(),
            scratch_dir: default_scratch_dir(),
        }
    }
}

/// Source of provisioning directives
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DirectiveSourceKind {
    /// The inventory record's configuration context
    #[default]
    ConfigContext,

    /// A local model table
    ModelTable,
}

/// Directive source settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DirectiveSettings {
    #[serde(default)]
    pub source: DirectiveSourceKind,

    /// Model table file, defaults to `models.json` next to the settings file
    #[serde(default)]
    pub model_table_path: Option<String>,
}

/// Syslog settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyslogSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// `/dev/log`, `unix:<path>` or `udp:<host>[:port]`
    #[serde(default = "default_syslog_target")]
    pub target: String,

    /// Facility name
    #[serde(default = "default_syslog_facility")]
    pub facility: String,
}

fn default_syslog_target() -> String {
    "/dev/log".to_string()
}

fn default_syslog_facility() -> String {
    "user".to_string()
}

impl Default for SyslogSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            target: default_syslog_target(),
            facility: default_syslog_facility(),
        }
    }
}
