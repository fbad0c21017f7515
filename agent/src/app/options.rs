//! Application configuration options

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::http::client::HttpClientOptions;
use crate::retry::controller::RetryOptions;
use crate::stages::upgrade::UpgradeOptions;
use crate::storage::layout::StorageLayout;
use crate::storage::settings::{DirectiveSourceKind, Settings};

/// Main application options
#[derive(Debug)]
pub struct AppOptions {
    /// Inventory HTTP client
    pub inventory: HttpClientOptions,

    /// `format` query value for rendered configurations
    pub render_format: String,

    /// Retry trigger
    pub retry: RetryOptions,

    /// Software upgrade
    pub upgrade: UpgradeOptions,

    /// Local device access
    pub device: DeviceOptions,

    /// Directive source
    pub directive_source: DirectiveSourceKind,

    /// Model table location, used with [`DirectiveSourceKind::ModelTable`]
    pub model_table_path: PathBuf,
}

impl Default for AppOptions {
    fn default() -> Self {
        Self {
            inventory: HttpClientOptions::default(),
            render_format: "txt".to_string(),
            retry: RetryOptions::default(),
            upgrade: UpgradeOptions::default(),
            device: DeviceOptions::default(),
            directive_source: DirectiveSourceKind::default(),
            model_table_path: StorageLayout::default().model_table_file().path().to_path_buf(),
        }
    }
}

impl AppOptions {
    /// Build the options from loaded settings
    pub fn from_settings(settings: &Settings, layout: &StorageLayout) -> Self {
        let inventory = &settings.inventory;
        let model_table_path = match &settings.directives.model_table_path {
            Some(path) => PathBuf::from(path),
            None => layout.model_table_file().path().to_path_buf(),
        };

        Self {
            inventory: HttpClientOptions {
                base_url: inventory.base_url.clone(),
                token: inventory.token.clone().map(SecretString::from),
                token_scheme: inventory.token_scheme.clone(),
                verify_tls: inventory.verify_tls,
                timeout: Duration::from_secs(inventory.timeout_secs),
            },
            render_format: inventory.render_format.clone(),
            retry: RetryOptions {
                event_name: settings.retry.event_name.clone(),
                retry_interval: Duration::from_secs(settings.retry.retry_interval_secs),
            },
            upgrade: UpgradeOptions {
                firmware_base_url: settings.firmware.base_url.clone(),
                reboot_settle: Duration::from_secs(settings.upgrade.reboot_settle_secs),
            },
            device: DeviceOptions {
                cli_path: PathBuf::from(&settings.device.cli_path),
                scratch_dir: PathBuf::from(&settings.device.scratch_dir),
            },
            directive_source: settings.directives.source,
            model_table_path,
        }
    }
}

/// Local device access options
#[derive(Debug, Clone)]
pub struct DeviceOptions {
    /// Junos `cli` binary
    pub cli_path: PathBuf,

    /// Where candidate configuration files are written
    pub scratch_dir: PathBuf,
}

impl Default for DeviceOptions {
    fn default() -> Self {
        Self {
            cli_path: PathBuf::from("/usr/sbin/cli"),
            scratch_dir: PathBuf::from("/var/tmp"),
        }
    }
}
