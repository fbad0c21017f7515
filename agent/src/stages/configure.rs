//! Configuration stage
//!
//! Fetches the rendered configuration, validates it with a dry-run commit
//! check and only then commits it. Both phases load the text as a full
//! replacement, so the check sees exactly what the commit will apply.

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::device::transaction::{run_transaction, CommitMode};
use crate::device::DeviceConnector;
use crate::errors::ZtpError;
use crate::inventory::InventoryApi;
use crate::models::device::ConfigLoad;
use crate::models::inventory::DeviceId;

/// Comment attached to the provisioning commit
pub const COMMIT_COMMENT: &str = "Committing Configuration Retrieved from Netbox";

/// Result of the configuration stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigOutcome {
    Applied,
    FetchFailed,
    CheckFailed,
    ApplyFailed,
}

impl ConfigOutcome {
    pub fn is_applied(&self) -> bool {
        *self == ConfigOutcome::Applied
    }
}

pub struct ConfigurationStage {
    connector: Arc<dyn DeviceConnector>,
    api: Arc<dyn InventoryApi>,
}

impl ConfigurationStage {
    pub fn new(connector: Arc<dyn DeviceConnector>, api: Arc<dyn InventoryApi>) -> Self {
        Self { connector, api }
    }

    /// Fetch, check, then commit the device's rendered configuration
    pub async fn fetch_and_apply(&self, device_id: &DeviceId) -> ConfigOutcome {
        let config = match self.api.render_config(device_id).await {
            Ok(config) => config,
            Err(e) => {
                error!("HTTP Error: {}", e);
                error!("Verify device has a valid, rendered config in Netbox");
                return ConfigOutcome::FetchFailed;
            }
        };
        info!("Device Configuration Retrieved");

        if !self.check_configuration(&config).await {
            error!("Configuration check failed, Check rendered configuration in Netbox for errors.");
            return ConfigOutcome::CheckFailed;
        }
        info!("Configuration is valid");

        if !self.apply_configuration(&config).await {
            error!("Failed to apply configuration.");
            return ConfigOutcome::ApplyFailed;
        }
        info!("Configuration applied successfully");
        ConfigOutcome::Applied
    }

    /// Dry run: true only when the commit check reports no errors
    pub async fn check_configuration(&self, config: &str) -> bool {
        info!("Performing Commit Check");
        match self.transaction(config, CommitMode::Check).await {
            Ok(()) => true,
            Err(ZtpError::Lock(msg)) => {
                error!("Error locking configuration: {}", msg);
                false
            }
            Err(ZtpError::ConfigLoad(msg)) => {
                error!("Error loading configuration: {}", msg);
                false
            }
            Err(e) => {
                error!("Commit check failed: {}", e);
                false
            }
        }
    }

    /// Commit the configuration, replacing the active one
    pub async fn apply_configuration(&self, config: &str) -> bool {
        let mode = CommitMode::Commit {
            comment: Some(COMMIT_COMMENT.to_string()),
        };
        match self.transaction(config, mode).await {
            Ok(()) => true,
            Err(ZtpError::Lock(msg)) => {
                error!("Error locking configuration: {}", msg);
                false
            }
            Err(e) => {
                error!("Error applying configuration: {}", e);
                false
            }
        }
    }

    async fn transaction(&self, config: &str, mode: CommitMode) -> Result<(), ZtpError> {
        let mut session = self.connector.open().await?;
        let result = run_transaction(
            session.as_mut(),
            &ConfigLoad::Override(config.to_string()),
            &mode,
        )
        .await;
        if let Err(e) = session.close().await {
            warn!("Error closing device session: {}", e);
        }
        result
    }
}
