//! Event retry controller
//!
//! The device re-runs the agent through an `event-options generate-event`
//! stanza. Deactivating it keeps a second run from starting while this one
//! makes irreversible changes; reactivating it schedules the next attempt.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::device::transaction::{run_transaction, CommitMode};
use crate::device::DeviceConnector;
use crate::errors::ZtpError;
use crate::models::device::ConfigLoad;

/// Why the retry trigger is being re-armed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryReason {
    /// A stage failed; try again after the event interval
    Retry,

    /// A software upgrade is rebooting the device; resume after boot
    PostReboot,
}

/// Retry controller options
#[derive(Debug, Clone)]
pub struct RetryOptions {
    /// Generated event name
    pub event_name: String,

    /// Interval the device's event policy is provisioned with. The agent
    /// never sets it; it is only reported when a retry is scheduled.
    pub retry_interval: Duration,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            event_name: "ZTP".to_string(),
            retry_interval: Duration::from_secs(60),
        }
    }
}

/// Enables and disables the device's self-triggering retry event
pub struct EventRetryController {
    connector: Arc<dyn DeviceConnector>,
    options: RetryOptions,
}

impl EventRetryController {
    pub fn new(connector: Arc<dyn DeviceConnector>, options: RetryOptions) -> Self {
        Self { connector, options }
    }

    /// The one-line stanza toggling the event
    pub fn stanza(&self, active: bool) -> String {
        let verb = if active { "activate" } else { "deactivate" };
        format!(
            "{} event-options generate-event {}",
            verb, self.options.event_name
        )
    }

    /// Stop the event from re-running the agent
    pub async fn deactivate(&self) -> Result<(), ZtpError> {
        info!("Deactivating Event Option to Keep From Overrunning");
        self.commit_stanza(false).await
    }

    /// Re-arm the event. Failures are logged and returned, never retried.
    pub async fn reactivate(&self, reason: RetryReason) -> Result<(), ZtpError> {
        match reason {
            RetryReason::Retry => info!(
                "Reactivating Event Option for ZTP. Will try again in {} seconds.",
                self.options.retry_interval.as_secs()
            ),
            RetryReason::PostReboot => info!(
                "Reactivating Event Option after successful software upgrade so it will run after the reboot"
            ),
        }
        self.commit_stanza(true).await
    }

    async fn commit_stanza(&self, active: bool) -> Result<(), ZtpError> {
        let result = self.try_commit_stanza(active).await;
        if let Err(e) = &result {
            match e {
                ZtpError::Lock(_) => error!("Error locking configuration: {}", e),
                _ if active => error!("Error activating configuration: {}", e),
                _ => error!("Error loading configuration: {}", e),
            }
        }
        result
    }

    async fn try_commit_stanza(&self, active: bool) -> Result<(), ZtpError> {
        let mut session = self.connector.open().await?;
        let result = run_transaction(
            session.as_mut(),
            &ConfigLoad::Set(self.stanza(active)),
            &CommitMode::Commit { comment: None },
        )
        .await;
        if let Err(e) = session.close().await {
            warn!("Error closing device session: {}", e);
        }
        result
    }
}
