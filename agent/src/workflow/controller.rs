//! Workflow controller
//!
//! Runs one provisioning pass: identity, inventory, trigger deactivation,
//! upgrade, configuration. There is no retry loop in the process. Every
//! failure re-arms the device's retry event once and ends the run; the
//! device starts a fresh pass when the event fires.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::device::facts::read_identity;
use crate::device::DeviceConnector;
use crate::errors::ZtpError;
use crate::inventory::InventoryResolver;
use crate::retry::controller::{EventRetryController, RetryReason};
use crate::stages::configure::{ConfigOutcome, ConfigurationStage};
use crate::stages::upgrade::{SoftwareUpgradeStage, UpgradeOutcome};
use crate::workflow::fsm::{ProvisioningEvent, ProvisioningFsm, ProvisioningState};

/// Process exit code: device provisioned
pub const EXIT_COMPLETED: i32 = 0;
/// Process exit code: retry needed but the retry event could not be re-armed
pub const EXIT_RETRY_UNARMED: i32 = 1;
/// Process exit code: device management plane unreachable
pub const EXIT_CONNECTION_FATAL: i32 = 69;
/// Process exit code: the retry event will run the agent again
pub const EXIT_RETRY_SCHEDULED: i32 = 75;

/// How a run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowOutcome {
    /// Configuration committed
    Completed,

    /// The run ends here and the device's retry event resumes provisioning
    RetryScheduled {
        reason: RetryReason,
        trigger_armed: bool,
    },

    /// No session to the device; nothing could be done, not even re-arming
    Fatal(String),
}

impl WorkflowOutcome {
    pub fn exit_code(&self) -> i32 {
        match self {
            WorkflowOutcome::Completed => EXIT_COMPLETED,
            WorkflowOutcome::RetryScheduled {
                trigger_armed: true,
                ..
            } => EXIT_RETRY_SCHEDULED,
            WorkflowOutcome::RetryScheduled {
                trigger_armed: false,
                ..
            } => EXIT_RETRY_UNARMED,
            WorkflowOutcome::Fatal(_) => EXIT_CONNECTION_FATAL,
        }
    }
}

/// Sequences the provisioning stages and drives the retry trigger
pub struct WorkflowController {
    connector: Arc<dyn DeviceConnector>,
    resolver: Arc<dyn InventoryResolver>,
    retry: EventRetryController,
    upgrade: SoftwareUpgradeStage,
    configure: ConfigurationStage,
    fsm: ProvisioningFsm,
}

impl WorkflowController {
    pub fn new(
        connector: Arc<dyn DeviceConnector>,
        resolver: Arc<dyn InventoryResolver>,
        retry: EventRetryController,
        upgrade: SoftwareUpgradeStage,
        configure: ConfigurationStage,
    ) -> Self {
        Self {
            connector,
            resolver,
            retry,
            upgrade,
            configure,
            fsm: ProvisioningFsm::new(),
        }
    }

    /// Current state of this run
    pub fn state(&self) -> &ProvisioningState {
        self.fsm.state()
    }

    /// States visited so far
    pub fn history(&self) -> &[ProvisioningState] {
        self.fsm.history()
    }

    /// Run one provisioning pass
    pub async fn run(&mut self) -> WorkflowOutcome {
        let device = match read_identity(self.connector.as_ref()).await {
            Ok(device) => device,
            Err(e) => {
                error!("Unable to open a session to this device: {}", e);
                self.transition(ProvisioningEvent::ConnectionLost(e.to_string()));
                return WorkflowOutcome::Fatal(e.to_string());
            }
        };
        self.transition(ProvisioningEvent::IdentityRead);

        let record = match self.resolver.resolve(&device.identity).await {
            Ok(record) => record,
            Err(e) => return self.fail(e).await,
        };
        let directive = match record.directive() {
            Ok(directive) => directive,
            Err(e) => return self.fail(e).await,
        };
        self.transition(ProvisioningEvent::InventoryResolved);

        // Nothing irreversible may start while the event can fire again
        if let Err(e) = self.retry.deactivate().await {
            return self.fail(e).await;
        }

        match self
            .upgrade
            .upgrade_if_needed(&device.identity, &device.hostname, &directive)
            .await
        {
            UpgradeOutcome::NotNeeded => self.transition(ProvisioningEvent::UpgradeDecided),
            UpgradeOutcome::Upgraded => {
                self.transition(ProvisioningEvent::UpgradeDecided);
                self.transition(ProvisioningEvent::RebootIssued);
                return self.schedule(RetryReason::PostReboot).await;
            }
            UpgradeOutcome::Failed(e) => return self.fail(e).await,
        }

        match self.configure.fetch_and_apply(&record.device_id).await {
            ConfigOutcome::Applied => {
                self.transition(ProvisioningEvent::ConfigValidated);
                self.transition(ProvisioningEvent::ConfigCommitted);
                info!("ZTP Process Completed. Device is ready for deployment.");
                WorkflowOutcome::Completed
            }
            ConfigOutcome::ApplyFailed => {
                self.transition(ProvisioningEvent::ConfigValidated);
                self.fail_with("configuration commit failed").await
            }
            ConfigOutcome::CheckFailed => self.fail_with("configuration check failed").await,
            ConfigOutcome::FetchFailed => {
                self.fail_with("configuration could not be fetched").await
            }
        }
    }

    async fn fail(&mut self, err: ZtpError) -> WorkflowOutcome {
        error!("{}", err);
        if err.needs_operator() {
            warn!("Inventory data needs attention before this device can be provisioned");
        }
        self.fail_with(&err.to_string()).await
    }

    async fn fail_with(&mut self, reason: &str) -> WorkflowOutcome {
        self.transition(ProvisioningEvent::Failed(reason.to_string()));
        self.schedule(RetryReason::Retry).await
    }

    async fn schedule(&mut self, reason: RetryReason) -> WorkflowOutcome {
        let trigger_armed = match self.retry.reactivate(reason).await {
            Ok(()) => true,
            Err(_) => {
                error!("Retry event could not be re-armed; ZTP will not run again on its own");
                false
            }
        };
        WorkflowOutcome::RetryScheduled {
            reason,
            trigger_armed,
        }
    }

    fn transition(&mut self, event: ProvisioningEvent) {
        match self.fsm.process(event) {
            Ok(()) => debug!("Provisioning state: {:?}", self.fsm.state()),
            Err(e) => warn!("{}", e),
        }
    }
}
