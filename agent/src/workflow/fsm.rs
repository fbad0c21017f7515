//! Finite State Machine for a provisioning run

use serde::{Deserialize, Serialize};

/// Provisioning state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvisioningState {
    /// Nothing known yet
    Start,

    /// Serial, model and version read from the device
    IdentityKnown,

    /// Inventory record and directives found
    InventoryResolved,

    /// Upgrade skipped or installed
    UpgradeDecided,

    /// Reboot issued; the run ends and resumes after boot
    Rebooting,

    /// Candidate configuration passed the dry run
    ConfigChecked,

    /// Configuration committed
    Applied,

    /// A stage failed; the retry trigger takes over
    Failed,

    /// The device itself could not be reached
    Fatal,
}

impl ProvisioningState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProvisioningState::Rebooting
                | ProvisioningState::Applied
                | ProvisioningState::Failed
                | ProvisioningState::Fatal
        )
    }
}

/// Provisioning event
#[derive(Debug, Clone)]
pub enum ProvisioningEvent {
    IdentityRead,
    InventoryResolved,
    UpgradeDecided,
    RebootIssued,
    ConfigValidated,
    ConfigCommitted,

    /// Recoverable stage failure
    Failed(String),

    /// No session to the device
    ConnectionLost(String),
}

/// Provisioning FSM. Transitions only move forward.
#[derive(Debug, Clone)]
pub struct ProvisioningFsm {
    state: ProvisioningState,
    error: Option<String>,
    history: Vec<ProvisioningState>,
}

impl ProvisioningFsm {
    /// Create a new FSM in the start state
    pub fn new() -> Self {
        Self {
            state: ProvisioningState::Start,
            error: None,
            history: vec![ProvisioningState::Start],
        }
    }

    /// Get current state
    pub fn state(&self) -> &ProvisioningState {
        &self.state
    }

    /// Get error message if any
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Every state visited, in order
    pub fn history(&self) -> &[ProvisioningState] {
        &self.history
    }

    /// Process an event and transition state
    pub fn process(&mut self, event: ProvisioningEvent) -> Result<(), String> {
        let new_state = match (&self.state, &event) {
            (ProvisioningState::Start, ProvisioningEvent::IdentityRead) => {
                ProvisioningState::IdentityKnown
            }
            (ProvisioningState::Start, ProvisioningEvent::ConnectionLost(err)) => {
                self.error = Some(err.clone());
                ProvisioningState::Fatal
            }
            (ProvisioningState::IdentityKnown, ProvisioningEvent::InventoryResolved) => {
                ProvisioningState::InventoryResolved
            }
            (ProvisioningState::InventoryResolved, ProvisioningEvent::UpgradeDecided) => {
                ProvisioningState::UpgradeDecided
            }
            (ProvisioningState::UpgradeDecided, ProvisioningEvent::RebootIssued) => {
                ProvisioningState::Rebooting
            }
            (ProvisioningState::UpgradeDecided, ProvisioningEvent::ConfigValidated) => {
                ProvisioningState::ConfigChecked
            }
            (ProvisioningState::ConfigChecked, ProvisioningEvent::ConfigCommitted) => {
                ProvisioningState::Applied
            }

            // Any stage can fail until the run is over
            (state, ProvisioningEvent::Failed(err)) if !state.is_terminal() => {
                self.error = Some(err.clone());
                ProvisioningState::Failed
            }

            // Invalid transitions
            (state, event) => {
                return Err(format!("Invalid transition: {:?} -> {:?}", state, event));
            }
        };

        self.history.push(new_state.clone());
        self.state = new_state;
        Ok(())
    }
}

impl Default for ProvisioningFsm {
    fn default() -> Self {
        Self::new()
    }
}
