//! Locked configuration transactions

use tracing::warn;

use crate::device::DeviceSession;
use crate::errors::ZtpError;
use crate::models::device::ConfigLoad;

/// How a transaction finishes once the candidate is loaded
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitMode {
    /// Dry run: validate only
    Check,

    /// Activate, optionally with a commit comment
    Commit { comment: Option<String> },
}

/// Run lock -> load -> check|commit -> unlock on one session.
///
/// Once the lock is held, unlock is always attempted, whatever the outcome of
/// the load or commit. An unlock failure after a successful commit is only
/// logged since the change is already active.
pub async fn run_transaction(
    session: &mut dyn DeviceSession,
    config: &ConfigLoad,
    mode: &CommitMode,
) -> Result<(), ZtpError> {
    session.lock().await?;

    let result = load_and_finish(session, config, mode).await;

    if let Err(e) = session.unlock().await {
        warn!("Error unlocking configuration: {}", e);
    }

    result
}

async fn load_and_finish(
    session: &mut dyn DeviceSession,
    config: &ConfigLoad,
    mode: &CommitMode,
) -> Result<(), ZtpError> {
    session.load(config).await?;
    match mode {
        CommitMode::Check => session.commit_check().await,
        CommitMode::Commit { comment } => session.commit(comment.as_deref()).await,
    }
}
