//! Device management interface
//!
//! The workflow only talks to the device through these traits. Every stage
//! opens its own session through a [`DeviceConnector`], does its work and
//! drops the session.

pub mod facts;
pub mod junos_cli;
pub mod transaction;

use async_trait::async_trait;

use crate::errors::ZtpError;
use crate::models::device::{ConfigLoad, DeviceFacts, InstallRequest, RebootRequest};

/// Receives progress lines while a software package installs
pub trait ProgressSink: Send + Sync {
    fn report(&self, host: &str, report: &str);
}

/// Opens sessions to the local device
#[async_trait]
pub trait DeviceConnector: Send + Sync {
    /// Open a new session. Fails with [`ZtpError::Connection`] when the
    /// management plane cannot be reached.
    async fn open(&self) -> Result<Box<dyn DeviceSession>, ZtpError>;
}

/// One management session on the device
#[async_trait]
pub trait DeviceSession: Send {
    /// Hostname the session is attached to
    fn hostname(&self) -> &str;

    /// Read identity facts
    async fn facts(&mut self) -> Result<DeviceFacts, ZtpError>;

    /// Take the exclusive configuration lock
    async fn lock(&mut self) -> Result<(), ZtpError>;

    /// Load text into the candidate configuration
    async fn load(&mut self, config: &ConfigLoad) -> Result<(), ZtpError>;

    /// Validate the candidate without activating it
    async fn commit_check(&mut self) -> Result<(), ZtpError>;

    /// Activate the candidate configuration
    async fn commit(&mut self, comment: Option<&str>) -> Result<(), ZtpError>;

    /// Release the configuration lock
    async fn unlock(&mut self) -> Result<(), ZtpError>;

    /// Install a software package. `Ok(false)` means the device reported failure.
    async fn install(
        &mut self,
        request: &InstallRequest,
        progress: &dyn ProgressSink,
    ) -> Result<bool, ZtpError>;

    /// Schedule a reboot
    async fn reboot(&mut self, request: &RebootRequest) -> Result<(), ZtpError>;

    /// Close the session
    async fn close(&mut self) -> Result<(), ZtpError> {
        Ok(())
    }
}
