//! Device facts reader

use tracing::{info, warn};

use crate::device::DeviceConnector;
use crate::errors::ZtpError;
use crate::models::device::{DeviceFacts, DeviceIdentity};

/// Identity plus the hostname of the session it was read from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentifiedDevice {
    pub identity: DeviceIdentity,
    pub hostname: String,
}

/// Open a session and read the device identity.
///
/// Any failure here is reported as [`ZtpError::Connection`]: without a usable
/// management session nothing else in the workflow can run.
pub async fn read_identity(connector: &dyn DeviceConnector) -> Result<IdentifiedDevice, ZtpError> {
    let mut session = connector.open().await?;
    let facts = session.facts().await;
    if let Err(e) = session.close().await {
        warn!("Error closing device session: {}", e);
    }

    let facts = facts.map_err(|e| match e {
        ZtpError::Connection(msg) => ZtpError::Connection(msg),
        other => ZtpError::Connection(format!("unable to read device facts: {}", other)),
    })?;
    let hostname = facts.hostname.clone().unwrap_or_else(|| "localhost".to_string());
    let identity = identity_from_facts(facts)?;

    info!("This device's serial number: {}", identity.serial);
    info!("This device's model: {}", identity.model);
    info!("This device's version: {}", identity.running_version);

    Ok(IdentifiedDevice { identity, hostname })
}

fn identity_from_facts(facts: DeviceFacts) -> Result<DeviceIdentity, ZtpError> {
    let required = |value: Option<String>, name: &str| {
        value
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ZtpError::Connection(format!("device facts are missing the {}", name)))
    };

    Ok(DeviceIdentity {
        serial: required(facts.serial, "serial number")?,
        model: required(facts.model, "model")?.to_uppercase(),
        running_version: required(facts.version, "software version")?,
    })
}
