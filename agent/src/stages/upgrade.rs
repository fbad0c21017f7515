//! Software upgrade stage

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};
use url::Url;

use crate::device::{DeviceConnector, DeviceSession, ProgressSink};
use crate::errors::ZtpError;
use crate::models::device::{DeviceIdentity, InstallMode, InstallRequest, RebootRequest};
use crate::models::inventory::ProvisioningDirective;

/// Result of the upgrade decision
#[derive(Debug)]
pub enum UpgradeOutcome {
    /// Already on the target version
    NotNeeded,

    /// Package installed and reboot issued
    Upgraded,

    /// Install or reboot failed
    Failed(ZtpError),
}

/// Upgrade stage options
#[derive(Debug, Clone)]
pub struct UpgradeOptions {
    /// Directory URL packages are served from
    pub firmware_base_url: String,

    /// Wait after the reboot command before handing back control
    pub reboot_settle: Duration,
}

impl Default for UpgradeOptions {
    fn default() -> Self {
        Self {
            firmware_base_url: "http://files.example.net/juniper/firmware/".to_string(),
            reboot_settle: Duration::from_secs(30),
        }
    }
}

/// Progress sink writing install reports to the log
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn report(&self, host: &str, report: &str) {
        info!("host: {}, report: {}", host, report);
    }
}

/// True when the device already runs the target release. Either the version
/// strings match or the package name embeds the running version.
pub fn version_matches(running_version: &str, directive: &ProvisioningDirective) -> bool {
    let running = running_version.trim();
    running == directive.target_version || package_embeds_version(&directive.package, running)
}

/// The version must stand alone in the package name: `21.4R3` is embedded in
/// `jinstall-21.4R3-signed.tgz` but not in `jinstall-21.4R3-S5-signed.tgz`.
fn package_embeds_version(package: &str, version: &str) -> bool {
    if version.is_empty() {
        return false;
    }
    package.match_indices(version).any(|(start, _)| {
        let before = package[..start].chars().next_back();
        let after = &package[start + version.len()..];
        matches!(before, None | Some('-') | Some('_')) && ends_version(after)
    })
}

fn ends_version(rest: &str) -> bool {
    let mut chars = rest.chars();
    match chars.next() {
        None | Some('_') => true,
        // Extension, not a respin number like `.3`
        Some('.') => !chars.next().is_some_and(|c| c.is_ascii_digit()),
        // Service or special release suffix, e.g. `-S5` or `-D10`
        Some('-') => !matches!(
            (chars.next(), chars.next()),
            (Some(l), Some(d)) if l.is_ascii_uppercase() && d.is_ascii_digit()
        ),
        Some(_) => false,
    }
}

/// Download URL for a package; absolute package URLs are used as they are
pub fn package_url(firmware_base_url: &str, package: &str) -> Result<String, ZtpError> {
    if ["http://", "https://", "ftp://"]
        .iter()
        .any(|scheme| package.starts_with(scheme))
    {
        return Ok(package.to_string());
    }

    let mut base = Url::parse(firmware_base_url).map_err(|e| {
        ZtpError::Settings(format!("invalid firmware URL {}: {}", firmware_base_url, e))
    })?;
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base.join(package)
        .map(String::from)
        .map_err(|e| ZtpError::Settings(format!("invalid package name {}: {}", package, e)))
}

/// Installs the target image and reboots when the running version differs
pub struct SoftwareUpgradeStage {
    connector: Arc<dyn DeviceConnector>,
    options: UpgradeOptions,
    progress: Arc<dyn ProgressSink>,
}

impl SoftwareUpgradeStage {
    pub fn new(
        connector: Arc<dyn DeviceConnector>,
        options: UpgradeOptions,
        progress: Arc<dyn ProgressSink>,
    ) -> Self {
        Self {
            connector,
            options,
            progress,
        }
    }

    pub async fn upgrade_if_needed(
        &self,
        identity: &DeviceIdentity,
        hostname: &str,
        directive: &ProvisioningDirective,
    ) -> UpgradeOutcome {
        if version_matches(&identity.running_version, directive) {
            info!(
                "Device {} is already running version {}. Continuing.",
                hostname, identity.running_version
            );
            return UpgradeOutcome::NotNeeded;
        }

        info!(
            "Device {} needs to be upgraded to {}",
            hostname, directive.target_version
        );
        match self.install_and_reboot(identity, hostname, directive).await {
            Ok(()) => {
                tokio::time::sleep(self.options.reboot_settle).await;
                UpgradeOutcome::Upgraded
            }
            Err(e) => {
                error!("Unable to Install Software on {}: {}", hostname, e);
                UpgradeOutcome::Failed(e)
            }
        }
    }

    async fn install_and_reboot(
        &self,
        identity: &DeviceIdentity,
        hostname: &str,
        directive: &ProvisioningDirective,
    ) -> Result<(), ZtpError> {
        let request = InstallRequest {
            package_url: package_url(&self.options.firmware_base_url, &directive.package)?,
            mode: InstallMode::select(directive.is_vm_host, directive.force_host_mode),
            no_copy: true,
        };

        info!(
            "Installing {} on {} ({})",
            directive.package, hostname, identity.model
        );
        match request.mode {
            InstallMode::VmHost => info!("Device is a VM host. Installing VM host package."),
            InstallMode::ForceHost => info!("Device is a VM host. Forcing VM host package."),
            InstallMode::Standard => {}
        }

        let mut session = self.connector.open().await?;
        let result = self
            .run_install(session.as_mut(), &request, directive.is_vm_host)
            .await;
        if let Err(e) = session.close().await {
            warn!("Error closing device session: {}", e);
        }
        result
    }

    async fn run_install(
        &self,
        session: &mut dyn DeviceSession,
        request: &InstallRequest,
        vm_host: bool,
    ) -> Result<(), ZtpError> {
        let installed = session
            .install(request, self.progress.as_ref())
            .await
            .map_err(|e| match e {
                ZtpError::Install(msg) => ZtpError::Install(msg),
                other => ZtpError::Install(format!("Error installing software: {}", other)),
            })?;
        if !installed {
            return Err(ZtpError::Install(format!(
                "device reported a failed install of {}",
                request.package_url
            )));
        }

        info!("Rebooting device");
        session.reboot(&RebootRequest::immediate(vm_host)).await
    }
}
