//! Main application run

use std::sync::Arc;

use tracing::{error, info};

use crate::app::options::AppOptions;
use crate::device::junos_cli::JunosCliConnector;
use crate::device::DeviceConnector;
use crate::errors::ZtpError;
use crate::filesys::file::File;
use crate::http::client::{HttpClient, HttpClientOptions};
use crate::http::netbox::NetboxClient;
use crate::inventory::model_table::ModelTable;
use crate::inventory::resolver::{ConfigContextResolver, ModelTableResolver};
use crate::inventory::{InventoryApi, InventoryResolver};
use crate::retry::controller::{EventRetryController, RetryReason};
use crate::stages::configure::ConfigurationStage;
use crate::stages::upgrade::{LogProgress, SoftwareUpgradeStage};
use crate::storage::settings::DirectiveSourceKind;
use crate::workflow::controller::{WorkflowController, WorkflowOutcome};

/// Run one provisioning pass against the local device
pub async fn run(agent_version: String, options: AppOptions) -> WorkflowOutcome {
    let run_id = uuid::Uuid::new_v4();
    info!("Starting ZTP run {} (agent {})", run_id, agent_version);

    let connector: Arc<dyn DeviceConnector> = Arc::new(JunosCliConnector::new(
        options.device.cli_path.clone(),
        options.device.scratch_dir.clone(),
    ));
    run_with_connector(connector, options).await
}

/// Run one provisioning pass through the given device connector
pub async fn run_with_connector(
    connector: Arc<dyn DeviceConnector>,
    options: AppOptions,
) -> WorkflowOutcome {
    let retry = EventRetryController::new(connector.clone(), options.retry.clone());

    let api = match init_inventory_api(options.inventory, &options.render_format) {
        Ok(api) => api,
        Err(e) => return abort(&retry, e).await,
    };
    let model_table = File::new(options.model_table_path);
    let resolver = match init_resolver(api.clone(), options.directive_source, &model_table).await {
        Ok(resolver) => resolver,
        Err(e) => return abort(&retry, e).await,
    };

    let upgrade =
        SoftwareUpgradeStage::new(connector.clone(), options.upgrade, Arc::new(LogProgress));
    let configure = ConfigurationStage::new(connector.clone(), api);

    let mut controller = WorkflowController::new(connector, resolver, retry, upgrade, configure);
    let outcome = controller.run().await;
    info!(
        "ZTP run finished in state {:?} with outcome {:?}",
        controller.state(),
        outcome
    );
    outcome
}

// =============================== INITIALIZATION ================================== //

fn init_inventory_api(
    options: HttpClientOptions,
    render_format: &str,
) -> Result<Arc<dyn InventoryApi>, ZtpError> {
    let http = HttpClient::new(options)?;
    info!("Using inventory at {}", http.base_url());
    Ok(Arc::new(NetboxClient::new(http, render_format)))
}

async fn init_resolver(
    api: Arc<dyn InventoryApi>,
    source: DirectiveSourceKind,
    model_table: &File,
) -> Result<Arc<dyn InventoryResolver>, ZtpError> {
    match source {
        DirectiveSourceKind::ConfigContext => Ok(Arc::new(ConfigContextResolver::new(api))),
        DirectiveSourceKind::ModelTable => {
            let table = ModelTable::load(model_table).await?;
            info!(
                "Loaded {} model table entries from {:?}",
                table.entries.len(),
                model_table.path()
            );
            Ok(Arc::new(ModelTableResolver::new(api, table)))
        }
    }
}

/// Setup failed before the workflow started; leave the retry event armed.
/// A device that cannot be reached at all ends the run as fatal.
async fn abort(retry: &EventRetryController, err: ZtpError) -> WorkflowOutcome {
    error!("Failed to start the ZTP workflow: {}", err);
    let trigger_armed = match retry.reactivate(RetryReason::Retry).await {
        Ok(()) => true,
        Err(ZtpError::Connection(msg)) => {
            error!("Unable to open a session to this device: {}", msg);
            return WorkflowOutcome::Fatal(msg);
        }
        Err(_) => false,
    };
    WorkflowOutcome::RetryScheduled {
        reason: RetryReason::Retry,
        trigger_armed,
    }
}
