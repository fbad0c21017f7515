//! End-to-end workflow tests against the fake device and inventory

use std::sync::Arc;

use serde_json::json;

use ztp_agent::inventory::model_table::{ModelEntry, ModelTable};
use ztp_agent::inventory::resolver::ModelTableResolver;
use ztp_agent::inventory::InventoryApi;
use ztp_agent::models::device::ConfigLoad;
use ztp_agent::retry::controller::RetryReason;
use ztp_agent::workflow::controller::{WorkflowController, WorkflowOutcome};
use ztp_agent::workflow::fsm::ProvisioningState;

use crate::support::{
    controller, controller_with_resolver, device_record, facts, Call, DeviceScript, FakeDevice,
    FakeInventory, VALID_CONFIG,
};

fn device(serial: &str, model: &str, version: &str) -> Arc<FakeDevice> {
    FakeDevice::new(DeviceScript {
        facts: facts(serial, model, version),
        ..Default::default()
    })
}

fn inventory(serial: &str, model: &str) -> Arc<FakeInventory> {
    FakeInventory::new(
        vec![(
            serial,
            device_record(
                42,
                "sw1",
                model,
                json!({
                    "pkg": "jinstall-ex-4300-{target_version}-signed.tgz",
                    "target_version": "21.4R3",
                }),
            ),
        )],
        VALID_CONFIG,
    )
}

fn retry_scheduled(reason: RetryReason) -> WorkflowOutcome {
    WorkflowOutcome::RetryScheduled {
        reason,
        trigger_armed: true,
    }
}

#[tokio::test]
async fn test_unknown_serial_schedules_retry() {
    let device = device("ABC123", "EX4300", "21.4R3");
    let inventory = inventory("XYZ999", "EX4300");
    let mut controller = controller(&device, &inventory);

    let outcome = controller.run().await;
    assert_eq!(outcome, retry_scheduled(RetryReason::Retry));
    assert_eq!(outcome.exit_code(), 75);
    assert_eq!(controller.state(), &ProvisioningState::Failed);

    assert_eq!(device.installs(), 0);
    assert_eq!(device.override_loads(), 0);
    assert_eq!(inventory.render_calls(), 0);
    assert_eq!(device.activations(), 1);
}

#[tokio::test]
async fn test_model_mismatch_schedules_retry() {
    let device = device("XYZ999", "EX4300", "21.4R3");
    let inventory = inventory("XYZ999", "EX4100");
    let mut controller = controller(&device, &inventory);

    let outcome = controller.run().await;
    assert_eq!(outcome, retry_scheduled(RetryReason::Retry));
    assert_eq!(device.installs(), 0);
    assert_eq!(device.override_loads(), 0);
    assert_eq!(device.activations(), 1);
}

#[tokio::test]
async fn test_matching_version_goes_to_configuration() {
    let device = device("XYZ999", "EX4300", "21.4R3");
    let inventory = inventory("XYZ999", "EX4300");
    let mut controller = controller(&device, &inventory);

    let outcome = controller.run().await;
    assert_eq!(outcome, WorkflowOutcome::Completed);
    assert_eq!(outcome.exit_code(), 0);
    assert_eq!(controller.state(), &ProvisioningState::Applied);

    assert_eq!(device.installs(), 0);
    assert_eq!(device.reboots(), 0);
    assert_eq!(inventory.render_calls(), 1);
    assert_eq!(device.commented_commits(), 1);

    // The trigger stays off once the device is provisioned
    assert_eq!(device.deactivations(), 1);
    assert_eq!(device.activations(), 0);
}

#[tokio::test]
async fn test_upgrade_reboots_before_configuration() {
    let device = device("XYZ999", "EX4300", "21.4R1");
    let inventory = inventory("XYZ999", "EX4300");
    let mut controller = controller(&device, &inventory);

    let outcome = controller.run().await;
    assert_eq!(outcome, retry_scheduled(RetryReason::PostReboot));
    assert_eq!(controller.state(), &ProvisioningState::Rebooting);

    assert_eq!(device.installs(), 1);
    assert_eq!(device.reboots(), 1);
    assert_eq!(device.activations(), 1);
    assert_eq!(inventory.render_calls(), 0);
    assert_eq!(device.override_loads(), 0);

    // Re-armed only after the reboot was issued
    let calls = device.calls();
    let reboot_at = calls.iter().position(|c| matches!(c, Call::Reboot(_)));
    let activate_at = calls.iter().position(
        |c| matches!(c, Call::Load(ConfigLoad::Set(s)) if s.starts_with("activate ")),
    );
    assert!(reboot_at < activate_at);
}

#[tokio::test]
async fn test_rejected_check_schedules_retry() {
    let device = FakeDevice::new(DeviceScript {
        facts: facts("XYZ999", "EX4300", "21.4R3"),
        commit_check_fails: true,
        ..Default::default()
    });
    let inventory = inventory("XYZ999", "EX4300");
    let mut controller = controller(&device, &inventory);

    let outcome = controller.run().await;
    assert_eq!(outcome, retry_scheduled(RetryReason::Retry));
    assert_eq!(device.commit_checks(), 1);
    assert_eq!(device.commented_commits(), 0);
    assert_eq!(device.activations(), 1);
}

#[tokio::test]
async fn test_trigger_deactivated_before_install() {
    let device = device("XYZ999", "EX4300", "21.4R1");
    let inventory = inventory("XYZ999", "EX4300");
    let mut controller = controller(&device, &inventory);

    controller.run().await;

    let calls = device.calls();
    let deactivate_at = calls.iter().position(
        |c| matches!(c, Call::Load(ConfigLoad::Set(s)) if s.starts_with("deactivate ")),
    );
    let install_at = calls.iter().position(|c| matches!(c, Call::Install(_)));
    assert!(deactivate_at.is_some());
    assert!(deactivate_at < install_at);
}

#[tokio::test]
async fn test_failed_install_schedules_one_retry() {
    let device = FakeDevice::new(DeviceScript {
        facts: facts("XYZ999", "EX4300", "21.4R1"),
        install_result: Some(Ok(false)),
        ..Default::default()
    });
    let inventory = inventory("XYZ999", "EX4300");
    let mut controller = controller(&device, &inventory);

    let outcome = controller.run().await;
    assert_eq!(outcome, retry_scheduled(RetryReason::Retry));
    assert_eq!(device.reboots(), 0);
    assert_eq!(device.activations(), 1);
    assert_eq!(inventory.render_calls(), 0);
}

#[tokio::test]
async fn test_incomplete_directive_never_reaches_stages() {
    let device = device("XYZ999", "EX4300", "21.4R1");
    let inventory = FakeInventory::new(
        vec![(
            "XYZ999",
            device_record(42, "sw1", "EX4300", json!({"target_version": "21.4R3"})),
        )],
        VALID_CONFIG,
    );
    let mut controller = controller(&device, &inventory);

    let outcome = controller.run().await;
    assert_eq!(outcome, retry_scheduled(RetryReason::Retry));
    assert_eq!(device.deactivations(), 0);
    assert_eq!(device.installs(), 0);
    assert_eq!(inventory.render_calls(), 0);
}

#[tokio::test]
async fn test_unreachable_device_is_fatal() {
    let device = FakeDevice::new(DeviceScript {
        open_fails: true,
        ..Default::default()
    });
    let inventory = inventory("XYZ999", "EX4300");
    let mut controller = controller(&device, &inventory);

    let outcome = controller.run().await;
    assert!(matches!(outcome, WorkflowOutcome::Fatal(_)));
    assert_eq!(outcome.exit_code(), 69);
    assert_eq!(controller.state(), &ProvisioningState::Fatal);
    assert_eq!(inventory.search_calls(), 0);
    assert_eq!(device.calls(), vec![Call::Open]);
}

#[tokio::test]
async fn test_unarmed_retry_exit_code() {
    let device = FakeDevice::new(DeviceScript {
        facts: facts("ABC123", "EX4300", "21.4R3"),
        activate_fails: true,
        ..Default::default()
    });
    let inventory = FakeInventory::empty();
    let mut controller = controller(&device, &inventory);

    let outcome = controller.run().await;
    assert_eq!(
        outcome,
        WorkflowOutcome::RetryScheduled {
            reason: RetryReason::Retry,
            trigger_armed: false,
        }
    );
    assert_eq!(outcome.exit_code(), 1);

    // One attempt only, no recursion on failure
    assert_eq!(device.activations(), 1);
}

#[tokio::test]
async fn test_fetch_failure_schedules_one_retry() {
    let device = device("XYZ999", "EX4300", "21.4R3");
    let inventory = inventory("XYZ999", "EX4300");
    inventory.fail_render("503 Service Unavailable");
    let mut controller = controller(&device, &inventory);

    let outcome = controller.run().await;
    assert_eq!(outcome, retry_scheduled(RetryReason::Retry));
    assert_eq!(controller.state(), &ProvisioningState::Failed);
    assert_eq!(inventory.render_calls(), 1);
    assert_eq!(device.override_loads(), 0);
    assert_eq!(device.activations(), 1);
}

#[tokio::test]
async fn test_apply_failure_schedules_one_retry() {
    let device = FakeDevice::new(DeviceScript {
        facts: facts("XYZ999", "EX4300", "21.4R3"),
        apply_fails: true,
        ..Default::default()
    });
    let inventory = inventory("XYZ999", "EX4300");
    let mut controller = controller(&device, &inventory);

    let outcome = controller.run().await;
    assert_eq!(outcome, retry_scheduled(RetryReason::Retry));
    assert_eq!(controller.state(), &ProvisioningState::Failed);
    assert!(controller.history().contains(&ProvisioningState::ConfigChecked));
    assert_eq!(device.commit_checks(), 1);
    assert_eq!(device.commented_commits(), 1);
    assert_eq!(device.activations(), 1);
}

#[tokio::test]
async fn test_deactivate_failure_stops_before_upgrade() {
    let device = FakeDevice::new(DeviceScript {
        facts: facts("XYZ999", "EX4300", "21.4R1"),
        deactivate_fails: true,
        ..Default::default()
    });
    let inventory = inventory("XYZ999", "EX4300");
    let mut controller = controller(&device, &inventory);

    let outcome = controller.run().await;
    assert_eq!(outcome, retry_scheduled(RetryReason::Retry));
    assert_eq!(controller.state(), &ProvisioningState::Failed);
    assert_eq!(device.deactivations(), 1);
    assert_eq!(device.installs(), 0);
    assert_eq!(inventory.render_calls(), 0);
    assert_eq!(device.activations(), 1);
}

#[tokio::test]
async fn test_reboot_failure_schedules_one_retry() {
    let device = FakeDevice::new(DeviceScript {
        facts: facts("XYZ999", "EX4300", "21.4R1"),
        reboot_fails: true,
        ..Default::default()
    });
    let inventory = inventory("XYZ999", "EX4300");
    let mut controller = controller(&device, &inventory);

    let outcome = controller.run().await;
    assert_eq!(outcome, retry_scheduled(RetryReason::Retry));
    assert_eq!(controller.state(), &ProvisioningState::Failed);
    assert_eq!(device.installs(), 1);
    assert_eq!(device.reboots(), 1);
    assert_eq!(inventory.render_calls(), 0);
    assert_eq!(device.activations(), 1);
}

fn model_table_controller(
    device: &Arc<FakeDevice>,
    inventory: &Arc<FakeInventory>,
) -> WorkflowController {
    let table = ModelTable::new(vec![ModelEntry {
        pattern: "EX4300".to_string(),
        package: Some("jinstall-ex-4300-{target_version}-signed.tgz".to_string()),
        target_version: Some("21.4R3-S5".to_string()),
        vmhost: false,
        force_host: false,
    }]);
    let api: Arc<dyn InventoryApi> = inventory.clone();
    controller_with_resolver(device, inventory, Arc::new(ModelTableResolver::new(api, table)))
}

#[tokio::test]
async fn test_model_table_directive_drives_upgrade() {
    let device = device("XYZ999", "EX4300-48T", "21.4R1");
    let inventory = FakeInventory::new(
        vec![("XYZ999", device_record(42, "sw1", "EX4300-48T", json!({})))],
        VALID_CONFIG,
    );
    let mut controller = model_table_controller(&device, &inventory);

    let outcome = controller.run().await;
    assert_eq!(outcome, retry_scheduled(RetryReason::PostReboot));

    let installed: Vec<String> = device
        .calls()
        .into_iter()
        .filter_map(|c| match c {
            Call::Install(request) => Some(request.package_url),
            _ => None,
        })
        .collect();
    assert_eq!(
        installed,
        vec![
            "http://files.example.net/juniper/firmware/jinstall-ex-4300-21.4R3-S5-signed.tgz"
                .to_string()
        ]
    );
}

#[tokio::test]
async fn test_model_table_directive_on_target_completes() {
    let device = device("XYZ999", "EX4300-48T", "21.4R3-S5");
    let inventory = FakeInventory::new(
        vec![("XYZ999", device_record(42, "sw1", "EX4300-48T", json!({})))],
        VALID_CONFIG,
    );
    let mut controller = model_table_controller(&device, &inventory);

    let outcome = controller.run().await;
    assert_eq!(outcome, WorkflowOutcome::Completed);
    assert_eq!(device.installs(), 0);
    assert_eq!(device.commented_commits(), 1);
}

#[tokio::test]
async fn test_model_table_without_entry_schedules_retry() {
    let device = device("QFX001", "QFX5120", "21.4R1");
    let inventory = FakeInventory::new(
        vec![("QFX001", device_record(5, "leaf1", "QFX5120", json!({})))],
        VALID_CONFIG,
    );
    let mut controller = model_table_controller(&device, &inventory);

    let outcome = controller.run().await;
    assert_eq!(outcome, retry_scheduled(RetryReason::Retry));
    assert_eq!(device.deactivations(), 0);
    assert_eq!(device.installs(), 0);
    assert_eq!(device.activations(), 1);
}
