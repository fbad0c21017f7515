//! ZTP Agent - Entry Point
//!
//! Zero-touch provisioning for Junos devices. Runs on the device itself,
//! started by the device's ZTP event, and exits after a single pass.

use std::collections::HashMap;
use std::env;
use std::path::PathBuf;

use ztp_agent::app::options::AppOptions;
use ztp_agent::app::run::run;
use ztp_agent::filesys::file::File;
use ztp_agent::logs::syslog::{facility_code, SyslogOptions, SyslogTarget};
use ztp_agent::logs::{init_logging, LogOptions};
use ztp_agent::storage::layout::StorageLayout;
use ztp_agent::storage::settings::{Settings, SyslogSettings};
use ztp_agent::utils::version_info;

use tracing::{debug, info, warn};

/// Exit code when the agent cannot even load its settings
const EXIT_CONFIG: i32 = 78;

fn main() {
    // Parse command line arguments
    let args: Vec<String> = env::args().collect();
    let mut cli_args: HashMap<String, String> = HashMap::new();

    for arg in args.iter().skip(1) {
        if let Some((key, value)) = arg.split_once('=') {
            // Handle --key=value format
            let clean_key = key.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), value.to_string());
        } else if arg.starts_with("--") {
            // Handle standalone flags like --version
            let clean_key = arg.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), "true".to_string());
        }
    }

    // Print version and exit
    let version = version_info();
    if cli_args.contains_key("version") {
        match serde_json::to_string_pretty(&version) {
            Ok(json) => println!("{}", json),
            Err(_) => println!("{}", version.version),
        }
        return;
    }

    let code = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime.block_on(run_agent(version.version, cli_args)),
        Err(e) => {
            eprintln!("Failed to start the async runtime: {e}");
            EXIT_CONFIG
        }
    };
    std::process::exit(code);
}

async fn run_agent(agent_version: String, cli_args: HashMap<String, String>) -> i32 {
    // Retrieve the settings file
    let (layout, settings_file) = match cli_args.get("settings") {
        Some(path) => {
            let path = PathBuf::from(path);
            let base_dir = path
                .parent()
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("."));
            (StorageLayout::new(base_dir), File::new(path))
        }
        None => {
            let layout = StorageLayout::default();
            let file = layout.settings_file();
            (layout, file)
        }
    };

    let (mut settings, settings_found) = match settings_file.read_json_optional::<Settings>().await
    {
        Ok(Some(settings)) => (settings, true),
        Ok(None) => (Settings::default(), false),
        Err(e) => {
            eprintln!("Unable to read settings file: {e}");
            return EXIT_CONFIG;
        }
    };
    settings.apply_env_overrides();

    // Initialize logging
    let log_options = LogOptions {
        log_level: settings.log_level.clone(),
        log_file: settings.log_file.as_ref().map(PathBuf::from),
        syslog: syslog_options(&settings.syslog),
        ..Default::default()
    };
    let guard = match init_logging(log_options.clone()) {
        Ok(guard) => Some(guard),
        Err(e) if log_options.syslog.is_some() => {
            // Keep the local sinks when the syslog socket is unavailable
            println!("Failed to initialize syslog: {e}");
            init_logging(LogOptions {
                syslog: None,
                ..log_options
            })
            .ok()
        }
        Err(e) => {
            println!("Failed to initialize logging: {e}");
            None
        }
    };

    if settings_found {
        debug!("Loaded settings from {:?}", settings_file.path());
    } else {
        warn!(
            "No settings file at {:?}, using defaults",
            settings_file.path()
        );
    }

    let options = AppOptions::from_settings(&settings, &layout);
    info!("Running ZTP Agent with options: {:?}", options);
    let outcome = run(agent_version, options).await;
    let code = outcome.exit_code();

    drop(guard);
    code
}

fn syslog_options(settings: &SyslogSettings) -> Option<SyslogOptions> {
    if !settings.enabled {
        return None;
    }
    let target = match settings.target.parse::<SyslogTarget>() {
        Ok(target) => target,
        Err(e) => {
            eprintln!("{e}, remote audit log disabled");
            return None;
        }
    };
    let facility = facility_code(&settings.facility).unwrap_or_else(|| {
        eprintln!("Unknown syslog facility {}, using user", settings.facility);
        1
    });
    Some(SyslogOptions {
        target,
        facility,
        target_prefix: "ztp_agent".to_string(),
    })
}
