//! Junos CLI adapter tests against a scripted `cli` executable

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use std::time::Duration;

use tokio_test::{assert_err, assert_ok};

use ztp_agent::device::junos_cli::JunosCliConnector;
use ztp_agent::device::{DeviceConnector, DeviceSession};
use ztp_agent::errors::ZtpError;
use ztp_agent::models::device::{ConfigLoad, InstallMode, InstallRequest, RebootRequest};

use crate::support::{RecordingProgress, VALID_CONFIG};

/// Answers the commands the adapter sends. Configuration scripts arrive on
/// stdin and are appended to `cli.log`.
const CLI_SCRIPT: &str = r##"#!/bin/sh
DIR=$(dirname "$0")
LOG="$DIR/cli.log"

if [ "$1" = "-c" ]; then
    echo "cmd: $2" >> "$LOG"
    case "$2" in
    "show version | display json")
        cat <<'JSON'
{"software-information": [{
    "host-name": [{"data": "ztp-sw1"}],
    "product-model": [{"data": "ex4300-48t"}],
    "junos-version": [{"data": "21.4R3-S5"}]
}]}
JSON
        ;;
    "show chassis hardware | display json")
        cat <<'JSON'
{"chassis-inventory": [{"chassis": [{
    "name": [{"data": "Chassis"}],
    "serial-number": [{"data": "XYZ999"}]
}]}]}
JSON
        ;;
    *broken.tgz*)
        echo "Validating package"
        echo "ERROR: package signature verification failed" >&2
        ;;
    "request system software add"*)
        echo "Validating package"
        i=0
        while [ $i -lt 4000 ]; do
            echo "pkg: verifying file $i of 4000 in the package archive, please wait" >&2
            i=$((i + 1))
        done
        echo "Install completed"
        ;;
    "request system reboot in"*)
        read answer
        echo "answer: $answer" >> "$LOG"
        echo "Shutdown NOW!"
        ;;
    *)
        cat > /dev/null
        echo "error: unknown command: $2"
        exit 1
        ;;
    esac
    exit 0
fi

script=$(cat)
echo "--- script" >> "$LOG"
printf '%s\n' "$script" >> "$LOG"

if [ -f "$DIR/locked" ]; then
    echo "error: configuration database locked by:"
    echo "  root terminal p0 (pid 4242) on since 2024-05-01 10:00:00 UTC"
    exit 1
fi

printf '%s\n' "$script" | while IFS= read -r line; do
    case "$line" in
    "load override "*)
        f="${line#load override }"
        if [ -f "$f" ]; then
            cp "$f" "$DIR/last-candidate.conf"
            echo "load complete"
        else
            echo "error: could not open configuration file"
        fi
        ;;
    "commit check")
        echo "configuration check succeeds"
        ;;
    commit*)
        echo "commit complete"
        ;;
    esac
done
"##;

/// A scratch directory holding the scripted `cli`
struct FakeCli {
    dir: PathBuf,
}

impl FakeCli {
    fn new() -> Self {
        let dir = std::env::temp_dir().join(format!("ztp-cli-{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();

        let cli = dir.join("cli");
        fs::write(&cli, CLI_SCRIPT).unwrap();
        fs::set_permissions(&cli, fs::Permissions::from_mode(0o755)).unwrap();
        Self { dir }
    }

    fn connector(&self) -> JunosCliConnector {
        JunosCliConnector::new(self.dir.join("cli"), self.scratch_dir())
    }

    fn scratch_dir(&self) -> PathBuf {
        self.dir.join("scratch")
    }

    fn lock_database(&self) {
        fs::write(self.dir.join("locked"), "").unwrap();
    }

    fn log(&self) -> String {
        fs::read_to_string(self.dir.join("cli.log")).unwrap_or_default()
    }

    fn last_candidate(&self) -> String {
        fs::read_to_string(self.dir.join("last-candidate.conf")).unwrap_or_default()
    }

    fn candidate_files(&self) -> Vec<PathBuf> {
        match fs::read_dir(self.scratch_dir()) {
            Ok(entries) => entries.map(|e| e.unwrap().path()).collect(),
            Err(_) => Vec::new(),
        }
    }
}

impl Drop for FakeCli {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.dir);
    }
}

fn install_request(package: &str) -> InstallRequest {
    InstallRequest {
        package_url: format!("http://files.example.net/juniper/firmware/{}", package),
        mode: InstallMode::Standard,
        no_copy: true,
    }
}

#[tokio::test]
async fn test_open_reads_facts() {
    let cli = FakeCli::new();
    let mut session = assert_ok!(cli.connector().open().await);
    assert_eq!(session.hostname(), "ztp-sw1");

    let facts = assert_ok!(session.facts().await);
    assert_eq!(facts.serial.as_deref(), Some("XYZ999"));
    assert_eq!(facts.model.as_deref(), Some("ex4300-48t"));
    assert_eq!(facts.version.as_deref(), Some("21.4R3-S5"));
}

#[tokio::test]
async fn test_check_runs_one_batched_script() {
    let cli = FakeCli::new();
    let mut session = assert_ok!(cli.connector().open().await);

    assert_ok!(session.lock().await);
    assert_ok!(session.load(&ConfigLoad::Override(VALID_CONFIG.to_string())).await);
    assert!(!cli.log().contains("--- script"));
    assert_eq!(cli.candidate_files().len(), 1);

    assert_ok!(session.commit_check().await);
    assert_ok!(session.unlock().await);

    let log = cli.log();
    let script: Vec<&str> = log
        .split("--- script\n")
        .nth(1)
        .unwrap()
        .lines()
        .collect();
    assert_eq!(script.len(), 5);
    assert_eq!(script[0], "configure exclusive");
    assert!(script[1].starts_with("load override "));
    assert!(script[1].contains("ztp-candidate-"));
    assert_eq!(&script[2..], ["commit check", "rollback 0", "exit configuration-mode"]);

    // The candidate reached the device intact and is gone afterwards
    assert_eq!(cli.last_candidate(), VALID_CONFIG);
    assert!(cli.candidate_files().is_empty());
}

#[tokio::test]
async fn test_stanza_commit_script() {
    let cli = FakeCli::new();
    let mut session = assert_ok!(cli.connector().open().await);

    assert_ok!(session.lock().await);
    assert_ok!(
        session
            .load(&ConfigLoad::Set("deactivate event-options policy ztp\n".to_string()))
            .await
    );
    assert_ok!(session.commit(None).await);
    assert_ok!(session.unlock().await);

    let log = cli.log();
    assert!(log.contains(
        "--- script\nconfigure exclusive\ndeactivate event-options policy ztp\ncommit\nexit configuration-mode\n"
    ));
}

#[tokio::test]
async fn test_close_removes_candidate_files() {
    let cli = FakeCli::new();
    let mut session = assert_ok!(cli.connector().open().await);

    assert_ok!(session.lock().await);
    assert_ok!(session.load(&ConfigLoad::Override(VALID_CONFIG.to_string())).await);
    assert_eq!(cli.candidate_files().len(), 1);

    assert_ok!(session.close().await);
    assert!(cli.candidate_files().is_empty());
}

#[tokio::test]
async fn test_locked_database_is_lock_error() {
    let cli = FakeCli::new();
    cli.lock_database();
    let mut session = assert_ok!(cli.connector().open().await);

    assert_ok!(session.lock().await);
    assert_ok!(session.load(&ConfigLoad::Override(VALID_CONFIG.to_string())).await);
    let err = assert_err!(session.commit_check().await);
    assert!(matches!(err, ZtpError::Lock(_)));

    assert_ok!(session.unlock().await);
    assert!(cli.candidate_files().is_empty());
}

#[tokio::test]
async fn test_install_streams_stdout_and_stderr() {
    let cli = FakeCli::new();
    let mut session = assert_ok!(cli.connector().open().await);
    let progress = RecordingProgress::default();

    let request = install_request("jinstall-ex-4300-21.4R3-S5-signed.tgz");
    let installed = tokio::time::timeout(
        Duration::from_secs(30),
        session.install(&request, &progress),
    )
    .await
    .expect("install stalled");
    assert!(assert_ok!(installed));

    let lines = progress.lines();
    assert_eq!(lines.len(), 4002);
    assert!(lines.contains(&"ztp-sw1: Validating package".to_string()));
    assert!(lines.contains(&"ztp-sw1: Install completed".to_string()));
    assert!(lines.contains(
        &"ztp-sw1: pkg: verifying file 3999 of 4000 in the package archive, please wait".to_string()
    ));
    assert!(cli
        .log()
        .contains("cmd: request system software add http://files.example.net/juniper/firmware/jinstall-ex-4300-21.4R3-S5-signed.tgz no-copy"));
}

#[tokio::test]
async fn test_install_error_on_stderr_fails_install() {
    let cli = FakeCli::new();
    let mut session = assert_ok!(cli.connector().open().await);
    let progress = RecordingProgress::default();

    let installed = assert_ok!(session.install(&install_request("broken.tgz"), &progress).await);
    assert!(!installed);
    assert!(progress
        .lines()
        .contains(&"ztp-sw1: ERROR: package signature verification failed".to_string()));
}

#[tokio::test]
async fn test_reboot_confirms_prompt() {
    let cli = FakeCli::new();
    let mut session = assert_ok!(cli.connector().open().await);

    assert_ok!(session.reboot(&RebootRequest::immediate(false)).await);

    let log = cli.log();
    assert!(log.contains("cmd: request system reboot in 0\n"));
    assert!(log.contains("answer: yes\n"));
}

#[tokio::test]
async fn test_rejected_reboot_is_error() {
    let cli = FakeCli::new();
    let mut session = assert_ok!(cli.connector().open().await);

    // The scripted cli has no vmhost support
    let err = assert_err!(session.reboot(&RebootRequest::immediate(true)).await);
    assert!(matches!(err, ZtpError::Install(_)));
}
