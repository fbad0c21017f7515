//! On-box Junos adapter driving the `cli` binary
//!
//! Configuration transactions are batched: `lock` and `load` only record the
//! script, and the whole `configure exclusive` session runs as one `cli`
//! invocation when the transaction is checked or committed. Lock contention,
//! load errors and commit errors are classified from the script output.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::device::{DeviceConnector, DeviceSession, ProgressSink};
use crate::errors::ZtpError;
use crate::models::device::{
    ConfigLoad, DeviceFacts, InstallMode, InstallRequest, RebootRequest,
};

const LOCK_MARKERS: &[&str] = &[
    "configuration database locked",
    "database is locked",
    "users currently editing the configuration",
    "configuration database modified",
];

const LOAD_ERROR_MARKERS: &[&str] = &[
    "syntax error",
    "load complete (with errors)",
    "error: could not",
    "unknown command",
    "missing argument",
];

/// Connector for the local Junos management plane
#[derive(Debug, Clone)]
pub struct JunosCliConnector {
    cli_path: PathBuf,
    scratch_dir: PathBuf,
}

impl JunosCliConnector {
    pub fn new(cli_path: impl Into<PathBuf>, scratch_dir: impl Into<PathBuf>) -> Self {
        Self {
            cli_path: cli_path.into(),
            scratch_dir: scratch_dir.into(),
        }
    }
}

#[async_trait]
impl DeviceConnector for JunosCliConnector {
    async fn open(&self) -> Result<Box<dyn DeviceSession>, ZtpError> {
        let output = run_cli(&self.cli_path, "show version | display json", None)
            .await
            .map_err(|e| ZtpError::Connection(format!("unable to run {:?}: {}", self.cli_path, e)))?;
        if !output.success {
            return Err(ZtpError::Connection(format!(
                "management CLI is not answering: {}",
                output.stdout.trim()
            )));
        }

        let version_doc: Value = serde_json::from_str(&output.stdout)
            .map_err(|e| ZtpError::Connection(format!("unexpected 'show version' output: {}", e)))?;
        let hostname = find_data(&version_doc, "host-name").unwrap_or_else(|| "localhost".to_string());
        debug!("Opened CLI session on {}", hostname);

        Ok(Box::new(JunosCliSession {
            cli_path: self.cli_path.clone(),
            scratch_dir: self.scratch_dir.clone(),
            hostname,
            version_doc,
            script: Vec::new(),
            candidate_files: Vec::new(),
            locked: false,
        }))
    }
}

/// A session on the local Junos CLI
pub struct JunosCliSession {
    cli_path: PathBuf,
    scratch_dir: PathBuf,
    hostname: String,
    version_doc: Value,
    script: Vec<String>,
    candidate_files: Vec<PathBuf>,
    locked: bool,
}

impl JunosCliSession {
    async fn execute_script(&mut self, finish: Finish) -> Result<(), ZtpError> {
        let mut script = self.script.join("\n");
        script.push('\n');
        debug!("Running configuration script:\n{}", script);

        let output = run_cli(&self.cli_path, "", Some(&script))
            .await
            .map_err(|e| ZtpError::Connection(format!("unable to run {:?}: {}", self.cli_path, e)))?;
        classify_transaction_output(&output.stdout, finish)
    }

    async fn remove_candidate_files(&mut self) {
        for path in self.candidate_files.drain(..) {
            if let Err(e) = tokio::fs::remove_file(&path).await {
                warn!("Unable to remove candidate file {:?}: {}", path, e);
            }
        }
    }
}

#[async_trait]
impl DeviceSession for JunosCliSession {
    fn hostname(&self) -> &str {
        &self.hostname
    }

    async fn facts(&mut self) -> Result<DeviceFacts, ZtpError> {
        let chassis = run_cli(&self.cli_path, "show chassis hardware | display json", None).await?;
        let chassis_doc: Value = serde_json::from_str(&chassis.stdout)?;

        Ok(DeviceFacts {
            hostname: Some(self.hostname.clone()),
            serial: find_data(&chassis_doc, "serial-number"),
            model: find_data(&self.version_doc, "product-model"),
            version: find_data(&self.version_doc, "junos-version")
                .or_else(|| version_from_package_comment(&self.version_doc)),
        })
    }

    async fn lock(&mut self) -> Result<(), ZtpError> {
        if self.locked {
            return Err(ZtpError::Lock("configuration already locked by this session".to_string()));
        }
        self.locked = true;
        self.script = vec!["configure exclusive".to_string()];
        Ok(())
    }

    async fn load(&mut self, config: &ConfigLoad) -> Result<(), ZtpError> {
        if !self.locked {
            return Err(ZtpError::ConfigLoad("configuration is not locked".to_string()));
        }

        match config {
            ConfigLoad::Override(text) => {
                tokio::fs::create_dir_all(&self.scratch_dir).await?;
                let path = self
                    .scratch_dir
                    .join(format!("ztp-candidate-{}.conf", uuid::Uuid::new_v4()));
                tokio::fs::write(&path, text).await?;
                self.script.push(format!("load override {}", path.display()));
                self.candidate_files.push(path);
            }
            ConfigLoad::Set(text) => {
                self.script.extend(
                    text.lines()
                        .map(str::trim)
                        .filter(|line| !line.is_empty())
                        .map(String::from),
                );
            }
        }
        Ok(())
    }

    async fn commit_check(&mut self) -> Result<(), ZtpError> {
        self.script.push("commit check".to_string());
        self.script.push("rollback 0".to_string());
        self.script.push("exit configuration-mode".to_string());
        self.execute_script(Finish::Check).await
    }

    async fn commit(&mut self, comment: Option<&str>) -> Result<(), ZtpError> {
        match comment {
            Some(comment) => self
                .script
                .push(format!("commit comment \"{}\"", comment.replace('"', "'"))),
            None => self.script.push("commit".to_string()),
        }
        self.script.push("exit configuration-mode".to_string());
        self.execute_script(Finish::Commit).await
    }

    async fn unlock(&mut self) -> Result<(), ZtpError> {
        self.locked = false;
        self.script.clear();
        self.remove_candidate_files().await;
        Ok(())
    }

    async fn install(
        &mut self,
        request: &InstallRequest,
        progress: &dyn ProgressSink,
    ) -> Result<bool, ZtpError> {
        let command = install_command(request);
        debug!("Running install: {}", command);

        let mut child = Command::new(&self.cli_path)
            .args(["-c", &command])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| ZtpError::Install(format!("unable to start install: {}", e)))?;

        // Both pipes must be drained together until the child exits
        let (stdout_error, stderr_error) = tokio::join!(
            stream_report(child.stdout.take(), &self.hostname, progress),
            stream_report(child.stderr.take(), &self.hostname, progress),
        );
        let reported_error = stdout_error? | stderr_error?;

        let status = child.wait().await?;
        Ok(status.success() && !reported_error)
    }

    async fn reboot(&mut self, request: &RebootRequest) -> Result<(), ZtpError> {
        let command = reboot_command(request);
        let output = run_cli(&self.cli_path, &command, Some("yes\n")).await?;
        if !output.success || output.stdout.lines().any(is_error_line) {
            return Err(ZtpError::Install(format!(
                "reboot rejected: {}",
                output.stdout.trim()
            )));
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<(), ZtpError> {
        self.remove_candidate_files().await;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Finish {
    Check,
    Commit,
}

struct CliOutput {
    success: bool,
    stdout: String,
}

/// Run `cli -c <command>`, or `cli` fed from stdin when `command` is empty
async fn run_cli(cli_path: &Path, command: &str, stdin: Option<&str>) -> std::io::Result<CliOutput> {
    let mut cmd = Command::new(cli_path);
    if !command.is_empty() {
        cmd.args(["-c", command]);
    }
    let mut child = cmd
        .stdin(if stdin.is_some() { Stdio::piped() } else { Stdio::null() })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    if let (Some(input), Some(mut pipe)) = (stdin, child.stdin.take()) {
        pipe.write_all(input.as_bytes()).await?;
    }

    let output = child.wait_with_output().await?;
    let mut stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    stdout.push_str(&String::from_utf8_lossy(&output.stderr));
    Ok(CliOutput {
        success: output.status.success(),
        stdout,
    })
}

/// Forward each non-empty line of an install output stream to the progress
/// sink. Returns true when any line reports an error.
async fn stream_report<R>(
    pipe: Option<R>,
    host: &str,
    progress: &dyn ProgressSink,
) -> std::io::Result<bool>
where
    R: AsyncRead + Unpin,
{
    let Some(pipe) = pipe else {
        return Ok(false);
    };

    let mut reader = BufReader::new(pipe);
    let mut buf = Vec::new();
    let mut reported_error = false;
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            return Ok(reported_error);
        }
        let line = String::from_utf8_lossy(&buf);
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        reported_error |= is_error_line(line);
        progress.report(host, line);
    }
}

fn install_command(request: &InstallRequest) -> String {
    let no_copy = if request.no_copy { " no-copy" } else { "" };
    match request.mode {
        InstallMode::Standard => {
            format!("request system software add {}{}", request.package_url, no_copy)
        }
        InstallMode::ForceHost => format!(
            "request system software add {}{} force-host",
            request.package_url, no_copy
        ),
        InstallMode::VmHost => {
            format!("request vmhost software add {}{}", request.package_url, no_copy)
        }
    }
}

fn reboot_command(request: &RebootRequest) -> String {
    if request.vm_host {
        format!("request vmhost reboot in {}", request.in_minutes)
    } else {
        format!("request system reboot in {}", request.in_minutes)
    }
}

fn is_error_line(line: &str) -> bool {
    let lower = line.trim().to_lowercase();
    lower.starts_with("error") || lower.contains("installation failed") || lower.contains("aborted")
}

fn first_error_line(output: &str) -> Option<&str> {
    output.lines().map(str::trim).find(|line| is_error_line(line))
}

fn classify_transaction_output(output: &str, finish: Finish) -> Result<(), ZtpError> {
    let lower = output.to_lowercase();
    let detail = || first_error_line(output).unwrap_or(output.trim()).to_string();

    if LOCK_MARKERS.iter().any(|m| lower.contains(m)) {
        return Err(ZtpError::Lock(detail()));
    }
    if LOAD_ERROR_MARKERS.iter().any(|m| lower.contains(m)) {
        return Err(ZtpError::ConfigLoad(detail()));
    }

    let success_marker = match finish {
        Finish::Check => "configuration check succeeds",
        Finish::Commit => "commit complete",
    };
    if lower.contains(success_marker) {
        Ok(())
    } else {
        Err(ZtpError::Commit(detail()))
    }
}

/// First `"<key>": [{"data": "..."}]` value anywhere in a Junos JSON document
fn find_data(value: &Value, key: &str) -> Option<String> {
    match value {
        Value::Object(map) => {
            if let Some(data) = map
                .get(key)
                .and_then(|v| v.get(0))
                .and_then(|v| v.get("data"))
                .and_then(Value::as_str)
            {
                return Some(data.to_string());
            }
            map.values().find_map(|v| find_data(v, key))
        }
        Value::Array(items) => items.iter().find_map(|v| find_data(v, key)),
        _ => None,
    }
}

/// Older releases only expose the version in package comments like
/// "JUNOS Base OS boot [18.4R2-S3]"
fn version_from_package_comment(doc: &Value) -> Option<String> {
    let comment = find_data(doc, "comment")?;
    let start = comment.find('[')? + 1;
    let end = comment[start..].find(']')? + start;
    Some(comment[start..end].to_string())
}
