//! Package manager command runner.
//!
//! Commands run attached to a pseudo-terminal. Output is read on a
//! dedicated thread and handed to tokio through an unbounded channel, so a
//! slow consumer never stalls the package manager. A run is observed as a
//! [`CommandRun`]: a sequence of [`RunEvent::Output`] chunks closed by
//! exactly one [`RunEvent::Completed`].

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use hbui_registry::is_older;
use hbui_utils_pty::{command_builder, create_command_pty};
use tokio::sync::{mpsc, oneshot};

use crate::config::PluginsConfig;
use crate::error::{PluginError, Result};
use crate::locks::InstallGuard;

/// Receives raw terminal output. Sending never blocks.
pub type OutputSink = mpsc::UnboundedSender<String>;

/// Prefix used in privileged mode.
pub const SUDO_PREFIX: [&str; 3] = ["sudo", "-E", "-n"];

/// Emitted after a zero exit code.
pub const SUCCESS_MESSAGE: &str = "Command succeeded!";

const READ_CHUNK_SIZE: usize = 4096;

/// How long to wait for buffered output after the process exits.
const READER_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

const NODE_VERSION_TIMEOUT: Duration = Duration::from_secs(5);

/// Wrap text in the yellow ANSI color.
pub fn yellow(text: &str) -> String {
    format!("\x1b[33m{}\x1b[0m\r\n", text)
}

/// Wrap text in the cyan ANSI color.
pub fn cyan(text: &str) -> String {
    format!("\x1b[36m{}\x1b[0m\r\n", text)
}

/// Wrap text in the green ANSI color.
pub fn green(text: &str) -> String {
    format!("\x1b[32m{}\x1b[0m\r\n", text)
}

/// How a command ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Success,
    Failed {
        exit_code: Option<u32>,
        timed_out: bool,
    },
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// Map to the result reported to callers.
    pub fn into_result(self) -> Result<()> {
        match self {
            Self::Success => Ok(()),
            Self::Failed { .. } => Err(PluginError::command_failed()),
        }
    }
}

/// One event of a running command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunEvent {
    /// A chunk of terminal output, in arrival order.
    Output(String),
    /// Terminal event; nothing follows it.
    Completed(RunOutcome),
}

/// A command to run.
#[derive(Debug, Clone)]
pub struct CommandRequest {
    pub argv: Vec<String>,
    pub cwd: PathBuf,
}

impl CommandRequest {
    pub fn new(argv: Vec<String>, cwd: impl Into<PathBuf>) -> Self {
        Self {
            argv,
            cwd: cwd.into(),
        }
    }
}

/// Events of a started command.
///
/// Holds the install lock, if any, until the completion event has been
/// consumed or the run is dropped.
#[derive(Debug)]
pub struct CommandRun {
    events: mpsc::UnboundedReceiver<RunEvent>,
    guard: Option<InstallGuard>,
    finished: bool,
}

impl CommandRun {
    fn new(events: mpsc::UnboundedReceiver<RunEvent>) -> Self {
        Self {
            events,
            guard: None,
            finished: false,
        }
    }

    /// Attach an install lock released on completion.
    pub fn with_guard(mut self, guard: InstallGuard) -> Self {
        self.guard = Some(guard);
        self
    }

    /// Next event, or `None` once the command has completed.
    pub async fn next_event(&mut self) -> Option<RunEvent> {
        if self.finished {
            return None;
        }

        let event = match self.events.recv().await {
            Some(event) => event,
            None => {
                tracing::warn!("Command ended without reporting an exit status");
                RunEvent::Completed(RunOutcome::Failed {
                    exit_code: None,
                    timed_out: false,
                })
            }
        };

        if matches!(event, RunEvent::Completed(_)) {
            self.finished = true;
            self.guard.take();
        }
        Some(event)
    }

    /// Forward all output to `sink` and return the outcome.
    ///
    /// A closed sink does not stop the command.
    pub async fn forward_to(mut self, sink: &OutputSink) -> Result<()> {
        while let Some(event) = self.next_event().await {
            match event {
                RunEvent::Output(chunk) => {
                    let _ = sink.send(chunk);
                }
                RunEvent::Completed(outcome) => return outcome.into_result(),
            }
        }
        Err(PluginError::command_failed())
    }

    /// Collect all output and the outcome.
    pub async fn collect(mut self) -> (String, RunOutcome) {
        let mut output = String::new();
        while let Some(event) = self.next_event().await {
            match event {
                RunEvent::Output(chunk) => output.push_str(&chunk),
                RunEvent::Completed(outcome) => return (output, outcome),
            }
        }
        (
            output,
            RunOutcome::Failed {
                exit_code: None,
                timed_out: false,
            },
        )
    }
}

/// Spawns package manager commands in a PTY.
#[derive(Debug, Clone)]
pub struct CommandRunner {
    sudo: bool,
    custom_plugin_path: Option<PathBuf>,
    min_node_version: String,
    timeout: Duration,
}

impl CommandRunner {
    pub fn new(config: &PluginsConfig) -> Self {
        Self {
            sudo: config.sudo,
            custom_plugin_path: config.custom_plugin_path.clone(),
            min_node_version: config.min_node_version.clone(),
            timeout: config.command_timeout(),
        }
    }

    /// Override the wall-clock limit.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Final argv, with the privilege prefix when enabled.
    pub fn build_argv(&self, argv: &[String]) -> Vec<String> {
        let mut full = Vec::with_capacity(argv.len() + SUDO_PREFIX.len());
        if self.sudo {
            full.extend(SUDO_PREFIX.iter().map(|s| s.to_string()));
        }
        full.extend(argv.iter().cloned());
        full
    }

    /// Extra environment for a command run in `cwd`.
    pub fn environment(&self, cwd: &Path) -> Vec<(String, String)> {
        let in_custom_parent = self
            .custom_plugin_path
            .as_deref()
            .and_then(Path::parent)
            .is_some_and(|parent| parent == cwd);

        vec![
            (
                "npm_config_global".to_string(),
                (!in_custom_parent).to_string(),
            ),
            ("npm_config_unsafe_perm".to_string(), "true".to_string()),
            ("npm_config_update_notifier".to_string(), "false".to_string()),
            ("npm_config_prefer_online".to_string(), "true".to_string()),
        ]
    }

    /// Start a command. Fails only if the process cannot be started; the
    /// command's own failure is reported through the completion event.
    pub async fn run(&self, request: CommandRequest) -> Result<CommandRun> {
        if request.argv.is_empty() {
            return Err(PluginError::Configuration(
                "No package manager command configured".to_string(),
            ));
        }

        let argv = self.build_argv(&request.argv);
        let (tx, rx) = mpsc::unbounded_channel();

        for line in self.preflight(&argv, &request.cwd).await {
            let _ = tx.send(RunEvent::Output(line));
        }

        let pair = create_command_pty().map_err(|e| PluginError::Pty(e.to_string()))?;
        let cmd = command_builder(&argv, &request.cwd, &self.environment(&request.cwd));
        let mut child = pair
            .slave
            .spawn_command(cmd)
            .map_err(|e| PluginError::Pty(e.to_string()))?;
        drop(pair.slave);

        let mut reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| PluginError::Pty(e.to_string()))?;
        let master = pair.master;
        let mut killer = child.clone_killer();

        tracing::info!(cmd = %argv.join(" "), cwd = ?request.cwd, "Running command");

        let (drained_tx, drained_rx) = std::sync::mpsc::channel::<()>();
        let output_tx = tx.clone();
        std::thread::spawn(move || {
            let mut buf = [0u8; READ_CHUNK_SIZE];
            let mut decoder = Utf8Chunker::default();
            loop {
                match reader.read(&mut buf) {
                    Ok(0) | Err(_) => break,
                    Ok(n) => {
                        if let Some(chunk) = decoder.push(&buf[..n])
                            && output_tx.send(RunEvent::Output(chunk)).is_err()
                        {
                            break;
                        }
                    }
                }
            }
            if let Some(rest) = decoder.finish() {
                let _ = output_tx.send(RunEvent::Output(rest));
            }
            let _ = drained_tx.send(());
        });

        let timed_out = Arc::new(AtomicBool::new(false));
        let (exited_tx, exited_rx) = oneshot::channel::<()>();
        let timeout = self.timeout;
        let timeout_flag = Arc::clone(&timed_out);
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(timeout) => {
                    tracing::warn!("Command timed out after {:?}, killing it", timeout);
                    timeout_flag.store(true, Ordering::SeqCst);
                    if let Err(e) = killer.kill() {
                        tracing::warn!("Failed to kill timed out command: {}", e);
                    }
                }
                _ = exited_rx => {}
            }
        });

        tokio::task::spawn_blocking(move || {
            let status = child.wait();
            let _ = exited_tx.send(());
            let _ = drained_rx.recv_timeout(READER_DRAIN_TIMEOUT);
            drop(master);

            let timed_out = timed_out.load(Ordering::SeqCst);
            let outcome = match status {
                Ok(status) if status.success() => {
                    let _ = tx.send(RunEvent::Output(green(SUCCESS_MESSAGE)));
                    RunOutcome::Success
                }
                Ok(status) => {
                    tracing::warn!(exit_code = status.exit_code(), "Command failed");
                    RunOutcome::Failed {
                        exit_code: Some(status.exit_code()),
                        timed_out,
                    }
                }
                Err(e) => {
                    tracing::error!("Failed to wait for command: {}", e);
                    RunOutcome::Failed {
                        exit_code: None,
                        timed_out,
                    }
                }
            };
            let _ = tx.send(RunEvent::Completed(outcome));
        });

        Ok(CommandRun::new(rx))
    }

    /// Diagnostic lines shown before the command starts.
    async fn preflight(&self, argv: &[String], cwd: &Path) -> Vec<String> {
        let user = current_user();
        let mut lines = Vec::new();

        if !self.sudo
            && let Err(e) = check_write_access(cwd)
        {
            tracing::warn!("No write access to {:?}: {}", cwd, e);
            lines.push(yellow(&format!(
                "User \"{}\" does not have write access to the target directory: {}",
                user,
                cwd.display()
            )));
            lines.push(yellow(
                "This may cause the operation to fail. Consider running the console with sudo mode enabled.",
            ));
        }

        lines.push(cyan(&format!("USER: {}", user)));
        lines.push(cyan(&format!("DIR: {}", cwd.display())));
        lines.push(cyan(&format!("CMD: {}", argv.join(" "))));

        if let Some(node_version) = node_version().await
            && is_older(&node_version, &self.min_node_version)
        {
            lines.push(yellow(&format!(
                "Node.js {} is older than the minimum supported version {}. \
                 Some plugins may fail to install or run.",
                node_version, self.min_node_version
            )));
        }

        lines
    }
}

/// Create and remove a temporary file in `dir`.
fn check_write_access(dir: &Path) -> std::io::Result<()> {
    let file = tempfile::Builder::new()
        .prefix(".hbui-write-test")
        .tempfile_in(dir)?;
    file.close()
}

fn current_user() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string())
}

/// Active Node.js version (`node --version`), if it can be determined.
async fn node_version() -> Option<String> {
    let output = tokio::time::timeout(
        NODE_VERSION_TIMEOUT,
        tokio::process::Command::new("node").arg("--version").output(),
    )
    .await
    .ok()?
    .ok()?;

    if !output.status.success() {
        return None;
    }
    let version = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!version.is_empty()).then_some(version)
}

/// Splits a byte stream into UTF-8 strings without breaking a multi-byte
/// character across chunks.
#[derive(Debug, Default)]
struct Utf8Chunker {
    pending: Vec<u8>,
}

impl Utf8Chunker {
    fn push(&mut self, bytes: &[u8]) -> Option<String> {
        self.pending.extend_from_slice(bytes);

        // Invalid bytes are flushed; an incomplete sequence at the end waits
        // for the next read.
        let mut complete = 0;
        while complete < self.pending.len() {
            match std::str::from_utf8(&self.pending[complete..]) {
                Ok(_) => complete = self.pending.len(),
                Err(e) => match e.error_len() {
                    Some(invalid) => complete += e.valid_up_to() + invalid,
                    None => {
                        complete += e.valid_up_to();
                        break;
                    }
                },
            }
        }
        if complete == 0 {
            return None;
        }

        let rest = self.pending.split_off(complete);
        let chunk = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending = rest;
        Some(chunk)
    }

    fn finish(self) -> Option<String> {
        (!self.pending.is_empty()).then(|| String::from_utf8_lossy(&self.pending).into_owned())
    }
}
