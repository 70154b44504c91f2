use crate::backend::Backend;
use async_trait::async_trait;
use pvc_plumber_core::{BackendKind, CheckResult, Error, Result};
use std::fmt;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, error, info};

const KOPIA_BIN: &str = "kopia";

/// Runs an external program and hands back its stdout.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    async fn run(&self, program: &str, args: &[String]) -> Result<Vec<u8>>;
}

/// Spawns real child processes. The child is killed if the returned future is dropped.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessExecutor;

#[async_trait]
impl CommandExecutor for ProcessExecutor {
    async fn run(&self, program: &str, args: &[String]) -> Result<Vec<u8>> {
        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            return Err(Error::CommandFailed {
                program: program.to_string(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(output.stdout)
    }
}

#[derive(Clone)]
pub struct KopiaConfig {
    pub repository_path: PathBuf,
    pub password: String,
    /// Deadline for each `snapshot list` invocation.
    pub timeout: Duration,
}

impl fmt::Debug for KopiaConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KopiaConfig")
            .field("repository_path", &self.repository_path)
            .field("password", &"<redacted>")
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Source identifier under which VolSync's kopia mover records snapshots.
/// Must track the mover's naming scheme exactly.
pub fn snapshot_source(namespace: &str, pvc: &str) -> String {
    format!("{}-backup@{}:/data", pvc, namespace)
}

fn stderr_of(error: &Error) -> &str {
    match error {
        Error::CommandFailed { stderr, .. } => stderr,
        _ => "",
    }
}

pub struct KopiaBackend {
    config: KopiaConfig,
    executor: Box<dyn CommandExecutor>,
    connected: bool,
}

impl KopiaBackend {
    pub fn new(config: KopiaConfig) -> Self {
        Self::with_executor(config, ProcessExecutor)
    }

    pub fn with_executor<E>(config: KopiaConfig, executor: E) -> Self
    where
        E: CommandExecutor + 'static,
    {
        Self {
            config,
            executor: Box::new(executor),
            connected: false,
        }
    }

    /// Connects the kopia CLI to the filesystem repository. Runs once, before
    /// the backend starts serving checks.
    pub async fn connect(&mut self) -> Result<()> {
        info!(path = %self.config.repository_path.display(), "connecting to kopia repository");

        let args = vec![
            "repository".to_string(),
            "connect".to_string(),
            "filesystem".to_string(),
            "--path".to_string(),
            self.config.repository_path.to_string_lossy().into_owned(),
            "--password".to_string(),
            self.config.password.clone(),
        ];

        if let Err(e) = self.executor.run(KOPIA_BIN, &args).await {
            error!(error = %e, stderr = stderr_of(&e), "failed to connect to kopia repository");
            return Err(Error::Connect(e.to_string()));
        }

        self.connected = true;
        info!("connected to kopia repository");
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    async fn list_snapshots(&self, source: &str) -> Result<Vec<u8>> {
        let args = vec![
            "snapshot".to_string(),
            "list".to_string(),
            source.to_string(),
            "--json".to_string(),
        ];

        tokio::time::timeout(self.config.timeout, self.executor.run(KOPIA_BIN, &args))
            .await
            .map_err(|_| Error::CommandTimeout {
                program: KOPIA_BIN.to_string(),
                timeout: self.config.timeout,
            })?
    }
}

#[async_trait]
impl Backend for KopiaBackend {
    async fn check_backup_exists(&self, namespace: &str, pvc: &str) -> CheckResult {
        let source = snapshot_source(namespace, pvc);
        debug!(source = %source, "checking kopia snapshots");

        let output = match self.list_snapshots(&source).await {
            Ok(output) => output,
            Err(e) => {
                // stderr stays in the log; the response only carries the exit status.
                error!(
                    source = %source,
                    error = %e,
                    stderr = stderr_of(&e),
                    "kopia snapshot list failed"
                );
                return CheckResult::failed(
                    namespace,
                    pvc,
                    BackendKind::KopiaFs,
                    format!("failed to list snapshots: {}", e),
                );
            }
        };

        let snapshots: Vec<serde_json::Value> = match serde_json::from_slice(&output) {
            Ok(snapshots) => snapshots,
            Err(e) => {
                error!(
                    error = %e,
                    output = %String::from_utf8_lossy(&output),
                    "failed to parse kopia output"
                );
                return CheckResult::failed(
                    namespace,
                    pvc,
                    BackendKind::KopiaFs,
                    format!("failed to parse kopia output: {}", e),
                );
            }
        };

        debug!(source = %source, count = snapshots.len(), "kopia snapshot check complete");
        CheckResult::new(namespace, pvc, BackendKind::KopiaFs, !snapshots.is_empty())
    }

    fn backend_kind(&self) -> BackendKind {
        BackendKind::KopiaFs
    }
}
