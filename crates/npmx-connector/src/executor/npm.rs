//! npm CLI executor
//!
//! Spawns the configured npm binary with a fixed argument vector (never a
//! shell), bounded by the configured timeout. A timed-out child is killed.

use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;

use npmx_core::classify::classify;
use npmx_core::config::ConnectorConfig;
use npmx_core::{ExecutionResult, NpmCommand, QueryError};

use super::{CommandExecutor, ReadQuery};

#[derive(Debug, Error)]
enum RunError {
    #[error("Command timed out after {0:?}")]
    Timeout(Duration),

    #[error("Failed to run npm: {0}")]
    Io(#[from] std::io::Error),
}

/// Executes operations by invoking the npm CLI
pub struct NpmExecutor {
    npm_path: PathBuf,
    timeout: Duration,
}

impl NpmExecutor {
    pub fn new(npm_path: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            npm_path: npm_path.into(),
            timeout,
        }
    }

    pub fn from_config(config: &ConnectorConfig) -> Self {
        Self::new(config.npm_path.clone(), config.command_timeout)
    }

    async fn run(&self, args: &[String], cwd: Option<&Path>) -> Result<Output, RunError> {
        let mut command = Command::new(&self.npm_path);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .env("NO_COLOR", "1")
            .env("npm_config_color", "false")
            .env("npm_config_update_notifier", "false")
            .kill_on_drop(true);
        if let Some(dir) = cwd {
            command.current_dir(dir);
        }

        tracing::debug!("Running {} {}", self.npm_path.display(), redact_otp(args));

        let child = command.spawn()?;
        match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(output) => Ok(output?),
            Err(_) => Err(RunError::Timeout(self.timeout)),
        }
    }

    /// Publish an empty placeholder so the package name is claimed
    async fn publish_placeholder(
        &self,
        name: &str,
        author: Option<&str>,
        args: &[String],
    ) -> Result<Output, RunError> {
        let dir = tempfile::tempdir()?;

        let mut manifest = serde_json::json!({
            "name": name,
            "version": "0.0.0",
            "description": "Placeholder package",
            "license": "UNLICENSED",
        });
        if let Some(author) = author {
            manifest["author"] = author.into();
        }
        let manifest = serde_json::to_vec_pretty(&manifest)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        tokio::fs::write(dir.path().join("package.json"), manifest).await?;

        self.run(args, Some(dir.path())).await
    }
}

#[async_trait]
impl CommandExecutor for NpmExecutor {
    async fn execute(&self, command: &NpmCommand, otp: Option<&str>) -> ExecutionResult {
        let mut args = command.args();
        if let Some(otp) = otp {
            args.push(format!("--otp={}", otp));
        }

        let output = match command {
            NpmCommand::PackageInit { name, author } => {
                self.publish_placeholder(name, author.as_deref(), &args)
                    .await
            }
            _ => self.run(&args, None).await,
        };

        match output {
            Ok(output) => into_result(output.status.code(), &output.stdout, &output.stderr),
            Err(e) => {
                tracing::warn!("{} failed to run: {}", command.kind(), e);
                ExecutionResult::failure(e.to_string())
            }
        }
    }

    async fn whoami(&self) -> Option<String> {
        let output = match self.run(&["whoami".to_string()], None).await {
            Ok(output) => output,
            Err(e) => {
                tracing::warn!("npm whoami failed: {}", e);
                return None;
            }
        };

        if !output.status.success() {
            tracing::info!("npm reports no logged-in user");
            return None;
        }

        let user = String::from_utf8_lossy(&output.stdout).trim().to_string();
        (!user.is_empty()).then_some(user)
    }

    async fn query(&self, query: &ReadQuery) -> Result<String, QueryError> {
        query.validate()?;

        let output = self
            .run(&query.args(), None)
            .await
            .map_err(|e| QueryError::Failed(e.to_string()))?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(QueryError::Failed(classify(&stderr).message))
        }
    }
}

/// Turn raw process output into a classified result
fn into_result(code: Option<i32>, stdout: &[u8], stderr: &[u8]) -> ExecutionResult {
    let stdout = String::from_utf8_lossy(stdout).into_owned();
    let stderr = String::from_utf8_lossy(stderr).into_owned();
    // Killed by a signal
    let exit_code = code.unwrap_or(1);

    if exit_code == 0 {
        return ExecutionResult {
            stdout,
            stderr,
            exit_code,
            requires_otp: false,
            auth_failure: false,
        };
    }

    // npm sometimes reports the interesting part on stdout
    let diagnostic = classify(&format!("{}\n{}", stderr, stdout));
    ExecutionResult {
        stdout,
        stderr: diagnostic.message.clone(),
        exit_code,
        requires_otp: diagnostic.requires_otp(),
        auth_failure: diagnostic.auth_failure(),
    }
}

fn redact_otp(args: &[String]) -> String {
    args.iter()
        .map(|arg| {
            if arg.starts_with("--otp=") {
                "--otp=******"
            } else {
                arg.as_str()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
