//! Shell command execution with optional retry.
//!
//! Every command runs through `sh -c` with the deployment context's
//! environment and working directory, so env mutations made by earlier
//! phases (like the `GIT_SSH` override) are visible to later commands.
//! Network-dependent operations opt into a bounded retry budget; everything
//! else fails on the first non-zero exit.

use std::time::Duration;

use tokio::process::Command;

use crate::context::DeployContext;
use crate::error::{DavitError, Result};

/// Options for a single command invocation.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Retry on non-zero exit, up to the runner's attempt budget.
    pub retry: bool,
    /// Extra env vars for this invocation only, applied on top of the
    /// context environment.
    pub env: Vec<(String, String)>,
}

impl RunOptions {
    pub fn retrying() -> Self {
        Self {
            retry: true,
            ..Self::default()
        }
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }
}

/// Synchronous-in-spirit command runner: one command at a time, blocking the
/// deployment until the subprocess exits.
#[derive(Debug, Clone)]
pub struct ShellRunner {
    attempts: usize,
    backoff: Duration,
}

impl Default for ShellRunner {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff: Duration::from_secs(2),
        }
    }
}

impl ShellRunner {
    #[cfg(test)]
    pub fn with_backoff(attempts: usize, backoff: Duration) -> Self {
        Self { attempts, backoff }
    }

    fn command(&self, ctx: &DeployContext, command: &str, opts: &RunOptions) -> Command {
        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(command)
            .current_dir(ctx.cwd())
            .env_clear()
            .envs(ctx.env());
        for (key, value) in &opts.env {
            cmd.env(key, value);
        }
        cmd
    }

    /// Run a command, inheriting stdout/stderr so the user sees its output.
    pub async fn run(&self, ctx: &DeployContext, command: &str, opts: &RunOptions) -> Result<()> {
        let attempts = if opts.retry { self.attempts } else { 1 };
        let mut last_status = -1;

        for attempt in 1..=attempts {
            let status = self.command(ctx, command, opts).status().await?;
            if status.success() {
                return Ok(());
            }
            last_status = status.code().unwrap_or(-1);
            if attempt < attempts {
                tracing::warn!(
                    command,
                    status = last_status,
                    attempt,
                    attempts,
                    "command failed, retrying"
                );
                tokio::time::sleep(self.backoff).await;
            }
        }

        Err(DavitError::CommandFailed {
            command: command.to_string(),
            status: last_status,
        })
    }

    /// Run a command and return its trimmed stdout. No retry; callers that
    /// capture output want the first answer or the failure.
    pub async fn capture(&self, ctx: &DeployContext, command: &str) -> Result<String> {
        let output = self
            .command(ctx, command, &RunOptions::default())
            .output()
            .await?;
        if !output.status.success() {
            return Err(DavitError::CommandFailed {
                command: command.to_string(),
                status: output.status.code().unwrap_or(-1),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::path::PathBuf;

    fn ctx_in(dir: PathBuf) -> DeployContext {
        DeployContext::with_env(dir, HashMap::new())
    }

    fn fast_runner() -> ShellRunner {
        ShellRunner::with_backoff(3, Duration::ZERO)
    }

    #[tokio::test]
    async fn test_run_success() {
        let ctx = ctx_in(std::env::temp_dir());
        fast_runner()
            .run(&ctx, "true", &RunOptions::default())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_failure_surfaces_status_and_command() {
        let ctx = ctx_in(std::env::temp_dir());
        let err = fast_runner()
            .run(&ctx, "exit 3", &RunOptions::default())
            .await
            .unwrap_err();
        match err {
            DavitError::CommandFailed { command, status } => {
                assert_eq!(command, "exit 3");
                assert_eq!(status, 3);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_retry_succeeds_on_third_attempt() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ctx_in(dir.path().to_path_buf());
        // fails twice, then succeeds
        let script = "n=$(cat count 2>/dev/null || echo 0); n=$((n+1)); echo $n > count; test $n -ge 3";
        fast_runner()
            .run(&ctx, script, &RunOptions::retrying())
            .await
            .unwrap();
        let count = std::fs::read_to_string(dir.path().join("count")).unwrap();
        assert_eq!(count.trim(), "3");
    }

    #[tokio::test]
    async fn test_retry_budget_exhausted() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ctx_in(dir.path().to_path_buf());
        let script = "n=$(cat count 2>/dev/null || echo 0); n=$((n+1)); echo $n > count; false";
        let err = fast_runner()
            .run(&ctx, script, &RunOptions::retrying())
            .await
            .unwrap_err();
        assert!(matches!(err, DavitError::CommandFailed { .. }));
        let count = std::fs::read_to_string(dir.path().join("count")).unwrap();
        assert_eq!(count.trim(), "3", "should have used the whole budget");
    }

    #[tokio::test]
    async fn test_context_env_reaches_command() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = ctx_in(dir.path().to_path_buf());
        ctx.set_env("DEPLOY_TARGET", "production");
        let out = fast_runner()
            .capture(&ctx, "printf '%s' \"$DEPLOY_TARGET\"")
            .await
            .unwrap();
        assert_eq!(out, "production");
    }

    #[tokio::test]
    async fn test_per_invocation_env_overrides_context() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = ctx_in(dir.path().to_path_buf());
        ctx.set_env("TOKEN", "from-context");
        let opts = RunOptions::default().with_env("TOKEN", "from-call");
        fast_runner()
            .run(&ctx, "test \"$TOKEN\" = from-call", &opts)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_runs_in_context_cwd() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ctx_in(dir.path().to_path_buf());
        fast_runner()
            .run(&ctx, "touch here", &RunOptions::default())
            .await
            .unwrap();
        assert!(dir.path().join("here").exists());
    }

    #[tokio::test]
    async fn test_capture_trims_output() {
        let ctx = ctx_in(std::env::temp_dir());
        let out = fast_runner().capture(&ctx, "echo hello").await.unwrap();
        assert_eq!(out, "hello");
    }
}
