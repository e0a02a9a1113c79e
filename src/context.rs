//! Deployment context: execution environment and log grouping.
//!
//! The context owns the environment variables and working directory every
//! subprocess runs with. Phases communicate through it (the key manager sets
//! `GIT_SSH`, later git commands pick it up) instead of mutating the real
//! process environment, so tests can supply an isolated environment per case.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use console::style;

use crate::error::Result;
use crate::shell::ShellRunner;

/// Env var consulted for a pre-resolved commit SHA (set by CI systems).
pub const COMMIT_ENV: &str = "DAVIT_COMMIT";

pub struct DeployContext {
    env: HashMap<String, String>,
    cwd: PathBuf,
    sha: Option<String>,
    commit_msg: Option<String>,
}

impl DeployContext {
    /// Build a context from the real process environment.
    pub fn new() -> Result<Self> {
        Ok(Self::with_env(
            std::env::current_dir()?,
            std::env::vars().collect(),
        ))
    }

    /// Build a context with an explicit environment. Tests use this to stay
    /// isolated from the process environment.
    pub fn with_env(cwd: PathBuf, env: HashMap<String, String>) -> Self {
        let mut ctx = Self {
            env,
            cwd,
            sha: None,
            commit_msg: None,
        };
        let agent = ctx.user_agent();
        ctx.set_env("DAVIT_USER_AGENT", &agent);
        ctx.set_env("GIT_HTTP_USER_AGENT", &agent);
        ctx
    }

    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    pub fn env(&self) -> &HashMap<String, String> {
        &self.env
    }

    pub fn env_var(&self, name: &str) -> Option<&str> {
        self.env.get(name).map(String::as_str)
    }

    pub fn set_env(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.env.insert(name.into(), value.into());
    }

    /// User-agent string for platform API calls, prefixed with a CI marker
    /// when running under a CI environment.
    pub fn user_agent(&self) -> String {
        let davit = format!("davit/{}", env!("CARGO_PKG_VERSION"));
        if self.env.contains_key("CI") {
            format!("ci/0.1.0 {davit}")
        } else {
            davit
        }
    }

    /// Open a named log-grouping scope. The returned guard closes the scope
    /// when dropped, on error paths included.
    pub fn fold(&self, name: &str) -> Fold {
        println!(
            "{} {}",
            style("▸").cyan().bold(),
            style(name).white().bold()
        );
        Fold {
            name: name.to_string(),
        }
    }

    /// Commit SHA being deployed. Honors `DAVIT_COMMIT`, otherwise asks git;
    /// computed once and memoized.
    pub async fn sha(&mut self) -> Result<String> {
        if let Some(sha) = &self.sha {
            return Ok(sha.clone());
        }
        let sha = match self.env.get(COMMIT_ENV) {
            Some(sha) => sha.clone(),
            None => {
                let shell = ShellRunner::default();
                shell.capture(self, "git rev-parse HEAD").await?
            }
        };
        self.sha = Some(sha.clone());
        Ok(sha)
    }

    /// Full message of the commit being deployed, memoized like `sha`.
    pub async fn commit_msg(&mut self) -> Result<String> {
        if let Some(msg) = &self.commit_msg {
            return Ok(msg.clone());
        }
        let sha = self.sha().await?;
        let shell = ShellRunner::default();
        let msg = shell
            .capture(self, &format!("git log {sha} -n 1 --pretty=%B"))
            .await?;
        self.commit_msg = Some(msg.clone());
        Ok(msg)
    }
}

/// Guard for a named log-grouping scope.
pub struct Fold {
    name: String,
}

impl Drop for Fold {
    fn drop(&mut self) {
        tracing::debug!(fold = %self.name, "scope closed");
    }
}
