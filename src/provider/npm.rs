//! npm registry provider.
//!
//! Publishes the package in the working directory with `npm publish`,
//! authenticating through an auth-token line in `~/.npmrc`. The API key
//! itself never lands on disk; the npmrc references it through the
//! `NPM_API_KEY` environment variable injected at publish time.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use console::style;

use super::error::ProviderError;
use super::{Provider, ProviderFactory};
use crate::config::DeployConfig;
use crate::context::DeployContext;
use crate::error::{DavitError, Result};
use crate::shell::{RunOptions, ShellRunner};

const NPMRC_LINE: &str = "//registry.npmjs.org/:_authToken=${NPM_API_KEY}";

pub struct NpmProvider {
    config: Arc<DeployConfig>,
    shell: ShellRunner,
    npmrc: PathBuf,
}

impl NpmProvider {
    pub fn new(config: Arc<DeployConfig>) -> Result<Self> {
        let home = dirs::home_dir()
            .ok_or_else(|| DavitError::Config("Cannot determine home directory".to_string()))?;
        Ok(Self {
            config,
            shell: ShellRunner::default(),
            npmrc: home.join(".npmrc"),
        })
    }
}

#[async_trait]
impl Provider for NpmProvider {
    fn name(&self) -> &'static str {
        "npm"
    }

    fn needs_key(&self) -> bool {
        false
    }

    async fn install_deploy_dependencies(&mut self, _ctx: &mut DeployContext) -> Result<()> {
        which::which("npm")
            .map_err(|_| ProviderError::other("npm not found on PATH, install Node.js first"))?;
        Ok(())
    }

    async fn check_auth(&mut self, _ctx: &mut DeployContext) -> Result<()> {
        let email = self.config.str_option("email")?;
        std::fs::write(&self.npmrc, format!("{NPMRC_LINE}\n"))?;
        println!(
            "{}",
            style(format!("Authenticated with email {email}")).dim()
        );
        Ok(())
    }

    async fn push_app(&mut self, ctx: &mut DeployContext) -> Result<()> {
        let api_key = self.config.str_option("api_key")?;
        let opts = RunOptions::retrying().with_env("NPM_API_KEY", api_key);
        self.shell.run(ctx, "npm publish", &opts).await
    }
}

pub struct NpmFactory;

impl ProviderFactory for NpmFactory {
    fn name(&self) -> &'static str {
        "npm"
    }

    fn create(&self, config: Arc<DeployConfig>) -> Result<Box<dyn Provider>> {
        Ok(Box::new(NpmProvider::new(config)?))
    }
}
