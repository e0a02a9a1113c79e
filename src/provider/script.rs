//! Script provider: deployment as an arbitrary shell command.
//!
//! Escape hatch for platforms without a dedicated plugin. The `script`
//! option is the deploy step; post-deploy `run` directives execute through
//! the same shell.

use std::sync::Arc;

use async_trait::async_trait;

use super::{Provider, ProviderFactory};
use crate::config::DeployConfig;
use crate::context::DeployContext;
use crate::error::Result;
use crate::shell::{RunOptions, ShellRunner};

pub struct ScriptProvider {
    config: Arc<DeployConfig>,
    shell: ShellRunner,
}

impl ScriptProvider {
    pub fn new(config: Arc<DeployConfig>) -> Self {
        Self {
            config,
            shell: ShellRunner::default(),
        }
    }
}

#[async_trait]
impl Provider for ScriptProvider {
    fn name(&self) -> &'static str {
        "script"
    }

    fn needs_key(&self) -> bool {
        false
    }

    // Nothing to authenticate; the script brings its own credentials.
    async fn check_auth(&mut self, _ctx: &mut DeployContext) -> Result<()> {
        Ok(())
    }

    async fn check_app(&mut self, _ctx: &mut DeployContext) -> Result<()> {
        // fail before the deploy fold if no script is configured
        self.config.str_option("script")?;
        Ok(())
    }

    async fn push_app(&mut self, ctx: &mut DeployContext) -> Result<()> {
        let script = self.config.str_option("script")?;
        self.shell.run(ctx, &script, &RunOptions::default()).await
    }

    async fn run(&mut self, ctx: &mut DeployContext, command: &str) -> Result<()> {
        self.shell.run(ctx, command, &RunOptions::default()).await
    }
}

pub struct ScriptFactory;

impl ProviderFactory for ScriptFactory {
    fn name(&self) -> &'static str {
        "script"
    }

    fn create(&self, config: Arc<DeployConfig>) -> Result<Box<dyn Provider>> {
        Ok(Box::new(ScriptProvider::new(config)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DavitError;
    use std::collections::HashMap;
    use std::path::Path;

    fn ctx_in(dir: &Path) -> DeployContext {
        DeployContext::with_env(dir.to_path_buf(), HashMap::new())
    }

    fn config_with_script(script: &str) -> Arc<DeployConfig> {
        let mut cfg = DeployConfig::new();
        cfg.apply_override("provider=script").unwrap();
        cfg.apply_override(&format!("script={script}")).unwrap();
        Arc::new(cfg)
    }

    #[tokio::test]
    async fn test_push_app_runs_the_script() {
        let dir = tempfile::tempdir().unwrap();
        let mut provider = ScriptProvider::new(config_with_script("touch deployed"));
        provider.push_app(&mut ctx_in(dir.path())).await.unwrap();
        assert!(dir.path().join("deployed").exists());
    }

    #[tokio::test]
    async fn test_push_app_surfaces_script_failure() {
        let dir = tempfile::tempdir().unwrap();
        let mut provider = ScriptProvider::new(config_with_script("exit 7"));
        let err = provider.push_app(&mut ctx_in(dir.path())).await.unwrap_err();
        assert!(matches!(err, DavitError::CommandFailed { status: 7, .. }));
    }

    #[tokio::test]
    async fn test_check_app_requires_script_option() {
        let mut cfg = DeployConfig::new();
        cfg.apply_override("provider=script").unwrap();
        let mut provider = ScriptProvider::new(Arc::new(cfg));
        let dir = tempfile::tempdir().unwrap();
        let err = provider.check_app(&mut ctx_in(dir.path())).await.unwrap_err();
        assert!(matches!(err, DavitError::MissingOption { ref name } if name == "script"));
    }

    #[tokio::test]
    async fn test_run_directive_executes() {
        let dir = tempfile::tempdir().unwrap();
        let mut provider = ScriptProvider::new(config_with_script("true"));
        provider
            .run(&mut ctx_in(dir.path()), "touch after-deploy")
            .await
            .unwrap();
        assert!(dir.path().join("after-deploy").exists());
    }
}
