//! Deployment provider abstraction layer.
//!
//! A provider plugin maps the shared deployment lifecycle onto one hosting
//! platform. The `Provider` trait is the capability contract the lifecycle
//! drives; plugins override what they need and inherit safe defaults for the
//! rest. The registry constructs providers by configured name.
//!
//! # Adding a new provider
//!
//! 1. Create a new module (e.g., `surge.rs`)
//! 2. Implement the `Provider` trait
//! 3. Implement the `ProviderFactory` trait
//! 4. Register in `ProviderRegistry::register_defaults()`

pub mod error;
pub mod heroku;
pub mod npm;
pub mod registry;
pub mod script;

use std::path::Path;

use async_trait::async_trait;

pub use error::ProviderError;
pub use registry::{ProviderFactory, ProviderRegistry};

use crate::context::DeployContext;
use crate::error::Result;

/// Capability contract every provider plugin implements.
///
/// The lifecycle calls these hooks in a fixed order; see `lifecycle::run`.
/// A plugin instance serves exactly one deployment and is never reused.
#[async_trait]
pub trait Provider: Send {
    /// Provider name, for log attribution
    fn name(&self) -> &'static str;

    /// One-time dependency installation, invoked at registry-resolution
    /// time, not per deploy.
    async fn install_deploy_dependencies(&mut self, _ctx: &mut DeployContext) -> Result<()> {
        Ok(())
    }

    /// Validate or establish credentials. Must fail loudly when they are
    /// invalid or missing.
    async fn check_auth(&mut self, ctx: &mut DeployContext) -> Result<()>;

    /// Validate target application identifiers.
    async fn check_app(&mut self, _ctx: &mut DeployContext) -> Result<()> {
        Ok(())
    }

    /// Whether this provider pushes over SSH and needs an ephemeral key.
    fn needs_key(&self) -> bool {
        true
    }

    /// Install the ephemeral public key on the platform so it can
    /// authenticate the push. Only called when `needs_key` is true.
    async fn setup_key(&mut self, _ctx: &mut DeployContext, _public_key_path: &Path) -> Result<()> {
        Ok(())
    }

    /// Remove the ephemeral key from the platform. Attempted during cleanup
    /// even when the deploy failed; its error is logged, never propagated.
    async fn remove_key(&mut self, _ctx: &mut DeployContext) -> Result<()> {
        Ok(())
    }

    /// The provider's core action: upload the artifact, trigger the build,
    /// publish the package.
    async fn push_app(&mut self, ctx: &mut DeployContext) -> Result<()>;

    /// Restart the application after deploy.
    async fn restart(&mut self, _ctx: &mut DeployContext) -> Result<()> {
        Err(ProviderError::not_supported("restarting the application").into())
    }

    /// Run a post-deploy command on the platform.
    async fn run(&mut self, _ctx: &mut DeployContext, _command: &str) -> Result<()> {
        Err(ProviderError::not_supported("running commands").into())
    }
}
