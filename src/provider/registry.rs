//! Provider registry: static registration and tolerant name dispatch.
//!
//! Providers register a factory under their canonical name; the configured
//! `provider` option is matched after normalization (case-fold, strip
//! non-alphanumerics), so "Elastic-Beanstalk", "ELASTICBEANSTALK" and
//! "elastic_beanstalk" all resolve to the same plugin.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::error::ProviderError;
use super::Provider;
use crate::config::DeployConfig;
use crate::context::DeployContext;
use crate::error::Result;

/// Normalize a provider identifier for matching.
pub fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Factory trait each provider implements to define how instances are
/// created from configuration.
pub trait ProviderFactory: Send + Sync {
    /// Canonical provider name (registered under its normalized form)
    fn name(&self) -> &'static str;

    /// Create a new provider instance for one deployment
    fn create(&self, config: Arc<DeployConfig>) -> Result<Box<dyn Provider>>;
}

/// Registry of provider factories, keyed by normalized identifier.
pub struct ProviderRegistry {
    factories: BTreeMap<String, Arc<dyn ProviderFactory>>,
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    /// Registry with all built-in providers registered.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register_defaults();
        registry
    }

    pub fn register_defaults(&mut self) {
        self.register(super::heroku::HerokuFactory);
        self.register(super::npm::NpmFactory);
        self.register(super::script::ScriptFactory);
    }

    /// Register a provider factory. Two factories normalizing to the same
    /// identifier is a programming error, not something to resolve silently.
    pub fn register<F: ProviderFactory + 'static>(&mut self, factory: F) {
        let key = normalize(factory.name());
        if self.factories.insert(key.clone(), Arc::new(factory)).is_some() {
            panic!("duplicate provider identifier after normalization: {key}");
        }
    }

    /// Canonical names of all registered providers.
    pub fn supported_names(&self) -> Vec<String> {
        self.factories
            .values()
            .map(|f| f.name().to_string())
            .collect()
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.factories.contains_key(&normalize(name))
    }

    /// Resolve the configured `provider` option to a constructed plugin and
    /// run its one-time dependency installation.
    pub async fn resolve(
        &self,
        ctx: &mut DeployContext,
        config: Arc<DeployConfig>,
    ) -> Result<Box<dyn Provider>> {
        let requested = config.str_option("provider")?;
        let factory = self.factories.get(&normalize(&requested)).ok_or_else(|| {
            ProviderError::UnknownProvider {
                name: requested.clone(),
                supported: self.supported_names(),
            }
        })?;

        let mut provider = factory.create(Arc::clone(&config))?;
        {
            let _fold = ctx.fold("Installing deploy dependencies");
            provider.install_deploy_dependencies(ctx).await?;
        }
        Ok(provider)
    }
}
