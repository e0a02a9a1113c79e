use std::path::Path;
use std::sync::Arc;

use console::style;

use crate::config::{DeployConfig, OptValue};
use crate::context::DeployContext;
use crate::error::Result;
use crate::lifecycle;
use crate::provider::ProviderRegistry;

pub async fn execute(config_path: &Path, overrides: &[String], provider: Option<String>) -> Result<()> {
    let expanded = shellexpand::tilde(&config_path.to_string_lossy()).into_owned();
    let config_path = Path::new(&expanded);

    // a missing config file is fine when everything comes in through -o
    let mut config = if config_path.exists() {
        DeployConfig::load(config_path)?
    } else {
        DeployConfig::new()
    };
    for spec in overrides {
        config.apply_override(spec)?;
    }
    if let Some(name) = provider {
        config.set("provider", OptValue::String(name));
    }
    let config = Arc::new(config);

    let mut ctx = DeployContext::new()?;
    let registry = ProviderRegistry::with_defaults();
    let mut provider = registry.resolve(&mut ctx, Arc::clone(&config)).await?;

    println!(
        "{} {}",
        style("davit").cyan().bold(),
        style(format!("deploying with {}", provider.name())).dim()
    );

    lifecycle::run(provider.as_mut(), &mut ctx, &config).await?;

    println!();
    println!("{}", style("✓ Deploy finished.").green().bold());
    Ok(())
}
