use console::style;

use crate::error::Result;
use crate::provider::ProviderRegistry;

pub fn execute() -> Result<()> {
    let registry = ProviderRegistry::with_defaults();
    println!("{}", style("Supported providers").white().bold());
    for name in registry.supported_names() {
        println!("  {} {}", style("●").cyan(), name);
    }
    Ok(())
}
