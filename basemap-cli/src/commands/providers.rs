//! `basemap providers` - list the built-in tile providers.

use basemap::provider::ProviderConfig;
use console::style;

use crate::error::CliError;

/// Run the providers command.
pub fn run() -> Result<(), CliError> {
    println!("{}", style("Available providers").bold());
    println!();
    for provider in ProviderConfig::builtin() {
        println!(
            "  {:<18} {:<14} zoom {:>2}-{:<2}  {}",
            style(provider.name()).cyan(),
            provider.id(),
            provider.min_zoom(),
            provider.max_zoom(),
            style(provider.attribution()).dim()
        );
    }
    println!();
    println!("Use a name or id with `basemap render --provider`, or 'none' to disable.");
    Ok(())
}
