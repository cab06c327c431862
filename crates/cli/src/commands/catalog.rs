//! `adpilot catalog`: print the tool manifest.

use adpilot_config::AppConfig;
use adpilot_core::tool::ManifestOptions;
use clap::Args;

#[derive(Args)]
pub struct CatalogArgs {
    /// Only include tools for these connectors (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub platforms: Vec<String>,
}

pub fn run(config: &AppConfig, args: CatalogArgs) -> Result<(), Box<dyn std::error::Error>> {
    let catalog = adpilot_tools::default_catalog()?;
    let manifest = catalog.manifest(&ManifestOptions {
        include_exploration: config.run.enable_exploration,
        include_recommendations: config.run.enable_recommendations,
        connectors: args.platforms,
    });

    println!("{}", serde_json::to_string_pretty(&manifest)?);
    Ok(())
}
