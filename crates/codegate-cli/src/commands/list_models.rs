//! The `codegate list-models` command.

use std::path::PathBuf;

use anyhow::Result;

use codegate_providers::config::load_config_from;
use codegate_providers::create_provider;

pub fn execute(provider_filter: Option<String>, config_path: Option<PathBuf>) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;

    let mut names: Vec<&String> = config
        .providers
        .keys()
        .filter(|name| provider_filter.as_deref().map_or(true, |f| f == name.as_str()))
        .collect();
    names.sort();

    if names.is_empty() {
        println!("No providers configured. Run `codegate init` to create a config file.");
        return Ok(());
    }

    for name in names {
        let provider = create_provider(&config.providers[name], config.timeout())?;
        let marker = if *name == config.default_provider {
            " (default)"
        } else {
            ""
        };
        println!("Provider: {name}{marker}");
        for model in provider.available_models() {
            println!(
                "  {}: {} ({}K context)",
                model.id,
                model.name,
                model.max_context / 1000,
            );
        }
        println!();
    }

    Ok(())
}
