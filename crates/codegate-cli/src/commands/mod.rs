pub mod init;
pub mod list_models;
pub mod reset;
pub mod review;
pub mod stats;
pub mod validate;

use std::path::PathBuf;

use anyhow::Result;

use codegate_core::store::JsonFileStore;
use codegate_providers::config::{load_config_from, CodegateConfig};

/// Load config and open the store, letting `--data-dir` win over the config.
pub(crate) fn open_store(
    config_path: Option<&std::path::Path>,
    data_dir: Option<PathBuf>,
) -> Result<(CodegateConfig, JsonFileStore)> {
    let config = load_config_from(config_path)?;
    let dir = data_dir.unwrap_or_else(|| config.data_dir.clone());
    Ok((config, JsonFileStore::new(dir)))
}
