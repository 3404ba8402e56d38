//! The `codegate reset` command.

use std::path::PathBuf;

use anyhow::Result;

use codegate_core::session::Session;
use codegate_core::store::save_session;

pub fn execute(data_dir: Option<PathBuf>, config_path: Option<PathBuf>) -> Result<()> {
    let (_, store) = super::open_store(config_path.as_deref(), data_dir)?;

    save_session(&store, &Session::new())?;
    println!("Cleared history and progress in {}", store.dir().display());

    Ok(())
}
