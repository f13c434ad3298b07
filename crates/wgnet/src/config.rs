//! `GlobalOpts`-aware wrappers over `wgnet-config`.
//!
//! The CLI always runs in administrative mode: the identity gate is
//! switched off and commands act directly on the local database.

use std::path::PathBuf;

use tracing::debug;

use wgnet_config::Config;
use wgnet_core::{Controller, Store};

use crate::cli::GlobalOpts;
use crate::error::CliError;

pub fn config_path(global: &GlobalOpts) -> PathBuf {
    global
        .config
        .clone()
        .unwrap_or_else(wgnet_config::config_path)
}

pub fn load(global: &GlobalOpts) -> Result<Config, CliError> {
    let path = config_path(global);
    wgnet_config::load_config_from(&path).map_err(|e| CliError::config(e, &path))
}

pub fn db_path(global: &GlobalOpts, cfg: &Config) -> PathBuf {
    global.db.clone().unwrap_or_else(|| cfg.db_path())
}

/// Open the database and build an ungated controller over it.
pub fn build_controller(global: &GlobalOpts) -> Result<Controller, CliError> {
    let mut cfg = load(global)?;
    cfg.auth.required = false;

    let service = wgnet_config::to_service_config(&cfg)
        .map_err(|e| CliError::config(e, &config_path(global)))?;

    let db = db_path(global, &cfg);
    debug!(db = %db.display(), tunnel = %service.tunnel_inet, "opening controller");
    let store = Store::open(&db)?;
    Ok(Controller::new(service, store)?)
}
