//! Command implementations for the BioProv CLI

pub mod config;
pub mod project;
pub mod workflow;

use crate::config::Config;
use crate::error::{CliError, CliResult};
use bioprov_core::{JsonFileStore, Project};

/// Open the project store named by `[storage] db_path`
pub fn open_store(config: &Config) -> CliResult<JsonFileStore> {
    log::debug!("Opening project store {}", config.storage.db_path.display());
    Ok(JsonFileStore::open(&config.storage.db_path)?)
}

/// Load a stored project by tag
pub fn load_project(config: &Config, tag: &str) -> CliResult<Project> {
    let store = open_store(config)?;
    Project::load(&store, tag)?
        .ok_or_else(|| CliError::project_not_found(tag, config.storage.db_path.clone()))
}
