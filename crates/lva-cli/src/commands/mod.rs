//! CLI command implementations

use anyhow::{Context, Result};
use lva_core::Config;
use std::path::Path;

pub mod compile;
pub mod operators;
pub mod validate;

/// Project file looked up in the working directory
const DEFAULT_CONFIG: &str = "lva.yaml";

/// Load the project file if one was given or exists, else use defaults
pub fn load_project(config_path: Option<&str>) -> Result<Config> {
    match config_path {
        Some(path) => {
            tracing::debug!("Loading configuration from {}", path);
            Config::load(path)
                .with_context(|| format!("Failed to load configuration from {}", path))
        }
        None if Path::new(DEFAULT_CONFIG).exists() => {
            tracing::debug!("Loading configuration from {}", DEFAULT_CONFIG);
            Config::load(DEFAULT_CONFIG).context("Failed to load configuration")
        }
        None => Ok(Config::default()),
    }
}
