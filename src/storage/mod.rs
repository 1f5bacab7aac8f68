//! Storage Layer
//!
//! Handles data folder preparation and annotation persistence: per-image
//! snapshot files, the merged aggregate dataset, and prior-state loading.

pub mod prepare;
pub mod snapshot;

use anyhow::Result;
use std::path::PathBuf;

/// Get the configuration directory
pub fn get_config_dir() -> Result<PathBuf> {
    let proj_dirs = directories::ProjectDirs::from("com", "quadlabel", "QuadLabel")
        .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;

    let config_dir = proj_dirs.config_dir().to_path_buf();
    std::fs::create_dir_all(&config_dir)?;

    Ok(config_dir)
}
