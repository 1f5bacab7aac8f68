//! Data folder preparation
//!
//! Normalizes a folder of source documents into the `images` folder the
//! labeling workflow operates on: every supported image is re-encoded to PNG
//! and named after the SHA-256 digest of its original bytes, so repeated
//! preparation runs and duplicate source files collapse to one output.

use crate::error::LabelError;
use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// File extensions accepted as labeling input
pub const SUPPORTED_FORMATS: [&str; 3] = ["jpg", "jpeg", "png"];

/// What a preparation run produced
#[derive(Debug, Clone)]
pub struct PrepareSummary {
    /// Number of images written to the output folder
    pub prepared: usize,
    /// Number of entries skipped (unsupported format or unreadable)
    pub skipped: usize,
    pub output_dir: PathBuf,
}

/// Prepare a source folder for labeling.
///
/// Fails fast if the source folder is missing or if the output folder
/// already exists next to it; individual files that cannot be processed are
/// logged and skipped without aborting the run.
pub fn prepare_data_folder(source: &Path) -> Result<PrepareSummary> {
    if !source.is_dir() {
        return Err(LabelError::MissingDataFolder(source.to_path_buf()).into());
    }
    let parent = source.parent().unwrap_or(source);
    let output_dir = parent.join("images");
    if output_dir.exists() {
        return Err(LabelError::OutputFolderExists(output_dir).into());
    }
    std::fs::create_dir_all(&output_dir)
        .with_context(|| format!("failed to create {}", output_dir.display()))?;

    let mut prepared = 0;
    let mut skipped = 0;
    for entry in std::fs::read_dir(source)
        .with_context(|| format!("failed to read {}", source.display()))?
    {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        if !is_supported(&path) {
            warn!(path = %path.display(), "skipping unsupported file");
            skipped += 1;
            continue;
        }
        match convert_image(&path, &output_dir) {
            Ok(target) => {
                info!(source = %path.display(), target = %target.display(), "image prepared");
                prepared += 1;
            }
            Err(e) => {
                error!(path = %path.display(), "failed to prepare image: {e:#}");
                skipped += 1;
            }
        }
    }

    info!(prepared, skipped, output = %output_dir.display(), "data folder prepared");
    Ok(PrepareSummary {
        prepared,
        skipped,
        output_dir,
    })
}

/// SHA-256 digest of a file's bytes, hex encoded.
pub fn hash_image(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    Ok(format!("{:x}", Sha256::digest(&bytes)))
}

fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            let ext = e.to_ascii_lowercase();
            SUPPORTED_FORMATS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

fn convert_image(path: &Path, output_dir: &Path) -> Result<PathBuf> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let digest = format!("{:x}", Sha256::digest(&bytes));

    let img = image::load_from_memory(&bytes)
        .with_context(|| format!("failed to decode {}", path.display()))?;
    let mut encoded = Vec::new();
    img.write_to(&mut Cursor::new(&mut encoded), image::ImageFormat::Png)
        .context("failed to encode PNG")?;

    let target = output_dir.join(format!("{digest}.png"));
    std::fs::write(&target, encoded)
        .with_context(|| format!("failed to write {}", target.display()))?;
    Ok(target)
}
