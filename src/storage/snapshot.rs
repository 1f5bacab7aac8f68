//! Per-image snapshot files and the aggregate dataset merge
//!
//! One JSON object per saved image, keyed by image file name, accumulated in
//! a temporary annotations folder; session completion merges every non-empty
//! snapshot into the aggregate dataset file.

use crate::error::LabelError;
use crate::geometry::Quad;
use crate::session::SessionExport;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Folder (under the data root) holding per-image snapshot files
pub const SNAPSHOT_DIR: &str = "tmp_annotations";
/// The merged aggregate dataset file name
pub const DATASET_FILE: &str = "labels.json";
/// Optional externally supplied annotations, used when no snapshot exists
pub const PRE_ANNOTATIONS_FILE: &str = "pre_annotations.json";

/// The serialized annotation state of one image
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotEntry {
    /// `[height, width]` of the source image
    pub img_dimensions: [u32; 2],
    /// SHA-256 digest of the image file
    pub img_hash: String,
    pub polygons: Vec<Quad>,
    pub labels: Vec<String>,
    pub types: Vec<String>,
}

/// Result of a snapshot save
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    /// Snapshot written to the given path
    Written(PathBuf),
    /// The session holds no regions; nothing was written
    NothingToSave,
}

/// Write the per-image snapshot for an exported session.
///
/// A session without regions is not an error: the write is skipped and
/// [`SaveOutcome::NothingToSave`] returned. Diverging parallel list lengths
/// are an integrity error and fail the call.
pub fn save_snapshot(export: &SessionExport, root: &Path) -> Result<SaveOutcome> {
    if export.polygons.len() != export.labels.len()
        || export.polygons.len() != export.types.len()
    {
        return Err(LabelError::ParallelListMismatch {
            polygons: export.polygons.len(),
            labels: export.labels.len(),
            types: export.types.len(),
        }
        .into());
    }
    if export.polygons.is_empty() {
        warn!(image = %export.file_name, "not saving snapshot, no regions present");
        return Ok(SaveOutcome::NothingToSave);
    }

    let entry = SnapshotEntry {
        img_dimensions: export.img_dimensions,
        img_hash: export.img_hash.clone(),
        polygons: export.polygons.clone(),
        labels: export.labels.clone(),
        types: export.types.clone(),
    };
    let mut data = BTreeMap::new();
    data.insert(export.file_name.clone(), entry);

    let dir = root.join(SNAPSHOT_DIR);
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create {}", dir.display()))?;
    let path = dir.join(format!("{}.json", file_stem(&export.file_name)));

    // serde_json leaves non-ASCII label content unescaped
    let content = serde_json::to_string_pretty(&data)?;
    std::fs::write(&path, content)
        .with_context(|| format!("failed to write {}", path.display()))?;
    info!(path = %path.display(), regions = export.polygons.len(), "snapshot saved");
    Ok(SaveOutcome::Written(path))
}

/// Merge every non-empty per-image snapshot into the aggregate dataset file
/// and return its path.
///
/// Snapshots with an empty polygon list mark "visited but empty" images and
/// are excluded. Unreadable snapshot files are logged and skipped.
pub fn merge_snapshots(root: &Path) -> Result<PathBuf> {
    let dir = root.join(SNAPSHOT_DIR);
    let mut data: BTreeMap<String, SnapshotEntry> = BTreeMap::new();

    if dir.exists() {
        for entry in std::fs::read_dir(&dir)
            .with_context(|| format!("failed to read {}", dir.display()))?
        {
            let path = entry?.path();
            if path.extension().map(|e| e != "json").unwrap_or(true) {
                continue;
            }
            match read_snapshot_file(&path) {
                Ok(map) => {
                    for (key, value) in map {
                        if !value.polygons.is_empty() {
                            data.insert(key, value);
                        }
                    }
                }
                Err(e) => warn!(path = %path.display(), "skipping unreadable snapshot: {e}"),
            }
        }
    }

    let target = root.join(DATASET_FILE);
    let content = serde_json::to_string_pretty(&data)?;
    std::fs::write(&target, content)
        .with_context(|| format!("failed to write {}", target.display()))?;
    info!(path = %target.display(), images = data.len(), "aggregate dataset saved");
    Ok(target)
}

/// Load the prior annotation state for one image.
///
/// The temporary snapshot takes precedence; the shared pre-annotations file
/// is the fallback. Corrupt or missing files are treated as "no prior
/// annotation" with a warning, never as a hard failure.
pub fn load_prior(root: &Path, file_name: &str) -> Option<SnapshotEntry> {
    let snapshot_path = root
        .join(SNAPSHOT_DIR)
        .join(format!("{}.json", file_stem(file_name)));
    if snapshot_path.exists() {
        match read_snapshot_file(&snapshot_path) {
            Ok(mut map) => {
                if let Some(entry) = map.remove(file_name) {
                    info!(image = file_name, "loaded temporary annotations");
                    return Some(entry);
                }
            }
            Err(e) => warn!(image = file_name, "unreadable temporary annotations: {e}"),
        }
    }

    let pre_path = root.join(PRE_ANNOTATIONS_FILE);
    if pre_path.exists() {
        match read_snapshot_file(&pre_path) {
            Ok(mut map) => {
                if let Some(entry) = map.remove(file_name) {
                    info!(image = file_name, "loaded pre-annotations");
                    return Some(entry);
                }
            }
            Err(e) => warn!(image = file_name, "unreadable pre-annotations: {e}"),
        }
    }
    None
}

fn read_snapshot_file(path: &Path) -> Result<BTreeMap<String, SnapshotEntry>> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

fn file_stem(file_name: &str) -> String {
    Path::new(file_name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| file_name.to_string())
}
