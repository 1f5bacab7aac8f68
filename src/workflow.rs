//! Image workflow
//!
//! Drives the labeling session across the images of a prepared data folder:
//! ordered navigation, per-image session setup with prior-state loading, and
//! snapshot/merge persistence on save and completion.

use crate::config::AppConfig;
use crate::error::LabelError;
use crate::session::ImageSession;
use crate::storage::prepare::{hash_image, SUPPORTED_FORMATS};
use crate::storage::snapshot::{self, SaveOutcome};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Result of advancing past the current image
pub enum Advance {
    /// The next image's session
    Image(ImageSession),
    /// All images visited; the aggregate dataset was written to this path
    Completed(PathBuf),
}

/// Ordered traversal over the images of one data folder
#[derive(Debug)]
pub struct Workflow {
    /// Parent of the image folder, where annotation output lives
    root: PathBuf,
    images: Vec<PathBuf>,
    curr_idx: Option<usize>,
    viewport: (u32, u32),
    config: AppConfig,
}

impl Workflow {
    /// Open a prepared image folder. The folder must exist and contain at
    /// least one supported image; traversal order is by file name.
    pub fn open(image_dir: &Path, config: AppConfig) -> Result<Self> {
        if !image_dir.is_dir() {
            return Err(LabelError::MissingDataFolder(image_dir.to_path_buf()).into());
        }
        let mut images: Vec<PathBuf> = std::fs::read_dir(image_dir)
            .with_context(|| format!("failed to read {}", image_dir.display()))?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_file() && is_supported(p))
            .collect();
        images.sort();
        if images.is_empty() {
            return Err(LabelError::NoSupportedImages(image_dir.to_path_buf()).into());
        }
        info!(count = images.len(), dir = %image_dir.display(), "workflow opened");

        let root = image_dir
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| image_dir.to_path_buf());
        let viewport = config.annotation.viewport;
        Ok(Self {
            root,
            images,
            curr_idx: None,
            viewport,
            config,
        })
    }

    /// Number of images in the traversal
    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    /// 1-based position of the current image, if one is open
    pub fn position(&self) -> Option<usize> {
        self.curr_idx.map(|i| i + 1)
    }

    /// Folder holding annotation output for this workflow
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Advance to the next image. Moving past the last image merges all
    /// snapshots into the aggregate dataset instead.
    pub fn next(&mut self) -> Result<Advance> {
        let idx = match self.curr_idx {
            None => 0,
            Some(i) => i + 1,
        };
        if idx >= self.images.len() {
            let dataset = self.complete()?;
            return Ok(Advance::Completed(dataset));
        }
        Ok(Advance::Image(self.open_session(idx)?))
    }

    /// Step back to the previous image; at the first image this reopens it.
    pub fn prev(&mut self) -> Result<ImageSession> {
        let idx = self.curr_idx.unwrap_or(0).saturating_sub(1);
        self.open_session(idx)
    }

    /// Jump to a 1-based image position
    pub fn jump(&mut self, index: usize) -> Result<ImageSession> {
        if index < 1 || index > self.images.len() {
            return Err(LabelError::InvalidJumpIndex {
                index,
                count: self.images.len(),
            }
            .into());
        }
        self.open_session(index - 1)
    }

    /// Write the session's snapshot. A session with no regions writes
    /// nothing, which is not an error.
    pub fn save(&self, session: &ImageSession) -> Result<SaveOutcome> {
        let export = session.export()?;
        let outcome = snapshot::save_snapshot(&export, &self.root)?;
        if matches!(outcome, SaveOutcome::Written(_)) {
            session.mark_clean();
        }
        Ok(outcome)
    }

    /// Merge all snapshots into the aggregate dataset file
    pub fn complete(&self) -> Result<PathBuf> {
        snapshot::merge_snapshots(&self.root)
    }

    fn open_session(&mut self, idx: usize) -> Result<ImageSession> {
        let path = &self.images[idx];
        let (width, height) = image::image_dimensions(path)
            .with_context(|| format!("failed to read dimensions of {}", path.display()))?;
        let dimensions = (height, width);
        let hash = hash_image(path)?;
        let scale = self.config.zoom.fit_scale(dimensions, self.viewport);
        let session = ImageSession::new(
            path.clone(),
            dimensions,
            hash,
            scale,
            self.config.zoom,
        )?;

        if let Some(prior) = snapshot::load_prior(&self.root, session.file_name()) {
            if prior.img_hash != session.image_hash() {
                warn!(
                    image = session.file_name(),
                    "prior annotations were made against a different image file"
                );
            }
            session.add_many(prior.polygons, prior.labels, prior.types)?;
            session.mark_clean();
        }

        self.curr_idx = Some(idx);
        info!(
            image = session.file_name(),
            position = idx + 1,
            total = self.images.len(),
            "session opened"
        );
        Ok(session)
    }
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
