//! Typed errors for annotation flows
//!
//! Input/path problems fail fast before any processing begins; integrity
//! problems are hard failures surfaced to the caller.

use std::path::PathBuf;
use thiserror::Error;
use uuid::Uuid;

/// Errors produced by the annotation engine
#[derive(Debug, Error)]
pub enum LabelError {
    /// The source data folder is missing entirely
    #[error("data folder {} does not exist", .0.display())]
    MissingDataFolder(PathBuf),

    /// The prepared output folder is already present
    #[error("output folder {} already exists, remove it first", .0.display())]
    OutputFolderExists(PathBuf),

    /// The image directory holds no file with a supported extension
    #[error("no supported images found in {}", .0.display())]
    NoSupportedImages(PathBuf),

    /// A 1-based jump target outside the loaded image list
    #[error("invalid image index {index}, expected a value in 1..={count}")]
    InvalidJumpIndex { index: usize, count: usize },

    /// Snapshot export with diverging polygon/label/type list lengths
    #[error("length of polygons ({polygons}), labels ({labels}) and types ({types}) do not match")]
    ParallelListMismatch {
        polygons: usize,
        labels: usize,
        types: usize,
    },

    /// Mutation addressed to a region id not present in the session
    #[error("region {0} not found in session")]
    UnknownRegion(Uuid),

    /// A zoom scale that would break the display/canonical mapping
    #[error("scale factor must be positive, got {0}")]
    InvalidScale(f32),
}
