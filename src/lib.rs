//! QuadLabel - Quadrilateral text region annotation for document images
//!
//! Core library behind the labeling tool: canonical/display coordinate
//! handling under zoom, a mutex-guarded per-image annotation store,
//! tight-box refinement, auto-annotation via a pluggable predictor, and
//! snapshot/merge persistence over a prepared data folder.

pub mod automation;
pub mod config;
pub mod error;
pub mod geometry;
pub mod refine;
pub mod session;
pub mod storage;
pub mod tasks;
pub mod workflow;
