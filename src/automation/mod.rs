//! Auto-annotation gateway
//!
//! Boundary to the external OCR predictor: a fixed request/response
//! contract, score filtering, and conversion of relative geometries into
//! canonical regions. The predictor itself lives behind the [`Predictor`]
//! trait; nothing in here knows about model internals.

use crate::geometry::{self, Quad};
use crate::session::{ImageSession, RegionId};
use anyhow::{ensure, Result};
use image::{DynamicImage, Rgb, RgbImage};
use imageproc::geometric_transformations::{warp_into, Interpolation, Projection};
use std::path::Path;
use tracing::{info, warn};

/// Unfiltered predictor output: parallel geometry/text/score lists, with
/// geometries in relative `[0, 1]` coordinates
#[derive(Debug, Clone, Default)]
pub struct RawPrediction {
    /// 2-point axis-aligned boxes or 4-point polygons
    pub geometries: Vec<Vec<[f32; 2]>>,
    pub texts: Vec<String>,
    pub scores: Vec<f32>,
}

/// The external text predictor contract
pub trait Predictor: Send + Sync {
    /// Detect and recognize all words on an image
    fn predict(&self, image_path: &Path) -> Result<RawPrediction>;

    /// Recognize the text inside one quadrilateral crop, given canonical
    /// points. Implementations return an empty string for a degenerate or
    /// unrectifiable quad instead of failing.
    fn predict_label(&self, image_path: &Path, quad: &Quad) -> Result<String>;
}

/// Keep only predictions whose score exceeds `threshold`, preserving the
/// pairing between geometries and texts
pub fn filter_by_score(
    raw: RawPrediction,
    threshold: f32,
) -> Result<(Vec<Vec<[f32; 2]>>, Vec<String>)> {
    ensure!(
        raw.geometries.len() == raw.texts.len() && raw.geometries.len() == raw.scores.len(),
        "predictor returned mismatched list lengths ({}/{}/{})",
        raw.geometries.len(),
        raw.texts.len(),
        raw.scores.len()
    );
    let mut geometries = Vec::new();
    let mut texts = Vec::new();
    for ((geometry, text), score) in raw
        .geometries
        .into_iter()
        .zip(raw.texts)
        .zip(raw.scores)
    {
        if score > threshold {
            geometries.push(geometry);
            texts.push(text);
        }
    }
    Ok((geometries, texts))
}

/// Bulk-populates or single-labels a session through a [`Predictor`]
pub struct AutoAnnotator {
    predictor: Box<dyn Predictor>,
    score_threshold: f32,
}

impl AutoAnnotator {
    pub fn new(predictor: Box<dyn Predictor>, score_threshold: f32) -> Self {
        Self {
            predictor,
            score_threshold,
        }
    }

    /// Predict all words on the session image and add them as regions with
    /// the given type tag. Geometries that fail conversion are logged and
    /// dropped without affecting the rest. Returns the number of regions
    /// added.
    pub fn annotate(&self, session: &ImageSession, type_tag: &str) -> Result<usize> {
        info!(image = %session.image_path().display(), "auto annotating");
        let raw = self.predictor.predict(session.image_path())?;
        let (geometries, texts) = filter_by_score(raw, self.score_threshold)?;

        let (height, width) = session.dimensions();
        let mut quads = Vec::new();
        let mut labels = Vec::new();
        for (geometry, text) in geometries.iter().zip(texts) {
            match geometry::relative_to_canonical(geometry, height, width) {
                Some(quad) => {
                    quads.push(quad.normalize_winding());
                    labels.push(text);
                }
                None => warn!(points = geometry.len(), "dropping malformed geometry"),
            }
        }

        let types = vec![type_tag.to_string(); quads.len()];
        let added = session.add_many(quads, labels, types)?;
        info!(added, "auto annotation finished");
        Ok(added)
    }

    /// Predict the text for one existing region and store it as the
    /// region's label
    pub fn label_region(&self, session: &ImageSession, id: RegionId) -> Result<()> {
        let region = session
            .regions()
            .into_iter()
            .find(|r| r.id == id)
            .ok_or(crate::error::LabelError::UnknownRegion(id))?;
        let text = self
            .predictor
            .predict_label(session.image_path(), &region.canonical)?;
        session.set_label(id, text)
    }
}

/// Perspective-rectify a quadrilateral crop into an upright image.
///
/// Helper for [`Predictor`] implementations: maps the quad's corners onto an
/// axis-aligned rectangle sized by the quad's edge lengths. Returns `None`
/// when the quad is degenerate and no projection exists.
pub fn rectify_crop(image: &DynamicImage, quad: &Quad) -> Option<RgbImage> {
    let normalized = quad.normalize_winding();
    let [tl, tr, br, bl] = normalized.0.map(|p| (p[0] as f32, p[1] as f32));

    let dist = |a: (f32, f32), b: (f32, f32)| ((a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)).sqrt();
    let width = dist(tl, tr).max(dist(bl, br)).round();
    let height = dist(tl, bl).max(dist(tr, br)).round();
    if width < 1.0 || height < 1.0 {
        return None;
    }

    let projection = Projection::from_control_points(
        [tl, tr, br, bl],
        [(0.0, 0.0), (width, 0.0), (width, height), (0.0, height)],
    )?;

    let source = image.to_rgb8();
    let mut crop = RgbImage::new(width as u32, height as u32);
    warp_into(
        &source,
        &projection,
        Interpolation::Bilinear,
        Rgb([0u8, 0, 0]),
        &mut crop,
    );
    Some(crop)
}
