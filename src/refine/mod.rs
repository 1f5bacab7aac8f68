//! Tight-box refinement
//!
//! Replaces a loose hand-drawn quadrilateral with the minimum-area rotated
//! rectangle around the thresholded pixel content inside it. Works entirely
//! in canonical, zoom-independent coordinates: the mask is built at the
//! original image resolution and the size floor and expansion margin are
//! canonical pixels.

use crate::geometry::{self, Quad};
use crate::session::{ImageSession, RegionId};
use anyhow::Result;
use image::{GrayImage, Luma};
use imageproc::contours::{find_contours, Contour};
use imageproc::drawing::draw_polygon_mut;
use imageproc::point::Point;
use tracing::{debug, info, warn};

/// Reject refinements that collapse below this side length, so a degenerate
/// mask cannot silently shrink a region to nothing
pub const MIN_SIDE: f32 = 10.0;

/// Pixels added to both dimensions of the tightened rectangle to avoid
/// clipping glyph strokes
pub const EXPAND_MARGIN: f32 = 2.0;

/// Outcome counts of one refinement pass
#[derive(Debug, Default, Clone, Copy)]
pub struct RefineReport {
    /// Regions whose points were replaced
    pub refined: usize,
    /// Regions left untouched (no content, or below the size floor)
    pub skipped: usize,
}

/// Refines selected regions and keeps an undo log for the current session.
///
/// The log is cleared on [`discard`](Refiner::discard) and must be cleared
/// via [`clear`](Refiner::clear) when the session changes.
#[derive(Debug, Default)]
pub struct Refiner {
    undo: Vec<(RegionId, Quad)>,
}

impl Refiner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of regions currently restorable
    pub fn undo_len(&self) -> usize {
        self.undo.len()
    }

    /// Tighten every selected region of the session.
    ///
    /// Regions are processed independently; a region with no inner content
    /// or a result below the size floor is skipped without an undo record,
    /// and never aborts the rest of the batch. An unreadable session image
    /// skips every region the same way instead of failing the pass. All
    /// resulting point updates are applied to the store in one guarded step.
    pub fn refine_selected(&mut self, session: &ImageSession, threshold: u8) -> Result<RefineReport> {
        let selected = session.selected_regions();
        if selected.is_empty() {
            return Ok(RefineReport::default());
        }

        let gray = match image::open(session.image_path()) {
            Ok(img) => img.to_luma8(),
            Err(e) => {
                warn!(
                    image = %session.image_path().display(),
                    "cannot load image for refinement, skipping all regions: {e}"
                );
                return Ok(RefineReport {
                    refined: 0,
                    skipped: selected.len(),
                });
            }
        };
        let binary = threshold_mask(&gray, threshold);

        let mut report = RefineReport::default();
        let mut updates = Vec::new();
        for region in &selected {
            match tighten(&binary, &region.canonical) {
                Some(quad) => {
                    updates.push((region.id, quad));
                    self.undo.push((region.id, region.canonical));
                }
                None => {
                    debug!(region = %region.id, "refinement skipped");
                    report.skipped += 1;
                }
            }
        }

        report.refined = session.apply_canonical_batch(&updates);
        info!(
            refined = report.refined,
            skipped = report.skipped,
            "tight-box pass finished"
        );
        Ok(report)
    }

    /// Restore every region in the undo log to its pre-refinement points
    /// and clear the log. With an empty log this is a no-op.
    pub fn discard(&mut self, session: &ImageSession) -> usize {
        if self.undo.is_empty() {
            return 0;
        }
        let updates: Vec<(RegionId, Quad)> = self.undo.drain(..).collect();
        let restored = session.apply_canonical_batch(&updates);
        info!(restored, "discarded tight-box changes");
        restored
    }

    /// Drop the undo log without touching any region
    pub fn clear(&mut self) {
        self.undo.clear();
    }
}

/// Binarize a grayscale image with a fixed cutoff: above -> 255, else 0
fn threshold_mask(gray: &GrayImage, cutoff: u8) -> GrayImage {
    let (w, h) = gray.dimensions();
    let mut out = GrayImage::new(w, h);
    for (x, y, pixel) in gray.enumerate_pixels() {
        if pixel[0] > cutoff {
            out.put_pixel(x, y, Luma([255u8]));
        }
    }
    out
}

/// Compute the tightened quad for one region, or `None` to skip it
fn tighten(binary: &GrayImage, quad: &Quad) -> Option<Quad> {
    let (w, h) = binary.dimensions();

    let poly: Vec<Point<i32>> = quad
        .points()
        .iter()
        .map(|p| {
            Point::new(
                p[0].clamp(0, w.saturating_sub(1) as i32),
                p[1].clamp(0, h.saturating_sub(1) as i32),
            )
        })
        .collect();
    // A quad collapsed onto itself cannot be filled as a polygon
    if poly.first() == poly.last() {
        warn!("degenerate region polygon, skipping");
        return None;
    }

    let mut mask = GrayImage::new(w, h);
    draw_polygon_mut(&mut mask, &poly, Luma([255u8]));

    // Foreground strictly inside the drawn polygon
    let mut isolated = GrayImage::new(w, h);
    for (x, y, pixel) in binary.enumerate_pixels() {
        if pixel[0] > 0 && mask.get_pixel(x, y)[0] > 0 {
            isolated.put_pixel(x, y, Luma([255u8]));
        }
    }

    let contours: Vec<Contour<i32>> = find_contours(&isolated);
    // The largest contour is the filled polygon's own outline; the content
    // we want to bound lives in the remaining ones.
    if contours.len() < 2 {
        return None;
    }
    let largest = contours
        .iter()
        .enumerate()
        .max_by(|a, b| {
            contour_area(a.1)
                .partial_cmp(&contour_area(b.1))
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .map(|(i, _)| i)?;

    let points: Vec<(f32, f32)> = contours
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != largest)
        .flat_map(|(_, c)| c.points.iter().map(|p| (p.x as f32, p.y as f32)))
        .collect();
    if points.is_empty() {
        return None;
    }

    let rect = geometry::min_area_rect(&points)?;
    if rect.width < MIN_SIDE || rect.height < MIN_SIDE {
        debug!(
            width = rect.width,
            height = rect.height,
            "tightened rectangle below size floor"
        );
        return None;
    }

    Some(rect.expanded(EXPAND_MARGIN).corner_points())
}

fn contour_area(contour: &Contour<i32>) -> f32 {
    let points: Vec<(f32, f32)> = contour
        .points
        .iter()
        .map(|p| (p.x as f32, p.y as f32))
        .collect();
    geometry::polygon_area(&points)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ZoomConfig;
    use image::Rgb;
    use std::path::Path;
    use tempfile::TempDir;

    /// White page with a black rectangle at (x, y) of size (w, h)
    fn write_test_image(dir: &Path, rect: Option<(u32, u32, u32, u32)>) -> std::path::PathBuf {
        let img = image::RgbImage::from_fn(200, 200, |px, py| {
            if let Some((x, y, w, h)) = rect {
                if px >= x && px < x + w && py >= y && py < y + h {
                    return Rgb([0u8, 0, 0]);
                }
            }
            Rgb([255u8, 255, 255])
        });
        let path = dir.join("page.png");
        img.save(&path).unwrap();
        path
    }

    fn open_session(path: &Path) -> ImageSession {
        ImageSession::new(path, (200, 200), "hash", 1.0, ZoomConfig::default()).unwrap()
    }

    #[test]
    fn test_refine_snaps_to_content() {
        let dir = TempDir::new().unwrap();
        let path = write_test_image(dir.path(), Some((60, 80, 80, 50)));
        let session = open_session(&path);

        // Loose quad well outside the black rectangle
        let id = session.add(
            Quad([[40, 60], [160, 60], [160, 150], [40, 150]]),
            "words",
            "",
        );
        session.select(&[id]);

        let mut refiner = Refiner::new();
        let report = refiner.refine_selected(&session, 128).unwrap();
        assert_eq!(report.refined, 1);
        assert_eq!(report.skipped, 0);
        assert_eq!(refiner.undo_len(), 1);

        let region = session.regions().into_iter().find(|r| r.id == id).unwrap();
        let (min_x, min_y, max_x, max_y) = region.canonical.bounds();
        // Snapped to the rectangle boundary plus the expansion margin
        assert!((56..=61).contains(&min_x), "min_x: {min_x}");
        assert!((139..=144).contains(&max_x), "max_x: {max_x}");
        assert!((76..=81).contains(&min_y), "min_y: {min_y}");
        assert!((128..=133).contains(&max_y), "max_y: {max_y}");
    }

    #[test]
    fn test_refine_then_discard_restores_exactly() {
        let dir = TempDir::new().unwrap();
        let path = write_test_image(dir.path(), Some((60, 80, 80, 50)));
        let session = open_session(&path);

        let original = Quad([[40, 60], [160, 60], [160, 150], [40, 150]]);
        let id = session.add(original, "words", "");
        session.select(&[id]);

        let mut refiner = Refiner::new();
        refiner.refine_selected(&session, 128).unwrap();
        let refined = session.regions()[0].canonical;
        assert_ne!(refined, original);

        assert_eq!(refiner.discard(&session), 1);
        assert_eq!(session.regions()[0].canonical, original);
        assert_eq!(refiner.undo_len(), 0);
    }

    #[test]
    fn test_below_floor_result_keeps_region_and_skips_undo() {
        let dir = TempDir::new().unwrap();
        // Content is only 5x5 pixels, below the 10 pixel floor
        let path = write_test_image(dir.path(), Some((100, 100, 5, 5)));
        let session = open_session(&path);

        let original = Quad([[90, 90], [120, 90], [120, 120], [90, 120]]);
        let id = session.add(original, "words", "");
        session.select(&[id]);

        let mut refiner = Refiner::new();
        let report = refiner.refine_selected(&session, 128).unwrap();
        assert_eq!(report.refined, 0);
        assert_eq!(report.skipped, 1);
        assert_eq!(refiner.undo_len(), 0);
        assert_eq!(session.regions()[0].canonical, original);
    }

    #[test]
    fn test_region_without_content_is_skipped_silently() {
        let dir = TempDir::new().unwrap();
        let path = write_test_image(dir.path(), None);
        let session = open_session(&path);

        let original = Quad([[10, 10], [80, 10], [80, 60], [10, 60]]);
        let id = session.add(original, "words", "");
        session.select(&[id]);

        let mut refiner = Refiner::new();
        let report = refiner.refine_selected(&session, 128).unwrap();
        assert_eq!(report.refined, 0);
        assert_eq!(report.skipped, 1);
        assert_eq!(session.regions()[0].canonical, original);
    }

    #[test]
    fn test_one_empty_region_does_not_abort_batch() {
        let dir = TempDir::new().unwrap();
        let path = write_test_image(dir.path(), Some((60, 80, 80, 50)));
        let session = open_session(&path);

        let with_content = session.add(
            Quad([[40, 60], [160, 60], [160, 150], [40, 150]]),
            "words",
            "",
        );
        let empty = session.add(Quad([[5, 5], [30, 5], [30, 30], [5, 30]]), "words", "");
        session.select(&[with_content, empty]);

        let mut refiner = Refiner::new();
        let report = refiner.refine_selected(&session, 128).unwrap();
        assert_eq!(report.refined, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(refiner.undo_len(), 1);
    }

    #[test]
    fn test_discard_with_empty_log_is_a_noop() {
        let dir = TempDir::new().unwrap();
        let path = write_test_image(dir.path(), None);
        let session = open_session(&path);
        let mut refiner = Refiner::new();
        assert_eq!(refiner.discard(&session), 0);
    }

    #[test]
    fn test_unreadable_image_skips_all_regions() {
        let session = ImageSession::new(
            "/nonexistent/page.png",
            (200, 200),
            "hash",
            1.0,
            ZoomConfig::default(),
        )
        .unwrap();
        let original = Quad([[0, 0], [10, 0], [10, 10], [0, 10]]);
        let a = session.add(original, "words", "");
        let b = session.add(Quad([[20, 20], [60, 20], [60, 60], [20, 60]]), "words", "");
        session.select(&[a, b]);

        let mut refiner = Refiner::new();
        let report = refiner.refine_selected(&session, 128).unwrap();
        assert_eq!(report.refined, 0);
        assert_eq!(report.skipped, 2);
        assert_eq!(refiner.undo_len(), 0);
        assert_eq!(session.regions()[0].canonical, original);
    }
}
