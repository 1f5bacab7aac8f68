//! Mutex-guarded annotation store for one open image
//!
//! The region list is owned exclusively by the session and only reachable
//! through synchronized operations, so an exporting reader can never observe
//! a half-updated region.

use crate::config::ZoomConfig;
use crate::error::LabelError;
use crate::geometry::Quad;
use crate::session::region::{Region, RegionId};
use anyhow::Result;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Parallel-list export of a session, consumed by the persistence layer
#[derive(Debug, Clone)]
pub struct SessionExport {
    /// Image file name, the dataset key
    pub file_name: String,
    /// `[height, width]` of the source image
    pub img_dimensions: [u32; 2],
    /// SHA-256 digest of the image file
    pub img_hash: String,
    pub polygons: Vec<Quad>,
    pub labels: Vec<String>,
    pub types: Vec<String>,
}

#[derive(Debug)]
struct SessionState {
    regions: Vec<Region>,
    scale: f32,
    dirty: bool,
    last_touched: Option<RegionId>,
}

/// The annotation context for one open image
#[derive(Debug)]
pub struct ImageSession {
    image_path: PathBuf,
    file_name: String,
    /// (height, width) of the source image
    dimensions: (u32, u32),
    image_hash: String,
    zoom: ZoomConfig,
    state: Mutex<SessionState>,
}

impl ImageSession {
    /// Open a session with an initial scale factor.
    ///
    /// The initial scale comes from [`ZoomConfig::fit_scale`] and must be
    /// positive; a non-positive value is rejected rather than clamped.
    pub fn new(
        image_path: impl Into<PathBuf>,
        dimensions: (u32, u32),
        image_hash: impl Into<String>,
        initial_scale: f32,
        zoom: ZoomConfig,
    ) -> Result<Self> {
        if initial_scale <= 0.0 {
            return Err(LabelError::InvalidScale(initial_scale).into());
        }
        let image_path = image_path.into();
        let file_name = image_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self {
            image_path,
            file_name,
            dimensions,
            image_hash: image_hash.into(),
            zoom,
            state: Mutex::new(SessionState {
                regions: Vec::new(),
                scale: initial_scale,
                dirty: false,
                last_touched: None,
            }),
        })
    }

    pub fn image_path(&self) -> &Path {
        &self.image_path
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// (height, width) of the source image
    pub fn dimensions(&self) -> (u32, u32) {
        self.dimensions
    }

    pub fn image_hash(&self) -> &str {
        &self.image_hash
    }

    /// Current zoom scale factor
    pub fn scale(&self) -> f32 {
        self.state.lock().scale
    }

    /// Apply a zoom scale. The target is quantized to the configured step;
    /// a target outside the zoom bounds is a no-op. Returns the scale in
    /// effect afterwards.
    pub fn set_zoom(&self, target: f32) -> f32 {
        let quantized = self.zoom.quantize(target);
        let mut state = self.state.lock();
        if !self.zoom.contains(quantized) {
            return state.scale;
        }
        state.scale = quantized;
        let scale = state.scale;
        for region in &mut state.regions {
            region.sync_display(scale);
        }
        scale
    }

    pub fn zoom_in(&self) -> f32 {
        let current = self.scale();
        self.set_zoom(current + self.zoom.step)
    }

    pub fn zoom_out(&self) -> f32 {
        let current = self.scale();
        self.set_zoom(current - self.zoom.step)
    }

    /// Append a new region from canonical points
    pub fn add(
        &self,
        canonical: Quad,
        type_tag: impl Into<String>,
        label: impl Into<String>,
    ) -> RegionId {
        let mut state = self.state.lock();
        let region = Region::new(canonical, type_tag, label, state.scale);
        let id = region.id;
        state.regions.push(region);
        state.dirty = true;
        state.last_touched = Some(id);
        debug!(total = state.regions.len(), "region added");
        id
    }

    /// Append a batch of regions with parallel labels and type tags
    pub fn add_many(
        &self,
        quads: Vec<Quad>,
        labels: Vec<String>,
        types: Vec<String>,
    ) -> Result<usize> {
        if quads.len() != labels.len() || quads.len() != types.len() {
            return Err(LabelError::ParallelListMismatch {
                polygons: quads.len(),
                labels: labels.len(),
                types: types.len(),
            }
            .into());
        }
        let mut state = self.state.lock();
        let scale = state.scale;
        let added = quads.len();
        for ((quad, label), type_tag) in quads.into_iter().zip(labels).zip(types) {
            let region = Region::new(quad, type_tag, label, scale);
            state.last_touched = Some(region.id);
            state.regions.push(region);
        }
        if added > 0 {
            state.dirty = true;
        }
        debug!(added, total = state.regions.len(), "regions added");
        Ok(added)
    }

    /// Remove every region whose id is in `ids`. Removal is id-based, so
    /// deleting several regions at once cannot corrupt positions.
    pub fn remove(&self, ids: &HashSet<RegionId>) -> usize {
        let mut state = self.state.lock();
        let before = state.regions.len();
        state.regions.retain(|r| !ids.contains(&r.id));
        let removed = before - state.regions.len();
        if removed > 0 {
            state.dirty = true;
            if state
                .last_touched
                .map(|id| ids.contains(&id))
                .unwrap_or(false)
            {
                state.last_touched = None;
            }
        }
        removed
    }

    pub fn select(&self, ids: &[RegionId]) {
        let mut state = self.state.lock();
        for region in &mut state.regions {
            if ids.contains(&region.id) {
                region.selected = true;
            }
        }
        if let Some(last) = ids.last() {
            state.last_touched = Some(*last);
        }
    }

    pub fn deselect(&self, ids: &[RegionId]) {
        let mut state = self.state.lock();
        for region in &mut state.regions {
            if ids.contains(&region.id) {
                region.selected = false;
            }
        }
    }

    pub fn select_all(&self) {
        let mut state = self.state.lock();
        for region in &mut state.regions {
            region.selected = true;
        }
    }

    pub fn deselect_all(&self) {
        let mut state = self.state.lock();
        for region in &mut state.regions {
            region.selected = false;
        }
    }

    /// Snapshot of all regions. The copy is taken under the lock, so later
    /// mutations are never observed by an in-flight iteration.
    pub fn regions(&self) -> Vec<Region> {
        self.state.lock().regions.clone()
    }

    /// Snapshot of the currently selected regions
    pub fn selected_regions(&self) -> Vec<Region> {
        self.state
            .lock()
            .regions
            .iter()
            .filter(|r| r.selected)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.state.lock().regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().regions.is_empty()
    }

    /// Set the text label of one region
    pub fn set_label(&self, id: RegionId, text: impl Into<String>) -> Result<()> {
        let mut state = self.state.lock();
        let region = state
            .regions
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(LabelError::UnknownRegion(id))?;
        region.label = text.into();
        state.dirty = true;
        state.last_touched = Some(id);
        Ok(())
    }

    /// Set the type tag of one region
    pub fn set_type(&self, id: RegionId, tag: impl Into<String>) -> Result<()> {
        let mut state = self.state.lock();
        let region = state
            .regions
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(LabelError::UnknownRegion(id))?;
        region.type_tag = tag.into();
        state.dirty = true;
        state.last_touched = Some(id);
        Ok(())
    }

    /// Move one corner of a region. The input arrives in display space and
    /// is written back into canonical space in the same guarded step, so
    /// canonical points stay authoritative.
    pub fn drag_point(&self, id: RegionId, corner: usize, display: [i32; 2]) -> Result<()> {
        if corner >= 4 {
            anyhow::bail!("corner index {corner} out of range");
        }
        let mut state = self.state.lock();
        let scale = state.scale;
        let region = state
            .regions
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(LabelError::UnknownRegion(id))?;
        region.canonical.0[corner] = [
            (display[0] as f32 / scale).round() as i32,
            (display[1] as f32 / scale).round() as i32,
        ];
        region.sync_display(scale);
        state.dirty = true;
        state.last_touched = Some(id);
        Ok(())
    }

    /// Replace canonical points for a batch of regions in one guarded step.
    /// Ids not present in the session are skipped. Returns the number of
    /// regions updated.
    pub fn apply_canonical_batch(&self, updates: &[(RegionId, Quad)]) -> usize {
        let mut state = self.state.lock();
        let scale = state.scale;
        let mut applied = 0;
        for (id, quad) in updates {
            if let Some(region) = state.regions.iter_mut().find(|r| r.id == *id) {
                region.canonical = *quad;
                region.sync_display(scale);
                applied += 1;
            }
        }
        if applied > 0 {
            state.dirty = true;
            state.last_touched = updates.last().map(|(id, _)| *id);
        }
        applied
    }

    /// Export the session as parallel lists for persistence. Taken under the
    /// lock, so the lists always describe one consistent region set.
    pub fn export(&self) -> Result<SessionExport> {
        let state = self.state.lock();
        let polygons: Vec<Quad> = state.regions.iter().map(|r| r.canonical).collect();
        let labels: Vec<String> = state.regions.iter().map(|r| r.label.clone()).collect();
        let types: Vec<String> = state.regions.iter().map(|r| r.type_tag.clone()).collect();
        if polygons.len() != labels.len() || polygons.len() != types.len() {
            return Err(LabelError::ParallelListMismatch {
                polygons: polygons.len(),
                labels: labels.len(),
                types: types.len(),
            }
            .into());
        }
        Ok(SessionExport {
            file_name: self.file_name.clone(),
            img_dimensions: [self.dimensions.0, self.dimensions.1],
            img_hash: self.image_hash.clone(),
            polygons,
            labels,
            types,
        })
    }

    /// Whether regions changed since the last snapshot write
    pub fn is_dirty(&self) -> bool {
        self.state.lock().dirty
    }

    /// Reset the dirty flag after a successful snapshot write
    pub fn mark_clean(&self) {
        self.state.lock().dirty = false;
    }

    /// The most recently interacted-with region, if any
    pub fn last_touched(&self) -> Option<RegionId> {
        self.state.lock().last_touched
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> ImageSession {
        ImageSession::new(
            "/tmp/images/doc.png",
            (600, 800),
            "abc123",
            1.0,
            ZoomConfig::default(),
        )
        .unwrap()
    }

    fn quad(x: i32, y: i32, w: i32, h: i32) -> Quad {
        Quad([[x, y], [x + w, y], [x + w, y + h], [x, y + h]])
    }

    #[test]
    fn test_new_session_rejects_non_positive_scale() {
        let result = ImageSession::new(
            "/tmp/doc.png",
            (100, 100),
            "h",
            0.0,
            ZoomConfig::default(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_display_points_follow_every_zoom_step() {
        let s = session();
        let id = s.add(quad(10, 20, 40, 30), "words", "");

        let zoom = ZoomConfig::default();
        let steps = ((zoom.max_zoom - zoom.min_zoom) / zoom.step).round() as i32;
        for i in 0..=steps {
            let target = zoom.min_zoom + i as f32 * zoom.step;
            let applied = s.set_zoom(target);
            let region = s
                .regions()
                .into_iter()
                .find(|r| r.id == id)
                .expect("region present");
            assert_eq!(region.display, region.canonical.scaled(applied));
        }
    }

    #[test]
    fn test_out_of_bounds_zoom_is_a_noop() {
        let s = session();
        s.add(quad(0, 0, 100, 100), "words", "");
        let before = s.set_zoom(1.5);

        assert_eq!(s.set_zoom(0.01), before);
        assert_eq!(s.set_zoom(99.0), before);
        assert!((s.scale() - before).abs() < 0.001);
    }

    #[test]
    fn test_zoom_in_and_out_step_by_quantum() {
        let s = session();
        assert!((s.zoom_in() - 1.1).abs() < 0.001);
        assert!((s.zoom_out() - 1.0).abs() < 0.001);
        // Walking past the lower bound stops at it
        for _ in 0..20 {
            s.zoom_out();
        }
        assert!((s.scale() - 0.1).abs() < 0.001);
    }

    #[test]
    fn test_drag_point_writes_back_canonical() {
        let s = session();
        let id = s.add(quad(10, 10, 40, 20), "words", "");
        s.set_zoom(2.0);

        s.drag_point(id, 0, [25, 31]).unwrap();
        let region = s.regions().into_iter().find(|r| r.id == id).unwrap();
        // canonical = round(display / scale)
        assert_eq!(region.canonical.0[0], [13, 16]);
        assert_eq!(region.display.0[0], [26, 32]);
        // Other corners untouched
        assert_eq!(region.canonical.0[2], [50, 30]);
    }

    #[test]
    fn test_drag_point_rejects_bad_corner_and_unknown_id() {
        let s = session();
        let id = s.add(quad(0, 0, 10, 10), "words", "");
        assert!(s.drag_point(id, 4, [0, 0]).is_err());
        assert!(s.drag_point(RegionId::new_v4(), 0, [0, 0]).is_err());
    }

    #[test]
    fn test_remove_two_of_three_by_id() {
        let s = session();
        let a = s.add(quad(0, 0, 20, 20), "words", "");
        let b = s.add(quad(30, 0, 20, 20), "words", "");
        let c = s.add(quad(60, 0, 20, 20), "words", "");
        s.select(&[a, c]);

        let selected: HashSet<RegionId> =
            s.selected_regions().into_iter().map(|r| r.id).collect();
        assert_eq!(s.remove(&selected), 2);

        let remaining = s.regions();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, b);
    }

    #[test]
    fn test_select_all_and_deselect_all() {
        let s = session();
        s.add(quad(0, 0, 10, 10), "words", "");
        s.add(quad(20, 0, 10, 10), "words", "");

        s.select_all();
        assert_eq!(s.selected_regions().len(), 2);
        s.deselect_all();
        assert!(s.selected_regions().is_empty());
    }

    #[test]
    fn test_region_snapshot_is_stable_under_mutation() {
        let s = session();
        s.add(quad(0, 0, 10, 10), "words", "");
        let snapshot = s.regions();
        s.add(quad(20, 0, 10, 10), "words", "");
        assert_eq!(snapshot.len(), 1);
        assert_eq!(s.len(), 2);
    }

    #[test]
    fn test_add_many_requires_parallel_lists() {
        let s = session();
        let result = s.add_many(
            vec![quad(0, 0, 10, 10)],
            vec!["a".to_string(), "b".to_string()],
            vec!["words".to_string()],
        );
        assert!(result.is_err());
        assert!(s.is_empty());
    }

    #[test]
    fn test_export_builds_parallel_lists() {
        let s = session();
        let a = s.add(quad(5, 5, 30, 10), "words", "hello");
        s.set_label(a, "hello world").unwrap();
        s.set_type(a, "amounts").unwrap();
        s.add(quad(50, 5, 30, 10), "words", "");

        let export = s.export().unwrap();
        assert_eq!(export.file_name, "doc.png");
        assert_eq!(export.img_dimensions, [600, 800]);
        assert_eq!(export.polygons.len(), 2);
        assert_eq!(export.labels[0], "hello world");
        assert_eq!(export.types[0], "amounts");
        assert_eq!(export.types[1], "words");
    }

    #[test]
    fn test_export_is_in_canonical_space() {
        let s = session();
        s.add(quad(10, 10, 40, 20), "words", "");
        s.set_zoom(2.0);
        let export = s.export().unwrap();
        assert_eq!(export.polygons[0], quad(10, 10, 40, 20));
    }

    #[test]
    fn test_dirty_flag_lifecycle() {
        let s = session();
        assert!(!s.is_dirty());
        let id = s.add(quad(0, 0, 10, 10), "words", "");
        assert!(s.is_dirty());
        s.mark_clean();
        assert!(!s.is_dirty());
        s.set_label(id, "x").unwrap();
        assert!(s.is_dirty());
    }

    #[test]
    fn test_last_touched_tracks_interactions() {
        let s = session();
        let a = s.add(quad(0, 0, 10, 10), "words", "");
        let b = s.add(quad(20, 0, 10, 10), "words", "");
        assert_eq!(s.last_touched(), Some(b));
        s.select(&[a]);
        assert_eq!(s.last_touched(), Some(a));
        let ids: HashSet<RegionId> = [a].into_iter().collect();
        s.remove(&ids);
        assert_eq!(s.last_touched(), None);
    }

    #[test]
    fn test_apply_canonical_batch_skips_unknown_ids() {
        let s = session();
        let id = s.add(quad(0, 0, 20, 20), "words", "");
        let updates = vec![
            (id, quad(1, 1, 18, 18)),
            (RegionId::new_v4(), quad(0, 0, 5, 5)),
        ];
        assert_eq!(s.apply_canonical_batch(&updates), 1);
        let region = s.regions().into_iter().find(|r| r.id == id).unwrap();
        assert_eq!(region.canonical, quad(1, 1, 18, 18));
    }
}
