//! A single annotated quadrilateral region

use crate::geometry::Quad;
use uuid::Uuid;

/// Stable identifier for a region, independent of its list position
pub type RegionId = Uuid;

/// One annotated region.
///
/// `canonical` points live in the original image resolution and are the
/// persisted source of truth; `display` points are always derived from them
/// by the session scale factor.
#[derive(Debug, Clone)]
pub struct Region {
    /// Unique id, stable for the region's lifetime
    pub id: RegionId,
    /// Corner points in original image coordinates
    pub canonical: Quad,
    /// Corner points in display coordinates
    pub display: Quad,
    /// Free-form text label
    pub label: String,
    /// Region type tag
    pub type_tag: String,
    /// Selection state for group operations
    pub selected: bool,
}

impl Region {
    pub fn new(
        canonical: Quad,
        type_tag: impl Into<String>,
        label: impl Into<String>,
        scale: f32,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            canonical,
            display: canonical.scaled(scale),
            label: label.into(),
            type_tag: type_tag.into(),
            selected: false,
        }
    }

    /// Recompute display points from canonical points, never the reverse
    pub fn sync_display(&mut self, scale: f32) {
        self.display = self.canonical.scaled(scale);
    }
}
