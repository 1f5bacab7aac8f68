//! Quadrilateral geometry
//!
//! Canonical/display point scaling, minimum-area rotated rectangles and
//! conversion of relative predictor geometries into pixel coordinates.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::f32::consts::PI;

/// One quadrilateral as four `[x, y]` integer corners
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Quad(pub [[i32; 2]; 4]);

impl Quad {
    /// The four corner points
    pub fn points(&self) -> &[[i32; 2]; 4] {
        &self.0
    }

    /// Scale into display space: `display = round(canonical * scale)`
    pub fn scaled(&self, scale: f32) -> Quad {
        Quad(self.0.map(|[x, y]| {
            [
                (x as f32 * scale).round() as i32,
                (y as f32 * scale).round() as i32,
            ]
        }))
    }

    /// Axis-aligned bounds as `(min_x, min_y, max_x, max_y)`
    pub fn bounds(&self) -> (i32, i32, i32, i32) {
        let xs = self.0.map(|p| p[0]);
        let ys = self.0.map(|p| p[1]);
        (
            xs.iter().copied().min().unwrap_or(0),
            ys.iter().copied().min().unwrap_or(0),
            xs.iter().copied().max().unwrap_or(0),
            ys.iter().copied().max().unwrap_or(0),
        )
    }

    /// Reorder corners clockwise starting at the top-left one.
    ///
    /// Axis-aligned two-point boxes and four-point polygons arrive with
    /// different corner orderings; normalizing both here keeps every stored
    /// quad non-self-intersecting.
    pub fn normalize_winding(&self) -> Quad {
        let cx = self.0.iter().map(|p| p[0] as f32).sum::<f32>() / 4.0;
        let cy = self.0.iter().map(|p| p[1] as f32).sum::<f32>() / 4.0;

        let mut classified: Vec<(usize, [i32; 2])> = self
            .0
            .iter()
            .map(|&p| {
                let corner = match ((p[0] as f32) < cx, (p[1] as f32) < cy) {
                    (true, true) => 0,   // top-left
                    (false, true) => 1,  // top-right
                    (false, false) => 2, // bottom-right
                    (true, false) => 3,  // bottom-left
                };
                (corner, p)
            })
            .collect();

        let distinct: HashSet<usize> = classified.iter().map(|(c, _)| *c).collect();
        if distinct.len() < 4 {
            // Thin or strongly rotated quads can put two corners into the
            // same quadrant; fall back to angular order around the centroid.
            return self.sort_by_angle(cx, cy);
        }

        classified.sort_by_key(|&(corner, _)| corner);
        let mut out = [[0i32; 2]; 4];
        for (i, (_, p)) in classified.into_iter().enumerate() {
            out[i] = p;
        }
        Quad(out)
    }

    fn sort_by_angle(&self, cx: f32, cy: f32) -> Quad {
        let mut angled: Vec<(f32, [i32; 2])> = self
            .0
            .iter()
            .map(|&p| {
                let mut angle = (p[1] as f32 - cy).atan2(p[0] as f32 - cx);
                if angle < -PI / 2.0 {
                    angle += 2.0 * PI;
                }
                (angle, p)
            })
            .collect();
        angled.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
        let mut out = [[0i32; 2]; 4];
        for (i, (_, p)) in angled.into_iter().enumerate() {
            out[i] = p;
        }
        Quad(out)
    }
}

/// A rotated rectangle described by center, size and angle in degrees
#[derive(Debug, Clone, Copy)]
pub struct MinAreaRect {
    pub center: (f32, f32),
    pub width: f32,
    pub height: f32,
    pub angle: f32,
}

impl MinAreaRect {
    /// Grow both dimensions by `margin` pixels, keeping center and angle
    pub fn expanded(&self, margin: f32) -> MinAreaRect {
        MinAreaRect {
            center: self.center,
            width: self.width + margin,
            height: self.height + margin,
            angle: self.angle,
        }
    }

    /// The shorter of the two sides
    pub fn min_side(&self) -> f32 {
        self.width.min(self.height)
    }

    /// The four corner points, normalized clockwise from top-left
    pub fn corner_points(&self) -> Quad {
        let cos_a = (self.angle * PI / 180.0).cos();
        let sin_a = (self.angle * PI / 180.0).sin();
        let w_2 = self.width / 2.0;
        let h_2 = self.height / 2.0;

        let corners = [(-w_2, -h_2), (w_2, -h_2), (w_2, h_2), (-w_2, h_2)];
        let mut out = [[0i32; 2]; 4];
        for (i, (x, y)) in corners.iter().enumerate() {
            let rx = x * cos_a - y * sin_a + self.center.0;
            let ry = x * sin_a + y * cos_a + self.center.1;
            out[i] = [rx.round() as i32, ry.round() as i32];
        }
        Quad(out).normalize_winding()
    }
}

/// Absolute polygon area via the shoelace formula
pub fn polygon_area(points: &[(f32, f32)]) -> f32 {
    if points.len() < 3 {
        return 0.0;
    }
    let n = points.len();
    let mut area = 0.0;
    for i in 0..n {
        let j = (i + 1) % n;
        area += points[i].0 * points[j].1;
        area -= points[j].0 * points[i].1;
    }
    area.abs() / 2.0
}

/// Minimum-area rotated rectangle over a point cloud.
///
/// Runs rotating calipers on the convex hull. Point sets whose hull is
/// degenerate (collinear or fewer than 3 points) fall back to the
/// axis-aligned bounding rectangle.
pub fn min_area_rect(points: &[(f32, f32)]) -> Option<MinAreaRect> {
    if points.is_empty() {
        return None;
    }

    let hull = convex_hull(points);
    if hull.len() < 3 {
        return Some(axis_aligned_rect(points));
    }

    let n = hull.len();
    let mut best: Option<MinAreaRect> = None;
    let mut best_area = f32::MAX;

    for i in 0..n {
        let j = (i + 1) % n;
        let edge_x = hull[j].0 - hull[i].0;
        let edge_y = hull[j].1 - hull[i].1;
        let edge_len = (edge_x * edge_x + edge_y * edge_y).sqrt();
        if edge_len < f32::EPSILON {
            continue;
        }

        // Unit edge direction and its perpendicular
        let nx = edge_x / edge_len;
        let ny = edge_y / edge_len;
        let px = -ny;
        let py = nx;

        let mut min_n = f32::MAX;
        let mut max_n = f32::MIN;
        let mut min_p = f32::MAX;
        let mut max_p = f32::MIN;
        for point in &hull {
            let proj_n = nx * (point.0 - hull[i].0) + ny * (point.1 - hull[i].1);
            let proj_p = px * (point.0 - hull[i].0) + py * (point.1 - hull[i].1);
            min_n = min_n.min(proj_n);
            max_n = max_n.max(proj_n);
            min_p = min_p.min(proj_p);
            max_p = max_p.max(proj_p);
        }

        let width = max_n - min_n;
        let height = max_p - min_p;
        let area = width * height;
        if area < best_area {
            best_area = area;
            let center_n = (min_n + max_n) / 2.0;
            let center_p = (min_p + max_p) / 2.0;
            best = Some(MinAreaRect {
                center: (
                    hull[i].0 + center_n * nx + center_p * px,
                    hull[i].1 + center_n * ny + center_p * py,
                ),
                width,
                height,
                angle: f32::atan2(ny, nx) * 180.0 / PI,
            });
        }
    }

    best.or_else(|| Some(axis_aligned_rect(points)))
}

fn axis_aligned_rect(points: &[(f32, f32)]) -> MinAreaRect {
    let min_x = points.iter().map(|p| p.0).fold(f32::INFINITY, f32::min);
    let max_x = points.iter().map(|p| p.0).fold(f32::NEG_INFINITY, f32::max);
    let min_y = points.iter().map(|p| p.1).fold(f32::INFINITY, f32::min);
    let max_y = points.iter().map(|p| p.1).fold(f32::NEG_INFINITY, f32::max);
    MinAreaRect {
        center: ((min_x + max_x) / 2.0, (min_y + max_y) / 2.0),
        width: max_x - min_x,
        height: max_y - min_y,
        angle: 0.0,
    }
}

/// Convex hull via Graham scan
fn convex_hull(points: &[(f32, f32)]) -> Vec<(f32, f32)> {
    if points.len() < 3 {
        return points.to_vec();
    }

    let mut points = points.to_vec();
    let mut start_idx = 0;
    for i in 1..points.len() {
        if points[i].1 < points[start_idx].1
            || (points[i].1 == points[start_idx].1 && points[i].0 < points[start_idx].0)
        {
            start_idx = i;
        }
    }
    points.swap(0, start_idx);
    let start = points[0];

    points[1..].sort_by(|a, b| {
        let cross = cross_product(start, *a, *b);
        if cross == 0.0 {
            let da = (a.0 - start.0).powi(2) + (a.1 - start.1).powi(2);
            let db = (b.0 - start.0).powi(2) + (b.1 - start.1).powi(2);
            da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
        } else if cross > 0.0 {
            std::cmp::Ordering::Less
        } else {
            std::cmp::Ordering::Greater
        }
    });

    let mut hull: Vec<(f32, f32)> = Vec::new();
    for point in points {
        while hull.len() > 1
            && cross_product(hull[hull.len() - 2], hull[hull.len() - 1], point) <= 0.0
        {
            hull.pop();
        }
        hull.push(point);
    }
    hull
}

fn cross_product(o: (f32, f32), a: (f32, f32), b: (f32, f32)) -> f32 {
    (a.0 - o.0) * (b.1 - o.1) - (a.1 - o.1) * (b.0 - o.0)
}

/// Convert a relative `[0, 1]` predictor geometry into pixel coordinates.
///
/// Two-point geometries are axis-aligned `[[xmin, ymin], [xmax, ymax]]`
/// boxes and expand to four rounded corners; four-point geometries map
/// point-for-point with truncation. Any other shape yields `None`.
pub fn relative_to_canonical(geometry: &[[f32; 2]], height: u32, width: u32) -> Option<Quad> {
    let (h, w) = (height as f32, width as f32);
    match geometry {
        [[xmin, ymin], [xmax, ymax]] => {
            let x0 = (w * xmin).round() as i32;
            let x1 = (w * xmax).round() as i32;
            let y0 = (h * ymin).round() as i32;
            let y1 = (h * ymax).round() as i32;
            Some(Quad([[x0, y0], [x1, y0], [x1, y1], [x0, y1]]))
        }
        [p0, p1, p2, p3] => Some(Quad([p0, p1, p2, p3].map(|p| {
            [(p[0] * w) as i32, (p[1] * h) as i32]
        }))),
        _ => None,
    }
}
