//! Geometry kernel
//!
//! Stateless measurement math over canonical page points.
//! Canonical space is the pixel grid of a rendered page at 100% zoom after the
//! renderer has applied page rotation. Nothing in here knows about zoom.

use crate::error::{TakeoffError, TakeoffResult};

/// Point in canonical page space (pixels at 100% zoom)
#[derive(Debug, Clone, Copy, PartialEq, Default, serde::Serialize, serde::Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    /// Create a new point
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Calculate distance to another point
    pub fn distance_to(&self, other: &Point) -> f64 {
        distance(*self, *other)
    }

    /// Offset this point by a vector
    pub fn translated(&self, dx: f64, dy: f64) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }

    /// Midpoint between two points
    pub fn midpoint(&self, other: &Point) -> Self {
        Self::new((self.x + other.x) / 2.0, (self.y + other.y) / 2.0)
    }
}

/// Euclidean distance between two points
pub fn distance(a: Point, b: Point) -> f64 {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    (dx * dx + dy * dy).sqrt()
}

/// Total length of an open path through `points`
///
/// # Errors
/// Returns `InsufficientPoints` when fewer than two points are given.
pub fn polyline_length(points: &[Point]) -> TakeoffResult<f64> {
    require_points(points, 2)?;
    Ok(points.windows(2).map(|w| distance(w[0], w[1])).sum())
}

/// Area of the axis-aligned rectangle spanned by two opposite corners
pub fn rectangle_area(p0: Point, p1: Point) -> f64 {
    (p1.x - p0.x).abs() * (p1.y - p0.y).abs()
}

/// Area of a simple polygon using the shoelace formula
///
/// The loop is closed implicitly (last vertex connects back to the first).
/// The sign from traversal direction is dropped.
///
/// # Errors
/// Returns `InsufficientPoints` when fewer than three points are given.
pub fn polygon_area(points: &[Point]) -> TakeoffResult<f64> {
    require_points(points, 3)?;

    // Shift to the first vertex so large page offsets don't eat precision
    let origin = points[0];
    let n = points.len();
    let mut twice_area = 0.0;
    for i in 0..n {
        let j = (i + 1) % n;
        let (xi, yi) = (points[i].x - origin.x, points[i].y - origin.y);
        let (xj, yj) = (points[j].x - origin.x, points[j].y - origin.y);
        twice_area += xi * yj - xj * yi;
    }
    Ok(twice_area.abs() / 2.0)
}

/// Check whether `point` lies within `tolerance_px` of `candidate`
pub fn hit_test(point: Point, candidate: Point, tolerance_px: f64) -> bool {
    distance(point, candidate) <= tolerance_px
}

/// Check whether `point` lies within `tolerance` of the segment `start`-`end`
pub fn point_near_segment(point: Point, start: Point, end: Point, tolerance: f64) -> bool {
    let dx = end.x - start.x;
    let dy = end.y - start.y;
    let length_sq = dx * dx + dy * dy;

    if length_sq < 1e-12 {
        return hit_test(point, start, tolerance);
    }

    // Project onto the segment and clamp to its ends
    let t = ((point.x - start.x) * dx + (point.y - start.y) * dy) / length_sq;
    let t = t.clamp(0.0, 1.0);

    let closest = Point::new(start.x + t * dx, start.y + t * dy);
    hit_test(point, closest, tolerance)
}

/// Bounding box as (min_x, min_y, max_x, max_y), `None` for an empty slice
pub fn bounding_box(points: &[Point]) -> Option<(f64, f64, f64, f64)> {
    let first = points.first()?;
    let mut bounds = (first.x, first.y, first.x, first.y);
    for point in &points[1..] {
        bounds.0 = bounds.0.min(point.x);
        bounds.1 = bounds.1.min(point.y);
        bounds.2 = bounds.2.max(point.x);
        bounds.3 = bounds.3.max(point.y);
    }
    Some(bounds)
}

/// Point halfway along an open path
///
/// Falls back to the last point when the path has zero length.
pub fn path_midpoint(points: &[Point]) -> Option<Point> {
    match points {
        [] => None,
        [only] => Some(*only),
        _ => {
            let total: f64 = points.windows(2).map(|w| distance(w[0], w[1])).sum();
            let half = total / 2.0;

            let mut accumulated = 0.0;
            for window in points.windows(2) {
                let segment = distance(window[0], window[1]);
                if segment > 0.0 && accumulated + segment >= half {
                    let t = (half - accumulated) / segment;
                    return Some(Point::new(
                        window[0].x + t * (window[1].x - window[0].x),
                        window[0].y + t * (window[1].y - window[0].y),
                    ));
                }
                accumulated += segment;
            }

            points.last().copied()
        }
    }
}

/// Vertex average of a point set
pub fn centroid(points: &[Point]) -> Option<Point> {
    if points.is_empty() {
        return None;
    }
    let n = points.len() as f64;
    let sum_x: f64 = points.iter().map(|p| p.x).sum();
    let sum_y: f64 = points.iter().map(|p| p.y).sum();
    Some(Point::new(sum_x / n, sum_y / n))
}

fn require_points(points: &[Point], required: usize) -> TakeoffResult<()> {
    if points.len() < required {
        return Err(TakeoffError::InsufficientPoints {
            required,
            actual: points.len(),
        });
    }
    Ok(())
}
