//! Planar geometry helpers shared by sampling and rendering

use serde::{Deserialize, Serialize};

/// A point in data or pixel space
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point2D {
    pub x: f64,
    pub y: f64,
}

impl Point2D {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: &Point2D) -> f64 {
        distance(self, other)
    }
}

impl From<(f64, f64)> for Point2D {
    fn from((x, y): (f64, f64)) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned rectangle
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    pub fn contains(&self, point: &Point2D) -> bool {
        is_point_in_rect(point, self)
    }
}

pub fn clamp(value: f64, min: f64, max: f64) -> f64 {
    value.max(min).min(max)
}

pub fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

pub fn distance(p1: &Point2D, p2: &Point2D) -> f64 {
    (p2.x - p1.x).hypot(p2.y - p1.y)
}

/// Edges count as inside
pub fn is_point_in_rect(point: &Point2D, rect: &Rect) -> bool {
    point.x >= rect.x
        && point.x <= rect.x + rect.width
        && point.y >= rect.y
        && point.y <= rect.y + rect.height
}

/// Distance from `point` to the segment `start..end`.
///
/// The projection is clamped to the segment, so points beyond either end
/// measure to the nearest endpoint. A zero-length segment degrades to
/// point-to-point distance.
pub fn perpendicular_distance(point: &Point2D, start: &Point2D, end: &Point2D) -> f64 {
    let dx = end.x - start.x;
    let dy = end.y - start.y;
    let len_sq = dx * dx + dy * dy;

    if len_sq == 0.0 {
        return distance(point, start);
    }

    let t = clamp(((point.x - start.x) * dx + (point.y - start.y) * dy) / len_sq, 0.0, 1.0);
    let projection = Point2D::new(start.x + t * dx, start.y + t * dy);
    distance(point, &projection)
}

/// Absolute area of the triangle `a, b, c`
pub fn triangle_area(a: &Point2D, b: &Point2D, c: &Point2D) -> f64 {
    ((a.x * (b.y - c.y) + b.x * (c.y - a.y) + c.x * (a.y - b.y)) / 2.0).abs()
}

/// Index of the element nearest to `target` in a slice sorted by `key`.
///
/// Binary search, so the slice must be ascending in `key`.
pub fn nearest_index<T>(items: &[T], target: f64, key: impl Fn(&T) -> f64) -> Option<usize> {
    if items.is_empty() {
        return None;
    }

    let (mut lo, mut hi) = (0usize, items.len() - 1);
    while lo < hi {
        let mid = (lo + hi) / 2;
        if key(&items[mid]) < target {
            lo = mid + 1;
        } else {
            hi = mid;
        }
    }

    if lo > 0 && (target - key(&items[lo - 1])).abs() <= (key(&items[lo]) - target).abs() {
        Some(lo - 1)
    } else {
        Some(lo)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_and_lerp() {
        assert_eq!(clamp(5.0, 0.0, 1.0), 1.0);
        assert_eq!(clamp(-5.0, 0.0, 1.0), 0.0);
        assert_eq!(lerp(0.0, 10.0, 0.25), 2.5);
    }

    #[test]
    fn test_perpendicular_distance() {
        let a = Point2D::new(0.0, 0.0);
        let b = Point2D::new(10.0, 0.0);

        assert_eq!(perpendicular_distance(&Point2D::new(5.0, 3.0), &a, &b), 3.0);
        // Beyond the end of the segment
        assert_eq!(perpendicular_distance(&Point2D::new(13.0, 4.0), &a, &b), 5.0);
        // Zero-length segment
        assert_eq!(perpendicular_distance(&Point2D::new(3.0, 4.0), &a, &a), 5.0);
    }

    #[test]
    fn test_triangle_area() {
        let area = triangle_area(
            &Point2D::new(0.0, 0.0),
            &Point2D::new(4.0, 0.0),
            &Point2D::new(0.0, 3.0),
        );
        assert_eq!(area, 6.0);
    }

    #[test]
    fn test_point_in_rect() {
        let rect = Rect::new(0.0, 0.0, 10.0, 5.0);
        assert!(rect.contains(&Point2D::new(10.0, 5.0)));
        assert!(!rect.contains(&Point2D::new(10.1, 2.0)));
    }

    #[test]
    fn test_nearest_index() {
        let xs = [0.0, 1.0, 4.0, 9.0];
        assert_eq!(nearest_index(&xs, 3.0, |v| *v), Some(2));
        assert_eq!(nearest_index(&xs, 2.0, |v| *v), Some(1));
        assert_eq!(nearest_index(&xs, 100.0, |v| *v), Some(3));
        assert_eq!(nearest_index(&xs, -5.0, |v| *v), Some(0));
        assert_eq!(nearest_index::<f64>(&[], 1.0, |v| *v), None);
    }
}
