//! SVG path generation: a fluent builder, straight and Catmull-Rom
//! strategies, and a generator that memoizes smooth paths.

use plotline_core::{CacheStats, FifoCache, Point2D, clamp};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Write};
use std::sync::{Mutex, MutexGuard, PoisonError};

pub const DEFAULT_TENSION: f64 = 0.3;
pub const DEFAULT_PATH_CACHE_SIZE: usize = 100;

/// Coordinate printed with two decimals; negative zero prints as `0.00`
struct Coord(f64);

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = format!("{:.2}", self.0);
        match text.strip_prefix('-') {
            Some(magnitude) if magnitude.bytes().all(|b| b == b'0' || b == b'.') => {
                f.write_str(magnitude)
            }
            _ => f.write_str(&text),
        }
    }
}

/// Line interpolation between consecutive points
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Curve {
    #[default]
    Linear,
    Smooth,
}

// ============================================================================
// PATH BUILDER (fluent API)
// ============================================================================

/// SVG path builder with fluent API
#[derive(Debug, Clone, Default)]
pub struct PathBuilder {
    commands: String,
}

impl PathBuilder {
    pub fn new() -> Self {
        Self {
            commands: String::with_capacity(256),
        }
    }

    pub fn with_capacity(points: usize) -> Self {
        Self {
            commands: String::with_capacity(points * 32),
        }
    }

    pub fn move_to(mut self, x: f64, y: f64) -> Self {
        let _ = write!(self.commands, "M{},{}", Coord(x), Coord(y));
        self
    }

    pub fn line_to(mut self, x: f64, y: f64) -> Self {
        let _ = write!(self.commands, "L{},{}", Coord(x), Coord(y));
        self
    }

    /// Cubic segments are space separated from what precedes them
    pub fn cubic_to(mut self, c1: Point2D, c2: Point2D, end: Point2D) -> Self {
        if !self.commands.is_empty() {
            self.commands.push(' ');
        }
        let _ = write!(
            self.commands,
            "C{},{} {},{} {},{}",
            Coord(c1.x),
            Coord(c1.y),
            Coord(c2.x),
            Coord(c2.y),
            Coord(end.x),
            Coord(end.y)
        );
        self
    }

    pub fn close(mut self) -> Self {
        self.commands.push('Z');
        self
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn build(self) -> String {
        self.commands
    }
}

// ============================================================================
// STRATEGY PATTERN: Path Strategy Trait
// ============================================================================

/// Strategy trait for path generation
pub trait PathStrategy: Send + Sync {
    fn generate(&self, points: &[Point2D]) -> String;
}

/// Straight segments: `M x,y L x,y ...`
#[derive(Debug, Clone, Copy, Default)]
pub struct LinePath;

impl PathStrategy for LinePath {
    fn generate(&self, points: &[Point2D]) -> String {
        let Some((first, rest)) = points.split_first() else {
            return String::new();
        };

        rest.iter()
            .fold(
                PathBuilder::with_capacity(points.len()).move_to(first.x, first.y),
                |builder, p| builder.line_to(p.x, p.y),
            )
            .build()
    }
}

/// Catmull-Rom spline rendered as cubic Bezier segments
#[derive(Debug, Clone, Copy)]
pub struct CatmullRomPath {
    pub tension: f64,
}

impl Default for CatmullRomPath {
    fn default() -> Self {
        Self {
            tension: DEFAULT_TENSION,
        }
    }
}

impl PathStrategy for CatmullRomPath {
    fn generate(&self, points: &[Point2D]) -> String {
        let n = points.len();
        if n < 2 {
            return LinePath.generate(points);
        }

        let start = points[0];
        let builder = PathBuilder::with_capacity(n).move_to(start.x, start.y);

        if n == 2 {
            // Horizontal tangents at both ends; tension is not clamped here
            let end = points[1];
            let offset = (end.x - start.x) * self.tension * 0.5;
            return builder
                .cubic_to(
                    Point2D::new(start.x + offset, start.y),
                    Point2D::new(end.x - offset, end.y),
                    end,
                )
                .build();
        }

        let t = clamp(self.tension, 0.0, 1.0) * 0.5;
        (0..n - 1)
            .fold(builder, |builder, i| {
                let p0 = points[i.saturating_sub(1)];
                let p1 = points[i];
                let p2 = points[i + 1];
                let p3 = points[(i + 2).min(n - 1)];

                builder.cubic_to(
                    Point2D::new(p1.x + (p2.x - p0.x) * t, p1.y + (p2.y - p0.y) * t),
                    Point2D::new(p2.x - (p3.x - p1.x) * t, p2.y - (p3.y - p1.y) * t),
                    p2,
                )
            })
            .build()
    }
}

// ============================================================================
// MEMOIZING GENERATOR
// ============================================================================

/// Path generator owning a bounded FIFO memo of smooth paths.
///
/// Each owner (chart context, worker) holds its own instance.
#[derive(Debug)]
pub struct PathGenerator {
    cache: Mutex<FifoCache<String, String>>,
}

impl Default for PathGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl PathGenerator {
    pub fn new() -> Self {
        Self::with_cache_size(DEFAULT_PATH_CACHE_SIZE)
    }

    pub fn with_cache_size(max_size: usize) -> Self {
        Self {
            cache: Mutex::new(FifoCache::new(max_size)),
        }
    }

    fn cache(&self) -> MutexGuard<'_, FifoCache<String, String>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Memo key: coordinates rounded to one decimal plus the tension
    fn cache_key(points: &[Point2D], tension: f64) -> String {
        let mut key = String::with_capacity(points.len() * 12);
        for (i, p) in points.iter().enumerate() {
            if i > 0 {
                key.push('|');
            }
            let _ = write!(key, "{:.1},{:.1}", p.x, p.y);
        }
        let _ = write!(key, "_{}", tension);
        key
    }

    pub fn create_straight_path(&self, points: &[Point2D]) -> String {
        LinePath.generate(points)
    }

    pub fn create_smooth_path(&self, points: &[Point2D], tension: f64) -> String {
        if points.len() < 2 {
            return self.create_straight_path(points);
        }

        let key = Self::cache_key(points, tension);
        if let Some(path) = self.cache().get(&key) {
            return path.clone();
        }

        let path = CatmullRomPath { tension }.generate(points);
        if self.cache().insert(key, path.clone()).is_some() {
            tracing::trace!("path cache full, evicted oldest entry");
        }
        path
    }

    /// Render with the requested curve type
    pub fn render(&self, points: &[Point2D], curve: Curve, tension: f64) -> String {
        match curve {
            Curve::Linear => self.create_straight_path(points),
            Curve::Smooth => self.create_smooth_path(points, tension),
        }
    }

    pub fn is_cached(&self, points: &[Point2D], tension: f64) -> bool {
        self.cache().contains_key(&Self::cache_key(points, tension))
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache().stats()
    }

    pub fn clear_cache(&self) {
        self.cache().clear();
    }
}
