//! # plotline-charts
//!
//! D3-style chart primitives for the plotline pipeline.
//!
//! Scales and path shapes are strategies behind the [`Scale`] and
//! [`PathStrategy`] traits:
//!
//! - `chartkit` - linear and time scales, axis ticks and their labels
//! - `path` - SVG path builder, straight and Catmull-Rom paths, and the
//!   memoizing [`PathGenerator`]

pub mod chartkit;
pub mod path;

pub use chartkit::*;
pub use path::*;

pub use plotline_core::colors;

use serde::{Deserialize, Serialize};

/// Space between the SVG edge and the plot area, in pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChartMargin {
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub left: f64,
}

impl ChartMargin {
    pub const fn new(top: f64, right: f64, bottom: f64, left: f64) -> Self {
        Self { top, right, bottom, left }
    }

    pub const fn none() -> Self {
        Self::new(0.0, 0.0, 0.0, 0.0)
    }
}

impl Default for ChartMargin {
    /// Room for a left Y axis and a bottom X axis
    fn default() -> Self {
        Self::new(20.0, 30.0, 40.0, 50.0)
    }
}

/// Outer SVG size plus margins; the plot area is what remains inside
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChartDimensions {
    pub width: f64,
    pub height: f64,
    pub margin: ChartMargin,
}

impl ChartDimensions {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            margin: ChartMargin::default(),
        }
    }

    pub fn with_margin(mut self, margin: ChartMargin) -> Self {
        self.margin = margin;
        self
    }

    pub fn plot_width(&self) -> f64 {
        (self.width - self.margin.left - self.margin.right).max(0.0)
    }

    pub fn plot_height(&self) -> f64 {
        (self.height - self.margin.top - self.margin.bottom).max(0.0)
    }

    /// Horizontal pixel range, left to right
    pub fn x_range(&self) -> (f64, f64) {
        (self.margin.left, self.width - self.margin.right)
    }

    /// Vertical pixel range, bottom to top (SVG y grows downward)
    pub fn y_range(&self) -> (f64, f64) {
        (self.height - self.margin.bottom, self.margin.top)
    }
}

impl Default for ChartDimensions {
    fn default() -> Self {
        Self::new(400.0, 300.0)
    }
}
