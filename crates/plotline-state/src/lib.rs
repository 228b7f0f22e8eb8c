//! # plotline-state
//!
//! Chart state shared by the charts of one chart group: the raw rows, the
//! chart configuration, registered line charts and a render cache of the
//! processed (sampled and scaled) data.
//!
//! Every mutation invalidates the processed data; it is recomputed lazily
//! on the next read and subscribers are told about changes through a
//! broadcast channel.

pub mod context;
pub mod monitor;
pub mod pipeline;
pub mod processing;

pub use context::*;
pub use monitor::*;
pub use pipeline::*;
pub use processing::*;

use plotline_charts::{ChartDimensions, Curve, DEFAULT_TENSION};
use plotline_core::{DEFAULT_Y_KEY, DeviceType, SamplingConfig, optimal_sampling_config};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_DEBOUNCE_MS: u64 = 100;
pub const DEFAULT_MAX_CACHE_SIZE: usize = 10;
pub const DEFAULT_CACHE_TTL_MS: u64 = 5 * 60 * 1000;
pub const DEFAULT_SWEEP_INTERVAL_MS: u64 = 60 * 1000;

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ProcessingError {
    #[error("no numeric data found for chart rendering")]
    NoNumericData,

    #[error("no valid values for the {0} axis")]
    NoValidValues(&'static str),

    #[error("invalid domain [{min}, {max}]")]
    InvalidDomain { min: f64, max: f64 },
}

pub type Result<T> = std::result::Result<T, ProcessingError>;

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Configuration shared by every chart of a context
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChartConfig {
    pub dimensions: ChartDimensions,
    /// Resize notifications are coalesced over this window
    pub debounce_ms: u64,
    /// X field; when unset the first date-like field is used, else the row index
    pub x_key: Option<String>,
    /// Y field for multi-series rendering
    pub y_key: Option<String>,
    /// Explicit sampling; when unset a device preset is chosen per dataset
    pub sampling: Option<SamplingConfig>,
    pub device: DeviceType,
    pub curve: Curve,
    pub tension: f64,
    pub max_cache_size: usize,
    pub cache_ttl_ms: u64,
    pub sweep_interval_ms: u64,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            dimensions: ChartDimensions::default(),
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            x_key: None,
            y_key: None,
            sampling: None,
            device: DeviceType::default(),
            curve: Curve::default(),
            tension: DEFAULT_TENSION,
            max_cache_size: DEFAULT_MAX_CACHE_SIZE,
            cache_ttl_ms: DEFAULT_CACHE_TTL_MS,
            sweep_interval_ms: DEFAULT_SWEEP_INTERVAL_MS,
        }
    }
}

impl ChartConfig {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            dimensions: ChartDimensions::new(width, height),
            ..Default::default()
        }
    }

    pub fn with_dimensions(mut self, dimensions: ChartDimensions) -> Self {
        self.dimensions = dimensions;
        self
    }

    pub fn x_key(mut self, key: impl Into<String>) -> Self {
        self.x_key = Some(key.into());
        self
    }

    pub fn y_key(mut self, key: impl Into<String>) -> Self {
        self.y_key = Some(key.into());
        self
    }

    pub fn sampling(mut self, config: SamplingConfig) -> Self {
        self.sampling = Some(config);
        self
    }

    pub fn device(mut self, device: DeviceType) -> Self {
        self.device = device;
        self
    }

    pub fn curve(mut self, curve: Curve) -> Self {
        self.curve = curve;
        self
    }

    pub fn tension(mut self, tension: f64) -> Self {
        self.tension = tension;
        self
    }

    pub fn debounce(mut self, ms: u64) -> Self {
        self.debounce_ms = ms;
        self
    }

    pub fn cache_size(mut self, entries: usize) -> Self {
        self.max_cache_size = entries;
        self
    }

    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl_ms = ttl.as_millis() as u64;
        self
    }

    pub fn sweep_every(mut self, interval: Duration) -> Self {
        self.sweep_interval_ms = interval.as_millis() as u64;
        self
    }

    pub fn debounce_window(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn cache_max_age(&self) -> Duration {
        Duration::from_millis(self.cache_ttl_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms.max(1))
    }

    pub fn value_key(&self) -> &str {
        self.y_key.as_deref().unwrap_or(DEFAULT_Y_KEY)
    }

    /// Sampling applied to a dataset of `len` points
    pub fn sampling_for(&self, len: usize) -> SamplingConfig {
        self.sampling
            .clone()
            .unwrap_or_else(|| optimal_sampling_config(len, self.device))
    }
}

/// Per-chart settings of a registered line chart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineChartConfig {
    pub data_key: String,
    /// Opaque id of the element drawing this chart
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    /// Overrides the context curve
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub curve: Option<Curve>,
    #[serde(default = "default_stroke_width")]
    pub stroke_width: f64,
    #[serde(default)]
    pub show_dots: bool,
    #[serde(default = "default_dot_radius")]
    pub dot_radius: f64,
    #[serde(default = "default_animate")]
    pub animate: bool,
}

fn default_stroke_width() -> f64 {
    2.0
}

fn default_dot_radius() -> f64 {
    4.0
}

fn default_animate() -> bool {
    true
}

impl LineChartConfig {
    pub fn new(data_key: impl Into<String>) -> Self {
        Self {
            data_key: data_key.into(),
            handle: None,
            color: None,
            curve: None,
            stroke_width: default_stroke_width(),
            show_dots: false,
            dot_radius: default_dot_radius(),
            animate: default_animate(),
        }
    }

    pub fn with_handle(mut self, handle: impl Into<String>) -> Self {
        self.handle = Some(handle.into());
        self
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    pub fn with_curve(mut self, curve: Curve) -> Self {
        self.curve = Some(curve);
        self
    }

    pub fn stroke_width(mut self, width: f64) -> Self {
        self.stroke_width = width;
        self
    }

    pub fn show_dots(mut self, radius: f64) -> Self {
        self.show_dots = true;
        self.dot_radius = radius;
        self
    }

    pub fn animate(mut self, animate: bool) -> Self {
        self.animate = animate;
        self
    }
}

// ============================================================================
// CHART STATE FSM
// ============================================================================

/// Processing lifecycle of a chart context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChartState {
    #[default]
    Idle,
    Processing,
    Ready,
    Error,
}

impl ChartState {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Processing => "Processing...",
            Self::Ready => "Ready",
            Self::Error => "Error",
        }
    }
}

/// Change notification published by a chart context
#[derive(Debug, Clone, PartialEq)]
pub enum ChartEvent {
    DataChanged { points: usize },
    ConfigChanged,
    ChartRegistered(String),
    ChartUnregistered(String),
    Processed,
    Failed(ProcessingError),
    Resized,
    Destroyed,
}
