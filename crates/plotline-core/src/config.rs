//! Sampling configuration and device presets

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_EPSILON: f64 = 1.0;
pub const DEFAULT_X_KEY: &str = "x";
pub const DEFAULT_Y_KEY: &str = "value";

// ============================================================================
// ALGORITHMS
// ============================================================================

/// Data-reduction algorithm selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SamplingAlgorithm {
    Uniform,
    Peaks,
    DouglasPeucker,
    Visvalingam,
    #[default]
    Lttb,
    Adaptive,
    Hybrid,
}

impl SamplingAlgorithm {
    pub const ALL: [SamplingAlgorithm; 7] = [
        Self::Uniform,
        Self::Peaks,
        Self::DouglasPeucker,
        Self::Visvalingam,
        Self::Lttb,
        Self::Adaptive,
        Self::Hybrid,
    ];

    /// Wire name, matching the serde representation
    pub fn name(&self) -> &'static str {
        match self {
            Self::Uniform => "uniform",
            Self::Peaks => "peaks",
            Self::DouglasPeucker => "douglasPeucker",
            Self::Visvalingam => "visvalingam",
            Self::Lttb => "lttb",
            Self::Adaptive => "adaptive",
            Self::Hybrid => "hybrid",
        }
    }

    /// Whether the output may hold fewer points than the budget even when
    /// the input exceeds it
    pub fn is_tolerance_based(&self) -> bool {
        matches!(self, Self::DouglasPeucker)
    }
}

impl fmt::Display for SamplingAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for SamplingAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|algo| algo.name().eq_ignore_ascii_case(s))
            .or_else(|| match s.to_ascii_lowercase().as_str() {
                "douglas-peucker" | "dp" => Some(Self::DouglasPeucker),
                "vw" => Some(Self::Visvalingam),
                _ => None,
            })
            .ok_or_else(|| format!("unknown sampling algorithm: {}", s))
    }
}

// ============================================================================
// SAMPLING CONFIG
// ============================================================================

/// Configuration for a single sampling run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SamplingConfig {
    pub algorithm: SamplingAlgorithm,
    pub target_points: usize,
    /// Douglas-Peucker tolerance in data units
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub epsilon: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y_key: Option<String>,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self::new(SamplingAlgorithm::default(), 1000)
    }
}

impl SamplingConfig {
    pub fn new(algorithm: SamplingAlgorithm, target_points: usize) -> Self {
        Self {
            algorithm,
            target_points,
            epsilon: None,
            x_key: None,
            y_key: None,
        }
    }

    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = Some(epsilon);
        self
    }

    pub fn with_x_key(mut self, key: impl Into<String>) -> Self {
        self.x_key = Some(key.into());
        self
    }

    pub fn with_y_key(mut self, key: impl Into<String>) -> Self {
        self.y_key = Some(key.into());
        self
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon.unwrap_or(DEFAULT_EPSILON)
    }

    pub fn x_key(&self) -> &str {
        self.x_key.as_deref().unwrap_or(DEFAULT_X_KEY)
    }

    pub fn y_key(&self) -> &str {
        self.y_key.as_deref().unwrap_or(DEFAULT_Y_KEY)
    }
}

// ============================================================================
// DEVICE PRESETS
// ============================================================================

/// Rendering device class, used to pick a point budget
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DeviceType {
    Mobile,
    Tablet,
    #[default]
    Desktop,
    HighPerformance,
}

impl DeviceType {
    /// Maximum number of points worth drawing on this device
    pub fn sample_limit(&self) -> usize {
        match self {
            Self::Mobile => 250,
            Self::Tablet => 400,
            Self::Desktop => 800,
            Self::HighPerformance => 1200,
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Mobile => "mobile",
            Self::Tablet => "tablet",
            Self::Desktop => "desktop",
            Self::HighPerformance => "high-performance",
        };
        f.write_str(name)
    }
}

impl FromStr for DeviceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mobile" => Ok(Self::Mobile),
            "tablet" => Ok(Self::Tablet),
            "desktop" => Ok(Self::Desktop),
            "highperformance" | "high-performance" => Ok(Self::HighPerformance),
            _ => Err(format!("unknown device type: {}", s)),
        }
    }
}

/// Choose an algorithm and budget for a dataset of `data_len` points
pub fn optimal_sampling_config(data_len: usize, device: DeviceType) -> SamplingConfig {
    let target = device.sample_limit().min(data_len);

    let algorithm = if device == DeviceType::Mobile && data_len > 10_000 {
        SamplingAlgorithm::Uniform
    } else if data_len > 50_000 {
        SamplingAlgorithm::Lttb
    } else if data_len > 5_000 {
        SamplingAlgorithm::Hybrid
    } else {
        SamplingAlgorithm::Uniform
    };

    SamplingConfig::new(algorithm, target)
}
