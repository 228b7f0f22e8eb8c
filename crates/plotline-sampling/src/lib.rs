//! # plotline-sampling
//!
//! Reduces large series to a visually equivalent number of points.
//!
//! ## Architecture
//!
//! Rows are ingested once into typed `(index, Point2D)` records; each
//! algorithm is a [`Sampler`] strategy that picks indices, which are mapped
//! back to the original rows. Output is therefore always a subsequence of
//! the input, with order preserved.
//!
//! ## Modules
//!
//! - `algorithms` - The seven samplers and their index functions
//! - `stats` - Volatility, summary statistics, benchmarking
//! - `align` - Resampling several series onto one X axis

pub mod algorithms;
pub mod align;
pub mod stats;

pub use algorithms::*;
pub use align::*;
pub use stats::*;

use plotline_core::{BatchOutcome, DataPoint, Point2D, Progress, SampleOutcome, SamplingConfig};
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SamplingError {
    #[error("batch has {datasets} datasets but no sampling config")]
    MissingConfig { datasets: usize },
}

pub type Result<T> = std::result::Result<T, SamplingError>;

// ============================================================================
// INGESTION
// ============================================================================

/// Rows with a numeric Y, as points plus their positions in the input
#[derive(Debug, Clone, Default)]
pub struct SeriesPoints {
    pub indices: Vec<usize>,
    pub points: Vec<Point2D>,
}

impl SeriesPoints {
    /// Rows whose `y_key` is not numeric are skipped. X falls back to the
    /// row index when `x_key` does not coerce to a number.
    pub fn extract(data: &[DataPoint], x_key: &str, y_key: &str) -> Self {
        let mut series = Self {
            indices: Vec::with_capacity(data.len()),
            points: Vec::with_capacity(data.len()),
        };

        for (i, row) in data.iter().enumerate() {
            let Some(y) = row.number(y_key) else {
                continue;
            };
            let x = row.axis_value(x_key).unwrap_or(i as f64);
            series.indices.push(i);
            series.points.push(Point2D::new(x, y));
        }

        let skipped = data.len() - series.len();
        if skipped > 0 {
            tracing::warn!(skipped, y_key, "skipping rows without a numeric value");
        }
        series
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

// ============================================================================
// DISPATCH
// ============================================================================

/// Reduce `data` to at most `config.target_points` rows.
///
/// Input that already fits the budget is returned unchanged, except for
/// Douglas-Peucker which always applies its tolerance.
pub fn sample_data(data: &[DataPoint], config: &SamplingConfig) -> Vec<DataPoint> {
    let target = config.target_points;
    if data.is_empty() || target == 0 {
        return Vec::new();
    }
    if data.len() <= target && !config.algorithm.is_tolerance_based() {
        return data.to_vec();
    }

    let series = SeriesPoints::extract(data, config.x_key(), config.y_key());
    let selected: Vec<usize> = if target == 1 {
        series.indices.first().copied().into_iter().collect()
    } else {
        let sampler = sampler_for(config.algorithm, config.epsilon());
        sampler
            .select(&series.points, target)
            .into_iter()
            .map(|i| series.indices[i])
            .collect()
    };

    tracing::debug!(
        algorithm = %config.algorithm,
        input = data.len(),
        output = selected.len(),
        target,
        "sampled series"
    );
    selected.into_iter().map(|i| data[i].clone()).collect()
}

/// [`sample_data`] plus timing and compression figures.
///
/// A panic inside an algorithm is reported as `success: false` rather
/// than unwinding into the caller.
pub fn sample_with_metrics(data: &[DataPoint], config: &SamplingConfig) -> SampleOutcome {
    let start = Instant::now();
    let result = panic::catch_unwind(AssertUnwindSafe(|| sample_data(data, config)));
    let processing_time = start.elapsed().as_secs_f64() * 1000.0;

    match result {
        Ok(sampled) => {
            let compression_ratio = if sampled.is_empty() {
                1.0
            } else {
                data.len() as f64 / sampled.len() as f64
            };
            SampleOutcome {
                success: true,
                original_length: data.len(),
                sampled_length: sampled.len(),
                data: sampled,
                processing_time,
                algorithm: config.algorithm,
                compression_ratio,
                error: None,
            }
        }
        Err(_) => {
            tracing::error!(algorithm = %config.algorithm, "sampling panicked");
            SampleOutcome {
                success: false,
                data: Vec::new(),
                original_length: data.len(),
                sampled_length: 0,
                processing_time: 0.0,
                algorithm: config.algorithm,
                compression_ratio: 1.0,
                error: Some(format!("{} sampling failed", config.algorithm)),
            }
        }
    }
}

/// Sample several datasets; dataset `i` uses `configs[i]`, else `configs[0]`.
///
/// Batches of more than five datasets report progress roughly every tenth.
pub fn sample_batch(
    datasets: &[Vec<DataPoint>],
    configs: &[SamplingConfig],
    mut on_progress: impl FnMut(Progress),
) -> Result<BatchOutcome> {
    let Some(fallback) = configs.first() else {
        return Err(SamplingError::MissingConfig {
            datasets: datasets.len(),
        });
    };

    let start = Instant::now();
    let total = datasets.len();
    let every = total.div_ceil(10).max(1);

    let results = datasets
        .iter()
        .enumerate()
        .map(|(i, data)| {
            let outcome = sample_with_metrics(data, configs.get(i).unwrap_or(fallback));
            if total > 5 && i % every == 0 {
                on_progress(Progress::new(i + 1, total));
            }
            outcome
        })
        .collect();

    Ok(BatchOutcome {
        success: true,
        results,
        total_processing_time: start.elapsed().as_secs_f64() * 1000.0,
        datasets_processed: total,
    })
}
