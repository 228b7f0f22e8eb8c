//! # plotline-worker
//!
//! Runs sampling, alignment and path work on a dedicated thread so large
//! datasets never block the interactive side.
//!
//! ## Architecture
//!
//! The worker thread owns a [`RequestProcessor`] and talks to the rest of
//! the program only through the message protocol in
//! `plotline_core::protocol`. A [`WorkerHandle`] correlates responses to
//! requests by id; an [`OffloadScheduler`] decides per call whether to go
//! through the worker or run inline.

pub mod scheduler;
pub mod worker;

pub use scheduler::*;
pub use worker::*;

use plotline_charts::PathGenerator;
use plotline_core::{PathOutcome, Progress, ResultPayload, SamplingAlgorithm, SamplingConfig, WorkerRequest};
use plotline_sampling::{
    analyze, benchmark_sampling, calculate_statistics, sample_batch, sample_multiple_lines, sample_with_metrics,
};
use std::time::Duration;
use thiserror::Error;

/// Datasets above this many points are offloaded
pub const DEFAULT_OFFLOAD_THRESHOLD: usize = 5000;
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;
pub const DEFAULT_THREAD_NAME: &str = "plotline-worker";

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error, Clone, PartialEq)]
pub enum WorkerError {
    #[error("worker terminated")]
    Terminated,

    #[error("worker is not ready")]
    NotReady,

    #[error("failed to spawn worker thread: {0}")]
    Spawn(String),

    #[error("no tokio runtime available to drive the worker")]
    NoRuntime,

    #[error("worker request queue closed")]
    QueueClosed,

    #[error("worker rejected request: {0}")]
    Rejected(String),

    #[error("request timed out")]
    Timeout,

    #[error("unexpected response, wanted a {expected} result")]
    UnexpectedResponse { expected: &'static str },
}

pub type Result<T> = std::result::Result<T, WorkerError>;

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Offload worker configuration
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Inputs larger than this are sent to the worker
    pub offload_threshold: usize,
    /// Bound of the request queue
    pub queue_capacity: usize,
    pub thread_name: String,
    /// `None` leaves requests pending until answered or terminated
    pub request_timeout: Option<Duration>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            offload_threshold: DEFAULT_OFFLOAD_THRESHOLD,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            thread_name: DEFAULT_THREAD_NAME.to_string(),
            request_timeout: None,
        }
    }
}

impl WorkerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn threshold(mut self, points: usize) -> Self {
        self.offload_threshold = points;
        self
    }

    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    pub fn thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Offload almost everything (for tests and very slow devices)
    pub fn eager() -> Self {
        Self {
            offload_threshold: 0,
            ..Default::default()
        }
    }
}

// ============================================================================
// STRATEGY PATTERN: Request Processor
// ============================================================================

/// What the worker thread executes for each request
pub trait RequestProcessor: Send + 'static {
    /// Produce the result for one request. `Err` becomes an `error`
    /// response carrying the message.
    fn process(
        &mut self,
        request: WorkerRequest,
        on_progress: &mut dyn FnMut(Progress),
    ) -> std::result::Result<ResultPayload, String>;
}

/// Default processor: the sampling engine, aligner and path generator
#[derive(Default)]
pub struct SamplingProcessor {
    paths: PathGenerator,
}

impl SamplingProcessor {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RequestProcessor for SamplingProcessor {
    fn process(
        &mut self,
        request: WorkerRequest,
        on_progress: &mut dyn FnMut(Progress),
    ) -> std::result::Result<ResultPayload, String> {
        let payload = match request {
            WorkerRequest::Sample { data, config, .. } => ResultPayload::Sample(sample_with_metrics(&data, &config)),
            WorkerRequest::Batch { datasets, configs, .. } => {
                let outcome = sample_batch(&datasets, &configs, on_progress).map_err(|e| e.to_string())?;
                ResultPayload::Batch(outcome)
            }
            WorkerRequest::Benchmark {
                data,
                algorithms,
                target_points,
                ..
            } => {
                let base = SamplingConfig::new(SamplingAlgorithm::default(), target_points);
                ResultPayload::Benchmark(benchmark_sampling(&data, &algorithms, &base))
            }
            WorkerRequest::Analyze { data, y_key, .. } => ResultPayload::Analyze(analyze(&data, &y_key)),
            WorkerRequest::Align {
                lines,
                sample_rate,
                x_key,
                ..
            } => ResultPayload::Align(sample_multiple_lines(&lines, sample_rate, &x_key)),
            WorkerRequest::Statistics { data, y_key, .. } => {
                ResultPayload::Statistics(calculate_statistics(&data, &y_key))
            }
            WorkerRequest::Path { points, tension, .. } => {
                let path = match tension {
                    Some(tension) => self.paths.create_smooth_path(&points, tension),
                    None => self.paths.create_straight_path(&points),
                };
                ResultPayload::Path(PathOutcome { path })
            }
        };
        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plotline_core::{DataPoint, Point2D};

    #[test]
    fn test_worker_config_builder() {
        let config = WorkerConfig::new()
            .threshold(100)
            .queue_capacity(0)
            .thread_name("sampler")
            .timeout(Duration::from_secs(2));

        assert_eq!(config.offload_threshold, 100);
        assert_eq!(config.queue_capacity, 1);
        assert_eq!(config.thread_name, "sampler");
        assert_eq!(config.request_timeout, Some(Duration::from_secs(2)));
        assert_eq!(WorkerConfig::default().request_timeout, None);
    }

    #[test]
    fn test_processor_batch_without_config_errors() {
        let mut processor = SamplingProcessor::new();
        let request = WorkerRequest::Batch {
            id: "b".into(),
            datasets: vec![vec![DataPoint::new().with("value", 1.0)]],
            configs: Vec::new(),
        };
        let err = processor.process(request, &mut |_| {}).unwrap_err();
        assert!(err.contains("no sampling config"));
    }

    #[test]
    fn test_processor_path_kinds() {
        let mut processor = SamplingProcessor::new();
        let points = vec![Point2D::new(0.0, 0.0), Point2D::new(10.0, 10.0)];

        let straight = processor
            .process(
                WorkerRequest::Path {
                    id: "p".into(),
                    points: points.clone(),
                    tension: None,
                },
                &mut |_| {},
            )
            .unwrap();
        assert_eq!(
            straight,
            ResultPayload::Path(PathOutcome {
                path: "M0.00,0.00L10.00,10.00".into()
            })
        );

        let smooth = processor
            .process(
                WorkerRequest::Path {
                    id: "p".into(),
                    points,
                    tension: Some(0.3),
                },
                &mut |_| {},
            )
            .unwrap();
        assert!(matches!(smooth, ResultPayload::Path(PathOutcome { ref path }) if path.contains('C')));
    }
}
