//! Message protocol between the interactive side and an offload worker.
//!
//! Requests carry a caller-generated `id`; every response except `ready`
//! echoes it back. A request gets exactly one terminal response (`result`
//! or `error`) and any number of `progress` events before it.

use crate::{DataPoint, LineData, Point2D, SamplingAlgorithm, SamplingConfig};
use serde::{Deserialize, Serialize};

// ============================================================================
// RESULT PAYLOADS
// ============================================================================

/// Result of one sampling run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SampleOutcome {
    pub success: bool,
    pub data: Vec<DataPoint>,
    pub original_length: usize,
    pub sampled_length: usize,
    /// Milliseconds
    pub processing_time: f64,
    pub algorithm: SamplingAlgorithm,
    pub compression_ratio: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchOutcome {
    pub success: bool,
    pub results: Vec<SampleOutcome>,
    pub total_processing_time: f64,
    pub datasets_processed: usize,
}

/// Timing of one algorithm in a benchmark run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BenchmarkEntry {
    pub algorithm: SamplingAlgorithm,
    pub processing_time: f64,
    pub compression_ratio: f64,
    pub sampled_points: usize,
    pub success: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkOutcome {
    pub results: Vec<BenchmarkEntry>,
}

impl BenchmarkOutcome {
    pub fn get(&self, algorithm: SamplingAlgorithm) -> Option<&BenchmarkEntry> {
        self.results.iter().find(|entry| entry.algorithm == algorithm)
    }

    /// Fastest successful algorithm
    pub fn fastest(&self) -> Option<&BenchmarkEntry> {
        self.results
            .iter()
            .filter(|entry| entry.success)
            .min_by(|a, b| a.processing_time.total_cmp(&b.processing_time))
    }
}

/// Volatility analysis of a dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisOutcome {
    pub success: bool,
    /// `None` when the coefficient of variation is undefined
    pub volatility: Option<f64>,
    pub data_length: usize,
    pub recommended_algorithm: SamplingAlgorithm,
}

/// Summary statistics over the numeric values of a field
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DataStatistics {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub median: f64,
    pub std: f64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlignmentMetadata {
    pub original_points: usize,
    pub sampled_points: usize,
    pub compression_ratio: f64,
    pub target_sample_size: usize,
    pub unified_x_values: usize,
    pub lines_processed: usize,
}

/// Series resampled onto a shared X axis
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AlignedLines {
    pub lines: Vec<LineData>,
    /// `None` when alignment was skipped or failed
    pub metadata: Option<AlignmentMetadata>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathOutcome {
    pub path: String,
}

/// Operation-specific body of a `result` response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ResultPayload {
    Sample(SampleOutcome),
    Batch(BatchOutcome),
    Benchmark(BenchmarkOutcome),
    Analyze(AnalysisOutcome),
    Align(AlignedLines),
    Statistics(DataStatistics),
    Path(PathOutcome),
}

// ============================================================================
// REQUESTS & RESPONSES
// ============================================================================

fn default_y_key() -> String {
    crate::DEFAULT_Y_KEY.to_string()
}

fn default_x_key() -> String {
    crate::DEFAULT_X_KEY.to_string()
}

/// Request sent to the worker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum WorkerRequest {
    Sample {
        id: String,
        data: Vec<DataPoint>,
        config: SamplingConfig,
    },
    /// Datasets without their own config use `configs[0]`
    Batch {
        id: String,
        datasets: Vec<Vec<DataPoint>>,
        configs: Vec<SamplingConfig>,
    },
    #[serde(rename_all = "camelCase")]
    Benchmark {
        id: String,
        data: Vec<DataPoint>,
        algorithms: Vec<SamplingAlgorithm>,
        target_points: usize,
    },
    #[serde(rename_all = "camelCase")]
    Analyze {
        id: String,
        data: Vec<DataPoint>,
        #[serde(default = "default_y_key")]
        y_key: String,
    },
    #[serde(rename_all = "camelCase")]
    Align {
        id: String,
        lines: Vec<LineData>,
        sample_rate: f64,
        #[serde(default = "default_x_key")]
        x_key: String,
    },
    #[serde(rename_all = "camelCase")]
    Statistics {
        id: String,
        data: Vec<DataPoint>,
        #[serde(default = "default_y_key")]
        y_key: String,
    },
    /// Smooth path when a tension is given, straight otherwise
    Path {
        id: String,
        points: Vec<Point2D>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tension: Option<f64>,
    },
}

impl WorkerRequest {
    pub fn id(&self) -> &str {
        match self {
            Self::Sample { id, .. }
            | Self::Batch { id, .. }
            | Self::Benchmark { id, .. }
            | Self::Analyze { id, .. }
            | Self::Align { id, .. }
            | Self::Statistics { id, .. }
            | Self::Path { id, .. } => id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Sample { .. } => "sample",
            Self::Batch { .. } => "batch",
            Self::Benchmark { .. } => "benchmark",
            Self::Analyze { .. } => "analyze",
            Self::Align { .. } => "align",
            Self::Statistics { .. } => "statistics",
            Self::Path { .. } => "path",
        }
    }
}

/// Message sent back by the worker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum WorkerResponse {
    Ready,
    Result {
        id: String,
        #[serde(flatten)]
        payload: ResultPayload,
    },
    Progress {
        id: String,
        completed: usize,
        total: usize,
        percentage: u32,
    },
    Error {
        id: String,
        error: String,
    },
}

impl WorkerResponse {
    pub fn id(&self) -> Option<&str> {
        match self {
            Self::Ready => None,
            Self::Result { id, .. } | Self::Progress { id, .. } | Self::Error { id, .. } => Some(id),
        }
    }

    /// Whether this response completes its request
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Result { .. } | Self::Error { .. })
    }
}

/// Batch progress event payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
    pub percentage: u32,
}

impl Progress {
    pub fn new(completed: usize, total: usize) -> Self {
        let percentage = if total == 0 {
            100
        } else {
            ((completed as f64 / total as f64) * 100.0).round() as u32
        };
        Self {
            completed,
            total,
            percentage,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_wire_format() {
        let json = r#"{
            "type": "sample",
            "id": "req-1",
            "data": [{"x": 1, "value": 2}],
            "config": {"algorithm": "lttb", "targetPoints": 10}
        }"#;
        let request: WorkerRequest = serde_json::from_str(json).unwrap();

        assert_eq!(request.id(), "req-1");
        assert_eq!(request.kind(), "sample");
        match request {
            WorkerRequest::Sample { data, config, .. } => {
                assert_eq!(data.len(), 1);
                assert_eq!(config.algorithm, SamplingAlgorithm::Lttb);
            }
            other => panic!("unexpected request: {:?}", other),
        }
    }

    #[test]
    fn test_analyze_default_key() {
        let request: WorkerRequest =
            serde_json::from_str(r#"{"type":"analyze","id":"a","data":[]}"#).unwrap();
        assert!(matches!(request, WorkerRequest::Analyze { ref y_key, .. } if y_key == "value"));
    }

    #[test]
    fn test_response_round_trip() {
        let response = WorkerResponse::Result {
            id: "r".into(),
            payload: ResultPayload::Path(PathOutcome { path: "M0.00,0.00".into() }),
        };
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains(r#""type":"result""#));
        assert!(json.contains(r#""kind":"path""#));

        let back: WorkerResponse = serde_json::from_str(&json).unwrap();
        assert_eq!(back, response);
        assert!(back.is_terminal());
    }

    #[test]
    fn test_ready_has_no_id() {
        let json = serde_json::to_string(&WorkerResponse::Ready).unwrap();
        assert_eq!(json, r#"{"type":"ready"}"#);
        assert_eq!(WorkerResponse::Ready.id(), None);
    }

    #[test]
    fn test_progress_percentage() {
        assert_eq!(Progress::new(1, 3).percentage, 33);
        assert_eq!(Progress::new(2, 3).percentage, 67);
        assert_eq!(Progress::new(0, 0).percentage, 100);
    }

    #[test]
    fn test_benchmark_fastest() {
        let entry = |algorithm, processing_time, success| BenchmarkEntry {
            algorithm,
            processing_time,
            compression_ratio: 1.0,
            sampled_points: 1,
            success,
        };
        let outcome = BenchmarkOutcome {
            results: vec![
                entry(SamplingAlgorithm::Lttb, 2.0, true),
                entry(SamplingAlgorithm::Uniform, 0.5, true),
                entry(SamplingAlgorithm::Peaks, 0.1, false),
            ],
        };
        assert_eq!(outcome.fastest().map(|e| e.algorithm), Some(SamplingAlgorithm::Uniform));
        assert!(outcome.get(SamplingAlgorithm::Hybrid).is_none());
    }
}
