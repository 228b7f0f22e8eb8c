//! # plotline-core
//!
//! Core types for the plotline chart pipeline: loosely typed data points,
//! series, geometry helpers, sampling configuration, bounded caches and the
//! worker wire protocol.

pub mod cache;
pub mod config;
pub mod data;
pub mod geometry;
pub mod protocol;

pub use cache::*;
pub use config::*;
pub use data::*;
pub use geometry::*;
pub use protocol::*;

use serde::Serialize;
use std::hash::{DefaultHasher, Hasher};
use std::io;

// ============================================================================
// IDENTIFIERS & FINGERPRINTS
// ============================================================================

/// Create a unique identifier for requests and chart registrations
pub fn create_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Adapter feeding serialized bytes straight into a hasher
struct HashWriter(DefaultHasher);

impl io::Write for HashWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.write(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Content fingerprint of any serializable value.
///
/// Two values with the same JSON representation produce the same
/// fingerprint within a process. Used as cache key material, never
/// persisted. Distinct values can collide, so caches that must not serve a
/// wrong entry keep enough of the input to check a hit.
pub fn fingerprint<T: Serialize + ?Sized>(value: &T) -> u64 {
    let mut writer = HashWriter(DefaultHasher::new());
    if let Err(err) = serde_json::to_writer(&mut writer, value) {
        tracing::warn!("fingerprint serialization failed: {}", err);
    }
    writer.0.finish()
}

// ============================================================================
// WORKER STATE FSM
// ============================================================================

/// Lifecycle of an offload worker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WorkerState {
    #[default]
    Starting,
    Ready,
    Terminated,
    Failed,
}

impl WorkerState {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }

    /// No further requests will be accepted
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Terminated | Self::Failed)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Starting => "Starting...",
            Self::Ready => "Ready",
            Self::Terminated => "Terminated",
            Self::Failed => "Failed",
        }
    }
}

// ============================================================================
// COLOR CONSTANTS
// ============================================================================

pub mod colors {
    /// Default palette cycled through for series without an explicit color
    pub const SERIES: [&str; 6] = [
        "#3b82f6", "#22c55e", "#ef4444", "#fbbf24", "#a855f7", "#14b8a6",
    ];

    pub fn series_color(index: usize) -> &'static str {
        SERIES[index % SERIES.len()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_stable_for_equal_values() {
        let a = vec![DataPoint::new().with("value", 1.0)];
        let b = vec![DataPoint::new().with("value", 1.0)];
        let c = vec![DataPoint::new().with("value", 2.0)];

        assert_eq!(fingerprint(&a), fingerprint(&b));
        assert_ne!(fingerprint(&a), fingerprint(&c));
    }

    #[test]
    fn test_create_id_unique() {
        assert_ne!(create_id(), create_id());
        assert_eq!(create_id().len(), 36);
    }

    #[test]
    fn test_worker_state() {
        assert!(WorkerState::Ready.is_ready());
        assert!(WorkerState::Terminated.is_closed());
        assert!(!WorkerState::Starting.is_closed());
        assert_eq!(WorkerState::default(), WorkerState::Starting);
    }

    #[test]
    fn test_series_color_cycles() {
        assert_eq!(colors::series_color(0), colors::series_color(6));
    }
}
