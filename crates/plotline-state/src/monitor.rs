//! Rolling render timings and render-cache hit rates

use serde::Serialize;
use std::collections::VecDeque;
use std::time::Instant;

pub const DEFAULT_MAX_SAMPLES: usize = 100;
/// 60 fps frame budget in milliseconds
pub const FRAME_BUDGET_MS: f64 = 16.0;
/// 30 fps budget the 95th percentile must stay under
pub const P95_BUDGET_MS: f64 = 33.0;
/// Slow-render warnings start once this many samples exist
const WARN_AFTER_SAMPLES: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceSummary {
    pub render_count: usize,
    pub avg_render_time: f64,
    pub max_render_time: f64,
    pub min_render_time: f64,
    pub p95_render_time: f64,
    pub cache_hit_rate: f64,
    pub fps: f64,
    pub is_healthy: bool,
}

/// Keeps the last `max_samples` render durations (milliseconds)
#[derive(Debug, Clone)]
pub struct PerformanceMonitor {
    render_times: VecDeque<f64>,
    max_samples: usize,
    hits: u64,
    misses: u64,
    enabled: bool,
}

impl Default for PerformanceMonitor {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SAMPLES)
    }
}

impl PerformanceMonitor {
    pub fn new(max_samples: usize) -> Self {
        Self {
            render_times: VecDeque::with_capacity(max_samples),
            max_samples: max_samples.max(1),
            hits: 0,
            misses: 0,
            enabled: true,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// `None` while disabled
    pub fn start_render(&self) -> Option<Instant> {
        self.enabled.then(Instant::now)
    }

    pub fn end_render(&mut self, started: Option<Instant>) {
        if let Some(started) = started {
            self.record_render(started.elapsed().as_secs_f64() * 1000.0);
        }
    }

    pub fn record_render(&mut self, millis: f64) {
        if !self.enabled {
            return;
        }

        if self.render_times.len() == self.max_samples {
            self.render_times.pop_front();
        }
        self.render_times.push_back(millis);

        if self.render_times.len() >= WARN_AFTER_SAMPLES {
            let average = self.average_render_time();
            if average > FRAME_BUDGET_MS {
                tracing::warn!(
                    average_ms = %format!("{:.2}", average),
                    "chart rendering is slow (target < 16ms for 60fps)"
                );
            }
        }
    }

    pub fn record_cache_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_cache_miss(&mut self) {
        self.misses += 1;
    }

    pub fn render_count(&self) -> usize {
        self.render_times.len()
    }

    pub fn average_render_time(&self) -> f64 {
        if self.render_times.is_empty() {
            return 0.0;
        }
        self.render_times.iter().sum::<f64>() / self.render_times.len() as f64
    }

    pub fn max_render_time(&self) -> f64 {
        self.render_times.iter().copied().reduce(f64::max).unwrap_or(0.0)
    }

    pub fn min_render_time(&self) -> f64 {
        self.render_times.iter().copied().reduce(f64::min).unwrap_or(0.0)
    }

    pub fn p95_render_time(&self) -> f64 {
        if self.render_times.is_empty() {
            return 0.0;
        }
        let mut sorted: Vec<f64> = self.render_times.iter().copied().collect();
        sorted.sort_by(f64::total_cmp);
        let index = ((sorted.len() as f64 * 0.95).floor() as usize).min(sorted.len() - 1);
        sorted[index]
    }

    pub fn cache_hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub fn summary(&self) -> PerformanceSummary {
        let avg_render_time = self.average_render_time();
        let p95_render_time = self.p95_render_time();
        PerformanceSummary {
            render_count: self.render_count(),
            avg_render_time,
            max_render_time: self.max_render_time(),
            min_render_time: self.min_render_time(),
            p95_render_time,
            cache_hit_rate: self.cache_hit_rate(),
            fps: if avg_render_time > 0.0 { 1000.0 / avg_render_time } else { 0.0 },
            is_healthy: avg_render_time < FRAME_BUDGET_MS && p95_render_time < P95_BUDGET_MS,
        }
    }

    pub fn log_summary(&self) {
        let summary = self.summary();
        tracing::info!(
            renders = summary.render_count,
            avg_ms = %format!("{:.2}", summary.avg_render_time),
            p95_ms = %format!("{:.2}", summary.p95_render_time),
            fps = %format!("{:.1}", summary.fps),
            cache_hit_rate = %format!("{:.1}%", summary.cache_hit_rate * 100.0),
            healthy = summary.is_healthy,
            "chart performance"
        );
    }

    pub fn reset(&mut self) {
        self.render_times.clear();
        self.hits = 0;
        self.misses = 0;
    }
}
