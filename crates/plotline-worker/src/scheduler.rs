//! Offload decisions, inline fallback and the chart sampling cache

use crate::{WorkerConfig, WorkerHandle};
use futures::future::join_all;
use plotline_core::{
    AlignedLines, CacheStats, DataPoint, DeviceType, FifoCache, LineData, SamplingConfig, fingerprint,
    optimal_sampling_config,
};
use plotline_sampling::{sample_data, sample_multiple_lines};
use std::sync::{Mutex, MutexGuard, PoisonError};

pub const DEFAULT_SAMPLING_CACHE_SIZE: usize = 50;

// ============================================================================
// OFFLOAD SCHEDULER
// ============================================================================

/// Sends large inputs to a worker thread and runs everything else inline.
///
/// If the worker could not be started, or rejects a request, the work is
/// done inline with the same functions, so callers always get a result.
pub struct OffloadScheduler {
    config: WorkerConfig,
    worker: Option<WorkerHandle>,
}

impl OffloadScheduler {
    /// Start a worker; falls back to inline-only when that fails
    pub fn new(config: WorkerConfig) -> Self {
        let worker = match WorkerHandle::spawn(config.clone()) {
            Ok(handle) => Some(handle),
            Err(e) => {
                tracing::warn!(error = %e, "offload worker unavailable, sampling inline");
                None
            }
        };
        Self { config, worker }
    }

    /// Never offloads
    pub fn inline(config: WorkerConfig) -> Self {
        Self { config, worker: None }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    pub fn worker(&self) -> Option<&WorkerHandle> {
        self.worker.as_ref()
    }

    pub fn has_worker(&self) -> bool {
        self.worker.as_ref().is_some_and(|w| !w.state().is_closed())
    }

    /// Whether an input of `points` points would be sent to the worker
    pub fn should_offload(&self, points: usize) -> bool {
        points > self.config.offload_threshold && self.has_worker()
    }

    /// Sample `data`, offloading above the threshold
    pub async fn sample(&self, data: &[DataPoint], config: &SamplingConfig) -> Vec<DataPoint> {
        if let Some(worker) = self.worker.as_ref().filter(|_| self.should_offload(data.len())) {
            match worker.sample(data.to_vec(), config.clone()).await {
                Ok(outcome) if outcome.success => return outcome.data,
                Ok(outcome) => {
                    tracing::warn!(error = ?outcome.error, "offloaded sampling failed, retrying inline");
                }
                Err(e) => tracing::warn!(error = %e, "offload failed, sampling inline"),
            }
        }
        sample_data(data, config)
    }

    /// Sample several datasets concurrently with one config
    pub async fn sample_all(&self, datasets: &[Vec<DataPoint>], config: &SamplingConfig) -> Vec<Vec<DataPoint>> {
        join_all(datasets.iter().map(|data| self.sample(data, config))).await
    }

    /// Align series onto a shared X axis, offloading when the combined
    /// point count is above the threshold
    pub async fn align(&self, lines: &[LineData], sample_rate: f64, x_key: &str) -> AlignedLines {
        let total: usize = lines.iter().map(LineData::len).sum();
        if let Some(worker) = self.worker.as_ref().filter(|_| self.should_offload(total)) {
            match worker.align(lines.to_vec(), sample_rate, x_key).await {
                Ok(aligned) => return aligned,
                Err(e) => tracing::warn!(error = %e, "offload failed, aligning inline"),
            }
        }
        sample_multiple_lines(lines, sample_rate, x_key)
    }

    pub fn terminate(&self) {
        if let Some(worker) = &self.worker {
            worker.terminate();
        }
    }
}

impl Default for OffloadScheduler {
    fn default() -> Self {
        Self::new(WorkerConfig::default())
    }
}

// ============================================================================
// SAMPLING MANAGER
// ============================================================================

/// Picks a device-appropriate sampling budget for a chart and memoizes the
/// sampled result per dataset. Sampling goes through an [`OffloadScheduler`],
/// so large datasets run on its worker thread.
pub struct SamplingManager {
    scheduler: OffloadScheduler,
    cache: Mutex<FifoCache<String, Vec<DataPoint>>>,
}

impl SamplingManager {
    pub fn new(scheduler: OffloadScheduler) -> Self {
        Self::with_cache_size(scheduler, DEFAULT_SAMPLING_CACHE_SIZE)
    }

    pub fn with_cache_size(scheduler: OffloadScheduler, max_size: usize) -> Self {
        Self {
            scheduler,
            cache: Mutex::new(FifoCache::new(max_size)),
        }
    }

    pub fn scheduler(&self) -> &OffloadScheduler {
        &self.scheduler
    }

    fn cache(&self) -> MutexGuard<'_, FifoCache<String, Vec<DataPoint>>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Config used for a chart `chart_width` pixels wide: the device preset,
    /// capped at one point per two pixels
    pub fn config_for_chart(data_len: usize, chart_width: f64, device: DeviceType) -> SamplingConfig {
        let mut config = optimal_sampling_config(data_len, device);
        let pixel_budget = (chart_width / 2.0).floor().max(1.0) as usize;
        config.target_points = config.target_points.min(pixel_budget);
        config
    }

    pub async fn sample_for_chart(&self, data: &[DataPoint], chart_width: f64, device: DeviceType) -> Vec<DataPoint> {
        let config = Self::config_for_chart(data.len(), chart_width, device);
        let key = format!("{:016x}_{}_{}", fingerprint(data), config.algorithm, config.target_points);

        let cached = self.cache().get(&key).cloned();
        if let Some(hit) = cached {
            tracing::debug!(%key, "sampling cache hit");
            return hit;
        }

        let sampled = self.scheduler.sample(data, &config).await;
        self.cache().insert(key, sampled.clone());
        sampled
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache().stats()
    }

    pub fn clear_cache(&self) {
        self.cache().clear();
    }

    pub fn terminate(&self) {
        self.scheduler.terminate();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plotline_core::SamplingAlgorithm;
    use rand::Rng;

    fn random_walk(n: usize) -> Vec<DataPoint> {
        let mut rng = rand::thread_rng();
        let mut value = 10.0;
        (0..n)
            .map(|i| {
                value += rng.gen_range(-0.5..0.5);
                DataPoint::new().with("x", i).with("value", value)
            })
            .collect()
    }

    #[test]
    fn test_scheduler_without_runtime_is_inline() {
        let scheduler = OffloadScheduler::new(WorkerConfig::eager());
        assert!(!scheduler.has_worker());
        assert!(!scheduler.should_offload(1_000_000));
    }

    #[tokio::test]
    async fn test_offloaded_and_inline_agree() {
        let data = random_walk(8000);
        let config = SamplingConfig::new(SamplingAlgorithm::Lttb, 400);

        let offloaded = OffloadScheduler::new(WorkerConfig::default());
        assert!(offloaded.should_offload(data.len()));
        let inline = OffloadScheduler::inline(WorkerConfig::default());
        assert!(!inline.should_offload(data.len()));

        assert_eq!(offloaded.sample(&data, &config).await, inline.sample(&data, &config).await);
        offloaded.terminate();
    }

    #[tokio::test]
    async fn test_terminated_worker_falls_back() {
        let scheduler = OffloadScheduler::new(WorkerConfig::eager());
        scheduler.terminate();
        assert!(!scheduler.has_worker());

        let data = random_walk(100);
        let sampled = scheduler.sample(&data, &SamplingConfig::new(SamplingAlgorithm::Uniform, 10)).await;
        assert_eq!(sampled.len(), 10);
    }

    #[tokio::test]
    async fn test_sample_all_keeps_order() {
        let scheduler = OffloadScheduler::new(WorkerConfig::default().threshold(100));
        let datasets = vec![random_walk(50), random_walk(500), random_walk(20)];
        let config = SamplingConfig::new(SamplingAlgorithm::Uniform, 30);

        let results = scheduler.sample_all(&datasets, &config).await;
        let lengths: Vec<usize> = results.iter().map(Vec::len).collect();
        assert_eq!(lengths, vec![30, 30, 20]);
    }

    #[tokio::test]
    async fn test_align_offloaded() {
        let scheduler = OffloadScheduler::new(WorkerConfig::default().threshold(10));
        let lines = vec![
            LineData::new("a", "A").with_data(random_walk(300)),
            LineData::new("b", "B").with_data(random_walk(900)),
        ];
        let aligned = scheduler.align(&lines, 0.5, "x").await;
        assert_eq!(aligned.lines[0].len(), aligned.lines[1].len());
        assert!(aligned.metadata.is_some());
    }

    #[test]
    fn test_config_for_chart() {
        let config = SamplingManager::config_for_chart(100_000, 600.0, DeviceType::Desktop);
        assert_eq!(config.algorithm, SamplingAlgorithm::Lttb);
        assert_eq!(config.target_points, 300);

        let config = SamplingManager::config_for_chart(20_000, 4000.0, DeviceType::Mobile);
        assert_eq!(config.algorithm, SamplingAlgorithm::Uniform);
        assert_eq!(config.target_points, 250);
    }

    #[tokio::test]
    async fn test_sample_for_chart_memoizes() {
        let manager = SamplingManager::with_cache_size(OffloadScheduler::inline(WorkerConfig::default()), 2);
        let data = random_walk(60_000);

        let first = manager.sample_for_chart(&data, 800.0, DeviceType::Desktop).await;
        assert_eq!(first.len(), 400);
        assert_eq!(manager.cache_stats().size, 1);

        let second = manager.sample_for_chart(&data, 800.0, DeviceType::Desktop).await;
        assert_eq!(first, second);
        assert_eq!(manager.cache_stats().size, 1);

        manager.sample_for_chart(&data, 400.0, DeviceType::Desktop).await;
        manager.sample_for_chart(&data, 200.0, DeviceType::Desktop).await;
        assert_eq!(manager.cache_stats().size, 2);

        manager.clear_cache();
        assert_eq!(manager.cache_stats().size, 0);
    }

    #[tokio::test]
    async fn test_sample_for_chart_offloads_large_data() {
        let offloaded = SamplingManager::new(OffloadScheduler::new(WorkerConfig::default()));
        let inline = SamplingManager::new(OffloadScheduler::inline(WorkerConfig::default()));
        let data = random_walk(60_000);

        offloaded.scheduler().worker().unwrap().ready().await.unwrap();
        assert!(offloaded.scheduler().should_offload(data.len()));

        let from_worker = offloaded.sample_for_chart(&data, 1000.0, DeviceType::Desktop).await;
        let from_inline = inline.sample_for_chart(&data, 1000.0, DeviceType::Desktop).await;
        assert_eq!(from_worker.len(), 500);
        assert_eq!(from_worker, from_inline);
        offloaded.terminate();
    }
}
