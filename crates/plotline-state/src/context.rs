//! Chart context: shared data, registrations and the render cache

use crate::{
    ChartConfig, ChartEvent, ChartPoint, ChartState, LineChartConfig, LineRender, PerformanceMonitor,
    PerformanceSummary, ProcessedChartData, ProcessingError, process_chart_data,
};
use indexmap::IndexMap;
use plotline_charts::{Curve, PathGenerator};
use plotline_core::{CacheStats, DataPoint, FifoCache, Point2D, create_id, fingerprint};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

const EVENT_CAPACITY: usize = 64;

/// Render cache entry. The cache is cleared whenever data or config
/// change, so entries only differ in registrations, which are kept to
/// reject fingerprint collisions.
#[derive(Clone)]
struct CachedRender {
    charts: Vec<String>,
    processed: Arc<ProcessedChartData>,
}

struct ContextInner {
    data: Vec<DataPoint>,
    config: ChartConfig,
    charts: IndexMap<String, LineChartConfig>,
    state: ChartState,
    cache: FifoCache<u64, CachedRender>,
    /// Fingerprint of data, config and registrations; `None` until first read
    /// after a mutation
    cache_key: Option<u64>,
    last_good: Option<Arc<ProcessedChartData>>,
    error: Option<ProcessingError>,
    monitor: PerformanceMonitor,
}

impl ContextInner {
    fn new(config: ChartConfig) -> Self {
        Self {
            data: Vec::new(),
            cache: Self::new_cache(&config),
            config,
            charts: IndexMap::new(),
            state: ChartState::Idle,
            cache_key: None,
            last_good: None,
            error: None,
            monitor: PerformanceMonitor::default(),
        }
    }

    fn new_cache(config: &ChartConfig) -> FifoCache<u64, CachedRender> {
        FifoCache::new(config.max_cache_size).with_max_age(config.cache_max_age())
    }

    fn invalidate(&mut self) {
        self.cache_key = None;
        self.state = if self.data.is_empty() {
            ChartState::Idle
        } else {
            ChartState::Processing
        };
    }

    fn clear_cache(&mut self) {
        self.cache.clear();
        self.invalidate();
    }

    fn compute_key(&self) -> u64 {
        let registrations: Vec<&String> = self.charts.keys().collect();
        fingerprint(&(&self.data, &self.config, registrations))
    }
}

fn lock(inner: &Mutex<ContextInner>) -> MutexGuard<'_, ContextInner> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Default)]
struct ContextTasks {
    sweeper: Option<JoinHandle<()>>,
    resize: Option<JoinHandle<()>>,
}

impl ContextTasks {
    fn abort_all(&mut self) {
        for task in [self.sweeper.take(), self.resize.take()].into_iter().flatten() {
            task.abort();
        }
    }
}

/// Shared state of a group of charts.
///
/// Mutations invalidate the processed data, which is recomputed on the
/// next [`ChartContext::processed_data`] call and cached by fingerprint.
/// Expired cache entries are swept periodically when a Tokio runtime is
/// available.
pub struct ChartContext {
    inner: Arc<Mutex<ContextInner>>,
    events: broadcast::Sender<ChartEvent>,
    paths: PathGenerator,
    tasks: Mutex<ContextTasks>,
}

impl Default for ChartContext {
    fn default() -> Self {
        Self::new(ChartConfig::default())
    }
}

impl ChartContext {
    pub fn new(config: ChartConfig) -> Self {
        let sweep_every = config.sweep_interval();
        let inner = Arc::new(Mutex::new(ContextInner::new(config)));
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        let sweeper = tokio::runtime::Handle::try_current()
            .ok()
            .map(|runtime| runtime.spawn(sweep_expired(Arc::downgrade(&inner), sweep_every)));
        if sweeper.is_none() {
            tracing::debug!("no tokio runtime, cache sweeping disabled");
        }

        Self {
            inner,
            events,
            paths: PathGenerator::new(),
            tasks: Mutex::new(ContextTasks { sweeper, resize: None }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ContextInner> {
        lock(&self.inner)
    }

    fn tasks(&self) -> MutexGuard<'_, ContextTasks> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, event: ChartEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChartEvent> {
        self.events.subscribe()
    }

    // ========================================================================
    // Data & Config
    // ========================================================================

    /// Replace the data; clears the render cache
    pub fn set_data(&self, data: Vec<DataPoint>) {
        let points = data.len();
        {
            let mut inner = self.lock();
            inner.data = data;
            inner.clear_cache();
        }
        tracing::debug!(points, "chart data replaced");
        self.publish(ChartEvent::DataChanged { points });
    }

    pub fn data_len(&self) -> usize {
        self.lock().data.len()
    }

    pub fn config(&self) -> ChartConfig {
        self.lock().config.clone()
    }

    /// Replace the config; clears the render cache
    pub fn update_config(&self, config: ChartConfig) {
        {
            let mut inner = self.lock();
            inner.cache = ContextInner::new_cache(&config);
            inner.config = config;
            inner.invalidate();
        }
        self.publish(ChartEvent::ConfigChanged);
    }

    // ========================================================================
    // Chart Registration
    // ========================================================================

    /// Register a line chart, returning its generated id
    pub fn register_chart(&self, chart: LineChartConfig) -> String {
        let id = create_id();
        {
            let mut inner = self.lock();
            tracing::debug!(%id, data_key = %chart.data_key, "chart registered");
            inner.charts.insert(id.clone(), chart);
            inner.invalidate();
        }
        self.publish(ChartEvent::ChartRegistered(id.clone()));
        id
    }

    pub fn unregister_chart(&self, id: &str) -> Option<LineChartConfig> {
        let removed = {
            let mut inner = self.lock();
            let removed = inner.charts.shift_remove(id);
            if removed.is_some() {
                inner.invalidate();
            }
            removed
        };
        if removed.is_some() {
            self.publish(ChartEvent::ChartUnregistered(id.to_string()));
        }
        removed
    }

    pub fn chart_config(&self, id: &str) -> Option<LineChartConfig> {
        self.lock().charts.get(id).cloned()
    }

    /// Edit a registered chart's settings; `false` if `id` is unknown
    pub fn update_chart_config(&self, id: &str, update: impl FnOnce(&mut LineChartConfig)) -> bool {
        let mut inner = self.lock();
        let Some(chart) = inner.charts.get_mut(id) else {
            return false;
        };
        update(chart);
        inner.invalidate();
        true
    }

    /// Registered chart ids in registration order
    pub fn registered_charts(&self) -> Vec<String> {
        self.lock().charts.keys().cloned().collect()
    }

    pub fn all_chart_configs(&self) -> IndexMap<String, LineChartConfig> {
        self.lock().charts.clone()
    }

    // ========================================================================
    // Processed Data
    // ========================================================================

    /// Processed data for the current inputs, computing it if needed.
    ///
    /// `None` when there is no data. When processing fails the last good
    /// snapshot is returned and [`ChartContext::error`] holds the failure.
    pub fn processed_data(&self) -> Option<Arc<ProcessedChartData>> {
        let mut guard = self.lock();
        let inner = &mut *guard;

        if inner.data.is_empty() {
            inner.state = ChartState::Idle;
            return None;
        }

        let key = match inner.cache_key {
            Some(key) => key,
            None => {
                let key = inner.compute_key();
                inner.cache_key = Some(key);
                key
            }
        };

        // Failed inputs are not retried until something changes
        if inner.state.is_error() {
            return inner.last_good.clone();
        }

        match inner.cache.get(&key) {
            Some(entry) if entry.charts.iter().eq(inner.charts.keys()) => {
                let hit = entry.processed.clone();
                inner.monitor.record_cache_hit();
                inner.state = ChartState::Ready;
                return Some(hit);
            }
            Some(_) => tracing::debug!(key, "render cache key collision, reprocessing"),
            None => {}
        }

        inner.monitor.record_cache_miss();
        inner.state = ChartState::Processing;
        let started = inner.monitor.start_render();

        match process_chart_data(&inner.data, &inner.config, &self.paths) {
            Ok(processed) => {
                let processed = Arc::new(processed);
                let entry = CachedRender {
                    charts: inner.charts.keys().cloned().collect(),
                    processed: processed.clone(),
                };
                if inner.cache.insert(key, entry).is_some() {
                    tracing::debug!("render cache full, evicted oldest entry");
                }
                inner.monitor.end_render(started);
                inner.last_good = Some(processed.clone());
                inner.error = None;
                inner.state = ChartState::Ready;
                drop(guard);

                self.publish(ChartEvent::Processed);
                Some(processed)
            }
            Err(error) => {
                tracing::warn!(%error, "chart processing failed");
                inner.error = Some(error.clone());
                inner.state = ChartState::Error;
                let last_good = inner.last_good.clone();
                drop(guard);

                self.publish(ChartEvent::Failed(error));
                last_good
            }
        }
    }

    pub fn state(&self) -> ChartState {
        self.lock().state
    }

    /// Processed and holding data
    pub fn is_ready(&self) -> bool {
        let inner = self.lock();
        inner.state.is_ready() && !inner.data.is_empty()
    }

    pub fn error(&self) -> Option<ProcessingError> {
        self.lock().error.clone()
    }

    /// Path and points of `data_key` from the current processed data
    pub fn process_line(&self, data_key: &str, curve: Curve) -> Option<LineRender> {
        let processed = self.processed_data()?;
        let tension = self.lock().config.tension;

        let points = processed.project(data_key);
        let positions: Vec<Point2D> = points.iter().map(ChartPoint::position).collect();
        Some(LineRender {
            path: self.paths.render(&positions, curve, tension),
            points,
        })
    }

    /// Line of a registered chart, using its data key and curve
    pub fn line_for_chart(&self, id: &str) -> Option<LineRender> {
        let (data_key, curve) = {
            let inner = self.lock();
            let chart = inner.charts.get(id)?;
            (chart.data_key.clone(), chart.curve.unwrap_or(inner.config.curve))
        };
        self.process_line(&data_key, curve)
    }

    // ========================================================================
    // Resize & Lifecycle
    // ========================================================================

    /// Coalesce resize notifications over the debounce window, then clear
    /// the cache and publish [`ChartEvent::Resized`]
    pub fn notify_resize(&self) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            apply_resize(&self.inner, &self.events);
            return;
        };

        let window = self.lock().config.debounce_window();
        let inner = Arc::downgrade(&self.inner);
        let events = self.events.clone();

        let mut tasks = self.tasks();
        if let Some(pending) = tasks.resize.take() {
            pending.abort();
        }
        tasks.resize = Some(runtime.spawn(async move {
            tokio::time::sleep(window).await;
            if let Some(inner) = inner.upgrade() {
                apply_resize(&inner, &events);
            }
        }));
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.lock().cache.stats()
    }

    pub fn path_cache_stats(&self) -> CacheStats {
        self.paths.cache_stats()
    }

    pub fn performance(&self) -> PerformanceSummary {
        self.lock().monitor.summary()
    }

    pub fn log_performance(&self) {
        self.lock().monitor.log_summary();
    }

    /// Turn render timing on or off; cache hit counting always runs
    pub fn set_monitoring(&self, enabled: bool) {
        self.lock().monitor.set_enabled(enabled);
    }

    /// Stop background tasks and drop all cached and registered state
    pub fn destroy(&self) {
        self.tasks().abort_all();
        {
            let mut inner = self.lock();
            inner.charts.clear();
            inner.data.clear();
            inner.last_good = None;
            inner.error = None;
            inner.clear_cache();
        }
        self.paths.clear_cache();
        tracing::debug!("chart context destroyed");
        self.publish(ChartEvent::Destroyed);
    }
}

impl Drop for ChartContext {
    fn drop(&mut self) {
        self.tasks().abort_all();
    }
}

fn apply_resize(inner: &Mutex<ContextInner>, events: &broadcast::Sender<ChartEvent>) {
    lock(inner).clear_cache();
    tracing::debug!("chart resized, render cache cleared");
    let _ = events.send(ChartEvent::Resized);
}

/// Periodically drop expired render cache entries until the context is gone
async fn sweep_expired(inner: Weak<Mutex<ContextInner>>, every: std::time::Duration) {
    let mut ticker = tokio::time::interval(every);
    ticker.tick().await;

    loop {
        ticker.tick().await;
        let Some(inner) = inner.upgrade() else {
            break;
        };
        let removed = lock(&inner).cache.sweep_expired();
        if removed > 0 {
            tracing::debug!(removed, "swept expired render cache entries");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plotline_charts::ChartDimensions;
    use std::time::Duration;

    fn series(n: usize) -> Vec<DataPoint> {
        (0..n)
            .map(|i| {
                DataPoint::new()
                    .with("x", i)
                    .with("value", (i % 7) as f64)
                    .with("volume", (i * 2) as f64)
            })
            .collect()
    }

    fn context() -> ChartContext {
        ChartContext::new(ChartConfig::default().x_key("x"))
    }

    #[test]
    fn test_empty_context() {
        let ctx = context();
        assert!(ctx.processed_data().is_none());
        assert_eq!(ctx.state(), ChartState::Idle);
        assert!(!ctx.is_ready());
    }

    #[test]
    fn test_lazy_processing_and_cache() {
        let ctx = context();
        ctx.set_data(series(20));
        assert_eq!(ctx.state(), ChartState::Processing);

        let first = ctx.processed_data().unwrap();
        assert!(ctx.is_ready());
        let second = ctx.processed_data().unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        let perf = ctx.performance();
        assert_eq!(perf.render_count, 1);
        assert_eq!(perf.cache_hit_rate, 0.5);

        ctx.set_monitoring(false);
        ctx.set_data(series(21));
        ctx.processed_data();
        assert_eq!(ctx.performance().render_count, 1);
    }

    #[test]
    fn test_set_data_clears_cache() {
        let ctx = context();
        ctx.set_data(series(20));
        ctx.processed_data();
        assert_eq!(ctx.cache_stats().size, 1);

        ctx.set_data(series(30));
        assert_eq!(ctx.cache_stats().size, 0);
        assert_eq!(ctx.processed_data().unwrap().sampled_data.len(), 30);
    }

    #[test]
    fn test_registration_changes_cache_key() {
        let ctx = context();
        ctx.set_data(series(20));
        ctx.processed_data();

        let id = ctx.register_chart(LineChartConfig::new("value").with_handle("svg-1"));
        assert_eq!(ctx.state(), ChartState::Processing);
        ctx.processed_data();
        assert_eq!(ctx.cache_stats().size, 2);

        assert_eq!(ctx.registered_charts(), vec![id.clone()]);
        assert_eq!(ctx.chart_config(&id).unwrap().handle.as_deref(), Some("svg-1"));
        assert!(ctx.update_chart_config(&id, |c| c.stroke_width = 3.0));
        assert!(!ctx.update_chart_config("missing", |_| {}));
        assert_eq!(ctx.all_chart_configs()[&id].stroke_width, 3.0);

        assert!(ctx.unregister_chart(&id).is_some());
        assert!(ctx.unregister_chart(&id).is_none());
        assert!(ctx.registered_charts().is_empty());
    }

    #[test]
    fn test_colliding_cache_key_is_reprocessed() {
        let ctx = context();
        ctx.set_data(series(20));
        let before = ctx.processed_data().unwrap();
        let stale_key = ctx.lock().cache_key.unwrap();

        let id = ctx.register_chart(LineChartConfig::new("value"));
        // Same key as the entry built without the registration
        ctx.lock().cache_key = Some(stale_key);

        let after = ctx.processed_data().unwrap();
        assert!(!Arc::ptr_eq(&before, &after));
        assert_eq!(ctx.performance().render_count, 2);
        assert_eq!(ctx.lock().cache.get(&stale_key).unwrap().charts, vec![id]);

        let again = ctx.processed_data().unwrap();
        assert!(Arc::ptr_eq(&after, &again));
    }

    #[test]
    fn test_cache_capacity() {
        let ctx = ChartContext::new(ChartConfig::default().x_key("x").cache_size(2));
        ctx.set_data(series(20));
        for _ in 0..3 {
            ctx.register_chart(LineChartConfig::new("value"));
            ctx.processed_data();
        }
        assert_eq!(ctx.cache_stats().size, 2);
    }

    #[test]
    fn test_error_keeps_last_good_snapshot() {
        let ctx = context();
        ctx.set_data(series(10));
        let good = ctx.processed_data().unwrap();

        ctx.set_data(vec![DataPoint::new().with("label", "no numbers")]);
        let returned = ctx.processed_data().unwrap();
        assert!(Arc::ptr_eq(&good, &returned));
        assert_eq!(ctx.state(), ChartState::Error);
        assert_eq!(ctx.error(), Some(ProcessingError::NoNumericData));
        assert!(!ctx.is_ready());

        ctx.set_data(series(5));
        assert!(ctx.processed_data().is_some());
        assert_eq!(ctx.error(), None);
    }

    #[test]
    fn test_line_for_chart() {
        let ctx = context();
        ctx.set_data(series(10));
        let id = ctx.register_chart(LineChartConfig::new("volume").with_curve(Curve::Smooth));

        let line = ctx.line_for_chart(&id).unwrap();
        assert_eq!(line.points.len(), 10);
        assert!(line.path.contains('C'));
        assert_eq!(ctx.path_cache_stats().size, 1);

        let straight = ctx.process_line("value", Curve::Linear).unwrap();
        assert!(straight.path.starts_with('M'));
        assert!(!straight.path.contains('C'));
        assert!(ctx.line_for_chart("missing").is_none());
    }

    #[test]
    fn test_update_config_resizes_scales() {
        let ctx = context();
        ctx.set_data(series(10));
        let before = ctx.processed_data().unwrap();

        ctx.update_config(ChartConfig::default().x_key("x").with_dimensions(ChartDimensions::new(800.0, 300.0)));
        let after = ctx.processed_data().unwrap();
        assert_ne!(before.x_scale, after.x_scale);
        assert_eq!(after.points.last().map(|p| p.x), Some(770.0));
    }

    #[test]
    fn test_resize_without_runtime_is_immediate() {
        let ctx = context();
        ctx.set_data(series(10));
        ctx.processed_data();
        ctx.notify_resize();
        assert_eq!(ctx.cache_stats().size, 0);
    }

    #[tokio::test]
    async fn test_resize_is_debounced() {
        let ctx = ChartContext::new(ChartConfig::default().x_key("x").debounce(30));
        let mut events = ctx.subscribe();
        ctx.set_data(series(10));
        ctx.processed_data();

        ctx.notify_resize();
        ctx.notify_resize();
        ctx.notify_resize();
        assert_eq!(ctx.cache_stats().size, 1);

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(ctx.cache_stats().size, 0);

        let mut resized = 0;
        while let Ok(event) = events.try_recv() {
            if event == ChartEvent::Resized {
                resized += 1;
            }
        }
        assert_eq!(resized, 1);
    }

    #[tokio::test]
    async fn test_events_published() {
        let ctx = context();
        let mut events = ctx.subscribe();

        ctx.set_data(series(3));
        let id = ctx.register_chart(LineChartConfig::new("value"));
        ctx.processed_data();
        ctx.destroy();

        assert_eq!(events.recv().await.unwrap(), ChartEvent::DataChanged { points: 3 });
        assert_eq!(events.recv().await.unwrap(), ChartEvent::ChartRegistered(id));
        assert_eq!(events.recv().await.unwrap(), ChartEvent::Processed);
        assert_eq!(events.recv().await.unwrap(), ChartEvent::Destroyed);
        assert!(ctx.registered_charts().is_empty());
        assert!(ctx.processed_data().is_none());
    }

    #[tokio::test]
    async fn test_expired_entries_swept() {
        let config = ChartConfig::default()
            .x_key("x")
            .cache_ttl(Duration::from_millis(20))
            .sweep_every(Duration::from_millis(30));
        let ctx = ChartContext::new(config);
        ctx.set_data(series(10));
        ctx.processed_data();
        assert_eq!(ctx.cache_stats().size, 1);

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert_eq!(ctx.cache_stats().size, 0);
    }
}
