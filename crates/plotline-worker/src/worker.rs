//! Worker thread and the async handle that talks to it

use crate::{RequestProcessor, Result, SamplingProcessor, WorkerConfig, WorkerError};
use plotline_core::{
    AlignedLines, AnalysisOutcome, BatchOutcome, BenchmarkOutcome, DataPoint, DataStatistics, LineData, Point2D,
    Progress, ResultPayload, SampleOutcome, SamplingAlgorithm, SamplingConfig, WorkerRequest, WorkerResponse,
    WorkerState, create_id,
};
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};

type ProgressCallback = Box<dyn FnMut(Progress) + Send>;

struct Pending {
    reply: oneshot::Sender<Result<ResultPayload>>,
    on_progress: Option<ProgressCallback>,
}

type PendingMap = Arc<Mutex<HashMap<String, Pending>>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Fail every outstanding request with `error`; returns how many there were
fn reject_all(pending: &PendingMap, error: WorkerError) -> usize {
    let drained: Vec<Pending> = lock(pending).drain().map(|(_, p)| p).collect();
    let count = drained.len();
    for entry in drained {
        let _ = entry.reply.send(Err(error.clone()));
    }
    count
}

// ============================================================================
// WORKER THREAD
// ============================================================================

/// Thread side of the worker: pulls requests in receipt order and answers
/// each with exactly one `result` or `error`
pub struct SamplingWorker<P> {
    processor: P,
    requests: mpsc::Receiver<WorkerRequest>,
    responses: mpsc::UnboundedSender<WorkerResponse>,
    /// Set once the request queue closed and the loop ended normally
    finished: Arc<AtomicBool>,
}

impl<P: RequestProcessor> SamplingWorker<P> {
    fn run(mut self) {
        if self.responses.send(WorkerResponse::Ready).is_err() {
            return;
        }

        while let Some(request) = self.requests.blocking_recv() {
            let id = request.id().to_string();
            let kind = request.kind();
            tracing::trace!(%id, kind, "processing request");

            let responses = &self.responses;
            let processor = &mut self.processor;
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                let mut on_progress = |progress: Progress| {
                    let _ = responses.send(WorkerResponse::Progress {
                        id: id.clone(),
                        completed: progress.completed,
                        total: progress.total,
                        percentage: progress.percentage,
                    });
                };
                processor.process(request, &mut on_progress)
            }));

            let response = match outcome {
                Ok(Ok(payload)) => WorkerResponse::Result { id, payload },
                Ok(Err(error)) => {
                    tracing::warn!(%id, kind, %error, "request failed");
                    WorkerResponse::Error { id, error }
                }
                Err(_) => {
                    tracing::error!(%id, kind, "worker panicked while processing request");
                    WorkerResponse::Error {
                        id,
                        error: format!("{} request panicked", kind),
                    }
                }
            };

            if self.responses.send(response).is_err() {
                break;
            }
        }

        self.finished.store(true, Ordering::Release);
        tracing::debug!("worker thread exiting");
    }
}

/// Routes worker responses to their pending requests by id
async fn dispatch(
    mut responses: mpsc::UnboundedReceiver<WorkerResponse>,
    pending: PendingMap,
    state: Arc<watch::Sender<WorkerState>>,
    finished: Arc<AtomicBool>,
) {
    while let Some(response) = responses.recv().await {
        match response {
            WorkerResponse::Ready => {
                let became_ready = state.send_if_modified(|s| {
                    let starting = *s == WorkerState::Starting;
                    if starting {
                        *s = WorkerState::Ready;
                    }
                    starting
                });
                if became_ready {
                    tracing::info!("sampling worker ready");
                }
            }
            WorkerResponse::Progress {
                id,
                completed,
                total,
                percentage,
            } => {
                // Run the callback unlocked; it may call back into the handle
                let callback = lock(&pending).get_mut(&id).and_then(|entry| entry.on_progress.take());
                if let Some(mut callback) = callback {
                    callback(Progress {
                        completed,
                        total,
                        percentage,
                    });
                    if let Some(entry) = lock(&pending).get_mut(&id) {
                        entry.on_progress = Some(callback);
                    }
                }
            }
            WorkerResponse::Result { id, payload } => resolve(&pending, &id, Ok(payload)),
            WorkerResponse::Error { id, error } => resolve(&pending, &id, Err(WorkerError::Rejected(error))),
        }
    }

    // Every handle was dropped, so the queue closed and the thread wound down
    if finished.load(Ordering::Acquire) {
        state.send_if_modified(|s| {
            let open = !s.is_closed();
            if open {
                *s = WorkerState::Terminated;
            }
            open
        });
        let rejected = reject_all(&pending, WorkerError::Terminated);
        tracing::debug!(rejected, "sampling worker stopped");
        return;
    }

    // The worker thread hung up without being asked to
    let failed = state.send_if_modified(|s| {
        let open = !s.is_closed();
        if open {
            *s = WorkerState::Failed;
        }
        open
    });
    if failed {
        let rejected = reject_all(&pending, WorkerError::QueueClosed);
        tracing::error!(rejected, "sampling worker stopped unexpectedly");
    }
}

fn resolve(pending: &PendingMap, id: &str, result: Result<ResultPayload>) {
    let entry = lock(pending).remove(id);
    match entry {
        Some(entry) => {
            let _ = entry.reply.send(result);
        }
        None => tracing::trace!(%id, "dropping response for unknown request"),
    }
}

// ============================================================================
// WORKER HANDLE (Send + Sync)
// ============================================================================

struct Shared {
    requests: Mutex<Option<mpsc::Sender<WorkerRequest>>>,
    pending: PendingMap,
    state: Arc<watch::Sender<WorkerState>>,
    timeout: Option<Duration>,
}

/// Handle for sending work to a sampling worker.
///
/// Clones share the same worker. Every request waits for the worker's
/// `ready` message first.
#[derive(Clone)]
pub struct WorkerHandle {
    shared: Arc<Shared>,
}

impl WorkerHandle {
    /// Spawn a worker running the default [`SamplingProcessor`]
    pub fn spawn(config: WorkerConfig) -> Result<Self> {
        Self::spawn_with(config, SamplingProcessor::new())
    }

    /// Spawn a worker thread running `processor`.
    ///
    /// Must be called from within a Tokio runtime, which drives response
    /// routing.
    pub fn spawn_with<P: RequestProcessor>(config: WorkerConfig, processor: P) -> Result<Self> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| WorkerError::NoRuntime)?;

        let (request_tx, request_rx) = mpsc::channel(config.queue_capacity.max(1));
        let (response_tx, response_rx) = mpsc::unbounded_channel();
        let finished = Arc::new(AtomicBool::new(false));
        let worker = SamplingWorker {
            processor,
            requests: request_rx,
            responses: response_tx,
            finished: finished.clone(),
        };

        thread::Builder::new()
            .name(config.thread_name.clone())
            .spawn(move || worker.run())
            .map_err(|e| WorkerError::Spawn(e.to_string()))?;

        let pending = PendingMap::default();
        let (state, _) = watch::channel(WorkerState::Starting);
        let state = Arc::new(state);
        runtime.spawn(dispatch(response_rx, pending.clone(), state.clone(), finished));

        tracing::info!(
            thread = %config.thread_name,
            queue = config.queue_capacity,
            "spawned sampling worker"
        );

        Ok(Self {
            shared: Arc::new(Shared {
                requests: Mutex::new(Some(request_tx)),
                pending,
                state,
                timeout: config.request_timeout,
            }),
        })
    }

    pub fn state(&self) -> WorkerState {
        *self.shared.state.borrow()
    }

    pub fn is_ready(&self) -> bool {
        self.state().is_ready()
    }

    /// Requests sent and not yet answered
    pub fn pending_count(&self) -> usize {
        lock(&self.shared.pending).len()
    }

    /// Wait until the worker has announced itself
    pub async fn ready(&self) -> Result<()> {
        let mut watcher = self.shared.state.subscribe();
        let state = *watcher
            .wait_for(|s| *s != WorkerState::Starting)
            .await
            .map_err(|_| WorkerError::Terminated)?;

        match state {
            WorkerState::Ready => Ok(()),
            WorkerState::Terminated => Err(WorkerError::Terminated),
            WorkerState::Starting | WorkerState::Failed => Err(WorkerError::NotReady),
        }
    }

    /// Stop the worker. Pending requests fail with
    /// [`WorkerError::Terminated`], as does every later call.
    pub fn terminate(&self) {
        self.shared.state.send_replace(WorkerState::Terminated);
        lock(&self.shared.requests).take();
        let rejected = reject_all(&self.shared.pending, WorkerError::Terminated);
        tracing::info!(rejected, "sampling worker terminated");
    }

    fn forget(&self, id: &str) {
        lock(&self.shared.pending).remove(id);
    }

    async fn request(&self, request: WorkerRequest, on_progress: Option<ProgressCallback>) -> Result<ResultPayload> {
        self.ready().await?;

        let id = request.id().to_string();
        let (reply, response) = oneshot::channel();
        lock(&self.shared.pending).insert(id.clone(), Pending { reply, on_progress });

        let sender = lock(&self.shared.requests).clone();
        let Some(sender) = sender else {
            self.forget(&id);
            return Err(WorkerError::Terminated);
        };
        if sender.send(request).await.is_err() {
            self.forget(&id);
            return Err(WorkerError::QueueClosed);
        }

        let answer = match self.shared.timeout {
            Some(limit) => match tokio::time::timeout(limit, response).await {
                Ok(answer) => answer,
                Err(_) => {
                    self.forget(&id);
                    tracing::warn!(%id, ?limit, "worker request timed out");
                    return Err(WorkerError::Timeout);
                }
            },
            None => response.await,
        };

        answer.unwrap_or(Err(WorkerError::Terminated))
    }

    pub async fn sample(&self, data: Vec<DataPoint>, config: SamplingConfig) -> Result<SampleOutcome> {
        let request = WorkerRequest::Sample {
            id: create_id(),
            data,
            config,
        };
        match self.request(request, None).await? {
            ResultPayload::Sample(outcome) => Ok(outcome),
            _ => Err(WorkerError::UnexpectedResponse { expected: "sample" }),
        }
    }

    pub async fn batch(&self, datasets: Vec<Vec<DataPoint>>, configs: Vec<SamplingConfig>) -> Result<BatchOutcome> {
        self.send_batch(datasets, configs, None).await
    }

    /// Batch sampling with progress events delivered to `on_progress`
    pub async fn batch_with_progress(
        &self,
        datasets: Vec<Vec<DataPoint>>,
        configs: Vec<SamplingConfig>,
        on_progress: impl FnMut(Progress) + Send + 'static,
    ) -> Result<BatchOutcome> {
        self.send_batch(datasets, configs, Some(Box::new(on_progress))).await
    }

    async fn send_batch(
        &self,
        datasets: Vec<Vec<DataPoint>>,
        configs: Vec<SamplingConfig>,
        on_progress: Option<ProgressCallback>,
    ) -> Result<BatchOutcome> {
        let request = WorkerRequest::Batch {
            id: create_id(),
            datasets,
            configs,
        };
        match self.request(request, on_progress).await? {
            ResultPayload::Batch(outcome) => Ok(outcome),
            _ => Err(WorkerError::UnexpectedResponse { expected: "batch" }),
        }
    }

    pub async fn benchmark(
        &self,
        data: Vec<DataPoint>,
        algorithms: Vec<SamplingAlgorithm>,
        target_points: usize,
    ) -> Result<BenchmarkOutcome> {
        let request = WorkerRequest::Benchmark {
            id: create_id(),
            data,
            algorithms,
            target_points,
        };
        match self.request(request, None).await? {
            ResultPayload::Benchmark(outcome) => Ok(outcome),
            _ => Err(WorkerError::UnexpectedResponse { expected: "benchmark" }),
        }
    }

    pub async fn analyze(&self, data: Vec<DataPoint>, y_key: impl Into<String>) -> Result<AnalysisOutcome> {
        let request = WorkerRequest::Analyze {
            id: create_id(),
            data,
            y_key: y_key.into(),
        };
        match self.request(request, None).await? {
            ResultPayload::Analyze(outcome) => Ok(outcome),
            _ => Err(WorkerError::UnexpectedResponse { expected: "analyze" }),
        }
    }

    pub async fn align(&self, lines: Vec<LineData>, sample_rate: f64, x_key: impl Into<String>) -> Result<AlignedLines> {
        let request = WorkerRequest::Align {
            id: create_id(),
            lines,
            sample_rate,
            x_key: x_key.into(),
        };
        match self.request(request, None).await? {
            ResultPayload::Align(aligned) => Ok(aligned),
            _ => Err(WorkerError::UnexpectedResponse { expected: "align" }),
        }
    }

    pub async fn statistics(&self, data: Vec<DataPoint>, y_key: impl Into<String>) -> Result<DataStatistics> {
        let request = WorkerRequest::Statistics {
            id: create_id(),
            data,
            y_key: y_key.into(),
        };
        match self.request(request, None).await? {
            ResultPayload::Statistics(stats) => Ok(stats),
            _ => Err(WorkerError::UnexpectedResponse { expected: "statistics" }),
        }
    }

    /// Smooth path when `tension` is given, straight otherwise
    pub async fn path(&self, points: Vec<Point2D>, tension: Option<f64>) -> Result<String> {
        let request = WorkerRequest::Path {
            id: create_id(),
            points,
            tension,
        };
        match self.request(request, None).await? {
            ResultPayload::Path(outcome) => Ok(outcome.path),
            _ => Err(WorkerError::UnexpectedResponse { expected: "path" }),
        }
    }
}
