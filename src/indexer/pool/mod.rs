// Bounded worker pool for parsing files in parallel

pub mod memory;
mod scheduler;
mod worker;

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use futures::future::join_all;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle as TaskHandle;
use tracing::{debug, info};

use crate::error::{PoolError, Result};
use crate::index::ParseResult;
use crate::indexer::cancel::CancelToken;
use crate::indexer::pipeline::ParseOptions;

pub use memory::{FixedMemory, MemoryProbe, ProcessMemory};
use scheduler::{Event, Job, Scheduler};

/// Pool tuning
#[derive(Debug, Clone, PartialEq)]
pub struct PoolConfig {
    pub max_workers: usize,
    /// How long a job may wait for a worker.
    pub queue_timeout: Duration,
    /// Deadline for a single dispatch.
    pub worker_timeout: Duration,
    pub retry_attempts: u32,
    /// Multiplied by the attempt number before a retry is queued again.
    pub retry_backoff: Duration,
    pub memory_threshold_mb: u64,
    pub max_queue_size: usize,
    pub tick_interval: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            queue_timeout: Duration::from_secs(60),
            worker_timeout: Duration::from_secs(30),
            retry_attempts: 2,
            retry_backoff: Duration::from_millis(100),
            memory_threshold_mb: 2048,
            max_queue_size: 1000,
            tick_interval: Duration::from_millis(50),
        }
    }
}

/// Work done inside a worker thread.
///
/// `cancel` is set when the dispatch passes its deadline. The worker slot is only
/// reused once `process` returns, so handlers should poll it.
pub trait JobHandler: Send + Sync + 'static {
    fn process(&self, item: &WorkItem, cancel: &CancelToken) -> Result<ParseResult>;
}

/// A file submitted for parsing
#[derive(Debug, Clone)]
pub struct WorkItem {
    pub file_path: String,
    pub content: Arc<str>,
    pub options: ParseOptions,
    pub priority: i32,
    pub timestamp: Instant,
}

/// How a dispatch ended inside the worker
#[derive(Debug)]
pub enum JobOutcome {
    Completed(ParseResult),
    /// The handler returned an error. Not retried.
    Failed(String),
    /// The handler stopped on its cancel token.
    Cancelled,
    Panicked(String),
}

/// Reported by a worker after each dispatch
#[derive(Debug)]
pub struct WorkResult {
    pub work_item: WorkItem,
    pub outcome: JobOutcome,
    pub processing_time: Duration,
    pub memory_used: u64,
    pub worker_id: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    Idle,
    Busy,
    Terminated,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    pub max_workers: usize,
    pub workers: usize,
    pub idle: usize,
    pub busy: usize,
    pub queued: usize,
    pub in_flight: usize,
    /// Timed-out workers whose thread has not returned yet. They still hold a slot.
    pub abandoned: usize,
    pub submitted: u64,
    pub completed: u64,
    pub failed: u64,
    pub retries: u64,
    pub timeouts: u64,
    pub crashes: u64,
    pub queue_timeouts: u64,
    pub rejected: u64,
    pub workers_terminated: u64,
    pub peak_concurrency: usize,
}

/// Admission state read synchronously by `submit`.
#[derive(Debug, Default)]
pub(crate) struct Shared {
    pub queued: AtomicUsize,
    pub shutdown: AtomicBool,
    pub rejected: AtomicU64,
    pub submitted: AtomicU64,
}

/// Resolves to the job's terminal outcome.
pub struct JobHandle {
    file_path: String,
    rx: oneshot::Receiver<std::result::Result<ParseResult, PoolError>>,
}

impl JobHandle {
    pub fn file_path(&self) -> &str {
        &self.file_path
    }
}

impl Future for JobHandle {
    type Output = std::result::Result<ParseResult, PoolError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(PoolError::ShutDown)))
    }
}

/// Parses files on OS threads behind a single scheduler task.
///
/// Must be created inside a tokio runtime.
pub struct WorkerPool {
    events: mpsc::UnboundedSender<Event>,
    shared: Arc<Shared>,
    config: PoolConfig,
    probe: Arc<dyn MemoryProbe>,
    task: Mutex<Option<TaskHandle<()>>>,
}

impl WorkerPool {
    pub fn new(handler: Arc<dyn JobHandler>, config: PoolConfig) -> Self {
        Self::with_probe(handler, config, Arc::new(ProcessMemory))
    }

    pub fn with_probe(handler: Arc<dyn JobHandler>, config: PoolConfig, probe: Arc<dyn MemoryProbe>) -> Self {
        let (events, rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared::default());
        let scheduler = Scheduler::new(
            config.clone(),
            handler,
            probe.clone(),
            events.clone(),
            shared.clone(),
        );
        let task = tokio::spawn(scheduler.run(rx));
        info!("Worker pool started with {} workers", config.max_workers);

        Self {
            events,
            shared,
            config,
            probe,
            task: Mutex::new(Some(task)),
        }
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Queue a file. Admission failures are returned immediately.
    pub fn submit(
        &self,
        file_path: impl Into<String>,
        content: impl Into<Arc<str>>,
        options: ParseOptions,
        priority: i32,
    ) -> std::result::Result<JobHandle, PoolError> {
        if self.shared.shutdown.load(Ordering::SeqCst) {
            return Err(PoolError::ShutDown);
        }

        let used_mb = self.probe.used_mb();
        if used_mb > self.config.memory_threshold_mb {
            self.shared.rejected.fetch_add(1, Ordering::Relaxed);
            return Err(PoolError::MemoryPressure {
                used_mb,
                threshold_mb: self.config.memory_threshold_mb,
            });
        }

        let capacity = self.config.max_queue_size;
        if self
            .shared
            .queued
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| (n < capacity).then_some(n + 1))
            .is_err()
        {
            self.shared.rejected.fetch_add(1, Ordering::Relaxed);
            return Err(PoolError::QueueFull { capacity });
        }

        let file_path = file_path.into();
        let (reply, rx) = oneshot::channel();
        let job = Job::new(
            WorkItem {
                file_path: file_path.clone(),
                content: content.into(),
                options,
                priority,
                timestamp: Instant::now(),
            },
            reply,
        );
        if self.events.send(Event::Submit(job)).is_err() {
            self.shared.queued.fetch_sub(1, Ordering::SeqCst);
            return Err(PoolError::ShutDown);
        }
        self.shared.submitted.fetch_add(1, Ordering::Relaxed);
        debug!("Queued {} at priority {}", file_path, priority);
        Ok(JobHandle { file_path, rx })
    }

    /// Submit every file at default priority and wait for all of them.
    pub async fn submit_batch(
        &self,
        files: Vec<(String, String)>,
        options: &ParseOptions,
    ) -> HashMap<String, std::result::Result<ParseResult, PoolError>> {
        let mut outcomes = HashMap::with_capacity(files.len());
        let mut handles = Vec::with_capacity(files.len());
        for (path, content) in files {
            match self.submit(path.clone(), content, options.clone(), 0) {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    outcomes.insert(path, Err(e));
                }
            }
        }

        let paths: Vec<String> = handles.iter().map(|h| h.file_path().to_string()).collect();
        for (path, outcome) in paths.into_iter().zip(join_all(handles).await) {
            outcomes.insert(path, outcome);
        }
        outcomes
    }

    /// Change the worker count. Idle workers go first; busy extras retire after their job.
    pub fn resize(&self, max_workers: usize) -> std::result::Result<(), PoolError> {
        self.events
            .send(Event::Resize(max_workers.max(1)))
            .map_err(|_| PoolError::ShutDown)
    }

    pub async fn stats(&self) -> std::result::Result<PoolStats, PoolError> {
        let (tx, rx) = oneshot::channel();
        self.events
            .send(Event::Stats(tx))
            .map_err(|_| PoolError::ShutDown)?;
        rx.await.map_err(|_| PoolError::ShutDown)
    }

    pub fn is_shut_down(&self) -> bool {
        self.shared.shutdown.load(Ordering::SeqCst)
    }

    /// Reject queued jobs and stop every worker.
    pub async fn shutdown(&self) {
        self.shared.shutdown.store(true, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        if self.events.send(Event::Shutdown(Some(tx))).is_ok() {
            let _ = rx.await;
        }
        let task = self.task.lock().take();
        if let Some(task) = task {
            let _ = task.await;
        }
        info!("Worker pool shut down");
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shared.shutdown.store(true, Ordering::SeqCst);
        let _ = self.events.send(Event::Shutdown(None));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SentinelError;
    use crate::index::Language;

    /// Behaviour is picked from the file name: `sleep_<ms>` (stops when cancelled),
    /// `hang_<ms>` (ignores cancellation), `panic`, `flaky`, `fail`.
    #[derive(Default)]
    struct Recorder {
        active: AtomicUsize,
        peak: AtomicUsize,
        cancelled: AtomicUsize,
        flaky_calls: AtomicUsize,
        order: parking_lot::Mutex<Vec<String>>,
    }

    fn millis_after(name: &str, prefix: &str) -> Option<Duration> {
        name.strip_prefix(prefix)
            .and_then(|rest| rest.split('_').next())
            .and_then(|ms| ms.parse::<u64>().ok())
            .map(Duration::from_millis)
    }

    impl JobHandler for Recorder {
        fn process(&self, item: &WorkItem, cancel: &CancelToken) -> Result<ParseResult> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            self.order.lock().push(item.file_path.clone());

            let name = item.file_path.as_str();
            if let Some(wait) = millis_after(name, "sleep_") {
                let started = Instant::now();
                while started.elapsed() < wait {
                    if cancel.is_cancelled() {
                        self.cancelled.fetch_add(1, Ordering::SeqCst);
                        self.active.fetch_sub(1, Ordering::SeqCst);
                        return Err(SentinelError::Cancelled);
                    }
                    std::thread::sleep(Duration::from_millis(5));
                }
            }
            if let Some(wait) = millis_after(name, "hang_") {
                std::thread::sleep(wait);
            }
            self.active.fetch_sub(1, Ordering::SeqCst);

            if name.starts_with("panic") {
                panic!("handler blew up on {}", name);
            }
            if name.starts_with("flaky") && self.flaky_calls.fetch_add(1, Ordering::SeqCst) == 0 {
                panic!("first attempt fails");
            }
            if name.starts_with("fail") {
                return Err(SentinelError::ParseFailed {
                    file: name.to_string(),
                    reason: "bad input".to_string(),
                });
            }
            Ok(ParseResult::empty(name, Language::Python))
        }
    }

    fn config(max_workers: usize) -> PoolConfig {
        PoolConfig {
            max_workers,
            queue_timeout: Duration::from_secs(10),
            worker_timeout: Duration::from_secs(10),
            retry_attempts: 2,
            retry_backoff: Duration::ZERO,
            memory_threshold_mb: 1024,
            max_queue_size: 100,
            tick_interval: Duration::from_millis(10),
        }
    }

    fn pool(recorder: &Arc<Recorder>, config: PoolConfig) -> WorkerPool {
        WorkerPool::with_probe(recorder.clone(), config, Arc::new(FixedMemory::new(100)))
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let recorder = Arc::new(Recorder::default());
        let pool = pool(&recorder, config(2));
        let files: Vec<(String, String)> = (0..8)
            .map(|i| (format!("sleep_40_{}.py", i), String::new()))
            .collect();

        let results = pool.submit_batch(files, &ParseOptions::default()).await;
        assert_eq!(results.len(), 8);
        assert!(results.values().all(|r| r.is_ok()));
        assert!(recorder.peak.load(Ordering::SeqCst) <= 2);

        let stats = pool.stats().await.unwrap();
        assert!(stats.peak_concurrency <= 2);
        assert_eq!(stats.completed, 8);
        pool.shutdown().await;
    }

    #[tokio::test]
    async fn test_timeout_retries_then_fails() {
        let recorder = Arc::new(Recorder::default());
        let pool = pool(
            &recorder,
            PoolConfig {
                worker_timeout: Duration::from_millis(100),
                ..config(1)
            },
        );

        let started = Instant::now();
        let handle = pool
            .submit("sleep_1000_slow.py", "", ParseOptions::default(), 0)
            .unwrap();
        let outcome = handle.await;
        let elapsed = started.elapsed();

        assert_eq!(
            outcome,
            Err(PoolError::WorkerTimeout {
                file: "sleep_1000_slow.py".to_string(),
                attempts: 3,
            })
        );
        assert!(elapsed >= Duration::from_millis(300), "elapsed {:?}", elapsed);
        assert!(elapsed < Duration::from_millis(900), "elapsed {:?}", elapsed);

        let stats = pool.stats().await.unwrap();
        assert_eq!(stats.timeouts, 3);
        assert_eq!(stats.retries, 2);
        assert_eq!(stats.workers, 1);

        // Every timed-out attempt saw its token and stopped.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(recorder.cancelled.load(Ordering::SeqCst), 3);
        assert_eq!(recorder.peak.load(Ordering::SeqCst), 1);
        assert_eq!(pool.stats().await.unwrap().abandoned, 0);
        pool.shutdown().await;
    }

    #[tokio::test]
    async fn test_stuck_worker_holds_its_slot_until_it_returns() {
        let recorder = Arc::new(Recorder::default());
        let pool = pool(
            &recorder,
            PoolConfig {
                worker_timeout: Duration::from_millis(100),
                retry_attempts: 1,
                ..config(1)
            },
        );

        let started = Instant::now();
        let handle = pool
            .submit("hang_300_stuck.py", "", ParseOptions::default(), 0)
            .unwrap();

        tokio::time::sleep(Duration::from_millis(180)).await;
        let stats = pool.stats().await.unwrap();
        assert_eq!(stats.abandoned, 1);
        assert_eq!(stats.workers, 1);
        assert_eq!(stats.queued, 1);

        let outcome = handle.await;
        assert_eq!(
            outcome,
            Err(PoolError::WorkerTimeout {
                file: "hang_300_stuck.py".to_string(),
                attempts: 2,
            })
        );
        // The retry could only start once the first thread came back.
        assert!(started.elapsed() >= Duration::from_millis(350), "elapsed {:?}", started.elapsed());
        assert_eq!(recorder.peak.load(Ordering::SeqCst), 1);

        let stats = pool.stats().await.unwrap();
        assert_eq!(stats.peak_concurrency, 1);
        assert_eq!(stats.timeouts, 2);
        pool.shutdown().await;
    }

    #[tokio::test]
    async fn test_queue_timeout() {
        let recorder = Arc::new(Recorder::default());
        let pool = pool(
            &recorder,
            PoolConfig {
                queue_timeout: Duration::from_millis(50),
                ..config(1)
            },
        );

        let busy = pool.submit("sleep_300_busy.py", "", ParseOptions::default(), 0).unwrap();
        let waiting = pool.submit("waiting.py", "", ParseOptions::default(), 0).unwrap();
        assert!(matches!(waiting.await, Err(PoolError::QueueTimeout { .. })));
        assert!(busy.await.is_ok());
        pool.shutdown().await;
    }

    #[tokio::test]
    async fn test_memory_pressure_rejects_synchronously() {
        let recorder = Arc::new(Recorder::default());
        let probe = Arc::new(FixedMemory::new(4096));
        let pool = WorkerPool::with_probe(recorder.clone(), config(1), probe.clone());

        let err = pool.submit("a.py", "", ParseOptions::default(), 0).err().unwrap();
        assert_eq!(
            err,
            PoolError::MemoryPressure {
                used_mb: 4096,
                threshold_mb: 1024,
            }
        );
        assert!(err.is_admission());

        probe.set(10);
        assert!(pool.submit("a.py", "", ParseOptions::default(), 0).unwrap().await.is_ok());
        assert_eq!(pool.stats().await.unwrap().rejected, 1);
        pool.shutdown().await;
    }

    #[tokio::test]
    async fn test_full_queue_rejects() {
        let recorder = Arc::new(Recorder::default());
        let pool = pool(
            &recorder,
            PoolConfig {
                max_queue_size: 1,
                ..config(1)
            },
        );

        let running = pool.submit("sleep_200_a.py", "", ParseOptions::default(), 0).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        let queued = pool.submit("b.py", "", ParseOptions::default(), 0).unwrap();
        let err = pool.submit("c.py", "", ParseOptions::default(), 0).err().unwrap();
        assert_eq!(err, PoolError::QueueFull { capacity: 1 });

        assert!(running.await.is_ok());
        assert!(queued.await.is_ok());
        pool.shutdown().await;
    }

    #[tokio::test]
    async fn test_higher_priority_runs_first() {
        let recorder = Arc::new(Recorder::default());
        let pool = pool(&recorder, config(1));

        let options = ParseOptions::default();
        let handles = vec![
            pool.submit("sleep_100_first.py", "", options.clone(), 0).unwrap(),
            pool.submit("low.py", "", options.clone(), 0).unwrap(),
            pool.submit("high_a.py", "", options.clone(), 10).unwrap(),
            pool.submit("high_b.py", "", options.clone(), 10).unwrap(),
        ];
        for outcome in join_all(handles).await {
            assert!(outcome.is_ok());
        }

        assert_eq!(
            *recorder.order.lock(),
            vec!["sleep_100_first.py", "high_a.py", "high_b.py", "low.py"]
        );
        pool.shutdown().await;
    }

    #[tokio::test]
    async fn test_crash_is_retried_on_a_fresh_worker() {
        let recorder = Arc::new(Recorder::default());
        let pool = pool(
            &recorder,
            PoolConfig {
                retry_attempts: 1,
                ..config(1)
            },
        );

        let flaky = pool.submit("flaky.py", "", ParseOptions::default(), 0).unwrap();
        assert!(flaky.await.is_ok());

        let crash = pool.submit("panic.py", "", ParseOptions::default(), 0).unwrap();
        match crash.await {
            Err(PoolError::WorkerCrashed { attempts, message, .. }) => {
                assert_eq!(attempts, 2);
                assert!(message.contains("blew up"));
            }
            other => panic!("unexpected outcome {:?}", other),
        }

        let after = pool.submit("after.py", "", ParseOptions::default(), 0).unwrap();
        assert!(after.await.is_ok());

        let stats = pool.stats().await.unwrap();
        assert_eq!(stats.crashes, 3);
        assert_eq!(stats.workers, 1);
        pool.shutdown().await;
    }

    #[tokio::test]
    async fn test_handler_errors_are_not_retried() {
        let recorder = Arc::new(Recorder::default());
        let pool = pool(&recorder, config(1));
        let outcome = pool.submit("fail.py", "", ParseOptions::default(), 0).unwrap().await;
        assert!(matches!(outcome, Err(PoolError::Job(message)) if message.contains("bad input")));
        assert_eq!(recorder.order.lock().len(), 1);
        pool.shutdown().await;
    }

    #[tokio::test]
    async fn test_resize() {
        let recorder = Arc::new(Recorder::default());
        let pool = pool(&recorder, config(4));
        assert_eq!(pool.stats().await.unwrap().workers, 4);

        pool.resize(1).unwrap();
        let stats = pool.stats().await.unwrap();
        assert_eq!(stats.workers, 1);
        assert_eq!(stats.max_workers, 1);

        pool.resize(3).unwrap();
        assert_eq!(pool.stats().await.unwrap().workers, 3);
        pool.shutdown().await;
    }

    #[tokio::test]
    async fn test_regrow_waits_for_draining_workers() {
        let recorder = Arc::new(Recorder::default());
        let pool = pool(&recorder, config(4));
        let options = ParseOptions::default();
        let old: Vec<JobHandle> = (0..4)
            .map(|i| pool.submit(format!("sleep_200_old_{}.py", i), "", options.clone(), 0).unwrap())
            .collect();
        tokio::time::sleep(Duration::from_millis(50)).await;

        pool.resize(1).unwrap();
        pool.resize(3).unwrap();
        let stats = pool.stats().await.unwrap();
        assert_eq!(stats.max_workers, 3);
        assert_eq!(stats.workers, 4);
        assert_eq!(stats.busy, 4);

        let new: Vec<JobHandle> = (0..3)
            .map(|i| pool.submit(format!("sleep_20_new_{}.py", i), "", options.clone(), 0).unwrap())
            .collect();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(recorder.order.lock().iter().all(|f| f.contains("old")));

        for outcome in join_all(old).await.into_iter().chain(join_all(new).await) {
            assert!(outcome.is_ok());
        }
        assert_eq!(recorder.peak.load(Ordering::SeqCst), 4);
        assert_eq!(pool.stats().await.unwrap().workers, 3);
        pool.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_rejects_queued_and_new_jobs() {
        let recorder = Arc::new(Recorder::default());
        let pool = pool(&recorder, config(1));

        let _running = pool.submit("sleep_200_a.py", "", ParseOptions::default(), 0).unwrap();
        let queued = pool.submit("b.py", "", ParseOptions::default(), 0).unwrap();
        pool.shutdown().await;

        assert_eq!(queued.await, Err(PoolError::ShutDown));
        assert!(pool.is_shut_down());
        assert_eq!(
            pool.submit("c.py", "", ParseOptions::default(), 0).err(),
            Some(PoolError::ShutDown)
        );
    }
}
