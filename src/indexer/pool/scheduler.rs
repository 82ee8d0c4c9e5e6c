// Scheduler task: sole owner of the queue and the worker map

use std::cmp::Ordering as CmpOrdering;
use std::collections::{BTreeMap, BinaryHeap, HashMap};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, oneshot};
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use super::memory::MemoryProbe;
use super::worker::{self, Dispatch};
use super::{JobHandler, JobOutcome, PoolConfig, PoolStats, Shared, WorkItem, WorkResult, WorkerState};
use crate::error::PoolError;
use crate::index::ParseResult;
use crate::indexer::cancel::CancelToken;

type Reply = oneshot::Sender<Result<ParseResult, PoolError>>;

pub(super) struct Job {
    id: u64,
    item: WorkItem,
    /// Failed attempts so far.
    attempts: u32,
    enqueued: Instant,
    reply: Reply,
}

impl Job {
    pub fn new(item: WorkItem, reply: Reply) -> Self {
        Self {
            id: 0,
            item,
            attempts: 0,
            enqueued: Instant::now(),
            reply,
        }
    }

    fn finish(self, outcome: Result<ParseResult, PoolError>) {
        // The submitter may have dropped its handle.
        let _ = self.reply.send(outcome);
    }
}

pub(super) enum Event {
    Submit(Job),
    Finished {
        worker_id: usize,
        job_id: u64,
        attempt: u32,
        result: Box<WorkResult>,
    },
    Deadline {
        job_id: u64,
        attempt: u32,
    },
    Requeue(Job),
    Resize(usize),
    Stats(oneshot::Sender<PoolStats>),
    Shutdown(Option<oneshot::Sender<()>>),
}

/// Heap entry: higher priority first, then submission order.
struct Queued {
    priority: i32,
    seq: u64,
    job: Job,
}

impl PartialEq for Queued {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}

impl Eq for Queued {}

impl PartialOrd for Queued {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for Queued {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

struct WorkerSlot {
    state: WorkerState,
    tx: mpsc::UnboundedSender<Dispatch>,
    /// Token of the job currently running on this worker.
    cancel: Option<CancelToken>,
    /// Leaves the pool once its current job finishes.
    retiring: bool,
    /// Missed its deadline. The slot stays busy until the thread reports back, then is replaced.
    abandoned: bool,
}

struct InFlight {
    job: Job,
    worker_id: usize,
}

enum Failure {
    Timeout,
    Crash(String),
}

pub(super) struct Scheduler {
    config: PoolConfig,
    handler: Arc<dyn JobHandler>,
    probe: Arc<dyn MemoryProbe>,
    events: mpsc::UnboundedSender<Event>,
    shared: Arc<Shared>,
    queue: BinaryHeap<Queued>,
    workers: BTreeMap<usize, WorkerSlot>,
    in_flight: HashMap<u64, InFlight>,
    next_worker_id: usize,
    next_job_id: u64,
    next_seq: u64,
    stats: PoolStats,
}

impl Scheduler {
    pub fn new(
        config: PoolConfig,
        handler: Arc<dyn JobHandler>,
        probe: Arc<dyn MemoryProbe>,
        events: mpsc::UnboundedSender<Event>,
        shared: Arc<Shared>,
    ) -> Self {
        Self {
            config,
            handler,
            probe,
            events,
            shared,
            queue: BinaryHeap::new(),
            workers: BTreeMap::new(),
            in_flight: HashMap::new(),
            next_worker_id: 0,
            next_job_id: 0,
            next_seq: 0,
            stats: PoolStats::default(),
        }
    }

    pub async fn run(mut self, mut events: mpsc::UnboundedReceiver<Event>) {
        self.fill_workers();
        let mut tick = time::interval(self.config.tick_interval.max(Duration::from_millis(1)));
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(Event::Shutdown(ack)) => {
                        self.shutdown();
                        if let Some(ack) = ack {
                            let _ = ack.send(());
                        }
                        break;
                    }
                    Some(event) => self.handle(event),
                    None => {
                        self.shutdown();
                        break;
                    }
                },
                _ = tick.tick() => {
                    self.expire_queued();
                    self.pump();
                }
            }
        }
    }

    fn handle(&mut self, event: Event) {
        match event {
            Event::Submit(mut job) => {
                job.id = self.next_job_id;
                self.next_job_id += 1;
                self.enqueue(job);
            }
            Event::Requeue(job) => {
                if self.shared.shutdown.load(Ordering::SeqCst) {
                    job.finish(Err(PoolError::ShutDown));
                    return;
                }
                self.shared.queued.fetch_add(1, Ordering::SeqCst);
                self.enqueue(job);
            }
            Event::Finished {
                worker_id,
                job_id,
                attempt,
                result,
            } => self.on_finished(worker_id, job_id, attempt, *result),
            Event::Deadline { job_id, attempt } => self.on_deadline(job_id, attempt),
            Event::Resize(max_workers) => self.resize(max_workers),
            Event::Stats(reply) => {
                let _ = reply.send(self.snapshot());
            }
            Event::Shutdown(_) => {}
        }
        self.pump();
    }

    fn enqueue(&mut self, mut job: Job) {
        job.enqueued = Instant::now();
        let seq = self.next_seq;
        self.next_seq += 1;
        self.queue.push(Queued {
            priority: job.item.priority,
            seq,
            job,
        });
    }

    /// Dispatch queued jobs while idle workers exist.
    fn pump(&mut self) {
        loop {
            let Some(worker_id) = self.idle_worker() else {
                return;
            };
            let Some(Queued { job, .. }) = self.queue.pop() else {
                return;
            };
            self.shared.queued.fetch_sub(1, Ordering::SeqCst);

            let waited = job.enqueued.elapsed();
            if waited > self.config.queue_timeout {
                self.fail_queue_timeout(job, waited.as_millis() as u64);
                continue;
            }
            self.dispatch(worker_id, job);
        }
    }

    /// Never lets busy threads, abandoned and retiring ones included, exceed `max_workers`.
    fn idle_worker(&self) -> Option<usize> {
        if self.busy_workers() >= self.config.max_workers {
            return None;
        }
        self.workers
            .iter()
            .find(|(_, slot)| slot.state == WorkerState::Idle && !slot.retiring)
            .map(|(id, _)| *id)
    }

    fn dispatch(&mut self, worker_id: usize, job: Job) {
        let Some(slot) = self.workers.get_mut(&worker_id) else {
            return;
        };
        let cancel = CancelToken::new();
        let dispatch = Dispatch {
            job_id: job.id,
            attempt: job.attempts,
            item: job.item.clone(),
            cancel: cancel.clone(),
        };
        if slot.tx.send(dispatch).is_err() {
            // The thread is gone without reporting; treat it as a crash.
            self.drop_worker(worker_id);
            self.fill_workers();
            self.retry(job, Failure::Crash("worker exited unexpectedly".to_string()));
            return;
        }

        slot.state = WorkerState::Busy;
        slot.cancel = Some(cancel);
        debug!(
            "Dispatched {} to worker {} (attempt {})",
            job.item.file_path,
            worker_id,
            job.attempts + 1
        );

        let (job_id, attempt) = (job.id, job.attempts);
        let events = self.events.clone();
        let timeout = self.config.worker_timeout;
        tokio::spawn(async move {
            time::sleep(timeout).await;
            let _ = events.send(Event::Deadline { job_id, attempt });
        });

        self.in_flight.insert(job.id, InFlight { job, worker_id });
        let busy = self.busy_workers();
        self.stats.peak_concurrency = self.stats.peak_concurrency.max(busy);
    }

    fn busy_workers(&self) -> usize {
        self.workers
            .values()
            .filter(|w| w.state == WorkerState::Busy)
            .count()
    }

    fn on_finished(&mut self, worker_id: usize, job_id: u64, attempt: u32, result: WorkResult) {
        let current = self
            .in_flight
            .get(&job_id)
            .map(|f| f.worker_id == worker_id && f.job.attempts == attempt)
            .unwrap_or(false);
        if !current {
            // Late answer from an abandoned worker: its thread is free now, so the slot can be replaced.
            debug!("Ignoring stale result from worker {} for job {}", worker_id, job_id);
            if self.workers.get(&worker_id).is_some_and(|w| w.abandoned) {
                self.drop_worker(worker_id);
                self.fill_workers();
            }
            return;
        }
        let Some(InFlight { job, .. }) = self.in_flight.remove(&job_id) else {
            return;
        };

        let crashed = matches!(result.outcome, JobOutcome::Panicked(_));
        if crashed {
            self.stats.crashes += 1;
            self.drop_worker(worker_id);
            self.fill_workers();
        } else if let Some(slot) = self.workers.get_mut(&worker_id) {
            slot.state = WorkerState::Idle;
            slot.cancel = None;
            if slot.retiring {
                self.drop_worker(worker_id);
                self.fill_workers();
            }
        }

        debug!(
            "Worker {} finished {} in {:?} ({}MB in use)",
            result.worker_id, result.work_item.file_path, result.processing_time, result.memory_used
        );
        match result.outcome {
            JobOutcome::Completed(parsed) => {
                self.stats.completed += 1;
                job.finish(Ok(parsed));
            }
            JobOutcome::Failed(message) => {
                self.stats.failed += 1;
                warn!("Job for {} failed: {}", job.item.file_path, message);
                job.finish(Err(PoolError::Job(message)));
            }
            JobOutcome::Cancelled => {
                self.stats.timeouts += 1;
                self.retry(job, Failure::Timeout);
            }
            JobOutcome::Panicked(message) => self.retry(job, Failure::Crash(message)),
        }
    }

    fn on_deadline(&mut self, job_id: u64, attempt: u32) {
        let expired = self
            .in_flight
            .get(&job_id)
            .map(|f| f.job.attempts == attempt)
            .unwrap_or(false);
        if !expired {
            return;
        }
        let Some(InFlight { job, worker_id }) = self.in_flight.remove(&job_id) else {
            return;
        };

        self.stats.timeouts += 1;
        warn!(
            "Worker {} timed out after {:?} on {}, cancelling it",
            worker_id, self.config.worker_timeout, job.item.file_path
        );
        // The slot keeps counting against `max_workers` until the thread returns.
        if let Some(slot) = self.workers.get_mut(&worker_id) {
            slot.abandoned = true;
            if let Some(cancel) = slot.cancel.take() {
                cancel.cancel();
            }
        }
        self.retry(job, Failure::Timeout);
    }

    fn retry(&mut self, mut job: Job, failure: Failure) {
        job.attempts += 1;
        if job.attempts > self.config.retry_attempts {
            self.stats.failed += 1;
            let file = job.item.file_path.clone();
            let attempts = job.attempts;
            let err = match failure {
                Failure::Timeout => PoolError::WorkerTimeout { file, attempts },
                Failure::Crash(message) => PoolError::WorkerCrashed {
                    file,
                    attempts,
                    message,
                },
            };
            error!("{}", err);
            job.finish(Err(err));
            return;
        }

        self.stats.retries += 1;
        let backoff = self.config.retry_backoff * job.attempts;
        debug!(
            "Retrying {} in {:?} (attempt {})",
            job.item.file_path,
            backoff,
            job.attempts + 1
        );
        if backoff.is_zero() {
            self.shared.queued.fetch_add(1, Ordering::SeqCst);
            self.enqueue(job);
            return;
        }
        let events = self.events.clone();
        tokio::spawn(async move {
            time::sleep(backoff).await;
            // A closed channel drops the job, and its handle resolves to `ShutDown`.
            let _ = events.send(Event::Requeue(job));
        });
    }

    fn fail_queue_timeout(&mut self, job: Job, waited_ms: u64) {
        self.stats.queue_timeouts += 1;
        self.stats.failed += 1;
        warn!("{} waited {}ms for a worker", job.item.file_path, waited_ms);
        let file = job.item.file_path.clone();
        job.finish(Err(PoolError::QueueTimeout { file, waited_ms }));
    }

    fn expire_queued(&mut self) {
        let limit = self.config.queue_timeout;
        if !self.queue.iter().any(|q| q.job.enqueued.elapsed() > limit) {
            return;
        }
        let (expired, kept): (Vec<Queued>, Vec<Queued>) = std::mem::take(&mut self.queue)
            .into_vec()
            .into_iter()
            .partition(|q| q.job.enqueued.elapsed() > limit);
        self.queue = kept.into_iter().collect();
        for Queued { job, .. } in expired {
            self.shared.queued.fetch_sub(1, Ordering::SeqCst);
            let waited = job.enqueued.elapsed().as_millis() as u64;
            self.fail_queue_timeout(job, waited);
        }
    }

    fn spawn_worker(&mut self) -> bool {
        let worker_id = self.next_worker_id;
        self.next_worker_id += 1;
        match worker::spawn(worker_id, self.handler.clone(), self.probe.clone(), self.events.clone()) {
            Ok(tx) => {
                self.workers.insert(
                    worker_id,
                    WorkerSlot {
                        state: WorkerState::Idle,
                        tx,
                        cancel: None,
                        retiring: false,
                        abandoned: false,
                    },
                );
                true
            }
            Err(e) => {
                error!("Failed to start worker thread: {}", e);
                false
            }
        }
    }

    /// Spawn until every slot, retiring and abandoned ones included, adds up to `max_workers`.
    fn fill_workers(&mut self) {
        while self.workers.len() < self.config.max_workers {
            if !self.spawn_worker() {
                break;
            }
        }
    }

    /// Forget a worker and cancel whatever it is running. Dropping its sender ends
    /// the thread once that job returns.
    fn drop_worker(&mut self, worker_id: usize) {
        if let Some(mut slot) = self.workers.remove(&worker_id) {
            if let Some(cancel) = slot.cancel.take() {
                cancel.cancel();
            }
            slot.state = WorkerState::Terminated;
            self.stats.workers_terminated += 1;
            debug!("Worker {} terminated", worker_id);
        }
    }

    fn resize(&mut self, max_workers: usize) {
        info!("Resizing worker pool from {} to {}", self.config.max_workers, max_workers);
        self.config.max_workers = max_workers;

        // Growing reclaims workers still draining from an earlier shrink before spawning.
        let mut staying = self.workers.values().filter(|w| !w.retiring).count();
        for slot in self.workers.values_mut().filter(|w| w.retiring && !w.abandoned) {
            if staying >= max_workers {
                break;
            }
            slot.retiring = false;
            staying += 1;
        }

        let mut excess = staying.saturating_sub(max_workers);
        let idle: Vec<usize> = self
            .workers
            .iter()
            .filter(|(_, w)| w.state == WorkerState::Idle && !w.retiring)
            .map(|(id, _)| *id)
            .collect();
        for worker_id in idle.into_iter().take(excess) {
            self.drop_worker(worker_id);
            excess -= 1;
        }
        if excess > 0 {
            for slot in self.workers.values_mut().filter(|w| !w.retiring).take(excess) {
                slot.retiring = true;
            }
        }
        self.fill_workers();
    }

    fn snapshot(&self) -> PoolStats {
        let idle = self
            .workers
            .values()
            .filter(|w| w.state == WorkerState::Idle)
            .count();
        PoolStats {
            max_workers: self.config.max_workers,
            workers: self.workers.len(),
            idle,
            busy: self.workers.len() - idle,
            queued: self.queue.len(),
            in_flight: self.in_flight.len(),
            abandoned: self.workers.values().filter(|w| w.abandoned).count(),
            submitted: self.shared.submitted.load(Ordering::Relaxed),
            rejected: self.shared.rejected.load(Ordering::Relaxed),
            ..self.stats.clone()
        }
    }

    fn shutdown(&mut self) {
        self.shared.shutdown.store(true, Ordering::SeqCst);
        let queued = self.queue.len();
        for Queued { job, .. } in std::mem::take(&mut self.queue).into_vec() {
            self.shared.queued.fetch_sub(1, Ordering::SeqCst);
            job.finish(Err(PoolError::ShutDown));
        }
        for (_, InFlight { job, .. }) in self.in_flight.drain() {
            job.finish(Err(PoolError::ShutDown));
        }
        let ids: Vec<usize> = self.workers.keys().copied().collect();
        for worker_id in ids {
            self.drop_worker(worker_id);
        }
        info!("Scheduler stopped, {} queued jobs rejected", queued);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indexer::pipeline::ParseOptions;

    fn queued(priority: i32, seq: u64) -> Queued {
        let (reply, _rx) = oneshot::channel();
        let item = WorkItem {
            file_path: format!("{}-{}.py", priority, seq),
            content: Arc::from(""),
            options: ParseOptions::default(),
            priority,
            timestamp: Instant::now(),
        };
        Queued {
            priority,
            seq,
            job: Job::new(item, reply),
        }
    }

    #[test]
    fn test_queue_orders_by_priority_then_fifo() {
        let mut heap = BinaryHeap::new();
        for (priority, seq) in [(0, 0), (5, 1), (0, 2), (5, 3), (-1, 4)] {
            heap.push(queued(priority, seq));
        }
        let order: Vec<(i32, u64)> = std::iter::from_fn(|| heap.pop())
            .map(|q| (q.priority, q.seq))
            .collect();
        assert_eq!(order, vec![(5, 1), (5, 3), (0, 0), (0, 2), (-1, 4)]);
    }
}
