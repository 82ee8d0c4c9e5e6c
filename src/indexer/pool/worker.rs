// Worker threads

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::memory::MemoryProbe;
use super::scheduler::Event;
use super::{JobHandler, JobOutcome, WorkItem, WorkResult};
use crate::error::SentinelError;
use crate::indexer::cancel::CancelToken;

/// One job handed to a worker
pub(super) struct Dispatch {
    pub job_id: u64,
    pub attempt: u32,
    pub item: WorkItem,
    pub cancel: CancelToken,
}

/// Start a worker thread. The thread exits when its dispatch channel closes or a job panics.
pub(super) fn spawn(
    worker_id: usize,
    handler: Arc<dyn JobHandler>,
    probe: Arc<dyn MemoryProbe>,
    events: mpsc::UnboundedSender<Event>,
) -> std::io::Result<mpsc::UnboundedSender<Dispatch>> {
    let (tx, mut rx) = mpsc::unbounded_channel::<Dispatch>();
    thread::Builder::new()
        .name(format!("sentinel-worker-{}", worker_id))
        .spawn(move || {
            debug!("Worker {} started", worker_id);
            while let Some(dispatch) = rx.blocking_recv() {
                let started = Instant::now();
                let outcome = match panic::catch_unwind(AssertUnwindSafe(|| {
                    handler.process(&dispatch.item, &dispatch.cancel)
                })) {
                    Ok(Ok(result)) => JobOutcome::Completed(result),
                    Ok(Err(SentinelError::Cancelled)) => JobOutcome::Cancelled,
                    Ok(Err(e)) => JobOutcome::Failed(e.to_string()),
                    Err(payload) => JobOutcome::Panicked(panic_message(payload)),
                };
                let crashed = matches!(outcome, JobOutcome::Panicked(_));
                if crashed {
                    warn!("Worker {} crashed on {}", worker_id, dispatch.item.file_path);
                }

                let result = WorkResult {
                    work_item: dispatch.item,
                    outcome,
                    processing_time: started.elapsed(),
                    memory_used: probe.used_mb(),
                    worker_id,
                };
                let finished = Event::Finished {
                    worker_id,
                    job_id: dispatch.job_id,
                    attempt: dispatch.attempt,
                    result: Box::new(result),
                };
                if events.send(finished).is_err() || crashed {
                    break;
                }
            }
            debug!("Worker {} exiting", worker_id);
        })?;
    Ok(tx)
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "worker panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_message() {
        let payload = panic::catch_unwind(|| panic!("grammar exploded")).unwrap_err();
        assert_eq!(panic_message(payload), "grammar exploded");

        let payload = panic::catch_unwind(|| panic!("{} nodes", 3)).unwrap_err();
        assert_eq!(panic_message(payload), "3 nodes");
    }
}
