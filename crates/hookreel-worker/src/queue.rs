//! Single-worker FIFO task queue.
//!
//! Tasks are run one at a time, in submission order, by one spawned worker
//! loop. Submitting never waits for the worker. A task that panics is
//! logged and dropped; the loop moves on to the next task.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::sync::mpsc;
use tracing::{debug, error};

use crate::error::{WorkerError, WorkerResult};
use crate::metrics::set_queue_depth;

type Task = BoxFuture<'static, ()>;

#[derive(Debug, Clone)]
pub struct SequentialQueue {
    tx: mpsc::UnboundedSender<Task>,
    /// Tasks submitted and not yet finished, including the running one
    depth: Arc<AtomicUsize>,
}

impl SequentialQueue {
    /// Spawn the worker loop on the current Tokio runtime.
    pub fn start() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let depth = Arc::new(AtomicUsize::new(0));

        tokio::spawn(Self::run(rx, Arc::clone(&depth)));

        Self { tx, depth }
    }

    /// Append a task to the queue.
    pub fn enqueue<F>(&self, task: F) -> WorkerResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let depth = self.depth.fetch_add(1, Ordering::SeqCst) + 1;
        if self.tx.send(task.boxed()).is_err() {
            self.depth.fetch_sub(1, Ordering::SeqCst);
            return Err(WorkerError::QueueClosed);
        }
        set_queue_depth(depth);
        Ok(())
    }

    pub fn depth(&self) -> usize {
        self.depth.load(Ordering::SeqCst)
    }

    async fn run(mut rx: mpsc::UnboundedReceiver<Task>, depth: Arc<AtomicUsize>) {
        debug!("Sequential queue worker started");

        while let Some(task) = rx.recv().await {
            if let Err(panic) = AssertUnwindSafe(task).catch_unwind().await {
                error!("Queued task panicked: {}", panic_message(panic.as_ref()));
            }
            let remaining = depth.fetch_sub(1, Ordering::SeqCst).saturating_sub(1);
            set_queue_depth(remaining);
        }

        debug!("Sequential queue worker stopped");
    }
}

/// Best-effort text of a panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
