//! Bounded background worker pool
//!
//! A fixed number of Tokio tasks pull jobs from a bounded queue. Every
//! submitted [`Task`] gets a [`TaskHandle`] whose [`TaskHandle::result`]
//! resolves exactly once: with the task's value, or with an error if the task
//! was cancelled, panicked, or was discarded by a shutdown before it ran.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::FutureExt;
use futures::future::{AbortHandle, AbortRegistration, Abortable, BoxFuture};
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::error::{Error, Result};

type Job = BoxFuture<'static, ()>;

/// A unit of work plus the handle that can cancel it
pub struct Task<T> {
    work: BoxFuture<'static, Result<T>>,
    abort: AbortHandle,
    registration: AbortRegistration,
}

impl<T: Send + 'static> Task<T> {
    pub fn new<F>(work: F) -> Self
    where
        F: Future<Output = Result<T>> + Send + 'static,
    {
        let (abort, registration) = AbortHandle::new_pair();
        Self {
            work: Box::pin(work),
            abort,
            registration,
        }
    }

    /// Cancels the task whether it is queued or running
    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }
}

/// One-shot receiver for a submitted task's outcome
#[derive(Debug)]
pub struct TaskHandle<T> {
    receiver: oneshot::Receiver<Result<T>>,
    abort: AbortHandle,
}

impl<T> TaskHandle<T> {
    /// Wait for the task's outcome
    pub async fn result(self) -> Result<T> {
        match self.receiver.await {
            Ok(result) => result,
            Err(_) => Err(Error::TaskAborted(
                "task was discarded before it ran (worker pool shut down)".into(),
            )),
        }
    }

    pub fn cancel(&self) {
        self.abort.abort();
    }
}

/// Fixed-size pool of background workers
#[derive(Debug)]
pub struct WorkerPool {
    size: usize,
    sender: Mutex<Option<mpsc::Sender<Job>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    closed: Arc<AtomicBool>,
}

impl WorkerPool {
    /// Start `size` workers (at least one). Must be called inside a Tokio runtime.
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        let (sender, receiver) = mpsc::channel::<Job>(size);
        let receiver = Arc::new(tokio::sync::Mutex::new(receiver));
        let closed = Arc::new(AtomicBool::new(false));

        let workers = (0..size)
            .map(|id| {
                tokio::spawn(run_worker(
                    id,
                    Arc::clone(&receiver),
                    Arc::clone(&closed),
                ))
            })
            .collect();

        tracing::debug!(workers = size, "worker pool started");

        Self {
            size,
            sender: Mutex::new(Some(sender)),
            workers: Mutex::new(workers),
            closed,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Queue a task, waiting for room when every worker is busy
    pub async fn submit<T>(&self, task: Task<T>) -> TaskHandle<T>
    where
        T: Send + 'static,
    {
        let (tx, receiver) = oneshot::channel();
        let Task {
            work,
            abort,
            registration,
        } = task;

        let job: Job = Box::pin(async move {
            let outcome = match AssertUnwindSafe(Abortable::new(work, registration))
                .catch_unwind()
                .await
            {
                Ok(Ok(result)) => result,
                Ok(Err(_aborted)) => Err(Error::Cancelled),
                Err(_panic) => Err(Error::TaskAborted("task panicked".into())),
            };
            // the submitter may have stopped listening
            let _ = tx.send(outcome);
        });

        let sender = self.sender.lock().clone();
        match sender {
            Some(sender) => {
                if sender.send(job).await.is_err() {
                    tracing::debug!("worker pool stopped while submitting a task");
                }
            }
            None => tracing::debug!("task submitted to a stopped worker pool"),
        }

        TaskHandle { receiver, abort }
    }

    /// Stop accepting work, fail queued tasks and wait for running ones.
    ///
    /// Running tasks are never cancelled. Calling this again is a no-op.
    pub async fn shutdown(&self) {
        self.closed.store(true, Ordering::Release);
        drop(self.sender.lock().take());

        let workers: Vec<JoinHandle<()>> = self.workers.lock().drain(..).collect();
        if workers.is_empty() {
            return;
        }

        for worker in workers {
            if let Err(e) = worker.await {
                tracing::warn!("worker terminated abnormally: {e}");
            }
        }
        tracing::debug!(workers = self.size, "worker pool stopped");
    }
}

async fn run_worker(
    id: usize,
    receiver: Arc<tokio::sync::Mutex<mpsc::Receiver<Job>>>,
    closed: Arc<AtomicBool>,
) {
    loop {
        let job = { receiver.lock().await.recv().await };
        let Some(job) = job else {
            break;
        };
        if closed.load(Ordering::Acquire) {
            // dropping the job drops its result sender; the handle reports the abort
            drop(job);
            continue;
        }
        job.await;
    }
    tracing::trace!(worker = id, "worker exited");
}
