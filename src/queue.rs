//! Serializes outgoing operations so concurrent callers cannot burst the backend.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};

use crate::{ApiError, Result};

type Job = Box<dyn FnOnce() -> Pin<Box<dyn Future<Output = ()> + Send>> + Send>;

/// FIFO dispatcher with a single worker and a fixed inter-request delay.
///
/// Cloning yields another handle to the same queue. The worker drains
/// outstanding jobs and exits once every handle is dropped.
#[derive(Clone, Debug)]
pub struct RequestQueue {
    sender: mpsc::UnboundedSender<Job>,
    delay: Duration,
}

impl RequestQueue {
    /// Spawns the worker on the current tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    pub fn new(delay: Duration) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        tokio::spawn(run_worker(receiver, delay));
        Self { sender, delay }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Appends `thunk` to the queue and returns a future for its result.
    ///
    /// The job is queued when this method is called, not when the returned
    /// future is first polled, so execution order follows call order.
    pub fn enqueue<F, Fut, T>(&self, thunk: F) -> impl Future<Output = Result<T>> + Send + 'static
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        let (result_tx, result_rx) = oneshot::channel();
        let job: Job = Box::new(move || {
            Box::pin(async move {
                // The caller may have stopped waiting; that is not an error here.
                let _ = result_tx.send(thunk().await);
            })
        });
        let queued = self.sender.send(job).is_ok();

        async move {
            if !queued {
                return Err(ApiError::QueueClosed);
            }
            result_rx.await.map_err(|_| ApiError::Dropped)?
        }
    }
}

async fn run_worker(mut receiver: mpsc::UnboundedReceiver<Job>, delay: Duration) {
    let mut dispatched = 0u64;
    while let Some(job) = receiver.recv().await {
        dispatched += 1;

        #[cfg(feature = "tracing")]
        tracing::debug!(job = dispatched, "dispatching queued request");

        // Each job runs in its own task so a panic only fails its own caller.
        if let Err(_err) = tokio::spawn(job()).await {
            #[cfg(feature = "tracing")]
            tracing::warn!(job = dispatched, "queued request aborted: {}", _err);
        }

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    #[cfg(feature = "tracing")]
    tracing::debug!(total = dispatched, "request queue closed");
    #[cfg(not(feature = "tracing"))]
    let _ = dispatched;
}
