//! Single background execution context for all storage work.
//!
//! Units of work are queued FIFO on an unbounded channel and drained by one
//! worker task, so no two units submitted to the same [`Engine`] ever run
//! concurrently against the database.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use futures::future::BoxFuture;
use futures::FutureExt;
use sqlx::SqlitePool;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error};

use crate::util::panic_payload;

/// The engine's worker is gone, or the unit of work panicked before replying.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("persistence engine unavailable: {reason}")]
pub struct EngineClosed {
    pub reason: String,
}

type Job = Box<dyn FnOnce(SqlitePool) -> BoxFuture<'static, ()> + Send>;

struct Queued {
    seq: u64,
    job: Job,
}

#[derive(Clone)]
pub struct Engine {
    inner: Arc<Inner>,
}

struct Inner {
    // `None` once shut down; dropping the sender ends the worker.
    sender: Mutex<Option<mpsc::UnboundedSender<Queued>>>,
    pool: SqlitePool,
    next_seq: AtomicU64,
}

impl Engine {
    /// Take ownership of `pool` and start the worker on the current tokio runtime.
    pub fn start(pool: SqlitePool) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        tokio::spawn(worker(pool.clone(), receiver));
        Self {
            inner: Arc::new(Inner {
                sender: Mutex::new(Some(sender)),
                pool,
                next_seq: AtomicU64::new(0),
            }),
        }
    }

    /// Execute `unit` after every previously submitted unit has finished.
    ///
    /// The returned future resolves with the unit's own output. Dropping it
    /// does not cancel the queued work.
    pub async fn run_exclusive<R, F, Fut>(&self, unit: F) -> Result<R, EngineClosed>
    where
        F: FnOnce(SqlitePool) -> Fut + Send + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        let job: Job = Box::new(move |pool| {
            async move {
                let out = unit(pool).await;
                let _ = reply_tx.send(out);
            }
            .boxed()
        });
        let seq = self.inner.next_seq.fetch_add(1, Ordering::Relaxed);
        {
            let guard = self.inner.sender.lock().unwrap_or_else(|e| e.into_inner());
            let sender = guard.as_ref().ok_or_else(|| EngineClosed {
                reason: "engine shut down".into(),
            })?;
            sender.send(Queued { seq, job }).map_err(|_| EngineClosed {
                reason: "worker stopped".into(),
            })?;
        }
        reply_rx.await.map_err(|_| EngineClosed {
            reason: "unit of work aborted".into(),
        })
    }

    /// Wait for queued work to drain, stop the worker, then close the database.
    ///
    /// Later submissions fail with [`EngineClosed`].
    pub async fn shutdown(&self) {
        let _ = self.run_exclusive(|_| async {}).await;
        let sender = self
            .inner
            .sender
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        drop(sender);
        self.inner.pool.close().await;
        debug!(target: "tasklist", event = "engine_shutdown");
    }
}

async fn worker(pool: SqlitePool, mut receiver: mpsc::UnboundedReceiver<Queued>) {
    debug!(target: "tasklist", event = "engine_started");
    while let Some(Queued { seq, job }) = receiver.recv().await {
        let fut = match std::panic::catch_unwind(AssertUnwindSafe(|| job(pool.clone()))) {
            Ok(fut) => fut,
            Err(payload) => {
                error!(
                    target: "tasklist",
                    event = "engine_unit_panicked",
                    seq,
                    message = %panic_payload(payload.as_ref())
                );
                continue;
            }
        };
        if let Err(payload) = AssertUnwindSafe(fut).catch_unwind().await {
            error!(
                target: "tasklist",
                event = "engine_unit_panicked",
                seq,
                message = %panic_payload(payload.as_ref())
            );
        }
    }
    debug!(target: "tasklist", event = "engine_stopped");
}
