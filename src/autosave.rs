//! Debounced description saves for the task editor.
//!
//! Each edit replaces the pending save for that task and restarts its quiet
//! period; only the latest text is committed once the period elapses.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::model::{TaskId, TaskUpdate};
use crate::tasks::{TaskStore, TaskStoreError};

pub const DEFAULT_QUIET_PERIOD: Duration = Duration::from_secs(1);

/// A debounced save that could not be committed.
#[derive(Debug)]
pub struct AutosaveFailure {
    pub id: TaskId,
    pub error: TaskStoreError,
}

struct Pending {
    generation: u64,
    text: Option<String>,
    timer: JoinHandle<()>,
}

type PendingMap = Arc<Mutex<HashMap<TaskId, Pending>>>;

pub struct Autosaver {
    store: TaskStore,
    quiet: Duration,
    pending: PendingMap,
    generation: AtomicU64,
    failures: mpsc::UnboundedSender<AutosaveFailure>,
}

impl Autosaver {
    /// The receiver yields every save that failed after its quiet period.
    pub fn new(
        store: TaskStore,
        quiet: Duration,
    ) -> (Self, mpsc::UnboundedReceiver<AutosaveFailure>) {
        let (failures, receiver) = mpsc::unbounded_channel();
        let saver = Self {
            store,
            quiet,
            pending: Arc::new(Mutex::new(HashMap::new())),
            generation: AtomicU64::new(0),
            failures,
        };
        (saver, receiver)
    }

    /// Record an edit. Any save still waiting for this task is cancelled.
    pub fn schedule(&self, id: TaskId, description: Option<String>) {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        let store = self.store.clone();
        let pending = self.pending.clone();
        let failures = self.failures.clone();
        let quiet = self.quiet;
        let text = description.clone();

        // Held until the entry is in place so a zero quiet period cannot miss it.
        let mut guard = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        let timer = tokio::spawn(async move {
            tokio::time::sleep(quiet).await;
            let due = {
                let mut guard = pending.lock().unwrap_or_else(|e| e.into_inner());
                let current = guard.get(&id).map(|entry| entry.generation);
                current == Some(generation) && guard.remove(&id).is_some()
            };
            if due {
                if let Err(error) = commit(&store, id, text).await {
                    let _ = failures.send(AutosaveFailure { id, error });
                }
            }
        });

        if let Some(previous) = guard.insert(
            id,
            Pending {
                generation,
                text: description,
                timer,
            },
        ) {
            previous.timer.abort();
            debug!(target: "tasklist", event = "autosave_rescheduled", id = %id);
        }
    }

    /// Commit the pending edit for `id` now instead of waiting.
    /// Returns `Ok(false)` when nothing was pending.
    pub async fn flush(&self, id: TaskId) -> Result<bool, TaskStoreError> {
        let entry = self.take(id);
        match entry {
            Some(pending) => {
                pending.timer.abort();
                commit(&self.store, id, pending.text).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Commit every pending edit, reporting failures on the failure channel.
    pub async fn flush_all(&self) {
        let drained: Vec<(TaskId, Pending)> = {
            let mut guard = self.pending.lock().unwrap_or_else(|e| e.into_inner());
            guard.drain().collect()
        };
        for (id, pending) in drained {
            pending.timer.abort();
            if let Err(error) = commit(&self.store, id, pending.text).await {
                let _ = self.failures.send(AutosaveFailure { id, error });
            }
        }
    }

    /// Drop the pending edit for `id` without saving it.
    pub fn cancel(&self, id: TaskId) -> bool {
        match self.take(id) {
            Some(pending) => {
                pending.timer.abort();
                true
            }
            None => false,
        }
    }

    pub fn pending_count(&self) -> usize {
        self.pending
            .lock()
            .map(|guard| guard.len())
            .unwrap_or_else(|e| e.into_inner().len())
    }

    fn take(&self, id: TaskId) -> Option<Pending> {
        self.pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&id)
    }
}

async fn commit(
    store: &TaskStore,
    id: TaskId,
    text: Option<String>,
) -> Result<(), TaskStoreError> {
    match store.update(id, TaskUpdate::Description(text)).await {
        Ok(()) => {
            info!(target: "tasklist", event = "autosave_committed", id = %id);
            Ok(())
        }
        Err(err) => {
            error!(target: "tasklist", event = "autosave_failed", id = %id, error = %err);
            Err(err)
        }
    }
}
