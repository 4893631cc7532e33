//! First-launch seeding: fetch the remote to-do list once, store it, and
//! serve every later request from local storage.

use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::model::{is_valid_title, Task, TaskId};
use crate::remote::{FetchError, RemoteSource};
use crate::settings::SeedFlag;
use crate::tasks::{TaskStore, TaskStoreError};
use crate::time::now_ms;

/// Body of the remote seed endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct TodoPage {
    pub todos: Vec<RemoteTodo>,
    #[serde(default)]
    pub total: i64,
    #[serde(default)]
    pub skip: i64,
    #[serde(default)]
    pub limit: i64,
}

/// Only `todo` and `completed` are kept; remote ids are discarded.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteTodo {
    #[serde(default)]
    pub id: i64,
    pub todo: String,
    pub completed: bool,
    #[serde(default, rename = "userId")]
    pub user_id: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedState {
    NotSeeded,
    Seeded,
}

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("could not fetch seed data: {0}")]
    Fetch(#[from] FetchError),
    #[error("seed data is malformed: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("could not store seed data: {0}")]
    Store(#[from] TaskStoreError),
    #[error("could not persist seed flag: {0:#}")]
    Settings(anyhow::Error),
}

/// Turn a fetched page into local tasks.
///
/// Every task gets a fresh id. Dates count down from `seeded_at` one
/// millisecond per item so the remote order survives the newest-first sort.
pub fn tasks_from_page(page: TodoPage, seeded_at: i64) -> Vec<Task> {
    let mut tasks = Vec::with_capacity(page.todos.len());
    for todo in page.todos {
        if !is_valid_title(&todo.todo) {
            warn!(target: "tasklist", event = "seed_item_skipped", remote_id = todo.id, reason = "blank_title");
            continue;
        }
        let offset = tasks.len() as i64;
        tasks.push(Task {
            id: TaskId::new(),
            title: todo.todo,
            description: None,
            date: seeded_at - offset,
            is_completed: todo.completed,
        });
    }
    tasks
}

pub struct SeedCoordinator {
    store: TaskStore,
    flag: SeedFlag,
    source: Arc<dyn RemoteSource>,
    gate: Mutex<()>,
}

impl SeedCoordinator {
    pub fn new(store: TaskStore, flag: SeedFlag, source: Arc<dyn RemoteSource>) -> Self {
        Self {
            store,
            flag,
            source,
            gate: Mutex::new(()),
        }
    }

    pub fn state(&self) -> SeedState {
        if self.flag.is_set() {
            SeedState::Seeded
        } else {
            SeedState::NotSeeded
        }
    }

    /// All tasks, seeding the store first if this is the first successful run.
    ///
    /// Concurrent callers wait on one another so at most one fetch is in flight.
    /// A failed seed leaves the state at `NotSeeded`; the next call retries.
    pub async fn get_tasks(&self) -> Result<Vec<Task>, SeedError> {
        if self.state() == SeedState::NotSeeded {
            let _gate = self.gate.lock().await;
            if self.state() == SeedState::NotSeeded {
                self.seed().await?;
            }
        }
        Ok(self.store.list_all().await?)
    }

    async fn seed(&self) -> Result<usize, SeedError> {
        let origin = self.source.describe();
        info!(target: "tasklist", event = "seed_started", source = %origin);

        let body = self.source.fetch().await?;
        let page: TodoPage = serde_json::from_slice(&body).map_err(|err| {
            warn!(target: "tasklist", event = "seed_decode_failed", source = %origin, error = %err);
            err
        })?;
        let remote_total = page.total;
        let tasks = tasks_from_page(page, now_ms());
        let count = tasks.len();

        self.store.create_many(tasks).await?;
        self.flag.mark_seeded().map_err(SeedError::Settings)?;

        info!(
            target: "tasklist",
            event = "seed_completed",
            source = %origin,
            count,
            remote_total
        );
        Ok(count)
    }
}
