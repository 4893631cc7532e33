use std::sync::Arc;

use crate::error::{AppError, AppResult};
use crate::model::{NewTask, Task, TaskId, TaskUpdate};
use crate::remote::FetchError;
use crate::seed::{SeedCoordinator, SeedError};
use crate::tasks::{StorageError, TaskStore, TaskStoreError};

fn storage_cause(err: &StorageError) -> AppError {
    match err {
        StorageError::Sqlx(sqlx_err) => AppError::from_sqlx(sqlx_err),
        StorageError::Engine(closed) => AppError::new("STORAGE/ENGINE_CLOSED", closed.to_string()),
        StorageError::Corrupt(detail) => AppError::new("STORAGE/CORRUPT", detail.clone()),
    }
}

impl From<TaskStoreError> for AppError {
    fn from(err: TaskStoreError) -> Self {
        let mut app = AppError::new(err.code(), err.to_string());
        if let Some(id) = err.task_id() {
            app = app.with_context("id", id.to_string());
        }
        match &err {
            TaskStoreError::CreateFailed(source)
            | TaskStoreError::FetchFailed(source)
            | TaskStoreError::UpdateFailed { source, .. }
            | TaskStoreError::DeleteFailed { source, .. } => app.with_cause(storage_cause(source)),
            TaskStoreError::NotFound(_) | TaskStoreError::InvalidTitle => app,
        }
    }
}

impl From<FetchError> for AppError {
    fn from(err: FetchError) -> Self {
        match &err {
            FetchError::TransportSpecific(code) => {
                AppError::new("SEED/FETCH_TRANSPORT", err.to_string())
                    .with_context("reason", code.as_str())
            }
            FetchError::Transport(cause) => {
                AppError::new("SEED/FETCH_TRANSPORT", err.to_string())
                    .with_cause(AppError::from_chain(AppError::UNKNOWN_CODE, cause.as_ref()))
            }
            FetchError::Server(status) => AppError::new("SEED/FETCH_SERVER", err.to_string())
                .with_context("status", status.to_string()),
            FetchError::NoData => AppError::new("SEED/FETCH_NO_DATA", err.to_string()),
            FetchError::Unknown => AppError::new("SEED/FETCH_UNKNOWN", err.to_string()),
        }
    }
}

impl From<SeedError> for AppError {
    fn from(err: SeedError) -> Self {
        match err {
            SeedError::Fetch(fetch) => AppError::from(fetch),
            SeedError::Decode(json) => {
                AppError::new("SEED/DECODE", "Seed data could not be read.").with_cause(json)
            }
            SeedError::Store(store) => {
                AppError::new("SEED/STORE", "Seed data could not be saved.").with_cause(store)
            }
            SeedError::Settings(settings) => {
                AppError::new("SEED/SETTINGS", "Seed progress could not be saved.")
                    .with_cause(settings)
            }
        }
    }
}

/// Entry points used by the presentation layer.
#[derive(Clone)]
pub struct TaskService {
    store: TaskStore,
    seeder: Arc<SeedCoordinator>,
}

impl TaskService {
    pub fn new(store: TaskStore, seeder: Arc<SeedCoordinator>) -> Self {
        Self { store, seeder }
    }

    /// Tasks newest first; the first successful call seeds from the remote source.
    pub async fn list_tasks(&self) -> AppResult<Vec<Task>> {
        self.seeder
            .get_tasks()
            .await
            .map_err(|err| AppError::from(err).with_context("operation", "list"))
    }

    pub async fn get_task(&self, id: TaskId) -> AppResult<Task> {
        match self.store.get(id).await {
            Ok(Some(task)) => Ok(task),
            Ok(None) => Err(AppError::from(TaskStoreError::NotFound(id))
                .with_context("operation", "get")),
            Err(err) => Err(AppError::from(err).with_context("operation", "get")),
        }
    }

    pub async fn create_task(&self, fields: NewTask) -> AppResult<Task> {
        let task = fields.into_task();
        self.store.create(task.clone()).await.map_err(|err| {
            AppError::from(err)
                .with_context("operation", "create")
                .with_context("id", task.id.to_string())
        })?;
        Ok(task)
    }

    pub async fn update_task_field(&self, id: TaskId, update: TaskUpdate) -> AppResult<()> {
        let field = update.column();
        self.store.update(id, update).await.map_err(|err| {
            AppError::from(err)
                .with_context("operation", "update")
                .with_context("field", field)
        })
    }

    pub async fn delete_task(&self, id: TaskId) -> AppResult<()> {
        self.store
            .delete(id)
            .await
            .map_err(|err| AppError::from(err).with_context("operation", "delete"))
    }
}
