use futures::FutureExt;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::db::{run_in_tx, Engine, EngineClosed};
use crate::model::{is_valid_title, Task, TaskId, TaskUpdate};

const SELECT_COLUMNS: &str = "SELECT id, title, description, date, is_completed FROM tasks";

/// Why a storage round-trip failed.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Engine(#[from] EngineClosed),
    #[error("stored task row is malformed: {0}")]
    Corrupt(String),
}

#[derive(Debug, Error)]
pub enum TaskStoreError {
    #[error("task {0} not found")]
    NotFound(TaskId),
    #[error("task title must not be empty")]
    InvalidTitle,
    #[error("failed to create task: {0}")]
    CreateFailed(#[source] StorageError),
    #[error("failed to fetch tasks: {0}")]
    FetchFailed(#[source] StorageError),
    #[error("failed to update task {id}: {source}")]
    UpdateFailed {
        id: TaskId,
        #[source]
        source: StorageError,
    },
    #[error("failed to delete task {id}: {source}")]
    DeleteFailed {
        id: TaskId,
        #[source]
        source: StorageError,
    },
}

impl TaskStoreError {
    /// Stable machine-readable code for this failure.
    pub fn code(&self) -> &'static str {
        match self {
            TaskStoreError::NotFound(_) => "TASKS/NOT_FOUND",
            TaskStoreError::InvalidTitle => "TASKS/INVALID_TITLE",
            TaskStoreError::CreateFailed(_) => "TASKS/CREATE_FAILED",
            TaskStoreError::FetchFailed(_) => "TASKS/FETCH_FAILED",
            TaskStoreError::UpdateFailed { .. } => "TASKS/UPDATE_FAILED",
            TaskStoreError::DeleteFailed { .. } => "TASKS/DELETE_FAILED",
        }
    }

    /// Task the failure refers to, when there is one.
    pub fn task_id(&self) -> Option<TaskId> {
        match self {
            TaskStoreError::NotFound(id)
            | TaskStoreError::UpdateFailed { id, .. }
            | TaskStoreError::DeleteFailed { id, .. } => Some(*id),
            _ => None,
        }
    }
}

fn flatten<T>(outcome: Result<Result<T, StorageError>, EngineClosed>) -> Result<T, StorageError> {
    outcome.map_err(StorageError::from).and_then(|inner| inner)
}

fn row_to_task(row: &SqliteRow) -> Result<Task, StorageError> {
    let id_str: String = row.try_get("id")?;
    let id = id_str
        .parse::<TaskId>()
        .map_err(|err| StorageError::Corrupt(format!("invalid task id {id_str:?}: {err}")))?;
    let is_completed: i64 = row.try_get("is_completed")?;
    Ok(Task {
        id,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        date: row.try_get("date")?,
        is_completed: is_completed != 0,
    })
}

async fn insert_task(conn: &mut SqliteConnection, task: &Task) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO tasks (id, title, description, date, is_completed) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(task.id.to_string())
    .bind(&task.title)
    .bind(&task.description)
    .bind(task.date)
    .bind(task.is_completed as i64)
    .execute(conn)
    .await?;
    Ok(())
}

async fn task_exists(conn: &mut SqliteConnection, id: &str) -> Result<bool, sqlx::Error> {
    let found: Option<i64> = sqlx::query_scalar("SELECT 1 FROM tasks WHERE id = ?")
        .bind(id)
        .fetch_optional(conn)
        .await?;
    Ok(found.is_some())
}

/// Typed CRUD over the `tasks` table. Every call is queued on the shared
/// [`Engine`], so read-modify-write sequences on one id never interleave.
#[derive(Clone)]
pub struct TaskStore {
    engine: Engine,
}

impl TaskStore {
    pub fn new(engine: Engine) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Insert one task. An id that already exists fails with `CreateFailed`.
    pub async fn create(&self, task: Task) -> Result<(), TaskStoreError> {
        if !task.has_valid_title() {
            return Err(TaskStoreError::InvalidTitle);
        }
        let id = task.id;
        let outcome = self
            .engine
            .run_exclusive(move |pool| async move {
                run_in_tx(&pool, move |tx| {
                    async move {
                        insert_task(&mut **tx, &task).await?;
                        Ok::<_, StorageError>(())
                    }
                    .boxed()
                })
                .await
            })
            .await;

        match flatten(outcome) {
            Ok(()) => {
                info!(target: "tasklist", event = "task_created", id = %id);
                Ok(())
            }
            Err(err) => {
                error!(target: "tasklist", event = "task_create_failed", id = %id, error = %err);
                Err(TaskStoreError::CreateFailed(err))
            }
        }
    }

    /// Insert a batch under one commit: either every task lands or none do.
    pub async fn create_many(&self, tasks: Vec<Task>) -> Result<(), TaskStoreError> {
        if tasks.is_empty() {
            return Ok(());
        }
        if tasks.iter().any(|task| !task.has_valid_title()) {
            return Err(TaskStoreError::InvalidTitle);
        }
        let count = tasks.len();
        let outcome = self
            .engine
            .run_exclusive(move |pool| async move {
                run_in_tx(&pool, move |tx| {
                    async move {
                        for task in &tasks {
                            insert_task(&mut **tx, task).await?;
                        }
                        Ok::<_, StorageError>(())
                    }
                    .boxed()
                })
                .await
            })
            .await;

        match flatten(outcome) {
            Ok(()) => {
                info!(target: "tasklist", event = "tasks_created", count);
                Ok(())
            }
            Err(err) => {
                error!(target: "tasklist", event = "tasks_create_failed", count, error = %err);
                Err(TaskStoreError::CreateFailed(err))
            }
        }
    }

    /// All tasks, newest `date` first.
    pub async fn list_all(&self) -> Result<Vec<Task>, TaskStoreError> {
        let outcome = self
            .engine
            .run_exclusive(|pool| async move {
                let rows = sqlx::query(&format!("{SELECT_COLUMNS} ORDER BY date DESC"))
                    .fetch_all(&pool)
                    .await?;
                rows.iter().map(row_to_task).collect::<Result<Vec<_>, _>>()
            })
            .await;

        match flatten(outcome) {
            Ok(tasks) => {
                info!(target: "tasklist", event = "tasks_fetched", count = tasks.len());
                Ok(tasks)
            }
            Err(err) => {
                error!(target: "tasklist", event = "tasks_fetch_failed", error = %err);
                Err(TaskStoreError::FetchFailed(err))
            }
        }
    }

    pub async fn get(&self, id: TaskId) -> Result<Option<Task>, TaskStoreError> {
        let outcome = self
            .engine
            .run_exclusive(move |pool| async move {
                let row = sqlx::query(&format!("{SELECT_COLUMNS} WHERE id = ?"))
                    .bind(id.to_string())
                    .fetch_optional(&pool)
                    .await?;
                row.as_ref().map(row_to_task).transpose()
            })
            .await;

        flatten(outcome).map_err(|err| {
            error!(target: "tasklist", event = "task_fetch_failed", id = %id, error = %err);
            TaskStoreError::FetchFailed(err)
        })
    }

    pub async fn count(&self) -> Result<i64, TaskStoreError> {
        let outcome = self
            .engine
            .run_exclusive(|pool| async move {
                let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tasks")
                    .fetch_one(&pool)
                    .await?;
                Ok::<_, StorageError>(count)
            })
            .await;
        flatten(outcome).map_err(TaskStoreError::FetchFailed)
    }

    /// Change one field of an existing task, leaving the others untouched.
    pub async fn update(&self, id: TaskId, update: TaskUpdate) -> Result<(), TaskStoreError> {
        if let TaskUpdate::Title(title) = &update {
            if !is_valid_title(title) {
                return Err(TaskStoreError::InvalidTitle);
            }
        }
        let field = update.column();
        let outcome = self
            .engine
            .run_exclusive(move |pool| async move {
                run_in_tx(&pool, move |tx| {
                    async move {
                        let key = id.to_string();
                        if !task_exists(&mut **tx, &key).await? {
                            return Ok::<_, StorageError>(false);
                        }
                        let sql = format!("UPDATE tasks SET {} = ? WHERE id = ?", update.column());
                        let query = sqlx::query(&sql);
                        let query = match &update {
                            TaskUpdate::Title(title) => query.bind(title.clone()),
                            TaskUpdate::Description(description) => query.bind(description.clone()),
                            TaskUpdate::Date(date) => query.bind(*date),
                            TaskUpdate::Completed(done) => query.bind(*done as i64),
                        };
                        query.bind(key).execute(&mut **tx).await?;
                        Ok(true)
                    }
                    .boxed()
                })
                .await
            })
            .await;

        match flatten(outcome) {
            Ok(true) => {
                info!(target: "tasklist", event = "task_updated", id = %id, field);
                Ok(())
            }
            Ok(false) => {
                warn!(target: "tasklist", event = "task_update_missing", id = %id, field);
                Err(TaskStoreError::NotFound(id))
            }
            Err(err) => {
                error!(target: "tasklist", event = "task_update_failed", id = %id, field, error = %err);
                Err(TaskStoreError::UpdateFailed { id, source: err })
            }
        }
    }

    /// Remove a task. The lookup only checks for the row, it never loads its fields.
    pub async fn delete(&self, id: TaskId) -> Result<(), TaskStoreError> {
        let outcome = self
            .engine
            .run_exclusive(move |pool| async move {
                run_in_tx(&pool, move |tx| {
                    async move {
                        let key = id.to_string();
                        if !task_exists(&mut **tx, &key).await? {
                            return Ok::<_, StorageError>(false);
                        }
                        sqlx::query("DELETE FROM tasks WHERE id = ?")
                            .bind(key)
                            .execute(&mut **tx)
                            .await?;
                        Ok(true)
                    }
                    .boxed()
                })
                .await
            })
            .await;

        match flatten(outcome) {
            Ok(true) => {
                info!(target: "tasklist", event = "task_deleted", id = %id);
                Ok(())
            }
            Ok(false) => {
                warn!(target: "tasklist", event = "task_delete_missing", id = %id);
                Err(TaskStoreError::NotFound(id))
            }
            Err(err) => {
                error!(target: "tasklist", event = "task_delete_failed", id = %id, error = %err);
                Err(TaskStoreError::DeleteFailed { id, source: err })
            }
        }
    }
}
