use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::time::{now_ms, to_date};

/// Stable identifier of a task. Generated locally for every task, including
/// seeded ones; remote ids are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
#[serde(transparent)]
pub struct TaskId(Uuid);

impl TaskId {
    /// Generate a new time-ordered identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for TaskId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// A to-do item as handed to and returned from the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Creation/reference time in epoch milliseconds. Default sort key, newest first.
    pub date: i64,
    #[serde(alias = "isCompleted")]
    pub is_completed: bool,
}

impl Task {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: TaskId::new(),
            title: title.into(),
            description: None,
            date: now_ms(),
            is_completed: false,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_date(mut self, date: i64) -> Self {
        self.date = date;
        self
    }

    pub fn completed(mut self, is_completed: bool) -> Self {
        self.is_completed = is_completed;
        self
    }

    pub fn has_valid_title(&self) -> bool {
        is_valid_title(&self.title)
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mark = if self.is_completed { "x" } else { " " };
        write!(
            f,
            "[{mark}] {} {} ({})",
            self.id,
            self.title,
            to_date(self.date).format("%Y-%m-%d %H:%M")
        )
    }
}

/// Fields a collaborator supplies when creating a task. Missing id and date
/// are generated at creation time.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewTask {
    #[serde(default)]
    pub id: Option<TaskId>,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub date: Option<i64>,
    #[serde(default, alias = "isCompleted")]
    pub is_completed: bool,
}

impl NewTask {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn into_task(self) -> Task {
        Task {
            id: self.id.unwrap_or_default(),
            title: self.title,
            description: self.description,
            date: self.date.unwrap_or_else(now_ms),
            is_completed: self.is_completed,
        }
    }
}

/// A targeted change to exactly one mutable field.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "field", content = "value", rename_all = "snake_case")]
pub enum TaskUpdate {
    Title(String),
    Description(Option<String>),
    Date(i64),
    Completed(bool),
}

impl TaskUpdate {
    /// Column written by this update.
    pub fn column(&self) -> &'static str {
        match self {
            TaskUpdate::Title(_) => "title",
            TaskUpdate::Description(_) => "description",
            TaskUpdate::Date(_) => "date",
            TaskUpdate::Completed(_) => "is_completed",
        }
    }
}

pub fn is_valid_title(title: &str) -> bool {
    !title.trim().is_empty()
}
