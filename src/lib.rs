//! Local task list with first-launch seeding from a remote to-do feed.

pub mod autosave;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod migrate;
pub mod model;
pub mod remote;
pub mod seed;
pub mod service;
pub mod settings;
pub mod state;
pub mod tasks;
pub mod time;
mod util;

pub use error::{AppError, AppResult};
pub use model::{NewTask, Task, TaskId, TaskUpdate};
pub use service::TaskService;
pub use state::AppState;

/// Stderr JSON logging driven by `TASKLIST_LOG`.
pub fn init_logging() {
    let directives = std::env::var(config::ENV_LOG)
        .unwrap_or_else(|_| config::DEFAULT_LOG_FILTER.to_string());
    logging::init_stderr(&directives);
}
