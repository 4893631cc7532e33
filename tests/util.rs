#![allow(clippy::unwrap_used, clippy::expect_used, dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use sqlx::SqlitePool;

use tasklist_lib::db::{open_memory_pool, Engine};
use tasklist_lib::migrate::apply_migrations;
use tasklist_lib::remote::{FetchError, RemoteSource};
use tasklist_lib::tasks::TaskStore;

pub async fn temp_pool() -> SqlitePool {
    let pool = open_memory_pool().await.expect("open in-memory sqlite");
    apply_migrations(&pool).await.expect("apply migrations");
    pool
}

pub async fn temp_store() -> TaskStore {
    TaskStore::new(Engine::start(temp_pool().await))
}

pub fn page_json(titles: &[(&str, bool)]) -> String {
    let todos: Vec<serde_json::Value> = titles
        .iter()
        .enumerate()
        .map(|(i, (todo, completed))| {
            serde_json::json!({
                "id": i + 1,
                "todo": todo,
                "completed": completed,
                "userId": 7,
            })
        })
        .collect();
    serde_json::json!({
        "todos": todos,
        "total": titles.len(),
        "skip": 0,
        "limit": titles.len(),
    })
    .to_string()
}

/// Replays scripted fetch outcomes and counts how often it was asked.
pub struct ScriptedSource {
    replies: Mutex<Vec<Result<Vec<u8>, FetchError>>>,
    calls: AtomicUsize,
}

impl ScriptedSource {
    /// Replies are handed out in order; the last one repeats.
    pub fn new(replies: Vec<Result<Vec<u8>, FetchError>>) -> Arc<Self> {
        let mut replies = replies;
        replies.reverse();
        Arc::new(Self {
            replies: Mutex::new(replies),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn ok(body: &str) -> Arc<Self> {
        Self::new(vec![Ok(body.as_bytes().to_vec())])
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

fn replay(reply: &Result<Vec<u8>, FetchError>) -> Result<Vec<u8>, FetchError> {
    match reply {
        Ok(body) => Ok(body.clone()),
        Err(FetchError::TransportSpecific(code)) => Err(FetchError::TransportSpecific(*code)),
        Err(FetchError::Server(status)) => Err(FetchError::Server(*status)),
        Err(FetchError::NoData) => Err(FetchError::NoData),
        Err(_) => Err(FetchError::Unknown),
    }
}

#[async_trait]
impl RemoteSource for ScriptedSource {
    async fn fetch(&self) -> Result<Vec<u8>, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        // Give concurrent callers a chance to pile up behind the seed gate.
        tokio::task::yield_now().await;
        let mut replies = self.replies.lock().unwrap();
        if replies.len() > 1 {
            replies.pop().unwrap()
        } else {
            replay(replies.last().unwrap())
        }
    }

    fn describe(&self) -> String {
        "scripted".into()
    }
}
