use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::Context;
use serde_json::{Map, Value};
use tracing::{info, warn};

pub const HAS_SEEDED_KEY: &str = "hasSeeded";

trait SettingsStore: Send + Sync {
    fn get(&self, key: &str) -> Option<Value>;
    /// Store `value` under `key`. Readers only see it once it is durable.
    fn put(&self, key: &str, value: Value) -> anyhow::Result<()>;
}

/// Settings kept as one JSON object on disk, rewritten atomically on save.
struct JsonFileStore {
    path: PathBuf,
    data: Mutex<Map<String, Value>>,
}

impl JsonFileStore {
    fn open(path: &Path) -> anyhow::Result<Self> {
        let data = match fs::read_to_string(path) {
            Ok(raw) => match serde_json::from_str::<Value>(&raw) {
                Ok(Value::Object(map)) => map,
                Ok(_) | Err(_) => {
                    warn!(
                        target: "tasklist",
                        event = "settings_unreadable",
                        path = %path.display()
                    );
                    Map::new()
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Map::new(),
            Err(err) => {
                return Err(err).with_context(|| format!("read settings {}", path.display()))
            }
        };
        Ok(Self {
            path: path.to_path_buf(),
            data: Mutex::new(data),
        })
    }
}

impl SettingsStore for JsonFileStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.data
            .lock()
            .map(|guard| guard.get(key).cloned())
            .unwrap_or_default()
    }

    fn put(&self, key: &str, value: Value) -> anyhow::Result<()> {
        let mut guard = self.data.lock().unwrap_or_else(|e| e.into_inner());
        let mut next = guard.clone();
        next.insert(key.to_string(), value);
        self.write(&next)?;
        *guard = next;
        Ok(())
    }
}

impl JsonFileStore {
    fn write(&self, snapshot: &Map<String, Value>) -> anyhow::Result<()> {
        let bytes = serde_json::to_vec_pretty(snapshot)?;
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir)
            .with_context(|| format!("create temp settings in {}", dir.display()))?;
        tmp.write_all(&bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path)
            .map_err(|e| e.error)
            .with_context(|| format!("persist settings {}", self.path.display()))?;
        Ok(())
    }
}

#[derive(Default)]
struct MemoryStore {
    data: Mutex<HashMap<String, Value>>,
}

impl SettingsStore for MemoryStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.data
            .lock()
            .map(|guard| guard.get(key).cloned())
            .unwrap_or_default()
    }

    fn put(&self, key: &str, value: Value) -> anyhow::Result<()> {
        self.data
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_string(), value);
        Ok(())
    }
}

/// Handle to the process-wide persisted settings.
#[derive(Clone)]
pub struct StoreHandle {
    inner: Arc<dyn SettingsStore>,
}

impl StoreHandle {
    pub fn json_file(path: &Path) -> anyhow::Result<Self> {
        Ok(Self {
            inner: Arc::new(JsonFileStore::open(path)?),
        })
    }

    pub fn in_memory() -> Self {
        Self {
            inner: Arc::new(MemoryStore::default()),
        }
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.inner.get(key).and_then(|value| value.as_bool())
    }

    /// Write and persist `key` in one step.
    pub fn put_bool(&self, key: &str, value: bool) -> anyhow::Result<()> {
        self.inner
            .put(key, Value::Bool(value))
            .with_context(|| format!("persist setting {key}"))
    }
}

/// The "already seeded" flag: `false` until the first successful seed,
/// `true` forever after.
#[derive(Clone)]
pub struct SeedFlag {
    store: StoreHandle,
}

impl SeedFlag {
    pub fn new(store: StoreHandle) -> Self {
        Self { store }
    }

    pub fn is_set(&self) -> bool {
        self.store.get_bool(HAS_SEEDED_KEY).unwrap_or(false)
    }

    pub fn mark_seeded(&self) -> anyhow::Result<()> {
        self.store.put_bool(HAS_SEEDED_KEY, true)?;
        info!(target: "tasklist", event = "seed_flag_set");
        Ok(())
    }
}
