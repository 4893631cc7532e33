use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};

use crate::autosave::DEFAULT_QUIET_PERIOD;
use crate::remote::{DEFAULT_FETCH_TIMEOUT, DEFAULT_SEED_URL};

pub const ENV_DATA_DIR: &str = "TASKLIST_DATA_DIR";
pub const ENV_SEED_URL: &str = "TASKLIST_SEED_URL";
pub const ENV_FETCH_TIMEOUT_SECS: &str = "TASKLIST_FETCH_TIMEOUT_SECS";
pub const ENV_AUTOSAVE_MS: &str = "TASKLIST_AUTOSAVE_MS";
pub const ENV_LOG: &str = "TASKLIST_LOG";

pub const DEFAULT_LOG_FILTER: &str = "tasklist=info,sqlx=warn";

const DB_FILE: &str = "tasklist.sqlite3";
const SETTINGS_FILE: &str = "settings.json";
const LOGS_DIR: &str = "logs";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub seed_url: String,
    pub fetch_timeout: Duration,
    pub autosave_quiet: Duration,
    pub log_filter: String,
}

impl AppConfig {
    /// Defaults rooted at `data_dir`.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            seed_url: DEFAULT_SEED_URL.to_string(),
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            autosave_quiet: DEFAULT_QUIET_PERIOD,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }

    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve from an arbitrary variable source. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let data_dir = match get(ENV_DATA_DIR) {
            Some(dir) => PathBuf::from(dir),
            None => default_data_dir()?,
        };
        let mut config = Self::with_data_dir(data_dir);

        if let Some(url) = get(ENV_SEED_URL) {
            config.seed_url = url;
        }
        if let Some(raw) = get(ENV_FETCH_TIMEOUT_SECS) {
            let secs: u64 = raw
                .trim()
                .parse()
                .with_context(|| format!("{ENV_FETCH_TIMEOUT_SECS} must be whole seconds, got {raw:?}"))?;
            if secs == 0 {
                return Err(anyhow!("{ENV_FETCH_TIMEOUT_SECS} must be greater than zero"));
            }
            config.fetch_timeout = Duration::from_secs(secs);
        }
        if let Some(raw) = get(ENV_AUTOSAVE_MS) {
            let ms: u64 = raw
                .trim()
                .parse()
                .with_context(|| format!("{ENV_AUTOSAVE_MS} must be milliseconds, got {raw:?}"))?;
            config.autosave_quiet = Duration::from_millis(ms);
        }
        if let Some(filter) = get(ENV_LOG) {
            config.log_filter = filter;
        }
        Ok(config)
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join(DB_FILE)
    }

    pub fn settings_path(&self) -> PathBuf {
        self.data_dir.join(SETTINGS_FILE)
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.data_dir.join(LOGS_DIR)
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }
}

fn default_data_dir() -> Result<PathBuf> {
    dirs::data_dir()
        .map(|dir| dir.join("tasklist"))
        .ok_or_else(|| anyhow!("no platform data directory; set {ENV_DATA_DIR}"))
}
