use sqlx::SqlitePool;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Context;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::info;

use crate::autosave::{AutosaveFailure, Autosaver};
use crate::config::AppConfig;
use crate::db::{open_sqlite_pool, Engine};
use crate::migrate::apply_migrations;
use crate::remote::{HttpFetchClient, RemoteSource};
use crate::seed::SeedCoordinator;
use crate::service::TaskService;
use crate::settings::{SeedFlag, StoreHandle};
use crate::tasks::TaskStore;

/// Everything a presentation layer needs, built once per process.
#[derive(Clone)]
pub struct AppState {
    pub engine: Engine,
    pub store: TaskStore,
    pub settings: StoreHandle,
    pub seeder: Arc<SeedCoordinator>,
    pub service: TaskService,
    pub autosave: Arc<Autosaver>,
    autosave_failures: Arc<Mutex<Option<UnboundedReceiver<AutosaveFailure>>>>,
}

impl AppState {
    /// Open the on-disk store under `config.data_dir` and wire the services.
    pub async fn open(config: &AppConfig) -> anyhow::Result<Self> {
        let db_path = config.db_path();
        let pool = open_sqlite_pool(&db_path)
            .await
            .with_context(|| format!("open database {}", db_path.display()))?;
        apply_migrations(&pool).await.context("apply migrations")?;

        let settings_path = config.settings_path();
        let settings = StoreHandle::json_file(&settings_path)
            .with_context(|| format!("open settings {}", settings_path.display()))?;

        let source = HttpFetchClient::new(config.seed_url.clone(), config.fetch_timeout)
            .context("build fetch client")?;

        info!(
            target: "tasklist",
            event = "state_opened",
            db = %db_path.display(),
            seed_url = %config.seed_url
        );
        Ok(Self::assemble(pool, settings, Arc::new(source), config.autosave_quiet))
    }

    /// Wire services around an already-migrated pool.
    pub fn assemble(
        pool: SqlitePool,
        settings: StoreHandle,
        source: Arc<dyn RemoteSource>,
        autosave_quiet: Duration,
    ) -> Self {
        let engine = Engine::start(pool);
        let store = TaskStore::new(engine.clone());
        let seeder = Arc::new(SeedCoordinator::new(
            store.clone(),
            SeedFlag::new(settings.clone()),
            source,
        ));
        let service = TaskService::new(store.clone(), seeder.clone());
        let (autosave, failures) = Autosaver::new(store.clone(), autosave_quiet);

        Self {
            engine,
            store,
            settings,
            seeder,
            service,
            autosave: Arc::new(autosave),
            autosave_failures: Arc::new(Mutex::new(Some(failures))),
        }
    }

    /// The autosave failure feed. Only the first caller receives it.
    pub fn take_autosave_failures(&self) -> Option<UnboundedReceiver<AutosaveFailure>> {
        self.autosave_failures
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
    }

    /// Commit pending edits, then stop the storage worker.
    pub async fn shutdown(&self) {
        self.autosave.flush_all().await;
        self.engine.shutdown().await;
        info!(target: "tasklist", event = "state_closed");
    }
}
