use crate::application::ports::{ConnectivityProbe, KeyValueStore, RemoteStore};
use crate::application::services::{
    ConnectivityMonitor, FavoriteRecipeCache, FoodLogCache, MealPlanCache, SyncContext,
    SyncCoordinator, SyncEventSink,
};
use crate::domain::entities::{DrainOutcome, SyncStatusSnapshot};
use crate::infrastructure::database::ConnectionPool;
use crate::infrastructure::storage::SqliteKeyValueStore;
use crate::shared::config::AppConfig;
use crate::shared::error::AppError;
use crate::shared::metrics::DrainMetricsSnapshot;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::task::JoinHandle;

/// 同期層全体の状態を保持する
pub struct SyncRuntime {
    pub config: AppConfig,
    pub context: SyncContext,
    pub coordinator: Arc<SyncCoordinator>,
    pub food_logs: Arc<FoodLogCache>,
    pub meal_plans: Arc<MealPlanCache>,
    pub favorite_recipes: Arc<FavoriteRecipeCache>,
    pool: Option<ConnectionPool>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl SyncRuntime {
    /// 設定の SQLite データベースを開いて組み立てる
    pub async fn from_config(
        config: AppConfig,
        remote: Arc<dyn RemoteStore>,
        probe: &dyn ConnectivityProbe,
        event_sink: Option<Arc<dyn SyncEventSink>>,
    ) -> anyhow::Result<Self> {
        config.validate().map_err(AppError::ConfigurationError)?;
        ensure_database_dir(&config.storage.database_url)?;

        let pool =
            ConnectionPool::new(&config.storage.database_url, config.storage.max_connections)
                .await?;
        pool.migrate().await?;

        let store: Arc<dyn KeyValueStore> =
            Arc::new(SqliteKeyValueStore::new(pool.get_pool().clone()));
        let mut runtime = Self::with_store(config, store, remote, probe, event_sink).await?;
        runtime.pool = Some(pool);
        Ok(runtime)
    }

    pub async fn with_store(
        config: AppConfig,
        store: Arc<dyn KeyValueStore>,
        remote: Arc<dyn RemoteStore>,
        probe: &dyn ConnectivityProbe,
        event_sink: Option<Arc<dyn SyncEventSink>>,
    ) -> anyhow::Result<Self> {
        let monitor = Arc::new(ConnectivityMonitor::new(
            probe,
            config.connectivity.clone(),
        ));
        let context = SyncContext::open(store, remote, monitor).await?;

        let mut coordinator = SyncCoordinator::new(&context, config.sync.clone());
        if let Some(sink) = event_sink {
            coordinator = coordinator.with_event_sink(sink);
        }
        let coordinator = Arc::new(coordinator);

        let food_logs = Arc::new(FoodLogCache::food_logs(&context)?);
        let meal_plans = Arc::new(MealPlanCache::meal_plans(&context)?);
        let favorite_recipes = Arc::new(FavoriteRecipeCache::favorite_recipes(&context)?);

        coordinator.register_reconciler(food_logs.collection().clone(), food_logs.clone());
        coordinator.register_reconciler(meal_plans.collection().clone(), meal_plans.clone());
        coordinator.register_reconciler(
            favorite_recipes.collection().clone(),
            favorite_recipes.clone(),
        );

        tracing::info!(
            target: "sync::runtime",
            online = context.monitor.current(),
            pending = context.queue.pending_count(),
            auto_sync = config.sync.auto_sync,
            "sync runtime initialized"
        );

        Ok(Self {
            config,
            context,
            coordinator,
            food_logs,
            meal_plans,
            favorite_recipes,
            pool: None,
            listener: Mutex::new(None),
        })
    }

    /// 再接続監視を開始する。既に開始済みなら何もしない。
    pub fn start(&self) {
        let mut listener = self.listener.lock().unwrap_or_else(PoisonError::into_inner);
        if listener.is_some() {
            return;
        }
        *listener = Some(self.coordinator.start());
    }

    pub fn connectivity(&self) -> &Arc<ConnectivityMonitor> {
        &self.context.monitor
    }

    pub fn pending_count(&self) -> usize {
        self.coordinator.pending_count()
    }

    pub fn is_syncing(&self) -> bool {
        self.coordinator.is_syncing()
    }

    pub async fn sync_now(&self) -> Result<DrainOutcome, AppError> {
        self.coordinator.sync_now().await
    }

    pub fn status(&self) -> SyncStatusSnapshot {
        self.coordinator.status()
    }

    pub fn metrics(&self) -> DrainMetricsSnapshot {
        self.coordinator.metrics()
    }

    pub async fn shutdown(&self) {
        self.stop_listener();
        if let Some(pool) = &self.pool {
            pool.close().await;
        }
        tracing::info!(target: "sync::runtime", "sync runtime stopped");
    }

    fn stop_listener(&self) {
        if let Some(handle) = self
            .listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            handle.abort();
        }
    }
}

impl Drop for SyncRuntime {
    fn drop(&mut self) {
        self.stop_listener();
    }
}

/// ファイル DB の場合は親ディレクトリを作成する
fn ensure_database_dir(database_url: &str) -> anyhow::Result<()> {
    let Some(rest) = database_url.strip_prefix("sqlite:") else {
        return Ok(());
    };
    let path = rest.trim_start_matches("//");
    let path = path.split('?').next().unwrap_or_default();
    if path.is_empty() || path.starts_with(":memory:") {
        return Ok(());
    }

    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}
