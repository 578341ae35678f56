use crate::application::ports::{KeyValueStore, RemoteStore};
use crate::application::services::action_queue::ActionQueue;
use crate::application::services::connectivity_monitor::ConnectivityMonitor;
use crate::application::services::id_mapping::IdMappingTable;
use crate::shared::error::AppError;
use std::sync::Arc;

/// 同期層のコンポーネントが共有する依存関係
#[derive(Clone)]
pub struct SyncContext {
    pub store: Arc<dyn KeyValueStore>,
    pub remote: Arc<dyn RemoteStore>,
    pub monitor: Arc<ConnectivityMonitor>,
    pub queue: Arc<ActionQueue>,
    pub id_map: Arc<IdMappingTable>,
}

impl SyncContext {
    /// ストアから永続化済みのキューと ID 対応表を復元して組み立てる
    pub async fn open(
        store: Arc<dyn KeyValueStore>,
        remote: Arc<dyn RemoteStore>,
        monitor: Arc<ConnectivityMonitor>,
    ) -> Result<Self, AppError> {
        let queue = Arc::new(ActionQueue::open(Arc::clone(&store)).await?);
        let id_map = Arc::new(IdMappingTable::open(Arc::clone(&store)).await?);

        Ok(Self {
            store,
            remote,
            monitor,
            queue,
            id_map,
        })
    }
}
