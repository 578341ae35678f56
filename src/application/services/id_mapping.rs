use crate::application::ports::{read_json, write_json, KeyValueStore};
use crate::domain::entities::IdMapping;
use crate::domain::value_objects::{CollectionName, RecordId};
use crate::shared::error::AppError;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

pub const ID_MAPPINGS_KEY: &str = "sync:id_mappings";

/// 一時 ID からリモート採番 ID への永続対応表
pub struct IdMappingTable {
    store: Arc<dyn KeyValueStore>,
    entries: Mutex<BTreeMap<String, IdMapping>>,
    /// メモリ上の対応が未永続化
    dirty: AtomicBool,
}

impl IdMappingTable {
    pub async fn open(store: Arc<dyn KeyValueStore>) -> Result<Self, AppError> {
        let entries: BTreeMap<String, IdMapping> = read_json(store.as_ref(), ID_MAPPINGS_KEY)
            .await?
            .unwrap_or_default();

        Ok(Self {
            store,
            entries: Mutex::new(entries),
            dirty: AtomicBool::new(false),
        })
    }

    pub async fn record(
        &self,
        collection: &CollectionName,
        temp_id: &RecordId,
        remote_id: &RecordId,
    ) -> Result<(), AppError> {
        let mut entries = self.entries.lock().await;
        entries.insert(
            temp_id.as_str().to_string(),
            IdMapping {
                temp_id: temp_id.clone(),
                collection: collection.clone(),
                remote_id: remote_id.clone(),
                mapped_at: Utc::now(),
            },
        );

        tracing::debug!(
            target: "sync::queue",
            collection = %collection,
            temp_id = %temp_id,
            remote_id = %remote_id,
            "temporary id mapped"
        );

        // 永続化に失敗しても対応はメモリに残し、次の flush で再保存する
        self.persist(&entries).await
    }

    /// 未永続化の対応があれば保存し直す
    pub async fn flush(&self) -> Result<(), AppError> {
        if !self.dirty.load(Ordering::Acquire) {
            return Ok(());
        }
        let entries = self.entries.lock().await;
        self.persist(&entries).await?;
        tracing::info!(
            target: "sync::queue",
            mappings = entries.len(),
            "persisted id mappings after earlier failure"
        );
        Ok(())
    }

    pub fn needs_flush(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    async fn persist(&self, entries: &BTreeMap<String, IdMapping>) -> Result<(), AppError> {
        let result = if entries.is_empty() {
            self.store.delete(ID_MAPPINGS_KEY).await
        } else {
            write_json(self.store.as_ref(), ID_MAPPINGS_KEY, entries).await
        };
        self.dirty.store(result.is_err(), Ordering::Release);
        result
    }

    /// 一時 ID でなければそのまま返し、未確定の一時 ID なら `None`
    pub async fn resolve(&self, collection: &CollectionName, id: &RecordId) -> Option<RecordId> {
        if !id.is_temporary() {
            return Some(id.clone());
        }

        self.entries
            .lock()
            .await
            .get(id.as_str())
            .filter(|mapping| &mapping.collection == collection)
            .map(|mapping| mapping.remote_id.clone())
    }

    /// 指定時刻より前に確定した対応を取り除く
    pub async fn prune_before(&self, cutoff: DateTime<Utc>) -> Result<usize, AppError> {
        let mut entries = self.entries.lock().await;
        let mut next = entries.clone();
        next.retain(|_, mapping| mapping.mapped_at >= cutoff);
        let pruned = entries.len() - next.len();
        if pruned == 0 {
            return Ok(0);
        }

        self.persist(&next).await?;
        *entries = next;
        Ok(pruned)
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}
