use crate::application::ports::{
    read_json, write_json, KeyValueStore, RemoteFilter, RemoteStore, REMOTE_ID_FIELD,
};
use crate::application::services::action_queue::ActionQueue;
use crate::application::services::connectivity_monitor::ConnectivityMonitor;
use crate::application::services::context::SyncContext;
use crate::application::services::id_mapping::IdMappingTable;
use crate::application::services::sync_coordinator::CreateReconciler;
use crate::domain::entities::{CacheEntry, CachedRecord, NewAction, QueuedAction};
use crate::domain::value_objects::{
    ActionPayload, CacheKey, CollectionName, PartitionKey, RecordId, RecordPayload,
};
use crate::shared::error::AppError;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::marker::PhantomData;
use std::sync::Arc;
use tokio::sync::Mutex;

/// アダプタが扱うエンティティの定義
#[derive(Debug, Clone)]
pub struct EntityDescriptor {
    pub collection: CollectionName,
    /// `cache:{namespace}:{partition}` の namespace 部分
    pub cache_namespace: String,
    /// リモート読み込み時にパーティション値で絞り込むフィールド
    pub partition_field: String,
}

impl EntityDescriptor {
    pub fn new(collection: &str, partition_field: &str) -> Result<Self, AppError> {
        let collection =
            CollectionName::new(collection.to_string()).map_err(AppError::ValidationError)?;
        Ok(Self {
            cache_namespace: collection.as_str().to_string(),
            collection,
            partition_field: partition_field.to_string(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteStatus {
    /// リモートで確定済み
    Confirmed,
    /// キューに積まれ、次回の同期を待っている
    PendingSync,
    /// 未同期レコードの削除など、リモートに送る必要がなかった
    LocalOnly,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Written<T> {
    pub record: T,
    pub status: WriteStatus,
}

/// 接続状態を意識させずに読み書きできるエンティティ単位のキャッシュ
pub struct EntityCacheAdapter<T: CachedRecord> {
    descriptor: EntityDescriptor,
    store: Arc<dyn KeyValueStore>,
    remote: Arc<dyn RemoteStore>,
    monitor: Arc<ConnectivityMonitor>,
    queue: Arc<ActionQueue>,
    id_map: Arc<IdMappingTable>,
    write_gate: Mutex<()>,
    _record: PhantomData<fn() -> T>,
}

impl<T: CachedRecord> EntityCacheAdapter<T> {
    pub fn new(context: &SyncContext, descriptor: EntityDescriptor) -> Self {
        Self {
            descriptor,
            store: Arc::clone(&context.store),
            remote: Arc::clone(&context.remote),
            monitor: Arc::clone(&context.monitor),
            queue: Arc::clone(&context.queue),
            id_map: Arc::clone(&context.id_map),
            write_gate: Mutex::new(()),
            _record: PhantomData,
        }
    }

    pub fn descriptor(&self) -> &EntityDescriptor {
        &self.descriptor
    }

    pub fn collection(&self) -> &CollectionName {
        &self.descriptor.collection
    }

    /// オンラインならリモートから読み込んでキャッシュを置き換え、
    /// オフラインならキャッシュを返す（未取得なら `NoCachedData`）。
    pub async fn get(&self, partition: &PartitionKey) -> Result<Vec<T>, AppError> {
        if self.monitor.current() {
            match self.read_remote(partition).await {
                Ok(records) => return self.refresh(partition, records).await,
                Err(err) => {
                    tracing::warn!(
                        target: "sync::cache",
                        collection = %self.descriptor.collection,
                        partition = %partition,
                        error = %err,
                        "remote read failed; falling back to cache"
                    );
                    return match self.load_entry(partition).await? {
                        Some(entry) => Ok(entry.data),
                        None => Err(err),
                    };
                }
            }
        }

        match self.load_entry(partition).await? {
            Some(entry) => Ok(entry.data),
            None => Err(AppError::NoCachedData(format!(
                "{} / {}",
                self.descriptor.collection, partition
            ))),
        }
    }

    /// ネットワークに触れずにキャッシュだけを参照する
    pub async fn cached(&self, partition: &PartitionKey) -> Result<Option<Vec<T>>, AppError> {
        Ok(self.load_entry(partition).await?.map(|entry| entry.data))
    }

    pub async fn invalidate(&self, partition: &PartitionKey) -> Result<(), AppError> {
        let _gate = self.write_gate.lock().await;
        self.store.delete(self.cache_key(partition).as_str()).await
    }

    pub async fn create(
        &self,
        partition: &PartitionKey,
        mut record: T,
    ) -> Result<Written<T>, AppError> {
        let temp_id = RecordId::temporary();
        record.assign_id(temp_id.clone());
        let payload = Self::to_payload(&record)?;

        let optimistic = record.clone();
        self.mutate(partition, move |entry| {
            entry.data.push(optimistic);
            Ok(())
        })
        .await?;

        if self.monitor.current() {
            match self
                .remote
                .insert(
                    &self.descriptor.collection,
                    payload.without_field(REMOTE_ID_FIELD),
                )
                .await
            {
                Ok(created) => {
                    let confirmed = Self::from_remote(created)?;
                    let replacement = confirmed.clone();
                    self.mutate(partition, |entry| {
                        replace_record(&mut entry.data, &temp_id, replacement, true);
                        Ok(())
                    })
                    .await?;
                    return Ok(Written {
                        record: confirmed,
                        status: WriteStatus::Confirmed,
                    });
                }
                Err(err) if err.is_transient() => {
                    tracing::info!(
                        target: "sync::cache",
                        collection = %self.descriptor.collection,
                        error = %err,
                        "remote unavailable during create; queueing"
                    );
                }
                Err(err) => return Err(err),
            }
        }

        let action = NewAction::create(
            self.descriptor.collection.clone(),
            Some(temp_id.clone()),
            Some(partition.clone()),
            payload,
        );
        if let Err(err) = self.queue.enqueue(action).await {
            self.rollback_insert(partition, &temp_id).await;
            return Err(err);
        }

        Ok(Written {
            record,
            status: WriteStatus::PendingSync,
        })
    }

    /// 部分フィールドを楽観的にマージし、リモートへ反映する
    pub async fn update(
        &self,
        partition: &PartitionKey,
        id: &RecordId,
        fields: RecordPayload,
    ) -> Result<WriteStatus, AppError> {
        let fields = fields.without_field(REMOTE_ID_FIELD);
        let target = self
            .id_map
            .resolve(&self.descriptor.collection, id)
            .await
            .unwrap_or_else(|| id.clone());

        let patch = fields.clone();
        let previous = self
            .mutate(partition, |entry| {
                let Some(slot) = entry
                    .data
                    .iter_mut()
                    .find(|record| record.record_id() == id || record.record_id() == &target)
                else {
                    return Ok(None);
                };
                let merged = merge_record(slot, &patch)?;
                Ok(Some(std::mem::replace(slot, merged)))
            })
            .await?;

        if self.monitor.current() && !target.is_temporary() {
            match self
                .remote
                .update(&self.descriptor.collection, &target, fields.clone())
                .await
            {
                Ok(()) => return Ok(WriteStatus::Confirmed),
                Err(err) if err.is_transient() => {
                    tracing::info!(
                        target: "sync::cache",
                        collection = %self.descriptor.collection,
                        error = %err,
                        "remote unavailable during update; queueing"
                    );
                }
                Err(err) => {
                    self.rollback_update(partition, previous).await;
                    return Err(err);
                }
            }
        }

        let action = NewAction::update(self.descriptor.collection.clone(), target, fields);
        if let Err(err) = self.queue.enqueue(action).await {
            self.rollback_update(partition, previous).await;
            return Err(err);
        }

        Ok(WriteStatus::PendingSync)
    }

    /// 楽観的に削除する。未同期の一時レコードはキューから取り消すだけでリモートには送らない。
    pub async fn delete(
        &self,
        partition: &PartitionKey,
        id: &RecordId,
    ) -> Result<WriteStatus, AppError> {
        let resolved = self.id_map.resolve(&self.descriptor.collection, id).await;

        let removed = self
            .mutate(partition, |entry| {
                let (removed, kept): (Vec<T>, Vec<T>) =
                    entry.data.drain(..).partition(|record| {
                        record.record_id() == id || Some(record.record_id()) == resolved.as_ref()
                    });
                entry.data = kept;
                Ok(removed)
            })
            .await?;

        let Some(target) = resolved else {
            if let Err(err) = self
                .queue
                .discard_record(&self.descriptor.collection, id)
                .await
            {
                self.rollback_delete(partition, removed).await;
                return Err(err);
            }
            tracing::debug!(
                target: "sync::cache",
                collection = %self.descriptor.collection,
                record_id = %id,
                "deleted unsynced record locally"
            );
            return Ok(WriteStatus::LocalOnly);
        };

        if self.monitor.current() {
            match self
                .remote
                .delete(&self.descriptor.collection, &target)
                .await
            {
                Ok(()) => return Ok(WriteStatus::Confirmed),
                Err(err) if err.is_transient() => {
                    tracing::info!(
                        target: "sync::cache",
                        collection = %self.descriptor.collection,
                        error = %err,
                        "remote unavailable during delete; queueing"
                    );
                }
                Err(err) => {
                    self.rollback_delete(partition, removed).await;
                    return Err(err);
                }
            }
        }

        let action = NewAction::delete(self.descriptor.collection.clone(), target);
        if let Err(err) = self.queue.enqueue(action).await {
            self.rollback_delete(partition, removed).await;
            return Err(err);
        }

        Ok(WriteStatus::PendingSync)
    }

    /// キャッシュ済みのパーティション一覧
    pub async fn partitions(&self) -> Result<Vec<PartitionKey>, AppError> {
        let prefix = CacheKey::namespace_prefix(&self.descriptor.cache_namespace);
        let keys = self.store.keys_with_prefix(&prefix).await?;
        Ok(keys
            .iter()
            .filter_map(|key| key.strip_prefix(&prefix))
            .filter_map(|raw| PartitionKey::new(raw.to_string()).ok())
            .collect())
    }

    async fn read_remote(&self, partition: &PartitionKey) -> Result<Vec<T>, AppError> {
        let filter =
            RemoteFilter::new().eq(self.descriptor.partition_field.clone(), partition.as_str());
        let rows = self
            .remote
            .read(&self.descriptor.collection, &filter)
            .await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            match Self::from_remote(row) {
                Ok(record) => records.push(record),
                Err(err) => tracing::warn!(
                    target: "sync::cache",
                    collection = %self.descriptor.collection,
                    error = %err,
                    "skipping malformed remote record"
                ),
            }
        }
        Ok(records)
    }

    /// リモートのスナップショットで置き換え、未同期のアクションを上から重ねる
    async fn refresh(
        &self,
        partition: &PartitionKey,
        remote_records: Vec<T>,
    ) -> Result<Vec<T>, AppError> {
        let pending: Vec<QueuedAction> = self
            .queue
            .drain_snapshot()
            .await
            .into_iter()
            .filter(|action| action.collection == self.descriptor.collection)
            .collect();

        let _gate = self.write_gate.lock().await;
        let previous = self.load_entry(partition).await?;

        let mut data = remote_records;
        for action in &pending {
            match &action.payload {
                ActionPayload::Create {
                    temp_id: Some(temp_id),
                    partition: Some(target),
                    record,
                } if target == partition => {
                    if data.iter().any(|item| item.record_id() == temp_id) {
                        continue;
                    }
                    let optimistic = previous
                        .as_ref()
                        .and_then(|entry| {
                            entry
                                .data
                                .iter()
                                .find(|item| item.record_id() == temp_id)
                                .cloned()
                        })
                        .map(Ok)
                        .unwrap_or_else(|| Self::from_payload(record, temp_id))?;
                    data.push(optimistic);
                }
                ActionPayload::Update { id, fields } => {
                    if let Some(slot) = data.iter_mut().find(|item| item.record_id() == id) {
                        *slot = merge_record(slot, fields)?;
                    }
                }
                ActionPayload::Delete { id } => {
                    data.retain(|item| item.record_id() != id);
                }
                ActionPayload::Create { .. } => {}
            }
        }

        let entry = CacheEntry::from_remote(data);
        self.save_entry(partition, &entry).await?;

        tracing::debug!(
            target: "sync::cache",
            collection = %self.descriptor.collection,
            partition = %partition,
            records = entry.data.len(),
            pending = pending.len(),
            "cache refreshed from remote"
        );
        Ok(entry.data)
    }

    /// キャッシュの read-modify-write。`apply` が失敗した場合は書き込まない。
    async fn mutate<R, F>(&self, partition: &PartitionKey, apply: F) -> Result<R, AppError>
    where
        F: FnOnce(&mut CacheEntry<T>) -> Result<R, AppError> + Send,
        R: Send,
    {
        let _gate = self.write_gate.lock().await;
        let mut entry = self
            .load_entry(partition)
            .await?
            .unwrap_or_else(CacheEntry::empty);
        let result = apply(&mut entry)?;
        entry.touch();
        self.save_entry(partition, &entry).await?;
        Ok(result)
    }

    async fn load_entry(&self, partition: &PartitionKey) -> Result<Option<CacheEntry<T>>, AppError> {
        let key = self.cache_key(partition);
        match read_json::<CacheEntry<T>>(self.store.as_ref(), key.as_str()).await {
            Ok(entry) => Ok(entry),
            Err(AppError::DeserializationError(message)) => {
                tracing::warn!(
                    target: "sync::cache",
                    key = %key,
                    error = %message,
                    "discarding unreadable cache entry"
                );
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    async fn save_entry(
        &self,
        partition: &PartitionKey,
        entry: &CacheEntry<T>,
    ) -> Result<(), AppError> {
        write_json(self.store.as_ref(), self.cache_key(partition).as_str(), entry).await
    }

    fn cache_key(&self, partition: &PartitionKey) -> CacheKey {
        CacheKey::for_partition(&self.descriptor.cache_namespace, partition)
    }

    async fn rollback_insert(&self, partition: &PartitionKey, temp_id: &RecordId) {
        let result = self
            .mutate(partition, |entry| {
                entry.data.retain(|record| record.record_id() != temp_id);
                Ok(())
            })
            .await;
        self.warn_rollback(result);
    }

    async fn rollback_update(&self, partition: &PartitionKey, previous: Option<T>) {
        let Some(previous) = previous else {
            return;
        };
        let result = self
            .mutate(partition, |entry| {
                if let Some(slot) = entry
                    .data
                    .iter_mut()
                    .find(|record| record.record_id() == previous.record_id())
                {
                    *slot = previous;
                }
                Ok(())
            })
            .await;
        self.warn_rollback(result);
    }

    async fn rollback_delete(&self, partition: &PartitionKey, removed: Vec<T>) {
        if removed.is_empty() {
            return;
        }
        let result = self
            .mutate(partition, |entry| {
                for record in removed {
                    if !entry
                        .data
                        .iter()
                        .any(|item| item.record_id() == record.record_id())
                    {
                        entry.data.push(record);
                    }
                }
                Ok(())
            })
            .await;
        self.warn_rollback(result);
    }

    fn warn_rollback(&self, result: Result<(), AppError>) {
        if let Err(err) = result {
            tracing::warn!(
                target: "sync::cache",
                collection = %self.descriptor.collection,
                error = %err,
                "failed to roll back optimistic change"
            );
        }
    }

    fn to_payload(record: &T) -> Result<RecordPayload, AppError> {
        let value = serde_json::to_value(record)
            .map_err(|err| AppError::SerializationError(err.to_string()))?;
        RecordPayload::new(value).map_err(AppError::ValidationError)
    }

    fn from_remote(value: Value) -> Result<T, AppError> {
        serde_json::from_value(value).map_err(|err| AppError::DeserializationError(err.to_string()))
    }

    fn from_payload(record: &RecordPayload, id: &RecordId) -> Result<T, AppError> {
        let mut record: T = Self::from_remote(record.as_json().clone())?;
        record.assign_id(id.clone());
        Ok(record)
    }
}

#[async_trait]
impl<T: CachedRecord> CreateReconciler for EntityCacheAdapter<T> {
    async fn reconcile_created(
        &self,
        partition: Option<&PartitionKey>,
        temp_id: &RecordId,
        created: &Value,
    ) -> Result<(), AppError> {
        let confirmed = Self::from_remote(created.clone())?;
        let partitions = match partition {
            Some(partition) => vec![partition.clone()],
            None => self.partitions().await?,
        };

        for partition in &partitions {
            let _gate = self.write_gate.lock().await;
            let Some(mut entry) = self.load_entry(partition).await? else {
                continue;
            };
            if replace_record(&mut entry.data, temp_id, confirmed.clone(), false) {
                entry.touch();
                self.save_entry(partition, &entry).await?;
                tracing::debug!(
                    target: "sync::cache",
                    collection = %self.descriptor.collection,
                    partition = %partition,
                    temp_id = %temp_id,
                    remote_id = %confirmed.record_id(),
                    "temporary record replaced with remote record"
                );
            }
        }
        Ok(())
    }
}

/// 一時 ID のレコードを確定レコードで置き換える。置き換えたら `true`。
fn replace_record<T: CachedRecord>(
    data: &mut Vec<T>,
    temp_id: &RecordId,
    confirmed: T,
    push_if_missing: bool,
) -> bool {
    let temp_position = data.iter().position(|item| item.record_id() == temp_id);
    let existing = data
        .iter()
        .position(|item| item.record_id() == confirmed.record_id());

    match (temp_position, existing) {
        (Some(temp), Some(existing)) => {
            data[existing] = confirmed;
            data.remove(temp);
            true
        }
        (Some(temp), None) => {
            data[temp] = confirmed;
            true
        }
        (None, Some(existing)) => {
            data[existing] = confirmed;
            push_if_missing
        }
        (None, None) if push_if_missing => {
            data.push(confirmed);
            true
        }
        (None, None) => false,
    }
}

fn merge_record<T: CachedRecord>(record: &T, fields: &RecordPayload) -> Result<T, AppError> {
    let value = serde_json::to_value(record)
        .map_err(|err| AppError::SerializationError(err.to_string()))?;
    let mut payload = RecordPayload::new(value).map_err(AppError::ValidationError)?;
    payload.merge(&fields.without_field(REMOTE_ID_FIELD));

    let mut merged: T = serde_json::from_value(payload.into_inner())
        .map_err(|err| AppError::ValidationError(format!("Invalid field update: {err}")))?;
    merged.assign_id(record.record_id().clone());
    Ok(merged)
}
