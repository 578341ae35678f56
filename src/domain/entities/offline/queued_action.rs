use crate::domain::value_objects::{
    ActionId, ActionKind, ActionPayload, CollectionName, PartitionKey, RecordId, RecordPayload,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// キューへ投入する前のアクション。ID と投入時刻はキュー側で採番する。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewAction {
    pub collection: CollectionName,
    pub payload: ActionPayload,
}

impl NewAction {
    pub fn new(collection: CollectionName, payload: ActionPayload) -> Self {
        Self {
            collection,
            payload,
        }
    }

    pub fn create(
        collection: CollectionName,
        temp_id: Option<RecordId>,
        partition: Option<PartitionKey>,
        record: RecordPayload,
    ) -> Self {
        Self::new(
            collection,
            ActionPayload::Create {
                temp_id,
                partition,
                record,
            },
        )
    }

    pub fn update(collection: CollectionName, id: RecordId, fields: RecordPayload) -> Self {
        Self::new(collection, ActionPayload::Update { id, fields })
    }

    pub fn delete(collection: CollectionName, id: RecordId) -> Self {
        Self::new(collection, ActionPayload::Delete { id })
    }
}

/// 永続化された未同期アクション
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueuedAction {
    pub id: ActionId,
    pub collection: CollectionName,
    pub payload: ActionPayload,
    pub enqueued_at: DateTime<Utc>,
    /// セッションをまたいで単調増加する投入順序
    pub sequence: u64,
    #[serde(default)]
    pub attempts: u32,
    #[serde(default)]
    pub last_error: Option<String>,
}

impl QueuedAction {
    pub fn from_draft(draft: NewAction, sequence: u64, enqueued_at: DateTime<Utc>) -> Self {
        Self {
            id: ActionId::generate(),
            collection: draft.collection,
            payload: draft.payload,
            enqueued_at,
            sequence,
            attempts: 0,
            last_error: None,
        }
    }

    pub fn kind(&self) -> ActionKind {
        self.payload.kind()
    }

    pub fn targets(&self, collection: &CollectionName, record_id: &RecordId) -> bool {
        &self.collection == collection && self.payload.target_id() == Some(record_id)
    }

    pub fn mark_failed(&mut self, message: String) {
        self.attempts = self.attempts.saturating_add(1);
        self.last_error = Some(message);
    }
}
