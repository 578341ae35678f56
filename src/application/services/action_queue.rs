use crate::application::ports::{read_json, write_json, KeyValueStore};
use crate::domain::entities::{NewAction, QueuedAction};
use crate::domain::value_objects::{ActionId, CollectionName, RecordId};
use crate::shared::error::AppError;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

pub const ACTION_QUEUE_KEY: &str = "sync:action_queue";
const QUEUE_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PersistedQueue {
    version: u32,
    next_sequence: u64,
    actions: Vec<QueuedAction>,
}

impl Default for PersistedQueue {
    fn default() -> Self {
        Self {
            version: QUEUE_FORMAT_VERSION,
            next_sequence: 1,
            actions: Vec::new(),
        }
    }
}

/// 未同期のリモート変更を投入順に保持する永続キュー
pub struct ActionQueue {
    store: Arc<dyn KeyValueStore>,
    key: String,
    state: Mutex<PersistedQueue>,
    pending: AtomicUsize,
}

impl ActionQueue {
    pub async fn open(store: Arc<dyn KeyValueStore>) -> Result<Self, AppError> {
        Self::open_with_key(store, ACTION_QUEUE_KEY.to_string()).await
    }

    /// 既定以外のキーで開く（複数キューを同じストアに置く場合）
    pub async fn open_named(store: Arc<dyn KeyValueStore>, name: &str) -> Result<Self, AppError> {
        Self::open_with_key(store, format!("{ACTION_QUEUE_KEY}:{name}")).await
    }

    async fn open_with_key(store: Arc<dyn KeyValueStore>, key: String) -> Result<Self, AppError> {
        let mut restored: PersistedQueue = read_json(store.as_ref(), &key)
            .await?
            .unwrap_or_default();

        restored.actions.sort_by_key(|action| action.sequence);
        let max_sequence = restored
            .actions
            .iter()
            .map(|action| action.sequence)
            .max()
            .unwrap_or(0);
        restored.next_sequence = restored.next_sequence.max(max_sequence + 1);
        restored.version = QUEUE_FORMAT_VERSION;

        let pending = restored.actions.len();
        if pending > 0 {
            tracing::info!(
                target: "sync::queue",
                key = %key,
                pending,
                "restored pending actions from previous session"
            );
        }

        Ok(Self {
            store,
            key,
            state: Mutex::new(restored),
            pending: AtomicUsize::new(pending),
        })
    }

    /// 末尾に追加し、永続化が完了してから ID を返す
    pub async fn enqueue(&self, draft: NewAction) -> Result<ActionId, AppError> {
        let mut state = self.state.lock().await;

        let action = QueuedAction::from_draft(draft, state.next_sequence, Utc::now());
        let action_id = action.id.clone();
        let kind = action.kind();
        let collection = action.collection.clone();

        let mut next = state.clone();
        next.next_sequence += 1;
        next.actions.push(action);

        self.persist(&next).await?;
        *state = next;
        self.pending.store(state.actions.len(), Ordering::Release);

        tracing::debug!(
            target: "sync::queue",
            action_id = %action_id,
            kind = %kind,
            collection = %collection,
            pending = state.actions.len(),
            "action enqueued"
        );

        Ok(action_id)
    }

    /// 投入順のコピーを返す（キューは変更しない）
    pub async fn drain_snapshot(&self) -> Vec<QueuedAction> {
        self.state.lock().await.actions.clone()
    }

    /// 指定 ID を取り除く。存在しない ID は無視する。
    pub async fn remove(&self, ids: &HashSet<ActionId>) -> Result<usize, AppError> {
        if ids.is_empty() {
            return Ok(0);
        }

        let mut state = self.state.lock().await;
        let removed = state
            .actions
            .iter()
            .filter(|action| ids.contains(&action.id))
            .count();
        if removed == 0 {
            return Ok(0);
        }

        let mut next = state.clone();
        next.actions.retain(|action| !ids.contains(&action.id));

        self.persist(&next).await?;
        *state = next;
        self.pending.store(state.actions.len(), Ordering::Release);

        tracing::debug!(
            target: "sync::queue",
            removed,
            pending = state.actions.len(),
            "actions removed"
        );

        Ok(removed)
    }

    /// 失敗した試行回数とエラー内容を記録する
    pub async fn record_failures(&self, failures: &[(ActionId, String)]) -> Result<(), AppError> {
        if failures.is_empty() {
            return Ok(());
        }

        let messages: HashMap<&ActionId, &String> =
            failures.iter().map(|(id, message)| (id, message)).collect();

        let mut state = self.state.lock().await;
        let mut next = state.clone();
        let mut touched = false;
        for action in next.actions.iter_mut() {
            if let Some(message) = messages.get(&action.id) {
                action.mark_failed((*message).clone());
                touched = true;
            }
        }
        if !touched {
            return Ok(());
        }

        self.persist(&next).await?;
        *state = next;
        Ok(())
    }

    /// 一度も同期されていないレコードを対象とするアクションをすべて破棄する
    pub async fn discard_record(
        &self,
        collection: &CollectionName,
        record_id: &RecordId,
    ) -> Result<usize, AppError> {
        let mut state = self.state.lock().await;
        let discarded = state
            .actions
            .iter()
            .filter(|action| action.targets(collection, record_id))
            .count();
        if discarded == 0 {
            return Ok(0);
        }

        let mut next = state.clone();
        next.actions
            .retain(|action| !action.targets(collection, record_id));

        self.persist(&next).await?;
        *state = next;
        self.pending.store(state.actions.len(), Ordering::Release);

        tracing::debug!(
            target: "sync::queue",
            collection = %collection,
            record_id = %record_id,
            discarded,
            "discarded actions for unsynced record"
        );

        Ok(discarded)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.pending_count() == 0
    }

    async fn persist(&self, queue: &PersistedQueue) -> Result<(), AppError> {
        write_json(self.store.as_ref(), &self.key, queue)
            .await
            .map_err(|err| {
                tracing::error!(
                    target: "sync::queue",
                    key = %self.key,
                    error = %err,
                    "failed to persist action queue"
                );
                match err {
                    AppError::PersistenceFailure(_) => err,
                    other => AppError::PersistenceFailure(other.to_string()),
                }
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::shared::tests::sync::{record, FailingKeyValueStore};
    use crate::domain::value_objects::{ActionKind, PartitionKey};
    use crate::infrastructure::storage::MemoryKeyValueStore;
    use serde_json::json;

    fn collection() -> CollectionName {
        CollectionName::new("food_logs".into()).unwrap()
    }

    fn id(value: &str) -> RecordId {
        RecordId::new(value.into()).unwrap()
    }

    #[tokio::test]
    async fn enqueue_preserves_fifo_order() {
        let queue = ActionQueue::open(Arc::new(MemoryKeyValueStore::new()))
            .await
            .unwrap();
        let temp = RecordId::temporary();

        queue
            .enqueue(NewAction::create(
                collection(),
                Some(temp.clone()),
                Some(PartitionKey::new("2026-10-19".into()).unwrap()),
                record(json!({"name": "Apple", "calories": 95})),
            ))
            .await
            .unwrap();
        queue
            .enqueue(NewAction::update(
                collection(),
                temp.clone(),
                record(json!({"calories": 80})),
            ))
            .await
            .unwrap();
        queue
            .enqueue(NewAction::delete(collection(), id("11")))
            .await
            .unwrap();

        let snapshot = queue.drain_snapshot().await;
        let kinds: Vec<ActionKind> = snapshot.iter().map(QueuedAction::kind).collect();
        assert_eq!(
            kinds,
            vec![ActionKind::Create, ActionKind::Update, ActionKind::Delete]
        );
        assert!(snapshot.windows(2).all(|w| w[0].sequence < w[1].sequence));
        assert_eq!(queue.pending_count(), 3);
    }

    #[tokio::test]
    async fn remove_is_idempotent() {
        let queue = ActionQueue::open(Arc::new(MemoryKeyValueStore::new()))
            .await
            .unwrap();
        let first = queue
            .enqueue(NewAction::delete(collection(), id("1")))
            .await
            .unwrap();
        queue
            .enqueue(NewAction::delete(collection(), id("2")))
            .await
            .unwrap();

        let ids: HashSet<ActionId> = [first].into_iter().collect();
        assert_eq!(queue.remove(&ids).await.unwrap(), 1);
        let after_first = queue.drain_snapshot().await;

        assert_eq!(queue.remove(&ids).await.unwrap(), 0);
        assert_eq!(queue.drain_snapshot().await, after_first);
        assert_eq!(queue.pending_count(), 1);
    }

    #[tokio::test]
    async fn failed_persist_leaves_queue_unchanged() {
        let store = Arc::new(FailingKeyValueStore::new());
        let queue = ActionQueue::open(store.clone()).await.unwrap();
        queue
            .enqueue(NewAction::delete(collection(), id("1")))
            .await
            .unwrap();

        store.fail_writes(true);
        let err = queue
            .enqueue(NewAction::delete(collection(), id("2")))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::PersistenceFailure(_)));
        assert_eq!(queue.drain_snapshot().await.len(), 1);
        assert_eq!(queue.pending_count(), 1);
    }

    #[tokio::test]
    async fn reopen_restores_actions_and_sequence() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryKeyValueStore::new());
        {
            let queue = ActionQueue::open(store.clone()).await.unwrap();
            queue
                .enqueue(NewAction::delete(collection(), id("1")))
                .await
                .unwrap();
            queue
                .enqueue(NewAction::delete(collection(), id("2")))
                .await
                .unwrap();
        }

        let reopened = ActionQueue::open(store).await.unwrap();
        assert_eq!(reopened.pending_count(), 2);
        reopened
            .enqueue(NewAction::delete(collection(), id("3")))
            .await
            .unwrap();

        let sequences: Vec<u64> = reopened
            .drain_snapshot()
            .await
            .iter()
            .map(|action| action.sequence)
            .collect();
        assert_eq!(sequences, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn record_failures_tracks_attempts() {
        let queue = ActionQueue::open(Arc::new(MemoryKeyValueStore::new()))
            .await
            .unwrap();
        let action_id = queue
            .enqueue(NewAction::delete(collection(), id("1")))
            .await
            .unwrap();

        let failures = vec![(action_id.clone(), "Remote unavailable: timeout".to_string())];
        queue.record_failures(&failures).await.unwrap();
        queue.record_failures(&failures).await.unwrap();

        let snapshot = queue.drain_snapshot().await;
        assert_eq!(snapshot[0].attempts, 2);
        assert_eq!(
            snapshot[0].last_error.as_deref(),
            Some("Remote unavailable: timeout")
        );
    }

    #[tokio::test]
    async fn discard_record_drops_every_action_for_temp_id() {
        let queue = ActionQueue::open(Arc::new(MemoryKeyValueStore::new()))
            .await
            .unwrap();
        let temp = RecordId::temporary();
        queue
            .enqueue(NewAction::create(
                collection(),
                Some(temp.clone()),
                None,
                record(json!({"name": "Apple"})),
            ))
            .await
            .unwrap();
        queue
            .enqueue(NewAction::update(
                collection(),
                temp.clone(),
                record(json!({"calories": 95})),
            ))
            .await
            .unwrap();
        queue
            .enqueue(NewAction::delete(collection(), id("9")))
            .await
            .unwrap();

        assert_eq!(queue.discard_record(&collection(), &temp).await.unwrap(), 2);
        let remaining = queue.drain_snapshot().await;
        assert_eq!(remaining.len(), 1);
        assert!(remaining
            .iter()
            .all(|action| !action.targets(&collection(), &temp)));
    }

    #[tokio::test]
    async fn named_queues_are_isolated() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryKeyValueStore::new());
        let default_queue = ActionQueue::open(store.clone()).await.unwrap();
        let named = ActionQueue::open_named(store.clone(), "device-2").await.unwrap();

        named
            .enqueue(NewAction::delete(collection(), id("1")))
            .await
            .unwrap();

        assert!(default_queue.is_empty());
        assert_eq!(named.pending_count(), 1);
        assert!(store
            .get("sync:action_queue:device-2")
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn concurrent_enqueues_are_not_lost() {
        let queue = Arc::new(
            ActionQueue::open(Arc::new(MemoryKeyValueStore::new()))
                .await
                .unwrap(),
        );

        let tasks = (0..16).map(|n| {
            let queue = Arc::clone(&queue);
            async move {
                queue
                    .enqueue(NewAction::delete(collection(), id(&n.to_string())))
                    .await
            }
        });
        let results = futures::future::join_all(tasks).await;

        assert!(results.iter().all(Result::is_ok));
        assert_eq!(queue.pending_count(), 16);
        assert_eq!(queue.drain_snapshot().await.len(), 16);
    }
}
