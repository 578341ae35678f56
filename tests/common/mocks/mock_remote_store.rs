use async_trait::async_trait;
use coach_sync::application::ports::{RemoteFilter, RemoteStore, REMOTE_ID_FIELD};
use coach_sync::domain::value_objects::{CollectionName, RecordId, RecordPayload};
use coach_sync::AppError;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::watch;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedCall {
    Insert(String),
    Update(String, String),
    Delete(String, String),
    Read(String),
}

#[derive(Default)]
struct State {
    rows: HashMap<String, Vec<Value>>,
    next_id: u64,
    calls: Vec<RecordedCall>,
    unavailable: bool,
    insert_gate: Option<watch::Receiver<bool>>,
}

/// テーブル名ごとに行を保持するリモートストアのモック
#[derive(Default)]
pub struct MockRemoteStore {
    state: Mutex<State>,
}

impl MockRemoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rows(&self, collection: &str) -> Vec<Value> {
        self.state
            .lock()
            .unwrap()
            .rows
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn mutation_calls(&self) -> Vec<RecordedCall> {
        self.calls()
            .into_iter()
            .filter(|call| !matches!(call, RecordedCall::Read(_)))
            .collect()
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.state.lock().unwrap().unavailable = unavailable;
    }

    /// 返した Sender に `true` を送るまで insert を止める
    pub fn hold_inserts(&self) -> watch::Sender<bool> {
        let (tx, rx) = watch::channel(false);
        self.state.lock().unwrap().insert_gate = Some(rx);
        tx
    }

    fn record(&self, call: RecordedCall) -> Result<(), AppError> {
        let mut state = self.state.lock().unwrap();
        if state.unavailable {
            return Err(AppError::RemoteUnavailable("network unreachable".into()));
        }
        state.calls.push(call);
        Ok(())
    }
}

fn id_of(row: &Value) -> Option<String> {
    match row.get(REMOTE_ID_FIELD)? {
        Value::String(id) => Some(id.clone()),
        Value::Number(id) => Some(id.to_string()),
        _ => None,
    }
}

#[async_trait]
impl RemoteStore for MockRemoteStore {
    async fn insert(
        &self,
        collection: &CollectionName,
        record: RecordPayload,
    ) -> Result<Value, AppError> {
        self.record(RecordedCall::Insert(collection.to_string()))?;

        let gate = self.state.lock().unwrap().insert_gate.clone();
        if let Some(mut gate) = gate {
            let _ = gate.wait_for(|open| *open).await;
        }

        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let mut row = record.into_inner();
        row[REMOTE_ID_FIELD] = Value::from(state.next_id);
        state
            .rows
            .entry(collection.to_string())
            .or_default()
            .push(row.clone());
        Ok(row)
    }

    async fn update(
        &self,
        collection: &CollectionName,
        id: &RecordId,
        fields: RecordPayload,
    ) -> Result<(), AppError> {
        self.record(RecordedCall::Update(collection.to_string(), id.to_string()))?;

        let mut state = self.state.lock().unwrap();
        let row = state
            .rows
            .get_mut(collection.as_str())
            .and_then(|rows| {
                rows.iter_mut()
                    .find(|row| id_of(row).as_deref() == Some(id.as_str()))
            })
            .ok_or_else(|| AppError::RemoteRejected(format!("no row {id}")))?;
        if let (Some(target), Value::Object(patch)) = (row.as_object_mut(), fields.into_inner()) {
            target.extend(patch);
        }
        Ok(())
    }

    async fn delete(&self, collection: &CollectionName, id: &RecordId) -> Result<(), AppError> {
        self.record(RecordedCall::Delete(collection.to_string(), id.to_string()))?;

        let mut state = self.state.lock().unwrap();
        if let Some(rows) = state.rows.get_mut(collection.as_str()) {
            rows.retain(|row| id_of(row).as_deref() != Some(id.as_str()));
        }
        Ok(())
    }

    async fn read(
        &self,
        collection: &CollectionName,
        filter: &RemoteFilter,
    ) -> Result<Vec<Value>, AppError> {
        self.record(RecordedCall::Read(collection.to_string()))?;

        Ok(self
            .state
            .lock()
            .unwrap()
            .rows
            .get(collection.as_str())
            .map(|rows| rows.iter().filter(|row| filter.matches(row)).cloned().collect())
            .unwrap_or_default())
    }
}
