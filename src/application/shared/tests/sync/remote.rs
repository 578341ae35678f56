use crate::application::ports::{RemoteFilter, RemoteStore, REMOTE_ID_FIELD};
use crate::domain::value_objects::{CollectionName, RecordId, RecordPayload};
use crate::shared::error::AppError;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum RemoteCall {
    Insert { collection: String, record: Value },
    Update { collection: String, id: String, fields: Value },
    Delete { collection: String, id: String },
    Read { collection: String },
}

#[derive(Default)]
struct RemoteState {
    rows: HashMap<String, Vec<Value>>,
    next_id: u64,
    calls: Vec<RemoteCall>,
    unavailable: bool,
    rejected_ids: HashSet<String>,
    rejected_inserts: HashSet<String>,
    insert_gate: Option<watch::Receiver<bool>>,
}

/// `release` されるまで insert を保留させる
pub(crate) struct InsertGate {
    tx: watch::Sender<bool>,
}

impl InsertGate {
    pub(crate) fn release(&self) {
        self.tx.send_replace(true);
    }
}

/// 呼び出しを記録するインメモリのリモートストア
#[derive(Clone, Default)]
pub(crate) struct InMemoryRemoteStore {
    state: Arc<Mutex<RemoteState>>,
}

impl InMemoryRemoteStore {
    pub(crate) fn new() -> Self {
        let store = Self::default();
        store.state.lock().unwrap().next_id = 1000;
        store
    }

    pub(crate) fn seed(&self, collection: &str, row: Value) {
        self.state
            .lock()
            .unwrap()
            .rows
            .entry(collection.to_string())
            .or_default()
            .push(row);
    }

    pub(crate) fn rows(&self, collection: &str) -> Vec<Value> {
        self.state
            .lock()
            .unwrap()
            .rows
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }

    pub(crate) fn calls(&self) -> Vec<RemoteCall> {
        self.state.lock().unwrap().calls.clone()
    }

    pub(crate) fn set_unavailable(&self, unavailable: bool) {
        self.state.lock().unwrap().unavailable = unavailable;
    }

    pub(crate) fn reject_id(&self, id: &str) {
        self.state.lock().unwrap().rejected_ids.insert(id.to_string());
    }

    pub(crate) fn reject_collection_inserts(&self, collection: &str) {
        self.state
            .lock()
            .unwrap()
            .rejected_inserts
            .insert(collection.to_string());
    }

    pub(crate) fn hold_inserts(&self) -> InsertGate {
        let (tx, rx) = watch::channel(false);
        self.state.lock().unwrap().insert_gate = Some(rx);
        InsertGate { tx }
    }

    pub(crate) async fn wait_for_calls(&self, count: usize) {
        for _ in 0..400 {
            if self.state.lock().unwrap().calls.len() >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("remote store never received {count} calls");
    }

    fn log(&self, call: RemoteCall) -> Result<(), AppError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(call);
        if state.unavailable {
            return Err(AppError::RemoteUnavailable("connection refused".to_string()));
        }
        Ok(())
    }
}

fn row_id(row: &Value) -> Option<String> {
    match row.get(REMOTE_ID_FIELD)? {
        Value::String(id) => Some(id.clone()),
        Value::Number(id) => Some(id.to_string()),
        _ => None,
    }
}

#[async_trait]
impl RemoteStore for InMemoryRemoteStore {
    async fn insert(
        &self,
        collection: &CollectionName,
        record: RecordPayload,
    ) -> Result<Value, AppError> {
        self.log(RemoteCall::Insert {
            collection: collection.to_string(),
            record: record.as_json().clone(),
        })?;

        let gate = self.state.lock().unwrap().insert_gate.clone();
        if let Some(mut gate) = gate {
            let _ = gate.wait_for(|released| *released).await;
        }

        let mut state = self.state.lock().unwrap();
        if state.rejected_inserts.contains(collection.as_str()) {
            return Err(AppError::RemoteRejected(format!(
                "insert into {collection} violates a constraint"
            )));
        }

        state.next_id += 1;
        let mut row = record.into_inner();
        if let Value::Object(map) = &mut row {
            map.insert(
                REMOTE_ID_FIELD.to_string(),
                Value::String(state.next_id.to_string()),
            );
        }
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
        self.log(RemoteCall::Update {
            collection: collection.to_string(),
            id: id.to_string(),
            fields: fields.as_json().clone(),
        })?;

        let mut state = self.state.lock().unwrap();
        if state.rejected_ids.contains(id.as_str()) {
            return Err(AppError::RemoteRejected(format!("update of {id} rejected")));
        }
        let row = state
            .rows
            .get_mut(collection.as_str())
            .and_then(|rows| {
                rows.iter_mut()
                    .find(|row| row_id(row).as_deref() == Some(id.as_str()))
            })
            .ok_or_else(|| AppError::RemoteRejected(format!("row {id} not found")))?;
        if let (Value::Object(target), Value::Object(patch)) = (row, fields.into_inner()) {
            target.extend(patch);
        }
        Ok(())
    }

    async fn delete(&self, collection: &CollectionName, id: &RecordId) -> Result<(), AppError> {
        self.log(RemoteCall::Delete {
            collection: collection.to_string(),
            id: id.to_string(),
        })?;

        let mut state = self.state.lock().unwrap();
        if state.rejected_ids.contains(id.as_str()) {
            return Err(AppError::RemoteRejected(format!("delete of {id} rejected")));
        }
        if let Some(rows) = state.rows.get_mut(collection.as_str()) {
            rows.retain(|row| row_id(row).as_deref() != Some(id.as_str()));
        }
        Ok(())
    }

    async fn read(
        &self,
        collection: &CollectionName,
        filter: &RemoteFilter,
    ) -> Result<Vec<Value>, AppError> {
        self.log(RemoteCall::Read {
            collection: collection.to_string(),
        })?;

        let state = self.state.lock().unwrap();
        Ok(state
            .rows
            .get(collection.as_str())
            .map(|rows| {
                rows.iter()
                    .filter(|row| filter.matches(row))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}
