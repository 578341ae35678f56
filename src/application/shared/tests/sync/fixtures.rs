use super::InMemoryRemoteStore;
use crate::application::ports::StaticProbe;
use crate::application::services::{ConnectivityMonitor, SyncContext};
use crate::domain::value_objects::{CollectionName, PartitionKey, RecordPayload};
use crate::infrastructure::storage::MemoryKeyValueStore;
use crate::shared::config::ConnectivityConfig;
use serde_json::Value;
use std::sync::Arc;

pub(crate) fn collection(name: &str) -> CollectionName {
    CollectionName::new(name.to_string()).expect("valid collection name")
}

pub(crate) fn partition(value: &str) -> PartitionKey {
    PartitionKey::new(value.to_string()).expect("valid partition key")
}

pub(crate) fn record(value: Value) -> RecordPayload {
    RecordPayload::new(value).expect("record payload must be an object")
}

async fn context(remote: Arc<InMemoryRemoteStore>, online: bool) -> SyncContext {
    let monitor = Arc::new(ConnectivityMonitor::new(
        &StaticProbe(Some(online)),
        ConnectivityConfig::default(),
    ));
    SyncContext::open(Arc::new(MemoryKeyValueStore::new()), remote, monitor)
        .await
        .expect("open sync context")
}

pub(crate) async fn online_context(remote: Arc<InMemoryRemoteStore>) -> SyncContext {
    context(remote, true).await
}

pub(crate) async fn offline_context(remote: Arc<InMemoryRemoteStore>) -> SyncContext {
    context(remote, false).await
}
