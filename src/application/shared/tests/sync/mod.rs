mod fixtures;
mod remote;
mod stores;

pub(crate) use fixtures::{collection, offline_context, online_context, partition, record};
pub(crate) use remote::{InMemoryRemoteStore, RemoteCall};
pub(crate) use stores::FailingKeyValueStore;
