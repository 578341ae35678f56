pub mod connectivity_probe;
pub mod kv_store;
pub mod remote_store;

pub use connectivity_probe::{ConnectivityProbe, StaticProbe};
pub use kv_store::{read_json, write_json, KeyValueStore};
pub use remote_store::{RemoteFilter, RemoteStore, REMOTE_ID_FIELD};
