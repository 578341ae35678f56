pub mod connectivity;
pub mod offline;

pub use connectivity::{ConnectionQuality, ConnectivityState, TransportSignal};
pub use offline::{
    ActionId, ActionKind, ActionPayload, CacheKey, CollectionName, PartitionKey, RecordId,
    RecordPayload,
};
