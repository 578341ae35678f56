pub mod action_id;
pub mod action_kind;
pub mod cache_key;
pub mod collection_name;
pub mod partition_key;
pub mod payload;
pub mod record_id;

pub use action_id::ActionId;
pub use action_kind::ActionKind;
pub use cache_key::CacheKey;
pub use collection_name::CollectionName;
pub use partition_key::PartitionKey;
pub use payload::{ActionPayload, RecordPayload};
pub use record_id::RecordId;
