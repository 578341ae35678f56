pub mod cache_entry;
pub mod drain_report;
pub mod id_mapping;
pub mod queued_action;
pub mod sync_status;

pub use cache_entry::CacheEntry;
pub use drain_report::{DrainOutcome, DrainReport, DrainTrigger};
pub use id_mapping::IdMapping;
pub use queued_action::{NewAction, QueuedAction};
pub use sync_status::SyncStatusSnapshot;
