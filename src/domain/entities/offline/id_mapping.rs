use crate::domain::value_objects::{CollectionName, RecordId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 一時 ID とリモート採番 ID の対応
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IdMapping {
    pub temp_id: RecordId,
    pub collection: CollectionName,
    pub remote_id: RecordId,
    pub mapped_at: DateTime<Utc>,
}
