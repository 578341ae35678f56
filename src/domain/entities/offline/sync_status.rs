use super::DrainReport;
use crate::domain::value_objects::ConnectivityState;
use serde::{Deserialize, Serialize};

/// 同期状態インジケーター向けのスナップショット
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SyncStatusSnapshot {
    pub connectivity: ConnectivityState,
    pub is_syncing: bool,
    pub pending_count: usize,
    pub last_report: Option<DrainReport>,
}
