use crate::domain::value_objects::{CollectionName, RecordId, RecordPayload};
use crate::shared::error::AppError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// リモートが返すレコードで行 ID を保持するフィールド
pub const REMOTE_ID_FIELD: &str = "id";

/// リモート読み込み時の条件（等価条件の AND）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemoteFilter {
    pub equals: Vec<(String, Value)>,
}

impl RemoteFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.equals.push((field.into(), value.into()));
        self
    }

    pub fn matches(&self, record: &Value) -> bool {
        self.equals
            .iter()
            .all(|(field, expected)| record.get(field) == Some(expected))
    }
}

/// テーブル名と行 ID で操作する汎用レコードストア。
///
/// 接続できない場合は `AppError::RemoteUnavailable`、
/// 明示的に拒否された場合は `AppError::RemoteRejected` を返すこと。
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// 挿入し、リモートが採番した ID を含むレコードを返す
    async fn insert(&self, collection: &CollectionName, record: RecordPayload)
        -> Result<Value, AppError>;

    async fn update(
        &self,
        collection: &CollectionName,
        id: &RecordId,
        fields: RecordPayload,
    ) -> Result<(), AppError>;

    async fn delete(&self, collection: &CollectionName, id: &RecordId) -> Result<(), AppError>;

    async fn read(
        &self,
        collection: &CollectionName,
        filter: &RemoteFilter,
    ) -> Result<Vec<Value>, AppError>;
}
