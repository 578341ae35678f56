use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

const TEMPORARY_PREFIX: &str = "temp-";

/// レコードの識別子。未同期のレコードには `temp-` で始まる一時 ID が振られる。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawRecordId")]
pub struct RecordId(String);

/// リモートが数値 ID を返す場合も受け付ける
#[derive(Deserialize)]
#[serde(untagged)]
enum RawRecordId {
    Text(String),
    Number(i64),
}

impl TryFrom<RawRecordId> for RecordId {
    type Error = String;

    fn try_from(raw: RawRecordId) -> Result<Self, Self::Error> {
        match raw {
            RawRecordId::Text(value) if value.starts_with(TEMPORARY_PREFIX) => {
                Self::parse_temporary(value)
            }
            RawRecordId::Text(value) => Self::new(value),
            RawRecordId::Number(value) => Self::new(value.to_string()),
        }
    }
}

impl RecordId {
    /// リモート採番の ID。一時 ID の接頭辞は受け付けない。
    pub fn new(value: String) -> Result<Self, String> {
        Self::validate(&value)?;
        Ok(Self(value))
    }

    /// 楽観的作成用の一時 ID を生成
    pub fn temporary() -> Self {
        Self(format!("{TEMPORARY_PREFIX}{}", Uuid::new_v4()))
    }

    /// 永続化済みの一時 ID を復元する
    fn parse_temporary(value: String) -> Result<Self, String> {
        let suffix = value.strip_prefix(TEMPORARY_PREFIX).unwrap_or_default();
        Uuid::parse_str(suffix)
            .map_err(|_| format!("Invalid temporary record ID: {value}"))?;
        Ok(Self(value))
    }

    pub fn is_temporary(&self) -> bool {
        self.0.starts_with(TEMPORARY_PREFIX)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate(value: &str) -> Result<(), String> {
        if value.trim().is_empty() {
            return Err("Record ID cannot be empty".to_string());
        }
        if value.starts_with(TEMPORARY_PREFIX) {
            return Err(format!(
                "Record ID must not use the reserved prefix {TEMPORARY_PREFIX}"
            ));
        }
        Ok(())
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<RecordId> for String {
    fn from(value: RecordId) -> Self {
        value.0
    }
}
