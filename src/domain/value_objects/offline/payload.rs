use super::{ActionKind, PartitionKey, RecordId};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// JSON オブジェクトであることが保証されたレコード本体（または部分フィールド）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(try_from = "Value", into = "Value")]
pub struct RecordPayload(Value);

impl RecordPayload {
    pub fn new(value: Value) -> Result<Self, String> {
        Self::validate(&value)?;
        Ok(Self(value))
    }

    pub fn from_json_str(json: &str) -> Result<Self, String> {
        let value: Value =
            serde_json::from_str(json).map_err(|e| format!("Invalid JSON payload: {e}"))?;
        Self::new(value)
    }

    pub fn as_json(&self) -> &Value {
        &self.0
    }

    pub fn into_inner(self) -> Value {
        self.0
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields().get(field)
    }

    /// 指定フィールドを取り除いたコピーを返す
    pub fn without_field(&self, field: &str) -> Self {
        let mut map = self.fields().clone();
        map.remove(field);
        Self(Value::Object(map))
    }

    /// 部分フィールドを上書きマージする（null は削除ではなく null として保持）
    pub fn merge(&mut self, patch: &RecordPayload) {
        if let Value::Object(target) = &mut self.0 {
            for (key, value) in patch.fields() {
                target.insert(key.clone(), value.clone());
            }
        }
    }

    fn fields(&self) -> &Map<String, Value> {
        static EMPTY: std::sync::OnceLock<Map<String, Value>> = std::sync::OnceLock::new();
        // new() / TryFrom で検証済みなので常に Object
        self.0
            .as_object()
            .unwrap_or_else(|| EMPTY.get_or_init(Map::new))
    }

    fn validate(value: &Value) -> Result<(), String> {
        if !value.is_object() {
            return Err("Record payload must be a JSON object".to_string());
        }
        Ok(())
    }
}

impl TryFrom<Value> for RecordPayload {
    type Error = String;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<RecordPayload> for Value {
    fn from(payload: RecordPayload) -> Self {
        payload.0
    }
}

/// 種類ごとのアクション内容
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActionPayload {
    /// 完全なレコード。アダプタ経由の場合は一時 ID と書き込み先パーティションを伴う。
    Create {
        temp_id: Option<RecordId>,
        partition: Option<PartitionKey>,
        record: RecordPayload,
    },
    Update {
        id: RecordId,
        fields: RecordPayload,
    },
    Delete {
        id: RecordId,
    },
}

impl ActionPayload {
    pub fn kind(&self) -> ActionKind {
        match self {
            ActionPayload::Create { .. } => ActionKind::Create,
            ActionPayload::Update { .. } => ActionKind::Update,
            ActionPayload::Delete { .. } => ActionKind::Delete,
        }
    }

    /// アクションが対象とするレコード ID（作成の場合は一時 ID）
    pub fn target_id(&self) -> Option<&RecordId> {
        match self {
            ActionPayload::Create { temp_id, .. } => temp_id.as_ref(),
            ActionPayload::Update { id, .. } | ActionPayload::Delete { id } => Some(id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn record_payload_must_be_object() {
        assert!(RecordPayload::new(json!([1, 2])).is_err());
        assert!(RecordPayload::new(Value::Null).is_err());
        assert!(RecordPayload::from_json_str(r#"{"name":"Apple"}"#).is_ok());
        assert!(serde_json::from_str::<RecordPayload>("42").is_err());
    }

    #[test]
    fn merge_overwrites_only_given_fields() {
        let mut record =
            RecordPayload::new(json!({"name": "Apple", "calories": 95, "meal": "snack"})).unwrap();
        let patch = RecordPayload::new(json!({"calories": 80})).unwrap();

        record.merge(&patch);

        assert_eq!(
            record.as_json(),
            &json!({"name": "Apple", "calories": 80, "meal": "snack"})
        );
    }

    #[test]
    fn payload_serializes_with_kind_tag() {
        let payload = ActionPayload::Delete {
            id: RecordId::new("7".into()).unwrap(),
        };
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value, json!({"kind": "delete", "id": "7"}));
        assert_eq!(payload.kind(), ActionKind::Delete);
    }
}
