use crate::shared::error::AppError;
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};

/// 再起動後も残る文字列キーの永続ストア
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, AppError>;

    /// 値を原子的に置き換える。戻った時点で永続化が完了していること。
    async fn put(&self, key: &str, value: String) -> Result<(), AppError>;

    async fn delete(&self, key: &str) -> Result<(), AppError>;

    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, AppError>;
}

/// JSON としてデシリアライズして読み出す
pub async fn read_json<T>(store: &dyn KeyValueStore, key: &str) -> Result<Option<T>, AppError>
where
    T: DeserializeOwned,
{
    match store.get(key).await? {
        Some(raw) => serde_json::from_str(&raw)
            .map(Some)
            .map_err(|err| AppError::DeserializationError(format!("{key}: {err}"))),
        None => Ok(None),
    }
}

/// JSON にシリアライズして書き込む
pub async fn write_json<T>(store: &dyn KeyValueStore, key: &str, value: &T) -> Result<(), AppError>
where
    T: Serialize + Sync,
{
    let raw = serde_json::to_string(value)
        .map_err(|err| AppError::SerializationError(format!("{key}: {err}")))?;
    store.put(key, raw).await
}
