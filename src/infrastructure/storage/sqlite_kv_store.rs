use crate::application::ports::KeyValueStore;
use crate::shared::error::AppError;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Sqlite};

/// `kv_store` テーブルを使う永続 KV ストア
#[derive(Clone)]
pub struct SqliteKeyValueStore {
    pool: Pool<Sqlite>,
}

impl SqliteKeyValueStore {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl KeyValueStore for SqliteKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>, AppError> {
        let row: Option<(String,)> = sqlx::query_as("SELECT value FROM kv_store WHERE key = ?1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|(value,)| value))
    }

    async fn put(&self, key: &str, value: String) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO kv_store (key, value, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(Utc::now().timestamp_millis())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), AppError> {
        sqlx::query("DELETE FROM kv_store WHERE key = ?1")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, AppError> {
        // LIKE のワイルドカードを避けるため substr で前方一致させる
        let rows: Vec<(String,)> = sqlx::query_as(
            r#"
            SELECT key FROM kv_store
            WHERE substr(key, 1, length(?1)) = ?1
            ORDER BY key ASC
            "#,
        )
        .bind(prefix)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(key,)| key).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::database::ConnectionPool;

    async fn setup_store() -> SqliteKeyValueStore {
        let pool = ConnectionPool::from_memory().await.unwrap();
        pool.migrate().await.unwrap();
        SqliteKeyValueStore::new(pool.get_pool().clone())
    }

    #[tokio::test]
    async fn test_put_overwrites_existing_value() {
        let store = setup_store().await;

        store.put("sync:action_queue", "[1]".into()).await.unwrap();
        store.put("sync:action_queue", "[1,2]".into()).await.unwrap();

        assert_eq!(
            store.get("sync:action_queue").await.unwrap().as_deref(),
            Some("[1,2]")
        );
    }

    #[tokio::test]
    async fn test_missing_key_returns_none() {
        let store = setup_store().await;
        assert!(store.get("cache:food_logs:2026-10-19").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_keys_with_prefix_ignores_like_wildcards() {
        let store = setup_store().await;
        store.put("cache:food_logs:a", "[]".into()).await.unwrap();
        store.put("cache:food%logs:b", "[]".into()).await.unwrap();
        store.put("cache:meal_plans:c", "[]".into()).await.unwrap();

        let keys = store.keys_with_prefix("cache:food_logs:").await.unwrap();
        assert_eq!(keys, vec!["cache:food_logs:a".to_string()]);

        store.delete("cache:food_logs:a").await.unwrap();
        assert!(store
            .keys_with_prefix("cache:food_logs:")
            .await
            .unwrap()
            .is_empty());
    }
}
