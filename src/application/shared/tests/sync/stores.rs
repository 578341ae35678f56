use crate::application::ports::KeyValueStore;
use crate::infrastructure::storage::MemoryKeyValueStore;
use crate::shared::error::AppError;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// 書き込み失敗を任意に起こせる KV ストア
#[derive(Default)]
pub(crate) struct FailingKeyValueStore {
    inner: MemoryKeyValueStore,
    fail_writes: AtomicBool,
    failing_key: Mutex<Option<String>>,
}

impl FailingKeyValueStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn fail_writes(&self, enabled: bool) {
        self.fail_writes.store(enabled, Ordering::SeqCst);
    }

    /// 指定キーへの書き込みだけを失敗させる
    pub(crate) fn fail_writes_to(&self, key: Option<&str>) {
        *self.failing_key.lock().unwrap() = key.map(str::to_string);
    }

    fn check_writable(&self, key: &str) -> Result<(), AppError> {
        let key_fails = self.failing_key.lock().unwrap().as_deref() == Some(key);
        if key_fails || self.fail_writes.load(Ordering::SeqCst) {
            return Err(AppError::PersistenceFailure("disk full".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for FailingKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>, AppError> {
        self.inner.get(key).await
    }

    async fn put(&self, key: &str, value: String) -> Result<(), AppError> {
        self.check_writable(key)?;
        self.inner.put(key, value).await
    }

    async fn delete(&self, key: &str) -> Result<(), AppError> {
        self.check_writable(key)?;
        self.inner.delete(key).await
    }

    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, AppError> {
        self.inner.keys_with_prefix(prefix).await
    }
}
