#![allow(dead_code)]

pub mod mocks;

use chrono::NaiveDate;
use coach_sync::application::ports::StaticProbe;
use coach_sync::infrastructure::storage::MemoryKeyValueStore;
use coach_sync::{AppConfig, SyncRuntime};
use std::sync::Arc;
use std::time::Duration;

pub use mocks::MockRemoteStore;

pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.storage.database_url = "sqlite::memory:".to_string();
    config
}

pub async fn memory_runtime(online: bool, remote: Arc<MockRemoteStore>) -> SyncRuntime {
    SyncRuntime::with_store(
        test_config(),
        Arc::new(MemoryKeyValueStore::new()),
        remote,
        &StaticProbe(Some(online)),
        None,
    )
    .await
    .expect("sync runtime")
}

pub fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, d).expect("valid date")
}

/// 条件が満たされるまで最大 2 秒待つ
pub async fn wait_until<F>(condition: F) -> bool
where
    F: Fn() -> bool,
{
    for _ in 0..400 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}
