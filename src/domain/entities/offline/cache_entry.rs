use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// パーティション単位のキャッシュ。TTL は持たず、オンラインで読み込めたら置き換える。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CacheEntry<T> {
    pub data: Vec<T>,
    /// 最後にリモートから読み込めた時刻
    pub refreshed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl<T> CacheEntry<T> {
    pub fn empty() -> Self {
        Self {
            data: Vec::new(),
            refreshed_at: None,
            updated_at: Utc::now(),
        }
    }

    pub fn from_remote(data: Vec<T>) -> Self {
        let now = Utc::now();
        Self {
            data,
            refreshed_at: Some(now),
            updated_at: now,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
