use super::PartitionKey;
use serde::{Deserialize, Serialize};
use std::fmt;

const CACHE_PREFIX: &str = "cache";

/// `cache:{namespace}:{partition}` 形式の永続キー
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn for_partition(namespace: &str, partition: &PartitionKey) -> Self {
        Self(format!("{CACHE_PREFIX}:{namespace}:{}", partition.as_str()))
    }

    pub fn namespace_prefix(namespace: &str) -> String {
        format!("{CACHE_PREFIX}:{namespace}:")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<CacheKey> for String {
    fn from(key: CacheKey) -> Self {
        key.0
    }
}
