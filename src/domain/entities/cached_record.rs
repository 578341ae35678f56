use crate::domain::value_objects::RecordId;
use serde::{de::DeserializeOwned, Serialize};

/// エンティティキャッシュに載せられるレコード
pub trait CachedRecord: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    fn record_id(&self) -> &RecordId;

    fn assign_id(&mut self, id: RecordId);
}
