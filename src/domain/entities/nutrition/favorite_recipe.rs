use crate::domain::entities::CachedRecord;
use crate::domain::value_objects::RecordId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FavoriteRecipe {
    pub id: RecordId,
    pub user_id: String,
    pub recipe_id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calories_per_serving: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_at: Option<DateTime<Utc>>,
}

impl FavoriteRecipe {
    pub fn new(
        user_id: impl Into<String>,
        recipe_id: impl Into<String>,
        title: impl Into<String>,
    ) -> Self {
        Self {
            id: RecordId::temporary(),
            user_id: user_id.into(),
            recipe_id: recipe_id.into(),
            title: title.into(),
            calories_per_serving: None,
            saved_at: Some(Utc::now()),
        }
    }
}

impl CachedRecord for FavoriteRecipe {
    fn record_id(&self) -> &RecordId {
        &self.id
    }

    fn assign_id(&mut self, id: RecordId) {
        self.id = id;
    }
}
