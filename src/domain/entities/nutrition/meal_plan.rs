use super::MealType;
use crate::domain::entities::CachedRecord;
use crate::domain::value_objects::RecordId;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedMeal {
    /// 開始日からの経過日数
    pub day_offset: u8,
    pub meal_type: MealType,
    pub recipe_id: String,
    pub servings: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MealPlan {
    pub id: RecordId,
    pub user_id: String,
    pub title: String,
    pub starts_on: NaiveDate,
    #[serde(default)]
    pub meals: Vec<PlannedMeal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl MealPlan {
    pub fn new(user_id: impl Into<String>, title: impl Into<String>, starts_on: NaiveDate) -> Self {
        Self {
            id: RecordId::temporary(),
            user_id: user_id.into(),
            title: title.into(),
            starts_on,
            meals: Vec::new(),
            notes: None,
        }
    }
}

impl CachedRecord for MealPlan {
    fn record_id(&self) -> &RecordId {
        &self.id
    }

    fn assign_id(&mut self, id: RecordId) {
        self.id = id;
    }
}
