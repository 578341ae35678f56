use crate::domain::entities::CachedRecord;
use crate::domain::value_objects::RecordId;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MealType {
    Breakfast,
    Lunch,
    Dinner,
    Snack,
}

/// 1 日分の食事記録の 1 行
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoodLog {
    pub id: RecordId,
    pub log_date: NaiveDate,
    pub name: String,
    pub calories: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meal_type: Option<MealType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protein_g: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub carbs_g: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fat_g: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logged_at: Option<DateTime<Utc>>,
}

impl FoodLog {
    pub fn new(log_date: NaiveDate, name: impl Into<String>, calories: u32) -> Self {
        Self {
            id: RecordId::temporary(),
            log_date,
            name: name.into(),
            calories,
            meal_type: None,
            protein_g: None,
            carbs_g: None,
            fat_g: None,
            logged_at: Some(Utc::now()),
        }
    }

    pub fn with_meal_type(mut self, meal_type: MealType) -> Self {
        self.meal_type = Some(meal_type);
        self
    }
}

impl CachedRecord for FoodLog {
    fn record_id(&self) -> &RecordId {
        &self.id
    }

    fn assign_id(&mut self, id: RecordId) {
        self.id = id;
    }
}
