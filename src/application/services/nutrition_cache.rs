use crate::application::services::context::SyncContext;
use crate::application::services::entity_cache::{
    EntityCacheAdapter, EntityDescriptor, WriteStatus, Written,
};
use crate::domain::entities::{FavoriteRecipe, FoodLog, MealPlan};
use crate::domain::value_objects::{PartitionKey, RecordId};
use crate::shared::error::AppError;
use chrono::NaiveDate;

pub const FOOD_LOGS: &str = "food_logs";
pub const MEAL_PLANS: &str = "meal_plans";
pub const FAVORITE_RECIPES: &str = "favorite_recipes";

/// 日付ごとの食事記録
pub type FoodLogCache = EntityCacheAdapter<FoodLog>;
/// ユーザーごとの食事プラン
pub type MealPlanCache = EntityCacheAdapter<MealPlan>;
/// ユーザーごとのお気に入りレシピ
pub type FavoriteRecipeCache = EntityCacheAdapter<FavoriteRecipe>;

fn user_partition(user_id: &str) -> Result<PartitionKey, AppError> {
    PartitionKey::new(user_id.to_string()).map_err(AppError::ValidationError)
}

impl EntityCacheAdapter<FoodLog> {
    pub fn food_logs(context: &SyncContext) -> Result<Self, AppError> {
        Ok(Self::new(
            context,
            EntityDescriptor::new(FOOD_LOGS, "log_date")?,
        ))
    }

    pub fn day_partition(date: NaiveDate) -> Result<PartitionKey, AppError> {
        PartitionKey::new(date.format("%Y-%m-%d").to_string()).map_err(AppError::ValidationError)
    }

    pub async fn get_day(&self, date: NaiveDate) -> Result<Vec<FoodLog>, AppError> {
        self.get(&Self::day_partition(date)?).await
    }

    /// `log_date` の日付パーティションへ記録する
    pub async fn log_food(&self, log: FoodLog) -> Result<Written<FoodLog>, AppError> {
        let partition = Self::day_partition(log.log_date)?;
        self.create(&partition, log).await
    }

    pub async fn remove_entry(
        &self,
        date: NaiveDate,
        id: &RecordId,
    ) -> Result<WriteStatus, AppError> {
        self.delete(&Self::day_partition(date)?, id).await
    }

    /// 1 日の合計カロリー（キャッシュを含む読み込み結果から集計）
    pub async fn daily_calories(&self, date: NaiveDate) -> Result<u32, AppError> {
        Ok(self
            .get_day(date)
            .await?
            .iter()
            .map(|log| log.calories)
            .sum())
    }
}

impl EntityCacheAdapter<MealPlan> {
    pub fn meal_plans(context: &SyncContext) -> Result<Self, AppError> {
        Ok(Self::new(context, EntityDescriptor::new(MEAL_PLANS, "user_id")?))
    }

    pub async fn for_user(&self, user_id: &str) -> Result<Vec<MealPlan>, AppError> {
        self.get(&user_partition(user_id)?).await
    }

    pub async fn save_plan(&self, plan: MealPlan) -> Result<Written<MealPlan>, AppError> {
        let partition = user_partition(&plan.user_id)?;
        self.create(&partition, plan).await
    }
}

impl EntityCacheAdapter<FavoriteRecipe> {
    pub fn favorite_recipes(context: &SyncContext) -> Result<Self, AppError> {
        Ok(Self::new(
            context,
            EntityDescriptor::new(FAVORITE_RECIPES, "user_id")?,
        ))
    }

    pub async fn for_user(&self, user_id: &str) -> Result<Vec<FavoriteRecipe>, AppError> {
        self.get(&user_partition(user_id)?).await
    }

    pub async fn add_favorite(
        &self,
        recipe: FavoriteRecipe,
    ) -> Result<Written<FavoriteRecipe>, AppError> {
        let partition = user_partition(&recipe.user_id)?;
        self.create(&partition, recipe).await
    }

    pub async fn remove_favorite(
        &self,
        user_id: &str,
        id: &RecordId,
    ) -> Result<WriteStatus, AppError> {
        self.delete(&user_partition(user_id)?, id).await
    }
}
