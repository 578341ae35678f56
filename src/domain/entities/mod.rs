pub mod cached_record;
pub mod nutrition;
pub mod offline;

pub use cached_record::CachedRecord;
pub use nutrition::{FavoriteRecipe, FoodLog, MealPlan, MealType, PlannedMeal};
pub use offline::{
    CacheEntry, DrainOutcome, DrainReport, DrainTrigger, IdMapping, NewAction, QueuedAction,
    SyncStatusSnapshot,
};
