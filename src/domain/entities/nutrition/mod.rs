pub mod favorite_recipe;
pub mod food_log;
pub mod meal_plan;

pub use favorite_recipe::FavoriteRecipe;
pub use food_log::{FoodLog, MealType};
pub use meal_plan::{MealPlan, PlannedMeal};
