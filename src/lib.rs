pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod shared;
pub mod state;

pub use application::services::{
    FavoriteRecipeCache, FoodLogCache, MealPlanCache, WriteStatus, Written,
};
pub use shared::{AppConfig, AppError, Result};
pub use state::SyncRuntime;

/// tracing のサブスクライバを初期化する（`RUST_LOG` が優先）
pub fn init_logging() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sync=debug,coach_sync=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
