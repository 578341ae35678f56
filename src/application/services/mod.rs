pub mod action_queue;
pub mod connectivity_monitor;
pub mod context;
pub mod entity_cache;
pub mod id_mapping;
pub mod nutrition_cache;
pub mod sync_coordinator;

pub use action_queue::ActionQueue;
pub use connectivity_monitor::{ConnectivityMonitor, SubscriptionHandle};
pub use context::SyncContext;
pub use entity_cache::{EntityCacheAdapter, EntityDescriptor, WriteStatus, Written};
pub use id_mapping::IdMappingTable;
pub use nutrition_cache::{FavoriteRecipeCache, FoodLogCache, MealPlanCache};
pub use sync_coordinator::{CreateReconciler, SyncCoordinator, SyncEventSink};
