pub mod mock_remote_store;

pub use mock_remote_store::*;
