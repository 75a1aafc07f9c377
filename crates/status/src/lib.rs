pub mod cache;
pub mod error;
pub mod memory;
pub mod tracker;

pub use cache::{keys, Cache, CacheExt, InMemoryCache};
pub use error::*;
pub use memory::{InMemoryStatusTracker, TrackerConfig};
pub use tracker::*;
