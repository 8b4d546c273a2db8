//! Fetch-cache-fanout core
//!
//! [`FetchCoordinator`] is the entry point: it answers from [`ResultCache`]
//! while entries are fresh, merges concurrent misses for one key into a
//! single upstream fetch, and post-processes fetched items on a shared
//! [`FanoutExecutor`].

pub mod cache;
pub mod coordinator;
pub mod fanout;

pub use cache::{CacheConfig, CacheEntry, CacheKey, CacheStats, ResultCache};
pub use coordinator::{CoordinatorConfig, CoordinatorStats, FetchCoordinator, InFlightRequest};
pub use fanout::{FanoutConfig, FanoutExecutor, FanoutStats};
