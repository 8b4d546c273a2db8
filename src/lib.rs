pub mod config;
pub mod error;
pub mod fetch; // cache, coalescing coordinator, fan-out executor
pub mod media;
pub mod utils;

pub use error::{FetchError, Result};
pub use fetch::{
    CacheConfig, CacheKey, CoordinatorConfig, FanoutConfig, FanoutExecutor, FetchCoordinator,
    ResultCache,
};
