//! Keyed query cache
//!
//! Deterministic keys, freshness policies, the shared cache service and the
//! observers that keep a mounted view up to date.

pub mod cache;
pub mod keys;
pub mod observer;
pub mod policy;

pub use cache::{
    spawn_cleanup_task, CacheEvent, CacheStats, FetchError, QueryCache, QueryCacheConfig, QueryState,
};
pub use keys::{KeySegment, QueryKey};
pub use observer::{Fetcher, QueryObserver, QueryResult, QuerySpec, QueryStatus};
pub use policy::{QueryPolicy, RefetchOnMount};
