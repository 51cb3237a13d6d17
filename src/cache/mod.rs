//! 模型列表缓存模块：按后端地址缓存模型列表，带过期时间，线程安全。
//!
//! # Model Listing Cache
//!
//! Model listings change rarely but are requested often by consumer
//! pipelines, so the client keeps them in a small time-boxed cache.
//!
//! ## Key Components
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`ModelCache`] | Mutex-guarded map with per-instance TTL |
//! | [`CacheKey`] | Backend base address used as key |
//! | [`CacheStats`] | Hit/miss/set/invalidation counters |
//!
//! ## Example
//!
//! ```rust
//! use ai_relay::cache::{CacheKey, ModelCache};
//! use std::time::Duration;
//!
//! let cache: ModelCache<Vec<String>> = ModelCache::new(Duration::from_secs(300));
//! cache.set(CacheKey::from("http://localhost:8080"), vec!["llama-3".into()]);
//! assert!(cache.get(&CacheKey::from("http://localhost:8080")).is_some());
//! cache.invalidate(None);
//! assert!(cache.get(&CacheKey::from("http://localhost:8080")).is_none());
//! ```
//!
//! Each client owns its own cache instance; there is no process-wide cache.

mod key;
mod stats;
mod store;

pub use key::CacheKey;
pub use stats::CacheStats;
pub use store::ModelCache;
