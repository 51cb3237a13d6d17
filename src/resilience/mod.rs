//! 弹性模式模块：提供有界重试与指数退避。
//!
//! # Resilience Primitives Module
//!
//! Failure handling shared by every backend call.
//!
//! ## Key Components
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`RetryPolicy`] | Attempt budget and backoff parameters |
//! | [`execute_with_retry`] | Sequential retry driver returning [`RetryOutcome`] |
//!
//! ## Backoff
//!
//! The wait after the n-th failed attempt is
//! `min(base_delay * multiplier^(n-1), max_delay)`:
//!
//! ```rust
//! use ai_relay::resilience::RetryPolicy;
//! use std::time::Duration;
//!
//! let policy = RetryPolicy::new(6, Duration::from_secs(1), Duration::from_secs(10), 2.0);
//! let delays: Vec<u64> = (1..=6).map(|n| policy.delay_for_attempt(n).as_secs()).collect();
//! assert_eq!(delays, vec![1, 2, 4, 8, 10, 10]);
//! ```
//!
//! Only connection, rate-limit, timeout and generation failures are retried;
//! everything else is returned after the first attempt.

pub mod retry;

pub use retry::{execute_with_retry, RetryOutcome, RetryPolicy};
