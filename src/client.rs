//! Resilient client over a primary backend and its fallback chain.
//!
//! Keep the public surface small and predictable.
//! Implementation details are split into submodules under `src/client/`.

pub mod builder;
pub mod core;
mod policy;
mod validation;

pub use builder::AiClientBuilder;
pub use self::core::{AiClient, BackendHealth};
pub use validation::MAX_CHAIN_LEN;
