//! 后端适配层：通过 trait 将统一的请求/响应模型映射到各后端的线协议
//!
//! Backend adapter abstraction layer.
//!
//! Every backend kind is served by a type implementing [`BackendAdapter`].
//! Adapters translate the uniform [`ChatRequest`] into one backend's wire
//! format and parse the reply back into a [`Generation`], attaching the
//! provider kind and measured latency. Retry and fallback bookkeeping is the
//! client's job, not the adapter's.
//!
//! | Adapter | Provider kinds |
//! |---------|----------------|
//! | [`OpenAiAdapter`] | `generic_remote`, `authenticated_remote` |
//! | [`LocalEmbeddedAdapter`] | `local_embedded` |

pub mod local;
pub mod openai;
pub mod wire;

use async_trait::async_trait;
use std::time::Duration;

use crate::config::{BackendConfig, ProviderKind};
use crate::types::{ChatRequest, Generation, ModelInfo};
use crate::Result;

pub use local::LocalEmbeddedAdapter;
pub use openai::OpenAiAdapter;

/// Core trait for backend-specific API adaptation.
///
/// The trait is object-safe; the registry hands out `Arc<dyn BackendAdapter>`.
#[async_trait]
pub trait BackendAdapter: Send + Sync + std::fmt::Debug {
    /// Provider kind this adapter serves and stamps on its results.
    fn provider(&self) -> ProviderKind;

    /// Run one chat completion against the backend described by `config`.
    async fn generate(&self, request: &ChatRequest, config: &BackendConfig) -> Result<Generation>;

    /// Fetch the backend's model listing.
    async fn list_models(&self, config: &BackendConfig) -> Result<Vec<ModelInfo>>;

    /// Cheap liveness probe. Never fails; unreachable means `false`.
    async fn health_check(&self, config: &BackendConfig) -> bool;
}

/// Time bound for one attempt: the request override wins over the configured timeout.
pub fn effective_timeout(request: &ChatRequest, config: &BackendConfig) -> Duration {
    request.timeout.unwrap_or_else(|| config.timeout())
}

/// Model to send: explicit request model, else the configuration default.
pub fn resolve_model<'a>(request: &'a ChatRequest, config: &'a BackendConfig) -> Option<&'a str> {
    request.model.as_deref().or_else(|| config.default_model())
}
