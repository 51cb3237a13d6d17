//! # ai-relay
//!
//! 面向 OpenAI 兼容推理后端的弹性多厂商请求客户端，提供重试、回退链与模型列表缓存。
//!
//! Resilient multi-provider request client for OpenAI-compatible inference
//! backends: remote services, authenticated remote services and locally
//! embedded runtimes, behind one request/response model.
//!
//! ## Overview
//!
//! A caller describes a primary backend with a [`BackendConfig`] and, optionally,
//! an ordered chain of fallback configurations. [`AiClient::generate`] validates
//! the request, tries the primary with exponential backoff, then moves down the
//! chain until a backend answers. The [`ChatResponse`] records which backend
//! served it, how many attempts it took and whether a fallback was used.
//!
//! ## Key Features
//!
//! - **Uniform model**: [`ChatRequest`], [`ChatResponse`] and [`ModelInfo`] are backend-independent
//! - **Retry with backoff**: retryable failures are absorbed per configuration, see [`resilience`]
//! - **Fallback chain**: exhausted configurations hand over to the next one
//! - **Model cache**: per-client, time-boxed cache of model listings, see [`cache`]
//! - **Typed errors**: one [`Error`] value with kind, context and cause
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ai_relay::{AiClient, BackendConfig, ChatRequest, Message, ProviderKind};
//!
//! #[tokio::main]
//! async fn main() -> ai_relay::Result<()> {
//!     let local = BackendConfig::builder(ProviderKind::LocalEmbedded, "http://127.0.0.1:8080")
//!         .build()?;
//!     let config = BackendConfig::builder(ProviderKind::AuthenticatedRemote, "https://api.example.com")
//!         .api_key("sk-...")
//!         .default_model("gpt-4o-mini")
//!         .max_retries(3)
//!         .fallback(local)
//!         .build()?;
//!
//!     let client = AiClient::new(config)?;
//!     let response = client
//!         .generate(&ChatRequest::new(vec![Message::user("Hello!")]))
//!         .await?;
//!     println!("{} (served by {})", response.content(), response.served_by());
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`config`] | Backend configuration, validation and loading |
//! | [`client`] | Client orchestration and builder |
//! | [`adapters`] | Per-backend wire adaptation |
//! | [`registry`] | Provider kind to adapter mapping |
//! | [`resilience`] | Retry executor and backoff policy |
//! | [`cache`] | Time-boxed model list cache |
//! | [`transport`] | HTTP transport |
//! | [`types`] | Request, response, message and model types |

pub mod adapters;
pub mod cache;
pub mod client;
pub mod config;
pub mod registry;
pub mod resilience;
pub mod transport;
pub mod types;

// Re-export main types for convenience
pub use adapters::BackendAdapter;
pub use client::{AiClient, AiClientBuilder, BackendHealth};
pub use config::{BackendConfig, BackendConfigBuilder, ProviderKind};
pub use registry::AdapterRegistry;
pub use types::{
    ChatRequest, ChatResponse, FinishReason, Generation, Message, MessageRole, ModelInfo, Usage,
};

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the library
pub mod error;
pub use error::{Error, ErrorContext, ErrorKind};
