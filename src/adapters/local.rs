//! Adapter for locally-embedded inference runtimes.
//!
//! Local runtimes (llama.cpp server, MLX and similar accelerated wrappers)
//! expose the OpenAI chat-completions API on a loopback address but differ in
//! the details:
//! - liveness is reported on `GET /health`, which answers 503 while weights load;
//! - some builds have no `/v1/models` route and serve exactly one model;
//! - the context window is advertised under runtime-specific keys.

use async_trait::async_trait;
use tracing::debug;

use super::wire::{self, ChatCompletionBody, CHAT_COMPLETIONS_PATH, MODELS_PATH};
use super::{effective_timeout, resolve_model, BackendAdapter};
use crate::config::{BackendConfig, ProviderKind};
use crate::transport::HttpTransport;
use crate::types::{ChatRequest, Generation, ModelInfo};
use crate::Result;

pub const HEALTH_PATH: &str = "/health";

#[derive(Debug, Clone)]
pub struct LocalEmbeddedAdapter {
    transport: HttpTransport,
}

impl LocalEmbeddedAdapter {
    pub fn new(transport: HttpTransport) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl BackendAdapter for LocalEmbeddedAdapter {
    fn provider(&self) -> ProviderKind {
        ProviderKind::LocalEmbedded
    }

    async fn generate(&self, request: &ChatRequest, config: &BackendConfig) -> Result<Generation> {
        let model = resolve_model(request, config);
        let url = config.endpoint(CHAT_COMPLETIONS_PATH);
        debug!(
            url = url.as_str(),
            model = model.unwrap_or("<loaded model>"),
            "sending local chat completion"
        );
        let body = ChatCompletionBody::new(request, model);
        let reply = self
            .transport
            .post_json(
                &url,
                &body,
                config.api_key(),
                effective_timeout(request, config),
                ProviderKind::LocalEmbedded,
            )
            .await?;
        wire::parse_generation(&reply, ProviderKind::LocalEmbedded, model)
    }

    async fn list_models(&self, config: &BackendConfig) -> Result<Vec<ModelInfo>> {
        let reply = self
            .transport
            .get(
                &config.endpoint(MODELS_PATH),
                config.api_key(),
                config.timeout(),
                ProviderKind::LocalEmbedded,
            )
            .await?;

        // Single-model runtimes without a listing route: report the configured model.
        if reply.status == 404 {
            if let Some(model) = config.default_model() {
                debug!(model, "runtime has no model listing, using configured model");
                return Ok(vec![ModelInfo::new(model, ProviderKind::LocalEmbedded)]);
            }
        }
        wire::parse_model_list(&reply, ProviderKind::LocalEmbedded)
    }

    async fn health_check(&self, config: &BackendConfig) -> bool {
        let timeout = config.timeout();
        let health = self
            .transport
            .get(&config.endpoint(HEALTH_PATH), config.api_key(), timeout, ProviderKind::LocalEmbedded)
            .await;
        match health {
            Ok(reply) if reply.is_success() => true,
            // 503 means the runtime is up but still loading weights.
            Ok(reply) if reply.status == 503 => false,
            Ok(_) => self
                .transport
                .get(&config.endpoint(MODELS_PATH), config.api_key(), timeout, ProviderKind::LocalEmbedded)
                .await
                .map(|r| r.is_success())
                .unwrap_or(false),
            Err(err) => {
                debug!(error = %err, "local runtime unreachable");
                false
            }
        }
    }
}
