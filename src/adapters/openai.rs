//! OpenAI-compatible remote adapter, with and without mandatory bearer auth.

use async_trait::async_trait;
use tracing::debug;

use super::wire::{self, ChatCompletionBody, CHAT_COMPLETIONS_PATH, MODELS_PATH};
use super::{effective_timeout, resolve_model, BackendAdapter};
use crate::config::{BackendConfig, ProviderKind};
use crate::transport::HttpTransport;
use crate::types::{ChatRequest, Generation, ModelInfo};
use crate::{Error, ErrorContext, Result};

/// Adapter for remote servers speaking the OpenAI chat-completions API.
///
/// The `generic_remote` flavour sends a bearer token only when one is
/// configured; the `authenticated_remote` flavour refuses to call out without one.
#[derive(Debug, Clone)]
pub struct OpenAiAdapter {
    provider: ProviderKind,
    transport: HttpTransport,
}

impl OpenAiAdapter {
    pub fn generic(transport: HttpTransport) -> Self {
        Self {
            provider: ProviderKind::GenericRemote,
            transport,
        }
    }

    pub fn authenticated(transport: HttpTransport) -> Self {
        Self {
            provider: ProviderKind::AuthenticatedRemote,
            transport,
        }
    }

    fn requires_auth(&self) -> bool {
        self.provider == ProviderKind::AuthenticatedRemote
    }

    fn credential<'a>(&self, config: &'a BackendConfig) -> Result<Option<&'a str>> {
        match config.api_key() {
            None if self.requires_auth() => Err(Error::configuration(
                "authenticated backend has no api_key configured",
                ErrorContext::new()
                    .with_provider(self.provider)
                    .with_field_path("config.api_key")
                    .with_source("openai_adapter"),
            )),
            key => Ok(key),
        }
    }
}

#[async_trait]
impl BackendAdapter for OpenAiAdapter {
    fn provider(&self) -> ProviderKind {
        self.provider
    }

    async fn generate(&self, request: &ChatRequest, config: &BackendConfig) -> Result<Generation> {
        let api_key = self.credential(config)?;
        let model = resolve_model(request, config);
        let url = config.endpoint(CHAT_COMPLETIONS_PATH);
        debug!(
            provider = %self.provider,
            url = url.as_str(),
            model = model.unwrap_or("<backend default>"),
            messages = request.messages.len(),
            "sending chat completion"
        );

        let body = ChatCompletionBody::new(request, model);
        let reply = self
            .transport
            .post_json(&url, &body, api_key, effective_timeout(request, config), self.provider)
            .await?;
        wire::parse_generation(&reply, self.provider, model)
    }

    async fn list_models(&self, config: &BackendConfig) -> Result<Vec<ModelInfo>> {
        let api_key = self.credential(config)?;
        let url = config.endpoint(MODELS_PATH);
        let reply = self
            .transport
            .get(&url, api_key, config.timeout(), self.provider)
            .await?;
        wire::parse_model_list(&reply, self.provider)
    }

    async fn health_check(&self, config: &BackendConfig) -> bool {
        let Ok(api_key) = self.credential(config) else {
            return false;
        };
        match self
            .transport
            .get(&config.endpoint(MODELS_PATH), api_key, config.timeout(), self.provider)
            .await
        {
            Ok(reply) => reply.is_success(),
            Err(err) => {
                debug!(provider = %self.provider, error = %err, "health check failed");
                false
            }
        }
    }
}
