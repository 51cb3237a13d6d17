use std::time::{Duration, Instant};

use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::adapters::effective_timeout;
use crate::cache::{CacheKey, CacheStats, ModelCache};
use crate::client::policy::{decide, ChainSlot, Decision};
use crate::config::{BackendConfig, ProviderKind};
use crate::resilience::{execute_with_retry, RetryOutcome};
use crate::types::response::DeliveryMetadata;
use crate::types::{ChatRequest, ChatResponse, Generation, ModelInfo};
use crate::{Error, ErrorContext, Result};

/// Resilient client over one primary backend and its fallback chain.
///
/// Construction validates the chain and resolves adapters but performs no
/// network I/O. The client is `Send + Sync`; share it behind an `Arc`.
pub struct AiClient {
    pub(crate) chain: Vec<ChainSlot>,
    pub(crate) models: ModelCache<Vec<ModelInfo>>,
    pub(crate) cache_key: CacheKey,
    /// Serializes cache refills so concurrent misses hit the backend once.
    pub(crate) refill: tokio::sync::Mutex<()>,
}

/// Liveness of one configuration in the chain, as reported by [`AiClient::health_report`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendHealth {
    pub provider: ProviderKind,
    pub base_url: String,
    pub healthy: bool,
}

impl AiClient {
    /// Build a client with the default adapters.
    pub fn new(config: BackendConfig) -> Result<Self> {
        crate::client::builder::AiClientBuilder::new()
            .config(config)
            .build()
    }

    pub fn builder() -> crate::client::builder::AiClientBuilder {
        crate::client::builder::AiClientBuilder::new()
    }

    fn primary(&self) -> &ChainSlot {
        // The builder never produces an empty chain.
        &self.chain[0]
    }

    /// Primary configuration, with its fallbacks stripped.
    pub fn primary_config(&self) -> &BackendConfig {
        &self.primary().config
    }

    /// Configurations in the order `generate` tries them.
    pub fn chain(&self) -> impl Iterator<Item = &BackendConfig> + '_ {
        self.chain.iter().map(|slot| &slot.config)
    }

    /// Run a chat completion, retrying and falling back as configured.
    ///
    /// The request is validated first; a malformed request fails with a
    /// Validation error before any backend is contacted. Otherwise each
    /// configuration is tried in chain order until one succeeds or the chain
    /// is exhausted. An exhausted error carries the total attempt count, the
    /// accumulated retry count and the configurations tried.
    pub async fn generate(&self, request: &ChatRequest) -> Result<ChatResponse> {
        request.validate()?;

        let started = Instant::now();
        let mut attempts = 0u32;
        let mut retry_count = 0u32;
        let mut tried = Vec::with_capacity(self.chain.len());

        for (index, slot) in self.chain.iter().enumerate() {
            let has_next = index + 1 < self.chain.len();
            tried.push(slot.label.clone());

            let outcome = Self::run_slot(slot, request).await;
            attempts += outcome.attempts;
            retry_count += outcome.retries();

            let err = match outcome.result {
                Ok(generation) => {
                    let elapsed_ms = started.elapsed().as_millis() as u64;
                    info!(
                        served_by = slot.label.as_str(),
                        model = generation.model.as_str(),
                        latency_ms = generation.latency_ms,
                        elapsed_ms,
                        retry_count,
                        attempts,
                        used_fallback = index > 0,
                        "ai-relay request succeeded"
                    );
                    let meta = DeliveryMetadata {
                        retry_count,
                        attempts,
                        used_fallback: index > 0,
                        served_by: slot.config.base_url().to_string(),
                        elapsed_ms,
                    };
                    return Ok(ChatResponse::from_generation(generation, meta));
                }
                Err(err) => err,
            };

            match decide(&err, has_next) {
                Decision::Fallback => {
                    warn!(
                        failed = slot.label.as_str(),
                        next = self.chain[index + 1].label.as_str(),
                        error = %err,
                        "backend exhausted, falling back"
                    );
                }
                Decision::Fail => {
                    warn!(backend = slot.label.as_str(), error = %err, "ai-relay request failed");
                    return Err(annotate(err, attempts, retry_count, Vec::new()));
                }
                Decision::Exhausted => {
                    warn!(
                        attempts,
                        retry_count,
                        tried = tried.len(),
                        error = %err,
                        "ai-relay request failed on every backend"
                    );
                    return Err(annotate(err, attempts, retry_count, tried));
                }
            }
        }

        Err(Error::configuration(
            "client has no backend configured",
            ErrorContext::new().with_source("ai_client"),
        ))
    }

    async fn run_slot(slot: &ChainSlot, request: &ChatRequest) -> RetryOutcome<Generation> {
        let bound = effective_timeout(request, &slot.config);
        execute_with_retry(&slot.retry, |attempt| async move {
            debug!(backend = slot.label.as_str(), attempt, "attempting generation");
            bounded(bound, slot.config.provider(), slot.adapter.generate(request, &slot.config)).await
        })
        .await
    }

    /// Models offered by the primary backend.
    ///
    /// Served from the cache while fresh. A miss makes one retry-wrapped call
    /// to the primary (fallbacks are not consulted) and stores the result.
    /// With caching disabled every call goes straight to the backend.
    pub async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        if !self.models.is_enabled() {
            return self.fetch_models().await;
        }
        if let Some(models) = self.models.get(&self.cache_key) {
            debug!(key = %self.cache_key, "model list served from cache");
            return Ok(models);
        }

        let _refill = self.refill.lock().await;
        if let Some(models) = self.models.peek(&self.cache_key) {
            return Ok(models);
        }
        let models = self.fetch_models().await?;
        self.models.set(self.cache_key.clone(), models.clone());
        Ok(models)
    }

    async fn fetch_models(&self) -> Result<Vec<ModelInfo>> {
        let slot = self.primary();
        let bound = slot.config.timeout();
        let outcome = execute_with_retry(&slot.retry, |attempt| async move {
            debug!(backend = slot.label.as_str(), attempt, "listing models");
            bounded(bound, slot.config.provider(), slot.adapter.list_models(&slot.config)).await
        })
        .await;

        let attempts = outcome.attempts;
        let models = outcome
            .result
            .map_err(|err| annotate(err, attempts, attempts.saturating_sub(1), Vec::new()))?;
        info!(backend = slot.label.as_str(), count = models.len(), "model list refreshed");
        Ok(models)
    }

    /// Drop this client's cached model list; the next `list_models` refetches.
    pub fn invalidate_cache(&self) {
        let removed = self.models.invalidate(Some(&self.cache_key));
        debug!(key = %self.cache_key, removed, "model cache invalidated");
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.models.stats()
    }

    /// Probe the primary backend.
    pub async fn health_check(&self) -> bool {
        let slot = self.primary();
        slot.adapter.health_check(&slot.config).await
    }

    /// Probe every configuration in the chain, in chain order.
    pub async fn health_report(&self) -> Vec<BackendHealth> {
        let probes = self.chain.iter().map(|slot| async move {
            BackendHealth {
                provider: slot.config.provider(),
                base_url: slot.config.base_url().to_string(),
                healthy: slot.adapter.health_check(&slot.config).await,
            }
        });
        join_all(probes).await
    }
}

impl std::fmt::Debug for AiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AiClient")
            .field("chain", &self.chain.iter().map(|s| s.label.as_str()).collect::<Vec<_>>())
            .field("cache_ttl", &self.models.ttl())
            .finish()
    }
}

/// Bound one attempt; expiry becomes a retryable Timeout error.
async fn bounded<T>(
    limit: Duration,
    provider: ProviderKind,
    attempt: impl std::future::Future<Output = Result<T>>,
) -> Result<T> {
    match tokio::time::timeout(limit, attempt).await {
        Ok(result) => result,
        Err(_) => Err(Error::timeout(
            format!("attempt did not finish within {} ms", limit.as_millis()),
            ErrorContext::new()
                .with_provider(provider)
                .with_source("ai_client"),
        )),
    }
}

fn annotate(mut err: Error, attempts: u32, retry_count: u32, tried: Vec<String>) -> Error {
    let context = err.context_mut();
    context.attempts = Some(attempts);
    context.retry_count = Some(retry_count);
    context.tried = tried;
    err
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn test_client_is_send_sync() {
        assert_send_sync::<AiClient>();
    }

    #[tokio::test]
    async fn test_bounded_maps_expiry_to_timeout() {
        let slow = async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok::<_, Error>(())
        };
        let err = bounded(Duration::from_millis(10), ProviderKind::GenericRemote, slow)
            .await
            .unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(err.kind(), crate::ErrorKind::Timeout);
        assert_eq!(err.provider(), Some(ProviderKind::GenericRemote));
    }

    #[test]
    fn test_annotate_records_totals() {
        let err = annotate(
            Error::connection("refused", ErrorContext::new()),
            4,
            2,
            vec!["generic_remote@http://a".into()],
        );
        assert_eq!(err.context().attempts, Some(4));
        assert_eq!(err.context().retry_count, Some(2));
        assert!(err.is_exhausted());
    }
}
