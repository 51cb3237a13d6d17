use std::sync::Arc;

use tracing::debug;

use crate::adapters::BackendAdapter;
use crate::cache::{CacheKey, ModelCache};
use crate::client::core::AiClient;
use crate::client::policy::ChainSlot;
use crate::client::validation::flatten_chain;
use crate::config::{BackendConfig, ProviderKind};
use crate::registry::AdapterRegistry;
use crate::transport::HttpTransport;
use crate::{Error, ErrorContext, Result};

/// Builder for creating clients with custom configuration.
///
/// Keep this surface area small: a configuration is required; the adapter
/// registry and HTTP transport default to the built-in ones.
#[derive(Debug, Default)]
pub struct AiClientBuilder {
    config: Option<BackendConfig>,
    registry: Option<AdapterRegistry>,
    transport: Option<HttpTransport>,
    overrides: Vec<(ProviderKind, Arc<dyn BackendAdapter>)>,
}

impl AiClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Primary configuration; its fallbacks form the rest of the chain.
    pub fn config(mut self, config: BackendConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Replace the default adapter registry.
    pub fn registry(mut self, registry: AdapterRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Share an existing HTTP transport with the default adapters.
    ///
    /// Ignored when a full registry is supplied.
    pub fn transport(mut self, transport: HttpTransport) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Serve `kind` with a custom adapter, on top of whichever registry is used.
    pub fn adapter(mut self, kind: ProviderKind, adapter: Arc<dyn BackendAdapter>) -> Self {
        self.overrides.push((kind, adapter));
        self
    }

    /// Validate the chain and resolve an adapter for every configuration.
    ///
    /// No network traffic happens here; unreachable backends only show up on
    /// the first call.
    pub fn build(self) -> Result<AiClient> {
        let config = self.config.ok_or_else(|| {
            Error::configuration(
                "no backend configuration supplied",
                ErrorContext::new()
                    .with_field_path("config")
                    .with_source("client_builder"),
            )
        })?;

        let mut registry = match self.registry {
            Some(registry) => registry,
            None => match self.transport {
                Some(transport) => AdapterRegistry::with_transport(transport),
                None => AdapterRegistry::with_defaults()?,
            },
        };
        for (kind, adapter) in self.overrides {
            registry.register(kind, adapter);
        }

        let chain = flatten_chain(&config)?
            .into_iter()
            .map(|member| -> Result<ChainSlot> {
                let adapter = registry.resolve(member.provider())?;
                Ok(ChainSlot::new(member, adapter))
            })
            .collect::<Result<Vec<_>>>()?;

        debug!(
            primary = chain[0].label.as_str(),
            chain_len = chain.len(),
            cache_ttl_secs = config.cache_ttl().as_secs(),
            "ai-relay client constructed"
        );

        Ok(AiClient {
            chain,
            models: ModelCache::new(config.cache_ttl()),
            cache_key: CacheKey::for_backend(&config),
            refill: tokio::sync::Mutex::new(()),
        })
    }
}
