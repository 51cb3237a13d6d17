//! 适配器注册表：按 ProviderKind 解析后端适配器
//!
//! Adapter registry mapping each [`ProviderKind`] to the adapter that serves it.
//!
//! The default registry covers every built-in kind. Embedders and tests can
//! register their own adapters to replace a kind's implementation.

use std::collections::HashMap;
use std::sync::Arc;

use crate::adapters::{BackendAdapter, LocalEmbeddedAdapter, OpenAiAdapter};
use crate::config::ProviderKind;
use crate::transport::HttpTransport;
use crate::{Error, ErrorContext, Result};

#[derive(Debug, Clone, Default)]
pub struct AdapterRegistry {
    adapters: HashMap<ProviderKind, Arc<dyn BackendAdapter>>,
}

impl AdapterRegistry {
    /// Registry with no adapters at all.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Built-in adapters for every provider kind, sharing one fresh HTTP transport.
    pub fn with_defaults() -> Result<Self> {
        Ok(Self::with_transport(HttpTransport::new()?))
    }

    /// Built-in adapters for every provider kind over the given transport.
    pub fn with_transport(transport: HttpTransport) -> Self {
        let mut registry = Self::empty();
        registry.register(
            ProviderKind::GenericRemote,
            Arc::new(OpenAiAdapter::generic(transport.clone())),
        );
        registry.register(
            ProviderKind::AuthenticatedRemote,
            Arc::new(OpenAiAdapter::authenticated(transport.clone())),
        );
        registry.register(
            ProviderKind::LocalEmbedded,
            Arc::new(LocalEmbeddedAdapter::new(transport)),
        );
        registry
    }

    /// Register (or replace) the adapter serving `kind`.
    pub fn register(&mut self, kind: ProviderKind, adapter: Arc<dyn BackendAdapter>) -> &mut Self {
        self.adapters.insert(kind, adapter);
        self
    }

    pub fn resolve(&self, kind: ProviderKind) -> Result<Arc<dyn BackendAdapter>> {
        self.adapters.get(&kind).cloned().ok_or_else(|| {
            Error::configuration(
                format!("no adapter registered for provider '{}'", kind),
                ErrorContext::new()
                    .with_provider(kind)
                    .with_field_path("config.provider")
                    .with_source("adapter_registry"),
            )
        })
    }

    pub fn contains(&self, kind: ProviderKind) -> bool {
        self.adapters.contains_key(&kind)
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    #[test]
    fn test_defaults_cover_every_kind() {
        let registry = AdapterRegistry::with_defaults().unwrap();
        assert_eq!(registry.len(), ProviderKind::ALL.len());
        for kind in ProviderKind::ALL {
            let adapter = registry.resolve(kind).unwrap();
            assert_eq!(adapter.provider(), kind);
        }
    }

    #[test]
    fn test_unregistered_kind_is_configuration_error() {
        let registry = AdapterRegistry::empty();
        let err = registry.resolve(ProviderKind::LocalEmbedded).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert_eq!(err.provider(), Some(ProviderKind::LocalEmbedded));
    }

    #[test]
    fn test_register_replaces() {
        let transport = HttpTransport::new().unwrap();
        let mut registry = AdapterRegistry::empty();
        registry.register(
            ProviderKind::GenericRemote,
            Arc::new(LocalEmbeddedAdapter::new(transport)),
        );
        assert!(registry.contains(ProviderKind::GenericRemote));
        let adapter = registry.resolve(ProviderKind::GenericRemote).unwrap();
        assert_eq!(adapter.provider(), ProviderKind::LocalEmbedded);
    }
}
