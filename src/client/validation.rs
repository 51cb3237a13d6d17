//! 回退链校验：展开、限长与去重。
//!
//! Fallback chain validation.

use std::collections::HashSet;

use crate::config::BackendConfig;
use crate::{Error, ErrorContext, Result};

/// Upper bound on configurations in one chain, primary included.
pub const MAX_CHAIN_LEN: usize = 8;

/// Flatten `primary` and its nested fallbacks into attempt order.
///
/// Order is pre-order: a configuration comes before its own fallbacks, and
/// those come before its next sibling. Every returned configuration has its
/// fallback list stripped. Fails when the chain is longer than
/// [`MAX_CHAIN_LEN`] or names the same endpoint twice.
pub(crate) fn flatten_chain(primary: &BackendConfig) -> Result<Vec<BackendConfig>> {
    let mut chain = Vec::new();
    let mut seen = HashSet::new();
    let mut pending = vec![primary];

    while let Some(config) = pending.pop() {
        if chain.len() == MAX_CHAIN_LEN {
            return Err(Error::configuration(
                format!("fallback chain exceeds {} configurations", MAX_CHAIN_LEN),
                ErrorContext::new()
                    .with_provider(primary.provider())
                    .with_field_path("config.fallbacks")
                    .with_source("chain_validator"),
            ));
        }

        let endpoint = (config.provider(), config.base_url().to_string());
        if !seen.insert(endpoint) {
            return Err(Error::configuration(
                format!(
                    "duplicate endpoint in fallback chain: {} {}",
                    config.provider(),
                    config.base_url()
                ),
                ErrorContext::new()
                    .with_provider(config.provider())
                    .with_field_path(format!("chain[{}]", chain.len()))
                    .with_source("chain_validator"),
            ));
        }

        chain.push(config.without_fallbacks());
        pending.extend(config.fallbacks().iter().rev());
    }

    Ok(chain)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderKind;
    use crate::ErrorKind;

    fn cfg(url: &str) -> BackendConfig {
        BackendConfig::builder(ProviderKind::GenericRemote, url).build().unwrap()
    }

    #[test]
    fn test_preorder_flattening() {
        let b = BackendConfig::builder(ProviderKind::GenericRemote, "http://b")
            .fallback(cfg("http://c"))
            .build()
            .unwrap();
        let primary = BackendConfig::builder(ProviderKind::GenericRemote, "http://a")
            .fallback(b)
            .fallback(cfg("http://d"))
            .build()
            .unwrap();

        let chain = flatten_chain(&primary).unwrap();
        let urls: Vec<_> = chain.iter().map(|c| c.base_url()).collect();
        assert_eq!(urls, vec!["http://a", "http://b", "http://c", "http://d"]);
        assert!(chain.iter().all(|c| c.fallbacks().is_empty()));
    }

    #[test]
    fn test_chain_length_cap() {
        let fallbacks = (1..MAX_CHAIN_LEN).map(|i| cfg(&format!("http://f{}", i))).collect();
        let primary = BackendConfig::builder(ProviderKind::GenericRemote, "http://p")
            .fallbacks(fallbacks)
            .build()
            .unwrap();
        assert_eq!(flatten_chain(&primary).unwrap().len(), MAX_CHAIN_LEN);

        let fallbacks = (1..=MAX_CHAIN_LEN).map(|i| cfg(&format!("http://f{}", i))).collect();
        let primary = BackendConfig::builder(ProviderKind::GenericRemote, "http://p")
            .fallbacks(fallbacks)
            .build()
            .unwrap();
        let err = flatten_chain(&primary).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert_eq!(err.context().field_path.as_deref(), Some("config.fallbacks"));
    }

    #[test]
    fn test_duplicate_endpoint_rejected() {
        let primary = BackendConfig::builder(ProviderKind::GenericRemote, "http://a/")
            .fallback(cfg("http://a"))
            .build()
            .unwrap();
        let err = flatten_chain(&primary).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert_eq!(err.context().field_path.as_deref(), Some("chain[1]"));
    }

    #[test]
    fn test_same_address_different_kind_allowed() {
        let local = BackendConfig::builder(ProviderKind::LocalEmbedded, "http://a")
            .build()
            .unwrap();
        let primary = BackendConfig::builder(ProviderKind::GenericRemote, "http://a")
            .fallback(local)
            .build()
            .unwrap();
        assert_eq!(flatten_chain(&primary).unwrap().len(), 2);
    }
}
