use std::sync::Arc;

use crate::adapters::BackendAdapter;
use crate::config::BackendConfig;
use crate::resilience::RetryPolicy;
use crate::Error;

/// One configuration of the flattened fallback chain, with everything
/// needed to attempt it resolved up front.
#[derive(Debug, Clone)]
pub(crate) struct ChainSlot {
    pub config: BackendConfig,
    pub adapter: Arc<dyn BackendAdapter>,
    pub retry: RetryPolicy,
    /// `provider@base_url`, used in logs and in the `tried` list of errors.
    pub label: String,
}

impl ChainSlot {
    pub fn new(config: BackendConfig, adapter: Arc<dyn BackendAdapter>) -> Self {
        let label = format!("{}@{}", config.provider(), config.base_url());
        Self {
            retry: RetryPolicy::from_config(&config),
            config,
            adapter,
            label,
        }
    }
}

/// What to do once a chain slot's retries are used up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Decision {
    /// Move on to the next configuration.
    Fallback,
    /// Surface the error as is; no other backend would accept the request.
    Fail,
    /// Surface the error as the final one of an exhausted chain.
    Exhausted,
}

pub(crate) fn decide(err: &Error, has_next: bool) -> Decision {
    if !err.is_fallbackable() {
        Decision::Fail
    } else if has_next {
        Decision::Fallback
    } else {
        Decision::Exhausted
    }
}
