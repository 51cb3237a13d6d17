//! Backend connection configuration.
//!
//! A [`BackendConfig`] describes one OpenAI-compatible backend: which adapter
//! speaks to it, where it lives, how long an attempt may take, how failed
//! attempts are retried, how long model listings stay cached, and which
//! alternate backends to fall back to.
//!
//! Configurations are validated when built (or deserialized) and immutable
//! afterwards. Building never touches the network.

use crate::{Error, ErrorContext, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use url::Url;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);
pub const DEFAULT_MAX_RETRY_DELAY: Duration = Duration::from_secs(30);
pub const DEFAULT_BACKOFF_MULTIPLIER: f64 = 2.0;
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

/// The closed set of backend kinds this crate knows how to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// OpenAI-compatible HTTP server; sends a bearer token only when one is configured.
    GenericRemote,
    /// OpenAI-compatible HTTP server that requires a bearer token.
    AuthenticatedRemote,
    /// Local inference runtime exposing the OpenAI wire format (llama.cpp, MLX, ...).
    LocalEmbedded,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 3] = [
        ProviderKind::GenericRemote,
        ProviderKind::AuthenticatedRemote,
        ProviderKind::LocalEmbedded,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::GenericRemote => "generic_remote",
            ProviderKind::AuthenticatedRemote => "authenticated_remote",
            ProviderKind::LocalEmbedded => "local_embedded",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        ProviderKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| {
                Error::configuration(
                    format!("unknown provider kind '{}'", s),
                    ErrorContext::new()
                        .with_field_path("config.provider")
                        .with_details("expected one of generic_remote, authenticated_remote, local_embedded"),
                )
            })
    }
}

/// Immutable description of one backend connection.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawBackendConfig", into = "RawBackendConfig")]
pub struct BackendConfig {
    provider: ProviderKind,
    base_url: String,
    api_key: Option<String>,
    default_model: Option<String>,
    timeout: Duration,
    max_retries: u32,
    retry_delay: Duration,
    max_retry_delay: Duration,
    backoff_multiplier: f64,
    cache_ttl: Duration,
    fallbacks: Vec<BackendConfig>,
}

impl BackendConfig {
    pub fn builder(provider: ProviderKind, base_url: impl Into<String>) -> BackendConfigBuilder {
        BackendConfigBuilder::new(provider, base_url)
    }

    pub fn provider(&self) -> ProviderKind {
        self.provider
    }

    /// Base address without a trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }

    pub fn default_model(&self) -> Option<&str> {
        self.default_model.as_deref()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Maximum number of attempts against this backend.
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn retry_delay(&self) -> Duration {
        self.retry_delay
    }

    pub fn max_retry_delay(&self) -> Duration {
        self.max_retry_delay
    }

    pub fn backoff_multiplier(&self) -> f64 {
        self.backoff_multiplier
    }

    /// Zero disables model-list caching.
    pub fn cache_ttl(&self) -> Duration {
        self.cache_ttl
    }

    pub fn fallbacks(&self) -> &[BackendConfig] {
        &self.fallbacks
    }

    /// Key under which this backend's model listing is cached.
    pub fn cache_key(&self) -> &str {
        &self.base_url
    }

    /// A copy of this configuration with its fallback list dropped.
    pub fn without_fallbacks(&self) -> BackendConfig {
        BackendConfig {
            fallbacks: Vec::new(),
            ..self.clone()
        }
    }

    /// Join an API path (e.g. `/v1/models`) onto the base address.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self> {
        serde_yaml::from_str(text).map_err(|e| {
            Error::configuration(
                format!("invalid YAML configuration: {}", e),
                ErrorContext::new().with_source("config_loader"),
            )
            .with_cause(e)
        })
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| {
            Error::configuration(
                format!("invalid JSON configuration: {}", e),
                ErrorContext::new().with_source("config_loader"),
            )
            .with_cause(e)
        })
    }

    /// Load from a `.json`, `.yaml` or `.yml` file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::configuration(
                format!("cannot read configuration file {}", path.display()),
                ErrorContext::new().with_source("config_loader"),
            )
            .with_cause(e)
        })?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(&text),
            _ => Self::from_yaml_str(&text),
        }
    }

    /// Build a configuration from `AI_RELAY_*` environment variables.
    ///
    /// - `AI_RELAY_BASE_URL` (required)
    /// - `AI_RELAY_PROVIDER` (default `generic_remote`)
    /// - `AI_RELAY_API_KEY`, `AI_RELAY_MODEL`
    /// - `AI_RELAY_TIMEOUT_SECS`, `AI_RELAY_MAX_RETRIES`, `AI_RELAY_CACHE_TTL_SECS`
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let base_url = lookup("AI_RELAY_BASE_URL").ok_or_else(|| {
            Error::configuration(
                "AI_RELAY_BASE_URL is not set",
                ErrorContext::new().with_field_path("config.base_url"),
            )
        })?;
        let provider = match lookup("AI_RELAY_PROVIDER") {
            Some(raw) => raw.parse()?,
            None => ProviderKind::GenericRemote,
        };

        let mut builder = BackendConfig::builder(provider, base_url);
        if let Some(key) = lookup("AI_RELAY_API_KEY") {
            builder = builder.api_key(key);
        }
        if let Some(model) = lookup("AI_RELAY_MODEL") {
            builder = builder.default_model(model);
        }
        if let Some(secs) = parse_env_number::<u64>(&lookup, "AI_RELAY_TIMEOUT_SECS")? {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        if let Some(n) = parse_env_number::<u32>(&lookup, "AI_RELAY_MAX_RETRIES")? {
            builder = builder.max_retries(n);
        }
        if let Some(secs) = parse_env_number::<u64>(&lookup, "AI_RELAY_CACHE_TTL_SECS")? {
            builder = builder.cache_ttl(Duration::from_secs(secs));
        }
        builder.build()
    }

    /// Check this configuration's own fields. Nested fallbacks were checked
    /// when they were built.
    pub fn validate(&self) -> Result<()> {
        let ctx = |field: &str| {
            ErrorContext::new()
                .with_field_path(field)
                .with_provider(self.provider)
                .with_source("config_validator")
        };

        if self.provider == ProviderKind::AuthenticatedRemote && self.api_key.is_none() {
            return Err(Error::configuration(
                "authenticated_remote backends require an api_key",
                ctx("config.api_key"),
            ));
        }
        if self.timeout.is_zero() {
            return Err(Error::configuration(
                "timeout must be greater than zero",
                ctx("config.timeout"),
            ));
        }
        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier < 1.0 {
            return Err(Error::configuration(
                format!(
                    "backoff_multiplier must be a finite number >= 1.0, got {}",
                    self.backoff_multiplier
                ),
                ctx("config.backoff_multiplier"),
            ));
        }
        if self.max_retry_delay < self.retry_delay {
            return Err(Error::configuration(
                "max_retry_delay must not be smaller than retry_delay",
                ctx("config.max_retry_delay"),
            ));
        }
        Ok(())
    }
}

impl fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendConfig")
            .field("provider", &self.provider)
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("default_model", &self.default_model)
            .field("timeout", &self.timeout)
            .field("max_retries", &self.max_retries)
            .field("retry_delay", &self.retry_delay)
            .field("max_retry_delay", &self.max_retry_delay)
            .field("backoff_multiplier", &self.backoff_multiplier)
            .field("cache_ttl", &self.cache_ttl)
            .field("fallbacks", &self.fallbacks)
            .finish()
    }
}

fn parse_env_number<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>> {
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw.trim().parse::<T>().map(Some).map_err(|_| {
            Error::configuration(
                format!("{} must be a non-negative integer, got '{}'", key, raw),
                ErrorContext::new().with_field_path(key),
            )
        }),
    }
}

/// Parse and normalize a base address: absolute http(s) URL with a host, no trailing slash.
fn normalize_base_url(raw: &str, provider: ProviderKind) -> Result<String> {
    let ctx = || {
        ErrorContext::new()
            .with_field_path("config.base_url")
            .with_provider(provider)
            .with_source("config_validator")
    };
    let url = Url::parse(raw.trim()).map_err(|e| {
        Error::configuration(format!("base_url '{}' is not a valid URL", raw), ctx()).with_cause(e)
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(Error::configuration(
            format!("base_url must use http or https, got '{}'", url.scheme()),
            ctx(),
        ));
    }
    if url.host_str().map(str::is_empty).unwrap_or(true) {
        return Err(Error::configuration(
            format!("base_url '{}' has no host", raw),
            ctx(),
        ));
    }
    Ok(url.as_str().trim_end_matches('/').to_string())
}

/// Builder for [`BackendConfig`]; `build` performs all validation.
#[derive(Debug, Clone)]
pub struct BackendConfigBuilder {
    provider: ProviderKind,
    base_url: String,
    api_key: Option<String>,
    default_model: Option<String>,
    timeout: Duration,
    max_retries: u32,
    retry_delay: Duration,
    max_retry_delay: Duration,
    backoff_multiplier: f64,
    cache_ttl: Duration,
    fallbacks: Vec<BackendConfig>,
}

impl BackendConfigBuilder {
    pub fn new(provider: ProviderKind, base_url: impl Into<String>) -> Self {
        Self {
            provider,
            base_url: base_url.into(),
            api_key: None,
            default_model: None,
            timeout: DEFAULT_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
            max_retry_delay: DEFAULT_MAX_RETRY_DELAY,
            backoff_multiplier: DEFAULT_BACKOFF_MULTIPLIER,
            cache_ttl: DEFAULT_CACHE_TTL,
            fallbacks: Vec::new(),
        }
    }

    /// Set the bearer credential. Blank strings are treated as absent.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        let key = key.into();
        self.api_key = if key.trim().is_empty() { None } else { Some(key) };
        self
    }

    pub fn default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = Some(model.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.max_retries = n;
        self
    }

    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn max_retry_delay(mut self, delay: Duration) -> Self {
        self.max_retry_delay = delay;
        self
    }

    pub fn backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn fallback(mut self, config: BackendConfig) -> Self {
        self.fallbacks.push(config);
        self
    }

    pub fn fallbacks(mut self, configs: Vec<BackendConfig>) -> Self {
        self.fallbacks = configs;
        self
    }

    pub fn build(self) -> Result<BackendConfig> {
        let base_url = normalize_base_url(&self.base_url, self.provider)?;
        let config = BackendConfig {
            provider: self.provider,
            base_url,
            api_key: self.api_key,
            default_model: self.default_model.filter(|m| !m.trim().is_empty()),
            timeout: self.timeout,
            max_retries: self.max_retries,
            retry_delay: self.retry_delay,
            max_retry_delay: self.max_retry_delay,
            backoff_multiplier: self.backoff_multiplier,
            cache_ttl: self.cache_ttl,
            fallbacks: self.fallbacks,
        };
        config.validate()?;
        Ok(config)
    }
}

/// On-disk shape of a [`BackendConfig`]; durations are expressed in milliseconds
/// (timeouts, delays) and seconds (cache lifetime).
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawBackendConfig {
    provider: ProviderKind,
    base_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    default_model: Option<String>,
    #[serde(default = "default_timeout_ms")]
    timeout_ms: u64,
    #[serde(default = "default_max_retries")]
    max_retries: u32,
    #[serde(default = "default_retry_delay_ms")]
    retry_delay_ms: u64,
    #[serde(default = "default_max_retry_delay_ms")]
    max_retry_delay_ms: u64,
    #[serde(default = "default_backoff_multiplier")]
    backoff_multiplier: f64,
    #[serde(default = "default_cache_ttl_secs")]
    cache_ttl_secs: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    fallbacks: Vec<BackendConfig>,
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT.as_millis() as u64
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

fn default_retry_delay_ms() -> u64 {
    DEFAULT_RETRY_DELAY.as_millis() as u64
}

fn default_max_retry_delay_ms() -> u64 {
    DEFAULT_MAX_RETRY_DELAY.as_millis() as u64
}

fn default_backoff_multiplier() -> f64 {
    DEFAULT_BACKOFF_MULTIPLIER
}

fn default_cache_ttl_secs() -> u64 {
    DEFAULT_CACHE_TTL.as_secs()
}

impl TryFrom<RawBackendConfig> for BackendConfig {
    type Error = Error;

    fn try_from(raw: RawBackendConfig) -> Result<Self> {
        let mut builder = BackendConfig::builder(raw.provider, raw.base_url)
            .timeout(Duration::from_millis(raw.timeout_ms))
            .max_retries(raw.max_retries)
            .retry_delay(Duration::from_millis(raw.retry_delay_ms))
            .max_retry_delay(Duration::from_millis(raw.max_retry_delay_ms))
            .backoff_multiplier(raw.backoff_multiplier)
            .cache_ttl(Duration::from_secs(raw.cache_ttl_secs))
            .fallbacks(raw.fallbacks);
        if let Some(key) = raw.api_key {
            builder = builder.api_key(key);
        }
        if let Some(model) = raw.default_model {
            builder = builder.default_model(model);
        }
        builder.build()
    }
}

impl From<BackendConfig> for RawBackendConfig {
    fn from(config: BackendConfig) -> Self {
        RawBackendConfig {
            provider: config.provider,
            base_url: config.base_url,
            api_key: config.api_key,
            default_model: config.default_model,
            timeout_ms: config.timeout.as_millis() as u64,
            max_retries: config.max_retries,
            retry_delay_ms: config.retry_delay.as_millis() as u64,
            max_retry_delay_ms: config.max_retry_delay.as_millis() as u64,
            backoff_multiplier: config.backoff_multiplier,
            cache_ttl_secs: config.cache_ttl.as_secs(),
            fallbacks: config.fallbacks,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use std::collections::HashMap;

    fn field_of(err: &Error) -> Option<&str> {
        err.context().field_path.as_deref()
    }

    #[test]
    fn test_builder_defaults_and_normalization() {
        let config = BackendConfig::builder(ProviderKind::GenericRemote, "http://localhost:8080/")
            .build()
            .unwrap();
        assert_eq!(config.base_url(), "http://localhost:8080");
        assert_eq!(config.timeout(), DEFAULT_TIMEOUT);
        assert_eq!(config.max_retries(), DEFAULT_MAX_RETRIES);
        assert_eq!(config.cache_ttl(), DEFAULT_CACHE_TTL);
        assert_eq!(config.endpoint("/v1/models"), "http://localhost:8080/v1/models");
    }

    #[test]
    fn test_malformed_url_names_field() {
        let err = BackendConfig::builder(ProviderKind::GenericRemote, "not a url")
            .build()
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert_eq!(field_of(&err), Some("config.base_url"));

        let err = BackendConfig::builder(ProviderKind::GenericRemote, "ftp://example.com")
            .build()
            .unwrap_err();
        assert_eq!(field_of(&err), Some("config.base_url"));
    }

    #[test]
    fn test_numeric_bounds() {
        let err = BackendConfig::builder(ProviderKind::GenericRemote, "http://x")
            .timeout(Duration::ZERO)
            .build()
            .unwrap_err();
        assert_eq!(field_of(&err), Some("config.timeout"));

        let err = BackendConfig::builder(ProviderKind::GenericRemote, "http://x")
            .backoff_multiplier(0.5)
            .build()
            .unwrap_err();
        assert_eq!(field_of(&err), Some("config.backoff_multiplier"));

        let err = BackendConfig::builder(ProviderKind::GenericRemote, "http://x")
            .retry_delay(Duration::from_secs(10))
            .max_retry_delay(Duration::from_secs(1))
            .build()
            .unwrap_err();
        assert_eq!(field_of(&err), Some("config.max_retry_delay"));

        // zero retries and zero ttl are legal
        let config = BackendConfig::builder(ProviderKind::GenericRemote, "http://x")
            .max_retries(0)
            .cache_ttl(Duration::ZERO)
            .build()
            .unwrap();
        assert_eq!(config.max_retries(), 0);
        assert!(config.cache_ttl().is_zero());
    }

    #[test]
    fn test_authenticated_requires_key() {
        let err = BackendConfig::builder(ProviderKind::AuthenticatedRemote, "https://api.example.com")
            .api_key("   ")
            .build()
            .unwrap_err();
        assert_eq!(field_of(&err), Some("config.api_key"));

        let config = BackendConfig::builder(ProviderKind::AuthenticatedRemote, "https://api.example.com")
            .api_key("sk-test")
            .build()
            .unwrap();
        assert_eq!(config.api_key(), Some("sk-test"));
        assert!(!format!("{:?}", config).contains("sk-test"));
    }

    #[test]
    fn test_provider_kind_parsing() {
        assert_eq!("local-embedded".parse::<ProviderKind>().unwrap(), ProviderKind::LocalEmbedded);
        assert_eq!(" Generic_Remote ".parse::<ProviderKind>().unwrap(), ProviderKind::GenericRemote);
        let err = "anthropic".parse::<ProviderKind>().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert_eq!(field_of(&err), Some("config.provider"));
    }

    #[test]
    fn test_yaml_with_nested_fallbacks() {
        let yaml = r#"
provider: local_embedded
base_url: http://127.0.0.1:8081
timeout_ms: 5000
max_retries: 2
cache_ttl_secs: 0
fallbacks:
  - provider: authenticated_remote
    base_url: https://api.example.com
    api_key: sk-fallback
"#;
        let config = BackendConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.provider(), ProviderKind::LocalEmbedded);
        assert_eq!(config.timeout(), Duration::from_millis(5000));
        assert!(config.cache_ttl().is_zero());
        assert_eq!(config.fallbacks().len(), 1);
        assert_eq!(config.fallbacks()[0].provider(), ProviderKind::AuthenticatedRemote);
        assert_eq!(config.fallbacks()[0].max_retries(), DEFAULT_MAX_RETRIES);
    }

    #[test]
    fn test_yaml_rejects_unknown_provider_and_bad_fallback() {
        let err = BackendConfig::from_yaml_str("provider: mystery\nbase_url: http://x\n").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);

        let yaml = "provider: generic_remote\nbase_url: http://x\nfallbacks:\n  - provider: authenticated_remote\n    base_url: http://y\n";
        let err = BackendConfig::from_yaml_str(yaml).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_json_serialization_preserves_fields() {
        let config = BackendConfig::builder(ProviderKind::GenericRemote, "http://a")
            .retry_delay(Duration::from_millis(250))
            .fallback(
                BackendConfig::builder(ProviderKind::LocalEmbedded, "http://b")
                    .build()
                    .unwrap(),
            )
            .build()
            .unwrap();
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"retry_delay_ms\":250"));
        let parsed = BackendConfig::from_json_str(&json).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_from_lookup() {
        let vars: HashMap<&str, &str> = [
            ("AI_RELAY_BASE_URL", "http://10.0.0.5:8000"),
            ("AI_RELAY_PROVIDER", "local_embedded"),
            ("AI_RELAY_MAX_RETRIES", "5"),
            ("AI_RELAY_CACHE_TTL_SECS", "60"),
        ]
        .into_iter()
        .collect();
        let config = BackendConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(config.provider(), ProviderKind::LocalEmbedded);
        assert_eq!(config.max_retries(), 5);
        assert_eq!(config.cache_ttl(), Duration::from_secs(60));

        let err = BackendConfig::from_lookup(|k| {
            (k == "AI_RELAY_BASE_URL").then(|| "http://x".to_string())
                .or_else(|| (k == "AI_RELAY_TIMEOUT_SECS").then(|| "soon".to_string()))
        })
        .unwrap_err();
        assert_eq!(field_of(&err), Some("AI_RELAY_TIMEOUT_SECS"));

        let err = BackendConfig::from_lookup(|_| None).unwrap_err();
        assert_eq!(field_of(&err), Some("config.base_url"));
    }
}
