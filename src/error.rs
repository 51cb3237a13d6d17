use crate::config::ProviderKind;
use std::time::Duration;
use thiserror::Error;

/// Boxed underlying cause attached to an [`Error`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Structured error context for better error handling and debugging.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorContext {
    /// Provider kind involved in the failure, if known.
    pub provider: Option<ProviderKind>,
    /// Field path or configuration key that caused the error (e.g. "config.base_url", "request.messages[0].content")
    pub field_path: Option<String>,
    /// Additional context about the error (e.g. expected range, actual value)
    pub details: Option<String>,
    /// Component that raised the error (e.g. "openai_adapter", "request_validator")
    pub source: Option<String>,
    /// HTTP status returned by the backend.
    pub status_code: Option<u16>,
    /// Backend-reported error code (`error.code` or `error.type`).
    pub error_code: Option<String>,
    /// Server-provided hint for how long to wait before retrying.
    pub retry_after: Option<Duration>,
    /// Total attempts made before the error surfaced.
    pub attempts: Option<u32>,
    /// Retries accumulated across every configuration that was tried.
    pub retry_count: Option<u32>,
    /// Base addresses of the configurations that were tried, in order.
    pub tried: Vec<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_provider(mut self, provider: ProviderKind) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn with_field_path(mut self, path: impl Into<String>) -> Self {
        self.field_path = Some(path.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_status_code(mut self, status: u16) -> Self {
        self.status_code = Some(status);
        self
    }

    pub fn with_error_code(mut self, code: impl Into<String>) -> Self {
        self.error_code = Some(code.into());
        self
    }

    pub fn with_retry_after(mut self, delay: Duration) -> Self {
        self.retry_after = Some(delay);
        self
    }
}

/// Error kind without payload, used for classification and matching in tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Configuration,
    Connection,
    Authentication,
    ModelNotFound,
    RateLimit,
    Timeout,
    Validation,
    Generation,
}

impl ErrorKind {
    /// Whether the retry executor may attempt the same backend again.
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            ErrorKind::Connection | ErrorKind::RateLimit | ErrorKind::Timeout | ErrorKind::Generation
        )
    }

    /// Whether the client may move on to the next fallback configuration.
    ///
    /// Configuration and validation failures would fail identically on any backend.
    pub fn is_fallbackable(self) -> bool {
        !matches!(self, ErrorKind::Configuration | ErrorKind::Validation)
    }
}

/// Unified error type for the relay client.
///
/// Every variant shares the same payload: a message, structured context and
/// an optional underlying cause.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {message}{}", format_context(.context))]
    Configuration {
        message: String,
        context: ErrorContext,
        #[source]
        cause: Option<BoxError>,
    },

    #[error("Connection error: {message}{}", format_context(.context))]
    Connection {
        message: String,
        context: ErrorContext,
        #[source]
        cause: Option<BoxError>,
    },

    #[error("Authentication error: {message}{}", format_context(.context))]
    Authentication {
        message: String,
        context: ErrorContext,
        #[source]
        cause: Option<BoxError>,
    },

    #[error("Model not found: {message}{}", format_context(.context))]
    ModelNotFound {
        message: String,
        context: ErrorContext,
        #[source]
        cause: Option<BoxError>,
    },

    #[error("Rate limited: {message}{}", format_context(.context))]
    RateLimit {
        message: String,
        context: ErrorContext,
        #[source]
        cause: Option<BoxError>,
    },

    #[error("Timeout: {message}{}", format_context(.context))]
    Timeout {
        message: String,
        context: ErrorContext,
        #[source]
        cause: Option<BoxError>,
    },

    #[error("Validation error: {message}{}", format_context(.context))]
    Validation {
        message: String,
        context: ErrorContext,
        #[source]
        cause: Option<BoxError>,
    },

    #[error("Generation error: {message}{}", format_context(.context))]
    Generation {
        message: String,
        context: ErrorContext,
        #[source]
        cause: Option<BoxError>,
    },
}

// Helper function to format error context for display
fn format_context(ctx: &ErrorContext) -> String {
    let mut parts = Vec::new();
    if let Some(provider) = ctx.provider {
        parts.push(format!("provider: {}", provider));
    }
    if let Some(ref field) = ctx.field_path {
        parts.push(format!("field: {}", field));
    }
    if let Some(status) = ctx.status_code {
        parts.push(format!("status: {}", status));
    }
    if let Some(ref code) = ctx.error_code {
        parts.push(format!("code: {}", code));
    }
    if let Some(ref details) = ctx.details {
        parts.push(format!("details: {}", details));
    }
    if let Some(ref source) = ctx.source {
        parts.push(format!("source: {}", source));
    }
    if let Some(attempts) = ctx.attempts {
        parts.push(format!("attempts: {}", attempts));
    }
    if !ctx.tried.is_empty() {
        parts.push(format!("tried: [{}]", ctx.tried.join(", ")));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" ({})", parts.join(", "))
    }
}

impl Error {
    /// Build an error of the given kind with an empty context.
    pub fn new(kind: ErrorKind, msg: impl Into<String>) -> Self {
        Self::with_context(kind, msg, ErrorContext::new())
    }

    /// Build an error of the given kind with structured context.
    pub fn with_context(kind: ErrorKind, msg: impl Into<String>, context: ErrorContext) -> Self {
        let message = msg.into();
        let cause = None;
        match kind {
            ErrorKind::Configuration => Error::Configuration { message, context, cause },
            ErrorKind::Connection => Error::Connection { message, context, cause },
            ErrorKind::Authentication => Error::Authentication { message, context, cause },
            ErrorKind::ModelNotFound => Error::ModelNotFound { message, context, cause },
            ErrorKind::RateLimit => Error::RateLimit { message, context, cause },
            ErrorKind::Timeout => Error::Timeout { message, context, cause },
            ErrorKind::Validation => Error::Validation { message, context, cause },
            ErrorKind::Generation => Error::Generation { message, context, cause },
        }
    }

    pub fn configuration(msg: impl Into<String>, context: ErrorContext) -> Self {
        Self::with_context(ErrorKind::Configuration, msg, context)
    }

    pub fn validation(msg: impl Into<String>, context: ErrorContext) -> Self {
        Self::with_context(ErrorKind::Validation, msg, context)
    }

    pub fn connection(msg: impl Into<String>, context: ErrorContext) -> Self {
        Self::with_context(ErrorKind::Connection, msg, context)
    }

    pub fn timeout(msg: impl Into<String>, context: ErrorContext) -> Self {
        Self::with_context(ErrorKind::Timeout, msg, context)
    }

    pub fn generation(msg: impl Into<String>, context: ErrorContext) -> Self {
        Self::with_context(ErrorKind::Generation, msg, context)
    }

    /// Attach an underlying cause.
    pub fn with_cause(mut self, err: impl Into<BoxError>) -> Self {
        *self.cause_mut() = Some(err.into());
        self
    }

    /// Attach the provider kind, keeping an already-recorded one.
    pub fn with_provider(mut self, provider: ProviderKind) -> Self {
        let ctx = self.context_mut();
        if ctx.provider.is_none() {
            ctx.provider = Some(provider);
        }
        self
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Configuration { .. } => ErrorKind::Configuration,
            Error::Connection { .. } => ErrorKind::Connection,
            Error::Authentication { .. } => ErrorKind::Authentication,
            Error::ModelNotFound { .. } => ErrorKind::ModelNotFound,
            Error::RateLimit { .. } => ErrorKind::RateLimit,
            Error::Timeout { .. } => ErrorKind::Timeout,
            Error::Validation { .. } => ErrorKind::Validation,
            Error::Generation { .. } => ErrorKind::Generation,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Error::Configuration { message, .. }
            | Error::Connection { message, .. }
            | Error::Authentication { message, .. }
            | Error::ModelNotFound { message, .. }
            | Error::RateLimit { message, .. }
            | Error::Timeout { message, .. }
            | Error::Validation { message, .. }
            | Error::Generation { message, .. } => message,
        }
    }

    pub fn context(&self) -> &ErrorContext {
        match self {
            Error::Configuration { context, .. }
            | Error::Connection { context, .. }
            | Error::Authentication { context, .. }
            | Error::ModelNotFound { context, .. }
            | Error::RateLimit { context, .. }
            | Error::Timeout { context, .. }
            | Error::Validation { context, .. }
            | Error::Generation { context, .. } => context,
        }
    }

    pub(crate) fn context_mut(&mut self) -> &mut ErrorContext {
        match self {
            Error::Configuration { context, .. }
            | Error::Connection { context, .. }
            | Error::Authentication { context, .. }
            | Error::ModelNotFound { context, .. }
            | Error::RateLimit { context, .. }
            | Error::Timeout { context, .. }
            | Error::Validation { context, .. }
            | Error::Generation { context, .. } => context,
        }
    }

    fn cause_mut(&mut self) -> &mut Option<BoxError> {
        match self {
            Error::Configuration { cause, .. }
            | Error::Connection { cause, .. }
            | Error::Authentication { cause, .. }
            | Error::ModelNotFound { cause, .. }
            | Error::RateLimit { cause, .. }
            | Error::Timeout { cause, .. }
            | Error::Validation { cause, .. }
            | Error::Generation { cause, .. } => cause,
        }
    }

    pub fn provider(&self) -> Option<ProviderKind> {
        self.context().provider
    }

    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }

    pub fn is_fallbackable(&self) -> bool {
        self.kind().is_fallbackable()
    }

    /// True when the client gave up after trying every configuration in its chain.
    pub fn is_exhausted(&self) -> bool {
        self.is_fallbackable() && !self.context().tried.is_empty()
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::generation(
            format!("malformed JSON payload: {}", err),
            ErrorContext::new().with_source("json_parse"),
        )
        .with_cause(err)
    }
}
