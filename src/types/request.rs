//! Generation request assembled by the caller.

use super::message::{Message, MessageRole};
use crate::{Error, ErrorContext, Result};
use std::time::Duration;

pub const DEFAULT_TEMPERATURE: f64 = 0.7;
pub const MAX_TEMPERATURE: f64 = 2.0;

/// A chat-completion request.
///
/// Fields stay public so callers can keep adjusting the request until it is
/// handed to the client; [`ChatRequest::validate`] runs before any attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub messages: Vec<Message>,
    /// Explicit model; `None` falls back to the configuration default, then the backend default.
    pub model: Option<String>,
    pub temperature: f64,
    pub max_tokens: Option<u32>,
    /// Per-request override of the configured attempt timeout.
    pub timeout: Option<Duration>,
}

impl ChatRequest {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            model: None,
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: None,
            timeout: None,
        }
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Check the request against the contract every backend expects.
    pub fn validate(&self) -> Result<()> {
        let ctx = |field: String| {
            ErrorContext::new()
                .with_field_path(field)
                .with_source("request_validator")
        };

        if self.messages.is_empty() {
            return Err(Error::validation(
                "request must contain at least one message",
                ctx("request.messages".into()),
            ));
        }
        for (idx, message) in self.messages.iter().enumerate() {
            if message.content().trim().is_empty() {
                return Err(Error::validation(
                    format!("{} message content must not be empty", message.role()),
                    ctx(format!("request.messages[{}].content", idx)),
                ));
            }
        }
        if !self.messages.iter().any(|m| m.role() == MessageRole::User) {
            return Err(Error::validation(
                "request must contain at least one user message",
                ctx("request.messages".into()),
            ));
        }
        if !self.temperature.is_finite() || !(0.0..=MAX_TEMPERATURE).contains(&self.temperature) {
            return Err(Error::validation(
                format!("temperature must be within [0.0, 2.0], got {}", self.temperature),
                ctx("request.temperature".into()),
            ));
        }
        if self.max_tokens == Some(0) {
            return Err(Error::validation(
                "max_tokens must be positive",
                ctx("request.max_tokens".into()),
            ));
        }
        if self.timeout.map(|t| t.is_zero()).unwrap_or(false) {
            return Err(Error::validation(
                "timeout override must be greater than zero",
                ctx("request.timeout".into()),
            ));
        }
        if self.model.as_deref().map(|m| m.trim().is_empty()).unwrap_or(false) {
            return Err(Error::validation(
                "model identifier must not be blank",
                ctx("request.model".into()),
            ));
        }
        Ok(())
    }
}
