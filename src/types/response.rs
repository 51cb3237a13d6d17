//! Generation results.

use crate::config::ProviderKind;
use serde::{Deserialize, Serialize};

/// Token usage information.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

impl Usage {
    /// Build from reported counts, deriving the total when the backend omits it.
    pub fn new(prompt_tokens: u64, completion_tokens: u64, total_tokens: Option<u64>) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: total_tokens
                .unwrap_or_else(|| prompt_tokens.saturating_add(completion_tokens)),
        }
    }

    /// Whether the reported total matches prompt + completion.
    pub fn is_consistent(&self) -> bool {
        self.prompt_tokens.saturating_add(self.completion_tokens) == self.total_tokens
    }
}

/// Why the backend stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FinishReason {
    Stop,
    Length,
    Error,
}

impl FinishReason {
    /// Normalize a backend `finish_reason`. A missing value counts as a normal stop.
    pub fn from_wire(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            None | Some("stop") | Some("eos") | Some("end_turn") | Some("stop_sequence") => {
                FinishReason::Stop
            }
            Some("length") | Some("max_tokens") => FinishReason::Length,
            Some(_) => FinishReason::Error,
        }
    }
}

/// What an adapter produces for a single successful attempt.
///
/// The client turns this into a [`ChatResponse`] once retry and fallback
/// bookkeeping is known.
#[derive(Debug, Clone, PartialEq)]
pub struct Generation {
    pub id: String,
    pub content: String,
    pub model: String,
    pub finish_reason: FinishReason,
    pub usage: Option<Usage>,
    pub provider: ProviderKind,
    pub latency_ms: u64,
}

/// Provenance recorded by the client while driving retries and fallbacks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DeliveryMetadata {
    pub retry_count: u32,
    pub attempts: u32,
    pub used_fallback: bool,
    pub served_by: String,
    pub elapsed_ms: u64,
}

/// Final response handed back to the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatResponse {
    id: String,
    content: String,
    model: String,
    finish_reason: FinishReason,
    usage: Option<Usage>,
    provider: ProviderKind,
    latency_ms: u64,
    elapsed_ms: u64,
    retry_count: u32,
    attempts: u32,
    used_fallback: bool,
    served_by: String,
}

impl ChatResponse {
    pub(crate) fn from_generation(generation: Generation, meta: DeliveryMetadata) -> Self {
        Self {
            id: generation.id,
            content: generation.content,
            model: generation.model,
            finish_reason: generation.finish_reason,
            usage: generation.usage,
            provider: generation.provider,
            latency_ms: generation.latency_ms,
            elapsed_ms: meta.elapsed_ms,
            retry_count: meta.retry_count,
            attempts: meta.attempts,
            used_fallback: meta.used_fallback,
            served_by: meta.served_by,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    /// Model identifier as resolved by the serving backend.
    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn finish_reason(&self) -> FinishReason {
        self.finish_reason
    }

    pub fn usage(&self) -> Option<&Usage> {
        self.usage.as_ref()
    }

    /// Provider kind that actually served the request.
    pub fn provider(&self) -> ProviderKind {
        self.provider
    }

    /// Latency of the successful attempt.
    pub fn latency_ms(&self) -> u64 {
        self.latency_ms
    }

    /// Wall time of the whole call, backoff waits and failed attempts included.
    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed_ms
    }

    /// Retries accumulated across every configuration that was tried.
    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn used_fallback(&self) -> bool {
        self.used_fallback
    }

    /// Provider kind of the fallback configuration that served, if one did.
    pub fn fallback_provider(&self) -> Option<ProviderKind> {
        self.used_fallback.then_some(self.provider)
    }

    /// Base address of the backend that served the request.
    pub fn served_by(&self) -> &str {
        &self.served_by
    }
}
