//! OpenAI-compatible wire format: request bodies, replies, error envelopes,
//! and the mapping from backend failures to [`ErrorKind`].

use crate::config::ProviderKind;
use crate::transport::HttpReply;
use crate::types::{ChatRequest, FinishReason, Generation, Message, ModelInfo, Usage};
use crate::{Error, ErrorContext, ErrorKind, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

pub const CHAT_COMPLETIONS_PATH: &str = "/v1/chat/completions";
pub const MODELS_PATH: &str = "/v1/models";

/// Body of `POST /v1/chat/completions`.
#[derive(Debug, Serialize)]
pub struct ChatCompletionBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<&'a str>,
    pub messages: &'a [Message],
    pub temperature: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    pub stream: bool,
}

impl<'a> ChatCompletionBody<'a> {
    pub fn new(request: &'a ChatRequest, model: Option<&'a str>) -> Self {
        Self {
            model,
            messages: &request.messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            stream: false,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ChatCompletionReply {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub choices: Vec<Choice>,
    #[serde(default)]
    pub usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
pub struct Choice {
    #[serde(default)]
    pub message: Option<ChoiceMessage>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChoiceMessage {
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct WireUsage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
    #[serde(default)]
    pub total_tokens: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct ModelList {
    pub data: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
pub struct ModelEntry {
    pub id: String,
    #[serde(default)]
    pub owned_by: Option<String>,
    #[serde(default)]
    pub created: Option<i64>,
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

impl ModelEntry {
    /// Context window if the backend advertises one under any of the usual names.
    pub fn context_length(&self) -> Option<u64> {
        ["context_length", "context_window", "max_model_len"]
            .iter()
            .find_map(|k| self.extra.get(*k).and_then(Value::as_u64))
            .or_else(|| {
                self.extra
                    .get("meta")
                    .and_then(|m| m.get("n_ctx_train"))
                    .and_then(Value::as_u64)
            })
    }

    pub fn description(&self) -> Option<String> {
        self.extra
            .get("description")
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
            .map(String::from)
    }

    pub fn into_model_info(self, provider: ProviderKind) -> ModelInfo {
        let context_length = self.context_length();
        let description = self.description();
        ModelInfo {
            id: self.id,
            provider,
            context_length,
            description,
            owned_by: self.owned_by,
            created: self.created,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ErrorEnvelope {
    pub error: ErrorBody,
}

#[derive(Debug, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub code: Option<Value>,
}

impl ErrorBody {
    /// `code` may be a string or a number depending on the backend.
    pub fn code_str(&self) -> Option<String> {
        match &self.code {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        }
    }
}

fn kind_from_code(code: &str) -> Option<ErrorKind> {
    match code {
        "model_not_found" | "invalid_model" | "model_not_available" | "model_decommissioned" => {
            Some(ErrorKind::ModelNotFound)
        }
        "rate_limit_exceeded" | "rate_limit_error" | "rate_limited" => Some(ErrorKind::RateLimit),
        "invalid_api_key" | "authentication_error" | "permission_error" | "unauthorized" => {
            Some(ErrorKind::Authentication)
        }
        "timeout" | "request_timeout" => Some(ErrorKind::Timeout),
        "server_error" | "internal_error" | "overloaded" => Some(ErrorKind::Generation),
        _ => None,
    }
}

fn kind_from_status(status: u16, message: &str) -> ErrorKind {
    match status {
        401 | 403 => ErrorKind::Authentication,
        404 if message.to_lowercase().contains("model") => ErrorKind::ModelNotFound,
        408 | 504 => ErrorKind::Timeout,
        429 => ErrorKind::RateLimit,
        400 | 413 | 422 => ErrorKind::Validation,
        _ => ErrorKind::Generation,
    }
}

/// Translate a failed reply (non-2xx, or a 2xx carrying an error envelope)
/// into the matching error kind.
pub fn error_from_reply(reply: &HttpReply, provider: ProviderKind) -> Error {
    let body = serde_json::from_str::<ErrorEnvelope>(&reply.body)
        .map(|e| e.error)
        .unwrap_or_default();
    let code = body.code_str();
    let message = body
        .message
        .clone()
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| truncate(&reply.body, 256));

    let kind = code
        .as_deref()
        .and_then(kind_from_code)
        .or_else(|| body.kind.as_deref().and_then(kind_from_code))
        .unwrap_or_else(|| kind_from_status(reply.status, &message));

    let mut ctx = ErrorContext::new()
        .with_provider(provider)
        .with_status_code(reply.status)
        .with_details(format!("request_id: {}", reply.request_id))
        .with_source("wire");
    if let Some(c) = code.or(body.kind) {
        ctx = ctx.with_error_code(c);
    }
    if let Some(delay) = reply.retry_after {
        ctx = ctx.with_retry_after(delay);
    }
    Error::with_context(kind, format!("backend returned HTTP {}: {}", reply.status, message), ctx)
}

fn truncate(text: &str, max_chars: usize) -> String {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return "<empty body>".to_string();
    }
    match trimmed.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}

/// Parse a chat-completion reply into a [`Generation`].
pub fn parse_generation(
    reply: &HttpReply,
    provider: ProviderKind,
    requested_model: Option<&str>,
) -> Result<Generation> {
    if !reply.is_success() {
        return Err(error_from_reply(reply, provider));
    }
    let value: Value = serde_json::from_str(&reply.body).map_err(|e| Error::from(e).with_provider(provider))?;
    // Some local servers answer 200 with an error envelope.
    if value.get("error").is_some() && value.get("choices").is_none() {
        return Err(error_from_reply(reply, provider));
    }
    let parsed: ChatCompletionReply =
        serde_json::from_value(value).map_err(|e| Error::from(e).with_provider(provider))?;

    let choice = parsed.choices.into_iter().next().ok_or_else(|| {
        Error::generation(
            "backend returned no choices",
            ErrorContext::new()
                .with_provider(provider)
                .with_source("wire"),
        )
    })?;
    let content = choice.message.and_then(|m| m.content).unwrap_or_default();
    let model = parsed
        .model
        .filter(|m| !m.is_empty())
        .or_else(|| requested_model.map(String::from))
        .unwrap_or_else(|| "default".to_string());

    Ok(Generation {
        id: parsed
            .id
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| format!("relay-{}", reply.request_id)),
        content,
        model,
        finish_reason: FinishReason::from_wire(choice.finish_reason.as_deref()),
        usage: parsed
            .usage
            .map(|u| Usage::new(u.prompt_tokens, u.completion_tokens, u.total_tokens)),
        provider,
        latency_ms: reply.latency.as_millis() as u64,
    })
}

/// Parse a `GET /v1/models` reply.
pub fn parse_model_list(reply: &HttpReply, provider: ProviderKind) -> Result<Vec<ModelInfo>> {
    if !reply.is_success() {
        return Err(error_from_reply(reply, provider));
    }
    let value: Value = serde_json::from_str(&reply.body).map_err(|e| Error::from(e).with_provider(provider))?;
    if value.get("error").is_some() && value.get("data").is_none() {
        return Err(error_from_reply(reply, provider));
    }
    let list: ModelList =
        serde_json::from_value(value).map_err(|e| Error::from(e).with_provider(provider))?;
    Ok(list
        .data
        .into_iter()
        .map(|entry| entry.into_model_info(provider))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn reply(status: u16, body: &str) -> HttpReply {
        HttpReply {
            status,
            body: body.to_string(),
            retry_after: None,
            request_id: "req-1".into(),
            latency: Duration::from_millis(12),
        }
    }

    #[test]
    fn test_body_shape() {
        let request = ChatRequest::new(vec![Message::user("hi")]).max_tokens(32);
        let body = serde_json::to_value(ChatCompletionBody::new(&request, Some("llama-3"))).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "model": "llama-3",
                "messages": [{"role": "user", "content": "hi"}],
                "temperature": 0.7,
                "max_tokens": 32,
                "stream": false
            })
        );

        let body = serde_json::to_value(ChatCompletionBody::new(&request.clone(), None)).unwrap();
        assert!(body.get("model").is_none());
    }

    #[test]
    fn test_parse_generation() {
        let body = r#"{"id":"chatcmpl-1","model":"gpt-x","choices":[{"message":{"role":"assistant","content":"Hello"},"finish_reason":"length"}],"usage":{"prompt_tokens":3,"completion_tokens":2}}"#;
        let generation = parse_generation(&reply(200, body), ProviderKind::GenericRemote, None).unwrap();
        assert_eq!(generation.id, "chatcmpl-1");
        assert_eq!(generation.content, "Hello");
        assert_eq!(generation.model, "gpt-x");
        assert_eq!(generation.finish_reason, FinishReason::Length);
        assert_eq!(generation.usage.unwrap().total_tokens, 5);
        assert_eq!(generation.latency_ms, 12);
    }

    #[test]
    fn test_parse_generation_fills_missing_id_and_model() {
        let body = r#"{"choices":[{"message":{"content":"ok"}}]}"#;
        let generation =
            parse_generation(&reply(200, body), ProviderKind::LocalEmbedded, Some("phi-3")).unwrap();
        assert_eq!(generation.id, "relay-req-1");
        assert_eq!(generation.model, "phi-3");
        assert_eq!(generation.finish_reason, FinishReason::Stop);
    }

    #[test]
    fn test_parse_generation_failures() {
        let err = parse_generation(&reply(200, r#"{"choices":[]}"#), ProviderKind::GenericRemote, None)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Generation);

        let err = parse_generation(&reply(200, "not json"), ProviderKind::GenericRemote, None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Generation);
        assert_eq!(err.provider(), Some(ProviderKind::GenericRemote));

        let err = parse_generation(
            &reply(200, r#"{"error":{"message":"model crashed","type":"server_error"}}"#),
            ProviderKind::LocalEmbedded,
            None,
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Generation);
    }

    #[test]
    fn test_error_mapping() {
        let cases = [
            (401, r#"{"error":{"message":"bad key","type":"invalid_request_error","code":"invalid_api_key"}}"#, ErrorKind::Authentication),
            (403, "", ErrorKind::Authentication),
            (404, r#"{"error":{"message":"The model `x` does not exist","type":"invalid_request_error","code":"model_not_found"}}"#, ErrorKind::ModelNotFound),
            (404, r#"{"error":{"message":"model 'x' not found"}}"#, ErrorKind::ModelNotFound),
            (404, "page not found", ErrorKind::Generation),
            (429, r#"{"error":{"message":"slow down","type":"requests","code":"rate_limit_exceeded"}}"#, ErrorKind::RateLimit),
            (400, r#"{"error":{"message":"temperature too high","type":"invalid_request_error"}}"#, ErrorKind::Validation),
            (408, "", ErrorKind::Timeout),
            (504, "gateway timeout", ErrorKind::Timeout),
            (500, r#"{"error":{"message":"boom","type":"server_error","code":null}}"#, ErrorKind::Generation),
            (503, "", ErrorKind::Generation),
        ];
        for (status, body, expected) in cases {
            let err = error_from_reply(&reply(status, body), ProviderKind::GenericRemote);
            assert_eq!(err.kind(), expected, "status {} body {}", status, body);
            assert_eq!(err.context().status_code, Some(status));
        }
    }

    #[test]
    fn test_error_keeps_retry_after_and_code() {
        let mut r = reply(429, r#"{"error":{"message":"slow","code":429}}"#);
        r.retry_after = Some(Duration::from_secs(3));
        let err = error_from_reply(&r, ProviderKind::AuthenticatedRemote);
        assert_eq!(err.kind(), ErrorKind::RateLimit);
        assert_eq!(err.context().retry_after, Some(Duration::from_secs(3)));
        assert_eq!(err.context().error_code.as_deref(), Some("429"));
    }

    #[test]
    fn test_parse_model_list() {
        let body = r#"{"object":"list","data":[
            {"id":"llama-3-8b","object":"model","owned_by":"llamacpp","created":1700000000,"meta":{"n_ctx_train":8192}},
            {"id":"qwen","owned_by":"vllm","max_model_len":32768,"description":"Qwen chat"},
            {"id":"bare"}
        ]}"#;
        let models = parse_model_list(&reply(200, body), ProviderKind::LocalEmbedded).unwrap();
        assert_eq!(models.len(), 3);
        assert_eq!(models[0].context_length, Some(8192));
        assert_eq!(models[0].owned_by.as_deref(), Some("llamacpp"));
        assert_eq!(models[0].created, Some(1_700_000_000));
        assert_eq!(models[1].context_length, Some(32768));
        assert_eq!(models[1].description.as_deref(), Some("Qwen chat"));
        assert_eq!(models[2].context_length, None);
        assert!(models.iter().all(|m| m.provider == ProviderKind::LocalEmbedded));
    }

    #[test]
    fn test_model_list_error_envelope_on_success_status() {
        let body = r#"{"error":{"message":"model store unavailable","type":"server_error"}}"#;
        let err = parse_model_list(&reply(200, body), ProviderKind::LocalEmbedded).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Generation);
        assert!(err.message().contains("model store unavailable"));
        assert_eq!(err.provider(), Some(ProviderKind::LocalEmbedded));
    }

    #[test]
    fn test_model_list_without_data_is_rejected() {
        let err = parse_model_list(&reply(200, r#"{"object":"list"}"#), ProviderKind::GenericRemote).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Generation);

        let models = parse_model_list(&reply(200, r#"{"data":[]}"#), ProviderKind::GenericRemote).unwrap();
        assert!(models.is_empty());
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        let long = "é".repeat(300);
        let t = truncate(&long, 256);
        assert!(t.ends_with("..."));
        assert_eq!(t.chars().count(), 259);
    }
}
