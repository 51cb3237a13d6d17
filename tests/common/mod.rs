//! Shared fixtures for integration tests: a mockito-backed backend and a
//! scripted in-process adapter.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ai_relay::adapters::BackendAdapter;
use ai_relay::{
    BackendConfig, ChatRequest, Error, ErrorContext, ErrorKind, FinishReason, Generation, ModelInfo,
    ProviderKind, Result,
};
use async_trait::async_trait;
use mockito::{Mock, Server, ServerGuard};

pub const CHAT_PATH: &str = "/v1/chat/completions";
pub const MODELS_PATH: &str = "/v1/models";

/// Test fixture that manages a mock OpenAI-compatible server.
pub struct MockBackend {
    pub server: ServerGuard,
}

impl MockBackend {
    pub async fn new() -> Self {
        Self {
            server: Server::new_async().await,
        }
    }

    pub fn url(&self) -> String {
        self.server.url()
    }

    /// Configuration pointing at this server with fast retries.
    pub fn config(&self, provider: ProviderKind, max_retries: u32) -> BackendConfig {
        let mut builder = BackendConfig::builder(provider, self.url())
            .max_retries(max_retries)
            .retry_delay(Duration::from_millis(10))
            .max_retry_delay(Duration::from_millis(50))
            .timeout(Duration::from_secs(5));
        if provider == ProviderKind::AuthenticatedRemote {
            builder = builder.api_key("sk-test");
        }
        builder.build().expect("valid test config")
    }

    pub async fn mock_chat(&mut self, status: usize, body: &str, hits: usize) -> Mock {
        self.server
            .mock("POST", CHAT_PATH)
            .with_status(status)
            .with_header("content-type", "application/json")
            .with_body(body)
            .expect(hits)
            .create_async()
            .await
    }

    pub async fn mock_models(&mut self, body: &str, hits: usize) -> Mock {
        self.server
            .mock("GET", MODELS_PATH)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body)
            .expect(hits)
            .create_async()
            .await
    }
}

pub fn completion_body(id: &str, content: &str) -> String {
    serde_json::json!({
        "id": id,
        "object": "chat.completion",
        "model": "mock-model",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop"
        }],
        "usage": {"prompt_tokens": 9, "completion_tokens": 3, "total_tokens": 12}
    })
    .to_string()
}

pub fn error_body(message: &str, kind: &str, code: Option<&str>) -> String {
    serde_json::json!({"error": {"message": message, "type": kind, "code": code}}).to_string()
}

/// How a scripted backend answers `generate`.
#[derive(Debug, Clone, Copy)]
pub enum Behavior {
    Succeed,
    AlwaysFail(ErrorKind),
    /// Fail with the given kind this many times, then succeed.
    FailTimes(usize, ErrorKind),
}

/// In-process adapter whose answers are scripted per base address.
#[derive(Debug)]
pub struct ScriptedAdapter {
    provider: ProviderKind,
    behaviors: HashMap<String, Behavior>,
    calls: Mutex<Vec<String>>,
    list_calls: AtomicUsize,
    list_delay: Duration,
}

impl ScriptedAdapter {
    pub fn new(provider: ProviderKind) -> Self {
        Self {
            provider,
            behaviors: HashMap::new(),
            calls: Mutex::new(Vec::new()),
            list_calls: AtomicUsize::new(0),
            list_delay: Duration::ZERO,
        }
    }

    pub fn on(mut self, base_url: &str, behavior: Behavior) -> Self {
        self.behaviors.insert(base_url.to_string(), behavior);
        self
    }

    pub fn list_delay(mut self, delay: Duration) -> Self {
        self.list_delay = delay;
        self
    }

    pub fn into_arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Base addresses of every `generate` call, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, base_url: &str) -> usize {
        self.calls().iter().filter(|c| c.as_str() == base_url).count()
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BackendAdapter for ScriptedAdapter {
    fn provider(&self) -> ProviderKind {
        self.provider
    }

    async fn generate(&self, _request: &ChatRequest, config: &BackendConfig) -> Result<Generation> {
        let seen = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(config.base_url().to_string());
            calls.iter().filter(|c| c.as_str() == config.base_url()).count()
        };
        let behavior = self
            .behaviors
            .get(config.base_url())
            .copied()
            .unwrap_or(Behavior::Succeed);
        let failure = match behavior {
            Behavior::Succeed => None,
            Behavior::AlwaysFail(kind) => Some(kind),
            Behavior::FailTimes(n, kind) if seen <= n => Some(kind),
            Behavior::FailTimes(..) => None,
        };
        match failure {
            Some(kind) => Err(Error::with_context(
                kind,
                format!("scripted failure #{}", seen),
                ErrorContext::new().with_provider(self.provider),
            )),
            None => Ok(Generation {
                id: format!("gen-{}", seen),
                content: format!("answer from {}", config.base_url()),
                model: "scripted-model".into(),
                finish_reason: FinishReason::Stop,
                usage: None,
                provider: self.provider,
                latency_ms: 1,
            }),
        }
    }

    async fn list_models(&self, _config: &BackendConfig) -> Result<Vec<ModelInfo>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if !self.list_delay.is_zero() {
            tokio::time::sleep(self.list_delay).await;
        }
        Ok(vec![
            ModelInfo::new("scripted-small", self.provider).with_context_length(4096),
            ModelInfo::new("scripted-large", self.provider).with_context_length(32768),
        ])
    }

    async fn health_check(&self, config: &BackendConfig) -> bool {
        !matches!(self.behaviors.get(config.base_url()), Some(Behavior::AlwaysFail(_)))
    }
}

pub fn scripted_config(provider: ProviderKind, base_url: &str, max_retries: u32) -> BackendConfig {
    let mut builder = BackendConfig::builder(provider, base_url)
        .max_retries(max_retries)
        .retry_delay(Duration::from_millis(1))
        .max_retry_delay(Duration::from_millis(5));
    if provider == ProviderKind::AuthenticatedRemote {
        builder = builder.api_key("sk-test");
    }
    builder.build().expect("valid test config")
}
