use crate::config::ProviderKind;
use crate::{Error, ErrorContext, Result};
use reqwest::header::HeaderMap;
use reqwest::Proxy;
use serde::Serialize;
use std::env;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Raw HTTP reply handed back to adapters for status-aware parsing.
#[derive(Debug, Clone)]
pub struct HttpReply {
    pub status: u16,
    pub body: String,
    /// Parsed `Retry-After` header (seconds form only).
    pub retry_after: Option<Duration>,
    pub request_id: String,
    pub latency: Duration,
}

impl HttpReply {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Shared HTTP client. Cloning is cheap and shares the connection pool.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Build the pooled client. No connection is opened here.
    pub fn new() -> Result<Self> {
        // Minimal production-friendly defaults (env-overridable).
        let mut builder = reqwest::Client::builder()
            .pool_max_idle_per_host(
                env::var("AI_HTTP_POOL_MAX_IDLE_PER_HOST")
                    .ok()
                    .and_then(|s| s.parse::<usize>().ok())
                    .unwrap_or(32),
            )
            .pool_idle_timeout(Some(Duration::from_secs(
                env::var("AI_HTTP_POOL_IDLE_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse::<u64>().ok())
                    .unwrap_or(90),
            )));

        if let Ok(proxy_url) = env::var("AI_PROXY_URL") {
            if let Ok(proxy) = Proxy::all(&proxy_url) {
                builder = builder.proxy(proxy);
            }
        }

        let client = builder.build().map_err(|e| {
            Error::configuration(
                "failed to initialise HTTP client",
                ErrorContext::new().with_source("http_transport"),
            )
            .with_cause(e)
        })?;
        Ok(Self { client })
    }

    pub async fn post_json<B: Serialize + ?Sized>(
        &self,
        url: &str,
        body: &B,
        api_key: Option<&str>,
        timeout: Duration,
        provider: ProviderKind,
    ) -> Result<HttpReply> {
        let req = self.client.post(url).json(body);
        self.send(req, url, api_key, timeout, provider).await
    }

    pub async fn get(
        &self,
        url: &str,
        api_key: Option<&str>,
        timeout: Duration,
        provider: ProviderKind,
    ) -> Result<HttpReply> {
        let req = self.client.get(url);
        self.send(req, url, api_key, timeout, provider).await
    }

    async fn send(
        &self,
        mut req: reqwest::RequestBuilder,
        url: &str,
        api_key: Option<&str>,
        timeout: Duration,
        provider: ProviderKind,
    ) -> Result<HttpReply> {
        let request_id = Uuid::new_v4().to_string();
        req = req
            .timeout(timeout)
            .header("accept", "application/json")
            // Our own correlation id. Backends may ignore it.
            .header("x-request-id", request_id.as_str());
        if let Some(key) = api_key {
            req = req.bearer_auth(key);
        }

        let start = Instant::now();
        let resp = req
            .send()
            .await
            .map_err(|e| map_reqwest_error(e, url, provider))?;
        let status = resp.status().as_u16();
        let retry_after = retry_after(resp.headers());
        let body = resp
            .text()
            .await
            .map_err(|e| map_body_error(e, url, provider, status))?;

        Ok(HttpReply {
            status,
            body,
            retry_after,
            request_id,
            latency: start.elapsed(),
        })
    }
}

/// Best-effort parsing of `Retry-After` header.
///
/// Only the common `Retry-After: <seconds>` form is supported.
fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    let raw = headers.get("retry-after")?.to_str().ok()?.trim();
    raw.parse::<u64>().ok().map(Duration::from_secs)
}

fn map_reqwest_error(err: reqwest::Error, url: &str, provider: ProviderKind) -> Error {
    let ctx = ErrorContext::new()
        .with_provider(provider)
        .with_details(format!("url: {}", url))
        .with_source("http_transport");
    if err.is_timeout() {
        Error::timeout("request exceeded its time bound", ctx).with_cause(err)
    } else if err.is_connect() {
        Error::connection("backend unreachable", ctx).with_cause(err)
    } else {
        Error::connection(format!("transport failure: {}", err), ctx).with_cause(err)
    }
}

/// The backend already answered; a broken body is a failed generation, not an unreachable host.
fn map_body_error(err: reqwest::Error, url: &str, provider: ProviderKind, status: u16) -> Error {
    if err.is_timeout() {
        return map_reqwest_error(err, url, provider);
    }
    let ctx = ErrorContext::new()
        .with_provider(provider)
        .with_status_code(status)
        .with_details(format!("url: {}", url))
        .with_source("http_transport");
    Error::generation(format!("reply body could not be read: {}", err), ctx).with_cause(err)
}
