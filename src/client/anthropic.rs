//! Anthropic Messages API client with native PDF input.
//!
//! Each PDF goes up as a base64 `document` content block, followed by one
//! `text` block carrying the prompt, all in a single user turn. The model
//! reads the PDF itself (text layer and page images), so no local
//! rasterisation is needed.

use super::{InferenceClient, InferenceRequest, InferenceResponse};
use crate::config::ReviewConfig;
use crate::error::ReviewError;
use crate::output::TokenUsage;
use crate::pipeline::encode::encode_document;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, info};

const ANTHROPIC_VERSION: &str = "2023-06-01";
const PROVIDER: &str = "anthropic";

/// Client for `POST {base_url}/messages`.
pub struct AnthropicClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl std::fmt::Debug for AnthropicClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicClient")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl AnthropicClient {
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ReviewError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ReviewError::Internal(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self {
            http,
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
        })
    }

    /// Build from config; the key comes from `config.api_key` or `ANTHROPIC_API_KEY`.
    pub fn from_config(config: &ReviewConfig) -> Result<Self, ReviewError> {
        let key = resolve_api_key(
            config.api_key.as_deref(),
            std::env::var("ANTHROPIC_API_KEY").ok(),
        )?;
        Self::new(
            key,
            config.model.clone(),
            config.api_base_url.clone(),
            Duration::from_secs(config.api_timeout_secs),
        )
    }
}

#[async_trait]
impl InferenceClient for AnthropicClient {
    fn name(&self) -> &str {
        PROVIDER
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &InferenceRequest) -> Result<InferenceResponse, ReviewError> {
        let body = build_body(&self.model, request);
        let url = format!("{}/messages", self.base_url);
        info!(
            "Sending {} document(s) to {} ({})",
            request.documents.len(),
            self.model,
            url
        );

        let start = Instant::now();
        let response = self
            .http
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error(e, start))?;

        let status = response.status();
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());
        let raw = response
            .text()
            .await
            .map_err(|e| transport_error(e, start))?;
        debug!(
            "HTTP {} after {}ms ({} bytes)",
            status.as_u16(),
            start.elapsed().as_millis(),
            raw.len()
        );

        if !status.is_success() {
            return Err(map_error(status.as_u16(), &raw, retry_after));
        }
        parse_success(&raw)
    }
}

// ── Wire types ───────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    messages: Vec<Message<'a>>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: Vec<ContentBlock<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock<'a> {
    Document {
        source: DocumentSource,
        title: String,
    },
    Text {
        text: &'a str,
    },
}

#[derive(Debug, Serialize)]
struct DocumentSource {
    #[serde(rename = "type")]
    kind: &'static str,
    media_type: &'static str,
    data: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ResponseBlock>,
    #[serde(default)]
    usage: Usage,
}

#[derive(Debug, Deserialize)]
struct ResponseBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Usage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default, rename = "type")]
    kind: Option<String>,
    message: String,
}

// ── Helpers ──────────────────────────────────────────────────────────────

fn resolve_api_key(explicit: Option<&str>, env: Option<String>) -> Result<String, ReviewError> {
    explicit
        .map(str::to_string)
        .or(env)
        .filter(|k| !k.trim().is_empty())
        .ok_or_else(|| ReviewError::ProviderNotConfigured {
            provider: PROVIDER.to_string(),
            hint: "Set ANTHROPIC_API_KEY, or use --backend vision with another provider.".into(),
        })
}

fn build_body<'a>(model: &'a str, request: &'a InferenceRequest) -> MessagesRequest<'a> {
    let mut content: Vec<ContentBlock<'a>> = request
        .documents
        .iter()
        .map(|doc| ContentBlock::Document {
            source: DocumentSource {
                kind: "base64",
                media_type: "application/pdf",
                data: encode_document(&doc.bytes),
            },
            title: doc.file_name(),
        })
        .collect();
    content.push(ContentBlock::Text {
        text: &request.prompt,
    });

    MessagesRequest {
        model,
        max_tokens: request.max_tokens,
        temperature: request.temperature,
        messages: vec![Message {
            role: "user",
            content,
        }],
    }
}

/// Decode a 2xx body into text and usage.
pub(crate) fn parse_success(raw: &str) -> Result<InferenceResponse, ReviewError> {
    let body: MessagesResponse = serde_json::from_str(raw).map_err(|e| ReviewError::ApiError {
        status: None,
        message: format!("Failed to parse response: {e}"),
    })?;

    let text = body
        .content
        .iter()
        .filter(|b| b.kind == "text")
        .filter_map(|b| b.text.as_deref())
        .collect::<Vec<_>>()
        .join("\n");
    if text.trim().is_empty() {
        return Err(ReviewError::EmptyResponse);
    }

    let usage = TokenUsage {
        input_tokens: body.usage.input_tokens,
        output_tokens: body.usage.output_tokens,
    };
    debug!(
        "{} input tokens, {} output tokens",
        usage.input_tokens, usage.output_tokens
    );
    Ok(InferenceResponse { text, usage })
}

/// Map a non-2xx response onto the error taxonomy.
pub(crate) fn map_error(status: u16, raw: &str, retry_after: Option<u64>) -> ReviewError {
    let detail = match serde_json::from_str::<ErrorEnvelope>(raw) {
        Ok(env) => match env.error.kind {
            Some(kind) => format!("{kind}: {}", env.error.message),
            None => env.error.message,
        },
        Err(_) => raw.chars().take(500).collect(),
    };

    match status {
        401 | 403 => ReviewError::AuthError {
            provider: PROVIDER.to_string(),
            detail,
        },
        429 => ReviewError::RateLimitExceeded {
            provider: PROVIDER.to_string(),
            retry_after_secs: retry_after,
        },
        _ => ReviewError::ApiError {
            status: Some(status),
            message: detail,
        },
    }
}

fn transport_error(e: reqwest::Error, start: Instant) -> ReviewError {
    if e.is_timeout() {
        ReviewError::ApiTimeout {
            elapsed_ms: start.elapsed().as_millis() as u64,
        }
    } else {
        ReviewError::ApiError {
            status: e.status().map(|s| s.as_u16()),
            message: format!("HTTP request failed: {e}"),
        }
    }
}
