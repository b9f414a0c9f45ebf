//! Remote inference clients.
//!
//! A review is one request: some PDFs plus a prompt, answered by text. The
//! [`InferenceClient`] trait is that request/response seam. Two
//! implementations ship:
//!
//! | Backend | Client | PDF handling |
//! |---------|--------|--------------|
//! | `anthropic` | [`AnthropicClient`] | native `document` blocks, PDF sent as-is |
//! | `vision` | [`VisionClient`] | pages rasterised with pdfium, sent as images through edgequake-llm |
//!
//! Tests substitute a scripted client, so nothing above this module talks to
//! the network directly.

pub mod anthropic;
pub mod vision;

pub use anthropic::AnthropicClient;
pub use vision::VisionClient;

use crate::config::{Backend, ReviewConfig};
use crate::error::ReviewError;
use crate::output::TokenUsage;
use crate::pipeline::input::PdfDocument;
use async_trait::async_trait;

/// Everything a backend needs for one round trip.
#[derive(Debug, Clone)]
pub struct InferenceRequest {
    /// Documents in the order the prompt refers to them.
    pub documents: Vec<PdfDocument>,
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: Option<f32>,
}

/// The model's text answer and what it cost.
#[derive(Debug, Clone, PartialEq)]
pub struct InferenceResponse {
    pub text: String,
    pub usage: TokenUsage,
}

/// One request in, one text answer out.
#[async_trait]
pub trait InferenceClient: Send + Sync {
    /// Short backend name for logs, e.g. "anthropic".
    fn name(&self) -> &str;

    /// Model identifier reported on results.
    fn model(&self) -> &str;

    async fn complete(&self, request: &InferenceRequest) -> Result<InferenceResponse, ReviewError>;
}

/// Create the client selected by `config.backend`.
pub fn from_config(config: &ReviewConfig) -> Result<Box<dyn InferenceClient>, ReviewError> {
    match config.backend {
        Backend::Anthropic => Ok(Box::new(AnthropicClient::from_config(config)?)),
        Backend::Vision => Ok(Box::new(VisionClient::from_config(config)?)),
    }
}
