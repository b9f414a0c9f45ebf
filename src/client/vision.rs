//! Vision backend: rasterised pages through an edgequake-llm provider.
//!
//! For providers without native PDF input (OpenAI, Gemini, Ollama, Azure …)
//! every document is rendered to PNG pages with pdfium and attached to a
//! single user message. A short manifest at the top of the prompt tells the
//! model which images belong to which document, so comparison prompts that
//! say "[Contract A]" still line up.

use super::{InferenceClient, InferenceRequest, InferenceResponse};
use crate::config::ReviewConfig;
use crate::error::ReviewError;
use crate::output::TokenUsage;
use crate::pipeline::{encode, render};
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider, ProviderFactory};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Model used by the vision backend when the configured model is a Claude id
/// and the provider is not Anthropic.
const FALLBACK_VISION_MODEL: &str = "gpt-4.1-nano";

/// Client that sends page images through any edgequake-llm provider.
pub struct VisionClient {
    provider: Arc<dyn LLMProvider>,
    provider_name: String,
    model: String,
    timeout: Duration,
    max_pages: usize,
    max_pixels: u32,
}

impl VisionClient {
    /// Wrap an already-constructed provider.
    pub fn with_provider(
        provider: Arc<dyn LLMProvider>,
        provider_name: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            provider,
            provider_name: provider_name.into(),
            model: model.into(),
            timeout,
            max_pages: 20,
            max_pixels: 1600,
        }
    }

    /// Resolve a provider from config and environment.
    ///
    /// Resolution order:
    /// 1. `config.provider_name` with `config.model`
    /// 2. `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`, when both are set
    /// 3. `OPENAI_API_KEY` present: OpenAI
    /// 4. edgequake-llm auto-detection
    pub fn from_config(config: &ReviewConfig) -> Result<Self, ReviewError> {
        let resolved = resolve_provider(config)?;
        info!(
            "Vision backend: provider '{}', model '{}'",
            resolved.name, resolved.model
        );
        let mut client = Self::with_provider(
            resolved.provider,
            resolved.name,
            resolved.model,
            Duration::from_secs(config.api_timeout_secs),
        );
        client.max_pages = config.max_pages;
        client.max_pixels = config.max_rendered_pixels;
        Ok(client)
    }

    async fn render_images(
        &self,
        request: &InferenceRequest,
    ) -> Result<(Vec<ImageData>, String), ReviewError> {
        let mut images = Vec::new();
        let mut manifest = Vec::with_capacity(request.documents.len());

        for (n, doc) in request.documents.iter().enumerate() {
            let pages = render::render_document(
                &doc.path,
                doc.bytes.clone(),
                self.max_pages,
                self.max_pixels,
            )
            .await?;
            let first = images.len() + 1;
            for (idx, img) in &pages {
                let data =
                    encode::encode_page(img).map_err(|e| ReviewError::RasterisationFailed {
                        page: idx + 1,
                        detail: format!("Image encoding failed: {e}"),
                    })?;
                images.push(data);
            }
            manifest.push(manifest_line(n, &doc.file_name(), first, images.len()));
        }

        Ok((images, manifest.join("\n")))
    }
}

#[async_trait]
impl InferenceClient for VisionClient {
    fn name(&self) -> &str {
        &self.provider_name
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &InferenceRequest) -> Result<InferenceResponse, ReviewError> {
        let (images, manifest) = self.render_images(request).await?;
        debug!("Attaching {} page image(s)", images.len());

        let text = format!("{manifest}\n\n{}", request.prompt);
        let messages = vec![ChatMessage::user_with_images(&text, images)];
        let options = CompletionOptions {
            temperature: request.temperature,
            max_tokens: Some(request.max_tokens as usize),
            ..Default::default()
        };

        let start = Instant::now();
        let response =
            tokio::time::timeout(self.timeout, self.provider.chat(&messages, Some(&options)))
                .await
                .map_err(|_| ReviewError::ApiTimeout {
                    elapsed_ms: start.elapsed().as_millis() as u64,
                })?
                .map_err(|e| ReviewError::ApiError {
                    status: None,
                    message: e.to_string(),
                })?;

        if response.content.trim().is_empty() {
            return Err(ReviewError::EmptyResponse);
        }
        let usage = TokenUsage {
            input_tokens: response.prompt_tokens as u64,
            output_tokens: response.completion_tokens as u64,
        };
        debug!(
            "{} input tokens, {} output tokens, {:?}",
            usage.input_tokens,
            usage.output_tokens,
            start.elapsed()
        );
        Ok(InferenceResponse {
            text: response.content,
            usage,
        })
    }
}

/// e.g. "[Contract A] lease.pdf: images 1-4".
fn manifest_line(index: usize, file_name: &str, first: usize, last: usize) -> String {
    let label = (b'A' + (index % 26) as u8) as char;
    let pages = if last < first {
        "no pages".to_string()
    } else if first == last {
        format!("image {first}")
    } else {
        format!("images {first}-{last}")
    };
    format!("[Contract {label}] {file_name}: {pages}")
}

struct ResolvedProvider {
    provider: Arc<dyn LLMProvider>,
    name: String,
    model: String,
}

fn resolve_provider(config: &ReviewConfig) -> Result<ResolvedProvider, ReviewError> {
    let vision_model = |provider: &str| -> String {
        if config.model.starts_with("claude") && !provider.eq_ignore_ascii_case("anthropic") {
            FALLBACK_VISION_MODEL.to_string()
        } else {
            config.model.clone()
        }
    };

    if let Some(ref name) = config.provider_name {
        return create_provider(name, &vision_model(name));
    }

    if let (Ok(provider), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !provider.is_empty() && !model.is_empty() {
            return create_provider(&provider, &model);
        }
    }

    if std::env::var("OPENAI_API_KEY").is_ok_and(|k| !k.is_empty()) {
        return create_provider("openai", &vision_model("openai"));
    }

    let (provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| ReviewError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No vision provider could be auto-detected from the environment.\n\
                 Set --provider, or OPENAI_API_KEY / GEMINI_API_KEY.\n\
                 Error: {e}"
            ),
        })?;
    Ok(ResolvedProvider {
        provider,
        name: "auto".to_string(),
        model: config.model.clone(),
    })
}

fn create_provider(name: &str, model: &str) -> Result<ResolvedProvider, ReviewError> {
    let provider = ProviderFactory::create_llm_provider(name, model).map_err(|e| {
        ReviewError::ProviderNotConfigured {
            provider: name.to_string(),
            hint: e.to_string(),
        }
    })?;
    Ok(ResolvedProvider {
        provider,
        name: name.to_string(),
        model: model.to_string(),
    })
}
