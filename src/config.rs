//! Configuration types for contract review.
//!
//! Every knob lives in [`ReviewConfig`], built through
//! [`ReviewConfigBuilder`]. The same config drives all four review
//! operations; per-operation differences (token budgets, prompts) are
//! resolved in [`crate::review`].

use crate::error::ReviewError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Model used when none is configured.
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

/// Default Anthropic Messages API base URL.
pub const DEFAULT_ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com/v1";

/// Configuration for a contract review.
///
/// # Example
/// ```rust
/// use contract_review::{Backend, ReviewConfig};
///
/// let config = ReviewConfig::builder()
///     .model("claude-sonnet-4-20250514")
///     .jurisdiction("US-CA")
///     .contract_type("employment")
///     .build()
///     .unwrap();
/// assert_eq!(config.backend, Backend::Anthropic);
/// ```
#[derive(Clone)]
pub struct ReviewConfig {
    /// Model identifier. Default: [`DEFAULT_MODEL`].
    pub model: String,

    /// Which remote inference client to use. Default: [`Backend::Anthropic`].
    pub backend: Backend,

    /// edgequake-llm provider name for [`Backend::Vision`] (e.g. "openai",
    /// "gemini", "ollama"). If None, the provider is auto-detected from the
    /// environment.
    pub provider_name: Option<String>,

    /// API key for the Anthropic backend. If None, `ANTHROPIC_API_KEY` is read
    /// when the client is created.
    pub api_key: Option<String>,

    /// Anthropic API base URL. Default: [`DEFAULT_ANTHROPIC_BASE_URL`].
    pub api_base_url: String,

    /// Override for the per-operation output-token budget.
    ///
    /// When None each operation uses its own default (analysis and comparison
    /// 8192, key terms 4096, completeness 2048).
    pub max_tokens: Option<u32>,

    /// Sampling temperature. None leaves the provider default in place.
    pub temperature: Option<f32>,

    /// Per-request timeout in seconds. Default: 300.
    ///
    /// Whole-contract analysis routinely produces several thousand output
    /// tokens, so this is far larger than a typical chat timeout.
    pub api_timeout_secs: u64,

    /// Directory holding `<name>.md` prompt templates.
    pub prompts_dir: PathBuf,

    /// Root of the knowledge base (`risk_patterns.json`, `jurisdictions/`).
    pub knowledge_dir: PathBuf,

    /// Jurisdiction code for knowledge lookup, e.g. "US-CA" or "CN".
    pub jurisdiction: Option<String>,

    /// Contract type for knowledge lookup, e.g. "employment" or "nda".
    pub contract_type: Option<String>,

    /// Maximum pages rasterised per document by the vision backend. Default: 20.
    pub max_pages: usize,

    /// Longest rendered edge in pixels for the vision backend. Default: 1600.
    pub max_rendered_pixels: u32,

    /// Optional observer for pipeline stage events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            backend: Backend::default(),
            provider_name: None,
            api_key: None,
            api_base_url: DEFAULT_ANTHROPIC_BASE_URL.to_string(),
            max_tokens: None,
            temperature: None,
            api_timeout_secs: 300,
            prompts_dir: default_prompts_dir(),
            knowledge_dir: default_knowledge_dir(),
            jurisdiction: None,
            contract_type: None,
            max_pages: 20,
            max_rendered_pixels: 1600,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ReviewConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReviewConfig")
            .field("model", &self.model)
            .field("backend", &self.backend)
            .field("provider_name", &self.provider_name)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("api_base_url", &self.api_base_url)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("prompts_dir", &self.prompts_dir)
            .field("knowledge_dir", &self.knowledge_dir)
            .field("jurisdiction", &self.jurisdiction)
            .field("contract_type", &self.contract_type)
            .field("max_pages", &self.max_pages)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ReviewProgressCallback>"),
            )
            .finish()
    }
}

impl ReviewConfig {
    /// Create a new builder for `ReviewConfig`.
    pub fn builder() -> ReviewConfigBuilder {
        ReviewConfigBuilder {
            config: Self::default(),
        }
    }

    /// Jurisdiction and contract type, when both are set.
    pub fn knowledge_key(&self) -> Option<(&str, &str)> {
        match (&self.jurisdiction, &self.contract_type) {
            (Some(j), Some(t)) => Some((j.as_str(), t.as_str())),
            _ => None,
        }
    }
}

/// Prompt templates shipped with the crate.
pub fn default_prompts_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("prompts")
}

/// Knowledge base shipped with the crate.
pub fn default_knowledge_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("knowledge")
}

/// Builder for [`ReviewConfig`].
pub struct ReviewConfigBuilder {
    config: ReviewConfig,
}

impl fmt::Debug for ReviewConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReviewConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl ReviewConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn backend(mut self, backend: Backend) -> Self {
        self.config.backend = backend;
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.api_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn max_tokens(mut self, n: u32) -> Self {
        self.config.max_tokens = Some(n);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = Some(t.clamp(0.0, 1.0));
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn prompts_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.prompts_dir = dir.into();
        self
    }

    pub fn knowledge_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.knowledge_dir = dir.into();
        self
    }

    pub fn jurisdiction(mut self, code: impl Into<String>) -> Self {
        self.config.jurisdiction = Some(code.into());
        self
    }

    pub fn contract_type(mut self, kind: impl Into<String>) -> Self {
        self.config.contract_type = Some(kind.into());
        self
    }

    pub fn max_pages(mut self, n: usize) -> Self {
        self.config.max_pages = n.max(1);
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ReviewConfig, ReviewError> {
        let c = &self.config;
        if c.model.trim().is_empty() {
            return Err(ReviewError::InvalidConfig("model must not be empty".into()));
        }
        if c.max_tokens == Some(0) {
            return Err(ReviewError::InvalidConfig("max_tokens must be ≥ 1".into()));
        }
        if c.api_timeout_secs == 0 {
            return Err(ReviewError::InvalidConfig(
                "api_timeout_secs must be ≥ 1".into(),
            ));
        }
        if c.jurisdiction.is_some() != c.contract_type.is_some() {
            return Err(ReviewError::InvalidConfig(
                "jurisdiction and contract type must be given together".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Remote inference backend.
///
/// | Backend | Document payload | Providers |
/// |---------|------------------|-----------|
/// | `Anthropic` | the PDF itself, base64 `document` block | Anthropic Messages API |
/// | `Vision` | pages rasterised to PNG | anything edgequake-llm supports |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Native PDF input through the Anthropic Messages API. (default)
    #[default]
    Anthropic,
    /// Rasterised pages through an edgequake-llm vision provider.
    Vision,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Anthropic => f.write_str("anthropic"),
            Backend::Vision => f.write_str("vision"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_point_at_shipped_resources() {
        let config = ReviewConfig::default();
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.backend, Backend::Anthropic);
        assert!(config.prompts_dir.ends_with("prompts"));
        assert!(config.knowledge_dir.ends_with("knowledge"));
        assert!(config.knowledge_key().is_none());
    }

    #[test]
    fn builder_trims_base_url_and_clamps_temperature() {
        let config = ReviewConfig::builder()
            .api_base_url("http://localhost:8080/v1/")
            .temperature(3.5)
            .build()
            .unwrap();
        assert_eq!(config.api_base_url, "http://localhost:8080/v1");
        assert_eq!(config.temperature, Some(1.0));
    }

    #[test]
    fn builder_rejects_half_knowledge_key() {
        let err = ReviewConfig::builder()
            .jurisdiction("US-CA")
            .build()
            .unwrap_err();
        assert!(matches!(err, ReviewError::InvalidConfig(_)));
    }

    #[test]
    fn builder_rejects_zero_tokens() {
        assert!(ReviewConfig::builder().max_tokens(0).build().is_err());
    }

    #[test]
    fn knowledge_key_when_both_set() {
        let config = ReviewConfig::builder()
            .jurisdiction("CN")
            .contract_type("labor")
            .build()
            .unwrap();
        assert_eq!(config.knowledge_key(), Some(("CN", "labor")));
    }

    #[test]
    fn debug_redacts_api_key() {
        let config = ReviewConfig::builder().api_key("sk-ant-secret").build().unwrap();
        let dbg = format!("{config:?}");
        assert!(!dbg.contains("sk-ant-secret"));
        assert!(dbg.contains("<redacted>"));
    }

    #[test]
    fn backend_serialises_lowercase() {
        assert_eq!(serde_json::to_string(&Backend::Vision).unwrap(), "\"vision\"");
        assert_eq!(Backend::Anthropic.to_string(), "anthropic");
    }
}
