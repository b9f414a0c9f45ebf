//! Error types for the contract-review library.
//!
//! Everything that stops a review from producing a result is a
//! [`ReviewError`]. Two situations are *not* errors:
//!
//! * a jurisdiction/contract-type pair with no knowledge file, which yields an
//!   empty knowledge context, and
//! * a model reply whose JSON cannot be parsed, which yields a raw-response
//!   payload flagged with `parse_error` (see [`crate::pipeline::parse`]).

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the contract-review library.
#[derive(Debug, Error)]
pub enum ReviewError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    /// Could not read an input file that passed validation.
    #[error("Failed to read '{path}': {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Local resource errors ─────────────────────────────────────────────
    /// A prompt template file is missing from the prompts directory.
    #[error("Prompt template not found: '{name}' (looked for {path:?})\nSet --prompts-dir or CONTRACT_REVIEW_PROMPTS_DIR.")]
    TemplateNotFound { name: String, path: PathBuf },

    /// A knowledge file exists but is not valid JSON for its schema.
    #[error("Invalid knowledge file '{path}': {detail}")]
    InvalidKnowledge { path: PathBuf, detail: String },

    // ── PDF errors (vision backend) ───────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' could not be opened: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// pdfium-render returned an error for a specific page.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
The vision backend renders pages with pdfium. Either:\n\
  • set PDFIUM_LIB_PATH=/path/to/libpdfium, or\n\
  • install pdfium system-wide, or\n\
  • use --backend anthropic, which sends the PDF as-is.\n"
    )]
    PdfiumBindingFailed(String),

    // ── Remote inference errors ───────────────────────────────────────────
    /// The configured backend cannot be initialised (missing API key etc.).
    #[error("Provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The remote API returned an error response.
    #[error("LLM API error{}: {message}", .status.map(|s| format!(" (HTTP {s})")).unwrap_or_default())]
    ApiError { status: Option<u16>, message: String },

    /// The remote API rejected the credentials (401/403).
    #[error("Authentication error from provider '{provider}': {detail}")]
    AuthError { provider: String, detail: String },

    /// The remote API returned HTTP 429.
    #[error("Rate limit exceeded for provider '{provider}'{}", .retry_after_secs.map(|s| format!(" (retry after {s}s)")).unwrap_or_default())]
    RateLimitExceeded {
        provider: String,
        retry_after_secs: Option<u64>,
    },

    /// The remote call did not complete within the configured timeout.
    #[error("API call timed out after {elapsed_ms}ms\nIncrease --api-timeout.")]
    ApiTimeout { elapsed_ms: u64 },

    /// The model answered without any text content.
    #[error("The model returned an empty response")]
    EmptyResponse,

    /// An external knowledge connector failed.
    #[error("Knowledge connector '{connector}' failed: {detail}")]
    ConnectorFailed { connector: String, detail: String },

    // ── Output errors ─────────────────────────────────────────────────────
    /// Could not create or write a report file.
    #[error("Failed to write report '{path}': {source}")]
    ReportWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// docx-rs failed to assemble the document package.
    #[error("Failed to build DOCX report '{path}': {detail}")]
    DocxBuildFailed { path: PathBuf, detail: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ReviewError {
    /// Whether the error originates from a local file or resource rather than
    /// the remote API.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            ReviewError::FileNotFound { .. }
                | ReviewError::PermissionDenied { .. }
                | ReviewError::NotAPdf { .. }
                | ReviewError::ReadFailed { .. }
                | ReviewError::TemplateNotFound { .. }
                | ReviewError::InvalidKnowledge { .. }
                | ReviewError::CorruptPdf { .. }
                | ReviewError::ReportWriteFailed { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_not_found_names_template() {
        let e = ReviewError::TemplateNotFound {
            name: "risk_analysis".into(),
            path: PathBuf::from("/opt/prompts/risk_analysis.md"),
        };
        let msg = e.to_string();
        assert!(msg.contains("risk_analysis"), "got: {msg}");
        assert!(e.is_local());
    }

    #[test]
    fn api_error_display_with_status() {
        let e = ReviewError::ApiError {
            status: Some(400),
            message: "invalid document".into(),
        };
        assert_eq!(e.to_string(), "LLM API error (HTTP 400): invalid document");
        assert!(!e.is_local());
    }

    #[test]
    fn api_error_display_without_status() {
        let e = ReviewError::ApiError {
            status: None,
            message: "connection reset".into(),
        };
        assert_eq!(e.to_string(), "LLM API error: connection reset");
    }

    #[test]
    fn rate_limit_display_with_retry() {
        let e = ReviewError::RateLimitExceeded {
            provider: "anthropic".into(),
            retry_after_secs: Some(30),
        };
        let msg = e.to_string();
        assert!(msg.contains("anthropic"));
        assert!(msg.contains("30s"));
    }

    #[test]
    fn rate_limit_display_without_retry() {
        let e = ReviewError::RateLimitExceeded {
            provider: "openai".into(),
            retry_after_secs: None,
        };
        assert_eq!(e.to_string(), "Rate limit exceeded for provider 'openai'");
    }

    #[test]
    fn auth_error_display() {
        let e = ReviewError::AuthError {
            provider: "anthropic".into(),
            detail: "invalid x-api-key".into(),
        };
        assert!(e.to_string().contains("invalid x-api-key"));
    }
}
