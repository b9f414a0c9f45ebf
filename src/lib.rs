//! # contract-review
//!
//! Review PDF contracts with hosted large-language models.
//!
//! A review is a single round trip: the PDF goes to the model together with a
//! prompt assembled from a template and, optionally, jurisdiction-specific
//! legal knowledge. The reply is cleaned up (Markdown) or parsed (JSON) and can
//! be written out as a Markdown or Word report.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Load     validate path + %PDF magic, read bytes
//!  ├─ 2. Compose  template + jurisdiction knowledge + generic risk patterns
//!  ├─ 3. Infer    Anthropic native PDF input, or rasterised pages via edgequake-llm
//!  ├─ 4. Parse    first fenced JSON block, or cleaned Markdown
//!  └─ 5. Report   Markdown / DOCX, written atomically
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use contract_review::{analyze_contract, ReviewConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // ANTHROPIC_API_KEY is read from the environment.
//!     let config = ReviewConfig::builder()
//!         .jurisdiction("US-CA")
//!         .contract_type("employment")
//!         .build()?;
//!     let result = analyze_contract("offer_letter.pdf", &config).await?;
//!     println!("{}", result.payload.render());
//!     eprintln!("tokens: {} in / {} out",
//!         result.usage.input_tokens,
//!         result.usage.output_tokens);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `contract-review` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! ```toml
//! contract-review = { version = "0.1", default-features = false }
//! ```
//!
//! ## Backends
//!
//! | Backend | Models | How the PDF is sent |
//! |---------|--------|---------------------|
//! | `anthropic` (default) | `claude-sonnet-4-20250514`, … | native `document` block |
//! | `vision` | anything edgequake-llm supports with image input | pdfium-rendered PNG pages |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod client;
pub mod config;
pub mod error;
pub mod knowledge;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod report;
pub mod review;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use client::{InferenceClient, InferenceRequest, InferenceResponse};
pub use config::{Backend, ReviewConfig, ReviewConfigBuilder};
pub use error::ReviewError;
pub use knowledge::connector::{KnowledgeConnector, OpenLawsConnector};
pub use knowledge::{KnowledgeBase, KnowledgeRecord, RiskPattern, Severity};
pub use output::{AnalysisResult, Payload, ReportOutcome, Status, TokenUsage};
pub use progress::{NoopProgressCallback, ProgressCallback, ReviewProgressCallback, Stage};
pub use report::{generate_report, ReportFormat};
pub use review::{
    analyze_contract, analyze_contract_sync, analyze_contract_with, check_completeness,
    check_completeness_sync, check_completeness_with, compare_contracts, compare_contracts_sync,
    compare_contracts_with, extract_key_terms, extract_key_terms_sync, extract_key_terms_with,
};
