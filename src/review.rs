//! Review operations: one PDF (or two) in, one [`AnalysisResult`] out.
//!
//! Every operation is a single round trip through the same four stages:
//! load the PDF(s), compose the prompt, call the model, parse the reply.
//! Each comes in three flavours:
//!
//! * `op(…, config)` builds the client selected by `config.backend`,
//! * `op_with(client, …, config)` uses a caller-supplied [`InferenceClient`],
//! * `op_sync(…, config)` blocks on a fresh tokio runtime.

use crate::client::{self, InferenceClient, InferenceRequest, InferenceResponse};
use crate::config::ReviewConfig;
use crate::error::ReviewError;
use crate::knowledge::KnowledgeBase;
use crate::output::{AnalysisResult, Payload, Status};
use crate::pipeline::input::{load_pdf, PdfDocument};
use crate::pipeline::{compose, parse};
use crate::progress::Stage;
use crate::prompts::{
    TemplateLoader, COMPARISON_PROMPT, COMPARISON_TEMPLATE, COMPLETENESS_CHECK_PROMPT,
    COMPLETENESS_CHECK_TEMPLATE, KEY_TERMS_PROMPT, KEY_TERMS_TEMPLATE, RISK_ANALYSIS_TEMPLATE,
};
use std::future::Future;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Output-token budget for a full risk analysis.
pub const ANALYSIS_MAX_TOKENS: u32 = 8192;
/// Output-token budget for a completeness check.
pub const COMPLETENESS_MAX_TOKENS: u32 = 2048;
/// Output-token budget for a two-contract comparison.
pub const COMPARISON_MAX_TOKENS: u32 = 8192;
/// Output-token budget for key-term extraction.
pub const KEY_TERMS_MAX_TOKENS: u32 = 4096;

// ── Risk analysis ────────────────────────────────────────────────────────

/// Risk analysis of one contract, using jurisdiction knowledge when
/// `config.jurisdiction` and `config.contract_type` are both set.
pub async fn analyze_contract(
    pdf: impl AsRef<Path>,
    config: &ReviewConfig,
) -> Result<AnalysisResult, ReviewError> {
    let client = client_for(config)?;
    analyze_contract_with(client.as_ref(), pdf, config).await
}

pub async fn analyze_contract_with(
    client: &dyn InferenceClient,
    pdf: impl AsRef<Path>,
    config: &ReviewConfig,
) -> Result<AnalysisResult, ReviewError> {
    let pdf = pdf.as_ref();
    info!("Analyzing contract: {}", pdf.display());
    tracked(config, async {
        stage(config, Stage::Loading);
        let doc = load_pdf(pdf).await?;

        stage(config, Stage::Composing);
        let template = TemplateLoader::new(&config.prompts_dir).load(RISK_ANALYSIS_TEMPLATE)?;
        let kb = KnowledgeBase::new(&config.knowledge_dir);
        let context = match config.knowledge_key() {
            Some((jurisdiction, contract_type)) => {
                let context = kb.assemble_context(jurisdiction, contract_type)?;
                if context.is_empty() {
                    warn!(
                        "No knowledge for {}/{}; analysing without jurisdiction context",
                        jurisdiction, contract_type
                    );
                }
                context
            }
            None => String::new(),
        };
        let patterns = kb.generic_patterns()?;
        let prompt = compose::analysis_prompt(&template, &context, &patterns);

        let response = infer(
            client,
            config,
            vec![doc],
            prompt,
            ANALYSIS_MAX_TOKENS,
        )
        .await?;

        stage(config, Stage::Parsing);
        Ok(text_result(client, response))
    })
    .await
}

// ── Completeness check ───────────────────────────────────────────────────

/// Check signatures, seals, dates and numbering.
///
/// The payload is the model's text; call
/// [`AnalysisResult::into_structured`] to get the JSON it was asked for.
pub async fn check_completeness(
    pdf: impl AsRef<Path>,
    config: &ReviewConfig,
) -> Result<AnalysisResult, ReviewError> {
    let client = client_for(config)?;
    check_completeness_with(client.as_ref(), pdf, config).await
}

pub async fn check_completeness_with(
    client: &dyn InferenceClient,
    pdf: impl AsRef<Path>,
    config: &ReviewConfig,
) -> Result<AnalysisResult, ReviewError> {
    let pdf = pdf.as_ref();
    info!("Checking completeness: {}", pdf.display());
    tracked(config, async {
        stage(config, Stage::Loading);
        let doc = load_pdf(pdf).await?;

        stage(config, Stage::Composing);
        let prompt = TemplateLoader::new(&config.prompts_dir)
            .load_or(COMPLETENESS_CHECK_TEMPLATE, COMPLETENESS_CHECK_PROMPT)?;

        let response = infer(client, config, vec![doc], prompt, COMPLETENESS_MAX_TOKENS).await?;

        stage(config, Stage::Parsing);
        Ok(text_result(client, response))
    })
    .await
}

// ── Comparison ───────────────────────────────────────────────────────────

/// Compare two contracts. `pdf_a` is sent first and is "[Contract A]".
pub async fn compare_contracts(
    pdf_a: impl AsRef<Path>,
    pdf_b: impl AsRef<Path>,
    config: &ReviewConfig,
) -> Result<AnalysisResult, ReviewError> {
    let client = client_for(config)?;
    compare_contracts_with(client.as_ref(), pdf_a, pdf_b, config).await
}

pub async fn compare_contracts_with(
    client: &dyn InferenceClient,
    pdf_a: impl AsRef<Path>,
    pdf_b: impl AsRef<Path>,
    config: &ReviewConfig,
) -> Result<AnalysisResult, ReviewError> {
    let (pdf_a, pdf_b) = (pdf_a.as_ref(), pdf_b.as_ref());
    info!("Comparing {} with {}", pdf_a.display(), pdf_b.display());
    tracked(config, async {
        stage(config, Stage::Loading);
        let doc_a = load_pdf(pdf_a).await?;
        let doc_b = load_pdf(pdf_b).await?;

        stage(config, Stage::Composing);
        let prompt = TemplateLoader::new(&config.prompts_dir)
            .load_or(COMPARISON_TEMPLATE, COMPARISON_PROMPT)?;

        let response = infer(
            client,
            config,
            vec![doc_a, doc_b],
            prompt,
            COMPARISON_MAX_TOKENS,
        )
        .await?;

        stage(config, Stage::Parsing);
        Ok(text_result(client, response))
    })
    .await
}

// ── Key terms ────────────────────────────────────────────────────────────

/// Extract parties, dates, payment and other key terms as JSON.
///
/// A reply without parseable JSON is not an error: the result carries the
/// raw text with [`Status::ParseError`].
pub async fn extract_key_terms(
    pdf: impl AsRef<Path>,
    config: &ReviewConfig,
) -> Result<AnalysisResult, ReviewError> {
    let client = client_for(config)?;
    extract_key_terms_with(client.as_ref(), pdf, config).await
}

pub async fn extract_key_terms_with(
    client: &dyn InferenceClient,
    pdf: impl AsRef<Path>,
    config: &ReviewConfig,
) -> Result<AnalysisResult, ReviewError> {
    let pdf = pdf.as_ref();
    info!("Extracting key terms: {}", pdf.display());
    tracked(config, async {
        stage(config, Stage::Loading);
        let doc = load_pdf(pdf).await?;

        stage(config, Stage::Composing);
        let prompt =
            TemplateLoader::new(&config.prompts_dir).load_or(KEY_TERMS_TEMPLATE, KEY_TERMS_PROMPT)?;

        let response = infer(client, config, vec![doc], prompt, KEY_TERMS_MAX_TOKENS).await?;

        stage(config, Stage::Parsing);
        let parsed = parse::extract_json(&response.text);
        Ok(AnalysisResult {
            status: if parsed.parse_error {
                Status::ParseError
            } else {
                Status::Success
            },
            payload: Payload::Json(parsed.value),
            model: client.model().to_string(),
            usage: response.usage,
        })
    })
    .await
}

// ── Blocking wrappers ────────────────────────────────────────────────────

/// Blocking [`analyze_contract`].
pub fn analyze_contract_sync(
    pdf: impl AsRef<Path>,
    config: &ReviewConfig,
) -> Result<AnalysisResult, ReviewError> {
    block_on(analyze_contract(pdf, config))
}

/// Blocking [`check_completeness`].
pub fn check_completeness_sync(
    pdf: impl AsRef<Path>,
    config: &ReviewConfig,
) -> Result<AnalysisResult, ReviewError> {
    block_on(check_completeness(pdf, config))
}

/// Blocking [`compare_contracts`].
pub fn compare_contracts_sync(
    pdf_a: impl AsRef<Path>,
    pdf_b: impl AsRef<Path>,
    config: &ReviewConfig,
) -> Result<AnalysisResult, ReviewError> {
    block_on(compare_contracts(pdf_a, pdf_b, config))
}

/// Blocking [`extract_key_terms`].
pub fn extract_key_terms_sync(
    pdf: impl AsRef<Path>,
    config: &ReviewConfig,
) -> Result<AnalysisResult, ReviewError> {
    block_on(extract_key_terms(pdf, config))
}

fn block_on<T>(fut: impl Future<Output = Result<T, ReviewError>>) -> Result<T, ReviewError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| ReviewError::Internal(format!("Failed to create tokio runtime: {e}")))?
        .block_on(fut)
}

// ── Shared steps ─────────────────────────────────────────────────────────

fn stage(config: &ReviewConfig, stage: Stage) {
    debug!("Stage: {}", stage);
    if let Some(ref cb) = config.progress_callback {
        cb.on_stage_start(stage);
    }
}

/// Build the configured client; a failure still completes the progress callback.
fn client_for(config: &ReviewConfig) -> Result<Box<dyn InferenceClient>, ReviewError> {
    client::from_config(config).inspect_err(|e| {
        warn!("Cannot create inference client: {}", e);
        if let Some(ref cb) = config.progress_callback {
            cb.on_review_complete(false);
        }
    })
}

/// Run an operation and report completion to the progress callback.
async fn tracked(
    config: &ReviewConfig,
    op: impl Future<Output = Result<AnalysisResult, ReviewError>>,
) -> Result<AnalysisResult, ReviewError> {
    let result = op.await;
    if let Some(ref cb) = config.progress_callback {
        cb.on_review_complete(result.as_ref().is_ok_and(AnalysisResult::is_success));
    }
    result
}

async fn infer(
    client: &dyn InferenceClient,
    config: &ReviewConfig,
    documents: Vec<PdfDocument>,
    prompt: String,
    default_max_tokens: u32,
) -> Result<InferenceResponse, ReviewError> {
    stage(config, Stage::Inference);
    let request = InferenceRequest {
        documents,
        prompt,
        max_tokens: config.max_tokens.unwrap_or(default_max_tokens),
        temperature: config.temperature,
    };
    debug!(
        "Request: {} document(s), {} prompt chars, max_tokens={}",
        request.documents.len(),
        request.prompt.len(),
        request.max_tokens
    );

    let start = Instant::now();
    let response = client.complete(&request).await?;
    info!(
        "{} answered in {}ms ({} in / {} out tokens)",
        client.name(),
        start.elapsed().as_millis(),
        response.usage.input_tokens,
        response.usage.output_tokens
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_response(response.usage.input_tokens, response.usage.output_tokens);
    }
    Ok(response)
}

fn text_result(client: &dyn InferenceClient, response: InferenceResponse) -> AnalysisResult {
    AnalysisResult {
        status: Status::Success,
        payload: Payload::Text(parse::clean_markdown(&response.text)),
        model: client.model().to_string(),
        usage: response.usage,
    }
}
