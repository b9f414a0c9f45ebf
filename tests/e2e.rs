//! End-to-end tests against the live Anthropic API.
//!
//! Gated behind `E2E_ENABLED` (and `ANTHROPIC_API_KEY`) so they never run in
//! CI unless explicitly requested. The fixture PDFs are generated on the fly.
//!
//! Run with:
//!   E2E_ENABLED=1 cargo test --test e2e -- --nocapture

mod common;

use common::{write_pdf, EMPLOYMENT_TEXT};
use contract_review::{
    analyze_contract, compare_contracts, extract_key_terms, generate_report, Payload,
    ReportFormat, ReviewConfig, Status,
};

/// Skip unless E2E_ENABLED and ANTHROPIC_API_KEY are both set.
macro_rules! e2e_skip_unless_ready {
    () => {{
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP: set E2E_ENABLED=1 to run e2e tests");
            return;
        }
        if std::env::var("ANTHROPIC_API_KEY").map_or(true, |k| k.is_empty()) {
            println!("SKIP: ANTHROPIC_API_KEY is not set");
            return;
        }
    }};
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "contract_review=debug".into()),
        )
        .with_test_writer()
        .try_init();
}

fn config() -> ReviewConfig {
    ReviewConfig::builder()
        .jurisdiction("US-CA")
        .contract_type("employment")
        .max_tokens(2048)
        .build()
        .unwrap()
}

#[tokio::test]
async fn e2e_analyze_employment_contract() {
    e2e_skip_unless_ready!();
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let pdf = write_pdf(dir.path(), "employment.pdf", EMPLOYMENT_TEXT);

    let result = analyze_contract(&pdf, &config()).await.unwrap();
    println!("{}", result.payload.render());

    assert_eq!(result.status, Status::Success);
    assert!(result.usage.input_tokens > 0);
    let Payload::Text(text) = &result.payload else {
        panic!("analysis should be text");
    };
    assert!(text.ends_with('\n'));
    assert!(!text.starts_with("```"));
    assert!(
        text.to_lowercase().contains("non-comp"),
        "the California non-compete should be flagged"
    );

    let report = dir.path().join("employment.docx");
    generate_report(&result, &report, ReportFormat::Docx, "E2E Review").unwrap();
    assert!(report.exists());
}

#[tokio::test]
async fn e2e_extract_key_terms() {
    e2e_skip_unless_ready!();
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let pdf = write_pdf(dir.path(), "employment.pdf", EMPLOYMENT_TEXT);

    let result = extract_key_terms(&pdf, &config()).await.unwrap();
    println!("{}", result.payload.render());

    assert_eq!(result.status, Status::Success, "model did not return JSON");
    let json = result.payload.as_json().unwrap();
    assert!(json.get("parties").is_some());
}

#[tokio::test]
async fn e2e_compare_two_versions() {
    e2e_skip_unless_ready!();
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let a = write_pdf(dir.path(), "v1.pdf", EMPLOYMENT_TEXT);
    let mut revised: Vec<&str> = EMPLOYMENT_TEXT.to_vec();
    revised[3] = "2. Compensation. Employer shall pay USD 150,000 per year.";
    let b = write_pdf(dir.path(), "v2.pdf", &revised);

    let result = compare_contracts(&a, &b, &config()).await.unwrap();
    let text = result.payload.render();
    println!("{text}");
    assert!(text.contains("150,000") || text.contains("150000"));
}
