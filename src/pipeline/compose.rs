//! Prompt composition.
//!
//! An analysis prompt is plain concatenation: the template, the jurisdiction
//! context (when there is one), a JSON dump of the generic risk patterns and a
//! closing instruction. Sections are separated by blank lines so the model
//! sees them as distinct Markdown blocks.

use crate::knowledge::RiskPattern;
use crate::prompts::ANALYSIS_CLOSING_INSTRUCTION;
use serde_json::json;
use tracing::debug;

/// Heading of the generic risk-pattern dump.
pub const RISK_PATTERNS_HEADING: &str = "## Risk Patterns Reference";

/// Build the full risk-analysis prompt.
pub fn analysis_prompt(
    template: &str,
    knowledge_context: &str,
    generic_patterns: &[RiskPattern],
) -> String {
    let mut sections: Vec<String> = vec![template.trim_end().to_string()];

    if !knowledge_context.trim().is_empty() {
        sections.push(knowledge_context.trim_end().to_string());
    }

    if !generic_patterns.is_empty() {
        let dump = serde_json::to_string_pretty(&json!({ "patterns": generic_patterns }))
            .unwrap_or_default();
        sections.push(format!("{RISK_PATTERNS_HEADING}\n\n```json\n{dump}\n```"));
    }

    sections.push("---".to_string());
    sections.push(ANALYSIS_CLOSING_INSTRUCTION.to_string());

    let prompt = sections.join("\n\n");
    debug!(
        "Composed analysis prompt: {} chars ({} sections)",
        prompt.len(),
        sections.len()
    );
    prompt
}
