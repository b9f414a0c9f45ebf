//! Prompt templates and built-in prompts.
//!
//! The risk-analysis prompt is a file-backed template (`prompts/risk_analysis.md`)
//! so reviewers can tune it without rebuilding; a missing template is a hard
//! failure. The shorter task prompts are compiled in as constants and may be
//! overridden by dropping a same-named `.md` file into the prompts directory.

use crate::error::ReviewError;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Template name of the full risk-analysis prompt.
pub const RISK_ANALYSIS_TEMPLATE: &str = "risk_analysis";

/// Template name that overrides [`COMPLETENESS_CHECK_PROMPT`].
pub const COMPLETENESS_CHECK_TEMPLATE: &str = "completeness_check";

/// Template name that overrides [`COMPARISON_PROMPT`].
pub const COMPARISON_TEMPLATE: &str = "comparison";

/// Template name that overrides [`KEY_TERMS_PROMPT`].
pub const KEY_TERMS_TEMPLATE: &str = "key_terms";

/// Appended after the knowledge sections of an analysis prompt.
pub const ANALYSIS_CLOSING_INSTRUCTION: &str =
    "Please analyze the attached contract and provide a structured analysis following the format above.";

/// Checks signatures, seals, dates and numbering.
pub const COMPLETENESS_CHECK_PROMPT: &str = r#"Check the attached contract for completeness, focusing on:

1. **Signatures**
   - Is Party A's signature present?
   - Is Party B's signature present?
   - Are the signatures in the correct place?

2. **Seals / company stamps**
   - Is Party A's seal present?
   - Is Party B's seal present?
   - Is each seal clear and legible?

3. **Dates**
   - Is the signing date filled in?
   - Is the effective date unambiguous?
   - Are dates in a consistent format?

4. **Other elements**
   - Is there a contract number?
   - Are page numbers complete?
   - Cross-page seals (for multi-page contracts)

Report the result as JSON:
```json
{
  "signatures": {
    "party_a": {"present": bool, "location": "description"},
    "party_b": {"present": bool, "location": "description"}
  },
  "stamps": {
    "party_a": {"present": bool, "clear": bool},
    "party_b": {"present": bool, "clear": bool}
  },
  "dates": {
    "signing_date": {"present": bool, "value": "date or null"},
    "effective_date": {"present": bool, "value": "date or null"}
  },
  "other": {
    "contract_number": {"present": bool, "value": "number or null"},
    "page_numbers": {"present": bool, "complete": bool}
  },
  "overall_completeness": "complete | partially complete | incomplete",
  "issues": ["issue 1", "issue 2"]
}
```"#;

/// Compares two contracts. The first document is [Contract A], the second [Contract B].
pub const COMPARISON_PROMPT: &str = r#"Compare the two attached contracts and analyse their differences.

## Dimensions

1. **Basic information**
   - Contract type
   - Parties
   - Term
   - Amounts

2. **Clauses**
   - Added clauses
   - Removed clauses
   - Modified clauses (state the exact change)

3. **Risk movement**
   - Clauses where risk increased
   - Clauses where risk decreased

4. **Recommendations**
   - Whether the changes should be accepted
   - Points requiring attention

Produce a structured Markdown comparison report.
The first document is labelled [Contract A] and the second [Contract B]."#;

/// Extracts key terms as JSON.
pub const KEY_TERMS_PROMPT: &str = r#"Extract the key terms of the attached contract.

Return ONLY a JSON object inside a ```json code block with this shape:
```json
{
  "contract_type": "string",
  "parties": [{"role": "string", "name": "string", "address": "string or null"}],
  "effective_date": "string or null",
  "expiration_date": "string or null",
  "term": "string or null",
  "payment": {"amount": "string or null", "currency": "string or null", "schedule": "string or null"},
  "termination": ["condition"],
  "liability_cap": "string or null",
  "governing_law": "string or null",
  "dispute_resolution": "string or null",
  "confidentiality": "string or null",
  "key_obligations": [{"party": "string", "obligation": "string"}]
}
```
Use null for anything the contract does not state. Do not invent values."#;

/// Loads `<name>.md` templates from a directory.
#[derive(Debug, Clone)]
pub struct TemplateLoader {
    dir: PathBuf,
}

impl TemplateLoader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.md"))
    }

    /// Load a required template. A missing file is [`ReviewError::TemplateNotFound`].
    pub fn load(&self, name: &str) -> Result<String, ReviewError> {
        let path = self.path_for(name);
        match std::fs::read_to_string(&path) {
            Ok(text) => {
                debug!("Loaded template '{}' ({} bytes)", name, text.len());
                Ok(text)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(ReviewError::TemplateNotFound {
                    name: name.to_string(),
                    path,
                })
            }
            Err(e) => Err(ReviewError::ReadFailed { path, source: e }),
        }
    }

    /// Load a template if it exists, otherwise fall back to `builtin`.
    pub fn load_or(&self, name: &str, builtin: &str) -> Result<String, ReviewError> {
        match self.load(name) {
            Ok(text) => Ok(text),
            Err(ReviewError::TemplateNotFound { .. }) => Ok(builtin.to_string()),
            Err(e) => Err(e),
        }
    }
}
