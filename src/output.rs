//! Result types produced by the review operations.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Outcome flag carried by every [`AnalysisResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// The model answered and the payload is what the operation asked for.
    Success,
    /// The model answered but its JSON could not be extracted; the payload
    /// holds the raw response with `parse_error: true`.
    ParseError,
}

/// Token counters reported by the provider for a single call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl TokenUsage {
    pub fn total(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

/// Free-text or structured model output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Payload {
    /// Markdown produced by analysis, comparison and completeness checks.
    Text(String),
    /// JSON extracted from the reply (key terms, structured checks).
    Json(Value),
}

impl Payload {
    /// Render the payload for display or writing to disk.
    ///
    /// Text is returned unchanged; JSON is pretty-printed.
    pub fn render(&self) -> String {
        match self {
            Payload::Text(s) => s.clone(),
            Payload::Json(v) => serde_json::to_string_pretty(v).unwrap_or_else(|_| v.to_string()),
        }
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Payload::Json(v) => Some(v),
            Payload::Text(_) => None,
        }
    }
}

/// The result of one review operation (one API round trip).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub status: Status,
    pub payload: Payload,
    pub model: String,
    pub usage: TokenUsage,
}

impl AnalysisResult {
    pub fn is_success(&self) -> bool {
        self.status == Status::Success
    }

    /// Re-read a text payload as JSON.
    ///
    /// Used when a Markdown-producing command is asked for JSON output. JSON
    /// payloads are returned unchanged; text that holds no parseable JSON
    /// becomes the raw-response fallback with status [`Status::ParseError`].
    pub fn into_structured(self) -> Self {
        match self.payload {
            Payload::Json(_) => self,
            Payload::Text(ref text) => {
                let parsed = crate::pipeline::parse::extract_json(text);
                Self {
                    status: if parsed.parse_error {
                        Status::ParseError
                    } else {
                        self.status
                    },
                    payload: Payload::Json(parsed.value),
                    model: self.model,
                    usage: self.usage,
                }
            }
        }
    }
}

/// What [`crate::report::generate_report`] wrote.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportOutcome {
    pub status: Status,
    pub output_path: std::path::PathBuf,
    pub format: crate::report::ReportFormat,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn text_payload_renders_verbatim() {
        let p = Payload::Text("# Risks\n".into());
        assert_eq!(p.render(), "# Risks\n");
        assert!(p.as_json().is_none());
    }

    #[test]
    fn json_payload_renders_pretty() {
        let p = Payload::Json(json!({"parties": ["A", "B"]}));
        assert!(p.render().contains("\n  \"parties\""));
    }

    #[test]
    fn result_serialises_flat_payload() {
        let r = AnalysisResult {
            status: Status::Success,
            payload: Payload::Text("ok".into()),
            model: "claude-sonnet-4-20250514".into(),
            usage: TokenUsage {
                input_tokens: 10,
                output_tokens: 5,
            },
        };
        let v = serde_json::to_value(&r).unwrap();
        assert_eq!(v["status"], "success");
        assert_eq!(v["payload"], "ok");
        assert_eq!(v["usage"]["input_tokens"], 10);
        assert_eq!(r.usage.total(), 15);
    }

    fn text_result(text: &str) -> AnalysisResult {
        AnalysisResult {
            status: Status::Success,
            payload: Payload::Text(text.into()),
            model: "m".into(),
            usage: TokenUsage::default(),
        }
    }

    #[test]
    fn into_structured_extracts_fenced_json() {
        let r = text_result("Result:\n```json\n{\"overall_completeness\": \"complete\"}\n```").into_structured();
        assert!(r.is_success());
        assert_eq!(
            r.payload.as_json().unwrap()["overall_completeness"],
            "complete"
        );
    }

    #[test]
    fn into_structured_flags_prose() {
        let r = text_result("All signatures present.").into_structured();
        assert_eq!(r.status, Status::ParseError);
        assert_eq!(r.payload.as_json().unwrap()["parse_error"], true);
    }
}
