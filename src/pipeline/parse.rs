//! Response parsing: JSON extraction and Markdown clean-up.
//!
//! Models are asked to wrap structured answers in a fenced ```` ```json ````
//! block but frequently add prose around it, or skip the fence entirely. The
//! extractor takes the first fenced block, falls back to the whole reply, and
//! never fails: unparseable replies become a raw-text payload flagged with
//! `parse_error`.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value};
use tracing::{debug, warn};

/// JSON pulled out of a model reply.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedResponse {
    pub value: Value,
    /// True when `value` is the `{"raw_response", "parse_error"}` fallback.
    pub parse_error: bool,
}

// Opening fence with an optional info string, lazily matched body, closing fence.
static RE_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```[A-Za-z0-9_+\-]*[ \t]*\r?\n?(.*?)```").unwrap());

/// Extract the JSON payload of a model reply.
///
/// The first fenced block wins. Without a fence, the whole trimmed reply is
/// parsed. Anything else yields `{"raw_response": text, "parse_error": true}`.
pub fn extract_json(text: &str) -> ParsedResponse {
    let candidate = match RE_FENCE.captures(text) {
        Some(caps) => caps.get(1).map_or("", |m| m.as_str()),
        None => text,
    };

    match serde_json::from_str::<Value>(candidate.trim()) {
        Ok(value) => {
            debug!("Extracted JSON payload ({} bytes)", candidate.len());
            ParsedResponse {
                value,
                parse_error: false,
            }
        }
        Err(e) => {
            warn!("Response is not valid JSON ({}); keeping raw text", e);
            ParsedResponse {
                value: json!({ "raw_response": text, "parse_error": true }),
                parse_error: true,
            }
        }
    }
}

/// Deterministic clean-up of model-written Markdown.
///
/// Passes, in order: outer fence removal, CRLF normalisation, invisible
/// characters and trailing whitespace, heading spacing, blank-line
/// collapsing, missing table separator rows, final newline. Fenced code
/// blocks are left as written apart from trailing whitespace, so JSON inside
/// a fence parses to the same value before and after. Content is never
/// reworded.
pub fn clean_markdown(input: &str) -> String {
    let text = unwrap_outer_fence(input);
    let text = text.replace("\r\n", "\n").replace('\r', "\n");

    let raw: Vec<&str> = text.lines().collect();
    let lines: Vec<String> = raw
        .iter()
        .zip(code_mask(&raw))
        .map(|(line, in_code)| {
            if in_code {
                line.trim_end().to_string()
            } else {
                strip_invisible(line).trim_end().to_string()
            }
        })
        .collect();
    let lines = space_headings(lines);
    let lines = collapse_blank_runs(lines);
    let lines = add_table_separators(lines);

    let body = lines.join("\n");
    let body = body.trim_matches('\n');
    if body.is_empty() {
        "\n".to_string()
    } else {
        format!("{body}\n")
    }
}

static RE_OUTER_FENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)\A```(markdown|md)?[ \t]*\r?\n(.*?)\r?\n```\s*\z").unwrap()
});

/// Remove a fence wrapping the whole reply.
///
/// A bare fence is only unwrapped when nothing inside it is fenced: a reply
/// that opens and closes with two separate blocks would otherwise be turned
/// inside out.
fn unwrap_outer_fence(input: &str) -> String {
    let Some(caps) = RE_OUTER_FENCE.captures(input.trim()) else {
        return input.to_string();
    };
    let labelled = caps.get(1).is_some();
    let body = caps.get(2).map_or("", |m| m.as_str());
    if !labelled && body.lines().any(is_fence) {
        return input.to_string();
    }
    body.to_string()
}

fn strip_invisible(input: &str) -> String {
    input
        .chars()
        .filter(|c| !matches!(c, '\u{200B}' | '\u{200C}' | '\u{200D}' | '\u{2060}' | '\u{FEFF}' | '\u{00AD}'))
        .collect()
}

fn is_fence(line: &str) -> bool {
    line.trim_start().starts_with("```")
}

/// True for fence lines and every line between an opening and closing fence.
fn code_mask<S: AsRef<str>>(lines: &[S]) -> Vec<bool> {
    let mut in_code = false;
    lines
        .iter()
        .map(|line| {
            if is_fence(line.as_ref()) {
                in_code = !in_code;
                true
            } else {
                in_code
            }
        })
        .collect()
}

fn is_heading(line: &str) -> bool {
    let hashes = line.chars().take_while(|&c| c == '#').count();
    (1..=6).contains(&hashes) && line[hashes..].starts_with(' ')
}

/// Insert a blank line before every heading that does not open the document.
fn space_headings(lines: Vec<String>) -> Vec<String> {
    let mask = code_mask(&lines);
    let mut out: Vec<String> = Vec::with_capacity(lines.len() + 8);
    for (line, in_code) in lines.into_iter().zip(mask) {
        if !in_code && is_heading(&line) && out.last().is_some_and(|prev| !prev.is_empty()) {
            out.push(String::new());
        }
        out.push(line);
    }
    out
}

/// At most one blank line in a row outside code blocks.
fn collapse_blank_runs(lines: Vec<String>) -> Vec<String> {
    let mask = code_mask(&lines);
    let mut out: Vec<String> = Vec::with_capacity(lines.len());
    for (line, in_code) in lines.into_iter().zip(mask) {
        if !in_code && line.is_empty() && out.last().is_some_and(|prev| prev.is_empty()) {
            continue;
        }
        out.push(line);
    }
    out
}

fn is_table_row(line: &str) -> bool {
    let t = line.trim();
    t.len() > 2 && t.starts_with('|') && t.ends_with('|')
}

fn is_separator_row(line: &str) -> bool {
    let t = line.trim();
    t.starts_with('|') && t.contains('-') && t.chars().all(|c| matches!(c, '|' | '-' | ':' | ' '))
}

/// GFM needs a separator after the header row; models sometimes omit it.
fn add_table_separators(lines: Vec<String>) -> Vec<String> {
    let mask = code_mask(&lines);
    let prose_row = |i: usize| -> bool {
        lines.get(i).is_some_and(|l| is_table_row(l)) && !mask.get(i).copied().unwrap_or(true)
    };

    let mut out = Vec::with_capacity(lines.len() + 4);
    for (i, line) in lines.iter().enumerate() {
        out.push(line.clone());
        let starts_table =
            prose_row(i) && !is_separator_row(line) && (i == 0 || !prose_row(i - 1));
        let next_is_body = prose_row(i + 1) && !is_separator_row(&lines[i + 1]);
        if starts_table && next_is_body {
            let columns = line.trim().matches('|').count().saturating_sub(1).max(1);
            out.push(format!("|{}", " --- |".repeat(columns)));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_object_inside_json_fence() {
        let reply = "Here are the terms:\n```json\n{\"parties\": [\"Acme\", \"Beta\"]}\n```\nLet me know.";
        let parsed = extract_json(reply);
        assert!(!parsed.parse_error);
        assert_eq!(parsed.value, json!({"parties": ["Acme", "Beta"]}));
    }

    #[test]
    fn bare_fence_is_accepted() {
        let parsed = extract_json("```\n[1, 2, 3]\n```");
        assert_eq!(parsed.value, json!([1, 2, 3]));
    }

    #[test]
    fn first_fence_wins() {
        let reply = "```json\n{\"a\": 1}\n```\n\n```json\n{\"b\": 2}\n```";
        assert_eq!(extract_json(reply).value, json!({"a": 1}));
    }

    #[test]
    fn unfenced_json_parses_whole_reply() {
        let parsed = extract_json("  {\"ok\": true}\n");
        assert!(!parsed.parse_error);
        assert_eq!(parsed.value["ok"], true);
    }

    #[test]
    fn prose_falls_back_to_raw_response() {
        let reply = "I could not read the signature page.";
        let parsed = extract_json(reply);
        assert!(parsed.parse_error);
        assert_eq!(parsed.value["raw_response"], reply);
        assert_eq!(parsed.value["parse_error"], true);
    }

    #[test]
    fn broken_fence_body_falls_back() {
        let parsed = extract_json("```json\n{\"a\": \n```");
        assert!(parsed.parse_error);
    }

    #[test]
    fn strips_outer_markdown_fence() {
        let out = clean_markdown("```markdown\n# Report\n\nBody\n```");
        assert_eq!(out, "# Report\n\nBody\n");
    }

    #[test]
    fn inner_code_fences_survive() {
        let src = "# Report\n\n```json\n{}\n```\n\nDone";
        assert_eq!(clean_markdown(src), format!("{src}\n"));
    }

    #[test]
    fn normalises_whitespace() {
        let out = clean_markdown("Intro  \r\n\r\n\r\n\r\nNext\u{200B} line\t\n\n\n");
        assert_eq!(out, "Intro\n\nNext line\n");
    }

    #[test]
    fn headings_get_breathing_room() {
        let out = clean_markdown("# Title\nText\n## Risks\n- one");
        assert_eq!(out, "# Title\nText\n\n## Risks\n- one\n");
    }

    #[test]
    fn missing_table_separator_is_inserted() {
        let out = clean_markdown("| Clause | Risk |\n| Term | High |");
        assert_eq!(out, "| Clause | Risk |\n| --- | --- |\n| Term | High |\n");
    }

    #[test]
    fn well_formed_table_untouched() {
        let src = "| A | B |\n|---|---|\n| 1 | 2 |\n| 3 | 4 |\n";
        assert_eq!(clean_markdown(src), src);
    }

    #[test]
    fn empty_input_yields_single_newline() {
        assert_eq!(clean_markdown("   \n\n"), "\n");
    }

    #[test]
    fn separate_leading_and_trailing_fences_are_not_unwrapped() {
        let reply = "```\n{\"overall_completeness\": \"incomplete\"}\n```\n\nNotes:\n\n```\nsee page 3\n```";
        let cleaned = clean_markdown(reply);
        assert_eq!(cleaned, format!("{reply}\n"));
        let parsed = extract_json(&cleaned);
        assert!(!parsed.parse_error);
        assert_eq!(parsed.value["overall_completeness"], "incomplete");
    }

    #[test]
    fn labelled_outer_fence_is_unwrapped_around_inner_blocks() {
        let out = clean_markdown("```markdown\n# Report\n\n```json\n{}\n```\n```");
        assert_eq!(out, "# Report\n\n```json\n{}\n```\n");
    }

    #[test]
    fn code_block_contents_are_left_alone() {
        let body = "{\"note\": \"a\u{200B}b\",\n\n\n\"row\": \"| x |\",\n\"next\": \"| y |\"}";
        let src = format!("Intro\u{200B}\n\n```json\n{body}\n```");
        let out = clean_markdown(&src);
        assert_eq!(out, format!("Intro\n\n```json\n{body}\n```\n"));
        assert_eq!(
            extract_json(&out).value,
            serde_json::from_str::<Value>(body).unwrap()
        );
    }
}
