//! Legal knowledge base: generic and jurisdiction-specific risk knowledge.
//!
//! ## Layout
//!
//! ```text
//! knowledge/
//!  ├─ risk_patterns.json                 {"patterns": [RiskPattern, …]}
//!  └─ jurisdictions/
//!      ├─ US-CA/employment.json          KnowledgeRecord
//!      ├─ CN/labor.json
//!      └─ …
//! ```
//!
//! Files are read at call time and never cached. A jurisdiction/contract-type
//! pair without a file yields an empty context; a file that exists but is not
//! valid JSON is an error.

pub mod connector;

use crate::error::ReviewError;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info};

/// Upper bound, in characters, of the text produced by
/// [`KnowledgeBase::assemble_context`].
pub const MAX_CONTEXT_CHARS: usize = 8000;

const TRUNCATION_MARKER: &str = "\n\n[… knowledge context truncated]\n";

const GENERIC_PATTERNS_FILE: &str = "risk_patterns.json";
const JURISDICTIONS_DIR: &str = "jurisdictions";

// ── Data model ───────────────────────────────────────────────────────────

/// How serious a risk pattern is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    /// Tag used in rendered prompts, e.g. `[HIGH]`.
    pub fn tag(&self) -> &'static str {
        match self {
            Severity::Low => "[LOW]",
            Severity::Medium => "[MEDIUM]",
            Severity::High => "[HIGH]",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        };
        f.write_str(s)
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            other => Err(format!(
                "unknown severity '{other}' (expected low, medium or high)"
            )),
        }
    }
}

impl<'de> Deserialize<'de> for Severity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// A known contractual risk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskPattern {
    pub name: String,
    pub severity: Severity,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<String>,
}

/// A statute or regulation relevant to a contract type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Law {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub citation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

/// Reference data for one jurisdiction/contract-type pair.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeRecord {
    #[serde(default)]
    pub jurisdiction: String,
    #[serde(default)]
    pub contract_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub primary_laws: Vec<Law>,
    #[serde(default)]
    pub risk_patterns: Vec<RiskPattern>,
    /// Rendered as the "red flags" checklist.
    #[serde(default)]
    pub compliance_checklist: Vec<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct GenericPatterns {
    #[serde(default)]
    patterns: Vec<RiskPattern>,
}

// ── Knowledge base ───────────────────────────────────────────────────────

/// Read-only view over a knowledge directory.
#[derive(Debug, Clone)]
pub struct KnowledgeBase {
    root: PathBuf,
}

impl KnowledgeBase {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the record for a pair, or None if either code cannot name a file.
    pub fn record_path(&self, jurisdiction: &str, contract_type: &str) -> Option<PathBuf> {
        let j = normalize_jurisdiction(jurisdiction)?;
        let t = normalize_contract_type(contract_type)?;
        Some(
            self.root
                .join(JURISDICTIONS_DIR)
                .join(j)
                .join(format!("{t}.json")),
        )
    }

    /// Load the record for a pair. Absent files are `Ok(None)`.
    ///
    /// Directory and file names are matched after normalisation, so
    /// `us-tx/Employment.json` serves `US-TX`/`employment`. Empty
    /// `jurisdiction` or `contract_type` fields are filled from the key.
    pub fn load_record(
        &self,
        jurisdiction: &str,
        contract_type: &str,
    ) -> Result<Option<KnowledgeRecord>, ReviewError> {
        let (Some(j), Some(t)) = (
            normalize_jurisdiction(jurisdiction),
            normalize_contract_type(contract_type),
        ) else {
            debug!(
                "Unusable knowledge key '{}'/'{}'; treating as absent",
                jurisdiction, contract_type
            );
            return Ok(None);
        };
        let Some(path) = self.locate_record(&j, &t)? else {
            debug!("No knowledge file for {}/{}", j, t);
            return Ok(None);
        };
        let Some(text) = read_optional(&path)? else {
            return Ok(None);
        };

        let mut record: KnowledgeRecord = parse_json(&path, &text)?;
        if record.jurisdiction.trim().is_empty() {
            record.jurisdiction = j;
        }
        if record.contract_type.trim().is_empty() {
            record.contract_type = t;
        }
        Ok(Some(record))
    }

    fn locate_record(&self, j: &str, t: &str) -> Result<Option<PathBuf>, ReviewError> {
        if let Some(direct) = self.record_path(j, t).filter(|p| p.is_file()) {
            return Ok(Some(direct));
        }
        for (jurisdiction, dir) in self.jurisdiction_dirs()? {
            if jurisdiction != j {
                continue;
            }
            if let Some((_, path)) = record_files(&dir)?.into_iter().find(|(kind, _)| kind == t) {
                return Ok(Some(path));
            }
        }
        Ok(None)
    }

    /// Jurisdiction directories keyed by their normalised code.
    fn jurisdiction_dirs(&self) -> Result<Vec<(String, PathBuf)>, ReviewError> {
        let dir = self.root.join(JURISDICTIONS_DIR);
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(ReviewError::ReadFailed { path: dir, source: e }),
        };

        let mut dirs = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| ReviewError::ReadFailed {
                path: dir.clone(),
                source: e,
            })?;
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            if let Some(code) = normalize_jurisdiction(&entry.file_name().to_string_lossy()) {
                dirs.push((code, path));
            }
        }
        Ok(dirs)
    }

    /// Generic risk patterns from `risk_patterns.json`; empty if absent.
    pub fn generic_patterns(&self) -> Result<Vec<RiskPattern>, ReviewError> {
        let path = self.root.join(GENERIC_PATTERNS_FILE);
        match read_optional(&path)? {
            Some(text) => Ok(parse_json::<GenericPatterns>(&path, &text)?.patterns),
            None => Ok(Vec::new()),
        }
    }

    /// Render the knowledge for a pair as prompt text.
    ///
    /// Returns an empty string when no record exists. The result never
    /// exceeds [`MAX_CONTEXT_CHARS`] characters.
    pub fn assemble_context(
        &self,
        jurisdiction: &str,
        contract_type: &str,
    ) -> Result<String, ReviewError> {
        match self.load_record(jurisdiction, contract_type)? {
            Some(record) => {
                let text = render_context(&record, MAX_CONTEXT_CHARS);
                info!(
                    "Knowledge context for {}/{}: {} laws, {} patterns, {} chars",
                    jurisdiction,
                    contract_type,
                    record.primary_laws.len(),
                    record.risk_patterns.len(),
                    text.chars().count()
                );
                Ok(text)
            }
            None => Ok(String::new()),
        }
    }

    /// All `(jurisdiction, contract_type)` pairs with a file on disk.
    ///
    /// Names are normalised the way lookups normalise them, so every pair
    /// listed here can be passed back to [`KnowledgeBase::load_record`].
    /// Sorted and deduplicated.
    pub fn available(&self) -> Result<Vec<(String, String)>, ReviewError> {
        let mut pairs = Vec::new();
        for (jurisdiction, dir) in self.jurisdiction_dirs()? {
            for (kind, _) in record_files(&dir)? {
                pairs.push((jurisdiction.clone(), kind));
            }
        }
        pairs.sort();
        pairs.dedup();
        Ok(pairs)
    }
}

/// `*.json` files in a jurisdiction directory keyed by normalised contract type.
fn record_files(dir: &Path) -> Result<Vec<(String, PathBuf)>, ReviewError> {
    let files = std::fs::read_dir(dir).map_err(|e| ReviewError::ReadFailed {
        path: dir.to_path_buf(),
        source: e,
    })?;
    let mut out = Vec::new();
    for file in files.flatten() {
        let path = file.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        if let Some(kind) = path
            .file_stem()
            .and_then(|s| s.to_str())
            .and_then(normalize_contract_type)
        {
            out.push((kind, path));
        }
    }
    out.sort();
    Ok(out)
}

/// Upper-case a jurisdiction code, rejecting anything that is not a plain code.
pub fn normalize_jurisdiction(code: &str) -> Option<String> {
    let code = code.trim();
    if code.is_empty() || !code.chars().all(is_code_char) {
        return None;
    }
    Some(code.to_ascii_uppercase())
}

/// Lower snake-case a contract type, rejecting anything that is not a plain name.
pub fn normalize_contract_type(kind: &str) -> Option<String> {
    let kind = kind.trim().to_ascii_lowercase().replace(['-', ' '], "_");
    if kind.is_empty() || !kind.chars().all(is_code_char) {
        return None;
    }
    Some(kind)
}

fn is_code_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

fn read_optional(path: &Path) -> Result<Option<String>, ReviewError> {
    match std::fs::read_to_string(path) {
        Ok(text) => Ok(Some(text)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(ReviewError::ReadFailed {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

fn parse_json<T: serde::de::DeserializeOwned>(path: &Path, text: &str) -> Result<T, ReviewError> {
    serde_json::from_str(text).map_err(|e| ReviewError::InvalidKnowledge {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })
}

// ── Rendering ────────────────────────────────────────────────────────────

#[derive(Clone, Copy, PartialEq, Eq)]
enum Detail {
    Full,
    Compact,
}

/// Render a record within `max_chars` characters.
///
/// The full rendering is used when it fits. Otherwise descriptions and
/// summaries are dropped, keeping every law, pattern name, severity and
/// checklist item. Only if that is still too long is the text cut.
pub fn render_context(record: &KnowledgeRecord, max_chars: usize) -> String {
    let full = render(record, Detail::Full);
    if full.chars().count() <= max_chars {
        return full;
    }
    let compact = render(record, Detail::Compact);
    if compact.chars().count() <= max_chars {
        debug!("Knowledge context over budget; using compact rendering");
        return compact;
    }
    truncate_chars(&compact, max_chars)
}

fn render(record: &KnowledgeRecord, detail: Detail) -> String {
    let mut out = String::new();

    let title = record
        .name
        .clone()
        .unwrap_or_else(|| format!("{} / {}", record.jurisdiction, record.contract_type));
    out.push_str(&format!("## Jurisdiction-Specific Knowledge: {title}\n\n"));
    out.push_str(&format!("Jurisdiction: {}\n", record.jurisdiction));
    out.push_str(&format!("Contract type: {}\n", record.contract_type));

    if !record.primary_laws.is_empty() {
        out.push_str("\n### Applicable Laws\n\n");
        for law in &record.primary_laws {
            out.push_str(&format!("- **{}**", law.name));
            if let Some(ref c) = law.citation {
                out.push_str(&format!(" ({c})"));
            }
            if detail == Detail::Full {
                if let Some(ref s) = law.summary {
                    out.push_str(&format!(": {s}"));
                }
            }
            out.push('\n');
        }
    }

    if !record.risk_patterns.is_empty() {
        out.push_str("\n### Jurisdiction-Specific Risk Patterns\n\n");
        for p in &record.risk_patterns {
            out.push_str(&format!("- {} **{}**", p.severity.tag(), p.name));
            if detail == Detail::Full {
                out.push_str(&format!(": {}", p.description));
                if let Some(ref r) = p.recommendation {
                    out.push_str(&format!("\n  - Recommendation: {r}"));
                }
            }
            out.push('\n');
        }
    }

    if !record.compliance_checklist.is_empty() {
        out.push_str("\n### Red Flags Checklist\n\n");
        for item in &record.compliance_checklist {
            out.push_str(&format!("- [ ] {item}\n"));
        }
    }

    out
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    let marker_len = TRUNCATION_MARKER.chars().count();
    if max_chars < marker_len {
        return text.chars().take(max_chars).collect();
    }
    let keep = max_chars - marker_len;
    let mut out: String = text.chars().take(keep).collect();
    out.push_str(TRUNCATION_MARKER);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> KnowledgeRecord {
        KnowledgeRecord {
            jurisdiction: "US-CA".into(),
            contract_type: "employment".into(),
            name: None,
            primary_laws: vec![Law {
                name: "Non-compete prohibition".into(),
                citation: Some("Cal. Bus. & Prof. Code § 16600".into()),
                summary: Some("Restraints on trade are void.".into()),
            }],
            risk_patterns: vec![
                RiskPattern {
                    name: "Post-employment non-compete".into(),
                    severity: Severity::High,
                    description: "Void in California.".into(),
                    recommendation: Some("Remove it.".into()),
                },
                RiskPattern {
                    name: "Out-of-state forum".into(),
                    severity: Severity::Medium,
                    description: "Disputes heard elsewhere.".into(),
                    recommendation: None,
                },
            ],
            compliance_checklist: vec!["No non-compete".into()],
        }
    }

    #[test]
    fn severity_parses_case_insensitively() {
        let p: RiskPattern = serde_json::from_str(
            r#"{"name":"x","severity":"HIGH","description":"d"}"#,
        )
        .unwrap();
        assert_eq!(p.severity, Severity::High);
        assert!("urgent".parse::<Severity>().is_err());
        assert!(Severity::High > Severity::Low);
    }

    #[test]
    fn full_render_has_all_sections() {
        let text = render_context(&sample_record(), MAX_CONTEXT_CHARS);
        assert!(text.contains("### Applicable Laws"));
        assert!(text.contains("§ 16600"));
        assert!(text.contains("[HIGH] **Post-employment non-compete**: Void in California."));
        assert!(text.contains("Recommendation: Remove it."));
        assert!(text.contains("[MEDIUM] **Out-of-state forum**"));
        assert!(text.contains("### Red Flags Checklist\n\n- [ ] No non-compete"));
    }

    #[test]
    fn tiny_budget_still_respects_bound() {
        for max in [0, 5, TRUNCATION_MARKER.chars().count() - 1] {
            let text = render_context(&sample_record(), max);
            assert!(text.chars().count() <= max, "{max}: {text:?}");
        }
    }

    #[test]
    fn empty_sections_are_omitted() {
        let record = KnowledgeRecord {
            jurisdiction: "GB".into(),
            contract_type: "services".into(),
            ..Default::default()
        };
        let text = render_context(&record, MAX_CONTEXT_CHARS);
        assert!(text.contains("GB / services"));
        assert!(!text.contains("###"));
    }

    #[test]
    fn oversized_record_falls_back_to_compact_and_keeps_names() {
        let mut record = sample_record();
        for p in &mut record.risk_patterns {
            p.description = "very long description ".repeat(400);
        }
        let text = render_context(&record, 2000);
        assert!(text.chars().count() <= 2000);
        assert!(!text.contains("very long description"));
        for p in &record.risk_patterns {
            assert!(text.contains(&p.name), "missing {}", p.name);
        }
    }

    #[test]
    fn hard_truncation_respects_bound_on_multibyte_text() {
        let mut record = sample_record();
        record.compliance_checklist = vec!["§§ überprüfen ".repeat(50); 40];
        let text = render_context(&record, 500);
        assert!(text.chars().count() <= 500);
        assert!(text.ends_with(TRUNCATION_MARKER));
    }

    #[test]
    fn codes_are_normalised_and_sanitised() {
        assert_eq!(normalize_jurisdiction(" us-ca ").as_deref(), Some("US-CA"));
        assert_eq!(
            normalize_contract_type("Employment-Agreement").as_deref(),
            Some("employment_agreement")
        );
        assert_eq!(normalize_jurisdiction("../etc"), None);
        assert_eq!(normalize_contract_type(""), None);
    }

    #[test]
    fn missing_file_gives_empty_context() {
        let dir = tempfile::tempdir().unwrap();
        let kb = KnowledgeBase::new(dir.path());
        assert_eq!(kb.assemble_context("US-TX", "employment").unwrap(), "");
        assert_eq!(kb.assemble_context("../../x", "nda").unwrap(), "");
        assert!(kb.generic_patterns().unwrap().is_empty());
        assert!(kb.available().unwrap().is_empty());
    }

    #[test]
    fn invalid_json_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let jur = dir.path().join("jurisdictions").join("DE");
        std::fs::create_dir_all(&jur).unwrap();
        std::fs::write(jur.join("lease.json"), "{ not json").unwrap();
        let kb = KnowledgeBase::new(dir.path());
        let err = kb.assemble_context("de", "lease").unwrap_err();
        assert!(matches!(err, ReviewError::InvalidKnowledge { .. }));
    }

    #[test]
    fn lookup_uses_normalised_path() {
        let dir = tempfile::tempdir().unwrap();
        let jur = dir.path().join("jurisdictions").join("US-TX");
        std::fs::create_dir_all(&jur).unwrap();
        let record = sample_record();
        std::fs::write(
            jur.join("employment.json"),
            serde_json::to_string(&record).unwrap(),
        )
        .unwrap();
        let kb = KnowledgeBase::new(dir.path());
        let loaded = kb.load_record("us-tx", "Employment").unwrap().unwrap();
        assert_eq!(loaded.risk_patterns.len(), 2);
        assert_eq!(
            kb.available().unwrap(),
            vec![("US-TX".to_string(), "employment".to_string())]
        );
    }

    #[test]
    fn lowercase_directory_is_listed_and_loadable() {
        let dir = tempfile::tempdir().unwrap();
        let tx = dir.path().join("jurisdictions").join("us-tx");
        let cn = dir.path().join("jurisdictions").join("CN");
        std::fs::create_dir_all(&tx).unwrap();
        std::fs::create_dir_all(&cn).unwrap();
        let record = sample_record();
        std::fs::write(tx.join("employment.json"), serde_json::to_string(&record).unwrap()).unwrap();
        std::fs::write(cn.join("Labor.json"), r#"{"compliance_checklist": ["Written contract"]}"#)
            .unwrap();
        std::fs::write(cn.join("notes.txt"), "ignored").unwrap();

        let kb = KnowledgeBase::new(dir.path());
        let pairs = kb.available().unwrap();
        assert_eq!(
            pairs,
            vec![
                ("CN".to_string(), "labor".to_string()),
                ("US-TX".to_string(), "employment".to_string()),
            ]
        );
        for (j, t) in &pairs {
            assert!(kb.load_record(j, t).unwrap().is_some(), "{j}/{t} not loadable");
        }
        let context = kb.assemble_context("US-TX", "employment").unwrap();
        assert!(context.contains("Post-employment non-compete"));
    }

    #[test]
    fn record_without_keys_takes_them_from_the_path() {
        let dir = tempfile::tempdir().unwrap();
        let jur = dir.path().join("jurisdictions").join("US-TX");
        std::fs::create_dir_all(&jur).unwrap();
        std::fs::write(
            jur.join("employment.json"),
            r#"{"risk_patterns": [{"name": "At-will clause", "severity": "low", "description": "d"}]}"#,
        )
        .unwrap();

        let kb = KnowledgeBase::new(dir.path());
        let record = kb.load_record("us-tx", "employment").unwrap().unwrap();
        assert_eq!(record.jurisdiction, "US-TX");
        assert_eq!(record.contract_type, "employment");

        let context = kb.assemble_context("us-tx", "employment").unwrap();
        assert!(context.contains("Jurisdiction-Specific Knowledge: US-TX / employment"));
        assert!(context.contains("Jurisdiction: US-TX\n"));
        assert!(context.contains("Contract type: employment\n"));
        assert!(!context.contains(": \n"));
    }
}
