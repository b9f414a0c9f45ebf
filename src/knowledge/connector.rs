//! External legal-knowledge connectors.
//!
//! The static knowledge base covers the common jurisdiction/contract-type
//! pairs. Connectors reach further, into hosted statute databases, for
//! citation lookups while reviewing. They are optional: nothing in the review
//! pipeline depends on one being configured.

use crate::error::ReviewError;
use crate::knowledge::RiskPattern;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

/// A source of legal texts that can be searched and queried by citation.
#[async_trait]
pub trait KnowledgeConnector: Send + Sync {
    /// Human-readable connector name.
    fn name(&self) -> &str;

    /// Jurisdiction codes this connector can answer for.
    fn supported_jurisdictions(&self) -> Vec<String>;

    /// Full-text search within a jurisdiction.
    async fn search(
        &self,
        query: &str,
        jurisdiction: &str,
        limit: usize,
    ) -> Result<Vec<Value>, ReviewError>;

    /// Fetch a document by citation. Unknown citations are `Ok(None)`.
    async fn get_by_citation(&self, citation: &str) -> Result<Option<Value>, ReviewError>;

    /// Jurisdiction-specific risk patterns, for connectors that publish them.
    async fn risk_patterns(
        &self,
        jurisdiction: &str,
        contract_type: &str,
    ) -> Result<Vec<RiskPattern>, ReviewError> {
        let _ = (jurisdiction, contract_type);
        Ok(Vec::new())
    }

    /// Whether a citation exists.
    async fn validate_citation(&self, citation: &str) -> Result<bool, ReviewError> {
        Ok(self.get_by_citation(citation).await?.is_some())
    }

    /// Whether the connector can currently answer a trivial query.
    async fn health_check(&self) -> bool {
        match self.search("test", "federal", 1).await {
            Ok(_) => true,
            Err(e) => {
                warn!("{} health check failed: {}", self.name(), e);
                false
            }
        }
    }
}

/// OpenLaws US federal and state law API.
pub struct OpenLawsConnector {
    http: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
}

impl OpenLawsConnector {
    pub const BASE_URL: &'static str = "https://api.openlaws.us/v1";
    const TIMEOUT_SECS: u64 = 30;

    /// Create a connector. Requests fail with
    /// [`ReviewError::ProviderNotConfigured`] while `api_key` is None.
    pub fn new(api_key: Option<String>) -> Result<Self, ReviewError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(Self::TIMEOUT_SECS))
            .build()
            .map_err(|e| ReviewError::Internal(format!("HTTP client: {e}")))?;
        Ok(Self {
            http,
            api_key: api_key.filter(|k| !k.is_empty()),
            base_url: Self::BASE_URL.to_string(),
        })
    }

    /// Create a connector using `OPENLAWS_API_KEY`.
    pub fn from_env() -> Result<Self, ReviewError> {
        Self::new(std::env::var("OPENLAWS_API_KEY").ok())
    }

    /// Point the connector at a different deployment.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Text of a statute section, e.g. title 29 section 206 of the US Code.
    pub async fn statute_text(
        &self,
        title: u32,
        section: u32,
        jurisdiction: &str,
    ) -> Result<Option<String>, ReviewError> {
        let citation = statute_citation(title, section, jurisdiction);
        Ok(self
            .get_by_citation(&citation)
            .await?
            .and_then(|doc| doc.get("text").and_then(Value::as_str).map(str::to_string)))
    }

    async fn get(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> Result<reqwest::Response, ReviewError> {
        let key = self
            .api_key
            .as_deref()
            .ok_or_else(|| ReviewError::ProviderNotConfigured {
                provider: "openlaws".into(),
                hint: "Get a free key at https://openlaws.us/api/ and set OPENLAWS_API_KEY."
                    .into(),
            })?;

        let url = format!("{}/{}", self.base_url, endpoint);
        debug!("OpenLaws GET {} {:?}", url, params);
        self.http
            .get(&url)
            .bearer_auth(key)
            .query(params)
            .send()
            .await
            .map_err(|e| self.failed(e.to_string()))
    }

    fn failed(&self, detail: String) -> ReviewError {
        ReviewError::ConnectorFailed {
            connector: self.name().to_string(),
            detail,
        }
    }
}

#[async_trait]
impl KnowledgeConnector for OpenLawsConnector {
    fn name(&self) -> &str {
        "OpenLaws Legal Data API"
    }

    fn supported_jurisdictions(&self) -> Vec<String> {
        std::iter::once("US-Federal".to_string())
            .chain(US_STATES.iter().map(|s| format!("US-{s}")))
            .collect()
    }

    async fn search(
        &self,
        query: &str,
        jurisdiction: &str,
        limit: usize,
    ) -> Result<Vec<Value>, ReviewError> {
        let params = [
            ("q", query.to_string()),
            ("jurisdiction", jurisdiction.to_string()),
            ("limit", limit.to_string()),
        ];
        let response = self.get("search", &params).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(self.failed(format!("search returned HTTP {status}")));
        }
        let body: Value = response
            .json()
            .await
            .map_err(|e| self.failed(e.to_string()))?;
        Ok(search_results(body))
    }

    async fn get_by_citation(&self, citation: &str) -> Result<Option<Value>, ReviewError> {
        let response = self
            .get("citation", &[("citation", citation.to_string())])
            .await?;
        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(self.failed(format!("citation lookup returned HTTP {status}")));
        }
        let doc = response
            .json()
            .await
            .map_err(|e| self.failed(e.to_string()))?;
        Ok(Some(doc))
    }
}

/// Format a statute citation: Bluebook style for the US Code, `<code> § n` otherwise.
pub fn statute_citation(title: u32, section: u32, jurisdiction: &str) -> String {
    if jurisdiction.eq_ignore_ascii_case("usc") {
        format!("{title} U.S.C. § {section}")
    } else {
        format!("{jurisdiction} § {section}")
    }
}

fn search_results(body: Value) -> Vec<Value> {
    match body {
        Value::Object(mut map) => match map.remove("results") {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        },
        Value::Array(items) => items,
        _ => Vec::new(),
    }
}

const US_STATES: [&str; 51] = [
    "AL", "AK", "AZ", "AR", "CA", "CO", "CT", "DE", "FL", "GA", "HI", "ID", "IL", "IN", "IA",
    "KS", "KY", "LA", "ME", "MD", "MA", "MI", "MN", "MS", "MO", "MT", "NE", "NV", "NH", "NJ",
    "NM", "NY", "NC", "ND", "OH", "OK", "OR", "PA", "RI", "SC", "SD", "TN", "TX", "UT", "VT",
    "VA", "WA", "WV", "WI", "WY", "DC",
];

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn supports_federal_states_and_dc() {
        let c = OpenLawsConnector::new(None).unwrap();
        let j = c.supported_jurisdictions();
        assert_eq!(j.len(), 52);
        assert_eq!(j[0], "US-Federal");
        assert!(j.contains(&"US-CA".to_string()));
        assert!(j.contains(&"US-DC".to_string()));
    }

    #[test]
    fn citation_formats() {
        assert_eq!(statute_citation(29, 206, "usc"), "29 U.S.C. § 206");
        assert_eq!(statute_citation(0, 16600, "CA BPC"), "CA BPC § 16600");
    }

    #[test]
    fn search_results_accepts_wrapped_and_bare_lists() {
        assert_eq!(search_results(json!({"results": [{"a": 1}]})).len(), 1);
        assert_eq!(search_results(json!([{"a": 1}, {"b": 2}])).len(), 2);
        assert!(search_results(json!({"error": "x"})).is_empty());
    }

    #[test]
    fn missing_key_fails_before_any_request() {
        let c = OpenLawsConnector::new(Some(String::new())).unwrap();
        let err = tokio_test::block_on(c.get_by_citation("29 U.S.C. § 206")).unwrap_err();
        assert!(matches!(err, ReviewError::ProviderNotConfigured { .. }));
    }

    #[test]
    fn health_check_reports_unconfigured_as_unhealthy() {
        let c = OpenLawsConnector::new(None).unwrap();
        assert!(!tokio_test::block_on(c.health_check()));
    }

    #[test]
    fn default_risk_patterns_are_empty() {
        let c = OpenLawsConnector::new(None).unwrap();
        let patterns = tokio_test::block_on(c.risk_patterns("US-CA", "employment")).unwrap();
        assert!(patterns.is_empty());
    }
}
