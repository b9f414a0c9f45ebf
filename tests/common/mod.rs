//! Shared fixtures for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use contract_review::{InferenceClient, InferenceRequest, InferenceResponse, ReviewError, TokenUsage};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// A one-page PDF with each entry of `lines` on its own text line.
///
/// Offsets in the xref table are computed, so the result opens in pdfium
/// and is accepted by the Anthropic API.
pub fn minimal_pdf(lines: &[&str]) -> Vec<u8> {
    let mut content = String::from("BT /F1 12 Tf 72 720 Td 16 TL\n");
    for line in lines {
        let escaped = line
            .replace('\\', "\\\\")
            .replace('(', "\\(")
            .replace(')', "\\)");
        content.push_str(&format!("({escaped}) Tj T*\n"));
    }
    content.push_str("ET");

    let objects = [
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        "<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_string(),
        "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R \
         /Resources << /Font << /F1 5 0 R >> >> >>"
            .to_string(),
        format!(
            "<< /Length {} >>\nstream\n{content}\nendstream",
            content.len()
        ),
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_string(),
    ];

    let mut pdf = String::from("%PDF-1.4\n");
    let mut offsets = Vec::with_capacity(objects.len());
    for (i, body) in objects.iter().enumerate() {
        offsets.push(pdf.len());
        pdf.push_str(&format!("{} 0 obj\n{body}\nendobj\n", i + 1));
    }
    let xref_at = pdf.len();
    pdf.push_str(&format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1));
    for off in offsets {
        pdf.push_str(&format!("{off:010} 00000 n \n"));
    }
    pdf.push_str(&format!(
        "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{xref_at}\n%%EOF\n",
        objects.len() + 1
    ));
    pdf.into_bytes()
}

/// Write a fixture PDF into `dir`.
pub fn write_pdf(dir: &Path, name: &str, lines: &[&str]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, minimal_pdf(lines)).expect("write fixture pdf");
    path
}

pub const EMPLOYMENT_TEXT: &[&str] = &[
    "EMPLOYMENT AGREEMENT",
    "This Agreement is made between Acme Corp (Employer) and Jane Doe (Employee).",
    "1. Term. Employment begins on 1 March 2025 and continues at will.",
    "2. Compensation. Employer shall pay USD 120,000 per year.",
    "3. Non-competition. For 2 years after termination Employee shall not work for a competitor.",
    "4. Governing law. This Agreement is governed by the laws of California.",
    "Signed: ____________ (Employer)    ____________ (Employee)",
];

/// Inference client that answers every request with a fixed reply.
pub struct ScriptedClient {
    reply: String,
    requests: Mutex<Vec<InferenceRequest>>,
}

impl ScriptedClient {
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<InferenceRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn last(&self) -> InferenceRequest {
        self.requests().pop().expect("no request was sent")
    }
}

#[async_trait]
impl InferenceClient for ScriptedClient {
    fn name(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &str {
        "scripted-model"
    }

    async fn complete(&self, request: &InferenceRequest) -> Result<InferenceResponse, ReviewError> {
        self.requests.lock().unwrap().push(request.clone());
        Ok(InferenceResponse {
            text: self.reply.clone(),
            usage: TokenUsage {
                input_tokens: 1500,
                output_tokens: 400,
            },
        })
    }
}
