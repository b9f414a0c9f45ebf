//! Pipeline stages for a contract review.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ compose ──▶ (client) ──▶ parse
//! (PDF)     (prompt)    (LLM)        (JSON / Markdown)
//!   │
//!   └──▶ encode / render   document payload for the chosen backend
//! ```
//!
//! 1. [`input`]: validate PDF paths and read the bytes
//! 2. [`compose`]: concatenate template, knowledge context and reference data
//! 3. [`encode`]: base64 for native PDF upload, PNG+base64 for page images
//! 4. [`render`]: rasterise pages with pdfium (vision backend only)
//! 5. [`parse`]: extract JSON from fenced blocks, clean up Markdown

pub mod compose;
pub mod encode;
pub mod input;
pub mod parse;
pub mod render;
