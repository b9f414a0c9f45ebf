//! Report generation: Markdown files and Word documents.
//!
//! The analysis payload is already Markdown, so the Markdown report is a
//! title block in front of it. DOCX output runs a small line-oriented
//! Markdown reader ([`parse_blocks`]) and maps each block onto docx-rs
//! paragraphs and tables. It understands what the review prompts ask models
//! to produce (headings, lists, tables, quotes, code, `**bold**`), nothing
//! more.
//!
//! Both formats are written to a temporary file in the target directory and
//! renamed into place, so a failed run never leaves a half-written report.

use crate::error::ReviewError;
use crate::output::{AnalysisResult, ReportOutcome};
use docx_rs::{Docx, Paragraph, Run, RunFonts, Table, TableCell, TableRow};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

/// Report file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Markdown,
    Docx,
}

impl ReportFormat {
    /// Conventional file extension.
    pub fn extension(&self) -> &'static str {
        match self {
            ReportFormat::Markdown => "md",
            ReportFormat::Docx => "docx",
        }
    }
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportFormat::Markdown => f.write_str("markdown"),
            ReportFormat::Docx => f.write_str("docx"),
        }
    }
}

/// Default report title.
pub const DEFAULT_TITLE: &str = "Contract Review Report";

/// Write `analysis` to `output_path` as a titled report.
pub fn generate_report(
    analysis: &AnalysisResult,
    output_path: impl AsRef<Path>,
    format: ReportFormat,
    title: &str,
) -> Result<ReportOutcome, ReviewError> {
    let path = output_path.as_ref();
    let body = analysis.payload.render();
    let generated = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();

    match format {
        ReportFormat::Markdown => {
            let text = markdown_report(title, &generated, &body);
            write_atomic(path, |f| f.write_all(text.as_bytes()))?;
        }
        ReportFormat::Docx => {
            let mut packed = std::io::Cursor::new(Vec::new());
            docx_report(title, &generated, &body)
                .build()
                .pack(&mut packed)
                .map_err(|e| ReviewError::DocxBuildFailed {
                    path: path.to_path_buf(),
                    detail: e.to_string(),
                })?;
            write_atomic(path, |f| f.write_all(packed.get_ref()))?;
        }
    }

    info!("Wrote {} report to {}", format, path.display());
    Ok(ReportOutcome {
        status: analysis.status,
        output_path: path.to_path_buf(),
        format,
    })
}

fn markdown_report(title: &str, generated: &str, body: &str) -> String {
    format!(
        "# {title}\n\n*Generated: {generated}*\n\n---\n\n{}\n",
        body.trim_end()
    )
}

/// Write through a temp file in the destination directory, then rename.
/// The temp file is removed on drop if any step fails.
fn write_atomic(
    path: &Path,
    fill: impl FnOnce(&mut std::fs::File) -> std::io::Result<()>,
) -> Result<(), ReviewError> {
    let failed = |source: std::io::Error| ReviewError::ReportWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&parent).map_err(failed)?;

    let mut tmp = tempfile::NamedTempFile::new_in(&parent).map_err(failed)?;
    fill(tmp.as_file_mut()).map_err(failed)?;
    tmp.as_file_mut().flush().map_err(failed)?;
    tmp.persist(path).map_err(|e| failed(e.error))?;
    Ok(())
}

// ── Markdown reader ──────────────────────────────────────────────────────

/// A block-level Markdown element.
#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Heading(usize, String),
    Bullet(String),
    Numbered(String, String),
    Quote(String),
    Code(Vec<String>),
    /// Rows of cells; the first row is the header.
    Table(Vec<Vec<String>>),
    Rule,
    Paragraph(String),
}

/// Split Markdown into blocks, one line at a time.
///
/// Consecutive plain lines join into one paragraph. Table separator rows are
/// dropped. An unterminated code fence runs to the end of the text.
pub fn parse_blocks(markdown: &str) -> Vec<Block> {
    let mut blocks = Vec::new();
    let mut paragraph: Vec<&str> = Vec::new();
    let mut table: Vec<Vec<String>> = Vec::new();
    let mut code: Option<Vec<String>> = None;

    let flush_paragraph = |paragraph: &mut Vec<&str>, blocks: &mut Vec<Block>| {
        if !paragraph.is_empty() {
            blocks.push(Block::Paragraph(paragraph.join(" ")));
            paragraph.clear();
        }
    };
    let flush_table = |table: &mut Vec<Vec<String>>, blocks: &mut Vec<Block>| {
        if !table.is_empty() {
            blocks.push(Block::Table(std::mem::take(table)));
        }
    };

    for raw in markdown.lines() {
        if let Some(ref mut lines) = code {
            if raw.trim_start().starts_with("```") {
                blocks.push(Block::Code(std::mem::take(lines)));
                code = None;
            } else {
                lines.push(raw.to_string());
            }
            continue;
        }

        let line = raw.trim();
        if !is_table_line(line) {
            flush_table(&mut table, &mut blocks);
        }

        if line.starts_with("```") {
            flush_paragraph(&mut paragraph, &mut blocks);
            code = Some(Vec::new());
        } else if line.is_empty() {
            flush_paragraph(&mut paragraph, &mut blocks);
        } else if is_table_line(line) {
            flush_paragraph(&mut paragraph, &mut blocks);
            if !is_separator(line) {
                table.push(split_cells(line));
            }
        } else if let Some((level, text)) = heading(line) {
            flush_paragraph(&mut paragraph, &mut blocks);
            blocks.push(Block::Heading(level, text.to_string()));
        } else if matches!(line, "---" | "***" | "___") {
            flush_paragraph(&mut paragraph, &mut blocks);
            blocks.push(Block::Rule);
        } else if let Some(text) = line
            .strip_prefix("- ")
            .or_else(|| line.strip_prefix("* "))
            .or_else(|| line.strip_prefix("+ "))
        {
            flush_paragraph(&mut paragraph, &mut blocks);
            blocks.push(Block::Bullet(text.to_string()));
        } else if let Some((marker, text)) = numbered(line) {
            flush_paragraph(&mut paragraph, &mut blocks);
            blocks.push(Block::Numbered(marker.to_string(), text.to_string()));
        } else if let Some(text) = line.strip_prefix('>') {
            flush_paragraph(&mut paragraph, &mut blocks);
            blocks.push(Block::Quote(text.trim_start().to_string()));
        } else {
            paragraph.push(line);
        }
    }

    if let Some(lines) = code {
        blocks.push(Block::Code(lines));
    }
    flush_table(&mut table, &mut blocks);
    flush_paragraph(&mut paragraph, &mut blocks);
    blocks
}

fn heading(line: &str) -> Option<(usize, &str)> {
    let level = line.chars().take_while(|&c| c == '#').count();
    if !(1..=6).contains(&level) {
        return None;
    }
    line[level..]
        .strip_prefix(' ')
        .map(|text| (level, text.trim()))
}

/// "12. text" or "3) text".
fn numbered(line: &str) -> Option<(&str, &str)> {
    let digits = line.chars().take_while(char::is_ascii_digit).count();
    if digits == 0 {
        return None;
    }
    let rest = &line[digits..];
    let text = rest
        .strip_prefix(". ")
        .or_else(|| rest.strip_prefix(") "))?;
    Some((&line[..digits + 1], text))
}

fn is_table_line(line: &str) -> bool {
    line.len() > 1 && line.starts_with('|') && line.ends_with('|')
}

fn is_separator(line: &str) -> bool {
    line.contains('-') && line.chars().all(|c| matches!(c, '|' | '-' | ':' | ' '))
}

fn split_cells(line: &str) -> Vec<String> {
    line.trim_matches('|')
        .split('|')
        .map(|c| c.trim().to_string())
        .collect()
}

/// Split `**bold**` spans into `(text, bold)` runs.
pub fn inline_runs(text: &str) -> Vec<(String, bool)> {
    text.split("**")
        .enumerate()
        .filter(|(_, part)| !part.is_empty())
        .map(|(i, part)| (part.to_string(), i % 2 == 1))
        .collect()
}

// ── DOCX ─────────────────────────────────────────────────────────────────

// Sizes are in half-points.
const TITLE_SIZE: usize = 36;
const BODY_SIZE: usize = 22;
const META_SIZE: usize = 18;

fn heading_size(level: usize) -> usize {
    match level {
        1 => 32,
        2 => 28,
        3 => 26,
        _ => 24,
    }
}

fn styled_paragraph(text: &str, size: usize, all_bold: bool, italic: bool) -> Paragraph {
    inline_runs(text)
        .into_iter()
        .fold(Paragraph::new(), |p, (chunk, bold)| {
            let mut run = Run::new().add_text(chunk).size(size);
            if bold || all_bold {
                run = run.bold();
            }
            if italic {
                run = run.italic();
            }
            p.add_run(run)
        })
}

fn docx_report(title: &str, generated: &str, body: &str) -> Docx {
    let mut doc = Docx::new()
        .add_paragraph(styled_paragraph(title, TITLE_SIZE, true, false))
        .add_paragraph(styled_paragraph(
            &format!("Generated: {generated}"),
            META_SIZE,
            false,
            true,
        ))
        .add_paragraph(Paragraph::new());

    for block in parse_blocks(body) {
        doc = match block {
            Block::Heading(level, text) => {
                doc.add_paragraph(styled_paragraph(&text, heading_size(level), true, false))
            }
            Block::Bullet(text) => {
                doc.add_paragraph(styled_paragraph(&format!("• {text}"), BODY_SIZE, false, false))
            }
            Block::Numbered(marker, text) => doc.add_paragraph(styled_paragraph(
                &format!("{marker} {text}"),
                BODY_SIZE,
                false,
                false,
            )),
            Block::Quote(text) => {
                doc.add_paragraph(styled_paragraph(&text, BODY_SIZE, false, true))
            }
            Block::Code(lines) => lines.into_iter().fold(doc, |d, line| {
                d.add_paragraph(
                    Paragraph::new().add_run(
                        Run::new()
                            .add_text(line)
                            .size(META_SIZE)
                            .fonts(RunFonts::new().ascii("Courier New")),
                    ),
                )
            }),
            Block::Table(rows) => doc.add_table(docx_table(rows)),
            Block::Rule => doc.add_paragraph(Paragraph::new()),
            Block::Paragraph(text) => {
                doc.add_paragraph(styled_paragraph(&text, BODY_SIZE, false, false))
            }
        };
    }
    doc
}

fn docx_table(rows: Vec<Vec<String>>) -> Table {
    let rows = rows
        .into_iter()
        .enumerate()
        .map(|(i, cells)| {
            TableRow::new(
                cells
                    .iter()
                    .map(|cell| {
                        TableCell::new().add_paragraph(styled_paragraph(cell, BODY_SIZE, i == 0, false))
                    })
                    .collect(),
            )
        })
        .collect();
    Table::new(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::{Payload, Status, TokenUsage};

    fn analysis(text: &str) -> AnalysisResult {
        AnalysisResult {
            status: Status::Success,
            payload: Payload::Text(text.into()),
            model: "m".into(),
            usage: TokenUsage::default(),
        }
    }

    const BODY: &str = "# Overview\n\nThe **term** is two years.\nRenewal is automatic.\n\n## Risks\n\n- Unlimited liability\n1. Cap damages\n> Reviewed draft only\n\n| Clause | Risk |\n|---|---|\n| 7.2 | High |\n\n```\nraw\n```\n---\n";

    #[test]
    fn parses_every_block_kind() {
        let blocks = parse_blocks(BODY);
        assert_eq!(
            blocks,
            vec![
                Block::Heading(1, "Overview".into()),
                Block::Paragraph("The **term** is two years. Renewal is automatic.".into()),
                Block::Heading(2, "Risks".into()),
                Block::Bullet("Unlimited liability".into()),
                Block::Numbered("1.".into(), "Cap damages".into()),
                Block::Quote("Reviewed draft only".into()),
                Block::Table(vec![
                    vec!["Clause".into(), "Risk".into()],
                    vec!["7.2".into(), "High".into()],
                ]),
                Block::Code(vec!["raw".into()]),
                Block::Rule,
            ]
        );
    }

    #[test]
    fn hashtag_without_space_is_text() {
        assert_eq!(
            parse_blocks("#hashtag"),
            vec![Block::Paragraph("#hashtag".into())]
        );
    }

    #[test]
    fn bold_runs_alternate() {
        assert_eq!(
            inline_runs("a **b** c"),
            vec![
                ("a ".to_string(), false),
                ("b".to_string(), true),
                (" c".to_string(), false)
            ]
        );
        assert_eq!(inline_runs("**all**"), vec![("all".to_string(), true)]);
    }

    #[test]
    fn markdown_report_has_title_and_body() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/out/report.md");
        let outcome =
            generate_report(&analysis("## Findings\nNone."), &path, ReportFormat::Markdown, "Lease Review")
                .unwrap();

        assert_eq!(outcome.output_path, path);
        assert_eq!(outcome.format, ReportFormat::Markdown);
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("# Lease Review\n\n*Generated: "));
        assert!(text.contains("\n---\n\n## Findings\nNone.\n"));
        assert!(text.ends_with('\n'));
    }

    #[test]
    fn docx_report_is_a_zip_package() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.docx");
        generate_report(&analysis(BODY), &path, ReportFormat::Docx, DEFAULT_TITLE).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert!(bytes.starts_with(b"PK"));
        // Only the report itself is left in the directory.
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn format_serialises_lowercase() {
        assert_eq!(serde_json::to_value(ReportFormat::Docx).unwrap(), "docx");
        assert_eq!(ReportFormat::Markdown.to_string(), "markdown");
        assert_eq!(ReportFormat::Docx.extension(), "docx");
    }
}
