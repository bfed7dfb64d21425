//! Document parser resource
//!
//! Parses text-based formats (markdown, HTML, plain text, CSV) into extracted
//! text plus section chunks. Binary formats (PDF, DOCX, ...) are recognized
//! but rejected: they need the hosted conversion pipeline, which is outside
//! this provider.

use std::path::Path;
use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use weave_resource::{Resource, ResourceError, ResourceResult};

use crate::chunker::{Chunk, ChunkMetadata};

/// Recognized document formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Markdown,
    Html,
    Text,
    Csv,
    Pdf,
    Docx,
    Pptx,
    Xlsx,
}

impl DocumentFormat {
    fn from_extension(extension: &str) -> Option<Self> {
        match extension {
            "md" | "markdown" => Some(DocumentFormat::Markdown),
            "html" | "htm" => Some(DocumentFormat::Html),
            "txt" => Some(DocumentFormat::Text),
            "csv" => Some(DocumentFormat::Csv),
            "pdf" => Some(DocumentFormat::Pdf),
            "docx" => Some(DocumentFormat::Docx),
            "pptx" => Some(DocumentFormat::Pptx),
            "xlsx" => Some(DocumentFormat::Xlsx),
            _ => None,
        }
    }

    fn is_binary(&self) -> bool {
        matches!(
            self,
            DocumentFormat::Pdf | DocumentFormat::Docx | DocumentFormat::Pptx | DocumentFormat::Xlsx
        )
    }
}

fn extension_of(filename: &str) -> String {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_lowercase()
}

fn default_supported_formats() -> Vec<String> {
    ["md", "markdown", "html", "txt", "csv"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_true() -> bool {
    true
}

/// Configuration for the parser resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParserConfig {
    /// Enable OCR for scanned documents (reserved for the hosted pipeline).
    #[serde(default = "default_true")]
    pub ocr_enabled: bool,

    /// Enable table structure extraction (reserved for the hosted pipeline).
    #[serde(default = "default_true")]
    pub table_extraction: bool,

    /// Formats this parser accepts, by extension.
    #[serde(default = "default_supported_formats")]
    pub supported_formats: Vec<String>,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            ocr_enabled: true,
            table_extraction: true,
            supported_formats: default_supported_formats(),
        }
    }
}

/// Outputs from the parser resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParserOutputs {
    pub ready: bool,
    pub supported_formats: Vec<String>,
}

/// Metadata extracted from a parsed document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub title: Option<String>,
    pub page_count: Option<usize>,
    pub format: String,
}

/// Input for the parse_document operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParseInput {
    /// Document content; text formats only.
    pub content: String,

    /// Original filename with extension, used for format detection.
    pub filename: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
}

/// Output from the parse_document operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParseOutput {
    /// Full extracted text.
    pub text: String,
    pub metadata: DocumentMetadata,
    /// Document split into section chunks for RAG.
    pub chunks: Vec<Chunk>,
}

/// Docling parser resource.
///
/// Stateless capability declaration; the parse and chunk operations carry the
/// actual work.
///
/// Lifecycle:
/// - `on_create`/`on_update`: report readiness and accepted formats
/// - `on_delete`: no-op (stateless)
pub struct Parser {
    name: String,
    config: ParserConfig,
    outputs: Option<ParserOutputs>,
}

impl Parser {
    pub fn new(name: impl Into<String>, config: ParserConfig) -> Self {
        Self {
            name: name.into(),
            config,
            outputs: None,
        }
    }

    pub fn with_outputs(mut self, outputs: ParserOutputs) -> Self {
        self.outputs = Some(outputs);
        self
    }

    /// Parse a document with this resource's configuration.
    pub fn parse(&self, input: &ParseInput) -> ResourceResult<ParseOutput> {
        parse_document(&self.config, input)
    }

    fn build_outputs(&self) -> ParserOutputs {
        ParserOutputs {
            ready: true,
            supported_formats: self.config.supported_formats.clone(),
        }
    }
}

#[async_trait]
impl Resource for Parser {
    type Config = ParserConfig;
    type Outputs = ParserOutputs;

    const PROVIDER: &'static str = "docling";
    const KIND: &'static str = "parser";

    fn name(&self) -> &str {
        &self.name
    }

    fn config(&self) -> &Self::Config {
        &self.config
    }

    fn outputs(&self) -> Option<&Self::Outputs> {
        self.outputs.as_ref()
    }

    async fn on_create(&self) -> ResourceResult<Self::Outputs> {
        Ok(self.build_outputs())
    }

    async fn on_update(&self, _previous_config: &Self::Config) -> ResourceResult<Self::Outputs> {
        Ok(self.build_outputs())
    }

    async fn on_delete(&self) -> ResourceResult<()> {
        Ok(())
    }
}

/// Parse a document into extracted text and section chunks.
pub fn parse_document(config: &ParserConfig, input: &ParseInput) -> ResourceResult<ParseOutput> {
    let extension = extension_of(&input.filename);
    let format = DocumentFormat::from_extension(&extension)
        .ok_or_else(|| ResourceError::Validation(format!("unsupported format: {}", extension)))?;

    let accepted = config
        .supported_formats
        .iter()
        .any(|f| f.to_lowercase() == extension);
    if !accepted {
        return Err(ResourceError::Validation(format!(
            "format '{}' not in supported formats: {:?}",
            extension, config.supported_formats
        )));
    }

    if format.is_binary() {
        return Err(ResourceError::Validation(format!(
            "binary format '{}' requires the hosted conversion pipeline",
            extension
        )));
    }

    let (text, title) = match format {
        DocumentFormat::Html => strip_html(&input.content),
        DocumentFormat::Markdown => {
            let title = first_markdown_heading(&input.content);
            (input.content.clone(), title)
        }
        _ => (input.content.clone(), None),
    };

    let chunks = match format {
        DocumentFormat::Markdown => chunk_markdown_sections(&text),
        _ => paragraphs_as_chunks(&text),
    };

    Ok(ParseOutput {
        text,
        metadata: DocumentMetadata {
            title,
            page_count: None,
            format: extension,
        },
        chunks,
    })
}

fn parse_heading(line: &str) -> Option<(usize, String)> {
    let trimmed = line.trim_start();
    let level = trimmed.chars().take_while(|c| *c == '#').count();

    if level == 0 || level > 6 {
        return None;
    }

    let title = trimmed[level..].trim();
    if title.is_empty() {
        return None;
    }

    Some((level, title.to_string()))
}

fn first_markdown_heading(text: &str) -> Option<String> {
    text.lines().find_map(|line| parse_heading(line).map(|(_, title)| title))
}

/// Split markdown into one chunk per heading section, tagging each chunk with
/// its heading trail.
fn chunk_markdown_sections(text: &str) -> Vec<Chunk> {
    fn flush(chunks: &mut Vec<Chunk>, stack: &[(usize, String)], section: &mut Vec<&str>) {
        let body = section.join("\n").trim().to_string();
        section.clear();

        if body.is_empty() {
            return;
        }

        let headings: Vec<String> = stack.iter().map(|(_, title)| title.clone()).collect();
        chunks.push(Chunk {
            text: body,
            metadata: ChunkMetadata {
                index: chunks.len(),
                strategy: None,
                headings: if headings.is_empty() { None } else { Some(headings) },
            },
        });
    }

    let mut chunks: Vec<Chunk> = Vec::new();
    let mut heading_stack: Vec<(usize, String)> = Vec::new();
    let mut section: Vec<&str> = Vec::new();

    for line in text.lines() {
        if let Some((level, title)) = parse_heading(line) {
            flush(&mut chunks, &heading_stack, &mut section);
            heading_stack.retain(|(l, _)| *l < level);
            heading_stack.push((level, title));
        } else {
            section.push(line);
        }
    }

    flush(&mut chunks, &heading_stack, &mut section);
    chunks
}

fn paragraphs_as_chunks(text: &str) -> Vec<Chunk> {
    text.split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .enumerate()
        .map(|(index, paragraph)| Chunk {
            text: paragraph.to_string(),
            metadata: ChunkMetadata {
                index,
                strategy: None,
                headings: None,
            },
        })
        .collect()
}

fn html_regexes() -> &'static (Regex, Regex, Regex, Regex) {
    static REGEXES: OnceLock<(Regex, Regex, Regex, Regex)> = OnceLock::new();
    REGEXES.get_or_init(|| {
        (
            Regex::new(r"(?is)<(head|script|style)[^>]*>.*?</(head|script|style)>")
                .expect("script regex"),
            Regex::new(r"(?is)<title[^>]*>(.*?)</title>").expect("title regex"),
            Regex::new(r"(?i)</(p|div|h[1-6]|li|tr|table|section|article)>|<br\s*/?>")
                .expect("break regex"),
            Regex::new(r"(?s)<[^>]+>").expect("tag regex"),
        )
    })
}

fn decode_entities(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}

/// Strip tags from HTML, keeping block boundaries as newlines. Returns the
/// text and the `<title>` content when present.
fn strip_html(html: &str) -> (String, Option<String>) {
    let (script_re, title_re, break_re, tag_re) = html_regexes();

    let title = title_re
        .captures(html)
        .map(|c| decode_entities(c[1].trim()));

    let without_scripts = script_re.replace_all(html, "");
    let with_breaks = break_re.replace_all(&without_scripts, "\n\n");
    let without_tags = tag_re.replace_all(&with_breaks, "");
    let decoded = decode_entities(&without_tags);

    let mut lines: Vec<&str> = Vec::new();
    for line in decoded.lines() {
        let line = line.trim();
        if !line.is_empty() {
            lines.push(line);
        }
    }

    (lines.join("\n\n"), title.filter(|t| !t.is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("report.md", Some(DocumentFormat::Markdown))]
    #[test_case("page.HTML", Some(DocumentFormat::Html))]
    #[test_case("notes.txt", Some(DocumentFormat::Text))]
    #[test_case("table.csv", Some(DocumentFormat::Csv))]
    #[test_case("paper.pdf", Some(DocumentFormat::Pdf))]
    #[test_case("archive.tar.gz", None)]
    #[test_case("noextension", None)]
    fn format_detection_from_filename(filename: &str, expected: Option<DocumentFormat>) {
        assert_eq!(
            DocumentFormat::from_extension(&extension_of(filename)),
            expected
        );
    }

    #[test]
    fn markdown_sections_carry_heading_trails() {
        let text = "# Guide\n\nIntro text.\n\n## Setup\n\nInstall things.\n\n### Linux\n\nApt instructions.\n\n## Usage\n\nRun it.";
        let chunks = chunk_markdown_sections(text);

        assert_eq!(chunks.len(), 4);
        assert_eq!(chunks[0].metadata.headings, Some(vec!["Guide".to_string()]));
        assert_eq!(
            chunks[2].metadata.headings,
            Some(vec![
                "Guide".to_string(),
                "Setup".to_string(),
                "Linux".to_string()
            ])
        );
        assert_eq!(
            chunks[3].metadata.headings,
            Some(vec!["Guide".to_string(), "Usage".to_string()])
        );
    }

    #[test]
    fn strip_html_removes_scripts_and_decodes_entities() {
        let html = "<html><head><title>My &amp; Page</title><script>alert(1)</script></head>\
                    <body><h1>Header</h1><p>First &lt;para&gt;.</p><p>Second.</p></body></html>";
        let (text, title) = strip_html(html);

        assert_eq!(title.as_deref(), Some("My & Page"));
        assert!(text.contains("First <para>."));
        assert!(!text.contains("alert"));
    }
}
