//! Text chunking for RAG
//!
//! Three strategies: character-budget chunking with word-boundary overlap
//! (recursive), sentence splitting, and paragraph splitting. Token budgets
//! are approximated at 4 characters per token.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use weave_resource::{ResourceError, ResourceResult};

/// Rough character count per token.
const CHARS_PER_TOKEN: usize = 4;

fn default_chunk_size() -> usize {
    512
}

fn default_chunk_overlap() -> usize {
    50
}

/// Chunking strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkStrategy {
    Recursive,
    Sentence,
    Paragraph,
}

impl Default for ChunkStrategy {
    fn default() -> Self {
        ChunkStrategy::Recursive
    }
}

/// Metadata attached to a chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub index: usize,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<ChunkStrategy>,

    /// Heading trail for section chunks (markdown parsing).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headings: Option<Vec<String>>,
}

/// A text chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    pub metadata: ChunkMetadata,
}

impl Chunk {
    pub(crate) fn new(text: impl Into<String>, index: usize, strategy: ChunkStrategy) -> Self {
        Self {
            text: text.into(),
            metadata: ChunkMetadata {
                index,
                strategy: Some(strategy),
                headings: None,
            },
        }
    }
}

/// Input for the chunk_text operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkInput {
    pub text: String,

    /// Maximum tokens per chunk.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Overlapping tokens between consecutive chunks.
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,

    #[serde(default)]
    pub strategy: ChunkStrategy,
}

/// Output from the chunk_text operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkOutput {
    pub chunks: Vec<Chunk>,
}

/// Chunk plain text into smaller pieces.
pub fn chunk_text(input: &ChunkInput) -> ResourceResult<ChunkOutput> {
    if input.chunk_size == 0 {
        return Err(ResourceError::Validation(
            "chunk_size must be greater than zero".into(),
        ));
    }

    if input.chunk_overlap >= input.chunk_size {
        return Err(ResourceError::Validation(
            "chunk_overlap must be smaller than chunk_size".into(),
        ));
    }

    let chunks = match input.strategy {
        ChunkStrategy::Paragraph => chunk_paragraphs(&input.text),
        ChunkStrategy::Sentence => chunk_sentences(&input.text),
        ChunkStrategy::Recursive => {
            chunk_recursive(&input.text, input.chunk_size, input.chunk_overlap)
        }
    };

    Ok(ChunkOutput { chunks })
}

fn chunk_paragraphs(text: &str) -> Vec<Chunk> {
    text.split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .enumerate()
        .map(|(i, p)| Chunk::new(p, i, ChunkStrategy::Paragraph))
        .collect()
}

fn sentence_boundary() -> &'static Regex {
    static BOUNDARY: OnceLock<Regex> = OnceLock::new();
    BOUNDARY.get_or_init(|| Regex::new(r"[.!?]\s+").expect("sentence boundary regex"))
}

fn chunk_sentences(text: &str) -> Vec<Chunk> {
    let mut sentences = Vec::new();
    let mut start = 0;

    for boundary in sentence_boundary().find_iter(text) {
        // Keep the terminal punctuation with the sentence, drop the gap.
        let end = boundary.start() + 1;
        let sentence = text[start..end].trim();
        if !sentence.is_empty() {
            sentences.push(sentence);
        }
        start = boundary.end();
    }

    let last = text[start..].trim();
    if !last.is_empty() {
        sentences.push(last);
    }

    sentences
        .into_iter()
        .enumerate()
        .map(|(i, s)| Chunk::new(s, i, ChunkStrategy::Sentence))
        .collect()
}

fn chunk_recursive(text: &str, chunk_size: usize, chunk_overlap: usize) -> Vec<Chunk> {
    let char_limit = chunk_size * CHARS_PER_TOKEN;
    let overlap_chars = chunk_overlap * CHARS_PER_TOKEN;

    let mut chunks: Vec<Chunk> = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut current_len = 0;

    for word in text.split_whitespace() {
        let word_len = word.len() + 1;

        if current_len + word_len > char_limit && !current.is_empty() {
            chunks.push(Chunk::new(
                current.join(" "),
                chunks.len(),
                ChunkStrategy::Recursive,
            ));

            // Carry trailing words into the next chunk as overlap.
            let mut overlap: Vec<&str> = Vec::new();
            let mut overlap_len = 0;
            for carried in current.iter().rev() {
                if overlap_len + carried.len() + 1 > overlap_chars {
                    break;
                }
                overlap.insert(0, carried);
                overlap_len += carried.len() + 1;
            }

            current = overlap;
            current_len = overlap_len;
        }

        current.push(word);
        current_len += word_len;
    }

    if !current.is_empty() {
        chunks.push(Chunk::new(
            current.join(" "),
            chunks.len(),
            ChunkStrategy::Recursive,
        ));
    }

    chunks
}
