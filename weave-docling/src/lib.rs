//! Docling provider
//!
//! Document parsing and text chunking for RAG pipelines. The parser resource
//! declares capabilities; the `parse_document` and `chunk_text` operations do
//! the actual work on text-based formats.

pub mod chunker;
pub mod resources;

pub use chunker::{chunk_text, Chunk, ChunkInput, ChunkMetadata, ChunkOutput, ChunkStrategy};
pub use resources::parser::{
    parse_document, DocumentMetadata, ParseInput, ParseOutput, Parser, ParserConfig,
    ParserOutputs,
};
