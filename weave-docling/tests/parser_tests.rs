//! Contract tests for the parser resource and parse/chunk operations

use weave_docling::{
    chunk_text, parse_document, ChunkInput, ChunkStrategy, ParseInput, Parser, ParserConfig,
};
use weave_resource::{Resource, ResourceError};

fn parse_input(filename: &str, content: &str) -> ParseInput {
    ParseInput {
        content: content.to_string(),
        filename: filename.to_string(),
        content_type: None,
    }
}

#[tokio::test]
async fn create_reports_ready_with_supported_formats() {
    let parser = Parser::new("docs-parser", ParserConfig::default());
    let outputs = parser.on_create().await.unwrap();

    assert!(outputs.ready);
    assert!(outputs.supported_formats.contains(&"md".to_string()));
}

#[tokio::test]
async fn delete_is_a_no_op() {
    let parser = Parser::new("docs-parser", ParserConfig::default());
    parser.on_delete().await.unwrap();
}

#[test]
fn parse_markdown_extracts_title_and_section_chunks() {
    let content = "# User Guide\n\nWelcome.\n\n## Install\n\nRun the installer.";
    let output = parse_document(&ParserConfig::default(), &parse_input("guide.md", content)).unwrap();

    assert_eq!(output.metadata.title.as_deref(), Some("User Guide"));
    assert_eq!(output.metadata.format, "md");
    assert_eq!(output.chunks.len(), 2);
    assert_eq!(
        output.chunks[1].metadata.headings,
        Some(vec!["User Guide".to_string(), "Install".to_string()])
    );
}

#[test]
fn parse_html_strips_markup() {
    let content = "<html><head><title>Release Notes</title></head>\
                   <body><p>Fixed a bug.</p><p>Added a feature.</p></body></html>";
    let output =
        parse_document(&ParserConfig::default(), &parse_input("notes.html", content)).unwrap();

    assert_eq!(output.metadata.title.as_deref(), Some("Release Notes"));
    assert!(output.text.contains("Fixed a bug."));
    assert!(!output.text.contains("<p>"));
    assert_eq!(output.chunks.len(), 2);
    assert_eq!(output.chunks[0].text, "Fixed a bug.");
}

#[test]
fn parse_rejects_unknown_extension() {
    let err =
        parse_document(&ParserConfig::default(), &parse_input("image.png", "...")).unwrap_err();

    assert!(matches!(err, ResourceError::Validation(_)));
}

#[test]
fn parse_rejects_format_outside_supported_list() {
    let mut config = ParserConfig::default();
    config.supported_formats = vec!["md".to_string()];

    let err = parse_document(&config, &parse_input("notes.html", "<p>hi</p>")).unwrap_err();

    assert!(matches!(err, ResourceError::Validation(_)));
}

#[test]
fn parse_rejects_binary_formats() {
    let mut config = ParserConfig::default();
    config.supported_formats.push("pdf".to_string());

    let err = parse_document(&config, &parse_input("paper.pdf", "JVBERi0=")).unwrap_err();

    match err {
        ResourceError::Validation(message) => assert!(message.contains("binary")),
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn chunk_text_defaults_to_recursive_strategy() {
    let input: ChunkInput = serde_json::from_str(r#"{"text": "hello world"}"#).unwrap();
    assert_eq!(input.chunk_size, 512);
    assert_eq!(input.chunk_overlap, 50);
    assert_eq!(input.strategy, ChunkStrategy::Recursive);

    let output = chunk_text(&input).unwrap();
    assert_eq!(output.chunks.len(), 1);
    assert_eq!(output.chunks[0].text, "hello world");
}
