use docrag_core::chunker::{chunk, INTRODUCTION};
use proptest::prelude::*;

const LINDA: &str = "# Linda\n## Skills\nReact, Node.js\n## Availability\nOpen for freelance work";

#[test]
fn splits_on_second_level_headers() {
    let chunks = chunk(LINDA, "doc1");
    assert_eq!(chunks.len(), 2, "title-only preamble does not become a chunk");
    for c in &chunks {
        assert!(c.content.starts_with("[From: doc1]\n# Linda\n\n"), "got {:?}", c.content);
        assert_eq!(c.metadata.get("source_id").map(String::as_str), Some("doc1"));
    }
    assert_eq!(chunks[0].section_title(), Some("Skills"));
    assert_eq!(chunks[0].content, "[From: doc1]\n# Linda\n\n## Skills\nReact, Node.js");
    assert_eq!(chunks[1].section_title(), Some("Availability"));
    assert!(chunks[1].content.ends_with("## Availability\nOpen for freelance work"));
}

#[test]
fn preamble_before_first_section_is_introduction() {
    let doc = "# Guide\nSome intro text.\n\n## Setup\nrun it";
    let chunks = chunk(doc, "guide.md");
    assert_eq!(chunks.len(), 2);
    assert_eq!(chunks[0].section_title(), Some(INTRODUCTION));
    assert_eq!(chunks[0].content, "[From: guide.md]\n# Guide\n\nSome intro text.");
    assert_eq!(chunks[1].section_title(), Some("Setup"));
}

#[test]
fn missing_title_falls_back_to_source_id() {
    let chunks = chunk("## Only\nbody", "notes/a.txt");
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].content, "[From: notes/a.txt]\n# notes/a.txt\n\n## Only\nbody");
}

#[test]
fn headerless_document_is_one_chunk() {
    let doc = "plain text\nacross two lines";
    let chunks = chunk(doc, "p");
    assert_eq!(chunks.len(), 1);
    assert!(chunks[0].content.contains(doc));
    assert_eq!(chunks[0].section_title(), Some(INTRODUCTION));
}

#[test]
fn third_level_headers_stay_inside_their_section() {
    let doc = "# T\n## A\n### a1\nx\n### a2\ny\n## B\nz";
    let chunks = chunk(doc, "s");
    assert_eq!(chunks.len(), 2);
    assert!(chunks[0].content.contains("### a1") && chunks[0].content.contains("### a2"));
}

#[test]
fn blank_input_yields_single_fallback_chunk() {
    for input in ["", "   \n\t  "] {
        let chunks = chunk(input, "empty");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, input);
    }
}

#[test]
fn title_only_document_falls_back_to_original_content() {
    let chunks = chunk("# Lonely title\n", "t");
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].content, "# Lonely title\n");
}

#[test]
fn crlf_line_endings_are_handled() {
    let chunks = chunk("# Win\r\n## One\r\nbody\r\n## Two\r\nmore", "w");
    assert_eq!(chunks.len(), 2);
    assert_eq!(chunks[0].section_title(), Some("One"));
    assert!(!chunks[0].content.contains('\r'));
}

fn section_strategy() -> impl Strategy<Value = (String, String)> {
    ("[A-Za-z][A-Za-z ]{0,12}[A-Za-z]", "[a-z][a-z ,.]{0,40}")
}

proptest! {
    #[test]
    fn one_chunk_per_section_plus_preamble(
        title in "[A-Za-z][A-Za-z ]{0,15}[A-Za-z]",
        preamble in proptest::option::of("[a-z][a-z ]{0,30}"),
        sections in proptest::collection::vec(section_strategy(), 1..6),
    ) {
        let mut doc = format!("# {title}\n");
        if let Some(p) = &preamble {
            doc.push_str(p);
            doc.push('\n');
        }
        for (heading, body) in &sections {
            doc.push_str(&format!("## {heading}\n{body}\n"));
        }

        let chunks = chunk(&doc, "prop");
        let expected = sections.len() + usize::from(preamble.is_some());
        prop_assert_eq!(chunks.len(), expected);
        let title_line = format!("# {title}");
        for c in &chunks {
            prop_assert!(c.content.contains(&title_line));
        }
    }

    #[test]
    fn headerless_text_is_kept_whole(body in "[a-z][a-z \n]{0,80}[a-z]") {
        let chunks = chunk(&body, "flat");
        prop_assert_eq!(chunks.len(), 1);
        prop_assert!(chunks[0].content.contains(body.trim()));
    }
}
