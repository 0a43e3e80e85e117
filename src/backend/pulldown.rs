//! `pulldown-cmark` backend adapter.
//!
//! pulldown-cmark hands back a flat event stream with byte ranges rather
//! than a tree, so this adapter reconstructs a [`NodeRef`] tree by tracking
//! a stack of currently-open frames: a `Start` event pushes a frame, the
//! matching `End` event pops it. Only block-level tags (heading, paragraph,
//! code block, list/item, block quote, table and its parts, footnote
//! definition) produce a [`NodeRef`]; inline tags (emphasis, links, etc.)
//! push a transparent marker frame so `Start`/`End` stay balanced, but their
//! text bubbles straight through to the nearest enclosing block frame
//! rather than becoming a child node — paragraphs don't need an inline
//! tree here, only their flattened text.
//!
//! Every open block frame accumulates the text of its *entire* eventual
//! subtree (not just its direct content), matching the tree-sitter
//! backend's "string_content is this node's raw source text" semantics
//! closely enough for signature hashing to behave the same across both
//! backends.

use pulldown_cmark::{CodeBlockKind, Event, HeadingLevel, Options, Parser, Tag};

use super::{Backend, BackendId, ListType, NodeRef};
use crate::error::BackendError;
use crate::lineindex::LineIndex;

pub struct PulldownBackend;

enum FrameKind {
    Block {
        raw_type: &'static str,
        header_level: Option<u8>,
        fence_info: Option<String>,
        list_type: Option<ListType>,
        label: Option<String>,
        children: Vec<NodeRef>,
    },
    Inline,
}

struct OpenFrame {
    start_byte: usize,
    text: String,
    kind: FrameKind,
}

impl Backend for PulldownBackend {
    fn id(&self) -> BackendId {
        BackendId::Pulldown
    }

    fn parse(&self, source: &str) -> Result<Vec<NodeRef>, BackendError> {
        let opts = Options::ENABLE_TABLES
            | Options::ENABLE_FOOTNOTES
            | Options::ENABLE_STRIKETHROUGH
            | Options::ENABLE_TASKLISTS;
        let lines = LineIndex::new(source);
        let parser = Parser::new_ext(source, opts).into_offset_iter();

        let mut stack: Vec<OpenFrame> = Vec::new();
        let mut top: Vec<NodeRef> = Vec::new();

        for (event, range) in parser {
            match event {
                Event::Start(tag) => {
                    let kind = classify_start(&tag);
                    stack.push(OpenFrame {
                        start_byte: range.start,
                        text: String::new(),
                        kind,
                    });
                }
                Event::End(_tag_end) => {
                    if let Some(frame) = stack.pop() {
                        if let FrameKind::Block {
                            raw_type,
                            header_level,
                            fence_info,
                            list_type,
                            label,
                            children,
                        } = frame.kind
                        {
                            let end_byte = range.end.max(frame.start_byte);
                            let start_line = lines.line_of_byte(frame.start_byte);
                            let end_line = lines.line_of_byte(end_byte.saturating_sub(1).max(frame.start_byte));
                            let node = NodeRef {
                                raw_type: raw_type.to_string(),
                                start_line,
                                end_line: end_line.max(start_line),
                                start_column: 0,
                                end_column: 0,
                                header_level,
                                fence_info,
                                string_content: Some(frame.text),
                                list_type,
                                label,
                                children,
                            };
                            attach(&mut stack, &mut top, node);
                        }
                        // Inline frames contribute no node of their own;
                        // their text was already bubbled to ancestors.
                    }
                }
                Event::Text(t) | Event::Code(t) => push_text(&mut stack, &t),
                Event::Html(t) | Event::InlineHtml(t) => {
                    if stack.is_empty() {
                        // Top-level raw HTML block: pulldown reports this
                        // as a standalone Html event, not a Start/End pair.
                        let start_line = lines.line_of_byte(range.start);
                        let end_line =
                            lines.line_of_byte(range.end.saturating_sub(1).max(range.start));
                        top.push(NodeRef {
                            raw_type: "html_block".to_string(),
                            start_line,
                            end_line: end_line.max(start_line),
                            start_column: 0,
                            end_column: 0,
                            header_level: None,
                            fence_info: None,
                            string_content: Some(t.to_string()),
                            list_type: None,
                            label: None,
                            children: Vec::new(),
                        });
                    } else {
                        push_text(&mut stack, &t);
                    }
                }
                Event::Rule => {
                    let start_line = lines.line_of_byte(range.start);
                    let node = NodeRef {
                        raw_type: "thematic_break".to_string(),
                        start_line,
                        end_line: start_line,
                        start_column: 0,
                        end_column: 0,
                        header_level: None,
                        fence_info: None,
                        string_content: None,
                        list_type: None,
                        label: None,
                        children: Vec::new(),
                    };
                    attach(&mut stack, &mut top, node);
                }
                _ => {}
            }
        }

        Ok(top)
    }
}

/// Appends text to every currently-open frame, so each block accumulates
/// its full eventual subtree's text regardless of nesting depth.
fn push_text(stack: &mut [OpenFrame], text: &str) {
    for frame in stack.iter_mut() {
        frame.text.push_str(text);
    }
}

/// Attaches a finished node to the nearest enclosing block frame, skipping
/// over any transparent inline frames, or to the top-level forest if none.
fn attach(stack: &mut [OpenFrame], top: &mut Vec<NodeRef>, node: NodeRef) {
    for frame in stack.iter_mut().rev() {
        if let FrameKind::Block { children, .. } = &mut frame.kind {
            children.push(node);
            return;
        }
    }
    top.push(node);
}

fn classify_start(tag: &Tag) -> FrameKind {
    let block = |raw_type, header_level, fence_info, list_type, label| FrameKind::Block {
        raw_type,
        header_level,
        fence_info,
        list_type,
        label,
        children: Vec::new(),
    };
    match tag {
        Tag::Heading { level, .. } => block(
            "heading",
            Some(heading_level_num(*level)),
            None,
            None,
            None,
        ),
        Tag::Paragraph => block("paragraph", None, None, None, None),
        Tag::CodeBlock(kind) => {
            let info = match kind {
                CodeBlockKind::Fenced(info) if !info.is_empty() => Some(info.to_string()),
                CodeBlockKind::Fenced(_) => Some(String::new()),
                CodeBlockKind::Indented => None,
            };
            block("code_block", None, info, None, None)
        }
        Tag::List(start) => {
            let lt = if start.is_some() {
                ListType::Ordered
            } else {
                ListType::Unordered
            };
            block("list", None, None, Some(lt), None)
        }
        Tag::Item => block("list_item", None, None, None, None),
        Tag::BlockQuote(_) => block("block_quote", None, None, None, None),
        Tag::HtmlBlock => block("html_block", None, None, None, None),
        Tag::Table(_) => block("table", None, None, None, None),
        Tag::TableHead => block("table_head", None, None, None, None),
        Tag::TableRow => block("table_row", None, None, None, None),
        Tag::TableCell => block("table_cell", None, None, None, None),
        Tag::FootnoteDefinition(label) => {
            block("footnote_definition", None, None, None, Some(label.to_string()))
        }
        _ => FrameKind::Inline,
    }
}

fn heading_level_num(level: HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_heading_and_paragraph() {
        let b = PulldownBackend;
        let nodes = b.parse("# Title\n\nBody text.\n").unwrap();
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].raw_type, "heading");
        assert_eq!(nodes[0].header_level, Some(1));
        assert_eq!(nodes[0].start_line, 1);
        assert_eq!(nodes[1].raw_type, "paragraph");
        assert_eq!(nodes[1].start_line, 3);
    }

    #[test]
    fn paragraph_with_emphasis_has_flat_text_and_no_inline_children() {
        let b = PulldownBackend;
        let nodes = b.parse("Hello **bold** world.\n").unwrap();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].string_content.as_deref(), Some("Hello bold world."));
        assert!(nodes[0].children.is_empty());
    }

    #[test]
    fn blockquote_aggregates_nested_paragraph_text() {
        let b = PulldownBackend;
        let nodes = b.parse("> quoted text\n").unwrap();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].raw_type, "block_quote");
        assert_eq!(nodes[0].string_content.as_deref(), Some("quoted text"));
        assert_eq!(nodes[0].children.len(), 1);
    }

    #[test]
    fn parses_fenced_code_block() {
        let b = PulldownBackend;
        let nodes = b.parse("```rust\nfn main() {}\n```\n").unwrap();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].raw_type, "code_block");
        assert_eq!(nodes[0].fence_info.as_deref(), Some("rust"));
        assert!(nodes[0]
            .string_content
            .as_deref()
            .unwrap()
            .contains("fn main"));
    }

    #[test]
    fn parses_table_with_child_rows() {
        let b = PulldownBackend;
        let nodes = b.parse("| a | b |\n| - | - |\n| 1 | 2 |\n").unwrap();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].raw_type, "table");
        // head + one body row
        assert_eq!(nodes[0].children.len(), 2);
    }
}
