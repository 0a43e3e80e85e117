//! `tree-sitter-md` backend adapter.
//!
//! Mirrors the way `editing::Document::from_bytes` in the engine crate
//! configures its tree-sitter parser. Rather than querying the grammar's
//! internal field names for heading level, fence info, and list markers
//! (which vary across grammar revisions), this adapter derives them from
//! the node's own source text — the same text a caller would see either
//! way, and robust to grammar internals this crate doesn't pin an exact
//! version of.

use tree_sitter::{Node, Parser};

use super::{Backend, BackendId, ListType, NodeRef};
use crate::error::BackendError;

pub struct TreeSitterBackend;

impl Backend for TreeSitterBackend {
    fn id(&self) -> BackendId {
        BackendId::TreeSitter
    }

    fn parse(&self, source: &str) -> Result<Vec<NodeRef>, BackendError> {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_md::LANGUAGE.into())
            .map_err(|e| BackendError::Parse(e.to_string()))?;

        let tree = parser
            .parse(source, None)
            .ok_or_else(|| BackendError::Parse("tree-sitter-md returned no tree".to_string()))?;

        let root = tree.root_node();
        let bytes = source.as_bytes();
        let mut cursor = root.walk();
        let nodes = root
            .named_children(&mut cursor)
            .map(|child| convert(child, source, bytes))
            .collect();
        Ok(nodes)
    }
}

fn convert(node: Node, source: &str, bytes: &[u8]) -> NodeRef {
    let start_line = node.start_position().row + 1;
    let end_line = node.end_position().row + 1;
    // tree-sitter reports the end row of a node whose last line is blank as
    // one past the content; clamp so a single-line node never reports
    // end < start.
    let end_line = end_line.max(start_line);
    let text = node.utf8_text(bytes).unwrap_or("").to_string();
    let raw_type = node.kind().to_string();

    let header_level = if raw_type.contains("heading") {
        Some(text.chars().take_while(|&c| c == '#').count().clamp(1, 6) as u8)
    } else {
        None
    };

    let fence_info = if raw_type.contains("fenced_code") {
        Some(extract_fence_info(&text))
    } else {
        None
    };

    let list_type = if raw_type == "list" {
        Some(detect_list_type(&text))
    } else {
        None
    };

    let mut cursor = node.walk();
    let children: Vec<NodeRef> = node
        .named_children(&mut cursor)
        .map(|child| convert(child, source, bytes))
        .collect();

    NodeRef {
        raw_type,
        start_line,
        end_line,
        start_column: node.start_position().column,
        end_column: node.end_position().column,
        header_level,
        fence_info,
        string_content: Some(text),
        list_type,
        label: None,
        children,
    }
}

fn extract_fence_info(text: &str) -> String {
    let first_line = text.lines().next().unwrap_or("");
    first_line
        .trim_start_matches(['`', '~'])
        .trim()
        .to_string()
}

fn detect_list_type(text: &str) -> ListType {
    let first_non_blank = text.lines().find(|l| !l.trim().is_empty()).unwrap_or("");
    let marker = first_non_blank.trim_start();
    if marker
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_digit())
    {
        ListType::Ordered
    } else {
        ListType::Unordered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_heading_level_from_text() {
        let b = TreeSitterBackend;
        let nodes = b.parse("### Three\n\nbody\n").unwrap();
        assert!(!nodes.is_empty());
        let heading = nodes.iter().find(|n| n.raw_type.contains("heading"));
        assert!(heading.is_some());
        assert_eq!(heading.unwrap().header_level, Some(3));
    }

    #[test]
    fn parses_unordered_list() {
        let b = TreeSitterBackend;
        let nodes = b.parse("- one\n- two\n").unwrap();
        let list = nodes.iter().find(|n| n.raw_type == "list");
        assert!(list.is_some());
        assert_eq!(list.unwrap().list_type, Some(ListType::Unordered));
    }
}
