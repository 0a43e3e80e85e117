//! Node normalizer (§4.3): maps backend-specific type names onto the
//! canonical set, and wraps a backend node with its canonical merge-type.

use std::collections::HashMap;
use std::sync::Arc;

use crate::backend::{BackendId, NodeRef};
use crate::statement::{CanonicalType, ParserBlockStmt, UnknownTypeName};

/// `backend_id -> (backend_type -> canonical_type)`.
///
/// Holds the two default mappings required by the spec (pulldown-cmark,
/// tree-sitter-md); a caller could in principle register a third backend at
/// startup (before any analysis runs — registration is not thread-safe,
/// per §5), but this crate ships only the two.
pub struct Normalizer {
    registry: HashMap<BackendId, HashMap<&'static str, CanonicalType>>,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Normalizer {
    pub fn new() -> Self {
        let mut registry = HashMap::new();
        registry.insert(BackendId::Pulldown, pulldown_mapping());
        registry.insert(BackendId::TreeSitter, treesitter_mapping());
        Normalizer { registry }
    }

    /// Returns the mapped canonical type, or `Unknown(raw_type)` unchanged
    /// when no mapping exists. Never fails.
    pub fn canonical_type(&self, raw_type: &str, backend: BackendId) -> CanonicalType {
        self.registry
            .get(&backend)
            .and_then(|m| m.get(raw_type))
            .cloned()
            .unwrap_or_else(|| CanonicalType::Unknown(UnknownTypeName(Arc::from(raw_type))))
    }

    /// Wraps a backend node with its canonical merge-type. The wrapper is
    /// transparent to the aligner: every accessor it needs lives on
    /// [`NodeRef`] already.
    pub fn wrap(&self, node: NodeRef, backend: BackendId) -> ParserBlockStmt {
        let merge_type = self.canonical_type(&node.raw_type, backend);
        ParserBlockStmt { merge_type, node }
    }
}

fn pulldown_mapping() -> HashMap<&'static str, CanonicalType> {
    use CanonicalType::*;
    HashMap::from([
        ("heading", Heading),
        ("paragraph", Paragraph),
        ("code_block", CodeBlock),
        ("list", List),
        ("block_quote", BlockQuote),
        ("thematic_break", ThematicBreak),
        ("html_block", HtmlBlock),
        ("table", Table),
        ("footnote_definition", FootnoteDefinition),
    ])
}

fn treesitter_mapping() -> HashMap<&'static str, CanonicalType> {
    use CanonicalType::*;
    HashMap::from([
        ("atx_heading", Heading),
        ("setext_heading", Heading),
        ("paragraph", Paragraph),
        ("fenced_code_block", CodeBlock),
        ("indented_code_block", CodeBlock),
        ("list", List),
        ("block_quote", BlockQuote),
        ("thematic_break", ThematicBreak),
        ("html_block", HtmlBlock),
        ("pipe_table", Table),
        ("link_reference_definition", LinkDefinition),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unifies_heading_dialects() {
        let n = Normalizer::new();
        assert_eq!(
            n.canonical_type("heading", BackendId::Pulldown),
            CanonicalType::Heading
        );
        assert_eq!(
            n.canonical_type("atx_heading", BackendId::TreeSitter),
            CanonicalType::Heading
        );
    }

    #[test]
    fn unmapped_type_passes_through_unchanged() {
        let n = Normalizer::new();
        let t = n.canonical_type("table_cell", BackendId::TreeSitter);
        assert_eq!(t.as_str(), "table_cell");
    }
}
