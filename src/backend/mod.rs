//! The parser contract (§6) consumed by the rest of the crate, plus the two
//! concrete adapters that implement it (§4.3.1).
//!
//! Rather than exposing each backend's native tree (tied to that backend's
//! own lifetimes — `tree_sitter::Tree`'s cursor, pulldown's event stream),
//! every backend eagerly converts its parse into an owned [`NodeRef`] tree.
//! This is the same shape of seam the engine crate draws between
//! `tree_sitter::Tree` and its own owned `BlockNode`/`ContainerFrame` types:
//! callers never touch the underlying parser's types directly.

pub mod pulldown;
pub mod treesitter;

use crate::error::BackendError;

/// A list's marker style, mirrored from CommonMark's own distinction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListType {
    Ordered,
    Unordered,
}

/// An owned, backend-agnostic block node.
///
/// `raw_type` is the backend's own type name (e.g. `"heading"` vs
/// `"header"`); [`crate::normalize`] maps it to a [`crate::statement::CanonicalType`].
#[derive(Debug, Clone)]
pub struct NodeRef {
    pub raw_type: String,
    pub start_line: usize,
    pub end_line: usize,
    pub start_column: usize,
    pub end_column: usize,
    pub header_level: Option<u8>,
    pub fence_info: Option<String>,
    pub string_content: Option<String>,
    pub list_type: Option<ListType>,
    /// Set for footnote definitions (`[^label]: ...`); `None` otherwise.
    /// Link definitions derive their label by reparsing `string_content`
    /// with the same grammar used to recover them from gap lines (§4.4),
    /// so they don't need a separate field here.
    pub label: Option<String>,
    pub children: Vec<NodeRef>,
}

impl NodeRef {
    pub fn child_count(&self) -> usize {
        self.children.len()
    }
}

/// Which concrete parser produced a [`NodeRef`] tree; the normalizer keys
/// its type-mapping registry on this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendId {
    Pulldown,
    TreeSitter,
}

/// The parser contract: parse a whole source document into a forest of
/// top-level block nodes.
pub trait Backend {
    fn id(&self) -> BackendId;
    fn parse(&self, source: &str) -> Result<Vec<NodeRef>, BackendError>;
}

/// Selects which backend(s) to use. `Auto` tries tree-sitter-md first (its
/// grammar is error-tolerant and accepts a strict superset of inputs) and
/// falls back to pulldown-cmark on failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendKind {
    #[default]
    Auto,
    Pulldown,
    TreeSitter,
}

impl BackendKind {
    pub fn parse(&self, source: &str) -> Result<(Vec<NodeRef>, BackendId), BackendError> {
        match self {
            BackendKind::Pulldown => {
                let b = pulldown::PulldownBackend;
                b.parse(source).map(|n| (n, b.id()))
            }
            BackendKind::TreeSitter => {
                let b = treesitter::TreeSitterBackend;
                b.parse(source).map(|n| (n, b.id()))
            }
            BackendKind::Auto => {
                let ts = treesitter::TreeSitterBackend;
                match ts.parse(source) {
                    Ok(nodes) => Ok((nodes, ts.id())),
                    Err(_) => {
                        let pd = pulldown::PulldownBackend;
                        pd.parse(source).map(|n| (n, pd.id()))
                    }
                }
            }
        }
    }
}
