//! The statement sequence: the ordered, lossless unit of analysis (§3).

use crate::backend::NodeRef;

/// The closed set of canonical block types used for merge rules,
/// independent of which backend produced the node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
pub enum CanonicalType {
    Heading,
    Paragraph,
    CodeBlock,
    List,
    BlockQuote,
    ThematicBreak,
    HtmlBlock,
    Table,
    FootnoteDefinition,
    CustomBlock,
    LinkDefinition,
    GapLine,
    FreezeBlock,
    /// A backend-reported type with no normalizer mapping; carries the
    /// original backend-specific name for diagnostics and signatures.
    Unknown(UnknownTypeName),
}

/// Wraps the original backend type string for unknown nodes, so
/// `CanonicalType` as a whole stays cheap to hash and compare.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
pub struct UnknownTypeName(pub std::sync::Arc<str>);

impl CanonicalType {
    pub fn as_str(&self) -> &str {
        match self {
            CanonicalType::Heading => "heading",
            CanonicalType::Paragraph => "paragraph",
            CanonicalType::CodeBlock => "code_block",
            CanonicalType::List => "list",
            CanonicalType::BlockQuote => "block_quote",
            CanonicalType::ThematicBreak => "thematic_break",
            CanonicalType::HtmlBlock => "html_block",
            CanonicalType::Table => "table",
            CanonicalType::FootnoteDefinition => "footnote_definition",
            CanonicalType::CustomBlock => "custom_block",
            CanonicalType::LinkDefinition => "link_definition",
            CanonicalType::GapLine => "gap_line",
            CanonicalType::FreezeBlock => "freeze_block",
            CanonicalType::Unknown(name) => &name.0,
        }
    }
}

/// A single recovered reference definition: `[label]: url "title"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkDefinitionStmt {
    pub label: String,
    pub url: String,
    pub title: Option<String>,
    pub line_number: usize,
}

/// A source line not covered by any parser block: blank, or a would-be
/// definition that failed to parse as one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GapLineStmt {
    pub line_number: usize,
    pub content: String,
    /// Canonical type of the nearest prior non-gap statement, set once
    /// during analysis and used for signature computation. `None` if this
    /// gap line precedes every structural statement (document start).
    pub preceding_type: Option<CanonicalType>,
    /// Line distance from the end of that preceding statement to this gap
    /// line (1 for the line immediately after it). Meaningless when
    /// `preceding_type` is `None`.
    pub preceding_offset: usize,
}

/// A region delimited by matched `<!-- TOKEN:freeze -->` /
/// `<!-- TOKEN:unfreeze -->` markers.
#[derive(Debug, Clone)]
pub struct FreezeBlockStmt {
    pub start_line: usize,
    pub end_line: usize,
    pub content: String,
    pub reason: Option<String>,
    /// The statements the freeze block swallowed, in source order, for
    /// downstream analysis of the frozen region's inner structure. Does not
    /// include the marker comments themselves.
    pub inner: Vec<Statement>,
}

/// A backend block node, wrapped with its canonical type.
#[derive(Debug, Clone)]
pub struct ParserBlockStmt {
    pub merge_type: CanonicalType,
    pub node: NodeRef,
}

/// One of the four statement kinds described in §3.
#[derive(Debug, Clone)]
pub enum Statement {
    Parser(ParserBlockStmt),
    Gap(GapLineStmt),
    LinkDefinition(LinkDefinitionStmt),
    Freeze(FreezeBlockStmt),
}

impl Statement {
    pub fn start_line(&self) -> usize {
        match self {
            Statement::Parser(p) => p.node.start_line,
            Statement::Gap(g) => g.line_number,
            Statement::LinkDefinition(l) => l.line_number,
            Statement::Freeze(f) => f.start_line,
        }
    }

    pub fn end_line(&self) -> usize {
        match self {
            Statement::Parser(p) => p.node.end_line,
            Statement::Gap(g) => g.line_number,
            Statement::LinkDefinition(l) => l.line_number,
            Statement::Freeze(f) => f.end_line,
        }
    }

    pub fn merge_type(&self) -> CanonicalType {
        match self {
            Statement::Parser(p) => p.merge_type.clone(),
            Statement::Gap(_) => CanonicalType::GapLine,
            Statement::LinkDefinition(_) => CanonicalType::LinkDefinition,
            Statement::Freeze(_) => CanonicalType::FreezeBlock,
        }
    }

    pub fn is_gap(&self) -> bool {
        matches!(self, Statement::Gap(_))
    }
}
