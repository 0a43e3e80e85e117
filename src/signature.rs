//! Signature computation (§3): deterministic equality keys. Same-signature
//! implies candidate match; signatures never drive ordering, only equality
//! and hashing.

use sha2::{Digest, Sha256};

use crate::statement::{CanonicalType, Statement};

/// One field of a signature tuple.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SigPart {
    Str(String),
    UInt(u64),
    Type(CanonicalType),
    /// An explicit "no value" field, e.g. a code block with no fence info.
    None,
}

/// A deterministic equality key. Two statements are candidate matches iff
/// their signatures are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Signature(pub Vec<SigPart>);

impl Signature {
    fn of(parts: Vec<SigPart>) -> Self {
        Signature(parts)
    }
}

/// What a user-supplied signature function returns for a given statement.
pub enum SignatureOverride {
    /// Use the crate's built-in signature for this statement.
    UseDefault,
    /// This statement participates in no match (it is never looked up in,
    /// nor indexes, the other side); always surfaces as `template_only` or
    /// `dest_only`.
    None,
    /// Use this signature instead of the default.
    Custom(Signature),
}

pub type SignatureFn = std::sync::Arc<dyn Fn(&Statement) -> SignatureOverride + Send + Sync>;

fn sha256_prefix(input: &str, hex_chars: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    let digest = hasher.finalize();
    let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
    hex.chars().take(hex_chars).collect()
}

/// Concatenates a node's own text with all descendants', giving a stable
/// textual representation regardless of how deeply text-bearing leaves are
/// nested (see the backend adapters' doc comments for why this is already
/// mostly flat by construction).
fn full_text(node: &crate::backend::NodeRef) -> String {
    let mut out = node.string_content.clone().unwrap_or_default();
    for child in &node.children {
        if node.string_content.as_deref().unwrap_or("").is_empty() {
            out.push_str(&full_text(child));
        }
    }
    out
}

fn header_row_text(node: &crate::backend::NodeRef) -> String {
    node.children
        .first()
        .and_then(|head| head.string_content.clone())
        .unwrap_or_default()
}

/// Computes the default signature for a statement per the table in §3.
pub fn default_signature(stmt: &Statement) -> Signature {
    match stmt {
        Statement::Parser(p) => parser_block_signature(p),
        Statement::LinkDefinition(l) => Signature::of(vec![
            SigPart::Str("link_definition".into()),
            SigPart::Str(l.label.to_lowercase()),
        ]),
        Statement::Freeze(f) => Signature::of(vec![
            SigPart::Str("freeze_block".into()),
            SigPart::Str(f.reason.clone().unwrap_or_default()),
            SigPart::Str(sha256_prefix(&f.content, 16)),
        ]),
        Statement::Gap(g) => match &g.preceding_type {
            Some(ty) => Signature::of(vec![
                SigPart::Str("gap_line_after".into()),
                SigPart::Type(ty.clone()),
                SigPart::UInt(g.preceding_offset as u64),
                SigPart::Str(g.content.clone()),
            ]),
            None => Signature::of(vec![
                SigPart::Str("gap_line".into()),
                SigPart::UInt(g.line_number as u64),
                SigPart::Str(g.content.clone()),
            ]),
        },
    }
}

fn parser_block_signature(p: &crate::statement::ParserBlockStmt) -> Signature {
    let node = &p.node;
    match p.merge_type {
        CanonicalType::Heading => Signature::of(vec![
            SigPart::Str("heading".into()),
            SigPart::UInt(node.header_level.unwrap_or(0) as u64),
            SigPart::Str(heading_text(node)),
        ]),
        CanonicalType::Paragraph => Signature::of(vec![
            SigPart::Str("paragraph".into()),
            SigPart::Str(sha256_prefix(&full_text(node), 32)),
        ]),
        CanonicalType::CodeBlock => Signature::of(vec![
            SigPart::Str("code_block".into()),
            node.fence_info
                .clone()
                .map(SigPart::Str)
                .unwrap_or(SigPart::None),
            SigPart::Str(sha256_prefix(&code_content(node), 16)),
        ]),
        CanonicalType::List => Signature::of(vec![
            SigPart::Str("list".into()),
            match node.list_type {
                Some(crate::backend::ListType::Ordered) => SigPart::Str("ordered".into()),
                Some(crate::backend::ListType::Unordered) => SigPart::Str("unordered".into()),
                None => SigPart::None,
            },
            SigPart::UInt(node.child_count() as u64),
        ]),
        CanonicalType::BlockQuote => Signature::of(vec![
            SigPart::Str("block_quote".into()),
            SigPart::Str(sha256_prefix(&full_text(node), 16)),
        ]),
        CanonicalType::ThematicBreak => Signature::of(vec![SigPart::Str("thematic_break".into())]),
        CanonicalType::HtmlBlock => Signature::of(vec![
            SigPart::Str("html_block".into()),
            SigPart::Str(sha256_prefix(&full_text(node), 16)),
        ]),
        CanonicalType::Table => Signature::of(vec![
            SigPart::Str("table".into()),
            SigPart::UInt(node.child_count() as u64),
            SigPart::Str(sha256_prefix(&header_row_text(node), 16)),
        ]),
        CanonicalType::FootnoteDefinition => Signature::of(vec![
            SigPart::Str("footnote_definition".into()),
            SigPart::Str(node.label.clone().unwrap_or_default()),
        ]),
        CanonicalType::LinkDefinition => Signature::of(vec![
            SigPart::Str("link_definition".into()),
            SigPart::Str(
                crate::linkparse::parse_definition_line(full_text(node).trim())
                    .map(|d| d.label.to_lowercase())
                    .unwrap_or_default(),
            ),
        ]),
        CanonicalType::CustomBlock | CanonicalType::Unknown(_) => Signature::of(vec![
            SigPart::Str("unknown".into()),
            SigPart::Str(p.merge_type.as_str().to_string()),
            SigPart::UInt(node.start_line as u64),
        ]),
        CanonicalType::GapLine | CanonicalType::FreezeBlock => {
            // Parser backends never report these canonical types directly;
            // analysis only constructs them from gap-line recovery / freeze
            // marker scanning. Fall through to the unknown shape so the
            // match stays exhaustive without implying support that doesn't
            // exist.
            Signature::of(vec![
                SigPart::Str("unknown".into()),
                SigPart::Str(p.merge_type.as_str().to_string()),
                SigPart::UInt(node.start_line as u64),
            ])
        }
    }
}

/// Visible heading text: pulldown's flattened inline text already excludes
/// `#` markers; for tree-sitter's raw text (which includes them), strip the
/// leading ATX run or trailing setext underline.
fn heading_text(node: &crate::backend::NodeRef) -> String {
    let raw = node.string_content.clone().unwrap_or_default();
    let trimmed = raw.trim();
    if let Some(stripped) = trimmed.strip_prefix('#') {
        stripped.trim_start_matches('#').trim().to_string()
    } else {
        // setext heading: first line is the text, second is the underline.
        trimmed.lines().next().unwrap_or("").trim().to_string()
    }
}

/// The code content without fence delimiter lines, when the raw text
/// includes them (tree-sitter); pulldown's text is already fence-free.
fn code_content(node: &crate::backend::NodeRef) -> String {
    let raw = node.string_content.clone().unwrap_or_default();
    let first_line = raw.lines().next().unwrap_or("");
    let looks_fenced = first_line.trim_start().starts_with("```")
        || first_line.trim_start().starts_with("~~~");
    if !looks_fenced {
        return raw;
    }
    let mut lines: Vec<&str> = raw.lines().collect();
    if !lines.is_empty() {
        lines.remove(0);
    }
    if lines
        .last()
        .is_some_and(|l| l.trim_start().starts_with("```") || l.trim_start().starts_with("~~~"))
    {
        lines.pop();
    }
    lines.join("\n")
}
