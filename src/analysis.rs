//! File analysis (§4.4): turns a source string into an ordered, lossless
//! statement sequence plus the machinery (`source_range`, `signature`) the
//! rest of the pipeline needs to read it back out.

use regex::Regex;
use std::collections::HashSet;
use std::sync::Arc;

use crate::backend::BackendKind;
use crate::error::BackendError;
use crate::lineindex::LineIndex;
use crate::linkparse;
use crate::normalize::Normalizer;
use crate::signature::{self, Signature, SignatureFn, SignatureOverride};
use crate::statement::{
    CanonicalType, FreezeBlockStmt, GapLineStmt, LinkDefinitionStmt, ParserBlockStmt, Statement,
};

pub struct FileAnalysis {
    source: String,
    lines: LineIndex,
    statements: Vec<Statement>,
    signature_fn: Option<SignatureFn>,
    /// Freeze/unfreeze markers that never found a matching partner; recorded,
    /// not fatal (§7).
    pub unmatched_freeze_markers: Vec<usize>,
}

struct MarkerHit {
    is_freeze: bool,
    line: usize,
    reason: Option<String>,
}

impl FileAnalysis {
    pub fn new(
        source: &str,
        backend: BackendKind,
        freeze_token: &str,
        signature_fn: Option<SignatureFn>,
    ) -> Result<Self, BackendError> {
        let lines = LineIndex::new(source);
        let (nodes, backend_id) = backend.parse(source)?;
        let normalizer = Normalizer::new();

        let parser_statements: Vec<ParserBlockStmt> = nodes
            .into_iter()
            .map(|n| normalizer.wrap(n, backend_id))
            .collect();

        let mut covered: HashSet<usize> = HashSet::new();
        for p in &parser_statements {
            let (s, e) = clamp_range(p.node.start_line, p.node.end_line);
            for line in s..=e {
                covered.insert(line);
            }
        }

        let n = lines.line_count();
        let mut gap_or_link: Vec<Statement> = Vec::new();
        for line in 1..=n {
            if covered.contains(&line) {
                continue;
            }
            let start = lines.line_start(line);
            let end = lines.line_end(line);
            let content = &source[start..end];
            match linkparse::parse_definition_line(content) {
                Some(def) => gap_or_link.push(Statement::LinkDefinition(LinkDefinitionStmt {
                    label: def.label,
                    url: def.url,
                    title: def.title,
                    line_number: line,
                })),
                None => gap_or_link.push(Statement::Gap(GapLineStmt {
                    line_number: line,
                    content: content.to_string(),
                    preceding_type: None,
                    preceding_offset: 0,
                })),
            }
        }

        let mut merged: Vec<Statement> = parser_statements
            .into_iter()
            .map(Statement::Parser)
            .chain(gap_or_link)
            .collect();
        merged.sort_by_key(|s| s.start_line());

        let (merged, unmatched) = absorb_freeze_blocks(merged, &lines, source, freeze_token);
        let mut merged = merged;
        set_preceding_structural(&mut merged);

        #[cfg(feature = "tracing")]
        {
            tracing::debug!(statements = merged.len(), lines = n, "file analysis built");
            for line in &unmatched {
                tracing::warn!(line = *line, "unmatched freeze marker");
            }
        }

        Ok(FileAnalysis {
            source: source.to_string(),
            lines,
            statements: merged,
            signature_fn,
            unmatched_freeze_markers: unmatched,
        })
    }

    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }

    /// Overrides the canonical type of every parser-block statement whose
    /// backend `raw_type` appears in `overrides`, ahead of alignment. Used by
    /// [`crate::merger::MergeOptions::node_typing`] to let callers widen or
    /// narrow the default normalizer mapping without registering a whole
    /// new backend.
    pub fn apply_node_typing(&mut self, overrides: &std::collections::HashMap<String, CanonicalType>) {
        for stmt in self.statements.iter_mut() {
            if let Statement::Parser(p) = stmt {
                if let Some(ty) = overrides.get(&p.node.raw_type) {
                    p.merge_type = ty.clone();
                }
            }
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn line_index(&self) -> &LineIndex {
        &self.lines
    }

    /// Exact byte slice of 1-based inclusive lines `start..=end`.
    pub fn source_range(&self, start_line: usize, end_line: usize) -> &str {
        self.lines.slice(&self.source, start_line, end_line)
    }

    /// Dispatches to the default per-type signature table (§3), routed
    /// through a user-supplied override when configured.
    ///
    /// Returns `None` when the override is [`SignatureOverride::None`]: such
    /// a statement participates in no match and must never be indexed into,
    /// nor looked up against, the other side. Callers that need a signature
    /// unconditionally (e.g. for diagnostics) should treat `None` as "no
    /// match possible", not as an empty/default signature value.
    pub fn signature_opt(&self, stmt: &Statement) -> Option<Signature> {
        if let Some(f) = &self.signature_fn {
            match f(stmt) {
                SignatureOverride::UseDefault => Some(signature::default_signature(stmt)),
                SignatureOverride::None => None,
                SignatureOverride::Custom(sig) => Some(sig),
            }
        } else {
            Some(signature::default_signature(stmt))
        }
    }

    /// Convenience wrapper over [`Self::signature_opt`] for call sites that
    /// know the statement always participates in matching (e.g. once it's
    /// already been confirmed present on both sides of a match).
    pub fn signature(&self, stmt: &Statement) -> Signature {
        self.signature_opt(stmt)
            .unwrap_or_else(|| signature::default_signature(stmt))
    }
}

fn clamp_range(start: usize, end: usize) -> (usize, usize) {
    if end < start {
        (start, start)
    } else {
        (start, end)
    }
}

fn set_preceding_structural(statements: &mut [Statement]) {
    let mut last_non_gap: Option<(CanonicalType, usize)> = None;
    for i in 0..statements.len() {
        let is_gap = matches!(statements[i], Statement::Gap(_));
        if is_gap {
            let line = statements[i].start_line();
            if let Statement::Gap(g) = &mut statements[i] {
                match &last_non_gap {
                    Some((ty, end_line)) => {
                        g.preceding_type = Some(ty.clone());
                        g.preceding_offset = line.saturating_sub(*end_line);
                    }
                    None => {
                        g.preceding_type = None;
                        g.preceding_offset = 0;
                    }
                }
            }
        } else {
            last_non_gap = Some((statements[i].merge_type(), statements[i].end_line()));
        }
    }
}

fn freeze_regex(freeze_token: &str) -> Regex {
    let pattern = format!(
        r"<!--\s*{}:(freeze|unfreeze)(?:\s+([^-]*?))?\s*-->",
        regex::escape(freeze_token)
    );
    Regex::new(&pattern).expect("freeze marker pattern is always valid")
}

fn find_marker_hits(statements: &[Statement], source: &str, lines: &LineIndex, re: &Regex) -> Vec<(usize, MarkerHit)> {
    let mut hits = Vec::new();
    for (idx, stmt) in statements.iter().enumerate() {
        let is_html = matches!(
            stmt,
            Statement::Parser(p) if p.merge_type == CanonicalType::HtmlBlock
        );
        if !is_html {
            continue;
        }
        let Statement::Parser(p) = stmt else { unreachable!() };
        let text = lines.slice(source, p.node.start_line, p.node.end_line);
        for cap in re.captures_iter(text) {
            let whole = cap.get(0).unwrap();
            let newline_count = text[..whole.start()].matches('\n').count();
            let line = p.node.start_line + newline_count;
            let is_freeze = &cap[1] == "freeze";
            let reason = cap.get(2).map(|m| m.as_str().trim().to_string()).filter(|s| !s.is_empty());
            hits.push((idx, MarkerHit { is_freeze, line, reason }));
        }
    }
    hits
}

/// Matches freeze/unfreeze markers LIFO, synthesizes a [`FreezeBlockStmt`]
/// per matched pair, and drops every statement strictly inside its range.
/// Unmatched freeze markers are reported, not fatal.
fn absorb_freeze_blocks(
    mut statements: Vec<Statement>,
    lines: &LineIndex,
    source: &str,
    freeze_token: &str,
) -> (Vec<Statement>, Vec<usize>) {
    let re = freeze_regex(freeze_token);
    let hits = find_marker_hits(&statements, source, lines, &re);
    if hits.is_empty() {
        return (statements, Vec::new());
    }

    let mut ordered: Vec<&MarkerHit> = hits.iter().map(|(_, h)| h).collect();
    ordered.sort_by_key(|h| h.line);

    let mut stack: Vec<&MarkerHit> = Vec::new();
    let mut freeze_ranges: Vec<FreezeBlockStmt> = Vec::new();
    let mut unmatched: Vec<usize> = Vec::new();

    for hit in ordered {
        if hit.is_freeze {
            stack.push(hit);
        } else if let Some(open) = stack.pop() {
            let content = lines.slice(source, open.line, hit.line).to_string();
            freeze_ranges.push(FreezeBlockStmt {
                start_line: open.line,
                end_line: hit.line,
                content,
                reason: open.reason.clone(),
                inner: Vec::new(),
            });
        } else {
            unmatched.push(hit.line);
        }
    }
    for leftover in stack {
        unmatched.push(leftover.line);
    }

    if freeze_ranges.is_empty() {
        return (statements, unmatched);
    }

    // Collect each freeze range's swallowed statements before dropping them,
    // excluding the statements that carry the marker comments themselves.
    let mut inner: Vec<Vec<Statement>> = freeze_ranges.iter().map(|_| Vec::new()).collect();
    for s in statements.iter() {
        let (s_start, s_end) = (s.start_line(), s.end_line());
        for (idx, f) in freeze_ranges.iter().enumerate() {
            if s_start < f.start_line || s_end > f.end_line {
                continue;
            }
            let carries_marker =
                (s_start..=s_end).contains(&f.start_line) || (s_start..=s_end).contains(&f.end_line);
            if !carries_marker {
                inner[idx].push(s.clone());
            }
        }
    }

    statements.retain(|s| {
        let (s_start, s_end) = (s.start_line(), s.end_line());
        !freeze_ranges
            .iter()
            .any(|f| s_start >= f.start_line && s_end <= f.end_line)
    });

    for (mut f, inner_stmts) in freeze_ranges.into_iter().zip(inner.into_iter()) {
        f.inner = inner_stmts;
        statements.push(Statement::Freeze(f));
    }
    statements.sort_by_key(|s| s.start_line());

    (statements, unmatched)
}

/// Recomputes signatures for a `signature_fn` closure wrapped for
/// thread-safe sharing across analyses.
pub fn wrap_signature_fn<F>(f: F) -> SignatureFn
where
    F: Fn(&Statement) -> SignatureOverride + Send + Sync + 'static,
{
    Arc::new(f)
}
