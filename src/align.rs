//! The aligner (§4.5): turns two statement sequences into a single ordered
//! stream of match / template-only / dest-only entries, indexed by
//! signature equality, with an optional fuzzy refinement pass for tables.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::analysis::FileAnalysis;
use crate::backend::NodeRef;
use crate::signature::Signature;
use crate::statement::{CanonicalType, Statement};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Match,
    TemplateOnly,
    DestOnly,
}

#[derive(Debug, Clone)]
pub struct AlignEntry {
    pub kind: EntryKind,
    pub template_index: Option<usize>,
    pub dest_index: Option<usize>,
    pub signature: Signature,
}

/// Indexes `dest` by signature (keeping insertion order of duplicates), then
/// walks `template` left to right, advancing a pointer into `dest` so each
/// dest statement is consumed at most once and in order.
pub fn align(template: &FileAnalysis, dest: &FileAnalysis) -> Vec<AlignEntry> {
    let t = template.statements();
    let d = dest.statements();

    // Statements with a `SignatureOverride::None` never index into, nor are
    // looked up against, the other side (signature.rs's `SignatureOverride`
    // doc comment) — they're excluded from the index entirely rather than
    // given a shared, collidable signature value.
    let mut dest_by_sig: HashMap<Signature, Vec<usize>> = HashMap::new();
    for (i, s) in d.iter().enumerate() {
        if let Some(sig) = dest.signature_opt(s) {
            dest_by_sig.entry(sig).or_default().push(i);
        }
    }

    let mut d_ptr = 0usize;
    let mut entries = Vec::with_capacity(t.len() + d.len());

    for (i, ts) in t.iter().enumerate() {
        let sig_opt = template.signature_opt(ts);
        let found = sig_opt.as_ref().and_then(|sig| {
            dest_by_sig
                .get(sig)
                .and_then(|positions| positions.iter().find(|&&j| j >= d_ptr).copied())
        });

        match found {
            Some(j) => {
                for k in d_ptr..j {
                    entries.push(AlignEntry {
                        kind: EntryKind::DestOnly,
                        template_index: None,
                        dest_index: Some(k),
                        signature: dest.signature(&d[k]),
                    });
                }
                entries.push(AlignEntry {
                    kind: EntryKind::Match,
                    template_index: Some(i),
                    dest_index: Some(j),
                    signature: sig_opt.expect("found a dest match only when a signature exists"),
                });
                d_ptr = j + 1;
            }
            None => {
                entries.push(AlignEntry {
                    kind: EntryKind::TemplateOnly,
                    template_index: Some(i),
                    dest_index: None,
                    signature: sig_opt.unwrap_or_else(|| template.signature(ts)),
                });
            }
        }
    }

    for k in d_ptr..d.len() {
        entries.push(AlignEntry {
            kind: EntryKind::DestOnly,
            template_index: None,
            dest_index: Some(k),
            signature: dest.signature(&d[k]),
        });
    }

    #[cfg(feature = "tracing")]
    {
        let matches = entries.iter().filter(|e| e.kind == EntryKind::Match).count();
        let template_only = entries.iter().filter(|e| e.kind == EntryKind::TemplateOnly).count();
        let dest_only = entries.iter().filter(|e| e.kind == EntryKind::DestOnly).count();
        tracing::debug!(matches, template_only, dest_only, "signature-indexed alignment complete");
    }

    entries
}

/// A candidate cross-side pairing proposed by a [`MatchRefiner`].
#[derive(Debug, Clone)]
pub struct RefinedPair {
    pub template_index: usize,
    pub dest_index: usize,
    pub score: f64,
}

/// A pluggable second pass over the statements the signature-indexed walk
/// left unmatched. Receives every template-only and dest-only statement
/// index (not just tables) and decides which pairs, if any, resolve into
/// matches above its own threshold.
pub type MatchRefiner = Arc<
    dyn Fn(&FileAnalysis, &FileAnalysis, &[usize], &[usize]) -> Vec<RefinedPair> + Send + Sync,
>;

/// Weighting for the built-in table fuzzy matcher. The spec fixes the
/// algorithm's shape (header cells, first column, token overlap, position)
/// but leaves the relative weights and threshold as calibration choices;
/// see DESIGN.md for the chosen defaults.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TableWeights {
    pub header_cells: f64,
    pub first_column: f64,
    pub token_overlap: f64,
    pub position: f64,
}

impl Default for TableWeights {
    fn default() -> Self {
        TableWeights {
            header_cells: 0.4,
            first_column: 0.3,
            token_overlap: 0.2,
            position: 0.1,
        }
    }
}

pub const DEFAULT_TABLE_THRESHOLD: f64 = 0.5;

/// Builds the built-in table refiner: scores every unmatched template/dest
/// table pair, keeping pairs scoring at or above `threshold`.
pub fn table_refiner(weights: TableWeights, threshold: f64) -> MatchRefiner {
    Arc::new(move |template, dest, t_indices, d_indices| {
        let t_tables: Vec<usize> = t_indices
            .iter()
            .copied()
            .filter(|&i| is_table(&template.statements()[i]))
            .collect();
        let d_tables: Vec<usize> = d_indices
            .iter()
            .copied()
            .filter(|&i| is_table(&dest.statements()[i]))
            .collect();

        let mut scored = Vec::new();
        for (t_pos, &ti) in t_tables.iter().enumerate() {
            let Statement::Parser(tp) = &template.statements()[ti] else {
                continue;
            };
            for (d_pos, &di) in d_tables.iter().enumerate() {
                let Statement::Parser(dp) = &dest.statements()[di] else {
                    continue;
                };
                let score = score_tables(
                    &tp.node,
                    &dp.node,
                    t_pos,
                    t_tables.len(),
                    d_pos,
                    d_tables.len(),
                    &weights,
                );
                if score >= threshold {
                    scored.push(RefinedPair {
                        template_index: ti,
                        dest_index: di,
                        score,
                    });
                }
            }
        }
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap());
        scored
    })
}

fn is_table(stmt: &Statement) -> bool {
    matches!(stmt, Statement::Parser(p) if p.merge_type == CanonicalType::Table)
}

/// Applies a [`MatchRefiner`]'s output to `entries`: for each proposed pair
/// above its own threshold (greedily, highest score first, each node used at
/// most once), the template-only entry becomes a match in place and the
/// corresponding dest-only entry is removed — so overall relative order is
/// preserved exactly as the spec requires.
pub fn apply_match_refiner(
    mut entries: Vec<AlignEntry>,
    template: &FileAnalysis,
    dest: &FileAnalysis,
    refiner: &MatchRefiner,
) -> Vec<AlignEntry> {
    let t_indices: Vec<usize> = entries
        .iter()
        .filter_map(|e| (e.kind == EntryKind::TemplateOnly).then_some(e.template_index).flatten())
        .collect();
    let d_indices: Vec<usize> = entries
        .iter()
        .filter_map(|e| (e.kind == EntryKind::DestOnly).then_some(e.dest_index).flatten())
        .collect();

    let pairs = refiner(template, dest, &t_indices, &d_indices);

    let mut used_t = HashSet::new();
    let mut used_d = HashSet::new();

    for pair in pairs {
        if used_t.contains(&pair.template_index) || used_d.contains(&pair.dest_index) {
            continue;
        }
        let t_pos = entries
            .iter()
            .position(|e| e.kind == EntryKind::TemplateOnly && e.template_index == Some(pair.template_index));
        let d_pos = entries
            .iter()
            .position(|e| e.kind == EntryKind::DestOnly && e.dest_index == Some(pair.dest_index));
        let (Some(t_pos), Some(d_pos)) = (t_pos, d_pos) else {
            continue;
        };

        used_t.insert(pair.template_index);
        used_d.insert(pair.dest_index);

        entries[t_pos] = AlignEntry {
            kind: EntryKind::Match,
            template_index: Some(pair.template_index),
            dest_index: Some(pair.dest_index),
            signature: entries[t_pos].signature.clone(),
        };
        entries.remove(d_pos);
    }

    #[cfg(feature = "tracing")]
    tracing::trace!(refined = used_t.len(), "match refiner pass complete");

    entries
}

fn header_row(node: &NodeRef) -> Option<&NodeRef> {
    node.children.first().filter(|c| c.raw_type.contains("head"))
}

fn data_rows(node: &NodeRef) -> Vec<&NodeRef> {
    node.children
        .iter()
        .filter(|c| !c.raw_type.contains("head"))
        .collect()
}

fn cell_texts(row: &NodeRef) -> Vec<String> {
    row.children
        .iter()
        .map(|c| c.string_content.clone().unwrap_or_default())
        .collect()
}

fn header_similarity(a: &NodeRef, b: &NodeRef) -> f64 {
    let (Some(ha), Some(hb)) = (header_row(a), header_row(b)) else {
        return 0.0;
    };
    let (ca, cb) = (cell_texts(ha), cell_texts(hb));
    ratio_of_matching_positions(&ca, &cb)
}

fn first_column_similarity(a: &NodeRef, b: &NodeRef) -> f64 {
    let col = |n: &NodeRef| -> Vec<String> {
        data_rows(n)
            .iter()
            .filter_map(|r| r.children.first())
            .map(|c| c.string_content.clone().unwrap_or_default())
            .collect()
    };
    let (ca, cb) = (col(a), col(b));
    jaccard(&ca, &cb)
}

fn token_overlap(a: &NodeRef, b: &NodeRef) -> f64 {
    let tokens = |n: &NodeRef| -> Vec<String> {
        let mut out = Vec::new();
        for row in n.children.iter() {
            for cell in cell_texts(row) {
                out.extend(cell.split_whitespace().map(|t| t.to_lowercase()));
            }
        }
        out
    };
    jaccard(&tokens(a), &tokens(b))
}

fn position_similarity(t_idx: usize, t_total: usize, d_idx: usize, d_total: usize) -> f64 {
    if t_total == 0 || d_total == 0 {
        return 0.0;
    }
    let tp = t_idx as f64 / t_total.max(1) as f64;
    let dp = d_idx as f64 / d_total.max(1) as f64;
    1.0 - (tp - dp).abs()
}

fn ratio_of_matching_positions(a: &[String], b: &[String]) -> f64 {
    let len = a.len().max(b.len());
    if len == 0 {
        return 1.0;
    }
    let matches = a.iter().zip(b.iter()).filter(|(x, y)| x == y).count();
    matches as f64 / len as f64
}

fn jaccard(a: &[String], b: &[String]) -> f64 {
    let sa: HashSet<&String> = a.iter().collect();
    let sb: HashSet<&String> = b.iter().collect();
    if sa.is_empty() && sb.is_empty() {
        return 1.0;
    }
    let intersection = sa.intersection(&sb).count();
    let union = sa.union(&sb).count();
    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}

fn score_tables(
    t: &NodeRef,
    d: &NodeRef,
    t_idx: usize,
    t_total: usize,
    d_idx: usize,
    d_total: usize,
    weights: &TableWeights,
) -> f64 {
    weights.header_cells * header_similarity(t, d)
        + weights.first_column * first_column_similarity(t, d)
        + weights.token_overlap * token_overlap(t, d)
        + weights.position * position_similarity(t_idx, t_total, d_idx, d_total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendKind;

    #[test]
    fn identical_documents_produce_all_matches() {
        let src = "# A\n\nBody.\n";
        let t = FileAnalysis::new(src, BackendKind::Pulldown, "markdown-merge", None).unwrap();
        let d = FileAnalysis::new(src, BackendKind::Pulldown, "markdown-merge", None).unwrap();
        let entries = align(&t, &d);
        assert!(entries.iter().all(|e| e.kind == EntryKind::Match));
        assert_eq!(entries.len(), t.statements().len());
    }

    #[test]
    fn alignment_is_total() {
        let t_src = "# A\n\n# B\n";
        let d_src = "# A\n";
        let t = FileAnalysis::new(t_src, BackendKind::Pulldown, "markdown-merge", None).unwrap();
        let d = FileAnalysis::new(d_src, BackendKind::Pulldown, "markdown-merge", None).unwrap();
        let entries = align(&t, &d);
        let matches = entries.iter().filter(|e| e.kind == EntryKind::Match).count();
        let template_only = entries.iter().filter(|e| e.kind == EntryKind::TemplateOnly).count();
        let dest_only = entries.iter().filter(|e| e.kind == EntryKind::DestOnly).count();
        assert_eq!(matches + template_only, t.statements().len());
        assert_eq!(matches + dest_only, d.statements().len());
    }

    #[test]
    fn destination_only_content_is_preserved_as_dest_only() {
        let t_src = "# A\n";
        let d_src = "# A\n\nNew paragraph.\n";
        let t = FileAnalysis::new(t_src, BackendKind::Pulldown, "markdown-merge", None).unwrap();
        let d = FileAnalysis::new(d_src, BackendKind::Pulldown, "markdown-merge", None).unwrap();
        let entries = align(&t, &d);
        assert!(entries.iter().any(|e| e.kind == EntryKind::DestOnly));
    }

    #[test]
    fn signature_override_none_never_produces_a_spurious_match() {
        use crate::analysis::wrap_signature_fn;
        use crate::signature::SignatureOverride;

        // Both sides have a single paragraph; a caller-supplied signature_fn
        // opts every paragraph out of matching. If `None` were indexed as an
        // ordinary (empty) signature, these two unrelated paragraphs would
        // collide and be reported as a match.
        let opt_out_paragraphs = wrap_signature_fn(|stmt| {
            if stmt.merge_type() == CanonicalType::Paragraph {
                SignatureOverride::None
            } else {
                SignatureOverride::UseDefault
            }
        });

        let t = FileAnalysis::new(
            "One template paragraph.\n",
            BackendKind::Pulldown,
            "markdown-merge",
            Some(opt_out_paragraphs.clone()),
        )
        .unwrap();
        let d = FileAnalysis::new(
            "A completely different destination paragraph.\n",
            BackendKind::Pulldown,
            "markdown-merge",
            Some(opt_out_paragraphs),
        )
        .unwrap();

        let entries = align(&t, &d);
        assert!(entries.iter().all(|e| e.kind != EntryKind::Match));
        assert!(entries.iter().any(|e| e.kind == EntryKind::TemplateOnly));
        assert!(entries.iter().any(|e| e.kind == EntryKind::DestOnly));
    }
}
