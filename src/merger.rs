//! The merger orchestrator (§4.8): drives parse → align → resolve →
//! assemble, optionally runs the whitespace normalizer and link rehydrator,
//! and reports a [`MergeResult`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use crate::align::{self, AlignEntry, EntryKind, MatchRefiner};
use crate::analysis::FileAnalysis;
use crate::backend::BackendKind;
use crate::builder::OutputBuilder;
use crate::error::{MergeError, Side as ErrorSide};
use crate::problems::Problem;
use crate::resolve::{self, Decision, Preference, Side};
use crate::signature::SignatureFn;
use crate::statement::{CanonicalType, Statement};
use crate::rehydrate;
use crate::whitespace::{self, WhitespaceMode};

/// Which template-only entries make it into the output. The spec's
/// `bool | predicate(node, entry) -> bool` union.
#[derive(Clone)]
pub enum TemplateOnlyPolicy {
    Never,
    Always,
    Predicate(Arc<dyn Fn(&Statement, &AlignEntry) -> bool + Send + Sync>),
}

impl Default for TemplateOnlyPolicy {
    fn default() -> Self {
        TemplateOnlyPolicy::Never
    }
}

impl TemplateOnlyPolicy {
    fn accepts(&self, stmt: &Statement, entry: &AlignEntry) -> bool {
        match self {
            TemplateOnlyPolicy::Never => false,
            TemplateOnlyPolicy::Always => true,
            TemplateOnlyPolicy::Predicate(f) => f(stmt, entry),
        }
    }
}

/// A caller-supplied merger for matched code-block pairs, invoked with the
/// template and destination block text and returning the merged text
/// (without a trailing blank line — the builder's spacing rule adds one).
pub type CodeMerger = Arc<dyn Fn(&str, &str) -> String + Send + Sync>;

pub struct MergeOptions {
    pub backend: BackendKind,
    pub preference: Preference,
    pub add_template_only: TemplateOnlyPolicy,
    pub inner_merge_code_blocks: Option<CodeMerger>,
    pub freeze_token: String,
    pub match_refiner: Option<MatchRefiner>,
    pub signature_fn: Option<SignatureFn>,
    pub node_typing: Option<HashMap<String, CanonicalType>>,
    pub normalize_whitespace: Option<WhitespaceMode>,
    pub rehydrate_link_references: bool,
}

impl Default for MergeOptions {
    fn default() -> Self {
        MergeOptions {
            backend: BackendKind::default(),
            preference: Preference::default(),
            add_template_only: TemplateOnlyPolicy::default(),
            inner_merge_code_blocks: None,
            freeze_token: "markdown-merge".to_string(),
            match_refiner: None,
            signature_fn: None,
            node_typing: None,
            normalize_whitespace: Some(WhitespaceMode::Basic),
            rehydrate_link_references: true,
        }
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct Conflict {
    pub template_line: Option<usize>,
    pub dest_line: Option<usize>,
    pub merge_type: CanonicalType,
    pub decision: Decision,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct FrozenBlockInfo {
    pub start_line: usize,
    pub end_line: usize,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct MergeStats {
    pub nodes_added: usize,
    pub nodes_modified: usize,
    pub nodes_removed: usize,
    pub inner_merges: Option<usize>,
    pub merge_time_ms: u64,
}

/// The full outcome of a merge, serializable so callers can log or persist
/// it (e.g. as a CI artifact) without hand-rolling a report format.
#[derive(Debug, Clone, serde::Serialize)]
pub struct MergeResult {
    pub content: String,
    pub conflicts: Vec<Conflict>,
    pub frozen_blocks: Vec<FrozenBlockInfo>,
    pub stats: MergeStats,
    pub problems: Vec<Problem>,
}

pub struct Merger {
    template_content: String,
    destination_content: String,
    options: MergeOptions,
}

impl Merger {
    pub fn new(
        template_content: impl Into<String>,
        destination_content: impl Into<String>,
        options: MergeOptions,
    ) -> Self {
        Merger {
            template_content: template_content.into(),
            destination_content: destination_content.into(),
            options,
        }
    }

    pub fn merge(&self) -> Result<String, MergeError> {
        Ok(self.merge_result()?.content)
    }

    pub fn merge_result(&self) -> Result<MergeResult, MergeError> {
        let start = Instant::now();
        let opts = &self.options;

        let mut template = FileAnalysis::new(
            &self.template_content,
            opts.backend,
            &opts.freeze_token,
            opts.signature_fn.clone(),
        )
        .map_err(|e| MergeError::from_backend(ErrorSide::Template, e))?;

        let mut dest = FileAnalysis::new(
            &self.destination_content,
            opts.backend,
            &opts.freeze_token,
            opts.signature_fn.clone(),
        )
        .map_err(|e| MergeError::from_backend(ErrorSide::Destination, e))?;

        if let Some(overrides) = &opts.node_typing {
            template.apply_node_typing(overrides);
            dest.apply_node_typing(overrides);
        }

        let mut entries = align::align(&template, &dest);
        if let Some(refiner) = &opts.match_refiner {
            entries = align::apply_match_refiner(entries, &template, &dest, refiner);
        }

        let mut builder = OutputBuilder::new(true);
        let mut conflicts = Vec::new();
        let mut frozen_blocks = Vec::new();
        let mut stats = MergeStats::default();

        for entry in &entries {
            match entry.kind {
                EntryKind::Match => {
                    self.emit_match(
                        entry,
                        &template,
                        &dest,
                        &mut builder,
                        &mut conflicts,
                        &mut frozen_blocks,
                        &mut stats,
                    );
                }
                EntryKind::TemplateOnly => {
                    let idx = entry.template_index.expect("template_only entry has template_index");
                    let stmt = &template.statements()[idx];
                    if opts.add_template_only.accepts(stmt, entry) {
                        builder.add_node_source(stmt, &template);
                        stats.nodes_added += 1;
                    } else {
                        stats.nodes_removed += 1;
                    }
                }
                EntryKind::DestOnly => {
                    let idx = entry.dest_index.expect("dest_only entry has dest_index");
                    let stmt = &dest.statements()[idx];
                    builder.add_node_source(stmt, &dest);
                    if let Statement::Freeze(f) = stmt {
                        frozen_blocks.push(FrozenBlockInfo {
                            start_line: f.start_line,
                            end_line: f.end_line,
                            reason: f.reason.clone(),
                        });
                    }
                }
            }
        }

        let mut content = builder.into_string();
        let mut problems = Vec::new();

        if let Some(mode) = opts.normalize_whitespace {
            let (normalized, ws_problems) = whitespace::normalize(&content, mode);
            content = normalized;
            problems.extend(ws_problems);
        }

        if opts.rehydrate_link_references {
            let result = rehydrate::rehydrate(&content);
            content = result.content;
            problems.extend(result.problems);
        }

        stats.merge_time_ms = start.elapsed().as_millis() as u64;

        #[cfg(feature = "tracing")]
        tracing::debug!(
            added = stats.nodes_added,
            modified = stats.nodes_modified,
            removed = stats.nodes_removed,
            ms = stats.merge_time_ms,
            "merge complete"
        );

        Ok(MergeResult {
            content,
            conflicts,
            frozen_blocks,
            stats,
            problems,
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn emit_match(
        &self,
        entry: &AlignEntry,
        template: &FileAnalysis,
        dest: &FileAnalysis,
        builder: &mut OutputBuilder,
        conflicts: &mut Vec<Conflict>,
        frozen_blocks: &mut Vec<FrozenBlockInfo>,
        stats: &mut MergeStats,
    ) {
        let ti = entry.template_index.expect("match entry has template_index");
        let di = entry.dest_index.expect("match entry has dest_index");
        let t_stmt = &template.statements()[ti];
        let d_stmt = &dest.statements()[di];

        let both_code_blocks = t_stmt.merge_type() == CanonicalType::CodeBlock
            && d_stmt.merge_type() == CanonicalType::CodeBlock;

        if both_code_blocks {
            if let Some(merger) = &self.options.inner_merge_code_blocks {
                let t_text = template.source_range(t_stmt.start_line(), t_stmt.end_line());
                let d_text = dest.source_range(d_stmt.start_line(), d_stmt.end_line());
                let merged = merger(t_text, d_text);
                builder.add_raw_typed(&merged, CanonicalType::CodeBlock);
                stats.inner_merges = Some(stats.inner_merges.unwrap_or(0) + 1);
                return;
            }
        }

        let resolution = resolve::resolve(template, dest, entry, &self.options.preference);
        let (winning_stmt, winning_analysis) = match resolution.source {
            Side::Template => (t_stmt, template),
            Side::Destination => (d_stmt, dest),
        };

        builder.add_node_source(winning_stmt, winning_analysis);

        if resolution.decision != Decision::Identical {
            stats.nodes_modified += 1;
            conflicts.push(Conflict {
                template_line: Some(t_stmt.start_line()),
                dest_line: Some(d_stmt.start_line()),
                merge_type: t_stmt.merge_type(),
                decision: resolution.decision,
            });
        }

        if let Statement::Freeze(f) = winning_stmt {
            frozen_blocks.push(FrozenBlockInfo {
                start_line: f.start_line,
                end_line: f.end_line,
                reason: f.reason.clone(),
            });
        }
    }
}
