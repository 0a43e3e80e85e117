//! The partial-template merger (§4.11): runs the full pipeline over a single
//! section of the destination, anchored on a heading (or other) match,
//! leaving the rest of the document untouched.

use regex::Regex;

use crate::analysis::{self, FileAnalysis};
use crate::error::MergeError;
use crate::merger::{MergeOptions, Merger};
use crate::signature::{Signature, SigPart, SignatureOverride};
use crate::statement::CanonicalType;

/// What kind of statement an [`AnchorSpec`] looks for.
#[derive(Debug, Clone)]
pub enum AnchorKind {
    /// A heading, optionally restricted to one level. The section runs to
    /// just before the next heading at the same or a shallower level.
    Heading(Option<u8>),
    /// Any other canonical block type. The section runs to the line before
    /// `explicit_end` first matches (when given), else to just before the
    /// next statement of the same canonical type.
    Block(CanonicalType),
}

/// Locates the destination section a partial merge operates on, per §4.11.
pub struct AnchorSpec {
    pub kind: AnchorKind,
    pub text_pattern: Regex,
    /// Only meaningful for `AnchorKind::Block`: an explicit end-of-section
    /// boundary. When present it takes priority over the same-type fallback.
    pub explicit_end: Option<Regex>,
}

impl AnchorSpec {
    pub fn heading(text_pattern: Regex) -> Self {
        AnchorSpec { kind: AnchorKind::Heading(None), text_pattern, explicit_end: None }
    }

    pub fn heading_level(level: u8, text_pattern: Regex) -> Self {
        AnchorSpec { kind: AnchorKind::Heading(Some(level)), text_pattern, explicit_end: None }
    }

    /// Anchors on the first statement of `merge_type` whose source text
    /// matches `text_pattern`, ending at the next statement of the same type.
    pub fn block(merge_type: CanonicalType, text_pattern: Regex) -> Self {
        AnchorSpec { kind: AnchorKind::Block(merge_type), text_pattern, explicit_end: None }
    }

    /// As [`Self::block`], but the section ends at the line before
    /// `explicit_end` first matches, rather than at the next same-type block.
    pub fn block_with_end(merge_type: CanonicalType, text_pattern: Regex, explicit_end: Regex) -> Self {
        AnchorSpec { kind: AnchorKind::Block(merge_type), text_pattern, explicit_end: Some(explicit_end) }
    }
}

/// What to do when the anchor isn't found in the destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WhenMissing {
    Skip,
    Append,
    Prepend,
}

pub struct PartialMergeOptions {
    pub anchor: AnchorSpec,
    pub when_missing: WhenMissing,
    pub inner: MergeOptions,
    /// Re-runs whitespace normalization and rehydration over the whole
    /// spliced document, not just the merged section.
    pub final_post_process: bool,
}

pub struct PartialMerger {
    template_content: String,
    destination_content: String,
    options: PartialMergeOptions,
}

impl PartialMerger {
    pub fn new(
        template_content: impl Into<String>,
        destination_content: impl Into<String>,
        options: PartialMergeOptions,
    ) -> Self {
        PartialMerger {
            template_content: template_content.into(),
            destination_content: destination_content.into(),
            options,
        }
    }

    pub fn merge(&self) -> Result<String, MergeError> {
        let backend = self.options.inner.backend;
        let dest = FileAnalysis::new(&self.destination_content, backend, &self.options.inner.freeze_token, None)
            .map_err(|e| MergeError::from_backend(crate::error::Side::Destination, e))?;

        let anchor_idx = self.find_anchor(&dest);

        let Some(anchor_idx) = anchor_idx else {
            return Ok(self.handle_missing_anchor());
        };

        let (section_start_line, section_end_line) = self.delimit_section(&dest, anchor_idx);
        let last_line = dest.line_index().line_count();

        let before = if section_start_line > 1 {
            dest.source_range(1, section_start_line - 1)
        } else {
            ""
        };
        let section_text = dest.source_range(section_start_line, section_end_line);
        let after = if section_end_line < last_line {
            Some(dest.source_range(section_end_line + 1, last_line))
        } else {
            None
        };

        let section_options = self.section_merge_options();
        let section_merger = Merger::new(self.template_content.clone(), section_text.to_string(), section_options);
        let merged_section = section_merger.merge()?;

        let mut spliced = String::with_capacity(before.len() + merged_section.len() + after.map_or(0, str::len));
        spliced.push_str(before);
        spliced.push_str(&merged_section);
        if let Some(tail) = after {
            if !spliced.ends_with('\n') && !tail.is_empty() {
                spliced.push('\n');
            }
            spliced.push_str(tail);
        }

        Ok(self.maybe_final_post_process(spliced))
    }

    fn find_anchor(&self, dest: &FileAnalysis) -> Option<usize> {
        dest.statements().iter().position(|stmt| {
            let crate::statement::Statement::Parser(p) = stmt else {
                return false;
            };
            match &self.options.anchor.kind {
                AnchorKind::Heading(level) => {
                    if p.merge_type != CanonicalType::Heading {
                        return false;
                    }
                    if let Some(level) = level {
                        if p.node.header_level != Some(*level) {
                            return false;
                        }
                    }
                }
                AnchorKind::Block(merge_type) => {
                    if p.merge_type != *merge_type {
                        return false;
                    }
                }
            }
            let text = dest.source_range(p.node.start_line, p.node.end_line);
            self.options.anchor.text_pattern.is_match(text)
        })
    }

    /// Delimits the anchored section per §4.11: heading anchors end just
    /// before the next heading at the same or shallower level; other anchor
    /// types end at the explicit boundary if one was given, else at the next
    /// block of the same canonical type. Either way, EOF is the fallback end.
    fn delimit_section(&self, dest: &FileAnalysis, anchor_idx: usize) -> (usize, usize) {
        let stmts = dest.statements();
        let start_line = stmts[anchor_idx].start_line();

        match &self.options.anchor.kind {
            AnchorKind::Heading(_) => {
                let anchor_level = match &stmts[anchor_idx] {
                    crate::statement::Statement::Parser(p) => p.node.header_level.unwrap_or(1),
                    _ => 1,
                };
                let mut end_line = stmts[anchor_idx].end_line();
                for stmt in &stmts[anchor_idx + 1..] {
                    if let crate::statement::Statement::Parser(p) = stmt {
                        if p.merge_type == CanonicalType::Heading
                            && p.node.header_level.unwrap_or(1) <= anchor_level
                        {
                            break;
                        }
                    }
                    end_line = stmt.end_line();
                }
                (start_line, end_line)
            }
            AnchorKind::Block(merge_type) => {
                let mut end_line = stmts[anchor_idx].end_line();
                for stmt in &stmts[anchor_idx + 1..] {
                    if let Some(end_pattern) = &self.options.anchor.explicit_end {
                        let text = dest.source_range(stmt.start_line(), stmt.end_line());
                        if end_pattern.is_match(text) {
                            break;
                        }
                    } else if let crate::statement::Statement::Parser(p) = stmt {
                        if p.merge_type == *merge_type {
                            break;
                        }
                    }
                    end_line = stmt.end_line();
                }
                (start_line, end_line)
            }
        }
    }

    fn handle_missing_anchor(&self) -> String {
        match self.options.when_missing {
            WhenMissing::Skip => self.destination_content.clone(),
            WhenMissing::Append => {
                let mut out = self.destination_content.clone();
                if !out.ends_with('\n') && !out.is_empty() {
                    out.push('\n');
                }
                if !out.is_empty() {
                    out.push('\n');
                }
                out.push_str(&self.template_content);
                out
            }
            WhenMissing::Prepend => {
                let mut out = self.template_content.clone();
                if !out.ends_with('\n') {
                    out.push('\n');
                }
                out.push('\n');
                out.push_str(&self.destination_content);
                out
            }
        }
    }

    /// Builds the section-scoped merge options: a position-based signature
    /// override forcing every table in the section onto one signature, so a
    /// template table cleanly replaces a destination table regardless of
    /// content drift, composed with any caller-supplied `signature_fn`.
    fn section_merge_options(&self) -> MergeOptions {
        let base_fn = self.options.inner.signature_fn.clone();
        let signature_fn = analysis::wrap_signature_fn(move |stmt| {
            if stmt.merge_type() == CanonicalType::Table {
                SignatureOverride::Custom(Signature(vec![SigPart::Str("partial-section-table".to_string())]))
            } else if let Some(f) = &base_fn {
                f(stmt)
            } else {
                SignatureOverride::UseDefault
            }
        });

        MergeOptions {
            backend: self.options.inner.backend,
            preference: self.options.inner.preference.clone(),
            add_template_only: self.options.inner.add_template_only.clone(),
            inner_merge_code_blocks: self.options.inner.inner_merge_code_blocks.clone(),
            freeze_token: self.options.inner.freeze_token.clone(),
            match_refiner: self.options.inner.match_refiner.clone(),
            signature_fn: Some(signature_fn),
            node_typing: self.options.inner.node_typing.clone(),
            normalize_whitespace: self.options.inner.normalize_whitespace,
            rehydrate_link_references: self.options.inner.rehydrate_link_references,
        }
    }

    fn maybe_final_post_process(&self, content: String) -> String {
        if !self.options.final_post_process {
            return content;
        }
        let mode = self.options.inner.normalize_whitespace.unwrap_or(crate::whitespace::WhitespaceMode::Basic);
        let (normalized, _) = crate::whitespace::normalize(&content, mode);
        if self.options.inner.rehydrate_link_references {
            crate::rehydrate::rehydrate(&normalized).content
        } else {
            normalized
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendKind;
    use crate::resolve::{Preference, Side};

    fn opts() -> PartialMergeOptions {
        PartialMergeOptions {
            anchor: AnchorSpec::heading(Regex::new("(?i)installation").unwrap()),
            when_missing: WhenMissing::Skip,
            inner: MergeOptions {
                backend: BackendKind::Pulldown,
                // A partial merge's whole point is stamping the template's
                // version of the anchored section over the destination's, so
                // a matched pair inside the section resolves to the template
                // side rather than the whole-document default of destination.
                preference: Preference::Single(Side::Template),
                ..MergeOptions::default()
            },
            final_post_process: true,
        }
    }

    #[test]
    fn replaces_only_the_anchored_section() {
        let template = "## Installation\n\nNew steps.\n";
        let destination = "# Project\n\nIntro.\n\n## Installation\n\nOld steps.\n\n## Usage\n\nUsage text.\n";
        let merger = PartialMerger::new(template, destination, opts());
        let result = merger.merge().unwrap();
        assert!(result.contains("New steps."));
        assert!(!result.contains("Old steps."));
        assert!(result.contains("Intro."));
        assert!(result.contains("Usage text."));
    }

    #[test]
    fn missing_anchor_with_skip_policy_leaves_destination_untouched() {
        let template = "## Installation\n\nNew steps.\n";
        let destination = "# Project\n\nIntro.\n";
        let merger = PartialMerger::new(template, destination, opts());
        let result = merger.merge().unwrap();
        assert_eq!(result, destination);
    }

    #[test]
    fn missing_anchor_with_append_policy_adds_template() {
        let template = "## Installation\n\nNew steps.\n";
        let destination = "# Project\n\nIntro.\n";
        let mut options = opts();
        options.when_missing = WhenMissing::Append;
        let merger = PartialMerger::new(template, destination, options);
        let result = merger.merge().unwrap();
        assert!(result.contains("Intro."));
        assert!(result.contains("New steps."));
    }

    // Tables are used for the non-heading anchor tests (rather than, say,
    // block quotes) because the default table signature ignores row data
    // (§3 / signature.rs), so a template table cleanly matches-and-replaces
    // a same-shape destination table regardless of content drift. A
    // content-hashing type like a paragraph or block quote would never
    // produce a `Match` entry here, only an unrelated template-only/dest-only
    // pair, which wouldn't exercise replacement at all.
    fn table_anchor_opts(preference: crate::resolve::Preference) -> MergeOptions {
        MergeOptions { backend: BackendKind::Pulldown, preference, ..MergeOptions::default() }
    }

    #[test]
    fn block_anchor_without_explicit_end_stops_at_the_next_same_type_block() {
        let template = "| Setting | Value |\n| - | - |\n| mode | fast |\n";
        let destination = "# Doc\n\nIntro.\n\n| Setting | Value |\n| - | - |\n| mode | slow |\n\nBody paragraph between tables.\n\n| Other | Data |\n| - | - |\n| x | y |\n\nFooter.\n";
        let options = PartialMergeOptions {
            anchor: AnchorSpec::block(CanonicalType::Table, Regex::new("Setting").unwrap()),
            when_missing: WhenMissing::Skip,
            inner: table_anchor_opts(Preference::Single(Side::Template)),
            final_post_process: true,
        };
        let merger = PartialMerger::new(template, destination, options);
        let result = merger.merge().unwrap();
        assert!(result.contains("Intro."));
        assert!(result.contains("mode | fast"));
        assert!(!result.contains("mode | slow"));
        assert!(result.contains("Body paragraph between tables."));
        assert!(result.contains("Other | Data"));
        assert!(result.contains("x | y"));
        assert!(result.contains("Footer."));
    }

    #[test]
    fn block_anchor_with_explicit_end_overrides_the_same_type_fallback() {
        // Two same-shape tables precede the end marker. Without an explicit
        // end, `delimit_section`'s same-type fallback would stop right
        // before the second table, excluding it from the section entirely.
        // With `explicit_end` set, the fallback never runs — the section
        // keeps growing until the marker matches, so the second table is
        // inside the section too and gets replaced like the first.
        let template =
            "| Setting | Value |\n| - | - |\n| mode | fastA |\n\n| Setting | Value |\n| - | - |\n| mode | fastB |\n";
        let destination = "# Doc\n\n| Setting | Value |\n| - | - |\n| mode | slowA |\n\n| Setting | Value |\n| - | - |\n| mode | slowB |\n\n<!-- END -->\n\nFooter.\n";
        let options = PartialMergeOptions {
            anchor: AnchorSpec::block_with_end(
                CanonicalType::Table,
                Regex::new("Setting").unwrap(),
                Regex::new("<!-- END -->").unwrap(),
            ),
            when_missing: WhenMissing::Skip,
            inner: table_anchor_opts(Preference::Single(Side::Template)),
            final_post_process: true,
        };
        let merger = PartialMerger::new(template, destination, options);
        let result = merger.merge().unwrap();
        assert!(result.contains("mode | fastA"));
        assert!(!result.contains("mode | slowA"));
        assert!(result.contains("mode | fastB"));
        assert!(!result.contains("mode | slowB"));
        assert!(result.contains("<!-- END -->"));
        assert!(result.contains("Footer."));
    }
}
