//! End-to-end scenario and invariant tests for the merge pipeline, exercised
//! only through the public API, mirroring `tests/parsing_snapshots.rs` in the
//! engine crate: one fixture-sized scenario per test, plus a few
//! whole-pipeline invariants the unit tests can't see (they only construct
//! one `FileAnalysis` at a time).

use markdown_merge::backend::BackendKind;
use markdown_merge::merger::TemplateOnlyPolicy;
use markdown_merge::partial::{AnchorSpec, PartialMergeOptions, PartialMerger, WhenMissing};
use markdown_merge::resolve::{Preference, Side};
use markdown_merge::{FileAnalysis, MergeOptions, Merger};
use pretty_assertions::assert_eq;
use regex::Regex;

fn merge(template: &str, destination: &str, options: MergeOptions) -> String {
    Merger::new(template, destination, options).merge().unwrap()
}

#[test]
fn destination_wins_preserves_local_customization() {
    let template = "# Getting Started\n\nRun the installer and follow the prompts.\n";
    let destination = "# Getting Started\n\nRun `cargo install widget` then restart your shell.\n";
    let out = merge(template, destination, MergeOptions::default());
    assert_eq!(out, destination);
}

#[test]
fn template_only_content_added_when_policy_allows() {
    let template = "# Guide\n\n## Installation\n\nSteps.\n\n## License\n\nMIT.\n";
    let destination = "# Guide\n\n## Installation\n\nSteps.\n";
    let mut opts = MergeOptions::default();
    opts.add_template_only = TemplateOnlyPolicy::Always;
    let out = merge(template, destination, opts);
    assert!(out.contains("## License"));
    assert!(out.contains("MIT."));
}

#[test]
fn template_only_content_dropped_by_default_policy() {
    let template = "# Guide\n\n## License\n\nMIT.\n";
    let destination = "# Guide\n";
    let out = merge(template, destination, MergeOptions::default());
    assert!(!out.contains("## License"));
}

#[test]
fn frozen_region_survives_a_template_that_would_otherwise_replace_it() {
    let template = "# Config\n\nDefault settings.\n";
    let destination = "# Config\n\n<!-- markdown-merge:freeze local overrides -->\nport = 9000\n<!-- markdown-merge:unfreeze -->\n";
    let result = Merger::new(template, destination, MergeOptions::default())
        .merge_result()
        .unwrap();
    assert!(result.content.contains("port = 9000"));
    assert_eq!(result.frozen_blocks.len(), 1);
    assert_eq!(result.frozen_blocks[0].reason.as_deref(), Some("local overrides"));
}

#[test]
fn inline_links_rehydrate_to_reference_style_when_a_definition_exists() {
    let destination = "See the [docs](https://example.com/docs) for details.\n\n[docs]: https://example.com/docs\n";
    let out = merge("", destination, MergeOptions::default());
    assert_eq!(
        out,
        "See the [docs][docs] for details.\n\n[docs]: https://example.com/docs\n"
    );
    let rehydrated_line = out.lines().next().unwrap();
    insta::assert_snapshot!(rehydrated_line, @"See the [docs][docs] for details.");
}

#[test]
fn linked_image_rehydrates_both_levels_in_one_pass() {
    let destination =
        "[![Logo](logo.png)](https://example.com)\n\n[home]: https://example.com\n[logo]: logo.png\n";
    let out = merge("", destination, MergeOptions::default());
    assert!(out.contains("[![Logo][logo]][home]"));
}

#[test]
fn excessive_blank_runs_collapse_to_a_single_blank_line() {
    let destination = "# A\n\n\n\n\nBody.\n";
    let out = merge("", destination, MergeOptions::default());
    assert!(!out.contains("\n\n\n"));
    assert!(out.contains("# A\n\nBody."));
}

#[test]
fn partial_merge_replaces_only_the_anchored_section() {
    let template = "## Installation\n\nnpm install widget\n";
    let destination = "# Widget\n\nIntro paragraph.\n\n## Installation\n\nOld, stale instructions.\n\n## Usage\n\nUsage stays put.\n";
    let options = PartialMergeOptions {
        anchor: AnchorSpec::heading(Regex::new("(?i)installation").unwrap()),
        when_missing: WhenMissing::Skip,
        inner: MergeOptions {
            backend: BackendKind::Pulldown,
            preference: Preference::Single(Side::Template),
            ..MergeOptions::default()
        },
        final_post_process: true,
    };
    let out = PartialMerger::new(template, destination, options).merge().unwrap();
    assert!(out.contains("npm install widget"));
    assert!(!out.contains("Old, stale instructions."));
    assert!(out.contains("Intro paragraph."));
    assert!(out.contains("Usage stays put."));
}

#[test]
fn template_preference_overrides_destination_for_a_matched_table() {
    // Same header and row count on both sides (what the default signature
    // keys on), different cell data — a genuine matched-but-differing pair.
    let template = "| a | b |\n| - | - |\n| 1 | 2 |\n";
    let destination = "| a | b |\n| - | - |\n| 9 | 9 |\n";
    let mut opts = MergeOptions::default();
    opts.preference = Preference::Single(Side::Template);
    let out = merge(template, destination, opts);
    assert!(out.contains('1'));
    assert!(!out.contains('9'));
}

#[test]
fn matched_statements_preserve_destination_bytes_verbatim() {
    let template = "# Title\n\nSame body, *different* emphasis rendering intent.\n";
    let destination = "# Title\n\nSame body, *different* emphasis rendering intent.\n";
    let out = merge(template, destination, MergeOptions::default());
    assert_eq!(out, destination);
}

#[test]
fn link_definitions_in_the_destination_stay_contiguous_after_merge() {
    let destination = "Body.\n\n[a]: https://a.com\n[b]: https://b.com\n[c]: https://c.com\n";
    let out = merge("", destination, MergeOptions::default());
    assert!(out.contains("[a]: https://a.com\n[b]: https://b.com\n[c]: https://c.com"));
}

#[test]
fn rehydration_is_idempotent_across_a_second_merge_pass() {
    let destination = "See [docs](https://example.com) here.\n\n[docs]: https://example.com\n";
    let once = merge("", destination, MergeOptions::default());
    let twice = merge("", &once, MergeOptions::default());
    assert_eq!(once, twice);
}

#[test]
fn whitespace_normalization_is_idempotent_across_a_second_merge_pass() {
    let destination = "# A\n\n\n\nBody.\n";
    let once = merge("", destination, MergeOptions::default());
    let twice = merge("", &once, MergeOptions::default());
    assert_eq!(once, twice);
}

#[test]
fn signature_computation_is_deterministic_across_repeated_analyses() {
    let src = "# Title\n\nBody text.\n\n| A | B |\n|---|---|\n| 1 | 2 |\n";
    let first = FileAnalysis::new(src, BackendKind::Pulldown, "markdown-merge", None).unwrap();
    let second = FileAnalysis::new(src, BackendKind::Pulldown, "markdown-merge", None).unwrap();
    for (a, b) in first.statements().iter().zip(second.statements().iter()) {
        assert_eq!(first.signature(a), second.signature(b));
    }
}

#[test]
fn every_source_line_is_covered_by_exactly_one_statement_end_to_end() {
    let src = "# Title\n\nBody.\n\n- one\n- two\n\n> quoted\n\n[ex]: https://example.com\n";
    let analysis = FileAnalysis::new(src, BackendKind::Pulldown, "markdown-merge", None).unwrap();
    let n = analysis.line_index().line_count();
    let mut covered = vec![0u32; n + 1];
    for stmt in analysis.statements() {
        for line in stmt.start_line()..=stmt.end_line() {
            covered[line] += 1;
        }
    }
    for line in 1..=n {
        assert_eq!(covered[line], 1, "line {line} should be covered exactly once");
    }
}
