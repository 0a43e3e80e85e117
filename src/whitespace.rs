//! The whitespace normalizer (§4.9): a post-processing pass over the fully
//! assembled merge output, independent of the statement model.

use crate::linkparse;
use crate::problems::{Problem, Severity};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WhitespaceMode {
    Basic,
    LinkRefs,
    Strict,
}

/// Collapses runs of 3+ consecutive newlines to exactly 2, and — in
/// `link_refs`/`strict` modes — removes blank lines separating two
/// consecutive link-definition lines. Idempotent: running this twice is the
/// same as running it once.
pub fn normalize(content: &str, mode: WhitespaceMode) -> (String, Vec<Problem>) {
    let (collapsed, mut problems) = collapse_excessive_blank_lines(content);
    if matches!(mode, WhitespaceMode::LinkRefs | WhitespaceMode::Strict) {
        let (final_text, link_problems) = remove_blank_lines_between_link_definitions(&collapsed);
        problems.extend(link_problems);
        (final_text, problems)
    } else {
        (collapsed, problems)
    }
}

/// Collapses every run of 3+ consecutive `\n` to exactly 2, i.e. never more
/// than one blank line in a row. A single blank line (2 newlines) is normal
/// and untouched; reports the line of the first *excess* newline.
fn collapse_excessive_blank_lines(content: &str) -> (String, Vec<Problem>) {
    let chars: Vec<char> = content.chars().collect();
    let mut out = String::with_capacity(content.len());
    let mut problems = Vec::new();
    let mut i = 0;
    let mut line = 1usize;

    while i < chars.len() {
        if chars[i] == '\n' {
            let mut j = i;
            while j < chars.len() && chars[j] == '\n' {
                j += 1;
            }
            let run_len = j - i;
            if run_len >= 3 {
                problems.push(Problem::ExcessiveWhitespace {
                    severity: Severity::Warning,
                    line: line + 2,
                    newline_count: run_len,
                    collapsed_to: 2,
                });
                out.push('\n');
                out.push('\n');
            } else {
                for _ in 0..run_len {
                    out.push('\n');
                }
            }
            line += run_len;
            i = j;
        } else {
            out.push(chars[i]);
            i += 1;
        }
    }

    (out, problems)
}

fn remove_blank_lines_between_link_definitions(content: &str) -> (String, Vec<Problem>) {
    let ends_with_newline = content.ends_with('\n');
    let raw_lines: Vec<&str> = content.split('\n').collect();
    let line_count = if ends_with_newline {
        raw_lines.len() - 1
    } else {
        raw_lines.len()
    };

    let mut out_lines: Vec<&str> = Vec::with_capacity(line_count);
    let mut problems = Vec::new();
    let mut i = 0;

    while i < line_count {
        let line = raw_lines[i];
        out_lines.push(line);

        if linkparse::parse_definition_line(line).is_some() {
            let mut j = i + 1;
            while j < line_count && raw_lines[j].trim().is_empty() {
                j += 1;
            }
            if j > i + 1 && j < line_count && linkparse::parse_definition_line(raw_lines[j]).is_some() {
                problems.push(Problem::LinkRefSpacing {
                    severity: Severity::Info,
                    line: i + 2,
                });
                i = j;
                continue;
            }
        }
        i += 1;
    }

    let mut result = out_lines.join("\n");
    if ends_with_newline {
        result.push('\n');
    }
    (result, problems)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_excessive_blank_lines() {
        let (out, problems) = normalize("A\n\n\n\n\nB\n", WhitespaceMode::Basic);
        assert_eq!(out, "A\n\nB\n");
        assert_eq!(problems.len(), 1);
        match &problems[0] {
            Problem::ExcessiveWhitespace { newline_count, collapsed_to, .. } => {
                assert_eq!(*newline_count, 5);
                assert_eq!(*collapsed_to, 2);
            }
            other => panic!("unexpected problem: {other:?}"),
        }
    }

    #[test]
    fn never_leaves_three_consecutive_newlines() {
        let (out, _) = normalize("A\n\n\n\nB\n\n\n\n\n\nC\n", WhitespaceMode::Basic);
        assert!(!out.contains("\n\n\n"));
    }

    #[test]
    fn is_idempotent() {
        let input = "A\n\n\n\nB\n\n\nC\n";
        let (once, _) = normalize(input, WhitespaceMode::Basic);
        let (twice, _) = normalize(&once, WhitespaceMode::Basic);
        assert_eq!(once, twice);
    }

    #[test]
    fn link_refs_mode_removes_blank_between_definitions() {
        let input = "[a]: https://a.com\n\n[b]: https://b.com\n";
        let (out, problems) = normalize(input, WhitespaceMode::LinkRefs);
        assert_eq!(out, "[a]: https://a.com\n[b]: https://b.com\n");
        assert_eq!(problems.len(), 1);
    }

    #[test]
    fn basic_mode_leaves_link_ref_spacing_untouched() {
        let input = "[a]: https://a.com\n\n[b]: https://b.com\n";
        let (out, _) = normalize(input, WhitespaceMode::Basic);
        assert_eq!(out, input);
    }
}
