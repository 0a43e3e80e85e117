//! Cleanse utilities (SPEC_FULL.md §4.12): optional pre-repair of malformed
//! input, run by callers *before* constructing a [`crate::analysis::FileAnalysis`]
//! when the source is suspected to be corrupt. These are not part of the
//! merge pipeline itself.

use std::collections::HashSet;

use crate::analysis::FileAnalysis;
use crate::backend::BackendKind;
use crate::linkparse::Definition;
use crate::tables;

/// Splits a line carrying two or more concatenated link definitions (e.g.
/// `[a]: urlA[b]: urlB`, produced by some upstream generators) into one
/// definition per line. Uses a cleanse-specific bare-URL grammar that also
/// forbids `[`, so a second definition's label reliably terminates the
/// first's URL.
pub fn split_condensed_link_definitions(content: &str) -> String {
    let mut out_lines: Vec<String> = Vec::new();
    for line in content.split('\n') {
        match split_line_if_condensed(line) {
            Some(parts) => out_lines.extend(parts),
            None => out_lines.push(line.to_string()),
        }
    }
    out_lines.join("\n")
}

fn split_line_if_condensed(line: &str) -> Option<Vec<String>> {
    let bytes = line.as_bytes();
    let mut defs = Vec::new();
    let mut pos = 0;
    while pos < bytes.len() {
        let (def, end) = try_parse_one_definition(line, bytes, pos)?;
        defs.push(format_definition(&def));
        pos = end;
        while pos < bytes.len() && (bytes[pos] == b' ' || bytes[pos] == b'\t') {
            pos += 1;
        }
    }
    if defs.len() > 1 {
        Some(defs)
    } else {
        None
    }
}

fn format_definition(def: &Definition) -> String {
    match &def.title {
        Some(t) => format!("[{}]: {} \"{}\"", def.label, def.url, t),
        None => format!("[{}]: {}", def.label, def.url),
    }
}

fn find_matching_bracket(bytes: &[u8], open: usize) -> Option<usize> {
    let mut depth = 1i32;
    let mut i = open + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'[' => depth += 1,
            b']' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}

/// Parses one definition starting at `start`, forbidding `[` in the bare URL
/// form so a directly-concatenated second definition's label terminates it.
fn try_parse_one_definition(line: &str, bytes: &[u8], start: usize) -> Option<(Definition, usize)> {
    let mut i = start;
    while i < bytes.len() && (bytes[i] == b' ' || bytes[i] == b'\t') {
        i += 1;
    }
    if i >= bytes.len() || bytes[i] != b'[' {
        return None;
    }
    let close = find_matching_bracket(bytes, i)?;
    let label = line[i + 1..close].to_string();
    if label.trim().is_empty() {
        return None;
    }
    let mut j = close + 1;
    if j >= bytes.len() || bytes[j] != b':' {
        return None;
    }
    j += 1;
    while j < bytes.len() && (bytes[j] == b' ' || bytes[j] == b'\t') {
        j += 1;
    }

    let (url, after_url) = if j < bytes.len() && bytes[j] == b'<' {
        let mut k = j + 1;
        while k < bytes.len() && bytes[k] != b'>' {
            k += 1;
        }
        if k >= bytes.len() {
            return None;
        }
        (line[j + 1..k].to_string(), k + 1)
    } else {
        let mut k = j;
        while k < bytes.len()
            && bytes[k] != b' '
            && bytes[k] != b'\t'
            && bytes[k] != b'>'
            && bytes[k] != b'['
        {
            k += 1;
        }
        if k == j {
            return None;
        }
        (line[j..k].to_string(), k)
    };

    let mut k = after_url;
    while k < bytes.len() && (bytes[k] == b' ' || bytes[k] == b'\t') {
        k += 1;
    }
    let mut title = None;
    let mut end = k;
    if k < bytes.len() && matches!(bytes[k], b'"' | b'\'' | b'(') {
        let close_ch = match bytes[k] {
            b'"' => b'"',
            b'\'' => b'\'',
            b'(' => b')',
            _ => unreachable!(),
        };
        let mut m = k + 1;
        while m < bytes.len() && bytes[m] != close_ch {
            m += 1;
        }
        if m < bytes.len() {
            title = Some(line[k + 1..m].to_string());
            end = m + 1;
        }
    }

    Some((Definition { label, url, title }, end))
}

/// Ensures a single space between a fence's backticks/tildes and its info
/// string, and strips trailing whitespace after the fence marker.
pub fn repair_fence_spacing(content: &str) -> String {
    content.split('\n').map(repair_fence_line).collect::<Vec<_>>().join("\n")
}

fn repair_fence_line(line: &str) -> String {
    let trimmed = line.trim_start();
    let indent = &line[..line.len() - trimmed.len()];

    let marker_char = match trimmed.chars().next() {
        Some(c @ ('`' | '~')) => c,
        _ => return line.to_string(),
    };
    let fence_len = trimmed.chars().take_while(|&c| c == marker_char).count();
    if fence_len < 3 {
        return line.to_string();
    }
    let fence = &trimmed[..fence_len];
    let rest = trimmed[fence_len..].trim();

    if rest.is_empty() {
        format!("{indent}{fence}")
    } else {
        format!("{indent}{fence} {rest}")
    }
}

/// Runs a `FileAnalysis` internally and, for every pair of adjacent
/// statements where `needs_blank_between` holds but no gap line separates
/// them in the source, inserts one blank line. The one cleanse pass that
/// depends on structural analysis rather than being purely textual.
pub fn insert_missing_blank_lines(content: &str, backend: BackendKind) -> String {
    let analysis = match FileAnalysis::new(content, backend, "markdown-merge", None) {
        Ok(a) => a,
        Err(_) => return content.to_string(),
    };

    let mut insert_after_line: HashSet<usize> = HashSet::new();
    for pair in analysis.statements().windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        if a.is_gap() || b.is_gap() {
            continue;
        }
        if tables::needs_blank_between(&a.merge_type(), &b.merge_type()) {
            insert_after_line.insert(a.end_line());
        }
    }

    if insert_after_line.is_empty() {
        return content.to_string();
    }

    let lines: Vec<&str> = content.split('\n').collect();
    let mut out: Vec<String> = Vec::with_capacity(lines.len());
    for (i, line) in lines.iter().enumerate() {
        out.push(line.to_string());
        if insert_after_line.contains(&(i + 1)) {
            out.push(String::new());
        }
    }

    out.join("\n")
}

/// Runs all cleanse passes in the fixed order the spec requires: condensed
/// link-definition split, then fence-spacing repair, then blank-line
/// insertion, since the first two can change line numbers the third must
/// see.
pub fn cleanse_all(content: &str, backend: BackendKind) -> String {
    let step1 = split_condensed_link_definitions(content);
    let step2 = repair_fence_spacing(&step1);
    insert_missing_blank_lines(&step2, backend)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_condensed_definitions() {
        let input = "[a]: https://a.com[b]: https://b.com";
        let out = split_condensed_link_definitions(input);
        assert_eq!(out, "[a]: https://a.com\n[b]: https://b.com");
    }

    #[test]
    fn leaves_single_definition_untouched() {
        let input = "[a]: https://a.com";
        assert_eq!(split_condensed_link_definitions(input), input);
    }

    #[test]
    fn collapses_extra_space_after_fence_marker() {
        let input = "```   rust   \ncode\n```\n";
        let out = repair_fence_spacing(input);
        assert_eq!(out, "``` rust\ncode\n```\n");
    }

    #[test]
    fn fence_with_no_info_string_loses_trailing_whitespace() {
        let input = "```   \ncode\n```  \n";
        let out = repair_fence_spacing(input);
        assert_eq!(out, "```\ncode\n```\n");
    }

    #[test]
    fn inserts_blank_line_between_adjacent_headings() {
        let input = "# A\n# B\n";
        let out = insert_missing_blank_lines(input, BackendKind::Pulldown);
        assert_eq!(out, "# A\n\n# B\n");
    }

    #[test]
    fn cleanse_all_applies_passes_in_order() {
        let input = "text[a]: https://a.com[b]: https://b.com\n# Heading\n";
        let out = cleanse_all(input, BackendKind::Pulldown);
        assert!(out.contains("[a]: https://a.com\n[b]: https://b.com"));
    }
}
