//! PEG-style link/definition grammars (§4.1).
//!
//! These are hand-rolled linear scanners, not built on a parser-combinator
//! crate: every primitive either advances strictly forward or reports
//! failure, so a caller that retries at `failed_position + 1` can never loop.
//! This mirrors the "exceptions for control flow become result types"
//! redesign note — there is no backtracking, only forward bracket/paren-depth
//! counting with quote-awareness for the URL-with-title grammar.

use std::collections::HashMap;

/// A recovered `[label]: url "title"` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Definition {
    pub label: String,
    pub url: String,
    pub title: Option<String>,
}

/// One inline `[text](url)` or `![alt](url)` hit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkMatch {
    pub start_byte: usize,
    pub end_byte: usize,
    pub is_image: bool,
    /// Link text, or image alt text.
    pub text: String,
    pub url: String,
    pub title: Option<String>,
    pub original: String,
}

/// A link/image construct together with any constructs nested strictly
/// inside its text span (e.g. a linked image's inner image).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkConstruct {
    pub start_byte: usize,
    pub end_byte: usize,
    /// Byte span of the bracketed text content (`text_start..text_end`),
    /// i.e. where `children` are nested — excludes the surrounding `[`/`]`
    /// and the trailing `(url "title")`.
    pub text_start: usize,
    pub text_end: usize,
    pub is_image: bool,
    pub text: String,
    pub url: String,
    pub title: Option<String>,
    pub original: String,
    pub children: Vec<LinkConstruct>,
}

/// Parses a single definition line: `^ spaces? "[" LABEL "]" ":" spaces? URL
/// (spaces TITLE)? spaces? $`. Returns `None` if the line isn't a definition;
/// never panics on malformed input.
pub fn parse_definition_line(line: &str) -> Option<Definition> {
    let bytes = line.as_bytes();
    let mut i = skip_spaces(bytes, 0);
    if i >= bytes.len() || bytes[i] != b'[' {
        return None;
    }
    let close = find_matching_bracket(bytes, i)?;
    let label = line[i + 1..close].to_string();
    if label.trim().is_empty() {
        return None;
    }
    i = close + 1;
    if i >= bytes.len() || bytes[i] != b':' {
        return None;
    }
    i += 1;
    i = skip_spaces(bytes, i);

    let (url, after_url) = read_definition_url(line, bytes, i)?;
    i = skip_spaces(bytes, after_url);

    let mut title = None;
    if i < bytes.len() && (bytes[i] == b'"' || bytes[i] == b'\'' || bytes[i] == b'(') {
        let (t, after_title) = read_title(line, bytes, i)?;
        title = Some(t);
        i = skip_spaces(bytes, after_title);
    }

    if i != bytes.len() {
        return None;
    }

    Some(Definition { label, url, title })
}

/// Runs [`parse_definition_line`] over every line of `content`, returning one
/// slot per line (`None` where the line isn't a definition).
pub fn parse_definitions(content: &str) -> Vec<Option<Definition>> {
    content.lines().map(parse_definition_line).collect()
}

/// Scans `content` for top-level `[text](url)` constructs. A `!` immediately
/// before `[` disqualifies the match — it belongs to an image.
pub fn find_inline_links(content: &str) -> Vec<LinkMatch> {
    flat_matches(content, false)
}

/// Scans `content` for top-level `![alt](url)` constructs.
pub fn find_inline_images(content: &str) -> Vec<LinkMatch> {
    flat_matches(content, true)
}

fn flat_matches(content: &str, images: bool) -> Vec<LinkMatch> {
    find_constructs(content, 0, content.len())
        .into_iter()
        .filter(|c| c.is_image == images)
        .map(|c| LinkMatch {
            start_byte: c.start_byte,
            end_byte: c.end_byte,
            is_image: c.is_image,
            text: c.text,
            url: c.url,
            title: c.title,
            original: c.original,
        })
        .collect()
}

/// Returns the forest of top-level constructs in `content`, each carrying any
/// constructs nested strictly inside its bracket text (e.g. a linked image).
pub fn find_all_link_constructs(content: &str) -> Vec<LinkConstruct> {
    find_constructs(content, 0, content.len())
}

/// Groups definitions by URL and picks a deterministic "best" label per URL:
/// the shortest label, ties broken by first-seen order.
pub fn build_url_to_label(definitions: &[Definition]) -> HashMap<String, String> {
    let mut best: HashMap<String, (usize, String)> = HashMap::new();
    for (order, def) in definitions.iter().enumerate() {
        best.entry(def.url.clone())
            .and_modify(|(best_order, best_label)| {
                if def.label.len() < best_label.len() {
                    *best_label = def.label.clone();
                    *best_order = order;
                }
            })
            .or_insert((order, def.label.clone()));
    }
    best.into_iter().map(|(url, (_, label))| (url, label)).collect()
}

// --- shared scanning primitives -------------------------------------------------

fn skip_spaces(bytes: &[u8], mut i: usize) -> usize {
    while i < bytes.len() && (bytes[i] == b' ' || bytes[i] == b'\t') {
        i += 1;
    }
    i
}

/// `bytes[open]` must be `[`. Returns the index of the matching `]`, counting
/// nested bracket depth so labels like `[a[b]c]` resolve correctly.
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

/// `bytes[open]` must be `(`. Returns the index of the matching `)`, with
/// paren depth counting suspended inside single- or double-quoted regions so
/// a quoted title containing literal parens doesn't confuse the scan.
fn find_matching_paren(bytes: &[u8], open: usize) -> Option<usize> {
    let mut depth = 1i32;
    let mut i = open + 1;
    let mut quote: Option<u8> = None;
    while i < bytes.len() {
        let c = bytes[i];
        if let Some(q) = quote {
            if c == q {
                quote = None;
            }
        } else {
            match c {
                b'"' | b'\'' => quote = Some(c),
                b'(' => depth += 1,
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(i);
                    }
                }
                _ => {}
            }
        }
        i += 1;
    }
    None
}

/// Reads a definition-grammar URL starting at `start`: either `<...>` (any
/// byte but `>`) or a bare run of non-whitespace, non-`>` bytes. Returns the
/// unwrapped URL text and the byte index just past it.
fn read_definition_url(line: &str, bytes: &[u8], start: usize) -> Option<(String, usize)> {
    if start >= bytes.len() {
        return None;
    }
    if bytes[start] == b'<' {
        let mut i = start + 1;
        while i < bytes.len() && bytes[i] != b'>' {
            i += 1;
        }
        if i >= bytes.len() {
            return None;
        }
        Some((line[start + 1..i].to_string(), i + 1))
    } else {
        let mut i = start;
        while i < bytes.len() && bytes[i] != b' ' && bytes[i] != b'\t' && bytes[i] != b'>' {
            i += 1;
        }
        if i == start {
            return None;
        }
        Some((line[start..i].to_string(), i))
    }
}

/// Reads a `"..."`, `'...'`, or `(...)` title starting at `start`. Returns the
/// unwrapped title text and the index just past the closing delimiter.
fn read_title(line: &str, bytes: &[u8], start: usize) -> Option<(String, usize)> {
    let (open, close) = match bytes[start] {
        b'"' => (b'"', b'"'),
        b'\'' => (b'\'', b'\''),
        b'(' => (b'(', b')'),
        _ => return None,
    };
    let _ = open;
    let mut i = start + 1;
    while i < bytes.len() && bytes[i] != close {
        i += 1;
    }
    if i >= bytes.len() {
        return None;
    }
    Some((line[start + 1..i].to_string(), i + 1))
}

/// Parses the content between a construct's outer parens: URL, then an
/// optional `(spaces TITLE)`. The whole slice must be consumed save for
/// trailing whitespace.
fn parse_inline_url_and_title(inner: &str) -> Option<(String, Option<String>)> {
    let trimmed_start = inner.trim_start();
    let leading_ws = inner.len() - trimmed_start.len();
    let bytes = inner.as_bytes();
    let start = leading_ws;
    if start >= bytes.len() {
        // Empty URL is permitted by CommonMark (`[x]()`), but we require at
        // least an explicit empty `<>` or treat bare-empty as a valid empty
        // string.
        return Some((String::new(), None));
    }

    let (url, after_url) = if bytes[start] == b'<' {
        let mut i = start + 1;
        while i < bytes.len() && bytes[i] != b'>' {
            i += 1;
        }
        if i >= bytes.len() {
            return None;
        }
        (inner[start + 1..i].to_string(), i + 1)
    } else {
        // Bare URL: balanced parens are tolerated, stops at whitespace
        // outside of any paren nesting.
        let mut i = start;
        let mut depth = 0i32;
        while i < bytes.len() {
            match bytes[i] {
                b'(' => depth += 1,
                b')' if depth > 0 => depth -= 1,
                b' ' | b'\t' if depth == 0 => break,
                _ => {}
            }
            i += 1;
        }
        (inner[start..i].to_string(), i)
    };

    let rest = inner[after_url..].trim();
    if rest.is_empty() {
        return Some((url, None));
    }

    let rbytes = rest.as_bytes();
    let (open, close) = match rbytes[0] {
        b'"' => (b'"', b'"'),
        b'\'' => (b'\'', b'\''),
        b'(' => (b'(', b')'),
        _ => return Some((url, None)),
    };
    let _ = open;
    if rbytes.last() == Some(&close) && rbytes.len() >= 2 {
        Some((url, Some(rest[1..rest.len() - 1].to_string())))
    } else {
        Some((url, None))
    }
}

struct RawMatch {
    start_byte: usize,
    end_byte: usize,
    is_image: bool,
    text_start: usize,
    text_end: usize,
    text: String,
    url: String,
    title: Option<String>,
    original: String,
}

fn try_match(content: &str, bracket_open: usize, is_image: bool, start: usize) -> Option<RawMatch> {
    let bytes = content.as_bytes();
    let close = find_matching_bracket(bytes, bracket_open)?;
    let paren_open = close + 1;
    if paren_open >= bytes.len() || bytes[paren_open] != b'(' {
        return None;
    }
    let paren_close = find_matching_paren(bytes, paren_open)?;
    let inner = &content[paren_open + 1..paren_close];
    let (url, title) = parse_inline_url_and_title(inner)?;
    let text = content[bracket_open + 1..close].to_string();
    let end_byte = paren_close + 1;
    let original = content[start..end_byte].to_string();
    Some(RawMatch {
        start_byte: start,
        end_byte,
        is_image,
        text_start: bracket_open + 1,
        text_end: close,
        text,
        url,
        title,
        original,
    })
}

fn find_constructs(content: &str, from: usize, to: usize) -> Vec<LinkConstruct> {
    let bytes = content.as_bytes();
    let mut out = Vec::new();
    let mut pos = from;
    while pos < to {
        if bytes[pos] == b'[' {
            let is_image = pos > 0 && bytes[pos - 1] == b'!';
            let start = if is_image { pos - 1 } else { pos };
            if let Some(raw) = try_match(content, pos, is_image, start) {
                let children = find_constructs(content, raw.text_start, raw.text_end);
                out.push(LinkConstruct {
                    start_byte: raw.start_byte,
                    end_byte: raw.end_byte,
                    text_start: raw.text_start,
                    text_end: raw.text_end,
                    is_image: raw.is_image,
                    text: raw.text,
                    url: raw.url,
                    title: raw.title,
                    original: raw.original,
                    children,
                });
                pos = out.last().unwrap().end_byte;
                continue;
            }
        }
        pos += 1;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_definition() {
        let d = parse_definition_line("[example]: https://example.com").unwrap();
        assert_eq!(d.label, "example");
        assert_eq!(d.url, "https://example.com");
        assert_eq!(d.title, None);
    }

    #[test]
    fn parses_definition_with_quoted_title() {
        let d = parse_definition_line("[ex]: https://example.com \"Example\"").unwrap();
        assert_eq!(d.url, "https://example.com");
        assert_eq!(d.title.as_deref(), Some("Example"));
    }

    #[test]
    fn parses_definition_with_angle_url() {
        let d = parse_definition_line("[ex]: <https://example.com/a b>").unwrap();
        assert_eq!(d.url, "https://example.com/a b");
    }

    #[test]
    fn rejects_non_definition_line() {
        assert!(parse_definition_line("just some text").is_none());
    }

    #[test]
    fn finds_simple_inline_link() {
        let matches = find_inline_links("See [Example](https://example.com) here.");
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].text, "Example");
        assert_eq!(matches[0].url, "https://example.com");
        assert!(!matches[0].is_image);
    }

    #[test]
    fn image_is_excluded_from_plain_links() {
        let matches = find_inline_links("![alt](img.png)");
        assert!(matches.is_empty());
        let images = find_inline_images("![alt](img.png)");
        assert_eq!(images.len(), 1);
    }

    #[test]
    fn nested_linked_image_forms_a_forest() {
        let constructs = find_all_link_constructs("[![Logo](img.png)](https://site.com)");
        assert_eq!(constructs.len(), 1);
        let outer = &constructs[0];
        assert!(!outer.is_image);
        assert_eq!(outer.url, "https://site.com");
        assert_eq!(outer.children.len(), 1);
        assert!(outer.children[0].is_image);
        assert_eq!(outer.children[0].url, "img.png");
    }

    #[test]
    fn best_label_is_shortest_then_first_seen() {
        let defs = vec![
            Definition { label: "example-long".into(), url: "https://x.com".into(), title: None },
            Definition { label: "ex".into(), url: "https://x.com".into(), title: None },
            Definition { label: "ex2".into(), url: "https://x.com".into(), title: None },
        ];
        let map = build_url_to_label(&defs);
        assert_eq!(map.get("https://x.com"), Some(&"ex".to_string()));
    }

    #[test]
    fn titled_link_is_still_matched() {
        let matches = find_inline_links("[a](https://x.com \"Title\")");
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].title.as_deref(), Some("Title"));
    }
}
