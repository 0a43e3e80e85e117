//! The link reference rehydrator (§4.10): the inverse of inlining. Rewrites
//! `[text](url)` / `![alt](url)` into reference-style `[text][label]` /
//! `![alt][label]` wherever `url` maps to a known definition, in a single
//! post-order pass over the nested construct forest so a linked image like
//! `[![alt](img)](page)` rehydrates both levels at once.

use std::collections::HashMap;

use crate::linkparse::{self, Definition, LinkConstruct};
use crate::problems::{Problem, Severity};

pub struct RehydrateResult {
    pub content: String,
    pub changed: bool,
    pub count: usize,
    pub problems: Vec<Problem>,
}

/// Runs one rehydration pass over `content`. Idempotent: rehydrating
/// already-rehydrated content is a no-op, since reference-style links don't
/// match the inline-link grammar this scans for.
pub fn rehydrate(content: &str) -> RehydrateResult {
    let defs: Vec<Definition> = linkparse::parse_definitions(content).into_iter().flatten().collect();
    let mut problems = Vec::new();
    detect_duplicates(&defs, &mut problems);
    let index = linkparse::build_url_to_label(&defs);

    let forest = linkparse::find_all_link_constructs(content);
    let mut replacements: Vec<(usize, usize, String)> = Vec::new();

    for construct in &forest {
        let processed = process(construct, &index, &mut problems);
        match processed.whole {
            Some(text) => replacements.push((construct.start_byte, construct.end_byte, text)),
            None => replacements.extend(processed.fallback),
        }
    }

    replacements.sort_by(|a, b| b.0.cmp(&a.0));

    let mut result = content.to_string();
    for (start, end, text) in &replacements {
        result.replace_range(*start..*end, text);
    }

    let count = replacements.len();

    #[cfg(feature = "tracing")]
    tracing::debug!(count, "link rehydration pass complete");

    RehydrateResult {
        content: result,
        changed: count > 0,
        count,
        problems,
    }
}

fn detect_duplicates(defs: &[Definition], problems: &mut Vec<Problem>) {
    let mut by_url: HashMap<&str, Vec<&str>> = HashMap::new();
    for d in defs {
        by_url.entry(d.url.as_str()).or_default().push(d.label.as_str());
    }
    let mut urls: Vec<&&str> = by_url.keys().collect();
    urls.sort();
    for url in urls {
        let labels = &by_url[url];
        if labels.len() > 1 {
            problems.push(Problem::DuplicateLinkDefinition {
                severity: Severity::Warning,
                url: url.to_string(),
                labels: labels.iter().map(|s| s.to_string()).collect(),
            });
        }
    }
}

struct Processed {
    /// If set, the whole construct's original span can be replaced with this
    /// reference-style text.
    whole: Option<String>,
    /// Replacements to apply instead, in absolute byte positions, when
    /// `whole` isn't usable (the parent's URL is unknown, or it's titled).
    fallback: Vec<(usize, usize, String)>,
}

fn process(c: &LinkConstruct, index: &HashMap<String, String>, problems: &mut Vec<Problem>) -> Processed {
    if c.children.is_empty() {
        return process_leaf(c, index, problems);
    }

    let child_results: Vec<(&LinkConstruct, Processed)> = c
        .children
        .iter()
        .map(|child| (child, process(child, index, problems)))
        .collect();

    let rebuilt = rebuild_text(c, &child_results);

    let mut fallback = Vec::new();
    for (child, result) in &child_results {
        match &result.whole {
            Some(text) => fallback.push((child.start_byte, child.end_byte, text.clone())),
            None => fallback.extend(result.fallback.iter().cloned()),
        }
    }

    if let Some(title) = &c.title {
        record_title_problem(c, title, problems);
        return Processed { whole: None, fallback };
    }

    match index.get(&c.url) {
        Some(label) => {
            let marker = if c.is_image { "!" } else { "" };
            let whole = format!("{marker}[{rebuilt}][{label}]");
            Processed { whole: Some(whole), fallback }
        }
        None => Processed { whole: None, fallback },
    }
}

fn process_leaf(c: &LinkConstruct, index: &HashMap<String, String>, problems: &mut Vec<Problem>) -> Processed {
    if let Some(title) = &c.title {
        record_title_problem(c, title, problems);
        return Processed { whole: None, fallback: vec![] };
    }
    match index.get(&c.url) {
        Some(label) => {
            let marker = if c.is_image { "!" } else { "" };
            let text = format!("{marker}[{}][{}]", c.text, label);
            Processed {
                whole: Some(text.clone()),
                fallback: vec![(c.start_byte, c.end_byte, text)],
            }
        }
        None => Processed { whole: None, fallback: vec![] },
    }
}

fn record_title_problem(c: &LinkConstruct, title: &str, problems: &mut Vec<Problem>) {
    #[cfg(feature = "tracing")]
    tracing::warn!(url = %c.url, is_image = c.is_image, "titled link skipped during rehydration");

    if c.is_image {
        problems.push(Problem::ImageHasTitle {
            severity: Severity::Info,
            url: c.url.clone(),
            title: title.to_string(),
        });
    } else {
        problems.push(Problem::LinkHasTitle {
            severity: Severity::Info,
            url: c.url.clone(),
            title: title.to_string(),
        });
    }
}

/// Substitutes each child's own replacement (or its untouched original text)
/// into the parent's bracket text, at the child's relative offset.
fn rebuild_text(c: &LinkConstruct, child_results: &[(&LinkConstruct, Processed)]) -> String {
    let mut rebuilt = String::with_capacity(c.text.len());
    let mut cursor = c.text_start;
    for (child, result) in child_results {
        let piece = match &result.whole {
            Some(w) => w.clone(),
            None => child.original.clone(),
        };
        rebuilt.push_str(&c.text[cursor - c.text_start..child.start_byte - c.text_start]);
        rebuilt.push_str(&piece);
        cursor = child.end_byte;
    }
    rebuilt.push_str(&c.text[cursor - c.text_start..]);
    rebuilt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rehydrates_simple_link() {
        let input = "See [Example](https://example.com) here.\n\n[example]: https://example.com\n";
        let r = rehydrate(input);
        assert_eq!(
            r.content,
            "See [Example][example] here.\n\n[example]: https://example.com\n"
        );
        assert_eq!(r.count, 1);
    }

    #[test]
    fn rehydrates_linked_image_in_one_pass() {
        let input = "[![Logo](img.png)](https://site.com)\n\n[site]: https://site.com\n[img]: img.png\n";
        let r = rehydrate(input);
        assert_eq!(
            r.content,
            "[![Logo][img]][site]\n\n[site]: https://site.com\n[img]: img.png\n"
        );
    }

    #[test]
    fn titled_link_is_left_inline_with_a_problem() {
        let input = "[a](https://a.com \"Title\")\n\n[a]: https://a.com\n";
        let r = rehydrate(input);
        assert!(r.content.contains("[a](https://a.com \"Title\")"));
        assert!(r
            .problems
            .iter()
            .any(|p| matches!(p, Problem::LinkHasTitle { .. })));
    }

    #[test]
    fn rehydration_is_idempotent() {
        let input = "See [Example](https://example.com) here.\n\n[example]: https://example.com\n";
        let once = rehydrate(input).content;
        let twice = rehydrate(&once).content;
        assert_eq!(once, twice);
    }

    #[test]
    fn duplicate_urls_are_reported() {
        let input = "[a]: https://x.com\n[b]: https://x.com\n";
        let r = rehydrate(input);
        assert!(r
            .problems
            .iter()
            .any(|p| matches!(p, Problem::DuplicateLinkDefinition { .. })));
    }

    #[test]
    fn unknown_url_is_left_alone() {
        let input = "[a](https://unknown.com)\n";
        let r = rehydrate(input);
        assert_eq!(r.content, input);
        assert!(!r.changed);
    }
}
