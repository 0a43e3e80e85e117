//! Precomputed line-start byte offsets for a source string.
//!
//! Per the design notes in SPEC_FULL.md §9: "Source-range extraction by
//! splitting on `\n`" is replaced with a line-start index computed once at
//! analysis construction, so `source_range` is two slice lookups rather than
//! a re-split of the whole document on every call.

#[derive(Debug, Clone)]
pub struct LineIndex {
    /// `starts[i]` is the byte offset of the first byte of line `i + 1`.
    starts: Vec<usize>,
    len: usize,
    ends_with_newline: bool,
}

impl LineIndex {
    pub fn new(source: &str) -> Self {
        let mut starts = vec![0usize];
        for (i, b) in source.bytes().enumerate() {
            if b == b'\n' {
                starts.push(i + 1);
            }
        }
        // A source ending in `\n` has no content on the line after the last
        // newline; don't count it as an extra line.
        if source.ends_with('\n') {
            starts.pop();
        }
        LineIndex {
            starts,
            len: source.len(),
            ends_with_newline: source.ends_with('\n'),
        }
    }

    /// Total number of (1-based) lines in the source.
    pub fn line_count(&self) -> usize {
        self.starts.len()
    }

    pub fn ends_with_newline(&self) -> bool {
        self.ends_with_newline
    }

    /// Byte offset of the start of 1-based line `line`.
    pub fn line_start(&self, line: usize) -> usize {
        self.starts[line - 1]
    }

    /// Byte offset one past the end of 1-based line `line`'s content,
    /// i.e. the position of its trailing `\n` if any, else `len`.
    pub fn line_end(&self, line: usize) -> usize {
        if line < self.starts.len() {
            let next_start = self.starts[line];
            // Strip the newline itself.
            next_start - 1
        } else {
            self.len
        }
    }

    pub fn is_last_line(&self, line: usize) -> bool {
        line == self.starts.len()
    }

    /// The 1-based line number containing byte offset `byte`.
    pub fn line_of_byte(&self, byte: usize) -> usize {
        match self.starts.binary_search(&byte) {
            Ok(i) => i + 1,
            Err(i) => i, // i is the count of starts <= byte, i.e. the line number
        }
    }

    /// The exact byte slice of source covering 1-based inclusive lines
    /// `start..=end`, with a trailing `\n` iff `end` is not the last line of
    /// the file, or the file itself ended with `\n`.
    pub fn slice<'a>(&self, source: &'a str, start: usize, end: usize) -> &'a str {
        let byte_start = self.line_start(start);
        let byte_end = if self.is_last_line(end) {
            self.len
        } else {
            self.line_start(end + 1)
        };
        &source[byte_start..byte_end]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indexes_simple_source() {
        let idx = LineIndex::new("a\nbb\nccc\n");
        assert_eq!(idx.line_count(), 3);
        assert_eq!(idx.line_start(1), 0);
        assert_eq!(idx.line_start(2), 2);
        assert_eq!(idx.line_start(3), 5);
    }

    #[test]
    fn slice_roundtrips_whole_document() {
        let src = "a\nbb\nccc\n";
        let idx = LineIndex::new(src);
        assert_eq!(idx.slice(src, 1, 3), src);
    }

    #[test]
    fn slice_without_trailing_newline_roundtrips() {
        let src = "a\nbb\nccc";
        let idx = LineIndex::new(src);
        assert_eq!(idx.line_count(), 3);
        assert_eq!(idx.slice(src, 1, 3), src);
    }

    #[test]
    fn slice_of_interior_range_has_trailing_newline() {
        let src = "a\nbb\nccc\n";
        let idx = LineIndex::new(src);
        assert_eq!(idx.slice(src, 1, 2), "a\nbb\n");
    }
}
