//! The output builder (§4.7): a stateful byte-append buffer that assembles
//! merged output by splicing original source bytes rather than regenerating
//! Markdown.

use crate::analysis::FileAnalysis;
use crate::statement::{CanonicalType, Statement};
use crate::tables;

pub struct OutputBuilder {
    buffer: String,
    prev_type: Option<CanonicalType>,
    prev_was_gap: bool,
    auto_space: bool,
}

impl OutputBuilder {
    pub fn new(auto_space: bool) -> Self {
        OutputBuilder {
            buffer: String::new(),
            prev_type: None,
            prev_was_gap: false,
            auto_space,
        }
    }

    /// Appends literal bytes with no spacing logic.
    pub fn add_raw(&mut self, text: &str) {
        self.buffer.push_str(text);
    }

    /// Appends `count` newlines (minimum 1).
    pub fn add_gap_line(&mut self, count: usize) {
        for _ in 0..count.max(1) {
            self.buffer.push('\n');
        }
        self.prev_was_gap = true;
    }

    /// The principal operation: emits a statement's source text, applying
    /// the structural-tables spacing rule between consecutive non-gap
    /// statements.
    pub fn add_node_source(&mut self, stmt: &Statement, analysis: &FileAnalysis) {
        let this_type = stmt.merge_type();
        let this_is_gap = matches!(stmt, Statement::Gap(_));
        self.apply_spacing(&this_type, this_is_gap);

        match stmt {
            Statement::LinkDefinition(l) => {
                self.buffer.push('[');
                self.buffer.push_str(&l.label);
                self.buffer.push_str("]: ");
                self.buffer.push_str(&l.url);
                if let Some(title) = &l.title {
                    self.buffer.push_str(" \"");
                    self.buffer.push_str(title);
                    self.buffer.push('"');
                }
                self.buffer.push('\n');
            }
            Statement::Gap(_) => self.buffer.push('\n'),
            Statement::Freeze(f) => self.buffer.push_str(&f.content),
            Statement::Parser(p) => {
                let text = analysis.source_range(p.node.start_line, p.node.end_line);
                self.buffer.push_str(text);
            }
        }

        self.prev_type = Some(this_type);
        self.prev_was_gap = this_is_gap;
    }

    /// Appends already-rendered text (e.g. the output of an inner code-block
    /// merger) under the same spacing rule `add_node_source` applies, tagging
    /// it with `ty` for the next transition's lookup.
    pub fn add_raw_typed(&mut self, text: &str, ty: CanonicalType) {
        self.apply_spacing(&ty, false);
        self.buffer.push_str(text);
        self.prev_type = Some(ty);
        self.prev_was_gap = false;
    }

    fn apply_spacing(&mut self, this_type: &CanonicalType, this_is_gap: bool) {
        if self.auto_space && !self.prev_was_gap && !this_is_gap {
            if let Some(prev_type) = &self.prev_type {
                if tables::needs_blank_between(prev_type, this_type) && !self.buffer.ends_with("\n\n") {
                    self.buffer.push('\n');
                }
            }
        }
    }

    pub fn as_str(&self) -> &str {
        &self.buffer
    }

    pub fn into_string(self) -> String {
        self.buffer
    }
}
