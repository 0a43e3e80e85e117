//! The conflict resolver (§4.6): decides which side of a matched pair wins.

use std::collections::HashMap;

use crate::align::AlignEntry;
use crate::analysis::FileAnalysis;
use crate::statement::{CanonicalType, Statement};

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum Side {
    Template,
    Destination,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum Decision {
    Identical,
    Template,
    Destination,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub source: Side,
    pub decision: Decision,
}

/// Which side wins a non-identical matched pair, either globally or per
/// canonical type with a fallback `default`.
#[derive(Debug, Clone)]
pub enum Preference {
    Single(Side),
    ByType {
        map: HashMap<CanonicalType, Side>,
        default: Side,
    },
}

impl Preference {
    pub fn side_for(&self, ty: &CanonicalType) -> Side {
        match self {
            Preference::Single(s) => *s,
            Preference::ByType { map, default } => map.get(ty).copied().unwrap_or(*default),
        }
    }
}

impl Default for Preference {
    fn default() -> Self {
        Preference::Single(Side::Destination)
    }
}

/// Resolves a single `match` entry. Panics if given a non-match entry —
/// callers only invoke this once the aligner has confirmed both sides are
/// present.
pub fn resolve(
    template: &FileAnalysis,
    dest: &FileAnalysis,
    entry: &AlignEntry,
    preference: &Preference,
) -> Resolution {
    let (Some(ti), Some(di)) = (entry.template_index, entry.dest_index) else {
        panic!("resolve() requires a match entry with both sides present");
    };
    let t_stmt = &template.statements()[ti];
    let d_stmt = &dest.statements()[di];

    if matches!(d_stmt, Statement::Freeze(_)) {
        return Resolution {
            source: Side::Destination,
            decision: Decision::Destination,
        };
    }

    let t_text = rendered_text(template, t_stmt);
    let d_text = rendered_text(dest, d_stmt);
    if t_text == d_text {
        return Resolution {
            source: Side::Destination,
            decision: Decision::Identical,
        };
    }

    let ty = t_stmt.merge_type();
    let side = preference.side_for(&ty);
    let decision = match side {
        Side::Template => Decision::Template,
        Side::Destination => Decision::Destination,
    };

    #[cfg(feature = "tracing")]
    tracing::debug!(merge_type = ty.as_str(), ?side, "conflict resolved");

    Resolution { source: side, decision }
}

fn rendered_text(analysis: &FileAnalysis, stmt: &Statement) -> String {
    match stmt {
        Statement::Parser(p) => analysis
            .source_range(p.node.start_line, p.node.end_line)
            .to_string(),
        Statement::Gap(g) => analysis.source_range(g.line_number, g.line_number).to_string(),
        Statement::LinkDefinition(l) => {
            analysis.source_range(l.line_number, l.line_number).to_string()
        }
        Statement::Freeze(f) => f.content.clone(),
    }
}
