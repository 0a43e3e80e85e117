//! Static structural tables (§4.2 of SPEC_FULL.md).
//!
//! These are the only source of automatic blank-line insertion in the
//! builder. Kept as plain `match` arms rather than lazily-built hash sets —
//! the set is small, closed, and known at compile time.

use crate::statement::CanonicalType;

/// Types that require a blank line to precede them when adjacent to a
/// different preceding type.
pub const NEEDS_BLANK_BEFORE: &[CanonicalType] = &[
    CanonicalType::Heading,
    CanonicalType::Table,
    CanonicalType::CodeBlock,
    CanonicalType::ThematicBreak,
    CanonicalType::List,
    CanonicalType::BlockQuote,
];

/// `NEEDS_BLANK_BEFORE` plus link definitions, which want a blank line after
/// themselves when followed by something other than another link definition.
pub const NEEDS_BLANK_AFTER_EXTRA: &[CanonicalType] = &[CanonicalType::LinkDefinition];

/// Types that may run contiguously (no blank line required) when identical
/// on both sides of the boundary.
pub const CONTIGUOUS_TYPES: &[CanonicalType] = &[CanonicalType::LinkDefinition];

fn in_needs_blank_before(t: &CanonicalType) -> bool {
    NEEDS_BLANK_BEFORE.contains(t)
}

fn in_needs_blank_after(t: &CanonicalType) -> bool {
    in_needs_blank_before(t) || NEEDS_BLANK_AFTER_EXTRA.contains(t)
}

fn is_contiguous(t: &CanonicalType) -> bool {
    CONTIGUOUS_TYPES.contains(t)
}

/// Whether a blank line is required between two adjacent emitted statements
/// of the given canonical types.
///
/// `false` only when both sides share a contiguous type (e.g. two link
/// definitions in a row); `true` whenever the preceding type wants a blank
/// line after itself or the following type wants one before itself.
pub fn needs_blank_between(prev: &CanonicalType, next: &CanonicalType) -> bool {
    if prev == next && is_contiguous(prev) {
        return false;
    }
    in_needs_blank_after(prev) || in_needs_blank_before(next)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contiguous_link_definitions_need_no_blank() {
        assert!(!needs_blank_between(
            &CanonicalType::LinkDefinition,
            &CanonicalType::LinkDefinition
        ));
    }

    #[test]
    fn heading_always_wants_blank_before() {
        assert!(needs_blank_between(
            &CanonicalType::Paragraph,
            &CanonicalType::Heading
        ));
    }

    #[test]
    fn two_paragraphs_need_no_forced_blank() {
        assert!(!needs_blank_between(
            &CanonicalType::Paragraph,
            &CanonicalType::Paragraph
        ));
    }

    #[test]
    fn link_definition_wants_blank_after_before_paragraph() {
        assert!(needs_blank_between(
            &CanonicalType::LinkDefinition,
            &CanonicalType::Paragraph
        ));
    }
}
