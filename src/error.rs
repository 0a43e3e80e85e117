//! Error taxonomy for the merger.
//!
//! Two public enums, matching the engine crate's `io::IoError` pattern of one
//! `thiserror` variant per failure mode: [`BackendError`] is raised by parser
//! adapters, [`MergeError`] is the fatal surface of the orchestrator. Every
//! other failure mode described by the spec (unmatched freeze markers, PEG
//! scan failures, titled links, duplicate definitions, excessive whitespace)
//! is recoverable and becomes a [`crate::problems::Problem`] instead of an error.

use std::fmt;

/// Raised by a backend adapter when the underlying parser rejects a source.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("failed to parse markdown: {0}")]
    Parse(String),
    #[error("unknown backend {0:?}")]
    UnknownBackend(String),
}

/// Fatal errors surfaced by [`crate::merger::Merger`] and
/// [`crate::partial::PartialMerger`].
#[derive(Debug, thiserror::Error)]
pub enum MergeError {
    #[error("template failed to parse: {0}")]
    TemplateParse(#[source] BackendError),
    #[error("destination failed to parse: {0}")]
    DestinationParse(#[source] BackendError),
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
}

/// Which document a [`BackendError`] should be attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Template,
    Destination,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Template => write!(f, "template"),
            Side::Destination => write!(f, "destination"),
        }
    }
}

impl MergeError {
    pub fn from_backend(side: Side, err: BackendError) -> Self {
        match side {
            Side::Template => MergeError::TemplateParse(err),
            Side::Destination => MergeError::DestinationParse(err),
        }
    }
}
