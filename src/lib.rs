//! A structural Markdown merger: reconciles a *template* document with a
//! *destination* document by block structure, preserving destination
//! customizations while applying template updates. See `Merger` for the
//! primary entry point.

pub mod align;
pub mod analysis;
pub mod backend;
pub mod builder;
pub mod cleanse;
pub mod error;
pub mod lineindex;
pub mod linkparse;
pub mod merger;
pub mod normalize;
pub mod partial;
pub mod problems;
pub mod rehydrate;
pub mod resolve;
pub mod signature;
pub mod statement;
pub mod tables;
pub mod whitespace;

pub use analysis::FileAnalysis;
pub use backend::{Backend, BackendKind};
pub use error::{BackendError, MergeError};
pub use merger::{MergeOptions, MergeResult, Merger};
pub use partial::{AnchorKind, AnchorSpec, PartialMergeOptions, PartialMerger, WhenMissing};
pub use problems::{Problem, Severity};
pub use resolve::{Preference, Side};
pub use statement::{CanonicalType, Statement};
