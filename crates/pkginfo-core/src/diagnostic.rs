//! Faults raised while loading a package registry document
//!
//! None of these abort a load. They are logged when raised and handed back
//! to the caller alongside whatever could be aggregated.

use serde::Serialize;
use thiserror::Error;

use crate::identity::Uid;

/// A single record could not be read and was skipped
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
pub enum NodeError {
    #[error("<{tag}> is missing required attribute `{attr}`")]
    MissingAttribute {
        tag: &'static str,
        attr: &'static str,
    },
    #[error("<{tag}> attribute `{attr}` is not a valid number: {value:?}")]
    InvalidNumber {
        tag: &'static str,
        attr: &'static str,
        value: String,
    },
}

/// How serious a diagnostic is
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    #[error("Cannot find package settings section")]
    MissingSection,
    #[error("Cannot parse package settings section: {reason}")]
    UnparseableSection { reason: String },
    #[error("Skipped record #{position}: {error}")]
    SkippedNode { position: usize, error: NodeError },
    #[error("Could not find package for updated-package item: {name}")]
    DanglingUpdate { name: String },
    #[error("Package {name} declared again, replacing record owned by {previous_owner}")]
    DuplicatePackage { name: String, previous_owner: Uid },
}

impl Diagnostic {
    /// Report verbosity level; lower is more important
    pub fn level(&self) -> u8 {
        match self {
            Diagnostic::MissingSection => 3,
            Diagnostic::UnparseableSection { .. } => 4,
            _ => 5,
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Diagnostic::MissingSection | Diagnostic::UnparseableSection { .. } => Severity::Error,
            _ => Severity::Warning,
        }
    }

    /// True for faults that prevented aggregation from running at all
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Diagnostic::MissingSection | Diagnostic::UnparseableSection { .. }
        )
    }
}
