//! Error types for module configuration, registries, and the rating store.
//!
//! Configuration and integrity failures are typed so that callers can tell
//! "fix the module setup" apart from "the rating directory is inconsistent"
//! without string matching.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by [`OrdinalRegistry`](crate::registry::OrdinalRegistry)
/// mutations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// Ordinal indices start at 1.
    #[error("index {index} is out of range (valid: 1..={max})")]
    IndexOutOfRange { index: usize, max: usize },

    /// Removing the entry would leave a registry that must keep one entry.
    #[error("cannot remove the last remaining entry")]
    WouldEmpty,
}

/// Configuration errors: the action is blocked and nothing is changed.
#[derive(Debug, Error)]
pub enum ModuleError {
    /// Module names must be identifiers.
    #[error("invalid module name '{0}': must match ^[a-zA-Z_][a-zA-Z0-9_]*$")]
    InvalidName(String),

    /// Another module already uses this name.
    #[error("module '{0}' already exists")]
    DuplicateName(String),

    /// No module with this name is registered.
    #[error("module not found: {0}")]
    NotFound(String),

    /// Ratings are partitioned per rater, so one must be set.
    #[error("module '{0}' has no rater set")]
    MissingRater(String),

    /// A score entry is missing its label or domain.
    #[error("score {key} of module '{module}' is incomplete (label and domain required)")]
    IncompleteScore { module: String, key: usize },

    /// A tag entry is missing its label.
    #[error("tag {key} of module '{module}' is incomplete (label required)")]
    IncompleteTag { module: String, key: usize },

    /// The raw score domain could not be parsed.
    #[error("invalid score domain '{raw}': {reason}")]
    InvalidDomain { raw: String, reason: String },

    /// A score value is not part of the score's domain.
    #[error("value '{value}' is not in the domain of score {key} ({domain})")]
    ValueOutOfDomain {
        key: usize,
        value: String,
        domain: String,
    },

    /// A module export file failed schema validation.
    #[error("invalid module file: {0}")]
    InvalidModuleFile(String),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Errors from the rating file store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The `._.` separator is reserved for the filename contract.
    #[error("'{0}' contains the reserved separator '._.'")]
    ReservedSeparator(String),

    /// Names become path components, so they cannot hold `/` or `\`.
    #[error("'{0}' contains a path separator")]
    PathSeparator(String),

    /// More than one file matches a unique `(module, subject, rater)` prefix.
    #[error("{count} rating files match prefix '{prefix}' in {}", dir.display())]
    Ambiguous {
        prefix: String,
        count: usize,
        dir: PathBuf,
    },

    /// The record has no subject id, so it has no identity on disk.
    #[error("rating record for module '{0}' has no subject id")]
    MissingSubject(String),

    /// Ratings are partitioned per rater; a record without one has no home.
    #[error("rating record for module '{0}' has no rater")]
    MissingRater(String),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed rating file {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors from an interactive rating session.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The subject list handed to the session is empty.
    #[error("no subjects to rate")]
    NoSubjects,

    /// The requested subject is not in the session's subject list.
    #[error("subject '{0}' is not in the subject list")]
    UnknownSubject(String),

    #[error(transparent)]
    Module(#[from] ModuleError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }

    /// Returns `true` for integrity failures that must not be auto-repaired.
    pub fn is_integrity(&self) -> bool {
        matches!(self, StoreError::Ambiguous { .. })
    }
}
