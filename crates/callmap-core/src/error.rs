//! Error and diagnostic types.
//!
//! Per-file failures and unresolved calls are values collected into
//! [`Diagnostics`]; only run-level problems surface as [`CallmapError`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CallmapError>;

/// Run-level failures.
#[derive(Error, Debug)]
pub enum CallmapError {
    #[error("Invalid root directory: {0}")]
    InvalidRoot(String),

    #[error("Thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Why a single file was skipped.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("syntax error in {path} at {line}:{column}")]
    Parse {
        path: String,
        line: usize,
        column: usize,
    },

    #[error("no parser for {path}: {message}")]
    Language { path: String, message: String },

    #[error("skipped {path}: run cancelled")]
    Cancelled { path: String },
}

impl SourceError {
    pub fn path(&self) -> &str {
        match self {
            Self::Read { path, .. }
            | Self::Parse { path, .. }
            | Self::Language { path, .. }
            | Self::Cancelled { path } => path,
        }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Read { .. } => FailureKind::Read,
            Self::Parse { .. } => FailureKind::Parse,
            Self::Language { .. } => FailureKind::Language,
            Self::Cancelled { .. } => FailureKind::Cancelled,
        }
    }
}

/// Failure returned by the code explanation collaborator.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("explanation service unavailable: {0}")]
    Unavailable(String),

    #[error("explanation request rejected: {0}")]
    Rejected(String),
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    Read,
    Parse,
    Language,
    Cancelled,
}

/// A file that did not make it into the graph.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileFailure {
    pub path: String,
    pub kind: FailureKind,
    pub message: String,
}

impl From<&SourceError> for FileFailure {
    fn from(err: &SourceError) -> Self {
        Self {
            path: err.path().to_string(),
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum UnresolvedReason {
    /// Name of a language builtin with no user definition.
    Builtin,
    UnknownName,
}

/// A call site whose callee matched no known function.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UnresolvedCall {
    pub caller_key: String,
    pub callee_name: String,
    pub line: usize,
    pub reason: UnresolvedReason,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateScope {
    SameFile,
    CrossFile,
}

/// Several definitions share a short name. Informational only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DuplicateDefinition {
    pub short_name: String,
    pub scope: DuplicateScope,
    /// `file:line` locations, sorted.
    pub locations: Vec<String>,
}

/// Everything a run reports without failing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Diagnostics {
    #[serde(default)]
    pub file_failures: Vec<FileFailure>,
    #[serde(default)]
    pub unresolved_calls: Vec<UnresolvedCall>,
    #[serde(default)]
    pub duplicate_definitions: Vec<DuplicateDefinition>,
}

impl Diagnostics {
    pub fn is_clean(&self) -> bool {
        self.file_failures.is_empty()
            && self.unresolved_calls.is_empty()
            && self.duplicate_definitions.is_empty()
    }
}
