use std::fmt;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// The tree is absent or could not be built; poll and retry
    #[error("content not ready: {0}")]
    NotReady(NotReadyReason),

    /// A handle or an evaluation refers to a superseded tree generation
    #[error("stale tree generation: expected {expected}, found {found}")]
    StaleGeneration { expected: u64, found: u64 },

    #[error("lookup failed: {0}")]
    LookupFailure(String),

    #[error("malformed criteria in rule \"{rule}\": {reason}")]
    MalformedCriteria { rule: String, reason: String },

    #[error("malformed path expression {path:?} at {position}: {reason}")]
    MalformedPath {
        path: String,
        position: usize,
        reason: String,
    },

    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),

    #[error("shared state lock poisoned")]
    Poisoned,

    #[error("failed to spawn worker: {0}")]
    Spawn(#[from] std::io::Error),
}

impl Error {
    #[must_use]
    pub fn malformed_criteria(rule: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedCriteria {
            rule: rule.into(),
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn malformed_path(path: &str, position: usize, reason: impl Into<String>) -> Self {
        Self::MalformedPath {
            path: path.to_string(),
            position,
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn lookup(what: impl fmt::Display) -> Self {
        Self::LookupFailure(what.to_string())
    }

    /// Errors the caller should answer by requesting a fresh rebuild
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::StaleGeneration { .. } => true,
            Self::NotReady(reason) => reason.is_retryable(),
            _ => false,
        }
    }
}

/// Why a tree could not be produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotReadyReason {
    /// The host has no stream or no size to offer
    Absent,
    Malformed { position: usize, message: String },
    /// The stream parsed to zero characters
    Empty,
    /// The host content changed while it was being parsed
    SizeChanged { before: u32, after: u32 },
    /// A newer change notification superseded this build
    Cancelled,
}

impl NotReadyReason {
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::SizeChanged { .. } | Self::Cancelled)
    }
}

impl fmt::Display for NotReadyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Absent => f.write_str("no content available"),
            Self::Malformed { position, message } => {
                write!(f, "malformed stream: {message} at byte {position}")
            }
            Self::Empty => f.write_str("empty content"),
            Self::SizeChanged { before, after } => {
                write!(f, "content size changed during parse ({before} -> {after})")
            }
            Self::Cancelled => f.write_str("build superseded by a newer change"),
        }
    }
}

impl From<NotReadyReason> for Error {
    fn from(reason: NotReadyReason) -> Self {
        Self::NotReady(reason)
    }
}
