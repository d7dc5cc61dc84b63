//! Typed errors surfaced by the package manager.
//!
//! Everything is returned through `anyhow::Result`; these types exist so that
//! callers can `downcast_ref` and decide how to report a failure.

use std::fmt;

/// Misconfiguration that no retry can fix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    /// A package kind that has no entry in the registry.
    UnknownKind(String),
    /// A `switch` was requested for a package that is not installed.
    NotInstalled(String),
    /// A package was set up while its version was still the `latest` sentinel.
    UnresolvedVersion(String),
}

impl fmt::Display for ConfigurationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigurationError::UnknownKind(kind) => {
                write!(f, "Unsupported package kind: {}", kind)
            }
            ConfigurationError::NotInstalled(name) => {
                write!(f, "Package is not installed: {}", name)
            }
            ConfigurationError::UnresolvedVersion(name) => {
                write!(f, "Version of {} is unknown, resolve 'latest' first", name)
            }
        }
    }
}

impl std::error::Error for ConfigurationError {}

/// A version expression that does not follow the tag grammar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidVersionError {
    message: String,
}

impl InvalidVersionError {
    pub(crate) fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for InvalidVersionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for InvalidVersionError {}

/// Failure reported by a [`Provider`](crate::provider::Provider).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetrievalError {
    /// Repository, ref, file or asset does not exist.
    NotFound(String),
    /// The source answered but had nothing in it.
    Empty(String),
    /// Connection, status or decoding failure.
    Transport(String),
}

impl fmt::Display for RetrievalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetrievalError::NotFound(what) => write!(f, "Not found: {}", what),
            RetrievalError::Empty(what) => write!(f, "Empty content: {}", what),
            RetrievalError::Transport(msg) => write!(f, "Retrieval failed: {}", msg),
        }
    }
}

impl std::error::Error for RetrievalError {}

/// First job failure of an `apply` run.
#[derive(Debug)]
pub struct ApplyError {
    pub operation: String,
    pub full_name: String,
    pub source: anyhow::Error,
}

impl fmt::Display for ApplyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Failed to {} {}: {}",
            self.operation, self.full_name, self.source
        )
    }
}

impl std::error::Error for ApplyError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.source.as_ref())
    }
}
