//! Error types for provisioning operations.
//!
//! Errors are categorized so the engine can decide, per failure, whether to
//! retry, to stop, or to treat the failure as a benign collision with a
//! concurrent deployment.

use std::path::PathBuf;
use thiserror::Error;

/// Categories of provisioning errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Malformed template, unresolved reference or dependency cycle
    Template,
    /// Store lookup failed in a way that may succeed later
    Transient,
    /// The caller's credentials do not permit the operation
    NotAuthorized,
    /// A create collided with a resource that already exists
    AlreadyExists,
    /// Other/unknown errors
    Other,
}

impl ErrorCategory {
    /// Whether this error category is typically transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient)
    }

    /// Whether this error can be safely ignored (the resource is already there).
    pub fn is_ignorable(&self) -> bool {
        matches!(self, Self::AlreadyExists)
    }

    /// Get a user-friendly description of this error category.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Template => "Invalid template",
            Self::Transient => "Store temporarily unavailable",
            Self::NotAuthorized => "Not authorized",
            Self::AlreadyExists => "Already exists",
            Self::Other => "Unexpected error",
        }
    }

    /// Get actionable advice for resolving this error category.
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Template => "Fix the template and run again; nothing was changed",
            Self::Transient => "Check connectivity to the store and run again",
            Self::NotAuthorized => "Check the credentials used for the store",
            Self::AlreadyExists => "No action needed - resource is already present",
            Self::Other => "Check the error details for more information",
        }
    }
}

/// Errors that can occur while loading or applying a template.
#[derive(Debug, Error)]
pub enum Error {
    /// Template could not be parsed or references something undeclared
    #[error("template error: {message}")]
    Parse {
        /// What is wrong with the template
        message: String,
    },

    /// Dependency graph contains a cycle
    #[error("dependency cycle: {}", .path.join(" -> "))]
    Cycle {
        /// Resource identifiers along the cycle, first repeated at the end
        path: Vec<String>,
    },

    /// Existence lookup failed (transient)
    #[error("lookup failed for {id}: {message}")]
    Lookup {
        /// Resource being looked up
        id: String,
        /// Store-provided failure detail
        message: String,
    },

    /// Store refused the operation
    #[error("not authorized for {id}: {message}")]
    NotAuthorized {
        /// Resource the operation targeted
        id: String,
        /// Store-provided failure detail
        message: String,
    },

    /// Create targeted a resource that already exists
    #[error("resource already exists: {id}")]
    AlreadyExists {
        /// Resource that already exists
        id: String,
    },

    /// Store rejected a write for another reason
    #[error("store rejected {id}: {message}")]
    Store {
        /// Resource the write targeted
        id: String,
        /// Store-provided failure detail
        message: String,
    },

    /// Template file not found
    #[error("template not found: {}", .0.display())]
    TemplateNotFound(PathBuf),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Shorthand for a template parse error.
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
        }
    }

    /// Get the error category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Parse { .. } | Self::Cycle { .. } | Self::TemplateNotFound(_) => {
                ErrorCategory::Template
            }
            Self::Lookup { .. } => ErrorCategory::Transient,
            Self::NotAuthorized { .. } => ErrorCategory::NotAuthorized,
            Self::AlreadyExists { .. } => ErrorCategory::AlreadyExists,
            _ => ErrorCategory::Other,
        }
    }

    /// Whether this error is typically transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }

    /// Whether this error can be safely ignored.
    pub fn is_ignorable(&self) -> bool {
        self.category().is_ignorable()
    }
}

/// Result type for provisioning operations.
pub type Result<T> = std::result::Result<T, Error>;
