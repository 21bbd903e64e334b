//! Unified error handling for the unarxiv crate
//!
//! This module consolidates the per-domain errors into a single `Error` enum
//! and classifies them so the pipeline can tell item-level failures from
//! pipeline-fatal ones.
//!
//! # Architecture
//!
//! - [`UnarxivErrorTrait`] - Common interface implemented by all error types
//! - [`ErrorCategory`] - Classification of errors for handling strategies
//! - [`Error`] - Unified error enum wrapping all domain-specific errors

use std::io;
use thiserror::Error;

pub use crate::utils::error::{FetchError, ParseError, StoreError};

/// Common trait for all unarxiv error types
pub trait UnarxivErrorTrait: std::error::Error {
    /// Check if this error is recoverable (the affected item can be skipped
    /// and the crawl can go on)
    fn is_recoverable(&self) -> bool;

    /// Get the error category for handling strategies
    fn category(&self) -> ErrorCategory;
}

/// Classification of errors for handling strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Network-related errors (HTTP, timeout)
    Network,
    /// Parsing and data extraction errors
    Parsing,
    /// Storage errors (frontier, article store)
    Storage,
    /// Configuration and validation errors
    Config,
    /// Other/unknown errors
    Other,
}

impl ErrorCategory {
    /// Short label used in logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Parsing => "parsing",
            Self::Storage => "storage",
            Self::Config => "config",
            Self::Other => "other",
        }
    }
}

impl UnarxivErrorTrait for FetchError {
    fn is_recoverable(&self) -> bool {
        !matches!(self, Self::InvalidUrl(_))
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::Network
    }
}

impl UnarxivErrorTrait for ParseError {
    fn is_recoverable(&self) -> bool {
        true
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::Parsing
    }
}

impl UnarxivErrorTrait for StoreError {
    fn is_recoverable(&self) -> bool {
        false
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::Storage
    }
}

/// Unified error type for the unarxiv crate
#[derive(Error, Debug)]
pub enum Error {
    /// No crawler configuration row was found
    #[error("no configurations found")]
    NoConfigs,

    /// Fetch-specific errors
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Parse-specific errors
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// Frontier or article store errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Metric registration errors
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Configuration errors
    #[error("Config error: {0}")]
    Config(String),

    /// The crawl was cancelled before reaching its goal
    #[error("crawl cancelled before completion")]
    Cancelled,

    /// Generic error with context
    #[error("{context}")]
    Other {
        context: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl UnarxivErrorTrait for Error {
    fn is_recoverable(&self) -> bool {
        match self {
            Self::Fetch(e) => e.is_recoverable(),
            Self::Parse(e) => e.is_recoverable(),
            Self::Store(e) => e.is_recoverable(),
            Self::Io(_) => true,
            Self::NoConfigs
            | Self::Metrics(_)
            | Self::Config(_)
            | Self::Cancelled
            | Self::Other { .. } => false,
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Fetch(e) => e.category(),
            Self::Parse(e) => e.category(),
            Self::Store(e) => e.category(),
            Self::Io(_) => ErrorCategory::Storage,
            Self::NoConfigs | Self::Config(_) => ErrorCategory::Config,
            Self::Metrics(_) | Self::Cancelled | Self::Other { .. } => ErrorCategory::Other,
        }
    }
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a generic error with context
    pub fn other(context: impl Into<String>) -> Self {
        Self::Other {
            context: context.into(),
            source: None,
        }
    }

    /// Create a generic error with context and source
    pub fn with_source(
        context: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Other {
            context: context.into(),
            source: Some(Box::new(source)),
        }
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Self::Store(StoreError::Database(err))
    }
}

/// Result type alias using the unified Error type
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_category() {
        let fetch_err = Error::Fetch(FetchError::Timeout);
        assert_eq!(fetch_err.category(), ErrorCategory::Network);

        let parse_err = Error::Parse(ParseError::EmptyTitle);
        assert_eq!(parse_err.category(), ErrorCategory::Parsing);

        let store_err = Error::Store(StoreError::LockPoisoned);
        assert_eq!(store_err.category(), ErrorCategory::Storage);
    }

    #[test]
    fn test_is_recoverable() {
        assert!(Error::Fetch(FetchError::Timeout).is_recoverable());
        assert!(Error::Parse(ParseError::MissingHref).is_recoverable());
        assert!(!Error::Store(StoreError::LockPoisoned).is_recoverable());
        assert!(!Error::NoConfigs.is_recoverable());
    }

    #[test]
    fn test_rusqlite_conversion() {
        let err: Error = rusqlite::Error::InvalidQuery.into();
        assert!(matches!(err, Error::Store(StoreError::Database(_))));
        assert_eq!(err.category(), ErrorCategory::Storage);
    }

    #[test]
    fn test_no_configs_message() {
        assert_eq!(Error::NoConfigs.to_string(), "no configurations found");
        assert_eq!(Error::NoConfigs.category(), ErrorCategory::Config);
    }

    #[test]
    fn test_other_error() {
        let err = Error::other("Something went wrong");
        assert_eq!(err.category(), ErrorCategory::Other);
        assert_eq!(err.to_string(), "Something went wrong");
    }
}
