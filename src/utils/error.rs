//! Error types for the unarxiv crawler
//!
//! This module defines the per-domain error types used by the pipeline stages.

use thiserror::Error;

/// Errors that can occur while fetching a single URL
#[derive(Error, Debug)]
pub enum FetchError {
    /// HTTP request error
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Request timeout
    #[error("Request timeout")]
    Timeout,

    /// Response body could not be read
    #[error("Failed to read response body: {0}")]
    Body(String),

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

/// Errors that can occur while parsing a fetched page
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// An anchor was selected but carried no href attribute
    #[error("expected attribute href but it wasn't found")]
    MissingHref,

    /// The identifier following `abs/` is shorter than the minimum length
    #[error("too short article id: {0:?}")]
    TooShortArticleId(String),

    /// The title element was missing or empty
    #[error("parsed empty title")]
    EmptyTitle,

    /// The authors element was missing or empty
    #[error("parsed empty authors")]
    EmptyAuthors,
}

/// Errors raised by the persistent stores
#[derive(Error, Debug)]
pub enum StoreError {
    /// SQLite failure
    #[error("SQLite error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Filesystem error while preparing the database file
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A connection mutex was poisoned by a panicking holder
    #[error("Store lock poisoned")]
    LockPoisoned,

    /// A stored row could not be mapped back into a model
    #[error("Corrupt row in {table}: {reason}")]
    Corrupt { table: &'static str, reason: String },
}
