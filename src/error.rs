// src/error.rs

use std::path::PathBuf;
use thiserror::Error;

/// Core error types for Metapurge
#[derive(Error, Debug)]
pub enum Error {
    /// No history line mentions the package at all
    #[error("No package manager history mentions '{package}' (searched {path})")]
    NotFound { package: String, path: String },

    /// Lines mention the package but none of them is an installation event
    #[error(
        "Found {candidates} history line(s) mentioning '{package}', but none records its installation"
    )]
    AmbiguousLog { package: String, candidates: usize },

    /// Reverse-dependency query failed for a single package
    #[error("Reverse dependency lookup failed for '{package}': {reason}")]
    OracleLookup { package: String, reason: String },

    /// Too many per-package lookups failed in one run
    #[error(
        "{count} reverse dependency lookups failed; the package database has likely changed since installation"
    )]
    TooManyLookupFailures { count: usize },

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// I/O error tied to a specific file
    #[error("Failed to read {}: {source}", .path.display())]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Invalid glob pattern for history files
    #[error("Invalid history path pattern: {0}")]
    Glob(#[from] glob::PatternError),

    /// Configuration file problem
    #[error("Configuration error: {0}")]
    Config(String),

    /// External tool exited unsuccessfully
    #[error("Command '{command}' failed: {reason}")]
    CommandFailed { command: String, reason: String },

    /// Purge executor failure
    #[error("Purge failed: {0}")]
    Purge(String),
}

/// Result type alias using Metapurge's Error type
pub type Result<T> = std::result::Result<T, Error>;
