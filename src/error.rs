//! Error types for dita-tidy
//!
//! This module defines all error types used throughout the library.
//! Operations that face the user (deduplication runs, TOC validation,
//! synthesis) convert these into counts and short messages at their
//! boundary; everything below that boundary propagates them with `?`.

use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type alias using the dita-tidy Error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for dita-tidy operations
#[derive(Error, Debug)]
pub enum Error {
    /// XML document could not be parsed
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Low-level XML tokenizer error
    #[error("XML error: {0}")]
    Xml(String),

    /// URL parsing error while resolving a reference
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// A reference could not be resolved to a file path
    #[error("reference error: {0}")]
    Reference(String),

    /// The escrow area or its log could not be written
    #[error("escrow error: {0}")]
    Escrow(String),

    /// Limit exceeded error
    #[error("limit exceeded: {0}")]
    LimitExceeded(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

/// XML parsing error with file context
#[derive(Debug, Clone)]
pub struct ParseError {
    /// Error message
    pub message: String,
    /// File that failed to parse
    pub path: Option<PathBuf>,
    /// Byte offset in the file where parsing stopped
    pub position: Option<usize>,
}

impl ParseError {
    /// Create a new parse error
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            path: None,
            position: None,
        }
    }

    /// Set the file path
    pub fn with_path(mut self, path: impl AsRef<Path>) -> Self {
        self.path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Set the byte position
    pub fn with_position(mut self, position: usize) -> Self {
        self.position = Some(position);
        self
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;

        if let Some(ref path) = self.path {
            write!(f, "\n\nPath: {}", path.display())?;
        }

        if let Some(position) = self.position {
            write!(f, "\n\nPosition: {}", position)?;
        }

        Ok(())
    }
}

impl std::error::Error for ParseError {}

impl From<roxmltree::Error> for Error {
    fn from(err: roxmltree::Error) -> Self {
        Error::Parse(ParseError::new(err.to_string()))
    }
}

impl From<quick_xml::Error> for Error {
    fn from(err: quick_xml::Error) -> Self {
        Error::Xml(err.to_string())
    }
}
