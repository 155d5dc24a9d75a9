//! Resource loading utilities
//!
//! This module reads topic and map files from disk, enforcing the size
//! limit and separating a UTF-8 byte order mark from the content so it can
//! be restored verbatim when a file is written back.

use crate::error::{Error, Result};
use crate::limits::Limits;
use std::fs;
use std::path::Path;

/// UTF-8 byte order mark
pub const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Raw file content with its BOM split off
#[derive(Debug, Clone)]
pub struct Source {
    /// Content without the BOM
    pub bytes: Vec<u8>,
    /// Whether the file started with a UTF-8 BOM
    pub bom: bool,
}

impl Source {
    /// Split a BOM off raw bytes
    pub fn from_bytes(mut bytes: Vec<u8>) -> Self {
        let bom = bytes.starts_with(UTF8_BOM);
        if bom {
            bytes.drain(..UTF8_BOM.len());
        }
        Self { bytes, bom }
    }

    /// Content as text, if it is valid UTF-8
    pub fn text(&self) -> Result<&str> {
        std::str::from_utf8(&self.bytes)
            .map_err(|e| Error::Xml(format!("content is not valid UTF-8: {}", e)))
    }

    /// Re-attach the BOM to replacement content
    pub fn restore(&self, content: Vec<u8>) -> Vec<u8> {
        if self.bom {
            let mut out = Vec::with_capacity(UTF8_BOM.len() + content.len());
            out.extend_from_slice(UTF8_BOM);
            out.extend(content);
            out
        } else {
            content
        }
    }
}

/// File loader for topics and maps
#[derive(Debug, Clone)]
pub struct Loader {
    /// Resource limits
    limits: Limits,
}

impl Loader {
    /// Create a new loader with default settings
    pub fn new() -> Self {
        Self {
            limits: Limits::default(),
        }
    }

    /// Set the limits
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Load a file as bytes
    pub fn load(&self, path: &Path) -> Result<Source> {
        let content = fs::read(path).map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!("failed to read '{}': {}", path.display(), e),
            ))
        })?;

        // Check size limits
        self.limits.check_file_size(content.len())?;

        Ok(Source::from_bytes(content))
    }

    /// Load a file as text
    pub fn load_text(&self, path: &Path) -> Result<String> {
        let source = self.load(path)?;
        source.text().map(|s| s.to_string())
    }
}

impl Default for Loader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "<topic id=\"a\"/>").unwrap();

        let loader = Loader::new();
        let source = loader.load(file.path()).unwrap();
        assert!(!source.bom);
        assert_eq!(source.text().unwrap(), "<topic id=\"a\"/>");
    }

    #[test]
    fn test_bom_is_split_and_restored() {
        let mut raw = UTF8_BOM.to_vec();
        raw.extend_from_slice(b"<a/>");
        let source = Source::from_bytes(raw.clone());
        assert!(source.bom);
        assert_eq!(source.bytes, b"<a/>");
        assert_eq!(source.restore(b"<a/>".to_vec()), raw);
    }

    #[test]
    fn test_load_missing_file() {
        let loader = Loader::new();
        let err = loader.load(Path::new("/nonexistent/topic.xml")).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_size_limit() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "<topic>{}</topic>", "x".repeat(64)).unwrap();

        let limits = Limits {
            max_file_size: 16,
            ..Limits::default()
        };
        let loader = Loader::new().with_limits(limits);
        let err = loader.load(file.path()).unwrap_err();
        assert!(matches!(err, Error::LimitExceeded(_)));
    }

    #[test]
    fn test_invalid_utf8_text() {
        let source = Source::from_bytes(vec![0x3c, 0xff, 0x3e]);
        assert!(source.text().is_err());
    }
}
