//! Project configuration
//!
//! Names of the escrow area and audit log, which file extensions count as
//! topics and maps, and the heuristic limits.

use std::path::Path;

use crate::limits::Limits;

/// Default name of the escrow directory created inside a project
pub const DEFAULT_ESCROW_DIR: &str = "LegacyTextTuring";

/// Default name of the audit log inside the escrow directory
pub const DEFAULT_LOG_FILE: &str = "Log.txt";

/// Configuration shared by every operation on a project
#[derive(Debug, Clone)]
pub struct Config {
    /// Escrow directory name (created under the project root)
    pub escrow_dir_name: String,
    /// Audit log file name (created under the escrow directory)
    pub log_file_name: String,
    /// Extensions of topic files, without the dot, lower-case
    pub topic_extensions: Vec<String>,
    /// Extension of map files, without the dot, lower-case
    pub map_extension: String,
    /// Heuristic thresholds and size limits
    pub limits: Limits,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            escrow_dir_name: DEFAULT_ESCROW_DIR.to_string(),
            log_file_name: DEFAULT_LOG_FILE.to_string(),
            topic_extensions: vec!["xml".to_string(), "dita".to_string()],
            map_extension: "ditamap".to_string(),
            limits: Limits::default(),
        }
    }
}

impl Config {
    /// Create a configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the escrow directory name
    pub fn with_escrow_dir_name(mut self, name: impl Into<String>) -> Self {
        self.escrow_dir_name = name.into();
        self
    }

    /// Set the audit log file name
    pub fn with_log_file_name(mut self, name: impl Into<String>) -> Self {
        self.log_file_name = name.into();
        self
    }

    /// Set the heuristic limits
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Whether the path names a topic file
    pub fn is_topic_file(&self, path: &Path) -> bool {
        extension_of(path)
            .map(|ext| self.topic_extensions.iter().any(|t| *t == ext))
            .unwrap_or(false)
    }

    /// Whether the path names a map file
    pub fn is_map_file(&self, path: &Path) -> bool {
        extension_of(path)
            .map(|ext| ext == self.map_extension)
            .unwrap_or(false)
    }
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
}
