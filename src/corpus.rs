//! Corpus discovery
//!
//! A [`Corpus`] is the sorted list of topic and map files that one run over
//! a project directory works on. The escrow directory is never entered, so
//! backups are not mistaken for live topics.

use std::fs;
use std::path::{Path, PathBuf};

use log::debug;
use walkdir::{DirEntry, WalkDir};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::locations::absolutize;

/// Files taking part in a run
#[derive(Debug, Clone, Default)]
pub struct Corpus {
    /// Canonical project root
    pub root: PathBuf,
    /// Topic files (`.xml`, `.dita`) under the root, sorted by path
    pub topics: Vec<PathBuf>,
    /// Map files under the root or in its parent directory
    pub maps: Vec<PathBuf>,
}

impl Corpus {
    /// Walk a project directory
    pub fn scan(root: impl AsRef<Path>, config: &Config) -> Result<Self> {
        let root = absolutize(root.as_ref())?;
        if !root.is_dir() {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("'{}' is not a directory", root.display()),
            )));
        }

        let mut topics = Vec::new();
        let mut maps = Vec::new();
        for path in walk_files(&root, config) {
            if config.is_map_file(&path) {
                maps.push(path);
            } else if config.is_topic_file(&path) {
                topics.push(path);
            }
        }

        if let Some(parent) = root.parent() {
            for path in parent_maps(parent, config) {
                if !maps.contains(&path) {
                    maps.push(path);
                }
            }
        }

        debug!(
            "corpus {}: {} topics, {} maps",
            root.display(),
            topics.len(),
            maps.len()
        );

        Ok(Self { root, topics, maps })
    }

    /// Whether a path is one of the corpus topics
    pub fn contains_topic(&self, path: &Path) -> bool {
        self.topics.iter().any(|p| p == path)
    }

    /// Topics first, then maps
    pub fn files(&self) -> impl Iterator<Item = &PathBuf> {
        self.topics.iter().chain(self.maps.iter())
    }

    /// Total number of files
    pub fn len(&self) -> usize {
        self.topics.len() + self.maps.len()
    }

    /// Check if the corpus holds no files at all
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Every regular file under `root`, sorted, skipping the escrow directory
pub(crate) fn walk_files(root: &Path, config: &Config) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_escrow_dir(e, &config.escrow_dir_name))
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                debug!("skipping unreadable entry: {}", e);
                continue;
            }
        };
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    files
}

fn is_escrow_dir(entry: &DirEntry, escrow_dir_name: &str) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && entry.file_name().to_str() == Some(escrow_dir_name)
}

/// Map files directly inside `dir`, sorted by name
pub(crate) fn parent_maps(dir: &Path, config: &Config) -> Vec<PathBuf> {
    if dir
        .file_name()
        .and_then(|n| n.to_str())
        .map(|n| n == config.escrow_dir_name)
        .unwrap_or(false)
    {
        return Vec::new();
    }
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            debug!("cannot list {}: {}", dir.display(), e);
            return Vec::new();
        }
    };
    let mut maps: Vec<PathBuf> = entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.is_file() && config.is_map_file(p))
        .collect();
    maps.sort();
    maps
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "<topic/>").unwrap();
    }

    #[test]
    fn test_scan_sorted_and_escrow_pruned() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("project");
        touch(&root.join("b.xml"));
        touch(&root.join("a.xml"));
        touch(&root.join("Topics/c.dita"));
        touch(&root.join("LegacyTextTuring/a.xml"));
        touch(&root.join("notes.txt"));
        touch(&dir.path().join("book.ditamap"));

        let corpus = Corpus::scan(&root, &Config::default()).unwrap();
        let names: Vec<_> = corpus
            .topics
            .iter()
            .map(|p| p.strip_prefix(&corpus.root).unwrap().to_path_buf())
            .collect();
        assert_eq!(
            names,
            vec![
                PathBuf::from("Topics/c.dita"),
                PathBuf::from("a.xml"),
                PathBuf::from("b.xml")
            ]
        );
        assert_eq!(corpus.maps.len(), 1);
        assert!(corpus.maps[0].ends_with("book.ditamap"));
        assert_eq!(corpus.len(), 4);
    }

    #[test]
    fn test_custom_escrow_name() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("Backup/a.xml"));
        touch(&dir.path().join("LegacyTextTuring/a.xml"));

        let config = Config::new().with_escrow_dir_name("Backup");
        let corpus = Corpus::scan(dir.path(), &config).unwrap();
        assert_eq!(corpus.topics.len(), 1);
        assert!(corpus.topics[0].ends_with("LegacyTextTuring/a.xml"));
    }

    #[test]
    fn test_scan_missing_root() {
        let dir = TempDir::new().unwrap();
        let err = Corpus::scan(dir.path().join("missing"), &Config::default()).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
