//! Identifier index
//!
//! One pass over every topic in a [`Corpus`] collects two tables: top-level
//! ids (the root element's `id`) with the files declaring them, and nested
//! ids with the file and enclosing top-level id of every occurrence. Files
//! that fail to load or parse are skipped and only logged at debug level.

use std::fmt;
use std::path::{Path, PathBuf};

use indexmap::{IndexMap, IndexSet};
use log::{debug, warn};

use crate::corpus::Corpus;
use crate::documents::Document;
use crate::loaders::Loader;

/// Prefix reserved for identifiers generated by this crate
pub const RESERVED_PREFIX: &str = "ttu_";

/// Whether an identifier sits at the document root or inside it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdKind {
    /// `id` of the root element
    TopLevel,
    /// `id` of any other element
    Nested,
}

impl fmt::Display for IdKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdKind::TopLevel => write!(f, "top-level"),
            IdKind::Nested => write!(f, "nested"),
        }
    }
}

/// One nested id occurrence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NestedOccurrence {
    /// File declaring the id
    pub file: PathBuf,
    /// Top-level id of that file, if any
    pub enclosing: Option<String>,
    /// Occurrence number of this id among all elements of the file
    pub ordinal: usize,
}

/// Flat view of one identifier occurrence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentifierRecord {
    /// Identifier string
    pub id: String,
    /// Declaring file
    pub file: PathBuf,
    /// Root or nested
    pub kind: IdKind,
    /// Top-level id of the file, for nested ids
    pub enclosing: Option<String>,
}

/// Corpus-wide identifier tables
#[derive(Debug, Clone, Default)]
pub struct IdentifierIndex {
    /// Top-level id -> declaring files, in corpus order
    pub top_level: IndexMap<String, Vec<PathBuf>>,
    /// Nested id -> occurrences, in corpus and document order
    pub nested: IndexMap<String, Vec<NestedOccurrence>>,
    files: IndexMap<PathBuf, Option<String>>,
    skipped: Vec<PathBuf>,
}

impl IdentifierIndex {
    /// Create an empty index
    pub fn new() -> Self {
        Self::default()
    }

    /// Scan every topic of the corpus once
    pub fn build(corpus: &Corpus, loader: &Loader) -> Self {
        let mut index = Self::new();
        for path in &corpus.topics {
            match Document::from_file(path, loader) {
                Ok(doc) if doc.is_map() => {
                    debug!("not indexing map {}", path.display());
                }
                Ok(doc) => index.add_document(&doc),
                Err(e) => {
                    debug!("skipping {}: {}", path.display(), e);
                    index.skipped.push(path.clone());
                }
            }
        }
        debug!(
            "indexed {} files: {} top-level ids, {} nested ids",
            index.files.len(),
            index.top_level.len(),
            index.nested.len()
        );
        index
    }

    /// Record the identifiers of one scanned document
    pub fn add_document(&mut self, doc: &Document) {
        self.files.insert(doc.path.clone(), doc.top_id.clone());

        for occurrence in &doc.ids {
            if occurrence.id.starts_with(RESERVED_PREFIX) && occurrence.ordinal == 0 {
                warn!(
                    "{} declares id '{}' using the reserved '{}' prefix",
                    doc.path.display(),
                    occurrence.id,
                    RESERVED_PREFIX
                );
            }
            if occurrence.is_root {
                self.top_level
                    .entry(occurrence.id.clone())
                    .or_default()
                    .push(doc.path.clone());
            } else {
                self.nested
                    .entry(occurrence.id.clone())
                    .or_default()
                    .push(NestedOccurrence {
                        file: doc.path.clone(),
                        enclosing: doc.top_id.clone(),
                        ordinal: occurrence.ordinal,
                    });
            }
        }
    }

    /// Every identifier string seen anywhere
    pub fn all_ids(&self) -> IndexSet<String> {
        self.top_level
            .keys()
            .chain(self.nested.keys())
            .cloned()
            .collect()
    }

    /// Top-level ids declared by more than one file
    pub fn duplicate_top_level(&self) -> impl Iterator<Item = (&String, &Vec<PathBuf>)> {
        self.top_level.iter().filter(|(_, files)| files.len() > 1)
    }

    /// Top-level id of an indexed file
    pub fn top_id(&self, file: &Path) -> Option<&str> {
        self.files.get(file).and_then(|id| id.as_deref())
    }

    /// Whether the file was scanned successfully
    pub fn contains_file(&self, file: &Path) -> bool {
        self.files.contains_key(file)
    }

    /// Successfully scanned files, in corpus order
    pub fn files(&self) -> impl Iterator<Item = &PathBuf> {
        self.files.keys()
    }

    /// Files that could not be loaded or parsed
    pub fn skipped(&self) -> &[PathBuf] {
        &self.skipped
    }

    /// Flat list of every occurrence
    pub fn records(&self) -> Vec<IdentifierRecord> {
        let mut records = Vec::new();
        for (id, files) in &self.top_level {
            for file in files {
                records.push(IdentifierRecord {
                    id: id.clone(),
                    file: file.clone(),
                    kind: IdKind::TopLevel,
                    enclosing: None,
                });
            }
        }
        for (id, occurrences) in &self.nested {
            for occurrence in occurrences {
                records.push(IdentifierRecord {
                    id: id.clone(),
                    file: occurrence.file.clone(),
                    kind: IdKind::Nested,
                    enclosing: occurrence.enclosing.clone(),
                });
            }
        }
        records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    fn doc(path: &str, xml: &str) -> Document {
        Document::from_string(path, xml).unwrap()
    }

    #[test]
    fn test_add_documents() {
        let mut index = IdentifierIndex::new();
        index.add_document(&doc(
            "/d/a.xml",
            r#"<topic id="intro"><body><p id="p1"/><p id="p1"/></body></topic>"#,
        ));
        index.add_document(&doc(
            "/d/b.xml",
            r#"<topic id="intro"><body><p id="p1"/></body></topic>"#,
        ));

        assert_eq!(
            index.top_level["intro"],
            vec![PathBuf::from("/d/a.xml"), PathBuf::from("/d/b.xml")]
        );
        let ordinals: Vec<_> = index.nested["p1"]
            .iter()
            .map(|o| (o.file.clone(), o.ordinal))
            .collect();
        assert_eq!(
            ordinals,
            vec![
                (PathBuf::from("/d/a.xml"), 0),
                (PathBuf::from("/d/a.xml"), 1),
                (PathBuf::from("/d/b.xml"), 0),
            ]
        );
        assert_eq!(index.nested["p1"][0].enclosing.as_deref(), Some("intro"));
        assert_eq!(index.duplicate_top_level().count(), 1);
        assert_eq!(index.records().len(), 5);
    }

    #[test]
    fn test_file_without_top_id_is_scanned() {
        let mut index = IdentifierIndex::new();
        index.add_document(&doc("/d/a.xml", r#"<topic><p id="x"/></topic>"#));

        assert!(index.top_level.is_empty());
        assert_eq!(index.nested["x"][0].enclosing, None);
        assert!(index.contains_file(Path::new("/d/a.xml")));
        assert_eq!(index.top_id(Path::new("/d/a.xml")), None);
    }

    #[test]
    fn test_all_ids() {
        let mut index = IdentifierIndex::new();
        index.add_document(&doc("/d/a.xml", r#"<topic id="a"><p id="b"/></topic>"#));
        let ids: Vec<_> = index.all_ids().into_iter().collect();
        assert_eq!(ids, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_build_skips_malformed_and_maps() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.xml"), r#"<topic id="a"/>"#).unwrap();
        fs::write(dir.path().join("bad.xml"), "<topic id=\"x\"><p").unwrap();
        fs::write(dir.path().join("m.dita"), r#"<map id="m"/>"#).unwrap();

        let corpus = Corpus::scan(dir.path(), &Config::default()).unwrap();
        let index = IdentifierIndex::build(&corpus, &Loader::new());

        assert_eq!(index.files().count(), 1);
        assert_eq!(index.skipped().len(), 1);
        assert!(index.skipped()[0].ends_with("bad.xml"));
        assert!(index.top_level.contains_key("a"));
        assert!(!index.top_level.contains_key("m"));
    }
}
