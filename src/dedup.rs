//! Duplicate identifier resolution
//!
//! [`resolve`] turns an [`IdentifierIndex`] into a [`RenamePlan`]: every
//! duplicate occurrence after the first gets a fresh `ttu_<id>_<n>` name.
//! `n` is probed upwards from 1 against one running set holding every
//! original id and every name assigned so far, so top-level and nested
//! renames can never collide with each other or with author ids.
//!
//! Scoping:
//! - top-level ids are unique across the corpus; the first file in corpus
//!   order keeps the id
//! - nested ids are unique within their file; the first occurrence keeps the
//!   id, unless it repeats the file's own top-level id, in which case every
//!   nested occurrence is renamed

use std::path::{Path, PathBuf};

use indexmap::{IndexMap, IndexSet};
use log::info;

use crate::identifiers::{IdKind, IdentifierIndex, NestedOccurrence, RESERVED_PREFIX};
use crate::locations::Fragment;

/// One planned identifier rename
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rename {
    /// File declaring the identifier
    pub file: PathBuf,
    /// Identifier as found in the file
    pub original: String,
    /// Identifier to write instead
    pub replacement: String,
    /// Root or nested occurrence
    pub kind: IdKind,
    /// Occurrence number of `original` among the file's elements
    pub ordinal: usize,
}

/// Immutable result of duplicate resolution
#[derive(Debug, Clone, Default)]
pub struct RenamePlan {
    renames: Vec<Rename>,
    by_file: IndexMap<PathBuf, Vec<usize>>,
}

impl RenamePlan {
    fn push(&mut self, rename: Rename) {
        info!(
            "planned {} rename in {}: {} -> {}",
            rename.kind,
            rename.file.display(),
            rename.original,
            rename.replacement
        );
        self.by_file
            .entry(rename.file.clone())
            .or_default()
            .push(self.renames.len());
        self.renames.push(rename);
    }

    /// All renames in planning order
    pub fn renames(&self) -> &[Rename] {
        &self.renames
    }

    /// Number of duplicate occurrences the plan fixes
    pub fn duplicates_fixed(&self) -> usize {
        self.renames.len()
    }

    /// Check if nothing needs renaming
    pub fn is_empty(&self) -> bool {
        self.renames.is_empty()
    }

    /// Files with at least one rename
    pub fn files(&self) -> impl Iterator<Item = &PathBuf> {
        self.by_file.keys()
    }

    /// Renames planned for one file
    pub fn renames_in<'a>(&'a self, file: &Path) -> impl Iterator<Item = &'a Rename> + 'a {
        self.by_file
            .get(file)
            .into_iter()
            .flatten()
            .map(move |&i| &self.renames[i])
    }

    /// New id for the element holding `id` as its `ordinal`-th occurrence
    pub fn occurrence(&self, file: &Path, id: &str, ordinal: usize) -> Option<&str> {
        self.renames_in(file)
            .find(|r| r.original == id && r.ordinal == ordinal)
            .map(|r| r.replacement.as_str())
    }

    /// New id of the file's root element, if it was renamed from `id`
    pub fn top_level(&self, file: &Path, id: &str) -> Option<&str> {
        self.renames_in(file)
            .find(|r| r.kind == IdKind::TopLevel && r.original == id)
            .map(|r| r.replacement.as_str())
    }

    /// New id of the first renamed nested occurrence of `id`
    pub fn nested(&self, file: &Path, id: &str) -> Option<&str> {
        self.renames_in(file)
            .filter(|r| r.kind == IdKind::Nested && r.original == id)
            .min_by_key(|r| r.ordinal)
            .map(|r| r.replacement.as_str())
    }

    /// New name of the first element of `file` that carried `id`, which is
    /// what a single-part reference `file#id` points at
    pub fn get(&self, id: &str, file: &Path) -> Option<&str> {
        self.occurrence(file, id, 0)
    }

    /// Planned file matching `path`, exactly or, failing that,
    /// case-insensitively when only one planned file fits
    pub fn resolve_file(&self, path: &Path) -> Option<&Path> {
        if let Some((file, _)) = self.by_file.get_key_value(path) {
            return Some(file.as_path());
        }
        let wanted = path.to_string_lossy().to_lowercase();
        let mut matches = self
            .by_file
            .keys()
            .filter(|f| f.to_string_lossy().to_lowercase() == wanted);
        match (matches.next(), matches.next()) {
            (Some(file), None) => Some(file.as_path()),
            _ => None,
        }
    }

    /// Fragment rewritten for renames in `file`, or `None` when unchanged
    pub fn rewrite_fragment(&self, fragment: &Fragment, file: &Path) -> Option<Fragment> {
        let rewritten = match &fragment.element {
            Some(element) => Fragment {
                topic: self
                    .top_level(file, &fragment.topic)
                    .unwrap_or(&fragment.topic)
                    .to_string(),
                element: Some(self.nested(file, element).unwrap_or(element).to_string()),
            },
            None => Fragment {
                topic: self
                    .get(&fragment.topic, file)
                    .unwrap_or(&fragment.topic)
                    .to_string(),
                element: None,
            },
        };
        if &rewritten == fragment {
            None
        } else {
            Some(rewritten)
        }
    }
}

/// Compute the rename plan for an index
pub fn resolve(index: &IdentifierIndex) -> RenamePlan {
    let mut known = index.all_ids();
    let mut plan = RenamePlan::default();

    for (id, files) in index.duplicate_top_level() {
        for file in files.iter().skip(1) {
            let replacement = next_free(id, &mut known);
            plan.push(Rename {
                file: file.clone(),
                original: id.clone(),
                replacement,
                kind: IdKind::TopLevel,
                ordinal: 0,
            });
        }
    }

    for (id, occurrences) in &index.nested {
        let mut by_file: IndexMap<&Path, Vec<&NestedOccurrence>> = IndexMap::new();
        for occurrence in occurrences {
            by_file
                .entry(occurrence.file.as_path())
                .or_default()
                .push(occurrence);
        }

        for (file, group) in by_file {
            let repeats_root = index.top_id(file) == Some(id.as_str());
            let keep = if repeats_root { 0 } else { 1 };
            for occurrence in group.into_iter().skip(keep) {
                let replacement = next_free(id, &mut known);
                plan.push(Rename {
                    file: file.to_path_buf(),
                    original: id.clone(),
                    replacement,
                    kind: IdKind::Nested,
                    ordinal: occurrence.ordinal,
                });
            }
        }
    }

    plan
}

/// First `ttu_<id>_<n>` (n >= 1) not in `known`; the result is added to it
fn next_free(id: &str, known: &mut IndexSet<String>) -> String {
    let mut n = 1;
    loop {
        let candidate = format!("{}{}_{}", RESERVED_PREFIX, id, n);
        if !known.contains(&candidate) {
            known.insert(candidate.clone());
            return candidate;
        }
        n += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::documents::Document;
    use pretty_assertions::assert_eq;

    fn index(docs: &[(&str, &str)]) -> IdentifierIndex {
        let mut index = IdentifierIndex::new();
        for (path, xml) in docs {
            index.add_document(&Document::from_string(path, xml).unwrap());
        }
        index
    }

    #[test]
    fn test_top_level_duplicates() {
        let index = index(&[
            ("/d/a.xml", r#"<topic id="intro"/>"#),
            ("/d/b.xml", r#"<topic id="intro"/>"#),
            ("/d/c.xml", r#"<topic id="intro"/>"#),
        ]);
        let plan = resolve(&index);

        assert_eq!(plan.duplicates_fixed(), 2);
        assert_eq!(plan.get("intro", Path::new("/d/a.xml")), None);
        assert_eq!(plan.get("intro", Path::new("/d/b.xml")), Some("ttu_intro_1"));
        assert_eq!(plan.get("intro", Path::new("/d/c.xml")), Some("ttu_intro_2"));
    }

    #[test]
    fn test_probe_skips_existing_ids() {
        let index = index(&[
            ("/d/a.xml", r#"<topic id="x"><p id="ttu_x_1"/></topic>"#),
            ("/d/b.xml", r#"<topic id="x"/>"#),
        ]);
        let plan = resolve(&index);
        assert_eq!(plan.get("x", Path::new("/d/b.xml")), Some("ttu_x_2"));
    }

    #[test]
    fn test_nested_duplicates_within_file() {
        let index = index(&[
            (
                "/d/a.xml",
                r#"<topic id="a"><p id="b"/><p id="b"/><p id="b"/></topic>"#,
            ),
            ("/d/c.xml", r#"<topic id="c"><p id="b"/></topic>"#),
        ]);
        let plan = resolve(&index);

        let renames: Vec<_> = plan
            .renames()
            .iter()
            .map(|r| (r.replacement.as_str(), r.ordinal))
            .collect();
        assert_eq!(renames, vec![("ttu_b_1", 1), ("ttu_b_2", 2)]);
        assert_eq!(plan.occurrence(Path::new("/d/a.xml"), "b", 0), None);
        assert_eq!(plan.occurrence(Path::new("/d/a.xml"), "b", 2), Some("ttu_b_2"));
        assert_eq!(plan.nested(Path::new("/d/a.xml"), "b"), Some("ttu_b_1"));
        assert!(plan.renames_in(Path::new("/d/c.xml")).next().is_none());
    }

    #[test]
    fn test_nested_repeat_of_root_id() {
        let index = index(&[("/d/a.xml", r#"<topic id="a"><p id="a"/></topic>"#)]);
        let plan = resolve(&index);

        assert_eq!(plan.duplicates_fixed(), 1);
        assert_eq!(plan.occurrence(Path::new("/d/a.xml"), "a", 1), Some("ttu_a_1"));
        // references to the root keep pointing at the root
        assert_eq!(plan.top_level(Path::new("/d/a.xml"), "a"), None);
        assert_eq!(plan.get("a", Path::new("/d/a.xml")), None);
        let fragment = Fragment::parse("a").unwrap();
        assert!(plan.rewrite_fragment(&fragment, Path::new("/d/a.xml")).is_none());
    }

    #[test]
    fn test_top_level_and_nested_share_probe_set() {
        let index = index(&[
            ("/d/a.xml", r#"<topic id="a"/>"#),
            ("/d/b.xml", r#"<topic id="a"><p id="a"/></topic>"#),
        ]);
        let plan = resolve(&index);
        let names: IndexSet<_> = plan.renames().iter().map(|r| r.replacement.clone()).collect();
        assert_eq!(names.len(), 2);
        assert!(names.contains("ttu_a_1"));
        assert!(names.contains("ttu_a_2"));
    }

    #[test]
    fn test_rewrite_fragment_two_part() {
        let index = index(&[(
            "/d/b.xml",
            r#"<topic id="a"><p id="b"/><p id="b"/></topic>"#,
        )]);
        let plan = resolve(&index);

        let fragment = Fragment::parse("a/b").unwrap();
        let rewritten = plan
            .rewrite_fragment(&fragment, Path::new("/d/b.xml"))
            .unwrap();
        assert_eq!(rewritten.to_string(), "a/ttu_b_1");

        let untouched = Fragment::parse("a/c").unwrap();
        assert!(plan.rewrite_fragment(&untouched, Path::new("/d/b.xml")).is_none());
    }

    #[test]
    fn test_resolve_file_case_insensitive() {
        let index = index(&[
            ("/d/Topics/B.xml", r#"<topic id="a"/>"#),
            ("/d/a.xml", r#"<topic id="a"/>"#),
        ]);
        let plan = resolve(&index);
        // B.xml keeps its id, so it is not a planned file
        assert!(plan.resolve_file(Path::new("/d/topics/b.xml")).is_none());
        assert_eq!(
            plan.resolve_file(Path::new("/d/A.XML")),
            Some(Path::new("/d/a.xml"))
        );
        assert!(plan.resolve_file(Path::new("/d/z.xml")).is_none());
    }

    #[test]
    fn test_clean_index_yields_empty_plan() {
        let index = index(&[
            ("/d/a.xml", r#"<topic id="a"><p id="x"/></topic>"#),
            ("/d/b.xml", r#"<topic id="b"><p id="x"/></topic>"#),
        ]);
        assert!(resolve(&index).is_empty());
    }
}
