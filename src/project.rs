//! Project facade
//!
//! A [`Project`] is what a front end holds for one selected directory. It
//! owns the configuration and the escrow area, so audit-log headers are
//! written once per project session no matter how often an operation is
//! repeated. Every operation here is headless and reports failures as
//! counts, messages or empty results.

use std::path::{Path, PathBuf};

use log::{debug, warn};
use serde::Serialize;

use crate::config::Config;
use crate::corpus::{parent_maps, Corpus};
use crate::dedup::{resolve, RenamePlan};
use crate::error::Result;
use crate::escrow::{BackupRecord, Escrow};
use crate::identifiers::IdentifierIndex;
use crate::loaders::Loader;
use crate::locations::{absolutize, relative_display};
use crate::rewrite::{apply, DedupReport};
use crate::toc::empty::{find_empty_headings, EmptyHeading};
use crate::toc::map::DitaMap;
use crate::toc::synthesize::Synthesizer;
use crate::toc::validator::{TocDefect, TocValidator};
use crate::unreferenced::{find_unreferenced, move_to_escrow, UnreferencedFile};

/// Outcome of repairing several empty headings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FixSummary {
    /// Topics that received a mini-TOC
    pub fixed: usize,
    /// Topics that could not be repaired
    pub failed: usize,
    /// One line per topic
    pub messages: Vec<String>,
}

/// One selected project directory
#[derive(Debug, Clone)]
pub struct Project {
    root: PathBuf,
    config: Config,
    loader: Loader,
    escrow: Escrow,
}

impl Project {
    /// Project with the default configuration
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self::with_config(root, Config::default())
    }

    /// Project with a custom configuration
    pub fn with_config(root: impl AsRef<Path>, config: Config) -> Self {
        let root = root.as_ref();
        let root = absolutize(root).unwrap_or_else(|_| root.to_path_buf());
        let loader = Loader::new().with_limits(config.limits.clone());
        let escrow = Escrow::new(&root, &config);
        Self {
            root,
            config,
            loader,
            escrow,
        }
    }

    /// Project root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Active configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Escrow area of this project
    pub fn escrow(&self) -> &Escrow {
        &self.escrow
    }

    /// First map (by name) in the root's parent directory, else in the
    /// root itself
    pub fn discover_map(&self) -> Option<PathBuf> {
        self.root
            .parent()
            .and_then(|parent| parent_maps(parent, &self.config).into_iter().next())
            .or_else(|| parent_maps(&self.root, &self.config).into_iter().next())
    }

    /// Compute the renames that would make every identifier unique
    pub fn plan_duplicates(&self) -> Result<RenamePlan> {
        let corpus = Corpus::scan(&self.root, &self.config)?;
        let index = IdentifierIndex::build(&corpus, &self.loader);
        Ok(resolve(&index))
    }

    /// Rename duplicate identifiers and rewrite every reference to them
    pub fn remove_duplicate_ids(&mut self) -> DedupReport {
        let corpus = match Corpus::scan(&self.root, &self.config) {
            Ok(corpus) => corpus,
            Err(e) => {
                warn!("cannot scan {}: {}", self.root.display(), e);
                return DedupReport {
                    log_success: true,
                    errors: vec![e.to_string()],
                    ..DedupReport::default()
                };
            }
        };
        let index = IdentifierIndex::build(&corpus, &self.loader);
        let plan = resolve(&index);
        apply(&corpus, &plan, &self.loader, &mut self.escrow)
    }

    /// Children missing from mini-TOCs of the topics `map` references
    pub fn validate_toc(&self, map: impl AsRef<Path>) -> Vec<TocDefect> {
        TocValidator::new(&self.config).validate(map)
    }

    /// Title-only topics of `map` that own child topics
    pub fn find_empty_headings(&self, map: impl AsRef<Path>) -> Vec<EmptyHeading> {
        match self.load_map(map.as_ref()) {
            Some(map) => find_empty_headings(&map, &self.config),
            None => Vec::new(),
        }
    }

    /// Write a mini-TOC into one empty heading
    pub fn fix_empty_heading(&mut self, heading: &EmptyHeading, map_dir: &Path) -> bool {
        Synthesizer::new(&self.config).synthesize(
            &heading.path,
            &heading.child_hrefs,
            map_dir,
            &mut self.escrow,
        )
    }

    /// Write mini-TOCs into every empty heading of `map`
    pub fn fix_all_empty_headings(&mut self, map: impl AsRef<Path>) -> FixSummary {
        let map = match self.load_map(map.as_ref()) {
            Some(map) => map,
            None => return FixSummary::default(),
        };
        let mut summary = FixSummary::default();
        for heading in find_empty_headings(&map, &self.config) {
            let shown = relative_display(&map.dir, &heading.path)
                .unwrap_or_else(|| heading.file_name.clone());
            if self.fix_empty_heading(&heading, &map.dir) {
                summary.fixed += 1;
                summary.messages.push(format!("Fixed: {}", shown));
            } else {
                summary.failed += 1;
                summary.messages.push(format!("Failed: {}", shown));
            }
        }
        summary
    }

    /// Topic files under `dir` (default: the project root) that `map` does
    /// not reference
    pub fn find_unreferenced(&self, map: impl AsRef<Path>, dir: Option<&Path>) -> Vec<UnreferencedFile> {
        let map = match self.load_map(map.as_ref()) {
            Some(map) => map,
            None => return Vec::new(),
        };
        let dir = dir.unwrap_or(&self.root);
        find_unreferenced(&map, dir, &self.config).unwrap_or_else(|e| {
            debug!("cannot scan {}: {}", dir.display(), e);
            Vec::new()
        })
    }

    /// Move an unreferenced file into escrow
    pub fn move_unreferenced(&mut self, path: &Path) -> Result<BackupRecord> {
        move_to_escrow(path, &mut self.escrow)
    }

    fn load_map(&self, path: &Path) -> Option<DitaMap> {
        DitaMap::load(path, &self.loader)
            .map_err(|e| debug!("cannot read map {}: {}", path.display(), e))
            .ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, content: &str) {
        let path = dir.join(name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_discover_map_prefers_parent() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "b.ditamap", "<map/>");
        write(dir.path(), "a.ditamap", "<map/>");
        write(dir.path(), "content/inner.ditamap", "<map/>");

        let project = Project::new(dir.path().join("content"));
        let map = project.discover_map().unwrap();
        assert_eq!(map.file_name().unwrap(), "a.ditamap");

        fs::remove_file(dir.path().join("a.ditamap")).unwrap();
        fs::remove_file(dir.path().join("b.ditamap")).unwrap();
        let map = project.discover_map().unwrap();
        assert_eq!(map.file_name().unwrap(), "inner.ditamap");
    }

    #[test]
    fn test_missing_root_reports_error() {
        let dir = TempDir::new().unwrap();
        let mut project = Project::new(dir.path().join("missing"));
        let report = project.remove_duplicate_ids();
        assert_eq!(report.duplicates_fixed, 0);
        assert_eq!(report.files_modified, 0);
        assert_eq!(report.errors.len(), 1);
        assert!(project.validate_toc(dir.path().join("none.ditamap")).is_empty());
        assert!(project.find_empty_headings(dir.path().join("none.ditamap")).is_empty());
    }

    #[test]
    fn test_fix_all_empty_headings() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "heading.xml", r#"<concept id="h"><title>Heading</title></concept>"#);
        write(dir.path(), "other.xml", r#"<concept id="o"><title>Other</title><conbody/></concept>"#);
        write(
            dir.path(),
            "m.ditamap",
            r#"<map>
                 <chapter href="heading.xml"><topicref href="a.xml"/><topicref href="b.xml"/></chapter>
                 <chapter href="other.xml"><topicref href="c.xml"/></chapter>
               </map>"#,
        );

        let mut project = Project::new(dir.path());
        let summary = project.fix_all_empty_headings(dir.path().join("m.ditamap"));
        assert_eq!(summary.fixed, 2);
        assert_eq!(summary.failed, 0);
        assert_eq!(summary.messages, vec!["Fixed: heading.xml", "Fixed: other.xml"]);
        assert!(project.find_empty_headings(dir.path().join("m.ditamap")).is_empty());

        let heading = fs::read_to_string(dir.path().join("heading.xml")).unwrap();
        assert!(heading.contains(r#"id="ttu_h""#));
        assert!(heading.contains(r#"<xref href="b.xml"/>"#));

        let log = fs::read_to_string(project.escrow().log_path()).unwrap();
        assert_eq!(log.matches("Empty Heading Fix Log").count(), 1);
    }

    #[test]
    fn test_unreferenced_round_trip() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "m.ditamap", r#"<map><topicref href="a.xml"/></map>"#);
        write(dir.path(), "a.xml", "<topic id=\"a\"/>");
        write(dir.path(), "z.xml", "<topic id=\"z\"/>");

        let mut project = Project::new(dir.path());
        let map = dir.path().join("m.ditamap");
        let found = project.find_unreferenced(&map, None);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].file_name, "z.xml");

        project.move_unreferenced(&found[0].path).unwrap();
        assert!(project.find_unreferenced(&map, None).is_empty());
        assert!(project.escrow().dir().join("z.xml").is_file());
    }
}
