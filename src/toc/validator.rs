//! Mini-TOC validation against a map
//!
//! Every map node with at least two first-level topic children is expected
//! to list those children in a mini-TOC inside its own topic. The validator
//! reports children missing from that list and nothing else: extra xrefs
//! are fine, and nodes whose lists fail the heuristics are skipped.

use std::path::{Path, PathBuf};

use indexmap::IndexSet;
use log::debug;
use serde::Serialize;

use crate::config::Config;
use crate::documents::{first_title, parse_tree};
use crate::error::Error;
use crate::limits::Limits;
use crate::loaders::Loader;
use crate::toc::map::{DitaMap, MapNode};
use crate::toc::minitoc::{analyze, BodyAnalysis};

/// A child topic missing from its parent's mini-TOC
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct TocDefect {
    /// Navtitle or file stem of the parent node
    pub owner: String,
    /// `Missing: <title>` or `Missing: <file> (<reason>)`
    pub message: String,
    /// Topic that should hold the mini-TOC
    pub topic_path: PathBuf,
    /// The missing child's file
    pub missing_path: Option<PathBuf>,
}

/// Validates mini-TOCs of the topics a map references
#[derive(Debug, Clone)]
pub struct TocValidator {
    loader: Loader,
    limits: Limits,
}

impl TocValidator {
    /// Create a validator using the configured limits
    pub fn new(config: &Config) -> Self {
        Self {
            loader: Loader::new().with_limits(config.limits.clone()),
            limits: config.limits.clone(),
        }
    }

    /// Validate a map file. An unreadable or malformed map yields no defects.
    pub fn validate(&self, map_path: impl AsRef<Path>) -> Vec<TocDefect> {
        let map_path = map_path.as_ref();
        match DitaMap::load(map_path, &self.loader) {
            Ok(map) => self.validate_map(&map),
            Err(e) => {
                debug!("cannot read map {}: {}", map_path.display(), e);
                Vec::new()
            }
        }
    }

    /// Validate an already-parsed map
    pub fn validate_map(&self, map: &DitaMap) -> Vec<TocDefect> {
        let mut defects = IndexSet::new();
        for node in map.nodes_depth_first() {
            for defect in self.check_node(node) {
                defects.insert(defect);
            }
        }
        debug!(
            "{}: {} mini-TOC defects",
            map.path.display(),
            defects.len()
        );
        defects.into_iter().collect()
    }

    /// Defects of a single node, without descending into its children
    pub fn check_node(&self, node: &MapNode) -> Vec<TocDefect> {
        let expected = node.expected_children();
        if !self.limits.expects_toc(expected.len()) {
            return Vec::new();
        }
        let topic_path = match node.path.as_ref().filter(|_| node.is_topic()) {
            Some(path) => path,
            None => return Vec::new(),
        };
        let owner = node.owner_name();

        let text = match self.loader.load_text(topic_path) {
            Ok(text) => text,
            Err(e) => {
                debug!("{}: topic unreadable: {}", owner, e);
                return Vec::new();
            }
        };
        let tree = match parse_tree(&text) {
            Ok(tree) => tree,
            Err(e) => {
                debug!("{}: topic malformed: {}", owner, e);
                return Vec::new();
            }
        };
        let base_dir = topic_path.parent().unwrap_or_else(|| Path::new("/"));

        let missing: Vec<&MapNode> = match analyze(&tree, base_dir, &self.limits) {
            BodyAnalysis::NoList { xrefs } => {
                let uncovered = expected
                    .iter()
                    .any(|c| !c.stem_key().map(|k| xrefs.contains(&k)).unwrap_or(false));
                if uncovered {
                    expected
                } else {
                    Vec::new()
                }
            }
            BodyAnalysis::MiniToc(toc) => expected
                .into_iter()
                .filter(|c| !c.stem_key().map(|k| toc.covers(&k)).unwrap_or(false))
                .collect(),
            BodyAnalysis::NoQualifyingList => {
                debug!("{}: lists present but none is a mini-TOC, skipping", owner);
                Vec::new()
            }
            BodyAnalysis::Rejected { reason } => {
                debug!("{}: skipping, {}", owner, reason);
                Vec::new()
            }
        };

        missing
            .into_iter()
            .filter_map(|child| {
                let child_path = child.path.clone()?;
                Some(TocDefect {
                    owner: owner.clone(),
                    message: format!("Missing: {}", self.describe(&child_path)),
                    topic_path: topic_path.clone(),
                    missing_path: Some(child_path),
                })
            })
            .collect()
    }

    /// Title of a topic, or its file name with the reason it has none
    fn describe(&self, path: &Path) -> String {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let text = match self.loader.load_text(path) {
            Ok(text) => text,
            Err(Error::Io(_)) => return format!("{} (Topic XML not found)", file_name),
            Err(_) => return format!("{} (Topic XML parsing error)", file_name),
        };
        match parse_tree(&text) {
            Ok(tree) => first_title(&tree).unwrap_or(file_name),
            Err(_) => format!("{} (Topic XML parsing error)", file_name),
        }
    }
}
