//! Read-only view of a DITA map
//!
//! The map tree is rebuilt from disk for every validation call and never
//! written back. Only navigation elements become [`MapNode`]s; wrappers
//! such as `frontmatter` or `backmatter` are transparent, and `topicmeta`
//! and relationship tables are ignored.

use std::path::{Path, PathBuf};

use indexmap::IndexSet;

use crate::documents::{parse_tree, text_content};
use crate::error::Result;
use crate::loaders::Loader;
use crate::locations::{absolutize, file_stem_key, resolve_target};

/// Elements that form the navigation tree
pub const NODE_ELEMENTS: &[&str] = &[
    "topicref",
    "chapter",
    "appendix",
    "part",
    "topichead",
    "topicgroup",
];

/// Subtrees that never contain navigation
const SKIPPED_ELEMENTS: &[&str] = &["topicmeta", "reltable"];

/// One navigation node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapNode {
    /// Element name (`chapter`, `topicref`, ...)
    pub element: String,
    /// Raw `href` value
    pub href: Option<String>,
    /// `navtitle` attribute or `topicmeta/navtitle` text
    pub navtitle: Option<String>,
    /// Resolved target file, for local hrefs
    pub path: Option<PathBuf>,
    /// Nested navigation nodes
    pub children: Vec<MapNode>,
}

impl MapNode {
    /// Name used when reporting defects: navtitle, else the file stem
    pub fn owner_name(&self) -> String {
        if let Some(title) = self.navtitle.as_ref().filter(|t| !t.is_empty()) {
            return title.clone();
        }
        self.path
            .as_ref()
            .and_then(|p| p.file_stem())
            .map(|s| s.to_string_lossy().into_owned())
            .or_else(|| self.href.clone())
            .unwrap_or_else(|| self.element.clone())
    }

    /// Whether the href points at another map
    pub fn is_map_ref(&self) -> bool {
        self.path
            .as_ref()
            .and_then(|p| p.extension())
            .map(|ext| ext.eq_ignore_ascii_case("ditamap"))
            .unwrap_or(false)
    }

    /// Whether this node references a local topic file
    pub fn is_topic(&self) -> bool {
        self.path.is_some() && !self.is_map_ref()
    }

    /// First-level children that reference local topics
    pub fn expected_children(&self) -> Vec<&MapNode> {
        self.children.iter().filter(|c| c.is_topic()).collect()
    }

    /// Final path segment of every child href, in map order
    pub fn child_hrefs(&self) -> Vec<String> {
        self.children
            .iter()
            .filter_map(|c| c.href.as_deref())
            .map(|href| {
                let path = href.split('#').next().unwrap_or(href);
                path.rsplit(&['/', '\\'][..]).next().unwrap_or(path).to_string()
            })
            .filter(|segment| !segment.is_empty())
            .collect()
    }

    /// Lower-cased, extension-less basename of the target
    pub fn stem_key(&self) -> Option<String> {
        self.path.as_deref().map(file_stem_key)
    }

    fn collect<'a>(&'a self, out: &mut Vec<&'a MapNode>) {
        out.push(self);
        for child in &self.children {
            child.collect(out);
        }
    }
}

/// A parsed map file
#[derive(Debug, Clone)]
pub struct DitaMap {
    /// Map file
    pub path: PathBuf,
    /// Directory hrefs are resolved against
    pub dir: PathBuf,
    /// Top-level navigation nodes
    pub nodes: Vec<MapNode>,
}

impl DitaMap {
    /// Load and parse a map file
    pub fn load(path: impl AsRef<Path>, loader: &Loader) -> Result<Self> {
        let path = absolutize(path.as_ref())?;
        let text = loader.load_text(&path)?;
        Self::parse(path, &text)
    }

    /// Parse map text; hrefs resolve against the directory of `path`
    pub fn parse(path: impl AsRef<Path>, text: &str) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let tree = parse_tree(text)?;
        let nodes = build_nodes(tree.root_element(), &dir);
        Ok(Self { path, dir, nodes })
    }

    /// Every node, depth-first in document order
    pub fn nodes_depth_first(&self) -> Vec<&MapNode> {
        let mut out = Vec::new();
        for node in &self.nodes {
            node.collect(&mut out);
        }
        out
    }

    /// First node whose target is `path`
    pub fn find_by_path(&self, path: &Path) -> Option<&MapNode> {
        self.nodes_depth_first()
            .into_iter()
            .find(|n| n.path.as_deref() == Some(path))
    }

    /// Every local file the map references
    pub fn referenced_files(&self) -> IndexSet<PathBuf> {
        self.nodes_depth_first()
            .into_iter()
            .filter_map(|n| n.path.clone())
            .collect()
    }
}

fn build_nodes(parent: roxmltree::Node, dir: &Path) -> Vec<MapNode> {
    let mut nodes = Vec::new();
    for child in parent.children().filter(|n| n.is_element()) {
        let name = child.tag_name().name();
        if SKIPPED_ELEMENTS.contains(&name) {
            continue;
        }
        if !NODE_ELEMENTS.contains(&name) {
            nodes.extend(build_nodes(child, dir));
            continue;
        }

        let href = child
            .attribute("href")
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .map(str::to_string);
        let path = href.as_deref().and_then(|h| resolve_target(dir, h));
        nodes.push(MapNode {
            element: name.to_string(),
            navtitle: navtitle(child),
            path,
            href,
            children: build_nodes(child, dir),
        });
    }
    nodes
}

fn navtitle(node: roxmltree::Node) -> Option<String> {
    if let Some(title) = node.attribute("navtitle") {
        return Some(title.trim().to_string());
    }
    node.children()
        .find(|c| c.has_tag_name("topicmeta"))
        .and_then(|meta| meta.children().find(|c| c.has_tag_name("navtitle")))
        .map(|n| text_content(n).trim().to_string())
}
