//! Empty heading detection
//!
//! A heading topic is "empty" when its only content is the title, yet the
//! map nests child topics under it. Such topics are candidates for mini-TOC
//! synthesis.

use std::path::PathBuf;

use log::debug;
use serde::Serialize;

use crate::config::Config;
use crate::documents::parse_tree;
use crate::loaders::Loader;
use crate::toc::map::DitaMap;

/// A topic with nothing but a title that owns child topics
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmptyHeading {
    /// File name of the topic
    pub file_name: String,
    /// Directory of the topic
    pub folder: String,
    /// Topic file
    pub path: PathBuf,
    /// Raw href used by the map
    pub href: String,
    /// Final path segment of each child href
    pub child_hrefs: Vec<String>,
}

/// Whether a topic holds exactly one title and no other content: every other
/// child of the root is an empty element with no trailing text
pub fn is_empty_except_title(tree: &roxmltree::Document) -> bool {
    let titles = tree
        .descendants()
        .filter(|n| n.has_tag_name("title"))
        .count();
    if titles != 1 {
        return false;
    }

    tree.root_element()
        .children()
        .filter(|n| n.is_element() && !n.has_tag_name("title"))
        .all(|child| {
            let has_text = child.text().map(|t| !t.trim().is_empty()).unwrap_or(false);
            let has_tail = child.tail().map(|t| !t.trim().is_empty()).unwrap_or(false);
            let has_children = child.children().any(|c| c.is_element());
            !(has_text || has_tail || has_children)
        })
}

/// Topics referenced by the map that are empty except for their title and
/// have at least one child href
pub fn find_empty_headings(map: &DitaMap, config: &Config) -> Vec<EmptyHeading> {
    let loader = Loader::new().with_limits(config.limits.clone());
    let mut headings = Vec::new();

    for node in map.nodes_depth_first() {
        let (path, href) = match (&node.path, &node.href) {
            (Some(path), Some(href)) => (path, href),
            _ => continue,
        };
        if !config.is_topic_file(path) || !path.is_file() {
            continue;
        }
        let child_hrefs = node.child_hrefs();
        if child_hrefs.is_empty() {
            continue;
        }

        let empty = match loader.load_text(path) {
            Ok(text) => match parse_tree(&text) {
                Ok(tree) => is_empty_except_title(&tree),
                Err(e) => {
                    debug!("skipping malformed {}: {}", path.display(), e);
                    false
                }
            },
            Err(e) => {
                debug!("skipping unreadable {}: {}", path.display(), e);
                false
            }
        };
        if !empty || headings.iter().any(|h: &EmptyHeading| &h.path == path) {
            continue;
        }

        headings.push(EmptyHeading {
            file_name: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            folder: path
                .parent()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
            path: path.clone(),
            href: href.clone(),
            child_hrefs,
        });
    }

    debug!("{} empty headings in {}", headings.len(), map.path.display());
    headings
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn empty(xml: &str) -> bool {
        is_empty_except_title(&parse_tree(xml).unwrap())
    }

    #[test]
    fn test_title_only() {
        assert!(empty(r#"<concept id="c"><title>Overview</title></concept>"#));
        assert!(empty(r#"<concept id="c"><title>Overview</title><conbody/></concept>"#));
        assert!(empty(
            "<concept id=\"c\">\n  <title>Overview</title>\n  <conbody>\n  </conbody>\n</concept>"
        ));
    }

    #[test]
    fn test_content_is_not_empty() {
        assert!(!empty(r#"<concept><title>O</title><conbody><p>x</p></conbody></concept>"#));
        assert!(!empty(r#"<concept><title>O</title><shortdesc>text</shortdesc></concept>"#));
        assert!(!empty(r#"<concept><title>O</title><conbody/>tail</concept>"#));
        assert!(!empty(r#"<concept><conbody/></concept>"#));
        assert!(!empty(
            r#"<concept><title>O</title><conbody><section><title>S</title></section></conbody></concept>"#
        ));
    }

    #[test]
    fn test_find_empty_headings() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("heading.xml"),
            r#"<concept id="h"><title>Heading</title></concept>"#,
        )
        .unwrap();
        fs::write(
            dir.path().join("full.xml"),
            r#"<concept id="f"><title>Full</title><conbody><p>x</p></conbody></concept>"#,
        )
        .unwrap();
        fs::write(dir.path().join("leaf.xml"), r#"<concept id="l"><title>Leaf</title></concept>"#)
            .unwrap();
        fs::write(
            dir.path().join("m.ditamap"),
            r#"<map>
                 <chapter href="heading.xml"><topicref href="sub/x.xml"/><topicref href="y.xml"/></chapter>
                 <chapter href="full.xml"><topicref href="y.xml"/></chapter>
                 <chapter href="leaf.xml"/>
               </map>"#,
        )
        .unwrap();

        let map = DitaMap::load(dir.path().join("m.ditamap"), &Loader::new()).unwrap();
        let headings = find_empty_headings(&map, &Config::default());
        assert_eq!(headings.len(), 1);
        assert_eq!(headings[0].file_name, "heading.xml");
        assert_eq!(headings[0].href, "heading.xml");
        assert_eq!(headings[0].child_hrefs, vec!["x.xml", "y.xml"]);
    }
}
