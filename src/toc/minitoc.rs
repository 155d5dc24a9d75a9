//! Mini-TOC detection
//!
//! A mini-TOC is a `<ul>` whose items each carry an `<xref>` to a child
//! topic. Many topics contain xref lists that are not navigation aids, so a
//! candidate list is only trusted when the prose around it looks like an
//! introduction. Inconclusive content is reported as such and never
//! guessed at.

use std::path::Path;

use indexmap::IndexSet;
use log::debug;
use regex::Regex;
use roxmltree::Node;

use crate::documents::text_content;
use crate::limits::Limits;
use crate::locations::{file_stem_key, resolve_path, Reference};

lazy_static::lazy_static! {
    static ref INTRO_PHRASES: Vec<Regex> = [
        r"this\s+chapter\s+(contains|includes|has)\s*the\s+following\s*[:\w]*",
        r"following\s+(sections|topics|commands)\s*[:\w]*",
        r"contains\s+the\s+following\s*[:\w]*",
        r"to\s+view\s+the\s+following\s*[:\w]*",
        r"click\s+on\s+a\s+client\s+.*\s+to\s+view\s+the\s+following\s*[:\w]*",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).unwrap())
    .collect();
}

/// Whether text reads as the introduction of a list: a known phrase, or
/// anything ending in a colon
pub fn is_intro_text(text: &str) -> bool {
    let lower = text.to_lowercase();
    lower.trim_end().ends_with(':') || INTRO_PHRASES.iter().any(|re| re.is_match(&lower))
}

/// A list accepted as navigation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MiniToc {
    /// Stem keys of every xref listed in `<ul>/<li>` outside tables
    pub entries: IndexSet<String>,
    /// Xref-bearing items of the qualifying list
    pub items: usize,
    /// Whether the surrounding paragraph introduces the list
    pub has_intro: bool,
}

impl MiniToc {
    /// Whether the list covers a child stem key
    pub fn covers(&self, key: &str) -> bool {
        self.entries.contains(key)
    }
}

/// What a topic body says about its mini-TOC
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodyAnalysis {
    /// No `<ul>` at all; carries the stem keys of every xref in the topic
    NoList {
        /// Stem keys of all xrefs
        xrefs: IndexSet<String>,
    },
    /// Lists exist, but none has enough xref items to be a mini-TOC
    NoQualifyingList,
    /// A candidate list failed the content heuristics
    Rejected {
        /// Which limit was exceeded
        reason: String,
    },
    /// A list accepted as mini-TOC
    MiniToc(MiniToc),
}

/// Inspect a topic tree; `base_dir` is the topic's directory, used to
/// resolve xref targets
pub fn analyze(tree: &roxmltree::Document, base_dir: &Path, limits: &Limits) -> BodyAnalysis {
    let lists: Vec<Node> = tree.descendants().filter(|n| n.has_tag_name("ul")).collect();
    if lists.is_empty() {
        let xrefs = tree
            .descendants()
            .filter(|n| n.has_tag_name("xref"))
            .filter_map(|n| n.attribute("href"))
            .filter_map(|href| xref_key(base_dir, href))
            .collect();
        return BodyAnalysis::NoList { xrefs };
    }

    let mut entries = IndexSet::new();
    let mut candidate = None;
    for ul in &lists {
        let mut items = 0;
        for li in list_items(*ul) {
            if let Some(xref) = item_xref(li) {
                items += 1;
                if let Some(key) = xref.attribute("href").and_then(|h| xref_key(base_dir, h)) {
                    entries.insert(key);
                }
            }
        }
        if candidate.is_none() && limits.is_toc_sized(items) {
            candidate = Some((*ul, items));
        }
    }

    let (ul, items) = match candidate {
        Some(found) => found,
        None => return BodyAnalysis::NoQualifyingList,
    };

    let mut has_intro = false;
    if let Some(paragraph) = surrounding_paragraph(ul) {
        let inline = inline_text(paragraph, ul);
        has_intro = is_intro_text(&inline);
        if !has_intro {
            if let Err(e) = limits.check_intro_text(inline.chars().count()) {
                return rejected(e.to_string());
            }
        }
        // the list and its items count too
        let elements = paragraph
            .descendants()
            .filter(|n| n.is_element() && *n != paragraph)
            .count();
        if let Err(e) = limits.check_paragraph_elements(elements) {
            return rejected(e.to_string());
        }
    }

    let item_text = list_items(ul)
        .filter(|li| item_xref(*li).is_none())
        .map(|li| normalize_space(&text_content(li)))
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    if let Err(e) = limits.check_item_text(item_text.chars().count()) {
        return rejected(e.to_string());
    }

    BodyAnalysis::MiniToc(MiniToc {
        entries,
        items,
        has_intro,
    })
}

fn rejected(reason: String) -> BodyAnalysis {
    debug!("list rejected as mini-TOC: {}", reason);
    BodyAnalysis::Rejected { reason }
}

/// Stem key of the file an xref points at; fragment-only and external
/// references have none
pub fn xref_key(base_dir: &Path, href: &str) -> Option<String> {
    match Reference::parse(href) {
        Reference::CrossFile { path, .. } if !path.is_empty() => resolve_path(base_dir, &path)
            .ok()
            .map(|p| file_stem_key(&p)),
        _ => None,
    }
}

fn list_items<'a, 'input>(ul: Node<'a, 'input>) -> impl Iterator<Item = Node<'a, 'input>> {
    ul.children().filter(|n| n.has_tag_name("li"))
}

/// First xref with an href inside a list item, ignoring table content
fn item_xref<'a, 'input>(li: Node<'a, 'input>) -> Option<Node<'a, 'input>> {
    li.descendants().find(|n| {
        n.has_tag_name("xref") && n.attribute("href").is_some() && !in_table(*n)
    })
}

fn in_table(node: Node) -> bool {
    node.ancestors().any(|a| a.has_tag_name("table"))
}

/// `node` is `ancestor` or lies inside it
fn within(node: Node, ancestor: Node) -> bool {
    node.ancestors().any(|a| a == ancestor)
}

/// Paragraph holding the list, or the paragraph right before it
fn surrounding_paragraph<'a, 'input>(ul: Node<'a, 'input>) -> Option<Node<'a, 'input>> {
    ul.ancestors()
        .skip(1)
        .find(|a| a.has_tag_name("p"))
        .or_else(|| ul.prev_sibling_element().filter(|s| s.has_tag_name("p")))
}

/// Paragraph text outside the list, whitespace collapsed
fn inline_text(paragraph: Node, ul: Node) -> String {
    let text: String = paragraph
        .descendants()
        .filter(|n| n.is_text() && !within(*n, ul))
        .filter_map(|n| n.text())
        .collect::<Vec<_>>()
        .join(" ");
    normalize_space(&text)
}

fn normalize_space(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
