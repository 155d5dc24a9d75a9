//! XML document handling
//!
//! A [`Document`] is the result of one streaming pass over a topic or map
//! file: its prolog, root element, top-level identifier and every element
//! that carries an `id`. Nothing here mutates the file; rewrites re-read
//! the bytes and stream them again (see `rewrite`).
//!
//! Read-only tree queries (mini-TOC analysis, titles, map structure) go
//! through [`parse_tree`], which hands out a `roxmltree` view.

use std::borrow::Cow;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use quick_xml::events::attributes::Attribute;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::{Error, ParseError, Result};
use crate::loaders::{Loader, Source};

/// Broad kind of a document, decided by its root element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentKind {
    /// topic, concept, task, reference, dita, ...
    Topic,
    /// map or bookmap
    Map,
}

impl DocumentKind {
    fn from_root(root_name: &str) -> Self {
        match root_name {
            "map" | "bookmap" => DocumentKind::Map,
            _ => DocumentKind::Topic,
        }
    }
}

/// One element carrying an `id` attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdOccurrence {
    /// Attribute value
    pub id: String,
    /// Local name of the element
    pub element: String,
    /// How many earlier elements of this document carry the same id
    pub ordinal: usize,
    /// Whether this is the root element
    pub is_root: bool,
}

/// XML document scanned from disk
#[derive(Debug, Clone)]
pub struct Document {
    /// Absolute path of the file
    pub path: PathBuf,
    /// Raw content
    pub source: Source,
    /// `<?xml ...?>` declaration, verbatim
    pub declaration: Option<String>,
    /// `<!DOCTYPE ...>` declaration, verbatim
    pub doctype: Option<String>,
    /// Byte offset where the root start tag begins
    pub prolog_end: usize,
    /// Local name of the root element
    pub root_name: String,
    /// Topic-like or map-like
    pub kind: DocumentKind,
    /// `id` of the root element
    pub top_id: Option<String>,
    /// Every id-bearing element, in document order
    pub ids: Vec<IdOccurrence>,
}

impl Document {
    /// Load and scan a file
    pub fn from_file(path: impl AsRef<Path>, loader: &Loader) -> Result<Self> {
        let path = path.as_ref();
        let source = loader.load(path)?;
        Self::parse(path, source)
    }

    /// Scan an XML document from a string
    pub fn from_string(path: impl AsRef<Path>, xml: &str) -> Result<Self> {
        Self::parse(path.as_ref(), Source::from_bytes(xml.as_bytes().to_vec()))
    }

    /// Scan already-loaded content
    pub fn parse(path: &Path, source: Source) -> Result<Self> {
        let mut reader = Reader::from_reader(source.bytes.as_slice());
        reader.trim_text(false);
        reader.check_end_names(false);

        let mut declaration = None;
        let mut doctype = None;
        let mut prolog_end = None;
        let mut root_name = None;
        let mut ids: Vec<IdOccurrence> = Vec::new();
        let mut seen: IndexMap<String, usize> = IndexMap::new();
        let mut last = 0;

        loop {
            let event = reader.read_event().map_err(|e| {
                Error::Parse(
                    ParseError::new(e.to_string())
                        .with_path(path)
                        .with_position(reader.buffer_position()),
                )
            })?;
            let end = reader.buffer_position();
            match event {
                Event::Decl(_) if root_name.is_none() => {
                    declaration = Some(span_text(&source.bytes, last, end));
                }
                Event::DocType(_) if root_name.is_none() => {
                    doctype = Some(span_text(&source.bytes, last, end));
                }
                Event::Start(ref e) | Event::Empty(ref e) => {
                    let is_root = root_name.is_none();
                    let name = element_name(e);
                    if is_root {
                        prolog_end = Some(last);
                        root_name = Some(name.clone());
                    }
                    if let Some(id) = find_attribute(e, b"id") {
                        let count = seen.entry(id.clone()).or_insert(0);
                        let ordinal = *count;
                        *count += 1;
                        ids.push(IdOccurrence {
                            id,
                            element: name,
                            ordinal,
                            is_root,
                        });
                    }
                }
                Event::Eof => break,
                _ => {}
            }
            last = end;
        }

        let root_name = root_name.ok_or_else(|| {
            Error::Parse(ParseError::new("document has no root element").with_path(path))
        })?;
        let top_id = ids.iter().find(|o| o.is_root).map(|o| o.id.clone());

        Ok(Self {
            path: path.to_path_buf(),
            kind: DocumentKind::from_root(&root_name),
            source,
            declaration,
            doctype,
            prolog_end: prolog_end.unwrap_or(0),
            root_name,
            top_id,
            ids,
        })
    }

    /// Document content as text
    pub fn text(&self) -> Result<&str> {
        self.source.text()
    }

    /// Everything before the root start tag, verbatim
    pub fn prolog(&self) -> &[u8] {
        &self.source.bytes[..self.prolog_end]
    }

    /// Read-only tree view of the document
    pub fn tree(&self) -> Result<roxmltree::Document<'_>> {
        parse_tree(self.text()?).map_err(|e| match e {
            Error::Parse(p) => Error::Parse(p.with_path(&self.path)),
            other => other,
        })
    }

    /// Ids of non-root elements
    pub fn nested_ids(&self) -> impl Iterator<Item = &IdOccurrence> {
        self.ids.iter().filter(|o| !o.is_root)
    }

    /// Whether the root element is a map
    pub fn is_map(&self) -> bool {
        self.kind == DocumentKind::Map
    }
}

/// Parse text into a read-only tree, allowing DOCTYPE declarations
pub fn parse_tree(text: &str) -> Result<roxmltree::Document<'_>> {
    let mut options = roxmltree::ParsingOptions::default();
    options.allow_dtd = true;
    Ok(roxmltree::Document::parse_with_options(text, options)?)
}

/// Local name of an element (namespace prefix dropped)
pub(crate) fn element_name(start: &BytesStart) -> String {
    String::from_utf8_lossy(start.local_name().as_ref()).into_owned()
}

/// Unescaped attribute value, falling back to the raw text when it holds
/// entities the tokenizer cannot expand
pub(crate) fn attribute_value(attr: &Attribute) -> String {
    match attr.unescape_value() {
        Ok(value) => value.into_owned(),
        Err(_) => String::from_utf8_lossy(&attr.value).into_owned(),
    }
}

/// Find an attribute by exact key
pub(crate) fn find_attribute(start: &BytesStart, key: &[u8]) -> Option<String> {
    start
        .attributes()
        .with_checks(false)
        .flatten()
        .find(|attr| attr.key.as_ref() == key)
        .map(|attr| attribute_value(&attr))
}

fn span_text(bytes: &[u8], start: usize, end: usize) -> String {
    let end = end.min(bytes.len());
    let start = start.min(end);
    match String::from_utf8_lossy(&bytes[start..end]) {
        Cow::Borrowed(s) => s.trim().to_string(),
        Cow::Owned(s) => s.trim().to_string(),
    }
}

/// Text of the first `<title>` element, trimmed
pub fn first_title(tree: &roxmltree::Document) -> Option<String> {
    tree.descendants()
        .find(|n| n.has_tag_name("title"))
        .map(text_content)
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

/// Concatenated descendant text of a node
pub fn text_content(node: roxmltree::Node) -> String {
    node.descendants()
        .filter(|n| n.is_text())
        .filter_map(|n| n.text())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONCEPT: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE concept PUBLIC "-//OASIS//DTD DITA Concept//EN" "concept.dtd">
<concept id="intro">
  <title>Introduction</title>
  <conbody>
    <p id="p1">First</p>
    <section id="s1"><p id="p1">Again</p></section>
  </conbody>
</concept>
"#;

    #[test]
    fn test_scan_prolog_and_ids() {
        let doc = Document::from_string("/docs/intro.xml", CONCEPT).unwrap();

        assert_eq!(doc.root_name, "concept");
        assert_eq!(doc.kind, DocumentKind::Topic);
        assert_eq!(doc.top_id.as_deref(), Some("intro"));
        assert_eq!(
            doc.declaration.as_deref(),
            Some(r#"<?xml version="1.0" encoding="UTF-8"?>"#)
        );
        assert!(doc.doctype.as_deref().unwrap().contains("concept.dtd"));
        assert!(std::str::from_utf8(doc.prolog())
            .unwrap()
            .ends_with("\"concept.dtd\">\n"));

        let nested: Vec<_> = doc
            .nested_ids()
            .map(|o| (o.id.as_str(), o.ordinal))
            .collect();
        assert_eq!(nested, vec![("p1", 0), ("s1", 0), ("p1", 1)]);
    }

    #[test]
    fn test_map_kind() {
        let doc = Document::from_string("/docs/book.ditamap", "<map><topicref href=\"a.xml\"/></map>")
            .unwrap();
        assert!(doc.is_map());
        assert!(doc.top_id.is_none());
    }

    #[test]
    fn test_root_id_repeated_in_body() {
        let doc = Document::from_string(
            "/docs/a.xml",
            r#"<topic id="a"><title/><body><p id="a"/></body></topic>"#,
        )
        .unwrap();
        let occurrences: Vec<_> = doc.ids.iter().map(|o| (o.is_root, o.ordinal)).collect();
        assert_eq!(occurrences, vec![(true, 0), (false, 1)]);
    }

    #[test]
    fn test_ordinals_count_per_id() {
        let doc = Document::from_string(
            "/docs/a.xml",
            r#"<topic id="a"><body><p id="x"/><p id="y"/><p id="x"/><p id="a"/><p id="x"/></body></topic>"#,
        )
        .unwrap();
        let occurrences: Vec<_> = doc.ids.iter().map(|o| (o.id.as_str(), o.ordinal)).collect();
        assert_eq!(
            occurrences,
            vec![("a", 0), ("x", 0), ("y", 0), ("x", 1), ("a", 1), ("x", 2)]
        );
    }

    #[test]
    fn test_mismatched_end_tags_are_tolerated() {
        let doc = Document::from_string(
            "/docs/a.xml",
            r#"<topic id="a"><body><p id="x">text</b></body></topic>"#,
        )
        .unwrap();
        assert_eq!(doc.ids.len(), 2);
    }

    #[test]
    fn test_empty_document_fails() {
        let err = Document::from_string("/docs/empty.xml", "   ").unwrap_err();
        assert!(err.to_string().contains("no root element"));
    }

    #[test]
    fn test_tree_view_with_doctype() {
        let doc = Document::from_string("/docs/intro.xml", CONCEPT).unwrap();
        let tree = doc.tree().unwrap();
        assert_eq!(first_title(&tree).as_deref(), Some("Introduction"));
    }

    #[test]
    fn test_text_content() {
        let tree = parse_tree("<p>Hello <b>big</b> world</p>").unwrap();
        assert_eq!(text_content(tree.root_element()), "Hello big world");
    }
}
