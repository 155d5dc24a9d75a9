//! Mini-TOC synthesis for empty headings
//!
//! A title-only topic that owns child topics gets a body holding an
//! introductory paragraph and a list of xrefs to those children, and its
//! root id is marked `ttu_<id>`. Children are assumed to sit next to the
//! parent, so only the final segment of each child href is used.
//!
//! Marking the id is not a tracked rename: references of the form
//! `file.xml#<id>` elsewhere in the project keep the old id and no longer
//! resolve. Topics that are only reached through the map are unaffected.
//!
//! The output is assembled by hand: the prolog, the title and any other
//! retained children are copied byte for byte, and only the new body is
//! indented (two spaces per level).

use std::collections::hash_map::DefaultHasher;
use std::fs;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use quick_xml::escape::escape;
use quick_xml::events::Event;
use quick_xml::Reader;
use serde::Serialize;

use crate::config::Config;
use crate::documents::{attribute_value, Document};
use crate::error::{Error, ParseError, Result};
use crate::escrow::{Escrow, OperationKind};
use crate::identifiers::RESERVED_PREFIX;
use crate::loaders::Loader;
use crate::locations::relative_display;
use crate::rewrite::TagEdit;
use crate::toc::empty::is_empty_except_title;

/// Introductory sentence of every synthesized mini-TOC
pub const INTRO_TEXT: &str = "This chapter contains the following topics:";

/// Body element names a topic may already carry
const BODY_ELEMENTS: &[&str] = &["body", "conbody", "taskbody", "refbody"];

/// Result of rendering a mini-TOC into a topic
#[derive(Debug, Clone, Serialize)]
pub struct Synthesis {
    /// Topic file
    pub path: PathBuf,
    /// Root id before the change
    pub original_id: Option<String>,
    /// Root id after the change
    pub new_id: Option<String>,
    /// Name of the body element written
    pub body_element: String,
    /// Xref targets, in order
    pub entries: Vec<String>,
    /// New file content
    #[serde(skip)]
    pub output: Vec<u8>,
}

/// Writes mini-TOCs into empty heading topics
#[derive(Debug, Clone)]
pub struct Synthesizer {
    loader: Loader,
}

impl Synthesizer {
    /// Create a synthesizer using the configured limits
    pub fn new(config: &Config) -> Self {
        Self {
            loader: Loader::new().with_limits(config.limits.clone()),
        }
    }

    /// Back up `topic_path`, then rewrite it with a mini-TOC listing
    /// `child_hrefs`. Returns false on any read, parse or write failure;
    /// the backup is then the only side effect and nothing is logged.
    pub fn synthesize(
        &self,
        topic_path: &Path,
        child_hrefs: &[String],
        map_dir: &Path,
        escrow: &mut Escrow,
    ) -> bool {
        match self.try_synthesize(topic_path, child_hrefs, escrow) {
            Ok(synthesis) => {
                let shown = relative_display(map_dir, topic_path)
                    .unwrap_or_else(|| topic_path.display().to_string());
                info!("added mini-TOC to {}", shown);
                let line = escrow.entry(
                    topic_path,
                    &format!(
                        "Added mini-TOC with {} entries to <{}>",
                        synthesis.entries.len(),
                        synthesis.body_element
                    ),
                );
                if !escrow.append_log(OperationKind::EmptyHeadingFix, &[line]) {
                    warn!("mini-TOC for {} was not logged", shown);
                }
                true
            }
            Err(e) => {
                warn!("cannot add mini-TOC to {}: {}", topic_path.display(), e);
                false
            }
        }
    }

    /// Same as [`Synthesizer::synthesize`] without logging, returning what
    /// was written
    pub fn try_synthesize(
        &self,
        topic_path: &Path,
        child_hrefs: &[String],
        escrow: &mut Escrow,
    ) -> Result<Synthesis> {
        if child_hrefs.is_empty() {
            return Err(Error::Other(format!(
                "{} has no child topics",
                topic_path.display()
            )));
        }
        let document = Document::from_file(topic_path, &self.loader)?;
        if !is_empty_except_title(&document.tree()?) {
            return Err(Error::Other(format!(
                "{} has content besides its title",
                topic_path.display()
            )));
        }
        escrow.backup(topic_path)?;

        let synthesis = render(&document, child_hrefs)?;
        fs::write(topic_path, &synthesis.output)?;
        Ok(synthesis)
    }
}

/// `ttu_<id>`, unless the id already carries the prefix
pub fn marked_id(id: &str) -> String {
    if id.starts_with(RESERVED_PREFIX) {
        id.to_string()
    } else {
        format!("{}{}", RESERVED_PREFIX, id)
    }
}

/// Body element for a topic without one, from its doctype or root name
pub fn body_element_for(doctype: Option<&str>, root_name: &str) -> &'static str {
    let kind = match doctype {
        Some(doctype) => {
            let lower = doctype.to_ascii_lowercase();
            if lower.contains("topic.dtd") {
                "topic"
            } else if lower.contains("task.dtd") {
                "task"
            } else if lower.contains("reference.dtd") {
                "reference"
            } else {
                "concept"
            }
        }
        None => root_name,
    };
    match kind {
        "topic" => "body",
        "task" => "taskbody",
        "reference" => "refbody",
        _ => "conbody",
    }
}

/// Render a document with a mini-TOC body, without touching the disk
pub fn render(document: &Document, child_hrefs: &[String]) -> Result<Synthesis> {
    let text = document.text()?;
    let tree = document.tree()?;
    let root = tree.root_element();
    if !root.children().any(|n| n.has_tag_name("title")) {
        return Err(Error::Other(format!(
            "{} has no title",
            document.path.display()
        )));
    }

    let bytes = document.source.bytes.as_slice();
    let (start_tag, tag_len, root_qname) = root_start_tag(document, &bytes[document.prolog_end..])?;
    let start_end = document.prolog_end + tag_len;

    let existing_body = root
        .children()
        .find(|n| BODY_ELEMENTS.iter().any(|name| n.has_tag_name(*name)));
    let body_element = match existing_body {
        Some(body) => body.tag_name().name().to_string(),
        None => body_element_for(document.doctype.as_deref(), &document.root_name).to_string(),
    };
    let body = body_xml(&body_element, &document.path, child_hrefs);

    let mut out = Vec::with_capacity(bytes.len() + body.len());
    out.extend_from_slice(document.prolog());
    out.extend(start_tag);
    for child in root.children() {
        if existing_body == Some(child) {
            out.extend_from_slice(body.as_bytes());
            continue;
        }
        if child.is_element() || child.is_comment() {
            out.extend_from_slice(b"\n  ");
            out.extend_from_slice(text[child.range()].as_bytes());
        }
    }
    if existing_body.is_none() {
        out.extend_from_slice(body.as_bytes());
    }
    out.extend_from_slice(format!("\n</{}>", root_qname).as_bytes());
    out.extend_from_slice(&bytes[root.range().end.max(start_end)..]);

    let original_id = document.top_id.clone();
    let new_id = original_id.as_deref().map(marked_id);
    debug!(
        "{}: <{}> with {} entries, id {:?} -> {:?}",
        document.path.display(),
        body_element,
        child_hrefs.len(),
        original_id,
        new_id
    );

    Ok(Synthesis {
        path: document.path.clone(),
        original_id,
        new_id,
        body_element,
        entries: child_hrefs.to_vec(),
        output: document.source.restore(out),
    })
}

/// The root start tag with its id marked, the length of the original tag,
/// and the root's qualified name
fn root_start_tag(document: &Document, root_bytes: &[u8]) -> Result<(Vec<u8>, usize, String)> {
    let mut reader = Reader::from_reader(root_bytes);
    reader.trim_text(false);
    reader.check_end_names(false);

    let parse_error = |message: String| {
        Error::Parse(
            ParseError::new(message)
                .with_path(&document.path)
                .with_position(document.prolog_end),
        )
    };

    let start = match reader.read_event().map_err(|e| parse_error(e.to_string()))? {
        Event::Start(start) => start,
        _ => return Err(parse_error("root element has no content".to_string())),
    };
    let end = reader.buffer_position();
    let qname = String::from_utf8_lossy(start.name().as_ref()).into_owned();

    let mut tag = TagEdit::default();
    for attr in start.attributes().with_checks(false) {
        let attr = attr.map_err(|e| parse_error(e.to_string()))?;
        let value = attribute_value(&attr);
        let replacement = match attr.key.as_ref() {
            b"id" if !value.starts_with(RESERVED_PREFIX) => Some(marked_id(&value)),
            _ => None,
        };
        tag.push(attr, value, replacement);
    }
    let rendered = if tag.is_changed() {
        tag.render(&start, false)?
    } else {
        root_bytes[..end].to_vec()
    };
    Ok((rendered, end, qname))
}

/// Indented body element, starting on a new line at depth one
fn body_xml(element: &str, path: &Path, child_hrefs: &[String]) -> String {
    let mut body = String::new();
    body.push_str(&format!("\n  <{}>", element));
    body.push_str(&format!("\n    <p>{}", INTRO_TEXT));
    body.push_str(&format!("\n      <ul id=\"{}\">", list_id(path, child_hrefs)));
    for href in child_hrefs {
        body.push_str(&format!("\n        <li><xref href=\"{}\"/></li>", escape(href)));
    }
    body.push_str("\n      </ul>");
    body.push_str("\n    </p>");
    body.push_str(&format!("\n  </{}>", element));
    body
}

/// Stable `ul_<12 hex>` id derived from the topic and its entries
fn list_id(path: &Path, child_hrefs: &[String]) -> String {
    let mut hasher = DefaultHasher::new();
    path.hash(&mut hasher);
    child_hrefs.hash(&mut hasher);
    format!("ul_{:012x}", hasher.finish() & 0xffff_ffff_ffff)
}
