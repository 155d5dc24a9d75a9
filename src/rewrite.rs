//! Reference rewriting
//!
//! Applies a [`RenamePlan`] to a corpus. Each file is streamed once with
//! quick-xml; only start tags whose `id`, `href` or `conref` actually change
//! are re-rendered, every other byte (prolog, comments, whitespace, entity
//! spelling, attribute quoting) is copied through untouched.
//!
//! A file is written only if something changed, and it is backed up into
//! escrow before that first write. Failures are per file: they are counted
//! and reported, never allowed to stop the rest of the run.

use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use log::{debug, info, warn};
use quick_xml::events::attributes::Attribute;
use quick_xml::events::{BytesStart, Event};
use quick_xml::{Reader, Writer};

use crate::corpus::Corpus;
use crate::dedup::RenamePlan;
use crate::documents::{attribute_value, element_name};
use crate::error::{Error, ParseError, Result};
use crate::escrow::{Escrow, OperationKind};
use crate::loaders::{Loader, Source};
use crate::locations::{resolve_path, Reference};

/// Elements whose `href` is a reference that can point at a renamed id
pub const REFERENCE_ELEMENTS: &[&str] = &[
    "xref", "link", "topicref", "chapter", "appendix", "part", "mapref",
];

/// Outcome of rewriting one file in memory
#[derive(Debug, Clone)]
pub struct FileRewrite {
    /// File that was processed
    pub path: PathBuf,
    /// Number of `id` attributes changed
    pub ids_renamed: usize,
    /// Changed reference values, `(before, after)`
    pub references_updated: Vec<(String, String)>,
    /// New file content, BOM included
    pub output: Vec<u8>,
}

impl FileRewrite {
    /// Whether the output differs from the input
    pub fn is_changed(&self) -> bool {
        self.ids_renamed > 0 || !self.references_updated.is_empty()
    }
}

/// Counts returned to the caller of a deduplication run
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct DedupReport {
    /// Duplicate occurrences the plan renamed
    pub duplicates_fixed: usize,
    /// Files written back to disk
    pub files_modified: usize,
    /// False if a backup or the audit log could not be written
    pub log_success: bool,
    /// One message per file that could not be rewritten
    pub errors: Vec<String>,
}

impl DedupReport {
    /// Short user-facing summary
    pub fn summary(&self) -> String {
        format!(
            "Fixed {} duplicates in {} files",
            self.duplicates_fixed, self.files_modified
        )
    }
}

/// Streams files through a rename plan
#[derive(Debug)]
pub struct Rewriter<'a> {
    plan: &'a RenamePlan,
    loader: &'a Loader,
}

impl<'a> Rewriter<'a> {
    /// Create a rewriter
    pub fn new(plan: &'a RenamePlan, loader: &'a Loader) -> Self {
        Self { plan, loader }
    }

    /// Rewrite a file from disk without writing it back
    pub fn rewrite_file(&self, path: &Path) -> Result<FileRewrite> {
        let source = self.loader.load(path)?;
        self.rewrite_source(path, &source)
    }

    /// Rewrite already-loaded content
    pub fn rewrite_source(&self, path: &Path, source: &Source) -> Result<FileRewrite> {
        let bytes = source.bytes.as_slice();
        let base_dir = path.parent().unwrap_or_else(|| Path::new("/"));

        let mut reader = Reader::from_reader(bytes);
        reader.trim_text(false);
        reader.check_end_names(false);

        let mut out = Vec::with_capacity(bytes.len());
        let mut copied = 0;
        let mut last = 0;
        let mut seen: IndexMap<String, usize> = IndexMap::new();
        let mut ids_renamed = 0;
        let mut references_updated = Vec::new();

        loop {
            let event = reader.read_event().map_err(|e| {
                Error::Parse(
                    ParseError::new(e.to_string())
                        .with_path(path)
                        .with_position(reader.buffer_position()),
                )
            })?;
            let end = reader.buffer_position();
            let (start, empty) = match event {
                Event::Start(start) => (start, false),
                Event::Empty(start) => (start, true),
                Event::Eof => break,
                _ => {
                    last = end;
                    continue;
                }
            };

            let mut tag = TagEdit::default();
            let element = element_name(&start);
            for attr in start.attributes().with_checks(false) {
                let attr = attr.map_err(|e| {
                    Error::Parse(
                        ParseError::new(e.to_string())
                            .with_path(path)
                            .with_position(last),
                    )
                })?;
                let value = attribute_value(&attr);
                let replacement = match attr.key.as_ref() {
                    b"id" => {
                        let ordinal = seen.entry(value.clone()).or_insert(0);
                        let renamed = self.plan.occurrence(path, &value, *ordinal);
                        *ordinal += 1;
                        if renamed.is_some() {
                            ids_renamed += 1;
                        }
                        renamed.map(str::to_string)
                    }
                    b"conref" => self.rewrite_reference(path, base_dir, &value),
                    b"href" if REFERENCE_ELEMENTS.contains(&element.as_str()) => {
                        self.rewrite_reference(path, base_dir, &value)
                    }
                    _ => None,
                };
                if let Some(ref new_value) = replacement {
                    if attr.key.as_ref() != b"id" {
                        references_updated.push((value.clone(), new_value.clone()));
                    }
                }
                tag.push(attr, value, replacement);
            }

            if tag.is_changed() {
                out.extend_from_slice(&bytes[copied..last]);
                out.extend(tag.render(&start, empty)?);
                copied = end;
            }
            last = end;
        }
        out.extend_from_slice(&bytes[copied..]);

        if ids_renamed > 0 || !references_updated.is_empty() {
            debug!(
                "{}: {} ids renamed, {} references updated",
                path.display(),
                ids_renamed,
                references_updated.len()
            );
        }

        Ok(FileRewrite {
            path: path.to_path_buf(),
            ids_renamed,
            references_updated,
            output: source.restore(out),
        })
    }

    /// New value for an `href`/`conref`, or `None` when it is unaffected
    fn rewrite_reference(&self, file: &Path, base_dir: &Path, value: &str) -> Option<String> {
        match Reference::parse(value) {
            Reference::Fragment(fragment) => self
                .plan
                .rewrite_fragment(&fragment, file)
                .map(|f| format!("#{}", f)),
            Reference::CrossFile {
                path,
                fragment: Some(fragment),
            } => {
                let target = resolve_path(base_dir, &path).ok()?;
                let planned = self.plan.resolve_file(&target)?;
                let rewritten = self.plan.rewrite_fragment(&fragment, planned)?;
                let (raw_path, _) = value.trim().split_once('#')?;
                Some(format!("{}#{}", raw_path, rewritten))
            }
            _ => None,
        }
    }
}

/// Attributes of one start tag, with replacements recorded
#[derive(Default)]
pub(crate) struct TagEdit<'a> {
    attributes: Vec<(Attribute<'a>, String, Option<String>)>,
    changed: bool,
}

impl<'a> TagEdit<'a> {
    pub(crate) fn push(&mut self, attr: Attribute<'a>, value: String, replacement: Option<String>) {
        self.changed |= replacement.is_some();
        self.attributes.push((attr, value, replacement));
    }

    pub(crate) fn is_changed(&self) -> bool {
        self.changed
    }

    pub(crate) fn render(self, original: &BytesStart, empty: bool) -> Result<Vec<u8>> {
        let name = String::from_utf8_lossy(original.name().as_ref()).into_owned();
        let mut tag = BytesStart::new(name);
        for (attr, value, replacement) in self.attributes {
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            match replacement {
                Some(new_value) => tag.push_attribute((key.as_str(), new_value.as_str())),
                // raw values are re-quoted with `"`, so re-escape those holding one
                None if attr.value.contains(&b'"') => {
                    tag.push_attribute((key.as_str(), value.as_str()))
                }
                None => tag.push_attribute(attr),
            }
        }

        let mut writer = Writer::new(Vec::new());
        if empty {
            writer.write_event(Event::Empty(tag))?;
        } else {
            writer.write_event(Event::Start(tag))?;
        }
        Ok(writer.into_inner())
    }
}

/// Apply a rename plan to every file of the corpus
pub fn apply(
    corpus: &Corpus,
    plan: &RenamePlan,
    loader: &Loader,
    escrow: &mut Escrow,
) -> DedupReport {
    let mut report = DedupReport {
        duplicates_fixed: plan.duplicates_fixed(),
        log_success: true,
        ..DedupReport::default()
    };
    if plan.is_empty() {
        return report;
    }

    let rewriter = Rewriter::new(plan, loader);
    let mut log_lines = Vec::new();

    for path in corpus.files() {
        let rewrite = match rewriter.rewrite_file(path) {
            Ok(rewrite) => rewrite,
            Err(Error::Parse(e)) => {
                debug!("skipping malformed file: {}", e);
                continue;
            }
            Err(e) => {
                warn!("cannot rewrite {}: {}", path.display(), e);
                report.errors.push(format!("{}: {}", path.display(), e));
                continue;
            }
        };
        if !rewrite.is_changed() {
            continue;
        }

        if !escrow.ensure_backup(path) {
            report.log_success = false;
        }
        if let Err(e) = fs::write(path, &rewrite.output) {
            warn!("cannot write {}: {}", path.display(), e);
            report.errors.push(format!("{}: {}", path.display(), e));
            continue;
        }
        info!("saved {}", path.display());
        report.files_modified += 1;

        if !rewrite.references_updated.is_empty() {
            let changes: Vec<String> = rewrite
                .references_updated
                .iter()
                .map(|(before, after)| format!("{} -> {}", before, after))
                .collect();
            log_lines.push(escrow.entry(
                path,
                &format!("Updated references: {}", changes.join(", ")),
            ));
        }
    }

    if !escrow.append_log(OperationKind::DuplicateIds, &log_lines) {
        report.log_success = false;
    }
    report
}
