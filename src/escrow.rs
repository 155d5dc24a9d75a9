//! Backup and audit log sink
//!
//! Before a file is changed for the first time, its bytes are copied to
//! `<root>/<escrow>/<relative path>`. An existing escrow copy is never
//! replaced, so the escrow always holds the content from before any tool
//! touched the file.
//!
//! The audit log (`<escrow>/Log.txt`) is append-only. Each operation kind
//! writes a `---` header the first time it logs something through a given
//! [`Escrow`]; keep one `Escrow` per run (or per GUI session) to control
//! when headers repeat.

use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};

use chrono::Local;
use indexmap::IndexSet;
use log::{debug, warn};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::locations::relative_display;

/// Logical operation writing to the audit log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    /// Duplicate identifier resolution
    DuplicateIds,
    /// Mini-TOC synthesis for empty headings
    EmptyHeadingFix,
    /// Unreferenced topics moved to escrow
    UnreferencedDeletion,
}

impl OperationKind {
    /// Header text for the audit log
    pub fn title(&self) -> &'static str {
        match self {
            OperationKind::DuplicateIds => "Duplicate ID Fix Log",
            OperationKind::EmptyHeadingFix => "Empty Heading Fix Log",
            OperationKind::UnreferencedDeletion => "File Deletion Log",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.title())
    }
}

/// Result of backing up one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupRecord {
    /// Path relative to the project root
    pub relative: PathBuf,
    /// Location of the escrow copy
    pub escrow_path: PathBuf,
    /// False when an earlier escrow copy was kept
    pub created: bool,
}

/// Escrow area of one project
#[derive(Debug, Clone)]
pub struct Escrow {
    root: PathBuf,
    dir: PathBuf,
    log_path: PathBuf,
    headered: IndexSet<OperationKind>,
}

impl Escrow {
    /// Escrow for a project root
    pub fn new(root: impl AsRef<Path>, config: &Config) -> Self {
        let root = root.as_ref().to_path_buf();
        let dir = root.join(&config.escrow_dir_name);
        let log_path = dir.join(&config.log_file_name);
        Self {
            root,
            dir,
            log_path,
            headered: IndexSet::new(),
        }
    }

    /// Project root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Escrow directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Audit log file
    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    /// Path of a file relative to the project root. Files outside the root
    /// (maps in the parent directory, for instance) mirror their absolute
    /// path under a directory named like the escrow itself, which the
    /// corpus walk never enters, so they cannot share a copy with a
    /// project file.
    pub fn relative_path(&self, file: &Path) -> PathBuf {
        match file.strip_prefix(&self.root) {
            Ok(relative) => relative.to_path_buf(),
            Err(_) => {
                let mut mirrored = self
                    .dir
                    .file_name()
                    .map(PathBuf::from)
                    .unwrap_or_default();
                mirrored.extend(file.components().filter_map(|c| match c {
                    Component::Normal(part) => Some(part),
                    _ => None,
                }));
                mirrored
            }
        }
    }

    /// Where the escrow copy of a file lives
    pub fn escrow_path(&self, file: &Path) -> PathBuf {
        self.dir.join(self.relative_path(file))
    }

    /// Copy a file into escrow unless a copy already exists
    pub fn backup(&self, file: &Path) -> Result<BackupRecord> {
        let relative = self.relative_path(file);
        let escrow_path = self.dir.join(&relative);
        if let Some(parent) = escrow_path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                Error::Escrow(format!("cannot create '{}': {}", parent.display(), e))
            })?;
        }

        let mut target = match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&escrow_path)
        {
            Ok(target) => target,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                debug!("escrow copy of {} already exists", relative.display());
                return Ok(BackupRecord {
                    relative,
                    escrow_path,
                    created: false,
                });
            }
            Err(e) => {
                return Err(Error::Escrow(format!(
                    "cannot create '{}': {}",
                    escrow_path.display(),
                    e
                )))
            }
        };

        let copied = File::open(file).and_then(|mut source| io::copy(&mut source, &mut target));
        if let Err(e) = copied {
            drop(target);
            let _ = fs::remove_file(&escrow_path);
            return Err(Error::Escrow(format!(
                "cannot copy '{}' to escrow: {}",
                file.display(),
                e
            )));
        }

        debug!("backed up {} to {}", file.display(), escrow_path.display());
        Ok(BackupRecord {
            relative,
            escrow_path,
            created: true,
        })
    }

    /// Back up a file, reporting failure as `false`
    pub fn ensure_backup(&self, file: &Path) -> bool {
        match self.backup(file) {
            Ok(_) => true,
            Err(e) => {
                warn!("backup failed: {}", e);
                false
            }
        }
    }

    /// Log line for a file: `<relative/path> - <action>`
    pub fn entry(&self, file: &Path, action: &str) -> String {
        let relative = relative_display(&self.root, file)
            .or_else(|| {
                let parent = self.root.parent()?;
                relative_display(parent, file).map(|rel| format!("../{}", rel))
            })
            .unwrap_or_else(|| file.display().to_string());
        format!("{} - {}", relative, action)
    }

    /// Append lines to the audit log, writing the kind's header first if
    /// this escrow has not written it yet
    pub fn write_log(&mut self, kind: OperationKind, lines: &[String]) -> Result<()> {
        if lines.is_empty() {
            return Ok(());
        }
        fs::create_dir_all(&self.dir).map_err(|e| {
            Error::Escrow(format!("cannot create '{}': {}", self.dir.display(), e))
        })?;

        let mut text = String::new();
        if !self.headered.contains(&kind) {
            text.push_str("-----------------------------\n");
            text.push_str(&format!(
                "{} ({}):\n",
                kind.title(),
                Local::now().format("%Y-%m-%d %H:%M:%S")
            ));
        }
        for line in lines {
            text.push_str(line);
            text.push('\n');
        }

        let mut log = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)
            .map_err(|e| {
                Error::Escrow(format!("cannot open '{}': {}", self.log_path.display(), e))
            })?;
        log.write_all(text.as_bytes()).map_err(|e| {
            Error::Escrow(format!("cannot write '{}': {}", self.log_path.display(), e))
        })?;

        self.headered.insert(kind);
        Ok(())
    }

    /// Append lines to the audit log, reporting failure as `false`
    pub fn append_log(&mut self, kind: OperationKind, lines: &[String]) -> bool {
        match self.write_log(kind, lines) {
            Ok(()) => true,
            Err(e) => {
                warn!("audit log not written: {}", e);
                false
            }
        }
    }

    /// Move a file into escrow. If an escrow copy already exists it is the
    /// older content and is kept; the live file is then just removed.
    pub fn stash(&self, file: &Path) -> Result<BackupRecord> {
        if !file.is_file() {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("file not found: {}", file.display()),
            )));
        }
        let relative = self.relative_path(file);
        let escrow_path = self.dir.join(&relative);
        if let Some(parent) = escrow_path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                Error::Escrow(format!("cannot create '{}': {}", parent.display(), e))
            })?;
        }

        if escrow_path.exists() {
            fs::remove_file(file)?;
            return Ok(BackupRecord {
                relative,
                escrow_path,
                created: false,
            });
        }

        if fs::rename(file, &escrow_path).is_err() {
            // rename fails across devices
            fs::copy(file, &escrow_path)?;
            fs::remove_file(file)?;
        }
        Ok(BackupRecord {
            relative,
            escrow_path,
            created: true,
        })
    }
}
