//! Topics no map node points at
//!
//! Unreferenced `.xml` files are listed, never deleted: moving one goes
//! through the escrow area so it can always be restored by hand.

use std::path::{Path, PathBuf};

use log::{debug, info};
use serde::Serialize;

use crate::config::Config;
use crate::corpus::walk_files;
use crate::error::Result;
use crate::escrow::{BackupRecord, Escrow, OperationKind};
use crate::locations::{absolutize, relative_display};
use crate::toc::map::DitaMap;

/// A file no map node references
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnreferencedFile {
    /// File name
    pub file_name: String,
    /// Folder relative to the scanned directory, `/`-separated, empty at
    /// the top
    pub folder: String,
    /// Absolute path
    pub path: PathBuf,
}

/// Every `.xml` file under `dir` (escrow excluded) that `map` does not
/// reference, in path order
pub fn find_unreferenced(map: &DitaMap, dir: &Path, config: &Config) -> Result<Vec<UnreferencedFile>> {
    let dir = absolutize(dir)?;
    let referenced = map.referenced_files();

    let unreferenced: Vec<UnreferencedFile> = walk_files(&dir, config)
        .into_iter()
        .filter(|path| {
            path.extension()
                .map(|ext| ext.eq_ignore_ascii_case("xml"))
                .unwrap_or(false)
        })
        .filter(|path| *path != map.path && !referenced.contains(path))
        .map(|path| {
            let folder = path
                .parent()
                .and_then(|parent| relative_display(&dir, parent))
                .unwrap_or_default();
            UnreferencedFile {
                file_name: path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default(),
                folder,
                path,
            }
        })
        .collect();

    debug!(
        "{} of the files under {} are not in {}",
        unreferenced.len(),
        dir.display(),
        map.path.display()
    );
    Ok(unreferenced)
}

/// Move a file into escrow and record it in the audit log
pub fn move_to_escrow(path: &Path, escrow: &mut Escrow) -> Result<BackupRecord> {
    let record = escrow.stash(path)?;
    info!("moved {} to {}", path.display(), record.escrow_path.display());
    let line = escrow.entry(
        path,
        &format!("Moved to {}", escrow.dir().display()),
    );
    escrow.write_log(OperationKind::UnreferencedDeletion, &[line])?;
    Ok(record)
}
