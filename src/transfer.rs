// Transfer loop: download each listed file into the staging directory,
// upload it, and move it under `failed/` when the upload does not go
// through. Upload failures are recorded per file; download failures end
// the run.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::backend::{MediaSource, PhotoLibrary};
use crate::drive::DriveFile;
use crate::photos::Album;

pub const FAILED_DIR: &str = "failed";

/// Make a remote name safe to use as a single path component.
pub fn sanitize_component(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if c == '/' || c == '\\' || c == '\0' { '_' } else { c })
        .collect();
    match cleaned.as_str() {
        "" | "." | ".." => "_".repeat(cleaned.len().max(1)),
        _ => cleaned,
    }
}

/// Local name for a remote file. It must not land on the `failed/`
/// directory itself.
fn staged_name(file_name: &str) -> String {
    let name = sanitize_component(file_name);
    if name == FAILED_DIR {
        format!("{}_", name)
    } else {
        name
    }
}

/// `<root>/<folder>/` for staged files, `<root>/<folder>/failed/` for the
/// ones whose upload failed.
#[derive(Debug, Clone)]
pub struct StagingArea {
    dir: PathBuf,
}

impl StagingArea {
    pub fn new(root: &Path, folder_name: &str) -> Self {
        StagingArea {
            dir: root.join(sanitize_component(folder_name)),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn failed_dir(&self) -> PathBuf {
        self.dir.join(FAILED_DIR)
    }

    pub fn staged_path(&self, file_name: &str) -> PathBuf {
        self.dir.join(staged_name(file_name))
    }

    pub fn failed_path(&self, file_name: &str) -> PathBuf {
        self.failed_dir().join(staged_name(file_name))
    }

    pub fn prepare(&self) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create staging directory {}", self.dir.display()))
    }

    /// Move a staged file under `failed/`, creating that directory on demand.
    pub fn quarantine(&self, file_name: &str) -> Result<PathBuf> {
        let failed_dir = self.failed_dir();
        fs::create_dir_all(&failed_dir)
            .with_context(|| format!("Failed to create {}", failed_dir.display()))?;
        let from = self.staged_path(file_name);
        let to = self.failed_path(file_name);
        fs::rename(&from, &to)
            .with_context(|| format!("Failed to move {} to {}", from.display(), to.display()))?;
        Ok(to)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TransferStatus {
    Uploaded { media_item_id: String },
    Failed { reason: String },
}

/// What happened to one file. `path` is where the local copy ended up.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferRecord {
    pub file: DriveFile,
    pub path: PathBuf,
    pub status: TransferStatus,
}

impl TransferRecord {
    pub fn is_uploaded(&self) -> bool {
        matches!(self.status, TransferStatus::Uploaded { .. })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransferSummary {
    pub records: Vec<TransferRecord>,
}

impl TransferSummary {
    pub fn uploaded(&self) -> usize {
        self.records.iter().filter(|r| r.is_uploaded()).count()
    }

    pub fn failed(&self) -> impl Iterator<Item = &TransferRecord> {
        self.records.iter().filter(|r| !r.is_uploaded())
    }
}

/// Progress hooks for whoever is watching the run.
pub trait TransferObserver {
    fn album_resolved(&self, _album: &Album) {}
    fn file_started(&self, _index: usize, _total: usize, _file: &DriveFile) {}
    fn file_finished(&self, _record: &TransferRecord) {}
}

/// Observer that ignores everything.
pub struct Silent;

impl TransferObserver for Silent {}

pub fn transfer_all<S, L>(
    source: &S,
    library: &L,
    staging: &StagingArea,
    album_id: &str,
    files: &[DriveFile],
    observer: &dyn TransferObserver,
) -> Result<TransferSummary>
where
    S: MediaSource + ?Sized,
    L: PhotoLibrary + ?Sized,
{
    let mut summary = TransferSummary::default();

    for (index, file) in files.iter().enumerate() {
        observer.file_started(index, files.len(), file);
        let staged = staging.staged_path(&file.name);

        source
            .download(file, &staged)
            .with_context(|| format!("Failed to download {}", file.name))?;

        let record = match library.upload(&staged, album_id) {
            Ok(media_item_id) => {
                tracing::info!(file = %file.name, %media_item_id, "uploaded");
                TransferRecord {
                    file: file.clone(),
                    path: staged,
                    status: TransferStatus::Uploaded { media_item_id },
                }
            }
            Err(e) => {
                let reason = format!("{:#}", e);
                tracing::warn!(file = %file.name, %reason, "upload failed, moving to failed/");
                let moved = staging.quarantine(&file.name)?;
                TransferRecord {
                    file: file.clone(),
                    path: moved,
                    status: TransferStatus::Failed { reason },
                }
            }
        };

        observer.file_finished(&record);
        summary.records.push(record);
    }

    Ok(summary)
}
