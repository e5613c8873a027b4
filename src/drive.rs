// Google Drive side: folder lookup by exact name, first-page listing of the
// image/video children, and content download.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs::File;
use std::path::Path;

use crate::auth::Session;
use crate::backend::{FolderResolution, MediaSource};
use crate::error::Error;

pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

const LIST_FIELDS: &str = "nextPageToken, files(id, name, mimeType)";

/// A file (or folder) record from a Drive listing.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DriveFile {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub mime_type: String,
}

impl DriveFile {
    pub fn is_media(&self) -> bool {
        self.mime_type.starts_with("image/") || self.mime_type.starts_with("video/")
    }
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct FileList {
    #[serde(default)]
    files: Vec<DriveFile>,
    next_page_token: Option<String>,
}

/// Escape a value for use inside a single-quoted Drive query string.
pub fn quote(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('\'', "\\'");
    format!("'{}'", escaped)
}

pub fn folder_query(name: &str) -> String {
    format!("name = {} and mimeType = '{}'", quote(name), FOLDER_MIME_TYPE)
}

pub fn media_query(folder_id: &str) -> String {
    format!(
        "{} in parents and (mimeType contains 'image/' or mimeType contains 'video/')",
        quote(folder_id)
    )
}

#[derive(Debug)]
pub struct DriveClient {
    session: Session,
    base_url: String,
}

impl DriveClient {
    pub fn new(session: Session, base_url: &str) -> Self {
        DriveClient {
            session,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Run one `files.list` query and return the first page only.
    fn list(&self, query: &str) -> Result<Vec<DriveFile>> {
        let url = format!("{}/drive/v3/files", self.base_url);
        tracing::debug!(query, "drive files.list");
        let res = self
            .session
            .get(&url)
            .query(&[("q", query), ("fields", LIST_FIELDS)])
            .send()
            .context("Failed to send Drive list request")?;
        if !res.status().is_success() {
            return Err(Error::from_response("drive", res).into());
        }
        let list: FileList = res.json().context("Parsing Drive file list json")?;
        if list.next_page_token.as_deref().is_some_and(|t| !t.is_empty()) {
            tracing::warn!(query, "listing has more pages; only the first is used");
        }
        Ok(list.files)
    }
}

impl MediaSource for DriveClient {
    fn resolve_folder(&self, name: &str) -> Result<FolderResolution> {
        let mut folders = self.list(&folder_query(name))?;
        Ok(match folders.len() {
            0 => FolderResolution::NotFound,
            1 => FolderResolution::Found(folders.remove(0)),
            n => FolderResolution::Ambiguous(n),
        })
    }

    fn list_media(&self, folder_id: &str) -> Result<Vec<DriveFile>> {
        let files = self.list(&media_query(folder_id))?;
        Ok(files.into_iter().filter(DriveFile::is_media).collect())
    }

    fn download(&self, file: &DriveFile, dest: &Path) -> Result<()> {
        let url = format!("{}/drive/v3/files/{}", self.base_url, file.id);
        tracing::debug!(id = %file.id, dest = %dest.display(), "drive download");
        let mut res = self
            .session
            .get(&url)
            .query(&[("alt", "media")])
            .send()
            .with_context(|| format!("Failed to send download request for {}", file.name))?;
        if !res.status().is_success() {
            return Err(Error::from_response("drive", res).into());
        }
        let mut out = File::create(dest)
            .with_context(|| format!("Failed to create {}", dest.display()))?;
        res.copy_to(&mut out)
            .with_context(|| format!("Failed to write {}", dest.display()))?;
        Ok(())
    }
}
