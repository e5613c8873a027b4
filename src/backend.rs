// The two service seams the run is written against. `DriveClient` and
// `PhotosClient` are the real implementations; tests swap in the fakes
// below.

use anyhow::Result;
use std::path::Path;

use crate::drive::DriveFile;
use crate::error::Error;
use crate::photos::Album;

/// Result of looking a folder up by exact name.
#[derive(Debug, Clone, PartialEq)]
pub enum FolderResolution {
    Found(DriveFile),
    NotFound,
    Ambiguous(usize),
}

/// Where media comes from.
pub trait MediaSource {
    fn resolve_folder(&self, name: &str) -> Result<FolderResolution>;
    /// Image and video children of a folder, first page only.
    fn list_media(&self, folder_id: &str) -> Result<Vec<DriveFile>>;
    /// Write the file's content to `dest`, replacing whatever is there.
    fn download(&self, file: &DriveFile, dest: &Path) -> Result<()>;
}

/// Where media goes.
pub trait PhotoLibrary {
    fn find_album(&self, title: &str) -> Result<Option<Album>>;
    fn create_album(&self, title: &str) -> Result<Album>;
    /// Upload one local file into an album, returning the new media item id.
    fn upload(&self, path: &Path, album_id: &str) -> Result<String>;

    fn get_or_create_album(&self, title: &str) -> Result<Album> {
        let found = self
            .find_album(title)
            .map_err(|e| e.context(Error::AlbumUnavailable(title.to_string())))?;
        if let Some(album) = found {
            return Ok(album);
        }
        self.create_album(title)
            .map_err(|e| e.context(Error::AlbumUnavailable(title.to_string())))
    }
}
