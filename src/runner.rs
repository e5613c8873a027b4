// One run, top to bottom: resolve the folder, list its media, find or
// create the album, transfer everything. Written against the service
// traits so it does not care which backends it is driving.

use anyhow::{Context, Result};
use reqwest::blocking::Client;
use std::path::Path;
use std::time::Duration;

use crate::auth::{read_client_secret, Authenticator, DRIVE_READONLY_SCOPE};
use crate::backend::{FolderResolution, MediaSource, PhotoLibrary};
use crate::config::Config;
use crate::drive::DriveClient;
use crate::photos::{login_secrets, Album, PhotosClient};
use crate::transfer::{transfer_all, StagingArea, TransferObserver, TransferSummary};

#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    FolderNotFound,
    AmbiguousFolder { matches: usize },
    NoMedia,
    Completed { album: Album, summary: TransferSummary },
}

/// Authorize against both services. Either failing ends the run.
pub fn connect(config: &Config) -> Result<(DriveClient, PhotosClient)> {
    // Large videos outlive any fixed request timeout.
    let http = Client::builder()
        .connect_timeout(Duration::from_secs(30))
        .timeout(None::<Duration>)
        .build()
        .context("Failed to build HTTP client")?;
    let secret = read_client_secret(&config.client_secret_path)?;

    let drive_auth = Authenticator::new(
        http.clone(),
        secret.clone(),
        &config.token_dir,
        config.consent_timeout,
    );
    let drive_session = drive_auth.authorize("drive-user", &[DRIVE_READONLY_SCOPE])?;

    let photos_auth = Authenticator::new(
        http,
        login_secrets(&config.photos, &secret)?,
        &config.token_dir,
        config.consent_timeout,
    );
    let user = config.photos.user.as_deref();
    let photos = PhotosClient::login(&photos_auth, user, &config.photos_url)?;

    Ok((DriveClient::new(drive_session, &config.drive_url), photos))
}

/// Copy the media of the Drive folder named `folder_name` into the album of
/// the same name. Nothing touches the filesystem until the folder resolves
/// and has media in it.
pub fn run<S, L>(
    source: &S,
    library: &L,
    staging_root: &Path,
    folder_name: &str,
    observer: &dyn TransferObserver,
) -> Result<RunOutcome>
where
    S: MediaSource + ?Sized,
    L: PhotoLibrary + ?Sized,
{
    let folder = match source.resolve_folder(folder_name)? {
        FolderResolution::Found(folder) => folder,
        FolderResolution::NotFound => return Ok(RunOutcome::FolderNotFound),
        FolderResolution::Ambiguous(matches) => {
            return Ok(RunOutcome::AmbiguousFolder { matches })
        }
    };
    tracing::info!(id = %folder.id, name = %folder.name, "resolved folder");

    let files = source.list_media(&folder.id)?;
    if files.is_empty() {
        return Ok(RunOutcome::NoMedia);
    }
    tracing::info!(count = files.len(), "listed media");

    let album = library.get_or_create_album(folder_name)?;
    observer.album_resolved(&album);

    let staging = StagingArea::new(staging_root, folder_name);
    staging.prepare()?;

    let summary = transfer_all(source, library, &staging, &album.id, &files, observer)?;
    Ok(RunOutcome::Completed { album, summary })
}
