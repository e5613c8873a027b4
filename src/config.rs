// Run configuration. There is no config file and there are no flags: every
// knob is an environment variable with a fixed default, the same way the
// API client picks up its base URL.

use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_CLIENT_SECRET: &str = "credentials-oauth.json";
pub const DEFAULT_TOKEN_DIR: &str = "token.json";
pub const DEFAULT_DRIVE_URL: &str = "https://www.googleapis.com";
pub const DEFAULT_PHOTOS_URL: &str = "https://photoslibrary.googleapis.com";
pub const DEFAULT_CONSENT_TIMEOUT: Duration = Duration::from_secs(300);
pub const DEFAULT_LOG_LEVEL: &str = "warn";

/// Everything a run needs to know before it talks to either service.
#[derive(Debug, Clone)]
pub struct Config {
    pub staging_root: PathBuf,
    pub client_secret_path: PathBuf,
    pub token_dir: PathBuf,
    pub consent_timeout: Duration,
    pub log_level: String,
    pub photos: PhotosLogin,
    pub drive_url: String,
    pub photos_url: String,
}

/// Login parameters for the photo service. Client id and secret fall back
/// to the ones in the client secret file when left unset.
#[derive(Debug, Clone, Default)]
pub struct PhotosLogin {
    pub user: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| non_blank(&lookup, key);

        let consent_timeout = match get("DRIVE2PHOTO_CONSENT_TIMEOUT_SECS") {
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(secs) => Duration::from_secs(secs),
                Err(_) => {
                    tracing::warn!(value = %raw, "ignoring unparsable consent timeout");
                    DEFAULT_CONSENT_TIMEOUT
                }
            },
            None => DEFAULT_CONSENT_TIMEOUT,
        };

        Config {
            staging_root: get("DRIVE2PHOTO_STAGING_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|| std::env::temp_dir().join("GooglePhotos")),
            client_secret_path: get("DRIVE2PHOTO_CLIENT_SECRET")
                .unwrap_or_else(|| DEFAULT_CLIENT_SECRET.into())
                .into(),
            token_dir: get("DRIVE2PHOTO_TOKEN_DIR")
                .unwrap_or_else(|| DEFAULT_TOKEN_DIR.into())
                .into(),
            consent_timeout,
            log_level: log_level_from(&lookup),
            photos: PhotosLogin {
                user: get("GOOGLE_PHOTOS_USER"),
                client_id: get("GOOGLE_PHOTOS_CLIENT_ID"),
                client_secret: get("GOOGLE_PHOTOS_CLIENT_SECRET"),
            },
            drive_url: get("DRIVE_API_URL").unwrap_or_else(|| DEFAULT_DRIVE_URL.into()),
            photos_url: get("PHOTOS_API_URL").unwrap_or_else(|| DEFAULT_PHOTOS_URL.into()),
        }
    }
}

fn non_blank<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).filter(|v| !v.trim().is_empty())
}

/// The log level alone, so logging can be up before the rest of the
/// configuration is read and its warnings have somewhere to go.
pub fn log_level_from_env() -> String {
    log_level_from(&|key: &str| std::env::var(key).ok())
}

pub fn log_level_from<F>(lookup: &F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    non_blank(lookup, "DRIVE2PHOTO_LOG").unwrap_or_else(|| DEFAULT_LOG_LEVEL.into())
}
