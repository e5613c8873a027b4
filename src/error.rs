// Error conditions a caller needs to tell apart. Everything else travels
// as a plain `anyhow::Error` with context attached at the failing step;
// these variants ride inside it and can be recovered with `downcast_ref`.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("client secret file {path} is unusable: {reason}")]
    ClientSecret { path: PathBuf, reason: String },

    #[error("no authorization response within {0:?}")]
    ConsentAbandoned(Duration),

    #[error("Google Photos login failed: {0}")]
    LoginFailed(String),

    #[error("album '{0}' could not be found or created")]
    AlbumUnavailable(String),

    #[error("{service} request failed: {status} - {body}")]
    Api {
        service: &'static str,
        status: u16,
        body: String,
    },
}

impl Error {
    pub fn client_secret(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::ClientSecret {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Build an `Api` error from a non-success response, consuming its body.
    pub fn from_response(service: &'static str, res: reqwest::blocking::Response) -> Self {
        let status = res.status().as_u16();
        let body = res.text().unwrap_or_else(|_| "".into());
        Self::Api {
            service,
            status,
            body,
        }
    }
}
