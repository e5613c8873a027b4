// OAuth for installed applications, delegated to yup-oauth2: the client
// secret file is parsed by the crate, and its installed flow handles the
// loopback redirect, the code exchange, refresh, and the on-disk token
// cache. The result is a `Session`, the authorized request context every
// API client is built from.

use anyhow::{Context, Result};
use reqwest::blocking::{Client, RequestBuilder};
use std::fmt;
use std::fs;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use yup_oauth2::authenticator_delegate::InstalledFlowDelegate;
use yup_oauth2::{ApplicationSecret, InstalledFlowAuthenticator, InstalledFlowReturnMethod};

use crate::error::Error;

pub const DRIVE_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/drive.readonly";

/// Parse a Google client secret file (`installed` or `web` layout).
pub fn read_client_secret(path: &Path) -> Result<ApplicationSecret> {
    let raw = fs::read(path).map_err(|e| Error::client_secret(path, e))?;
    let secret =
        yup_oauth2::parse_application_secret(raw).map_err(|e| Error::client_secret(path, e))?;
    Ok(secret)
}

/// Authorized request context: a shared HTTP client plus the bearer token.
#[derive(Clone)]
pub struct Session {
    http: Client,
    access_token: String,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("access_token", &"<redacted>")
            .finish_non_exhaustive()
    }
}

impl Session {
    pub fn new(http: Client, access_token: impl Into<String>) -> Self {
        Session {
            http,
            access_token: access_token.into(),
        }
    }

    pub fn get(&self, url: &str) -> RequestBuilder {
        self.http.get(url).bearer_auth(&self.access_token)
    }

    pub fn post(&self, url: &str) -> RequestBuilder {
        self.http.post(url).bearer_auth(&self.access_token)
    }
}

type Launcher = Arc<dyn Fn(&str) + Send + Sync>;

/// Shows the consent URL to the user. The redirect itself is caught by
/// the crate's loopback server, so no code is ever typed in.
struct BrowserDelegate {
    launcher: Launcher,
}

impl InstalledFlowDelegate for BrowserDelegate {
    fn present_user_url<'a>(
        &'a self,
        url: &'a str,
        _need_code: bool,
    ) -> Pin<Box<dyn Future<Output = Result<String, String>> + Send + 'a>> {
        (self.launcher)(url);
        Box::pin(async { Ok(String::new()) })
    }
}

fn open_in_browser(url: &str) {
    println!("Open this URL in your browser to authorize access:");
    println!("  {}", url);
    if open::that(url).is_ok() {
        println!("Browser opened automatically.");
    }
}

/// Produces sessions for a given cache key and scope set.
pub struct Authenticator {
    http: Client,
    secret: ApplicationSecret,
    token_dir: PathBuf,
    consent_timeout: Duration,
    launcher: Launcher,
}

impl Authenticator {
    pub fn new(
        http: Client,
        secret: ApplicationSecret,
        token_dir: impl Into<PathBuf>,
        consent_timeout: Duration,
    ) -> Self {
        Authenticator {
            http,
            secret,
            token_dir: token_dir.into(),
            consent_timeout,
            launcher: Arc::new(open_in_browser),
        }
    }

    /// Replace what happens with the consent URL (defaults to printing it
    /// and opening the system browser).
    pub fn with_launcher(mut self, launcher: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.launcher = Arc::new(launcher);
        self
    }

    pub fn secret(&self) -> &ApplicationSecret {
        &self.secret
    }

    /// Token cache file for a key; one file per key keeps the Drive and
    /// Photos grants apart.
    pub fn token_path(&self, key: &str) -> PathBuf {
        let safe: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || "-_.@".contains(c) {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.token_dir.join(format!("{}.json", safe))
    }

    /// Cached token if still usable, refreshed token if possible, otherwise
    /// interactive consent. Runs the crate's async flow on a runtime owned
    /// by this call.
    pub fn authorize(&self, key: &str, scopes: &[&str]) -> Result<Session> {
        let rt = tokio::runtime::Runtime::new().context("Failed to start OAuth runtime")?;
        let access_token = rt.block_on(self.access_token(key, scopes))?;
        Ok(Session::new(self.http.clone(), access_token))
    }

    async fn access_token(&self, key: &str, scopes: &[&str]) -> Result<String> {
        fs::create_dir_all(&self.token_dir).with_context(|| {
            format!("Failed to create token directory {}", self.token_dir.display())
        })?;

        let auth = InstalledFlowAuthenticator::builder(
            self.secret.clone(),
            InstalledFlowReturnMethod::HTTPRedirect,
        )
        .persist_tokens_to_disk(self.token_path(key))
        .flow_delegate(Box::new(BrowserDelegate {
            launcher: self.launcher.clone(),
        }))
        .build()
        .await
        .context("Failed to set up OAuth authenticator")?;

        // A declined consent never reaches the redirect with a code, so it
        // ends here as well.
        let token = tokio::time::timeout(self.consent_timeout, auth.token(scopes))
            .await
            .map_err(|_| Error::ConsentAbandoned(self.consent_timeout))?
            .with_context(|| format!("Authorization for {} failed", key))?;

        tracing::debug!(key, "obtained access token");
        token
            .token()
            .map(str::to_string)
            .context("Authorization returned no access token")
    }
}
