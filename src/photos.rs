// Google Photos side: login, album find-or-create, and single-file upload
// (raw byte upload followed by mediaItems:batchCreate).

use anyhow::{bail, Context, Result};
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fs::File;
use std::path::Path;
use yup_oauth2::ApplicationSecret;

use crate::auth::{Authenticator, Session};
use crate::backend::PhotoLibrary;
use crate::config::PhotosLogin;
use crate::error::Error;

pub const PHOTOS_LIBRARY_SCOPE: &str = "https://www.googleapis.com/auth/photoslibrary";
pub const PHOTOS_SHARING_SCOPE: &str = "https://www.googleapis.com/auth/photoslibrary.sharing";

const ALBUM_PAGE_SIZE: &str = "50";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Album {
    pub id: String,
    #[serde(default)]
    pub title: String,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct AlbumPage {
    #[serde(default)]
    albums: Vec<Album>,
    next_page_token: Option<String>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct BatchCreateResponse {
    #[serde(default)]
    new_media_item_results: Vec<NewMediaItemResult>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct NewMediaItemResult {
    status: Option<ItemStatus>,
    media_item: Option<MediaItem>,
}

#[derive(Deserialize, Debug)]
struct ItemStatus {
    code: Option<i32>,
    message: Option<String>,
}

#[derive(Deserialize, Debug)]
struct MediaItem {
    id: String,
}

/// Application credentials for the photo service: the configured pair if
/// both halves are set, the client secret file's otherwise.
pub fn login_secrets(
    login: &PhotosLogin,
    file_secret: &ApplicationSecret,
) -> Result<ApplicationSecret> {
    match (&login.client_id, &login.client_secret) {
        (Some(id), Some(secret)) => Ok(ApplicationSecret {
            client_id: id.clone(),
            client_secret: secret.clone(),
            ..file_secret.clone()
        }),
        (None, None) => Ok(file_secret.clone()),
        _ => Err(Error::LoginFailed(
            "GOOGLE_PHOTOS_CLIENT_ID and GOOGLE_PHOTOS_CLIENT_SECRET must be set together".into(),
        )
        .into()),
    }
}

#[derive(Debug)]
pub struct PhotosClient {
    session: Session,
    base_url: String,
}

impl PhotosClient {
    pub fn new(session: Session, base_url: &str) -> Self {
        PhotosClient {
            session,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Log in as `user` with full library access. The token is cached per
    /// user, separately from the Drive one.
    pub fn login(auth: &Authenticator, user: Option<&str>, base_url: &str) -> Result<Self> {
        let user = user
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| Error::LoginFailed("GOOGLE_PHOTOS_USER is not set".into()))?;
        let session = auth
            .authorize(
                &format!("photos-{}", user),
                &[PHOTOS_LIBRARY_SCOPE, PHOTOS_SHARING_SCOPE],
            )
            .map_err(|e| e.context(Error::LoginFailed(format!("could not authorize {}", user))))?;
        tracing::info!(user, "logged in to Google Photos");
        Ok(PhotosClient::new(session, base_url))
    }

    fn upload_bytes(&self, path: &Path, file_name: &str) -> Result<String> {
        let mime = mime_guess::from_path(path).first_or_octet_stream();
        let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;

        let mut req = self
            .session
            .post(&format!("{}/v1/uploads", self.base_url))
            .header(CONTENT_TYPE, "application/octet-stream")
            .header("X-Goog-Upload-Content-Type", mime.essence_str())
            .header("X-Goog-Upload-Protocol", "raw");
        // Header values must be visible ASCII; the name is optional anyway.
        if file_name.chars().all(|c| c.is_ascii_graphic() || c == ' ') {
            req = req.header("X-Goog-Upload-File-Name", file_name);
        }

        let res = req.body(file).send().context("Failed to send upload request")?;
        if !res.status().is_success() {
            return Err(Error::from_response("photos", res).into());
        }
        let token = res.text().context("Reading upload token")?;
        if token.trim().is_empty() {
            bail!("Upload of {} returned an empty upload token", file_name);
        }
        Ok(token)
    }
}

impl PhotoLibrary for PhotosClient {
    fn find_album(&self, title: &str) -> Result<Option<Album>> {
        let url = format!("{}/v1/albums", self.base_url);
        let wanted = title.to_lowercase();
        let mut page_token: Option<String> = None;

        loop {
            let mut req = self.session.get(&url).query(&[("pageSize", ALBUM_PAGE_SIZE)]);
            if let Some(token) = &page_token {
                req = req.query(&[("pageToken", token)]);
            }
            let res = req.send().context("Failed to send album list request")?;
            if !res.status().is_success() {
                return Err(Error::from_response("photos", res).into());
            }
            let page: AlbumPage = res.json().context("Parsing album list json")?;
            let found = page
                .albums
                .into_iter()
                .find(|a| a.title.to_lowercase() == wanted);
            if let Some(album) = found {
                return Ok(Some(album));
            }
            match page.next_page_token {
                Some(next) if !next.is_empty() => page_token = Some(next),
                _ => return Ok(None),
            }
        }
    }

    fn create_album(&self, title: &str) -> Result<Album> {
        let url = format!("{}/v1/albums", self.base_url);
        let res = self
            .session
            .post(&url)
            .json(&json!({ "album": { "title": title } }))
            .send()
            .context("Failed to send album create request")?;
        if !res.status().is_success() {
            return Err(Error::from_response("photos", res).into());
        }
        let album: Album = res.json().context("Parsing created album json")?;
        tracing::info!(id = %album.id, title, "created album");
        Ok(album)
    }

    fn upload(&self, path: &Path, album_id: &str) -> Result<String> {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .with_context(|| format!("{} has no file name", path.display()))?;

        let upload_token = self.upload_bytes(path, &file_name)?;

        let res = self
            .session
            .post(&format!("{}/v1/mediaItems:batchCreate", self.base_url))
            .json(&json!({
                "albumId": album_id,
                "newMediaItems": [{
                    "simpleMediaItem": {
                        "uploadToken": upload_token,
                        "fileName": file_name,
                    }
                }]
            }))
            .send()
            .context("Failed to send batchCreate request")?;
        if !res.status().is_success() {
            return Err(Error::from_response("photos", res).into());
        }
        let body: BatchCreateResponse = res.json().context("Parsing batchCreate response json")?;
        let result = body
            .new_media_item_results
            .into_iter()
            .next()
            .with_context(|| format!("batchCreate returned no result for {}", file_name))?;

        if let Some(status) = &result.status {
            if status.code.unwrap_or(0) != 0 {
                bail!(
                    "Google Photos rejected {}: {}",
                    file_name,
                    status.message.as_deref().unwrap_or("unknown error")
                );
            }
        }
        let item = result
            .media_item
            .with_context(|| format!("batchCreate returned no media item for {}", file_name))?;
        Ok(item.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::blocking::Client;
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;
    use wiremock::matchers::{
        body_json, body_string, header, method, path, query_param, query_param_is_missing,
    };
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct TestServer {
        server: MockServer,
        rt: tokio::runtime::Runtime,
    }

    impl TestServer {
        fn start() -> Self {
            let rt = tokio::runtime::Runtime::new().unwrap();
            let server = rt.block_on(MockServer::start());
            TestServer { server, rt }
        }

        fn mount(&self, mock: Mock) {
            self.rt.block_on(mock.mount(&self.server));
        }

        fn client(&self) -> PhotosClient {
            PhotosClient::new(Session::new(Client::new(), "photos-token"), &self.server.uri())
        }

        fn requests_to(&self, wanted: &str) -> usize {
            self.rt
                .block_on(self.server.received_requests())
                .unwrap_or_default()
                .iter()
                .filter(|r| r.url.path() == wanted)
                .count()
        }
    }

    fn file_secret() -> ApplicationSecret {
        ApplicationSecret {
            client_id: "file-id".into(),
            client_secret: "file-secret".into(),
            auth_uri: "http://127.0.0.1:1/auth".into(),
            token_uri: "http://127.0.0.1:1/token".into(),
            redirect_uris: vec!["http://localhost".into()],
            ..Default::default()
        }
    }

    fn authenticator(dir: &TempDir, timeout_ms: u64) -> Authenticator {
        Authenticator::new(
            Client::new(),
            file_secret(),
            dir.path(),
            Duration::from_millis(timeout_ms),
        )
    }

    #[test]
    fn login_secrets_prefer_configured_pair() {
        let none = PhotosLogin::default();
        assert_eq!(login_secrets(&none, &file_secret()).unwrap().client_id, "file-id");

        let both = PhotosLogin {
            user: None,
            client_id: Some("own-id".into()),
            client_secret: Some("own-secret".into()),
        };
        let s = login_secrets(&both, &file_secret()).unwrap();
        assert_eq!(s.client_id, "own-id");
        assert_eq!(s.client_secret, "own-secret");
        assert_eq!(s.token_uri, "http://127.0.0.1:1/token");

        let half = PhotosLogin {
            user: None,
            client_id: Some("own-id".into()),
            client_secret: None,
        };
        let err = login_secrets(&half, &file_secret()).unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::LoginFailed(_))));
    }

    #[test]
    fn login_requires_a_user() {
        let dir = TempDir::new().unwrap();
        let auth = authenticator(&dir, 50).with_launcher(|_| panic!("no consent expected"));
        let err = PhotosClient::login(&auth, None, "http://unused").unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::LoginFailed(_))));
        assert!(fs::read_dir(dir.path()).unwrap().next().is_none());
    }

    #[test]
    fn abandoned_login_is_login_failed() {
        let dir = TempDir::new().unwrap();
        let auth = authenticator(&dir, 200).with_launcher(|_| {});
        let err = PhotosClient::login(&auth, Some("me@example.com"), "http://unused").unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::LoginFailed(_))));
        let abandoned = err
            .chain()
            .filter_map(|cause| cause.downcast_ref::<Error>())
            .any(|e| matches!(e, Error::ConsentAbandoned(_)));
        assert!(abandoned);
    }

    #[test]
    fn client_debug_does_not_leak_the_token() {
        let client = PhotosClient::new(Session::new(Client::new(), "photos-token"), "http://x/");
        let shown = format!("{:?}", client);
        assert!(shown.contains("http://x"));
        assert!(!shown.contains("photos-token"));
    }

    #[test]
    fn finds_album_on_a_later_page_ignoring_case() {
        let srv = TestServer::start();
        srv.mount(
            Mock::given(method("GET"))
                .and(path("/v1/albums"))
                .and(query_param_is_missing("pageToken"))
                .and(header("authorization", "Bearer photos-token"))
                .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                    "albums": [{ "id": "a1", "title": "Other" }],
                    "nextPageToken": "p2"
                }))),
        );
        srv.mount(
            Mock::given(method("GET"))
                .and(path("/v1/albums"))
                .and(query_param("pageToken", "p2"))
                .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                    "albums": [{ "id": "a2", "title": "Summer Trip" }]
                }))),
        );

        let album = srv.client().find_album("summer trip").unwrap().unwrap();
        assert_eq!(album.id, "a2");
    }

    #[test]
    fn get_or_create_creates_when_absent() {
        let srv = TestServer::start();
        srv.mount(
            Mock::given(method("GET"))
                .and(path("/v1/albums"))
                .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({}))),
        );
        srv.mount(
            Mock::given(method("POST"))
                .and(path("/v1/albums"))
                .and(body_json(serde_json::json!({ "album": { "title": "Trip" } })))
                .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                    "id": "new-album", "title": "Trip", "isWriteable": true
                }))),
        );

        let album = srv.client().get_or_create_album("Trip").unwrap();
        assert_eq!(
            album,
            Album {
                id: "new-album".into(),
                title: "Trip".into()
            }
        );
        assert_eq!(srv.requests_to("/v1/albums"), 2);
    }

    #[test]
    fn failed_album_creation_is_album_unavailable() {
        let srv = TestServer::start();
        srv.mount(
            Mock::given(method("GET"))
                .and(path("/v1/albums"))
                .respond_with(
                    ResponseTemplate::new(200).set_body_json(serde_json::json!({ "albums": [] })),
                ),
        );
        srv.mount(
            Mock::given(method("POST"))
                .and(path("/v1/albums"))
                .respond_with(ResponseTemplate::new(403).set_body_string("forbidden")),
        );

        let err = srv.client().get_or_create_album("Trip").unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::AlbumUnavailable(_))));
    }

    #[test]
    fn upload_sends_raw_bytes_then_creates_item() {
        let srv = TestServer::start();
        srv.mount(
            Mock::given(method("POST"))
                .and(path("/v1/uploads"))
                .and(header("X-Goog-Upload-Protocol", "raw"))
                .and(header("X-Goog-Upload-Content-Type", "image/jpeg"))
                .and(header("X-Goog-Upload-File-Name", "beach.jpg"))
                .and(body_string("jpeg bytes"))
                .respond_with(ResponseTemplate::new(200).set_body_string("upload-token-1")),
        );
        srv.mount(
            Mock::given(method("POST"))
                .and(path("/v1/mediaItems:batchCreate"))
                .and(body_json(serde_json::json!({
                    "albumId": "album-1",
                    "newMediaItems": [{
                        "simpleMediaItem": {
                            "uploadToken": "upload-token-1",
                            "fileName": "beach.jpg"
                        }
                    }]
                })))
                .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                    "newMediaItemResults": [{
                        "uploadToken": "upload-token-1",
                        "status": { "message": "Success" },
                        "mediaItem": { "id": "item-1" }
                    }]
                }))),
        );
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("beach.jpg");
        fs::write(&file, "jpeg bytes").unwrap();

        assert_eq!(srv.client().upload(&file, "album-1").unwrap(), "item-1");
    }

    #[test]
    fn rejected_item_status_is_an_error() {
        let srv = TestServer::start();
        srv.mount(
            Mock::given(method("POST"))
                .and(path("/v1/uploads"))
                .respond_with(ResponseTemplate::new(200).set_body_string("tok")),
        );
        srv.mount(
            Mock::given(method("POST"))
                .and(path("/v1/mediaItems:batchCreate"))
                .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                    "newMediaItemResults": [{
                        "uploadToken": "tok",
                        "status": { "code": 3, "message": "Failed: unsupported file type" }
                    }]
                }))),
        );
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("doc.heic");
        fs::write(&file, "x").unwrap();

        let err = srv.client().upload(&file, "album-1").unwrap_err();
        assert!(err.to_string().contains("unsupported file type"));
    }

    #[test]
    fn upload_http_failure_is_an_error() {
        let srv = TestServer::start();
        srv.mount(
            Mock::given(method("POST"))
                .and(path("/v1/uploads"))
                .respond_with(ResponseTemplate::new(500).set_body_string("backend error")),
        );
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("clip.mp4");
        fs::write(&file, "x").unwrap();

        let err = srv.client().upload(&file, "album-1").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::Api { status: 500, .. })
        ));
        assert_eq!(srv.requests_to("/v1/mediaItems:batchCreate"), 0);
    }
}
