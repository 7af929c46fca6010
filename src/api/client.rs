use crate::api::TorrentApi;
use crate::core::error::ApiError;
use crate::models::profile::ConnectionSettings;
use crate::models::torrent::{
    AddSource, AddTorrent, BulkAction, Category, StatusFilter, TorrentFile, TorrentSnapshot,
    TrackerEntry,
};
use async_trait::async_trait;
use reqwest::header::{COOKIE, SET_COOKIE};
use reqwest::multipart::{Form, Part};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

const TORRENT_MIME: &str = "application/x-bittorrent";

/// Client for the qBittorrent Web API (v2)
///
/// The daemon authenticates with a session cookie issued by `auth/login`.
/// The cookie is kept here rather than in a shared jar so that logging out
/// or switching profiles always starts from a clean session.
pub struct QbitClient {
    client: reqwest::Client,
    base: String,
    connection: ConnectionSettings,
    cookie: Mutex<Option<String>>,
    authenticated: AtomicBool,
}

impl QbitClient {
    pub fn new(connection: ConnectionSettings) -> Result<Self, ApiError> {
        let base = connection.api_base();
        Url::parse(&base).map_err(|e| ApiError::InvalidHost {
            host: connection.host.clone(),
            reason: e.to_string(),
        })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(connection.timeout.max(1)))
            .danger_accept_invalid_certs(!connection.verify_ssl)
            .build()
            .map_err(|source| ApiError::Transport {
                endpoint: base.clone(),
                source,
            })?;

        Ok(Self {
            client,
            base,
            connection,
            cookie: Mutex::new(None),
            authenticated: AtomicBool::new(false),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base, path.trim_start_matches('/'))
    }

    fn session_cookie(&self) -> Option<String> {
        self.cookie
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn invalidate(&self) {
        self.authenticated.store(false, Ordering::SeqCst);
        *self.cookie.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Send a request with the session cookie and map failure statuses
    async fn send(&self, path: &str, request: RequestBuilder) -> Result<Response, ApiError> {
        let request = match self.session_cookie() {
            Some(cookie) => request.header(COOKIE, cookie),
            None => request,
        };

        let response = request.send().await.map_err(|source| ApiError::Transport {
            endpoint: path.to_string(),
            source,
        })?;

        let status = response.status();
        if status == StatusCode::FORBIDDEN || status == StatusCode::UNAUTHORIZED {
            debug!(endpoint = path, status = status.as_u16(), "Session rejected");
            self.invalidate();
            return Err(ApiError::session_expired());
        }

        if status.is_client_error() || status.is_server_error() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Api {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response)
    }

    async fn text(path: &str, response: Response) -> Result<String, ApiError> {
        response.text().await.map_err(|source| ApiError::Transport {
            endpoint: path.to_string(),
            source,
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, ApiError> {
        let response = self
            .send(path, self.client.get(self.url(path)).query(query))
            .await?;
        let body = Self::text(path, response).await?;
        serde_json::from_str(&body).map_err(|source| ApiError::Decode {
            endpoint: path.to_string(),
            source,
        })
    }

    async fn post_form(&self, path: &str, form: &[(&str, String)]) -> Result<Response, ApiError> {
        self.send(path, self.client.post(self.url(path)).form(form))
            .await
    }

    /// The daemon answers some writes with `200 Fails.` instead of an error status
    async fn expect_accepted(path: &str, response: Response) -> Result<(), ApiError> {
        let status = response.status().as_u16();
        let body = Self::text(path, response).await?;
        if body.trim() == "Fails." {
            return Err(ApiError::Api { status, body });
        }
        Ok(())
    }

    fn optional_fields(request: &AddTorrent) -> Vec<(&'static str, String)> {
        let mut fields = Vec::new();
        if let Some(category) = request.category.as_deref().filter(|c| !c.is_empty()) {
            fields.push(("category", category.to_string()));
        }
        if let Some(save_path) = request.save_path.as_deref().filter(|p| !p.is_empty()) {
            fields.push(("savepath", save_path.to_string()));
        }
        fields
    }
}

/// `Set-Cookie` values reduced to the `name=value` pairs a `Cookie` header carries
fn cookie_header(response: &Response) -> Option<String> {
    let pairs: Vec<String> = response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(|value| value.split(';').next())
        .map(|pair| pair.trim().to_string())
        .filter(|pair| !pair.is_empty())
        .collect();

    if pairs.is_empty() {
        None
    } else {
        Some(pairs.join("; "))
    }
}

#[async_trait]
impl TorrentApi for QbitClient {
    fn is_authenticated(&self) -> bool {
        self.authenticated.load(Ordering::SeqCst)
    }

    async fn login(&self) -> Result<(), ApiError> {
        let path = "auth/login";
        let form = [
            ("username", self.connection.username.clone()),
            ("password", self.connection.password.clone()),
        ];
        let response = self.post_form(path, &form).await?;
        let cookie = cookie_header(&response);
        let body = Self::text(path, response).await?;

        if !body.contains("Ok.") {
            self.invalidate();
            return Err(ApiError::Auth("Invalid username or password".to_string()));
        }

        *self.cookie.lock().unwrap_or_else(PoisonError::into_inner) = cookie;
        self.authenticated.store(true, Ordering::SeqCst);
        info!(host = %self.connection.host, "Logged in");
        Ok(())
    }

    async fn logout(&self) -> Result<(), ApiError> {
        let result = self.post_form("auth/logout", &[]).await;
        self.invalidate();
        result.map(|_| ())
    }

    async fn list(&self, filter: StatusFilter) -> Result<Vec<TorrentSnapshot>, ApiError> {
        self.get_json("torrents/info", &[("filter", filter.as_str())])
            .await
    }

    async fn categories(&self) -> Result<BTreeMap<String, Category>, ApiError> {
        self.get_json("torrents/categories", &[]).await
    }

    async fn add(&self, request: &AddTorrent) -> Result<(), ApiError> {
        let path = "torrents/add";
        let response = match &request.source {
            AddSource::Url(url) => {
                if url.trim().is_empty() {
                    return Err(ApiError::Validation(
                        "Provide a magnet link or torrent file".to_string(),
                    ));
                }
                let mut form = vec![("urls", url.trim().to_string())];
                form.extend(Self::optional_fields(request));
                self.post_form(path, &form).await?
            }
            AddSource::File(file) => {
                if !file.exists() {
                    return Err(ApiError::NotFound(file.clone()));
                }
                let bytes = tokio::fs::read(file).await.map_err(|e| {
                    ApiError::Validation(format!("Cannot read '{}': {}", file.display(), e))
                })?;
                let file_name = file
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "upload.torrent".to_string());
                let part = Part::bytes(bytes)
                    .file_name(file_name)
                    .mime_str(TORRENT_MIME)
                    .map_err(|source| ApiError::Transport {
                        endpoint: path.to_string(),
                        source,
                    })?;

                let mut form = Form::new().part("torrents", part);
                for (key, value) in Self::optional_fields(request) {
                    form = form.text(key, value);
                }
                self.send(path, self.client.post(self.url(path)).multipart(form))
                    .await?
            }
        };
        Self::expect_accepted(path, response).await
    }

    async fn bulk_action(&self, action: BulkAction, hashes: &[String]) -> Result<(), ApiError> {
        let hashes: Vec<&str> = hashes
            .iter()
            .map(|hash| hash.trim())
            .filter(|hash| !hash.is_empty())
            .collect();
        if hashes.is_empty() {
            return Err(ApiError::Validation(
                "At least one torrent hash is required".to_string(),
            ));
        }

        let mut form = vec![("hashes", hashes.join("|"))];
        if let BulkAction::Delete { delete_files } = action {
            form.push(("deleteFiles", delete_files.to_string()));
        }

        debug!(endpoint = action.endpoint(), count = hashes.len(), "Bulk action");
        self.post_form(action.endpoint(), &form).await?;
        Ok(())
    }

    async fn properties(
        &self,
        hash: &str,
    ) -> Result<serde_json::Map<String, serde_json::Value>, ApiError> {
        self.get_json("torrents/properties", &[("hash", hash)]).await
    }

    async fn trackers(&self, hash: &str) -> Result<Vec<TrackerEntry>, ApiError> {
        self.get_json("torrents/trackers", &[("hash", hash)]).await
    }

    async fn files(&self, hash: &str) -> Result<Vec<TorrentFile>, ApiError> {
        self.get_json("torrents/files", &[("hash", hash)]).await
    }
}
