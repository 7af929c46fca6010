pub mod client;

use crate::core::error::ApiError;
use crate::models::profile::ConnectionSettings;
use crate::models::torrent::{
    AddTorrent, BulkAction, Category, StatusFilter, TorrentDetails, TorrentFile, TorrentSnapshot,
    TrackerEntry,
};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Operations of the remote daemon used by the pipeline
#[async_trait]
pub trait TorrentApi: Send + Sync {
    fn is_authenticated(&self) -> bool;

    async fn login(&self) -> Result<(), ApiError>;

    async fn logout(&self) -> Result<(), ApiError>;

    async fn list(&self, filter: StatusFilter) -> Result<Vec<TorrentSnapshot>, ApiError>;

    async fn categories(&self) -> Result<BTreeMap<String, Category>, ApiError>;

    async fn add(&self, request: &AddTorrent) -> Result<(), ApiError>;

    /// Fails with `ApiError::Validation` without a request when `hashes` is empty
    async fn bulk_action(&self, action: BulkAction, hashes: &[String]) -> Result<(), ApiError>;

    async fn properties(
        &self,
        hash: &str,
    ) -> Result<serde_json::Map<String, serde_json::Value>, ApiError>;

    async fn trackers(&self, hash: &str) -> Result<Vec<TrackerEntry>, ApiError>;

    async fn files(&self, hash: &str) -> Result<Vec<TorrentFile>, ApiError>;
}

/// Opens a fresh, unauthenticated API handle for a connection
pub trait Connector: Send + Sync {
    fn open(&self, connection: &ConnectionSettings) -> Result<Arc<dyn TorrentApi>, ApiError>;
}

/// Connector producing real HTTP clients
#[derive(Debug, Default, Clone, Copy)]
pub struct HttpConnector;

impl Connector for HttpConnector {
    fn open(&self, connection: &ConnectionSettings) -> Result<Arc<dyn TorrentApi>, ApiError> {
        Ok(Arc::new(client::QbitClient::new(connection.clone())?))
    }
}

/// Fetch properties, files and trackers of one torrent concurrently
pub async fn load_details(
    api: &dyn TorrentApi,
    hash: &str,
    name: &str,
) -> Result<TorrentDetails, ApiError> {
    let (properties, files, trackers) =
        tokio::try_join!(api.properties(hash), api.files(hash), api.trackers(hash))?;

    Ok(TorrentDetails {
        hash: hash.to_string(),
        name: name.to_string(),
        properties,
        files,
        trackers,
    })
}
