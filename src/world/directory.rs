//! Directory Service Client
//!
//! Best-effort HTTP client for the region directory. Lookups carry a short
//! timeout and failures are logged, never surfaced to players: the endpoint
//! cache simply keeps serving what it had.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::world::endpoint::{EndpointCache, EndpointUpdate};

/// Default directory lookup timeout.
pub const DIRECTORY_TIMEOUT: Duration = Duration::from_secs(2);

/// Default refresh interval of the endpoint cache.
pub const REFRESH_INTERVAL: Duration = Duration::from_secs(20);

/// One entry of `GET /directory/regions`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RegionStatus {
    /// Region (service) name.
    pub name: String,
    /// Liveness.
    pub online: bool,
    /// Cluster-internal TCP address.
    #[serde(deserialize_with = "null_as_empty")]
    pub cluster_tcp: String,
    /// Host-local TCP address.
    #[serde(deserialize_with = "null_as_empty")]
    pub local_tcp: String,
    /// Bounds, when the directory reports them.
    pub min_x: i32,
    /// Bounds, when the directory reports them.
    pub max_x: i32,
    /// Bounds, when the directory reports them.
    pub min_y: i32,
    /// Bounds, when the directory reports them.
    pub max_y: i32,
}

impl From<&RegionStatus> for EndpointUpdate {
    fn from(status: &RegionStatus) -> Self {
        EndpointUpdate {
            name: status.name.clone(),
            cluster_address: status.cluster_tcp.clone(),
            local_address: status.local_tcp.clone(),
            online: status.online,
        }
    }
}

/// Body of `POST /directory/resolve`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveRequest {
    /// Region the position belongs to.
    pub region_name: String,
    /// Column.
    pub x: i32,
    /// Row.
    pub y: i32,
    /// Ghost-zone width in tiles.
    pub ghost_zone_width: i32,
}

/// Response of `POST /directory/resolve`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResolveResponse {
    /// Region the directory thinks the position is in.
    #[serde(deserialize_with = "null_as_empty")]
    pub current_region: String,
    /// Whether that region is online.
    pub online: bool,
    /// Its cluster address.
    #[serde(deserialize_with = "null_as_empty")]
    pub cluster_tcp: String,
    /// Its local address.
    #[serde(deserialize_with = "null_as_empty")]
    pub local_tcp: String,
    /// Neighbor the position is drifting toward, if any.
    #[serde(deserialize_with = "null_as_empty")]
    pub next_region: String,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Directory errors.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// Transport or decoding failure.
    #[error("directory request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Directory answered with a non-success status.
    #[error("directory returned status {0}")]
    Status(reqwest::StatusCode),

    /// HTTP lookups are disabled by configuration.
    #[error("directory disabled")]
    Disabled,
}

/// HTTP client for the directory service.
#[derive(Clone, Debug)]
pub struct DirectoryClient {
    client: Client,
    base_url: String,
    disabled: bool,
}

impl DirectoryClient {
    /// Create a client with the given per-request timeout.
    pub fn new(base_url: &str, timeout: Duration, disabled: bool) -> Result<Self, DirectoryError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            disabled,
        })
    }

    /// Base URL in use.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Whether HTTP lookups are disabled.
    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    /// `GET /directory/regions`.
    pub async fn regions(&self) -> Result<Vec<RegionStatus>, DirectoryError> {
        if self.disabled {
            return Err(DirectoryError::Disabled);
        }
        let url = format!("{}/directory/regions", self.base_url);
        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(DirectoryError::Status(response.status()));
        }
        Ok(response.json().await?)
    }

    /// `POST /directory/resolve`.
    pub async fn resolve(&self, request: &ResolveRequest) -> Result<ResolveResponse, DirectoryError> {
        if self.disabled {
            return Err(DirectoryError::Disabled);
        }
        let url = format!("{}/directory/resolve", self.base_url);
        let response = self.client.post(&url).json(request).send().await?;
        if !response.status().is_success() {
            return Err(DirectoryError::Status(response.status()));
        }
        Ok(response.json().await?)
    }

    /// Fetch regions once and merge them into the cache.
    ///
    /// On failure the cache is left untouched.
    pub async fn refresh(&self, cache: &EndpointCache) -> Result<usize, DirectoryError> {
        let statuses = self.regions().await?;
        let updates: Vec<EndpointUpdate> = statuses.iter().map(EndpointUpdate::from).collect();
        cache.apply(&updates, Utc::now()).await;
        Ok(updates.len())
    }

    /// Refresh the cache every `every` until shutdown. Errors are logged.
    pub async fn run_refresh_loop(
        self,
        cache: Arc<EndpointCache>,
        every: Duration,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        if self.disabled {
            info!("directory_disabled serving static endpoints only");
            return;
        }
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.refresh(&cache).await {
                        Ok(count) => debug!(regions = count, "directory_refresh"),
                        Err(e) => warn!(error = %e, base_url = %self.base_url, "directory_refresh_failed"),
                    }
                }
                _ = shutdown.recv() => {
                    debug!("directory_refresh_stopped");
                    break;
                }
            }
        }
    }
}
