//! HTTP gateway binding of [`NetworkClient`].
//!
//! Directory listings come from a metadata gateway's `/api/v0/ls` RPC and are
//! persisted to the local block store. Content is fetched from content
//! gateways under `/ipfs/<cid>/<path>` as plain responses.

use crate::blockstore::BlockStore;
use crate::client::{ClientFactory, EntryStream, FetchResponse, NetworkClient};
use crate::error::{ClientError, ClientResult};
use async_trait::async_trait;
use axum::http::{HeaderMap, Method};
use cairn_core::config::NetworkConfig;
use cairn_core::{Cid, DirectoryEntry};
use futures::{StreamExt, TryStreamExt};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

/// UnixFS node types reported by `ls` that are listed as directories.
const DIRECTORY_TYPES: &[i32] = &[1, 5];

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct LsResponse {
    #[serde(default)]
    objects: Vec<LsObject>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct LsObject {
    #[serde(default)]
    links: Vec<LsLink>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct LsLink {
    name: String,
    hash: String,
    #[serde(default)]
    size: u64,
    #[serde(rename = "Type", default)]
    kind: i32,
}

impl LsLink {
    fn into_entry(self) -> ClientResult<DirectoryEntry> {
        let cid = Cid::parse(&self.hash).map_err(|_| ClientError::InvalidCid(self.hash.clone()))?;
        if DIRECTORY_TYPES.contains(&self.kind) {
            Ok(DirectoryEntry::directory(self.name, cid))
        } else {
            Ok(DirectoryEntry::file(self.name, cid, Some(self.size)))
        }
    }
}

/// Network client backed by HTTP gateways.
///
/// Responses are taken on trust: bytes are passed through as the gateway
/// sends them, with no block or CAR verification against the CID.
pub struct GatewayClient {
    http: reqwest::Client,
    content_gateways: Vec<String>,
    metadata_gateways: Vec<String>,
    request_timeout: Duration,
    blocks: BlockStore,
}

impl GatewayClient {
    /// Validate configuration, open the block store and build the HTTP client.
    pub async fn from_config(config: &NetworkConfig) -> ClientResult<Self> {
        config.validate().map_err(ClientError::Construction)?;
        let content_gateways = normalize_gateways(&config.content_gateways)?;
        let metadata_gateways = normalize_gateways(&config.metadata_gateways)?;

        let blocks = BlockStore::open(&config.blockstore_path).await?;

        let http = reqwest::Client::builder()
            .connect_timeout(config.gateway_timeout())
            .user_agent(concat!("cairn/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ClientError::Construction(format!("failed to build HTTP client: {e}")))?;

        tracing::info!(
            content = content_gateways.len(),
            metadata = metadata_gateways.len(),
            blockstore = %blocks.root().display(),
            "Gateway client configured"
        );

        Ok(Self {
            http,
            content_gateways,
            metadata_gateways,
            request_timeout: config.gateway_timeout(),
            blocks,
        })
    }

    async fn load_listing(&self, cid: &Cid) -> ClientResult<LsResponse> {
        if let Some(stored) = self.blocks.get_listing(cid).await {
            match serde_json::from_slice(&stored) {
                Ok(listing) => return Ok(listing),
                Err(e) => {
                    tracing::warn!(cid = %cid, error = %e, "Ignoring undecodable stored listing")
                }
            }
        }

        let mut last_error = None;
        for gateway in &self.metadata_gateways {
            match self.request_listing(gateway, cid).await {
                Ok(body) => {
                    let listing: LsResponse = serde_json::from_slice(&body).map_err(|e| {
                        ClientError::Listing(format!("undecodable listing from {gateway}: {e}"))
                    })?;
                    if let Err(e) = self.blocks.put_listing(cid, &body).await {
                        tracing::warn!(cid = %cid, error = %e, "Failed to persist listing");
                    }
                    return Ok(listing);
                }
                Err(e) => {
                    tracing::warn!(gateway = %gateway, cid = %cid, error = %e, "Metadata gateway failed");
                    last_error = Some(e);
                }
            }
        }

        Err(ClientError::Listing(format!(
            "{cid}: {}",
            last_error.unwrap_or_else(|| "no metadata gateways".to_string())
        )))
    }

    async fn request_listing(&self, gateway: &str, cid: &Cid) -> Result<bytes::Bytes, String> {
        let response = self
            .http
            .post(format!("{gateway}/api/v0/ls"))
            .query(&[("arg", cid.as_str())])
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("status {status}"));
        }
        response.bytes().await.map_err(|e| e.to_string())
    }
}

#[async_trait]
impl NetworkClient for GatewayClient {
    async fn ls(&self, cid: &Cid) -> ClientResult<EntryStream> {
        let listing = self.load_listing(cid).await?;
        let links = listing.objects.into_iter().flat_map(|object| object.links);
        let stream = async_stream::stream! {
            for link in links {
                yield link.into_entry();
            }
        };
        Ok(Box::pin(stream))
    }

    async fn fetch(
        &self,
        url: &str,
        method: &Method,
        headers: &HeaderMap,
    ) -> ClientResult<FetchResponse> {
        let resource = url
            .strip_prefix("ipfs://")
            .ok_or_else(|| ClientError::Fetch(format!("unsupported URL: {url}")))?;

        let mut last_error = None;
        for gateway in &self.content_gateways {
            let target = format!("{gateway}/ipfs/{resource}");
            let result = self
                .http
                .request(method.clone(), &target)
                .headers(headers.clone())
                .send()
                .await;

            match result {
                Ok(response) if response.status().is_server_error() => {
                    tracing::warn!(gateway = %gateway, status = %response.status(), "Gateway returned server error");
                    last_error = Some(format!("{gateway} returned {}", response.status()));
                }
                Ok(response) => {
                    tracing::debug!(gateway = %gateway, status = %response.status(), url = %url, "Fetched content");
                    let status = response.status();
                    let headers = response.headers().clone();
                    let body = response
                        .bytes_stream()
                        .map_err(|e| ClientError::Fetch(e.to_string()))
                        .boxed();
                    return Ok(FetchResponse {
                        status,
                        headers,
                        body,
                    });
                }
                Err(e) => {
                    tracing::warn!(gateway = %gateway, error = %e, "Gateway request failed");
                    last_error = Some(format!("{gateway}: {e}"));
                }
            }
        }

        Err(ClientError::Fetch(
            last_error.unwrap_or_else(|| "no content gateways".to_string()),
        ))
    }

    fn backend_name(&self) -> &'static str {
        "gateway"
    }
}

fn normalize_gateways(gateways: &[String]) -> ClientResult<Vec<String>> {
    gateways
        .iter()
        .map(|gateway| {
            let url = reqwest::Url::parse(gateway).map_err(|e| {
                ClientError::Construction(format!("invalid gateway URL {gateway}: {e}"))
            })?;
            Ok(url.as_str().trim_end_matches('/').to_string())
        })
        .collect()
}

/// Builds a [`GatewayClient`] from network configuration.
pub struct GatewayClientFactory {
    config: NetworkConfig,
}

impl GatewayClientFactory {
    pub fn new(config: NetworkConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl ClientFactory for GatewayClientFactory {
    async fn build(&self) -> ClientResult<Arc<dyn NetworkClient>> {
        Ok(Arc::new(GatewayClient::from_config(&self.config).await?))
    }
}
