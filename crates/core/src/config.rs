//! Configuration types shared across crates.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Worker HTTP server configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    #[serde(default = "default_bind")]
    pub bind: String,
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

/// Network client configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Gateways used for content fetches, tried in order. Their responses are
    /// trusted as served.
    #[serde(default = "default_content_gateways")]
    pub content_gateways: Vec<String>,
    /// Metadata gateways used for directory listings, tried in order.
    #[serde(default = "default_metadata_gateways")]
    pub metadata_gateways: Vec<String>,
    /// Directory of the durable local block store.
    #[serde(default = "default_blockstore_path")]
    pub blockstore_path: PathBuf,
    /// How long `acquire()` waits for client construction, in seconds.
    #[serde(default = "default_construction_timeout_secs")]
    pub construction_timeout_secs: u64,
    /// Per-request timeout for gateway HTTP calls, in seconds.
    #[serde(default = "default_gateway_timeout_secs")]
    pub gateway_timeout_secs: u64,
}

fn default_content_gateways() -> Vec<String> {
    vec![
        "https://trustless-gateway.link".to_string(),
        "https://ipfs.io".to_string(),
    ]
}

fn default_metadata_gateways() -> Vec<String> {
    vec!["http://127.0.0.1:5001".to_string()]
}

fn default_blockstore_path() -> PathBuf {
    PathBuf::from("./data/blocks")
}

fn default_construction_timeout_secs() -> u64 {
    8
}

fn default_gateway_timeout_secs() -> u64 {
    60
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            content_gateways: default_content_gateways(),
            metadata_gateways: default_metadata_gateways(),
            blockstore_path: default_blockstore_path(),
            construction_timeout_secs: default_construction_timeout_secs(),
            gateway_timeout_secs: default_gateway_timeout_secs(),
        }
    }
}

impl NetworkConfig {
    pub fn construction_timeout(&self) -> Duration {
        Duration::from_secs(self.construction_timeout_secs)
    }

    pub fn gateway_timeout(&self) -> Duration {
        Duration::from_secs(self.gateway_timeout_secs)
    }

    /// Validate network configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        if self.content_gateways.is_empty() {
            return Err("network.content_gateways must not be empty".to_string());
        }
        if self.metadata_gateways.is_empty() {
            return Err("network.metadata_gateways must not be empty".to_string());
        }
        if self.construction_timeout_secs == 0 {
            return Err("network.construction_timeout_secs must be greater than 0".to_string());
        }
        Ok(())
    }
}

/// Record store backend for the directory cache.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CacheBackendConfig {
    /// One JSON file per record under `path`.
    Filesystem {
        path: PathBuf,
        /// Optional byte quota across all records.
        #[serde(default)]
        quota_bytes: Option<u64>,
    },
    /// Process-local records, lost on restart.
    Memory {
        #[serde(default)]
        quota_bytes: Option<u64>,
    },
}

impl Default for CacheBackendConfig {
    fn default() -> Self {
        Self::Filesystem {
            path: PathBuf::from("./data/listings"),
            quota_bytes: None,
        }
    }
}

/// Directory cache configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default)]
    pub backend: CacheBackendConfig,
    /// Prefix of every record key owned by the cache.
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
    /// Records older than this are treated as absent.
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
    /// Age beyond which records are evicted when a write hits the quota.
    #[serde(default = "default_quota_eviction_days")]
    pub quota_eviction_days: u32,
}

fn default_key_prefix() -> String {
    "ipfs-dir-".to_string()
}

fn default_retention_days() -> u32 {
    30
}

fn default_quota_eviction_days() -> u32 {
    7
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackendConfig::default(),
            key_prefix: default_key_prefix(),
            retention_days: default_retention_days(),
            quota_eviction_days: default_quota_eviction_days(),
        }
    }
}

impl CacheConfig {
    pub fn retention(&self) -> time::Duration {
        time::Duration::days(i64::from(self.retention_days))
    }

    pub fn quota_eviction_window(&self) -> time::Duration {
        time::Duration::days(i64::from(self.quota_eviction_days))
    }

    /// Validate cache configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        if self.key_prefix.is_empty() {
            return Err("cache.key_prefix must not be empty".to_string());
        }
        if self.key_prefix.contains(['/', '\\']) || self.key_prefix.contains("..") {
            return Err("cache.key_prefix must be a single path component".to_string());
        }
        if self.retention_days == 0 {
            return Err("cache.retention_days must be greater than 0".to_string());
        }
        Ok(())
    }
}

/// Page-side orchestrator configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClientConfig {
    /// How long a request waits for the worker's response, in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_request_timeout_secs() -> u64 {
    300 // 5 minutes
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl ClientConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Complete application configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub client: ClientConfig,
}

impl AppConfig {
    /// Create a test configuration.
    ///
    /// **For testing only.** Uses an in-memory cache and a short construction timeout.
    pub fn for_testing() -> Self {
        Self {
            server: ServerConfig::default(),
            network: NetworkConfig {
                construction_timeout_secs: 2,
                ..NetworkConfig::default()
            },
            cache: CacheConfig {
                backend: CacheBackendConfig::Memory { quota_bytes: None },
                ..CacheConfig::default()
            },
            client: ClientConfig::default(),
        }
    }

    /// Validate every section.
    pub fn validate(&self) -> Result<(), String> {
        self.network.validate()?;
        self.cache.validate()?;
        Ok(())
    }
}
