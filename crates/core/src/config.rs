//! Configuration types shared across crates.

use crate::hash::HashType;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// IPC server configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Unix socket the server listens on.
    #[serde(default = "default_socket_path")]
    pub socket_path: PathBuf,
    /// Maximum size of a single request or response frame in bytes.
    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: usize,
    /// Algorithm of the build-time content hashes declared for local files.
    #[serde(default = "default_build_hash_type")]
    pub build_hash_type: HashType,
}

fn default_socket_path() -> PathBuf {
    PathBuf::from("/tmp/conduit.sock")
}

fn default_max_frame_bytes() -> usize {
    64 * 1024 * 1024
}

fn default_build_hash_type() -> HashType {
    HashType::Blake3
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            socket_path: default_socket_path(),
            max_frame_bytes: default_max_frame_bytes(),
            build_hash_type: default_build_hash_type(),
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.socket_path.as_os_str().is_empty() {
            return Err("server.socket_path cannot be empty".to_string());
        }
        if self.max_frame_bytes == 0 {
            return Err("server.max_frame_bytes cannot be 0".to_string());
        }
        Ok(())
    }
}

/// Manifest hash resolution configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Algorithm of the hashes published in build manifests.
    #[serde(default)]
    pub manifest_hash_type: HashType,
    /// Re-hash with the build-time algorithm and require it to match the
    /// declared source hash before trusting a locally computed manifest hash.
    #[serde(default)]
    pub verify_source_hash: bool,
    /// Attempts at hashing a local file before giving up.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Base of the exponential delay between attempts, in milliseconds.
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
}

fn default_max_attempts() -> u32 {
    6
}

fn default_retry_base_delay_ms() -> u64 {
    100
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            manifest_hash_type: HashType::default(),
            verify_source_hash: false,
            max_attempts: default_max_attempts(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
        }
    }
}

impl ResolverConfig {
    /// Largest attempt count accepted; keeps the backoff shift in range.
    pub const MAX_ATTEMPTS_LIMIT: u32 = 16;

    pub fn validate(&self) -> Result<(), String> {
        if self.max_attempts == 0 {
            return Err("resolver.max_attempts cannot be 0".to_string());
        }
        if self.max_attempts > Self::MAX_ATTEMPTS_LIMIT {
            return Err(format!(
                "resolver.max_attempts {} exceeds maximum {}",
                self.max_attempts,
                Self::MAX_ATTEMPTS_LIMIT
            ));
        }
        Ok(())
    }

    /// Delay slept before the given (zero-based) attempt.
    ///
    /// The first attempt runs immediately; attempt `n > 0` waits
    /// `base * 2^(n-1)`.
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let factor = 1u64 << (attempt - 1).min(Self::MAX_ATTEMPTS_LIMIT);
        Duration::from_millis(self.retry_base_delay_ms.saturating_mul(factor))
    }
}

/// Persistent cross-build hash cache configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum HashCacheConfig {
    /// No persistent cache; every miss is recomputed locally.
    Disabled,
    /// Process-local cache (for development and testing).
    Memory,
    /// One file per entry beneath a root directory.
    Filesystem {
        /// Root directory for cache entries.
        path: PathBuf,
    },
}

impl Default for HashCacheConfig {
    fn default() -> Self {
        Self::Filesystem {
            path: PathBuf::from("./data/hash-cache"),
        }
    }
}

impl HashCacheConfig {
    pub fn validate(&self) -> Result<(), String> {
        match self {
            Self::Filesystem { path } if path.as_os_str().is_empty() => {
                Err("hash_cache.path cannot be empty".to_string())
            }
            _ => Ok(()),
        }
    }
}

/// Complete application configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// IPC server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Manifest hash resolution configuration.
    #[serde(default)]
    pub resolver: ResolverConfig,
    /// Persistent hash cache configuration.
    #[serde(default)]
    pub hash_cache: HashCacheConfig,
}

impl AppConfig {
    /// Validate every section.
    pub fn validate(&self) -> Result<(), String> {
        self.server.validate()?;
        self.resolver.validate()?;
        self.hash_cache.validate()
    }

    /// Create a test configuration.
    ///
    /// **For testing only.** Uses a memory hash cache and a 1 ms retry base
    /// delay so retry paths finish quickly.
    pub fn for_testing() -> Self {
        Self {
            server: ServerConfig::default(),
            resolver: ResolverConfig {
                retry_base_delay_ms: 1,
                ..Default::default()
            },
            hash_cache: HashCacheConfig::Memory,
        }
    }
}
