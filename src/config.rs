//! Command line and environment configuration for `media-range-server`.

use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use axum_extra::headers::CacheControl;
use clap::Parser;

use crate::{DEFAULT_CHUNK_CAP_BYTES, DEFAULT_THRESHOLD_BYTES, PolicyError, StreamingPolicy};

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("failed to read policy file {}: {source}", path.display())]
    ReadPolicy { path: PathBuf, source: io::Error },

    #[error("invalid policy file {}: {source}", path.display())]
    ParsePolicy { path: PathBuf, source: serde_json::Error },

    #[error("invalid streaming policy: {0}")]
    InvalidPolicy(#[from] PolicyError),

    #[error("media root {} is not a directory", .0.display())]
    MediaRoot(PathBuf),
}

#[derive(Debug, Clone, Parser)]
#[command(name = "media-range-server", version, about = "Serve stored media with HTTP range support")]
pub struct ServerConfig {
    /// Address to listen on.
    #[arg(long, env = "MEDIA_RANGE_BIND", default_value = "127.0.0.1:3000")]
    pub bind: SocketAddr,

    /// Directory served under `/media/`.
    #[arg(long, env = "MEDIA_RANGE_ROOT")]
    pub root: PathBuf,

    /// Maximum bytes returned for an open-ended `bytes=<start>-` request.
    #[arg(long, env = "MEDIA_RANGE_CHUNK_CAP", default_value_t = DEFAULT_CHUNK_CAP_BYTES)]
    pub chunk_cap_bytes: u64,

    /// Size at which full responses are streamed instead of read at once.
    #[arg(long, env = "MEDIA_RANGE_THRESHOLD", default_value_t = DEFAULT_THRESHOLD_BYTES)]
    pub threshold_bytes: u64,

    /// JSON file with a streaming policy; overrides the two flags above.
    #[arg(long, env = "MEDIA_RANGE_POLICY")]
    pub policy: Option<PathBuf>,

    /// Sends `Cache-Control: public, max-age=<secs>` on served media.
    #[arg(long, env = "MEDIA_RANGE_CACHE_MAX_AGE")]
    pub cache_max_age: Option<u64>,
}

impl ServerConfig {
    /// The streaming policy in effect, read from the policy file if one is
    /// given.
    pub fn streaming_policy(&self) -> Result<StreamingPolicy, ConfigError> {
        let policy = match &self.policy {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .map_err(|source| ConfigError::ReadPolicy { path: path.clone(), source })?;
                serde_json::from_str(&text)
                    .map_err(|source| ConfigError::ParsePolicy { path: path.clone(), source })?
            }
            None => StreamingPolicy::new(self.chunk_cap_bytes, self.threshold_bytes),
        };
        policy.validate()?;
        Ok(policy)
    }

    pub fn cache_control(&self) -> Option<CacheControl> {
        self.cache_max_age
            .map(|secs| CacheControl::new().with_public().with_max_age(Duration::from_secs(secs)))
    }

    pub fn validate_root(&self) -> Result<(), ConfigError> {
        if self.root.is_dir() {
            Ok(())
        } else {
            Err(ConfigError::MediaRoot(self.root.clone()))
        }
    }
}
