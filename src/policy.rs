use serde::Deserialize;

/// Default cap on an open-ended `bytes=<start>-` response: 1 MiB.
pub const DEFAULT_CHUNK_CAP_BYTES: u64 = 1024 * 1024;

/// Default size at which full (non-range) responses switch from a single
/// buffered read to incremental streaming: 10 MiB.
pub const DEFAULT_THRESHOLD_BYTES: u64 = 10 * 1024 * 1024;

/// Upper bound on `threshold_bytes`: below the threshold a full response
/// is read into a single buffer of the resource's size.
pub const MAX_THRESHOLD_BYTES: u64 = 64 * 1024 * 1024;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PolicyError {
    #[error("chunk_cap_bytes must be greater than zero")]
    ZeroChunkCap,

    #[error("threshold_bytes {0} exceeds the maximum of {MAX_THRESHOLD_BYTES}")]
    ThresholdTooLarge(u64),
}

/// Per-deployment streaming limits, supplied once and passed to every
/// [`Ranged`](crate::Ranged) response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StreamingPolicy {
    /// Maximum number of bytes served for an open-ended range request.
    pub chunk_cap_bytes: u64,
    /// Resources at or above this size are streamed in fixed-size chunks
    /// when requested without a `Range` header.
    pub threshold_bytes: u64,
}

impl StreamingPolicy {
    pub fn new(chunk_cap_bytes: u64, threshold_bytes: u64) -> Self {
        StreamingPolicy { chunk_cap_bytes, threshold_bytes }
    }

    /// Rejects a policy that could never serve an open-ended range, or one
    /// that would buffer very large files whole.
    pub fn validate(&self) -> Result<(), PolicyError> {
        if self.chunk_cap_bytes == 0 {
            return Err(PolicyError::ZeroChunkCap);
        }
        if self.threshold_bytes > MAX_THRESHOLD_BYTES {
            return Err(PolicyError::ThresholdTooLarge(self.threshold_bytes));
        }
        Ok(())
    }

    /// Whether a full response of `total_size` bytes should be streamed
    /// rather than read in one go.
    pub fn streams_full_response(&self, total_size: u64) -> bool {
        total_size >= self.threshold_bytes
    }
}

impl Default for StreamingPolicy {
    fn default() -> Self {
        StreamingPolicy {
            chunk_cap_bytes: DEFAULT_CHUNK_CAP_BYTES,
            threshold_bytes: DEFAULT_THRESHOLD_BYTES,
        }
    }
}
