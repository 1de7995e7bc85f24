//! Chunked upload pipeline configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Settings for chunk storage, merging and stale-task cleanup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Uploads root. Chunks live under `chunks/<hash>/`, merged files at the top level.
    #[serde(default = "default_root")]
    pub root: String,
    /// Base URL for merged files (e.g. `https://cdn.example.com/uploads`).
    /// When unset the URL is derived from the request `Host` header.
    #[serde(default)]
    pub public_base_url: Option<String>,
    /// Largest accepted chunk body in bytes.
    #[serde(default = "default_max_chunk_size")]
    pub max_chunk_size_bytes: u64,
    /// Merge retries after the first attempt.
    #[serde(default = "default_merge_max_retries")]
    pub merge_max_retries: u32,
    /// Fixed delay between merge attempts in milliseconds.
    #[serde(default = "default_merge_retry_delay")]
    pub merge_retry_delay_ms: u64,
    /// Recompute MD5 of merged bytes and reject a mismatching content hash.
    #[serde(default = "default_true")]
    pub verify_content_hash: bool,
    /// In-progress tasks idle for longer than this are swept.
    #[serde(default = "default_stale_after_hours")]
    pub stale_after_hours: u64,
}

impl UploadConfig {
    /// Delay between merge attempts.
    pub fn merge_retry_delay(&self) -> Duration {
        Duration::from_millis(self.merge_retry_delay_ms)
    }

    /// Idle age after which an in-progress task is considered abandoned.
    pub fn stale_after(&self) -> chrono::Duration {
        chrono::Duration::hours(self.stale_after_hours as i64)
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            public_base_url: None,
            max_chunk_size_bytes: default_max_chunk_size(),
            merge_max_retries: default_merge_max_retries(),
            merge_retry_delay_ms: default_merge_retry_delay(),
            verify_content_hash: true,
            stale_after_hours: default_stale_after_hours(),
        }
    }
}

fn default_root() -> String {
    "./uploads".to_string()
}

fn default_max_chunk_size() -> u64 {
    104_857_600 // 100 MiB
}

fn default_merge_max_retries() -> u32 {
    2
}

fn default_merge_retry_delay() -> u64 {
    3000
}

fn default_true() -> bool {
    true
}

fn default_stale_after_hours() -> u64 {
    24
}
