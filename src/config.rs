//! Configuration surface for the cache engine.

use std::path::PathBuf;
use tracing::info;

use crate::types::DEFAULT_CHUNK_SIZE;

/// The only recognized cache options.
///
/// Mirrors the teacher's `CascConfig`: one small `Clone`able struct with a
/// sensible `Default`, validated once at construction time.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Turns spill-to-disk on/off. When off, the resident buffer grows unbounded.
    pub enabled: bool,
    /// Chunk size in rows; also the in-memory target (flushed past `2*w`).
    pub w: usize,
    /// Directory for on-disk files. An empty path force-disables caching.
    pub cache_path: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            w: DEFAULT_CHUNK_SIZE,
            cache_path: PathBuf::from("./cache"),
        }
    }
}

impl CacheConfig {
    /// Validate and normalize the configuration, logging the effective
    /// values once at `info` level, the way the teacher logs its resolved
    /// `CascConfig` on storage construction.
    pub fn validated(mut self) -> Self {
        if self.w == 0 {
            self.w = DEFAULT_CHUNK_SIZE;
        }
        if self.cache_path.as_os_str().is_empty() {
            self.enabled = false;
        }
        info!(
            enabled = self.enabled,
            w = self.w,
            cache_path = %self.cache_path.display(),
            "effective cache configuration"
        );
        self
    }
}
