//! Error types for cache storage operations.

use std::io;
use thiserror::Error;

/// Errors surfaced by the cache engine, file set, and descriptor table.
///
/// `BadArgument` exists so internal call sites and tests can assert on it,
/// but public `Distribution`/`MdSeries` methods documented as no-op on bad
/// input swallow it rather than propagating it, matching the original
/// engine's early-return policy.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("bad argument: {0}")]
    BadArgument(String),

    #[error("descriptor {0} not found")]
    DescriptorNotFound(usize),

    #[error("cache file {0} not found")]
    FileNotFound(usize),

    #[error("cache file {file} would exceed the {max}-byte size cap ({size} bytes requested)")]
    FileSizeExceeded { file: usize, size: u64, max: u64 },

    #[error("corrupt chunk in file {file} at offset {offset}: {reason}")]
    CorruptChunk {
        file: usize,
        offset: u64,
        reason: String,
    },
}

pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_variant_preserves_the_underlying_error_kind() {
        let source = io::Error::new(io::ErrorKind::PermissionDenied, "denied");
        let err: CacheError = source.into();
        match err {
            CacheError::Io(inner) => assert_eq!(inner.kind(), io::ErrorKind::PermissionDenied),
            other => panic!("expected CacheError::Io, got {other:?}"),
        }
    }

    #[test]
    fn a_read_against_a_missing_cache_file_surfaces_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let result = std::fs::File::open(dir.path().join("missing.cache")).map_err(CacheError::from);
        match result {
            Err(CacheError::Io(inner)) => assert_eq!(inner.kind(), io::ErrorKind::NotFound),
            other => panic!("expected CacheError::Io(NotFound), got {other:?}"),
        }
    }
}
