use std::io;
use thiserror::Error;

/// Result type for decaf operations
pub type Result<T> = std::result::Result<T, DecafError>;

/// Unified error type for all decaf operations
///
/// Every variant is fatal to the operation that raised it; nothing is
/// retried or recovered internally.
#[derive(Debug, Error)]
pub enum DecafError {
    // Archive verification errors
    #[error("invalid magic number in archive prefix")]
    BadMagic,

    #[error("archive checksum mismatch: expected {expected:016x}, got {actual:016x}")]
    BadArchiveChecksum { expected: u64, actual: u64 },

    #[error("bundle {index} checksum mismatch: expected {expected:016x}, got {actual:016x}")]
    BadBundleChecksum {
        index: u64,
        expected: u64,
        actual: u64,
    },

    #[error("content checksum mismatch for `{path}`: expected {expected:016x}, got {actual:016x}")]
    BadContentChecksum {
        path: String,
        expected: u64,
        actual: u64,
    },

    #[error("invalid listing mode: {0}")]
    BadMode(u8),

    #[error("truncated archive: {0}")]
    Truncated(String),

    // Compression errors
    #[error("compression failed: {0}")]
    CompressionFailed(String),

    #[error("decompression failed: {0}")]
    DecompressionFailed(String),

    // Tree boundary errors
    #[error("tree source error at `{path}`: {source}")]
    SourceIo {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("tree sink error at `{path}`: {source}")]
    SinkIo {
        path: String,
        #[source]
        source: io::Error,
    },

    // Path errors
    #[error("path too long: `{path}` is {length} bytes")]
    PathTooLong { path: String, length: usize },

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("duplicate path in tree: `{0}`")]
    DuplicatePath(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}
