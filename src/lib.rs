//! DeCAF: the Deterministic Compressed Archive Format
//!
//! A DeCAF archive is a bijective encoding of file content: any set of
//! (path, mode, bytes) tuples maps to exactly one canonical byte sequence,
//! and any valid archive maps back to exactly one such set. Identical
//! input trees produce bit-identical archives on any host, which makes the
//! format suitable for supply-chain reproducibility; verifying an archive
//! inherently verifies every file inside it.
//!
//! The codec is built from:
//! - canonical normalization of a tree into ordered *listings* (size, then
//!   path length, then path bytes)
//! - deterministic packing of listing content into ~10 MiB *bundles*,
//!   each compressed as an independent zstd level-3 frame
//! - layered xxHash3-64 checksums over listing content, uncompressed
//!   bundles, and the whole archive body
//! - a parser that verifies every layer and never trusts a length field
//!   unchecked
//!
//! Trees enter and leave the codec through the [`TreeSource`] and
//! [`TreeSink`] traits; [`DiskTree`] and [`MemTree`] are the bundled
//! implementations.
//!
//! Compressed frame bytes depend on the linked Zstandard version. This
//! crate pins the `zstd` crate at 0.13 (libzstd 1.5.x); producers that
//! must agree bit-for-bit need to link the same zstd.
//!
//! # Example
//!
//! ```
//! use decaf_rs::{ArchiveReader, ArchiveWriter, MemTree};
//!
//! let mut tree = MemTree::new();
//! tree.add_file("hello.txt", b"Hello, World!");
//!
//! let bytes = ArchiveWriter::from_source(&tree)?.finish()?;
//!
//! let reader = ArchiveReader::parse(&bytes)?;
//! let mut out = MemTree::new();
//! reader.extract_to(&mut out)?;
//! assert_eq!(reader.content("hello.txt"), Some(&b"Hello, World!"[..]));
//! # Ok::<(), decaf_rs::DecafError>(())
//! ```

use std::path::Path;

// Core modules
pub mod archive;
pub mod error;
pub mod hash;
pub mod vfs;

// Re-export commonly used types
pub use archive::{
    ArchiveReader, ArchiveWriter, BundleRecord, Listing, ListingRecord, MetaHeader, Mode, Payload,
    BUNDLE_RECORD_SIZE, LISTING_FIXED_SIZE, LISTING_HEADER_START, MAGIC_NUMBER, MAX_PATH_LENGTH,
    META_HEADER_SIZE, PREFIX_SIZE, TARGET_BUNDLE_SIZE,
};
pub use error::{DecafError, Result};
pub use hash::xxh3_64;
pub use vfs::{DiskTree, EntryKind, MemEntry, MemTree, TreeSink, TreeSource, WalkEntry};

/// Archive the directory at `path` into DeCAF bytes.
pub fn archive_dir<P: AsRef<Path>>(path: P) -> Result<Vec<u8>> {
    ArchiveWriter::from_source(&DiskTree::new(path))?.finish()
}

/// Verify `bytes` as a DeCAF archive and extract it into the directory at
/// `path`, creating it if necessary.
pub fn unarchive_to_dir<P: AsRef<Path>>(bytes: &[u8], path: P) -> Result<()> {
    let reader = ArchiveReader::parse(bytes)?;
    std::fs::create_dir_all(path.as_ref()).map_err(|e| DecafError::SinkIo {
        path: path.as_ref().to_string_lossy().into_owned(),
        source: e,
    })?;
    let mut sink = DiskTree::new(path);
    reader.extract_to(&mut sink)
}
