//! xxHash3-64 digests
//!
//! The same hash is applied at three layers of an archive: each listing's
//! content, each bundle's uncompressed content, and the whole archive body
//! after the 16-byte prefix. Verification recomputes all three.

use xxhash_rust::xxh3::xxh3_64 as xxh3;

/// xxHash3-64 digest of `data`.
pub fn xxh3_64(data: &[u8]) -> u64 {
    xxh3(data)
}
