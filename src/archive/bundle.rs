//! Bundle packing and compression
//!
//! Listing content is laid out contiguously in canonical order into
//! uncompressed bundles of roughly [`TARGET_BUNDLE_SIZE`] bytes, and each
//! bundle is compressed as an independent zstd frame. Packing is a single
//! deterministic pass, so the same listing sequence always produces the
//! same bundle layout.

use std::io::Write;

use crate::archive::format::{BundleRecord, Listing, TARGET_BUNDLE_SIZE};
use crate::error::{DecafError, Result};
use crate::hash::xxh3_64;

/// zstd compression level committed to by the format
pub const COMPRESSION_LEVEL: i32 = 3;

/// Assign `bundle_index` and `bundle_offset` to each listing, which must
/// already be in canonical order. Returns the number of bundles.
///
/// A new bundle opens before a listing is placed iff the current bundle
/// has already reached the target size, so a single listing larger than
/// the target occupies its own bundle and may exceed it. Zero listings
/// produce zero bundles.
pub fn assign_bundles(listings: &mut [Listing]) -> u64 {
    if listings.is_empty() {
        return 0;
    }

    let mut index = 0u64;
    let mut size = 0u64;
    for listing in listings.iter_mut() {
        if size >= TARGET_BUNDLE_SIZE {
            index += 1;
            size = 0;
        }
        listing.bundle_index = index;
        listing.bundle_offset = size;
        size += listing.content_size();
    }
    index + 1
}

/// A compressed bundle together with its header record
pub struct Bundle {
    pub record: BundleRecord,
    /// Compressed bytes as written into the data section
    pub data: Vec<u8>,
}

/// Concatenate listing contents per bundle, checksum the uncompressed
/// slabs, and compress each one.
pub fn build_bundles(listings: &[Listing], bundle_count: u64) -> Result<Vec<Bundle>> {
    let mut contents: Vec<Vec<u8>> = vec![Vec::new(); bundle_count as usize];
    for listing in listings {
        contents[listing.bundle_index as usize].extend_from_slice(listing.payload.content());
    }

    let mut bundles = Vec::with_capacity(contents.len());
    let mut offset = 0u64;
    for raw in &contents {
        let uncompressed_checksum = xxh3_64(raw);
        let data = compress(raw)?;
        let record = BundleRecord {
            offset_in_data_section: offset,
            compressed_size: data.len() as u64,
            uncompressed_checksum,
        };
        offset += data.len() as u64;
        bundles.push(Bundle { record, data });
    }
    Ok(bundles)
}

/// Compress one bundle as a bare zstd frame: level 3, no embedded checksum
/// or content size, so the frame bytes depend only on the input and the
/// linked zstd version.
pub fn compress(data: &[u8]) -> Result<Vec<u8>> {
    let compression_err = |e: std::io::Error| DecafError::CompressionFailed(e.to_string());

    let mut encoder = zstd::stream::Encoder::new(Vec::with_capacity(data.len()), COMPRESSION_LEVEL)
        .map_err(compression_err)?;
    encoder
        .set_pledged_src_size(Some(data.len() as u64))
        .map_err(compression_err)?;
    encoder.include_checksum(false).map_err(compression_err)?;
    encoder.include_contentsize(false).map_err(compression_err)?;
    encoder.write_all(data).map_err(compression_err)?;
    encoder.finish().map_err(compression_err)
}

/// Decompress one bundle's zstd frame.
pub fn decompress(data: &[u8]) -> Result<Vec<u8>> {
    zstd::decode_all(data).map_err(|e| DecafError::DecompressionFailed(e.to_string()))
}
