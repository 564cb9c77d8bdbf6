//! Archive serialization
//!
//! The writer is a pure function of the canonicalized listing sequence:
//! walk, sort, pack, compress, then assemble the byte layout and seal it
//! with the whole-archive checksum. Identical trees produce bit-identical
//! archives on any host linking the same zstd version.

use std::io::Write;

use crate::archive::builder::build_listings;
use crate::archive::bundle::{assign_bundles, build_bundles};
use crate::archive::format::{
    Listing, MetaHeader, BUNDLE_RECORD_SIZE, MAGIC_NUMBER, META_HEADER_SIZE, PREFIX_SIZE,
};
use crate::error::Result;
use crate::hash::xxh3_64;
use crate::vfs::TreeSource;

/// Archive writer producing DeCAF bytes from a tree source
pub struct ArchiveWriter {
    listings: Vec<Listing>,
    bundle_count: u64,
}

impl ArchiveWriter {
    /// Walk `source` and prepare the canonical listing and bundle layout.
    pub fn from_source<S: TreeSource>(source: &S) -> Result<Self> {
        let listings = build_listings(source)?;
        Ok(Self::from_listings(listings))
    }

    /// Build a writer from listings already in canonical order.
    pub fn from_listings(mut listings: Vec<Listing>) -> Self {
        let bundle_count = assign_bundles(&mut listings);
        Self {
            listings,
            bundle_count,
        }
    }

    pub fn listing_count(&self) -> usize {
        self.listings.len()
    }

    pub fn bundle_count(&self) -> u64 {
        self.bundle_count
    }

    pub fn listings(&self) -> &[Listing] {
        &self.listings
    }

    /// Assemble the complete archive byte sequence.
    pub fn finish(self) -> Result<Vec<u8>> {
        let bundles = build_bundles(&self.listings, self.bundle_count)?;

        let mut listing_header =
            Vec::with_capacity(self.listings.iter().map(Listing::encoded_len).sum());
        for listing in &self.listings {
            listing.encode_into(&mut listing_header);
        }

        let meta = MetaHeader {
            listing_header_size: listing_header.len() as u64,
            listing_count: self.listings.len() as u64,
            bundle_count: self.bundle_count,
        };

        // Everything after the 16-byte prefix is covered by the archive
        // checksum, so the body is assembled first and sealed last.
        let data_size: usize = bundles.iter().map(|b| b.data.len()).sum();
        let mut body = Vec::with_capacity(
            META_HEADER_SIZE + listing_header.len() + bundles.len() * BUNDLE_RECORD_SIZE + data_size,
        );
        meta.encode_into(&mut body);
        body.extend_from_slice(&listing_header);
        for bundle in &bundles {
            bundle.record.encode_into(&mut body);
        }
        for bundle in &bundles {
            body.extend_from_slice(&bundle.data);
        }

        let archive_checksum = xxh3_64(&body);

        let mut archive = Vec::with_capacity(PREFIX_SIZE + body.len());
        archive.extend_from_slice(&MAGIC_NUMBER.to_le_bytes());
        archive.extend_from_slice(&archive_checksum.to_le_bytes());
        archive.extend_from_slice(&body);
        Ok(archive)
    }

    /// Assemble the archive and write it out, returning the byte count.
    pub fn write_to<W: Write>(self, writer: &mut W) -> Result<usize> {
        let bytes = self.finish()?;
        writer.write_all(&bytes)?;
        Ok(bytes.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vfs::MemTree;

    #[test]
    fn test_empty_tree_is_forty_bytes() {
        let tree = MemTree::new();
        let writer = ArchiveWriter::from_source(&tree).unwrap();
        assert_eq!(writer.listing_count(), 0);
        assert_eq!(writer.bundle_count(), 0);

        let bytes = writer.finish().unwrap();
        assert_eq!(bytes.len(), 40);
        assert_eq!(&bytes[0..8], b"iamdecaf");
    }

    #[test]
    fn test_write_to_reports_length() {
        let mut tree = MemTree::new();
        tree.add_file("a", b"hello");

        let mut out = Vec::new();
        let written = ArchiveWriter::from_source(&tree)
            .unwrap()
            .write_to(&mut out)
            .unwrap();
        assert_eq!(written, out.len());
    }
}
