//! Archive parsing, verification, and extraction
//!
//! Parsing is front-loaded: magic, whole-archive checksum, header bounds,
//! bundle checksums, listing records, and content checksums are all
//! verified before [`ArchiveReader::parse`] returns. No length field is
//! used without being checked against the bytes actually present, so a
//! crafted archive fails with a typed error instead of a panic or an
//! oversized allocation. Extraction afterwards only performs sink I/O.

use crate::archive::bundle::decompress;
use crate::archive::format::{
    read_u64, BundleRecord, ListingRecord, MetaHeader, Mode, BUNDLE_RECORD_SIZE,
    LISTING_FIXED_SIZE, LISTING_HEADER_START, MAGIC_NUMBER, META_HEADER_SIZE, PREFIX_SIZE,
};
use crate::error::{DecafError, Result};
use crate::hash::xxh3_64;
use crate::vfs::TreeSink;

/// A fully verified archive held in memory
pub struct ArchiveReader {
    listings: Vec<ListingRecord>,
    /// Decompressed bundle contents, in index order
    bundles: Vec<Vec<u8>>,
}

impl ArchiveReader {
    /// Parse and verify `bytes` as a DeCAF archive.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let archive_len = bytes.len() as u64;
        if bytes.len() < PREFIX_SIZE + META_HEADER_SIZE {
            return Err(DecafError::Truncated(format!(
                "{} bytes is too small to hold the archive prefix and meta header",
                bytes.len()
            )));
        }

        if bytes[0..8] != MAGIC_NUMBER.to_le_bytes() {
            return Err(DecafError::BadMagic);
        }

        let expected = read_u64(bytes, 8);
        let actual = xxh3_64(&bytes[PREFIX_SIZE..]);
        if expected != actual {
            return Err(DecafError::BadArchiveChecksum { expected, actual });
        }

        let meta = MetaHeader::decode(&bytes[PREFIX_SIZE..LISTING_HEADER_START]);

        // Derive section offsets with overflow-checked arithmetic; every
        // section must land inside the archive.
        let bundle_header_start = (LISTING_HEADER_START as u64)
            .checked_add(meta.listing_header_size)
            .filter(|&end| end <= archive_len)
            .ok_or_else(|| {
                DecafError::Truncated("listing header extends past archive end".to_string())
            })?;
        let bundle_header_size = meta
            .bundle_count
            .checked_mul(BUNDLE_RECORD_SIZE as u64)
            .ok_or_else(|| DecafError::Truncated("bundle header size overflows".to_string()))?;
        let data_section_start = bundle_header_start
            .checked_add(bundle_header_size)
            .filter(|&end| end <= archive_len)
            .ok_or_else(|| {
                DecafError::Truncated("bundle header extends past archive end".to_string())
            })?;

        // A listing record is at least 35 bytes, so the count is bounded
        // by the header it must fit in.
        if meta.listing_count > meta.listing_header_size / LISTING_FIXED_SIZE as u64 {
            return Err(DecafError::Truncated(format!(
                "{} listings cannot fit in a {}-byte listing header",
                meta.listing_count, meta.listing_header_size
            )));
        }

        let listing_header = &bytes[LISTING_HEADER_START..bundle_header_start as usize];
        let bundle_header = &bytes[bundle_header_start as usize..data_section_start as usize];
        let data_section = &bytes[data_section_start as usize..];

        let bundles = Self::parse_bundles(meta.bundle_count, bundle_header, data_section)?;
        let listings = Self::parse_listings(meta.listing_count, listing_header, &bundles)?;

        Ok(Self { listings, bundles })
    }

    /// Decompress and verify every bundle.
    fn parse_bundles(
        bundle_count: u64,
        bundle_header: &[u8],
        data_section: &[u8],
    ) -> Result<Vec<Vec<u8>>> {
        let mut bundles = Vec::with_capacity(bundle_count as usize);
        for index in 0..bundle_count {
            let record_start = (index as usize) * BUNDLE_RECORD_SIZE;
            let record = BundleRecord::decode(&bundle_header[record_start..]);

            let end = record
                .offset_in_data_section
                .checked_add(record.compressed_size)
                .filter(|&end| end <= data_section.len() as u64)
                .ok_or_else(|| {
                    DecafError::Truncated(format!(
                        "bundle {index} extends past the data section"
                    ))
                })?;
            let compressed =
                &data_section[record.offset_in_data_section as usize..end as usize];

            let data = decompress(compressed)?;
            let actual = xxh3_64(&data);
            if actual != record.uncompressed_checksum {
                return Err(DecafError::BadBundleChecksum {
                    index,
                    expected: record.uncompressed_checksum,
                    actual,
                });
            }
            bundles.push(data);
        }
        Ok(bundles)
    }

    /// Decode every listing record and verify file content checksums.
    fn parse_listings(
        listing_count: u64,
        listing_header: &[u8],
        bundles: &[Vec<u8>],
    ) -> Result<Vec<ListingRecord>> {
        let mut listings = Vec::with_capacity(listing_count as usize);
        let mut cursor = listing_header;
        for _ in 0..listing_count {
            let (record, used) = ListingRecord::decode(cursor)?;
            cursor = &cursor[used..];
            crate::archive::builder::validate_path(&record.path)?;

            match record.mode {
                Mode::Normal | Mode::Executable => {
                    let content = content_slice(bundles, &record)?;
                    let actual = xxh3_64(content);
                    if actual != record.checksum {
                        return Err(DecafError::BadContentChecksum {
                            path: record.path,
                            expected: record.checksum,
                            actual,
                        });
                    }
                }
                Mode::Link => {
                    // Link checksums are written as 0 and never verified,
                    // but the target must be addressable UTF-8.
                    let content = content_slice(bundles, &record)?;
                    std::str::from_utf8(content).map_err(|_| {
                        DecafError::InvalidPath(format!(
                            "link target of `{}` is not valid UTF-8",
                            record.path
                        ))
                    })?;
                }
                Mode::BareDirectory => {}
            }

            listings.push(record);
        }
        Ok(listings)
    }

    pub fn listing_count(&self) -> usize {
        self.listings.len()
    }

    pub fn bundle_count(&self) -> usize {
        self.bundles.len()
    }

    /// Verified listing records, in the order they appear in the archive.
    pub fn listings(&self) -> &[ListingRecord] {
        &self.listings
    }

    pub fn contains(&self, path: &str) -> bool {
        self.listings.iter().any(|l| l.path == path)
    }

    /// Content bytes of the listing at `path`: file bytes for files, the
    /// target path for links, empty for bare directories.
    pub fn content(&self, path: &str) -> Option<&[u8]> {
        let record = self.listings.iter().find(|l| l.path == path)?;
        if record.mode == Mode::BareDirectory {
            return Some(&[]);
        }
        content_slice(&self.bundles, record).ok()
    }

    /// Materialize every listing into `sink`, in archive order.
    ///
    /// Parent directories are created explicitly per listing; canonical
    /// order sorts by size before path, so a child may well precede its
    /// parent's other descendants.
    pub fn extract_to<S: TreeSink>(&self, sink: &mut S) -> Result<()> {
        for record in &self.listings {
            sink.make_dirs_for(&record.path)?;
            match record.mode {
                Mode::BareDirectory => sink.create_bare_dir(&record.path)?,
                Mode::Link => {
                    let content = content_slice(&self.bundles, record)?;
                    let target = std::str::from_utf8(content).map_err(|_| {
                        DecafError::InvalidPath(format!(
                            "link target of `{}` is not valid UTF-8",
                            record.path
                        ))
                    })?;
                    sink.create_symlink(target, &record.path)?;
                }
                Mode::Normal => {
                    sink.create_file(&record.path, 0o644, content_slice(&self.bundles, record)?)?
                }
                Mode::Executable => {
                    sink.create_file(&record.path, 0o755, content_slice(&self.bundles, record)?)?
                }
            }
        }
        Ok(())
    }
}

/// Bounds-checked view of a listing's content inside its bundle.
fn content_slice<'a>(bundles: &'a [Vec<u8>], record: &ListingRecord) -> Result<&'a [u8]> {
    let bundle = bundles.get(record.bundle_index as usize).ok_or_else(|| {
        DecafError::Truncated(format!(
            "listing `{}` names bundle {} of {}",
            record.path,
            record.bundle_index,
            bundles.len()
        ))
    })?;
    let end = record
        .bundle_offset
        .checked_add(record.content_size)
        .filter(|&end| end <= bundle.len() as u64)
        .ok_or_else(|| {
            DecafError::Truncated(format!(
                "listing `{}` extends past its bundle",
                record.path
            ))
        })?;
    Ok(&bundle[record.bundle_offset as usize..end as usize])
}
