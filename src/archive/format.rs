//! Binary format definitions for .df archive files
//!
//! All multi-byte integers are little-endian. Strings are UTF-8 with no
//! terminator. The archive is laid out contiguously with no padding:
//!
//! | offset   | size | field                |
//! | -------: | ---: | -------------------- |
//! | 0        | 8    | magic                |
//! | 8        | 8    | archive checksum     |
//! | 16       | 8    | listing header size  |
//! | 24       | 8    | listing count        |
//! | 32       | 8    | bundle count         |
//! | 40       | L    | listing header       |
//! | 40+L     | 24*B | bundle header        |
//! | 40+L+24B | ..   | data section         |
//!
//! The archive checksum is the xxHash3-64 of everything after the 16-byte
//! prefix, so every header field and every compressed byte is covered by it.

use crate::error::{DecafError, Result};
use crate::hash::xxh3_64;

/// Magic number: the bytes `iamdecaf` read low-to-high as a u64
pub const MAGIC_NUMBER: u64 = u64::from_le_bytes(*b"iamdecaf");

/// Size of the magic + archive checksum prefix in bytes
pub const PREFIX_SIZE: usize = 16;

/// Size of the meta header in bytes
pub const META_HEADER_SIZE: usize = 24;

/// Offset of the listing header from the start of the archive
pub const LISTING_HEADER_START: usize = PREFIX_SIZE + META_HEADER_SIZE;

/// Size of the fixed (path-less) portion of a listing record in bytes
pub const LISTING_FIXED_SIZE: usize = 35;

/// Size of a bundle record in bytes
pub const BUNDLE_RECORD_SIZE: usize = 24;

/// Maximum path length in bytes; a record's `total_length` is a u16 that
/// includes the 35 fixed bytes, so paths are bounded by what remains
pub const MAX_PATH_LENGTH: usize = u16::MAX as usize - LISTING_FIXED_SIZE;

/// Target uncompressed bundle size (10 MiB)
pub const TARGET_BUNDLE_SIZE: u64 = 10 * 1024 * 1024;

/// Listing modes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Mode {
    Normal = 0,
    Executable = 1,
    Link = 2,
    BareDirectory = 3,
}

impl Mode {
    pub fn from_u8(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Self::Normal),
            1 => Ok(Self::Executable),
            2 => Ok(Self::Link),
            3 => Ok(Self::BareDirectory),
            _ => Err(DecafError::BadMode(value)),
        }
    }
}

/// What a listing stores in its bundle slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// Regular file bytes
    Normal(Vec<u8>),
    /// Owner-executable file bytes
    Executable(Vec<u8>),
    /// Apex-relative path of the link target
    Link(String),
    /// Empty directory; carries no content
    BareDirectory,
}

impl Payload {
    pub fn mode(&self) -> Mode {
        match self {
            Payload::Normal(_) => Mode::Normal,
            Payload::Executable(_) => Mode::Executable,
            Payload::Link(_) => Mode::Link,
            Payload::BareDirectory => Mode::BareDirectory,
        }
    }

    /// Content bytes exactly as laid out in the uncompressed bundle.
    pub fn content(&self) -> &[u8] {
        match self {
            Payload::Normal(bytes) | Payload::Executable(bytes) => bytes,
            Payload::Link(target) => target.as_bytes(),
            Payload::BareDirectory => &[],
        }
    }

    /// Checksum written into the listing record. Links and bare
    /// directories store 0 and are never re-verified on read.
    pub fn checksum(&self) -> u64 {
        match self {
            Payload::Normal(bytes) | Payload::Executable(bytes) => xxh3_64(bytes),
            Payload::Link(_) | Payload::BareDirectory => 0,
        }
    }
}

/// One record describing a single filesystem entity in the archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Listing {
    /// Path relative to the apex, `/`-separated, no leading `/`
    pub path: String,
    pub payload: Payload,
    /// Index into the bundle table; assigned by the packer
    pub bundle_index: u64,
    /// Byte offset within the uncompressed bundle; assigned by the packer
    pub bundle_offset: u64,
}

impl Listing {
    pub fn new(path: String, payload: Payload) -> Self {
        Self {
            path,
            payload,
            bundle_index: 0,
            bundle_offset: 0,
        }
    }

    pub fn mode(&self) -> Mode {
        self.payload.mode()
    }

    pub fn content_size(&self) -> u64 {
        self.payload.content().len() as u64
    }

    /// Encoded length of this record in the listing header.
    pub fn encoded_len(&self) -> usize {
        LISTING_FIXED_SIZE + self.path.len()
    }

    /// Append this record's encoding to `out`.
    pub fn encode_into(&self, out: &mut Vec<u8>) {
        let total_length = self.encoded_len() as u16;
        out.extend_from_slice(&total_length.to_le_bytes());
        out.extend_from_slice(&self.bundle_index.to_le_bytes());
        out.extend_from_slice(&self.bundle_offset.to_le_bytes());
        out.extend_from_slice(&self.content_size().to_le_bytes());
        out.extend_from_slice(&self.payload.checksum().to_le_bytes());
        out.push(self.payload.mode() as u8);
        out.extend_from_slice(self.path.as_bytes());
    }
}

/// A listing record as parsed from the listing header, before its content
/// has been resolved against a decompressed bundle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingRecord {
    pub bundle_index: u64,
    pub bundle_offset: u64,
    pub content_size: u64,
    pub checksum: u64,
    pub mode: Mode,
    pub path: String,
}

impl ListingRecord {
    /// Decode one record from the front of `buf`, returning the record and
    /// the number of bytes it occupied. Nothing in `buf` is trusted: the
    /// declared length is checked against both the fixed-field minimum and
    /// the bytes actually present.
    pub fn decode(buf: &[u8]) -> Result<(Self, usize)> {
        if buf.len() < 2 {
            return Err(DecafError::Truncated(
                "listing record length field extends past listing header".to_string(),
            ));
        }
        let total_length = u16::from_le_bytes([buf[0], buf[1]]) as usize;
        if total_length < LISTING_FIXED_SIZE {
            return Err(DecafError::Truncated(format!(
                "listing record declares {} bytes, less than the {} fixed bytes",
                total_length, LISTING_FIXED_SIZE
            )));
        }
        if total_length > buf.len() {
            return Err(DecafError::Truncated(format!(
                "listing record declares {} bytes but only {} remain in the listing header",
                total_length,
                buf.len()
            )));
        }

        let bundle_index = read_u64(buf, 2);
        let bundle_offset = read_u64(buf, 10);
        let content_size = read_u64(buf, 18);
        let checksum = read_u64(buf, 26);
        let mode = Mode::from_u8(buf[34])?;
        let path = std::str::from_utf8(&buf[LISTING_FIXED_SIZE..total_length])
            .map_err(|_| DecafError::InvalidPath("listing path is not valid UTF-8".to_string()))?
            .to_string();

        Ok((
            Self {
                bundle_index,
                bundle_offset,
                content_size,
                checksum,
                mode,
                path,
            },
            total_length,
        ))
    }
}

/// A bundle's header record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BundleRecord {
    /// Byte offset of this bundle's first compressed byte from the start
    /// of the data section
    pub offset_in_data_section: u64,
    pub compressed_size: u64,
    /// xxHash3-64 of the bundle's uncompressed content
    pub uncompressed_checksum: u64,
}

impl BundleRecord {
    pub fn encode_into(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.offset_in_data_section.to_le_bytes());
        out.extend_from_slice(&self.compressed_size.to_le_bytes());
        out.extend_from_slice(&self.uncompressed_checksum.to_le_bytes());
    }

    /// Decode a record from `buf`, which must hold at least 24 bytes.
    pub fn decode(buf: &[u8]) -> Self {
        Self {
            offset_in_data_section: read_u64(buf, 0),
            compressed_size: read_u64(buf, 8),
            uncompressed_checksum: read_u64(buf, 16),
        }
    }
}

/// The 24-byte meta header following the archive prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetaHeader {
    pub listing_header_size: u64,
    pub listing_count: u64,
    pub bundle_count: u64,
}

impl MetaHeader {
    pub fn encode_into(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.listing_header_size.to_le_bytes());
        out.extend_from_slice(&self.listing_count.to_le_bytes());
        out.extend_from_slice(&self.bundle_count.to_le_bytes());
    }

    /// Decode from `buf`, which must hold at least 24 bytes.
    pub fn decode(buf: &[u8]) -> Self {
        Self {
            listing_header_size: read_u64(buf, 0),
            listing_count: read_u64(buf, 8),
            bundle_count: read_u64(buf, 16),
        }
    }
}

/// Fixed-width little-endian read; `buf` must hold `offset + 8` bytes.
pub(crate) fn read_u64(buf: &[u8], offset: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&buf[offset..offset + 8]);
    u64::from_le_bytes(bytes)
}
