mod builder;
mod bundle;
mod format;
mod reader;
mod writer;

pub use builder::{build_listings, canonical_cmp};
pub use bundle::{assign_bundles, compress, decompress, Bundle, COMPRESSION_LEVEL};
pub use format::{
    BundleRecord, Listing, ListingRecord, MetaHeader, Mode, Payload, BUNDLE_RECORD_SIZE,
    LISTING_FIXED_SIZE, LISTING_HEADER_START, MAGIC_NUMBER, MAX_PATH_LENGTH, META_HEADER_SIZE,
    PREFIX_SIZE, TARGET_BUNDLE_SIZE,
};
pub use reader::ArchiveReader;
pub use writer::ArchiveWriter;
