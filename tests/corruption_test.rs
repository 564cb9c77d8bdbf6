//! Corruption detection suite
//!
//! Every archive is covered by layered checksums: the whole-archive
//! checksum over bytes 16..end, per-bundle checksums over uncompressed
//! content, and per-listing content checksums. These tests mutate archives
//! byte-by-byte and assert that the reader never silently accepts a
//! damaged input.
//!
//! Mutations behind the prefix are normally caught by the whole-archive
//! checksum first; to exercise the deeper layers, tests re-seal the
//! archive (recompute the prefix checksum) after the targeted mutation.

use decaf_rs::{xxh3_64, ArchiveReader, ArchiveWriter, DecafError, MemTree};

/// A small archive with a link, a text file, and a binary file.
///
/// Canonical order is `link` (8 content bytes), `test.txt` (13), then
/// `data.bin` (1024), all in bundle 0.
fn sample_archive() -> Vec<u8> {
    let mut tree = MemTree::new();
    tree.add_file("test.txt", b"Hello, World!");
    tree.add_file("data.bin", &[0xAB; 1024]);
    tree.add_symlink("link", "test.txt");
    ArchiveWriter::from_source(&tree).unwrap().finish().unwrap()
}

/// Recompute the archive checksum over the (possibly mutated) body.
fn reseal(bytes: &mut [u8]) {
    let checksum = xxh3_64(&bytes[16..]);
    bytes[8..16].copy_from_slice(&checksum.to_le_bytes());
}

fn read_u64(bytes: &[u8], offset: usize) -> u64 {
    u64::from_le_bytes(bytes[offset..offset + 8].try_into().unwrap())
}

#[test]
fn test_corrupted_magic() {
    let mut bytes = sample_archive();
    bytes[0] ^= 0xFF;
    assert!(matches!(
        ArchiveReader::parse(&bytes),
        Err(DecafError::BadMagic)
    ));
}

#[test]
fn test_corrupted_prefix_checksum() {
    let mut bytes = sample_archive();
    bytes[8] ^= 0x01;
    assert!(matches!(
        ArchiveReader::parse(&bytes),
        Err(DecafError::BadArchiveChecksum { .. })
    ));
}

#[test]
fn test_corrupt_byte_17_raises_archive_checksum() {
    let mut bytes = sample_archive();
    bytes[17] ^= 0x01;
    assert!(matches!(
        ArchiveReader::parse(&bytes),
        Err(DecafError::BadArchiveChecksum { .. })
    ));
}

#[test]
fn test_any_single_byte_flip_is_detected() {
    let original = sample_archive();
    for offset in (16..original.len()).step_by(7) {
        let mut bytes = original.clone();
        bytes[offset] ^= 0x10;
        assert!(
            ArchiveReader::parse(&bytes).is_err(),
            "flip at offset {offset} was silently accepted"
        );
    }
}

#[test]
fn test_truncated_inputs() {
    assert!(matches!(
        ArchiveReader::parse(&[]),
        Err(DecafError::Truncated(_))
    ));

    let bytes = sample_archive();
    // Below the prefix + meta header minimum
    assert!(matches!(
        ArchiveReader::parse(&bytes[..39]),
        Err(DecafError::Truncated(_))
    ));
    // Dropping the tail breaks the whole-archive checksum
    assert!(matches!(
        ArchiveReader::parse(&bytes[..bytes.len() - 1]),
        Err(DecafError::BadArchiveChecksum { .. })
    ));
}

#[test]
fn test_random_data_is_rejected() {
    let junk: Vec<u8> = (0..1024).map(|i| (i * 17 + 42) as u8).collect();
    assert!(matches!(
        ArchiveReader::parse(&junk),
        Err(DecafError::BadMagic)
    ));
}

#[test]
fn test_bad_mode_behind_resealed_checksum() {
    let mut bytes = sample_archive();
    // First listing is `link` (path length 4); its mode byte sits at
    // 40 + 34 within the listing header.
    assert_eq!(bytes[74], 2);
    bytes[74] = 7;
    reseal(&mut bytes);
    assert!(matches!(
        ArchiveReader::parse(&bytes),
        Err(DecafError::BadMode(7))
    ));
}

#[test]
fn test_bad_bundle_checksum_behind_resealed_checksum() {
    let mut bytes = sample_archive();
    let listing_header_size = read_u64(&bytes, 16) as usize;
    let bundle_header_start = 40 + listing_header_size;
    // uncompressed_checksum is the third field of the bundle record
    bytes[bundle_header_start + 16] ^= 0xFF;
    reseal(&mut bytes);
    assert!(matches!(
        ArchiveReader::parse(&bytes),
        Err(DecafError::BadBundleChecksum { index: 0, .. })
    ));
}

#[test]
fn test_bad_content_checksum_behind_resealed_checksum() {
    let mut bytes = sample_archive();
    // Second listing is `test.txt`: record starts at 40 + 39, its
    // checksum field 26 bytes further in.
    let record_start = 40 + 39;
    bytes[record_start + 26] ^= 0xFF;
    reseal(&mut bytes);
    match ArchiveReader::parse(&bytes) {
        Err(DecafError::BadContentChecksum { path, .. }) => assert_eq!(path, "test.txt"),
        other => panic!("expected BadContentChecksum, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_link_checksum_is_not_verified() {
    let mut bytes = sample_archive();
    // First listing is `link`; its stored checksum is 0 by convention and
    // the reader must not re-verify it.
    let checksum_field = 40 + 26;
    assert_eq!(read_u64(&bytes, checksum_field), 0);
    bytes[checksum_field..checksum_field + 8].copy_from_slice(&0xDEAD_BEEFu64.to_le_bytes());
    reseal(&mut bytes);
    let reader = ArchiveReader::parse(&bytes).unwrap();
    assert!(reader.contains("link"));
}

#[test]
fn test_corrupted_compressed_data_behind_resealed_checksum() {
    let mut bytes = sample_archive();
    let listing_header_size = read_u64(&bytes, 16) as usize;
    let bundle_count = read_u64(&bytes, 32) as usize;
    let data_section_start = 40 + listing_header_size + 24 * bundle_count;
    // Stomp the zstd frame magic
    bytes[data_section_start] ^= 0xFF;
    reseal(&mut bytes);
    assert!(matches!(
        ArchiveReader::parse(&bytes),
        Err(DecafError::DecompressionFailed(_))
    ));
}

#[test]
fn test_oversized_length_fields_behind_resealed_checksum() {
    // listing_header_size past the archive end
    let mut bytes = sample_archive();
    bytes[16..24].copy_from_slice(&u64::MAX.to_le_bytes());
    reseal(&mut bytes);
    assert!(matches!(
        ArchiveReader::parse(&bytes),
        Err(DecafError::Truncated(_))
    ));

    // listing_count that cannot fit in the listing header
    let mut bytes = sample_archive();
    bytes[24..32].copy_from_slice(&u64::MAX.to_le_bytes());
    reseal(&mut bytes);
    assert!(matches!(
        ArchiveReader::parse(&bytes),
        Err(DecafError::Truncated(_))
    ));

    // bundle compressed_size past the data section
    let mut bytes = sample_archive();
    let listing_header_size = read_u64(&bytes, 16) as usize;
    let size_field = 40 + listing_header_size + 8;
    bytes[size_field..size_field + 8].copy_from_slice(&u64::MAX.to_le_bytes());
    reseal(&mut bytes);
    assert!(matches!(
        ArchiveReader::parse(&bytes),
        Err(DecafError::Truncated(_))
    ));

    // listing total_length past the listing header
    let mut bytes = sample_archive();
    bytes[40..42].copy_from_slice(&u16::MAX.to_le_bytes());
    reseal(&mut bytes);
    assert!(matches!(
        ArchiveReader::parse(&bytes),
        Err(DecafError::Truncated(_))
    ));
}

#[test]
fn test_traversal_paths_behind_resealed_checksum() {
    // `..` components must not reach the sink
    let mut tree = MemTree::new();
    tree.add_file("aa/evil", b"x");
    let mut bytes = ArchiveWriter::from_source(&tree).unwrap().finish().unwrap();
    // Path bytes of the only listing start at 40 + 35
    assert_eq!(&bytes[75..82], b"aa/evil");
    bytes[75..82].copy_from_slice(b"../evil");
    reseal(&mut bytes);
    assert!(matches!(
        ArchiveReader::parse(&bytes),
        Err(DecafError::InvalidPath(_))
    ));

    // Neither must absolute paths
    let mut tree = MemTree::new();
    tree.add_file("xevil", b"x");
    let mut bytes = ArchiveWriter::from_source(&tree).unwrap().finish().unwrap();
    bytes[75..80].copy_from_slice(b"/evil");
    reseal(&mut bytes);
    assert!(matches!(
        ArchiveReader::parse(&bytes),
        Err(DecafError::InvalidPath(_))
    ));
}

#[test]
fn test_bundle_index_out_of_range_behind_resealed_checksum() {
    let mut bytes = sample_archive();
    // First listing's bundle_index field (40 + 2)
    bytes[42..50].copy_from_slice(&5u64.to_le_bytes());
    reseal(&mut bytes);
    assert!(matches!(
        ArchiveReader::parse(&bytes),
        Err(DecafError::Truncated(_))
    ));
}
