//! Listing construction from a tree source
//!
//! Walks a [`TreeSource`], classifies each entry, and produces the
//! canonically ordered listing sequence the rest of the codec consumes.
//! The source is trusted for bytes only; every inclusion, skip, and
//! ordering decision is made here so that two walks of the same tree on
//! different hosts canonicalize identically.

use std::cmp::Ordering;
use std::collections::HashSet;

use crate::archive::format::{Listing, Payload, MAX_PATH_LENGTH};
use crate::error::{DecafError, Result};
use crate::vfs::{EntryKind, TreeSource, WalkEntry};

/// Walk `source` and build the canonical listing sequence.
///
/// Classification per entry:
/// - empty directory -> bare directory listing; non-empty directories are
///   implicit in their children and emit nothing
/// - symlink -> link listing carrying the apex-relative target, or skipped
///   when the target escapes the apex, is itself a link, or does not exist
/// - regular file -> executable or normal listing by the owner-exec bit,
///   skipped when not owner-readable or not owner-writable
pub fn build_listings<S: TreeSource>(source: &S) -> Result<Vec<Listing>> {
    let entries = source.walk()?;
    let parents = parent_dirs(&entries);

    let mut seen = HashSet::new();
    let mut listings = Vec::new();
    for entry in &entries {
        validate_path(&entry.path)?;
        if !seen.insert(entry.path.as_str()) {
            return Err(DecafError::DuplicatePath(entry.path.clone()));
        }

        match entry.kind {
            EntryKind::Directory => {
                if !parents.contains(entry.path.as_str()) {
                    listings.push(Listing::new(entry.path.clone(), Payload::BareDirectory));
                }
            }
            EntryKind::Symlink => {
                if let Some(target) = resolve_link(source, &entry.path)? {
                    listings.push(Listing::new(entry.path.clone(), Payload::Link(target)));
                }
            }
            EntryKind::File => {
                if !entry.owner_readable || !entry.owner_writable {
                    continue;
                }
                let bytes = source.read_file(&entry.path)?;
                let payload = if entry.owner_executable {
                    Payload::Executable(bytes)
                } else {
                    Payload::Normal(bytes)
                };
                listings.push(Listing::new(entry.path.clone(), payload));
            }
        }
    }

    listings.sort_by(canonical_cmp);
    Ok(listings)
}

/// Canonical total order over listings: content size ascending, then path
/// byte length ascending, then path bytes ascending. Paths are unique, so
/// the comparator never ties on all three keys.
pub fn canonical_cmp(a: &Listing, b: &Listing) -> Ordering {
    a.content_size()
        .cmp(&b.content_size())
        .then(a.path.len().cmp(&b.path.len()))
        .then(a.path.as_bytes().cmp(b.path.as_bytes()))
}

/// Every directory path that has at least one walked entry beneath it.
fn parent_dirs<'a>(entries: &'a [WalkEntry]) -> HashSet<&'a str> {
    let mut parents = HashSet::new();
    for entry in entries {
        for (i, byte) in entry.path.bytes().enumerate() {
            if byte == b'/' {
                parents.insert(&entry.path[..i]);
            }
        }
    }
    parents
}

/// Reject paths that could escape the apex or overflow a listing record.
/// Applied to walked entries before archiving and to parsed records before
/// extraction, so a crafted archive cannot write outside its destination.
pub(crate) fn validate_path(path: &str) -> Result<()> {
    if path.is_empty() || path.starts_with('/') {
        return Err(DecafError::InvalidPath(format!(
            "`{path}` is not a relative path"
        )));
    }
    if path.split('/').any(|c| c.is_empty() || c == "." || c == "..") {
        return Err(DecafError::InvalidPath(format!(
            "`{path}` contains `.`, `..`, or an empty component"
        )));
    }
    if path.len() > MAX_PATH_LENGTH {
        return Err(DecafError::PathTooLong {
            path: path.to_string(),
            length: path.len(),
        });
    }
    Ok(())
}

/// Normalize a link's raw target to an apex-relative path, or `None` when
/// the link must be skipped.
fn resolve_link<S: TreeSource>(source: &S, path: &str) -> Result<Option<String>> {
    let raw = source.read_link(path)?;
    let target = match clean_target(&raw) {
        Some(target) => target,
        None => return Ok(None), // escapes the apex
    };
    match source.stat(&target)? {
        // A link to a link, or to nothing, is dropped
        None | Some(EntryKind::Symlink) => Ok(None),
        Some(_) => Ok(Some(target)),
    }
}

/// Collapse `.` and `..` components of a raw link target and express the
/// result relative to the apex. Absolute prefixes are joined under the
/// apex. Returns `None` if the target climbs out of the apex.
fn clean_target(raw: &str) -> Option<String> {
    let mut parts: Vec<&str> = Vec::new();
    for component in raw.split('/') {
        match component {
            "" | "." => {}
            ".." => {
                parts.pop()?;
            }
            c => parts.push(c),
        }
    }
    if parts.is_empty() {
        return None;
    }
    Some(parts.join("/"))
}
