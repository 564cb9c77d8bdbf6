//! Tree source and sink boundary
//!
//! The codec never touches the filesystem directly. Archiving reads a tree
//! through [`TreeSource`]; extraction writes one through [`TreeSink`]. A
//! source enumerates entries in whatever order is convenient and does no
//! filtering: canonical ordering and the inclusion rules live in the codec.
//!
//! Two implementations ship: [`DiskTree`] over a real directory, and
//! [`MemTree`] over an in-memory map, which doubles as a test fixture and
//! an embedding-friendly backend.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use crate::error::{DecafError, Result};

/// Kind of a walked entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
    Symlink,
}

/// One entry yielded by a tree walk
#[derive(Debug, Clone)]
pub struct WalkEntry {
    /// Path relative to the apex, `/`-separated
    pub path: String,
    pub kind: EntryKind,
    pub owner_readable: bool,
    pub owner_writable: bool,
    pub owner_executable: bool,
}

/// Read side of the tree boundary, consumed during archiving
pub trait TreeSource {
    /// Enumerate every entry under the apex, excluding the apex itself.
    /// Order is unspecified.
    fn walk(&self) -> Result<Vec<WalkEntry>>;

    /// Read the bytes of the regular file at `path`.
    fn read_file(&self, path: &str) -> Result<Vec<u8>>;

    /// Read the raw target of the symbolic link at `path`.
    fn read_link(&self, path: &str) -> Result<String>;

    /// Kind of the entry at the apex-relative `path`, without following
    /// links, or `None` if nothing is there.
    fn stat(&self, path: &str) -> Result<Option<EntryKind>>;
}

/// Write side of the tree boundary, consumed during extraction
pub trait TreeSink {
    /// Ensure every ancestor directory of `path` exists.
    fn make_dirs_for(&mut self, path: &str) -> Result<()>;

    /// Create the empty directory at `path`.
    fn create_bare_dir(&mut self, path: &str) -> Result<()>;

    /// Create a symbolic link at `path` pointing at `target`.
    fn create_symlink(&mut self, target: &str, path: &str) -> Result<()>;

    /// Create a regular file at `path` with the given permission bits.
    fn create_file(&mut self, path: &str, mode_bits: u32, bytes: &[u8]) -> Result<()>;
}

/// Tree source and sink over a real directory
pub struct DiskTree {
    root: PathBuf,
}

impl DiskTree {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn full(&self, path: &str) -> PathBuf {
        self.root.join(path)
    }

    fn source_err(path: &str, source: io::Error) -> DecafError {
        DecafError::SourceIo {
            path: path.to_string(),
            source,
        }
    }

    fn sink_err(path: &str, source: io::Error) -> DecafError {
        DecafError::SinkIo {
            path: path.to_string(),
            source,
        }
    }

    fn relative_string(&self, full: &Path) -> Result<String> {
        let rel = full.strip_prefix(&self.root).map_err(|_| {
            DecafError::InvalidPath(format!(
                "`{}` is not under the apex `{}`",
                full.display(),
                self.root.display()
            ))
        })?;
        rel.to_str()
            .map(|s| s.to_string())
            .ok_or_else(|| DecafError::InvalidPath(format!("`{}` is not UTF-8", rel.display())))
    }
}

impl TreeSource for DiskTree {
    fn walk(&self) -> Result<Vec<WalkEntry>> {
        // Gitignore-style filtering would silently drop archived files,
        // so every standard filter is disabled; links are walked as
        // themselves, never followed.
        let walker = ignore::WalkBuilder::new(&self.root)
            .standard_filters(false)
            .follow_links(false)
            .build();

        let mut entries = Vec::new();
        for entry in walker {
            let entry = entry.map_err(|e| {
                Self::source_err(
                    &self.root.to_string_lossy(),
                    io::Error::new(io::ErrorKind::Other, e),
                )
            })?;
            // Depth 0 is the apex itself, which is not an entry
            if entry.depth() == 0 {
                continue;
            }
            let rel = self.relative_string(entry.path())?;

            // lstat: a walked symlink must report itself, not its target
            let metadata =
                fs::symlink_metadata(entry.path()).map_err(|e| Self::source_err(&rel, e))?;
            let mode = metadata.permissions().mode();

            let kind = if metadata.file_type().is_symlink() {
                EntryKind::Symlink
            } else if metadata.is_dir() {
                EntryKind::Directory
            } else {
                EntryKind::File
            };

            entries.push(WalkEntry {
                path: rel,
                kind,
                owner_readable: mode & 0o400 != 0,
                owner_writable: mode & 0o200 != 0,
                owner_executable: mode & 0o100 != 0,
            });
        }
        Ok(entries)
    }

    fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        fs::read(self.full(path)).map_err(|e| Self::source_err(path, e))
    }

    fn read_link(&self, path: &str) -> Result<String> {
        let target = fs::read_link(self.full(path)).map_err(|e| Self::source_err(path, e))?;
        target
            .to_str()
            .map(|s| s.to_string())
            .ok_or_else(|| DecafError::InvalidPath(format!("link target of `{path}` is not UTF-8")))
    }

    fn stat(&self, path: &str) -> Result<Option<EntryKind>> {
        match fs::symlink_metadata(self.full(path)) {
            Ok(metadata) => {
                let kind = if metadata.file_type().is_symlink() {
                    EntryKind::Symlink
                } else if metadata.is_dir() {
                    EntryKind::Directory
                } else {
                    EntryKind::File
                };
                Ok(Some(kind))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Self::source_err(path, e)),
        }
    }
}

impl TreeSink for DiskTree {
    fn make_dirs_for(&mut self, path: &str) -> Result<()> {
        let parent = match Path::new(path).parent() {
            Some(parent) => self.root.join(parent),
            None => self.root.clone(),
        };
        fs::create_dir_all(parent).map_err(|e| Self::sink_err(path, e))
    }

    fn create_bare_dir(&mut self, path: &str) -> Result<()> {
        fs::create_dir_all(self.full(path)).map_err(|e| Self::sink_err(path, e))
    }

    fn create_symlink(&mut self, target: &str, path: &str) -> Result<()> {
        std::os::unix::fs::symlink(target, self.full(path)).map_err(|e| Self::sink_err(path, e))
    }

    fn create_file(&mut self, path: &str, mode_bits: u32, bytes: &[u8]) -> Result<()> {
        let full = self.full(path);
        fs::write(&full, bytes).map_err(|e| Self::sink_err(path, e))?;
        fs::set_permissions(&full, fs::Permissions::from_mode(mode_bits))
            .map_err(|e| Self::sink_err(path, e))
    }
}

/// One entry of a [`MemTree`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemEntry {
    File { data: Vec<u8>, mode: u32 },
    Dir,
    Symlink { target: String },
}

/// In-memory tree, usable as both source and sink
///
/// Directories containing other entries are implicit, as they are in an
/// archive; only bare directories need an explicit [`MemEntry::Dir`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemTree {
    entries: BTreeMap<String, MemEntry>,
}

impl MemTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a regular file with mode 0644.
    pub fn add_file(&mut self, path: &str, data: &[u8]) {
        self.add_file_with_mode(path, data, 0o644);
    }

    pub fn add_file_with_mode(&mut self, path: &str, data: &[u8], mode: u32) {
        self.entries.insert(
            path.to_string(),
            MemEntry::File {
                data: data.to_vec(),
                mode,
            },
        );
    }

    pub fn add_dir(&mut self, path: &str) {
        self.entries.insert(path.to_string(), MemEntry::Dir);
    }

    pub fn add_symlink(&mut self, path: &str, target: &str) {
        self.entries.insert(
            path.to_string(),
            MemEntry::Symlink {
                target: target.to_string(),
            },
        );
    }

    pub fn get(&self, path: &str) -> Option<&MemEntry> {
        self.entries.get(path)
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(|k| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn missing(path: &str) -> DecafError {
        DecafError::SourceIo {
            path: path.to_string(),
            source: io::Error::new(io::ErrorKind::NotFound, "no such entry"),
        }
    }
}

impl TreeSource for MemTree {
    fn walk(&self) -> Result<Vec<WalkEntry>> {
        Ok(self
            .entries
            .iter()
            .map(|(path, entry)| match entry {
                MemEntry::File { mode, .. } => WalkEntry {
                    path: path.clone(),
                    kind: EntryKind::File,
                    owner_readable: mode & 0o400 != 0,
                    owner_writable: mode & 0o200 != 0,
                    owner_executable: mode & 0o100 != 0,
                },
                MemEntry::Dir => WalkEntry {
                    path: path.clone(),
                    kind: EntryKind::Directory,
                    owner_readable: true,
                    owner_writable: true,
                    owner_executable: true,
                },
                MemEntry::Symlink { .. } => WalkEntry {
                    path: path.clone(),
                    kind: EntryKind::Symlink,
                    owner_readable: true,
                    owner_writable: true,
                    owner_executable: false,
                },
            })
            .collect())
    }

    fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        match self.entries.get(path) {
            Some(MemEntry::File { data, .. }) => Ok(data.clone()),
            _ => Err(Self::missing(path)),
        }
    }

    fn read_link(&self, path: &str) -> Result<String> {
        match self.entries.get(path) {
            Some(MemEntry::Symlink { target }) => Ok(target.clone()),
            _ => Err(Self::missing(path)),
        }
    }

    fn stat(&self, path: &str) -> Result<Option<EntryKind>> {
        if let Some(entry) = self.entries.get(path) {
            return Ok(Some(match entry {
                MemEntry::File { .. } => EntryKind::File,
                MemEntry::Dir => EntryKind::Directory,
                MemEntry::Symlink { .. } => EntryKind::Symlink,
            }));
        }
        // An implicit directory exists wherever entries live beneath it
        let prefix = format!("{path}/");
        if self.entries.keys().any(|k| k.starts_with(&prefix)) {
            return Ok(Some(EntryKind::Directory));
        }
        Ok(None)
    }
}

impl TreeSink for MemTree {
    fn make_dirs_for(&mut self, _path: &str) -> Result<()> {
        // Parent directories are implicit in a MemTree
        Ok(())
    }

    fn create_bare_dir(&mut self, path: &str) -> Result<()> {
        self.add_dir(path);
        Ok(())
    }

    fn create_symlink(&mut self, target: &str, path: &str) -> Result<()> {
        self.add_symlink(path, target);
        Ok(())
    }

    fn create_file(&mut self, path: &str, mode_bits: u32, bytes: &[u8]) -> Result<()> {
        self.add_file_with_mode(path, bytes, mode_bits);
        Ok(())
    }
}
