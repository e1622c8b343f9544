//! filesystem capability used by condition evaluation
//!
//! evaluation only ever needs to stat a path, list a directory and read a file, so
//! those three operations are all the [`FileSystem`] trait exposes. the session uses
//! [`OsFileSystem`] unless told otherwise; [`MemoryFileSystem`] lets evaluation logic
//! run against a fake tree without touching the disk.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fmt;
use std::fs;
use std::io::{self, Cursor, Read};
use std::path::{Component, Path, PathBuf};

/// what a path points at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
}

/// the subset of file metadata conditions care about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Metadata {
    pub kind: EntryKind,
    pub len: u64,
}

impl Metadata {
    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }

    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }
}

/// a single directory listing entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: OsString,
    pub kind: EntryKind,
}

/// read-only access to the files a condition can reference
pub trait FileSystem: Send + Sync + fmt::Debug {
    /// stat a path, following symlinks
    fn metadata(&self, path: &Path) -> io::Result<Metadata>;

    /// list the direct children of a directory
    fn read_dir(&self, path: &Path) -> io::Result<Vec<DirEntry>>;

    /// open a file for sequential reading
    fn open(&self, path: &Path) -> io::Result<Box<dyn Read + Send>>;

    /// true if the path exists as a file or directory
    fn exists(&self, path: &Path) -> bool {
        self.metadata(path).is_ok()
    }
}

/// the real filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct OsFileSystem;

impl FileSystem for OsFileSystem {
    fn metadata(&self, path: &Path) -> io::Result<Metadata> {
        let metadata = fs::metadata(path)?;
        let kind = if metadata.is_dir() {
            EntryKind::Directory
        } else {
            EntryKind::File
        };

        Ok(Metadata {
            kind,
            len: metadata.len(),
        })
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<DirEntry>> {
        let mut entries = Vec::new();

        for entry in fs::read_dir(path)? {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping unreadable directory entry");
                    continue;
                }
            };

            // follow symlinks so linked plugins count as files
            let kind = match fs::metadata(entry.path()) {
                Ok(m) if m.is_dir() => EntryKind::Directory,
                Ok(_) => EntryKind::File,
                Err(_) => continue,
            };

            entries.push(DirEntry {
                name: entry.file_name(),
                kind,
            });
        }

        Ok(entries)
    }

    fn open(&self, path: &Path) -> io::Result<Box<dyn Read + Send>> {
        let file = fs::File::open(path)?;
        Ok(Box::new(io::BufReader::new(file)))
    }
}

#[derive(Debug, Clone)]
enum Node {
    File { contents: Vec<u8>, readable: bool },
    Directory { readable: bool },
}

/// an in-memory directory tree
///
/// paths are normalised lexically, so `Data/../Game.exe` and `Game.exe` are the
/// same entry. name lookups are case-sensitive, like most real filesystems on unix
#[derive(Debug, Clone, Default)]
pub struct MemoryFileSystem {
    nodes: BTreeMap<PathBuf, Node>,
}

impl MemoryFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// add a file, creating its parent directories
    pub fn with_file(mut self, path: impl AsRef<Path>, contents: impl Into<Vec<u8>>) -> Self {
        let path = normalise(path.as_ref());
        self.add_parents(&path);
        self.nodes.insert(
            path,
            Node::File {
                contents: contents.into(),
                readable: true,
            },
        );
        self
    }

    /// add a file that can be seen but not opened
    pub fn with_unreadable_file(mut self, path: impl AsRef<Path>) -> Self {
        let path = normalise(path.as_ref());
        self.add_parents(&path);
        self.nodes.insert(
            path,
            Node::File {
                contents: Vec::new(),
                readable: false,
            },
        );
        self
    }

    /// add an empty directory, creating its parents
    pub fn with_dir(mut self, path: impl AsRef<Path>) -> Self {
        let path = normalise(path.as_ref());
        self.add_parents(&path);
        self.nodes
            .entry(path)
            .or_insert(Node::Directory { readable: true });
        self
    }

    /// add a directory that exists but cannot be listed or entered
    pub fn with_unreadable_dir(mut self, path: impl AsRef<Path>) -> Self {
        let path = normalise(path.as_ref());
        self.add_parents(&path);
        self.nodes.insert(path, Node::Directory { readable: false });
        self
    }

    fn add_parents(&mut self, path: &Path) {
        let mut parent = path.parent();
        while let Some(p) = parent {
            if p.as_os_str().is_empty() {
                break;
            }
            self.nodes
                .entry(p.to_path_buf())
                .or_insert(Node::Directory { readable: true });
            parent = p.parent();
        }
    }

    fn node(&self, path: &Path) -> io::Result<&Node> {
        let path = normalise(path);

        // a file inside an unreadable directory is not reachable either
        let mut ancestor = path.parent();
        while let Some(p) = ancestor {
            if let Some(Node::Directory { readable: false }) = self.nodes.get(p) {
                return Err(io::Error::from(io::ErrorKind::PermissionDenied));
            }
            ancestor = p.parent();
        }

        self.nodes
            .get(&path)
            .ok_or_else(|| io::Error::from(io::ErrorKind::NotFound))
    }
}

impl FileSystem for MemoryFileSystem {
    fn metadata(&self, path: &Path) -> io::Result<Metadata> {
        match self.node(path)? {
            Node::File { contents, .. } => Ok(Metadata {
                kind: EntryKind::File,
                len: contents.len() as u64,
            }),
            Node::Directory { .. } => Ok(Metadata {
                kind: EntryKind::Directory,
                len: 0,
            }),
        }
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<DirEntry>> {
        match self.node(path)? {
            Node::File { .. } => {
                return Err(io::Error::new(io::ErrorKind::Other, "not a directory"))
            }
            Node::Directory { readable: false } => {
                return Err(io::Error::from(io::ErrorKind::PermissionDenied))
            }
            Node::Directory { readable: true } => {}
        }

        let dir = normalise(path);
        let entries = self
            .nodes
            .iter()
            .filter(|(p, _)| p.parent() == Some(dir.as_path()))
            .filter_map(|(p, node)| {
                let name = p.file_name()?.to_os_string();
                let kind = match node {
                    Node::File { .. } => EntryKind::File,
                    Node::Directory { .. } => EntryKind::Directory,
                };
                Some(DirEntry { name, kind })
            })
            .collect();

        Ok(entries)
    }

    fn open(&self, path: &Path) -> io::Result<Box<dyn Read + Send>> {
        match self.node(path)? {
            Node::File {
                contents,
                readable: true,
            } => Ok(Box::new(Cursor::new(contents.clone()))),
            Node::File { readable: false, .. } => {
                Err(io::Error::from(io::ErrorKind::PermissionDenied))
            }
            Node::Directory { .. } => Err(io::Error::new(io::ErrorKind::Other, "is a directory")),
        }
    }
}

/// resolve `.` and `..` components without touching the disk
fn normalise(path: &Path) -> PathBuf {
    let mut result = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !result.pop() {
                    result.push("..");
                }
            }
            other => result.push(other.as_os_str()),
        }
    }
    result
}
