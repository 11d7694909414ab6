// SPDX-License-Identifier: MIT OR Apache-2.0
//! Raw document storage.
//!
//! Stores read and write generic field trees. [`FileStore`] owns what it
//! reads; [`ArchiveStore`] hands out shared, immutable trees the way a packed
//! archive would.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// On-disk representation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoreFormat {
    /// Pretty-printed JSON
    #[default]
    Json,
    /// RON
    Ron,
}

/// Storage failure
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// File system error
    #[error("I/O error on {path}: {source}")]
    Io {
        /// File involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// JSON read or write failed
    #[error("JSON error in {path}: {source}")]
    Json {
        /// File involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: serde_json::Error,
    },

    /// RON parse failed
    #[error("RON error in {path}: {source}")]
    RonParse {
        /// File involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: ron::error::SpannedError,
    },

    /// RON write failed
    #[error("RON error in {path}: {source}")]
    Ron {
        /// File involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: ron::Error,
    },

    /// Nothing stored under this path
    #[error("Not found: {0}")]
    NotFound(PathBuf),

    /// Store cannot be written
    #[error("Store is read-only: {0}")]
    ReadOnly(PathBuf),
}

/// A field tree as handed out by a store
#[derive(Debug, Clone)]
pub enum RawTree {
    /// Exclusively owned; may be patched in place
    Owned(Value),
    /// Shared with the store; must be copied before modification
    Shared(Arc<Value>),
}

impl RawTree {
    /// Borrow the tree
    pub fn as_value(&self) -> &Value {
        match self {
            Self::Owned(value) => value,
            Self::Shared(value) => value,
        }
    }

    /// Whether the tree is shared with its store
    pub fn is_shared(&self) -> bool {
        matches!(self, Self::Shared(_))
    }
}

/// Reads and writes raw document trees
pub trait DocumentStore: Send + Sync + std::fmt::Debug {
    /// Read the tree stored at `path`
    fn read(&self, path: &Path) -> Result<RawTree, StoreError>;

    /// Write `tree` to `path`
    fn write(&self, path: &Path, tree: &Value) -> Result<(), StoreError>;

    /// Whether writes are refused
    fn is_read_only(&self) -> bool {
        false
    }
}

/// Documents as files on disk
#[derive(Debug, Clone, Copy, Default)]
pub struct FileStore {
    format: StoreFormat,
}

impl FileStore {
    /// Create a store writing `format`
    pub fn new(format: StoreFormat) -> Self {
        Self { format }
    }

    /// Format written by this store
    pub fn format(&self) -> StoreFormat {
        self.format
    }
}

impl DocumentStore for FileStore {
    fn read(&self, path: &Path) -> Result<RawTree, StoreError> {
        let content = std::fs::read_to_string(path).map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let tree = match self.format {
            StoreFormat::Json => serde_json::from_str(&content).map_err(|source| StoreError::Json {
                path: path.to_path_buf(),
                source,
            })?,
            StoreFormat::Ron => ron::from_str(&content).map_err(|source| StoreError::RonParse {
                path: path.to_path_buf(),
                source,
            })?,
        };
        Ok(RawTree::Owned(tree))
    }

    fn write(&self, path: &Path, tree: &Value) -> Result<(), StoreError> {
        let content = match self.format {
            StoreFormat::Json => serde_json::to_string_pretty(tree).map_err(|source| StoreError::Json {
                path: path.to_path_buf(),
                source,
            })?,
            StoreFormat::Ron => ron::ser::to_string_pretty(tree, ron::ser::PrettyConfig::default())
                .map_err(|source| StoreError::Ron {
                    path: path.to_path_buf(),
                    source,
                })?,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        std::fs::write(path, content).map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Read-only in-memory archive of shared trees
#[derive(Debug, Clone, Default)]
pub struct ArchiveStore {
    entries: HashMap<PathBuf, Arc<Value>>,
}

impl ArchiveStore {
    /// Create an empty archive
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a tree to the archive
    pub fn insert(&mut self, path: impl Into<PathBuf>, tree: Value) {
        self.entries.insert(path.into(), Arc::new(tree));
    }

    /// Paths in the archive
    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.entries.keys().map(PathBuf::as_path)
    }

    /// Shared tree stored at `path`
    pub fn get(&self, path: &Path) -> Option<&Arc<Value>> {
        self.entries.get(path)
    }
}

impl DocumentStore for ArchiveStore {
    fn read(&self, path: &Path) -> Result<RawTree, StoreError> {
        self.entries
            .get(path)
            .map(|tree| RawTree::Shared(Arc::clone(tree)))
            .ok_or_else(|| StoreError::NotFound(path.to_path_buf()))
    }

    fn write(&self, path: &Path, _tree: &Value) -> Result<(), StoreError> {
        Err(StoreError::ReadOnly(path.to_path_buf()))
    }

    fn is_read_only(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tree() -> Value {
        json!({"version": 104, "guid": "00000000-0000-0000-0000-000000000001", "groups": [{"name": "A"}]})
    }

    #[test]
    fn test_file_store_json_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/doc.schematyc");
        let store = FileStore::new(StoreFormat::Json);
        store.write(&path, &tree()).unwrap();
        let read = store.read(&path).unwrap();
        assert!(!read.is_shared());
        assert_eq!(read.as_value(), &tree());
    }

    #[test]
    fn test_file_store_ron_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.schematyc");
        let store = FileStore::new(StoreFormat::Ron);
        store.write(&path, &tree()).unwrap();
        assert_eq!(store.read(&path).unwrap().as_value(), &tree());
    }

    #[test]
    fn test_file_store_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::default();
        assert!(matches!(
            store.read(&dir.path().join("absent.schematyc")),
            Err(StoreError::Io { .. })
        ));
    }

    #[test]
    fn test_archive_is_shared_and_read_only() {
        let mut archive = ArchiveStore::new();
        archive.insert("scripts/doc.schematyc", tree());
        let path = Path::new("scripts/doc.schematyc");

        let read = archive.read(path).unwrap();
        assert!(read.is_shared());
        assert_eq!(Arc::strong_count(archive.get(path).unwrap()), 2);
        assert!(archive.is_read_only());
        assert!(matches!(archive.write(path, &tree()), Err(StoreError::ReadOnly(_))));
        assert!(matches!(
            archive.read(Path::new("other")),
            Err(StoreError::NotFound(_))
        ));
    }
}
