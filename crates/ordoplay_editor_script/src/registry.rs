// SPDX-License-Identifier: MIT OR Apache-2.0
//! Open script documents.

use crate::document::ScriptDocument;
use crate::element::Element;
use crate::env::ScriptEnv;
use crate::error::{DocumentError, Result};
use crate::store::DocumentStore;
use indexmap::IndexMap;
use ordoplay_editor_graph::Guid;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Outcome of [`ScriptRegistry::save_all`]
#[derive(Debug, Default)]
pub struct SaveSummary {
    /// Documents written
    pub saved: usize,
    /// Unmodified or archive-backed documents left alone
    pub skipped: usize,
    /// Documents that failed to save
    pub failed: Vec<(PathBuf, DocumentError)>,
}

impl SaveSummary {
    /// Whether every document saved or was skipped
    pub fn is_ok(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Documents loaded through one store, keyed by document GUID
#[derive(Debug)]
pub struct ScriptRegistry {
    env: Arc<ScriptEnv>,
    store: Box<dyn DocumentStore>,
    documents: IndexMap<Guid, ScriptDocument>,
}

impl ScriptRegistry {
    /// Create an empty registry
    pub fn new(env: Arc<ScriptEnv>, store: impl DocumentStore + 'static) -> Self {
        Self {
            env,
            store: Box::new(store),
            documents: IndexMap::new(),
        }
    }

    /// Shared environment
    pub fn env(&self) -> &Arc<ScriptEnv> {
        &self.env
    }

    /// Backing store
    pub fn store(&self) -> &dyn DocumentStore {
        self.store.as_ref()
    }

    /// Create a new, unsaved document at `path`
    pub fn create_document(&mut self, path: impl Into<PathBuf>) -> Guid {
        let document = ScriptDocument::new(Arc::clone(&self.env), path);
        let guid = document.guid();
        self.documents.insert(guid, document);
        guid
    }

    /// Load the document at `path`
    pub fn load_document(&mut self, path: &Path) -> Result<Guid> {
        if let Some(guid) = self.find_by_path(path) {
            return Err(DocumentError::AlreadyLoaded(guid));
        }
        let document = ScriptDocument::load(Arc::clone(&self.env), self.store.as_ref(), path)?;
        let guid = document.guid();
        if self.documents.contains_key(&guid) {
            tracing::warn!("{} duplicates document {guid}", path.display());
            return Err(DocumentError::AlreadyLoaded(guid));
        }
        self.documents.insert(guid, document);
        Ok(guid)
    }

    /// Save one document
    pub fn save_document(&mut self, guid: Guid) -> Result<()> {
        let document = self
            .documents
            .get_mut(&guid)
            .ok_or(DocumentError::DocumentNotFound(guid))?;
        document.save(self.store.as_ref())
    }

    /// Save every modified document, or every document with `force`.
    ///
    /// Failures are collected; the remaining documents are still saved.
    pub fn save_all(&mut self, force: bool) -> SaveSummary {
        let mut summary = SaveSummary::default();
        let store = self.store.as_ref();
        for document in self.documents.values_mut() {
            let flags = document.flags();
            if !flags.on_disk || !(force || flags.modified) {
                summary.skipped += 1;
                continue;
            }
            match document.save(store) {
                Ok(()) => summary.saved += 1,
                Err(err) => {
                    tracing::error!("Failed to save {}: {err}", document.path().display());
                    summary.failed.push((document.path().to_path_buf(), err));
                }
            }
        }
        tracing::info!(
            "Saved {} documents ({} skipped, {} failed)",
            summary.saved,
            summary.skipped,
            summary.failed.len()
        );
        summary
    }

    /// Drop a document without saving
    pub fn unload_document(&mut self, guid: Guid) -> Option<ScriptDocument> {
        self.documents.shift_remove(&guid)
    }

    /// Get a document
    pub fn document(&self, guid: Guid) -> Option<&ScriptDocument> {
        self.documents.get(&guid)
    }

    /// Get a document for modification
    pub fn document_mut(&mut self, guid: Guid) -> Option<&mut ScriptDocument> {
        self.documents.get_mut(&guid)
    }

    /// Documents in load order
    pub fn documents(&self) -> impl Iterator<Item = &ScriptDocument> {
        self.documents.values()
    }

    /// Document loaded from `path`
    pub fn find_by_path(&self, path: &Path) -> Option<Guid> {
        self.documents
            .values()
            .find(|d| d.path() == path)
            .map(ScriptDocument::guid)
    }

    /// Find an element in any document
    pub fn find_element(&self, guid: Guid) -> Option<(Guid, &Element)> {
        self.documents
            .values()
            .find_map(|d| d.element(guid).map(|e| (d.guid(), e)))
    }

    /// Number of open documents
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Whether no document is open
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}
