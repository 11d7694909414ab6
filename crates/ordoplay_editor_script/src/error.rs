// SPDX-License-Identifier: MIT OR Apache-2.0
//! Error types for document loading and saving.

use crate::dependency::DependencyError;
use crate::element::ElementKind;
use crate::fields::FieldError;
use crate::pass::SerializationPass;
use crate::patch::PatchError;
use crate::store::StoreError;
use ordoplay_editor_graph::{GraphDataError, Guid};

/// Result type for document operations
pub type Result<T> = std::result::Result<T, DocumentError>;

/// Failure while running an element through a serialization pass
#[derive(Debug, thiserror::Error)]
pub enum PassError {
    /// Pass requested before the one it depends on
    #[error("Pass {requested:?} cannot follow {current:?}")]
    OutOfOrder {
        /// Pass the element has completed
        current: SerializationPass,
        /// Pass that was requested
        requested: SerializationPass,
    },

    /// Element factory could not build the kind
    #[error("Element factory cannot create '{0}'")]
    FactoryRefused(ElementKind),

    /// Persisted field missing or malformed
    #[error(transparent)]
    Field(#[from] FieldError),

    /// Payload did not deserialize
    #[error("Malformed payload: {0}")]
    Payload(#[from] serde_json::Error),

    /// Node or link data malformed
    #[error(transparent)]
    Graph(#[from] GraphDataError),
}

/// Errors raised while loading, saving or editing a document
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    /// Storage failure
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Version normalization failed
    #[error(transparent)]
    Patch(#[from] PatchError),

    /// An element failed a serialization pass
    #[error("Element {guid}: {source}")]
    Element {
        /// Element GUID, nil when the header itself was unreadable
        guid: Guid,
        /// Underlying pass failure
        #[source]
        source: PassError,
    },

    /// Dependency ordering refused the batch
    #[error(transparent)]
    Dependency(#[from] DependencyError),

    /// Envelope field missing or malformed
    #[error(transparent)]
    Field(#[from] FieldError),

    /// Clipboard data from a different format version
    #[error("Clipboard version {found} does not match current version {expected}")]
    ClipboardVersion {
        /// Version stamped in the clipboard
        found: u32,
        /// Version this build writes
        expected: u32,
    },

    /// Editing is disabled
    #[error("Editing is disabled")]
    NotEditable,

    /// Element not present in the document
    #[error("Element not found: {0}")]
    ElementNotFound(Guid),

    /// No document with this GUID is loaded
    #[error("Document not found: {0}")]
    DocumentNotFound(Guid),

    /// A document with this GUID is already loaded
    #[error("Document already loaded: {0}")]
    AlreadyLoaded(Guid),
}

impl DocumentError {
    /// Wrap a pass failure with the element it happened on
    pub fn element(guid: Guid, source: impl Into<PassError>) -> Self {
        Self::Element {
            guid,
            source: source.into(),
        }
    }
}
