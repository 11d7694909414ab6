// SPDX-License-Identifier: MIT OR Apache-2.0
//! Script document model for `OrdoPlay` Editor.
//!
//! A script document is a tree of typed elements (classes, variables,
//! signals, graphs and so on) persisted as a generic field tree:
//! - Documents load in passes over a dependency-ordered batch
//! - Old files are upgraded by a chain of format patches
//! - Graph elements wrap a [`ordoplay_editor_graph::ScriptGraph`]
//! - Elements can be copied to a clipboard tree and pasted with fresh GUIDs
//!
//! [`ScriptRegistry`] tracks open documents and saves them through a
//! [`DocumentStore`].

pub mod black_box;
pub mod config;
pub mod dependency;
pub mod diagnostics;
pub mod document;
pub mod element;
pub mod env;
pub mod error;
pub mod factory;
pub mod fields;
pub mod graph_element;
pub mod pass;
pub mod patch;
pub mod registry;
pub mod store;
pub mod tree;

pub use black_box::{BlackBox, BlobAllocator, HeapAllocator};
pub use config::{ConfigError, ScriptConfig, CONFIG_FILE_NAME};
pub use dependency::{sort_by_dependency, CyclePolicy, DependencyError, DependencyReport, Dependent};
pub use diagnostics::{Diagnostic, Diagnostics, Severity};
pub use document::{DocumentFlags, ScriptDocument};
pub use element::{Element, ElementBody, ElementFlags, ElementHeader, ElementKind, TypeInfo};
pub use env::ScriptEnv;
pub use error::{DocumentError, PassError, Result};
pub use factory::{ElementFactory, StandardElementFactory};
pub use fields::{FieldError, FieldErrorReason};
pub use graph_element::{GraphElement, GraphKind, GraphParam};
pub use pass::{PendingElement, SerializationPass};
pub use patch::{DocPatcher, Patch, PatchError, CURRENT_VERSION, OLDEST_SUPPORTED_VERSION};
pub use registry::{SaveSummary, ScriptRegistry};
pub use store::{ArchiveStore, DocumentStore, FileStore, RawTree, StoreError, StoreFormat};
pub use tree::ElementTree;
