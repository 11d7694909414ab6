// SPDX-License-Identifier: MIT OR Apache-2.0
//! Element construction service.

use crate::element::{Element, ElementKind};
use ordoplay_editor_graph::Guid;

/// Builds elements from a kind tag.
///
/// Documents call this both when the editor adds an element and when an
/// element is read back from disk with its persisted GUID.
pub trait ElementFactory: Send + Sync {
    /// Construct an element; `None` when the kind is not supported
    fn create(&self, kind: ElementKind, guid: Guid, scope: Option<Guid>, name: &str) -> Option<Element>;
}

/// Factory for every built-in element kind
#[derive(Debug, Default, Clone, Copy)]
pub struct StandardElementFactory;

impl ElementFactory for StandardElementFactory {
    fn create(&self, kind: ElementKind, guid: Guid, scope: Option<Guid>, name: &str) -> Option<Element> {
        Some(Element::new(kind, guid, scope, name))
    }
}
