// SPDX-License-Identifier: MIT OR Apache-2.0
//! Serialization pass protocol.
//!
//! Loading runs each element through PreLoad, Load and PostLoad in that
//! order, replaying the same captured payload every time. Save is a single
//! pass over the in-memory element. Edit and Validate may run at any time.

use crate::black_box::BlackBox;
use crate::dependency::Dependent;
use crate::element::{Element, ElementKind};
use crate::error::PassError;
use crate::factory::ElementFactory;
use crate::graph_element::peek_references;
use ordoplay_editor_graph::{Guid, NodeFactory};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Serialization phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SerializationPass {
    /// Header fields; enough to construct the element
    PreLoad,
    /// Remaining self-contained payload
    Load,
    /// Cross-references, nodes and links
    PostLoad,
    /// Write everything
    Save,
    /// Reduced view for editing surfaces
    Edit,
    /// Read-only integrity checks
    Validate,
}

/// An element part way through loading.
///
/// Holds the captured payload and the last completed pass; each step checks
/// that it follows the previous one.
#[derive(Debug)]
pub struct PendingElement {
    pass: SerializationPass,
    payload: BlackBox,
    element: Element,
    dependencies: Vec<Guid>,
}

impl PendingElement {
    /// Capture `payload` and run PreLoad
    pub fn pre_load(
        kind: ElementKind,
        payload: BlackBox,
        factory: &dyn ElementFactory,
    ) -> Result<Self, PassError> {
        let value = payload.value()?;
        let element = Element::pre_load(kind, &value, factory)?;
        let mut dependencies = element.dependencies();
        if kind == ElementKind::Graph {
            for guid in peek_references(&value) {
                if !dependencies.contains(&guid) {
                    dependencies.push(guid);
                }
            }
        }
        Ok(Self {
            pass: SerializationPass::PreLoad,
            payload,
            element,
            dependencies,
        })
    }

    /// Last completed pass
    pub fn pass(&self) -> SerializationPass {
        self.pass
    }

    /// Element as constructed so far
    pub fn element(&self) -> &Element {
        &self.element
    }

    /// Mutable element, for renaming or re-scoping before Load
    pub fn element_mut(&mut self) -> &mut Element {
        &mut self.element
    }

    /// Run the Load pass
    pub fn load(&mut self) -> Result<(), PassError> {
        self.expect(SerializationPass::PreLoad, SerializationPass::Load)?;
        let value = self.payload.value()?;
        self.element.load(&value)?;
        self.pass = SerializationPass::Load;
        Ok(())
    }

    /// Run the PostLoad pass; every element of the batch must have finished Load
    pub fn post_load(&mut self, nodes: &dyn NodeFactory) -> Result<(), PassError> {
        self.expect(SerializationPass::Load, SerializationPass::PostLoad)?;
        let value = self.payload.value()?;
        self.element.post_load(&value, nodes)?;
        self.pass = SerializationPass::PostLoad;
        Ok(())
    }

    /// Finished element; fails unless PostLoad has run
    pub fn finish(self) -> Result<Element, PassError> {
        if self.pass != SerializationPass::PostLoad {
            return Err(PassError::OutOfOrder {
                current: self.pass,
                requested: SerializationPass::Validate,
            });
        }
        Ok(self.element)
    }

    fn expect(&self, expected: SerializationPass, next: SerializationPass) -> Result<(), PassError> {
        if self.pass != expected {
            return Err(PassError::OutOfOrder {
                current: self.pass,
                requested: next,
            });
        }
        Ok(())
    }
}

impl Dependent for PendingElement {
    fn guid(&self) -> Guid {
        self.element.guid()
    }

    fn kind(&self) -> ElementKind {
        self.element.kind()
    }

    fn dependencies(&self) -> Vec<Guid> {
        self.dependencies.clone()
    }
}

impl Dependent for &Element {
    fn guid(&self) -> Guid {
        Element::guid(self)
    }

    fn kind(&self) -> ElementKind {
        Element::kind(self)
    }

    fn dependencies(&self) -> Vec<Guid> {
        Element::dependencies(self)
    }
}

/// Capture a persisted element and run PreLoad
pub fn capture(kind: ElementKind, payload: &Value, factory: &dyn ElementFactory) -> Result<PendingElement, PassError> {
    PendingElement::pre_load(kind, BlackBox::from_value(payload)?, factory)
}
