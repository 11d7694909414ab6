// SPDX-License-Identifier: MIT OR Apache-2.0
//! Shared script environment.
//!
//! Collaborators every document needs: identifier service, element and node
//! factories, patch chain, configuration and the editable gate.

use crate::config::ScriptConfig;
use crate::factory::{ElementFactory, StandardElementFactory};
use crate::patch::DocPatcher;
use ordoplay_editor_graph::{create_standard_registry, GuidGenerator, NodeFactory, RandomGuidGenerator};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

/// Services shared by all documents of a registry
pub struct ScriptEnv {
    guids: Box<dyn GuidGenerator>,
    elements: Box<dyn ElementFactory>,
    nodes: Box<dyn NodeFactory>,
    patcher: DocPatcher,
    config: ScriptConfig,
    editable: AtomicBool,
}

impl ScriptEnv {
    /// Standard factories, random GUIDs, editing enabled
    pub fn new(config: ScriptConfig) -> Self {
        Self {
            guids: Box::new(RandomGuidGenerator),
            elements: Box::new(StandardElementFactory),
            nodes: Box::new(create_standard_registry()),
            patcher: DocPatcher::standard(),
            config,
            editable: AtomicBool::new(true),
        }
    }

    /// Replace the identifier service
    pub fn with_guid_generator(mut self, guids: impl GuidGenerator + 'static) -> Self {
        self.guids = Box::new(guids);
        self
    }

    /// Replace the element factory
    pub fn with_element_factory(mut self, factory: impl ElementFactory + 'static) -> Self {
        self.elements = Box::new(factory);
        self
    }

    /// Replace the node factory
    pub fn with_node_factory(mut self, factory: impl NodeFactory + 'static) -> Self {
        self.nodes = Box::new(factory);
        self
    }

    /// Replace the patch chain
    pub fn with_patcher(mut self, patcher: DocPatcher) -> Self {
        self.patcher = patcher;
        self
    }

    /// Identifier service
    pub fn guids(&self) -> &dyn GuidGenerator {
        self.guids.as_ref()
    }

    /// Element factory
    pub fn element_factory(&self) -> &dyn ElementFactory {
        self.elements.as_ref()
    }

    /// Node factory
    pub fn node_factory(&self) -> &dyn NodeFactory {
        self.nodes.as_ref()
    }

    /// Patch chain
    pub fn patcher(&self) -> &DocPatcher {
        &self.patcher
    }

    /// Configuration
    pub fn config(&self) -> &ScriptConfig {
        &self.config
    }

    /// Whether editing operations are allowed
    pub fn is_editable(&self) -> bool {
        self.editable.load(Ordering::Relaxed)
    }

    /// Open or close the editing session
    pub fn set_editable(&self, editable: bool) {
        self.editable.store(editable, Ordering::Relaxed);
    }
}

impl Default for ScriptEnv {
    fn default() -> Self {
        Self::new(ScriptConfig::default())
    }
}

impl fmt::Debug for ScriptEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptEnv")
            .field("patcher", &self.patcher)
            .field("config", &self.config)
            .field("editable", &self.is_editable())
            .finish_non_exhaustive()
    }
}
