// SPDX-License-Identifier: MIT OR Apache-2.0
//! Element tree.
//!
//! The tree owns every element of a document. Structure is kept beside the
//! elements as an adjacency map (parent GUID to ordered child GUIDs) plus a
//! reverse parent lookup; elements only record their scope GUID. A root
//! sentinel element parents everything whose scope is `None`.

use crate::diagnostics::Diagnostics;
use crate::element::{Element, ElementKind};
use crate::graph_element::GraphElement;
use indexmap::IndexMap;
use ordoplay_editor_graph::{Guid, VisitResult, VisitStatus};
use std::collections::{HashMap, HashSet};

/// GUID-addressed element storage with scope hierarchy
#[derive(Debug, Clone)]
pub struct ElementTree {
    root: Guid,
    elements: IndexMap<Guid, Element>,
    children: HashMap<Guid, Vec<Guid>>,
    parents: HashMap<Guid, Guid>,
}

impl ElementTree {
    /// Create a tree holding only the root sentinel
    pub fn new(root: Guid) -> Self {
        let mut elements = IndexMap::new();
        elements.insert(root, Element::new(ElementKind::Root, root, None, "root"));
        Self {
            root,
            elements,
            children: HashMap::new(),
            parents: HashMap::new(),
        }
    }

    /// Root sentinel GUID
    pub fn root(&self) -> Guid {
        self.root
    }

    /// Number of elements, not counting the root
    pub fn len(&self) -> usize {
        self.elements.len() - 1
    }

    /// Whether only the root exists
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether an element with this GUID exists
    pub fn contains(&self, guid: Guid) -> bool {
        self.elements.contains_key(&guid)
    }

    /// Get an element
    pub fn get(&self, guid: Guid) -> Option<&Element> {
        self.elements.get(&guid)
    }

    /// Get a mutable element
    pub fn get_mut(&mut self, guid: Guid) -> Option<&mut Element> {
        self.elements.get_mut(&guid)
    }

    /// Get a graph element's body
    pub fn graph(&self, guid: Guid) -> Option<&GraphElement> {
        self.get(guid).and_then(Element::as_graph)
    }

    /// Get a graph element's body mutably
    pub fn graph_mut(&mut self, guid: Guid) -> Option<&mut GraphElement> {
        self.get_mut(guid).and_then(Element::as_graph_mut)
    }

    /// Every element except the root, in insertion order
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        let root = self.root;
        self.elements.values().filter(move |e| e.guid() != root)
    }

    /// Every element except the root, mutably
    pub fn elements_mut(&mut self) -> impl Iterator<Item = &mut Element> {
        let root = self.root;
        self.elements.values_mut().filter(move |e| e.guid() != root)
    }

    /// Insert an element without attaching it.
    ///
    /// Refuses (handing the element back) when the GUID is already taken.
    pub fn insert(&mut self, element: Element) -> Result<(), Element> {
        if self.elements.contains_key(&element.guid()) {
            tracing::warn!("Element GUID collision: {}", element.guid());
            return Err(element);
        }
        self.elements.insert(element.guid(), element);
        Ok(())
    }

    /// Attach an inserted element under its scope.
    ///
    /// When the scope does not exist the element stays an orphan: it is kept
    /// but traversal will not reach it.
    pub fn attach(&mut self, guid: Guid) -> bool {
        let Some(element) = self.elements.get(&guid) else {
            return false;
        };
        if guid == self.root || self.parents.contains_key(&guid) {
            return false;
        }
        let parent = element.scope().unwrap_or(self.root);
        if !self.elements.contains_key(&parent) {
            tracing::warn!("Failed to find parent element {parent} for '{}' ({guid})", element.name());
            return false;
        }
        self.children.entry(parent).or_default().push(guid);
        self.parents.insert(guid, parent);
        true
    }

    /// Detach an element from its parent, keeping it in the tree
    pub fn detach(&mut self, guid: Guid) {
        if let Some(parent) = self.parents.remove(&guid) {
            if let Some(siblings) = self.children.get_mut(&parent) {
                siblings.retain(|g| *g != guid);
            }
        }
    }

    /// Whether the element hangs off the root through attached parents
    pub fn is_attached(&self, guid: Guid) -> bool {
        self.parents.contains_key(&guid)
    }

    /// Attached parent (the root for top-level elements)
    pub fn parent(&self, guid: Guid) -> Option<Guid> {
        self.parents.get(&guid).copied()
    }

    /// Attached children of `scope` (`None` for the top level)
    pub fn children(&self, scope: Option<Guid>) -> &[Guid] {
        let parent = scope.unwrap_or(self.root);
        self.children.get(&parent).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Elements whose scope chain leads to `guid`, deepest first
    pub fn descendants(&self, guid: Guid) -> Vec<Guid> {
        let mut out = Vec::new();
        let mut seen = HashSet::new();
        self.collect_descendants(guid, &mut out, &mut seen);
        out
    }

    fn collect_descendants(&self, guid: Guid, out: &mut Vec<Guid>, seen: &mut HashSet<Guid>) {
        let direct: Vec<Guid> = self
            .elements()
            .filter(|e| e.scope() == Some(guid))
            .map(Element::guid)
            .collect();
        for child in direct {
            if seen.insert(child) {
                self.collect_descendants(child, out, seen);
                out.push(child);
            }
        }
    }

    /// Remove an element.
    ///
    /// With `cascade` every descendant is removed first, deepest first.
    /// Without it, an element that still has descendants is left alone.
    /// Returns the removed elements; empty when nothing was removed.
    pub fn remove(&mut self, guid: Guid, cascade: bool) -> Vec<Element> {
        if guid == self.root || !self.contains(guid) {
            return Vec::new();
        }
        let descendants = self.descendants(guid);
        if !cascade && !descendants.is_empty() {
            tracing::warn!(
                "Element {guid} has {} descendants; not removed without cascade",
                descendants.len()
            );
            return Vec::new();
        }
        descendants
            .into_iter()
            .chain(std::iter::once(guid))
            .filter_map(|g| self.remove_one(g))
            .collect()
    }

    fn remove_one(&mut self, guid: Guid) -> Option<Element> {
        self.detach(guid);
        self.children.remove(&guid);
        self.elements.shift_remove(&guid)
    }

    /// Visit the elements under `scope` (`None` for the top level).
    ///
    /// Parents are visited before their children; siblings in attach order.
    pub fn visit<F>(&self, scope: Option<Guid>, recurse: bool, mut visitor: F) -> VisitResult
    where
        F: FnMut(&Element) -> VisitStatus,
    {
        let start = scope.unwrap_or(self.root);
        if !self.contains(start) {
            return VisitResult::Completed;
        }
        self.visit_children(start, recurse, &mut visitor)
    }

    fn visit_children<F>(&self, parent: Guid, recurse: bool, visitor: &mut F) -> VisitResult
    where
        F: FnMut(&Element) -> VisitStatus,
    {
        let Some(children) = self.children.get(&parent) else {
            return VisitResult::Completed;
        };
        for child in children {
            let Some(element) = self.elements.get(child) else {
                continue;
            };
            match visitor(element) {
                VisitStatus::Stop => return VisitResult::Stopped,
                VisitStatus::SkipChildren => {}
                VisitStatus::Continue => {
                    if recurse && self.visit_children(*child, recurse, visitor).is_stopped() {
                        return VisitResult::Stopped;
                    }
                }
            }
        }
        VisitResult::Completed
    }

    /// Visit only elements of `kind`; other elements are still descended into
    pub fn visit_kind<F>(&self, kind: ElementKind, scope: Option<Guid>, recurse: bool, mut visitor: F) -> VisitResult
    where
        F: FnMut(&Element) -> VisitStatus,
    {
        self.visit(scope, recurse, |element| {
            if element.kind() == kind {
                visitor(element)
            } else {
                VisitStatus::Continue
            }
        })
    }

    /// Whether no element in `scope` already uses `name` (case-insensitive)
    pub fn is_name_unique(&self, scope: Option<Guid>, name: &str) -> bool {
        !self
            .elements()
            .any(|e| e.scope() == scope && e.name().eq_ignore_ascii_case(name))
    }

    /// `name`, or `name` with the smallest numeric postfix that is unique in `scope`
    pub fn make_name_unique(&self, scope: Option<Guid>, name: &str) -> String {
        if self.is_name_unique(scope, name) {
            return name.to_string();
        }
        (1u32..)
            .map(|postfix| format!("{name}{postfix}"))
            .find(|candidate| self.is_name_unique(scope, candidate))
            .unwrap_or_else(|| name.to_string())
    }

    /// Read-only integrity checks over every element
    pub fn validate(&self, diagnostics: &mut Diagnostics) {
        for element in self.elements() {
            self.validate_element(element, diagnostics);
        }
    }

    fn validate_element(&self, element: &Element, diagnostics: &mut Diagnostics) {
        let guid = element.guid();
        if element.name().is_empty() {
            diagnostics.warning(Some(guid), "Element has no name");
        }
        if let Some(scope) = element.scope() {
            if !self.contains(scope) {
                diagnostics.error(Some(guid), format!("Scope {scope} not found"));
            }
        }
        let duplicate = self
            .elements()
            .take_while(|e| e.guid() != guid)
            .any(|e| e.scope() == element.scope() && e.name().eq_ignore_ascii_case(element.name()));
        if duplicate {
            diagnostics.warning(Some(guid), format!("Duplicate name '{}' in scope", element.name()));
        }
        if let Some(graph) = element.as_graph() {
            let broken = graph
                .graph()
                .links()
                .filter(|l| graph.graph().is_link_broken(l))
                .count();
            if broken > 0 {
                diagnostics.warning(Some(guid), format!("{broken} broken links"));
            }
            for node in graph.graph().unresolved_nodes() {
                diagnostics.warning(
                    Some(guid),
                    format!("Node {} has unknown kind '{}'", node.guid, node.kind),
                );
            }
            for node in graph.graph().nodes() {
                if let Some(reference) = node.ref_guid {
                    if !self.contains(reference) {
                        diagnostics.warning(
                            Some(guid),
                            format!("Node {} references unknown element {reference}", node.guid),
                        );
                    }
                }
            }
        }
    }
}
