// SPDX-License-Identifier: MIT OR Apache-2.0
//! Script graph containing nodes and links.

use crate::guid::{Guid, GuidRemapper};
use crate::link::{Link, LinkIndex, LinkRemoved};
use crate::node::{GraphSignature, Node, NodeFactory, NodeHeader, NodeKind};
use crate::port::PortDirection;
use crate::visit::{VisitResult, VisitStatus};
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::sync::mpsc::{self, Receiver, Sender};

/// A node/link network
#[derive(Debug, Default)]
pub struct ScriptGraph {
    /// Nodes by GUID
    nodes: IndexMap<Guid, Node>,
    /// Links in insertion order
    links: Vec<Link>,
    /// Nodes loaded without a factory template; kept verbatim
    unresolved: IndexSet<Guid>,
    /// "Link removed" subscribers
    subscribers: Vec<Sender<LinkRemoved>>,
}

impl Clone for ScriptGraph {
    /// Clones nodes and links; subscriptions stay with the original
    fn clone(&self) -> Self {
        Self {
            nodes: self.nodes.clone(),
            links: self.links.clone(),
            unresolved: self.unresolved.clone(),
            subscribers: Vec::new(),
        }
    }
}

impl ScriptGraph {
    /// Create a new empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Construct a node through `factory` and insert it.
    ///
    /// Returns `None` when the factory cannot build `kind`.
    pub fn add_node(
        &mut self,
        factory: &dyn NodeFactory,
        guid: Guid,
        kind: &NodeKind,
        context_guid: Option<Guid>,
        ref_guid: Option<Guid>,
        pos: [f32; 2],
    ) -> Option<Guid> {
        if self.nodes.contains_key(&guid) {
            tracing::warn!("Node GUID collision: {guid}");
            return None;
        }
        let node = factory.create(kind, guid, context_guid, ref_guid, pos)?;
        self.nodes.insert(guid, node);
        Some(guid)
    }

    /// Insert an already constructed node, replacing any node with the same GUID
    pub fn insert_node(&mut self, node: Node) -> Option<Node> {
        self.nodes.insert(node.guid, node)
    }

    /// Remove a node.
    ///
    /// Links touching the node are left in place; see [`Self::remove_broken_links`].
    pub fn remove_node(&mut self, guid: Guid) -> Option<Node> {
        self.unresolved.swap_remove(&guid);
        self.nodes.swap_remove(&guid)
    }

    /// Whether `guid` was loaded with a kind no factory could build
    pub fn is_unresolved(&self, guid: Guid) -> bool {
        self.unresolved.contains(&guid)
    }

    /// Nodes loaded with a kind no factory could build
    pub fn unresolved_nodes(&self) -> impl Iterator<Item = &Node> {
        self.unresolved.iter().filter_map(|guid| self.nodes.get(guid))
    }

    /// Get a node by GUID
    pub fn node(&self, guid: Guid) -> Option<&Node> {
        self.nodes.get(&guid)
    }

    /// Get a mutable node by GUID
    pub fn node_mut(&mut self, guid: Guid) -> Option<&mut Node> {
        self.nodes.get_mut(&guid)
    }

    /// Get all nodes
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Get the number of nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Validate a prospective link.
    ///
    /// Checks run in order: both nodes exist, both ports exist, the ports are
    /// compatible, neither end exceeds its link capacity, the link is not a
    /// duplicate, and it does not close a cycle.
    pub fn check_link(
        &self,
        src_node: Guid,
        src_output_name: &str,
        dst_node: Guid,
        dst_input_name: &str,
    ) -> Result<(), LinkError> {
        let source = self.nodes.get(&src_node).ok_or(LinkError::NodeNotFound(src_node))?;
        let target = self.nodes.get(&dst_node).ok_or(LinkError::NodeNotFound(dst_node))?;

        let output = source.output(src_output_name).ok_or_else(|| LinkError::PortNotFound {
            node: src_node,
            name: src_output_name.to_string(),
        })?;
        let input = target.input(dst_input_name).ok_or_else(|| LinkError::PortNotFound {
            node: dst_node,
            name: dst_input_name.to_string(),
        })?;

        if !output.is_compatible(input) {
            return Err(LinkError::IncompatiblePorts);
        }

        if !output.multi_link && self.links_from_port(src_node, src_output_name).next().is_some() {
            return Err(LinkError::OutputAlreadyLinked(src_output_name.to_string()));
        }

        if !input.multi_link && self.links_to_port(dst_node, dst_input_name).next().is_some() {
            return Err(LinkError::InputAlreadyLinked(dst_input_name.to_string()));
        }

        if self.find_link(src_node, src_output_name, dst_node, dst_input_name).is_some() {
            return Err(LinkError::DuplicateLink);
        }

        if self.reaches(dst_node, src_node) {
            return Err(LinkError::Cycle);
        }

        Ok(())
    }

    /// Whether a link may be added
    pub fn can_add_link(
        &self,
        src_node: Guid,
        src_output_name: &str,
        dst_node: Guid,
        dst_input_name: &str,
    ) -> bool {
        self.check_link(src_node, src_output_name, dst_node, dst_input_name)
            .is_ok()
    }

    /// Add a link if [`Self::can_add_link`] allows it and no identical link exists
    pub fn add_link(
        &mut self,
        src_node: Guid,
        src_output_name: &str,
        dst_node: Guid,
        dst_input_name: &str,
    ) -> Option<LinkIndex> {
        if let Err(err) = self.check_link(src_node, src_output_name, dst_node, dst_input_name) {
            tracing::debug!("Link {src_node}.{src_output_name} -> {dst_node}.{dst_input_name} refused: {err}");
            return None;
        }
        self.links
            .push(Link::new(src_node, src_output_name, dst_node, dst_input_name));
        Some(self.links.len() - 1)
    }

    /// Append a link without validation (used when loading persisted data)
    pub fn push_link(&mut self, link: Link) -> LinkIndex {
        self.links.push(link);
        self.links.len() - 1
    }

    /// Remove the link at `index`
    pub fn remove_link(&mut self, index: LinkIndex) -> Option<Link> {
        if index >= self.links.len() {
            return None;
        }
        let link = self.links.remove(index);
        self.notify_removed(&link);
        Some(link)
    }

    /// Remove every link touching `node`, returning how many were removed
    pub fn remove_links_for_node(&mut self, node: Guid) -> usize {
        self.remove_links_where(|link| link.involves_node(node))
    }

    /// Remove every link attached to one port of `node`
    pub fn remove_links_for_port(&mut self, node: Guid, direction: PortDirection, name: &str) -> usize {
        self.remove_links_where(|link| match direction {
            PortDirection::Output => link.src_node == node && link.src_output_name == name,
            PortDirection::Input => link.dst_node == node && link.dst_input_name == name,
        })
    }

    /// Remove links whose source or destination node or port no longer exists.
    ///
    /// Returns the number of links removed.
    pub fn remove_broken_links(&mut self) -> usize {
        let (broken, kept): (Vec<Link>, Vec<Link>) = std::mem::take(&mut self.links)
            .into_iter()
            .partition(|link| self.is_link_broken(link));
        self.links = kept;
        for link in &broken {
            self.notify_removed(link);
        }
        if !broken.is_empty() {
            tracing::debug!("Removed {} broken links", broken.len());
        }
        broken.len()
    }

    /// Whether `link` points at a node or port that does not exist.
    ///
    /// Ports of unresolved nodes are unknown, so links touching them are kept.
    pub fn is_link_broken(&self, link: &Link) -> bool {
        let source_ok = self.is_unresolved(link.src_node)
            || self
                .nodes
                .get(&link.src_node)
                .is_some_and(|n| n.output(&link.src_output_name).is_some());
        let target_ok = self.is_unresolved(link.dst_node)
            || self
                .nodes
                .get(&link.dst_node)
                .is_some_and(|n| n.input(&link.dst_input_name).is_some());
        !(source_ok && target_ok)
    }

    /// Index of the link matching the given tuple
    pub fn find_link(
        &self,
        src_node: Guid,
        src_output_name: &str,
        dst_node: Guid,
        dst_input_name: &str,
    ) -> Option<LinkIndex> {
        self.links
            .iter()
            .position(|l| l.matches(src_node, src_output_name, dst_node, dst_input_name))
    }

    /// Get a link by index
    pub fn link(&self, index: LinkIndex) -> Option<&Link> {
        self.links.get(index)
    }

    /// Get all links
    pub fn links(&self) -> impl Iterator<Item = &Link> {
        self.links.iter()
    }

    /// Get the number of links
    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    /// Links leaving `node`
    pub fn links_from_node(&self, node: Guid) -> impl Iterator<Item = &Link> {
        self.links.iter().filter(move |l| l.src_node == node)
    }

    /// Links entering `node`
    pub fn links_to_node(&self, node: Guid) -> impl Iterator<Item = &Link> {
        self.links.iter().filter(move |l| l.dst_node == node)
    }

    fn links_from_port<'a>(&'a self, node: Guid, name: &'a str) -> impl Iterator<Item = &'a Link> {
        self.links
            .iter()
            .filter(move |l| l.src_node == node && l.src_output_name == name)
    }

    fn links_to_port<'a>(&'a self, node: Guid, name: &'a str) -> impl Iterator<Item = &'a Link> {
        self.links
            .iter()
            .filter(move |l| l.dst_node == node && l.dst_input_name == name)
    }

    /// Visit links in order until the visitor stops
    pub fn visit_links<F>(&self, mut visitor: F) -> VisitResult
    where
        F: FnMut(LinkIndex, &Link) -> VisitStatus,
    {
        for (index, link) in self.links.iter().enumerate() {
            if visitor(index, link) == VisitStatus::Stop {
                return VisitResult::Stopped;
            }
        }
        VisitResult::Completed
    }

    /// Subscribe to "link removed" notifications
    pub fn subscribe_link_removed(&mut self) -> Receiver<LinkRemoved> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.push(tx);
        rx
    }

    /// Re-derive every node's ports
    pub fn refresh(&mut self, factory: &dyn NodeFactory, signature: &GraphSignature<'_>) {
        for node in self.nodes.values_mut() {
            factory.refresh(node, signature);
        }
    }

    /// Rewrite node GUIDs and node references through `remapper`
    pub fn remap_guids(&mut self, remapper: &GuidRemapper) {
        let nodes = std::mem::take(&mut self.nodes);
        self.nodes = nodes
            .into_values()
            .map(|mut node| {
                node.remap_guids(remapper);
                (node.guid, node)
            })
            .collect();
        self.unresolved = self.unresolved.iter().map(|g| remapper.remap(*g)).collect();
        for link in &mut self.links {
            link.remap_guids(remapper);
        }
    }

    /// Serialize nodes as `{guid: {header, detail}}`
    pub fn save_nodes(&self) -> Result<Value, GraphDataError> {
        let mut map = Map::new();
        for node in self.nodes.values() {
            let entry = PersistedNode {
                header: node.header(),
                detail: node.detail.clone(),
            };
            map.insert(node.guid.to_string(), serde_json::to_value(entry)?);
        }
        Ok(Value::Object(map))
    }

    /// Serialize links as an ordered array
    pub fn save_links(&self) -> Result<Value, GraphDataError> {
        Ok(serde_json::to_value(&self.links)?)
    }

    /// Populate nodes from `{guid: {header, detail}}`.
    ///
    /// Nodes whose kind the factory does not know are kept as portless
    /// placeholders so they save back unchanged. Returns the number of nodes
    /// loaded, placeholders included.
    pub fn load_nodes(
        &mut self,
        factory: &dyn NodeFactory,
        nodes: &Value,
        signature: &GraphSignature<'_>,
    ) -> Result<usize, GraphDataError> {
        let Some(entries) = nodes.as_object() else {
            return match nodes {
                Value::Null => Ok(0),
                _ => Err(GraphDataError::NotAnObject("nodes")),
            };
        };
        let mut loaded = 0;
        for entry in entries.values() {
            let persisted: PersistedNode = serde_json::from_value(entry.clone())?;
            let header = persisted.header;
            match factory.create(&header.kind, header.guid, header.context_guid, header.ref_guid, header.pos) {
                Some(mut node) => {
                    node.detail = persisted.detail;
                    factory.refresh(&mut node, signature);
                    self.nodes.insert(node.guid, node);
                }
                None => {
                    tracing::warn!("Unknown node kind '{}' for node {}", header.kind, header.guid);
                    self.unresolved.insert(header.guid);
                    self.nodes.insert(header.guid, Node::from_header(header, persisted.detail));
                }
            }
            loaded += 1;
        }
        Ok(loaded)
    }

    /// Append links from an ordered array
    pub fn load_links(&mut self, links: &Value) -> Result<usize, GraphDataError> {
        if links.is_null() {
            return Ok(0);
        }
        let links: Vec<Link> = serde_json::from_value(links.clone())?;
        let count = links.len();
        self.links.extend(links);
        Ok(count)
    }

    /// Whether `to` is reachable from `from` along existing links
    fn reaches(&self, from: Guid, to: Guid) -> bool {
        let mut visited = HashSet::new();
        let mut stack = vec![from];
        while let Some(current) = stack.pop() {
            if current == to {
                return true;
            }
            if visited.insert(current) {
                stack.extend(self.links_from_node(current).map(|l| l.dst_node));
            }
        }
        false
    }

    fn remove_links_where<F>(&mut self, predicate: F) -> usize
    where
        F: Fn(&Link) -> bool,
    {
        let (removed, kept): (Vec<Link>, Vec<Link>) =
            std::mem::take(&mut self.links).into_iter().partition(|l| predicate(l));
        self.links = kept;
        for link in &removed {
            self.notify_removed(link);
        }
        removed.len()
    }

    fn notify_removed(&mut self, link: &Link) {
        self.subscribers.retain(|tx| {
            tx.send(LinkRemoved { link: link.clone() }).is_ok()
        });
    }
}

/// Persisted node entry
#[derive(Debug, Serialize, Deserialize)]
struct PersistedNode {
    header: NodeHeader,
    #[serde(default)]
    detail: Value,
}

/// Reason a link was refused
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LinkError {
    /// Node not found
    #[error("Node not found: {0}")]
    NodeNotFound(Guid),

    /// Port not found
    #[error("Port '{name}' not found on node {node}")]
    PortNotFound {
        /// Node that was searched
        node: Guid,
        /// Requested port name
        name: String,
    },

    /// Incompatible port types
    #[error("Incompatible port types")]
    IncompatiblePorts,

    /// Output accepts a single link and already has one
    #[error("Output already linked: {0}")]
    OutputAlreadyLinked(String),

    /// Input accepts a single link and already has one
    #[error("Input already linked: {0}")]
    InputAlreadyLinked(String),

    /// Identical link exists
    #[error("Link already exists")]
    DuplicateLink,

    /// Link would close a cycle
    #[error("Link would create a cycle")]
    Cycle,
}

/// Malformed persisted node or link data
#[derive(Debug, thiserror::Error)]
pub enum GraphDataError {
    /// JSON shape did not match
    #[error("Malformed graph data: {0}")]
    Malformed(#[from] serde_json::Error),

    /// Expected an object
    #[error("Expected an object for '{0}'")]
    NotAnObject(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::create_standard_registry;
    use crate::port::PortType;

    fn guid(n: u128) -> Guid {
        Guid::from_u128(n)
    }

    fn graph_with(kinds: &[NodeKind]) -> (ScriptGraph, Vec<Guid>) {
        let registry = create_standard_registry();
        let mut graph = ScriptGraph::new();
        let guids = kinds
            .iter()
            .enumerate()
            .map(|(i, kind)| {
                graph
                    .add_node(&registry, guid(i as u128 + 1), kind, None, None, [0.0, 0.0])
                    .unwrap()
            })
            .collect();
        (graph, guids)
    }

    #[test]
    fn test_begin_to_function_scenario() {
        let (mut graph, g) = graph_with(&[NodeKind::Begin, NodeKind::Function]);
        let removed = graph.subscribe_link_removed();

        assert!(graph.can_add_link(g[0], "out", g[1], "in"));
        assert_eq!(graph.add_link(g[0], "out", g[1], "in"), Some(0));
        assert_eq!(graph.link_count(), 1);

        // Identical request is refused rather than accepted.
        assert_eq!(graph.add_link(g[0], "out", g[1], "in"), None);
        assert_eq!(graph.link_count(), 1);

        graph.remove_node(g[1]);
        assert_eq!(graph.link_count(), 1);
        assert_eq!(graph.remove_broken_links(), 1);
        assert_eq!(graph.link_count(), 0);
        assert_eq!(removed.try_iter().count(), 1);
    }

    #[test]
    fn test_add_link_accepts_first_and_rejects_duplicate() {
        // A gate that only adds when an identical link is already present
        // would refuse the very first link; this pins the corrected behavior.
        let (mut graph, g) = graph_with(&[NodeKind::Sequence, NodeKind::Function]);
        assert!(graph.find_link(g[0], "out_0", g[1], "in").is_none());
        assert!(graph.add_link(g[0], "out_0", g[1], "in").is_some());
        assert!(graph.find_link(g[0], "out_0", g[1], "in").is_some());
        assert_eq!(
            graph.check_link(g[0], "out_0", g[1], "in"),
            Err(LinkError::OutputAlreadyLinked("out_0".to_string()))
        );
    }

    #[test]
    fn test_duplicate_on_multi_link_ports_is_refused() {
        let (mut graph, g) = graph_with(&[NodeKind::Get, NodeKind::Set]);
        graph.node_mut(g[0]).unwrap().outputs[0].data_type = PortType::Int;
        graph.node_mut(g[1]).unwrap().inputs[1].data_type = PortType::Int;
        graph.node_mut(g[1]).unwrap().inputs[1].multi_link = true;
        assert!(graph.add_link(g[0], "value", g[1], "value").is_some());
        assert_eq!(
            graph.check_link(g[0], "value", g[1], "value"),
            Err(LinkError::DuplicateLink)
        );
    }

    #[test]
    fn test_unknown_port_is_refused() {
        let (graph, g) = graph_with(&[NodeKind::Begin, NodeKind::Function]);
        assert!(!graph.can_add_link(g[0], "nope", g[1], "in"));
        assert!(matches!(
            graph.check_link(g[0], "out", g[1], "nope"),
            Err(LinkError::PortNotFound { .. })
        ));
        assert_eq!(
            graph.check_link(guid(99), "out", g[1], "in"),
            Err(LinkError::NodeNotFound(guid(99)))
        );
    }

    #[test]
    fn test_type_mismatch_is_refused() {
        let (mut graph, g) = graph_with(&[NodeKind::Get, NodeKind::Branch]);
        graph.node_mut(g[0]).unwrap().outputs[0].data_type = PortType::Float;
        assert_eq!(
            graph.check_link(g[0], "value", g[1], "condition"),
            Err(LinkError::IncompatiblePorts)
        );
        // Execute output into a data input.
        let (graph, g) = graph_with(&[NodeKind::Branch, NodeKind::Branch]);
        assert_eq!(
            graph.check_link(g[0], "true", g[1], "condition"),
            Err(LinkError::IncompatiblePorts)
        );
    }

    #[test]
    fn test_second_link_on_single_input_is_refused() {
        let (mut graph, g) = graph_with(&[NodeKind::Get, NodeKind::Get, NodeKind::Branch]);
        for i in 0..2 {
            graph.node_mut(g[i]).unwrap().outputs[0].data_type = PortType::Bool;
        }
        assert!(graph.add_link(g[0], "value", g[2], "condition").is_some());
        assert_eq!(
            graph.check_link(g[1], "value", g[2], "condition"),
            Err(LinkError::InputAlreadyLinked("condition".to_string()))
        );
    }

    #[test]
    fn test_cycle_is_refused() {
        let (mut graph, g) = graph_with(&[NodeKind::Function, NodeKind::Function, NodeKind::Function]);
        assert!(graph.add_link(g[0], "out", g[1], "in").is_some());
        assert!(graph.add_link(g[1], "out", g[2], "in").is_some());
        assert_eq!(graph.check_link(g[2], "out", g[0], "in"), Err(LinkError::Cycle));
        assert_eq!(graph.check_link(g[0], "out", g[0], "in"), Err(LinkError::OutputAlreadyLinked("out".to_string())));
        let (graph, g) = graph_with(&[NodeKind::Function]);
        assert_eq!(graph.check_link(g[0], "out", g[0], "in"), Err(LinkError::Cycle));
    }

    #[test]
    fn test_remove_broken_links_is_idempotent() {
        let (mut graph, g) = graph_with(&[NodeKind::Begin, NodeKind::Function, NodeKind::Function]);
        graph.add_link(g[0], "out", g[1], "in").unwrap();
        graph.add_link(g[1], "out", g[2], "in").unwrap();
        graph.remove_node(g[2]);
        assert_eq!(graph.remove_broken_links(), 1);
        assert_eq!(graph.remove_broken_links(), 0);
        assert_eq!(graph.link_count(), 1);
    }

    #[test]
    fn test_remove_links_for_node_notifies_each() {
        let (mut graph, g) = graph_with(&[NodeKind::Begin, NodeKind::Function, NodeKind::Function]);
        let removed = graph.subscribe_link_removed();
        graph.add_link(g[0], "out", g[1], "in").unwrap();
        graph.add_link(g[1], "out", g[2], "in").unwrap();
        assert_eq!(graph.remove_links_for_node(g[1]), 2);
        let events: Vec<_> = removed.try_iter().collect();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].link.src_node, g[0]);
    }

    #[test]
    fn test_remove_link_by_index() {
        let (mut graph, g) = graph_with(&[NodeKind::Begin, NodeKind::Function]);
        graph.add_link(g[0], "out", g[1], "in").unwrap();
        assert!(graph.remove_link(5).is_none());
        let link = graph.remove_link(0).unwrap();
        assert_eq!(link.dst_node, g[1]);
        assert_eq!(graph.link_count(), 0);
    }

    #[test]
    fn test_visit_links_stops_early() {
        let (mut graph, g) = graph_with(&[NodeKind::Sequence, NodeKind::Function, NodeKind::Function]);
        graph.add_link(g[0], "out_0", g[1], "in").unwrap();
        graph.add_link(g[0], "out_1", g[2], "in").unwrap();
        let mut seen = 0;
        let result = graph.visit_links(|_, _| {
            seen += 1;
            VisitStatus::Stop
        });
        assert_eq!(result, VisitResult::Stopped);
        assert_eq!(seen, 1);
        assert_eq!(graph.visit_links(|_, _| VisitStatus::Continue), VisitResult::Completed);
    }

    #[test]
    fn test_nodes_and_links_persist() {
        let registry = create_standard_registry();
        let (mut graph, g) = graph_with(&[NodeKind::Begin, NodeKind::Function]);
        graph.node_mut(g[1]).unwrap().detail = serde_json::json!({ "function": "Jump" });
        graph.add_link(g[0], "out", g[1], "in").unwrap();

        let nodes = graph.save_nodes().unwrap();
        let links = graph.save_links().unwrap();

        let mut loaded = ScriptGraph::new();
        assert_eq!(loaded.load_nodes(&registry, &nodes, &GraphSignature::default()).unwrap(), 2);
        assert_eq!(loaded.load_links(&links).unwrap(), 1);
        assert_eq!(loaded.node(g[1]).unwrap().detail["function"], "Jump");
        assert_eq!(loaded.save_nodes().unwrap(), nodes);
        assert_eq!(loaded.save_links().unwrap(), links);
    }

    #[test]
    fn test_unknown_node_kinds_survive_load_and_save() {
        let registry = create_standard_registry();
        let nodes = serde_json::json!({
            "begin": { "header": { "guid": guid(1), "type": "begin" }, "detail": null },
            "spawn": {
                "header": { "guid": guid(5), "type": "spawn_entity", "pos": [40.0, 8.0] },
                "detail": { "class": "Door" }
            }
        });
        let links = serde_json::json!([{
            "src_node_guid": guid(1), "src_output_name": "out",
            "dst_node_guid": guid(5), "dst_input_name": "in"
        }]);
        let mut graph = ScriptGraph::new();
        assert_eq!(graph.load_nodes(&registry, &nodes, &GraphSignature::default()).unwrap(), 2);
        graph.load_links(&links).unwrap();

        assert!(graph.is_unresolved(guid(5)));
        assert!(!graph.is_unresolved(guid(1)));
        assert_eq!(graph.unresolved_nodes().count(), 1);
        assert_eq!(graph.remove_broken_links(), 0);
        graph.refresh(&registry, &GraphSignature::default());

        let saved = graph.save_nodes().unwrap();
        let spawn = &saved[guid(5).to_string()];
        assert_eq!(spawn["header"]["type"], "spawn_entity");
        assert_eq!(spawn["header"]["pos"], serde_json::json!([40.0, 8.0]));
        assert_eq!(spawn["detail"]["class"], "Door");
        assert_eq!(graph.save_links().unwrap(), links);
    }

    #[test]
    fn test_remap_guids_rekeys_nodes() {
        let (mut graph, g) = graph_with(&[NodeKind::Begin, NodeKind::Function]);
        graph.add_link(g[0], "out", g[1], "in").unwrap();
        let mut remapper = GuidRemapper::new();
        remapper.bind(g[0], guid(100));
        remapper.bind(g[1], guid(200));
        graph.remap_guids(&remapper);
        assert!(graph.node(guid(100)).is_some());
        assert!(graph.node(g[0]).is_none());
        assert!(graph.find_link(guid(100), "out", guid(200), "in").is_some());
    }
}
