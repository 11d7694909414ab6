// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph elements.
//!
//! A graph element wraps a [`ScriptGraph`] with the declared signature of the
//! function or condition it implements. It is persisted with a header/detail
//! split so documents can be scanned without materializing nodes and links:
//!
//! ```text
//! { header: { guid, scope_guid, name, type, context_guid },
//!   detail: { pos, inputs, outputs, nodes, links, ... } }
//! ```

use crate::element::{read_flags, Element, ElementHeader, ElementKind};
use crate::error::PassError;
use crate::factory::ElementFactory;
use crate::fields::{self, guid_value};
use ordoplay_editor_graph::{
    GraphSignature, Guid, GuidRemapper, NodeFactory, NodeKind, Port, PortType, ScriptGraph,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// What a graph implements
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GraphKind {
    /// Function body
    Function,
    /// Condition body
    Condition,
    /// Class constructor
    Constructor,
    /// Class destructor
    Destructor,
    /// Signal handler
    SignalReceiver,
    /// State transition
    Transition,
    /// Property accessor
    Property,
    /// Unrecognized graph type
    #[default]
    #[serde(other)]
    Unknown,
}

impl GraphKind {
    /// Whether the graph declares inputs and outputs
    pub fn has_signature(self) -> bool {
        matches!(self, Self::Function | Self::Condition)
    }

    fn admits(self, node: &NodeKind) -> bool {
        match node {
            NodeKind::Begin | NodeKind::Return => self.has_signature(),
            NodeKind::BeginConstructor => self == Self::Constructor,
            NodeKind::BeginDestructor => self == Self::Destructor,
            NodeKind::BeginSignalReceiver => self == Self::SignalReceiver,
            _ => true,
        }
    }
}

/// Declared graph input or output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphParam {
    /// Parameter name
    pub name: String,
    /// Data type
    #[serde(rename = "type")]
    pub data_type: PortType,
}

impl GraphParam {
    /// Create a parameter
    pub fn new(name: impl Into<String>, data_type: PortType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }

    fn to_port(&self) -> Port {
        Port::data(self.name.clone(), self.data_type.clone())
    }
}

/// Header keys modeled by [`GraphElement`]
const HEADER_KEYS: [&str; 5] = ["guid", "scope_guid", "name", "type", "context_guid"];

/// Detail keys modeled by [`GraphElement`]
const DETAIL_KEYS: [&str; 6] = ["pos", "inputs", "outputs", "nodes", "links", "flags"];

/// Graph element body
#[derive(Debug, Clone, Default)]
pub struct GraphElement {
    /// Graph kind
    pub kind: GraphKind,
    /// Function, signal or state this graph belongs to
    pub context_guid: Option<Guid>,
    /// Editor position
    pub position: [f32; 2],
    inputs: Vec<GraphParam>,
    outputs: Vec<GraphParam>,
    graph: ScriptGraph,
    /// Node kinds offered to the editor; rebuilt on refresh, never persisted
    available_nodes: Vec<NodeKind>,
    /// Persisted type tag when it did not name a known [`GraphKind`]
    type_tag: Option<String>,
    /// Unmodeled header fields
    header_extra: Map<String, Value>,
    /// Unmodeled fields beside `header` and `detail`
    entry_extra: Map<String, Value>,
}

impl GraphElement {
    /// Create an empty graph
    pub fn new(kind: GraphKind, context_guid: Option<Guid>) -> Self {
        Self {
            kind,
            context_guid,
            ..Self::default()
        }
    }

    /// Node/link network
    pub fn graph(&self) -> &ScriptGraph {
        &self.graph
    }

    /// Mutable node/link network
    pub fn graph_mut(&mut self) -> &mut ScriptGraph {
        &mut self.graph
    }

    /// Declared inputs
    pub fn inputs(&self) -> &[GraphParam] {
        &self.inputs
    }

    /// Declared outputs
    pub fn outputs(&self) -> &[GraphParam] {
        &self.outputs
    }

    /// Declare an input. Only function and condition graphs take inputs;
    /// names must be unique.
    pub fn add_input(&mut self, param: GraphParam) -> bool {
        if !self.kind.has_signature() || self.inputs.iter().any(|p| p.name == param.name) {
            return false;
        }
        self.inputs.push(param);
        true
    }

    /// Declare an output
    pub fn add_output(&mut self, param: GraphParam) -> bool {
        if !self.kind.has_signature() || self.outputs.iter().any(|p| p.name == param.name) {
            return false;
        }
        self.outputs.push(param);
        true
    }

    /// Remove a declared input
    pub fn remove_input(&mut self, name: &str) -> bool {
        let before = self.inputs.len();
        self.inputs.retain(|p| p.name != name);
        before != self.inputs.len()
    }

    /// Remove a declared output
    pub fn remove_output(&mut self, name: &str) -> bool {
        let before = self.outputs.len();
        self.outputs.retain(|p| p.name != name);
        before != self.outputs.len()
    }

    /// Type tag as persisted; differs from `kind` only for unknown types
    pub fn type_tag(&self) -> Option<&str> {
        match (&self.type_tag, self.kind) {
            (Some(tag), GraphKind::Unknown) => Some(tag),
            _ => None,
        }
    }

    /// Node kinds the editor may add to this graph
    pub fn available_nodes(&self) -> &[NodeKind] {
        &self.available_nodes
    }

    fn signature_ports(&self) -> (Vec<Port>, Vec<Port>) {
        (
            self.inputs.iter().map(GraphParam::to_port).collect(),
            self.outputs.iter().map(GraphParam::to_port).collect(),
        )
    }

    /// Construct a node and derive its ports from this graph's signature
    pub fn add_node(
        &mut self,
        factory: &dyn NodeFactory,
        guid: Guid,
        kind: &NodeKind,
        context_guid: Option<Guid>,
        ref_guid: Option<Guid>,
        pos: [f32; 2],
    ) -> Option<Guid> {
        let guid = self
            .graph
            .add_node(factory, guid, kind, context_guid, ref_guid, pos)?;
        let (inputs, outputs) = self.signature_ports();
        if let Some(node) = self.graph.node_mut(guid) {
            factory.refresh(
                node,
                &GraphSignature {
                    inputs: &inputs,
                    outputs: &outputs,
                },
            );
        }
        Some(guid)
    }

    /// Re-derive node ports and rebuild the palette
    pub fn refresh(&mut self, factory: &dyn NodeFactory) {
        let (inputs, outputs) = self.signature_ports();
        self.graph.refresh(
            factory,
            &GraphSignature {
                inputs: &inputs,
                outputs: &outputs,
            },
        );
        let kind = self.kind;
        self.available_nodes = factory
            .available_kinds()
            .into_iter()
            .filter(|k| kind.admits(k))
            .collect();
    }

    /// Every GUID outside the graph that it refers to
    pub fn references(&self) -> Vec<Guid> {
        let mut refs: Vec<Guid> = self.context_guid.into_iter().collect();
        for guid in self.graph.nodes().flat_map(|n| n.references()) {
            if !refs.contains(&guid) {
                refs.push(guid);
            }
        }
        refs
    }

    /// Rewrite the context GUID, node GUIDs and node references
    pub fn remap_guids(&mut self, remapper: &GuidRemapper) {
        self.context_guid = remapper.remap_opt(self.context_guid);
        self.graph.remap_guids(remapper);
    }

    /// PreLoad: read the header and construct the element
    pub(crate) fn pre_load(payload: &Value, factory: &dyn ElementFactory) -> Result<Element, PassError> {
        let obj = fields::as_object(payload, "graph")?;
        let header = obj
            .get("header")
            .ok_or_else(|| fields::FieldError::missing("graph/header"))?;
        let header = fields::as_object(header, "graph/header")?;
        let guid = fields::read_guid(header, "guid")?;
        let scope = fields::read_opt_guid(header, "scope_guid")?;
        let name = fields::read_string(header, "name")?;
        let (kind, type_tag) = match header.get("type") {
            Some(value) => match serde_json::from_value(value.clone())? {
                GraphKind::Unknown => {
                    let tag = value.as_str().filter(|t| *t != "unknown").map(str::to_owned);
                    if let Some(tag) = &tag {
                        tracing::warn!("Graph {guid} has unknown type '{tag}'");
                    }
                    (GraphKind::Unknown, tag)
                }
                kind => (kind, None),
            },
            None => (GraphKind::Unknown, None),
        };
        let context_guid = fields::read_opt_guid(header, "context_guid")?;

        let mut element = factory
            .create(ElementKind::Graph, guid, scope, &name)
            .ok_or(PassError::FactoryRefused(ElementKind::Graph))?;
        let graph = element
            .as_graph_mut()
            .ok_or(PassError::FactoryRefused(ElementKind::Graph))?;
        graph.kind = kind;
        graph.type_tag = type_tag;
        graph.context_guid = context_guid;
        graph.header_extra = fields::without_keys(header, &HEADER_KEYS);
        graph.entry_extra = fields::without_keys(obj, &["header", "detail"]);
        Ok(element)
    }

    /// Load: read signature and layout, returning unmodeled detail fields
    pub(crate) fn load(
        &mut self,
        payload: &Value,
        header: &mut ElementHeader,
    ) -> Result<Map<String, Value>, PassError> {
        let Some(detail) = payload.get("detail") else {
            return Ok(Map::new());
        };
        let detail = fields::as_object(detail, "graph/detail")?;
        self.position = fields::read_pos(detail, "pos")?;
        if let Some(inputs) = detail.get("inputs") {
            self.inputs = serde_json::from_value(inputs.clone())?;
        }
        if let Some(outputs) = detail.get("outputs") {
            self.outputs = serde_json::from_value(outputs.clone())?;
        }
        header.flags = read_flags(detail)?;
        Ok(fields::without_keys(detail, &DETAIL_KEYS))
    }

    /// PostLoad: populate nodes and links
    pub(crate) fn post_load(&mut self, payload: &Value, factory: &dyn NodeFactory) -> Result<(), PassError> {
        if let Some(detail) = payload.get("detail") {
            let (inputs, outputs) = self.signature_ports();
            let signature = GraphSignature {
                inputs: &inputs,
                outputs: &outputs,
            };
            if let Some(nodes) = detail.get("nodes") {
                self.graph.load_nodes(factory, nodes, &signature)?;
            }
            if let Some(links) = detail.get("links") {
                self.graph.load_links(links)?;
            }
        }
        self.refresh(factory);
        Ok(())
    }

    /// Save: header and detail in one shot
    pub(crate) fn save(&self, header: &ElementHeader, extra: &Map<String, Value>) -> Result<Value, PassError> {
        let mut head = self.header_extra.clone();
        head.insert("guid".into(), guid_value(Some(header.guid)));
        head.insert("scope_guid".into(), guid_value(header.scope));
        head.insert("name".into(), Value::String(header.name.clone()));
        let kind = match self.type_tag() {
            Some(tag) => Value::String(tag.to_owned()),
            None => serde_json::to_value(self.kind)?,
        };
        head.insert("type".into(), kind);
        head.insert("context_guid".into(), guid_value(self.context_guid));

        let mut detail = extra.clone();
        detail.insert("pos".into(), serde_json::to_value(self.position)?);
        detail.insert("inputs".into(), serde_json::to_value(&self.inputs)?);
        detail.insert("outputs".into(), serde_json::to_value(&self.outputs)?);
        detail.insert("nodes".into(), self.graph.save_nodes()?);
        detail.insert("links".into(), self.graph.save_links()?);
        if !header.flags.is_empty() {
            detail.insert("flags".into(), serde_json::to_value(header.flags)?);
        }

        let mut entry = self.entry_extra.clone();
        entry.insert("header".into(), Value::Object(head));
        entry.insert("detail".into(), Value::Object(detail));
        Ok(Value::Object(entry))
    }

    pub(crate) fn edit_view(&self, view: &mut Map<String, Value>) {
        view.insert("graph_kind".into(), serde_json::to_value(self.kind).unwrap_or(Value::Null));
        view.insert("context_guid".into(), guid_value(self.context_guid));
        view.insert(
            "inputs".into(),
            serde_json::to_value(&self.inputs).unwrap_or(Value::Null),
        );
        view.insert(
            "outputs".into(),
            serde_json::to_value(&self.outputs).unwrap_or(Value::Null),
        );
    }

    pub(crate) fn apply_edit(&mut self, view: &Map<String, Value>) -> Result<(), PassError> {
        if view.contains_key("context_guid") {
            self.context_guid = fields::read_opt_guid(view, "context_guid")?;
        }
        if !self.kind.has_signature() {
            return Ok(());
        }
        if let Some(inputs) = view.get("inputs") {
            self.inputs = serde_json::from_value(inputs.clone())?;
        }
        if let Some(outputs) = view.get("outputs") {
            self.outputs = serde_json::from_value(outputs.clone())?;
        }
        Ok(())
    }
}

/// References held by a persisted graph's nodes, read without building them
pub(crate) fn peek_references(payload: &Value) -> Vec<Guid> {
    let mut refs = Vec::new();
    let Some(nodes) = payload
        .get("detail")
        .and_then(|d| d.get("nodes"))
        .and_then(Value::as_object)
    else {
        return refs;
    };
    for node in nodes.values() {
        let Some(header) = node.get("header").and_then(Value::as_object) else {
            continue;
        };
        for key in ["context_guid", "ref_guid"] {
            if let Ok(Some(guid)) = fields::read_opt_guid(header, key) {
                if !refs.contains(&guid) {
                    refs.push(guid);
                }
            }
        }
    }
    refs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory::StandardElementFactory;
    use ordoplay_editor_graph::create_standard_registry;

    fn function_graph() -> GraphElement {
        let mut graph = GraphElement::new(GraphKind::Function, None);
        assert!(graph.add_input(GraphParam::new("speed", PortType::Float)));
        assert!(graph.add_output(GraphParam::new("ok", PortType::Bool)));
        graph
    }

    #[test]
    fn test_signature_only_on_functions_and_conditions() {
        let mut graph = GraphElement::new(GraphKind::SignalReceiver, None);
        assert!(!graph.add_input(GraphParam::new("x", PortType::Int)));

        let mut graph = function_graph();
        assert!(!graph.add_input(GraphParam::new("speed", PortType::Int)));
        assert!(graph.remove_input("speed"));
        assert!(!graph.remove_input("speed"));
    }

    #[test]
    fn test_begin_and_return_mirror_signature() {
        let registry = create_standard_registry();
        let mut graph = function_graph();
        let begin = graph
            .add_node(&registry, Guid::from_u128(1), &NodeKind::Begin, None, None, [0.0, 0.0])
            .unwrap();
        let ret = graph
            .add_node(&registry, Guid::from_u128(2), &NodeKind::Return, None, None, [0.0, 0.0])
            .unwrap();
        assert!(graph.graph().node(begin).unwrap().output("speed").is_some());
        assert!(graph.graph().node(ret).unwrap().input("ok").is_some());

        graph.remove_output("ok");
        graph.refresh(&registry);
        assert!(graph.graph().node(ret).unwrap().input("ok").is_none());
    }

    #[test]
    fn test_palette_follows_graph_kind() {
        let registry = create_standard_registry();
        let mut function = function_graph();
        function.refresh(&registry);
        assert!(function.available_nodes().contains(&NodeKind::Begin));
        assert!(!function.available_nodes().contains(&NodeKind::BeginConstructor));

        let mut constructor = GraphElement::new(GraphKind::Constructor, None);
        constructor.refresh(&registry);
        assert!(constructor.available_nodes().contains(&NodeKind::BeginConstructor));
        assert!(!constructor.available_nodes().contains(&NodeKind::Return));
        assert!(constructor.available_nodes().contains(&NodeKind::Branch));
    }

    #[test]
    fn test_passes_restore_nodes_and_links() {
        let registry = create_standard_registry();
        let function_guid = Guid::from_u128(50);
        let mut element = Element::new(ElementKind::Graph, Guid::from_u128(10), None, "Tick");
        {
            let graph = element.as_graph_mut().unwrap();
            *graph = function_graph();
            let begin = graph
                .add_node(&registry, Guid::from_u128(1), &NodeKind::Begin, None, None, [0.0, 0.0])
                .unwrap();
            let call = graph
                .add_node(
                    &registry,
                    Guid::from_u128(2),
                    &NodeKind::Function,
                    None,
                    Some(function_guid),
                    [100.0, 0.0],
                )
                .unwrap();
            graph.graph_mut().add_link(begin, "out", call, "in").unwrap();
        }
        let saved = element.save().unwrap();
        assert_eq!(saved["header"]["type"], "function");
        assert_eq!(peek_references(&saved), vec![function_guid]);

        let mut loaded = Element::pre_load(ElementKind::Graph, &saved, &StandardElementFactory).unwrap();
        loaded.load(&saved).unwrap();
        loaded.post_load(&saved, &registry).unwrap();
        let graph = loaded.as_graph().unwrap();
        assert_eq!(graph.graph().node_count(), 2);
        assert_eq!(graph.graph().link_count(), 1);
        assert_eq!(graph.inputs().len(), 1);
        assert_eq!(loaded.dependencies(), vec![function_guid]);
        assert_eq!(loaded.save().unwrap(), saved);
    }

    fn load_graph(payload: &Value) -> Element {
        let registry = create_standard_registry();
        let mut element = Element::pre_load(ElementKind::Graph, payload, &StandardElementFactory).unwrap();
        element.load(payload).unwrap();
        element.post_load(payload, &registry).unwrap();
        element
    }

    #[test]
    fn test_unknown_graph_type_is_saved_back_verbatim() {
        let payload = serde_json::json!({
            "header": {"guid": Guid::from_u128(3).to_string(), "name": "g", "type": "state_tick"},
        });
        let element = load_graph(&payload);
        let graph = element.as_graph().unwrap();
        assert_eq!(graph.kind, GraphKind::Unknown);
        assert_eq!(graph.type_tag(), Some("state_tick"));
        assert_eq!(element.save().unwrap()["header"]["type"], "state_tick");

        let mut retyped = element.clone();
        retyped.as_graph_mut().unwrap().kind = GraphKind::Function;
        assert_eq!(retyped.save().unwrap()["header"]["type"], "function");
    }

    #[test]
    fn test_unmodeled_header_and_entry_fields_survive() {
        let payload = serde_json::json!({
            "header": {
                "guid": Guid::from_u128(3).to_string(),
                "name": "g",
                "type": "function",
                "user_tag": 7,
            },
            "detail": {"pos": [1.0, 2.0], "notes": "keep"},
            "revision": "r12",
        });
        let saved = load_graph(&payload).save().unwrap();
        assert_eq!(saved["header"]["user_tag"], 7);
        assert_eq!(saved["detail"]["notes"], "keep");
        assert_eq!(saved["revision"], "r12");
    }

    #[test]
    fn test_unknown_node_kind_round_trips_with_its_links() {
        let payload = serde_json::json!({
            "header": {"guid": Guid::from_u128(3).to_string(), "name": "g", "type": "function"},
            "detail": {
                "nodes": {
                    "a": {"header": {"guid": Guid::from_u128(1), "type": "begin"}},
                    "b": {
                        "header": {"guid": Guid::from_u128(2), "type": "spawn_entity"},
                        "detail": {"class": "Door"},
                    },
                },
                "links": [{
                    "src_node_guid": Guid::from_u128(1), "src_output_name": "out",
                    "dst_node_guid": Guid::from_u128(2), "dst_input_name": "in",
                }],
            },
        });
        let element = load_graph(&payload);
        let graph = element.as_graph().unwrap();
        assert_eq!(graph.graph().node_count(), 2);
        assert!(graph.graph().is_unresolved(Guid::from_u128(2)));

        let saved = element.save().unwrap();
        let nodes = saved["detail"]["nodes"].as_object().unwrap();
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[&Guid::from_u128(2).to_string()]["detail"]["class"], "Door");
        assert_eq!(saved["detail"]["links"].as_array().unwrap().len(), 1);
    }
}
