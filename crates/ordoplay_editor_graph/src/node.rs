// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node definitions for the script graph.

use crate::guid::{Guid, GuidRemapper};
use crate::port::{Port, PortDirection};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Node kind tag.
///
/// The set is open: factories may register [`NodeKind::Custom`] kinds.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NodeKind {
    /// Function/condition entry point
    Begin,
    /// Constructor entry point
    BeginConstructor,
    /// Destructor entry point
    BeginDestructor,
    /// Signal receiver entry point
    BeginSignalReceiver,
    /// Function/condition exit point
    Return,
    /// Run outputs one after another
    Sequence,
    /// If/else
    Branch,
    /// Multi-way branch on a value
    Switch,
    /// Counted loop
    ForLoop,
    /// Call a script or environment function
    Function,
    /// Call a condition
    Condition,
    /// Send a signal to an object
    SendSignal,
    /// Broadcast a signal
    BroadcastSignal,
    /// Read a variable or property
    Get,
    /// Write a variable or property
    Set,
    /// Start a timer
    StartTimer,
    /// Stop a timer
    StopTimer,
    /// Reset a timer
    ResetTimer,
    /// Free-form comment box
    Comment,
    /// Kind provided by an external factory
    Custom(String),
}

impl NodeKind {
    /// Persisted name of this kind
    pub fn as_str(&self) -> &str {
        match self {
            Self::Begin => "begin",
            Self::BeginConstructor => "begin_constructor",
            Self::BeginDestructor => "begin_destructor",
            Self::BeginSignalReceiver => "begin_signal_receiver",
            Self::Return => "return",
            Self::Sequence => "sequence",
            Self::Branch => "branch",
            Self::Switch => "switch",
            Self::ForLoop => "for_loop",
            Self::Function => "call_function",
            Self::Condition => "call_condition",
            Self::SendSignal => "send_signal",
            Self::BroadcastSignal => "broadcast_signal",
            Self::Get => "get",
            Self::Set => "set",
            Self::StartTimer => "start_timer",
            Self::StopTimer => "stop_timer",
            Self::ResetTimer => "reset_timer",
            Self::Comment => "comment",
            Self::Custom(name) => name,
        }
    }

    /// Parse a persisted name; unknown names become [`NodeKind::Custom`]
    pub fn from_name(name: &str) -> Self {
        match name {
            "begin" => Self::Begin,
            "begin_constructor" => Self::BeginConstructor,
            "begin_destructor" => Self::BeginDestructor,
            "begin_signal_receiver" => Self::BeginSignalReceiver,
            "return" => Self::Return,
            "sequence" => Self::Sequence,
            "branch" => Self::Branch,
            "switch" => Self::Switch,
            "for_loop" => Self::ForLoop,
            "call_function" => Self::Function,
            "call_condition" => Self::Condition,
            "send_signal" => Self::SendSignal,
            "broadcast_signal" => Self::BroadcastSignal,
            "get" => Self::Get,
            "set" => Self::Set,
            "start_timer" => Self::StartTimer,
            "stop_timer" => Self::StopTimer,
            "reset_timer" => Self::ResetTimer,
            "comment" => Self::Comment,
            other => Self::Custom(other.to_string()),
        }
    }

    /// Whether this kind is a graph entry point
    pub fn is_entry_point(&self) -> bool {
        matches!(
            self,
            Self::Begin | Self::BeginConstructor | Self::BeginDestructor | Self::BeginSignalReceiver
        )
    }
}

impl From<String> for NodeKind {
    fn from(name: String) -> Self {
        Self::from_name(&name)
    }
}

impl From<NodeKind> for String {
    fn from(kind: NodeKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Node type category (palette grouping)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeCategory {
    /// Entry/exit points
    Event,
    /// Logic/flow control
    Flow,
    /// Function, condition and signal calls
    Call,
    /// Variable and container access
    Data,
    /// Timers
    Timer,
    /// Utility nodes
    Utility,
    /// Custom/user-defined
    Custom,
}

/// Persisted node header, readable without interpreting the detail payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeHeader {
    /// Node GUID
    pub guid: Guid,
    /// Node kind
    #[serde(rename = "type")]
    pub kind: NodeKind,
    /// Context GUID (which function/signal this node instantiates)
    #[serde(default)]
    pub context_guid: Option<Guid>,
    /// Reference to an external definition
    #[serde(default)]
    pub ref_guid: Option<Guid>,
    /// Layout position
    #[serde(default)]
    pub pos: [f32; 2],
}

/// A node instance in a script graph
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    /// Unique instance GUID
    pub guid: Guid,
    /// Node kind
    pub kind: NodeKind,
    /// Context GUID
    pub context_guid: Option<Guid>,
    /// Reference GUID
    pub ref_guid: Option<Guid>,
    /// Position in the graph editor
    pub position: [f32; 2],
    /// Input ports
    pub inputs: Vec<Port>,
    /// Output ports
    pub outputs: Vec<Port>,
    /// Kind-specific payload, opaque to the graph
    pub detail: Value,
}

impl Node {
    /// Create a node from a template
    pub fn new(template: &NodeTemplate, guid: Guid) -> Self {
        Self {
            guid,
            kind: template.kind.clone(),
            context_guid: None,
            ref_guid: None,
            position: [0.0, 0.0],
            inputs: template.inputs.clone(),
            outputs: template.outputs.clone(),
            detail: Value::Null,
        }
    }

    /// Node rebuilt from its persisted header alone, with no ports
    pub fn from_header(header: NodeHeader, detail: Value) -> Self {
        Self {
            guid: header.guid,
            kind: header.kind,
            context_guid: header.context_guid,
            ref_guid: header.ref_guid,
            position: header.pos,
            inputs: Vec::new(),
            outputs: Vec::new(),
            detail,
        }
    }

    /// Set the position
    pub fn with_position(mut self, pos: [f32; 2]) -> Self {
        self.position = pos;
        self
    }

    /// Index of the input port called `name`
    pub fn input_index(&self, name: &str) -> Option<usize> {
        self.inputs.iter().position(|p| p.name == name)
    }

    /// Index of the output port called `name`
    pub fn output_index(&self, name: &str) -> Option<usize> {
        self.outputs.iter().position(|p| p.name == name)
    }

    /// Input port by name
    pub fn input(&self, name: &str) -> Option<&Port> {
        self.inputs.iter().find(|p| p.name == name)
    }

    /// Output port by name
    pub fn output(&self, name: &str) -> Option<&Port> {
        self.outputs.iter().find(|p| p.name == name)
    }

    /// Port by direction and name
    pub fn port(&self, direction: PortDirection, name: &str) -> Option<&Port> {
        match direction {
            PortDirection::Input => self.input(name),
            PortDirection::Output => self.output(name),
        }
    }

    /// Persisted header for this node
    pub fn header(&self) -> NodeHeader {
        NodeHeader {
            guid: self.guid,
            kind: self.kind.clone(),
            context_guid: self.context_guid,
            ref_guid: self.ref_guid,
            pos: self.position,
        }
    }

    /// Every GUID this node refers to outside its own graph
    pub fn references(&self) -> impl Iterator<Item = Guid> + '_ {
        self.context_guid.into_iter().chain(self.ref_guid)
    }

    /// Rewrite GUIDs through `remapper`
    pub fn remap_guids(&mut self, remapper: &GuidRemapper) {
        self.guid = remapper.remap(self.guid);
        self.context_guid = remapper.remap_opt(self.context_guid);
        self.ref_guid = remapper.remap_opt(self.ref_guid);
    }
}

/// Inputs and outputs declared by the graph that owns a node.
///
/// Entry and exit nodes mirror these as ports on refresh.
#[derive(Debug, Clone, Copy, Default)]
pub struct GraphSignature<'a> {
    /// Declared graph inputs
    pub inputs: &'a [Port],
    /// Declared graph outputs
    pub outputs: &'a [Port],
}

/// Node construction service used by graphs.
///
/// Given a kind tag and constructor arguments, produce a node with its ports.
pub trait NodeFactory: Send + Sync {
    /// Construct a node of `kind`; `None` when the kind is unknown
    fn create(
        &self,
        kind: &NodeKind,
        guid: Guid,
        context_guid: Option<Guid>,
        ref_guid: Option<Guid>,
        pos: [f32; 2],
    ) -> Option<Node>;

    /// Re-derive a node's ports against the owning graph's signature
    fn refresh(&self, _node: &mut Node, _signature: &GraphSignature<'_>) {}

    /// Kinds this factory can construct
    fn available_kinds(&self) -> Vec<NodeKind>;
}

/// Node type definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeTemplate {
    /// Kind tag
    pub kind: NodeKind,
    /// Display name
    pub name: String,
    /// Category
    pub category: NodeCategory,
    /// Description
    pub description: String,
    /// Default input ports
    pub inputs: Vec<Port>,
    /// Default output ports
    pub outputs: Vec<Port>,
}

/// Registry of available node types
#[derive(Debug, Clone, Default)]
pub struct NodeRegistry {
    /// Registered node templates by kind
    templates: IndexMap<NodeKind, NodeTemplate>,
}

impl NodeRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node template, replacing any previous one of the same kind
    pub fn register(&mut self, template: NodeTemplate) {
        self.templates.insert(template.kind.clone(), template);
    }

    /// Get a template by kind
    pub fn get(&self, kind: &NodeKind) -> Option<&NodeTemplate> {
        self.templates.get(kind)
    }

    /// Get all registered templates
    pub fn templates(&self) -> impl Iterator<Item = &NodeTemplate> {
        self.templates.values()
    }

    /// Get templates by category
    pub fn templates_in_category(&self, category: NodeCategory) -> impl Iterator<Item = &NodeTemplate> {
        self.templates.values().filter(move |t| t.category == category)
    }
}

impl NodeFactory for NodeRegistry {
    fn create(
        &self,
        kind: &NodeKind,
        guid: Guid,
        context_guid: Option<Guid>,
        ref_guid: Option<Guid>,
        pos: [f32; 2],
    ) -> Option<Node> {
        let template = self.get(kind)?;
        let mut node = Node::new(template, guid).with_position(pos);
        node.context_guid = context_guid;
        node.ref_guid = ref_guid;
        Some(node)
    }

    fn refresh(&self, node: &mut Node, signature: &GraphSignature<'_>) {
        let Some(template) = self.get(&node.kind) else {
            return;
        };
        node.inputs = template.inputs.clone();
        node.outputs = template.outputs.clone();
        match node.kind {
            NodeKind::Begin => {
                node.outputs.extend(signature.inputs.iter().map(|p| {
                    let mut port = p.clone();
                    port.multi_link = true;
                    port
                }));
            }
            NodeKind::Return => {
                node.inputs.extend(signature.outputs.iter().cloned());
            }
            _ => {}
        }
    }

    fn available_kinds(&self) -> Vec<NodeKind> {
        self.templates.keys().cloned().collect()
    }
}
