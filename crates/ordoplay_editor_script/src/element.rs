// SPDX-License-Identifier: MIT OR Apache-2.0
//! Script elements.
//!
//! An element is one entry in a document's ownership tree: a class, a
//! variable, a signal, a graph and so on. The kind tag selects the body
//! variant; fields the body does not model are kept in `extra` so nothing is
//! lost across a load/save cycle.

use crate::error::PassError;
use crate::factory::ElementFactory;
use crate::fields::{self, guid_value};
use crate::graph_element::GraphElement;
use ordoplay_editor_graph::{Guid, GuidRemapper, NodeFactory};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Element kind tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementKind {
    /// Reference to another script file
    Include,
    /// Organizational folder
    Group,
    /// Enumeration type
    Enumeration,
    /// Structure type
    Structure,
    /// Signal declaration
    Signal,
    /// Abstract interface
    AbstractInterface,
    /// Function declared by an abstract interface
    AbstractInterfaceFunction,
    /// Task declared by an abstract interface
    AbstractInterfaceTask,
    /// Class (persisted as "schema")
    Class,
    /// Base class reference (persisted as "schema_base")
    ClassBase,
    /// State machine
    StateMachine,
    /// State
    State,
    /// Variable
    Variable,
    /// Property
    Property,
    /// Container
    Container,
    /// Timer
    Timer,
    /// Implementation of an abstract interface
    AbstractInterfaceImplementation,
    /// Component instance
    ComponentInstance,
    /// Action instance
    ActionInstance,
    /// Node/link graph
    Graph,
    /// Tree root sentinel, never persisted
    Root,
}

impl ElementKind {
    /// Persisted kinds, in envelope collection order
    pub const PERSISTED: [ElementKind; 20] = [
        Self::Include,
        Self::Group,
        Self::Enumeration,
        Self::Structure,
        Self::Signal,
        Self::AbstractInterface,
        Self::AbstractInterfaceFunction,
        Self::AbstractInterfaceTask,
        Self::Class,
        Self::ClassBase,
        Self::StateMachine,
        Self::State,
        Self::Variable,
        Self::Property,
        Self::Container,
        Self::Timer,
        Self::AbstractInterfaceImplementation,
        Self::ComponentInstance,
        Self::ActionInstance,
        Self::Graph,
    ];

    /// Element-type name
    pub fn type_name(self) -> &'static str {
        match self {
            Self::Include => "include",
            Self::Group => "group",
            Self::Enumeration => "enumeration",
            Self::Structure => "structure",
            Self::Signal => "signal",
            Self::AbstractInterface => "abstract_interface",
            Self::AbstractInterfaceFunction => "abstract_interface_function",
            Self::AbstractInterfaceTask => "abstract_interface_task",
            Self::Class => "schema",
            Self::ClassBase => "schema_base",
            Self::StateMachine => "state_machine",
            Self::State => "state",
            Self::Variable => "variable",
            Self::Property => "property",
            Self::Container => "container",
            Self::Timer => "timer",
            Self::AbstractInterfaceImplementation => "abstract_interface_implementation",
            Self::ComponentInstance => "component_instance",
            Self::ActionInstance => "action_instance",
            Self::Graph => "graph",
            Self::Root => "root",
        }
    }

    /// Envelope collection holding elements of this kind
    pub fn collection(self) -> Option<&'static str> {
        Some(match self {
            Self::Include => "includes",
            Self::Group => "groups",
            Self::Enumeration => "enumerations",
            Self::Structure => "structures",
            Self::Signal => "signals",
            Self::AbstractInterface => "abstract_interfaces",
            Self::AbstractInterfaceFunction => "abstract_interface_functions",
            Self::AbstractInterfaceTask => "abstract_interface_tasks",
            Self::Class => "schemas",
            Self::ClassBase => "schema_bases",
            Self::StateMachine => "state_machines",
            Self::State => "states",
            Self::Variable => "variables",
            Self::Property => "properties",
            Self::Container => "containers",
            Self::Timer => "timers",
            Self::AbstractInterfaceImplementation => "abstract_interface_implementations",
            Self::ComponentInstance => "component_instances",
            Self::ActionInstance => "action_instances",
            Self::Graph => "graphs",
            Self::Root => return None,
        })
    }

    /// Kind for an element-type name
    pub fn from_type_name(name: &str) -> Option<Self> {
        Self::PERSISTED.into_iter().find(|k| k.type_name() == name)
    }

    /// Kind stored in an envelope collection
    pub fn from_collection(name: &str) -> Option<Self> {
        Self::PERSISTED
            .into_iter()
            .find(|k| k.collection() == Some(name))
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Element flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementFlags {
    /// Name cannot be changed by editing
    #[serde(default, skip_serializing_if = "is_false")]
    pub fixed_name: bool,
    /// Element is dropped when the document is saved
    #[serde(default, skip_serializing_if = "is_false")]
    pub discard: bool,
}

impl ElementFlags {
    /// Whether no flag is set
    pub fn is_empty(&self) -> bool {
        !self.fixed_name && !self.discard
    }
}

/// Identity and placement of an element
#[derive(Debug, Clone, PartialEq)]
pub struct ElementHeader {
    /// Element GUID
    pub guid: Guid,
    /// Parent element; `None` places the element at the document top level
    pub scope: Option<Guid>,
    /// Display name
    pub name: String,
    /// Kind tag
    pub kind: ElementKind,
    /// Flags
    pub flags: ElementFlags,
}

/// Type reference carried by variables, properties and containers
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TypeInfo {
    /// Type GUID (environment or script type)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guid: Option<Guid>,
    /// Type name, for environment types
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    /// Other persisted type fields
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Kind-specific element data
#[derive(Debug, Clone)]
pub enum ElementBody {
    /// Include: another script file
    Include {
        /// Included file name
        file_name: String,
        /// GUID of the included document
        ref_guid: Option<Guid>,
    },
    /// Variable, property or container
    Typed(TypeInfo),
    /// Element pointing at another element (base class, implemented interface, instances)
    Reference {
        /// Referenced element or environment GUID
        ref_guid: Option<Guid>,
    },
    /// Node/link graph
    Graph(Box<GraphElement>),
    /// No modeled fields
    Plain,
}

impl ElementBody {
    /// Empty body for `kind`
    pub fn for_kind(kind: ElementKind) -> Self {
        match kind {
            ElementKind::Include => Self::Include {
                file_name: String::new(),
                ref_guid: None,
            },
            ElementKind::Variable | ElementKind::Property | ElementKind::Container => {
                Self::Typed(TypeInfo::default())
            }
            ElementKind::ClassBase
            | ElementKind::AbstractInterfaceImplementation
            | ElementKind::ComponentInstance
            | ElementKind::ActionInstance => Self::Reference { ref_guid: None },
            ElementKind::Graph => Self::Graph(Box::default()),
            _ => Self::Plain,
        }
    }
}

/// Keys every generic element stores
const HEADER_KEYS: [&str; 4] = ["guid", "scope_guid", "name", "flags"];

/// A script element
#[derive(Debug, Clone)]
pub struct Element {
    /// Identity and placement
    pub header: ElementHeader,
    /// Kind-specific data
    pub body: ElementBody,
    /// Persisted fields not modeled by the body
    pub extra: Map<String, Value>,
}

impl Element {
    /// Create an element with an empty body for its kind
    pub fn new(kind: ElementKind, guid: Guid, scope: Option<Guid>, name: impl Into<String>) -> Self {
        Self {
            header: ElementHeader {
                guid,
                scope,
                name: name.into(),
                kind,
                flags: ElementFlags::default(),
            },
            body: ElementBody::for_kind(kind),
            extra: Map::new(),
        }
    }

    /// Element GUID
    pub fn guid(&self) -> Guid {
        self.header.guid
    }

    /// Parent scope
    pub fn scope(&self) -> Option<Guid> {
        self.header.scope
    }

    /// Display name
    pub fn name(&self) -> &str {
        &self.header.name
    }

    /// Kind tag
    pub fn kind(&self) -> ElementKind {
        self.header.kind
    }

    /// Graph body, if this is a graph element
    pub fn as_graph(&self) -> Option<&GraphElement> {
        match &self.body {
            ElementBody::Graph(graph) => Some(graph),
            _ => None,
        }
    }

    /// Mutable graph body, if this is a graph element
    pub fn as_graph_mut(&mut self) -> Option<&mut GraphElement> {
        match &mut self.body {
            ElementBody::Graph(graph) => Some(graph),
            _ => None,
        }
    }

    /// GUIDs of other elements this element refers to.
    ///
    /// Include references point at other documents and are not listed.
    pub fn dependencies(&self) -> Vec<Guid> {
        match &self.body {
            ElementBody::Typed(info) => info.guid.into_iter().collect(),
            ElementBody::Reference { ref_guid } => ref_guid.iter().copied().collect(),
            ElementBody::Graph(graph) => graph.references(),
            ElementBody::Include { .. } | ElementBody::Plain => Vec::new(),
        }
    }

    /// Rewrite every GUID this element holds through `remapper`
    pub fn remap_guids(&mut self, remapper: &GuidRemapper) {
        self.header.guid = remapper.remap(self.header.guid);
        self.header.scope = remapper.remap_opt(self.header.scope);
        match &mut self.body {
            ElementBody::Include { ref_guid, .. } | ElementBody::Reference { ref_guid } => {
                *ref_guid = remapper.remap_opt(*ref_guid);
            }
            ElementBody::Typed(info) => info.guid = remapper.remap_opt(info.guid),
            ElementBody::Graph(graph) => graph.remap_guids(remapper),
            ElementBody::Plain => {}
        }
    }

    /// PreLoad: read the header and reference fields, construct through `factory`
    pub(crate) fn pre_load(
        kind: ElementKind,
        payload: &Value,
        factory: &dyn ElementFactory,
    ) -> Result<Self, PassError> {
        if kind == ElementKind::Graph {
            return GraphElement::pre_load(payload, factory);
        }
        let path = kind.type_name();
        let obj = fields::as_object(payload, path)?;
        let guid = fields::read_guid(obj, "guid")?;
        let scope = fields::read_opt_guid(obj, "scope_guid")?;
        let name = fields::read_string(obj, "name")?;

        let mut element = factory
            .create(kind, guid, scope, &name)
            .ok_or(PassError::FactoryRefused(kind))?;
        element.header.flags = read_flags(obj)?;
        match &mut element.body {
            ElementBody::Include { ref_guid, .. } | ElementBody::Reference { ref_guid } => {
                *ref_guid = fields::read_opt_guid(obj, "ref_guid")?;
            }
            ElementBody::Typed(info) => {
                if let Some(value) = obj.get("typeInfo") {
                    *info = serde_json::from_value(value.clone())?;
                    info.guid = info.guid.and_then(Guid::non_nil);
                }
            }
            ElementBody::Graph(_) | ElementBody::Plain => {}
        }
        Ok(element)
    }

    /// Load: read the remaining payload
    pub(crate) fn load(&mut self, payload: &Value) -> Result<(), PassError> {
        if let ElementBody::Graph(graph) = &mut self.body {
            self.extra = graph.load(payload, &mut self.header)?;
            return Ok(());
        }
        let obj = fields::as_object(payload, self.header.kind.type_name())?;
        let mut known: Vec<&str> = HEADER_KEYS.to_vec();
        match &mut self.body {
            ElementBody::Include { file_name, .. } => {
                *file_name = fields::read_string(obj, "file_name")?;
                known.extend(["file_name", "ref_guid"]);
            }
            ElementBody::Reference { .. } => known.push("ref_guid"),
            ElementBody::Typed(_) => known.push("typeInfo"),
            ElementBody::Graph(_) | ElementBody::Plain => {}
        }
        self.extra = fields::without_keys(obj, &known);
        Ok(())
    }

    /// PostLoad: resolve data that needs the rest of the batch constructed
    pub(crate) fn post_load(&mut self, payload: &Value, nodes: &dyn NodeFactory) -> Result<(), PassError> {
        if let ElementBody::Graph(graph) = &mut self.body {
            graph.post_load(payload, nodes)?;
        }
        Ok(())
    }

    /// Save: write the complete element in one shot
    pub fn save(&self) -> Result<Value, PassError> {
        if let ElementBody::Graph(graph) = &self.body {
            return graph.save(&self.header, &self.extra);
        }
        let mut obj = self.extra.clone();
        obj.insert("guid".into(), guid_value(Some(self.header.guid)));
        obj.insert("scope_guid".into(), guid_value(self.header.scope));
        obj.insert("name".into(), Value::String(self.header.name.clone()));
        if !self.header.flags.is_empty() {
            obj.insert("flags".into(), serde_json::to_value(self.header.flags)?);
        }
        match &self.body {
            ElementBody::Include {
                file_name,
                ref_guid,
            } => {
                obj.insert("file_name".into(), Value::String(file_name.clone()));
                obj.insert("ref_guid".into(), guid_value(*ref_guid));
            }
            ElementBody::Reference { ref_guid } => {
                obj.insert("ref_guid".into(), guid_value(*ref_guid));
            }
            ElementBody::Typed(info) => {
                obj.insert("typeInfo".into(), serde_json::to_value(info)?);
            }
            ElementBody::Graph(_) | ElementBody::Plain => {}
        }
        Ok(Value::Object(obj))
    }

    /// Edit: reduced view of the editable fields
    pub fn edit_view(&self) -> Value {
        let mut view = Map::new();
        view.insert("name".into(), Value::String(self.header.name.clone()));
        view.insert("fixed_name".into(), Value::Bool(self.header.flags.fixed_name));
        match &self.body {
            ElementBody::Include {
                file_name,
                ref_guid,
            } => {
                view.insert("file_name".into(), Value::String(file_name.clone()));
                view.insert("ref_guid".into(), guid_value(*ref_guid));
            }
            ElementBody::Reference { ref_guid } => {
                view.insert("ref_guid".into(), guid_value(*ref_guid));
            }
            ElementBody::Typed(info) => {
                view.insert("type_guid".into(), guid_value(info.guid));
                view.insert("type_name".into(), Value::String(info.name.clone()));
            }
            ElementBody::Graph(graph) => graph.edit_view(&mut view),
            ElementBody::Plain => {}
        }
        Value::Object(view)
    }

    /// Apply an edited view to the body.
    ///
    /// The name is not touched here; renaming goes through the document so
    /// sibling uniqueness can be enforced.
    pub fn apply_edit(&mut self, view: &Value) -> Result<(), PassError> {
        let obj = fields::as_object(view, "edit")?;
        match &mut self.body {
            ElementBody::Include {
                file_name,
                ref_guid,
            } => {
                if obj.contains_key("file_name") {
                    *file_name = fields::read_string(obj, "file_name")?;
                }
                if obj.contains_key("ref_guid") {
                    *ref_guid = fields::read_opt_guid(obj, "ref_guid")?;
                }
            }
            ElementBody::Reference { ref_guid } => {
                if obj.contains_key("ref_guid") {
                    *ref_guid = fields::read_opt_guid(obj, "ref_guid")?;
                }
            }
            ElementBody::Typed(info) => {
                if obj.contains_key("type_guid") {
                    info.guid = fields::read_opt_guid(obj, "type_guid")?;
                }
                if obj.contains_key("type_name") {
                    info.name = fields::read_string(obj, "type_name")?;
                }
            }
            ElementBody::Graph(graph) => graph.apply_edit(obj)?,
            ElementBody::Plain => {}
        }
        Ok(())
    }
}

/// Read the optional `flags` object
pub(crate) fn read_flags(obj: &Map<String, Value>) -> Result<ElementFlags, PassError> {
    match obj.get("flags") {
        None | Some(Value::Null) => Ok(ElementFlags::default()),
        Some(value) => Ok(serde_json::from_value(value.clone())?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory::StandardElementFactory;
    use serde_json::json;

    #[test]
    fn test_kind_names_both_ways() {
        for kind in ElementKind::PERSISTED {
            assert_eq!(ElementKind::from_type_name(kind.type_name()), Some(kind));
            let collection = kind.collection().unwrap();
            assert_eq!(ElementKind::from_collection(collection), Some(kind));
        }
        assert_eq!(ElementKind::Class.type_name(), "schema");
        assert_eq!(ElementKind::ClassBase.collection(), Some("schema_bases"));
        assert_eq!(ElementKind::Root.collection(), None);
        assert_eq!(ElementKind::from_type_name("root"), None);
    }

    #[test]
    fn test_generic_element_keeps_unknown_fields() {
        let factory = StandardElementFactory;
        let type_guid = Guid::from_u128(9);
        let payload = json!({
            "guid": Guid::from_u128(1).to_string(),
            "scope_guid": null,
            "name": "Health",
            "typeInfo": {"guid": type_guid.to_string(), "size": 4},
            "default_value": 100,
            "flags": {"fixed_name": true},
        });

        let mut element = Element::pre_load(ElementKind::Variable, &payload, &factory).unwrap();
        assert_eq!(element.dependencies(), vec![type_guid]);
        assert!(element.header.flags.fixed_name);
        element.load(&payload).unwrap();
        assert_eq!(element.extra.len(), 1);

        assert_eq!(element.save().unwrap(), payload);
    }

    #[test]
    fn test_remap_rewrites_references() {
        let mut element = Element::new(
            ElementKind::ClassBase,
            Guid::from_u128(1),
            Some(Guid::from_u128(2)),
            "Base",
        );
        element.body = ElementBody::Reference {
            ref_guid: Some(Guid::from_u128(3)),
        };
        let mut remapper = GuidRemapper::new();
        remapper.bind(Guid::from_u128(1), Guid::from_u128(11));
        remapper.bind(Guid::from_u128(3), Guid::from_u128(13));
        element.remap_guids(&remapper);

        assert_eq!(element.guid(), Guid::from_u128(11));
        assert_eq!(element.scope(), Some(Guid::from_u128(2)));
        assert_eq!(element.dependencies(), vec![Guid::from_u128(13)]);
    }

    #[test]
    fn test_edit_view_round_trip() {
        let mut element = Element::new(ElementKind::Include, Guid::from_u128(1), None, "inc");
        element
            .apply_edit(&json!({"file_name": "shared.schematyc"}))
            .unwrap();
        let view = element.edit_view();
        assert_eq!(view["file_name"], "shared.schematyc");
        assert_eq!(view["ref_guid"], Value::Null);
    }
}
