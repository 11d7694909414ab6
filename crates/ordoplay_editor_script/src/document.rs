// SPDX-License-Identifier: MIT OR Apache-2.0
//! Script documents.
//!
//! A document is one script file: an envelope with a format version and
//! document GUID, one collection per element kind and a `graphs` collection.
//! Loading patches the tree to the current version, captures each element,
//! orders the batch by dependency and runs the load passes. Saving orders the
//! elements again and writes each in a single pass.

use crate::dependency::sort_by_dependency;
use crate::diagnostics::Diagnostics;
use crate::element::{Element, ElementKind};
use crate::env::ScriptEnv;
use crate::error::{DocumentError, Result};
use crate::fields::{self, FieldError};
use crate::graph_element::{GraphElement, GraphKind};
use crate::pass::{self, PendingElement};
use crate::store::{DocumentStore, RawTree};
use crate::tree::ElementTree;
use ordoplay_editor_graph::{Guid, GuidRemapper, LinkIndex, NodeKind, VisitStatus};
use serde_json::{Map, Value};
use std::borrow::Cow;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Document state flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DocumentFlags {
    /// Changed since the last load or save
    pub modified: bool,
    /// Backed by a writable file rather than an archive
    pub on_disk: bool,
}

/// A loaded script file
#[derive(Debug)]
pub struct ScriptDocument {
    guid: Guid,
    path: PathBuf,
    flags: DocumentFlags,
    build_version: String,
    tree: ElementTree,
    extra: Map<String, Value>,
    env: Arc<ScriptEnv>,
}

impl ScriptDocument {
    /// Create an empty, unsaved document
    pub fn new(env: Arc<ScriptEnv>, path: impl Into<PathBuf>) -> Self {
        let guid = env.guids().new_guid();
        let root = env.guids().new_guid();
        Self {
            guid,
            path: path.into(),
            flags: DocumentFlags {
                modified: true,
                on_disk: true,
            },
            build_version: env.config().build_version.clone(),
            tree: ElementTree::new(root),
            extra: Map::new(),
            env,
        }
    }

    /// Read and load the document stored at `path`
    pub fn load(env: Arc<ScriptEnv>, store: &dyn DocumentStore, path: &Path) -> Result<Self> {
        let raw = store.read(path)?;
        Self::from_raw(env, path, raw)
    }

    /// Load from a raw tree, patching it to the current version first
    pub fn from_raw(env: Arc<ScriptEnv>, path: &Path, raw: RawTree) -> Result<Self> {
        let name = path.display().to_string();
        let on_disk = !raw.is_shared();
        let stored_version = raw.as_value().get("version").and_then(Value::as_u64);
        let shared;
        let tree = match raw {
            RawTree::Owned(value) => env.patcher().patch(Cow::Owned(value), &name)?,
            RawTree::Shared(value) => {
                shared = value;
                env.patcher().patch(Cow::Borrowed(shared.as_ref()), &name)?
            }
        };
        let mut document = Self::from_tree(env, path, &tree)?;
        document.flags.on_disk = on_disk;
        // Upgraded documents need a save to persist the new format.
        let current = u64::from(document.env.patcher().current_version());
        document.flags.modified = stored_version != Some(current);
        Ok(document)
    }

    /// Load from a tree already at the current version
    pub fn from_tree(env: Arc<ScriptEnv>, path: &Path, tree: &Value) -> Result<Self> {
        tracing::debug!("Loading script document {}", path.display());
        let obj = fields::as_object(tree, "document")?;
        let guid = fields::read_guid(obj, "guid")?;
        let build_version = fields::read_string(obj, "buildVersion")?;
        if is_newer_build(&build_version, &env.config().build_version) {
            tracing::warn!(
                "{} was saved by a newer build ({build_version} > {})",
                path.display(),
                env.config().build_version
            );
        }

        let mut entries = Vec::new();
        let mut envelope_keys = vec!["version", "guid", "buildVersion"];
        for kind in ElementKind::PERSISTED {
            let Some(collection) = kind.collection() else {
                continue;
            };
            envelope_keys.push(collection);
            let Some(items) = obj.get(collection) else {
                continue;
            };
            let items = items
                .as_array()
                .ok_or_else(|| FieldError::wrong_type(collection, "array"))?;
            entries.extend(items.iter().map(|item| (kind, item)));
        }

        let root = env.guids().new_guid();
        let mut document = Self {
            guid,
            path: path.to_path_buf(),
            flags: DocumentFlags {
                modified: false,
                on_disk: true,
            },
            build_version,
            tree: ElementTree::new(root),
            extra: fields::without_keys(obj, &envelope_keys),
            env,
        };
        let loaded = document.create_elements(entries, None)?;
        document.validate();
        tracing::info!("Loaded {} ({} elements)", path.display(), loaded.len());
        Ok(document)
    }

    /// Document GUID
    pub fn guid(&self) -> Guid {
        self.guid
    }

    /// File path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// State flags
    pub fn flags(&self) -> DocumentFlags {
        self.flags
    }

    /// Whether the document changed since the last load or save
    pub fn is_modified(&self) -> bool {
        self.flags.modified
    }

    /// Build that last wrote this document
    pub fn build_version(&self) -> &str {
        &self.build_version
    }

    /// Shared environment
    pub fn env(&self) -> &Arc<ScriptEnv> {
        &self.env
    }

    /// Element tree, read-only
    pub fn tree(&self) -> &ElementTree {
        &self.tree
    }

    /// Get an element
    pub fn element(&self, guid: Guid) -> Option<&Element> {
        self.tree.get(guid)
    }

    /// Get an element for modification; marks the document modified
    pub fn element_mut(&mut self, guid: Guid) -> Option<&mut Element> {
        let element = self.tree.get_mut(guid)?;
        self.flags.modified = true;
        Some(element)
    }

    /// Get a graph element's body
    pub fn graph(&self, guid: Guid) -> Option<&GraphElement> {
        self.tree.graph(guid)
    }

    /// Get a graph element's body for modification; marks the document modified
    pub fn graph_mut(&mut self, guid: Guid) -> Option<&mut GraphElement> {
        let graph = self.tree.graph_mut(guid)?;
        self.flags.modified = true;
        Some(graph)
    }

    /// Add an element.
    ///
    /// Returns `None` outside an editing session, on a GUID collision or when
    /// the factory refuses the kind. A missing scope leaves the element
    /// orphaned but still added.
    pub fn add_element(&mut self, kind: ElementKind, scope: Option<Guid>, name: &str) -> Option<Guid> {
        if !self.env.is_editable() || kind == ElementKind::Root {
            return None;
        }
        let guid = self.env.guids().new_guid();
        if self.tree.contains(guid) {
            tracing::warn!("Element GUID collision: {guid}");
            return None;
        }
        let mut element = self.env.element_factory().create(kind, guid, scope, name)?;
        if let Some(graph) = element.as_graph_mut() {
            graph.refresh(self.env.node_factory());
        }
        self.tree.insert(element).ok()?;
        self.tree.attach(guid);
        self.flags.modified = true;
        Some(guid)
    }

    /// Add a graph element of `kind`
    pub fn add_graph(
        &mut self,
        scope: Option<Guid>,
        name: &str,
        kind: GraphKind,
        context_guid: Option<Guid>,
    ) -> Option<Guid> {
        let guid = self.add_element(ElementKind::Graph, scope, name)?;
        let env = Arc::clone(&self.env);
        if let Some(graph) = self.tree.graph_mut(guid) {
            graph.kind = kind;
            graph.context_guid = context_guid;
            graph.refresh(env.node_factory());
        }
        Some(guid)
    }

    /// Remove an element; see [`ElementTree::remove`]
    pub fn remove_element(&mut self, guid: Guid, cascade: bool) -> bool {
        let removed = self.tree.remove(guid, cascade);
        if removed.is_empty() {
            return false;
        }
        self.flags.modified = true;
        true
    }

    /// Whether `name` is free in `scope`
    pub fn is_name_unique(&self, scope: Option<Guid>, name: &str) -> bool {
        self.tree.is_name_unique(scope, name)
    }

    /// Unique variant of `name` in `scope`
    pub fn make_name_unique(&self, scope: Option<Guid>, name: &str) -> String {
        self.tree.make_name_unique(scope, name)
    }

    /// Rename an element. Refused for fixed names and names taken by a sibling.
    pub fn rename_element(&mut self, guid: Guid, name: &str) -> bool {
        let Some(element) = self.tree.get(guid) else {
            return false;
        };
        if element.header.flags.fixed_name {
            return false;
        }
        if element.name() == name {
            return true;
        }
        let scope = element.scope();
        let taken = self
            .tree
            .elements()
            .any(|e| e.guid() != guid && e.scope() == scope && e.name().eq_ignore_ascii_case(name));
        if taken {
            return false;
        }
        if let Some(element) = self.tree.get_mut(guid) {
            element.header.name = name.to_string();
        }
        self.flags.modified = true;
        true
    }

    /// Edit view of an element
    pub fn edit_view(&self, guid: Guid) -> Option<Value> {
        self.tree.get(guid).map(Element::edit_view)
    }

    /// Apply an edited view; a changed `name` goes through [`Self::rename_element`]
    pub fn apply_edit(&mut self, guid: Guid, view: &Value) -> Result<()> {
        if !self.env.is_editable() {
            return Err(DocumentError::NotEditable);
        }
        if let Some(name) = view.get("name").and_then(Value::as_str) {
            if !self.rename_element(guid, name) {
                tracing::warn!("Cannot rename {guid} to '{name}'");
            }
        }
        let env = Arc::clone(&self.env);
        let element = self
            .tree
            .get_mut(guid)
            .ok_or(DocumentError::ElementNotFound(guid))?;
        element
            .apply_edit(view)
            .map_err(|e| DocumentError::element(guid, e))?;
        if let Some(graph) = element.as_graph_mut() {
            graph.refresh(env.node_factory());
        }
        self.flags.modified = true;
        Ok(())
    }

    /// Add a node to a graph element
    pub fn add_node(
        &mut self,
        graph: Guid,
        kind: &NodeKind,
        context_guid: Option<Guid>,
        ref_guid: Option<Guid>,
        pos: [f32; 2],
    ) -> Option<Guid> {
        if !self.env.is_editable() {
            return None;
        }
        let env = Arc::clone(&self.env);
        let node = env.guids().new_guid();
        let added = self
            .tree
            .graph_mut(graph)?
            .add_node(env.node_factory(), node, kind, context_guid, ref_guid, pos)?;
        self.flags.modified = true;
        Some(added)
    }

    /// Add a link to a graph element
    pub fn add_link(
        &mut self,
        graph: Guid,
        src_node: Guid,
        src_output_name: &str,
        dst_node: Guid,
        dst_input_name: &str,
    ) -> Option<LinkIndex> {
        let index = self
            .tree
            .graph_mut(graph)?
            .graph_mut()
            .add_link(src_node, src_output_name, dst_node, dst_input_name)?;
        self.flags.modified = true;
        Some(index)
    }

    /// Re-derive node ports and palettes of every graph
    pub fn refresh(&mut self) {
        let env = Arc::clone(&self.env);
        for element in self.tree.elements_mut() {
            if let Some(graph) = element.as_graph_mut() {
                graph.refresh(env.node_factory());
            }
        }
    }

    /// Run the Validate pass over every element
    pub fn validate(&self) -> Diagnostics {
        let mut diagnostics = Diagnostics::new();
        self.tree.validate(&mut diagnostics);
        diagnostics
    }

    /// Run the Save pass and build the persisted tree
    pub fn to_tree(&self) -> Result<Value> {
        let config = self.env.config();
        let discarded = if config.discard_on_save {
            self.discarded()
        } else {
            HashSet::new()
        };
        let mut elements: Vec<&Element> = self
            .tree
            .elements()
            .filter(|e| !discarded.contains(&e.guid()))
            .collect();
        sort_by_dependency(&mut elements, config.cycle_policy)?;

        let mut obj = self.extra.clone();
        obj.insert("version".into(), Value::from(self.env.patcher().current_version()));
        obj.insert("guid".into(), Value::String(self.guid.to_string()));
        obj.insert("buildVersion".into(), Value::String(config.build_version.clone()));
        for kind in ElementKind::PERSISTED {
            let Some(collection) = kind.collection() else {
                continue;
            };
            let items = elements
                .iter()
                .filter(|e| e.kind() == kind)
                .map(|e| e.save().map_err(|err| DocumentError::element(e.guid(), err)))
                .collect::<Result<Vec<Value>>>()?;
            obj.insert(collection.into(), Value::Array(items));
        }
        Ok(Value::Object(obj))
    }

    /// Save to `store` at the document's path
    pub fn save(&mut self, store: &dyn DocumentStore) -> Result<()> {
        let tree = self.to_tree()?;
        store.write(&self.path, &tree)?;
        self.flags.modified = false;
        self.flags.on_disk = true;
        self.build_version = self.env.config().build_version.clone();
        tracing::info!("Saved {}", self.path.display());
        Ok(())
    }

    /// Flagged elements and everything under them
    fn discarded(&self) -> HashSet<Guid> {
        let mut set = HashSet::new();
        for element in self.tree.elements().filter(|e| e.header.flags.discard) {
            set.insert(element.guid());
            set.extend(self.tree.descendants(element.guid()));
        }
        set
    }

    /// Copy an element (and with `recurse` its subtree) to a clipboard tree.
    ///
    /// `None` copies the whole top level.
    pub fn copy_elements(&self, guid: Option<Guid>, recurse: bool) -> Result<Value> {
        let mut guids = Vec::new();
        if let Some(guid) = guid {
            if !self.tree.contains(guid) || guid == self.tree.root() {
                return Err(DocumentError::ElementNotFound(guid));
            }
            guids.push(guid);
        }
        if guid.is_none() || recurse {
            self.tree.visit(guid, recurse, |e| {
                guids.push(e.guid());
                VisitStatus::Continue
            });
        }

        let mut items = Vec::with_capacity(guids.len());
        for guid in guids {
            let Some(element) = self.tree.get(guid) else {
                continue;
            };
            let mut saved = element
                .save()
                .map_err(|e| DocumentError::element(guid, e))?;
            if let Some(obj) = saved.as_object_mut() {
                obj.insert(
                    "element_type".into(),
                    Value::String(element.kind().type_name().to_string()),
                );
            }
            items.push(saved);
        }

        let mut clipboard = Map::new();
        clipboard.insert("version".into(), Value::from(self.env.patcher().current_version()));
        clipboard.insert("elements".into(), Value::Array(items));
        Ok(Value::Object(clipboard))
    }

    /// Paste a clipboard tree under `scope`.
    ///
    /// Every pasted element and node gets a fresh GUID. Top-level names that
    /// clash in `scope` get a `_Copy` suffix plus a number if needed.
    pub fn paste_elements(&mut self, scope: Option<Guid>, clipboard: &Value) -> Result<Vec<Guid>> {
        if !self.env.is_editable() {
            return Err(DocumentError::NotEditable);
        }
        let expected = self.env.patcher().current_version();
        let obj = fields::as_object(clipboard, "clipboard")?;
        let found = fields::read_u32(obj, "version")?;
        if found != expected {
            return Err(DocumentError::ClipboardVersion { found, expected });
        }
        if let Some(scope) = scope {
            if !self.tree.contains(scope) {
                return Err(DocumentError::ElementNotFound(scope));
            }
        }

        let items = obj
            .get("elements")
            .and_then(Value::as_array)
            .ok_or_else(|| FieldError::wrong_type("elements", "array"))?;
        let mut stripped = Vec::with_capacity(items.len());
        for item in items {
            let entry = fields::as_object(item, "elements")?;
            let type_name = fields::read_string(entry, "element_type")?;
            let kind = ElementKind::from_type_name(&type_name)
                .ok_or_else(|| FieldError::wrong_type("element_type", "element type name"))?;
            stripped.push((kind, Value::Object(fields::without_keys(entry, &["element_type"]))));
        }
        let entries = stripped.iter().map(|(kind, value)| (*kind, value)).collect();

        let pasted = self.create_elements(entries, Some(scope))?;
        self.flags.modified = true;
        tracing::debug!("Pasted {} elements", pasted.len());
        Ok(pasted)
    }

    /// Run a batch through the load passes and add it to the tree.
    ///
    /// `paste_scope` is set when the batch comes from the clipboard.
    fn create_elements(
        &mut self,
        entries: Vec<(ElementKind, &Value)>,
        paste_scope: Option<Option<Guid>>,
    ) -> Result<Vec<Guid>> {
        let env = Arc::clone(&self.env);

        let mut pending = Vec::with_capacity(entries.len());
        for (kind, value) in entries {
            let captured = pass::capture(kind, value, env.element_factory())
                .map_err(|e| DocumentError::element(peek_guid(value), e))?;
            pending.push(captured);
        }

        if let Some(scope) = paste_scope {
            self.rescope_pasted(&mut pending, scope);
        }

        sort_by_dependency(&mut pending, env.config().cycle_policy)?;

        for item in &mut pending {
            item.load()
                .map_err(|e| DocumentError::element(item.element().guid(), e))?;
        }
        for item in &mut pending {
            item.post_load(env.node_factory())
                .map_err(|e| DocumentError::element(item.element().guid(), e))?;
        }
        let mut elements = pending
            .into_iter()
            .map(|item| {
                let guid = item.element().guid();
                item.finish().map_err(|e| DocumentError::element(guid, e))
            })
            .collect::<Result<Vec<Element>>>()?;

        if paste_scope.is_some() {
            let mut remapper = GuidRemapper::new();
            for element in &elements {
                remapper.bind(element.guid(), env.guids().new_guid());
                if let Some(graph) = element.as_graph() {
                    for node in graph.graph().nodes() {
                        remapper.bind(node.guid, env.guids().new_guid());
                    }
                }
            }
            for element in &mut elements {
                element.remap_guids(&remapper);
            }
        }

        let mut added = Vec::with_capacity(elements.len());
        for element in elements {
            let guid = element.guid();
            if self.tree.insert(element).is_ok() {
                added.push(guid);
            }
        }
        for guid in &added {
            self.tree.attach(*guid);
        }
        Ok(added)
    }

    /// Move the clipboard's top-level elements into `scope`, renaming clashes
    fn rescope_pasted(&self, pending: &mut [PendingElement], scope: Option<Guid>) {
        let batch: HashSet<Guid> = pending.iter().map(|p| p.element().guid()).collect();
        let mut names: Vec<String> = Vec::new();
        for item in pending.iter_mut() {
            let header = &mut item.element_mut().header;
            if header.scope.is_some_and(|s| batch.contains(&s)) {
                continue;
            }
            header.scope = scope;
            let clashes = |name: &str| {
                !self.tree.is_name_unique(scope, name) || names.iter().any(|n| n.eq_ignore_ascii_case(name))
            };
            if clashes(&header.name) {
                let base = format!("{}_Copy", header.name);
                let mut candidate = base.clone();
                let mut postfix = 1u32;
                while clashes(&candidate) {
                    candidate = format!("{base}{postfix}");
                    postfix += 1;
                }
                header.name = candidate;
            }
            names.push(header.name.clone());
        }
    }
}

/// GUID of a persisted element, for error messages
fn peek_guid(value: &Value) -> Guid {
    let obj = value.get("header").unwrap_or(value);
    obj.as_object()
        .and_then(|o| fields::read_guid(o, "guid").ok())
        .unwrap_or_default()
}

/// Compare dotted build versions numerically
fn is_newer_build(stored: &str, running: &str) -> bool {
    fn parts(version: &str) -> Vec<u64> {
        version
            .split(['.', '-', '+'])
            .map_while(|p| p.parse().ok())
            .collect()
    }
    !stored.is_empty() && parts(stored) > parts(running)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScriptConfig;
    use crate::dependency::{CyclePolicy, DependencyError};
    use crate::element::ElementBody;
    use crate::graph_element::GraphParam;
    use crate::patch::PatchError;
    use crate::store::{ArchiveStore, FileStore};
    use ordoplay_editor_graph::{PortType, SequentialGuidGenerator};
    use serde_json::json;

    fn env_with(config: ScriptConfig) -> Arc<ScriptEnv> {
        Arc::new(ScriptEnv::new(config).with_guid_generator(SequentialGuidGenerator::default()))
    }

    fn env() -> Arc<ScriptEnv> {
        env_with(ScriptConfig::default())
    }

    struct Sample {
        doc: ScriptDocument,
        class: Guid,
        graph: Guid,
    }

    /// Class with a variable, a structure it uses, an include, and a function
    /// graph Begin -> Sequence -> call.
    fn sample(env: Arc<ScriptEnv>) -> Sample {
        let mut doc = ScriptDocument::new(env, "player.schematyc");
        let structure = doc.add_element(ElementKind::Structure, None, "Stats").unwrap();
        let class = doc.add_element(ElementKind::Class, None, "Player").unwrap();
        let variable = doc
            .add_element(ElementKind::Variable, Some(class), "Health")
            .unwrap();
        if let ElementBody::Typed(info) = &mut doc.element_mut(variable).unwrap().body {
            info.guid = Some(structure);
        }
        let include = doc.add_element(ElementKind::Include, None, "Shared").unwrap();
        if let ElementBody::Include { file_name, .. } = &mut doc.element_mut(include).unwrap().body {
            *file_name = "shared.schematyc".to_string();
        }
        let function = doc.add_element(ElementKind::Signal, Some(class), "Hit").unwrap();

        let graph = doc
            .add_graph(Some(class), "OnHit", GraphKind::Function, Some(function))
            .unwrap();
        doc.graph_mut(graph)
            .unwrap()
            .add_input(GraphParam::new("damage", PortType::Float));
        doc.refresh();
        let begin = doc.add_node(graph, &NodeKind::Begin, None, None, [0.0, 0.0]).unwrap();
        let sequence = doc
            .add_node(graph, &NodeKind::Sequence, None, None, [150.0, 0.0])
            .unwrap();
        let call = doc
            .add_node(graph, &NodeKind::Function, None, Some(function), [300.0, 0.0])
            .unwrap();
        doc.add_link(graph, begin, "out", sequence, "in").unwrap();
        doc.add_link(graph, sequence, "out_0", call, "in").unwrap();
        Sample { doc, class, graph }
    }

    #[test]
    fn test_save_load_round_trip() {
        let env = env();
        let Sample { doc, graph, .. } = sample(env.clone());
        let saved = doc.to_tree().unwrap();
        assert_eq!(saved["version"], 104);
        assert_eq!(saved["graphs"][0]["detail"]["links"].as_array().unwrap().len(), 2);
        assert_eq!(saved["graphs"][0]["detail"]["nodes"].as_object().unwrap().len(), 3);

        let loaded = ScriptDocument::from_tree(env, Path::new("player.schematyc"), &saved).unwrap();
        assert_eq!(loaded.guid(), doc.guid());
        assert_eq!(loaded.tree().len(), doc.tree().len());
        assert!(!loaded.is_modified());
        let reloaded_graph = loaded.graph(graph).unwrap();
        assert_eq!(reloaded_graph.graph().link_count(), 2);
        assert!(!reloaded_graph.available_nodes().is_empty());

        assert_eq!(loaded.to_tree().unwrap(), saved);
    }

    #[test]
    fn test_scope_invariant_holds_after_load() {
        let env = env();
        let Sample { doc, class, .. } = sample(env.clone());
        let saved = doc.to_tree().unwrap();
        let loaded = ScriptDocument::from_tree(env, Path::new("p"), &saved).unwrap();
        for element in loaded.tree().elements() {
            if let Some(scope) = element.scope() {
                assert!(loaded.element(scope).is_some());
            }
            assert!(loaded.tree().is_attached(element.guid()));
        }
        assert_eq!(loaded.tree().children(Some(class)).len(), 3);
    }

    #[test]
    fn test_file_store_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let env = env();
        let Sample { mut doc, .. } = sample(env.clone());
        let path = dir.path().join("player.schematyc");
        doc.path = path.clone();
        let store = FileStore::default();
        doc.save(&store).unwrap();
        assert!(!doc.is_modified());

        let loaded = ScriptDocument::load(env, &store, &path).unwrap();
        assert!(loaded.flags().on_disk);
        assert_eq!(loaded.tree().len(), doc.tree().len());
    }

    #[test]
    fn test_saved_collections_follow_kinds() {
        let Sample { doc, .. } = sample(env());
        let saved = doc.to_tree().unwrap();
        assert_eq!(saved["includes"][0]["file_name"], "shared.schematyc");
        assert_eq!(saved["schemas"][0]["name"], "Player");
        assert_eq!(saved["variables"][0]["name"], "Health");
        assert!(saved["variables"][0]["typeInfo"]["guid"].is_string());
        assert_eq!(saved["groups"], json!([]));
    }

    #[test]
    fn test_discarded_elements_are_not_saved() {
        let env = env();
        let Sample { mut doc, class, .. } = sample(env.clone());
        doc.element_mut(class).unwrap().header.flags.discard = true;
        let saved = doc.to_tree().unwrap();
        assert_eq!(saved["schemas"], json!([]));
        assert_eq!(saved["variables"], json!([]));
        assert_eq!(saved["graphs"], json!([]));
        assert_eq!(saved["structures"].as_array().unwrap().len(), 1);

        let keep = env_with(ScriptConfig {
            discard_on_save: false,
            ..ScriptConfig::default()
        });
        let Sample { mut doc, class, .. } = sample(keep);
        doc.element_mut(class).unwrap().header.flags.discard = true;
        let saved = doc.to_tree().unwrap();
        assert_eq!(saved["schemas"][0]["flags"]["discard"], true);
    }

    #[test]
    fn test_editing_requires_editable_session() {
        let env = env();
        let Sample { mut doc, class, graph } = sample(env.clone());
        let clipboard = doc.copy_elements(Some(class), true).unwrap();

        env.set_editable(false);
        assert!(doc.add_element(ElementKind::Group, None, "Folder").is_none());
        assert!(doc.add_node(graph, &NodeKind::Branch, None, None, [0.0, 0.0]).is_none());
        assert!(matches!(
            doc.paste_elements(None, &clipboard),
            Err(DocumentError::NotEditable)
        ));
    }

    #[test]
    fn test_copy_paste_remaps_and_renames() {
        let env = env();
        let Sample { mut doc, class, graph } = sample(env);
        let before = doc.tree().len();
        let clipboard = doc.copy_elements(Some(class), true).unwrap();
        assert_eq!(clipboard["elements"].as_array().unwrap().len(), 4);

        let pasted = doc.paste_elements(None, &clipboard).unwrap();
        assert_eq!(pasted.len(), 4);
        assert_eq!(doc.tree().len(), before + 4);
        for guid in &pasted {
            assert!(doc.tree().is_attached(*guid));
            assert_ne!(*guid, class);
            assert_ne!(*guid, graph);
        }

        let copy = pasted
            .iter()
            .copied()
            .find(|g| doc.element(*g).unwrap().kind() == ElementKind::Class)
            .unwrap();
        assert_eq!(doc.element(copy).unwrap().name(), "Player_Copy");
        assert_eq!(doc.tree().children(Some(copy)).len(), 3);

        let pasted_graph = pasted
            .iter()
            .copied()
            .find(|g| doc.graph(*g).is_some())
            .unwrap();
        let original_nodes: HashSet<Guid> = doc.graph(graph).unwrap().graph().nodes().map(|n| n.guid).collect();
        let graph_copy = doc.graph(pasted_graph).unwrap();
        assert_eq!(graph_copy.graph().link_count(), 2);
        assert!(!graph_copy.graph().links().any(|l| graph_copy.graph().is_link_broken(l)));
        assert!(graph_copy
            .graph()
            .nodes()
            .all(|n| !original_nodes.contains(&n.guid)));
        // The call node follows the pasted signal, not the original.
        let signal_copy = doc
            .tree()
            .children(Some(copy))
            .iter()
            .copied()
            .find(|g| doc.element(*g).unwrap().kind() == ElementKind::Signal)
            .unwrap();
        assert!(graph_copy
            .graph()
            .nodes()
            .any(|n| n.ref_guid == Some(signal_copy)));

        let again = doc.paste_elements(None, &clipboard).unwrap();
        let second = again
            .iter()
            .copied()
            .find(|g| doc.element(*g).unwrap().kind() == ElementKind::Class)
            .unwrap();
        assert_eq!(doc.element(second).unwrap().name(), "Player_Copy1");
    }

    #[test]
    fn test_paste_refuses_other_versions() {
        let Sample { mut doc, class, .. } = sample(env());
        let mut clipboard = doc.copy_elements(Some(class), false).unwrap();
        clipboard["version"] = json!(103);
        assert!(matches!(
            doc.paste_elements(None, &clipboard),
            Err(DocumentError::ClipboardVersion { found: 103, expected: 104 })
        ));
    }

    #[test]
    fn test_remove_cascades() {
        let Sample { mut doc, class, .. } = sample(env());
        assert!(!doc.remove_element(class, false));
        assert!(doc.remove_element(class, true));
        assert_eq!(doc.tree().len(), 2);
    }

    #[test]
    fn test_rename_respects_fixed_name_and_siblings() {
        let Sample { mut doc, class, .. } = sample(env());
        let other = doc.add_element(ElementKind::Class, None, "Enemy").unwrap();
        assert!(!doc.rename_element(other, "player"));
        assert!(doc.rename_element(other, "Boss"));
        doc.element_mut(class).unwrap().header.flags.fixed_name = true;
        assert!(!doc.rename_element(class, "Hero"));

        doc.apply_edit(other, &json!({"name": "Villain"})).unwrap();
        assert_eq!(doc.element(other).unwrap().name(), "Villain");
    }

    fn v100_document() -> Value {
        json!({
            "version": 100,
            "guid": "00000000-0000-0000-0000-0000000000d0",
            "buildVersion": "0.0.1",
            "structures": [{
                "guid": "00000000-0000-0000-0000-0000000000a0",
                "scope_guid": null,
                "name": "Stats",
            }],
            "variables": [{
                "guid": "00000000-0000-0000-0000-0000000000a1",
                "scope_guid": null,
                "name": "Health",
                "type_guid": "00000000-0000-0000-0000-0000000000a0",
            }],
        })
    }

    #[test]
    fn test_archive_documents_are_patched_without_touching_the_archive() {
        let mut archive = ArchiveStore::new();
        archive.insert("old.schematyc", v100_document());
        let path = Path::new("old.schematyc");

        let doc = ScriptDocument::load(env(), &archive, path).unwrap();
        assert!(!doc.flags().on_disk);
        assert!(doc.is_modified());
        let variable = doc
            .element("00000000-0000-0000-0000-0000000000a1".parse().unwrap())
            .unwrap();
        assert_eq!(variable.dependencies(), vec!["00000000-0000-0000-0000-0000000000a0".parse().unwrap()]);
        assert_eq!(archive.get(path).unwrap()["version"], 100);
    }

    #[test]
    fn test_newer_version_refuses_to_load() {
        let mut tree = v100_document();
        tree["version"] = json!(200);
        let result = ScriptDocument::from_raw(env(), Path::new("new"), RawTree::Owned(tree));
        assert!(matches!(
            result,
            Err(DocumentError::Patch(PatchError::TooNew { found: 200, .. }))
        ));
    }

    #[test]
    fn test_missing_scope_leaves_orphan() {
        let tree = json!({
            "version": 104,
            "guid": "00000000-0000-0000-0000-0000000000d0",
            "groups": [{
                "guid": "00000000-0000-0000-0000-0000000000a0",
                "scope_guid": "00000000-0000-0000-0000-0000000000ff",
                "name": "Lost",
            }],
        });
        let doc = ScriptDocument::from_tree(env(), Path::new("o"), &tree).unwrap();
        let guid = "00000000-0000-0000-0000-0000000000a0".parse().unwrap();
        assert!(doc.element(guid).is_some());
        assert!(!doc.tree().is_attached(guid));
        assert!(doc.validate().has_errors());
    }

    #[test]
    fn test_graph_fields_survive_load_and_save() {
        let spawn = "00000000-0000-0000-0000-0000000000b2";
        let tree = json!({
            "version": 104,
            "guid": "00000000-0000-0000-0000-0000000000d0",
            "graphs": [{
                "header": {
                    "guid": "00000000-0000-0000-0000-0000000000a0",
                    "name": "Tick",
                    "type": "state_tick",
                    "user_tag": 7,
                },
                "detail": {
                    "nodes": {
                        "begin": {"header": {"guid": "00000000-0000-0000-0000-0000000000b1", "type": "begin"}},
                        "spawn": {"header": {"guid": spawn, "type": "spawn_entity"}, "detail": {"class": "Door"}},
                    },
                    "links": [{
                        "src_node_guid": "00000000-0000-0000-0000-0000000000b1", "src_output_name": "out",
                        "dst_node_guid": spawn, "dst_input_name": "in",
                    }],
                },
            }],
        });
        let doc = ScriptDocument::from_tree(env(), Path::new("t"), &tree).unwrap();
        let diagnostics = doc.validate();
        assert!(diagnostics
            .entries()
            .iter()
            .any(|d| d.message.contains("unknown kind 'spawn_entity'")));

        let saved = doc.to_tree().unwrap();
        let graph = &saved["graphs"][0];
        assert_eq!(graph["header"]["type"], "state_tick");
        assert_eq!(graph["header"]["user_tag"], 7);
        assert_eq!(graph["detail"]["nodes"].as_object().unwrap().len(), 2);
        assert_eq!(graph["detail"]["nodes"][spawn]["detail"]["class"], "Door");
        assert_eq!(graph["detail"]["links"].as_array().unwrap().len(), 1);
    }

    fn mutual_bases() -> Value {
        json!({
            "version": 104,
            "guid": "00000000-0000-0000-0000-0000000000d0",
            "schema_bases": [
                {"guid": "00000000-0000-0000-0000-0000000000a0", "name": "A",
                 "ref_guid": "00000000-0000-0000-0000-0000000000a1"},
                {"guid": "00000000-0000-0000-0000-0000000000a1", "name": "B",
                 "ref_guid": "00000000-0000-0000-0000-0000000000a0"},
            ],
        })
    }

    #[test]
    fn test_cycle_policy_strict_aborts_load() {
        let result = ScriptDocument::from_tree(env(), Path::new("c"), &mutual_bases());
        assert!(matches!(
            result,
            Err(DocumentError::Dependency(DependencyError::MutualDependencies(_)))
        ));
    }

    #[test]
    fn test_cycle_policy_warn_loads_anyway() {
        let env = env_with(ScriptConfig {
            cycle_policy: CyclePolicy::WarnAndContinue,
            ..ScriptConfig::default()
        });
        let doc = ScriptDocument::from_tree(env, Path::new("c"), &mutual_bases()).unwrap();
        assert_eq!(doc.tree().len(), 2);
    }

    #[test]
    fn test_build_version_compare() {
        assert!(is_newer_build("0.2.0", "0.1.9"));
        assert!(!is_newer_build("0.1.0", "0.1.0"));
        assert!(!is_newer_build("", "0.1.0"));
        assert!(is_newer_build("1.0.0", "0.9"));
    }
}
