// SPDX-License-Identifier: MIT OR Apache-2.0
//! Document format patches.
//!
//! A [`DocPatcher`] holds a chain of structural transforms, each upgrading a
//! persisted tree from one format version to the next. Transforms work on the
//! generic field tree only, so element types never need to know about old
//! layouts.
//!
//! Trees that may be shared are taken as [`Cow::Borrowed`] and cloned right
//! before the first transform runs; a tree already at the current version is
//! handed back without a copy.

use crate::fields::{self, FieldError};
use serde_json::{Map, Value};
use std::borrow::Cow;

/// Oldest document version the standard patch chain upgrades from
pub const OLDEST_SUPPORTED_VERSION: u32 = 100;

/// Version written by this build
pub const CURRENT_VERSION: u32 = 104;

/// Structural transform from one version to the next
pub type Transform = fn(&mut Value) -> Result<(), FieldError>;

/// One step of the patch chain
#[derive(Debug, Clone, Copy)]
pub struct Patch {
    /// Version the transform reads
    pub from: u32,
    /// Version the transform produces
    pub to: u32,
    /// Short description for the log
    pub description: &'static str,
    /// The transform
    pub apply: Transform,
}

/// Patch failure; every variant aborts the document load
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PatchError {
    /// No `version` field
    #[error("Document '{0}' has no version")]
    MissingVersion(String),

    /// Written by a newer build
    #[error("Document '{name}' version {found} is newer than supported version {current}")]
    TooNew {
        /// Document name
        name: String,
        /// Stored version
        found: u32,
        /// Newest version this build reads
        current: u32,
    },

    /// No transform starts at this version
    #[error("Document '{name}': no patch from version {version}")]
    NoPatch {
        /// Document name
        name: String,
        /// Version without a transform
        version: u32,
    },

    /// A transform failed
    #[error("Document '{name}': patch {from} -> {to} failed: {source}")]
    Transform {
        /// Document name
        name: String,
        /// Version the failing transform reads
        from: u32,
        /// Version it would produce
        to: u32,
        /// Shape problem the transform hit
        #[source]
        source: FieldError,
    },

    /// Registering a patch that does not continue the chain
    #[error("Patch {from} -> {to} does not continue the chain at {current}")]
    BrokenChain {
        /// Patch start
        from: u32,
        /// Patch end
        to: u32,
        /// Current end of the chain
        current: u32,
    },
}

/// Sequential version migration
#[derive(Debug, Clone)]
pub struct DocPatcher {
    base_version: u32,
    patches: Vec<Patch>,
}

impl Default for DocPatcher {
    fn default() -> Self {
        Self::standard()
    }
}

impl DocPatcher {
    /// Empty chain whose current version is `base_version`
    pub fn new(base_version: u32) -> Self {
        Self {
            base_version,
            patches: Vec::new(),
        }
    }

    /// The chain shipped with this build
    pub fn standard() -> Self {
        Self {
            base_version: OLDEST_SUPPORTED_VERSION,
            patches: standard_patches().into(),
        }
    }

    /// Append a patch; it must start where the chain ends
    pub fn register(&mut self, patch: Patch) -> Result<(), PatchError> {
        let current = self.current_version();
        if patch.from != current || patch.to <= patch.from {
            return Err(PatchError::BrokenChain {
                from: patch.from,
                to: patch.to,
                current,
            });
        }
        self.patches.push(patch);
        Ok(())
    }

    /// Version produced by the last patch
    pub fn current_version(&self) -> u32 {
        self.patches.last().map_or(self.base_version, |p| p.to)
    }

    /// Bring `tree` up to the current version.
    ///
    /// `name` only labels log lines and errors.
    pub fn patch<'a>(&self, tree: Cow<'a, Value>, name: &str) -> Result<Cow<'a, Value>, PatchError> {
        let current = self.current_version();
        let stored = tree
            .get("version")
            .and_then(Value::as_u64)
            .and_then(|v| u32::try_from(v).ok())
            .ok_or_else(|| PatchError::MissingVersion(name.to_string()))?;

        if stored > current {
            return Err(PatchError::TooNew {
                name: name.to_string(),
                found: stored,
                current,
            });
        }
        if stored == current {
            return Ok(tree);
        }

        let mut tree = tree.into_owned();
        let mut version = stored;
        while version < current {
            let patch = self
                .patches
                .iter()
                .find(|p| p.from == version)
                .ok_or_else(|| PatchError::NoPatch {
                    name: name.to_string(),
                    version,
                })?;
            (patch.apply)(&mut tree).map_err(|source| PatchError::Transform {
                name: name.to_string(),
                from: patch.from,
                to: patch.to,
                source,
            })?;
            version = patch.to;
            if let Some(obj) = tree.as_object_mut() {
                obj.insert("version".into(), Value::from(version));
            }
            tracing::info!("Patched '{name}' {} -> {}: {}", patch.from, patch.to, patch.description);
        }
        Ok(Cow::Owned(tree))
    }
}

fn standard_patches() -> [Patch; 4] {
    [
        Patch {
            from: 100,
            to: 101,
            description: "rename variable and property type_guid to type_id",
            apply: rename_type_guid,
        },
        Patch {
            from: 101,
            to: 102,
            description: "nest type ids under type_info",
            apply: nest_type_id,
        },
        Patch {
            from: 102,
            to: 103,
            description: "split graphs into header and detail",
            apply: split_graph_headers,
        },
        Patch {
            from: 103,
            to: 104,
            description: "rename type_info to typeInfo",
            apply: rename_type_info,
        },
    ]
}

const TYPED_COLLECTIONS: [&str; 3] = ["variables", "properties", "containers"];

/// Run `f` on every element object of `collection`
fn for_each_element<F>(tree: &mut Value, collection: &str, mut f: F) -> Result<(), FieldError>
where
    F: FnMut(&mut Map<String, Value>) -> Result<(), FieldError>,
{
    let root = fields::as_object_mut(tree, "document")?;
    let Some(entries) = root.get_mut(collection) else {
        return Ok(());
    };
    let entries = entries
        .as_array_mut()
        .ok_or_else(|| FieldError::wrong_type(collection, "array"))?;
    for entry in entries {
        f(fields::as_object_mut(entry, collection)?)?;
    }
    Ok(())
}

fn rename_key(obj: &mut Map<String, Value>, from: &str, to: &str) {
    if let Some(value) = obj.remove(from) {
        obj.insert(to.into(), value);
    }
}

fn rename_type_guid(tree: &mut Value) -> Result<(), FieldError> {
    for collection in ["variables", "properties"] {
        for_each_element(tree, collection, |obj| {
            rename_key(obj, "type_guid", "type_id");
            Ok(())
        })?;
    }
    Ok(())
}

fn nest_type_id(tree: &mut Value) -> Result<(), FieldError> {
    for collection in TYPED_COLLECTIONS {
        for_each_element(tree, collection, |obj| {
            if let Some(id) = obj.remove("type_id") {
                let mut info = Map::new();
                info.insert("guid".into(), id);
                obj.insert("type_info".into(), Value::Object(info));
            }
            Ok(())
        })?;
    }
    Ok(())
}

const GRAPH_HEADER_KEYS: [&str; 5] = ["guid", "scope_guid", "name", "type", "context_guid"];

fn split_graph_headers(tree: &mut Value) -> Result<(), FieldError> {
    for_each_element(tree, "graphs", |obj| {
        if obj.contains_key("header") {
            return Ok(());
        }
        let flat = std::mem::take(obj);
        let mut header = Map::new();
        let mut detail = Map::new();
        for (key, value) in flat {
            if GRAPH_HEADER_KEYS.contains(&key.as_str()) {
                header.insert(key, value);
            } else {
                detail.insert(key, value);
            }
        }
        if !header.contains_key("guid") {
            return Err(FieldError::missing("graphs/guid"));
        }
        obj.insert("header".into(), Value::Object(header));
        obj.insert("detail".into(), Value::Object(detail));
        Ok(())
    })
}

fn rename_type_info(tree: &mut Value) -> Result<(), FieldError> {
    for collection in TYPED_COLLECTIONS {
        for_each_element(tree, collection, |obj| {
            rename_key(obj, "type_info", "typeInfo");
            Ok(())
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn v100_document() -> Value {
        json!({
            "version": 100,
            "guid": "00000000-0000-0000-0000-000000000001",
            "variables": [{
                "guid": "00000000-0000-0000-0000-000000000002",
                "scope_guid": null,
                "name": "Health",
                "type_guid": "00000000-0000-0000-0000-0000000000aa",
            }],
            "graphs": [{
                "guid": "00000000-0000-0000-0000-000000000003",
                "name": "Tick",
                "type": "function",
                "nodes": {},
                "links": [],
            }],
        })
    }

    #[test]
    fn test_chain_moves_type_guid_to_type_info_guid() {
        let patcher = DocPatcher::standard();
        assert_eq!(patcher.current_version(), CURRENT_VERSION);

        let patched = patcher.patch(Cow::Owned(v100_document()), "doc").unwrap();
        let variable = &patched["variables"][0];
        assert_eq!(
            variable.pointer("/typeInfo/guid"),
            Some(&json!("00000000-0000-0000-0000-0000000000aa"))
        );
        assert!(variable.get("type_guid").is_none());
        assert!(variable.get("type_id").is_none());
        assert!(variable.get("type_info").is_none());
        assert_eq!(patched["version"], 104);

        let graph = &patched["graphs"][0];
        assert_eq!(graph["header"]["name"], "Tick");
        assert_eq!(graph["detail"]["links"], json!([]));
    }

    #[test]
    fn test_shared_tree_is_cloned_before_patching() {
        let shared = v100_document();
        let patched = DocPatcher::standard()
            .patch(Cow::Borrowed(&shared), "doc")
            .unwrap();
        assert!(matches!(patched, Cow::Owned(_)));
        assert_eq!(shared["version"], 100);
        assert!(shared["variables"][0].get("type_guid").is_some());
    }

    #[test]
    fn test_current_version_is_not_copied() {
        let tree = json!({"version": CURRENT_VERSION});
        let patched = DocPatcher::standard()
            .patch(Cow::Borrowed(&tree), "doc")
            .unwrap();
        assert!(matches!(patched, Cow::Borrowed(_)));
    }

    #[test]
    fn test_version_errors() {
        let patcher = DocPatcher::standard();
        assert!(matches!(
            patcher.patch(Cow::Owned(json!({"version": 105})), "doc"),
            Err(PatchError::TooNew { found: 105, current: 104, .. })
        ));
        assert!(matches!(
            patcher.patch(Cow::Owned(json!({"version": 99})), "doc"),
            Err(PatchError::NoPatch { version: 99, .. })
        ));
        assert!(matches!(
            patcher.patch(Cow::Owned(json!({"guid": "x"})), "doc"),
            Err(PatchError::MissingVersion(_))
        ));
    }

    #[test]
    fn test_transform_failure_is_fatal() {
        let tree = json!({"version": 102, "graphs": [{"name": "no guid"}]});
        let err = DocPatcher::standard()
            .patch(Cow::Owned(tree), "doc")
            .unwrap_err();
        assert!(matches!(err, PatchError::Transform { from: 102, to: 103, .. }));
    }

    #[test]
    fn test_standard_chain_is_contiguous() {
        let mut patcher = DocPatcher::new(OLDEST_SUPPORTED_VERSION);
        for patch in DocPatcher::standard().patches {
            patcher.register(patch).unwrap();
        }
        assert_eq!(patcher.current_version(), CURRENT_VERSION);
    }

    #[test]
    fn test_register_requires_contiguous_chain() {
        fn noop(_: &mut Value) -> Result<(), FieldError> {
            Ok(())
        }
        let mut patcher = DocPatcher::new(1);
        let patch = |from, to| Patch {
            from,
            to,
            description: "noop",
            apply: noop,
        };
        assert!(patcher.register(patch(1, 2)).is_ok());
        assert!(patcher.register(patch(3, 4)).is_err());
        assert!(patcher.register(patch(2, 2)).is_err());
        assert_eq!(patcher.current_version(), 2);
    }
}
