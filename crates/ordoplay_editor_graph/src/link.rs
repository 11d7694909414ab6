// SPDX-License-Identifier: MIT OR Apache-2.0
//! Link (edge) definitions for the graph.

use crate::guid::{Guid, GuidRemapper};
use serde::{Deserialize, Serialize};

/// Index of a link inside its graph's ordered link list
pub type LinkIndex = usize;

/// A link from a node output to a node input.
///
/// The tuple of all four fields is the link's identity; links carry no GUID.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Link {
    /// Source node GUID
    #[serde(rename = "src_node_guid")]
    pub src_node: Guid,
    /// Source output name
    pub src_output_name: String,
    /// Destination node GUID
    #[serde(rename = "dst_node_guid")]
    pub dst_node: Guid,
    /// Destination input name
    pub dst_input_name: String,
}

impl Link {
    /// Create a new link
    pub fn new(
        src_node: Guid,
        src_output_name: impl Into<String>,
        dst_node: Guid,
        dst_input_name: impl Into<String>,
    ) -> Self {
        Self {
            src_node,
            src_output_name: src_output_name.into(),
            dst_node,
            dst_input_name: dst_input_name.into(),
        }
    }

    /// Check if this link involves a specific node
    pub fn involves_node(&self, node: Guid) -> bool {
        self.src_node == node || self.dst_node == node
    }

    /// Check if this link matches the given tuple
    pub fn matches(&self, src_node: Guid, src_output_name: &str, dst_node: Guid, dst_input_name: &str) -> bool {
        self.src_node == src_node
            && self.dst_node == dst_node
            && self.src_output_name == src_output_name
            && self.dst_input_name == dst_input_name
    }

    /// Rewrite node GUIDs through `remapper`
    pub fn remap_guids(&mut self, remapper: &GuidRemapper) {
        self.src_node = remapper.remap(self.src_node);
        self.dst_node = remapper.remap(self.dst_node);
    }
}

/// Notification sent to subscribers whenever a link leaves a graph
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkRemoved {
    /// The removed link
    pub link: Link,
}
