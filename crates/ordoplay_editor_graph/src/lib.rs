// SPDX-License-Identifier: MIT OR Apache-2.0
//! Script graph model for `OrdoPlay` Editor.
//!
//! Graphs hold the control and data flow of visual scripts:
//! - GUID-addressed nodes built by a [`NodeFactory`]
//! - Named, flagged ports with type identifiers
//! - Links keyed by (source, output, destination, input)
//! - Link validation, broken-link sweeps and removal notifications
//!
//! This crate also hosts the identifier service shared by the script
//! document model.

pub mod guid;
pub mod port;
pub mod node;
pub mod nodes;
pub mod link;
pub mod graph;
pub mod visit;

pub use guid::{Guid, GuidGenerator, GuidRemapper, RandomGuidGenerator, SequentialGuidGenerator};
pub use node::{GraphSignature, Node, NodeCategory, NodeFactory, NodeHeader, NodeKind, NodeRegistry, NodeTemplate};
pub use port::{Port, PortDirection, PortType};
pub use link::{Link, LinkIndex, LinkRemoved};
pub use graph::{GraphDataError, LinkError, ScriptGraph};
pub use nodes::create_standard_registry;
pub use visit::{VisitResult, VisitStatus};
