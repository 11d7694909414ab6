// SPDX-License-Identifier: MIT OR Apache-2.0
//! Port definitions for node inputs/outputs.

use crate::guid::Guid;
use serde::{Deserialize, Serialize};

/// Port direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PortDirection {
    /// Input port
    Input,
    /// Output port
    Output,
}

/// Data type identifier carried by a port
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PortType {
    /// No data (pure control-flow pins)
    None,
    /// Boolean value
    Bool,
    /// Integer value
    Int,
    /// Unsigned integer value
    UInt,
    /// Floating point value
    Float,
    /// 2D vector
    Vector2,
    /// 3D vector
    Vector3,
    /// String value
    String,
    /// Entity/object reference
    Object,
    /// Type declared in a script document (enumeration, structure)
    Script(Guid),
    /// Environment-provided type, by name
    Custom(String),
}

impl PortType {
    /// Whether this port carries no data
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }
}

/// A named pin on a node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Port {
    /// Port name, unique per direction on a node
    pub name: String,
    /// Data type
    pub data_type: PortType,
    /// Control-flow pin
    pub execute: bool,
    /// Whether more than one link may attach to this pin
    pub multi_link: bool,
}

impl Port {
    /// Create a data port
    pub fn data(name: impl Into<String>, data_type: PortType) -> Self {
        Self {
            name: name.into(),
            data_type,
            execute: false,
            multi_link: false,
        }
    }

    /// Create a control-flow port
    pub fn execute(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: PortType::None,
            execute: true,
            multi_link: false,
        }
    }

    /// Allow more than one link on this port
    pub fn multi_link(mut self) -> Self {
        self.multi_link = true;
        self
    }

    /// Check whether a link between `self` and `other` is type-compatible.
    ///
    /// Two execute pins always match; otherwise the data types must be equal.
    pub fn is_compatible(&self, other: &Port) -> bool {
        (self.execute && other.execute) || self.data_type == other.data_type
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execute_ports_are_compatible() {
        let out = Port::execute("out");
        let input = Port::execute("in").multi_link();
        assert!(out.is_compatible(&input));
    }

    #[test]
    fn test_data_ports_require_equal_types() {
        let a = Port::data("value", PortType::Int);
        let b = Port::data("value", PortType::Float);
        let c = Port::data("other", PortType::Int);
        assert!(!a.is_compatible(&b));
        assert!(a.is_compatible(&c));
    }

    #[test]
    fn test_execute_and_data_ports_do_not_mix() {
        let exec = Port::execute("out");
        let data = Port::data("value", PortType::Bool);
        assert!(!exec.is_compatible(&data));
    }
}
