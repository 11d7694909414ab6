// SPDX-License-Identifier: MIT OR Apache-2.0
//! Standard script node kinds.
//!
//! Execute inputs accept any number of links; execute outputs drive exactly
//! one continuation. Data outputs fan out freely, data inputs take one link.

use crate::node::{NodeCategory, NodeKind, NodeRegistry, NodeTemplate};
use crate::port::{Port, PortType};

fn template(
    kind: NodeKind,
    name: &str,
    category: NodeCategory,
    description: &str,
    inputs: Vec<Port>,
    outputs: Vec<Port>,
) -> NodeTemplate {
    NodeTemplate {
        kind,
        name: name.to_string(),
        category,
        description: description.to_string(),
        inputs,
        outputs,
    }
}

fn exec_in() -> Port {
    Port::execute("in").multi_link()
}

fn exec_out() -> Port {
    Port::execute("out")
}

/// Create the standard script node registry
pub fn create_standard_registry() -> NodeRegistry {
    let mut registry = NodeRegistry::new();

    // Entry and exit points
    for (kind, name, description) in [
        (NodeKind::Begin, "Begin", "Function or condition entry point"),
        (NodeKind::BeginConstructor, "Begin Constructor", "Runs when the object is constructed"),
        (NodeKind::BeginDestructor, "Begin Destructor", "Runs when the object is destroyed"),
        (NodeKind::BeginSignalReceiver, "Begin Signal Receiver", "Runs when a signal is received"),
    ] {
        registry.register(template(kind, name, NodeCategory::Event, description, vec![], vec![exec_out()]));
    }

    registry.register(template(
        NodeKind::Return,
        "Return",
        NodeCategory::Event,
        "Leave the function or condition",
        vec![exec_in()],
        vec![],
    ));

    // Flow control
    registry.register(template(
        NodeKind::Sequence,
        "Sequence",
        NodeCategory::Flow,
        "Run outputs in order",
        vec![exec_in()],
        vec![Port::execute("out_0"), Port::execute("out_1")],
    ));

    registry.register(template(
        NodeKind::Branch,
        "Branch",
        NodeCategory::Flow,
        "If/else branching",
        vec![exec_in(), Port::data("condition", PortType::Bool)],
        vec![Port::execute("true"), Port::execute("false")],
    ));

    registry.register(template(
        NodeKind::ForLoop,
        "For Loop",
        NodeCategory::Flow,
        "Run the loop body a number of times",
        vec![
            exec_in(),
            Port::data("begin", PortType::Int),
            Port::data("end", PortType::Int),
        ],
        vec![
            Port::execute("loop"),
            Port::data("index", PortType::Int).multi_link(),
            Port::execute("done"),
        ],
    ));

    // Calls
    registry.register(template(
        NodeKind::Function,
        "Function",
        NodeCategory::Call,
        "Call a function",
        vec![exec_in()],
        vec![exec_out()],
    ));

    registry.register(template(
        NodeKind::Condition,
        "Condition",
        NodeCategory::Call,
        "Evaluate a condition",
        vec![exec_in()],
        vec![exec_out(), Port::data("result", PortType::Bool).multi_link()],
    ));

    registry.register(template(
        NodeKind::SendSignal,
        "Send Signal",
        NodeCategory::Call,
        "Send a signal to an object",
        vec![exec_in(), Port::data("object", PortType::Object)],
        vec![exec_out()],
    ));

    registry.register(template(
        NodeKind::BroadcastSignal,
        "Broadcast Signal",
        NodeCategory::Call,
        "Broadcast a signal to every listener",
        vec![exec_in()],
        vec![exec_out()],
    ));

    // Data access; value types are bound from the referenced variable
    registry.register(template(
        NodeKind::Get,
        "Get",
        NodeCategory::Data,
        "Read a variable or property",
        vec![],
        vec![Port::data("value", PortType::None).multi_link()],
    ));

    registry.register(template(
        NodeKind::Set,
        "Set",
        NodeCategory::Data,
        "Write a variable or property",
        vec![exec_in(), Port::data("value", PortType::None)],
        vec![exec_out()],
    ));

    // Timers
    for (kind, name) in [
        (NodeKind::StartTimer, "Start Timer"),
        (NodeKind::StopTimer, "Stop Timer"),
        (NodeKind::ResetTimer, "Reset Timer"),
    ] {
        registry.register(template(kind, name, NodeCategory::Timer, name, vec![exec_in()], vec![exec_out()]));
    }

    registry.register(template(
        NodeKind::Comment,
        "Comment",
        NodeCategory::Utility,
        "Free-form annotation",
        vec![],
        vec![],
    ));

    registry
}
