// SPDX-License-Identifier: MIT OR Apache-2.0
//! Dependency ordering for load/save batches.
//!
//! Every element in a batch lists the GUIDs it depends on. Priorities are
//! relaxed until each dependency outranks its dependents, then the batch is
//! sorted by descending priority so dependencies come first. References to
//! GUIDs outside the batch are ignored. Includes always come first.

use crate::element::ElementKind;
use ordoplay_editor_graph::Guid;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::HashMap;

/// What to do with circular dependencies
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CyclePolicy {
    /// Refuse the whole batch
    #[default]
    Strict,
    /// Log the cycle and keep the best order found
    WarnAndContinue,
}

/// Circular dependencies found under [`CyclePolicy::Strict`]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DependencyError {
    /// Pairs of elements that depend on each other
    #[error("{} mutual dependencies, first between {} and {}", .0.len(), .0[0].0, .0[0].1)]
    MutualDependencies(Vec<(Guid, Guid)>),

    /// Longer cycle; priorities never settled
    #[error("Circular dependency among {} elements", .0.len())]
    Cycle(Vec<Guid>),
}

/// Something that can be ordered by dependency
pub trait Dependent {
    /// Identity within the batch
    fn guid(&self) -> Guid;
    /// Kind tag
    fn kind(&self) -> ElementKind;
    /// GUIDs this item depends on
    fn dependencies(&self) -> Vec<Guid>;
}

/// Outcome of a sort
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyReport {
    /// Mutually dependent pairs found
    pub mutual_dependencies: usize,
    /// Whether priorities failed to settle
    pub unresolved_cycle: bool,
}

/// Reorder `items` so that dependencies come before their dependents
pub fn sort_by_dependency<T: Dependent>(
    items: &mut Vec<T>,
    policy: CyclePolicy,
) -> Result<DependencyReport, DependencyError> {
    let count = items.len();
    let index: HashMap<Guid, usize> = items
        .iter()
        .enumerate()
        .map(|(i, item)| (item.guid(), i))
        .collect();
    let edges: Vec<Vec<usize>> = items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let mut deps: Vec<usize> = item
                .dependencies()
                .into_iter()
                .filter_map(|guid| index.get(&guid).copied())
                .filter(|&j| j != i)
                .collect();
            deps.sort_unstable();
            deps.dedup();
            deps
        })
        .collect();

    let mut report = DependencyReport::default();

    let mut mutual = Vec::new();
    for (i, deps) in edges.iter().enumerate() {
        for &j in deps {
            if i < j && edges[j].contains(&i) {
                mutual.push((items[i].guid(), items[j].guid()));
            }
        }
    }
    if !mutual.is_empty() {
        report.mutual_dependencies = mutual.len();
        match policy {
            CyclePolicy::Strict => return Err(DependencyError::MutualDependencies(mutual)),
            CyclePolicy::WarnAndContinue => {
                for (a, b) in &mutual {
                    tracing::error!("Mutual dependency between {a} and {b}");
                }
            }
        }
    }

    let mut priority = vec![0usize; count];
    let mut settled = false;
    for _ in 0..=count {
        let mut changed = false;
        for (i, deps) in edges.iter().enumerate() {
            for &j in deps {
                if priority[j] <= priority[i] {
                    priority[j] = priority[i] + 1;
                    changed = true;
                }
            }
        }
        if !changed {
            settled = true;
            break;
        }
    }

    if !settled {
        report.unresolved_cycle = true;
        let involved: Vec<Guid> = edges
            .iter()
            .enumerate()
            .filter(|(_, deps)| !deps.is_empty())
            .map(|(i, _)| items[i].guid())
            .collect();
        match policy {
            CyclePolicy::Strict => return Err(DependencyError::Cycle(involved)),
            CyclePolicy::WarnAndContinue => {
                tracing::error!("Circular dependency among {} elements, order is best effort", involved.len());
            }
        }
    }

    for (i, item) in items.iter().enumerate() {
        if item.kind() == ElementKind::Include {
            priority[i] = usize::MAX;
        }
    }

    let mut order: Vec<usize> = (0..count).collect();
    order.sort_by_key(|&i| Reverse(priority[i]));

    let mut slots: Vec<Option<T>> = items.drain(..).map(Some).collect();
    items.extend(order.into_iter().filter_map(|i| slots[i].take()));
    Ok(report)
}
