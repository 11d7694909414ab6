// SPDX-License-Identifier: MIT OR Apache-2.0
//! Visitor control flow shared by element and link traversal.

/// What a visitor wants the traversal to do next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisitStatus {
    /// Keep going (descend into children when recursing, then siblings)
    Continue,
    /// Do not descend into this item's children, but continue with its siblings
    SkipChildren,
    /// Stop the whole traversal
    Stop,
}

/// How a traversal ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisitResult {
    /// Every item was visited
    Completed,
    /// A visitor requested [`VisitStatus::Stop`]
    Stopped,
}

impl VisitResult {
    /// Whether the traversal was cut short
    pub fn is_stopped(self) -> bool {
        self == Self::Stopped
    }
}
