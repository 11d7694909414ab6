// SPDX-License-Identifier: MIT OR Apache-2.0
//! Validation diagnostics.

use ordoplay_editor_graph::Guid;
use std::fmt;

/// Diagnostic severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Suspicious but loadable
    Warning,
    /// Broken data
    Error,
}

/// One finding from the Validate pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Severity
    pub severity: Severity,
    /// Element the finding is about
    pub element: Option<Guid>,
    /// Human-readable message
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        match self.element {
            Some(guid) => write!(f, "{label} [{guid}]: {}", self.message),
            None => write!(f, "{label}: {}", self.message),
        }
    }
}

/// Collected findings; every entry is also forwarded to the log
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    /// Create an empty collection
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a warning
    pub fn warning(&mut self, element: Option<Guid>, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!("{}", with_element(element, &message));
        self.entries.push(Diagnostic {
            severity: Severity::Warning,
            element,
            message,
        });
    }

    /// Record an error
    pub fn error(&mut self, element: Option<Guid>, message: impl Into<String>) {
        let message = message.into();
        tracing::error!("{}", with_element(element, &message));
        self.entries.push(Diagnostic {
            severity: Severity::Error,
            element,
            message,
        });
    }

    /// All findings in order
    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    /// Number of warnings
    pub fn warning_count(&self) -> usize {
        self.count(Severity::Warning)
    }

    /// Number of errors
    pub fn error_count(&self) -> usize {
        self.count(Severity::Error)
    }

    /// Whether any error was recorded
    pub fn has_errors(&self) -> bool {
        self.error_count() > 0
    }

    /// Whether nothing was recorded
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append another collection
    pub fn extend(&mut self, other: Diagnostics) {
        self.entries.extend(other.entries);
    }

    fn count(&self, severity: Severity) -> usize {
        self.entries.iter().filter(|d| d.severity == severity).count()
    }
}

fn with_element(element: Option<Guid>, message: &str) -> String {
    match element {
        Some(guid) => format!("[{guid}] {message}"),
        None => message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_and_display() {
        let guid = Guid::from_u128(7);
        let mut diagnostics = Diagnostics::new();
        assert!(diagnostics.is_empty());
        diagnostics.warning(Some(guid), "Element has no name");
        diagnostics.error(None, "Scope not found");

        assert_eq!(diagnostics.warning_count(), 1);
        assert_eq!(diagnostics.error_count(), 1);
        assert!(diagnostics.has_errors());
        assert_eq!(
            diagnostics.entries()[0].to_string(),
            format!("warning [{guid}]: Element has no name")
        );
        assert_eq!(diagnostics.entries()[1].to_string(), "error: Scope not found");
    }

    #[test]
    fn test_extend_keeps_order() {
        let mut first = Diagnostics::new();
        first.warning(None, "a");
        let mut second = Diagnostics::new();
        second.warning(None, "b");
        first.extend(second);
        let messages: Vec<&str> = first.entries().iter().map(|d| d.message.as_str()).collect();
        assert_eq!(messages, ["a", "b"]);
        assert!(!first.has_errors());
    }
}
