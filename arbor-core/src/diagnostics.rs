//! Non-fatal diagnostics
//!
//! Usage mistakes (unknown mutation types, invalid unregister targets,
//! strict-mode violations, failing subscribers) never abort an operation.
//! They are logged through `tracing` and recorded in the store's
//! [`DiagnosticCollector`] so hosts and tests can inspect them. Building
//! without the `diagnostics` feature elides both.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Diagnostic severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// What kind of misuse a diagnostic reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    UnknownMutation,
    UnknownAction,
    UnknownLocalMutation,
    UnknownLocalAction,
    /// Call object without a string `type`
    InvalidCall,
    DuplicateNamespace,
    DuplicateGetter,
    /// A module was registered over an existing one
    DuplicateModule,
    /// Module state replaced an existing field of its parent state
    StateOverride,
    /// Module state could not be attached or removed
    StatePlacement,
    /// A mutation handler's module state no longer resolves
    MissingState,
    SubscriberFailure,
    StrictViolation,
    /// Direct assignment of the root state
    ReadOnlyState,
    InvalidUnregister,
    HotUpdateMismatch,
    Deprecated,
}

impl DiagnosticKind {
    pub fn severity(self) -> Severity {
        match self {
            DiagnosticKind::UnknownMutation
            | DiagnosticKind::UnknownAction
            | DiagnosticKind::UnknownLocalMutation
            | DiagnosticKind::UnknownLocalAction
            | DiagnosticKind::InvalidCall
            | DiagnosticKind::DuplicateNamespace
            | DiagnosticKind::DuplicateGetter
            | DiagnosticKind::StatePlacement
            | DiagnosticKind::MissingState
            | DiagnosticKind::StrictViolation => Severity::Error,
            DiagnosticKind::SubscriberFailure
            | DiagnosticKind::DuplicateModule
            | DiagnosticKind::StateOverride
            | DiagnosticKind::ReadOnlyState
            | DiagnosticKind::InvalidUnregister
            | DiagnosticKind::HotUpdateMismatch
            | DiagnosticKind::Deprecated => Severity::Warning,
        }
    }
}

/// A reported diagnostic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub severity: Severity,
    pub message: String,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity: kind.severity(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[arbor] {}", self.message)
    }
}

/// Collector for diagnostics reported by one store
#[derive(Debug, Default)]
pub struct DiagnosticCollector {
    diagnostics: Mutex<Vec<Diagnostic>>,
}

impl DiagnosticCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a diagnostic
    pub fn emit_diagnostic(&self, diagnostic: Diagnostic) {
        self.diagnostics.lock().push(diagnostic);
    }

    /// Snapshot of all diagnostics, oldest first
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.diagnostics.lock().clone()
    }

    /// Get diagnostics of one kind
    pub fn by_kind(&self, kind: DiagnosticKind) -> Vec<Diagnostic> {
        self.diagnostics
            .lock()
            .iter()
            .filter(|d| d.kind == kind)
            .cloned()
            .collect()
    }

    pub fn count(&self, kind: DiagnosticKind) -> usize {
        self.diagnostics.lock().iter().filter(|d| d.kind == kind).count()
    }

    pub fn has(&self, kind: DiagnosticKind) -> bool {
        self.count(kind) > 0
    }

    /// Check if there are any errors
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .lock()
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    pub fn len(&self) -> usize {
        self.diagnostics.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.lock().is_empty()
    }

    /// Clear all diagnostics
    pub fn clear(&self) {
        self.diagnostics.lock().clear();
    }
}

/// Log and record a diagnostic
pub(crate) fn emit(collector: &DiagnosticCollector, kind: DiagnosticKind, message: String) {
    let diagnostic = Diagnostic::new(kind, message);
    match diagnostic.severity {
        Severity::Error => tracing::error!(kind = ?kind, "{}", diagnostic),
        Severity::Warning => tracing::warn!(kind = ?kind, "{}", diagnostic),
    }
    collector.emit_diagnostic(diagnostic);
}

/// Report a diagnostic against a collector
///
/// Expands to nothing without the `diagnostics` feature, so message
/// formatting is skipped as well.
macro_rules! report {
    ($collector:expr, $kind:expr, $($arg:tt)+) => {{
        #[cfg(feature = "diagnostics")]
        {
            $crate::diagnostics::emit($collector, $kind, format!($($arg)+));
        }
        #[cfg(not(feature = "diagnostics"))]
        {
            let _ = (&$collector, &$kind);
        }
    }};
}

pub(crate) use report;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collector_filters_by_kind() {
        let collector = DiagnosticCollector::new();
        emit(&collector, DiagnosticKind::UnknownMutation, "unknown mutation type: x".into());
        emit(&collector, DiagnosticKind::Deprecated, "silent option has been removed".into());

        assert_eq!(collector.len(), 2);
        assert_eq!(collector.count(DiagnosticKind::UnknownMutation), 1);
        assert!(collector.has_errors());
        assert_eq!(
            collector.by_kind(DiagnosticKind::Deprecated)[0].severity,
            Severity::Warning
        );

        collector.clear();
        assert!(collector.is_empty());
    }

    #[test]
    fn test_display_is_prefixed() {
        let diagnostic = Diagnostic::new(DiagnosticKind::UnknownAction, "unknown action type: a");
        assert_eq!(diagnostic.to_string(), "[arbor] unknown action type: a");
    }
}
