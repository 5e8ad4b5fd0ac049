//! Check-time error reporting and diagnostics.
//!
//! This module provides a structured error system for the coeffect checker.
//! Errors are rich diagnostics naming the offending declaration or call site,
//! the capability tags involved, and optional labels and hints.
//!
//! # Design
//!
//! - `CheckError` - single diagnostic with primary span and optional secondary spans
//! - `ErrorKind` - categorizes errors by the rule that was violated
//! - `Severity` - error or warning
//! - `DiagnosticFormatter` - formats diagnostics with file locations
//!
//! # Recovery
//!
//! Every kind except [`ErrorKind::IncomparableCapabilities`] is recoverable:
//! passes keep checking unrelated declarations and return all errors together.
//! An incomparable comparison means the lattice itself is misconfigured, so it
//! stops the pipeline.
//!
//! # Examples
//!
//! ```
//! # use coeffects_check::error::*;
//! # use coeffects_foundation::{CapabilitySet, CapabilityTag, Span};
//! let error = CheckError::new(
//!     ErrorKind::InsufficientCapability,
//!     Span::new(0, 12, 3),
//!     "pure",
//!     "call to A::f requires [rx]".to_string(),
//! )
//! .with_tags(CapabilitySet::single(CapabilityTag::Rx));
//! assert!(!error.is_fatal());
//! ```

use coeffects_foundation::{CapabilitySet, SourceMap, Span};
use serde::Serialize;
use std::fmt;

/// Check diagnostic with source location and message.
///
/// Each diagnostic has:
/// - Primary span (where the error occurred)
/// - Error kind (categorizes the error)
/// - Subject (the declaration or call site it is about)
/// - Message (human-readable explanation)
/// - Offending capability tags, if any
/// - Optional secondary labels (related code locations)
/// - Optional notes (additional context or suggestions)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckError {
    /// Category of this error
    pub kind: ErrorKind,
    /// Severity level
    pub severity: Severity,
    /// Primary source location
    pub span: Span,
    /// Declaration or call site this diagnostic is about
    pub subject: String,
    /// Primary error message
    pub message: String,
    /// Capability tags involved (missing, widened, ...)
    pub tags: CapabilitySet,
    /// Additional labeled spans
    pub labels: Vec<Label>,
    /// Additional notes or hints
    pub notes: Vec<String>,
}

/// Category of check error.
///
/// # Invariant
///
/// The discriminant values must match the ERROR_KIND_NAMES array indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum ErrorKind {
    // Table construction
    /// Two declarations (or classes) claim the same identity
    DuplicateDeclaration = 0,
    /// Annotation names a tag the lattice does not define
    UnknownCapability = 1,
    /// Reference to an undeclared class
    UnknownClass = 2,
    /// Reference to an undeclared function, method or parameter
    UnknownDeclaration = 3,
    /// Inheritance edges form a cycle
    CyclicInheritance = 4,

    // Override checking
    /// Override declares a less restrictive context than its ancestor
    WidenedContext = 5,
    /// Override declares a wider parameter mutability than its ancestor
    WidenedParameterCapability = 6,

    // Context resolution
    /// Symbolic context names an abstract member with no value on this path
    UnresolvableContext = 7,

    // Call-site checking
    /// Callee requires capabilities the caller does not have
    InsufficientCapability = 8,
    /// Dynamic callee's upper bound exceeds the caller's capabilities
    UnresolvedDynamicCapability = 9,

    // Lattice
    /// Tags from different families were compared (lattice defect)
    IncomparableCapabilities = 10,
}

/// Human-readable names for error kinds.
///
/// Index matches ErrorKind discriminant.
const ERROR_KIND_NAMES: &[&str] = &[
    "duplicate declaration",          // 0: DuplicateDeclaration
    "unknown capability",             // 1: UnknownCapability
    "unknown class",                  // 2: UnknownClass
    "unknown declaration",            // 3: UnknownDeclaration
    "cyclic inheritance",             // 4: CyclicInheritance
    "widened context",                // 5: WidenedContext
    "widened parameter capability",   // 6: WidenedParameterCapability
    "unresolvable context",           // 7: UnresolvableContext
    "insufficient capability",        // 8: InsufficientCapability
    "unresolved dynamic capability",  // 9: UnresolvedDynamicCapability
    "incomparable capabilities",      // 10: IncomparableCapabilities
];

/// Diagnostic severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Warning (program is valid but suspicious)
    Warning,
    /// Error (check fails)
    Error,
}

/// Secondary labeled span in a diagnostic.
///
/// Used to point to related code locations (e.g., "overridden declaration here").
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Label {
    /// Source location
    pub span: Span,
    /// Label text
    pub message: String,
}

impl CheckError {
    /// Creates a new error diagnostic.
    ///
    /// # Parameters
    ///
    /// * `kind` - Error category
    /// * `span` - Primary source location
    /// * `subject` - Declaration or call site the error is about
    /// * `message` - Human-readable error message
    ///
    /// # Returns
    ///
    /// A new error with severity `Error`, no tags, labels or notes.
    pub fn new(kind: ErrorKind, span: Span, subject: impl Into<String>, message: String) -> Self {
        Self::with_severity(kind, Severity::Error, span, subject.into(), message)
    }

    /// Creates a new warning diagnostic.
    pub fn warning(
        kind: ErrorKind,
        span: Span,
        subject: impl Into<String>,
        message: String,
    ) -> Self {
        Self::with_severity(kind, Severity::Warning, span, subject.into(), message)
    }

    /// Internal constructor with explicit severity.
    fn with_severity(
        kind: ErrorKind,
        severity: Severity,
        span: Span,
        subject: String,
        message: String,
    ) -> Self {
        Self {
            kind,
            severity,
            span,
            subject,
            message,
            tags: CapabilitySet::empty(),
            labels: Vec::new(),
            notes: Vec::new(),
        }
    }

    /// Records the capability tags involved.
    pub fn with_tags(mut self, tags: CapabilitySet) -> Self {
        self.tags = tags;
        self
    }

    /// Adds a secondary labeled span.
    ///
    /// # Returns
    ///
    /// Self (for chaining).
    pub fn with_label(mut self, span: Span, message: String) -> Self {
        self.labels.push(Label { span, message });
        self
    }

    /// Adds a note or hint.
    ///
    /// # Returns
    ///
    /// Self (for chaining).
    pub fn with_note(mut self, note: String) -> Self {
        self.notes.push(note);
        self
    }

    /// Check whether this error must stop the pipeline.
    pub fn is_fatal(&self) -> bool {
        self.kind == ErrorKind::IncomparableCapabilities
    }

    /// Check whether this diagnostic fails the check.
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl ErrorKind {
    /// Returns a human-readable name for this error kind.
    pub fn name(self) -> &'static str {
        ERROR_KIND_NAMES[self as usize]
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

impl fmt::Display for CheckError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {}: {}: {}",
            self.severity,
            self.kind.name(),
            self.subject,
            self.message
        )
    }
}

impl std::error::Error for CheckError {}

/// Formats diagnostics with source locations.
///
/// # Examples
///
/// ```
/// # use coeffects_check::error::*;
/// # use coeffects_foundation::{SourceMap, Span};
/// # use std::path::PathBuf;
/// let mut sources = SourceMap::new();
/// let file_id = sources.add_file(PathBuf::from("cc-this.php"));
///
/// let error = CheckError::new(
///     ErrorKind::WidenedContext,
///     Span::new(file_id, 4, 3),
///     "B::f",
///     "context [defaults] is wider than [] declared by A::f".to_string(),
/// );
///
/// let formatter = DiagnosticFormatter::new(&sources);
/// assert!(formatter.format(&error).contains("cc-this.php:4:3"));
/// ```
pub struct DiagnosticFormatter<'a> {
    sources: &'a SourceMap,
}

impl<'a> DiagnosticFormatter<'a> {
    /// Creates a new diagnostic formatter.
    pub fn new(sources: &'a SourceMap) -> Self {
        Self { sources }
    }

    /// Formats a diagnostic as a string with location, tags and labels.
    pub fn format(&self, error: &CheckError) -> String {
        let mut output = String::new();

        // Header: severity and message
        output.push_str(&format!(
            "{}: {}: {}\n",
            error.severity,
            error.kind.name(),
            error.message
        ));

        // Location
        output.push_str(&format!(
            "  --> {} ({})\n",
            self.sources.describe(&error.span),
            error.subject
        ));

        if !error.tags.is_empty() {
            output.push_str(&format!("   = capabilities: {}\n", error.tags));
        }

        // Secondary labels
        for label in &error.labels {
            output.push_str(&format!("   = note: {}\n", label.message));
            output.push_str(&format!("     at {}\n", self.sources.describe(&label.span)));
        }

        // Notes
        for note in &error.notes {
            output.push_str(&format!("   = help: {}\n", note));
        }

        output
    }

    /// Formats multiple diagnostics separated by blank lines.
    pub fn format_all(&self, errors: &[CheckError]) -> String {
        errors
            .iter()
            .map(|e| self.format(e))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coeffects_foundation::CapabilityTag;
    use std::path::PathBuf;

    fn dummy_span() -> Span {
        Span::new(0, 1, 1)
    }

    fn test_sources() -> SourceMap {
        let mut sources = SourceMap::new();
        sources.add_file(PathBuf::from("test.php"));
        sources
    }

    #[test]
    fn test_error_creation() {
        let err = CheckError::new(
            ErrorKind::DuplicateDeclaration,
            dummy_span(),
            "A::f",
            "duplicate declaration of A::f".to_string(),
        );

        assert_eq!(err.kind, ErrorKind::DuplicateDeclaration);
        assert_eq!(err.severity, Severity::Error);
        assert_eq!(err.subject, "A::f");
        assert!(err.tags.is_empty());
        assert!(err.labels.is_empty());
        assert!(err.notes.is_empty());
    }

    #[test]
    fn test_warning_creation() {
        let warn = CheckError::warning(
            ErrorKind::UnknownCapability,
            dummy_span(),
            "g",
            "unknown capability 'lol'".to_string(),
        );
        assert_eq!(warn.severity, Severity::Warning);
        assert!(!warn.is_error());
    }

    #[test]
    fn test_error_chaining() {
        let err = CheckError::new(
            ErrorKind::WidenedContext,
            dummy_span(),
            "B::f",
            "widened".to_string(),
        )
        .with_label(dummy_span(), "overrides A::f".to_string())
        .with_note("declare [] or narrower".to_string())
        .with_tags(CapabilitySet::single(CapabilityTag::Defaults));

        assert_eq!(err.labels.len(), 1);
        assert_eq!(err.notes.len(), 1);
        assert!(err.tags.contains(CapabilityTag::Defaults));
    }

    #[test]
    fn test_only_incomparable_is_fatal() {
        let fatal = CheckError::new(
            ErrorKind::IncomparableCapabilities,
            dummy_span(),
            "f",
            String::new(),
        );
        assert!(fatal.is_fatal());

        let recoverable =
            CheckError::new(ErrorKind::InsufficientCapability, dummy_span(), "f", String::new());
        assert!(!recoverable.is_fatal());
    }

    #[test]
    fn test_severity_is_warning_or_error() {
        let warning = CheckError::warning(
            ErrorKind::UnknownCapability,
            dummy_span(),
            "f",
            "unknown capability 'lol'".to_string(),
        );
        assert!(!warning.is_error());
        assert!(Severity::Warning < Severity::Error);
        assert_eq!(
            serde_json::to_value(warning.severity).unwrap(),
            serde_json::json!("warning")
        );
    }

    #[test]
    fn test_all_error_kinds_have_names() {
        let kinds = [
            ErrorKind::DuplicateDeclaration,
            ErrorKind::UnknownCapability,
            ErrorKind::UnknownClass,
            ErrorKind::UnknownDeclaration,
            ErrorKind::CyclicInheritance,
            ErrorKind::WidenedContext,
            ErrorKind::WidenedParameterCapability,
            ErrorKind::UnresolvableContext,
            ErrorKind::InsufficientCapability,
            ErrorKind::UnresolvedDynamicCapability,
            ErrorKind::IncomparableCapabilities,
        ];
        assert_eq!(kinds.len(), ERROR_KIND_NAMES.len());
        for kind in kinds {
            assert!(!kind.name().is_empty());
        }
        assert_eq!(ErrorKind::WidenedContext.name(), "widened context");
    }

    #[test]
    fn test_error_display() {
        let err = CheckError::new(
            ErrorKind::InsufficientCapability,
            dummy_span(),
            "pure",
            "call to A::f requires [rx]".to_string(),
        );
        let display = format!("{}", err);
        assert!(display.contains("error"));
        assert!(display.contains("insufficient capability"));
        assert!(display.contains("pure"));
    }

    #[test]
    fn test_formatter_with_label_and_tags() {
        let sources = test_sources();
        let error = CheckError::new(
            ErrorKind::WidenedContext,
            Span::new(0, 9, 3),
            "B::f",
            "context widened".to_string(),
        )
        .with_tags(CapabilitySet::single(CapabilityTag::Defaults))
        .with_label(Span::new(0, 4, 3), "overrides A::f".to_string());

        let formatted = DiagnosticFormatter::new(&sources).format(&error);
        assert!(formatted.contains("test.php:9:3"));
        assert!(formatted.contains("capabilities: [defaults]"));
        assert!(formatted.contains("overrides A::f"));
        assert!(formatted.contains("test.php:4:3"));
    }

    #[test]
    fn test_formatter_multiple_errors() {
        let sources = test_sources();
        let errors = vec![
            CheckError::new(ErrorKind::UnknownClass, dummy_span(), "B", "one".to_string()),
            CheckError::new(ErrorKind::UnknownClass, dummy_span(), "C", "two".to_string()),
        ];
        let formatted = DiagnosticFormatter::new(&sources).format_all(&errors);
        assert!(formatted.contains("one"));
        assert!(formatted.contains("two"));
    }

    #[test]
    fn test_serialize_kind_snake_case() {
        let err = CheckError::new(
            ErrorKind::WidenedParameterCapability,
            dummy_span(),
            "B::f",
            String::new(),
        );
        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains("\"widened_parameter_capability\""));
    }
}
