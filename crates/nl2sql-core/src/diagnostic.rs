//! Validation findings and error kinds
//!
//! IMPORTANT: Error-kind codes are versioned and stable.
//! NEVER rename or remove codes - front-ends match on them.
//! Add new codes with new names only.

use serde::{Deserialize, Serialize};

/// Error-kind registry (v1)
///
/// These codes are STABLE and VERSIONED.
/// Do NOT rename or remove codes - only add new ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    // Schema construction
    /// A foreign key points at a table missing from the snapshot
    DanglingForeignKey,

    // Parse time
    /// SQL text could not be parsed into the supported subset
    SyntaxError,

    // Validation time
    /// Statement is not a read-only query
    ForbiddenStatement,

    /// Table reference outside the allowlist
    UnknownTable,

    /// Column does not exist on the referenced table
    UnknownColumn,

    /// Unqualified column with more than one candidate source
    AmbiguousColumn,

    // Warnings
    /// `*` or `t.*` projection
    WildcardProjection,
}

impl ErrorKind {
    /// Get the error kind as a stable string identifier
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DanglingForeignKey => "DANGLING_FOREIGN_KEY",
            Self::SyntaxError => "SYNTAX_ERROR",
            Self::ForbiddenStatement => "FORBIDDEN_STATEMENT",
            Self::UnknownTable => "UNKNOWN_TABLE",
            Self::UnknownColumn => "UNKNOWN_COLUMN",
            Self::AmbiguousColumn => "AMBIGUOUS_COLUMN",
            Self::WildcardProjection => "WILDCARD_PROJECTION",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Finding severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Non-fatal, shown next to accepted SQL
    Warn,

    /// Blocks acceptance
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// A single finding produced while parsing or validating SQL
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Stable error kind
    pub kind: ErrorKind,

    /// Severity level
    pub severity: Severity,

    /// Machine-oriented detail, e.g. the offending table or column name
    pub detail: String,

    /// Human-readable message
    pub message: String,
}

impl Diagnostic {
    /// Create a blocking finding
    pub fn error(kind: ErrorKind, detail: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity: Severity::Error,
            detail: detail.into(),
            message: message.into(),
        }
    }

    /// Create a non-fatal finding
    pub fn warning(kind: ErrorKind, detail: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity: Severity::Warn,
            detail: detail.into(),
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}: {}", self.severity, self.kind, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kind_stability() {
        // Front-ends match on these strings
        assert_eq!(ErrorKind::ForbiddenStatement.as_str(), "FORBIDDEN_STATEMENT");
        assert_eq!(ErrorKind::UnknownTable.as_str(), "UNKNOWN_TABLE");
        assert_eq!(ErrorKind::DanglingForeignKey.as_str(), "DANGLING_FOREIGN_KEY");
    }

    #[test]
    fn diagnostic_serialization() {
        let diag = Diagnostic::error(
            ErrorKind::UnknownTable,
            "public.secret_table",
            "Table 'public.secret_table' is not in the allowlist",
        );

        let json = serde_json::to_string(&diag).unwrap();
        assert!(json.contains("UNKNOWN_TABLE"));
        assert!(json.contains("error"));
        assert!(diag.is_error());
    }

    #[test]
    fn warning_display() {
        let diag = Diagnostic::warning(ErrorKind::WildcardProjection, "*", "SELECT * is discouraged");
        assert_eq!(diag.to_string(), "[warn] WILDCARD_PROJECTION: SELECT * is discouraged");
    }
}
