use std::fmt;

use serde::{Deserialize, Serialize};
use testdatagen_core::{Position, Severity};
use thiserror::Error;

/// Which layer raised a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticCategory {
    /// Structural and type errors found by the analyzer and type checker.
    Semantic,
    /// Policy findings raised by the validator.
    Validation,
}

impl DiagnosticCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticCategory::Semantic => "semantic",
            DiagnosticCategory::Validation => "validation",
        }
    }
}

impl fmt::Display for DiagnosticCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Closed set of diagnostic causes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticCode {
    UnknownBaseType,
    DuplicateTypeName,
    DuplicateTableName,
    DuplicateFieldName,
    CircularTypeReference,
    ConstraintTypeIncompatible,
    UnknownDataType,
    InvalidConstraint,
    MissingTables,
    MissingFields,
    MissingPrimaryKey,
    ConflictingConstraints,
    RedundantCustomType,
    ConstraintConflictWithCustomType,
}

impl DiagnosticCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticCode::UnknownBaseType => "unknown_base_type",
            DiagnosticCode::DuplicateTypeName => "duplicate_type_name",
            DiagnosticCode::DuplicateTableName => "duplicate_table_name",
            DiagnosticCode::DuplicateFieldName => "duplicate_field_name",
            DiagnosticCode::CircularTypeReference => "circular_type_reference",
            DiagnosticCode::ConstraintTypeIncompatible => "constraint_type_incompatible",
            DiagnosticCode::UnknownDataType => "unknown_data_type",
            DiagnosticCode::InvalidConstraint => "invalid_constraint",
            DiagnosticCode::MissingTables => "missing_tables",
            DiagnosticCode::MissingFields => "missing_fields",
            DiagnosticCode::MissingPrimaryKey => "missing_primary_key",
            DiagnosticCode::ConflictingConstraints => "conflicting_constraints",
            DiagnosticCode::RedundantCustomType => "redundant_custom_type",
            DiagnosticCode::ConstraintConflictWithCustomType => {
                "constraint_conflict_with_custom_type"
            }
        }
    }

    pub fn category(&self) -> DiagnosticCategory {
        match self {
            DiagnosticCode::MissingTables
            | DiagnosticCode::MissingFields
            | DiagnosticCode::MissingPrimaryKey
            | DiagnosticCode::ConflictingConstraints
            | DiagnosticCode::RedundantCustomType
            | DiagnosticCode::ConstraintConflictWithCustomType => DiagnosticCategory::Validation,
            _ => DiagnosticCategory::Semantic,
        }
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A reported finding tied to a source position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub code: DiagnosticCode,
    pub message: String,
    pub line: u32,
    pub column: u32,
    pub severity: Severity,
}

impl Diagnostic {
    pub fn new(
        severity: Severity,
        code: DiagnosticCode,
        position: Position,
        message: impl Into<String>,
    ) -> Self {
        Self {
            code,
            message: message.into(),
            line: position.line,
            column: position.column,
            severity,
        }
    }

    pub fn error(code: DiagnosticCode, position: Position, message: impl Into<String>) -> Self {
        Self::new(Severity::Error, code, position, message)
    }

    pub fn warning(code: DiagnosticCode, position: Position, message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, code, position, message)
    }

    pub fn position(&self) -> Position {
        Position::new(self.line, self.column)
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    pub fn category(&self) -> DiagnosticCategory {
        self.code.category()
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}: {}[{}]: {}",
            self.line, self.column, self.severity, self.code, self.message
        )
    }
}

/// True when any diagnostic has error severity.
pub fn has_errors(diagnostics: &[Diagnostic]) -> bool {
    diagnostics.iter().any(Diagnostic::is_error)
}

/// Errors returned to callers that need a schema free of error diagnostics.
#[derive(Debug, Error)]
pub enum SemanticError {
    #[error("schema '{schema}' rejected with {} error diagnostic(s)", errors.len())]
    Rejected {
        schema: String,
        errors: Vec<Diagnostic>,
        warnings: Vec<Diagnostic>,
    },
}

/// Result type for semantic operations.
pub type Result<T> = std::result::Result<T, SemanticError>;
