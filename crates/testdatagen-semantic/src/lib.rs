//! Semantic layer for testdatagen schemas.
//!
//! The [`SemanticAnalyzer`] registers custom types, binds symbols, and runs the
//! [`TypeChecker`]; the [`Validator`] adds schema policy rules on top. Both
//! report findings as [`Diagnostic`] values instead of failing.

mod analyzer;
mod checker;
mod errors;
mod resolve;
mod symbols;
mod validate;

pub use analyzer::{AnalysisSession, SemanticAnalyzer};
pub use checker::TypeChecker;
pub use errors::{
    Diagnostic, DiagnosticCategory, DiagnosticCode, Result, SemanticError, has_errors,
};
pub use symbols::{Scope, ScopeId, Symbol, SymbolKind, SymbolTable};
pub use validate::Validator;
