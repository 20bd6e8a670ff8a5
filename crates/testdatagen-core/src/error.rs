use thiserror::Error;

/// Core error type shared across testdatagen crates.
#[derive(Debug, Error)]
pub enum Error {
    /// A type with the same name is already registered.
    #[error("type '{0}' is already registered")]
    DuplicateType(String),
    /// A custom type references a base type the registry does not know.
    #[error("unknown base type '{base}' for custom type '{type_name}'")]
    UnknownBaseType { type_name: String, base: String },
    /// A constraint descriptor could not be compiled.
    #[error("invalid constraint '{name}': {source}")]
    InvalidConstraint {
        name: String,
        #[source]
        source: ConstraintBuildError,
    },
    /// The schema violates internal invariants.
    #[error("invalid schema: {0}")]
    InvalidSchema(String),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors raised while compiling a constraint descriptor into an engine constraint.
#[derive(Debug, Error)]
pub enum ConstraintBuildError {
    #[error("unknown constraint kind '{0}'")]
    UnknownKind(String),
    #[error("missing parameter '{0}'")]
    MissingParameter(&'static str),
    #[error("invalid parameter '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },
    #[error("invalid pattern: {0}")]
    InvalidPattern(#[from] regex::Error),
    #[error("invalid date '{value}' for format '{format}'")]
    InvalidDate { value: String, format: String },
}

/// Convenience alias for results returned by testdatagen crates.
pub type Result<T> = std::result::Result<T, Error>;
