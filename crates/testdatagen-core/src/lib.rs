//! Core contracts for the testdatagen toolchain.
//!
//! This crate defines the schema AST consumed from the parser, the type model
//! and its registry, and the constraint engine shared by the semantic layer,
//! the generation engine, and the CLI.

pub mod ast;
pub mod constraints;
pub mod error;
pub mod graph;
pub mod types;
pub mod value;

pub use ast::{ConstraintNode, FieldNode, Params, Position, SchemaNode, TableNode, TypeNode};
pub use constraints::{
    Constraint, ConstraintEvaluationError, ConstraintKind, ConstraintSet, ConstraintViolation,
    ContextSlot, DatasetChecker, DatasetFailure, DatasetReport, DatasetViolation,
    EvaluationContext, EvaluationFailure, EvaluationReport, ExpressionEvaluator, Family,
    InMemoryReferences, KeySet, NamedValidator, Outcome, Record, ReferenceResolver,
    ReferentialAction, Severity, ValidatorRegistry, compile_field, compile_table,
};
pub use error::{ConstraintBuildError, Error, Result};
pub use graph::{FkGraphReport, FkGraphSummary, build_fk_graph_report};
pub use types::{
    ArrayType, CompositeKind, CompositeType, ConstraintDescriptor, CustomType, EnumType, EnumValue,
    ObjectField, ObjectType, PrimitiveKind, PrimitiveType, Type, TypeCategory, TypeRegistry,
    check_constraint_compat, find_base_cycle,
};
pub use value::Value;

/// Contract version for AST documents handed over by the parser.
pub const AST_VERSION: &str = "0.1";
