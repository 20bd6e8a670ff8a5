use std::collections::BTreeSet;

use testdatagen_core::{
    Constraint, ConstraintBuildError, ConstraintNode, FieldNode, SchemaNode, TableNode, Type,
    TypeNode, TypeRegistry, check_constraint_compat,
};
use tracing::debug;

use crate::errors::{Diagnostic, DiagnosticCode};
use crate::resolve::{ChainEnd, DeclaredTypes};

/// Structural checks over a schema: duplicate names, unresolved types,
/// circular custom types, and constraint/base-type compatibility.
pub struct TypeChecker<'a> {
    types: DeclaredTypes<'a>,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> TypeChecker<'a> {
    pub fn new(schema: &'a SchemaNode, registry: &'a TypeRegistry) -> Self {
        Self {
            types: DeclaredTypes::new(schema, registry),
            diagnostics: Vec::new(),
        }
    }

    /// Check a whole schema and return the collected diagnostics.
    pub fn check(schema: &'a SchemaNode, registry: &'a TypeRegistry) -> Vec<Diagnostic> {
        let mut checker = Self::new(schema, registry);
        checker.check_schema(schema);
        checker.into_diagnostics()
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }

    pub fn check_schema(&mut self, schema: &'a SchemaNode) {
        let mut seen_types = BTreeSet::new();
        for node in &schema.types {
            if !seen_types.insert(node.name.as_str()) {
                self.diagnostics.push(Diagnostic::error(
                    DiagnosticCode::DuplicateTypeName,
                    node.position(),
                    format!("type '{}' is declared more than once", node.name),
                ));
                continue;
            }
            self.check_type(node);
        }

        let mut seen_tables = BTreeSet::new();
        for table in &schema.tables {
            if !seen_tables.insert(table.name.as_str()) {
                self.diagnostics.push(Diagnostic::error(
                    DiagnosticCode::DuplicateTableName,
                    table.position(),
                    format!("table '{}' is declared more than once", table.name),
                ));
                continue;
            }
            self.check_table(table);
        }
        debug!(
            schema = %schema.name,
            diagnostics = self.diagnostics.len(),
            "type check finished"
        );
    }

    pub fn check_type(&mut self, node: &'a TypeNode) {
        if !self.types.knows(&node.base_type) {
            self.diagnostics.push(Diagnostic::error(
                DiagnosticCode::UnknownBaseType,
                node.position(),
                format!(
                    "unknown base type '{}' for custom type '{}'",
                    node.base_type, node.name
                ),
            ));
            return;
        }

        if let Some(chain) = self.types.find_cycle(node) {
            self.diagnostics.push(Diagnostic::error(
                DiagnosticCode::CircularTypeReference,
                node.position(),
                format!(
                    "circular type reference for '{}': {}",
                    node.name,
                    chain.join(" -> ")
                ),
            ));
            return;
        }

        match self.types.chain_end(&node.base_type) {
            ChainEnd::Root(root) => {
                for constraint in &node.constraints {
                    self.check_constraint(constraint, "type", &node.name, root);
                }
            }
            ChainEnd::UnknownBase { custom, base } => {
                self.diagnostics.push(Diagnostic::error(
                    DiagnosticCode::UnknownBaseType,
                    node.position(),
                    format!(
                        "base type '{}' of custom type '{}' cannot be resolved: unknown base type '{base}' for '{custom}'",
                        node.base_type, node.name
                    ),
                ));
            }
            ChainEnd::Cycle | ChainEnd::Unknown => {}
        }
    }

    pub fn check_table(&mut self, table: &'a TableNode) {
        let mut seen_fields = BTreeSet::new();
        for field in &table.fields {
            if !seen_fields.insert(field.name.as_str()) {
                self.diagnostics.push(Diagnostic::error(
                    DiagnosticCode::DuplicateFieldName,
                    field.position(),
                    format!(
                        "field '{}' is declared more than once in table '{}'",
                        field.name, table.name
                    ),
                ));
                continue;
            }
            self.check_field(field);
        }
        for constraint in &table.constraints {
            self.check_constraint_parameters(constraint);
        }
    }

    pub fn check_field(&mut self, field: &'a FieldNode) {
        match self.types.chain_end(&field.data_type) {
            ChainEnd::Unknown => {
                self.diagnostics.push(Diagnostic::error(
                    DiagnosticCode::UnknownDataType,
                    field.position(),
                    format!(
                        "unknown data type '{}' for field '{}'",
                        field.data_type, field.name
                    ),
                ));
            }
            ChainEnd::UnknownBase { custom, base } => {
                self.diagnostics.push(Diagnostic::error(
                    DiagnosticCode::UnknownBaseType,
                    field.position(),
                    format!(
                        "field '{}' uses type '{}' whose base chain is broken: unknown base type '{base}' for '{custom}'",
                        field.name, field.data_type
                    ),
                ));
            }
            ChainEnd::Cycle => {}
            ChainEnd::Root(root) => {
                for constraint in &field.constraints {
                    self.check_constraint(constraint, "field", &field.name, root);
                }
            }
        }
    }

    /// Compatibility of a constraint with the resolved root of its owner.
    fn check_constraint(
        &mut self,
        constraint: &ConstraintNode,
        owner: &str,
        owner_name: &str,
        root: &Type,
    ) {
        if let Err(permitted) = check_constraint_compat(&constraint.constraint_type, root) {
            self.diagnostics.push(Diagnostic::error(
                DiagnosticCode::ConstraintTypeIncompatible,
                constraint.position(),
                format!(
                    "constraint '{}' on {owner} '{owner_name}' requires base type {permitted}, but the actual base type is '{}'",
                    constraint.constraint_type,
                    root.name()
                ),
            ));
            return;
        }
        self.check_constraint_parameters(constraint);
    }

    /// Parameters of known constraint kinds must compile; unknown kinds are left to
    /// downstream consumers.
    fn check_constraint_parameters(&mut self, constraint: &ConstraintNode) {
        match Constraint::from_node(constraint) {
            Ok(_) | Err(ConstraintBuildError::UnknownKind(_)) => {}
            Err(err) => self.diagnostics.push(Diagnostic::error(
                DiagnosticCode::InvalidConstraint,
                constraint.position(),
                format!(
                    "constraint '{}' ({}) is invalid: {err}",
                    constraint.name, constraint.constraint_type
                ),
            )),
        }
    }
}
