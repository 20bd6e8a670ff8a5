use std::collections::BTreeSet;

use testdatagen_core::{
    FieldNode, SchemaNode, TableNode, TypeNode, TypeRegistry, check_constraint_compat,
};
use tracing::{debug, info};

use crate::analyzer::SemanticAnalyzer;
use crate::errors::{Diagnostic, DiagnosticCode, Result, SemanticError, has_errors};
use crate::resolve::{ChainEnd, DeclaredTypes};

const PRIMARY_KEY: &str = "primary_key";

/// Policy layer above the analyzer.
#[derive(Debug, Clone, Default)]
pub struct Validator {
    analyzer: SemanticAnalyzer,
}

impl Validator {
    pub fn new(analyzer: SemanticAnalyzer) -> Self {
        Self { analyzer }
    }

    pub fn with_registry(registry: TypeRegistry) -> Self {
        Self::new(SemanticAnalyzer::new(registry))
    }

    pub fn analyzer(&self) -> &SemanticAnalyzer {
        &self.analyzer
    }

    pub fn analyzer_mut(&mut self) -> &mut SemanticAnalyzer {
        &mut self.analyzer
    }

    pub fn registry(&self) -> &TypeRegistry {
        self.analyzer.registry()
    }

    pub fn into_analyzer(self) -> SemanticAnalyzer {
        self.analyzer
    }

    /// Analyze, then apply policy rules when analysis found nothing.
    pub fn validate(&mut self, schema: &SchemaNode) -> Vec<Diagnostic> {
        let diagnostics = self.analyzer.analyze(schema);
        if !diagnostics.is_empty() {
            debug!(
                schema = %schema.name,
                diagnostics = diagnostics.len(),
                "policy checks skipped after analysis diagnostics"
            );
            return diagnostics;
        }
        let diagnostics = self.validate_policies(schema);
        info!(
            schema = %schema.name,
            diagnostics = diagnostics.len(),
            "schema validated"
        );
        diagnostics
    }

    /// Validate and fail when any diagnostic is an error; warnings are returned.
    pub fn require_valid(&mut self, schema: &SchemaNode) -> Result<Vec<Diagnostic>> {
        let diagnostics = self.validate(schema);
        if !has_errors(&diagnostics) {
            return Ok(diagnostics);
        }
        let (errors, warnings): (Vec<_>, Vec<_>) =
            diagnostics.into_iter().partition(Diagnostic::is_error);
        Err(SemanticError::Rejected {
            schema: schema.name.clone(),
            errors,
            warnings,
        })
    }

    /// Policy rules only, against the current registry.
    pub fn validate_policies(&self, schema: &SchemaNode) -> Vec<Diagnostic> {
        let types = DeclaredTypes::new(schema, self.analyzer.registry());
        let mut diagnostics = Vec::new();

        if schema.tables.is_empty() {
            diagnostics.push(Diagnostic::warning(
                DiagnosticCode::MissingTables,
                schema.position(),
                format!("schema '{}' declares no tables", schema.name),
            ));
        }
        for node in &schema.types {
            validate_type(&types, node, &mut diagnostics);
        }
        for table in &schema.tables {
            validate_table(&types, table, &mut diagnostics);
        }
        diagnostics
    }
}

fn validate_type<'a>(
    types: &DeclaredTypes<'a>,
    node: &'a TypeNode,
    diagnostics: &mut Vec<Diagnostic>,
) {
    if node.constraints.is_empty() {
        diagnostics.push(Diagnostic::warning(
            DiagnosticCode::RedundantCustomType,
            node.position(),
            format!(
                "custom type '{}' adds no constraints to '{}'",
                node.name, node.base_type
            ),
        ));
    }
    if !types.knows(&node.base_type) {
        diagnostics.push(Diagnostic::error(
            DiagnosticCode::UnknownBaseType,
            node.position(),
            format!(
                "unknown base type '{}' for custom type '{}'",
                node.base_type, node.name
            ),
        ));
        return;
    }
    if let Some(chain) = types.find_cycle(node) {
        diagnostics.push(Diagnostic::error(
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
    if let ChainEnd::Root(root) = types.chain_end(&node.base_type) {
        for constraint in &node.constraints {
            if let Err(permitted) = check_constraint_compat(&constraint.constraint_type, root) {
                diagnostics.push(Diagnostic::error(
                    DiagnosticCode::ConstraintTypeIncompatible,
                    constraint.position(),
                    format!(
                        "constraint '{}' on type '{}' requires base type {permitted}, but the actual base type is '{}'",
                        constraint.constraint_type,
                        node.name,
                        root.name()
                    ),
                ));
            }
        }
    }
}

fn validate_table<'a>(
    types: &DeclaredTypes<'a>,
    table: &'a TableNode,
    diagnostics: &mut Vec<Diagnostic>,
) {
    if table.fields.is_empty() {
        diagnostics.push(Diagnostic::error(
            DiagnosticCode::MissingFields,
            table.position(),
            format!("table '{}' declares no fields", table.name),
        ));
        return;
    }
    if table.constraints_of_kind(PRIMARY_KEY).next().is_none() {
        diagnostics.push(Diagnostic::warning(
            DiagnosticCode::MissingPrimaryKey,
            table.position(),
            format!("table '{}' has no primary key", table.name),
        ));
    }
    for field in &table.fields {
        validate_field(types, field, diagnostics);
    }
}

fn validate_field<'a>(
    types: &DeclaredTypes<'a>,
    field: &'a FieldNode,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let inherited = types.chain_constraint_kinds(&field.data_type);
    let mut reported = BTreeSet::new();
    for constraint in &field.constraints {
        let kind = constraint.constraint_type.as_str();
        if inherited.contains(kind) && reported.insert(kind) {
            diagnostics.push(Diagnostic::warning(
                DiagnosticCode::ConstraintConflictWithCustomType,
                constraint.position(),
                format!(
                    "field '{}' redeclares a '{kind}' constraint already defined by type '{}'",
                    field.name, field.data_type
                ),
            ));
        }
    }

    let has = |kind: &str| {
        field
            .constraints
            .iter()
            .any(|constraint| constraint.constraint_type == kind)
    };
    if has("null") && has("not_null") {
        diagnostics.push(Diagnostic::error(
            DiagnosticCode::ConflictingConstraints,
            field.position(),
            format!(
                "field '{}' is declared both 'null' and 'not_null'",
                field.name
            ),
        ));
    }
}
