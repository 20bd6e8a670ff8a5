use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::ast::{SchemaNode, TableNode};
use crate::error::Result;
use crate::graph::build_fk_graph_report;
use crate::types::TypeRegistry;
use crate::value::Value;

use super::compile::{compile_field, compile_table};
use super::context::{
    EvaluationContext, ExpressionEvaluator, KeySet, Record, ValidatorRegistry,
};
use super::engine::{ConstraintSet, EvaluationReport};
use super::references::InMemoryReferences;
use super::Severity;

/// A violated constraint located in a dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetViolation {
    pub table: String,
    pub row: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    pub constraint: String,
    pub kind: String,
    pub severity: Severity,
    pub message: String,
}

/// A constraint that could not be evaluated for a dataset row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetFailure {
    pub table: String,
    pub row: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    pub constraint: String,
    pub kind: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatasetReport {
    pub tables_checked: usize,
    pub rows_checked: usize,
    pub violations: Vec<DatasetViolation>,
    pub failures: Vec<DatasetFailure>,
    /// Tables present in the data but not declared in the schema.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unknown_tables: Vec<String>,
}

impl DatasetReport {
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty() && self.failures.is_empty()
    }

    pub fn error_count(&self) -> usize {
        self.violations
            .iter()
            .filter(|violation| violation.severity == Severity::Error)
            .count()
    }

    fn absorb(&mut self, table: &str, row: usize, report: EvaluationReport) {
        for violation in report.violations {
            self.violations.push(DatasetViolation {
                table: table.to_string(),
                row,
                field: violation.field,
                constraint: violation.constraint.name.clone(),
                kind: violation.constraint.kind.name().to_string(),
                severity: violation.severity,
                message: violation.message,
            });
        }
        for failure in report.failures {
            self.failures.push(DatasetFailure {
                table: table.to_string(),
                row,
                field: failure.field,
                constraint: failure.constraint,
                kind: failure.kind.to_string(),
                reason: failure.error.to_string(),
            });
        }
    }
}

struct CompiledTable<'s> {
    node: &'s TableNode,
    fields: Vec<(&'s str, ConstraintSet)>,
    table: ConstraintSet,
}

impl CompiledTable<'_> {
    /// Key field lists to record after each row, by constraint.
    fn key_fields(&self) -> Vec<Vec<String>> {
        let mut keys: Vec<Vec<String>> = Vec::new();
        let field_keys = self.fields.iter().flat_map(|(field, set)| {
            set.iter()
                .filter(|constraint| constraint.enabled)
                .filter_map(move |constraint| constraint.key_fields(Some(*field)))
        });
        let table_keys = self
            .table
            .iter()
            .filter(|constraint| constraint.enabled)
            .filter_map(|constraint| constraint.key_fields(None));
        for fields in field_keys.chain(table_keys) {
            if !keys.contains(&fields) {
                keys.push(fields);
            }
        }
        keys
    }
}

/// Checks a generated dataset against a schema's constraints.
pub struct DatasetChecker<'a> {
    schema: &'a SchemaNode,
    registry: &'a TypeRegistry,
    expressions: Option<&'a dyn ExpressionEvaluator>,
    validators: Option<&'a ValidatorRegistry>,
}

impl<'a> DatasetChecker<'a> {
    pub fn new(schema: &'a SchemaNode, registry: &'a TypeRegistry) -> Self {
        Self {
            schema,
            registry,
            expressions: None,
            validators: None,
        }
    }

    pub fn with_expressions(mut self, expressions: &'a dyn ExpressionEvaluator) -> Self {
        self.expressions = Some(expressions);
        self
    }

    pub fn with_validators(mut self, validators: &'a ValidatorRegistry) -> Self {
        self.validators = Some(validators);
        self
    }

    /// Evaluate every row of `data` (table name to rows), parents before children.
    pub fn check(&self, data: &BTreeMap<String, Vec<Record>>) -> Result<DatasetReport> {
        let graph = build_fk_graph_report(self.schema);
        if let Some(cycle) = &graph.cycle {
            warn!(tables = ?cycle, "foreign key cycle; checking in declaration order");
        }
        let order = graph.order_or_declared(self.schema);

        let mut references = InMemoryReferences::new();
        for (table, rows) in data {
            references.ingest_table(table, rows.iter().cloned());
        }

        let mut report = DatasetReport {
            unknown_tables: data
                .keys()
                .filter(|table| self.schema.table(table).is_none())
                .cloned()
                .collect(),
            ..DatasetReport::default()
        };
        for table in &report.unknown_tables {
            warn!(table = %table, "rows for undeclared table ignored");
        }

        info!(tables = order.len(), "dataset check started");
        for table_name in &order {
            let Some(node) = self.schema.table(table_name) else {
                continue;
            };
            let compiled = self.compile(node)?;
            let rows = data.get(table_name).map(Vec::as_slice).unwrap_or_default();
            self.check_table(&compiled, rows, &references, &mut report);
            report.tables_checked += 1;
        }
        info!(
            rows = report.rows_checked,
            violations = report.violations.len(),
            failures = report.failures.len(),
            "dataset check finished"
        );
        Ok(report)
    }

    fn compile<'s>(&self, node: &'s TableNode) -> Result<CompiledTable<'s>> {
        let fields = node
            .fields
            .iter()
            .map(|field| Ok((field.name.as_str(), compile_field(self.registry, field)?)))
            .collect::<Result<Vec<_>>>()?;
        Ok(CompiledTable {
            node,
            fields,
            table: compile_table(node)?,
        })
    }

    fn check_table(
        &self,
        compiled: &CompiledTable<'_>,
        rows: &[Record],
        references: &InMemoryReferences,
        report: &mut DatasetReport,
    ) {
        let table = compiled.node.name.as_str();
        let key_fields = compiled.key_fields();
        let mut keys = KeySet::new();
        debug!(table = %table, rows = rows.len(), "checking table");

        for (index, row) in rows.iter().enumerate() {
            let mut base = EvaluationContext::new()
                .with_record(row)
                .with_existing_keys(&keys)
                .with_references(references);
            base.expressions = self.expressions;
            base.validators = self.validators;

            for (field, set) in &compiled.fields {
                let value = row.get(*field).cloned().unwrap_or(Value::Null);
                let ctx = base.with_field(field);
                report.absorb(table, index, set.evaluate(&value, &ctx));
            }
            report.absorb(table, index, compiled.table.evaluate(&Value::Null, &base));

            for fields in &key_fields {
                keys.insert_from_record(fields, row);
            }
            report.rows_checked += 1;
        }
    }
}
