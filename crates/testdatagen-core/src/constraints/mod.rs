//! Constraint engine.
//!
//! Constraints form a closed set of variants grouped into value, business, and
//! relationship families. Each evaluates a value against an
//! [`EvaluationContext`] and yields an [`Outcome`]. A [`ConstraintSet`] drives
//! evaluation of many constraints and separates violations from evaluation
//! failures.

mod builder;
mod business;
mod compile;
mod context;
mod dataset;
mod engine;
mod outcome;
mod references;
mod relationship;
mod value;

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::ast::Params;
use crate::value::Value;

pub use compile::{compile_field, compile_table};
pub use context::{
    ContextSlot, EvaluationContext, ExpressionEvaluator, KeySet, NamedValidator, Record,
    ReferenceResolver, ValidatorRegistry,
};
pub use dataset::{DatasetChecker, DatasetFailure, DatasetReport, DatasetViolation};
pub use engine::{ConstraintSet, ConstraintViolation, EvaluationFailure, EvaluationReport};
pub use outcome::{ConstraintEvaluationError, Outcome};
pub use references::InMemoryReferences;

/// Diagnostic and violation severity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Error,
    Warning,
    Info,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "error" => Some(Severity::Error),
            "warning" | "warn" => Some(Severity::Warning),
            "info" => Some(Severity::Info),
            _ => None,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Constraint family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Family {
    Value,
    Business,
    Relationship,
}

/// Referential action on delete/update of a referenced row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferentialAction {
    #[default]
    NoAction,
    Restrict,
    Cascade,
    SetNull,
    SetDefault,
}

impl ReferentialAction {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_uppercase().replace('_', " ").as_str() {
            "NO ACTION" => Some(ReferentialAction::NoAction),
            "RESTRICT" => Some(ReferentialAction::Restrict),
            "CASCADE" => Some(ReferentialAction::Cascade),
            "SET NULL" => Some(ReferentialAction::SetNull),
            "SET DEFAULT" => Some(ReferentialAction::SetDefault),
            _ => None,
        }
    }
}

/// Variant-specific data of a constraint.
#[derive(Debug, Clone)]
pub enum ConstraintKind {
    Range {
        min: Option<f64>,
        max: Option<f64>,
        inclusive_min: bool,
        inclusive_max: bool,
    },
    Length {
        min: Option<usize>,
        max: Option<usize>,
    },
    /// Full-match pattern; `regex` is compiled from `source` anchored at both ends.
    Pattern {
        source: String,
        regex: Regex,
    },
    Enum(Vec<Value>),
    DateRange {
        min: Option<NaiveDate>,
        max: Option<NaiveDate>,
        format: String,
    },
    /// Unique value; with a scope, unique across the scoped fields of a record.
    Unique {
        scope: Option<Vec<String>>,
    },
    NotNull,
    Expression(String),
    Conditional {
        condition: String,
        then: Box<Constraint>,
        otherwise: Option<Box<Constraint>>,
    },
    Custom {
        validator: String,
        params: Params,
    },
    DependentField {
        fields: Vec<String>,
        expression: String,
    },
    ForeignKey {
        source_fields: Vec<String>,
        target_table: String,
        target_fields: Vec<String>,
        on_delete: ReferentialAction,
        on_update: ReferentialAction,
    },
    UniqueKey {
        fields: Vec<String>,
    },
    PrimaryKey {
        fields: Vec<String>,
    },
    Check(String),
}

impl ConstraintKind {
    /// DSL name of the kind, e.g. `range` or `primary_key`.
    pub fn name(&self) -> &'static str {
        match self {
            ConstraintKind::Range { .. } => "range",
            ConstraintKind::Length { .. } => "length",
            ConstraintKind::Pattern { .. } => "pattern",
            ConstraintKind::Enum(_) => "enum",
            ConstraintKind::DateRange { .. } => "date_range",
            ConstraintKind::Unique { .. } => "unique",
            ConstraintKind::NotNull => "not_null",
            ConstraintKind::Expression(_) => "expression",
            ConstraintKind::Conditional { .. } => "conditional",
            ConstraintKind::Custom { .. } => "custom",
            ConstraintKind::DependentField { .. } => "dependent_field",
            ConstraintKind::ForeignKey { .. } => "foreign_key",
            ConstraintKind::UniqueKey { .. } => "unique_key",
            ConstraintKind::PrimaryKey { .. } => "primary_key",
            ConstraintKind::Check(_) => "check",
        }
    }

    pub fn family(&self) -> Family {
        match self {
            ConstraintKind::Range { .. }
            | ConstraintKind::Length { .. }
            | ConstraintKind::Pattern { .. }
            | ConstraintKind::Enum(_)
            | ConstraintKind::DateRange { .. }
            | ConstraintKind::Unique { .. }
            | ConstraintKind::NotNull => Family::Value,
            ConstraintKind::Expression(_)
            | ConstraintKind::Conditional { .. }
            | ConstraintKind::Custom { .. }
            | ConstraintKind::DependentField { .. } => Family::Business,
            ConstraintKind::ForeignKey { .. }
            | ConstraintKind::UniqueKey { .. }
            | ConstraintKind::PrimaryKey { .. }
            | ConstraintKind::Check(_) => Family::Relationship,
        }
    }
}

/// A named rule with severity and metadata.
#[derive(Debug, Clone)]
pub struct Constraint {
    pub name: String,
    pub severity: Severity,
    pub enabled: bool,
    pub description: Option<String>,
    pub metadata: BTreeMap<String, serde_json::Value>,
    pub kind: ConstraintKind,
}

impl Constraint {
    pub fn new(name: impl Into<String>, kind: ConstraintKind) -> Self {
        Self {
            name: name.into(),
            severity: Severity::Error,
            enabled: true,
            description: None,
            metadata: BTreeMap::new(),
            kind,
        }
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn evaluate(&self, value: &Value, ctx: &EvaluationContext<'_>) -> Outcome {
        match &self.kind {
            ConstraintKind::Range {
                min,
                max,
                inclusive_min,
                inclusive_max,
            } => value::range(value, *min, *max, *inclusive_min, *inclusive_max),
            ConstraintKind::Length { min, max } => value::length(value, *min, *max),
            ConstraintKind::Pattern { source, regex } => value::pattern(value, source, regex),
            ConstraintKind::Enum(allowed) => value::enumeration(value, allowed),
            ConstraintKind::DateRange { min, max, format } => {
                value::date_range(value, *min, *max, format)
            }
            ConstraintKind::Unique { scope } => value::unique(value, scope.as_deref(), ctx),
            ConstraintKind::NotNull => value::not_null(value),
            ConstraintKind::Expression(expression) => business::expression(expression, value, ctx),
            ConstraintKind::Conditional {
                condition,
                then,
                otherwise,
            } => business::conditional(condition, then, otherwise.as_deref(), value, ctx),
            ConstraintKind::Custom { validator, params } => {
                business::custom(validator, params, value, ctx)
            }
            ConstraintKind::DependentField { fields, expression } => {
                business::dependent_field(fields, expression, value, ctx)
            }
            ConstraintKind::ForeignKey {
                source_fields,
                target_table,
                target_fields,
                ..
            } => relationship::foreign_key(source_fields, target_table, target_fields, value, ctx),
            ConstraintKind::UniqueKey { fields } => relationship::unique_key(fields, value, ctx),
            ConstraintKind::PrimaryKey { fields } => relationship::primary_key(fields, value, ctx),
            ConstraintKind::Check(expression) => relationship::check(expression, value, ctx),
        }
    }

    /// Fields whose emitted tuples this constraint keeps unique, if any.
    ///
    /// Empty field lists fall back to `field_name`, the field the constraint is
    /// declared on.
    pub fn key_fields(&self, field_name: Option<&str>) -> Option<Vec<String>> {
        let declared = match &self.kind {
            ConstraintKind::Unique { scope } => scope.clone().unwrap_or_default(),
            ConstraintKind::UniqueKey { fields } | ConstraintKind::PrimaryKey { fields } => {
                fields.clone()
            }
            _ => return None,
        };
        relationship::resolve_key_fields(&declared, field_name)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn params(value: serde_json::Value) -> Params {
        serde_json::from_value(value).expect("params")
    }

    fn build(kind: &str, value: serde_json::Value) -> Constraint {
        Constraint::from_descriptor(kind, kind, &params(value)).expect("constraint")
    }

    fn record(pairs: &[(&str, Value)]) -> Record {
        pairs
            .iter()
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect()
    }

    fn always(result: bool) -> impl Fn(&str, &Value, Option<&Record>) -> Result<bool, String> {
        move |_: &str, _: &Value, _: Option<&Record>| Ok(result)
    }

    #[test]
    fn value_constraints_treat_null_as_satisfied() {
        let ctx = EvaluationContext::new();
        for constraint in [
            build("range", json!({"min_value": 1, "max_value": 5})),
            build("length", json!({"min_length": 1})),
            build("pattern", json!({"pattern": "a+"})),
            build("enum", json!({"values": ["a"]})),
            build("date_range", json!({"min_date": "2020-01-01"})),
        ] {
            assert_eq!(constraint.evaluate(&Value::Null, &ctx), Outcome::Satisfied);
        }
        let not_null = build("not_null", json!({}));
        assert!(not_null.evaluate(&Value::Null, &ctx).is_violated());
    }

    #[test]
    fn range_respects_inclusive_flags() {
        let ctx = EvaluationContext::new();
        let range = build(
            "range",
            json!({"min_value": 0, "max_value": 10, "inclusive_max": false}),
        );
        assert!(range.evaluate(&Value::Int(0), &ctx).is_satisfied());
        assert!(range.evaluate(&Value::Float(9.5), &ctx).is_satisfied());
        assert!(range.evaluate(&Value::Int(10), &ctx).is_violated());
        assert!(range.evaluate(&Value::from("5"), &ctx).is_violated());
    }

    #[test]
    fn pattern_requires_full_match() {
        let ctx = EvaluationContext::new();
        let pattern = build("pattern", json!({"pattern": "[a-z]+"}));
        assert!(pattern.evaluate(&Value::from("abc"), &ctx).is_satisfied());
        assert!(pattern.evaluate(&Value::from("abc1"), &ctx).is_violated());
    }

    #[test]
    fn length_counts_array_elements() {
        let ctx = EvaluationContext::new();
        let length = build("length", json!({"min_length": 2, "max_length": 3}));
        let items = Value::Array(vec![Value::Int(1), Value::Int(2)]);
        assert!(length.evaluate(&items, &ctx).is_satisfied());
        assert!(length.evaluate(&Value::from("a"), &ctx).is_violated());
        assert!(length.evaluate(&Value::from("héé"), &ctx).is_satisfied());
    }

    #[test]
    fn date_range_rejects_unparsable_values() {
        let ctx = EvaluationContext::new();
        let range = build(
            "date_range",
            json!({"min_date": "2024-01-01", "max_date": "2024-12-31"}),
        );
        assert!(range.evaluate(&Value::from("2024-06-01"), &ctx).is_satisfied());
        assert!(range.evaluate(&Value::from("2023-12-31"), &ctx).is_violated());
        let Outcome::Violated(message) = range.evaluate(&Value::from("June 1st"), &ctx) else {
            panic!("expected violation");
        };
        assert!(message.contains("June 1st"));
    }

    #[test]
    fn enum_membership_uses_loose_equality() {
        let ctx = EvaluationContext::new();
        let allowed = build("enum", json!({"values": [1, 2, "three"]}));
        assert!(allowed.evaluate(&Value::Float(2.0), &ctx).is_satisfied());
        assert!(allowed.evaluate(&Value::from("three"), &ctx).is_satisfied());
        assert!(allowed.evaluate(&Value::Int(4), &ctx).is_violated());
    }

    #[test]
    fn unique_checks_existing_keys() {
        let unique = build("unique", json!({}));
        let mut keys = KeySet::new();
        keys.insert(&["email".to_string()], &[Value::from("a@x.io")]);

        let missing = EvaluationContext::new().with_field("email");
        assert_eq!(
            unique.evaluate(&Value::from("a@x.io"), &missing),
            Outcome::EvaluationError(ConstraintEvaluationError::MissingContext(
                ContextSlot::ExistingKeys
            ))
        );

        let ctx = missing.with_existing_keys(&keys);
        assert!(unique.evaluate(&Value::from("a@x.io"), &ctx).is_violated());
        assert!(unique.evaluate(&Value::from("b@x.io"), &ctx).is_satisfied());
    }

    #[test]
    fn scoped_unique_keys_on_scope_fields() {
        let unique = build("unique", json!({"scope": ["tenant"]}));
        let row = record(&[("tenant", Value::Int(1)), ("email", Value::from("a@x.io"))]);
        let key_fields = unique.key_fields(Some("email")).expect("key fields");
        assert_eq!(key_fields, vec!["tenant".to_string()]);

        let mut keys = KeySet::new();
        let ctx = EvaluationContext::new()
            .with_field("email")
            .with_record(&row)
            .with_existing_keys(&keys);
        assert!(unique.evaluate(&Value::from("a@x.io"), &ctx).is_satisfied());

        keys.insert_from_record(&key_fields, &row);
        let ctx = EvaluationContext::new()
            .with_field("email")
            .with_record(&row)
            .with_existing_keys(&keys);
        assert!(unique.evaluate(&Value::from("a@x.io"), &ctx).is_violated());
    }

    #[test]
    fn primary_key_reports_null_before_uniqueness() {
        let pk = build("primary_key", json!({"fields": ["tenant", "id"]}));
        let mut keys = KeySet::new();
        let fields = vec!["tenant".to_string(), "id".to_string()];
        keys.insert(&fields, &[Value::Int(1), Value::Int(7)]);

        let row = record(&[("tenant", Value::Int(1)), ("id", Value::Null)]);
        let ctx = EvaluationContext::new()
            .with_record(&row)
            .with_existing_keys(&keys);
        let Outcome::Violated(message) = pk.evaluate(&Value::Null, &ctx) else {
            panic!("expected violation");
        };
        assert!(message.contains("'id'"));
        assert!(message.contains("null"));

        let duplicate = record(&[("tenant", Value::Int(1)), ("id", Value::Int(7))]);
        let ctx = ctx.with_record(&duplicate);
        let Outcome::Violated(message) = pk.evaluate(&Value::Null, &ctx) else {
            panic!("expected violation");
        };
        assert!(message.contains("duplicate"));
    }

    #[test]
    fn foreign_key_requires_resolver_and_allows_null() {
        let references = InMemoryReferences::from_rows(
            "users",
            vec![record(&[("id", Value::Int(1))])],
        );
        let fk = build("foreign_key", json!({"target_table": "users", "target_fields": ["id"]}));

        let bare = EvaluationContext::new().with_field("user_id");
        assert_eq!(
            fk.evaluate(&Value::Int(1), &bare),
            Outcome::EvaluationError(ConstraintEvaluationError::MissingContext(
                ContextSlot::ReferenceResolver
            ))
        );

        let ctx = bare.with_references(&references);
        assert!(fk.evaluate(&Value::Null, &ctx).is_satisfied());
        assert!(fk.evaluate(&Value::Int(1), &ctx).is_satisfied());
        assert!(fk.evaluate(&Value::Int(2), &ctx).is_violated());
    }

    #[test]
    fn composite_foreign_key_resolves_one_column_or_whole_tuple() {
        let references = InMemoryReferences::from_rows(
            "accounts",
            vec![record(&[("region", Value::from("eu")), ("number", Value::Int(10))])],
        );
        let fk = build(
            "foreign_key",
            json!({
                "source_fields": ["acct_region", "acct_number"],
                "target_table": "accounts",
                "target_fields": ["region", "number"]
            }),
        );

        let row = record(&[("acct_region", Value::from("eu")), ("acct_number", Value::Int(11))]);
        let table_ctx = EvaluationContext::new()
            .with_record(&row)
            .with_references(&references);
        assert!(fk.evaluate(&Value::Null, &table_ctx).is_violated());

        let column_ctx = table_ctx.with_field("acct_region");
        assert!(fk.evaluate(&Value::from("eu"), &column_ctx).is_satisfied());
    }

    #[test]
    fn business_constraints_need_an_evaluator() {
        let expression = build("expression", json!({"expression": "value > 0"}));
        assert_eq!(
            expression.evaluate(&Value::Int(1), &EvaluationContext::new()),
            Outcome::EvaluationError(ConstraintEvaluationError::UnresolvedEvaluator)
        );

        let falsy = always(false);
        let ctx = EvaluationContext::new().with_expressions(&falsy);
        assert!(expression.evaluate(&Value::Int(1), &ctx).is_violated());
    }

    #[test]
    fn conditional_without_else_is_satisfied_when_condition_is_false() {
        let conditional = build(
            "conditional",
            json!({
                "condition": "status == 'active'",
                "then": {"kind": "not_null"}
            }),
        );
        let falsy = always(false);
        let truthy = always(true);

        let ctx = EvaluationContext::new().with_expressions(&falsy);
        assert!(conditional.evaluate(&Value::Null, &ctx).is_satisfied());

        let ctx = EvaluationContext::new().with_expressions(&truthy);
        assert!(conditional.evaluate(&Value::Null, &ctx).is_violated());
    }

    #[test]
    fn dependent_field_requires_every_dependency() {
        let dependent = build(
            "dependent_field",
            json!({"fields": ["start", "end"], "expression": "end >= start"}),
        );
        let truthy = always(true);
        let row = record(&[("start", Value::Int(1))]);
        let ctx = EvaluationContext::new()
            .with_expressions(&truthy)
            .with_record(&row);
        assert_eq!(
            dependent.evaluate(&Value::Int(1), &ctx),
            Outcome::EvaluationError(ConstraintEvaluationError::MissingDependency(
                "end".to_string()
            ))
        );

        let full = record(&[("start", Value::Int(1)), ("end", Value::Int(2))]);
        let ctx = ctx.with_record(&full);
        assert!(dependent.evaluate(&Value::Int(1), &ctx).is_satisfied());
    }

    #[test]
    fn custom_constraint_resolves_validator_by_name() {
        let custom = build("custom", json!({"validator": "even", "strict": true}));
        let mut validators = ValidatorRegistry::new();
        validators.register(
            "even",
            |value: &Value, params: &Params, _: Option<&Record>| {
                assert_eq!(params.get("strict"), Some(&json!(true)));
                Ok(value.as_f64().is_some_and(|number| number % 2.0 == 0.0))
            },
        );

        assert_eq!(
            custom.evaluate(&Value::Int(2), &EvaluationContext::new()),
            Outcome::EvaluationError(ConstraintEvaluationError::MissingContext(
                ContextSlot::Validators
            ))
        );

        let ctx = EvaluationContext::new().with_validators(&validators);
        assert!(custom.evaluate(&Value::Int(2), &ctx).is_satisfied());
        assert!(custom.evaluate(&Value::Int(3), &ctx).is_violated());

        let unknown = build("custom", json!({"validator": "odd"}));
        assert_eq!(
            unknown.evaluate(&Value::Int(3), &ctx),
            Outcome::EvaluationError(ConstraintEvaluationError::UnresolvedValidator(
                "odd".to_string()
            ))
        );
    }
}
