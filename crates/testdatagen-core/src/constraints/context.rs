use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ast::Params;
use crate::value::Value;

/// Field values of one record, by field name.
pub type Record = BTreeMap<String, Value>;

/// Named slots of an [`EvaluationContext`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextSlot {
    FieldName,
    Record,
    ExistingKeys,
    ReferenceResolver,
    Validators,
}

impl ContextSlot {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContextSlot::FieldName => "field_name",
            ContextSlot::Record => "record",
            ContextSlot::ExistingKeys => "existing_keys",
            ContextSlot::ReferenceResolver => "reference_resolver",
            ContextSlot::Validators => "validators",
        }
    }
}

impl fmt::Display for ContextSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Key tuples already emitted for a table, grouped by the fields forming the key.
#[derive(Debug, Clone, Default)]
pub struct KeySet {
    tuples: HashMap<Vec<String>, HashSet<Vec<String>>>,
}

impl KeySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, fields: &[String], tuple: &[Value]) -> bool {
        self.tuples
            .get(fields)
            .is_some_and(|seen| seen.contains(&tuple_key(tuple)))
    }

    /// Returns `false` when the tuple was already present.
    pub fn insert(&mut self, fields: &[String], tuple: &[Value]) -> bool {
        self.tuples
            .entry(fields.to_vec())
            .or_default()
            .insert(tuple_key(tuple))
    }

    /// Insert the tuple `fields` take in `record`; missing fields count as null.
    pub fn insert_from_record(&mut self, fields: &[String], record: &Record) -> bool {
        let tuple: Vec<Value> = fields
            .iter()
            .map(|field| record.get(field).cloned().unwrap_or(Value::Null))
            .collect();
        self.insert(fields, &tuple)
    }

    pub fn len(&self, fields: &[String]) -> usize {
        self.tuples.get(fields).map_or(0, HashSet::len)
    }
}

fn tuple_key(tuple: &[Value]) -> Vec<String> {
    tuple.iter().map(Value::key).collect()
}

/// Answers whether a referenced row exists in another table.
pub trait ReferenceResolver {
    fn exists(&self, table: &str, column: &str, value: &Value) -> bool;
    fn exists_composite(&self, table: &str, columns: &[String], values: &[Value]) -> bool;
}

/// Evaluates boolean DSL expressions for business and check constraints.
pub trait ExpressionEvaluator {
    fn evaluate(
        &self,
        expression: &str,
        value: &Value,
        record: Option<&Record>,
    ) -> Result<bool, String>;
}

impl<F> ExpressionEvaluator for F
where
    F: Fn(&str, &Value, Option<&Record>) -> Result<bool, String>,
{
    fn evaluate(
        &self,
        expression: &str,
        value: &Value,
        record: Option<&Record>,
    ) -> Result<bool, String> {
        self(expression, value, record)
    }
}

/// Validator looked up by name from a `custom(...)` constraint.
pub trait NamedValidator {
    fn validate(&self, value: &Value, params: &Params, record: Option<&Record>)
    -> Result<bool, String>;
}

impl<F> NamedValidator for F
where
    F: Fn(&Value, &Params, Option<&Record>) -> Result<bool, String>,
{
    fn validate(
        &self,
        value: &Value,
        params: &Params,
        record: Option<&Record>,
    ) -> Result<bool, String> {
        self(value, params, record)
    }
}

/// Named validators available to `custom(...)` constraints.
#[derive(Default)]
pub struct ValidatorRegistry {
    validators: BTreeMap<String, Box<dyn NamedValidator + Send + Sync>>,
}

impl ValidatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<V>(&mut self, name: impl Into<String>, validator: V)
    where
        V: NamedValidator + Send + Sync + 'static,
    {
        self.validators.insert(name.into(), Box::new(validator));
    }

    pub fn get(&self, name: &str) -> Option<&(dyn NamedValidator + Send + Sync)> {
        self.validators.get(name).map(|validator| validator.as_ref())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.validators.keys().map(String::as_str)
    }
}

impl fmt::Debug for ValidatorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.names()).finish()
    }
}

/// Inputs a constraint may need beyond the value itself. Every slot is optional;
/// a constraint that needs an absent slot reports an evaluation error.
#[derive(Clone, Copy, Default)]
pub struct EvaluationContext<'a> {
    pub field_name: Option<&'a str>,
    pub record: Option<&'a Record>,
    pub existing_keys: Option<&'a KeySet>,
    pub references: Option<&'a dyn ReferenceResolver>,
    pub expressions: Option<&'a dyn ExpressionEvaluator>,
    pub validators: Option<&'a ValidatorRegistry>,
}

impl<'a> EvaluationContext<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_field(mut self, field_name: &'a str) -> Self {
        self.field_name = Some(field_name);
        self
    }

    pub fn with_record(mut self, record: &'a Record) -> Self {
        self.record = Some(record);
        self
    }

    pub fn with_existing_keys(mut self, keys: &'a KeySet) -> Self {
        self.existing_keys = Some(keys);
        self
    }

    pub fn with_references(mut self, references: &'a dyn ReferenceResolver) -> Self {
        self.references = Some(references);
        self
    }

    pub fn with_expressions(mut self, expressions: &'a dyn ExpressionEvaluator) -> Self {
        self.expressions = Some(expressions);
        self
    }

    pub fn with_validators(mut self, validators: &'a ValidatorRegistry) -> Self {
        self.validators = Some(validators);
        self
    }

    /// Value of `field` in the record slot, `Null` when absent from the record.
    pub(crate) fn record_value(&self, field: &str) -> Option<Value> {
        self.record
            .map(|record| record.get(field).cloned().unwrap_or(Value::Null))
    }
}

impl fmt::Debug for EvaluationContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EvaluationContext")
            .field("field_name", &self.field_name)
            .field("record", &self.record)
            .field("existing_keys", &self.existing_keys.is_some())
            .field("references", &self.references.is_some())
            .field("expressions", &self.expressions.is_some())
            .field("validators", &self.validators)
            .finish()
    }
}
