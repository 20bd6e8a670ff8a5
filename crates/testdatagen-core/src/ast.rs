use std::collections::BTreeMap;
use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Constraint parameters as produced by the parser (`kind(args)` in the DSL).
pub type Params = BTreeMap<String, serde_json::Value>;

/// Source position of an AST node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

impl Position {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Root node of a schema document.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SchemaNode {
    pub name: String,
    /// Custom type declarations (`type Name = Base with ...;`).
    #[serde(default)]
    pub types: Vec<TypeNode>,
    pub tables: Vec<TableNode>,
    #[serde(default)]
    pub imports: Vec<String>,
    pub line: u32,
    pub column: u32,
}

/// Custom type declaration.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TypeNode {
    pub name: String,
    pub base_type: String,
    #[serde(default)]
    pub constraints: Vec<ConstraintNode>,
    pub line: u32,
    pub column: u32,
}

/// Table declaration inside a schema.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TableNode {
    pub name: String,
    pub fields: Vec<FieldNode>,
    #[serde(default)]
    pub constraints: Vec<ConstraintNode>,
    pub line: u32,
    pub column: u32,
}

/// Field declaration inside a table.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FieldNode {
    pub name: String,
    /// Primitive or custom type name.
    pub data_type: String,
    #[serde(default)]
    pub constraints: Vec<ConstraintNode>,
    #[serde(default = "default_nullable")]
    pub nullable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<serde_json::Value>,
    pub line: u32,
    pub column: u32,
}

/// Constraint declaration attached to a type, field, or table.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ConstraintNode {
    pub name: String,
    /// Constraint kind, e.g. `pattern`, `range`, `primary_key`.
    pub constraint_type: String,
    #[serde(default)]
    pub parameters: Params,
    pub line: u32,
    pub column: u32,
}

fn default_nullable() -> bool {
    true
}

macro_rules! impl_position {
    ($($node:ty),* $(,)?) => {
        $(
            impl $node {
                /// Source position of this node.
                pub fn position(&self) -> Position {
                    Position::new(self.line, self.column)
                }
            }
        )*
    };
}

impl_position!(SchemaNode, TypeNode, TableNode, FieldNode, ConstraintNode);

impl SchemaNode {
    pub fn table(&self, name: &str) -> Option<&TableNode> {
        self.tables.iter().find(|table| table.name == name)
    }
}

impl TableNode {
    pub fn field(&self, name: &str) -> Option<&FieldNode> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// Table-level and field-level constraints of the given kind.
    pub fn constraints_of_kind<'a>(
        &'a self,
        kind: &'a str,
    ) -> impl Iterator<Item = &'a ConstraintNode> + 'a {
        self.constraints
            .iter()
            .chain(self.fields.iter().flat_map(|field| field.constraints.iter()))
            .filter(move |constraint| constraint.constraint_type == kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_defaults_to_nullable() {
        let field: FieldNode = serde_json::from_value(serde_json::json!({
            "name": "email",
            "data_type": "string",
            "line": 3,
            "column": 5
        }))
        .expect("parse field");

        assert!(field.nullable);
        assert!(field.constraints.is_empty());
        assert_eq!(field.position(), Position::new(3, 5));
    }

    #[test]
    fn collects_constraints_from_fields_and_table() {
        let table: TableNode = serde_json::from_value(serde_json::json!({
            "name": "orders",
            "line": 1,
            "column": 1,
            "fields": [{
                "name": "id",
                "data_type": "integer",
                "line": 2,
                "column": 3,
                "constraints": [{
                    "name": "pk",
                    "constraint_type": "primary_key",
                    "line": 2,
                    "column": 20
                }]
            }],
            "constraints": [{
                "name": "fk_user",
                "constraint_type": "foreign_key",
                "parameters": {"target_table": "users"},
                "line": 4,
                "column": 3
            }]
        }))
        .expect("parse table");

        assert_eq!(table.constraints_of_kind("primary_key").count(), 1);
        assert_eq!(table.constraints_of_kind("foreign_key").count(), 1);
        assert_eq!(table.constraints_of_kind("check").count(), 0);
    }
}
