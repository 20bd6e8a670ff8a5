use std::collections::BTreeMap;
use std::path::Path;

use jsonschema::JSONSchema;
use schemars::schema_for;
use serde_json::Value as Json;
use testdatagen_core::{Record, SchemaNode, Value};
use tracing::debug;

use crate::{CliError, CliResult};

/// JSON Schema of the AST document, as emitted by `ast-schema`.
pub fn ast_json_schema() -> CliResult<Json> {
    Ok(serde_json::to_value(schema_for!(SchemaNode))?)
}

/// Read an AST document, check its shape against the AST JSON Schema, then
/// deserialize it.
pub fn load_ast(path: &Path) -> CliResult<SchemaNode> {
    let document: Json = serde_json::from_str(&std::fs::read_to_string(path)?)?;
    let schema = ast_json_schema()?;
    let issues = shape_issues(&document, &schema)?;
    if !issues.is_empty() {
        return Err(CliError::AstShape {
            path: path.to_path_buf(),
            issues,
        });
    }
    let ast: SchemaNode = serde_json::from_value(document)?;
    debug!(
        path = %path.display(),
        schema = %ast.name,
        tables = ast.tables.len(),
        types = ast.types.len(),
        "ast loaded"
    );
    Ok(ast)
}

/// Structural problems of `document`, each prefixed with its JSON pointer.
fn shape_issues(document: &Json, schema: &Json) -> CliResult<Vec<String>> {
    let compiled =
        JSONSchema::compile(schema).map_err(|err| CliError::AstSchema(err.to_string()))?;
    let issues = match compiled.validate(document) {
        Ok(()) => Vec::new(),
        Err(errors) => errors
            .map(|error| {
                let pointer = error.instance_path.to_string();
                let pointer = if pointer.is_empty() { "/".to_string() } else { pointer };
                format!("{pointer}: {error}")
            })
            .collect(),
    };
    Ok(issues)
}

/// Read a dataset document: an object mapping table names to arrays of row
/// objects.
pub fn load_rows(path: &Path) -> CliResult<BTreeMap<String, Vec<Record>>> {
    let document: Json = serde_json::from_str(&std::fs::read_to_string(path)?)?;
    rows_from_json(&document).map_err(|reason| CliError::Dataset {
        path: path.to_path_buf(),
        reason,
    })
}

fn rows_from_json(document: &Json) -> Result<BTreeMap<String, Vec<Record>>, String> {
    let tables = document
        .as_object()
        .ok_or_else(|| "expected an object of table name to rows".to_string())?;

    let mut data = BTreeMap::new();
    for (table, rows) in tables {
        let rows = rows
            .as_array()
            .ok_or_else(|| format!("rows of table '{table}' must be an array"))?;
        let records = rows
            .iter()
            .enumerate()
            .map(|(index, row)| {
                let fields = row
                    .as_object()
                    .ok_or_else(|| format!("row {index} of table '{table}' must be an object"))?;
                Ok(fields
                    .iter()
                    .map(|(name, value)| (name.clone(), Value::from_json(value)))
                    .collect::<Record>())
            })
            .collect::<Result<Vec<_>, String>>()?;
        data.insert(table.clone(), records);
    }
    Ok(data)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use serde_json::json;

    use super::*;

    fn temp_json(name: &str, value: &Json) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "testdatagen-input-{}-{name}.json",
            std::process::id()
        ));
        std::fs::write(&path, serde_json::to_vec(value).expect("encode")).expect("write");
        path
    }

    #[test]
    fn well_formed_ast_loads() {
        let path = temp_json(
            "ok",
            &json!({
                "name": "crm",
                "tables": [{
                    "name": "users",
                    "fields": [{ "name": "id", "data_type": "integer", "line": 3, "column": 5 }],
                    "line": 2,
                    "column": 1
                }],
                "line": 1,
                "column": 1
            }),
        );
        let ast = load_ast(&path).expect("ast");
        std::fs::remove_file(&path).ok();

        assert_eq!(ast.name, "crm");
        assert_eq!(ast.tables[0].fields[0].data_type, "integer");
        assert!(ast.tables[0].fields[0].nullable);
    }

    #[test]
    fn shape_errors_carry_json_pointers() {
        let path = temp_json(
            "bad",
            &json!({
                "name": "crm",
                "tables": [{ "name": "users", "fields": "id", "line": 2, "column": 1 }],
                "line": 1,
                "column": 1
            }),
        );
        let err = load_ast(&path).expect_err("shape error");
        std::fs::remove_file(&path).ok();

        let CliError::AstShape { issues, .. } = err else {
            panic!("expected a shape error, got {err:?}");
        };
        assert!(issues.iter().any(|issue| issue.starts_with("/tables/0/fields")));
    }

    #[test]
    fn uncompilable_ast_schema_is_its_own_error() {
        let err = shape_issues(&json!({}), &json!({ "type": 12 })).expect_err("bad schema");
        assert!(matches!(err, CliError::AstSchema(_)), "{err:?}");
    }

    #[test]
    fn generated_ast_schema_compiles() {
        let schema = ast_json_schema().expect("ast schema");
        assert!(shape_issues(&json!({}), &schema).is_ok());
    }

    #[test]
    fn rows_convert_to_records() {
        let data = rows_from_json(&json!({
            "users": [{ "id": 1, "email": "a@x.io", "manager": null }]
        }))
        .expect("rows");

        let row = &data["users"][0];
        assert_eq!(row["email"], Value::from_json(&json!("a@x.io")));
        assert!(row["manager"].is_null());
    }

    #[test]
    fn rows_must_be_objects() {
        let err = rows_from_json(&json!({ "users": [1, 2] })).expect_err("not objects");
        assert!(err.contains("row 0"));
    }
}
