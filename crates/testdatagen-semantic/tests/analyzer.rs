use serde_json::{Value, json};
use testdatagen_core::{SchemaNode, Type, TypeCategory};
use testdatagen_semantic::{Diagnostic, DiagnosticCode, SemanticAnalyzer, SymbolKind};

fn constraint(kind: &str, parameters: Value, line: u32) -> Value {
    json!({
        "name": kind,
        "constraint_type": kind,
        "parameters": parameters,
        "line": line,
        "column": 30
    })
}

fn type_decl(name: &str, base: &str, constraints: Vec<Value>, line: u32) -> Value {
    json!({
        "name": name,
        "base_type": base,
        "constraints": constraints,
        "line": line,
        "column": 5
    })
}

fn field(name: &str, data_type: &str, constraints: Vec<Value>, line: u32) -> Value {
    json!({
        "name": name,
        "data_type": data_type,
        "constraints": constraints,
        "line": line,
        "column": 9
    })
}

fn table(name: &str, fields: Vec<Value>, line: u32) -> Value {
    json!({
        "name": name,
        "fields": fields,
        "line": line,
        "column": 5
    })
}

fn schema(types: Vec<Value>, tables: Vec<Value>) -> SchemaNode {
    serde_json::from_value(json!({
        "name": "crm",
        "types": types,
        "tables": tables,
        "line": 1,
        "column": 1
    }))
    .expect("schema ast")
}

fn with_code(diagnostics: &[Diagnostic], code: DiagnosticCode) -> Vec<&Diagnostic> {
    diagnostics
        .iter()
        .filter(|diagnostic| diagnostic.code == code)
        .collect()
}

#[test]
fn email_schema_analyzes_cleanly() {
    let schema = schema(
        vec![type_decl(
            "Email",
            "string",
            vec![constraint("pattern", json!({"pattern": "^.+@.+$"}), 2)],
            2,
        )],
        vec![table(
            "T",
            vec![
                field("id", "integer", vec![], 4),
                field("email", "Email", vec![], 5),
            ],
            3,
        )],
    );

    let mut analyzer = SemanticAnalyzer::default();
    let diagnostics = analyzer.analyze(&schema);

    assert!(diagnostics.is_empty(), "{diagnostics:?}");
    let Some(Type::Custom(email)) = analyzer.registry().get("Email") else {
        panic!("Email should be a registered custom type");
    };
    assert_eq!(email.base_type, "string");
    assert_eq!(email.constraints.len(), 1);
    assert_eq!(analyzer.registry().list(Some(TypeCategory::Custom)).len(), 1);
}

#[test]
fn unknown_base_type_is_reported_once() {
    let schema = schema(vec![type_decl("Foo", "bar", vec![], 2)], vec![]);

    let mut analyzer = SemanticAnalyzer::default();
    let diagnostics = analyzer.analyze(&schema);

    let unknown = with_code(&diagnostics, DiagnosticCode::UnknownBaseType);
    assert_eq!(unknown.len(), 1, "{diagnostics:?}");
    assert!(unknown[0].message.contains("bar"));
    assert!(unknown[0].message.contains("Foo"));
    assert_eq!(unknown[0].line, 2);
    assert!(!analyzer.registry().exists("Foo"));
}

#[test]
fn duplicate_type_keeps_first_declaration() {
    let schema = schema(
        vec![
            type_decl("Email", "string", vec![], 2),
            type_decl("Email", "integer", vec![], 3),
        ],
        vec![],
    );

    let mut analyzer = SemanticAnalyzer::default();
    let diagnostics = analyzer.analyze(&schema);

    let duplicates = with_code(&diagnostics, DiagnosticCode::DuplicateTypeName);
    assert_eq!(duplicates.len(), 1, "{diagnostics:?}");
    assert_eq!(duplicates[0].line, 3);
    assert_eq!(analyzer.registry().base_of("Email"), Some("string"));
}

#[test]
fn two_step_cycle_is_detected() {
    let schema = schema(
        vec![
            type_decl("A", "B", vec![], 2),
            type_decl("B", "A", vec![], 3),
        ],
        vec![],
    );

    let mut analyzer = SemanticAnalyzer::default();
    let diagnostics = analyzer.analyze(&schema);

    let cycles = with_code(&diagnostics, DiagnosticCode::CircularTypeReference);
    assert_eq!(cycles.len(), 2, "{diagnostics:?}");
    assert!(cycles[0].message.contains("A -> B -> A"));
    assert!(with_code(&diagnostics, DiagnosticCode::UnknownBaseType).is_empty());
    assert!(!analyzer.registry().exists("A"));
    assert!(!analyzer.registry().exists("B"));
}

#[test]
fn longer_cycle_is_detected_at_first_repeat() {
    let schema = schema(
        vec![
            type_decl("A", "B", vec![], 2),
            type_decl("B", "C", vec![], 3),
            type_decl("C", "D", vec![], 4),
            type_decl("D", "B", vec![], 5),
        ],
        vec![],
    );

    let mut analyzer = SemanticAnalyzer::default();
    let diagnostics = analyzer.analyze(&schema);

    let cycles = with_code(&diagnostics, DiagnosticCode::CircularTypeReference);
    assert_eq!(cycles.len(), 4, "{diagnostics:?}");
    assert!(cycles[0].message.contains("A -> B -> C -> D -> B"));
}

#[test]
fn pattern_on_integer_type_is_incompatible() {
    let schema = schema(
        vec![type_decl(
            "Code",
            "integer",
            vec![constraint("pattern", json!({"pattern": "[0-9]+"}), 2)],
            2,
        )],
        vec![],
    );

    let diagnostics = SemanticAnalyzer::default().analyze(&schema);

    let incompatible = with_code(&diagnostics, DiagnosticCode::ConstraintTypeIncompatible);
    assert_eq!(incompatible.len(), 1, "{diagnostics:?}");
    let message = &incompatible[0].message;
    assert!(message.contains("pattern"));
    assert!(message.contains("Code"));
    assert!(message.contains("integer"));
}

#[test]
fn field_constraints_are_checked_against_resolved_root() {
    let schema = schema(
        vec![type_decl("Age", "integer", vec![], 2)],
        vec![table(
            "people",
            vec![
                field(
                    "age",
                    "Age",
                    vec![
                        constraint("range", json!({"min_value": 0}), 5),
                        constraint("length", json!({"max_length": 3}), 5),
                    ],
                    5,
                ),
                field(
                    "tags",
                    "string",
                    vec![constraint("length", json!({"max_length": 3}), 6)],
                    6,
                ),
            ],
            4,
        )],
    );

    let diagnostics = SemanticAnalyzer::default().analyze(&schema);

    let incompatible = with_code(&diagnostics, DiagnosticCode::ConstraintTypeIncompatible);
    assert_eq!(incompatible.len(), 1, "{diagnostics:?}");
    assert!(incompatible[0].message.contains("length"));
    assert!(incompatible[0].message.contains("'age'"));
}

#[test]
fn types_resolve_regardless_of_declaration_order() {
    let schema = schema(
        vec![
            type_decl("WorkEmail", "Email", vec![], 20),
            type_decl(
                "Email",
                "string",
                vec![constraint("pattern", json!({"pattern": ".+@.+"}), 21)],
                21,
            ),
        ],
        vec![table(
            "users",
            vec![
                field("id", "integer", vec![], 3),
                field("email", "WorkEmail", vec![], 4),
            ],
            2,
        )],
    );

    let mut analyzer = SemanticAnalyzer::default();
    let session = analyzer.analyze_session(&schema);

    assert!(session.diagnostics.is_empty(), "{:?}", session.diagnostics);
    assert_eq!(analyzer.registry().base_of("WorkEmail"), Some("Email"));

    let users = session
        .symbols
        .resolve_path(&["crm", "users"])
        .expect("users scope");
    let email_field = session
        .symbols
        .lookup_from(users, "email")
        .expect("field symbol");
    assert_eq!(email_field.kind, SymbolKind::Field);
    let work_email = session
        .symbols
        .lookup_from(users, "WorkEmail")
        .expect("type visible from table scope");
    assert_eq!(work_email.kind, SymbolKind::Type);
    assert_eq!(work_email.type_name.as_deref(), Some("Email"));
}

#[test]
fn unknown_field_types_and_broken_chains_are_reported() {
    let schema = schema(
        vec![type_decl("Handle", "Missing", vec![], 2)],
        vec![table(
            "users",
            vec![
                field("id", "uuid", vec![], 4),
                field("nick", "Handle", vec![], 5),
                field("mood", "Feeling", vec![], 6),
            ],
            3,
        )],
    );

    let diagnostics = SemanticAnalyzer::default().analyze(&schema);

    let unknown_types = with_code(&diagnostics, DiagnosticCode::UnknownDataType);
    assert_eq!(unknown_types.len(), 1);
    assert!(unknown_types[0].message.contains("Feeling"));

    let broken = with_code(&diagnostics, DiagnosticCode::UnknownBaseType);
    assert_eq!(broken.len(), 2, "{diagnostics:?}");
    assert_eq!(broken[1].line, 5);
    assert!(broken[1].message.contains("Missing"));
}

#[test]
fn duplicate_tables_and_fields_are_flagged_after_the_first() {
    let schema = schema(
        vec![],
        vec![
            table(
                "users",
                vec![
                    field("id", "integer", vec![], 3),
                    field("id", "string", vec![], 4),
                ],
                2,
            ),
            table("users", vec![field("id", "integer", vec![], 7)], 6),
        ],
    );

    let diagnostics = SemanticAnalyzer::default().analyze(&schema);

    let tables = with_code(&diagnostics, DiagnosticCode::DuplicateTableName);
    let fields = with_code(&diagnostics, DiagnosticCode::DuplicateFieldName);
    assert_eq!(tables.len(), 1);
    assert_eq!(tables[0].line, 6);
    assert_eq!(fields.len(), 1);
    assert_eq!(fields[0].line, 4);
}

#[test]
fn invalid_constraint_parameters_are_reported() {
    let schema = schema(
        vec![type_decl(
            "Sku",
            "string",
            vec![constraint("pattern", json!({"pattern": "[A-Z"}), 2)],
            2,
        )],
        vec![],
    );

    let diagnostics = SemanticAnalyzer::default().analyze(&schema);

    let invalid = with_code(&diagnostics, DiagnosticCode::InvalidConstraint);
    assert_eq!(invalid.len(), 1, "{diagnostics:?}");
}

#[test]
fn derived_type_registers_over_a_redeclared_registered_base() {
    let mut analyzer = SemanticAnalyzer::default();
    let first = schema(vec![type_decl("Email", "string", vec![], 2)], vec![]);
    assert!(analyzer.analyze(&first).is_empty());

    let second = schema(
        vec![
            type_decl("Email", "string", vec![], 2),
            type_decl(
                "WorkEmail",
                "Email",
                vec![constraint("pattern", json!({"pattern": ".+@corp\\.io"}), 3)],
                3,
            ),
        ],
        vec![],
    );
    let diagnostics = analyzer.analyze(&second);

    assert_eq!(
        with_code(&diagnostics, DiagnosticCode::DuplicateTypeName).len(),
        1,
        "{diagnostics:?}"
    );
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(analyzer.registry().base_of("WorkEmail"), Some("Email"));
    assert_eq!(analyzer.registry().effective_constraints("WorkEmail").len(), 1);
}

#[test]
fn registry_persists_until_a_new_session() {
    let schema = schema(vec![type_decl("Email", "string", vec![], 2)], vec![]);
    let mut analyzer = SemanticAnalyzer::default();

    assert!(analyzer.analyze(&schema).is_empty());

    let again = analyzer.analyze(&schema);
    assert_eq!(
        with_code(&again, DiagnosticCode::DuplicateTypeName).len(),
        1,
        "{again:?}"
    );

    analyzer.new_session();
    assert!(!analyzer.registry().exists("Email"));
    assert!(analyzer.analyze(&schema).is_empty());
    assert!(analyzer.registry().exists("Email"));
}
