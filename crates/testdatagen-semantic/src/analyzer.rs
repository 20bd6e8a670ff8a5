use std::collections::{BTreeMap, BTreeSet};

use serde_json::json;
use testdatagen_core::{ConstraintNode, SchemaNode, TableNode, TypeNode, TypeRegistry};
use tracing::{debug, info, warn};

use crate::checker::TypeChecker;
use crate::errors::{Diagnostic, DiagnosticCode};
use crate::symbols::{Symbol, SymbolKind, SymbolTable};

/// Diagnostics plus the symbol table built while analyzing one schema.
#[derive(Debug, Clone)]
pub struct AnalysisSession {
    pub diagnostics: Vec<Diagnostic>,
    pub symbols: SymbolTable,
}

/// Registers a schema's types, binds its symbols, and type checks it.
///
/// The analyzer owns its registry. Custom types registered by one `analyze`
/// call stay registered until [`SemanticAnalyzer::new_session`] resets the
/// registry; the symbol table is rebuilt on every call.
#[derive(Debug, Clone, Default)]
pub struct SemanticAnalyzer {
    registry: TypeRegistry,
}

impl SemanticAnalyzer {
    pub fn new(registry: TypeRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    pub fn into_registry(self) -> TypeRegistry {
        self.registry
    }

    /// Drop custom types registered by earlier calls.
    pub fn new_session(&mut self) {
        self.registry.reset();
    }

    pub fn analyze(&mut self, schema: &SchemaNode) -> Vec<Diagnostic> {
        self.analyze_session(schema).diagnostics
    }

    pub fn analyze_session(&mut self, schema: &SchemaNode) -> AnalysisSession {
        info!(
            schema = %schema.name,
            types = schema.types.len(),
            tables = schema.tables.len(),
            "semantic analysis started"
        );
        let mut symbols = SymbolTable::new();
        let mut diagnostics = Vec::new();

        symbols.add_symbol(
            Symbol::new(&schema.name, SymbolKind::Schema, schema.position())
                .with_attribute("imports", json!(schema.imports)),
        );
        symbols.enter_scope(&schema.name);

        for node in &schema.types {
            bind_type(&mut symbols, node);
        }
        self.register_types(schema, &mut diagnostics);

        for table in &schema.tables {
            bind_table(&mut symbols, table);
        }
        symbols.exit_scope();

        diagnostics.extend(TypeChecker::check(schema, &self.registry));

        info!(
            schema = %schema.name,
            diagnostics = diagnostics.len(),
            registered = self.registry.len(),
            "semantic analysis finished"
        );
        AnalysisSession {
            diagnostics,
            symbols,
        }
    }

    /// Two-pass registration of the schema's custom types.
    ///
    /// Pass A decides which first-occurrence declarations can be registered
    /// without touching the registry. Pass B registers those in dependency
    /// order, so a base declared later in the schema is registered first.
    fn register_types(&mut self, schema: &SchemaNode, diagnostics: &mut Vec<Diagnostic>) {
        let mut declared: BTreeMap<&str, &TypeNode> = BTreeMap::new();
        for node in &schema.types {
            if declared.contains_key(node.name.as_str()) {
                continue;
            }
            if self.registry.exists(&node.name) {
                diagnostics.push(Diagnostic::error(
                    DiagnosticCode::DuplicateTypeName,
                    node.position(),
                    format!("type '{}' is already registered", node.name),
                ));
                warn!(type_name = %node.name, "type registration skipped: name taken");
            }
            declared.insert(node.name.as_str(), node);
        }

        // Pass A
        let mut valid: BTreeMap<&str, bool> = BTreeMap::new();
        for &name in declared.keys() {
            self.resolve_validity(name, &declared, &mut valid, &mut BTreeSet::new());
        }
        let mut pending: Vec<&TypeNode> = schema
            .types
            .iter()
            .filter(|node| {
                declared
                    .get(node.name.as_str())
                    .is_some_and(|first| std::ptr::eq(*first, *node))
            })
            .filter(|node| valid.get(node.name.as_str()).copied().unwrap_or(false))
            .collect();

        // Pass B
        while !pending.is_empty() {
            let before = pending.len();
            let mut deferred = Vec::new();
            for node in pending {
                if !self.registry.exists(&node.base_type) {
                    deferred.push(node);
                    continue;
                }
                if let Err(err) = self.registry.register_custom_from_declaration(node) {
                    warn!(type_name = %node.name, error = %err, "type registration failed");
                }
            }
            if deferred.len() == before {
                for node in &deferred {
                    warn!(type_name = %node.name, "type registration skipped: base unresolved");
                }
                break;
            }
            pending = deferred;
        }
        debug!(schema = %schema.name, registered = self.registry.len(), "type registration done");
    }

    fn resolve_validity<'s>(
        &self,
        name: &'s str,
        declared: &BTreeMap<&'s str, &'s TypeNode>,
        valid: &mut BTreeMap<&'s str, bool>,
        visiting: &mut BTreeSet<&'s str>,
    ) -> bool {
        if let Some(known) = valid.get(name) {
            return *known;
        }
        let Some(&node) = declared.get(name) else {
            return false;
        };
        if self.registry.exists(name) || !visiting.insert(name) {
            valid.insert(name, false);
            return false;
        }

        let base = node.base_type.as_str();
        // A registered base is usable even when the schema redeclares it.
        let result = self.registry.exists(base)
            || (declared.contains_key(base)
                && self.resolve_validity(base, declared, valid, visiting));
        visiting.remove(name);
        valid.insert(name, result);
        result
    }
}

fn bind_type(symbols: &mut SymbolTable, node: &TypeNode) {
    let kinds: Vec<&str> = node
        .constraints
        .iter()
        .map(|constraint| constraint.constraint_type.as_str())
        .collect();
    symbols.add_symbol(
        Symbol::new(&node.name, SymbolKind::Type, node.position())
            .with_type(&node.base_type)
            .with_attribute("constraints", json!(kinds)),
    );
}

fn bind_table(symbols: &mut SymbolTable, table: &TableNode) {
    symbols.add_symbol(
        Symbol::new(&table.name, SymbolKind::Table, table.position())
            .with_attribute("fields", json!(table.fields.len())),
    );
    symbols.enter_scope(&table.name);
    for field in &table.fields {
        let mut symbol = Symbol::new(&field.name, SymbolKind::Field, field.position())
            .with_type(&field.data_type)
            .with_attribute("nullable", json!(field.nullable));
        if let Some(default) = &field.default_value {
            symbol = symbol.with_attribute("default_value", default.clone());
        }
        symbols.add_symbol(symbol);
        for constraint in &field.constraints {
            bind_constraint(symbols, constraint);
        }
    }
    for constraint in &table.constraints {
        bind_constraint(symbols, constraint);
    }
    symbols.exit_scope();
}

fn bind_constraint(symbols: &mut SymbolTable, constraint: &ConstraintNode) {
    symbols.add_symbol(
        Symbol::new(&constraint.name, SymbolKind::Constraint, constraint.position())
            .with_type(&constraint.constraint_type)
            .with_attribute("parameters", json!(constraint.parameters)),
    );
}
