use serde::Serialize;
use serde_json::json;
use testdatagen_core::{DatasetReport, FkGraphReport, Type};
use testdatagen_semantic::{Diagnostic, DiagnosticCategory};

use crate::CliResult;
use crate::config::OutputFormat;

pub fn print_diagnostics(
    schema: &str,
    diagnostics: &[Diagnostic],
    format: OutputFormat,
) -> CliResult<()> {
    match format {
        OutputFormat::Json => {
            let entries: Vec<_> = diagnostics
                .iter()
                .map(|diagnostic| {
                    json!({
                        "category": diagnostic.category(),
                        "code": diagnostic.code,
                        "severity": diagnostic.severity,
                        "line": diagnostic.line,
                        "column": diagnostic.column,
                        "message": diagnostic.message,
                    })
                })
                .collect();
            print_json(&json!({
                "schema": schema,
                "diagnostics": entries,
            }))
        }
        OutputFormat::Text => {
            for category in [DiagnosticCategory::Semantic, DiagnosticCategory::Validation] {
                let mut grouped = diagnostics
                    .iter()
                    .filter(|diagnostic| diagnostic.category() == category)
                    .peekable();
                if grouped.peek().is_none() {
                    continue;
                }
                println!("{category}:");
                for diagnostic in grouped {
                    println!("  {schema}:{diagnostic}");
                }
            }
            let errors = diagnostics.iter().filter(|d| d.is_error()).count();
            println!(
                "{schema}: {errors} error(s), {} warning(s)",
                diagnostics.len() - errors
            );
            Ok(())
        }
    }
}

pub fn print_types(types: &[&Type], format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(&types),
        OutputFormat::Text => {
            for ty in types {
                match ty.as_custom() {
                    Some(custom) => println!(
                        "{}\t{}\t{} ({} constraint(s))",
                        ty.name(),
                        ty.category(),
                        custom.base_type,
                        custom.constraints.len()
                    ),
                    None => println!("{}\t{}", ty.name(), ty.category()),
                }
            }
            Ok(())
        }
    }
}

pub fn print_order(report: &FkGraphReport, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(report),
        OutputFormat::Text => {
            if let Some(order) = &report.topo_order {
                for (position, table) in order.iter().enumerate() {
                    println!("{}\t{table}", position + 1);
                }
            }
            if let Some(cycle) = &report.cycle {
                println!("foreign key cycle: {}", cycle.join(", "));
            }
            Ok(())
        }
    }
}

pub fn print_dataset_report(report: &DatasetReport, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(report),
        OutputFormat::Text => {
            for violation in &report.violations {
                println!(
                    "{}[{}]{}: {}[{}] {}: {}",
                    violation.table,
                    violation.row,
                    field_suffix(violation.field.as_deref()),
                    violation.severity,
                    violation.kind,
                    violation.constraint,
                    violation.message
                );
            }
            for failure in &report.failures {
                println!(
                    "{}[{}]{}: not evaluated [{}] {}: {}",
                    failure.table,
                    failure.row,
                    field_suffix(failure.field.as_deref()),
                    failure.kind,
                    failure.constraint,
                    failure.reason
                );
            }
            for table in &report.unknown_tables {
                println!("{table}: not declared in schema, rows ignored");
            }
            println!(
                "{} table(s), {} row(s): {} violation(s), {} not evaluated",
                report.tables_checked,
                report.rows_checked,
                report.violations.len(),
                report.failures.len()
            );
            Ok(())
        }
    }
}

fn field_suffix(field: Option<&str>) -> String {
    field.map(|name| format!(".{name}")).unwrap_or_default()
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> CliResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
