mod config;
mod input;
mod logging;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use config::{OutputFormat, Settings, load_settings};
use testdatagen_core::{
    AST_VERSION, DatasetChecker, Error as CoreError, TypeCategory, ValidatorRegistry,
    build_fk_graph_report,
};
use testdatagen_semantic::{SemanticAnalyzer, Validator, has_errors};
use thiserror::Error;

#[derive(Debug, Error)]
enum CliError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("settings error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("core error: {0}")]
    Core(#[from] CoreError),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("logging setup failed: {0}")]
    Logging(String),
    #[error("AST JSON Schema could not be compiled: {0}")]
    AstSchema(String),
    #[error("{} is not a valid AST document:\n  {}", path.display(), issues.join("\n  "))]
    AstShape { path: PathBuf, issues: Vec<String> },
    #[error("{} is not a valid dataset: {reason}", path.display())]
    Dataset { path: PathBuf, reason: String },
    #[error("unknown type category '{0}'")]
    UnknownCategory(String),
    #[error("validation failed: {errors} error(s), {warnings} warning(s)")]
    ValidationFailed { errors: usize, warnings: usize },
    #[error("foreign key cycle between tables: {}", .0.join(", "))]
    ForeignKeyCycle(Vec<String>),
    #[error("dataset rejected: {violations} error violation(s), {failures} constraint(s) not evaluated")]
    DatasetRejected { violations: usize, failures: usize },
}

type CliResult<T> = Result<T, CliError>;

#[derive(Parser, Debug)]
#[command(
    name = "testdatagen",
    version,
    about = "Semantic checks for testdatagen schemas"
)]
struct Cli {
    /// Settings file (defaults to ./testdatagen.toml when present).
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Output format; overrides the settings file.
    #[arg(long, global = true, value_enum)]
    format: Option<OutputFormat>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Analyze and validate a schema AST, printing diagnostics.
    Validate(ValidateArgs),
    /// List the registered types after analyzing a schema AST.
    Types(TypesArgs),
    /// Print the table generation order derived from foreign keys.
    Order(AstArgs),
    /// Check a dataset (table name to rows) against a schema AST.
    Check(CheckArgs),
    /// Print the JSON Schema of the AST document.
    AstSchema,
}

#[derive(Args, Debug)]
struct AstArgs {
    /// AST document produced by the schema parser.
    #[arg(value_name = "AST_JSON")]
    ast: PathBuf,
}

#[derive(Args, Debug)]
struct ValidateArgs {
    #[command(flatten)]
    input: AstArgs,
    /// Exit non-zero when warnings are reported.
    #[arg(long, default_value_t = false)]
    fail_on_warnings: bool,
}

#[derive(Args, Debug)]
struct TypesArgs {
    #[command(flatten)]
    input: AstArgs,
    /// Only list types of this category (primitive, composite, custom).
    #[arg(long)]
    category: Option<String>,
}

#[derive(Args, Debug)]
struct CheckArgs {
    #[command(flatten)]
    input: AstArgs,
    /// Dataset document: `{ "table": [ { "field": value, ... } ] }`.
    #[arg(long, value_name = "ROWS_JSON")]
    data: PathBuf,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "command failed");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> CliResult<()> {
    let settings = load_settings(cli.config.as_deref())?;
    logging::init_logging(&settings.logging)?;
    let format = cli.format.unwrap_or(settings.validation.output);
    tracing::debug!(ast_version = AST_VERSION, ?format, "settings loaded");

    match cli.command {
        Command::Validate(args) => run_validate(args, &settings, format),
        Command::Types(args) => run_types(args, format),
        Command::Order(args) => run_order(args, format),
        Command::Check(args) => run_check(args, format),
        Command::AstSchema => {
            println!("{}", serde_json::to_string_pretty(&input::ast_json_schema()?)?);
            Ok(())
        }
    }
}

fn run_validate(args: ValidateArgs, settings: &Settings, format: OutputFormat) -> CliResult<()> {
    let schema = input::load_ast(&args.input.ast)?;
    let diagnostics = Validator::default().validate(&schema);
    output::print_diagnostics(&schema.name, &diagnostics, format)?;

    let errors = diagnostics.iter().filter(|d| d.is_error()).count();
    let warnings = diagnostics.len() - errors;
    let fail_on_warnings = args.fail_on_warnings || settings.validation.fail_on_warnings;
    if errors > 0 || (fail_on_warnings && warnings > 0) {
        return Err(CliError::ValidationFailed { errors, warnings });
    }
    tracing::info!(schema = %schema.name, warnings, "schema accepted");
    Ok(())
}

fn run_types(args: TypesArgs, format: OutputFormat) -> CliResult<()> {
    let category = args
        .category
        .as_deref()
        .map(|raw| TypeCategory::parse(raw).ok_or_else(|| CliError::UnknownCategory(raw.to_string())))
        .transpose()?;

    let schema = input::load_ast(&args.input.ast)?;
    let mut analyzer = SemanticAnalyzer::default();
    let diagnostics = analyzer.analyze(&schema);
    if !diagnostics.is_empty() {
        tracing::warn!(
            schema = %schema.name,
            diagnostics = diagnostics.len(),
            "analysis reported diagnostics; listing the types that registered"
        );
    }
    output::print_types(&analyzer.registry().list(category), format)
}

fn run_order(args: AstArgs, format: OutputFormat) -> CliResult<()> {
    let schema = input::load_ast(&args.ast)?;
    let report = build_fk_graph_report(&schema);
    output::print_order(&report, format)?;
    match report.cycle {
        Some(cycle) => Err(CliError::ForeignKeyCycle(cycle)),
        None => Ok(()),
    }
}

fn run_check(args: CheckArgs, format: OutputFormat) -> CliResult<()> {
    let schema = input::load_ast(&args.input.ast)?;
    let mut analyzer = SemanticAnalyzer::default();
    let diagnostics = analyzer.analyze(&schema);
    if has_errors(&diagnostics) {
        output::print_diagnostics(&schema.name, &diagnostics, format)?;
        let errors = diagnostics.iter().filter(|d| d.is_error()).count();
        return Err(CliError::ValidationFailed {
            errors,
            warnings: diagnostics.len() - errors,
        });
    }

    let data = input::load_rows(&args.data)?;
    let validators = ValidatorRegistry::new();
    let report = DatasetChecker::new(&schema, analyzer.registry())
        .with_validators(&validators)
        .check(&data)?;
    output::print_dataset_report(&report, format)?;

    let violations = report.error_count();
    if violations > 0 || !report.failures.is_empty() {
        return Err(CliError::DatasetRejected {
            violations,
            failures: report.failures.len(),
        });
    }
    Ok(())
}
