use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use schema_cast_catalog::{SchemaBundle, SchemaCatalog, read_definition};
use schema_cast_core::{
    CoercionRegistry, CompileOptions, DocumentCaster, DocumentOptions, ErrorPolicy, FilterCaster,
    SchemaIndex, UpdateCaster, UpdateOptions, compile_definition,
};
use serde_json::Value;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const PACKAGE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Log filter used when neither `--log-level` nor `RUST_LOG` parses.
const DEFAULT_LOG_LEVEL: &str = "warn";

/// Exit status for a document cast that recorded errors.
const EXIT_CAST_ERRORS: i32 = 2;

#[derive(Debug, Parser)]
#[command(name = "schema-cast")]
#[command(about = "Cast documents, query filters and updates against a schema definition")]
#[command(version)]
struct Cli {
    /// Log filter (trace, debug, info, warn, error or a RUST_LOG directive).
    /// Falls back to `RUST_LOG`, then to `warn`.
    #[arg(long, global = true)]
    log_level: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Cast a document, collecting every failure.
    Document(DocumentArgs),
    /// Cast a query filter.
    Filter(FilterArgs),
    /// Cast an update expression.
    Update(UpdateArgs),
    /// Print the compiled path index of a definition.
    Paths(PathsArgs),
    /// Compile definition files and/or directories.
    Validate(ValidateArgs),
    /// Bundle definition files into a hash-sealed schema bundle.
    Bundle(BundleArgs),
}

#[derive(Debug, Args)]
struct SchemaArgs {
    /// Schema definition file (JSON or YAML).
    #[arg(long)]
    schema: PathBuf,
    /// Do not declare `_id` as an ObjectId implicitly.
    #[arg(long)]
    no_implicit_id: bool,
}

#[derive(Debug, Args)]
struct DocumentArgs {
    #[command(flatten)]
    schema: SchemaArgs,
    /// Input JSON file (default: stdin).
    #[arg(long)]
    input: Option<PathBuf>,
    /// Stop at the first failure.
    #[arg(long)]
    fail_fast: bool,
    /// Prune unknown paths without converting values.
    #[arg(long)]
    no_coerce: bool,
    /// Exit 0 even when casting recorded errors.
    #[arg(long)]
    allow_errors: bool,
}

#[derive(Debug, Args)]
struct FilterArgs {
    #[command(flatten)]
    schema: SchemaArgs,
    /// Input JSON file (default: stdin).
    #[arg(long)]
    input: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct UpdateArgs {
    #[command(flatten)]
    schema: SchemaArgs,
    /// Input JSON file (default: stdin).
    #[arg(long)]
    input: Option<PathBuf>,
    /// Treat a field-form update as a full replacement instead of `$set`.
    #[arg(long)]
    overwrite: bool,
}

#[derive(Debug, Args)]
struct PathsArgs {
    #[command(flatten)]
    schema: SchemaArgs,
}

#[derive(Debug, Args)]
struct ValidateArgs {
    /// Definition files and/or directories containing definition files.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,
}

#[derive(Debug, Args)]
struct BundleArgs {
    /// Definition files and/or directories containing definition files.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,
    /// Output JSON bundle path.
    #[arg(long)]
    output: PathBuf,
    /// Optional bundle name metadata.
    #[arg(long)]
    name: Option<String>,
}

/// How a successful handler wants the process to end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    Clean,
    CastErrors,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_level.as_deref());

    let result = match cli.command {
        Command::Document(args) => run_document(args),
        Command::Filter(args) => run_filter(args).map(|()| Status::Clean),
        Command::Update(args) => run_update(args).map(|()| Status::Clean),
        Command::Paths(args) => run_paths(args).map(|()| Status::Clean),
        Command::Validate(args) => run_validate(args).map(|()| Status::Clean),
        Command::Bundle(args) => run_bundle(args).map(|()| Status::Clean),
    };

    match result {
        Ok(Status::Clean) => {}
        Ok(Status::CastErrors) => std::process::exit(EXIT_CAST_ERRORS),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(1);
        }
    }
}

/// Logs go to stderr so stdout only ever carries JSON.
fn init_logging(level: Option<&str>) {
    tracing_subscriber::registry()
        .with(log_filter(level))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn log_filter(level: Option<&str>) -> EnvFilter {
    let filter = match level {
        Some(level) => EnvFilter::try_new(level).ok(),
        None => EnvFilter::try_from_default_env().ok(),
    };
    filter.unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG_LEVEL))
}

fn run_document(args: DocumentArgs) -> Result<Status, String> {
    let index = load_index(&args.schema)?;
    let value = read_input(args.input.as_deref())?;

    let options = DocumentOptions {
        policy: if args.fail_fast {
            ErrorPolicy::FailFast
        } else {
            ErrorPolicy::Accumulate
        },
        coerce: !args.no_coerce,
        ..DocumentOptions::default()
    };
    let outcome = DocumentCaster::with_options(&index, options).cast(value);
    print_json(&outcome.value)?;

    let Some(errors) = outcome.errors else {
        return Ok(Status::Clean);
    };
    let raw = serde_json::to_string_pretty(&errors)
        .map_err(|err| format!("Failed to serialize cast errors: {err}"))?;
    eprintln!("{raw}");

    if args.allow_errors {
        Ok(Status::Clean)
    } else {
        Ok(Status::CastErrors)
    }
}

fn run_filter(args: FilterArgs) -> Result<(), String> {
    let index = load_index(&args.schema)?;
    let mut filter = read_input(args.input.as_deref())?;
    FilterCaster::new(&index)
        .cast(&mut filter)
        .map_err(|err| err.to_string())?;
    print_json(&filter)
}

fn run_update(args: UpdateArgs) -> Result<(), String> {
    let index = load_index(&args.schema)?;
    let update = read_input(args.input.as_deref())?;
    let options = UpdateOptions {
        overwrite: args.overwrite,
    };
    let cast = UpdateCaster::with_options(&index, options)
        .cast(update)
        .map_err(|err| err.to_string())?;
    print_json(&cast)
}

fn run_paths(args: PathsArgs) -> Result<(), String> {
    let index = load_index(&args.schema)?;
    for (path, entry) in index.entries() {
        match &entry.declared_type {
            Some(ty) => println!("{path}\t{ty}"),
            None => println!("{path}\tuntyped"),
        }
    }
    Ok(())
}

fn run_validate(args: ValidateArgs) -> Result<(), String> {
    let mut files = 0usize;
    let mut paths = 0usize;

    for input in &args.inputs {
        let catalog = if input.is_dir() {
            SchemaCatalog::from_dir(input)
        } else {
            SchemaCatalog::from_file(input)
        }
        .map_err(|err| format!("'{}': {err}", input.display()))?;

        for collection in catalog.collections() {
            let index = catalog.index(collection).map_err(|err| err.to_string())?;
            debug!(collection, paths = index.len(), "validated definition");
            files += 1;
            paths += index.len();
        }
    }

    println!("Validated {files} definition(s) declaring {paths} path(s).");
    Ok(())
}

fn run_bundle(args: BundleArgs) -> Result<(), String> {
    let generated_at = chrono::Utc::now().to_rfc3339();
    let mut bundle = SchemaBundle::new(PACKAGE_VERSION, generated_at);
    bundle.name = args.name;
    let registry = CoercionRegistry::default();

    for path in collect_definition_paths(&args.inputs)? {
        let definition = read_definition(&path)
            .map_err(|err| format!("Failed to read '{}': {err}", path.display()))?;
        compile_definition(&definition, &registry, &CompileOptions::default())
            .map_err(|err| format!("'{}': {err}", path.display()))?;

        let collection = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| format!("'{}' has no usable file name", path.display()))?;
        if bundle.collections.contains_key(collection) {
            return Err(format!("Duplicate collection '{collection}'"));
        }
        bundle.insert(collection, definition);
    }

    bundle
        .seal()
        .map_err(|err| format!("Failed to hash bundle: {err}"))?;

    if let Some(parent) = args.output.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|err| {
                format!(
                    "Failed to create output directory '{}': {err}",
                    parent.display()
                )
            })?;
        }
    }
    bundle
        .save(&args.output)
        .map_err(|err| format!("Failed to write '{}': {err}", args.output.display()))?;

    info!(path = %args.output.display(), collections = bundle.collection_count(), "wrote bundle");
    println!(
        "Bundled {} collection(s) into '{}'.",
        bundle.collection_count(),
        args.output.display()
    );
    Ok(())
}

fn load_index(args: &SchemaArgs) -> Result<SchemaIndex, String> {
    let definition = read_definition(&args.schema)
        .map_err(|err| format!("Failed to read '{}': {err}", args.schema.display()))?;
    let options = CompileOptions {
        implicit_id: !args.no_implicit_id,
    };
    compile_definition(&definition, &CoercionRegistry::default(), &options)
        .map_err(|err| format!("Invalid schema '{}': {err}", args.schema.display()))
}

fn read_input(path: Option<&Path>) -> Result<Value, String> {
    let raw = match path {
        Some(path) => fs::read_to_string(path)
            .map_err(|err| format!("Failed to read '{}': {err}", path.display()))?,
        None => {
            let mut raw = String::new();
            std::io::stdin()
                .read_to_string(&mut raw)
                .map_err(|err| format!("Failed to read stdin: {err}"))?;
            raw
        }
    };
    serde_json::from_str(&raw).map_err(|err| format!("Invalid JSON input: {err}"))
}

fn print_json(value: &Value) -> Result<(), String> {
    let raw = serde_json::to_string_pretty(value)
        .map_err(|err| format!("Failed to serialize output: {err}"))?;
    println!("{raw}");
    Ok(())
}

/// Expands directories into their definition files, sorted by name.
fn collect_definition_paths(inputs: &[PathBuf]) -> Result<Vec<PathBuf>, String> {
    let mut paths = Vec::new();
    for input in inputs {
        if !input.is_dir() {
            paths.push(input.clone());
            continue;
        }
        let entries = fs::read_dir(input)
            .map_err(|err| format!("Failed to read directory '{}': {err}", input.display()))?;
        let mut found: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file() && is_definition_file(path))
            .collect();
        found.sort();
        paths.extend(found);
    }
    Ok(paths)
}

fn is_definition_file(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("json" | "yaml" | "yml")
    )
}
