//! Ion Schema CLI
//!
//! Command-line interface for linting, loading and formatting Ion Schema
//! documents.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use ion_schema::authority::authority_for;
use ion_schema::element::parse;
use ion_schema::reader::IonSchemaReader;
use ion_schema::system::IonSchemaSystem;
use ion_schema::writer::{IonSchemaWriter, TextSink};
use ion_schema::{lint, FileStatus, IonSchemaError, Severity};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ion-schema")]
#[command(about = "Lint, load and format Ion Schema documents")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lint schema files for errors (syntax, read errors, unresolved imports)
    Lint {
        /// File or directory to lint
        path: PathBuf,

        /// Output format: text (default) or json
        #[arg(long, default_value = "text")]
        format: String,

        /// Treat warnings as errors
        #[arg(long)]
        strict: bool,

        /// Suppress progress output, only show errors
        #[arg(long, short)]
        quiet: bool,
    },

    /// Load a schema and its imports, then list its types
    Load {
        /// Schema id, relative to the base
        id: String,

        /// Directory or URL that schema ids are resolved against (repeat to
        /// consult several in order)
        #[arg(long = "base", default_value = ".")]
        bases: Vec<String>,

        /// Allow importing types that the imported schema only imports itself
        #[arg(long)]
        allow_transitive_imports: bool,

        /// Output results as JSON (for automation)
        #[arg(long)]
        json: bool,
    },

    /// Read a schema and write it back in canonical form
    Fmt {
        /// Schema file to format
        file: PathBuf,

        /// Output file (stdout if not specified)
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .with_target(false)
        .init();

    let result = match cli.command {
        Commands::Lint {
            path,
            format,
            strict,
            quiet,
        } => run_lint(&path, &format, strict, quiet),

        Commands::Load {
            id,
            bases,
            allow_transitive_imports,
            json,
        } => run_load(LoadArgs {
            id,
            bases,
            allow_transitive_imports,
            json_output: json,
        }),

        Commands::Fmt { file, output } => run_fmt(&file, output),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(code) => ExitCode::from(code),
    }
}

fn fail(e: IonSchemaError) -> u8 {
    eprintln!("Error: {}", e);
    e.exit_code() as u8
}

fn run_lint(path: &Path, format: &str, strict: bool, quiet: bool) -> Result<(), u8> {
    if !path.exists() {
        eprintln!("Error: path not found: {}", path.display());
        return Err(2);
    }

    let result = lint(path, strict);

    if format == "json" {
        let json = serde_json::to_string_pretty(&result).map_err(|e| {
            eprintln!("Error: {}", e);
            2u8
        })?;
        println!("{}", json);
    } else {
        // Text output
        if !quiet {
            println!("Linting {} ...\n", path.display());
        }

        for file_result in &result.results {
            let status_icon = match file_result.status {
                FileStatus::Ok => "\x1b[32m✓\x1b[0m",
                FileStatus::Warning => "\x1b[33m⚠\x1b[0m",
                FileStatus::Error => "\x1b[31m✗\x1b[0m",
            };

            if !quiet || file_result.status != FileStatus::Ok {
                println!("  {} {}", status_icon, file_result.file.display());
            }

            for diag in &file_result.diagnostics {
                let (color, label) = match diag.severity {
                    Severity::Error => ("\x1b[31m", "error"),
                    Severity::Warning => ("\x1b[33m", "warning"),
                };
                if !quiet || diag.severity == Severity::Error {
                    println!(
                        "    {}{}[{}]\x1b[0m: {} - {}",
                        color, label, diag.code, diag.path, diag.message
                    );
                }
            }
        }

        println!();
        if result.is_ok() && (!strict || result.warnings == 0) {
            println!(
                "\x1b[32m✓ {} files checked, all passed\x1b[0m",
                result.files_checked
            );
        } else {
            println!(
                "\x1b[31m✗ {} files checked: {} passed, {} failed ({} errors, {} warnings)\x1b[0m",
                result.files_checked, result.passed, result.failed, result.errors, result.warnings
            );
        }
    }

    if result.is_ok() && (!strict || result.warnings == 0) {
        Ok(())
    } else {
        Err(1)
    }
}

struct LoadArgs {
    id: String,
    bases: Vec<String>,
    allow_transitive_imports: bool,
    json_output: bool,
}

fn run_load(args: LoadArgs) -> Result<(), u8> {
    let authorities = args
        .bases
        .iter()
        .map(|base| authority_for(base))
        .collect::<Result<Vec<_>, _>>()
        .map_err(fail)?;
    let system = IonSchemaSystem::builder()
        .with_authorities(authorities)
        .allow_transitive_imports(args.allow_transitive_imports)
        .build();

    let schema = system.load_schema(&args.id).map_err(fail)?;
    let types: Vec<&str> = schema.declared_types().map(|t| t.name.as_str()).collect();
    let imports: Vec<&str> = schema.imports().map(|(id, _)| id).collect();

    if args.json_output {
        let output = serde_json::json!({
            "id": args.id,
            "version": schema.version().to_string(),
            "types": types,
            "imports": imports,
        });
        println!("{}", output);
    } else {
        println!("{} ({})", args.id, schema.version());
        for name in &types {
            println!("  type {}", name);
        }
        for id in &imports {
            println!("  import {}", id);
        }
    }
    Ok(())
}

fn run_fmt(file: &Path, output: Option<PathBuf>) -> Result<(), u8> {
    if !file.exists() {
        return Err(fail(IonSchemaError::FileNotFound {
            path: file.to_path_buf(),
        }));
    }
    let content = std::fs::read_to_string(file)
        .map_err(|source| IonSchemaError::Io {
            path: file.to_path_buf(),
            source,
        })
        .map_err(fail)?;
    let values = parse(&content).map_err(fail)?;

    let document = IonSchemaReader::new()
        .read_schema(&values, false)
        .map_err(|errors| {
            for error in &errors {
                eprintln!("Error: {}", error);
            }
            2u8
        })?;

    let out: Box<dyn Write> = match output {
        Some(path) => {
            let file = File::create(&path)
                .map_err(|source| IonSchemaError::Io { path, source })
                .map_err(fail)?;
            Box::new(BufWriter::new(file))
        }
        None => Box::new(io::stdout().lock()),
    };
    let mut sink = TextSink::new(out);
    IonSchemaWriter::new()
        .write_schema(&mut sink, &document)
        .map_err(fail)?;
    sink.into_inner()
        .flush()
        .map_err(|source| IonSchemaError::Output { source })
        .map_err(fail)
}
