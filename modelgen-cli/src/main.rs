//! # modelgen
//!
//! CLI tool for generating object-model modules from meta-model documents.
//!
//! ## Usage
//!
//! ```bash
//! # Generate a module to standard output
//! modelgen generate models/uml.json -r models/uml.override
//!
//! # Generate SysML on top of UML, importing the UML types
//! modelgen generate models/sysml.json -s UML:models/uml.json -o sysml.py
//!
//! # Watch the inputs and regenerate
//! modelgen generate --watch
//!
//! # Dry run to preview changes
//! modelgen generate --dry-run -o uml.py
//!
//! # Initialize configuration
//! modelgen init
//!
//! # Validate a generated module is up-to-date
//! modelgen validate --path gaphor/UML/uml.py
//! ```

use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use modelgen::Warning;
use modelgen_cli::{
    config::{CliArgs, Config, ConfigManager, CONFIG_FILENAME},
    error::CliError,
    generator::ModuleGenerator,
    watcher::FileWatcher,
    writer::{is_current, FileWriter, WriteResult},
};

#[derive(Parser)]
#[command(name = "modelgen")]
#[command(author, version, about = "Generate object-model modules from meta-model documents", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Inputs shared by `generate` and `validate`.
#[derive(Args, Debug)]
struct InputArgs {
    /// Model document (JSON); defaults to [input] model
    model: Option<PathBuf>,

    /// Override file
    #[arg(short = 'r', long)]
    overrides: Option<PathBuf>,

    /// Super model to import generated classes from, as LANG:FILE
    #[arg(short = 's', long = "super-model", value_name = "LANG:FILE")]
    super_models: Vec<String>,

    /// Prefix of default super-model module paths
    #[arg(long)]
    module_prefix: Option<String>,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a module from a model document
    Generate {
        #[command(flatten)]
        input: InputArgs,

        /// Output file; standard output when neither this nor [output] file is set
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Watch the input files and regenerate
        #[arg(short, long)]
        watch: bool,

        /// Preview changes without writing files
        #[arg(long)]
        dry_run: bool,
    },

    /// Initialize a new modelgen configuration file
    Init {
        /// Output path for configuration file
        #[arg(short, long, default_value = CONFIG_FILENAME)]
        output: PathBuf,

        /// Overwrite existing configuration file
        #[arg(long)]
        force: bool,
    },

    /// Validate that a generated module is up-to-date
    Validate {
        /// Path to the generated module
        #[arg(short, long)]
        path: PathBuf,

        #[command(flatten)]
        input: InputArgs,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            print_error(&e);
            match e {
                CliError::Validation(_) => ExitCode::from(2),
                _ => ExitCode::FAILURE,
            }
        }
    }
}

/// Log to stderr; `RUST_LOG` wins over `-v`. Generation warnings are
/// printed with the summary, so the quiet default stops at errors.
fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "error",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .init();
}

fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Commands::Generate {
            input,
            output,
            watch,
            dry_run,
        } => cmd_generate(input, output, watch, dry_run),

        Commands::Init { output, force } => cmd_init(output, force),

        Commands::Validate { path, input } => cmd_validate(path, input),
    }
}

/// Load the configuration and apply the command-line inputs.
fn load_config(input: InputArgs, output: Option<PathBuf>) -> Result<Config, CliError> {
    let config = ConfigManager::load(input.config.as_deref())?;
    let config = ConfigManager::merge_cli_args(
        config,
        &CliArgs {
            model: input.model,
            overrides: input.overrides,
            super_models: input.super_models,
            output,
            module_prefix: input.module_prefix,
        },
    );
    // Surface malformed super models before any file is read.
    config.super_models()?;
    Ok(config)
}

/// Generate command implementation.
fn cmd_generate(
    input: InputArgs,
    output: Option<PathBuf>,
    watch: bool,
    dry_run: bool,
) -> Result<(), CliError> {
    let config = load_config(input, output)?;

    if watch {
        run_watch_mode(&config, dry_run)
    } else {
        run_generate(&config, dry_run)
    }
}

/// Run module generation once.
fn run_generate(config: &Config, dry_run: bool) -> Result<(), CliError> {
    eprintln!("{}", "Generating module...".cyan());

    let generator = ModuleGenerator::new(config.clone());
    let Some(ref output_path) = config.output.file else {
        let warnings = generator.generate_to(std::io::stdout().lock())?;
        print_warnings(&warnings);
        return Ok(());
    };

    let output = generator.generate()?;
    eprintln!(
        "  Generated {} class(es)",
        output.classes.len().to_string().green()
    );
    print_warnings(&output.warnings);

    let writer = FileWriter::new(dry_run);

    match writer.write(output_path, &output.content())? {
        WriteResult::Written { path, bytes } => {
            eprintln!(
                "{} Written {} bytes to {}",
                "✓".green(),
                bytes,
                path.display()
            );
        }
        WriteResult::Unchanged { path } => {
            eprintln!("{} {} is up-to-date", "✓".green(), path.display());
        }
        WriteResult::DryRun { content, path } => {
            eprintln!(
                "{} Would write to {}:",
                "[dry-run]".yellow(),
                path.display()
            );
            eprintln!("{}", "─".repeat(60).dimmed());
            eprintln!("{}", content);
            eprintln!("{}", "─".repeat(60).dimmed());
        }
    }

    Ok(())
}

/// Run in watch mode.
fn run_watch_mode(config: &Config, dry_run: bool) -> Result<(), CliError> {
    let files = config.input_files()?;

    eprintln!("{}", "Starting watch mode...".cyan());
    for file in &files {
        eprintln!("  Watching: {}", file.display());
    }
    eprintln!("  Press Ctrl+C to stop\n");

    if let Err(e) = run_generate(config, dry_run) {
        eprintln!("{} {}", "Generation error:".red(), e);
    }

    let watcher = FileWatcher::new(files);
    let (_debouncer, rx) = watcher.watch()?;

    eprintln!("\n{}", "Watching for changes...".cyan());

    while let Ok(event) = rx.recv() {
        if event.is_error() {
            eprintln!(
                "{} {}",
                "Watch error:".red(),
                event.error_message().unwrap_or("Unknown error")
            );
            continue;
        }

        if let Some(path) = event.path() {
            eprintln!("\n{} {}", "File changed:".cyan(), path.display());
        }

        if let Err(e) = run_generate(config, dry_run) {
            eprintln!("{} {}", "Generation error:".red(), e);
        }

        eprintln!("\n{}", "Watching for changes...".cyan());
    }

    Ok(())
}

/// Init command implementation.
fn cmd_init(output: PathBuf, force: bool) -> Result<(), CliError> {
    if output.exists() && !force {
        return Err(CliError::Validation(format!(
            "Configuration file already exists: {} (use --force to overwrite)",
            output.display()
        )));
    }

    let content = ConfigManager::default_config_content();
    std::fs::write(&output, content)?;

    eprintln!(
        "{} Created configuration file: {}",
        "✓".green(),
        output.display()
    );

    Ok(())
}

/// Validate command implementation.
fn cmd_validate(module_path: PathBuf, input: InputArgs) -> Result<(), CliError> {
    eprintln!("{}", "Validating module...".cyan());

    if !module_path.exists() {
        return Err(CliError::Validation(format!(
            "Generated module not found: {}",
            module_path.display()
        )));
    }

    let config = load_config(input, None)?;
    let output = ModuleGenerator::new(config).generate()?;
    print_warnings(&output.warnings);

    if is_current(&module_path, &output.content()) {
        eprintln!("{} Module is up-to-date", "✓".green());
        Ok(())
    } else {
        eprintln!("{} Module is out of date", "✗".red());
        eprintln!("  Run 'modelgen generate' to update");
        Err(CliError::Validation("Module is out of date".to_string()))
    }
}

fn print_warnings(warnings: &[Warning]) {
    if warnings.is_empty() {
        return;
    }
    eprintln!("{} {} warning(s):", "Warning:".yellow(), warnings.len());
    for warning in warnings {
        eprintln!("  {}", warning);
    }
}

/// Print an error with formatting.
fn print_error(error: &CliError) {
    eprintln!("{} {}", "Error:".red().bold(), error);
}
