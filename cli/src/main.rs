use std::fs;
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use rayon::prelude::*;
use thiserror::Error;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use gram_tl::{value_to_json, CodecError, Registry};
use gram_tl_compiler::{compile_file, reader::StreamReader, render_rust, tokenizer::tokenize, GramError, Settings};

#[derive(Parser)]
#[command(name = "gramtl")]
#[command(about = "Tokenize, plan, decode, or generate Rust from TL schemas", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone)]
struct SettingsArgs {
    /// JSON settings file (`outputNamespace`, `symbolPrefix`, `vectorFramingTag`)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Module the generated code is wrapped in
    #[arg(long)]
    namespace: Option<String>,

    /// Prefix for every generated type name, e.g. `TL_`
    #[arg(long)]
    prefix: Option<String>,

    /// Vector framing tag as hex
    #[arg(long)]
    vector_tag: Option<String>,
}

impl SettingsArgs {
    fn settings(&self) -> Result<Settings, GramError> {
        let mut settings = match &self.config {
            Some(path) => Settings::load(path)?,
            None => Settings::default(),
        };
        if let Some(namespace) = &self.namespace {
            settings.output_namespace = namespace.clone();
        }
        if let Some(prefix) = &self.prefix {
            settings.symbol_prefix = prefix.clone();
        }
        if let Some(tag) = &self.vector_tag {
            settings.vector_framing_tag = tag.clone();
        }
        settings.vector_tag()?;
        Ok(settings)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Print the token stream of a `.tl` file as JSON
    Tokens {
        /// Input `.tl` file
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Print definitions, child map and generation plans of a `.tl` file as JSON
    Plan {
        /// Input `.tl` file
        #[arg(short, long)]
        input: PathBuf,

        #[command(flatten)]
        settings: SettingsArgs,
    },

    /// Generate Rust code from a single `.tl` schema
    GenRust {
        /// Input `.tl` schema file
        #[arg(short, long)]
        input: PathBuf,

        /// Output `.rs` file (if omitted, prints to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        settings: SettingsArgs,
    },

    /// Generate one `.rs` file per `.tl` file found under a directory
    Generate {
        /// Directory searched recursively for `.tl` files
        #[arg(short, long, default_value = "src/main/tl")]
        source_dir: PathBuf,

        /// Output directory, deleted and recreated on every run
        #[arg(short, long)]
        output_dir: PathBuf,

        #[command(flatten)]
        settings: SettingsArgs,
    },

    /// Decode a binary TL object against a schema and print it as JSON
    Decode {
        /// Input `.tl` schema file
        #[arg(short, long)]
        input: PathBuf,

        /// Generated type name whose entry point decodes the data
        #[arg(short = 't', long = "type")]
        type_name: String,

        /// Binary file holding the object, constructor id first
        #[arg(short, long)]
        data: PathBuf,

        /// Decode as the response to a request of `--type`
        #[arg(long)]
        response: bool,

        /// Fail on unknown constructors and bad vector tags instead of skipping
        #[arg(long)]
        exception: bool,

        #[command(flatten)]
        settings: SettingsArgs,
    },
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Compile(#[from] GramError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("Invalid source pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("Constructor not recognized by {0}")]
    NoMatch(String),

    #[error("{failed} of {total} schema file(s) failed to generate")]
    Generate { failed: usize, total: usize },
}

impl From<std::io::Error> for CliError {
    fn from(e: std::io::Error) -> CliError {
        CliError::Compile(GramError::Io(e))
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> CliError {
        CliError::Compile(GramError::Json(e))
    }
}

/// Compiles and renders one schema file into `output`.
fn generate_one(input: &Path, output: &Path, settings: &Settings) -> Result<(), GramError> {
    let unit = compile_file(input, settings)?;
    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(output, render_rust(&unit, settings))?;
    info!(input = %input.display(), output = %output.display(), plans = unit.plans.len(), "generated");
    Ok(())
}

fn generate(source_dir: &Path, output_dir: &Path, settings: &Settings) -> Result<(), CliError> {
    if output_dir.exists() {
        debug!(dir = %output_dir.display(), "removing stale output");
        fs::remove_dir_all(output_dir)?;
    }
    fs::create_dir_all(output_dir)?;

    let pattern = source_dir.join("**").join("*.tl");
    let mut inputs = Vec::new();
    for entry in glob::glob(&pattern.to_string_lossy())? {
        match entry {
            Ok(path) => inputs.push(path),
            Err(e) => error!(path = %e.path().display(), error = %e.error(), "unreadable schema path"),
        }
    }
    inputs.sort();

    let failed = inputs
        .par_iter()
        .filter(|input| {
            let relative = input.strip_prefix(source_dir).unwrap_or(input.as_path());
            let output = output_dir.join(relative).with_extension("rs");
            match generate_one(input, &output, settings) {
                Ok(()) => false,
                Err(e) => {
                    error!(input = %input.display(), error = %e, "schema failed to generate");
                    true
                }
            }
        })
        .count();

    println!("Generated {} of {} schema file(s) into {}", inputs.len() - failed, inputs.len(), output_dir.display());
    if failed > 0 {
        return Err(CliError::Generate { failed, total: inputs.len() });
    }
    Ok(())
}

fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Tokens { input } => {
            let tokens = tokenize(&mut StreamReader::new(fs::File::open(input)?))?;
            println!("{}", serde_json::to_string_pretty(&tokens)?);
            Ok(())
        }

        Commands::Plan { input, settings } => {
            let unit = compile_file(input, &settings.settings()?)?;
            println!("{}", unit.to_json()?);
            Ok(())
        }

        Commands::GenRust { input, output, settings } => {
            let settings = settings.settings()?;
            let unit = compile_file(input, &settings)?;
            let rust_code = render_rust(&unit, &settings);
            if let Some(out_path) = output {
                fs::write(out_path, &rust_code)?;
                println!("Generated Rust code written to {}", out_path.display());
            } else {
                println!("{}", rust_code);
            }
            Ok(())
        }

        Commands::Generate { source_dir, output_dir, settings } => {
            generate(source_dir, output_dir, &settings.settings()?)
        }

        Commands::Decode { input, type_name, data, response, exception, settings } => {
            let unit = compile_file(input, &settings.settings()?)?;
            let registry = Registry::from_unit(&unit);
            let bytes = fs::read(data)?;
            let value = if *response {
                registry.decode_response(&bytes, type_name, *exception)?
            } else {
                registry.decode(&bytes, type_name, *exception)?
            };
            let value = value.ok_or_else(|| CliError::NoMatch(type_name.clone()))?;
            println!("{}", serde_json::to_string_pretty(&value_to_json(&value))?);
            Ok(())
        }
    }
}
