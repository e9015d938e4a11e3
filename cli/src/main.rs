mod commands;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::EnvFilter;

use seqjobs::Config;

#[derive(Parser)]
#[command(name = "seqjobs")]
#[command(about = "Run containerized sequencing analyses as tracked jobs", long_about = None)]
#[command(version)]
struct Cli {
    /// Output format (json, pretty)
    #[arg(short, long, global = true, default_value = "pretty")]
    output: OutputFormat,

    /// Configuration file (JSON)
    #[arg(short, long, global = true, env = "SEQJOBS_CONFIG")]
    config: Option<PathBuf>,

    /// Directory holding job and upload history
    #[arg(long, global = true, env = "SEQJOBS_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    Json,
    Pretty,
}

#[derive(Subcommand)]
enum Commands {
    /// List registered analysts
    Analysts,

    /// Show one analyst's inputs and databases
    Analyst {
        /// Analyst name
        name: String,
    },

    /// List reference databases
    Databases {
        /// Only databases declared by this analyst
        #[arg(short, long)]
        analyst: Option<String>,
    },

    /// Register a local sequence file as an upload
    Register {
        /// Path to the input file
        path: PathBuf,
    },

    /// List registered uploads
    Uploads,

    /// Submit an analysis and follow it to completion
    Submit {
        /// Upload ID of the input file
        #[arg(short, long)]
        file_id: String,

        /// Analyst name
        #[arg(short, long)]
        analyst: String,

        /// Reference database name
        #[arg(short, long)]
        database: String,

        /// Directory under which the job output directory is created
        #[arg(long)]
        output_root: PathBuf,

        /// Job name
        #[arg(short, long)]
        name: Option<String>,

        /// Extra analyst input as key=value (repeatable)
        #[arg(long = "option", value_parser = parse_key_value)]
        options: Vec<(String, String)>,
    },

    /// List jobs, most recent first
    Jobs {
        /// Only jobs in this status
        #[arg(short, long)]
        status: Option<String>,
    },

    /// Show one job
    Job {
        /// Job ID
        job_id: String,
    },

    /// List the files a job produced
    Results {
        /// Job ID
        job_id: String,
    },
}

fn parse_key_value(raw: &str) -> std::result::Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected key=value, got '{}'", raw)),
    }
}

fn init_logging(verbose: bool) -> Result<()> {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr));
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to install tracing subscriber")?;

    // The library logs through the `log` facade.
    tracing_log::LogTracer::init().context("Failed to bridge log records")?;
    Ok(())
}

fn load_settings(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => seqjobs::load_config(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => Config::default(),
    };
    if let Some(data_dir) = &cli.data_dir {
        config.data_dir = data_dir.clone();
    }
    Ok(config)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose)?;

    let config = load_settings(&cli)?;
    log::debug!("Using data directory {}", config.data_dir.display());

    match commands::execute(&cli.command, &config) {
        Ok(output) => {
            print_output(&cli.output, &output)?;
            Ok(())
        }
        Err(e) => {
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            std::process::exit(1);
        }
    }
}

fn print_output(format: &OutputFormat, value: &serde_json::Value) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Pretty => print_pretty(value, 0),
    }
    Ok(())
}

fn print_pretty(value: &serde_json::Value, indent: usize) {
    let pad = "  ".repeat(indent);
    match value {
        serde_json::Value::Object(map) => {
            for (key, val) in map {
                let key_colored = key.cyan().bold();
                match val {
                    serde_json::Value::String(s) => println!("{}{}: {}", pad, key_colored, s.green()),
                    serde_json::Value::Number(n) => {
                        println!("{}{}: {}", pad, key_colored, n.to_string().yellow())
                    }
                    serde_json::Value::Bool(b) => {
                        let val_colored = if *b { "true".green() } else { "false".red() };
                        println!("{}{}: {}", pad, key_colored, val_colored);
                    }
                    serde_json::Value::Null => println!("{}{}: -", pad, key_colored),
                    nested => {
                        println!("{}{}:", pad, key_colored);
                        print_pretty(nested, indent + 1);
                    }
                }
            }
        }
        serde_json::Value::Array(arr) if arr.is_empty() => println!("{}(none)", pad),
        serde_json::Value::Array(arr) => {
            for (i, item) in arr.iter().enumerate() {
                match item {
                    serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                        println!("{}{}{}:", pad, "Item ".cyan(), (i + 1).to_string().yellow());
                        print_pretty(item, indent + 1);
                    }
                    scalar => println!("{}- {}", pad, scalar_text(scalar)),
                }
            }
        }
        scalar => println!("{}{}", pad, scalar_text(scalar)),
    }
}

fn scalar_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
