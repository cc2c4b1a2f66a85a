//! LVA CLI
//!
//! Compiles and validates video analytics pipeline definitions.

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

use commands::compile::CompileArgs;

/// lvac - Video analytics pipeline compiler
#[derive(Parser)]
#[command(name = "lvac")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Project file path (defaults to ./lva.yaml when present)
    #[arg(short, long, env = "LVA_CONFIG")]
    config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile an analysis definition
    Compile(CompileArgs),

    /// Parse and type-check an analysis definition without generating output
    Validate {
        /// Analysis definition file
        input: String,

        /// Attribute override (analyzer:attribute=value), repeatable
        #[arg(long = "attr", value_name = "OVERRIDE")]
        attrs: Vec<String>,
    },

    /// Inspect the operator catalog
    Operators {
        #[command(subcommand)]
        command: OperatorCommands,
    },
}

#[derive(Subcommand)]
enum OperatorCommands {
    /// List all operators
    List,

    /// Show an operator's signature
    Show {
        /// Operator name
        name: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = cli.config.as_deref();
    match cli.command {
        Commands::Compile(args) => {
            commands::compile::run(config, &args)?;
        }
        Commands::Validate { input, attrs } => {
            commands::validate::run(config, &input, &attrs)?;
        }
        Commands::Operators { command } => match command {
            OperatorCommands::List => {
                commands::operators::list(config)?;
            }
            OperatorCommands::Show { name } => {
                commands::operators::show(config, &name)?;
            }
        },
    }

    Ok(())
}
