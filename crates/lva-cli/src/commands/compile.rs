//! Compile an analysis definition

use anyhow::{Context, Result};
use clap::Args;
use lva_codegen::{CompileOptions, Compiler, RunMode};
use std::path::PathBuf;
use std::sync::Arc;

/// Arguments of the compile command
#[derive(Args, Debug)]
pub struct CompileArgs {
    /// Analysis definition file
    pub input: PathBuf,

    /// Backend: dot or manifest (defaults to the project setting)
    #[arg(long)]
    pub march: Option<String>,

    /// Run mode: live or submission (defaults to the project setting)
    #[arg(long)]
    pub run_mode: Option<String>,

    /// Attribute override (analyzer:attribute=value), repeatable
    #[arg(long = "attr", value_name = "OVERRIDE")]
    pub attrs: Vec<String>,

    /// Analysis name (defaults to the definition's name or the file stem)
    #[arg(long)]
    pub name: Option<String>,

    /// Emit debug settings into the generated artifacts
    #[arg(long)]
    pub debug: bool,

    /// Output file
    #[arg(short, long)]
    pub output: PathBuf,
}

/// Run the compile command
pub fn run(config_path: Option<&str>, args: &CompileArgs) -> Result<()> {
    let config = super::load_project(config_path)?;
    let defaults = &config.project.compile;

    let run_mode: RunMode = args
        .run_mode
        .as_deref()
        .unwrap_or(defaults.run_mode.as_str())
        .parse()
        .context("Invalid run mode")?;

    // Project overrides first so command-line overrides win
    let mut attribute_overrides = defaults.attrs.clone();
    attribute_overrides.extend(args.attrs.iter().cloned());

    let options = CompileOptions {
        march: args.march.clone().unwrap_or_else(|| defaults.march.clone()),
        run_mode,
        debug: args.debug || defaults.debug,
        attribute_overrides,
        analysis_name: args.name.clone(),
    };

    let registry = config
        .operator_registry()
        .context("Failed to load operator catalogs")?;
    let compiler = Compiler::new(Arc::new(registry), options);

    let compiled = compiler
        .compile_file(&args.input)
        .context("Compilation failed")?;
    compiled
        .save(&args.output)
        .with_context(|| format!("Failed to write {}", args.output.display()))?;

    tracing::info!(
        "✓ {} ({} bytes, hash: {}...) -> {}",
        compiled.name,
        compiled.size(),
        &compiled.hash[..8],
        args.output.display()
    );
    Ok(())
}
