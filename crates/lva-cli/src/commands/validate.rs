//! Validate an analysis definition

use anyhow::{Context, Result};
use lva_codegen::{CompileOptions, Compiler, Element};
use std::sync::Arc;

/// Run the validate command
pub fn run(config_path: Option<&str>, input: &str, attrs: &[String]) -> Result<()> {
    tracing::info!("Validating analysis: {}", input);

    let config = super::load_project(config_path)?;
    let mut attribute_overrides = config.project.compile.attrs.clone();
    attribute_overrides.extend(attrs.iter().cloned());

    let registry = config
        .operator_registry()
        .context("Failed to load operator catalogs")?;
    let compiler = Compiler::new(
        Arc::new(registry),
        CompileOptions {
            attribute_overrides,
            ..Default::default()
        },
    );

    let analyzed = compiler.analyze_file(input).context("Validation failed")?;

    let graph = &analyzed.graph;
    let analyzers = graph
        .nodes()
        .filter(|n| matches!(n.element, Element::Analyzer(_)))
        .count();
    let streams = graph
        .nodes()
        .filter(|n| matches!(n.element, Element::Stream(_)))
        .count();

    tracing::info!("✓ Analysis: {}", analyzed.name);
    tracing::info!("✓ Analyzers: {}", analyzers);
    tracing::info!("✓ Streams: {}", streams);
    tracing::info!("✓ Analysis is valid");
    Ok(())
}
