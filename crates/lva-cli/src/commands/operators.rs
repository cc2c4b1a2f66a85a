//! Operator catalog commands

use anyhow::{Context, Result};

/// List all operators
pub fn list(config_path: Option<&str>) -> Result<()> {
    let registry = super::load_project(config_path)?
        .operator_registry()
        .context("Failed to load operator catalogs")?;

    for name in registry.names() {
        let description = registry
            .lookup(&name)
            .and_then(|op| op.description)
            .unwrap_or_default();
        println!("{:<24} {}", name, description);
    }
    Ok(())
}

/// Show an operator's signature
pub fn show(config_path: Option<&str>, name: &str) -> Result<()> {
    let registry = super::load_project(config_path)?
        .operator_registry()
        .context("Failed to load operator catalogs")?;

    let Some(operator) = registry.lookup(name) else {
        anyhow::bail!("Operator not found: {}", name);
    };
    print!("{}", serde_yaml::to_string(&operator)?);
    Ok(())
}
