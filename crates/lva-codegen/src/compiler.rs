//! Analysis compiler
//!
//! Drives parse → sema → codegen. Each stage runs only after the previous
//! one succeeded, and the first error is returned tagged with its stage.

use std::path::Path;
use std::sync::Arc;

use lva_core::registry::OperatorRegistry;
use sha2::{Digest, Sha256};

use crate::backends::{self, CodegenOptions, RunMode};
use crate::error::{Error, Result, Stage};
use crate::graph::Graph;
use crate::parser::Parser;
use crate::sema::Sema;

/// Options for the compiler
#[derive(Debug, Clone)]
pub struct CompileOptions {
    /// Backend name (`dot` or `manifest`)
    pub march: String,

    /// Run mode of generated workloads
    pub run_mode: RunMode,

    /// Emit debug settings
    pub debug: bool,

    /// `analyzer:attribute=value` overrides applied during sema
    pub attribute_overrides: Vec<String>,

    /// Analysis name, overriding the one in the definition
    pub analysis_name: Option<String>,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            march: "manifest".to_string(),
            run_mode: RunMode::Live,
            debug: false,
            attribute_overrides: Vec::new(),
            analysis_name: None,
        }
    }
}

/// A graph that passed parse and sema
#[derive(Debug)]
pub struct AnalyzedGraph {
    /// Resolved analysis name
    pub name: String,

    /// The resolved graph
    pub graph: Graph,
}

/// Compiled analysis output
#[derive(Debug, Clone)]
pub struct CompiledAnalysis {
    /// Analysis name
    pub name: String,

    /// Rendered backend output
    pub output: String,

    /// SHA-256 of the output, hex encoded
    pub hash: String,
}

impl CompiledAnalysis {
    /// Write the output to a file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path.as_ref(), &self.output)?;
        Ok(())
    }

    /// Output size in bytes
    pub fn size(&self) -> usize {
        self.output.len()
    }
}

/// Analysis compiler
pub struct Compiler {
    options: CompileOptions,
    parser: Parser,
}

impl Compiler {
    /// Create a compiler resolving operators in `registry`
    pub fn new(registry: Arc<OperatorRegistry>, options: CompileOptions) -> Self {
        Self {
            parser: Parser::new(registry),
            options,
        }
    }

    /// Compiler options
    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    /// Compile an analysis definition file
    ///
    /// Without a name in the options or the definition, the file stem
    /// names the analysis.
    pub fn compile_file(&self, path: impl AsRef<Path>) -> Result<CompiledAnalysis> {
        let path = path.as_ref();
        tracing::info!("Compiling analysis: {}", path.display());

        let yaml = std::fs::read_to_string(path)
            .map_err(|e| Error::from(e).in_stage(Stage::Parse))?;
        let stem = path.file_stem().and_then(|s| s.to_str());
        self.compile_named(&yaml, stem)
    }

    /// Compile an analysis definition
    pub fn compile(&self, yaml: &str) -> Result<CompiledAnalysis> {
        self.compile_named(yaml, None)
    }

    /// Parse and analyze a definition without generating output
    pub fn analyze(&self, yaml: &str) -> Result<AnalyzedGraph> {
        self.analyze_named(yaml, None)
    }

    /// Parse and analyze a definition file without generating output
    pub fn analyze_file(&self, path: impl AsRef<Path>) -> Result<AnalyzedGraph> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path)
            .map_err(|e| Error::from(e).in_stage(Stage::Parse))?;
        self.analyze_named(&yaml, path.file_stem().and_then(|s| s.to_str()))
    }

    fn analyze_named(&self, yaml: &str, fallback: Option<&str>) -> Result<AnalyzedGraph> {
        let parsed = self
            .parser
            .parse_yaml(yaml)
            .map_err(|e| e.in_stage(Stage::Parse))?;
        let name = self
            .options
            .analysis_name
            .clone()
            .or(parsed.name)
            .or_else(|| fallback.map(str::to_string))
            .unwrap_or_else(|| "analysis".to_string());
        let mut graph = parsed.graph;
        tracing::debug!(
            "Parsed '{}': {} nodes, {} edges",
            name,
            graph.num_nodes(),
            graph.num_edges()
        );

        Sema::new()
            .with_overrides(&self.options.attribute_overrides)
            .and_then(|sema| sema.run(&mut graph))
            .map_err(|e| e.in_stage(Stage::Sema))?;

        Ok(AnalyzedGraph { name, graph })
    }

    fn compile_named(&self, yaml: &str, fallback: Option<&str>) -> Result<CompiledAnalysis> {
        let AnalyzedGraph { name, graph } = self.analyze_named(yaml, fallback)?;

        let options = CodegenOptions {
            march: self.options.march.clone(),
            run_mode: self.options.run_mode,
            debug: self.options.debug,
            analysis_name: name.clone(),
        };
        let output = backends::generate(&graph, &options)
            .and_then(|out| out.render())
            .map_err(|e| e.in_stage(Stage::Codegen))?;

        let hash = hex::encode(Sha256::digest(output.as_bytes()));
        tracing::info!(
            "Compiled '{}' with the {} backend ({} bytes)",
            name,
            options.march,
            output.len()
        );

        Ok(CompiledAnalysis { name, output, hash })
    }
}
