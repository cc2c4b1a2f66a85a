//! Code generation backends
//!
//! A backend lowers a finalized graph into output text. The backend is
//! picked by name (`march`):
//!
//! - `dot`: Graphviz visualization of the graph
//! - `manifest`: Kubernetes deployment program with linker placeholders

pub mod dot;
pub mod manifest;
pub mod runtime;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::graph::Graph;

pub use dot::DotBackend;
pub use manifest::ManifestBackend;

/// How the compiled analysis is run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Long-running processing of live input series
    #[default]
    Live,
    /// Run-to-completion processing of submitted input
    Submission,
}

impl RunMode {
    /// Name as accepted on the command line
    pub fn as_str(&self) -> &'static str {
        match self {
            RunMode::Live => "live",
            RunMode::Submission => "submission",
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "live" => Ok(RunMode::Live),
            "submission" => Ok(RunMode::Submission),
            other => Err(Error::InvalidOption(format!(
                "unknown run mode '{}' (expected live or submission)",
                other
            ))),
        }
    }
}

/// Options for code generation
#[derive(Debug, Clone)]
pub struct CodegenOptions {
    /// Backend name
    pub march: String,

    /// Run mode of the generated workloads
    pub run_mode: RunMode,

    /// Emit debug settings into the output
    pub debug: bool,

    /// Analysis name, used to prefix generated resources
    pub analysis_name: String,
}

impl Default for CodegenOptions {
    fn default() -> Self {
        Self {
            march: "manifest".to_string(),
            run_mode: RunMode::Live,
            debug: false,
            analysis_name: "analysis".to_string(),
        }
    }
}

/// A named placeholder for an input or output series
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesPlaceholder {
    /// Placeholder text appearing in the template
    pub placeholder: String,

    /// Analyzer (input series) or stream (output series) it stands for
    pub target: String,
}

/// A deployment program awaiting linking
///
/// The template references every placeholder in `input_series` and
/// `output_series` plus `__NAMESPACE__`, `__REGISTRY__` and
/// `__CLUSTER_DOMAIN__`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Program {
    /// Input series placeholders, in generation order
    pub input_series: Vec<SeriesPlaceholder>,

    /// Output series placeholders, in generation order
    pub output_series: Vec<SeriesPlaceholder>,

    /// Multi-document YAML template
    pub template: String,
}

/// Output of a backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodegenOutput {
    /// A visualization document
    Visualization(String),

    /// A deployment program
    Program(Program),
}

impl CodegenOutput {
    /// Output text, as written to disk
    pub fn render(&self) -> Result<String> {
        match self {
            CodegenOutput::Visualization(text) => Ok(text.clone()),
            CodegenOutput::Program(program) => Ok(serde_yaml::to_string(program)?),
        }
    }
}

/// A code generation backend
pub trait Backend {
    /// Backend name, as selected by `march`
    fn name(&self) -> &'static str;

    /// Lower a finalized graph
    fn generate(&self, graph: &Graph, options: &CodegenOptions) -> Result<CodegenOutput>;
}

/// Names of the available backends
pub const BACKENDS: &[&str] = &["dot", "manifest"];

/// Look up a backend by name
pub fn backend_for(march: &str) -> Result<Box<dyn Backend>> {
    match march {
        "dot" => Ok(Box::new(DotBackend::new())),
        "manifest" => Ok(Box::new(ManifestBackend::new()?)),
        other => Err(Error::UnknownBackend(other.to_string())),
    }
}

/// Lower a graph with the backend named in `options`
pub fn generate(graph: &Graph, options: &CodegenOptions) -> Result<CodegenOutput> {
    let backend = backend_for(&options.march)?;
    tracing::debug!("Generating with the {} backend", backend.name());
    backend.generate(graph, options)
}

/// Lowercase DNS-label form of a name (`lobby_cam` -> `lobby-cam`)
pub(crate) fn dns_label(name: &str) -> String {
    let label: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect();
    label.trim_matches('-').to_string()
}
