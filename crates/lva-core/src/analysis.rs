//! Analysis definitions
//!
//! An analysis is a set of named analyzers wired together by stream
//! references of the form `"analyzer:output_argument"`.
//!
//! # Example
//!
//! ```yaml
//! name: lobby_occupancy
//! analyzers:
//!   - analyzer: ingress
//!     operator: GcsVideoSource
//!     attrs:
//!       input_video_uri: gs://bucket/lobby.mp4
//!   - analyzer: detector
//!     operator: PersonVehicleDetector
//!     inputs:
//!       - ingress:output_video
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::Result;
use crate::operators::AttributeValue;

/// A complete analysis definition
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisDefinition {
    /// Analysis name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Analyzer declarations, in definition order
    #[serde(default)]
    pub analyzers: Vec<AnalyzerDefinition>,
}

/// One analyzer declaration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzerDefinition {
    /// Analyzer name (unique within the analysis)
    pub analyzer: String,

    /// Operator this analyzer instantiates
    pub operator: String,

    /// Attribute values by name
    #[serde(default)]
    pub attrs: BTreeMap<String, AttributeValue>,

    /// Input stream references, one per operator input argument, in order
    #[serde(default)]
    pub inputs: Vec<String>,

    /// Monitoring settings
    #[serde(default)]
    pub monitoring: MonitoringConfig,

    /// Debug-only settings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug_options: Option<DebugOptions>,
}

/// Monitoring settings of one analyzer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitoringConfig {
    /// Expose a metrics endpoint for scraping
    #[serde(default)]
    pub enabled: bool,
}

/// Debug-only analyzer settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DebugOptions {
    /// Extra environment variables, merged over the operator's
    #[serde(default)]
    pub environment_variables: BTreeMap<String, String>,
}

impl AnalysisDefinition {
    /// Parse a definition from YAML
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Load a definition from a file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&contents)
    }

    /// Analyzer names in definition order
    pub fn analyzer_names(&self) -> Vec<&str> {
        self.analyzers.iter().map(|a| a.analyzer.as_str()).collect()
    }
}

impl AnalyzerDefinition {
    /// Debug environment variables, empty when none are set
    pub fn debug_environment(&self) -> BTreeMap<String, String> {
        self.debug_options
            .as_ref()
            .map(|d| d.environment_variables.clone())
            .unwrap_or_default()
    }
}
