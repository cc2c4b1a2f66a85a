//! Configuration parsing and validation
//!
//! This module handles loading the optional project file `lva.yaml`.
//!
//! # Example
//!
//! ```yaml
//! name: retail-analytics
//! operators:
//!   - operators/custom.yaml
//! compile:
//!   march: manifest
//!   run_mode: live
//!   attrs:
//!     - detector:confidence_threshold=0.8
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::registry::OperatorRegistry;

/// Root project configuration from `lva.yaml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Project name
    #[serde(default)]
    pub name: Option<String>,

    /// Extra operator catalog files, relative to the project directory
    #[serde(default)]
    pub operators: Vec<String>,

    /// Compile defaults
    #[serde(default)]
    pub compile: CompileDefaults,
}

/// Defaults for the compile command; command-line flags take precedence
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompileDefaults {
    /// Backend name
    #[serde(default = "default_march")]
    pub march: String,

    /// Run mode: live or submission
    #[serde(default = "default_run_mode")]
    pub run_mode: String,

    /// Emit debug settings in generated artifacts
    #[serde(default)]
    pub debug: bool,

    /// Attribute overrides (`analyzer:attribute=value`)
    #[serde(default)]
    pub attrs: Vec<String>,
}

impl Default for CompileDefaults {
    fn default() -> Self {
        Self {
            march: default_march(),
            run_mode: default_run_mode(),
            debug: false,
            attrs: Vec::new(),
        }
    }
}

fn default_march() -> String {
    "manifest".to_string()
}

fn default_run_mode() -> String {
    "live".to_string()
}

/// Main configuration container
#[derive(Debug, Clone)]
pub struct Config {
    /// Project configuration
    pub project: ProjectConfig,

    /// Base path of the project
    pub base_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            project: ProjectConfig::default(),
            base_path: PathBuf::from("."),
        }
    }
}

impl Config {
    /// Load configuration from a directory or an `lva.yaml` file
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let config = Config::load("./my-project")?;
    /// println!("march: {}", config.project.compile.march);
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let (config_path, base_path) = if path.is_dir() {
            (path.join("lva.yaml"), path.to_path_buf())
        } else {
            (
                path.to_path_buf(),
                path.parent().unwrap_or(Path::new(".")).to_path_buf(),
            )
        };

        if !config_path.exists() {
            return Err(Error::ConfigNotFound {
                path: config_path.display().to_string(),
            });
        }

        let contents = std::fs::read_to_string(&config_path)?;
        let project: ProjectConfig = serde_yaml::from_str(&contents)?;

        if project.compile.march.trim().is_empty() {
            return Err(Error::ConfigInvalid {
                message: "compile.march must not be empty".to_string(),
            });
        }

        Ok(Self { project, base_path })
    }

    /// Build the operator registry: builtin catalog plus the project's catalogs
    pub fn operator_registry(&self) -> Result<OperatorRegistry> {
        let registry = OperatorRegistry::builtin()?;
        for file in &self.project.operators {
            registry.merge_file(self.base_path.join(file))?;
        }
        Ok(registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_config() {
        let config: ProjectConfig = serde_yaml::from_str("name: test-project\n").unwrap();
        assert_eq!(config.name.as_deref(), Some("test-project"));
        assert_eq!(config.compile.march, "manifest");
        assert_eq!(config.compile.run_mode, "live");
        assert!(config.operators.is_empty());
    }

    #[test]
    fn test_parse_full_config() {
        let yaml = r#"
name: test-project
operators:
  - operators/extra.yaml
compile:
  march: dot
  run_mode: submission
  debug: true
  attrs:
    - detector:confidence_threshold=0.9
"#;
        let config: ProjectConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.operators, vec!["operators/extra.yaml"]);
        assert_eq!(config.compile.march, "dot");
        assert_eq!(config.compile.run_mode, "submission");
        assert!(config.compile.debug);
        assert_eq!(config.compile.attrs.len(), 1);
    }

    #[test]
    fn test_load_missing_config() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Config::load(dir.path()),
            Err(Error::ConfigNotFound { .. })
        ));
    }

    #[test]
    fn test_load_rejects_empty_march() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("lva.yaml"), "compile:\n  march: \"\"\n").unwrap();
        assert!(matches!(
            Config::load(dir.path()),
            Err(Error::ConfigInvalid { .. })
        ));
    }

    #[test]
    fn test_operator_registry_merges_project_catalogs() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("operators")).unwrap();
        std::fs::write(
            dir.path().join("lva.yaml"),
            "name: test\noperators:\n  - operators/extra.yaml\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("operators/extra.yaml"),
            r#"
operators:
  - name: LicensePlateReader
    input_args:
      - name: video
        type: gst/video
    resources:
      cpu: "1"
      memory: "1Gi"
"#,
        )
        .unwrap();

        let config = Config::load(dir.path().join("lva.yaml")).unwrap();
        assert_eq!(config.base_path, dir.path());

        let registry = config.operator_registry().unwrap();
        assert!(registry.contains("LicensePlateReader"));
        assert!(registry.contains("GcsVideoSource"));
    }
}
