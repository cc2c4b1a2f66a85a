//! Operator registry
//!
//! The registry is the one piece of state shared between independent
//! compiler invocations. Every value crossing its boundary is cloned, so no
//! caller can observe another caller's edits to an [`OperatorInfo`].

use parking_lot::RwLock;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::Path;

use crate::error::{Error, Result};
use crate::operators::OperatorInfo;

/// Builtin operator catalog, embedded at build time
const BUILTIN_CATALOG: &str = include_str!("../operators/builtin.yaml");

/// On-disk catalog layout
#[derive(Debug, Deserialize)]
struct OperatorCatalog {
    #[serde(default)]
    operators: Vec<OperatorInfo>,
}

/// Thread-safe operator lookup table
#[derive(Debug, Default)]
pub struct OperatorRegistry {
    operators: RwLock<HashMap<String, OperatorInfo>>,
}

impl OperatorRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding the builtin catalog
    pub fn builtin() -> Result<Self> {
        Self::from_yaml(BUILTIN_CATALOG)
    }

    /// Create a registry from catalog YAML
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let registry = Self::new();
        registry.merge_yaml(yaml)?;
        Ok(registry)
    }

    /// Create a registry from a catalog file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let registry = Self::new();
        registry.merge_file(path)?;
        Ok(registry)
    }

    /// Add every operator of a catalog file, replacing entries with the same name
    ///
    /// Returns the number of operators read.
    pub fn merge_file(&self, path: impl AsRef<Path>) -> Result<usize> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::ConfigNotFound {
                path: path.display().to_string(),
            });
        }
        let contents = std::fs::read_to_string(path)?;
        let count = self.merge_yaml(&contents)?;
        tracing::debug!("Loaded {} operators from {}", count, path.display());
        Ok(count)
    }

    /// Add every operator of catalog YAML, replacing entries with the same name
    ///
    /// The whole catalog is validated before anything is inserted.
    pub fn merge_yaml(&self, yaml: &str) -> Result<usize> {
        let catalog: OperatorCatalog = serde_yaml::from_str(yaml)?;

        let mut seen = HashSet::new();
        for op in &catalog.operators {
            op.validate()?;
            if !seen.insert(op.name.as_str()) {
                return Err(Error::InvalidOperator {
                    operator: op.name.clone(),
                    message: "defined more than once in the same catalog".to_string(),
                });
            }
        }

        let count = catalog.operators.len();
        let mut operators = self.operators.write();
        for op in catalog.operators {
            operators.insert(op.name.clone(), op);
        }
        Ok(count)
    }

    /// Look up an operator by name, returning an independent copy
    pub fn lookup(&self, name: &str) -> Option<OperatorInfo> {
        self.operators.read().get(name).cloned()
    }

    /// Insert a copy of an operator, returning the entry it replaced
    pub fn insert(&self, info: &OperatorInfo) -> Result<Option<OperatorInfo>> {
        info.validate()?;
        Ok(self.operators.write().insert(info.name.clone(), info.clone()))
    }

    /// Whether an operator with this name is registered
    pub fn contains(&self, name: &str) -> bool {
        self.operators.read().contains_key(name)
    }

    /// Sorted operator names
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.operators.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of registered operators
    pub fn len(&self) -> usize {
        self.operators.read().len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.operators.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operators::ArgumentSignature;
    use std::sync::Arc;

    const CATALOG: &str = r#"
operators:
  - name: Relay
    input_args:
      - name: input
        type: special/any
    output_args:
      - name: output
        type: special/any
    resources:
      cpu: "100m"
      memory: "64Mi"
"#;

    #[test]
    fn test_builtin_catalog_loads() {
        let registry = OperatorRegistry::builtin().unwrap();
        assert!(!registry.is_empty());
        for name in [
            "GcsVideoSource",
            "PersonVehicleDetector",
            "OccupancyCounter",
            "GcsProtoSink",
        ] {
            assert!(registry.contains(name), "missing builtin operator {}", name);
        }
    }

    #[test]
    fn test_from_yaml_and_lookup() {
        let registry = OperatorRegistry::from_yaml(CATALOG).unwrap();
        assert_eq!(registry.len(), 1);

        let relay = registry.lookup("Relay").unwrap();
        assert_eq!(relay.input_args[0].ty, "special/any");
        assert!(registry.lookup("Missing").is_none());
    }

    #[test]
    fn test_rejects_empty_resources() {
        let yaml = r#"
operators:
  - name: Broken
    resources:
      cpu: ""
      memory: "64Mi"
"#;
        let err = OperatorRegistry::from_yaml(yaml).unwrap_err();
        assert!(matches!(err, Error::InvalidOperator { .. }));
    }

    #[test]
    fn test_rejects_unknown_attribute_type() {
        let yaml = r#"
operators:
  - name: Broken
    attributes:
      - name: x
        type: double
    resources:
      cpu: "1"
      memory: "64Mi"
"#;
        assert!(matches!(
            OperatorRegistry::from_yaml(yaml),
            Err(Error::ConfigParse(_))
        ));
    }

    #[test]
    fn test_rejects_duplicate_in_catalog() {
        let yaml = format!("{}{}", CATALOG, &CATALOG["\noperators:\n".len()..]);
        assert!(OperatorRegistry::from_yaml(&yaml).is_err());
    }

    #[test]
    fn test_lookup_returns_independent_copy() {
        let registry = OperatorRegistry::from_yaml(CATALOG).unwrap();

        let mut copy = registry.lookup("Relay").unwrap();
        copy.input_args.clear();

        assert_eq!(registry.lookup("Relay").unwrap().input_args.len(), 1);
    }

    #[test]
    fn test_insert_copies_and_replaces() {
        let registry = OperatorRegistry::from_yaml(CATALOG).unwrap();

        let mut relay = registry.lookup("Relay").unwrap();
        relay.output_args.push(ArgumentSignature {
            name: "mirror".to_string(),
            ty: "special/any".to_string(),
        });
        let previous = registry.insert(&relay).unwrap();
        assert_eq!(previous.unwrap().output_args.len(), 1);

        relay.output_args.clear();
        assert_eq!(registry.lookup("Relay").unwrap().output_args.len(), 2);
    }

    #[test]
    fn test_merge_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("extra.yaml");
        std::fs::write(&path, CATALOG).unwrap();

        let registry = OperatorRegistry::builtin().unwrap();
        let before = registry.len();
        assert_eq!(registry.merge_file(&path).unwrap(), 1);
        assert_eq!(registry.len(), before + 1);

        assert!(matches!(
            registry.merge_file(dir.path().join("missing.yaml")),
            Err(Error::ConfigNotFound { .. })
        ));
    }

    #[test]
    fn test_names_sorted() {
        let registry = OperatorRegistry::builtin().unwrap();
        let names = registry.names();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
    }

    #[test]
    fn test_concurrent_lookup_and_insert() {
        let registry = Arc::new(OperatorRegistry::from_yaml(CATALOG).unwrap());
        let template = registry.lookup("Relay").unwrap();

        std::thread::scope(|scope| {
            for i in 0..8 {
                let registry = Arc::clone(&registry);
                let mut op = template.clone();
                scope.spawn(move || {
                    op.name = format!("Relay{}", i);
                    registry.insert(&op).unwrap();
                    for _ in 0..100 {
                        assert!(registry.lookup("Relay").is_some());
                    }
                });
            }
        });

        assert_eq!(registry.len(), 9);
    }
}
