//! Integration tests for project loading
//!
//! Tests use temporary directories with real file fixtures to verify:
//! - `lva.yaml` discovery and defaults
//! - Operator catalogs layered over the builtin catalog
//! - Analysis definitions loaded from disk
//! - Error reporting for broken projects

use lva_core::operators::{AttributeType, AttributeValue};
use lva_core::{AnalysisDefinition, Config, Error, OperatorRegistry};
use tempfile::TempDir;

/// Helper to create a temporary project directory with standard structure.
fn setup_project() -> TempDir {
    let dir = TempDir::new().unwrap();
    std::fs::create_dir_all(dir.path().join("operators")).unwrap();
    std::fs::create_dir_all(dir.path().join("analyses")).unwrap();
    dir
}

const CUSTOM_OPERATORS: &str = r#"
operators:
  - name: PlateReader
    description: Reads licence plates from vehicle detections.
    input_args:
      - name: detections
        type: protobuf
    output_args:
      - name: plates
        type: protobuf/acme.PlateResult
    attributes:
      - name: region
        type: string
        default: eu
    resources:
      cpu: "1"
      memory: "2Gi"
      latency_budget_ms: 250
  - name: OccupancyCounter
    description: Replacement counter with a wider default window.
    input_args:
      - name: detections
        type: protobuf
    output_args:
      - name: counts
        type: protobuf/google.cloud.visionai.v1.OccupancyCountingPredictionResult
    attributes:
      - name: lookback_window_s
        type: int
        default: 30
    resources:
      cpu: "500m"
      memory: "512Mi"
"#;

// =============================================================================
// Project Loading
// =============================================================================

#[test]
fn test_project_with_custom_operators() {
    let dir = setup_project();
    std::fs::write(dir.path().join("operators/custom.yaml"), CUSTOM_OPERATORS).unwrap();
    std::fs::write(
        dir.path().join("lva.yaml"),
        r#"
name: retail
operators:
  - operators/custom.yaml
compile:
  march: dot
  run_mode: submission
  attrs:
    - counter:zone=aisle_3
"#,
    )
    .unwrap();

    let config = Config::load(dir.path()).unwrap();
    assert_eq!(config.project.name.as_deref(), Some("retail"));
    assert_eq!(config.project.compile.march, "dot");
    assert_eq!(config.project.compile.run_mode, "submission");
    assert_eq!(config.project.compile.attrs, vec!["counter:zone=aisle_3"]);

    let registry = config.operator_registry().unwrap();
    let builtin = OperatorRegistry::builtin().unwrap();
    assert_eq!(registry.len(), builtin.len() + 1);
    assert!(registry.contains("PlateReader"));

    // Project catalogs replace builtin entries with the same name
    let counter = registry.lookup("OccupancyCounter").unwrap();
    let window = counter.attribute("lookback_window_s").unwrap();
    assert_eq!(window.ty, AttributeType::Int);
    assert_eq!(window.default, Some(AttributeValue::Int(30)));
    assert!(counter.attribute("zone").is_none());
}

#[test]
fn test_load_by_file_path() {
    let dir = setup_project();
    let path = dir.path().join("lva.yaml");
    std::fs::write(&path, "name: by-path\n").unwrap();

    let config = Config::load(&path).unwrap();
    assert_eq!(config.base_path, dir.path());
    assert_eq!(config.project.compile.march, "manifest");
    assert_eq!(
        config.operator_registry().unwrap().len(),
        OperatorRegistry::builtin().unwrap().len()
    );
}

#[test]
fn test_missing_catalog_file() {
    let dir = setup_project();
    std::fs::write(
        dir.path().join("lva.yaml"),
        "operators:\n  - operators/missing.yaml\n",
    )
    .unwrap();

    let config = Config::load(dir.path()).unwrap();
    let err = config.operator_registry().unwrap_err();
    assert!(matches!(err, Error::ConfigNotFound { ref path } if path.ends_with("missing.yaml")));
}

#[test]
fn test_invalid_catalog_rejected_whole() {
    let dir = setup_project();
    let catalog = dir.path().join("operators/bad.yaml");
    std::fs::write(
        &catalog,
        r#"
operators:
  - name: Fine
    resources:
      cpu: "1"
      memory: "1Gi"
  - name: NoMemory
    resources:
      cpu: "1"
      memory: ""
"#,
    )
    .unwrap();

    let registry = OperatorRegistry::new();
    let err = registry.merge_file(&catalog).unwrap_err();
    assert!(matches!(err, Error::InvalidOperator { ref operator, .. } if operator == "NoMemory"));
    assert!(registry.is_empty());
}

#[test]
fn test_missing_project_file() {
    let dir = setup_project();
    let err = Config::load(dir.path()).unwrap_err();
    assert!(matches!(err, Error::ConfigNotFound { .. }));
}

// =============================================================================
// Analysis Definitions
// =============================================================================

#[test]
fn test_load_analysis_definition() {
    let dir = setup_project();
    let path = dir.path().join("analyses/lobby.yaml");
    std::fs::write(
        &path,
        r#"
name: lobby
analyzers:
  - analyzer: ingress
    operator: GcsVideoSource
    attrs:
      input_video_uri: gs://bucket/lobby.mp4
      loop: true
      frame_rate: 15.0
  - analyzer: detector
    operator: PersonVehicleDetector
    monitoring:
      enabled: true
    inputs:
      - ingress:output_video
    debug_options:
      environment_variables:
        LOG_LEVEL: trace
"#,
    )
    .unwrap();

    let analysis = AnalysisDefinition::load(&path).unwrap();
    assert_eq!(analysis.analyzer_names(), vec!["ingress", "detector"]);

    let ingress = &analysis.analyzers[0];
    assert_eq!(ingress.attrs["loop"], AttributeValue::Bool(true));
    assert_eq!(ingress.attrs["frame_rate"], AttributeValue::Float(15.0));

    let detector = &analysis.analyzers[1];
    assert!(detector.monitoring.enabled);
    assert_eq!(detector.inputs, vec!["ingress:output_video"]);
    assert_eq!(detector.debug_environment()["LOG_LEVEL"], "trace");
}
