//! LVA Core Library
//!
//! This crate provides the definitions the LVA compiler consumes:
//! - Analysis definitions (analyzers and their stream wiring)
//! - Operator signatures and the shared operator registry
//! - Project configuration
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │  Analysis   │────▶│  Compiler   │◀────│  Operator   │
//! │   (YAML)    │     │ (lva-codegen)│    │  Registry   │
//! └─────────────┘     └─────────────┘     └─────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use lva_core::{AnalysisDefinition, OperatorRegistry};
//!
//! let registry = OperatorRegistry::builtin()?;
//! let analysis = AnalysisDefinition::load("./lobby.yaml")?;
//! for name in analysis.analyzer_names() {
//!     println!("Analyzer: {}", name);
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod analysis;
pub mod config;
pub mod error;
pub mod operators;
pub mod registry;

pub use analysis::{AnalysisDefinition, AnalyzerDefinition};
pub use config::{Config, ProjectConfig};
pub use error::{Error, Result};
pub use operators::{AttributeType, AttributeValue, OperatorInfo};
pub use registry::OperatorRegistry;
