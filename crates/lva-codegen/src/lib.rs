//! LVA Code Generation
//!
//! This crate compiles analysis definitions into deployable artifacts.
//!
//! # Pipeline Overview
//!
//! ```text
//! ┌──────────┐     ┌──────────┐     ┌──────────┐     ┌──────────┐
//! │   YAML   │────▶│  Graph   │────▶│  Graph   │────▶│  Output  │
//! │ Analysis │     │ (Parse)  │     │  (Sema)  │     │(Codegen) │
//! └──────────┘     └──────────┘     └──────────┘     └──────────┘
//! ```
//!
//! Parsing builds the abstract semantic graph and proves it well-formed,
//! sema resolves stream and attribute types in place, and a backend lowers
//! the result to a Graphviz document or a Kubernetes manifest program.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use lva_codegen::{Compiler, CompileOptions};
//! use lva_core::OperatorRegistry;
//!
//! let registry = Arc::new(OperatorRegistry::builtin()?);
//! let compiler = Compiler::new(registry, CompileOptions::default());
//! let compiled = compiler.compile_file("analyses/lobby.yaml")?;
//! compiled.save("lobby.manifest.yaml")?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod backends;
pub mod compiler;
pub mod error;
pub mod graph;
pub mod ir;
pub mod parser;
pub mod sema;
pub mod traversal;
pub mod verify;

pub use backends::{CodegenOptions, CodegenOutput, Program, RunMode};
pub use compiler::{AnalyzedGraph, CompileOptions, CompiledAnalysis, Compiler};
pub use error::{Error, ErrorKind, Result, Stage};
pub use graph::{Graph, NodeId};
pub use ir::Element;
