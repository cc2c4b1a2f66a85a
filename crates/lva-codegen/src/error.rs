//! Error types for compilation

use std::fmt;
use thiserror::Error;

/// Result type for compiler operations
pub type Result<T> = std::result::Result<T, Error>;

/// Broad classification of an [`Error`]
///
/// Everything except [`ErrorKind::Internal`] is an expected outcome of a
/// malformed definition, registry or option set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed or duplicate names, undefined references, unknown operators
    Structural,
    /// Graph well-formedness violations
    Verification,
    /// Stream or attribute type errors
    Type,
    /// Compiler bug
    Internal,
    /// Bad compiler options or operator catalogs
    Config,
    /// Unreadable input
    Input,
}

/// Compiler stage an error was raised in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Parsing and graph construction
    Parse,
    /// Semantic analysis
    Sema,
    /// Backend code generation
    Codegen,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Parse => "parse",
            Stage::Sema => "sema",
            Stage::Codegen => "codegen",
        })
    }
}

/// Errors that can occur during compilation
#[derive(Error, Debug)]
pub enum Error {
    /// Analyzer name does not follow `[a-z][a-z0-9]*(_[a-z0-9]+)*`
    #[error("invalid analyzer name '{name}': must match [a-z][a-z0-9]*(_[a-z0-9]+)*")]
    InvalidName {
        /// Offending name
        name: String,
    },

    /// Name defined twice in the symbol table
    #[error("'{name}' is defined more than once")]
    DuplicateName {
        /// Offending name
        name: String,
    },

    /// Input reference to a stream nobody produces
    #[error("analyzer '{analyzer}' references undefined stream '{reference}'")]
    UndefinedReference {
        /// Referencing analyzer
        analyzer: String,
        /// The unresolved reference
        reference: String,
    },

    /// Operator missing from the registry
    #[error("analyzer '{analyzer}' uses unknown operator '{operator}'")]
    UnknownOperator {
        /// Analyzer name
        analyzer: String,
        /// Operator name
        operator: String,
    },

    /// Attribute the operator does not declare
    #[error("operator '{operator}' of analyzer '{analyzer}' has no attribute '{attribute}'")]
    UnknownAttribute {
        /// Analyzer name
        analyzer: String,
        /// Operator name
        operator: String,
        /// Attribute name
        attribute: String,
    },

    /// Attribute override that does not parse or targets nothing
    #[error("invalid attribute override '{text}': {message}")]
    InvalidOverride {
        /// Override text as supplied
        text: String,
        /// Error description
        message: String,
    },

    /// Two edges at the same input port
    #[error("'{node}' has more than one input at port {port}")]
    DuplicateInput {
        /// Node name
        node: String,
        /// Input port
        port: i32,
    },

    /// Edges to or from a sentinel violate the sentinel rules
    #[error("incorrect sentinel linkage at '{node}': {message}")]
    SentinelLinkage {
        /// Node name
        node: String,
        /// Error description
        message: String,
    },

    /// The graph has a cycle
    #[error("cycle detected: {}", format_cycle(.path))]
    Cycle {
        /// Names of the nodes on the cycle, in edge order
        path: Vec<String>,
    },

    /// A node a traversal did not discover
    #[error("'{node}' is not reachable from {origin}")]
    Unreachable {
        /// Node name
        node: String,
        /// Sentinel the traversal started from
        origin: String,
    },

    /// Stream type does not satisfy an argument type
    #[error("type mismatch at '{node}': {message}")]
    TypeMismatch {
        /// Node name
        node: String,
        /// Error description
        message: String,
    },

    /// Operator input argument without a stream
    #[error("analyzer '{analyzer}' is missing a stream for input argument '{argument}'")]
    MissingInput {
        /// Analyzer name
        analyzer: String,
        /// Argument name
        argument: String,
    },

    /// Stream connected at a port the operator does not declare
    #[error("analyzer '{analyzer}' has an extra input stream '{stream}' at port {port}")]
    ExtraInput {
        /// Analyzer name
        analyzer: String,
        /// Stream name
        stream: String,
        /// Input port
        port: i32,
    },

    /// Attribute value of the wrong type
    #[error("attribute '{attribute}' of analyzer '{analyzer}' expects {expected}, got {actual}")]
    AttributeTypeMismatch {
        /// Analyzer name
        analyzer: String,
        /// Attribute name
        attribute: String,
        /// Declared type
        expected: String,
        /// Supplied type
        actual: String,
    },

    /// Attribute without a default that the analyzer omits
    #[error("required attribute '{attribute}' missing on analyzer '{analyzer}'")]
    MissingAttribute {
        /// Analyzer name
        analyzer: String,
        /// Attribute name
        attribute: String,
    },

    /// Unknown backend name
    #[error("unknown backend '{0}' (expected one of: dot, manifest)")]
    UnknownBackend(String),

    /// Invalid compiler option
    #[error("invalid option: {0}")]
    InvalidOption(String),

    /// Compiler invariant violated
    #[error("internal compiler error: {0}")]
    Internal(String),

    /// Error annotated with the stage that raised it
    #[error("{stage} failed: {source}")]
    Stage {
        /// Stage name
        stage: Stage,
        /// Underlying error
        #[source]
        source: Box<Error>,
    },

    /// Failed to parse the YAML definition
    #[error("failed to parse analysis definition: {0}")]
    ParseError(#[from] serde_yaml::Error),

    /// Operator catalog or definition loading error
    #[error(transparent)]
    Core(#[from] lva_core::Error),

    /// Invalid manifest template
    #[error("invalid template: {0}")]
    InvalidTemplate(#[from] minijinja::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Classify the error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidName { .. }
            | Error::DuplicateName { .. }
            | Error::UndefinedReference { .. }
            | Error::UnknownOperator { .. }
            | Error::UnknownAttribute { .. }
            | Error::InvalidOverride { .. } => ErrorKind::Structural,
            Error::DuplicateInput { .. }
            | Error::SentinelLinkage { .. }
            | Error::Cycle { .. }
            | Error::Unreachable { .. } => ErrorKind::Verification,
            Error::TypeMismatch { .. }
            | Error::MissingInput { .. }
            | Error::ExtraInput { .. }
            | Error::AttributeTypeMismatch { .. }
            | Error::MissingAttribute { .. } => ErrorKind::Type,
            Error::Internal(_) | Error::InvalidTemplate(_) | Error::Json(_) => ErrorKind::Internal,
            Error::UnknownBackend(_) | Error::InvalidOption(_) | Error::Core(_) => {
                ErrorKind::Config
            }
            Error::ParseError(_) | Error::Io(_) => ErrorKind::Input,
            Error::Stage { source, .. } => source.kind(),
        }
    }

    /// Stage the error was tagged with, if any
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Error::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// The error without its stage annotation
    pub fn root(&self) -> &Error {
        match self {
            Error::Stage { source, .. } => source.root(),
            other => other,
        }
    }

    pub(crate) fn in_stage(self, stage: Stage) -> Self {
        Error::Stage {
            stage,
            source: Box::new(self),
        }
    }
}

fn format_cycle(path: &[String]) -> String {
    match path.first() {
        Some(first) => format!("{} -> {}", path.join(" -> "), first),
        None => String::new(),
    }
}
