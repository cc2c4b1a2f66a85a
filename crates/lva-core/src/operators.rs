//! Operator signatures
//!
//! An operator is the static signature an analyzer instantiates: its typed
//! input/output arguments, the attributes it accepts and the resources one
//! instance needs. Operator entries are loaded from catalog YAML files and
//! served through the [`OperatorRegistry`](crate::registry::OperatorRegistry).
//!
//! # Example
//!
//! ```yaml
//! operators:
//!   - name: OccupancyCounter
//!     input_args:
//!       - name: detections
//!         type: protobuf
//!     output_args:
//!       - name: counts
//!         type: protobuf/google.cloud.visionai.v1.OccupancyCountingPredictionResult
//!     attributes:
//!       - name: lookback_window_s
//!         type: int
//!         default: 5
//!     resources:
//!       cpu: "500m"
//!       memory: "512Mi"
//!       latency_budget_ms: 200
//! ```

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Type of an operator attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeType {
    /// 64-bit signed integer
    Int,
    /// 64-bit float
    Float,
    /// Boolean
    Bool,
    /// UTF-8 string
    String,
}

impl AttributeType {
    /// Name of the type as written in catalogs
    pub fn as_str(&self) -> &'static str {
        match self {
            AttributeType::Int => "int",
            AttributeType::Float => "float",
            AttributeType::Bool => "bool",
            AttributeType::String => "string",
        }
    }
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AttributeType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "int" => Ok(AttributeType::Int),
            "float" => Ok(AttributeType::Float),
            "bool" => Ok(AttributeType::Bool),
            "string" => Ok(AttributeType::String),
            other => Err(Error::ConfigInvalid {
                message: format!("unknown attribute type '{}'", other),
            }),
        }
    }
}

/// A typed attribute value
///
/// Deserialized from plain YAML scalars: `5` is an int, `0.5` a float,
/// `true` a bool and anything else (including quoted numbers) a string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    /// Boolean value
    Bool(bool),
    /// Integer value
    Int(i64),
    /// Float value
    Float(f64),
    /// String value
    String(String),
}

impl AttributeValue {
    /// The type this value carries
    pub fn attribute_type(&self) -> AttributeType {
        match self {
            AttributeValue::Bool(_) => AttributeType::Bool,
            AttributeValue::Int(_) => AttributeType::Int,
            AttributeValue::Float(_) => AttributeType::Float,
            AttributeValue::String(_) => AttributeType::String,
        }
    }

    /// Whether the value survives a JSON round trip (no NaN or infinity)
    pub fn is_finite(&self) -> bool {
        match self {
            AttributeValue::Float(x) => x.is_finite(),
            _ => true,
        }
    }

    /// Parse raw text (e.g. from a command-line override) as the given type
    ///
    /// Floats must be finite.
    pub fn parse_as(ty: AttributeType, text: &str) -> Result<Self> {
        let invalid = || Error::InvalidAttributeValue {
            value: text.to_string(),
            expected: ty.to_string(),
        };

        match ty {
            AttributeType::Int => text
                .trim()
                .parse()
                .map(AttributeValue::Int)
                .map_err(|_| invalid()),
            AttributeType::Float => text
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|x| x.is_finite())
                .map(AttributeValue::Float)
                .ok_or_else(invalid),
            AttributeType::Bool => text
                .trim()
                .parse()
                .map(AttributeValue::Bool)
                .map_err(|_| invalid()),
            AttributeType::String => Ok(AttributeValue::String(text.to_string())),
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Bool(b) => write!(f, "{}", b),
            AttributeValue::Int(i) => write!(f, "{}", i),
            AttributeValue::Float(x) => write!(f, "{}", x),
            AttributeValue::String(s) => f.write_str(s),
        }
    }
}

/// Signature of one input or output argument
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArgumentSignature {
    /// Argument name
    pub name: String,

    /// Stream type, e.g. `gst/video` or `protobuf/google.cloud.visionai.v1.Foo`
    #[serde(rename = "type")]
    pub ty: String,
}

/// Signature of one operator attribute
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeSignature {
    /// Attribute name
    pub name: String,

    /// Declared type
    #[serde(rename = "type")]
    pub ty: AttributeType,

    /// Value used when the analyzer omits the attribute
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<AttributeValue>,
}

/// Resources one analyzer instance of an operator requires
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceSpec {
    /// CPU request (Kubernetes quantity)
    pub cpu: String,

    /// Memory request (Kubernetes quantity)
    pub memory: String,

    /// CPU limit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_limits: Option<String>,

    /// Memory limit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_limits: Option<String>,

    /// Number of GPUs
    #[serde(default)]
    pub gpus: u32,

    /// Latency budget per frame in milliseconds
    #[serde(default)]
    pub latency_budget_ms: u64,

    /// Environment variables set on every instance
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
}

/// A resolved operator catalog entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperatorInfo {
    /// Operator name (unique within a registry)
    pub name: String,

    /// Human readable description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Container image, relative to the deployment registry
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    /// Ordered input arguments
    #[serde(default)]
    pub input_args: Vec<ArgumentSignature>,

    /// Ordered output arguments
    #[serde(default)]
    pub output_args: Vec<ArgumentSignature>,

    /// Ordered attribute signatures
    #[serde(default)]
    pub attributes: Vec<AttributeSignature>,

    /// Resource requirements
    pub resources: ResourceSpec,
}

impl OperatorInfo {
    /// Look up an attribute signature by name
    pub fn attribute(&self, name: &str) -> Option<&AttributeSignature> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Container image for this operator
    ///
    /// Falls back to `analyzers/<lowercased name>:latest` when the catalog
    /// does not name one.
    pub fn image_name(&self) -> String {
        self.image
            .clone()
            .unwrap_or_else(|| format!("analyzers/{}:latest", self.name.to_lowercase()))
    }

    /// Check the entry is usable
    ///
    /// Rejects empty names, empty cpu/memory requests, duplicate argument or
    /// attribute names and defaults whose type differs from the declared one.
    pub fn validate(&self) -> Result<()> {
        let invalid = |message: String| Error::InvalidOperator {
            operator: self.name.clone(),
            message,
        };

        if self.name.trim().is_empty() {
            return Err(invalid("operator name is empty".to_string()));
        }
        if self.resources.cpu.trim().is_empty() {
            return Err(invalid("resources.cpu must not be empty".to_string()));
        }
        if self.resources.memory.trim().is_empty() {
            return Err(invalid("resources.memory must not be empty".to_string()));
        }

        for (kind, args) in [("input", &self.input_args), ("output", &self.output_args)] {
            let mut seen = HashSet::new();
            for arg in args {
                if !seen.insert(arg.name.as_str()) {
                    return Err(invalid(format!(
                        "{} argument '{}' declared more than once",
                        kind, arg.name
                    )));
                }
            }
        }

        let mut seen = HashSet::new();
        for attr in &self.attributes {
            if !seen.insert(attr.name.as_str()) {
                return Err(invalid(format!(
                    "attribute '{}' declared more than once",
                    attr.name
                )));
            }
            if let Some(default) = &attr.default
                && default.attribute_type() != attr.ty
            {
                return Err(invalid(format!(
                    "default for attribute '{}' is {} but the attribute is declared {}",
                    attr.name,
                    default.attribute_type(),
                    attr.ty
                )));
            }
        }

        Ok(())
    }
}
