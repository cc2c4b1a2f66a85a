//! Per-analyzer runtime configuration
//!
//! Serialized to JSON and handed to each analyzer container on its command
//! line. Channel endpoints may contain linker placeholders.

use std::collections::BTreeMap;

use lva_core::operators::AttributeValue;
use serde::{Deserialize, Serialize};

use super::RunMode;

/// Port analyzers serve direct stream delivery on
pub const DIRECT_PORT: u16 = 50051;

/// Port of the metrics endpoint when monitoring is enabled
pub const METRICS_PORT: u16 = 9090;

/// Runtime configuration of one analyzer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Analysis name
    pub analysis: String,
    /// Analyzer name
    pub analyzer: String,
    /// Operator name
    pub operator: String,
    /// Run mode
    pub run_mode: RunMode,
    /// Resolved attributes
    pub attributes: BTreeMap<String, AttributeValue>,
    /// Where inputs are read from
    pub inputs: Vec<Channel>,
    /// Where outputs are written to
    pub outputs: Vec<Channel>,
    /// Execution parameters
    pub execution: ExecutionConfig,
    /// Monitoring parameters
    pub monitoring: MonitoringSettings,
}

/// One input or output channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    /// Operator argument the channel is bound to
    pub argument: String,
    /// Endpoint
    #[serde(flatten)]
    pub endpoint: Endpoint,
}

/// Channel endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Endpoint {
    /// An external series, named by a placeholder until linked
    Series {
        /// Series placeholder
        series: String,
    },
    /// Direct delivery between analyzers
    Direct {
        /// Address to dial (inputs) or listen on (outputs)
        address: String,
        /// Stream carried on the connection
        stream: String,
    },
}

/// Execution parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Per-frame latency budget
    pub latency_budget_ms: u64,
    /// Verbose analyzer logging
    pub debug: bool,
}

/// Monitoring parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitoringSettings {
    /// Whether metrics are exported
    pub enabled: bool,
    /// Metrics port, when enabled
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics_port: Option<u16>,
}

impl MonitoringSettings {
    /// Settings for a monitoring flag
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            metrics_port: enabled.then_some(METRICS_PORT),
        }
    }
}

/// In-cluster address of a workload's direct delivery service
pub fn service_address(workload: &str) -> String {
    format!(
        "{}.__NAMESPACE__.svc.__CLUSTER_DOMAIN__:{}",
        workload, DIRECT_PORT
    )
}

/// Address an analyzer listens on for direct delivery
pub fn listen_address() -> String {
    format!("0.0.0.0:{}", DIRECT_PORT)
}
