//! Kubernetes manifest backend
//!
//! Produces a [`Program`]: a multi-document YAML template with one
//! process-manager Deployment, one workload per analyzer and a Service for
//! every analyzer that delivers streams directly to other analyzers.
//! Input and output series stay as placeholders for the linker.

use std::collections::HashMap;

use minijinja::Environment;
use serde::Serialize;

use super::runtime::{
    listen_address, service_address, Channel, Endpoint, ExecutionConfig, MonitoringSettings,
    RuntimeConfig, DIRECT_PORT, METRICS_PORT,
};
use super::{dns_label, Backend, CodegenOptions, CodegenOutput, Program, RunMode, SeriesPlaceholder};
use crate::error::{Error, Result};
use crate::graph::{Graph, NodeId, SINK, SOURCE};
use crate::ir::{AnalyzerInfo, Element};
use crate::traversal::reverse_dfs;

const WORKLOAD_TEMPLATE: &str = include_str!("../../templates/workload.yaml.j2");
const SERVICE_TEMPLATE: &str = include_str!("../../templates/service.yaml.j2");
const PROCESS_MANAGER_TEMPLATE: &str = include_str!("../../templates/process_manager.yaml.j2");

/// Deployment manifest backend
pub struct ManifestBackend {
    env: Environment<'static>,
}

#[derive(Serialize)]
struct NamedValue {
    name: String,
    value: String,
}

#[derive(Serialize)]
struct ContainerPort {
    name: &'static str,
    number: u16,
}

#[derive(Serialize)]
struct WorkloadContext {
    api_version: &'static str,
    kind: &'static str,
    workload: String,
    analysis: String,
    operator: String,
    container: String,
    image: String,
    config: String,
    env: Vec<NamedValue>,
    ports: Vec<ContainerPort>,
    metrics_port: Option<u16>,
    cpu: String,
    memory: String,
    limits: Vec<NamedValue>,
}

/// Series placeholders assigned before lowering
#[derive(Default)]
struct Lowering {
    input_series: Vec<SeriesPlaceholder>,
    output_series: Vec<SeriesPlaceholder>,
    input_placeholders: HashMap<NodeId, String>,
    output_placeholders: HashMap<NodeId, String>,
}

impl ManifestBackend {
    /// Create the backend with its templates loaded
    pub fn new() -> Result<Self> {
        // Template names carry no extension so nothing is auto-escaped.
        let mut env = Environment::new();
        env.add_template("workload", WORKLOAD_TEMPLATE)?;
        env.add_template("service", SERVICE_TEMPLATE)?;
        env.add_template("process_manager", PROCESS_MANAGER_TEMPLATE)?;
        Ok(Self { env })
    }

    fn render(&self, name: &str, ctx: impl Serialize) -> Result<String> {
        let text = self.env.get_template(name)?.render(ctx)?;
        Ok(format!("{}\n", text.trim_end()))
    }

    fn render_analyzer(
        &self,
        graph: &Graph,
        id: NodeId,
        lowering: &Lowering,
        analysis: &str,
        options: &CodegenOptions,
    ) -> Result<Vec<String>> {
        let analyzer = analyzer_at(graph, id)?;
        let workload = workload_name(analysis, &analyzer.name);

        let inputs = input_channels(graph, id, analyzer, lowering, analysis)?;
        let outputs = output_channels(graph, analyzer, lowering)?;
        let direct = outputs
            .iter()
            .any(|c| matches!(c.endpoint, Endpoint::Direct { .. }));

        let config = RuntimeConfig {
            analysis: analysis.to_string(),
            analyzer: analyzer.name.clone(),
            operator: analyzer.operator.name.clone(),
            run_mode: options.run_mode,
            attributes: analyzer.attributes.clone(),
            inputs,
            outputs,
            execution: ExecutionConfig {
                latency_budget_ms: analyzer.resources.latency_budget_ms,
                debug: options.debug,
            },
            monitoring: MonitoringSettings::new(analyzer.monitoring.enabled),
        };

        let (api_version, kind) = match options.run_mode {
            RunMode::Live => ("apps/v1", "Deployment"),
            RunMode::Submission => ("batch/v1", "Job"),
        };

        let mut env: Vec<NamedValue> = analyzer
            .resources
            .env
            .iter()
            .map(|(name, value)| quoted(name, value))
            .collect::<Result<_>>()?;
        if options.debug {
            env.push(quoted("LVA_DEBUG", "1")?);
        }

        let mut ports = Vec::new();
        if direct {
            ports.push(ContainerPort {
                name: "grpc",
                number: DIRECT_PORT,
            });
        }
        if analyzer.monitoring.enabled {
            ports.push(ContainerPort {
                name: "metrics",
                number: METRICS_PORT,
            });
        }

        let resources = &analyzer.resources;
        let mut limits = Vec::new();
        if let Some(cpu) = &resources.cpu_limits {
            limits.push(quoted("cpu", cpu)?);
        }
        if let Some(memory) = &resources.memory_limits {
            limits.push(quoted("memory", memory)?);
        }
        if resources.gpus > 0 {
            limits.push(quoted("nvidia.com/gpu", &resources.gpus.to_string())?);
        }

        let ctx = WorkloadContext {
            api_version,
            kind,
            workload: workload.clone(),
            analysis: analysis.to_string(),
            operator: yaml_string(&analyzer.operator.name)?,
            container: dns_label(&analyzer.name),
            image: yaml_string(&format!("__REGISTRY__/{}", analyzer.operator.image_name()))?,
            config: yaml_string(&serde_json::to_string(&config)?)?,
            env,
            ports,
            metrics_port: config.monitoring.metrics_port,
            cpu: yaml_string(&resources.cpu)?,
            memory: yaml_string(&resources.memory)?,
            limits,
        };

        tracing::debug!("Lowering analyzer '{}' to {} {}", analyzer.name, kind, workload);

        let mut documents = vec![self.render("workload", &ctx)?];
        if direct {
            documents.push(self.render(
                "service",
                minijinja::context! {
                    workload => workload,
                    analysis => analysis,
                    port => DIRECT_PORT,
                },
            )?);
        }
        Ok(documents)
    }
}

impl Backend for ManifestBackend {
    fn name(&self) -> &'static str {
        "manifest"
    }

    fn generate(&self, graph: &Graph, options: &CodegenOptions) -> Result<CodegenOutput> {
        let analysis = match dns_label(&options.analysis_name) {
            label if label.is_empty() => "analysis".to_string(),
            label => label,
        };

        // An analyzer is left before its output streams, so placeholders
        // are numbered in a first walk.
        let lowering = assign_placeholders(graph)?;

        let mut analyzer_args = Vec::new();
        let mut documents = Vec::new();
        reverse_dfs(
            graph,
            &[SINK],
            |_| Ok(()),
            |id| match graph.element(id)? {
                Element::Sentinel(_) | Element::Stream(_) => Ok(()),
                Element::Analyzer(analyzer) => {
                    analyzer_args.push(yaml_string(&format!(
                        "--analyzer={}:{}:{}",
                        analyzer.name,
                        analyzer.operator.name,
                        workload_name(&analysis, &analyzer.name)
                    ))?);
                    let rendered = self.render_analyzer(graph, id, &lowering, &analysis, options)?;
                    documents.extend(rendered);
                    Ok(())
                }
            },
        )?;

        documents.insert(
            0,
            self.render(
                "process_manager",
                minijinja::context! {
                    name => format!("{}-process-manager", analysis),
                    analysis => &analysis,
                    run_mode => options.run_mode.as_str(),
                    analyzer_args => analyzer_args,
                },
            )?,
        );

        tracing::debug!(
            "Generated {} documents ({} input series, {} output series)",
            documents.len(),
            lowering.input_series.len(),
            lowering.output_series.len()
        );

        Ok(CodegenOutput::Program(Program {
            input_series: lowering.input_series,
            output_series: lowering.output_series,
            template: documents.join("---\n"),
        }))
    }
}

fn assign_placeholders(graph: &Graph) -> Result<Lowering> {
    let mut lowering = Lowering::default();
    reverse_dfs(
        graph,
        &[SINK],
        |_| Ok(()),
        |id| match graph.element(id)? {
            Element::Sentinel(_) => Ok(()),
            Element::Analyzer(analyzer) => {
                if graph.in_edges(id)?.iter().any(|e| e.src == SOURCE) {
                    let placeholder = format!("__INPUT_SERIES_{}__", lowering.input_series.len());
                    lowering.input_series.push(SeriesPlaceholder {
                        placeholder: placeholder.clone(),
                        target: analyzer.name.clone(),
                    });
                    lowering.input_placeholders.insert(id, placeholder);
                }
                Ok(())
            }
            Element::Stream(stream) => {
                if stream.fan_out == 0 {
                    let placeholder = format!("__OUTPUT_SERIES_{}__", lowering.output_series.len());
                    lowering.output_series.push(SeriesPlaceholder {
                        placeholder: placeholder.clone(),
                        target: stream.name.clone(),
                    });
                    lowering.output_placeholders.insert(id, placeholder);
                }
                Ok(())
            }
        },
    )?;
    Ok(lowering)
}

/// Workload name of an analyzer (`lobby`, `person_blur` -> `lobby-person-blur`)
pub fn workload_name(analysis: &str, analyzer: &str) -> String {
    format!("{}-{}", analysis, analyzer.replace('_', "-"))
}

fn analyzer_at(graph: &Graph, id: NodeId) -> Result<&AnalyzerInfo> {
    graph
        .element(id)?
        .as_analyzer()
        .ok_or_else(|| Error::Internal(format!("{} is not an analyzer", id)))
}

fn input_channels(
    graph: &Graph,
    id: NodeId,
    analyzer: &AnalyzerInfo,
    lowering: &Lowering,
    analysis: &str,
) -> Result<Vec<Channel>> {
    let args = &analyzer.operator.input_args;
    if args.len() != analyzer.input_streams.len() {
        return Err(Error::Internal(format!(
            "inputs of '{}' were not resolved",
            analyzer.name
        )));
    }

    let mut channels = Vec::with_capacity(args.len() + 1);
    if let Some(series) = lowering.input_placeholders.get(&id) {
        channels.push(Channel {
            argument: "input_series".to_string(),
            endpoint: Endpoint::Series {
                series: series.clone(),
            },
        });
    }

    for (arg, stream_id) in args.iter().zip(&analyzer.input_streams) {
        let stream = graph
            .element(*stream_id)?
            .as_stream()
            .ok_or_else(|| Error::Internal(format!("{} is not a stream", stream_id)))?;
        let producer = graph
            .in_edges(*stream_id)?
            .into_iter()
            .find(|e| !Graph::is_sentinel_edge(e))
            .ok_or_else(|| Error::Internal(format!("stream '{}' has no producer", stream.name)))?;
        let producer = analyzer_at(graph, producer.src)?;

        channels.push(Channel {
            argument: arg.name.clone(),
            endpoint: Endpoint::Direct {
                address: service_address(&workload_name(analysis, &producer.name)),
                stream: stream.name.clone(),
            },
        });
    }
    Ok(channels)
}

fn output_channels(
    graph: &Graph,
    analyzer: &AnalyzerInfo,
    lowering: &Lowering,
) -> Result<Vec<Channel>> {
    let mut channels = Vec::with_capacity(analyzer.output_streams.len());
    for (arg, slot) in analyzer.operator.output_args.iter().zip(&analyzer.output_streams) {
        let stream_id = slot.ok_or_else(|| {
            Error::Internal(format!(
                "output '{}' of '{}' was not resolved",
                arg.name, analyzer.name
            ))
        })?;
        let stream = graph
            .element(stream_id)?
            .as_stream()
            .ok_or_else(|| Error::Internal(format!("{} is not a stream", stream_id)))?;

        let endpoint = match lowering.output_placeholders.get(&stream_id) {
            Some(series) => Endpoint::Series {
                series: series.clone(),
            },
            None => Endpoint::Direct {
                address: listen_address(),
                stream: stream.name.clone(),
            },
        };
        channels.push(Channel {
            argument: arg.name.clone(),
            endpoint,
        });
    }
    Ok(channels)
}

/// A string as a double-quoted YAML scalar
///
/// JSON string literals are valid YAML double-quoted scalars.
fn yaml_string(value: &str) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}

fn quoted(name: &str, value: &str) -> Result<NamedValue> {
    Ok(NamedValue {
        name: yaml_string(name)?,
        value: yaml_string(value)?,
    })
}
