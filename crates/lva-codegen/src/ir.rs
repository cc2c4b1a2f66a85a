//! Node payloads of the abstract semantic graph
//!
//! Every node of a [`Graph`](crate::graph::Graph) carries exactly one
//! [`Element`]. The variant set is closed: streams, analyzers and the two
//! sentinels.

use std::collections::BTreeMap;

use lva_core::analysis::MonitoringConfig;
use lva_core::operators::{AttributeValue, OperatorInfo, ResourceSpec};

use crate::graph::NodeId;

/// Type that matches every other stream type
pub const ANY_TYPE: &str = "special/any";

/// Payload of a graph node
#[derive(Debug, Clone)]
pub enum Element {
    /// A typed data channel produced by one analyzer output argument
    Stream(StreamInfo),

    /// A configured operator instance
    Analyzer(AnalyzerInfo),

    /// The Source or Sink marker
    Sentinel(SentinelInfo),
}

/// A named, typed stream
#[derive(Debug, Clone)]
pub struct StreamInfo {
    /// Stream name, `"analyzer:argument"`
    pub name: String,

    /// Stream type
    pub ty: String,

    /// Number of analyzers consuming this stream (filled in by sema)
    pub fan_out: usize,
}

/// One configured operator instance
#[derive(Debug, Clone)]
pub struct AnalyzerInfo {
    /// Analyzer name
    pub name: String,

    /// Operator signature, copied out of the registry
    pub operator: OperatorInfo,

    /// Attribute values (completed with defaults by sema)
    pub attributes: BTreeMap<String, AttributeValue>,

    /// Resources, including merged debug environment variables
    pub resources: ResourceSpec,

    /// Input streams by operator input argument index (filled in by sema)
    pub input_streams: Vec<NodeId>,

    /// Output streams by operator output argument index (filled in by sema)
    pub output_streams: Vec<Option<NodeId>>,

    /// Monitoring settings
    pub monitoring: MonitoringConfig,
}

/// Source or Sink sentinel
#[derive(Debug, Clone, Default)]
pub struct SentinelInfo {
    /// "Source" or "Sink"
    pub name: String,

    /// Names of nodes with an edge into this sentinel
    pub input_node_names: Vec<String>,

    /// Names of nodes this sentinel has an edge to
    pub output_node_names: Vec<String>,
}

impl Element {
    /// Display name of the element
    pub fn name(&self) -> &str {
        match self {
            Element::Stream(s) => &s.name,
            Element::Analyzer(a) => &a.name,
            Element::Sentinel(s) => &s.name,
        }
    }

    /// Short variant label, used in messages
    pub fn kind(&self) -> &'static str {
        match self {
            Element::Stream(_) => "stream",
            Element::Analyzer(_) => "analyzer",
            Element::Sentinel(_) => "sentinel",
        }
    }

    /// Stream payload, if this is a stream
    pub fn as_stream(&self) -> Option<&StreamInfo> {
        match self {
            Element::Stream(s) => Some(s),
            _ => None,
        }
    }

    /// Analyzer payload, if this is an analyzer
    pub fn as_analyzer(&self) -> Option<&AnalyzerInfo> {
        match self {
            Element::Analyzer(a) => Some(a),
            _ => None,
        }
    }

    /// Mutable analyzer payload, if this is an analyzer
    pub fn as_analyzer_mut(&mut self) -> Option<&mut AnalyzerInfo> {
        match self {
            Element::Analyzer(a) => Some(a),
            _ => None,
        }
    }
}

impl StreamInfo {
    /// Create a stream that nothing consumes yet
    pub fn new(name: impl Into<String>, ty: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ty: ty.into(),
            fan_out: 0,
        }
    }
}

impl AnalyzerInfo {
    /// Create an analyzer with no resolved streams
    pub fn new(name: impl Into<String>, operator: OperatorInfo) -> Self {
        let output_streams = vec![None; operator.output_args.len()];
        Self {
            name: name.into(),
            resources: operator.resources.clone(),
            operator,
            attributes: BTreeMap::new(),
            input_streams: Vec::new(),
            output_streams,
            monitoring: MonitoringConfig::default(),
        }
    }
}

impl SentinelInfo {
    /// Create a sentinel with no neighbors
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// Whether a stream type satisfies an argument type
///
/// Symmetric: equal types match, [`ANY_TYPE`] on either side matches
/// anything, and a type that is a string prefix of the other matches (a
/// dotted subtype). The prefix test is purely textual, so `protobuf/Foo`
/// also matches `protobuf/FooBar`.
pub fn types_match(stream_type: &str, argument_type: &str) -> bool {
    stream_type == argument_type
        || stream_type == ANY_TYPE
        || argument_type == ANY_TYPE
        || argument_type.starts_with(stream_type)
        || stream_type.starts_with(argument_type)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("gst/video", "gst/video", true)]
    #[case("protobuf/google.cloud.visionai.v1.Foo", "protobuf", true)]
    #[case("protobuf", "protobuf/google.cloud.visionai.v1.Foo", true)]
    #[case("special/any", "gst/video", true)]
    #[case("gst/video", "special/any", true)]
    #[case("string", "int", false)]
    #[case("gst/video", "protobuf", false)]
    fn test_types_match(#[case] stream: &str, #[case] argument: &str, #[case] expected: bool) {
        assert_eq!(types_match(stream, argument), expected);
    }

    // Known looseness: the subtype rule is a raw prefix test.
    #[test]
    fn test_types_match_prefix_is_textual() {
        assert!(types_match("protobuf/Foo", "protobuf/FooBar"));
    }

    #[test]
    fn test_analyzer_info_sizes_outputs() {
        let op: OperatorInfo = serde_yaml::from_str(
            r#"
name: Split
output_args:
  - name: left
    type: gst/video
  - name: right
    type: gst/video
resources:
  cpu: "1"
  memory: "1Gi"
"#,
        )
        .unwrap();

        let analyzer = AnalyzerInfo::new("split", op);
        assert_eq!(analyzer.output_streams, vec![None, None]);
        assert!(analyzer.input_streams.is_empty());
        assert_eq!(analyzer.resources.cpu, "1");
    }

    #[test]
    fn test_element_accessors() {
        let stream = Element::Stream(StreamInfo::new("a:out", "gst/video"));
        assert_eq!(stream.name(), "a:out");
        assert_eq!(stream.kind(), "stream");
        assert!(stream.as_stream().is_some());
        assert!(stream.as_analyzer().is_none());

        let sentinel = Element::Sentinel(SentinelInfo::new("Source"));
        assert_eq!(sentinel.name(), "Source");
        assert_eq!(sentinel.kind(), "sentinel");
    }
}
