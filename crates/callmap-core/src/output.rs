//! Rendering-friendly projection of the graph, JSON report and code inspection.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::{Diagnostics, ServiceError};
use crate::graph::code_graph::{
    CallInfo, CallTier, CodeGraph, EdgeData, NodeData, NodeId, NodeKind,
};
use crate::pipeline::AnalysisRun;

pub const DEFAULT_NODE_COLOR: &str = "#FFFFFF";
pub const DEFAULT_NODE_SHAPE: &str = "dot";
pub const DEFAULT_NODE_SIZE: u32 = 10;
pub const DEFAULT_EDGE_COLOR: &str = "#FFFFFF";

/// Returned by [`AnalysisRun::get_code`] when a node has no source text.
pub const CODE_NOT_FOUND: &str = "Code not found";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisNode {
    pub id: String,
    pub label: String,
    pub color: String,
    pub shape: String,
    pub size: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisEdge {
    pub from: String,
    pub to: String,
    pub color: String,
}

/// `{nodes, edges}` payload consumed by the browser renderer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphPayload {
    pub nodes: Vec<VisNode>,
    pub edges: Vec<VisEdge>,
}

/// Sort key: kind rank, then (file, line, name) for functions, else the key.
fn node_sort_key(data: &NodeData, id: &NodeId) -> (NodeKind, String, usize, String) {
    match data {
        NodeData::Function(def) => (id.kind, def.file.clone(), def.line, def.short_name.clone()),
        _ => (id.kind, id.key.clone(), 0, String::new()),
    }
}

/// Project the graph onto a list of styled nodes and edges in a stable order.
pub fn graph_data(kg: &CodeGraph) -> GraphPayload {
    let mut nodes: Vec<_> = kg.nodes().collect();
    nodes.sort_by_cached_key(|n| node_sort_key(&n.data, &n.id));

    let nodes = nodes
        .into_iter()
        .map(|n| VisNode {
            id: n.id.to_string(),
            label: n.data.label(),
            color: n
                .style
                .color
                .clone()
                .unwrap_or_else(|| DEFAULT_NODE_COLOR.to_string()),
            shape: n
                .style
                .shape
                .clone()
                .unwrap_or_else(|| DEFAULT_NODE_SHAPE.to_string()),
            size: n.style.size.unwrap_or(DEFAULT_NODE_SIZE),
        })
        .collect();

    let mut edges: Vec<VisEdge> = kg
        .edges()
        .into_iter()
        .map(|(from, to, _)| VisEdge {
            from: from.to_string(),
            to: to.to_string(),
            color: DEFAULT_EDGE_COLOR.to_string(),
        })
        .collect();
    edges.sort_by(|a, b| a.from.cmp(&b.from).then_with(|| a.to.cmp(&b.to)));

    GraphPayload { nodes, edges }
}

/// Code explanation collaborator.
pub trait Explainer {
    fn explain(&self, code: &str) -> Result<String, ServiceError>;
}

impl AnalysisRun {
    pub fn graph_data(&self) -> GraphPayload {
        graph_data(&self.graph)
    }

    /// Source for a file or function node, or [`CODE_NOT_FOUND`].
    pub fn get_code(&self, node_id: &str) -> String {
        self.find_code(node_id)
            .map(String::from)
            .unwrap_or_else(|| CODE_NOT_FOUND.to_string())
    }

    fn find_code(&self, node_id: &str) -> Option<&str> {
        let id = NodeId::parse(node_id)?;
        match id.kind {
            NodeKind::File => self.sources.get(&id.key).map(String::as_str),
            NodeKind::Function => {
                let node = self.graph.node(&id)?;
                let NodeData::Function(def) = &node.data else {
                    return None;
                };
                let text = self.sources.get(&def.file)?;
                text.get(def.byte_range.0..def.byte_range.1)
            }
            NodeKind::Directory | NodeKind::Import => None,
        }
    }

    /// Ask the explainer about a node's code. `Ok(None)` when the node has no code.
    pub fn explain(
        &self,
        node_id: &str,
        explainer: &dyn Explainer,
    ) -> Result<Option<String>, ServiceError> {
        match self.find_code(node_id) {
            Some(code) => explainer.explain(code).map(Some),
            None => Ok(None),
        }
    }
}

/// One resolved call with how it was found.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallRecord {
    pub from: String,
    pub to: String,
    pub count: usize,
    #[serde(flatten)]
    pub tier: CallTier,
    pub confidence: f64,
}

impl From<CallInfo> for CallRecord {
    fn from(call: CallInfo) -> Self {
        Self {
            confidence: call.tier.confidence(),
            from: call.from,
            to: call.to,
            count: call.count,
            tier: call.tier,
        }
    }
}

/// Resolved calls sorted by (caller, callee).
pub fn call_records(kg: &CodeGraph) -> Vec<CallRecord> {
    let mut calls: Vec<CallRecord> = kg.call_edges().into_iter().map(CallRecord::from).collect();
    calls.sort_by(|a, b| a.from.cmp(&b.from).then_with(|| a.to.cmp(&b.to)));
    calls
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiagnosticsSummary {
    pub file_failures: usize,
    pub unresolved_calls: usize,
    pub duplicate_definitions: usize,
}

/// Full JSON document written by the CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub version: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub stats: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub graph: GraphPayload,
    #[serde(default)]
    pub calls: Vec<CallRecord>,
    #[serde(default)]
    pub diagnostics: Diagnostics,
}

/// Build the report for a finished run.
pub fn build_report(run: &AnalysisRun) -> AnalysisReport {
    let kg = &run.graph;
    let root_name = run.config.root_name();

    let mut metadata = BTreeMap::new();
    metadata.insert("root_name".to_string(), serde_json::json!(root_name));
    metadata.insert("root_path".to_string(), serde_json::json!(run.config.root_path));
    metadata.insert(
        "analysed_at".to_string(),
        serde_json::json!(Utc::now().to_rfc3339()),
    );
    metadata.insert(
        "callmap_version".to_string(),
        serde_json::json!(env!("CARGO_PKG_VERSION")),
    );
    metadata.insert("layout".to_string(), serde_json::json!(run.config.layout));
    metadata.insert(
        "analysis_duration_ms".to_string(),
        serde_json::json!((run.total_ms * 10.0).round() / 10.0),
    );
    metadata.insert("phase_timings".to_string(), serde_json::json!(run.timings));
    metadata.insert("cancelled".to_string(), serde_json::json!(run.cancelled));

    let same_file_calls = kg
        .call_edges()
        .iter()
        .filter(|c| c.tier == CallTier::SameFile)
        .count();
    let contains_edges = kg
        .edges()
        .iter()
        .filter(|(_, _, e)| matches!(e, EdgeData::Contains))
        .count();

    let mut stats = BTreeMap::new();
    stats.insert("files".to_string(), serde_json::json!(kg.count_of(NodeKind::File)));
    stats.insert(
        "directories".to_string(),
        serde_json::json!(kg.count_of(NodeKind::Directory)),
    );
    stats.insert(
        "functions".to_string(),
        serde_json::json!(kg.count_of(NodeKind::Function)),
    );
    stats.insert("imports".to_string(), serde_json::json!(kg.count_of(NodeKind::Import)));
    stats.insert("calls".to_string(), serde_json::json!(kg.call_edge_count()));
    stats.insert("same_file_calls".to_string(), serde_json::json!(same_file_calls));
    stats.insert(
        "cross_file_calls".to_string(),
        serde_json::json!(kg.call_edge_count() - same_file_calls),
    );
    stats.insert("contains".to_string(), serde_json::json!(contains_edges));
    stats.insert(
        "diagnostics".to_string(),
        serde_json::to_value(DiagnosticsSummary {
            file_failures: run.diagnostics.file_failures.len(),
            unresolved_calls: run.diagnostics.unresolved_calls.len(),
            duplicate_definitions: run.diagnostics.duplicate_definitions.len(),
        })
        .unwrap_or_default(),
    );

    AnalysisReport {
        version: "1.0".to_string(),
        metadata,
        stats,
        graph: graph_data(kg),
        calls: call_records(kg),
        diagnostics: run.diagnostics.clone(),
    }
}

/// Write the report to a JSON file.
pub fn write_output(report: &AnalysisReport, output_path: &str) -> crate::error::Result<()> {
    if let Some(parent) = Path::new(output_path).parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(output_path, json)?;
    Ok(())
}
