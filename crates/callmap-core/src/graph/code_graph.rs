//! In-memory call/import graph backed by petgraph::DiGraph.

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::config::FunctionDefinition;

/// Node kinds, declared in export order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Directory,
    File,
    Import,
    Function,
}

impl NodeKind {
    /// Prefix used in exported node ids.
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Directory => "dir",
            Self::File => "file",
            Self::Import => "import",
            Self::Function => "func",
        }
    }

    fn from_prefix(s: &str) -> Option<Self> {
        match s {
            "dir" => Some(Self::Directory),
            "file" => Some(Self::File),
            "import" => Some(Self::Import),
            "func" => Some(Self::Function),
            _ => None,
        }
    }
}

/// Identity of a node: unique per (kind, key).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    pub kind: NodeKind,
    pub key: String,
}

impl NodeId {
    pub fn directory(path: &str) -> Self {
        Self {
            kind: NodeKind::Directory,
            key: path.to_string(),
        }
    }

    pub fn file(path: &str) -> Self {
        Self {
            kind: NodeKind::File,
            key: path.to_string(),
        }
    }

    pub fn import(module: &str) -> Self {
        Self {
            kind: NodeKind::Import,
            key: module.to_string(),
        }
    }

    pub fn function(qualified_key: &str) -> Self {
        Self {
            kind: NodeKind::Function,
            key: qualified_key.to_string(),
        }
    }

    /// Parse an exported id such as `func:utils.py::log_message`.
    pub fn parse(raw: &str) -> Option<Self> {
        let (prefix, key) = raw.split_once(':')?;
        let kind = NodeKind::from_prefix(prefix)?;
        if key.is_empty() {
            return None;
        }
        Some(Self {
            kind,
            key: key.to_string(),
        })
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.kind.prefix(), self.key)
    }
}

/// Cosmetic attributes. Unset fields fall back to exporter defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeStyle {
    pub color: Option<String>,
    pub shape: Option<String>,
    pub size: Option<u32>,
}

impl NodeStyle {
    pub fn for_kind(kind: NodeKind) -> Self {
        let (color, shape, size) = match kind {
            NodeKind::Directory => ("#ADD8E6", Some("box"), 20),
            NodeKind::File => ("#FF6B6B", Some("dot"), 15),
            NodeKind::Import => ("#4ECDC4", Some("dot"), 10),
            NodeKind::Function => ("#FFFFFF", None, 7),
        };
        Self {
            color: Some(color.to_string()),
            shape: shape.map(String::from),
            size: Some(size),
        }
    }
}

/// Semantic payload of a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeData {
    Directory {
        path: String,
    },
    File {
        path: String,
        module_name: String,
        lines: usize,
    },
    Import {
        module: String,
    },
    Function(FunctionDefinition),
}

impl NodeData {
    pub fn kind(&self) -> NodeKind {
        match self {
            NodeData::Directory { .. } => NodeKind::Directory,
            NodeData::File { .. } => NodeKind::File,
            NodeData::Import { .. } => NodeKind::Import,
            NodeData::Function(_) => NodeKind::Function,
        }
    }

    pub fn label(&self) -> String {
        match self {
            NodeData::Directory { path } => path.clone(),
            NodeData::File { module_name, .. } => module_name.clone(),
            NodeData::Import { module } => module.clone(),
            NodeData::Function(def) => def.short_name.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GraphNode {
    pub id: NodeId,
    pub data: NodeData,
    pub style: NodeStyle,
}

/// How a call target was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "tier", rename_all = "snake_case")]
pub enum CallTier {
    /// Callee defined in the caller's file.
    SameFile,
    /// Callee picked from `candidates` definitions in other files.
    Global { candidates: usize },
}

impl CallTier {
    pub fn confidence(&self) -> f64 {
        match self {
            CallTier::SameFile => 0.85,
            CallTier::Global { candidates: 1 } => 0.5,
            CallTier::Global { .. } => 0.3,
        }
    }
}

/// Edge data stored in the graph.
#[derive(Debug, Clone, PartialEq)]
pub enum EdgeData {
    Contains,
    Calls { count: usize, tier: CallTier },
}

/// A resolved call edge, flattened for queries.
#[derive(Debug, Clone, PartialEq)]
pub struct CallInfo {
    pub from: String,
    pub to: String,
    pub count: usize,
    pub tier: CallTier,
}

/// Wrapper around petgraph::DiGraph with typed node/edge methods.
pub struct CodeGraph {
    graph: DiGraph<GraphNode, EdgeData>,
    /// O(1) identity → NodeIndex lookup.
    id_index: HashMap<NodeId, NodeIndex>,
}

impl CodeGraph {
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            id_index: HashMap::new(),
        }
    }

    /// Get or create a node. Re-adding an existing identity is a no-op.
    fn ensure_node(&mut self, id: NodeId, data: NodeData) -> NodeIndex {
        if let Some(&idx) = self.id_index.get(&id) {
            idx
        } else {
            let style = NodeStyle::for_kind(data.kind());
            let idx = self.graph.add_node(GraphNode {
                id: id.clone(),
                data,
                style,
            });
            self.id_index.insert(id, idx);
            idx
        }
    }

    pub fn has_node(&self, id: &NodeId) -> bool {
        self.id_index.contains_key(id)
    }

    pub fn node(&self, id: &NodeId) -> Option<&GraphNode> {
        self.id_index
            .get(id)
            .and_then(|&idx| self.graph.node_weight(idx))
    }

    // --- Node addition ---

    pub fn add_directory(&mut self, path: &str) -> NodeIndex {
        self.ensure_node(
            NodeId::directory(path),
            NodeData::Directory {
                path: path.to_string(),
            },
        )
    }

    pub fn add_file(&mut self, path: &str, lines: usize) -> NodeIndex {
        let module_name = std::path::Path::new(path)
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| path.to_string());
        self.ensure_node(
            NodeId::file(path),
            NodeData::File {
                path: path.to_string(),
                module_name,
                lines,
            },
        )
    }

    pub fn add_import(&mut self, module: &str) -> NodeIndex {
        self.ensure_node(
            NodeId::import(module),
            NodeData::Import {
                module: module.to_string(),
            },
        )
    }

    /// Add a function node and the Contains edge from its file.
    pub fn add_function(&mut self, def: &FunctionDefinition) -> NodeIndex {
        let file_idx = self.add_file(&def.file, 0);
        let fn_idx = self.ensure_node(
            NodeId::function(&def.qualified_key),
            NodeData::Function(def.clone()),
        );
        self.link_contains(file_idx, fn_idx);
        fn_idx
    }

    /// Add a Contains edge between two existing nodes.
    pub fn add_contains(&mut self, parent: &NodeId, child: &NodeId) -> bool {
        match (self.id_index.get(parent), self.id_index.get(child)) {
            (Some(&from), Some(&to)) => {
                self.link_contains(from, to);
                true
            }
            _ => false,
        }
    }

    fn link_contains(&mut self, from: NodeIndex, to: NodeIndex) {
        let exists = self
            .graph
            .edges_connecting(from, to)
            .any(|e| matches!(e.weight(), EdgeData::Contains));
        if !exists {
            self.graph.add_edge(from, to, EdgeData::Contains);
        }
    }

    /// Add (or bump) a Calls edge. Both keys must name existing function nodes.
    pub fn add_call(&mut self, from_key: &str, to_key: &str, tier: CallTier) -> bool {
        let (Some(&from), Some(&to)) = (
            self.id_index.get(&NodeId::function(from_key)),
            self.id_index.get(&NodeId::function(to_key)),
        ) else {
            return false;
        };

        let existing = self
            .graph
            .edges_connecting(from, to)
            .find(|e| matches!(e.weight(), EdgeData::Calls { .. }))
            .map(|e| e.id());
        match existing {
            Some(edge_idx) => {
                if let Some(EdgeData::Calls { count, .. }) = self.graph.edge_weight_mut(edge_idx) {
                    *count += 1;
                }
            }
            None => {
                self.graph
                    .add_edge(from, to, EdgeData::Calls { count: 1, tier });
            }
        }
        true
    }

    // --- Queries ---

    pub fn nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.graph.node_weights()
    }

    pub fn nodes_of_kind(&self, kind: NodeKind) -> impl Iterator<Item = &GraphNode> {
        self.graph.node_weights().filter(move |n| n.id.kind == kind)
    }

    /// All edges as (source id, target id, data).
    pub fn edges(&self) -> Vec<(&NodeId, &NodeId, &EdgeData)> {
        self.graph
            .edge_references()
            .map(|e| {
                (
                    &self.graph[e.source()].id,
                    &self.graph[e.target()].id,
                    e.weight(),
                )
            })
            .collect()
    }

    pub fn functions(&self) -> Vec<&FunctionDefinition> {
        self.graph
            .node_weights()
            .filter_map(|n| match &n.data {
                NodeData::Function(def) => Some(def),
                _ => None,
            })
            .collect()
    }

    pub fn call_edges(&self) -> Vec<CallInfo> {
        self.graph
            .edge_references()
            .filter_map(|e| match e.weight() {
                EdgeData::Calls { count, tier } => Some(CallInfo {
                    from: self.graph[e.source()].id.key.clone(),
                    to: self.graph[e.target()].id.key.clone(),
                    count: *count,
                    tier: *tier,
                }),
                EdgeData::Contains => None,
            })
            .collect()
    }

    pub fn contains_edges(&self) -> Vec<(NodeId, NodeId)> {
        self.graph
            .edge_references()
            .filter(|e| matches!(e.weight(), EdgeData::Contains))
            .map(|e| {
                (
                    self.graph[e.source()].id.clone(),
                    self.graph[e.target()].id.clone(),
                )
            })
            .collect()
    }

    /// Functions defined in a file, in line order.
    pub fn get_functions_in_file(&self, path: &str) -> Vec<&FunctionDefinition> {
        let Some(&file_idx) = self.id_index.get(&NodeId::file(path)) else {
            return Vec::new();
        };
        let mut result: Vec<&FunctionDefinition> = self
            .graph
            .edges(file_idx)
            .filter(|e| matches!(e.weight(), EdgeData::Contains))
            .filter_map(|e| match &self.graph[e.target()].data {
                NodeData::Function(def) => Some(def),
                _ => None,
            })
            .collect();
        result.sort_by(|a, b| a.line.cmp(&b.line).then_with(|| a.short_name.cmp(&b.short_name)));
        result
    }

    // --- Counts ---

    pub fn count_of(&self, kind: NodeKind) -> usize {
        self.nodes_of_kind(kind).count()
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn call_edge_count(&self) -> usize {
        self.graph
            .edge_weights()
            .filter(|e| matches!(e, EdgeData::Calls { .. }))
            .count()
    }
}

impl Default for CodeGraph {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::qualified_key;

    fn def(file: &str, name: &str, line: usize) -> FunctionDefinition {
        FunctionDefinition {
            qualified_key: qualified_key(file, name),
            short_name: name.to_string(),
            file: file.to_string(),
            line,
            end_line: line + 2,
            byte_range: (0, 0),
        }
    }

    #[test]
    fn node_id_round_trips_through_display() {
        let id = NodeId::function("pkg/utils.py::helper");
        assert_eq!(id.to_string(), "func:pkg/utils.py::helper");
        assert_eq!(NodeId::parse("func:pkg/utils.py::helper"), Some(id));
        assert_eq!(NodeId::parse("dir:."), Some(NodeId::directory(".")));
        assert_eq!(NodeId::parse("nope:x"), None);
        assert_eq!(NodeId::parse("file:"), None);
        assert_eq!(NodeId::parse("plain"), None);
    }

    #[test]
    fn re_adding_a_node_is_a_no_op() {
        let mut g = CodeGraph::new();
        let a = g.add_file("main.py", 10);
        let b = g.add_file("main.py", 99);
        assert_eq!(a, b);
        assert_eq!(g.count_of(NodeKind::File), 1);
        g.add_import("utils");
        g.add_import("utils");
        assert_eq!(g.count_of(NodeKind::Import), 1);
    }

    #[test]
    fn file_label_is_module_name() {
        let mut g = CodeGraph::new();
        g.add_file("pkg/data_processor.py", 3);
        let node = g.node(&NodeId::file("pkg/data_processor.py")).unwrap();
        assert_eq!(node.data.label(), "data_processor");
        assert_eq!(node.style, NodeStyle::for_kind(NodeKind::File));
    }

    #[test]
    fn same_name_in_two_files_gives_two_nodes() {
        let mut g = CodeGraph::new();
        g.add_function(&def("a.py", "helper", 1));
        g.add_function(&def("b.py", "helper", 1));
        assert_eq!(g.count_of(NodeKind::Function), 2);
        assert_eq!(g.get_functions_in_file("a.py").len(), 1);
        assert_eq!(g.get_functions_in_file("b.py")[0].qualified_key, "b.py::helper");
    }

    #[test]
    fn add_function_creates_single_contains_edge() {
        let mut g = CodeGraph::new();
        g.add_file("a.py", 5);
        g.add_function(&def("a.py", "f", 1));
        g.add_function(&def("a.py", "f", 1));
        assert_eq!(
            g.contains_edges(),
            vec![(NodeId::file("a.py"), NodeId::function("a.py::f"))]
        );
    }

    #[test]
    fn call_edges_are_deduplicated_with_count() {
        let mut g = CodeGraph::new();
        g.add_function(&def("a.py", "f", 1));
        g.add_function(&def("a.py", "g", 5));
        assert!(g.add_call("a.py::f", "a.py::g", CallTier::SameFile));
        assert!(g.add_call("a.py::f", "a.py::g", CallTier::SameFile));
        let calls = g.call_edges();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].count, 2);
        assert_eq!((calls[0].from.as_str(), calls[0].to.as_str()), ("a.py::f", "a.py::g"));
    }

    #[test]
    fn call_to_unknown_function_is_rejected() {
        let mut g = CodeGraph::new();
        g.add_function(&def("a.py", "f", 1));
        g.add_import("utils");
        assert!(!g.add_call("a.py::f", "a.py::missing", CallTier::SameFile));
        assert!(!g.add_call("a.py::f", "utils", CallTier::Global { candidates: 1 }));
        assert_eq!(g.call_edge_count(), 0);
    }

    #[test]
    fn recursion_is_a_self_loop() {
        let mut g = CodeGraph::new();
        g.add_function(&def("a.py", "fact", 1));
        assert!(g.add_call("a.py::fact", "a.py::fact", CallTier::SameFile));
        let calls = g.call_edges();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].from, calls[0].to);
    }

    #[test]
    fn contains_between_directories() {
        let mut g = CodeGraph::new();
        g.add_directory(".");
        g.add_directory("pkg");
        assert!(g.add_contains(&NodeId::directory("."), &NodeId::directory("pkg")));
        assert!(!g.add_contains(&NodeId::directory("."), &NodeId::file("missing.py")));
        assert_eq!(g.edge_count(), 1);
    }

    #[test]
    fn tier_confidence() {
        assert_eq!(CallTier::SameFile.confidence(), 0.85);
        assert_eq!(CallTier::Global { candidates: 1 }.confidence(), 0.5);
        assert_eq!(CallTier::Global { candidates: 3 }.confidence(), 0.3);
    }
}
