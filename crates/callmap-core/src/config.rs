//! Core data types and configuration for a callmap run.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Separator between the file path and the short name in a qualified key.
pub const QUALIFIED_KEY_SEPARATOR: &str = "::";

/// Build the run-wide identity of a function: `file_path::short_name`.
pub fn qualified_key(file_path: &str, short_name: &str) -> String {
    format!("{file_path}{QUALIFIED_KEY_SEPARATOR}{short_name}")
}

/// How the target of a call expression was written.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum CallKind {
    /// `foo()`
    DirectName,
    /// `base.method()` where `base` is a plain identifier.
    AttributeAccess,
    /// Anything else: `a.b.c()`, `factory()()`, `handlers[0]()`.
    Other,
}

impl CallKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DirectName => "DirectName",
            Self::AttributeAccess => "AttributeAccess",
            Self::Other => "Other",
        }
    }
}

impl std::fmt::Display for CallKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A function definition found during extraction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FunctionDefinition {
    pub qualified_key: String,
    pub short_name: String,
    pub file: String,
    pub line: usize,
    pub end_line: usize,
    /// Byte span of the whole definition in the file text.
    pub byte_range: (usize, usize),
}

/// A call expression attributed to its lexically enclosing function.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CallSite {
    /// `None` for calls made at module level.
    pub caller_key: Option<String>,
    pub callee_name: String,
    pub kind: CallKind,
    pub line: usize,
}

/// Everything extracted from one source file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileRecord {
    pub path: String,
    pub lines: usize,
    /// qualified_key → first definition with that key.
    pub functions: BTreeMap<String, FunctionDefinition>,
    /// Later definitions that reused an existing qualified key in this file.
    #[serde(default)]
    pub redefinitions: Vec<FunctionDefinition>,
    /// Top-level module names.
    pub imports: BTreeSet<String>,
    /// Call sites in traversal order.
    pub calls: Vec<CallSite>,
}

impl FileRecord {
    pub fn new(path: &str) -> Self {
        Self {
            path: path.to_string(),
            ..Default::default()
        }
    }

    /// Register a definition. Returns false when the key was already taken.
    pub fn add_function(&mut self, def: FunctionDefinition) -> bool {
        if self.functions.contains_key(&def.qualified_key) {
            self.redefinitions.push(def);
            false
        } else {
            self.functions.insert(def.qualified_key.clone(), def);
            true
        }
    }
}

/// Whether directory nodes are materialised above file nodes.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum GraphLayout {
    #[default]
    Hierarchical,
    Flat,
}

/// Configuration for an analysis run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default)]
    pub root_path: String,
    pub output_path: Option<String>,
    /// Directory names skipped during discovery.
    #[serde(default)]
    pub exclude_dirs: Vec<String>,
    #[serde(default)]
    pub layout: GraphLayout,
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
    /// Extraction worker count; `None` uses the global rayon pool.
    #[serde(default)]
    pub jobs: Option<usize>,
    #[serde(default)]
    pub verbose: bool,
    #[serde(default)]
    pub quiet: bool,
}

fn default_max_file_size() -> u64 {
    1_000_000
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            root_path: String::new(),
            output_path: None,
            exclude_dirs: Vec::new(),
            layout: GraphLayout::default(),
            max_file_size: default_max_file_size(),
            jobs: None,
            verbose: false,
            quiet: false,
        }
    }
}

impl AnalysisConfig {
    /// Last segment of the root path, or `project` when there is none.
    pub fn root_name(&self) -> String {
        std::path::Path::new(&self.root_path)
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "project".to_string())
    }

    /// Where the report goes: `output_path`, else `<root name>.callmap.json`.
    pub fn output_file(&self) -> String {
        self.output_path
            .clone()
            .unwrap_or_else(|| format!("{}.callmap.json", self.root_name()))
    }
}

/// Split a comma-separated directory list, trimming whitespace and dropping empties.
pub fn parse_exclude_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn def(file: &str, name: &str, line: usize) -> FunctionDefinition {
        FunctionDefinition {
            qualified_key: qualified_key(file, name),
            short_name: name.to_string(),
            file: file.to_string(),
            line,
            end_line: line + 1,
            byte_range: (0, 10),
        }
    }

    #[test]
    fn qualified_key_format() {
        assert_eq!(qualified_key("pkg/utils.py", "helper"), "pkg/utils.py::helper");
    }

    #[test]
    fn output_file_defaults_to_root_name() {
        let config = AnalysisConfig {
            root_path: "/home/dev/shop".to_string(),
            ..Default::default()
        };
        assert_eq!(config.root_name(), "shop");
        assert_eq!(config.output_file(), "shop.callmap.json");

        let config = AnalysisConfig {
            output_path: Some("out/graph.json".to_string()),
            ..config
        };
        assert_eq!(config.output_file(), "out/graph.json");
        assert_eq!(AnalysisConfig::default().root_name(), "project");
    }

    #[test]
    fn exclude_list_is_trimmed() {
        assert_eq!(
            parse_exclude_list(" venv, .git ,,build "),
            vec!["venv", ".git", "build"]
        );
        assert!(parse_exclude_list("").is_empty());
        assert!(parse_exclude_list(" , ").is_empty());
    }

    #[test]
    fn first_definition_wins_within_a_file() {
        let mut record = FileRecord::new("a.py");
        assert!(record.add_function(def("a.py", "run", 1)));
        assert!(!record.add_function(def("a.py", "run", 9)));
        assert_eq!(record.functions.len(), 1);
        assert_eq!(record.functions["a.py::run"].line, 1);
        assert_eq!(record.redefinitions.len(), 1);
        assert_eq!(record.redefinitions[0].line, 9);
    }

    #[test]
    fn analysis_config_defaults() {
        let cfg = AnalysisConfig::default();
        assert_eq!(cfg.max_file_size, 1_000_000);
        assert_eq!(cfg.layout, GraphLayout::Hierarchical);
        assert!(cfg.jobs.is_none());
        assert!(cfg.exclude_dirs.is_empty());
    }

    #[test]
    fn config_deserialises_with_defaults() {
        let cfg: AnalysisConfig =
            serde_json::from_str(r#"{"root_path": "/src", "output_path": null, "layout": "flat"}"#)
                .unwrap();
        assert_eq!(cfg.root_path, "/src");
        assert_eq!(cfg.layout, GraphLayout::Flat);
        assert_eq!(cfg.max_file_size, 1_000_000);
    }

    #[test]
    fn call_kind_display() {
        assert_eq!(format!("{}", CallKind::DirectName), "DirectName");
        assert_eq!(format!("{}", CallKind::AttributeAccess), "AttributeAccess");
        assert_eq!(format!("{}", CallKind::Other), "Other");
    }
}
