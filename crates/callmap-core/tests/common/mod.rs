//! Shared test helpers for integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use callmap_core::config::{AnalysisConfig, FileRecord, GraphLayout};
use callmap_core::graph::code_graph::{CodeGraph, NodeKind};
use callmap_core::languages::AnalyserRegistry;
use callmap_core::pipeline::{self, AnalysisRun};

// ---------------------------------------------------------------------------
// Fixture path resolution
// ---------------------------------------------------------------------------

/// Resolve `tests/fixtures/{name}` relative to the workspace root.
pub fn fixture_path(name: &str) -> PathBuf {
    let manifest_dir = env!("CARGO_MANIFEST_DIR");
    Path::new(manifest_dir)
        .join("../../tests/fixtures")
        .join(name)
        .canonicalize()
        .unwrap_or_else(|_| {
            Path::new(manifest_dir)
                .join("../../tests/fixtures")
                .join(name)
        })
}

pub fn fixture_config(name: &str) -> AnalysisConfig {
    AnalysisConfig {
        root_path: fixture_path(name).to_string_lossy().to_string(),
        ..Default::default()
    }
}

// ---------------------------------------------------------------------------
// Runners
// ---------------------------------------------------------------------------

/// Run the whole pipeline on a fixture directory.
pub fn run_fixture(name: &str) -> AnalysisRun {
    pipeline::run_pipeline(&fixture_config(name), None).expect("pipeline should succeed")
}

pub fn run_fixture_with_layout(name: &str, layout: GraphLayout) -> AnalysisRun {
    let config = AnalysisConfig {
        layout,
        ..fixture_config(name)
    };
    pipeline::run_pipeline(&config, None).expect("pipeline should succeed")
}

/// Parse and extract a single fixture file.
pub fn extract_fixture_file(fixture_name: &str, file_name: &str) -> FileRecord {
    let path = fixture_path(fixture_name).join(file_name);
    let source = std::fs::read(&path).expect("Failed to read fixture file");
    let registry = AnalyserRegistry::new();
    let analyser = registry
        .get_for_path(file_name)
        .expect("No analyser for extension");

    let mut parser = tree_sitter::Parser::new();
    let tree = analyser
        .parse(&mut parser, &source, file_name)
        .expect("Failed to parse");
    analyser.extract(&tree, &source, file_name)
}

// ---------------------------------------------------------------------------
// Extractors from CodeGraph
// ---------------------------------------------------------------------------

/// Call edges as (caller key, callee key), sorted.
pub fn call_pairs(kg: &CodeGraph) -> Vec<(String, String)> {
    let mut pairs: Vec<_> = kg
        .call_edges()
        .into_iter()
        .map(|c| (c.from, c.to))
        .collect();
    pairs.sort();
    pairs
}

/// Node keys of one kind, sorted.
pub fn keys_of(kg: &CodeGraph, kind: NodeKind) -> Vec<String> {
    let mut keys: Vec<_> = kg.nodes_of_kind(kind).map(|n| n.id.key.clone()).collect();
    keys.sort();
    keys
}

pub fn pair(from: &str, to: &str) -> (String, String) {
    (from.to_string(), to.to_string())
}
