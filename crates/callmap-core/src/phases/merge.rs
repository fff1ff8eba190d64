//! Phase 3: Merge per-file records into one graph.
//!
//! Single writer. Records are consumed in path order and every lookup table
//! iterates in sorted order, so identical inputs give identical graphs.

use std::collections::{BTreeMap, BTreeSet};

use crate::config::{FileRecord, GraphLayout};
use crate::error::{
    Diagnostics, DuplicateDefinition, DuplicateScope, UnresolvedCall, UnresolvedReason,
};
use crate::graph::code_graph::{CallTier, CodeGraph, NodeData, NodeId, NodeKind};
use crate::graph::symbol_table::{Lookup, SymbolTable};
use crate::languages::AnalyserRegistry;

/// Name of the directory node standing for the analysis root.
pub const ROOT_DIRECTORY: &str = ".";

/// Ancestor directories of a relative file path, outermost first, rooted at `.`.
pub fn ancestor_directories(rel_path: &str) -> Vec<String> {
    let mut dirs = vec![ROOT_DIRECTORY.to_string()];
    let segments: Vec<&str> = rel_path.split('/').collect();
    let mut current = String::new();
    for segment in &segments[..segments.len().saturating_sub(1)] {
        if segment.is_empty() {
            continue;
        }
        if !current.is_empty() {
            current.push('/');
        }
        current.push_str(segment);
        dirs.push(current.clone());
    }
    dirs
}

/// Build the graph from all extracted records. Never fails; problems go to diagnostics.
pub fn build_graph(records: &[FileRecord], layout: GraphLayout) -> (CodeGraph, Diagnostics) {
    let registry = AnalyserRegistry::new();
    let mut kg = CodeGraph::new();
    let mut st = SymbolTable::new();
    let mut diagnostics = Diagnostics::default();

    let mut ordered: Vec<&FileRecord> = records.iter().collect();
    ordered.sort_by(|a, b| a.path.cmp(&b.path));

    // Files and the directory hierarchy above them
    for record in &ordered {
        kg.add_file(&record.path, record.lines);
        if layout == GraphLayout::Hierarchical {
            add_directory_chain(&mut kg, &record.path);
        }
    }

    // One import node per distinct module across the run
    let modules: BTreeSet<&str> = ordered
        .iter()
        .flat_map(|r| r.imports.iter().map(String::as_str))
        .collect();
    for module in modules {
        kg.add_import(module);
    }

    // Function nodes
    for record in &ordered {
        for def in record.functions.values() {
            kg.add_function(def);
            st.add(def);
        }
        if !record.redefinitions.is_empty() {
            diagnostics
                .duplicate_definitions
                .extend(same_file_duplicates(record));
        }
    }
    for (name, keys) in st.shared_names() {
        let mut locations: Vec<String> = keys
            .iter()
            .filter_map(|key| kg.node(&NodeId::function(key)))
            .filter_map(|node| match &node.data {
                NodeData::Function(def) => {
                    Some(format!("{}:{}", def.file, def.line))
                }
                _ => None,
            })
            .collect();
        locations.sort();
        diagnostics.duplicate_definitions.push(DuplicateDefinition {
            short_name: name.to_string(),
            scope: DuplicateScope::CrossFile,
            locations,
        });
    }

    // Calls
    for record in &ordered {
        let builtins = registry
            .get_for_path(&record.path)
            .map(|a| a.builtin_names());
        for call in &record.calls {
            let Some(caller) = call.caller_key.as_deref() else {
                continue;
            };
            let (target, tier) = match st.resolve(&record.path, &call.callee_name) {
                Lookup::SameFile(key) => (key, CallTier::SameFile),
                Lookup::Global { key, candidates } => (key, CallTier::Global { candidates }),
                Lookup::Unresolved => {
                    let reason = if builtins.is_some_and(|b| b.contains(&call.callee_name)) {
                        UnresolvedReason::Builtin
                    } else {
                        UnresolvedReason::UnknownName
                    };
                    log::debug!(
                        "Unresolved call {} -> {} ({}:{})",
                        caller,
                        call.callee_name,
                        record.path,
                        call.line
                    );
                    diagnostics.unresolved_calls.push(UnresolvedCall {
                        caller_key: caller.to_string(),
                        callee_name: call.callee_name.clone(),
                        line: call.line,
                        reason,
                    });
                    continue;
                }
            };
            kg.add_call(caller, target, tier);
        }
    }

    log::info!(
        "Graph built: {} files, {} functions, {} call edges, {} unresolved calls",
        ordered.len(),
        kg.count_of(NodeKind::Function),
        kg.call_edge_count(),
        diagnostics.unresolved_calls.len()
    );

    (kg, diagnostics)
}

fn add_directory_chain(kg: &mut CodeGraph, rel_path: &str) {
    let dirs = ancestor_directories(rel_path);
    for dir in &dirs {
        kg.add_directory(dir);
    }
    for pair in dirs.windows(2) {
        kg.add_contains(&NodeId::directory(&pair[0]), &NodeId::directory(&pair[1]));
    }
    if let Some(parent) = dirs.last() {
        kg.add_contains(&NodeId::directory(parent), &NodeId::file(rel_path));
    }
}

fn same_file_duplicates(record: &FileRecord) -> Vec<DuplicateDefinition> {
    let mut by_name: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for def in &record.redefinitions {
        by_name.entry(def.short_name.as_str()).or_default().push(def.line);
    }
    by_name
        .into_iter()
        .map(|(name, mut lines)| {
            if let Some(first) = record.functions.values().find(|d| d.short_name == name) {
                lines.push(first.line);
            }
            lines.sort_unstable();
            DuplicateDefinition {
                short_name: name.to_string(),
                scope: DuplicateScope::SameFile,
                locations: lines
                    .into_iter()
                    .map(|line| format!("{}:{}", record.path, line))
                    .collect(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{qualified_key, CallKind, CallSite, FunctionDefinition};
    use pretty_assertions::assert_eq;

    fn record(path: &str, funcs: &[(&str, usize)], calls: &[(Option<&str>, &str)]) -> FileRecord {
        let mut r = FileRecord::new(path);
        for (name, line) in funcs {
            r.add_function(FunctionDefinition {
                qualified_key: qualified_key(path, name),
                short_name: name.to_string(),
                file: path.to_string(),
                line: *line,
                end_line: *line + 1,
                byte_range: (0, 0),
            });
        }
        for (caller, callee) in calls {
            r.calls.push(CallSite {
                caller_key: caller.map(|c| qualified_key(path, c)),
                callee_name: callee.to_string(),
                kind: CallKind::DirectName,
                line: 1,
            });
        }
        r
    }

    #[test]
    fn ancestors_start_at_root() {
        assert_eq!(ancestor_directories("main.py"), vec!["."]);
        assert_eq!(
            ancestor_directories("pkg/sub/mod.py"),
            vec![".", "pkg", "pkg/sub"]
        );
    }

    #[test]
    fn same_file_match_preferred() {
        let records = vec![
            record("a.py", &[("helper", 1)], &[]),
            record("b.py", &[("helper", 1), ("main", 3)], &[(Some("main"), "helper")]),
        ];
        let (kg, diags) = build_graph(&records, GraphLayout::Flat);
        let calls = kg.call_edges();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].to, "b.py::helper");
        assert_eq!(calls[0].tier, CallTier::SameFile);
        assert!(diags.unresolved_calls.is_empty());
    }

    #[test]
    fn global_match_uses_smallest_key() {
        let records = vec![
            record("z_tools.py", &[("helper", 1)], &[]),
            record("a_tools.py", &[("helper", 1)], &[]),
            record("main.py", &[("main", 1)], &[(Some("main"), "helper")]),
        ];
        let (kg, _) = build_graph(&records, GraphLayout::Flat);
        let calls = kg.call_edges();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].from, "main.py::main");
        assert_eq!(calls[0].to, "a_tools.py::helper");
        assert_eq!(calls[0].tier, CallTier::Global { candidates: 2 });
    }

    #[test]
    fn unresolved_and_module_level_calls() {
        let records = vec![record(
            "main.py",
            &[("main", 1)],
            &[(Some("main"), "print"), (Some("main"), "mystery"), (None, "main")],
        )];
        let (kg, diags) = build_graph(&records, GraphLayout::Flat);
        assert_eq!(kg.call_edge_count(), 0);
        let reasons: Vec<_> = diags
            .unresolved_calls
            .iter()
            .map(|u| (u.callee_name.as_str(), u.reason))
            .collect();
        assert_eq!(
            reasons,
            vec![
                ("print", UnresolvedReason::Builtin),
                ("mystery", UnresolvedReason::UnknownName),
            ]
        );
    }

    #[test]
    fn hierarchical_layout_adds_directories() {
        let records = vec![record("pkg/mod.py", &[("f", 1)], &[]), record("main.py", &[], &[])];
        let (kg, _) = build_graph(&records, GraphLayout::Hierarchical);
        let contains = kg.contains_edges();
        assert!(contains.contains(&(NodeId::directory("."), NodeId::directory("pkg"))));
        assert!(contains.contains(&(NodeId::directory("pkg"), NodeId::file("pkg/mod.py"))));
        assert!(contains.contains(&(NodeId::directory("."), NodeId::file("main.py"))));
        assert!(contains.contains(&(NodeId::file("pkg/mod.py"), NodeId::function("pkg/mod.py::f"))));
        assert_eq!(kg.count_of(NodeKind::Directory), 2);
    }

    #[test]
    fn flat_layout_has_no_directories() {
        let records = vec![record("pkg/mod.py", &[("f", 1)], &[])];
        let (kg, _) = build_graph(&records, GraphLayout::Flat);
        assert_eq!(kg.count_of(NodeKind::Directory), 0);
        assert_eq!(kg.contains_edges().len(), 1);
    }

    #[test]
    fn imports_are_global() {
        let mut a = record("a.py", &[], &[]);
        a.imports.insert("utils".to_string());
        let mut b = record("b.py", &[], &[]);
        b.imports.insert("utils".to_string());
        b.imports.insert("os".to_string());
        let (kg, _) = build_graph(&[a, b], GraphLayout::Flat);
        assert_eq!(kg.count_of(NodeKind::Import), 2);
        assert!(kg.has_node(&NodeId::import("utils")));
    }

    #[test]
    fn duplicate_notices() {
        let mut a = record("a.py", &[("run", 2), ("helper", 8)], &[]);
        a.add_function(FunctionDefinition {
            qualified_key: qualified_key("a.py", "run"),
            short_name: "run".to_string(),
            file: "a.py".to_string(),
            line: 6,
            end_line: 7,
            byte_range: (0, 0),
        });
        let b = record("b.py", &[("helper", 4)], &[]);
        let (_, diags) = build_graph(&[a, b], GraphLayout::Flat);
        assert_eq!(
            diags.duplicate_definitions,
            vec![
                DuplicateDefinition {
                    short_name: "run".to_string(),
                    scope: DuplicateScope::SameFile,
                    locations: vec!["a.py:2".to_string(), "a.py:6".to_string()],
                },
                DuplicateDefinition {
                    short_name: "helper".to_string(),
                    scope: DuplicateScope::CrossFile,
                    locations: vec!["a.py:8".to_string(), "b.py:4".to_string()],
                },
            ]
        );
    }

    #[test]
    fn empty_input_gives_empty_graph() {
        let (kg, diags) = build_graph(&[], GraphLayout::Hierarchical);
        assert_eq!(kg.node_count(), 0);
        assert!(diags.is_clean());
    }
}
