//! Phase 1: Walk the source tree and collect analysable files.

use std::path::Path;

use walkdir::WalkDir;

use crate::config::AnalysisConfig;
use crate::error::{CallmapError, Result};
use crate::languages::AnalyserRegistry;

/// Directory names that are never worth descending into.
const DEFAULT_EXCLUDES: &[&str] = &[
    ".git",
    "__pycache__",
    ".mypy_cache",
    ".pytest_cache",
    ".tox",
    ".eggs",
    ".venv",
    "venv",
    "node_modules",
];

/// A file selected for extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredFile {
    /// Path relative to the root, `/`-separated.
    pub rel_path: String,
    pub size: u64,
}

/// Run the structure phase: list source files under the root, sorted by path.
pub fn run_structure_phase(config: &AnalysisConfig) -> Result<Vec<DiscoveredFile>> {
    let root = Path::new(&config.root_path);
    if !root.is_dir() {
        return Err(CallmapError::InvalidRoot(config.root_path.clone()));
    }
    let registry = AnalyserRegistry::new();

    let exclude: Vec<&str> = DEFAULT_EXCLUDES
        .iter()
        .copied()
        .chain(config.exclude_dirs.iter().map(|s| s.as_str()))
        .collect();

    let mut files = Vec::new();
    for entry in WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| {
            if e.depth() == 0 || !e.file_type().is_dir() {
                return true;
            }
            let name = e.file_name().to_string_lossy();
            !name.starts_with('.') && !exclude.iter().any(|p| name == *p)
        })
    {
        let entry = match entry {
            Ok(e) => e,
            Err(err) => {
                log::warn!("Skipping unreadable entry: {err}");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let abs_path = entry.path();
        let rel_path = abs_path
            .strip_prefix(root)
            .unwrap_or(abs_path)
            .to_string_lossy()
            .replace('\\', "/");
        if registry.get_for_path(&rel_path).is_none() {
            continue;
        }

        let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
        if size > config.max_file_size {
            log::info!("Skipping {rel_path}: {size} bytes exceeds size limit");
            continue;
        }

        files.push(DiscoveredFile { rel_path, size });
    }

    files.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));
    Ok(files)
}
