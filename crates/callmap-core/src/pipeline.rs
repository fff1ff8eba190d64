//! Phase orchestrator with timing and cooperative cancellation.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::config::{AnalysisConfig, FileRecord};
use crate::error::{Diagnostics, FileFailure, Result};
use crate::graph::code_graph::CodeGraph;
use crate::phases;
use crate::phases::extraction::{FileOutcome, FsLoader, SourceLoader};

/// Phase labels for progress reporting.
const PHASE_LABELS: &[(&str, &str)] = &[
    ("discovery", "Discovering source files"),
    ("extraction", "Extracting functions and calls"),
    ("graph", "Building call graph"),
];

/// Progress callback type: (phase_name, label).
pub type ProgressCallback = Box<dyn FnMut(&str, &str)>;

/// Shared flag polled between files. Cloning shares the flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Everything a run produced.
pub struct AnalysisRun {
    pub config: AnalysisConfig,
    pub graph: CodeGraph,
    pub diagnostics: Diagnostics,
    /// Relative path → file text, for every file that could be read.
    pub sources: BTreeMap<String, String>,
    /// Phase name → seconds.
    pub timings: BTreeMap<String, f64>,
    pub total_ms: f64,
    pub cancelled: bool,
}

fn report(progress: &mut Option<ProgressCallback>, name: &str) {
    if let Some(cb) = progress.as_mut() {
        let label = PHASE_LABELS
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, l)| *l)
            .unwrap_or(name);
        cb(name, label);
    }
}

/// Run discovery, extraction and graph building against the filesystem.
pub fn run_pipeline(
    config: &AnalysisConfig,
    progress_callback: Option<ProgressCallback>,
) -> Result<AnalysisRun> {
    let loader = FsLoader::new(&config.root_path);
    run_pipeline_with(config, &loader, &CancellationToken::new(), progress_callback)
}

/// Run the pipeline with an explicit loader and cancellation token.
pub fn run_pipeline_with(
    config: &AnalysisConfig,
    loader: &dyn SourceLoader,
    cancel: &CancellationToken,
    mut progress_callback: Option<ProgressCallback>,
) -> Result<AnalysisRun> {
    let mut timings = BTreeMap::new();
    let total_start = Instant::now();

    report(&mut progress_callback, "discovery");
    let start = Instant::now();
    let files = phases::structure::run_structure_phase(config)?;
    timings.insert("discovery".to_string(), start.elapsed().as_secs_f64());
    log::info!("Discovered {} source files under {}", files.len(), config.root_path);

    report(&mut progress_callback, "extraction");
    let start = Instant::now();
    let outcomes = match config.jobs {
        Some(jobs) => {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(jobs.max(1))
                .build()?;
            pool.install(|| phases::extraction::run_extraction_phase(&files, loader, cancel))
        }
        None => phases::extraction::run_extraction_phase(&files, loader, cancel),
    };
    timings.insert("extraction".to_string(), start.elapsed().as_secs_f64());

    let mut records: Vec<FileRecord> = Vec::new();
    let mut sources = BTreeMap::new();
    let mut failures = Vec::new();
    for outcome in outcomes {
        match outcome {
            FileOutcome::Extracted(file) => {
                sources.insert(file.record.path.clone(), file.text);
                records.push(file.record);
            }
            FileOutcome::Failed { error, text } => {
                if let Some(text) = text {
                    sources.insert(error.path().to_string(), text);
                }
                failures.push(FileFailure::from(&error));
            }
        }
    }
    log::info!(
        "Extracted {} files, {} failed",
        records.len(),
        failures.len()
    );

    report(&mut progress_callback, "graph");
    let start = Instant::now();
    let (graph, mut diagnostics) = phases::merge::build_graph(&records, config.layout);
    diagnostics.file_failures = failures;
    timings.insert("graph".to_string(), start.elapsed().as_secs_f64());

    Ok(AnalysisRun {
        config: config.clone(),
        graph,
        diagnostics,
        sources,
        timings,
        total_ms: total_start.elapsed().as_secs_f64() * 1000.0,
        cancelled: cancel.is_cancelled(),
    })
}
