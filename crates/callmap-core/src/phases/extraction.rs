//! Phase 2: Load, parse and extract every discovered file in parallel.
//!
//! Workers share nothing mutable: each builds its own tree-sitter parser and
//! returns an owned [`FileOutcome`]. Results are sorted by path afterwards so
//! the merge sees the same order regardless of scheduling.

use std::path::{Path, PathBuf};

use rayon::prelude::*;

use crate::config::FileRecord;
use crate::error::SourceError;
use crate::languages::AnalyserRegistry;
use crate::phases::structure::DiscoveredFile;
use crate::pipeline::CancellationToken;

/// Reads file text for the extractor.
pub trait SourceLoader: Send + Sync {
    fn read(&self, rel_path: &str) -> std::io::Result<String>;
}

/// Reads files relative to a root directory.
pub struct FsLoader {
    root: PathBuf,
}

impl FsLoader {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }
}

impl SourceLoader for FsLoader {
    fn read(&self, rel_path: &str) -> std::io::Result<String> {
        std::fs::read_to_string(self.root.join(rel_path))
    }
}

/// A successfully extracted file together with its text.
#[derive(Debug, Clone)]
pub struct ExtractedFile {
    pub record: FileRecord,
    pub text: String,
}

/// Result of processing one file.
#[derive(Debug)]
pub enum FileOutcome {
    Extracted(ExtractedFile),
    /// Parse failed but the text was read; kept for code inspection.
    Failed {
        error: SourceError,
        text: Option<String>,
    },
}

impl FileOutcome {
    pub fn path(&self) -> &str {
        match self {
            FileOutcome::Extracted(file) => &file.record.path,
            FileOutcome::Failed { error, .. } => error.path(),
        }
    }
}

/// Extract a single file. Never panics on bad input; failures are values.
pub fn extract_file(
    registry: &AnalyserRegistry,
    loader: &dyn SourceLoader,
    rel_path: &str,
) -> FileOutcome {
    let Some(analyser) = registry.get_for_path(rel_path) else {
        return FileOutcome::Failed {
            error: SourceError::Language {
                path: rel_path.to_string(),
                message: "unsupported file extension".to_string(),
            },
            text: None,
        };
    };

    let text = match loader.read(rel_path) {
        Ok(t) => t,
        Err(source) => {
            return FileOutcome::Failed {
                error: SourceError::Read {
                    path: rel_path.to_string(),
                    source,
                },
                text: None,
            }
        }
    };

    let mut parser = tree_sitter::Parser::new();
    match analyser.parse(&mut parser, text.as_bytes(), rel_path) {
        Ok(tree) => {
            let record = analyser.extract(&tree, text.as_bytes(), rel_path);
            FileOutcome::Extracted(ExtractedFile { record, text })
        }
        Err(error) => FileOutcome::Failed {
            error,
            text: Some(text),
        },
    }
}

/// Run the extraction phase over all files on the current rayon pool.
pub fn run_extraction_phase(
    files: &[DiscoveredFile],
    loader: &dyn SourceLoader,
    cancel: &CancellationToken,
) -> Vec<FileOutcome> {
    let registry = AnalyserRegistry::new();

    let mut outcomes: Vec<FileOutcome> = files
        .par_iter()
        .map(|file| {
            if cancel.is_cancelled() {
                return FileOutcome::Failed {
                    error: SourceError::Cancelled {
                        path: file.rel_path.clone(),
                    },
                    text: None,
                };
            }
            log::debug!("Extracting {}", file.rel_path);
            extract_file(&registry, loader, &file.rel_path)
        })
        .collect();

    outcomes.sort_by(|a, b| a.path().cmp(b.path()));

    for outcome in &outcomes {
        if let FileOutcome::Failed { error, .. } = outcome {
            log::warn!("{error}");
        }
    }
    outcomes
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct MemLoader(HashMap<&'static str, &'static str>);

    impl SourceLoader for MemLoader {
        fn read(&self, rel_path: &str) -> std::io::Result<String> {
            self.0
                .get(rel_path)
                .map(|s| s.to_string())
                .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotFound, rel_path.to_string()))
        }
    }

    fn discovered(paths: &[&str]) -> Vec<DiscoveredFile> {
        paths
            .iter()
            .map(|p| DiscoveredFile {
                rel_path: p.to_string(),
                size: 0,
            })
            .collect()
    }

    #[test]
    fn failures_are_local_to_their_file() {
        let loader = MemLoader(HashMap::from([
            ("good.py", "def f():\n    g()\n"),
            ("bad.py", "def broken(:\n"),
        ]));
        let files = discovered(&["good.py", "bad.py", "missing.py"]);
        let outcomes = run_extraction_phase(&files, &loader, &CancellationToken::new());

        let paths: Vec<_> = outcomes.iter().map(|o| o.path().to_string()).collect();
        assert_eq!(paths, vec!["bad.py", "good.py", "missing.py"]);

        assert!(matches!(
            &outcomes[0],
            FileOutcome::Failed { error: SourceError::Parse { .. }, text: Some(_) }
        ));
        match &outcomes[1] {
            FileOutcome::Extracted(file) => {
                assert!(file.record.functions.contains_key("good.py::f"));
            }
            other => panic!("expected extraction, got {other:?}"),
        }
        assert!(matches!(
            &outcomes[2],
            FileOutcome::Failed { error: SourceError::Read { .. }, text: None }
        ));
    }

    #[test]
    fn cancelled_run_skips_remaining_files() {
        let loader = MemLoader(HashMap::from([("a.py", "x = 1\n")]));
        let cancel = CancellationToken::new();
        cancel.cancel();
        let outcomes = run_extraction_phase(&discovered(&["a.py"]), &loader, &cancel);
        assert!(matches!(
            &outcomes[0],
            FileOutcome::Failed { error: SourceError::Cancelled { .. }, .. }
        ));
    }

    #[test]
    fn unsupported_extension_is_a_language_failure() {
        let loader = MemLoader(HashMap::new());
        let outcome = extract_file(&AnalyserRegistry::new(), &loader, "notes.txt");
        assert!(matches!(
            outcome,
            FileOutcome::Failed { error: SourceError::Language { .. }, .. }
        ));
    }
}
