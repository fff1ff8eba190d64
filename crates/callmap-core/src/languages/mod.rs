//! Language analyser trait and registry.

use std::collections::{HashMap, HashSet};

use tree_sitter::{Language, Node, Parser, Tree};

use crate::config::FileRecord;
use crate::error::SourceError;

pub mod python;

/// Trait that all language analysers implement.
pub trait LanguageAnalyser: Send + Sync {
    /// File extensions this analyser handles (e.g. &["py"]).
    fn extensions(&self) -> &[&str];

    /// Human-readable language name (e.g. "Python").
    fn language_name(&self) -> &str;

    /// Get the tree-sitter Language for parsing.
    fn get_language(&self) -> Language;

    /// Walk one parsed file and collect its functions, imports and call sites.
    fn extract(&self, tree: &Tree, source: &[u8], file_path: &str) -> FileRecord;

    /// Names of language builtins, used to label unresolved calls.
    fn builtin_names(&self) -> &HashSet<String>;

    /// Parse source text, treating any error-recovery node as a syntax error.
    fn parse(&self, parser: &mut Parser, source: &[u8], file_path: &str) -> Result<Tree, SourceError> {
        parser
            .set_language(&self.get_language())
            .map_err(|e| SourceError::Language {
                path: file_path.to_string(),
                message: e.to_string(),
            })?;

        let tree = parser.parse(source, None).ok_or_else(|| SourceError::Parse {
            path: file_path.to_string(),
            line: 1,
            column: 1,
        })?;

        let root = tree.root_node();
        if root.has_error() {
            let at = first_error(root).unwrap_or(root);
            let pos = at.start_position();
            return Err(SourceError::Parse {
                path: file_path.to_string(),
                line: pos.row + 1,
                column: pos.column + 1,
            });
        }
        Ok(tree)
    }
}

/// First ERROR or MISSING node in document order.
fn first_error(node: Node) -> Option<Node> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    if !node.has_error() {
        return None;
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if let Some(found) = first_error(child) {
            return Some(found);
        }
    }
    None
}

/// Registry mapping file extensions to analysers.
pub struct AnalyserRegistry {
    analysers: Vec<Box<dyn LanguageAnalyser>>,
    extension_map: HashMap<String, usize>,
}

impl AnalyserRegistry {
    /// Build the registry with all available language analysers.
    pub fn new() -> Self {
        let analysers: Vec<Box<dyn LanguageAnalyser>> =
            vec![Box::new(python::PythonAnalyser::new())];

        let mut extension_map = HashMap::new();
        for (i, analyser) in analysers.iter().enumerate() {
            for ext in analyser.extensions() {
                extension_map.insert(ext.to_string(), i);
            }
        }

        Self {
            analysers,
            extension_map,
        }
    }

    /// Get the analyser for a given file extension, if one exists.
    pub fn get_by_extension(&self, ext: &str) -> Option<&dyn LanguageAnalyser> {
        self.extension_map
            .get(ext)
            .map(|&i| self.analysers[i].as_ref())
    }

    /// Get the analyser for a path by its extension.
    pub fn get_for_path(&self, path: &str) -> Option<&dyn LanguageAnalyser> {
        let ext = std::path::Path::new(path)
            .extension()
            .map(|e| e.to_string_lossy().to_string())?;
        self.get_by_extension(&ext)
    }

    /// Get the language name for a file extension.
    pub fn language_for_extension(&self, ext: &str) -> Option<&str> {
        self.get_by_extension(ext).map(|a| a.language_name())
    }

    /// Get all registered extensions.
    pub fn extensions(&self) -> Vec<&str> {
        self.extension_map.keys().map(|s| s.as_str()).collect()
    }
}

impl Default for AnalyserRegistry {
    fn default() -> Self {
        Self::new()
    }
}
