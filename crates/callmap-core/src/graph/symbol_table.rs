//! Dual HashMap symbol table: file-scoped index + global index.

use std::collections::HashMap;

use crate::config::FunctionDefinition;

/// Dual HashMap for function lookups by short name.
///
/// - `file_index`: file_path → short_name → qualified_key
/// - `global_index`: short_name → qualified keys, kept sorted
pub struct SymbolTable {
    file_index: HashMap<String, HashMap<String, String>>,
    global_index: HashMap<String, Vec<String>>,
}

/// Outcome of looking a callee name up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup<'a> {
    SameFile(&'a str),
    /// Lexicographically smallest key among `candidates` matches.
    Global { key: &'a str, candidates: usize },
    Unresolved,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self {
            file_index: HashMap::new(),
            global_index: HashMap::new(),
        }
    }

    pub fn add(&mut self, def: &FunctionDefinition) {
        self.file_index
            .entry(def.file.clone())
            .or_default()
            .entry(def.short_name.clone())
            .or_insert_with(|| def.qualified_key.clone());

        let keys = self.global_index.entry(def.short_name.clone()).or_default();
        if let Err(pos) = keys.binary_search(&def.qualified_key) {
            keys.insert(pos, def.qualified_key.clone());
        }
    }

    /// Look up a name defined in a specific file.
    pub fn lookup_exact(&self, file_path: &str, name: &str) -> Option<&str> {
        self.file_index
            .get(file_path)
            .and_then(|syms| syms.get(name))
            .map(|s| s.as_str())
    }

    /// All qualified keys with this short name, sorted.
    pub fn lookup_global(&self, name: &str) -> &[String] {
        self.global_index
            .get(name)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Same-file match first, then the smallest qualified key anywhere.
    pub fn resolve(&self, file_path: &str, name: &str) -> Lookup<'_> {
        if let Some(key) = self.lookup_exact(file_path, name) {
            return Lookup::SameFile(key);
        }
        match self.lookup_global(name) {
            [] => Lookup::Unresolved,
            keys => Lookup::Global {
                key: keys[0].as_str(),
                candidates: keys.len(),
            },
        }
    }

    /// Short names defined in more than one file, with their keys.
    pub fn shared_names(&self) -> Vec<(&str, &[String])> {
        let mut shared: Vec<(&str, &[String])> = self
            .global_index
            .iter()
            .filter(|(_, keys)| keys.len() > 1)
            .map(|(name, keys)| (name.as_str(), keys.as_slice()))
            .collect();
        shared.sort_by(|a, b| a.0.cmp(b.0));
        shared
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}
