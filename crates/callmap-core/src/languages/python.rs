//! Python language analyser.

use std::collections::HashSet;
use std::sync::LazyLock;

use tree_sitter::{Language, Node, Tree};

use super::LanguageAnalyser;
use crate::config::{qualified_key, CallKind, CallSite, FileRecord, FunctionDefinition};

static BUILTIN_NAMES: LazyLock<HashSet<String>> = LazyLock::new(|| {
    [
        "print",
        "len",
        "range",
        "enumerate",
        "zip",
        "map",
        "filter",
        "sorted",
        "reversed",
        "list",
        "dict",
        "set",
        "tuple",
        "str",
        "int",
        "float",
        "bool",
        "bytes",
        "type",
        "isinstance",
        "issubclass",
        "getattr",
        "setattr",
        "hasattr",
        "delattr",
        "callable",
        "super",
        "property",
        "staticmethod",
        "classmethod",
        "open",
        "input",
        "format",
        "repr",
        "hash",
        "id",
        "abs",
        "min",
        "max",
        "sum",
        "round",
        "pow",
        "divmod",
        "all",
        "any",
        "iter",
        "next",
        "ord",
        "chr",
        "hex",
        "oct",
        "bin",
        "vars",
        "dir",
        "globals",
        "locals",
        "ValueError",
        "TypeError",
        "KeyError",
        "IndexError",
        "RuntimeError",
        "AttributeError",
        "Exception",
        "logging.getLogger",
        "logging.info",
        "logging.debug",
        "logging.warning",
        "logging.error",
        "logging.critical",
        "json.loads",
        "json.dumps",
    ]
    .into_iter()
    .map(String::from)
    .collect()
});

pub struct PythonAnalyser;

impl Default for PythonAnalyser {
    fn default() -> Self {
        Self
    }
}

impl PythonAnalyser {
    pub fn new() -> Self {
        Self
    }
}

fn text<'s>(node: Node, source: &'s [u8]) -> &'s str {
    node.utf8_text(source).unwrap_or("")
}

fn first_segment(dotted: &str) -> Option<String> {
    dotted
        .trim_start_matches('.')
        .split('.')
        .next()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

/// Name of an `import` target: the dotted name, looking through `x as y`.
fn import_target(node: Node, source: &[u8]) -> Option<String> {
    match node.kind() {
        "dotted_name" => first_segment(text(node, source)),
        "aliased_import" => node
            .child_by_field_name("name")
            .and_then(|n| first_segment(text(n, source))),
        _ => None,
    }
}

/// Single-pass extractor. Scopes are pushed when a `function_definition`
/// node is entered and popped when the cursor leaves that same node.
struct ScopeWalker<'a> {
    source: &'a [u8],
    file_path: &'a str,
    record: FileRecord,
    /// (node id, qualified key) of each enclosing function.
    scopes: Vec<(usize, String)>,
}

impl<'a> ScopeWalker<'a> {
    fn new(source: &'a [u8], file_path: &'a str) -> Self {
        let mut record = FileRecord::new(file_path);
        record.lines = String::from_utf8_lossy(source).lines().count();
        Self {
            source,
            file_path,
            record,
            scopes: Vec::new(),
        }
    }

    fn walk(mut self, tree: &Tree) -> FileRecord {
        let mut cursor = tree.walk();
        'descend: loop {
            self.enter(cursor.node());
            if cursor.goto_first_child() {
                continue;
            }
            loop {
                self.exit(cursor.node());
                if cursor.goto_next_sibling() {
                    continue 'descend;
                }
                if !cursor.goto_parent() {
                    break 'descend;
                }
            }
        }
        debug_assert!(self.scopes.is_empty(), "unbalanced scope stack");
        self.record
    }

    fn enter(&mut self, node: Node) {
        match node.kind() {
            "function_definition" => self.enter_function(node),
            "call" => self.record_call(node),
            "import_statement" => self.record_import(node),
            "import_from_statement" => self.record_import_from(node),
            "future_import_statement" => {
                self.record.imports.insert("__future__".to_string());
            }
            _ => {}
        }
    }

    fn exit(&mut self, node: Node) {
        if matches!(self.scopes.last(), Some((id, _)) if *id == node.id()) {
            self.scopes.pop();
        }
    }

    fn enter_function(&mut self, node: Node) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let name = text(name_node, self.source);
        if name.is_empty() {
            return;
        }
        let key = qualified_key(self.file_path, name);
        self.record.add_function(FunctionDefinition {
            qualified_key: key.clone(),
            short_name: name.to_string(),
            file: self.file_path.to_string(),
            line: node.start_position().row + 1,
            end_line: node.end_position().row + 1,
            byte_range: (node.start_byte(), node.end_byte()),
        });
        self.scopes.push((node.id(), key));
    }

    fn record_call(&mut self, node: Node) {
        let Some(callee) = node.child_by_field_name("function") else {
            return;
        };
        let (callee_name, kind) = self.classify_callee(callee);
        if callee_name.is_empty() {
            return;
        }
        self.record.calls.push(CallSite {
            caller_key: self.scopes.last().map(|(_, key)| key.clone()),
            callee_name,
            kind,
            line: node.start_position().row + 1,
        });
    }

    fn classify_callee(&self, callee: Node) -> (String, CallKind) {
        match callee.kind() {
            "identifier" => (text(callee, self.source).to_string(), CallKind::DirectName),
            "attribute" => {
                let object = callee.child_by_field_name("object");
                let attribute = callee.child_by_field_name("attribute");
                match (object, attribute) {
                    (Some(obj), Some(attr)) if obj.kind() == "identifier" => (
                        format!("{}.{}", text(obj, self.source), text(attr, self.source)),
                        CallKind::AttributeAccess,
                    ),
                    (_, Some(attr)) => (text(attr, self.source).to_string(), CallKind::Other),
                    _ => (self.collapsed_text(callee), CallKind::Other),
                }
            }
            _ => (self.collapsed_text(callee), CallKind::Other),
        }
    }

    fn collapsed_text(&self, node: Node) -> String {
        text(node, self.source)
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn record_import(&mut self, node: Node) {
        let mut cursor = node.walk();
        for target in node.children_by_field_name("name", &mut cursor) {
            if let Some(module) = import_target(target, self.source) {
                self.record.imports.insert(module);
            }
        }
    }

    fn record_import_from(&mut self, node: Node) {
        let module = node.child_by_field_name("module_name").and_then(|m| match m.kind() {
            "dotted_name" => first_segment(text(m, self.source)),
            // `from .pkg.mod import x` keeps `pkg`; `from . import x` has no module segment
            "relative_import" => {
                let mut cursor = m.walk();
                let dotted = m
                    .named_children(&mut cursor)
                    .find(|c| c.kind() == "dotted_name");
                dotted.and_then(|d| first_segment(text(d, self.source)))
            }
            _ => None,
        });

        if let Some(module) = module {
            self.record.imports.insert(module);
            return;
        }

        let mut cursor = node.walk();
        for target in node.children_by_field_name("name", &mut cursor) {
            if let Some(name) = import_target(target, self.source) {
                self.record.imports.insert(name);
            }
        }
    }
}

impl LanguageAnalyser for PythonAnalyser {
    fn extensions(&self) -> &[&str] {
        &["py"]
    }

    fn language_name(&self) -> &str {
        "Python"
    }

    fn get_language(&self) -> Language {
        tree_sitter_python::LANGUAGE.into()
    }

    fn extract(&self, tree: &Tree, source: &[u8], file_path: &str) -> FileRecord {
        ScopeWalker::new(source, file_path).walk(tree)
    }

    fn builtin_names(&self) -> &HashSet<String> {
        &BUILTIN_NAMES
    }
}
