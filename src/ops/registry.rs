//! Operation lookup: built-ins by id, anything path-like as a script.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::{FilesPatch, IssueCreate, Operation, ScriptOperation};

/// Registry of in-process operations with a fallback for script paths.
#[derive(Clone)]
pub struct OperationRegistry {
    builtins: BTreeMap<String, Arc<dyn Operation>>,
    /// Relative script paths resolve against this directory (the playbook's).
    script_base: PathBuf,
}

impl OperationRegistry {
    pub fn empty(script_base: impl Into<PathBuf>) -> Self {
        Self {
            builtins: BTreeMap::new(),
            script_base: script_base.into(),
        }
    }

    /// Registry with `files.patch` and `issue.create`.
    pub fn builtin(script_base: impl Into<PathBuf>) -> Self {
        let mut registry = Self::empty(script_base);
        registry.register(Arc::new(FilesPatch));
        registry.register(Arc::new(IssueCreate));
        registry
    }

    pub fn register(&mut self, op: Arc<dyn Operation>) {
        self.builtins.insert(op.id().to_string(), op);
    }

    /// Identifiers containing a path separator are script references.
    pub fn is_script_ref(id: &str) -> bool {
        id.contains('/') || id.contains('\\')
    }

    /// Resolve an identifier; `None` if it is neither a built-in nor an existing script.
    pub fn resolve(&self, id: &str) -> Option<Arc<dyn Operation>> {
        if let Some(op) = self.builtins.get(id) {
            return Some(Arc::clone(op));
        }
        if !Self::is_script_ref(id) {
            return None;
        }
        let path = self.script_path(id);
        if !path.is_file() {
            return None;
        }
        let path = std::fs::canonicalize(&path).unwrap_or(path);
        Some(Arc::new(ScriptOperation::new(id, path)))
    }

    fn script_path(&self, id: &str) -> PathBuf {
        let rel = Path::new(id);
        if rel.is_absolute() {
            rel.to_path_buf()
        } else {
            self.script_base.join(rel)
        }
    }

    /// Built-in operations, sorted by id.
    pub fn builtins(&self) -> impl Iterator<Item = &Arc<dyn Operation>> {
        self.builtins.values()
    }
}
