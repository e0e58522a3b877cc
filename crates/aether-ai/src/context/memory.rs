//! Process-local `ContextProvider`.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use aether_common::SessionId;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::{ContextError, ContextFields, ContextProvider, ContextSummary, FunctionContext, FunctionData};

struct CachedFunction {
    data: Arc<FunctionData>,
    cached_at: DateTime<Utc>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FunctionList {
    Bare(Vec<FunctionData>),
    Wrapped { functions: Vec<FunctionData> },
}

/// Function cache, binary function lists, and session cursors held in
/// memory. Binary lists are loaded lazily from
/// `<data_dir>/<binary>_functions.json`.
pub struct InMemoryContextProvider {
    data_dir: PathBuf,
    functions: RwLock<HashMap<String, CachedFunction>>,
    binaries: RwLock<HashMap<String, Arc<Vec<FunctionData>>>>,
    cursors: RwLock<HashMap<SessionId, String>>,
}

impl InMemoryContextProvider {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            functions: RwLock::new(HashMap::new()),
            binaries: RwLock::new(HashMap::new()),
            cursors: RwLock::new(HashMap::new()),
        }
    }

    /// Load an extractor output file and register its functions under the
    /// binary name derived from the file name. Returns the function count.
    pub fn load_binary(&self, path: &Path) -> Result<usize, ContextError> {
        let binary = binary_name_from_path(path);
        let functions = read_function_list(path)?;
        let count = functions.len();
        self.binaries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(binary.clone(), Arc::new(functions));
        info!(binary = %binary, functions = count, "loaded binary function list");
        Ok(count)
    }

    /// Register a function list directly.
    pub fn insert_binary(&self, binary: &str, functions: Vec<FunctionData>) {
        self.binaries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(binary.to_string(), Arc::new(functions));
    }

    pub fn cursor(&self, session: &SessionId) -> Option<String> {
        self.cursors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(session)
            .cloned()
    }

    fn functions_for_binary(&self, binary: &str) -> Arc<Vec<FunctionData>> {
        if let Some(list) = self
            .binaries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(binary)
        {
            return Arc::clone(list);
        }

        if !is_plain_name(binary) {
            warn!(binary, "binary name is not a plain file name; ignoring");
            return Arc::new(Vec::new());
        }

        let path = self.data_dir.join(format!("{binary}_functions.json"));
        let list = match read_function_list(&path) {
            Ok(functions) => {
                info!(binary, functions = functions.len(), "loaded binary function list");
                Arc::new(functions)
            }
            Err(e) => {
                warn!(binary, error = %e, "binary function list unavailable");
                Arc::new(Vec::new())
            }
        };

        // Another caller may have loaded it meanwhile; keep whichever landed first.
        Arc::clone(
            self.binaries
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .entry(binary.to_string())
                .or_insert(list),
        )
    }
}

impl ContextProvider for InMemoryContextProvider {
    fn get_context(&self, session: &SessionId, fields: &ContextFields) -> Option<FunctionContext> {
        let Some(data) = self.current_function(session) else {
            debug!(session = %session, "no function data for session");
            return None;
        };

        Some(FunctionContext {
            function_name: data.function_name.clone(),
            address: data.address.clone(),
            binary_name: data.binary_name.clone(),
            pseudocode: fields.pseudocode.then(|| data.pseudocode.clone()),
            assembly: fields.assembly.then(|| data.assembly.clone()),
            variables: fields.variables.then(|| data.variables.clone()),
            xrefs: fields.xrefs.then(|| data.xrefs.clone()),
            strings: fields.strings.then(|| data.strings.clone()),
            cfg: fields.cfg.then(|| data.cfg.clone()),
        })
    }

    fn current_function(&self, session: &SessionId) -> Option<Arc<FunctionData>> {
        let function_id = self.cursor(session)?;
        self.functions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&function_id)
            .map(|cached| Arc::clone(&cached.data))
    }

    fn set_function(&self, session: &SessionId, function_id: &str) {
        self.cursors
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(session.clone(), function_id.to_string());
        debug!(session = %session, function = function_id, "cursor moved");
    }

    fn release(&self, session: &SessionId) {
        self.cursors
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(session);
    }

    fn binary_functions(&self, session: &SessionId) -> Arc<Vec<FunctionData>> {
        match self.current_function(session) {
            Some(data) if !data.binary_name.is_empty() => self.functions_for_binary(&data.binary_name),
            _ => Arc::new(Vec::new()),
        }
    }

    fn cache_function(&self, function_id: &str, data: FunctionData) {
        debug!(function = function_id, "caching function data");
        self.functions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                function_id.to_string(),
                CachedFunction {
                    data: Arc::new(data),
                    cached_at: Utc::now(),
                },
            );
    }

    fn summary(&self, function_id: &str) -> Option<ContextSummary> {
        self.functions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(function_id)
            .map(|cached| ContextSummary::new(function_id, &cached.data, cached.cached_at))
    }
}

/// A single normal path component with no separators of either kind.
fn is_plain_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    ) && !name.contains(['/', '\\'])
}

fn binary_name_from_path(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    stem.strip_suffix("_functions")
        .map(String::from)
        .unwrap_or(stem)
}

fn read_function_list(path: &Path) -> Result<Vec<FunctionData>, ContextError> {
    let content = std::fs::read_to_string(path).map_err(|e| ContextError::Read {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    let list: FunctionList = serde_json::from_str(&content)
        .map_err(|_| ContextError::Format(path.display().to_string()))?;
    Ok(match list {
        FunctionList::Bare(functions) => functions,
        FunctionList::Wrapped { functions } => functions,
    })
}
