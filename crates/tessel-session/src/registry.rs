//! Process-wide registry of session store backends.
//!
//! The built-in `"memory"` and `"file"` backends are present from the first
//! lookup. Additional backends are registered once at process start; a name
//! can never be registered twice.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

use parking_lot::RwLock;
use tracing::debug;

use crate::error::Result;
use crate::store::file::{self, STORE_FILE};
use crate::store::memory::{self, STORE_MEMORY};
use crate::store::{Store, StoreFactory};

static REGISTRY: LazyLock<RwLock<HashMap<String, StoreFactory>>> = LazyLock::new(|| {
    let mut builtins: HashMap<String, StoreFactory> = HashMap::new();
    builtins.insert(STORE_MEMORY.to_string(), Arc::new(memory::new_memory_store));
    builtins.insert(STORE_FILE.to_string(), Arc::new(file::new_file_store));
    RwLock::new(builtins)
});

/// Register a backend factory under `name`.
///
/// # Panics
///
/// Panics if `name` is already registered. This is a configuration error and
/// is raised immediately rather than at first use.
pub fn register<F>(name: &str, factory: F)
where
    F: Fn(&str, &str) -> Result<Box<dyn Store>> + Send + Sync + 'static,
{
    let mut registry = REGISTRY.write();
    if registry.contains_key(name) {
        drop(registry);
        panic!("can not register session store {name:?} twice");
    }
    registry.insert(name.to_string(), Arc::new(factory));
    debug!(backend = %name, "Session store registered");
}

/// Look up the factory registered under `name`.
pub fn lookup(name: &str) -> Option<StoreFactory> {
    REGISTRY.read().get(name).cloned()
}

/// Whether a backend is registered under `name`.
pub fn is_registered(name: &str) -> bool {
    REGISTRY.read().contains_key(name)
}

/// Names of all registered backends, sorted.
pub fn registered() -> Vec<String> {
    let mut names: Vec<String> = REGISTRY.read().keys().cloned().collect();
    names.sort();
    names
}
