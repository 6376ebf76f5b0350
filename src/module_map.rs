//! Module map boundary (spec.md §6 "Module map", §1 Non-goals: "does not
//! implement a package manager for modules beyond a simple search-path
//! lookup").
//!
//! Grounded on `original_source/include/libscc/ModuleMap.h`/`.cpp` (a
//! name → `ModuleInfo*` map with `addSearchPath`/`findModule`), restated as
//! a trait so the core can be handed any resolution strategy (filesystem
//! search path, embedded bundle, ...) by its external driver while staying
//! agnostic to how modules are actually found on disk (SPEC_FULL.md §6.1).

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use crate::ast::Ast;
use crate::error::ResourceError;

/// A resolved module: its parsed body plus the file path it came from
/// (spec.md §6 "a module handle whose body is an AST and whose metadata
/// includes a file path").
#[derive(Debug, Clone)]
pub struct ModuleHandle {
    pub name: String,
    pub path: PathBuf,
    pub ast: Arc<Ast>,
}

/// External collaborator the core queries by module name (spec.md §6). The
/// core itself never walks a filesystem search path; that belongs to the
/// driver per spec.md §1's non-goal.
pub trait ModuleMap {
    fn resolve(&self, name: &str) -> Result<ModuleHandle, ResourceError>;
}

/// A `HashMap`-backed test double, grounded on
/// `original_source/src/libscc/ModuleMap.cpp`'s `m_modules` table but
/// without its filesystem-scanning `addSearchPath` (that belongs to the
/// driver, out of scope here per spec.md §1).
#[derive(Debug, Default)]
pub struct InMemoryModuleMap {
    modules: HashMap<String, ModuleHandle>,
}

impl InMemoryModuleMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mirrors `ModuleMap::addModule`'s "already present" rejection.
    pub fn add_module(&mut self, handle: ModuleHandle) -> bool {
        if self.modules.contains_key(&handle.name) {
            return false;
        }
        self.modules.insert(handle.name.clone(), handle);
        true
    }
}

impl ModuleMap for InMemoryModuleMap {
    fn resolve(&self, name: &str) -> Result<ModuleHandle, ResourceError> {
        self.modules
            .get(name)
            .cloned()
            .ok_or_else(|| ResourceError::ModuleNotFound(name.to_string()))
    }
}

/// Walks a module's `imports` list, detecting cycles (spec.md §4.2/§6:
/// "Recursive imports are detected and reported as errors"). Returns the
/// names in resolution order (dependency-first) or the first cycle found.
pub fn resolve_import_chain(
    map: &dyn ModuleMap,
    root: &str,
    imports_of: impl Fn(&ModuleHandle) -> Vec<String>,
) -> Result<Vec<ModuleHandle>, ResourceError> {
    let mut order = Vec::new();
    let mut visiting = Vec::new();
    let mut seen = std::collections::HashSet::new();
    resolve_inner(map, root, &imports_of, &mut order, &mut visiting, &mut seen)?;
    Ok(order)
}

fn resolve_inner(
    map: &dyn ModuleMap,
    name: &str,
    imports_of: &impl Fn(&ModuleHandle) -> Vec<String>,
    order: &mut Vec<ModuleHandle>,
    visiting: &mut Vec<String>,
    seen: &mut std::collections::HashSet<String>,
) -> Result<(), ResourceError> {
    if visiting.contains(&name.to_string()) {
        return Err(ResourceError::RecursiveImport(name.to_string()));
    }
    if seen.contains(name) {
        return Ok(());
    }
    visiting.push(name.to_string());
    let handle = map.resolve(name)?;
    for import in imports_of(&handle) {
        resolve_inner(map, &import, imports_of, order, visiting, seen)?;
    }
    visiting.pop();
    seen.insert(name.to_string());
    order.push(handle);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle(name: &str) -> ModuleHandle {
        ModuleHandle { name: name.to_string(), path: PathBuf::from(format!("{name}.sc")), ast: Arc::new(Ast::new()) }
    }

    #[test]
    fn resolve_missing_module_is_resource_error() {
        let map = InMemoryModuleMap::new();
        assert!(matches!(map.resolve("missing"), Err(ResourceError::ModuleNotFound(_))));
    }

    #[test]
    fn duplicate_module_name_is_rejected() {
        let mut map = InMemoryModuleMap::new();
        assert!(map.add_module(handle("a")));
        assert!(!map.add_module(handle("a")));
    }

    #[test]
    fn import_chain_detects_cycles() {
        let mut map = InMemoryModuleMap::new();
        map.add_module(handle("a"));
        map.add_module(handle("b"));
        let imports_of = |h: &ModuleHandle| -> Vec<String> {
            match h.name.as_str() {
                "a" => vec!["b".to_string()],
                "b" => vec!["a".to_string()],
                _ => vec![],
            }
        };
        let result = resolve_import_chain(&map, "a", imports_of);
        assert!(matches!(result, Err(ResourceError::RecursiveImport(_))));
    }

    #[test]
    fn import_chain_orders_dependencies_first() {
        let mut map = InMemoryModuleMap::new();
        map.add_module(handle("a"));
        map.add_module(handle("b"));
        let imports_of = |h: &ModuleHandle| -> Vec<String> {
            match h.name.as_str() {
                "a" => vec!["b".to_string()],
                _ => vec![],
            }
        };
        let order = resolve_import_chain(&map, "a", imports_of).unwrap();
        assert_eq!(order.iter().map(|h| h.name.as_str()).collect::<Vec<_>>(), vec!["b", "a"]);
    }
}
