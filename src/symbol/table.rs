//! Scope chain and symbol storage (spec.md §4.2).
//!
//! Grounded on `original_source/src/libscc/symboltable.cpp` (scope chain +
//! import search order) and on the teacher's `precompiler/scope_stack.rs`
//! (push/pop-scope idiom), generalized from a single flat variable map to
//! `(category, name)` keyed scopes per spec.md §4.2 and widened with an
//! import list per scope for module imports.

use indexmap::IndexMap;

use crate::error::CompileError;
use crate::symbol::{ConstantSymbol, ConstantValue, LabelSymbol, LabelTarget, Symbol, SymbolId, VariableSymbol};
use crate::types::Type;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ScopeId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolCategory {
    Variable,
    Procedure,
    Constant,
    Kind,
    Domain,
    DataTypeAlias,
    DimTypeVar,
    Template,
    Struct,
}

#[derive(Debug, Default)]
struct Scope {
    parent: Option<ScopeId>,
    imports: Vec<ScopeId>,
    bindings: IndexMap<(SymbolCategory, String), SymbolId>,
    /// Procedures and templates may be overloaded (several declarations
    /// sharing one name, distinguished by signature; spec.md §4.3
    /// "Procedure calls collect candidate symbols... under the call's
    /// name"), so they are tracked separately from the single-binding
    /// `bindings` map used for every other category.
    overloads: IndexMap<(SymbolCategory, String), Vec<SymbolId>>,
}

/// The symbol table: owns every symbol for the compilation unit plus the
/// scope chain used to resolve names, and the "other symbols" side-table
/// for labels and compiler-generated temporaries (spec.md §4.2).
#[derive(Debug)]
pub struct SymbolTable {
    symbols: Vec<Symbol>,
    scopes: Vec<Scope>,
    current: ScopeId,
    temp_counter: u32,
    labels: Vec<SymbolId>,
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolTable {
    pub fn new() -> Self {
        SymbolTable {
            symbols: Vec::new(),
            scopes: vec![Scope::default()],
            current: ScopeId(0),
            temp_counter: 0,
            labels: Vec::new(),
        }
    }

    pub fn global_scope(&self) -> ScopeId {
        ScopeId(0)
    }

    pub fn current_scope(&self) -> ScopeId {
        self.current
    }

    fn alloc_symbol_id(&mut self) -> SymbolId {
        let id = SymbolId(self.symbols.len() as u32);
        id
    }

    fn push_symbol(&mut self, symbol: Symbol) -> SymbolId {
        let id = symbol.id();
        debug_assert_eq!(id.0 as usize, self.symbols.len());
        self.symbols.push(symbol);
        id
    }

    /// Creates a new, empty scope parented to `parent`, without entering
    /// it. Used by the template instantiator (spec.md §4.4) to create the
    /// fresh child scope an instance's quantifiers get bound in.
    pub fn create_scope(&mut self, parent: ScopeId) -> ScopeId {
        let id = ScopeId(self.scopes.len() as u32);
        self.scopes.push(Scope {
            parent: Some(parent),
            imports: Vec::new(),
            bindings: IndexMap::new(),
            overloads: IndexMap::new(),
        });
        id
    }

    /// Enters a freshly created child scope of the current scope (block,
    /// procedure, or loop entry per spec.md §4.2) and returns a guard that
    /// restores the previous scope on drop (Design Notes: RAII scope
    /// guards become a lexically bracketed scoped-acquisition).
    pub fn enter_scope(&mut self) -> ScopeGuard {
        let previous = self.current;
        let fresh = self.create_scope(previous);
        self.current = fresh;
        ScopeGuard { previous }
    }

    /// Temporarily makes `scope` current for the duration of `f`, then
    /// restores the previous current scope. Used when resuming work on a
    /// template instance whose scope is not a descendant of whatever scope
    /// happens to be current (e.g. draining the instantiation worklist).
    pub fn with_scope<R>(&mut self, scope: ScopeId, f: impl FnOnce(&mut Self) -> R) -> R {
        let previous = self.current;
        self.current = scope;
        let result = f(self);
        self.current = previous;
        result
    }

    pub fn add_import(&mut self, scope: ScopeId, imported: ScopeId) {
        self.scopes[scope.0 as usize].imports.push(imported);
    }

    fn bind_in(&mut self, scope: ScopeId, category: SymbolCategory, name: String, id: SymbolId) -> Result<(), CompileError> {
        let key = (category, name.clone());
        if self.scopes[scope.0 as usize].bindings.contains_key(&key) {
            return Err(CompileError::Ice(format!(
                "redefinition of '{name}' in the same scope"
            )));
        }
        self.scopes[scope.0 as usize].bindings.insert(key, id);
        Ok(())
    }

    /// Declares `symbol` in `scope`, binding `name` under `category`.
    /// Fails if the name is already bound in that exact scope (spec.md §3
    /// "variable names within a scope are unique"). The type checker is
    /// expected to check `find` first and raise a proper, location-carrying
    /// diagnostic before ever reaching this; a duplicate slipping through
    /// here is a checker bug, hence the `Ice`.
    pub fn declare_in(
        &mut self,
        scope: ScopeId,
        category: SymbolCategory,
        name: &str,
        build: impl FnOnce(SymbolId) -> Symbol,
    ) -> Result<SymbolId, CompileError> {
        let id = self.alloc_symbol_id();
        let symbol = build(id);
        self.bind_in(scope, category, name.to_string(), id)?;
        Ok(self.push_symbol(symbol))
    }

    /// Declares a symbol in the current scope.
    pub fn declare(
        &mut self,
        category: SymbolCategory,
        name: &str,
        build: impl FnOnce(SymbolId) -> Symbol,
    ) -> Result<SymbolId, CompileError> {
        self.declare_in(self.current, category, name, build)
    }

    /// Declares an overloadable symbol (a procedure or a template) in
    /// `scope`, without the "name already bound" check `declare_in`
    /// enforces: several procedures/templates may share one name,
    /// distinguished by signature at call sites (spec.md §4.3).
    pub fn declare_overload_in(
        &mut self,
        scope: ScopeId,
        category: SymbolCategory,
        name: &str,
        build: impl FnOnce(SymbolId) -> Symbol,
    ) -> SymbolId {
        let id = self.alloc_symbol_id();
        let symbol = build(id);
        self.scopes[scope.0 as usize]
            .overloads
            .entry((category, name.to_string()))
            .or_default()
            .push(id);
        self.push_symbol(symbol)
    }

    pub fn declare_overload(
        &mut self,
        category: SymbolCategory,
        name: &str,
        build: impl FnOnce(SymbolId) -> Symbol,
    ) -> SymbolId {
        self.declare_overload_in(self.current, category, name, build)
    }

    /// Collects every overload of `name` visible from `scope` (spec.md
    /// §4.3 "collect candidate symbols... under the call's name"). Stops
    /// at the first scope level (current, then imports, then parent) that
    /// has any binding for `(category, name)`, mirroring `find`'s
    /// shadowing rule rather than merging overloads across nesting levels.
    pub fn find_overloads(&self, scope: ScopeId, category: SymbolCategory, name: &str) -> Vec<SymbolId> {
        let mut visited = Vec::new();
        self.find_overloads_inner(scope, category, name, &mut visited)
    }

    fn find_overloads_inner(
        &self,
        scope: ScopeId,
        category: SymbolCategory,
        name: &str,
        visited: &mut Vec<ScopeId>,
    ) -> Vec<SymbolId> {
        if visited.contains(&scope) {
            return Vec::new();
        }
        visited.push(scope);
        let s = &self.scopes[scope.0 as usize];
        if let Some(ids) = s.overloads.get(&(category, name.to_string())) {
            if !ids.is_empty() {
                return ids.clone();
            }
        }
        for import in &s.imports {
            let found = self.find_overloads_inner(*import, category, name, visited);
            if !found.is_empty() {
                return found;
            }
        }
        if let Some(parent) = s.parent {
            return self.find_overloads_inner(parent, category, name, visited);
        }
        Vec::new()
    }

    /// `find(category, name)`: searches the current scope, then its
    /// imports, then its parent chain (spec.md §4.2).
    pub fn find(&self, category: SymbolCategory, name: &str) -> Option<SymbolId> {
        self.find_from(self.current, category, name)
    }

    pub fn find_from(&self, scope: ScopeId, category: SymbolCategory, name: &str) -> Option<SymbolId> {
        let mut visited = Vec::new();
        self.find_from_inner(scope, category, name, &mut visited)
    }

    fn find_from_inner(
        &self,
        scope: ScopeId,
        category: SymbolCategory,
        name: &str,
        visited: &mut Vec<ScopeId>,
    ) -> Option<SymbolId> {
        if visited.contains(&scope) {
            return None;
        }
        visited.push(scope);
        let s = &self.scopes[scope.0 as usize];
        if let Some(id) = s.bindings.get(&(category, name.to_string())) {
            return Some(*id);
        }
        for import in &s.imports {
            if let Some(id) = self.find_from_inner(*import, category, name, visited) {
                return Some(id);
            }
        }
        if let Some(parent) = s.parent {
            return self.find_from_inner(parent, category, name, visited);
        }
        None
    }

    pub fn get(&self, id: SymbolId) -> &Symbol {
        &self.symbols[id.0 as usize]
    }

    pub fn get_mut(&mut self, id: SymbolId) -> &mut Symbol {
        &mut self.symbols[id.0 as usize]
    }

    /// Allocates a fresh compiler-generated temporary in the current
    /// scope, with a synthetic name guaranteed unique across the program
    /// (spec.md §3 "temporaries carry synthetic names guaranteed unique
    /// across the program").
    pub fn new_temporary(&mut self, ty: Type) -> SymbolId {
        let index = self.temp_counter;
        self.temp_counter += 1;
        let name = format!("$t{index}");
        let id = self.alloc_symbol_id();
        let symbol = Symbol::Temporary(VariableSymbol {
            id,
            name,
            ty,
            storage: crate::symbol::Storage::Local,
            parent: None,
            dims: Vec::new(),
            size: None,
            fields: Vec::new(),
        });
        self.push_symbol(symbol)
    }

    /// Allocates a symbol for a compile-time constant that has no operand
    /// representation of its own (spec.md §3.4's `Literal`/`LiteralBits`
    /// cover only bool/int/uint/float bit patterns, so a string literal —
    /// or any other constant a future data type needs — is instead given a
    /// symbol here, the same way a named `const` would be). Modeled on
    /// `new_temporary`: unique synthetic name, no scope binding, so it
    /// cannot be shadowed or looked up by name.
    pub fn new_constant(&mut self, ty: Type, value: ConstantValue) -> SymbolId {
        let id = self.alloc_symbol_id();
        let symbol = Symbol::Constant(ConstantSymbol { id, ty, value });
        self.push_symbol(symbol)
    }

    /// Allocates a fresh, as-yet-unbound label (spec.md §4.2 "the 'other
    /// symbols' side-table owns labels").
    pub fn new_label(&mut self) -> SymbolId {
        let id = self.alloc_symbol_id();
        let symbol = Symbol::Label(LabelSymbol { id, target: None });
        let id = self.push_symbol(symbol);
        self.labels.push(id);
        id
    }

    /// Binds a label to a specific instruction or block (spec.md §4.2
    /// "Appending a label must bind it either to a specific instruction or
    /// to a specific block").
    pub fn bind_label(&mut self, label: SymbolId, target: LabelTarget) {
        if let Symbol::Label(l) = self.get_mut(label) {
            l.target = Some(target);
        } else {
            panic!("bind_label called on a non-label symbol");
        }
    }

    pub fn label_target(&self, label: SymbolId) -> Option<LabelTarget> {
        match self.get(label) {
            Symbol::Label(l) => l.target,
            _ => None,
        }
    }

    pub fn labels(&self) -> &[SymbolId] {
        &self.labels
    }

    pub fn symbol_count(&self) -> usize {
        self.symbols.len()
    }
}

/// Restores the previous current scope on drop (RAII scope guard, Design
/// Notes). Must not outlive the `SymbolTable` it was produced from.
#[must_use = "dropping the guard immediately exits the scope it just entered"]
pub struct ScopeGuard {
    previous: ScopeId,
}

impl ScopeGuard {
    /// Exits the scope immediately, restoring `table`'s current scope.
    pub fn exit(self, table: &mut SymbolTable) {
        table.current = self.previous;
    }
}
