//! Template/operator instantiation engine (C5, spec.md §4.4).
//!
//! Grounded on `original_source/src/libscc/typechecker/Templates.cpp`/`.h`
//! (`TemplateInstantiator::getForInstantiation`'s memo table and worklist
//! of `InstanceInfo`s), restated as an explicit `VecDeque<PendingInstance>`
//! plus a `HashMap<InstantiationKey, SymbolId>` memo (Design Notes:
//! "Template instantiation worklist interleaved with code generation:
//! preserved as an explicit FIFO queue of (template, type-arg-tuple) keys
//! plus a memo of already-generated keys").
//!
//! One simplification from the original: rather than binding each
//! quantifier to a symbol spliced into the instance's scope (the C++
//! approach — "binds each quantifier name to a type-argument symbol in
//! that scope"), the Rust checker threads the `Substitution` explicitly as
//! part of the state it carries while checking a `PendingInstance`'s body
//! (SPEC_FULL.md Design Notes: "Global mutable state... becomes a
//! `Context` value passed explicitly through every pass"). The instance
//! still gets its own fresh child scope (for ordinary locals the body
//! declares), matching spec.md §4.4's "creates a fresh child scope
//! parented to the template's module scope".

use std::collections::{HashMap, VecDeque};

use crate::ast::{Ast, NodeId};
use crate::error::{CompileError, TemplateError};
use crate::location::SourceLocation;
use crate::symbol::{ProcedureSymbol, ScopeId, Symbol, SymbolCategory, SymbolId, SymbolTable, TemplateSymbol};
use crate::types::pattern::{Substitution, TypeArg};
use crate::types::Type;

/// Uniquely identifies a monomorphized clone (GLOSSARY "Instantiation").
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InstantiationKey {
    pub template: SymbolId,
    pub args: Vec<TypeArg>,
}

/// One drained worklist item: a freshly cloned, not-yet-checked body
/// ready for the type checker and code generator (spec.md §4.4 "enqueues
/// the clone for later type checking and code generation").
#[derive(Debug, Clone)]
pub struct PendingInstance {
    pub key: InstantiationKey,
    /// The concrete procedure symbol this instance will fill in; already
    /// registered in the memo so self-recursive templates resolve to it
    /// instead of re-entering instantiation.
    pub proc_symbol: SymbolId,
    pub scope: ScopeId,
    /// The cloned inner `Proc`/`Operator`/`Cast` declaration node (the
    /// `Template` wrapper itself is not cloned).
    pub body: NodeId,
    pub subst: Substitution,
    /// Concrete parameter types, in declaration order, already known from
    /// the unification performed at the call site: re-resolving them from
    /// the cloned body's syntactic `TypeExpr`s would fail (the quantifier
    /// names it mentions are not symbols in the instance's own scope).
    pub param_types: Vec<Type>,
    pub ret_type: Type,
}

#[derive(Debug, Default)]
pub struct Instantiator {
    memo: HashMap<InstantiationKey, SymbolId>,
    worklist: VecDeque<PendingInstance>,
    /// Every instance ever drained, kept around so code generation can
    /// lower each one's body after the type checker has drained the
    /// worklist down to empty (spec.md §4.4's worklist is shared between
    /// "later type checking and code generation").
    generated: Vec<PendingInstance>,
}

impl Instantiator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.worklist.is_empty()
    }

    /// Pops the next pending instance to check+lower (spec.md §4.4 "the
    /// compiler repeatedly drains the worklist").
    pub fn drain_next(&mut self) -> Option<PendingInstance> {
        let next = self.worklist.pop_front();
        if let Some(p) = &next {
            self.generated.push(p.clone());
        }
        next
    }

    /// Every instance drained so far, in drain order; consumed by code
    /// generation once the type checker has finished draining the
    /// worklist.
    pub fn generated_instances(&self) -> &[PendingInstance] {
        &self.generated
    }

    /// Looks up an already-registered instance without creating one.
    pub fn lookup(&self, template: SymbolId, args: &[TypeArg]) -> Option<SymbolId> {
        self.memo
            .get(&InstantiationKey { template, args: args.to_vec() })
            .copied()
    }

    /// Resolves (template, type-argument tuple) to a concrete procedure
    /// symbol, cloning and enqueuing a fresh instance on a cache miss
    /// (spec.md §4.4 "On miss... On hit: it returns the previously
    /// registered instance").
    pub fn get_or_instantiate(
        &mut self,
        symtab: &mut SymbolTable,
        ast: &mut Ast,
        template: &TemplateSymbol,
        args: Vec<TypeArg>,
        param_types: Vec<Type>,
        ret_type: Type,
    ) -> Result<SymbolId, CompileError> {
        if args.len() != template.quantifiers.len() {
            return Err(CompileError::template(
                TemplateError::NoMatchingCandidate,
                SourceLocation::synthetic(),
            ));
        }
        for (q, a) in template.quantifiers.iter().zip(args.iter()) {
            if q.kind != a.kind() {
                return Err(CompileError::template(
                    TemplateError::QuantifierKindMismatch { expected: q.kind, found: a.kind() },
                    SourceLocation::synthetic(),
                ));
            }
        }

        let key = InstantiationKey { template: template.id, args: args.clone() };
        if let Some(&existing) = self.memo.get(&key) {
            return Ok(existing);
        }

        let mut subst = Substitution::new();
        for (q, a) in template.quantifiers.iter().zip(args.iter()) {
            let name = symtab.get(q.name_symbol).name().to_string();
            // Kinds were already validated above so this cannot fail; every
            // quantifier name is distinct within one template declaration
            // (spec.md §4.4 "rejected if any quantifier name shadows
            // another"), so no quantifier is ever bound twice here.
            subst.bind(&name, a.clone()).expect("quantifier names are unique within a template");
        }

        let operator_capability = match template.kind {
            crate::symbol::TemplateKind::Procedure => None,
            crate::symbol::TemplateKind::Cast => Some(crate::symbol::OperatorCapability::Cast),
            crate::symbol::TemplateKind::Operator => match ast.decl(template.body) {
                crate::ast::DeclKind::Operator { op, .. } => Some(match op {
                    crate::ast::OperatorName::Binary(b) => crate::symbol::OperatorCapability::BinaryOperator(*b),
                    crate::ast::OperatorName::Unary(u) => crate::symbol::OperatorCapability::UnaryOperator(*u),
                }),
                _ => None,
            },
        };

        let scope = symtab.create_scope(template.declaring_scope);
        let body = crate::ast::clone_subtree(ast, template.body);

        let mangled = mangled_name(symtab, template, &args);
        let proc_symbol = symtab.declare_in(template.declaring_scope, SymbolCategory::Procedure, &mangled, |id| {
            Symbol::Procedure(ProcedureSymbol {
                id,
                name: mangled.clone(),
                params: Vec::new(),
                ret: ret_type,
                operator: operator_capability,
            })
        })?;

        self.memo.insert(key.clone(), proc_symbol);
        self.worklist.push_back(PendingInstance { key, proc_symbol, scope, body, subst, param_types, ret_type });
        Ok(proc_symbol)
    }
}

fn mangled_name(symtab: &SymbolTable, template: &TemplateSymbol, args: &[TypeArg]) -> String {
    let parts: Vec<String> = args.iter().map(|a| a.to_string()).collect();
    let _ = symtab;
    format!("{}${}", template.name, parts.join(","))
}
