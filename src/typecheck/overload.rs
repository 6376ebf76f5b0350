//! Overload and template candidate ranking (spec.md §4.3
//! "Overload/template ranking").
//!
//! Grounded on `original_source/src/libscc/typechecker/Procedures.cpp`'s
//! `TypeChecker::findBestMatchingProc` weighting loop, restated as a plain
//! sort over an explicit `Weight` tuple instead of accumulating a running
//! best-so-far pointer.

use crate::error::{CompileError, SemanticError};
use crate::location::SourceLocation;
use crate::symbol::{Symbol, SymbolId, SymbolTable, TemplateSymbol};
use crate::types::pattern::TypePattern;
use crate::types::Type;

/// Lower is more specific (spec.md §4.3: "lower tuples are more specific").
/// `(type variables, constrained type variables, params depending on a
/// variable)`.
pub type Weight = (usize, usize, usize);

#[derive(Debug, Clone)]
pub enum Candidate {
    Concrete { symbol: SymbolId, params: Vec<Type>, ret: Type },
    Template { symbol: SymbolId, template: TemplateSymbol, param_patterns: Vec<TypePattern>, ret_pattern: TypePattern },
}

impl Candidate {
    fn weight(&self) -> Weight {
        match self {
            Candidate::Concrete { .. } => (0, 0, 0),
            Candidate::Template { template, param_patterns, .. } => {
                let type_vars = template.quantifiers.len();
                let constrained = template.quantifiers.iter().filter(|q| q.constrained).count();
                let dependent_params = param_patterns.iter().filter(|p| p.depends_on_variable()).count();
                (type_vars, constrained, dependent_params)
            }
        }
    }

    /// Non-templates always outrank templates regardless of weight (spec.md
    /// §4.3 "A non-template beats any template").
    fn rank_key(&self) -> (bool, Weight) {
        (matches!(self, Candidate::Template { .. }), self.weight())
    }
}

/// Picks the most specific candidate by arity, then by `rank_key`. Returns
/// `Err(NoMatchingOverload)` when none have the right arity, and
/// `Err(AmbiguousCall)` when two or more most-specific candidates tie.
pub fn resolve_overload(
    name: &str,
    candidates: Vec<Candidate>,
    arity: usize,
    location: &SourceLocation,
) -> Result<Candidate, CompileError> {
    let mut viable: Vec<Candidate> = candidates
        .into_iter()
        .filter(|c| match c {
            Candidate::Concrete { params, .. } => params.len() == arity,
            Candidate::Template { param_patterns, .. } => param_patterns.len() == arity,
        })
        .collect();

    if viable.is_empty() {
        return Err(CompileError::semantic(SemanticError::NoMatchingOverload(name.to_string()), location.clone()));
    }

    viable.sort_by_key(|c| c.rank_key());
    let best_key = viable[0].rank_key();
    let tied: Vec<&Candidate> = viable.iter().filter(|c| c.rank_key() == best_key).collect();
    if tied.len() > 1 {
        return Err(CompileError::semantic(SemanticError::AmbiguousCall(name.to_string()), location.clone()));
    }

    Ok(viable.remove(0))
}

/// Gathers every overload of `name` visible from the current scope into
/// `Candidate`s, resolving templates' declared parameter/return types to
/// `TypePattern`s via `resolve_type`.
pub fn gather_candidates(
    symtab: &SymbolTable,
    ast: &crate::ast::Ast,
    category: crate::symbol::SymbolCategory,
    name: &str,
) -> Result<Vec<Candidate>, CompileError> {
    let ids = symtab.find_overloads(symtab.current_scope(), category, name);
    let mut out = Vec::with_capacity(ids.len());
    for id in ids {
        match symtab.get(id) {
            Symbol::Procedure(p) => {
                let params: Vec<Type> = p.params.iter().map(|pid| symtab.get(*pid).ty().expect("parameter has a type")).collect();
                out.push(Candidate::Concrete { symbol: id, params, ret: p.ret });
            }
            Symbol::Template(t) => {
                let quantifiers: std::collections::HashSet<String> =
                    t.quantifiers.iter().map(|q| symtab.get(q.name_symbol).name().to_string()).collect();
                let (params, ret) = template_signature(ast, t)?;
                let param_patterns = params
                    .iter()
                    .map(|p| super::resolve_type::resolve_type_expr(symtab, p, Some(&quantifiers), &SourceLocation::synthetic()))
                    .collect::<Result<Vec<_>, _>>()?;
                let ret_pattern = super::resolve_type::resolve_type_expr(symtab, &ret, Some(&quantifiers), &SourceLocation::synthetic())?;
                out.push(Candidate::Template { symbol: id, template: t.clone(), param_patterns, ret_pattern });
            }
            _ => {}
        }
    }
    Ok(out)
}

/// Reads the declared parameter/return `TypeExpr`s off a template's cloned
/// inner `Proc`/`Operator`/`Cast` node (spec.md §4.4).
fn template_signature(
    ast: &crate::ast::Ast,
    t: &TemplateSymbol,
) -> Result<(Vec<crate::ast::TypeExpr>, crate::ast::TypeExpr), CompileError> {
    match ast.decl(t.body) {
        crate::ast::DeclKind::Proc { params, ret, .. } | crate::ast::DeclKind::Operator { params, ret, .. } => {
            Ok((params.iter().map(|p| p.ty.clone()).collect(), ret.clone()))
        }
        crate::ast::DeclKind::Cast { from, to, .. } => Ok((vec![from.clone()], to.clone())),
        other => Err(CompileError::Ice(format!("template body has unexpected shape: {other:?}"))),
    }
}
