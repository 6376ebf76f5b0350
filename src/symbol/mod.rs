//! Symbols (spec.md §3 "Symbols").
//!
//! Grounded on `original_source/src/libscc/Symbol.h`/`Symbol.cpp` (the
//! symbol kind hierarchy: variable/temporary/procedure/constant/label/kind/
//! domain/data-type alias/dimensionality type variable/template/struct) and
//! `original_source/src/libscc/symboltable.cpp` for the table that owns
//! them.

mod table;
mod variable;

pub use table::{ScopeGuard, ScopeId, SymbolCategory, SymbolTable};
pub use variable::{ConstantValue, Storage, VariableSymbol};

use std::fmt;

use crate::ast::NodeId;
use crate::types::security::{DomainDef, KindDef};
use crate::types::{Type, TypeArgKind};

/// Opaque, compilation-unit-wide symbol identifier. Symbols live as long as
/// the compilation unit (spec.md §3 "Lifecycle").
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SymbolId(pub u32);

impl fmt::Display for SymbolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcedureSymbol {
    pub id: SymbolId,
    pub name: String,
    pub params: Vec<SymbolId>,
    pub ret: Type,
    /// Set when this procedure is an overloadable operator/cast
    /// implementation (Design Notes: "a procedure-definition node that also
    /// implements an overloadable-operator capability becomes a tagged
    /// variant plus a small capability-record").
    pub operator: Option<OperatorCapability>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorCapability {
    BinaryOperator(crate::ast::BinaryOp),
    UnaryOperator(crate::ast::UnaryOp),
    Cast,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelTarget {
    /// Index into the flat, pre-CFG instruction stream (as produced by
    /// code generation).
    Instruction(u64),
    /// Index of a basic block (assigned once the CFG exists).
    Block(u32),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelSymbol {
    pub id: SymbolId,
    pub target: Option<LabelTarget>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstantSymbol {
    pub id: SymbolId,
    pub ty: Type,
    pub value: ConstantValue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateKind {
    Procedure,
    Operator,
    Cast,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quantifier {
    pub name_symbol: SymbolId,
    pub kind: TypeArgKind,
    /// For SEC quantifiers: an optional domain-kind constraint (spec.md
    /// §4.4 "quantifier kind mismatch").
    pub constrained: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateSymbol {
    pub id: SymbolId,
    pub name: String,
    pub kind: TemplateKind,
    pub quantifiers: Vec<Quantifier>,
    /// The module-level scope the template was declared in; instances are
    /// parented to a fresh child of this scope (spec.md §4.4).
    pub declaring_scope: table::ScopeId,
    pub body: NodeId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructSymbol {
    pub id: SymbolId,
    pub name: String,
    /// (field name, field symbol) in declaration order.
    pub fields: Vec<(String, SymbolId)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Symbol {
    Variable(VariableSymbol),
    Temporary(VariableSymbol),
    Procedure(ProcedureSymbol),
    Constant(ConstantSymbol),
    Label(LabelSymbol),
    Kind(KindDef),
    Domain(DomainDef),
    DataTypeAlias { id: SymbolId, name: String, underlying: crate::types::data::PrimitiveType },
    DimTypeVar { id: SymbolId, name: String },
    Template(TemplateSymbol),
    Struct(StructSymbol),
}

impl Symbol {
    pub fn id(&self) -> SymbolId {
        match self {
            Symbol::Variable(v) | Symbol::Temporary(v) => v.id,
            Symbol::Procedure(p) => p.id,
            Symbol::Constant(c) => c.id,
            Symbol::Label(l) => l.id,
            Symbol::Kind(k) => k.id,
            Symbol::Domain(d) => d.id,
            Symbol::DataTypeAlias { id, .. } => *id,
            Symbol::DimTypeVar { id, .. } => *id,
            Symbol::Template(t) => t.id,
            Symbol::Struct(s) => s.id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Symbol::Variable(v) | Symbol::Temporary(v) => &v.name,
            Symbol::Procedure(p) => &p.name,
            Symbol::Kind(k) => &k.name,
            Symbol::Domain(d) => &d.name,
            Symbol::DataTypeAlias { name, .. } => name,
            Symbol::DimTypeVar { name, .. } => name,
            Symbol::Template(t) => &t.name,
            Symbol::Struct(s) => &s.name,
            Symbol::Constant(_) | Symbol::Label(_) => "",
        }
    }

    pub fn as_variable(&self) -> Option<&VariableSymbol> {
        match self {
            Symbol::Variable(v) | Symbol::Temporary(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_temporary(&self) -> bool {
        matches!(self, Symbol::Temporary(_))
    }

    pub fn ty(&self) -> Option<Type> {
        match self {
            Symbol::Variable(v) | Symbol::Temporary(v) => Some(v.ty),
            Symbol::Constant(c) => Some(c.ty),
            Symbol::Procedure(p) => Some(p.ret),
            _ => None,
        }
    }
}
