//! Declaration nodes: module-level items, procedure/operator/cast
//! definitions, template wrappers, and variable declarations (spec.md §3,
//! §4.4).
//!
//! Grounded on `original_source/include/libscc/secrec/treenodeprogram.h`,
//! `treenodefundef.h`/`treenodefundefs.h`, `treenodedecl.h` and
//! `treenodeglobals.h`.

use crate::ast::{NodeId, TypeExpr};
use crate::types::TypeArgKind;

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub ty: TypeExpr,
}

/// One template quantifier as written (spec.md §4.4: "rejected if any
/// quantifier name shadows another ... operator template declares a
/// dimension variable ...").
#[derive(Debug, Clone, PartialEq)]
pub struct QuantifierDecl {
    pub name: String,
    pub kind: TypeArgKind,
    /// For `kind == Sec`: an optional named-kind constraint the domain
    /// argument must belong to.
    pub constrained: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorName {
    Binary(crate::ast::BinaryOp),
    Unary(crate::ast::UnaryOp),
}

#[derive(Debug, Clone, PartialEq)]
pub enum DeclKind {
    Module { name: Option<String>, imports: Vec<String>, items: Vec<NodeId> },
    Kind { name: String, admitted: Vec<String> },
    Domain { name: String, kind: String },
    Struct { name: String, fields: Vec<Param> },
    /// A variable declaration, global (module item) or local
    /// (`StmtKind::Decl`) depending on where it's reachable from.
    Var { name: String, ty: TypeExpr, dims: Vec<NodeId>, init: Option<NodeId> },
    Proc { name: String, params: Vec<Param>, ret: TypeExpr, body: NodeId },
    Operator { op: OperatorName, params: Vec<Param>, ret: TypeExpr, body: NodeId },
    Cast { from: TypeExpr, to: TypeExpr, param: String, body: NodeId },
    /// Wraps a `Proc`/`Operator`/`Cast` declaration with its quantifier
    /// list (spec.md §4.4).
    Template { quantifiers: Vec<QuantifierDecl>, inner: NodeId },
}
