//! Expression nodes (spec.md §3, §4.3, §4.5).
//!
//! Grounded on `original_source/include/libscc/secrec/treenodeexpr*.h`
//! (binary/unary/ternary/assign/rvariable/identifier expression kinds),
//! flattened into one closed enum per spec.md Design Notes' tagged-variant
//! treatment of the original's class hierarchy.

use crate::ast::{BinaryOp, NodeId, TypeExpr, UnaryOp};
use crate::symbol::SymbolId;

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Bool(bool),
    Int(i128),
    UInt(u128),
    Float(f64),
    Str(String),
}

/// One index/slice argument of an `Index` expression (spec.md §4.3
/// "Indexing validates each slice/index to be a public unsigned index").
#[derive(Debug, Clone, PartialEq)]
pub enum IndexArg {
    Index(NodeId),
    Slice { lo: Option<NodeId>, hi: Option<NodeId> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncDecOp {
    Inc,
    Dec,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Literal(Literal),
    Variable(SymbolId),
    ArrayCtor(Vec<NodeId>),
    Index { base: NodeId, indices: Vec<IndexArg> },
    Shape(NodeId),
    Reshape { value: NodeId, dims: Vec<NodeId> },
    Cat { lhs: NodeId, rhs: NodeId, dim: u32 },
    Size(NodeId),
    StrLen(NodeId),
    ToString(NodeId),
    BytesFromString(NodeId),
    StringFromBytes(NodeId),
    /// Public-to-private conversion, always explicit in the IR (spec.md
    /// GLOSSARY "Classify / declassify"). Also produced synthetically by
    /// the type checker (`Ast::insert_classify`).
    Classify(NodeId),
    Declassify(NodeId),
    DomainId(SymbolId),
    Unary { op: UnaryOp, operand: NodeId },
    Binary { op: BinaryOp, lhs: NodeId, rhs: NodeId },
    Ternary { cond: NodeId, then_branch: NodeId, else_branch: NodeId },
    Assign { lvalue: NodeId, op: Option<BinaryOp>, value: NodeId },
    Prefix { op: IncDecOp, operand: NodeId },
    Postfix { op: IncDecOp, operand: NodeId },
    /// Struct field selection `base.field`.
    Select { base: NodeId, field: String },
    /// An unresolved call by name; the type checker resolves `callee` to a
    /// concrete procedure or template instance (spec.md §4.3).
    Call { callee: String, args: Vec<NodeId> },
    /// An explicit `(value) :: type` qualification used to disambiguate
    /// overload resolution.
    Qualified { value: NodeId, ty: TypeExpr },
    Cast { ty: TypeExpr, value: NodeId },
}
