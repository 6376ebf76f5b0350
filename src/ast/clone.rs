//! Deep-cloning a subtree (spec.md §4.4 "it clones the template body").
//!
//! Grounded on `original_source/src/libscc/typechecker/Templates.cpp`'s
//! `TreeNode::clone()` walk (the C++ tree clones itself node-by-node,
//! re-parenting each copy); restated here as a free function over the
//! arena since there is no intrusive parent pointer to fix up — only the
//! `NodeId` cross-references embedded in each `ExprKind`/`StmtKind`/
//! `DeclKind` payload need rewriting to point at the fresh copies.
//!
//! spec.md §8 property 1: "cloning a subtree preserves every structural
//! property except parent pointers of the root" — here read as: the clone
//! is structurally identical (same shape, same leaf payloads) but is a
//! disjoint set of `NodeId`s with fresh (unset) type annotations, ready to
//! be re-type-checked against a different substitution.

use crate::ast::{Ast, DeclKind, ExprKind, IndexArg, Node, NodeId, NodeKind, Param, StmtKind};

/// Deep-clones the subtree rooted at `id`, returning the root of the copy.
/// Type annotations (`result_type`/`secrec_type`) are NOT copied: the clone
/// is meant to be independently type-checked (spec.md §4.4).
pub fn clone_subtree(ast: &mut Ast, id: NodeId) -> NodeId {
    let Node { location, kind, .. } = ast.get(id).clone();
    let cloned_kind = match kind {
        NodeKind::Expr(e) => NodeKind::Expr(clone_expr(ast, e)),
        NodeKind::Stmt(s) => NodeKind::Stmt(clone_stmt(ast, s)),
        NodeKind::Decl(d) => NodeKind::Decl(clone_decl(ast, d)),
    };
    ast.alloc(location, cloned_kind)
}

fn clone_opt(ast: &mut Ast, id: Option<NodeId>) -> Option<NodeId> {
    id.map(|id| clone_subtree(ast, id))
}

fn clone_many(ast: &mut Ast, ids: &[NodeId]) -> Vec<NodeId> {
    ids.iter().map(|&id| clone_subtree(ast, id)).collect()
}

fn clone_expr(ast: &mut Ast, kind: ExprKind) -> ExprKind {
    match kind {
        ExprKind::Literal(lit) => ExprKind::Literal(lit),
        ExprKind::Variable(sym) => ExprKind::Variable(sym),
        ExprKind::ArrayCtor(items) => ExprKind::ArrayCtor(clone_many(ast, &items)),
        ExprKind::Index { base, indices } => {
            let base = clone_subtree(ast, base);
            let indices = indices
                .into_iter()
                .map(|arg| match arg {
                    IndexArg::Index(i) => IndexArg::Index(clone_subtree(ast, i)),
                    IndexArg::Slice { lo, hi } => {
                        IndexArg::Slice { lo: clone_opt(ast, lo), hi: clone_opt(ast, hi) }
                    }
                })
                .collect();
            ExprKind::Index { base, indices }
        }
        ExprKind::Shape(e) => ExprKind::Shape(clone_subtree(ast, e)),
        ExprKind::Reshape { value, dims } => {
            ExprKind::Reshape { value: clone_subtree(ast, value), dims: clone_many(ast, &dims) }
        }
        ExprKind::Cat { lhs, rhs, dim } => {
            ExprKind::Cat { lhs: clone_subtree(ast, lhs), rhs: clone_subtree(ast, rhs), dim }
        }
        ExprKind::Size(e) => ExprKind::Size(clone_subtree(ast, e)),
        ExprKind::StrLen(e) => ExprKind::StrLen(clone_subtree(ast, e)),
        ExprKind::ToString(e) => ExprKind::ToString(clone_subtree(ast, e)),
        ExprKind::BytesFromString(e) => ExprKind::BytesFromString(clone_subtree(ast, e)),
        ExprKind::StringFromBytes(e) => ExprKind::StringFromBytes(clone_subtree(ast, e)),
        ExprKind::Classify(e) => ExprKind::Classify(clone_subtree(ast, e)),
        ExprKind::Declassify(e) => ExprKind::Declassify(clone_subtree(ast, e)),
        ExprKind::DomainId(sym) => ExprKind::DomainId(sym),
        ExprKind::Unary { op, operand } => ExprKind::Unary { op, operand: clone_subtree(ast, operand) },
        ExprKind::Binary { op, lhs, rhs } => {
            ExprKind::Binary { op, lhs: clone_subtree(ast, lhs), rhs: clone_subtree(ast, rhs) }
        }
        ExprKind::Ternary { cond, then_branch, else_branch } => ExprKind::Ternary {
            cond: clone_subtree(ast, cond),
            then_branch: clone_subtree(ast, then_branch),
            else_branch: clone_subtree(ast, else_branch),
        },
        ExprKind::Assign { lvalue, op, value } => {
            ExprKind::Assign { lvalue: clone_subtree(ast, lvalue), op, value: clone_subtree(ast, value) }
        }
        ExprKind::Prefix { op, operand } => ExprKind::Prefix { op, operand: clone_subtree(ast, operand) },
        ExprKind::Postfix { op, operand } => ExprKind::Postfix { op, operand: clone_subtree(ast, operand) },
        ExprKind::Select { base, field } => ExprKind::Select { base: clone_subtree(ast, base), field },
        ExprKind::Call { callee, args } => ExprKind::Call { callee, args: clone_many(ast, &args) },
        ExprKind::Qualified { value, ty } => ExprKind::Qualified { value: clone_subtree(ast, value), ty },
        ExprKind::Cast { ty, value } => ExprKind::Cast { ty, value: clone_subtree(ast, value) },
    }
}

fn clone_stmt(ast: &mut Ast, kind: StmtKind) -> StmtKind {
    match kind {
        StmtKind::If { cond, then_branch, else_branch } => StmtKind::If {
            cond: clone_subtree(ast, cond),
            then_branch: clone_subtree(ast, then_branch),
            else_branch: clone_opt(ast, else_branch),
        },
        StmtKind::While { cond, body } => {
            StmtKind::While { cond: clone_subtree(ast, cond), body: clone_subtree(ast, body) }
        }
        StmtKind::DoWhile { body, cond } => {
            StmtKind::DoWhile { body: clone_subtree(ast, body), cond: clone_subtree(ast, cond) }
        }
        StmtKind::For { init, cond, step, body } => StmtKind::For {
            init: clone_opt(ast, init),
            cond: clone_opt(ast, cond),
            step: clone_opt(ast, step),
            body: clone_subtree(ast, body),
        },
        StmtKind::Compound(items) => StmtKind::Compound(clone_many(ast, &items)),
        StmtKind::Break => StmtKind::Break,
        StmtKind::Continue => StmtKind::Continue,
        StmtKind::Return(e) => StmtKind::Return(clone_opt(ast, e)),
        StmtKind::Decl(d) => StmtKind::Decl(clone_subtree(ast, d)),
        StmtKind::Assert(e) => StmtKind::Assert(clone_subtree(ast, e)),
        StmtKind::Expr(e) => StmtKind::Expr(clone_subtree(ast, e)),
        StmtKind::Print(items) => StmtKind::Print(clone_many(ast, &items)),
        StmtKind::Syscall { name, args } => {
            use crate::ast::SyscallArg;
            let args = args
                .into_iter()
                .map(|a| match a {
                    SyscallArg::Return(e) => SyscallArg::Return(clone_subtree(ast, e)),
                    SyscallArg::Push(e) => SyscallArg::Push(clone_subtree(ast, e)),
                    SyscallArg::PushRef { value, read_only } => {
                        SyscallArg::PushRef { value: clone_subtree(ast, value), read_only }
                    }
                    SyscallArg::PushCRef(e) => SyscallArg::PushCRef(clone_subtree(ast, e)),
                })
                .collect();
            StmtKind::Syscall { name, args }
        }
    }
}

fn clone_decl(ast: &mut Ast, kind: DeclKind) -> DeclKind {
    match kind {
        DeclKind::Module { name, imports, items } => {
            DeclKind::Module { name, imports, items: clone_many(ast, &items) }
        }
        DeclKind::Kind { name, admitted } => DeclKind::Kind { name, admitted },
        DeclKind::Domain { name, kind } => DeclKind::Domain { name, kind },
        DeclKind::Struct { name, fields } => DeclKind::Struct { name, fields: clone_params(ast, fields) },
        DeclKind::Var { name, ty, dims, init } => {
            DeclKind::Var { name, ty, dims: clone_many(ast, &dims), init: clone_opt(ast, init) }
        }
        DeclKind::Proc { name, params, ret, body } => {
            DeclKind::Proc { name, params: clone_params(ast, params), ret, body: clone_subtree(ast, body) }
        }
        DeclKind::Operator { op, params, ret, body } => {
            DeclKind::Operator { op, params: clone_params(ast, params), ret, body: clone_subtree(ast, body) }
        }
        DeclKind::Cast { from, to, param, body } => {
            DeclKind::Cast { from, to, param, body: clone_subtree(ast, body) }
        }
        DeclKind::Template { quantifiers, inner } => {
            DeclKind::Template { quantifiers, inner: clone_subtree(ast, inner) }
        }
    }
}

/// `Param`s carry no `NodeId` (just a name and a syntactic `TypeExpr`), so
/// cloning is a plain data copy; kept as a named helper for symmetry with
/// the other `clone_*` functions.
fn clone_params(_ast: &mut Ast, params: Vec<Param>) -> Vec<Param> {
    params
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{BinaryOp, Literal};
    use crate::location::SourceLocation;

    #[test]
    fn clone_preserves_shape_with_fresh_ids() {
        let mut ast = Ast::new();
        let one = ast.alloc(SourceLocation::synthetic(), NodeKind::Expr(ExprKind::Literal(Literal::Int(1))));
        let two = ast.alloc(SourceLocation::synthetic(), NodeKind::Expr(ExprKind::Literal(Literal::Int(2))));
        let add = ast.alloc(
            SourceLocation::synthetic(),
            NodeKind::Expr(ExprKind::Binary { op: BinaryOp::Add, lhs: one, rhs: two }),
        );
        ast.set_result_type(add, crate::types::Type::bool_scalar_public());

        let clone = clone_subtree(&mut ast, add);
        assert_ne!(clone, add);
        assert!(ast.result_type(clone).is_none());
        match ast.expr(clone) {
            ExprKind::Binary { op, lhs, rhs } => {
                assert_eq!(*op, BinaryOp::Add);
                assert_ne!(*lhs, one);
                assert_ne!(*rhs, two);
                assert!(matches!(ast.expr(*lhs), ExprKind::Literal(Literal::Int(1))));
                assert!(matches!(ast.expr(*rhs), ExprKind::Literal(Literal::Int(2))));
            }
            other => panic!("expected Binary, got {other:?}"),
        }
    }
}
