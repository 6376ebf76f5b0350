//! Typed AST view (C3): nodes arena-allocated and indexed by handle, each
//! carrying a cached type annotation slot.
//!
//! Grounded on `original_source/include/libscc/secrec/treenode.h` and its
//! per-kind `TreeNode*` headers (the raw tree), restructured as a closed
//! Rust enum tree addressed through handles rather than a C++ class
//! hierarchy of heap-allocated nodes with intrusive parent/child pointers
//! (spec.md §9 Design Notes: "intrusive... lists become arena-allocated
//! nodes indexed by handle").

pub mod clone;
pub mod decl;
pub mod expr;
pub mod stmt;
pub mod ty;

pub use clone::clone_subtree;
pub use decl::*;
pub use expr::*;
pub use stmt::*;
pub use ty::*;

use crate::location::SourceLocation;
use crate::types::Type;
use crate::utils::arena::{Arena, Handle};

pub type NodeId = Handle<Node>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
}

impl BinaryOp {
    /// Short-circuit operators additionally require both operands to be
    /// public scalars (spec.md §4.3).
    pub fn is_short_circuit(self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or)
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
    BitNot,
}

/// A single AST node: a location, a memoized type annotation, and the
/// per-kind payload. Expressions memoize `result_type`; declarations and
/// lvalues memoize `secrec_type` (spec.md §4.3).
#[derive(Debug, Clone)]
pub struct Node {
    pub location: SourceLocation,
    pub result_type: Option<Type>,
    pub secrec_type: Option<Type>,
    pub kind: NodeKind,
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    Expr(ExprKind),
    Stmt(StmtKind),
    Decl(DeclKind),
}

/// Owns every node of one compilation unit's AST.
#[derive(Debug, Default)]
pub struct Ast {
    nodes: Arena<Node>,
    pub root: Option<NodeId>,
}

impl Ast {
    pub fn new() -> Self {
        Ast { nodes: Arena::new(), root: None }
    }

    pub fn alloc(&mut self, location: SourceLocation, kind: NodeKind) -> NodeId {
        self.nodes.insert(Node { location, result_type: None, secrec_type: None, kind })
    }

    pub fn get(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    pub fn get_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id]
    }

    pub fn expr(&self, id: NodeId) -> &ExprKind {
        match &self.get(id).kind {
            NodeKind::Expr(e) => e,
            other => panic!("node {id:?} is not an expression: {other:?}"),
        }
    }

    pub fn stmt(&self, id: NodeId) -> &StmtKind {
        match &self.get(id).kind {
            NodeKind::Stmt(s) => s,
            other => panic!("node {id:?} is not a statement: {other:?}"),
        }
    }

    pub fn decl(&self, id: NodeId) -> &DeclKind {
        match &self.get(id).kind {
            NodeKind::Decl(d) => d,
            other => panic!("node {id:?} is not a declaration: {other:?}"),
        }
    }

    pub fn result_type(&self, id: NodeId) -> Option<Type> {
        self.get(id).result_type
    }

    pub fn set_result_type(&mut self, id: NodeId, ty: Type) {
        self.get_mut(id).result_type = Some(ty);
    }

    pub fn set_secrec_type(&mut self, id: NodeId, ty: Type) {
        self.get_mut(id).secrec_type = Some(ty);
    }

    /// Allocates a synthetic *classify* node wrapping `child`, at `child`'s
    /// location, so callers can splice it into a parent's child list in
    /// place of `child` (spec.md §4.3 "Classify insertion": "the checker
    /// replaces the child in its parent's child list with a synthetic
    /// classify node wrapping the original expression").
    pub fn insert_classify(&mut self, child: NodeId, target: Type) -> NodeId {
        let location = self.get(child).location.clone();
        let id = self.alloc(location, NodeKind::Expr(ExprKind::Classify(child)));
        self.set_result_type(id, target);
        id
    }

    /// Rewrites every occurrence of `old` among `parent`'s immediate
    /// children to `new`, in place. Used after `insert_classify` to splice
    /// the synthetic node into the tree the way its doc comment promises:
    /// "the checker replaces the child in its parent's child list".
    pub fn replace_child(&mut self, parent: NodeId, old: NodeId, new: NodeId) {
        let replace = |slot: &mut NodeId| {
            if *slot == old {
                *slot = new;
            }
        };
        let replace_opt = |slot: &mut Option<NodeId>| {
            if *slot == Some(old) {
                *slot = Some(new);
            }
        };
        let replace_vec = |slots: &mut [NodeId]| {
            for slot in slots {
                if *slot == old {
                    *slot = new;
                }
            }
        };

        match &mut self.get_mut(parent).kind {
            NodeKind::Expr(e) => match e {
                ExprKind::ArrayCtor(elems) => replace_vec(elems),
                ExprKind::Index { base, indices } => {
                    replace(base);
                    for arg in indices {
                        match arg {
                            IndexArg::Index(i) => replace(i),
                            IndexArg::Slice { lo, hi } => {
                                replace_opt(lo);
                                replace_opt(hi);
                            }
                        }
                    }
                }
                ExprKind::Shape(v) | ExprKind::Size(v) | ExprKind::StrLen(v) | ExprKind::ToString(v) => replace(v),
                ExprKind::Reshape { value, dims } => {
                    replace(value);
                    replace_vec(dims);
                }
                ExprKind::Cat { lhs, rhs, .. } => {
                    replace(lhs);
                    replace(rhs);
                }
                ExprKind::BytesFromString(v) | ExprKind::StringFromBytes(v) => replace(v),
                ExprKind::Classify(v) | ExprKind::Declassify(v) => replace(v),
                ExprKind::Unary { operand, .. } => replace(operand),
                ExprKind::Binary { lhs, rhs, .. } => {
                    replace(lhs);
                    replace(rhs);
                }
                ExprKind::Ternary { cond, then_branch, else_branch } => {
                    replace(cond);
                    replace(then_branch);
                    replace(else_branch);
                }
                ExprKind::Assign { lvalue, value, .. } => {
                    replace(lvalue);
                    replace(value);
                }
                ExprKind::Prefix { operand, .. } | ExprKind::Postfix { operand, .. } => replace(operand),
                ExprKind::Select { base, .. } => replace(base),
                ExprKind::Call { args, .. } => replace_vec(args),
                ExprKind::Qualified { value, .. } | ExprKind::Cast { value, .. } => replace(value),
                ExprKind::Literal(_) | ExprKind::Variable(_) | ExprKind::DomainId(_) => {}
            },
            NodeKind::Stmt(s) => match s {
                StmtKind::If { cond, then_branch, else_branch } => {
                    replace(cond);
                    replace(then_branch);
                    replace_opt(else_branch);
                }
                StmtKind::While { cond, body } => {
                    replace(cond);
                    replace(body);
                }
                StmtKind::DoWhile { body, cond } => {
                    replace(body);
                    replace(cond);
                }
                StmtKind::For { init, cond, step, body } => {
                    replace_opt(init);
                    replace_opt(cond);
                    replace_opt(step);
                    replace(body);
                }
                StmtKind::Compound(stmts) => replace_vec(stmts),
                StmtKind::Break | StmtKind::Continue => {}
                StmtKind::Return(value) => replace_opt(value),
                StmtKind::Decl(d) => replace(d),
                StmtKind::Assert(e) | StmtKind::Expr(e) => replace(e),
                StmtKind::Print(args) => replace_vec(args),
                StmtKind::Syscall { args, .. } => {
                    for a in args {
                        match a {
                            SyscallArg::Return(e) | SyscallArg::Push(e) | SyscallArg::PushCRef(e) => replace(e),
                            SyscallArg::PushRef { value, .. } => replace(value),
                        }
                    }
                }
            },
            NodeKind::Decl(d) => match d {
                DeclKind::Var { dims, init, .. } => {
                    replace_vec(dims);
                    replace_opt(init);
                }
                DeclKind::Module { .. }
                | DeclKind::Kind { .. }
                | DeclKind::Domain { .. }
                | DeclKind::Struct { .. }
                | DeclKind::Proc { .. }
                | DeclKind::Operator { .. }
                | DeclKind::Cast { .. }
                | DeclKind::Template { .. } => {}
            },
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
