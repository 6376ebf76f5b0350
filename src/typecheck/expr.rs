//! Expression type-checking (spec.md §4.3's per-kind rules for expressions).
//!
//! Split out of `mod.rs` the way `original_source/src/libscc/typechecker/`
//! splits `Expressions.cpp`/`Procedures.cpp`/`Templates.cpp` into one
//! translation unit per concern.

use crate::ast::{BinaryOp, ExprKind, IndexArg, Literal as AstLiteral, NodeId, UnaryOp};
use crate::error::{SemanticError, Status};
use crate::symbol::{Symbol, SymbolCategory};
use crate::types::data::{DataType, PrimitiveType};
use crate::types::security::SecurityType;
use crate::types::Type;

use super::overload::{resolve_overload, Candidate};
use super::TypeChecker;

impl<'a> TypeChecker<'a> {
    /// Checks `id` as an expression, memoizing and returning its type.
    /// Already-memoized expressions (e.g. revisited via a shared subtree)
    /// are returned without re-checking.
    pub fn check_expr(&mut self, id: NodeId) -> Type {
        if let Some(ty) = self.ast.result_type(id) {
            return ty;
        }
        let ty = self.check_expr_uncached(id);
        self.ast.set_result_type(id, ty);
        ty
    }

    fn check_expr_uncached(&mut self, id: NodeId) -> Type {
        let kind = self.ast.expr(id).clone();
        match kind {
            ExprKind::Literal(lit) => self.check_literal(id, &lit),
            ExprKind::Variable(sym) => self.check_variable(id, sym),
            ExprKind::ArrayCtor(elems) => self.check_array_ctor(id, &elems),
            ExprKind::Index { base, indices } => self.check_index(id, base, &indices),
            ExprKind::Shape(v) | ExprKind::Size(v) => {
                self.check_expr(v);
                Type::new(SecurityType::Public, DataType::Primitive(PrimitiveType::UInt64), 0)
            }
            ExprKind::Reshape { value, dims } => self.check_reshape(id, value, &dims),
            ExprKind::Cat { lhs, rhs, dim } => self.check_cat(id, lhs, rhs, dim),
            ExprKind::StrLen(v) => {
                self.check_expr(v);
                Type::new(SecurityType::Public, DataType::Primitive(PrimitiveType::UInt64), 0)
            }
            ExprKind::ToString(v) => {
                self.check_expr(v);
                Type::new(SecurityType::Public, DataType::Primitive(PrimitiveType::String), 0)
            }
            ExprKind::BytesFromString(v) => {
                self.check_expr(v);
                Type::new(SecurityType::Public, DataType::Primitive(PrimitiveType::UInt8), 1)
            }
            ExprKind::StringFromBytes(v) => {
                self.check_expr(v);
                Type::new(SecurityType::Public, DataType::Primitive(PrimitiveType::String), 0)
            }
            ExprKind::Classify(v) => {
                // Only produced synthetically by `insert_classify`; if the
                // parser ever allows it directly the operand's type stands
                // unless already typed.
                self.check_expr(v)
            }
            ExprKind::Declassify(v) => self.check_declassify(id, v),
            ExprKind::DomainId(sym) => {
                let _ = sym;
                Type::new(SecurityType::Public, DataType::Primitive(PrimitiveType::UInt64), 0)
            }
            ExprKind::Unary { op, operand } => self.check_unary(id, op, operand),
            ExprKind::Binary { op, lhs, rhs } => self.check_binary(id, op, lhs, rhs),
            ExprKind::Ternary { cond, then_branch, else_branch } => self.check_ternary(id, cond, then_branch, else_branch),
            ExprKind::Assign { lvalue, op, value } => self.check_assign(id, lvalue, op, value),
            ExprKind::Prefix { operand, .. } | ExprKind::Postfix { operand, .. } => self.check_expr(operand),
            ExprKind::Select { base, field } => self.check_select(id, base, &field),
            ExprKind::Call { callee, args } => self.check_call(id, &callee, &args),
            ExprKind::Qualified { value, ty } => self.check_qualified(id, value, &ty),
            ExprKind::Cast { ty, value } => self.check_cast_expr(id, &ty, value),
        }
    }

    fn check_literal(&mut self, id: NodeId, lit: &AstLiteral) -> Type {
        // A data-type hint from the parent context (if one was recorded
        // before this literal was visited, e.g. through `Qualified` or a
        // declaration's target type) narrows the default.
        let hint = self.ast.result_type(id);
        let data = match (lit, hint.map(|h| h.data().clone())) {
            (AstLiteral::Bool(_), _) => DataType::Primitive(PrimitiveType::Bool),
            (AstLiteral::Str(_), _) => DataType::Primitive(PrimitiveType::String),
            (AstLiteral::Int(_), Some(DataType::Primitive(p))) if p.is_integer() => DataType::Primitive(p),
            (AstLiteral::Int(_), _) => DataType::Primitive(PrimitiveType::Int64),
            (AstLiteral::UInt(_), Some(DataType::Primitive(p))) if p.is_integer() => DataType::Primitive(p),
            (AstLiteral::UInt(_), _) => DataType::Primitive(PrimitiveType::UInt64),
            (AstLiteral::Float(_), Some(DataType::Primitive(p))) if matches!(p, PrimitiveType::Float32 | PrimitiveType::Float64) => {
                DataType::Primitive(p)
            }
            (AstLiteral::Float(_), _) => DataType::Primitive(PrimitiveType::Float64),
        };
        Type::new(SecurityType::Public, data, 0)
    }

    fn check_variable(&mut self, id: NodeId, sym: crate::symbol::SymbolId) -> Type {
        match self.symtab.get(sym).ty() {
            Some(ty) => ty,
            None => self.fail(id, SemanticError::UndefinedName(format!("%{}", sym.0)), Status::ErrorContinue),
        }
    }

    fn check_array_ctor(&mut self, id: NodeId, elems: &[NodeId]) -> Type {
        let mut elem_ty = None;
        for &e in elems {
            let t = self.check_expr(e);
            match elem_ty {
                None => elem_ty = Some(t),
                Some(prev) if prev.data() == t.data() => {}
                Some(prev) => {
                    return self.fail(
                        id,
                        SemanticError::TypeMismatch { expected: prev.to_string(), found: t.to_string() },
                        Status::ErrorContinue,
                    )
                }
            }
        }
        let base = elem_ty.unwrap_or_else(|| Type::new(SecurityType::Public, DataType::Primitive(PrimitiveType::Int64), 0));
        Type::new(base.security(), base.data().clone(), 1)
    }

    fn check_index(&mut self, id: NodeId, base: NodeId, indices: &[IndexArg]) -> Type {
        let base_ty = self.check_expr(base);
        let mut result_rank = 0u32;
        for arg in indices {
            match arg {
                IndexArg::Index(e) => {
                    let t = self.check_expr(*e);
                    self.require_public_unsigned_index(id, t);
                }
                IndexArg::Slice { lo, hi } => {
                    result_rank += 1;
                    if let Some(lo) = lo {
                        let t = self.check_expr(*lo);
                        self.require_public_unsigned_index(id, t);
                    }
                    if let Some(hi) = hi {
                        let t = self.check_expr(*hi);
                        self.require_public_unsigned_index(id, t);
                    }
                }
            }
        }
        Type::new(base_ty.security(), base_ty.data().clone(), result_rank)
    }

    fn require_public_unsigned_index(&mut self, id: NodeId, ty: Type) {
        let ok = ty.is_public() && matches!(ty.data(), DataType::Primitive(p) if p.is_integer() && !p.is_signed());
        if !ok {
            self.fail(id, SemanticError::NonScalarInScalarContext, Status::ErrorContinue);
        }
    }

    fn check_reshape(&mut self, _id: NodeId, value: NodeId, dims: &[NodeId]) -> Type {
        let base = self.check_expr(value);
        for &d in dims {
            self.check_expr(d);
        }
        Type::new(base.security(), base.data().clone(), dims.len() as u32)
    }

    fn check_cat(&mut self, id: NodeId, lhs: NodeId, rhs: NodeId, _dim: u32) -> Type {
        let l = self.check_expr(lhs);
        let r = self.check_expr(rhs);
        if l.data() != r.data() || l.dim() != r.dim() {
            return self.fail(
                id,
                SemanticError::ShapeMismatch { lhs: vec![l.dim()], rhs: vec![r.dim()] },
                Status::ErrorContinue,
            );
        }
        match l.security().join(r.security()) {
            Some(sec) => Type::new(sec, l.data().clone(), l.dim()),
            None => self.fail(id, SemanticError::TypeMismatch { expected: l.to_string(), found: r.to_string() }, Status::ErrorContinue),
        }
    }

    fn check_declassify(&mut self, id: NodeId, value: NodeId) -> Type {
        let ty = self.check_expr(value);
        if ty.is_public() {
            return self.fail(id, SemanticError::TypeMismatch { expected: "private".into(), found: "public".into() }, Status::ErrorContinue);
        }
        if !ty.data().is_scalar_compatible() {
            return self.fail(id, SemanticError::InadmissibleDeclassify(ty.data().to_string()), Status::ErrorContinue);
        }
        Type::new(SecurityType::Public, ty.data().clone(), ty.dim())
    }

    fn check_unary(&mut self, id: NodeId, op: UnaryOp, operand: NodeId) -> Type {
        let ty = self.check_expr(operand);
        let builtin_ok = match op {
            UnaryOp::Not => matches!(ty.data(), DataType::Primitive(PrimitiveType::Bool)),
            UnaryOp::Neg => ty.is_numeric(),
            UnaryOp::BitNot => matches!(ty.data(), DataType::Primitive(p) if p.is_integer()),
        };
        if builtin_ok {
            return ty;
        }
        self.try_operator_overload(id, crate::symbol::OperatorCapability::UnaryOperator(op), &[ty], "unary operator")
    }

    fn check_binary(&mut self, id: NodeId, op: BinaryOp, lhs: NodeId, rhs: NodeId) -> Type {
        let l = self.check_expr(lhs);
        let r = self.check_expr(rhs);

        if op.is_short_circuit() && (!l.is_public() || !l.is_scalar() || !r.is_public() || !r.is_scalar()) {
            return self.fail(
                id,
                SemanticError::NonScalarInScalarContext,
                Status::ErrorContinue,
            );
        }

        if l.data() == r.data() && l.dim() == r.dim() {
            if let Some(sec) = l.security().join(r.security()) {
                if sec != l.security() {
                    let classified = self.ast.insert_classify(lhs, Type::new(sec, l.data().clone(), l.dim()));
                    self.ast.replace_child(id, lhs, classified);
                }
                if sec != r.security() {
                    let classified = self.ast.insert_classify(rhs, Type::new(sec, r.data().clone(), r.dim()));
                    self.ast.replace_child(id, rhs, classified);
                }
                let result_data = if op.is_comparison() { DataType::Primitive(PrimitiveType::Bool) } else { l.data().clone() };
                return Type::new(sec, result_data, l.dim());
            }
        }

        self.try_operator_overload(id, crate::symbol::OperatorCapability::BinaryOperator(op), &[l, r], "binary operator")
    }

    fn try_operator_overload(
        &mut self,
        id: NodeId,
        capability: crate::symbol::OperatorCapability,
        operand_types: &[Type],
        what: &str,
    ) -> Type {
        let name = operator_symbol_name(capability);
        let candidates = match super::overload::gather_candidates(self.symtab, self.ast, SymbolCategory::Procedure, &name) {
            Ok(c) => c,
            Err(e) => return self.fail_compile(id, e),
        };
        let _ = what;
        match resolve_overload(&name, candidates, operand_types.len(), &self.ast.get(id).location.clone()) {
            Ok(Candidate::Concrete { symbol, ret, .. }) => {
                self.call_targets.insert(id, symbol);
                ret
            }
            Ok(Candidate::Template { symbol, param_patterns, ret_pattern, .. }) => {
                self.instantiate_and_type(id, symbol, &param_patterns, &ret_pattern, operand_types)
            }
            Err(e) => self.fail_compile(id, e),
        }
    }

    fn check_ternary(&mut self, id: NodeId, cond: NodeId, then_branch: NodeId, else_branch: NodeId) -> Type {
        let c = self.check_expr(cond);
        if !c.is_public() || c.data() != &DataType::Primitive(PrimitiveType::Bool) {
            self.fail(id, SemanticError::NonScalarInScalarContext, Status::ErrorContinue);
        }
        let t = self.check_expr(then_branch);
        let e = self.check_expr(else_branch);
        if t.data() != e.data() || t.dim() != e.dim() {
            return self.fail(id, SemanticError::TypeMismatch { expected: t.to_string(), found: e.to_string() }, Status::ErrorContinue);
        }
        match t.security().join(e.security()) {
            Some(sec) => Type::new(sec, t.data().clone(), t.dim()),
            None => self.fail(id, SemanticError::TypeMismatch { expected: t.to_string(), found: e.to_string() }, Status::ErrorContinue),
        }
    }

    fn check_assign(&mut self, id: NodeId, lvalue: NodeId, op: Option<BinaryOp>, value: NodeId) -> Type {
        let target = self.check_expr(lvalue);
        let source = self.check_expr(value);
        let _ = op;
        self.check_assignable(id, lvalue, target, value, source)
    }

    /// Shared by plain assignment and declaration initializers: checks
    /// `source` against `target`, inserting classify if `target` is
    /// private and `source` is public (spec.md §4.3 "Return / declaration").
    pub(super) fn check_assignable(&mut self, id: NodeId, _lvalue: NodeId, target: Type, value: NodeId, source: Type) -> Type {
        if target.data() != source.data() || target.dim() != source.dim() {
            return self.fail(
                id,
                SemanticError::TypeMismatch { expected: target.to_string(), found: source.to_string() },
                Status::ErrorContinue,
            );
        }
        if !target.is_public() && source.is_public() {
            let classified = self.ast.insert_classify(value, target);
            self.ast.replace_child(id, value, classified);
        } else if target.is_public() && !source.is_public() {
            return self.fail(
                id,
                SemanticError::TypeMismatch { expected: target.to_string(), found: source.to_string() },
                Status::ErrorContinue,
            );
        } else if target.security() != source.security() {
            return self.fail(
                id,
                SemanticError::TypeMismatch { expected: target.to_string(), found: source.to_string() },
                Status::ErrorContinue,
            );
        }
        target
    }

    fn check_select(&mut self, id: NodeId, base: NodeId, field: &str) -> Type {
        let base_ty = self.check_expr(base);
        let Some(struct_id) = base_ty.data().as_struct() else {
            return self.fail(id, SemanticError::NonScalarInScalarContext, Status::ErrorContinue);
        };
        let Symbol::Struct(s) = self.symtab.get(struct_id) else {
            return self.fail(id, SemanticError::VoidInValueContext, Status::ErrorContinue);
        };
        match s.fields.iter().find(|(n, _)| n == field) {
            Some((_, sym)) => self.symtab.get(*sym).ty().unwrap_or_else(Type::void),
            None => self.fail(id, SemanticError::UndefinedName(field.to_string()), Status::ErrorContinue),
        }
    }

    fn check_call(&mut self, id: NodeId, callee: &str, args: &[NodeId]) -> Type {
        let arg_types: Vec<Type> = args.iter().map(|&a| self.check_expr(a)).collect();
        let candidates = match super::overload::gather_candidates(self.symtab, self.ast, SymbolCategory::Procedure, callee) {
            Ok(c) => c,
            Err(e) => return self.fail_compile(id, e),
        };
        let location = self.ast.get(id).location.clone();
        match resolve_overload(callee, candidates, args.len(), &location) {
            Ok(Candidate::Concrete { symbol, ret, .. }) => {
                self.call_targets.insert(id, symbol);
                ret
            }
            Ok(Candidate::Template { symbol, param_patterns, ret_pattern, .. }) => {
                self.instantiate_and_type(id, symbol, &param_patterns, &ret_pattern, &arg_types)
            }
            Err(e) => self.fail_compile(id, e),
        }
    }

    fn instantiate_and_type(
        &mut self,
        id: NodeId,
        template_symbol: crate::symbol::SymbolId,
        param_patterns: &[crate::types::pattern::TypePattern],
        ret_pattern: &crate::types::pattern::TypePattern,
        arg_types: &[Type],
    ) -> Type {
        let mut subst = crate::types::pattern::Substitution::new();
        for (pattern, arg_ty) in param_patterns.iter().zip(arg_types.iter()) {
            if crate::types::pattern::unify(pattern, *arg_ty, &mut subst).is_err() {
                return self.fail(id, SemanticError::NoMatchingOverload("<template>".to_string()), Status::ErrorContinue);
            }
        }

        let args: Vec<crate::types::pattern::TypeArg> = {
            let Symbol::Template(t) = self.symtab.get(template_symbol) else {
                return self.fail(id, SemanticError::UndefinedName("<template>".to_string()), Status::ErrorContinue);
            };
            let mut out = Vec::with_capacity(t.quantifiers.len());
            for q in &t.quantifiers {
                let name = self.symtab.get(q.name_symbol).name().to_string();
                let Some(arg) = subst.get(&name).cloned() else {
                    return self.fail(id, SemanticError::NoMatchingOverload("<template>".to_string()), Status::ErrorContinue);
                };
                out.push(arg);
            }
            out
        };

        let Symbol::Template(template) = self.symtab.get(template_symbol).clone() else {
            unreachable!("checked above");
        };

        // Every parameter pattern was just unified successfully against the
        // matching argument type, so the concrete parameter type *is* that
        // argument's type; no separate concretization pass is needed.
        let ret_ty = match ret_pattern.as_concrete() {
            Some(ty) => ty,
            None => concretize(ret_pattern, &subst).unwrap_or_else(Type::void),
        };

        match self
            .instantiator
            .get_or_instantiate(self.symtab, self.ast, &template, args, arg_types.to_vec(), ret_ty)
        {
            Ok(proc_symbol) => {
                self.call_targets.insert(id, proc_symbol);
                ret_ty
            }
            Err(e) => self.fail_compile(id, e),
        }
    }

    fn check_qualified(&mut self, id: NodeId, value: NodeId, ty: &crate::ast::TypeExpr) -> Type {
        let declared = match super::resolve_type::resolve_type_expr(self.symtab, ty, None, &self.ast.get(id).location.clone()) {
            Ok(pattern) => pattern.as_concrete().unwrap_or_else(Type::void),
            Err(e) => return self.fail_compile(id, e),
        };
        self.ast.set_result_type(value, declared);
        let actual = self.check_expr(value);
        let _ = actual;
        declared
    }

    fn check_cast_expr(&mut self, id: NodeId, ty: &crate::ast::TypeExpr, value: NodeId) -> Type {
        let target = match super::resolve_type::resolve_type_expr(self.symtab, ty, None, &self.ast.get(id).location.clone()) {
            Ok(pattern) => pattern.as_concrete().unwrap_or_else(Type::void),
            Err(e) => return self.fail_compile(id, e),
        };
        let source = self.check_expr(value);
        if source.data() == target.data() {
            return Type::new(target.security(), target.data().clone(), target.dim());
        }
        let candidates = match super::overload::gather_candidates(self.symtab, self.ast, SymbolCategory::Procedure, "cast") {
            Ok(c) => c,
            Err(e) => return self.fail_compile(id, e),
        };
        let location = self.ast.get(id).location.clone();
        match resolve_overload("cast", candidates, 1, &location) {
            Ok(Candidate::Concrete { symbol, ret, .. }) => {
                self.call_targets.insert(id, symbol);
                ret
            }
            Ok(Candidate::Template { symbol, param_patterns, ret_pattern, .. }) => {
                self.instantiate_and_type(id, symbol, &param_patterns, &ret_pattern, std::slice::from_ref(&source))
            }
            Err(e) => self.fail_compile(id, e),
        }
    }
}

fn operator_symbol_name(capability: crate::symbol::OperatorCapability) -> String {
    use crate::symbol::OperatorCapability::*;
    match capability {
        BinaryOperator(op) => format!("operator{op:?}"),
        UnaryOperator(op) => format!("operator{op:?}"),
        Cast => "cast".to_string(),
    }
}

/// Substitutes quantifier variables in `pattern` from `subst`, used to
/// concretize a template's return type at a call site.
fn concretize(pattern: &crate::types::pattern::TypePattern, subst: &crate::types::pattern::Substitution) -> Option<Type> {
    use crate::types::pattern::{DataPattern, DimPattern, SecurityPattern, TypeArg};
    let security = match &pattern.security {
        SecurityPattern::Concrete(s) => *s,
        SecurityPattern::Var(name) => match subst.get(name) {
            Some(TypeArg::Sec(s)) => *s,
            _ => return None,
        },
    };
    let data = match &pattern.data {
        DataPattern::Concrete(d) => d.clone(),
        DataPattern::Var(name) => match subst.get(name) {
            Some(TypeArg::Data(d)) => d.clone(),
            _ => return None,
        },
    };
    let dim = match &pattern.dim {
        DimPattern::Concrete(d) => *d,
        DimPattern::Var(name) => match subst.get(name) {
            Some(TypeArg::Dim(d)) => *d,
            _ => return None,
        },
    };
    Some(Type::new(security, data, dim))
}
