//! Expression lowering, grounded on `original_source/src/libscc/codegen/
//! Expression.cpp` (`CodeGen::cgExpr` and friends), restated without the
//! `SubscriptInfo`/offset-list plumbing (see `mod.rs` doc comment).

use crate::ast::expr::{ExprKind, IncDecOp, Literal as AstLiteral};
use crate::ast::{BinaryOp, NodeId, UnaryOp};
use crate::ir::{InstrId, Literal, Opcode, Operand, SyscallOperand, SyscallRole};
use crate::symbol::{ConstantValue, Symbol, SymbolId};
use crate::types::data::{DataType, PrimitiveType};
use crate::types::{SecurityType, Type};

use super::Generator;

fn uint64_ty() -> Type {
    Type::new(SecurityType::Public, DataType::Primitive(PrimitiveType::UInt64), 0)
}

fn binary_opcode(op: BinaryOp) -> Opcode {
    match op {
        BinaryOp::Add => Opcode::Add,
        BinaryOp::Sub => Opcode::Sub,
        BinaryOp::Mul => Opcode::Mul,
        BinaryOp::Div => Opcode::Div,
        BinaryOp::Mod => Opcode::Mod,
        BinaryOp::Eq => Opcode::Eq,
        BinaryOp::Ne => Opcode::Ne,
        BinaryOp::Lt => Opcode::Lt,
        BinaryOp::Le => Opcode::Le,
        BinaryOp::Gt => Opcode::Gt,
        BinaryOp::Ge => Opcode::Ge,
        BinaryOp::BitAnd => Opcode::BitAnd,
        BinaryOp::BitOr => Opcode::BitOr,
        BinaryOp::BitXor => Opcode::BitXor,
        BinaryOp::Shl => Opcode::Shl,
        BinaryOp::Shr => Opcode::Shr,
        BinaryOp::And | BinaryOp::Or => {
            unreachable!("short-circuit operators are lowered via gen_short_circuit")
        }
    }
}

fn array_dims(symtab: &crate::symbol::SymbolTable, sym: SymbolId) -> Vec<SymbolId> {
    match symtab.get(sym) {
        Symbol::Variable(v) | Symbol::Temporary(v) => v.dims.clone(),
        _ => Vec::new(),
    }
}

impl<'a> Generator<'a> {
    /// Stores a value into `dest`: `COPY` for array/composite destinations
    /// (the original's `ASSIGN` only rebinds a scalar slot; copying whole
    /// storage needs its own opcode so later passes can tell "no-op rename"
    /// from "duplicate this buffer" apart), `ASSIGN` otherwise.
    ///
    /// A whole-array copy from one already-allocated array symbol into
    /// another first emits a per-axis shape check (spec.md §4.3 "enforced
    /// by an emitted shape check that jumps to an error instruction on
    /// mismatch"); broadcasts and fresh allocations have no second shape to
    /// compare against and skip it.
    pub(super) fn gen_store_value(
        &mut self,
        creator: Option<NodeId>,
        dest: SymbolId,
        ty: Type,
        value: Operand,
    ) {
        if ty.is_array() {
            if let (Some(c), Operand::Symbol(src)) = (creator, value) {
                self.gen_array_shape_check(c, dest, src);
            }
        }
        let opcode = if ty.is_array() || ty.is_composite() {
            Opcode::Copy
        } else {
            Opcode::Assign
        };
        self.emit(creator, opcode, vec![Operand::Symbol(dest), value]);
    }

    /// Emits `NE dest_dim, src_dim` for each axis, jumping to an `ERROR` on
    /// the first mismatch (scenario S4: "a compile-time-inserted NE check
    /// on the differing axis that jumps to an ERROR instruction carrying a
    /// message string containing the source location"). A no-op when
    /// either side isn't an already-shaped array (a fresh destination with
    /// no `dims` yet, or mismatched rank, which the type checker already
    /// rejects).
    fn gen_array_shape_check(&mut self, creator: NodeId, dest: SymbolId, src: SymbolId) {
        let dest_dims = array_dims(self.symtab, dest);
        let src_dims = array_dims(self.symtab, src);
        if dest_dims.is_empty() || dest_dims.len() != src_dims.len() {
            return;
        }

        let bool_ty = Type::new(SecurityType::Public, DataType::Primitive(PrimitiveType::Bool), 0);
        let ok_label = self.symtab.new_label();
        let error_label = self.symtab.new_label();
        for (&d, &s) in dest_dims.iter().zip(src_dims.iter()) {
            let mismatch = self.new_temp(bool_ty);
            self.emit(Some(creator), Opcode::Ne, vec![Operand::Symbol(mismatch), Operand::Symbol(d), Operand::Symbol(s)]);
            self.emit(Some(creator), Opcode::Jt, vec![Operand::Symbol(error_label), Operand::Symbol(mismatch)]);
        }
        self.emit(Some(creator), Opcode::Jump, vec![Operand::Symbol(ok_label)]);
        self.bind_label(error_label);
        let loc = self.ast.get(creator).location.clone();
        self.gen_error(creator, format!("shape mismatch at {loc}"));
        self.bind_label(ok_label);
    }

    pub(super) fn gen_expr(&mut self, id: NodeId) -> Operand {
        let ty = self.ast.result_type(id).unwrap_or_else(Type::void);
        match self.ast.expr(id).clone() {
            ExprKind::Literal(lit) => self.gen_literal(&lit, ty),
            ExprKind::Variable(sym) => Operand::Symbol(sym),
            ExprKind::ArrayCtor(elems) => self.gen_array_ctor(id, &elems, ty),
            ExprKind::Index { base, indices } => self.gen_index_load(id, base, &indices, ty),
            ExprKind::Shape(v) => {
                let vop = self.gen_expr(v);
                self.gen_builtin_syscall(id, "core.shape", ty, vec![vop])
            }
            ExprKind::Reshape { value, dims } => {
                let vop = self.gen_expr(value);
                let mut pushes = vec![vop];
                for d in dims {
                    pushes.push(self.gen_expr(d));
                }
                self.gen_builtin_syscall(id, "core.reshape", ty, pushes)
            }
            ExprKind::Cat { lhs, rhs, dim } => {
                let l = self.gen_expr(lhs);
                let r = self.gen_expr(rhs);
                let dim_lit = Operand::Literal(Literal::uint(dim as u128, PrimitiveType::UInt64));
                self.gen_builtin_syscall(id, "core.cat", ty, vec![l, r, dim_lit])
            }
            ExprKind::Size(v) => {
                let vop = self.gen_expr(v);
                self.gen_builtin_syscall(id, "core.size", ty, vec![vop])
            }
            ExprKind::StrLen(v) => {
                let vop = self.gen_expr(v);
                let dest = self.new_temp(ty);
                self.emit(Some(id), Opcode::StrLen, vec![Operand::Symbol(dest), vop]);
                Operand::Symbol(dest)
            }
            ExprKind::ToString(v) => {
                let vop = self.gen_expr(v);
                let dest = self.new_temp(ty);
                self.emit(Some(id), Opcode::ToString, vec![Operand::Symbol(dest), vop]);
                Operand::Symbol(dest)
            }
            ExprKind::BytesFromString(v) => {
                let vop = self.gen_expr(v);
                self.gen_builtin_syscall(id, "core.bytes_from_string", ty, vec![vop])
            }
            ExprKind::StringFromBytes(v) => {
                let vop = self.gen_expr(v);
                self.gen_builtin_syscall(id, "core.string_from_bytes", ty, vec![vop])
            }
            ExprKind::Classify(v) => {
                let vop = self.gen_expr(v);
                let dest = self.new_temp(ty);
                self.emit(Some(id), Opcode::Classify, vec![Operand::Symbol(dest), vop]);
                Operand::Symbol(dest)
            }
            ExprKind::Declassify(v) => {
                let vop = self.gen_expr(v);
                let dest = self.new_temp(ty);
                self.emit(Some(id), Opcode::Declassify, vec![Operand::Symbol(dest), vop]);
                Operand::Symbol(dest)
            }
            ExprKind::DomainId(sym) => {
                let dest = self.new_temp(ty);
                self.emit(
                    Some(id),
                    Opcode::DomainId,
                    vec![Operand::Symbol(dest), Operand::Symbol(sym)],
                );
                Operand::Symbol(dest)
            }
            ExprKind::Unary { op, operand } => self.gen_unary(id, op, operand, ty),
            ExprKind::Binary { op, lhs, rhs } => self.gen_binary(id, op, lhs, rhs, ty),
            ExprKind::Ternary {
                cond,
                then_branch,
                else_branch,
            } => self.gen_ternary(id, cond, then_branch, else_branch, ty),
            ExprKind::Assign { lvalue, op, value } => self.gen_assign_expr(id, lvalue, op, value),
            ExprKind::Prefix { op, operand } => self.gen_incdec(id, op, operand, true),
            ExprKind::Postfix { op, operand } => self.gen_incdec(id, op, operand, false),
            ExprKind::Select { base, field } => Operand::Symbol(self.resolve_field_symbol(base, &field)),
            ExprKind::Call { args, .. } => self.gen_call(id, &args),
            ExprKind::Qualified { value, .. } => self.gen_expr(value),
            ExprKind::Cast { value, .. } => self.gen_cast_expr(id, value, ty),
        }
    }

    fn gen_literal(&mut self, lit: &AstLiteral, ty: Type) -> Operand {
        let prim = match ty.data() {
            DataType::Primitive(p) => *p,
            _ => PrimitiveType::Int64,
        };
        match lit {
            AstLiteral::Bool(b) => Operand::Literal(Literal::bool(*b)),
            AstLiteral::Int(v) => Operand::Literal(Literal::int(*v, prim)),
            AstLiteral::UInt(v) => Operand::Literal(Literal::uint(*v, prim)),
            AstLiteral::Float(v) => Operand::Literal(Literal::float(*v, prim)),
            AstLiteral::Str(s) => {
                let sym = self.symtab.new_constant(ty, ConstantValue::Str(s.clone()));
                Operand::Symbol(sym)
            }
        }
    }

    fn gen_array_ctor(&mut self, id: NodeId, elems: &[NodeId], ty: Type) -> Operand {
        let dest = self.new_temp(ty);
        let size_op = Operand::Literal(Literal::uint(elems.len() as u128, PrimitiveType::UInt64));
        self.emit(Some(id), Opcode::Alloc, vec![Operand::Symbol(dest), size_op]);
        for (i, &e) in elems.iter().enumerate() {
            let v = self.gen_expr(e);
            let idx_op = Operand::Literal(Literal::uint(i as u128, PrimitiveType::UInt64));
            self.emit(Some(id), Opcode::Store, vec![Operand::Symbol(dest), idx_op, v]);
        }
        Operand::Symbol(dest)
    }

    fn gen_builtin_syscall(&mut self, id: NodeId, name: &str, ret_ty: Type, pushes: Vec<Operand>) -> Operand {
        let dest = self.new_temp(ret_ty);
        let mut syscall_operands = vec![SyscallOperand {
            operand: Operand::Symbol(dest),
            role: SyscallRole::Return,
        }];
        syscall_operands.extend(pushes.into_iter().map(|operand| SyscallOperand {
            operand,
            role: SyscallRole::Push,
        }));
        let instr_id = self.emit(Some(id), Opcode::Syscall, vec![]);
        let instr = self.instrs.get_mut(instr_id);
        instr.syscall_name = Some(name.to_string());
        instr.syscall_operands = syscall_operands;
        Operand::Symbol(dest)
    }

    fn gen_unary(&mut self, id: NodeId, op: UnaryOp, operand: NodeId, ty: Type) -> Operand {
        let v = self.gen_expr(operand);
        if let Some(&callee) = self.call_targets.get(&id) {
            return self.gen_resolved_call(id, callee, ty, vec![v]);
        }
        let opcode = match op {
            UnaryOp::Not => Opcode::Not,
            UnaryOp::Neg => Opcode::Neg,
            UnaryOp::BitNot => Opcode::BitNot,
        };
        let dest = self.new_temp(ty);
        self.emit(Some(id), opcode, vec![Operand::Symbol(dest), v]);
        Operand::Symbol(dest)
    }

    fn gen_binary(&mut self, id: NodeId, op: BinaryOp, lhs: NodeId, rhs: NodeId, ty: Type) -> Operand {
        if op.is_short_circuit() {
            return self.gen_short_circuit(id, op, lhs, rhs, ty);
        }
        let l = self.gen_expr(lhs);
        let r = self.gen_expr(rhs);
        if let Some(&callee) = self.call_targets.get(&id) {
            return self.gen_resolved_call(id, callee, ty, vec![l, r]);
        }
        let dest = self.new_temp(ty);
        self.emit(Some(id), binary_opcode(op), vec![Operand::Symbol(dest), l, r]);
        Operand::Symbol(dest)
    }

    /// Applies a binary opcode to two already-computed operands, used by
    /// compound assignment (`x += v`) where the left operand is the value
    /// just read back from the lvalue rather than a fresh subexpression.
    pub(super) fn gen_binary_value(
        &mut self,
        id: NodeId,
        op: BinaryOp,
        lhs: Operand,
        rhs: Operand,
        ty: Type,
    ) -> Operand {
        if let Some(&callee) = self.call_targets.get(&id) {
            return self.gen_resolved_call(id, callee, ty, vec![lhs, rhs]);
        }
        let dest = self.new_temp(ty);
        self.emit(Some(id), binary_opcode(op), vec![Operand::Symbol(dest), lhs, rhs]);
        Operand::Symbol(dest)
    }

    /// `a && b` / `a || b`: evaluate `a`, skip `b` when it already decides
    /// the result, splitting the block exactly at the `JT`/`JF` the way
    /// scenario S6 (short-circuit CFG shape) expects.
    fn gen_short_circuit(&mut self, id: NodeId, op: BinaryOp, lhs: NodeId, rhs: NodeId, ty: Type) -> Operand {
        let result = self.new_temp(ty);
        self.emit(Some(id), Opcode::Declare, vec![Operand::Symbol(result)]);
        let l = self.gen_expr(lhs);
        let short_label = self.symtab.new_label();
        let end_label = self.symtab.new_label();
        match op {
            BinaryOp::And => self.emit(Some(id), Opcode::Jf, vec![Operand::Symbol(short_label), l]),
            BinaryOp::Or => self.emit(Some(id), Opcode::Jt, vec![Operand::Symbol(short_label), l]),
            _ => unreachable!(),
        };
        let r = self.gen_expr(rhs);
        self.emit(Some(id), Opcode::Assign, vec![Operand::Symbol(result), r]);
        self.emit(Some(id), Opcode::Jump, vec![Operand::Symbol(end_label)]);
        self.bind_label(short_label);
        let shortcut_value = matches!(op, BinaryOp::Or);
        self.emit(
            Some(id),
            Opcode::Assign,
            vec![Operand::Symbol(result), Operand::Literal(Literal::bool(shortcut_value))],
        );
        self.bind_label(end_label);
        Operand::Symbol(result)
    }

    fn gen_ternary(
        &mut self,
        id: NodeId,
        cond: NodeId,
        then_branch: NodeId,
        else_branch: NodeId,
        ty: Type,
    ) -> Operand {
        let result = self.new_temp(ty);
        self.emit(Some(id), Opcode::Declare, vec![Operand::Symbol(result)]);
        let cond_op = self.gen_expr(cond);
        let else_label = self.symtab.new_label();
        let end_label = self.symtab.new_label();
        self.emit(Some(id), Opcode::Jf, vec![Operand::Symbol(else_label), cond_op]);
        let t = self.gen_expr(then_branch);
        self.gen_store_value(Some(id), result, ty, t);
        self.emit(Some(id), Opcode::Jump, vec![Operand::Symbol(end_label)]);
        self.bind_label(else_label);
        let e = self.gen_expr(else_branch);
        self.gen_store_value(Some(id), result, ty, e);
        self.bind_label(end_label);
        Operand::Symbol(result)
    }

    fn gen_incdec(&mut self, id: NodeId, op: IncDecOp, operand: NodeId, is_prefix: bool) -> Operand {
        let current = self.gen_expr(operand);
        let ty = self.ast.result_type(id).unwrap_or_else(Type::void);
        let prim = match ty.data() {
            DataType::Primitive(p) => *p,
            _ => PrimitiveType::Int64,
        };
        let one = Operand::Literal(Literal::int(1, prim));
        let new_val = self.new_temp(ty);
        let opcode = match op {
            IncDecOp::Inc => Opcode::Add,
            IncDecOp::Dec => Opcode::Sub,
        };
        self.emit(Some(id), opcode, vec![Operand::Symbol(new_val), current.clone(), one]);
        self.gen_lvalue_store(operand, Operand::Symbol(new_val));
        if is_prefix {
            Operand::Symbol(new_val)
        } else {
            current
        }
    }

    fn gen_cast_expr(&mut self, id: NodeId, value: NodeId, ty: Type) -> Operand {
        let v = self.gen_expr(value);
        if let Some(&callee) = self.call_targets.get(&id) {
            return self.gen_resolved_call(id, callee, ty, vec![v]);
        }
        let dest = self.new_temp(ty);
        self.emit(Some(id), Opcode::Cast, vec![Operand::Symbol(dest), v]);
        Operand::Symbol(dest)
    }

    /// Lowers a call whose callee is already known (ordinary calls,
    /// resolved operator overloads, resolved cast overloads): `CALL`
    /// followed by its paired `RETCLEAN`, matching `uses()`/`defs()`'s
    /// "leading symbols up to the first literal are outputs, the rest are
    /// inputs" convention (`ir::Instruction`).
    pub(super) fn gen_resolved_call(
        &mut self,
        creator: NodeId,
        callee: SymbolId,
        ret_ty: Type,
        args: Vec<Operand>,
    ) -> Operand {
        let mut operands = Vec::new();
        let ret_operand = if ret_ty.is_void() {
            None
        } else {
            let t = self.new_temp(ret_ty);
            operands.push(Operand::Symbol(t));
            Some(Operand::Symbol(t))
        };
        operands.push(Operand::Literal(Literal::bool(false)));
        operands.extend(args);
        let call_id = self.emit(Some(creator), Opcode::Call, operands);
        self.record_pending_call(call_id, callee);
        let retclean_id = self.emit(Some(creator), Opcode::RetClean, vec![]);
        self.instrs.get_mut(retclean_id).retclean_call = Some(call_id);
        ret_operand.unwrap_or(Operand::Literal(Literal::bool(false)))
    }

    pub(super) fn gen_call(&mut self, id: NodeId, args: &[NodeId]) -> Operand {
        let arg_ops: Vec<Operand> = args.iter().map(|&a| self.gen_expr(a)).collect();
        let callee = *self
            .call_targets
            .get(&id)
            .expect("the type checker resolves every call before codegen runs");
        let ret_ty = self.ast.result_type(id).unwrap_or_else(Type::void);
        self.gen_resolved_call(id, callee, ret_ty, arg_ops)
    }

    fn record_pending_call(&mut self, call_id: InstrId, callee: SymbolId) {
        self.pending_calls.push((call_id, callee));
    }

    pub(super) fn resolve_field_symbol(&mut self, base: NodeId, field: &str) -> SymbolId {
        let base_op = self.gen_expr(base);
        let base_sym = base_op.as_symbol().expect("a struct select base resolves to a symbol");
        let base_ty = self.ast.result_type(base).expect("base already type-checked");
        let struct_id = base_ty
            .data()
            .as_struct()
            .expect("select on a non-struct base slipped past the type checker");
        let field_index = match self.symtab.get(struct_id) {
            Symbol::Struct(s) => s
                .fields
                .iter()
                .position(|(name, _)| name == field)
                .expect("field existence was checked by the type checker"),
            _ => unreachable!("struct type points at a non-struct symbol"),
        };
        self.ensure_struct_fields(base_sym, struct_id)[field_index]
    }

    /// Struct field storage is a per-instance concern the type checker
    /// leaves empty on `VariableSymbol::fields` (it only needs the field
    /// *types* to check field selects); codegen materializes one temporary
    /// per field the first time a variable's fields are touched, mirroring
    /// `gen_array_alloc`'s lazy dimension-symbol allocation below.
    fn ensure_struct_fields(&mut self, base_sym: SymbolId, struct_id: SymbolId) -> Vec<SymbolId> {
        let existing = match self.symtab.get(base_sym) {
            Symbol::Variable(v) | Symbol::Temporary(v) => v.fields.clone(),
            _ => Vec::new(),
        };
        if !existing.is_empty() {
            return existing;
        }
        let field_defs: Vec<(String, SymbolId)> = match self.symtab.get(struct_id) {
            Symbol::Struct(s) => s.fields.clone(),
            _ => Vec::new(),
        };
        let mut fresh = Vec::with_capacity(field_defs.len());
        for (_, field_sym) in &field_defs {
            let ty = self.symtab.get(*field_sym).ty().unwrap_or_else(Type::void);
            fresh.push(self.symtab.new_temporary(ty));
        }
        if let Symbol::Variable(v) = self.symtab.get_mut(base_sym) {
            v.fields = fresh.clone();
        }
        fresh
    }

    /// Lowers `arr[i, j, ...]` by computing a row-major flat offset and
    /// emitting a single `LOAD`. Multi-dimensional slicing (any axis using
    /// `lo..hi` rather than a plain index) is out of reach of a flat
    /// `LOAD`/`STORE` pair and is routed through a `core.index_slice`
    /// syscall instead.
    pub(super) fn gen_index_load(
        &mut self,
        id: NodeId,
        base: NodeId,
        indices: &[crate::ast::expr::IndexArg],
        ty: Type,
    ) -> Operand {
        use crate::ast::expr::IndexArg;
        let base_op = self.gen_expr(base);
        let base_sym = match base_op.as_symbol() {
            Some(s) => s,
            None => return base_op,
        };
        if indices.iter().any(|a| matches!(a, IndexArg::Slice { .. })) {
            return self.gen_slice_syscall(id, base_sym, indices, ty);
        }
        let offset = self.gen_flat_offset(Some(id), base_sym, indices);
        let dest = self.new_temp(ty);
        self.emit(
            Some(id),
            Opcode::Load,
            vec![Operand::Symbol(dest), Operand::Symbol(base_sym), Operand::Symbol(offset)],
        );
        Operand::Symbol(dest)
    }

    fn gen_slice_syscall(
        &mut self,
        id: NodeId,
        base_sym: SymbolId,
        indices: &[crate::ast::expr::IndexArg],
        ty: Type,
    ) -> Operand {
        use crate::ast::expr::IndexArg;
        let mut pushes = vec![Operand::Symbol(base_sym)];
        for idx in indices {
            match idx {
                IndexArg::Index(e) => {
                    let v = self.gen_expr(*e);
                    pushes.push(v.clone());
                    pushes.push(v);
                }
                IndexArg::Slice { lo, hi } => {
                    let lo_op = lo
                        .map(|e| self.gen_expr(e))
                        .unwrap_or(Operand::Literal(Literal::uint(0, PrimitiveType::UInt64)));
                    pushes.push(lo_op);
                    let hi_op = hi
                        .map(|e| self.gen_expr(e))
                        .unwrap_or(Operand::Symbol(base_sym));
                    pushes.push(hi_op);
                }
            }
        }
        self.gen_builtin_syscall(id, "core.index_slice", ty, pushes)
    }

    /// Row-major flat offset: `sum(index_i * stride_i)`,
    /// `stride_i = product(dims[i+1..])`. Falls back to treating the single
    /// index as the offset directly for rank <= 1 arrays, and for arrays
    /// whose per-axis dimension symbols were never materialized (e.g. an
    /// array parameter: dimensions are not passed across call boundaries in
    /// this compiler, SPEC_FULL.md Non-goals).
    pub(super) fn gen_flat_offset(
        &mut self,
        creator: Option<NodeId>,
        base_sym: SymbolId,
        indices: &[crate::ast::expr::IndexArg],
    ) -> SymbolId {
        use crate::ast::expr::IndexArg;
        let dims: Vec<SymbolId> = match self.symtab.get(base_sym) {
            Symbol::Variable(v) | Symbol::Temporary(v) => v.dims.clone(),
            _ => Vec::new(),
        };
        let index_ops: Vec<Operand> = indices
            .iter()
            .map(|a| match a {
                IndexArg::Index(e) => self.gen_expr(*e),
                IndexArg::Slice { .. } => unreachable!("slices are routed through gen_slice_syscall"),
            })
            .collect();

        let uint_ty = uint64_ty();
        if dims.len() != index_ops.len() || dims.len() <= 1 {
            let off = self.new_temp(uint_ty);
            let first = index_ops
                .into_iter()
                .next()
                .unwrap_or(Operand::Literal(Literal::uint(0, PrimitiveType::UInt64)));
            self.emit(creator, Opcode::Assign, vec![Operand::Symbol(off), first]);
            return off;
        }

        let mut offset = self.new_temp(uint_ty);
        self.emit(creator, Opcode::Assign, vec![Operand::Symbol(offset), index_ops[0].clone()]);
        for axis in 1..index_ops.len() {
            let mut stride = self.new_temp(uint_ty);
            self.emit(creator, Opcode::Assign, vec![Operand::Symbol(stride), Operand::Symbol(dims[axis])]);
            for d in &dims[axis + 1..] {
                let next_stride = self.new_temp(uint_ty);
                self.emit(
                    creator,
                    Opcode::Mul,
                    vec![Operand::Symbol(next_stride), Operand::Symbol(stride), Operand::Symbol(*d)],
                );
                stride = next_stride;
            }
            let scaled = self.new_temp(uint_ty);
            self.emit(
                creator,
                Opcode::Mul,
                vec![Operand::Symbol(scaled), index_ops[axis].clone(), Operand::Symbol(stride)],
            );
            let next_offset = self.new_temp(uint_ty);
            self.emit(
                creator,
                Opcode::Add,
                vec![Operand::Symbol(next_offset), Operand::Symbol(offset), Operand::Symbol(scaled)],
            );
            offset = next_offset;
        }
        offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::BinaryOp as Bo;
    use crate::ast::expr::ExprKind;
    use crate::instantiate::Instantiator;
    use crate::symbol::SymbolCategory;
    use std::collections::HashMap;

    fn loc() -> crate::location::SourceLocation {
        crate::location::SourceLocation::synthetic()
    }

    #[test]
    fn binary_add_emits_single_instruction_with_both_operands() {
        let mut ast = Ast::new();
        let mut symtab = SymbolTable::new();
        let i64_ty = Type::new(SecurityType::Public, DataType::Primitive(PrimitiveType::Int64), 0);
        let a = symtab
            .declare(SymbolCategory::Variable, "a", |id| {
                Symbol::Variable(crate::symbol::VariableSymbol {
                    id,
                    name: "a".into(),
                    ty: i64_ty,
                    storage: crate::symbol::Storage::Local,
                    parent: None,
                    dims: Vec::new(),
                    size: None,
                    fields: Vec::new(),
                })
            })
            .unwrap();
        let b = symtab
            .declare(SymbolCategory::Variable, "b", |id| {
                Symbol::Variable(crate::symbol::VariableSymbol {
                    id,
                    name: "b".into(),
                    ty: i64_ty,
                    storage: crate::symbol::Storage::Local,
                    parent: None,
                    dims: Vec::new(),
                    size: None,
                    fields: Vec::new(),
                })
            })
            .unwrap();

        let lhs = ast.alloc(loc(), crate::ast::NodeKind::Expr(ExprKind::Variable(a)));
        ast.set_result_type(lhs, i64_ty);
        let rhs = ast.alloc(loc(), crate::ast::NodeKind::Expr(ExprKind::Variable(b)));
        ast.set_result_type(rhs, i64_ty);
        let add = ast.alloc(
            loc(),
            crate::ast::NodeKind::Expr(ExprKind::Binary {
                op: Bo::Add,
                lhs,
                rhs,
            }),
        );
        ast.set_result_type(add, i64_ty);

        let call_targets = HashMap::new();
        let var_symbols = HashMap::new();
        let mut gen = Generator::new(&ast, &mut symtab, &call_targets, &var_symbols);
        gen.scopes.push(Vec::new());
        let result = gen.gen_expr(add);
        let dest = result.as_symbol().unwrap();
        assert_eq!(gen.instrs.len(), 1);
        let instr = gen.instrs.get(gen.instrs.order()[0]);
        assert_eq!(instr.opcode, Opcode::Add);
        assert_eq!(instr.operands[0], Operand::Symbol(dest));
        assert_eq!(instr.operands[1], Operand::Symbol(a));
        assert_eq!(instr.operands[2], Operand::Symbol(b));
        let _ = Instantiator::new();
    }

    #[test]
    fn short_circuit_and_emits_jf_and_two_arms() {
        let mut ast = Ast::new();
        let mut symtab = SymbolTable::new();
        let bool_ty = Type::bool_scalar_public();
        let a = symtab
            .declare(SymbolCategory::Variable, "a", |id| {
                Symbol::Variable(crate::symbol::VariableSymbol {
                    id,
                    name: "a".into(),
                    ty: bool_ty,
                    storage: crate::symbol::Storage::Local,
                    parent: None,
                    dims: Vec::new(),
                    size: None,
                    fields: Vec::new(),
                })
            })
            .unwrap();
        let b = symtab
            .declare(SymbolCategory::Variable, "b", |id| {
                Symbol::Variable(crate::symbol::VariableSymbol {
                    id,
                    name: "b".into(),
                    ty: bool_ty,
                    storage: crate::symbol::Storage::Local,
                    parent: None,
                    dims: Vec::new(),
                    size: None,
                    fields: Vec::new(),
                })
            })
            .unwrap();
        let lhs = ast.alloc(loc(), crate::ast::NodeKind::Expr(ExprKind::Variable(a)));
        ast.set_result_type(lhs, bool_ty);
        let rhs = ast.alloc(loc(), crate::ast::NodeKind::Expr(ExprKind::Variable(b)));
        ast.set_result_type(rhs, bool_ty);
        let and_expr = ast.alloc(
            loc(),
            crate::ast::NodeKind::Expr(ExprKind::Binary {
                op: Bo::And,
                lhs,
                rhs,
            }),
        );
        ast.set_result_type(and_expr, bool_ty);

        let call_targets = HashMap::new();
        let var_symbols = HashMap::new();
        let mut gen = Generator::new(&ast, &mut symtab, &call_targets, &var_symbols);
        gen.scopes.push(Vec::new());
        gen.gen_expr(and_expr);
        let opcodes: Vec<Opcode> = gen
            .instrs
            .order()
            .iter()
            .map(|&id| gen.instrs.get(id).opcode)
            .collect();
        assert_eq!(
            opcodes,
            vec![
                Opcode::Declare,
                Opcode::Jf,
                Opcode::Assign,
                Opcode::Jump,
                Opcode::Assign,
            ]
        );
    }
}
