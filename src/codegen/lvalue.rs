//! Lvalue/assignment lowering, grounded on `original_source/src/libscc/
//! codegen/{Assign,LValue}.cpp`.

use crate::ast::expr::ExprKind;
use crate::ast::{BinaryOp, NodeId};
use crate::ir::{Opcode, Operand};
use crate::types::Type;

use super::Generator;

impl<'a> Generator<'a> {
    /// Stores `value` into the storage named by the lvalue expression
    /// `lvalue_id`. Every `ExprKind` that `check_assignable` in the type
    /// checker accepts as an lvalue (`Variable`, `Index`, `Select`) is
    /// handled here.
    pub(super) fn gen_lvalue_store(&mut self, lvalue_id: NodeId, value: Operand) {
        match self.ast.expr(lvalue_id).clone() {
            ExprKind::Variable(sym) => {
                let ty = self.ast.result_type(lvalue_id).unwrap_or_else(Type::void);
                self.gen_store_value(Some(lvalue_id), sym, ty, value);
            }
            ExprKind::Index { base, indices } => {
                let base_op = self.gen_expr(base);
                let base_sym = base_op
                    .as_symbol()
                    .expect("an indexed lvalue's base resolves to a symbol");
                // TODO: this recomputes the flat offset already computed by
                // a preceding gen_expr(lvalue) for compound `idx op= v`
                // assignments instead of reusing it.
                let offset = self.gen_flat_offset(Some(lvalue_id), base_sym, &indices);
                self.emit(
                    Some(lvalue_id),
                    Opcode::Store,
                    vec![Operand::Symbol(base_sym), Operand::Symbol(offset), value],
                );
            }
            ExprKind::Select { base, field } => {
                let field_sym = self.resolve_field_symbol(base, &field);
                let ty = self.ast.result_type(lvalue_id).unwrap_or_else(Type::void);
                self.gen_store_value(Some(lvalue_id), field_sym, ty, value);
            }
            _ => unreachable!("non-lvalue expression reached gen_lvalue_store"),
        }
    }

    pub(super) fn gen_assign_expr(
        &mut self,
        id: NodeId,
        lvalue: NodeId,
        op: Option<BinaryOp>,
        value: NodeId,
    ) -> Operand {
        let rhs = self.gen_expr(value);
        let final_value = match op {
            Some(bin_op) => {
                let current = self.gen_expr(lvalue);
                let ty = self.ast.result_type(id).unwrap_or_else(Type::void);
                self.gen_binary_value(id, bin_op, current, rhs, ty)
            }
            None => rhs,
        };
        self.gen_lvalue_store(lvalue, final_value.clone());
        final_value
    }
}
