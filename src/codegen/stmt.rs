//! Statement lowering, grounded on `original_source/src/libscc/codegen/
//! Program.cpp`'s `cgStmt` family (loop/branch/assert/print/syscall
//! statements) plus the scope-release convention shared with `Expression.cpp`
//! and `LValue.cpp`.

use crate::ast::stmt::SyscallArg;
use crate::ast::{NodeId, StmtKind};
use crate::ir::{Opcode, Operand, SyscallOperand, SyscallRole};
use crate::symbol::Symbol;
use crate::types::Type;

use super::{Generator, LoopLabels};

impl<'a> Generator<'a> {
    pub(super) fn gen_stmt(&mut self, id: NodeId) {
        match self.ast.stmt(id).clone() {
            StmtKind::If {
                cond,
                then_branch,
                else_branch,
            } => self.gen_if(id, cond, then_branch, else_branch),
            StmtKind::While { cond, body } => self.gen_while(id, cond, body),
            StmtKind::DoWhile { body, cond } => self.gen_do_while(id, body, cond),
            StmtKind::For {
                init,
                cond,
                step,
                body,
            } => self.gen_for(id, init, cond, step, body),
            StmtKind::Compound(stmts) => self.gen_compound(&stmts),
            StmtKind::Break => self.gen_break(id),
            StmtKind::Continue => self.gen_continue(id),
            StmtKind::Return(value) => self.gen_return(id, value),
            StmtKind::Decl(decl_id) => self.gen_local_decl(decl_id),
            StmtKind::Assert(e) => self.gen_assert(id, e),
            StmtKind::Expr(e) => {
                self.gen_expr(e);
            }
            StmtKind::Print(args) => self.gen_print(id, &args),
            StmtKind::Syscall { name, args } => self.gen_raw_syscall(id, &name, &args),
        }
    }

    fn gen_if(&mut self, id: NodeId, cond: NodeId, then_branch: NodeId, else_branch: Option<NodeId>) {
        let cond_op = self.gen_expr(cond);
        let false_label = self.symtab.new_label();
        self.emit(Some(id), Opcode::Jf, vec![Operand::Symbol(false_label), cond_op]);
        self.gen_stmt(then_branch);
        if let Some(else_b) = else_branch {
            let end_label = self.symtab.new_label();
            self.emit(Some(id), Opcode::Jump, vec![Operand::Symbol(end_label)]);
            self.bind_label(false_label);
            self.gen_stmt(else_b);
            self.bind_label(end_label);
        } else {
            self.bind_label(false_label);
        }
    }

    fn gen_while(&mut self, id: NodeId, cond: NodeId, body: NodeId) {
        let start_label = self.symtab.new_label();
        self.bind_label(start_label);
        let cond_op = self.gen_expr(cond);
        let end_label = self.symtab.new_label();
        self.emit(Some(id), Opcode::Jf, vec![Operand::Symbol(end_label), cond_op]);
        self.loops.push(LoopLabels {
            break_label: end_label,
            continue_label: start_label,
            scope_depth: self.scopes.len(),
        });
        self.gen_stmt(body);
        self.loops.pop();
        self.emit(Some(id), Opcode::Jump, vec![Operand::Symbol(start_label)]);
        self.bind_label(end_label);
    }

    fn gen_do_while(&mut self, id: NodeId, body: NodeId, cond: NodeId) {
        let start_label = self.symtab.new_label();
        self.bind_label(start_label);
        let continue_label = self.symtab.new_label();
        let break_label = self.symtab.new_label();
        self.loops.push(LoopLabels {
            break_label,
            continue_label,
            scope_depth: self.scopes.len(),
        });
        self.gen_stmt(body);
        self.loops.pop();
        self.bind_label(continue_label);
        let cond_op = self.gen_expr(cond);
        self.emit(Some(id), Opcode::Jt, vec![Operand::Symbol(start_label), cond_op]);
        self.bind_label(break_label);
    }

    fn gen_for(
        &mut self,
        id: NodeId,
        init: Option<NodeId>,
        cond: Option<NodeId>,
        step: Option<NodeId>,
        body: NodeId,
    ) {
        self.scopes.push(Vec::new());
        if let Some(i) = init {
            self.gen_stmt(i);
        }
        let start_label = self.symtab.new_label();
        self.bind_label(start_label);
        let end_label = self.symtab.new_label();
        if let Some(c) = cond {
            let cond_op = self.gen_expr(c);
            self.emit(Some(id), Opcode::Jf, vec![Operand::Symbol(end_label), cond_op]);
        }
        let continue_label = self.symtab.new_label();
        self.loops.push(LoopLabels {
            break_label: end_label,
            continue_label,
            scope_depth: self.scopes.len(),
        });
        self.gen_stmt(body);
        self.loops.pop();
        self.bind_label(continue_label);
        if let Some(s) = step {
            self.gen_expr(s);
        }
        self.emit(Some(id), Opcode::Jump, vec![Operand::Symbol(start_label)]);
        self.bind_label(end_label);
        let locals = self.scopes.pop().unwrap();
        for sym in locals.into_iter().rev() {
            self.emit(Some(id), Opcode::Release, vec![Operand::Symbol(sym)]);
        }
    }

    fn gen_compound(&mut self, stmts: &[NodeId]) {
        self.scopes.push(Vec::new());
        for &s in stmts {
            self.gen_stmt(s);
        }
        let locals = self.scopes.pop().unwrap();
        for sym in locals.into_iter().rev() {
            self.emit(None, Opcode::Release, vec![Operand::Symbol(sym)]);
        }
    }

    fn gen_break(&mut self, id: NodeId) {
        let loop_ = *self.loops.last().expect("break only appears inside a loop body");
        self.release_locals_above(Some(id), loop_.scope_depth);
        self.emit(Some(id), Opcode::Jump, vec![Operand::Symbol(loop_.break_label)]);
    }

    fn gen_continue(&mut self, id: NodeId) {
        let loop_ = *self.loops.last().expect("continue only appears inside a loop body");
        self.release_locals_above(Some(id), loop_.scope_depth);
        self.emit(Some(id), Opcode::Jump, vec![Operand::Symbol(loop_.continue_label)]);
    }

    /// Releases every still-open local, composites before scalars and each
    /// group in reverse declaration order, before handing the return value
    /// (computed beforehand, into a fresh temporary so releasing the named
    /// locals cannot clobber it) to `RETURN`.
    fn gen_return(&mut self, id: NodeId, value: Option<NodeId>) {
        let ret_operand = value.map(|v| self.gen_expr(v));
        self.release_locals_for_return(id, true);
        self.release_locals_for_return(id, false);
        let mut operands = Vec::new();
        if let Some(op) = ret_operand {
            operands.push(op);
        }
        self.emit(Some(id), Opcode::Return, operands);
    }

    fn release_locals_for_return(&mut self, id: NodeId, composites_only: bool) {
        let scopes = self.scopes.clone();
        for scope in scopes.iter().rev() {
            for &sym in scope.iter().rev() {
                let is_composite = self
                    .symtab
                    .get(sym)
                    .ty()
                    .map(|t| t.is_composite())
                    .unwrap_or(false);
                if is_composite == composites_only {
                    self.emit(Some(id), Opcode::Release, vec![Operand::Symbol(sym)]);
                }
            }
        }
    }

    fn gen_local_decl(&mut self, decl_id: NodeId) {
        use crate::ast::DeclKind;
        let dims = match self.ast.decl(decl_id).clone() {
            DeclKind::Var { dims, .. } => dims,
            _ => unreachable!("StmtKind::Decl always wraps a DeclKind::Var"),
        };
        let sym = *self
            .var_symbols
            .get(&decl_id)
            .expect("the type checker declared every local variable");
        self.emit(Some(decl_id), Opcode::Declare, vec![Operand::Symbol(sym)]);
        if let Some(scope) = self.scopes.last_mut() {
            scope.push(sym);
        }
        if !dims.is_empty() {
            self.gen_array_alloc(decl_id, sym, &dims);
        }
        let init = match self.ast.decl(decl_id) {
            DeclKind::Var { init, .. } => *init,
            _ => None,
        };
        if let Some(init_id) = init {
            let value = self.gen_expr(init_id);
            let ty = self
                .symtab
                .get(sym)
                .ty()
                .unwrap_or_else(Type::void);
            self.gen_store_value(Some(decl_id), sym, ty, value);
        }
    }

    /// Materializes per-axis dimension symbols and the element-count symbol
    /// the type checker leaves unset on `VariableSymbol` (it only needs an
    /// array's rank, not its runtime shape, to type-check), then allocates
    /// storage for `sym`.
    fn gen_array_alloc(&mut self, creator: NodeId, sym: crate::symbol::SymbolId, dim_exprs: &[NodeId]) {
        use crate::types::data::PrimitiveType;
        use crate::types::SecurityType;
        let uint_ty = Type::new(
            SecurityType::Public,
            crate::types::data::DataType::Primitive(PrimitiveType::UInt64),
            0,
        );
        let mut dim_syms = Vec::with_capacity(dim_exprs.len());
        for &d in dim_exprs {
            let dim_val = self.gen_expr(d);
            let dim_sym = self.new_temp(uint_ty);
            self.emit(Some(creator), Opcode::Assign, vec![Operand::Symbol(dim_sym), dim_val]);
            dim_syms.push(dim_sym);
        }
        let size_sym = self.new_temp(uint_ty);
        let mut iter = dim_syms.iter();
        if let Some(&first) = iter.next() {
            let mut acc = first;
            for &next in iter {
                let prod = self.new_temp(uint_ty);
                self.emit(
                    Some(creator),
                    Opcode::Mul,
                    vec![Operand::Symbol(prod), Operand::Symbol(acc), Operand::Symbol(next)],
                );
                acc = prod;
            }
            self.emit(Some(creator), Opcode::Assign, vec![Operand::Symbol(size_sym), Operand::Symbol(acc)]);
        }
        if let Symbol::Variable(v) = self.symtab.get_mut(sym) {
            v.dims = dim_syms;
            v.size = Some(size_sym);
        }
        self.emit(Some(creator), Opcode::Alloc, vec![Operand::Symbol(sym), Operand::Symbol(size_sym)]);
    }

    fn gen_assert(&mut self, id: NodeId, e: NodeId) {
        let cond = self.gen_expr(e);
        let ok_label = self.symtab.new_label();
        self.emit(Some(id), Opcode::Jt, vec![Operand::Symbol(ok_label), cond]);
        let loc = self.ast.get(id).location.clone();
        self.gen_error(id, format!("assertion failed at {loc}"));
        self.bind_label(ok_label);
    }

    fn gen_print(&mut self, id: NodeId, args: &[NodeId]) {
        let ops: Vec<Operand> = args.iter().map(|&a| self.gen_expr(a)).collect();
        self.emit(Some(id), Opcode::Print, ops);
    }

    fn gen_raw_syscall(&mut self, id: NodeId, name: &str, args: &[SyscallArg]) {
        let mut syscall_operands = Vec::with_capacity(args.len());
        for a in args {
            let (operand, role) = match a {
                SyscallArg::Return(e) => (self.gen_expr(*e), SyscallRole::Return),
                SyscallArg::Push(e) => (self.gen_expr(*e), SyscallRole::Push),
                SyscallArg::PushRef { value, read_only } => (
                    self.gen_expr(*value),
                    SyscallRole::PushRef {
                        read_only: *read_only,
                    },
                ),
                SyscallArg::PushCRef(e) => (self.gen_expr(*e), SyscallRole::PushCRef),
            };
            syscall_operands.push(SyscallOperand { operand, role });
        }
        let instr_id = self.emit(Some(id), Opcode::Syscall, vec![]);
        let instr = self.instrs.get_mut(instr_id);
        instr.syscall_name = Some(name.to_string());
        instr.syscall_operands = syscall_operands;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::expr::ExprKind;
    use crate::ast::{Ast, NodeKind};
    use crate::symbol::{Storage, Symbol, SymbolCategory, SymbolTable, VariableSymbol};
    use crate::types::data::{DataType, PrimitiveType};
    use crate::types::SecurityType;
    use std::collections::HashMap;

    fn loc() -> crate::location::SourceLocation {
        crate::location::SourceLocation::synthetic()
    }

    #[test]
    fn if_without_else_binds_false_label_after_then_branch() {
        let mut ast = Ast::new();
        let mut symtab = SymbolTable::new();
        let bool_ty = Type::bool_scalar_public();
        let cond_sym = symtab
            .declare(SymbolCategory::Variable, "c", |id| {
                Symbol::Variable(VariableSymbol {
                    id,
                    name: "c".into(),
                    ty: bool_ty,
                    storage: Storage::Local,
                    parent: None,
                    dims: Vec::new(),
                    size: None,
                    fields: Vec::new(),
                })
            })
            .unwrap();
        let cond = ast.alloc(loc(), NodeKind::Expr(ExprKind::Variable(cond_sym)));
        ast.set_result_type(cond, bool_ty);
        let then_branch = ast.alloc(loc(), NodeKind::Stmt(StmtKind::Compound(Vec::new())));
        let if_stmt = ast.alloc(
            loc(),
            NodeKind::Stmt(StmtKind::If {
                cond,
                then_branch,
                else_branch: None,
            }),
        );

        let call_targets = HashMap::new();
        let var_symbols = HashMap::new();
        let mut gen = Generator::new(&ast, &mut symtab, &call_targets, &var_symbols);
        gen.scopes.push(Vec::new());
        gen.gen_stmt(if_stmt);
        let opcodes: Vec<Opcode> = gen
            .instrs
            .order()
            .iter()
            .map(|&id| gen.instrs.get(id).opcode)
            .collect();
        assert_eq!(opcodes, vec![Opcode::Jf]);
        let jf = gen.instrs.get(gen.instrs.order()[0]);
        let label = match jf.operands[0] {
            Operand::Symbol(s) => s,
            _ => panic!("expected a label operand"),
        };
        assert_eq!(
            symtab.label_target(label),
            Some(crate::symbol::LabelTarget::Instruction(1))
        );
    }

    #[test]
    fn while_loop_jumps_back_to_condition() {
        let mut ast = Ast::new();
        let mut symtab = SymbolTable::new();
        let bool_ty = Type::bool_scalar_public();
        let cond_sym = symtab
            .declare(SymbolCategory::Variable, "c", |id| {
                Symbol::Variable(VariableSymbol {
                    id,
                    name: "c".into(),
                    ty: bool_ty,
                    storage: Storage::Local,
                    parent: None,
                    dims: Vec::new(),
                    size: None,
                    fields: Vec::new(),
                })
            })
            .unwrap();
        let cond = ast.alloc(loc(), NodeKind::Expr(ExprKind::Variable(cond_sym)));
        ast.set_result_type(cond, bool_ty);
        let body = ast.alloc(loc(), NodeKind::Stmt(StmtKind::Compound(Vec::new())));
        let while_stmt = ast.alloc(loc(), NodeKind::Stmt(StmtKind::While { cond, body }));

        let call_targets = HashMap::new();
        let var_symbols = HashMap::new();
        let mut gen = Generator::new(&ast, &mut symtab, &call_targets, &var_symbols);
        gen.scopes.push(Vec::new());
        gen.gen_stmt(while_stmt);
        let opcodes: Vec<Opcode> = gen
            .instrs
            .order()
            .iter()
            .map(|&id| gen.instrs.get(id).opcode)
            .collect();
        assert_eq!(opcodes, vec![Opcode::Jf, Opcode::Jump]);
    }
}
