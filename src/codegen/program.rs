//! Top-level code generation driver, grounded on `original_source/src/
//! libscc/codegen/Program.cpp`'s `CodeGen::cgProgram`/`cgProcDef`: walk the
//! module's declarations once for globals, once for ordinary procedures,
//! then lower every template instance the type checker produced.

use std::collections::HashMap;

use crate::ast::{Ast, DeclKind, NodeId};
use crate::cfg::ProcBoundary;
use crate::instantiate::{Instantiator, PendingInstance};
use crate::ir::Opcode;
use crate::symbol::{Symbol, SymbolId, SymbolTable};

use super::{GeneratedProgram, Generator};

/// Lowers a fully type-checked module (and every instance drained into
/// `instantiator`) into a flat instruction stream with procedure
/// boundaries, ready for `cfg::build`.
pub fn generate(
    ast: &Ast,
    symtab: &mut SymbolTable,
    call_targets: &HashMap<NodeId, SymbolId>,
    proc_symbols: &HashMap<NodeId, SymbolId>,
    var_symbols: &HashMap<NodeId, SymbolId>,
    instantiator: &Instantiator,
    root: NodeId,
) -> GeneratedProgram {
    let mut gen = Generator::new(ast, symtab, call_targets, var_symbols);

    gen.boundaries.push(ProcBoundary {
        symbol: None,
        start: 0,
    });
    gen.gen_module_globals(root);
    gen.emit(None, Opcode::End, vec![]);

    gen.gen_module_procs(root, proc_symbols);

    for pending in instantiator.generated_instances() {
        gen.gen_instance(pending);
    }

    gen.patch_pending_calls();

    GeneratedProgram {
        instrs: gen.instrs,
        boundaries: gen.boundaries,
    }
}

impl<'a> Generator<'a> {
    fn gen_module_globals(&mut self, root: NodeId) {
        let items = match self.ast.decl(root) {
            DeclKind::Module { items, .. } => items.clone(),
            _ => return,
        };
        for item in items {
            if let DeclKind::Var { .. } = self.ast.decl(item) {
                self.gen_local_decl(item);
            }
        }
    }

    fn gen_module_procs(&mut self, root: NodeId, proc_symbols: &HashMap<NodeId, SymbolId>) {
        let items = match self.ast.decl(root) {
            DeclKind::Module { items, .. } => items.clone(),
            _ => return,
        };
        for item in items {
            let body = match self.ast.decl(item) {
                DeclKind::Proc { body, .. } => Some(*body),
                DeclKind::Operator { body, .. } => Some(*body),
                DeclKind::Cast { body, .. } => Some(*body),
                _ => None,
            };
            if let Some(body) = body {
                if let Some(&symbol) = proc_symbols.get(&item) {
                    self.gen_proc_body(symbol, body);
                }
            }
        }
    }

    fn gen_instance(&mut self, pending: &PendingInstance) {
        let body = match self.ast.decl(pending.body) {
            DeclKind::Proc { body, .. } => *body,
            DeclKind::Operator { body, .. } => *body,
            DeclKind::Cast { body, .. } => *body,
            _ => panic!("a template instance's body is always a Proc/Operator/Cast declaration"),
        };
        self.gen_proc_body(pending.proc_symbol, body);
    }

    /// Emits one procedure: `DECLARE` for every parameter, the body, then an
    /// unconditional trailing `RELEASE`-the-parameters-then-`RETURN`. The
    /// trailing `RETURN` is emitted even when every control path inside the
    /// body already returns; any code that follows becomes an unreachable
    /// block that `cfg::build`'s reachability pass marks and excludes from
    /// analyses, which is cheaper than proving the body always returns.
    fn gen_proc_body(&mut self, symbol: SymbolId, body: NodeId) {
        self.boundaries.push(ProcBoundary {
            symbol: Some(symbol),
            start: self.instrs.len(),
        });
        let param_syms = match self.symtab.get(symbol) {
            Symbol::Procedure(p) => p.params.clone(),
            _ => Vec::new(),
        };
        for &p in &param_syms {
            self.emit(None, Opcode::Declare, vec![crate::ir::Operand::Symbol(p)]);
        }
        self.loops.clear();
        self.scopes.push(param_syms);
        self.gen_stmt(body);
        let locals = self.scopes.pop().unwrap();
        for sym in locals.into_iter().rev() {
            self.emit(None, Opcode::Release, vec![crate::ir::Operand::Symbol(sym)]);
        }
        self.emit(None, Opcode::Return, vec![]);
    }

    fn patch_pending_calls(&mut self) {
        let pending = std::mem::take(&mut self.pending_calls);
        for (instr_id, callee) in pending {
            self.instrs.get_mut(instr_id).call_callee = Some(callee);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::expr::{ExprKind, Literal as AstLiteral};
    use crate::ast::ty::TypeExpr;
    use crate::ast::{NodeKind, StmtKind};
    use crate::symbol::{ProcedureSymbol, Storage, SymbolCategory, VariableSymbol};
    use crate::types::data::{DataType, PrimitiveType};
    use crate::types::SecurityType;
    use crate::types::Type;

    fn loc() -> crate::location::SourceLocation {
        crate::location::SourceLocation::synthetic()
    }

    #[test]
    fn straight_line_global_var_then_end() {
        let mut ast = Ast::new();
        let mut symtab = SymbolTable::new();
        let i64_ty = Type::new(SecurityType::Public, DataType::Primitive(PrimitiveType::Int64), 0);

        let x = symtab
            .declare(SymbolCategory::Variable, "x", |id| {
                Symbol::Variable(VariableSymbol {
                    id,
                    name: "x".into(),
                    ty: i64_ty,
                    storage: Storage::Global,
                    parent: None,
                    dims: Vec::new(),
                    size: None,
                    fields: Vec::new(),
                })
            })
            .unwrap();

        let init = ast.alloc(loc(), NodeKind::Expr(ExprKind::Literal(AstLiteral::Int(3))));
        ast.set_result_type(init, i64_ty);
        let var_decl = ast.alloc(
            loc(),
            NodeKind::Decl(DeclKind::Var {
                name: "x".into(),
                ty: TypeExpr::scalar_public("int64"),
                dims: Vec::new(),
                init: Some(init),
            }),
        );
        let root = ast.alloc(
            loc(),
            NodeKind::Decl(DeclKind::Module {
                name: None,
                imports: Vec::new(),
                items: vec![var_decl],
            }),
        );

        let call_targets = HashMap::new();
        let proc_symbols = HashMap::new();
        let mut var_symbols = HashMap::new();
        var_symbols.insert(var_decl, x);

        let instantiator = Instantiator::new();
        let program = generate(
            &ast,
            &mut symtab,
            &call_targets,
            &proc_symbols,
            &var_symbols,
            &instantiator,
            root,
        );

        let opcodes: Vec<Opcode> = program
            .instrs
            .order()
            .iter()
            .map(|&id| program.instrs.get(id).opcode)
            .collect();
        assert_eq!(opcodes, vec![Opcode::Declare, Opcode::Assign, Opcode::End]);
        assert_eq!(program.boundaries.len(), 1);
        assert_eq!(program.boundaries[0].symbol, None);
    }

    #[test]
    fn procedure_gets_its_own_boundary_and_trailing_return() {
        let mut ast = Ast::new();
        let mut symtab = SymbolTable::new();
        let void_ty = Type::void();

        let body = ast.alloc(loc(), NodeKind::Stmt(StmtKind::Compound(Vec::new())));
        let proc_decl = ast.alloc(
            loc(),
            NodeKind::Decl(DeclKind::Proc {
                name: "f".into(),
                params: Vec::new(),
                ret: TypeExpr::scalar_public("void"),
                body,
            }),
        );
        let root = ast.alloc(
            loc(),
            NodeKind::Decl(DeclKind::Module {
                name: None,
                imports: Vec::new(),
                items: vec![proc_decl],
            }),
        );

        let proc_sym = symtab
            .declare(SymbolCategory::Procedure, "f", |id| {
                Symbol::Procedure(ProcedureSymbol {
                    id,
                    name: "f".into(),
                    params: Vec::new(),
                    ret: void_ty,
                    operator: None,
                })
            })
            .unwrap();

        let call_targets = HashMap::new();
        let mut proc_symbols = HashMap::new();
        proc_symbols.insert(proc_decl, proc_sym);
        let var_symbols = HashMap::new();

        let instantiator = Instantiator::new();
        let program = generate(
            &ast,
            &mut symtab,
            &call_targets,
            &proc_symbols,
            &var_symbols,
            &instantiator,
            root,
        );

        assert_eq!(program.boundaries.len(), 2);
        assert_eq!(program.boundaries[1].symbol, Some(proc_sym));
        let last = program.instrs.order().last().copied().unwrap();
        assert_eq!(program.instrs.get(last).opcode, Opcode::Return);
    }
}
