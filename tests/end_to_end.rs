//! End-to-end scenarios (spec.md §8). No parser is in scope here, so each
//! scenario is expressed as the IR/CFG a correct code generator would have
//! produced for the quoted source, built by hand the way
//! `original_source`'s own `TypeChecker.cpp`/`Blocks.cpp` tests do.

use std::collections::HashMap;

use secrec_core::ast::expr::ExprKind;
use secrec_core::ast::{Ast, DeclKind, NodeKind, StmtKind};
use secrec_core::cfg::{self, ProcBoundary};
use secrec_core::codegen::generate;
use secrec_core::instantiate::Instantiator;
use secrec_core::ir::{InstrList, Instruction, Literal, Opcode, Operand, SyscallOperand, SyscallRole};
use secrec_core::optimize::{optimize, OptimizeOptions};
use secrec_core::symbol::{ProcedureSymbol, Storage, Symbol, SymbolCategory, SymbolTable, VariableSymbol};
use secrec_core::types::data::{DataType, PrimitiveType};
use secrec_core::types::{SecurityType, Type};

fn loc() -> secrec_core::location::SourceLocation {
    secrec_core::location::SourceLocation::synthetic()
}

fn int_ty() -> Type {
    Type::new(SecurityType::Public, DataType::Primitive(PrimitiveType::Int64), 0)
}

/// S1: `void main() { int x = 1 + 2; }` — constant folding replaces the
/// expression with a literal, dead-variable elimination then removes `x`;
/// the body ends up empty except for END.
#[test]
fn s1_unused_constant_expression_optimizes_to_empty_body() {
    let mut symtab = SymbolTable::new();
    let mut instrs = InstrList::new();
    let x = symtab.new_temporary(int_ty());

    instrs.push(Instruction::new(Opcode::Declare, vec![Operand::Symbol(x)]));
    instrs.push(Instruction::new(
        Opcode::Add,
        vec![Operand::Symbol(x), Operand::Literal(Literal::int(1, PrimitiveType::Int64)), Operand::Literal(Literal::int(2, PrimitiveType::Int64))],
    ));
    instrs.push(Instruction::new(Opcode::End, vec![]));

    let mut program = cfg::build(&instrs, &[ProcBoundary { symbol: None, start: 0 }], &symtab);
    optimize(&mut program, &mut instrs, &mut symtab, &OptimizeOptions::default());

    let entry = program.entry_proc();
    let entry_block = program.proc(entry).entry.unwrap();
    let remaining: Vec<Opcode> = program.block(entry_block).instructions.iter().map(|&id| instrs.get(id).opcode).collect();
    assert_eq!(remaining, vec![Opcode::End], "unused x and its folded expression should both be gone");
}

fn array_ty() -> Type {
    Type::new(SecurityType::Public, DataType::Primitive(PrimitiveType::Int64), 1)
}

/// S5: `int[] a(10); a[3] = 7; a[3] = 9;` with `a` never read afterwards.
/// Live-memory tracking is per-symbol, not per-index (`original_source`'s
/// `LiveMemory.cpp` only ever `gen`s `Write` on `STORE`, never `kill`s), so
/// there's no way to tell which of the two stores "wins" — both are equally
/// unobserved and both are eliminated.
#[test]
fn s5_stores_to_a_never_read_array_are_eliminated() {
    let mut symtab = SymbolTable::new();
    let mut instrs = InstrList::new();
    let a = symtab.new_temporary(array_ty());

    instrs.push(Instruction::new(Opcode::Declare, vec![Operand::Symbol(a)]));
    instrs.push(Instruction::new(
        Opcode::Store,
        vec![Operand::Symbol(a), Operand::Literal(Literal::int(3, PrimitiveType::Int64)), Operand::Literal(Literal::int(7, PrimitiveType::Int64))],
    ));
    instrs.push(Instruction::new(
        Opcode::Store,
        vec![Operand::Symbol(a), Operand::Literal(Literal::int(3, PrimitiveType::Int64)), Operand::Literal(Literal::int(9, PrimitiveType::Int64))],
    ));
    instrs.push(Instruction::new(Opcode::Release, vec![Operand::Symbol(a)]));
    instrs.push(Instruction::new(Opcode::End, vec![]));

    let mut program = cfg::build(&instrs, &[ProcBoundary { symbol: None, start: 0 }], &symtab);
    optimize(&mut program, &mut instrs, &mut symtab, &OptimizeOptions::default());

    let entry = program.entry_proc();
    let entry_block = program.proc(entry).entry.unwrap();
    let stores: Vec<_> = program.block(entry_block).instructions.iter().filter(|&&id| instrs.get(id).opcode == Opcode::Store).collect();
    assert!(stores.is_empty(), "neither store is ever read, so both are dead");
}

/// A store followed by a read of the same array survives: the read sets the
/// array's facts to `Read` and nothing after it can clear that bit going
/// backwards, so the store feeding it is kept (conservatively: so is any
/// earlier store to the same array, since per-symbol tracking can't tell
/// them apart).
#[test]
fn s5_store_feeding_a_later_read_survives() {
    let mut symtab = SymbolTable::new();
    let mut instrs = InstrList::new();
    let a = symtab.new_temporary(array_ty());
    let out = symtab.new_temporary(int_ty());

    instrs.push(Instruction::new(Opcode::Declare, vec![Operand::Symbol(a)]));
    instrs.push(Instruction::new(
        Opcode::Store,
        vec![Operand::Symbol(a), Operand::Literal(Literal::int(3, PrimitiveType::Int64)), Operand::Literal(Literal::int(9, PrimitiveType::Int64))],
    ));
    instrs.push(Instruction::new(Opcode::Declare, vec![Operand::Symbol(out)]));
    instrs.push(Instruction::new(
        Opcode::Load,
        vec![Operand::Symbol(out), Operand::Symbol(a), Operand::Literal(Literal::int(3, PrimitiveType::Int64))],
    ));
    instrs.push(Instruction::new(Opcode::Print, vec![Operand::Symbol(out)]));
    instrs.push(Instruction::new(Opcode::Release, vec![Operand::Symbol(out)]));
    instrs.push(Instruction::new(Opcode::Release, vec![Operand::Symbol(a)]));
    instrs.push(Instruction::new(Opcode::End, vec![]));

    let mut program = cfg::build(&instrs, &[ProcBoundary { symbol: None, start: 0 }], &symtab);
    optimize(&mut program, &mut instrs, &mut symtab, &OptimizeOptions::default());

    let entry = program.entry_proc();
    let entry_block = program.proc(entry).entry.unwrap();
    let stores = program.block(entry_block).instructions.iter().filter(|&&id| instrs.get(id).opcode == Opcode::Store).count();
    assert_eq!(stores, 1);
}

/// Property 6: the set of externally observable syscalls emitted is
/// invariant across optimization levels. Surrounding dead code and a
/// foldable constant are optimized away, but the syscall itself, its name
/// and its operands survive unchanged.
#[test]
fn property6_syscall_sequence_is_preserved_across_optimization() {
    let mut symtab = SymbolTable::new();
    let mut instrs = InstrList::new();
    let unused = symtab.new_temporary(int_ty());
    let arg = symtab.new_temporary(int_ty());

    instrs.push(Instruction::new(Opcode::Declare, vec![Operand::Symbol(unused)]));
    instrs.push(Instruction::new(
        Opcode::Add,
        vec![Operand::Symbol(unused), Operand::Literal(Literal::int(4, PrimitiveType::Int64)), Operand::Literal(Literal::int(5, PrimitiveType::Int64))],
    ));
    instrs.push(Instruction::new(Opcode::Declare, vec![Operand::Symbol(arg)]));
    instrs.push(Instruction::new(Opcode::Assign, vec![Operand::Symbol(arg), Operand::Literal(Literal::int(7, PrimitiveType::Int64))]));

    let mut syscall = Instruction::new(Opcode::Syscall, vec![]);
    syscall.syscall_name = Some("shared3p::mul_int64_vec".to_string());
    syscall.syscall_operands = vec![SyscallOperand { operand: Operand::Symbol(arg), role: SyscallRole::PushRef { read_only: true } }];
    instrs.push(syscall);

    instrs.push(Instruction::new(Opcode::Release, vec![Operand::Symbol(arg)]));
    instrs.push(Instruction::new(Opcode::End, vec![]));

    let mut program = cfg::build(&instrs, &[ProcBoundary { symbol: None, start: 0 }], &symtab);

    let before: Vec<_> = instrs
        .order()
        .iter()
        .map(|&id| instrs.get(id))
        .filter(|instr| instr.opcode == Opcode::Syscall)
        .map(|instr| (instr.syscall_name.clone(), instr.syscall_operands.clone()))
        .collect();
    assert_eq!(before.len(), 1);

    optimize(&mut program, &mut instrs, &mut symtab, &OptimizeOptions::default());

    let entry = program.entry_proc();
    let entry_block = program.proc(entry).entry.unwrap();
    let after: Vec<_> = program
        .block(entry_block)
        .instructions
        .iter()
        .map(|&id| instrs.get(id))
        .filter(|instr| instr.opcode == Opcode::Syscall)
        .map(|instr| (instr.syscall_name.clone(), instr.syscall_operands.clone()))
        .collect();

    assert_eq!(before, after, "the optimizer must never change a syscall's name or operand sequence");
}

fn array_var(symtab: &mut SymbolTable, name: &str, rank: usize) -> secrec_core::symbol::SymbolId {
    let uint_ty = Type::new(SecurityType::Public, DataType::Primitive(PrimitiveType::UInt64), 0);
    let ty = Type::new(SecurityType::Public, DataType::Primitive(PrimitiveType::Int64), 1);
    let dims = (0..rank).map(|_| symtab.new_temporary(uint_ty)).collect();
    symtab
        .declare(SymbolCategory::Variable, name, |id| {
            Symbol::Variable(VariableSymbol {
                id,
                name: name.into(),
                ty,
                storage: Storage::Local,
                parent: None,
                dims,
                size: None,
                fields: Vec::new(),
            })
        })
        .unwrap()
}

/// S4: assigning one already-shaped array into another of the same rank
/// gets a per-axis `NE` shape check ahead of the `COPY`, jumping to an
/// `ERROR` that carries the assignment's source location.
#[test]
fn s4_whole_array_assignment_gets_a_shape_check() {
    let mut ast = Ast::new();
    let mut symtab = SymbolTable::new();
    let array_ty = Type::new(SecurityType::Public, DataType::Primitive(PrimitiveType::Int64), 1);

    let a = array_var(&mut symtab, "a", 2);
    let b = array_var(&mut symtab, "b", 2);

    let lvalue = ast.alloc(loc(), NodeKind::Expr(ExprKind::Variable(a)));
    ast.set_result_type(lvalue, array_ty);
    let value = ast.alloc(loc(), NodeKind::Expr(ExprKind::Variable(b)));
    ast.set_result_type(value, array_ty);
    let assign = ast.alloc(
        loc(),
        NodeKind::Expr(ExprKind::Assign { lvalue, op: None, value }),
    );
    ast.set_result_type(assign, array_ty);

    let expr_stmt = ast.alloc(loc(), NodeKind::Stmt(StmtKind::Expr(assign)));
    let body = ast.alloc(loc(), NodeKind::Stmt(StmtKind::Compound(vec![expr_stmt])));
    let proc_decl = ast.alloc(
        loc(),
        NodeKind::Decl(DeclKind::Proc {
            name: "main".into(),
            params: Vec::new(),
            ret: secrec_core::ast::ty::TypeExpr::scalar_public("void"),
            body,
        }),
    );
    let root = ast.alloc(
        loc(),
        NodeKind::Decl(DeclKind::Module { name: None, imports: Vec::new(), items: vec![proc_decl] }),
    );

    let proc_sym = symtab
        .declare(SymbolCategory::Procedure, "main", |id| {
            Symbol::Procedure(ProcedureSymbol { id, name: "main".into(), params: Vec::new(), ret: Type::void(), operator: None })
        })
        .unwrap();

    let call_targets = HashMap::new();
    let mut proc_symbols = HashMap::new();
    proc_symbols.insert(proc_decl, proc_sym);
    let var_symbols = HashMap::new();
    let instantiator = Instantiator::new();

    let program = generate(&ast, &mut symtab, &call_targets, &proc_symbols, &var_symbols, &instantiator, root);

    let opcodes: Vec<Opcode> = program.instrs.order().iter().map(|&id| program.instrs.get(id).opcode).collect();
    assert_eq!(opcodes.iter().filter(|&&op| op == Opcode::Ne).count(), 2, "one NE per axis");
    assert!(opcodes.contains(&Opcode::Error));
    assert!(opcodes.contains(&Opcode::Copy), "the assignment itself still lowers to a COPY");

    let error_instr = program
        .instrs
        .order()
        .iter()
        .map(|&id| program.instrs.get(id))
        .find(|instr| instr.opcode == Opcode::Error)
        .unwrap();
    let message = error_instr.error_message.as_ref().expect("ERROR carries a message");
    assert!(message.contains("shape mismatch"));
    assert!(message.contains("<synthetic>"), "message carries the assignment's source location");
}

/// S6: `if (p && q()) then_branch; else else_branch;` with `p` a public bool
/// and `q()` a procedure call with a side effect. The false path out of `p`
/// must never reach the block holding the call to `q`, and must reach
/// `else_branch`.
#[test]
fn s6_short_circuit_and_skips_the_call_on_the_false_path() {
    let mut ast = Ast::new();
    let mut symtab = SymbolTable::new();
    let bool_ty = Type::bool_scalar_public();

    // procedure q() : bool { return true; }
    let q_true = ast.alloc(loc(), NodeKind::Expr(ExprKind::Literal(secrec_core::ast::expr::Literal::Bool(true))));
    ast.set_result_type(q_true, bool_ty);
    let q_return = ast.alloc(loc(), NodeKind::Stmt(StmtKind::Return(Some(q_true))));
    let q_body = ast.alloc(loc(), NodeKind::Stmt(StmtKind::Compound(vec![q_return])));
    let q_decl = ast.alloc(
        loc(),
        NodeKind::Decl(DeclKind::Proc {
            name: "q".into(),
            params: Vec::new(),
            ret: secrec_core::ast::ty::TypeExpr::scalar_public("bool"),
            body: q_body,
        }),
    );
    let q_sym = symtab
        .declare(SymbolCategory::Procedure, "q", |id| {
            Symbol::Procedure(ProcedureSymbol { id, name: "q".into(), params: Vec::new(), ret: bool_ty, operator: None })
        })
        .unwrap();

    // procedure main() { bool p; if (p && q()) print("then"); else print("else"); }
    let p = symtab
        .declare(SymbolCategory::Variable, "p", |id| {
            Symbol::Variable(VariableSymbol {
                id,
                name: "p".into(),
                ty: bool_ty,
                storage: Storage::Local,
                parent: None,
                dims: Vec::new(),
                size: None,
                fields: Vec::new(),
            })
        })
        .unwrap();
    let p_ref = ast.alloc(loc(), NodeKind::Expr(ExprKind::Variable(p)));
    ast.set_result_type(p_ref, bool_ty);

    let call = ast.alloc(loc(), NodeKind::Expr(ExprKind::Call { callee: "q".into(), args: Vec::new() }));
    ast.set_result_type(call, bool_ty);

    let and_expr = ast.alloc(
        loc(),
        NodeKind::Expr(ExprKind::Binary { op: secrec_core::ast::BinaryOp::And, lhs: p_ref, rhs: call }),
    );
    ast.set_result_type(and_expr, bool_ty);

    let then_lit = ast.alloc(loc(), NodeKind::Expr(ExprKind::Literal(secrec_core::ast::expr::Literal::Bool(true))));
    ast.set_result_type(then_lit, bool_ty);
    let then_stmt = ast.alloc(loc(), NodeKind::Stmt(StmtKind::Print(vec![then_lit])));
    let else_lit = ast.alloc(loc(), NodeKind::Expr(ExprKind::Literal(secrec_core::ast::expr::Literal::Bool(false))));
    ast.set_result_type(else_lit, bool_ty);
    let else_stmt = ast.alloc(loc(), NodeKind::Stmt(StmtKind::Print(vec![else_lit])));

    let if_stmt = ast.alloc(
        loc(),
        NodeKind::Stmt(StmtKind::If { cond: and_expr, then_branch: then_stmt, else_branch: Some(else_stmt) }),
    );
    let body = ast.alloc(loc(), NodeKind::Stmt(StmtKind::Compound(vec![if_stmt])));
    let main_decl = ast.alloc(
        loc(),
        NodeKind::Decl(DeclKind::Proc {
            name: "main".into(),
            params: Vec::new(),
            ret: secrec_core::ast::ty::TypeExpr::scalar_public("void"),
            body,
        }),
    );
    let main_sym = symtab
        .declare(SymbolCategory::Procedure, "main", |id| {
            Symbol::Procedure(ProcedureSymbol { id, name: "main".into(), params: Vec::new(), ret: Type::void(), operator: None })
        })
        .unwrap();

    let root = ast.alloc(
        loc(),
        NodeKind::Decl(DeclKind::Module { name: None, imports: Vec::new(), items: vec![q_decl, main_decl] }),
    );

    let mut call_targets = HashMap::new();
    call_targets.insert(call, q_sym);
    let mut proc_symbols = HashMap::new();
    proc_symbols.insert(q_decl, q_sym);
    proc_symbols.insert(main_decl, main_sym);
    let var_symbols = HashMap::new();
    let instantiator = Instantiator::new();

    let generated = generate(&ast, &mut symtab, &call_targets, &proc_symbols, &var_symbols, &instantiator, root);
    let program = cfg::build(&generated.instrs, &generated.boundaries, &symtab);

    let main_proc = program
        .proc_order
        .iter()
        .copied()
        .find(|&p| program.proc(p).symbol == Some(main_sym))
        .expect("main's procedure is in the program");
    let entry_block = program.proc(main_proc).entry.unwrap();

    let contains_call = |b: secrec_core::cfg::BlockId| {
        program
            .block(b)
            .instructions
            .iter()
            .any(|&id| generated.instrs.get(id).opcode == Opcode::Call)
    };

    let false_target = program
        .block(entry_block)
        .out_edges_with(secrec_core::cfg::EdgeLabel::False)
        .next()
        .expect("the cond's Jf gives the entry block a False edge");

    let mut visited = std::collections::HashSet::new();
    let mut stack = vec![false_target];
    let mut reached_else = false;
    while let Some(b) = stack.pop() {
        if !visited.insert(b) {
            continue;
        }
        assert!(!contains_call(b), "the false path out of p must never reach q()'s call block");
        if b == entry_block {
            continue;
        }
        let block = program.block(b);
        let has_print = block.instructions.iter().any(|&id| generated.instrs.get(id).opcode == Opcode::Print);
        if has_print {
            reached_else = true;
        }
        stack.extend(block.local_successors());
    }
    assert!(reached_else, "the false path out of p must reach the else branch's PRINT");
}
