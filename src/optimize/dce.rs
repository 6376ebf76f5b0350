//! Constant folding, dead-variable and dead-memory elimination.
//!
//! Grounded on `original_source/src/libscc/optimizer/ConstantFolding.cpp`,
//! `DeadVariableElimination.cpp`, `DeadStoreElimination.cpp` and
//! `DeadAllocElimination.cpp`: each replays a backward (or, for constant
//! folding, forward) analysis's per-instruction step against the fixed-point
//! facts already computed, deciding in that replay whether an instruction
//! is rewritable or removable.

use std::collections::HashSet;

use crate::analyses::{self, constant_folding, live_memory, ConstValue, ConstantFolding, LiveMemory, LiveVariables, MemDomain};
use crate::cfg::Program;
use crate::dataflow::AnalysisCtx;
use crate::ir::{InstrId, InstrList, Opcode, Operand};
use crate::symbol::{SymbolId, SymbolTable};
use crate::types::SecurityType;

fn dest_security<'a>(symtab: &'a SymbolTable) -> impl Fn(SymbolId) -> Option<SecurityType> + 'a {
    move |sym| symtab.get(sym).ty().map(|t| t.security())
}

/// `eliminateConstantExpressions`: rewrites each instruction whose
/// destination folds to a literal into `ASSIGN dest, literal`, and inlines
/// any still-foldable operand into its literal at every instruction (not
/// just the foldable ones), both spec.md §4.8's "On fixpoint" steps.
pub(crate) fn eliminate_constant_expressions(program: &Program, instrs: &mut InstrList, symtab: &SymbolTable) -> usize {
    // Phase 1 (read-only): replay the fixpoint forward per block, snapshotting
    // the facts in effect just before each instruction runs.
    let snapshots: Vec<(InstrId, constant_folding::ConstFact)> = {
        let ctx = AnalysisCtx { program, instrs: &*instrs, symtab };
        let mut cf = ConstantFolding::default();
        let results = crate::dataflow::run_sequential(&ctx, &mut cf);

        let mut snapshots = Vec::new();
        for b in program.reachable_blocks() {
            let mut facts = results.in_[&b].clone();
            for &id in &program.block(b).instructions {
                snapshots.push((id, facts.clone()));
                constant_folding::step(&ctx, ctx.instrs.get(id), &mut facts);
            }
        }
        snapshots
    };

    // Phase 2: rewrite using the snapshotted facts, no analysis context alive.
    let mut changes = 0;
    for (id, facts) in snapshots {
        let instr = instrs.get(id);
        let rewritten_args: Vec<Operand> = instr
            .args()
            .iter()
            .map(|&op| match op {
                Operand::Symbol(s) => match facts.get(&s) {
                    Some(ConstValue::Constant(lit)) => Operand::Literal(*lit),
                    _ => op,
                },
                Operand::Literal(_) => op,
            })
            .collect();
        if rewritten_args.as_slice() != instr.args() {
            let dest = instr.dest();
            let mut new_operands = Vec::new();
            new_operands.extend(dest);
            new_operands.extend(rewritten_args);
            instrs.get_mut(id).operands = new_operands;
            changes += 1;
        }

        let instr = instrs.get(id);
        if instr.opcode.writes_dest() && instr.opcode != Opcode::Assign {
            if let Some(Operand::Symbol(dest)) = instr.dest() {
                if let Some(ConstValue::Constant(lit)) = facts.get(&dest).copied() {
                    let defines = instr.defs(dest_security(symtab)).contains(&dest);
                    if defines {
                        let mutable = instrs.get_mut(id);
                        mutable.opcode = Opcode::Assign;
                        mutable.operands = vec![Operand::Symbol(dest), Operand::Literal(lit)];
                        changes += 1;
                    }
                }
            }
        }
    }

    changes
}

fn may_eliminate(opcode: Opcode) -> bool {
    !matches!(opcode, Opcode::Call | Opcode::Param | Opcode::Syscall) && opcode.is_expr()
}

/// `eliminateDeadVariables`: an expression-class instruction whose
/// destination is not live past it (and actually defines, i.e. the
/// private-destination-as-use rule doesn't apply) is dropped.
pub(crate) fn eliminate_dead_variables(program: &mut Program, instrs: &InstrList, symtab: &SymbolTable) -> usize {
    let dead: HashSet<InstrId> = {
        let ctx = AnalysisCtx { program: &*program, instrs, symtab };
        let mut lva = LiveVariables::default();
        let results = crate::dataflow::run_sequential(&ctx, &mut lva);

        let mut dead = HashSet::new();
        for b in program.reachable_blocks() {
            let mut live = results.out[&b].clone();
            for &id in program.block(b).instructions.iter().rev() {
                let instr = instrs.get(id);
                let defs = instr.defs(dest_security(symtab));
                if may_eliminate(instr.opcode) && defs.len() == 1 && !live.contains(&defs[0]) {
                    dead.insert(id);
                    continue;
                }
                for d in defs {
                    live.remove(&d);
                }
                for u in instr.uses(dest_security(symtab)) {
                    live.insert(u);
                }
            }
        }
        dead
    };

    super::remove_instructions(program, &dead)
}

/// `eliminateDeadStores` + `eliminateDeadAllocs`: a `STORE` whose
/// destination carries no `Read` bit downstream is dead; an `ALLOC` whose
/// destination is only ever reached by its own paired `RELEASE`s is dead
/// along with those releases.
pub(crate) fn eliminate_dead_memory(program: &mut Program, instrs: &InstrList, symtab: &SymbolTable) -> usize {
    let dead: HashSet<InstrId> = {
        let ctx = AnalysisCtx { program: &*program, instrs, symtab };
        let mut lmem = LiveMemory::default();
        let lmem_results = crate::dataflow::run_sequential(&ctx, &mut lmem);
        let mut ru = analyses::ReachableUses::default();
        let ru_results = crate::dataflow::run_sequential(&ctx, &mut ru);

        let mut dead = HashSet::new();

        for b in program.reachable_blocks() {
            let mut facts = lmem_results.out[&b].clone();
            for &id in program.block(b).instructions.iter().rev() {
                let instr = instrs.get(id);
                if instr.opcode == Opcode::Store {
                    if let Some(&Operand::Symbol(base)) = instr.operands.first() {
                        let reads = facts.get(&base).copied().unwrap_or(MemDomain::Dead).has_read();
                        if !reads {
                            dead.insert(id);
                        }
                    }
                }
                let mut gens = Vec::new();
                let mut kills = Vec::new();
                live_memory::visit(instr, symtab, |s, d| gens.push((s, d)), |s| kills.push(s));
                for s in kills {
                    facts.remove(&s);
                }
                for (s, d) in gens {
                    let entry = facts.entry(s).or_insert(MemDomain::Dead);
                    *entry = entry.join(d);
                }
            }
        }

        for b in program.reachable_blocks() {
            let mut uses = ru_results.out[&b].clone();
            for &id in program.block(b).instructions.iter().rev() {
                let instr = instrs.get(id);
                if instr.opcode == Opcode::Alloc {
                    if let Some(Operand::Symbol(dest)) = instr.dest() {
                        if let Some(reaching) = uses.get(&dest) {
                            let mut only_releases = !reaching.is_empty();
                            let mut releases = Vec::new();
                            for &use_id in reaching {
                                if use_id == id {
                                    continue;
                                }
                                if instrs.get(use_id).opcode == Opcode::Release {
                                    releases.push(use_id);
                                } else {
                                    only_releases = false;
                                }
                            }
                            if only_releases {
                                dead.insert(id);
                                dead.extend(releases);
                            }
                        } else {
                            dead.insert(id);
                        }
                    }
                }
                analyses::reachable::step_uses(&ctx, id, instr, &mut uses);
            }
        }

        dead
    };

    super::remove_instructions(program, &dead)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cfg::ProcBoundary;
    use crate::ir::{Instruction, Literal};
    use crate::symbol::{Storage, Symbol, VariableSymbol};
    use crate::types::data::{DataType, PrimitiveType};
    use crate::types::SecurityType;

    fn int_ty() -> crate::types::Type {
        crate::types::Type::new(SecurityType::Public, DataType::Primitive(PrimitiveType::Int64), 0)
    }

    fn array_var(symtab: &mut SymbolTable, name: &str) -> SymbolId {
        let uint_ty = crate::types::Type::new(SecurityType::Public, DataType::Primitive(PrimitiveType::UInt64), 0);
        let ty = crate::types::Type::new(SecurityType::Public, DataType::Primitive(PrimitiveType::Int64), 1);
        let dim = symtab.new_temporary(uint_ty);
        symtab
            .declare(crate::symbol::SymbolCategory::Variable, name, |id| {
                Symbol::Variable(VariableSymbol {
                    id,
                    name: name.into(),
                    ty,
                    storage: Storage::Local,
                    parent: None,
                    dims: vec![dim],
                    size: Some(dim),
                    fields: Vec::new(),
                })
            })
            .unwrap()
    }

    #[test]
    fn constant_add_folds_into_assign() {
        let mut symtab = SymbolTable::new();
        let mut instrs = InstrList::new();
        let x = symtab.new_temporary(int_ty());
        instrs.push(Instruction::new(Opcode::Declare, vec![Operand::Symbol(x)]));
        instrs.push(Instruction::new(
            Opcode::Add,
            vec![Operand::Symbol(x), Operand::Literal(Literal::int(1, PrimitiveType::Int64)), Operand::Literal(Literal::int(2, PrimitiveType::Int64))],
        ));
        instrs.push(Instruction::new(Opcode::Print, vec![Operand::Symbol(x)]));
        instrs.push(Instruction::new(Opcode::End, vec![]));

        let program = crate::cfg::build(&instrs, &[ProcBoundary { symbol: None, start: 0 }], &symtab);
        let changes = eliminate_constant_expressions(&program, &mut instrs, &symtab);
        assert!(changes > 0);

        let entry = program.entry_proc();
        let entry_block = program.proc(entry).entry.unwrap();
        let ops: Vec<Opcode> = program.block(entry_block).instructions.iter().map(|&id| instrs.get(id).opcode).collect();
        assert!(ops.contains(&Opcode::Assign));
        assert!(!ops.contains(&Opcode::Add));
    }

    #[test]
    fn declare_with_no_later_use_is_dead() {
        let mut symtab = SymbolTable::new();
        let mut instrs = InstrList::new();
        let x = symtab.new_temporary(int_ty());
        let decl = instrs.push(Instruction::new(Opcode::Declare, vec![Operand::Symbol(x)]));
        let assign = instrs.push(Instruction::new(Opcode::Assign, vec![Operand::Symbol(x), Operand::Literal(Literal::int(3, PrimitiveType::Int64))]));
        instrs.push(Instruction::new(Opcode::End, vec![]));

        let mut program = crate::cfg::build(&instrs, &[ProcBoundary { symbol: None, start: 0 }], &symtab);
        let removed = eliminate_dead_variables(&mut program, &instrs, &symtab);
        assert_eq!(removed, 2);

        let entry = program.entry_proc();
        let entry_block = program.proc(entry).entry.unwrap();
        assert!(!program.block(entry_block).instructions.contains(&decl));
        assert!(!program.block(entry_block).instructions.contains(&assign));
    }

    #[test]
    fn declare_still_used_is_kept() {
        let mut symtab = SymbolTable::new();
        let mut instrs = InstrList::new();
        let x = symtab.new_temporary(int_ty());
        let decl = instrs.push(Instruction::new(Opcode::Declare, vec![Operand::Symbol(x)]));
        instrs.push(Instruction::new(Opcode::Assign, vec![Operand::Symbol(x), Operand::Literal(Literal::int(3, PrimitiveType::Int64))]));
        instrs.push(Instruction::new(Opcode::Print, vec![Operand::Symbol(x)]));
        instrs.push(Instruction::new(Opcode::End, vec![]));

        let mut program = crate::cfg::build(&instrs, &[ProcBoundary { symbol: None, start: 0 }], &symtab);
        let removed = eliminate_dead_variables(&mut program, &instrs, &symtab);
        assert_eq!(removed, 0);

        let entry = program.entry_proc();
        let entry_block = program.proc(entry).entry.unwrap();
        assert!(program.block(entry_block).instructions.contains(&decl));
    }

    /// `STORE` only ever `gen`s `Write`, never kills (`live_memory::visit`,
    /// ported from `LiveMemory.cpp`'s `visitImop`), so liveness is tracked
    /// per symbol, not per index: with `a` read nowhere, neither store's
    /// value is ever observed and both are dead.
    #[test]
    fn stores_to_a_never_read_array_are_all_dead() {
        let mut symtab = SymbolTable::new();
        let mut instrs = InstrList::new();
        let a = array_var(&mut symtab, "a");
        instrs.push(Instruction::new(Opcode::Declare, vec![Operand::Symbol(a)]));
        let first = instrs.push(Instruction::new(
            Opcode::Store,
            vec![Operand::Symbol(a), Operand::Literal(Literal::int(0, PrimitiveType::Int64)), Operand::Literal(Literal::int(7, PrimitiveType::Int64))],
        ));
        let second = instrs.push(Instruction::new(
            Opcode::Store,
            vec![Operand::Symbol(a), Operand::Literal(Literal::int(0, PrimitiveType::Int64)), Operand::Literal(Literal::int(9, PrimitiveType::Int64))],
        ));
        instrs.push(Instruction::new(Opcode::Release, vec![Operand::Symbol(a)]));
        instrs.push(Instruction::new(Opcode::End, vec![]));

        let mut program = crate::cfg::build(&instrs, &[ProcBoundary { symbol: None, start: 0 }], &symtab);
        let removed = eliminate_dead_memory(&mut program, &instrs, &symtab);
        assert_eq!(removed, 2);

        let entry = program.entry_proc();
        let entry_block = program.proc(entry).entry.unwrap();
        assert!(!program.block(entry_block).instructions.contains(&first));
        assert!(!program.block(entry_block).instructions.contains(&second));
    }

    /// A later `LOAD` of `a` keeps every preceding `STORE` to it alive: the
    /// per-symbol fact can't distinguish which store the load actually
    /// observes.
    #[test]
    fn store_feeding_a_later_load_is_kept() {
        let mut symtab = SymbolTable::new();
        let mut instrs = InstrList::new();
        let a = array_var(&mut symtab, "a");
        let out = symtab.new_temporary(int_ty());
        instrs.push(Instruction::new(Opcode::Declare, vec![Operand::Symbol(a)]));
        let store = instrs.push(Instruction::new(
            Opcode::Store,
            vec![Operand::Symbol(a), Operand::Literal(Literal::int(0, PrimitiveType::Int64)), Operand::Literal(Literal::int(9, PrimitiveType::Int64))],
        ));
        instrs.push(Instruction::new(Opcode::Declare, vec![Operand::Symbol(out)]));
        instrs.push(Instruction::new(
            Opcode::Load,
            vec![Operand::Symbol(out), Operand::Symbol(a), Operand::Literal(Literal::int(0, PrimitiveType::Int64))],
        ));
        instrs.push(Instruction::new(Opcode::Release, vec![Operand::Symbol(a)]));
        instrs.push(Instruction::new(Opcode::End, vec![]));

        let mut program = crate::cfg::build(&instrs, &[ProcBoundary { symbol: None, start: 0 }], &symtab);
        let removed = eliminate_dead_memory(&mut program, &instrs, &symtab);
        assert_eq!(removed, 0);

        let entry = program.entry_proc();
        let entry_block = program.proc(entry).entry.unwrap();
        assert!(program.block(entry_block).instructions.contains(&store));
    }
}
