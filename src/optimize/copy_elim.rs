//! Redundant copy elimination, grounded on
//! `original_source/src/libscc/optimizer/CopyElimination.cpp` and
//! `analysis/LiveMemory.cpp`'s `deadCopies`/`isRedundantCopy`.

use std::collections::{HashMap, HashSet};

use crate::analyses::{self, live_memory, LiveMemory, MemDomain};
use crate::cfg::{BlockId, Program};
use crate::dataflow::AnalysisCtx;
use crate::ir::{InstrId, InstrList, Opcode, Operand};
use crate::symbol::{SymbolId, SymbolTable};

/// `isRedundantCopy`: a `COPY dest, src` is redundant if `src`'s memory is
/// dead, `dest` is never read again, or neither side is ever written again
/// (both are then equally good read-only aliases).
fn is_redundant_copy(dest: MemDomain, src: MemDomain) -> bool {
    if matches!(src, MemDomain::Dead) {
        return true;
    }
    if !dest.has_read() {
        return true;
    }
    if !dest.has_write() && !src.has_write() {
        return true;
    }
    false
}

/// `getUses`: reaching uses just after `stop` executes, found by replaying
/// `ReachableUses` backward from the block's exit to (not including) `stop`.
fn uses_after(ctx: &AnalysisCtx, block: BlockId, stop: InstrId, exit: &analyses::reachable::ReachableFact) -> analyses::reachable::ReachableFact {
    let mut facts = exit.clone();
    for &id in ctx.program.block(block).instructions.iter().rev() {
        if id == stop {
            break;
        }
        let instr = ctx.instrs.get(id);
        analyses::reachable::step_uses(ctx, id, instr, &mut facts);
    }
    facts
}

pub(crate) fn eliminate_redundant_copies(program: &mut Program, instrs: &mut InstrList, symtab: &SymbolTable) -> usize {
    let (dead_copies, dead_releases, rewrites) = {
        let ctx = AnalysisCtx { program: &*program, instrs: &*instrs, symtab };
        let mut lmem = LiveMemory::default();
        let lmem_results = crate::dataflow::run_sequential(&ctx, &mut lmem);
        let mut ru = analyses::ReachableUses::default();
        let ru_results = crate::dataflow::run_sequential(&ctx, &mut ru);

        let mut dead_copies: HashSet<InstrId> = HashSet::new();
        let mut copy_block: HashMap<InstrId, BlockId> = HashMap::new();

        for b in program.reachable_blocks() {
            let mut facts = lmem_results.out[&b].clone();
            for &id in program.block(b).instructions.iter().rev() {
                let instr = ctx.instrs.get(id);
                if instr.opcode == Opcode::Copy {
                    if let (Some(&Operand::Symbol(dest)), Some(&Operand::Symbol(src))) = (instr.operands.first(), instr.operands.get(1)) {
                        let dest_dom = facts.get(&dest).copied().unwrap_or(MemDomain::Dead);
                        let src_dom = facts.get(&src).copied().unwrap_or(MemDomain::Dead);
                        if is_redundant_copy(dest_dom, src_dom) {
                            dead_copies.insert(id);
                            copy_block.insert(id, b);
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

        // Order matches each copy's position so that the "uses after"
        // snapshot taken below reflects source positions, not arena order.
        let mut copies: Vec<InstrId> = dead_copies.iter().copied().collect();
        copies.sort_by_key(|&id| {
            let b = copy_block[&id];
            let block = program.block(b);
            let pos = block.instructions.iter().position(|&x| x == id).unwrap_or(0);
            (block.dfn, pos)
        });

        let mut after_maps: HashMap<InstrId, analyses::reachable::ReachableFact> = HashMap::new();
        for &id in &copies {
            let b = copy_block[&id];
            let exit = &ru_results.out[&b];
            after_maps.insert(id, uses_after(&ctx, b, id, exit));
        }

        let dest_src = |id: InstrId| -> Option<(SymbolId, SymbolId)> {
            let instr = ctx.instrs.get(id);
            match (instr.operands.first(), instr.operands.get(1)) {
                (Some(&Operand::Symbol(d)), Some(&Operand::Symbol(s))) => Some((d, s)),
                _ => None,
            }
        };

        let mut dead_releases: HashSet<InstrId> = HashSet::new();
        for &id in &copies {
            let Some((dest, src)) = dest_src(id) else { continue };
            let after = &after_maps[&id];
            for sym in [dest, src] {
                if let Some(uses) = after.get(&sym) {
                    for &use_id in uses {
                        if ctx.instrs.get(use_id).opcode == Opcode::Release {
                            dead_releases.insert(use_id);
                        }
                    }
                }
            }
        }

        let mut rewrites: HashMap<InstrId, Vec<(usize, SymbolId)>> = HashMap::new();
        for &id in &copies {
            let Some((dest, src)) = dest_src(id) else { continue };
            let after = &after_maps[&id];
            if let Some(uses) = after.get(&dest) {
                for &use_id in uses {
                    let use_instr = ctx.instrs.get(use_id);
                    if use_instr.opcode == Opcode::Release {
                        continue;
                    }
                    for (i, &op) in use_instr.operands.iter().enumerate() {
                        if op == Operand::Symbol(dest) {
                            rewrites.entry(use_id).or_default().push((i, src));
                        }
                    }
                }
            }
        }

        (dead_copies, dead_releases, rewrites)
    };

    for (id, edits) in rewrites {
        let instr = instrs.get_mut(id);
        for (i, src) in edits {
            instr.operands[i] = Operand::Symbol(src);
        }
    }

    let mut dead = dead_copies;
    dead.extend(dead_releases);
    super::remove_instructions(program, &dead)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cfg::ProcBoundary;
    use crate::ir::Instruction;
    use crate::symbol::{Storage, Symbol, VariableSymbol};
    use crate::types::data::{DataType, PrimitiveType};
    use crate::types::{SecurityType, Type};

    fn array_var(symtab: &mut SymbolTable, name: &str) -> SymbolId {
        let uint_ty = Type::new(SecurityType::Public, DataType::Primitive(PrimitiveType::UInt64), 0);
        let ty = Type::new(SecurityType::Public, DataType::Primitive(PrimitiveType::Int64), 1);
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
    fn copy_never_read_after_is_removed() {
        let mut symtab = SymbolTable::new();
        let mut instrs = InstrList::new();
        let a = array_var(&mut symtab, "a");
        let b = array_var(&mut symtab, "b");

        instrs.push(Instruction::new(Opcode::Declare, vec![Operand::Symbol(a)]));
        instrs.push(Instruction::new(Opcode::Declare, vec![Operand::Symbol(b)]));
        instrs.push(Instruction::new(Opcode::Copy, vec![Operand::Symbol(b), Operand::Symbol(a)]));
        instrs.push(Instruction::new(Opcode::Release, vec![Operand::Symbol(b)]));
        instrs.push(Instruction::new(Opcode::Release, vec![Operand::Symbol(a)]));
        instrs.push(Instruction::new(Opcode::End, vec![]));

        let mut program = crate::cfg::build(&instrs, &[ProcBoundary { symbol: None, start: 0 }], &symtab);
        let removed = eliminate_redundant_copies(&mut program, &mut instrs, &symtab);
        assert!(removed > 0);
    }
}
