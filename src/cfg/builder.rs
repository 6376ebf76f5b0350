//! CFG construction (C7, spec.md §4.6).
//!
//! Grounded on `original_source/src/libscc/Blocks.cpp`'s two-pass
//! algorithm (`Program::init`'s leader-finding loop, `Program::propagate`'s
//! edge installation: `fallsThru` + the CALL/JUMP/JT/JF switch tables) and
//! `Program::numberInstructions`/block depth-first numbering.
//!
//! One simplification from SPEC_FULL.md §4.6a: rather than inferring
//! procedure boundaries purely from opcode shape, the code generator
//! records them explicitly as `ProcBoundary` entries (the "call-destination
//! entry" spec.md §4.6 refers to) since our flat `InstrList` has no
//! standalone marker opcode for "this is where a procedure body begins".

use std::collections::BTreeSet;

use crate::cfg::block::{Block, BlockId, EdgeLabel, ProcId, Procedure};
use crate::ir::{InstrList, Instruction, Opcode};
use crate::symbol::{LabelTarget, SymbolId, SymbolTable};
use crate::utils::arena::Arena;

/// Where a procedure body begins in the flat instruction stream (spec.md
/// §4.6a in SPEC_FULL.md).
#[derive(Debug, Clone, Copy)]
pub struct ProcBoundary {
    /// `None` for the anonymous top-level procedure (spec.md §3).
    pub symbol: Option<SymbolId>,
    pub start: usize,
}

/// The fully built program: every procedure, each a list of basic blocks,
/// each a list of resolved instructions (spec.md §6 "Backend boundary").
#[derive(Debug, Default)]
pub struct Program {
    pub blocks: Arena<Block>,
    pub procs: Arena<Procedure>,
    pub proc_order: Vec<ProcId>,
}

impl Program {
    pub fn block(&self, id: BlockId) -> &Block {
        &self.blocks[id]
    }

    pub fn block_mut(&mut self, id: BlockId) -> &mut Block {
        &mut self.blocks[id]
    }

    pub fn proc(&self, id: ProcId) -> &Procedure {
        &self.procs[id]
    }

    pub fn proc_mut(&mut self, id: ProcId) -> &mut Procedure {
        &mut self.procs[id]
    }

    pub fn entry_proc(&self) -> ProcId {
        self.proc_order[0]
    }

    /// Every block across every procedure, in procedure-then-block order
    /// (spec.md §6's `FOREACH_BLOCK`).
    pub fn all_blocks(&self) -> impl Iterator<Item = BlockId> + '_ {
        self.proc_order.iter().flat_map(move |p| self.procs[*p].blocks.iter().copied())
    }

    pub fn reachable_blocks(&self) -> impl Iterator<Item = BlockId> + '_ {
        self.all_blocks().filter(move |b| self.blocks[*b].reachable)
    }
}

fn falls_thru(opcode: Opcode) -> bool {
    !matches!(opcode, Opcode::Call | Opcode::Jump | Opcode::End | Opcode::Return | Opcode::Error)
}

fn last_effective<'a>(instrs: &InstrList, ids: &'a [crate::ir::InstrId]) -> Option<&'a crate::ir::InstrId> {
    ids.iter().rev().find(|&&id| !instrs.get(id).opcode.is_comment())
}

/// Builds the CFG from a flat instruction stream (spec.md §4.6).
pub fn build(instrs: &InstrList, boundaries: &[ProcBoundary], symtab: &SymbolTable) -> Program {
    let order = instrs.order();
    assert!(!order.is_empty(), "cannot build a CFG from an empty instruction stream");

    // Pass 1: leaders.
    let mut leaders: BTreeSet<usize> = BTreeSet::new();
    leaders.insert(0);
    for b in boundaries {
        leaders.insert(b.start);
    }
    for (i, &id) in order.iter().enumerate() {
        let instr = instrs.get(id);
        if instr.opcode.is_terminator() {
            if i + 1 < order.len() {
                leaders.insert(i + 1);
            }
        }
        if let Some(target_label) = instr.jump_target() {
            if let Some(LabelTarget::Instruction(idx)) = symtab.label_target(target_label) {
                leaders.insert(idx as usize);
            }
        }
    }
    let mut leader_positions: Vec<usize> = leaders.into_iter().collect();
    leader_positions.sort_unstable();

    // Pass 2: carve blocks out of the leader ranges.
    let mut program = Program::default();
    let mut block_by_start: Vec<(usize, BlockId)> = Vec::new();
    for (i, &start) in leader_positions.iter().enumerate() {
        let end = leader_positions.get(i + 1).copied().unwrap_or(order.len());
        let block = Block {
            instructions: order[start..end].to_vec(),
            ..Block::default()
        };
        let id = program.blocks.insert(block);
        block_by_start.push((start, id));
    }

    let block_at = |pos: usize| -> BlockId {
        block_by_start
            .iter()
            .rev()
            .find(|(start, _)| *start <= pos)
            .map(|(_, id)| *id)
            .expect("position before the first leader")
    };
    // Assign blocks to procedures by boundary ranges.
    let mut sorted_boundaries = boundaries.to_vec();
    sorted_boundaries.sort_by_key(|b| b.start);
    for (i, boundary) in sorted_boundaries.iter().enumerate() {
        let end = sorted_boundaries.get(i + 1).map(|b| b.start).unwrap_or(order.len());
        let proc_id = program.procs.insert(Procedure { symbol: boundary.symbol, ..Procedure::default() });
        program.proc_order.push(proc_id);
        for (start, block_id) in &block_by_start {
            if *start >= boundary.start && *start < end {
                program.blocks[*block_id].proc = Some(proc_id);
                program.procs[proc_id].blocks.push(*block_id);
            }
        }
        if let Some(&first) = program.procs[proc_id].blocks.first() {
            program.procs[proc_id].entry = Some(first);
        }
    }

    // Pass 3: install edges (ported from `Program::propagate`).
    let add_edge = |program: &mut Program, from: BlockId, label: EdgeLabel, to: BlockId| {
        program.blocks[from].out_edges.push((label, to));
        program.blocks[to].in_edges.push((label, from));
    };

    for &(start, block_id) in &block_by_start {
        let instr_ids = &program.blocks[block_id].instructions;
        let Some(&last_id) = last_effective(instrs, instr_ids) else { continue };
        let last = instrs.get(last_id);

        if last.opcode == Opcode::Call {
            // The callee's entry block is the one whose procedure is keyed
            // by `call_callee` (bound by `ProcBoundary::symbol`).
            if let Some(entry_block) = callee_entry_block(&program, last.call_callee) {
                let callee_proc = program.blocks[entry_block].proc;
                add_edge(&mut program, block_id, EdgeLabel::Call, entry_block);
                if let Some(cp) = callee_proc {
                    program.procs[cp].call_from.insert(block_id);
                }
                let end = start + instr_ids.len();
                if end < order.len() {
                    let clean_block = block_at(end);
                    add_edge(&mut program, block_id, EdgeLabel::CallPass, clean_block);
                    if let Some(cp) = callee_proc {
                        let exits: Vec<BlockId> = program.procs[cp].exits.iter().copied().collect();
                        for exit in exits {
                            let exit_last_id = *last_effective(instrs, &program.blocks[exit].instructions).unwrap();
                            if instrs.get(exit_last_id).opcode == Opcode::Return {
                                add_edge(&mut program, exit, EdgeLabel::Ret, clean_block);
                                program.procs[cp].return_to.insert(clean_block);
                            }
                        }
                    }
                }
            }
        } else if falls_thru(last.opcode) {
            let end = start + instr_ids.len();
            if end < order.len() {
                let next = block_at(end);
                let label = match last.opcode {
                    Opcode::Jt => EdgeLabel::False,
                    Opcode::Jf => EdgeLabel::True,
                    _ => EdgeLabel::Jump,
                };
                add_edge(&mut program, block_id, label, next);
            }
        }

        if last.opcode.is_jump() {
            if let Some(target_label) = last.jump_target() {
                if let Some(LabelTarget::Instruction(idx)) = symtab.label_target(target_label) {
                    let target_block = block_at(idx as usize);
                    let label = match last.opcode {
                        Opcode::Jump => EdgeLabel::Jump,
                        Opcode::Jt => EdgeLabel::True,
                        Opcode::Jf => EdgeLabel::False,
                        _ => unreachable!(),
                    };
                    add_edge(&mut program, block_id, label, target_block);
                }
            }
        }

        if matches!(last.opcode, Opcode::Return | Opcode::Error | Opcode::End) {
            if let Some(proc_id) = program.blocks[block_id].proc {
                program.procs[proc_id].exits.insert(block_id);
            }
        }
    }

    // Pass 4: reachability + depth-first numbering via a worklist seeded
    // from every procedure entry reachable by local+call edges from the
    // program entry (spec.md §3 invariant).
    mark_reachable_and_number(&mut program);

    program
}

fn callee_entry_block(program: &Program, callee: Option<SymbolId>) -> Option<BlockId> {
    let callee = callee?;
    program
        .procs
        .iter()
        .find(|(_, p)| p.symbol == Some(callee))
        .and_then(|(_, p)| p.entry)
}

/// Recomputes `reachable`/`dfn` for every block from the current edge set.
/// Exposed so the optimizer can re-run it after mutating the CFG (spec.md
/// §4.9 "re-computes depth-first numbers on each full iteration") without
/// rebuilding the program from scratch.
pub(crate) fn mark_reachable_and_number(program: &mut Program) {
    let entry_proc = program.entry_proc();
    let Some(entry_block) = program.procs[entry_proc].entry else { return };

    let mut visited: BTreeSet<BlockId> = BTreeSet::new();
    let mut order: Vec<BlockId> = Vec::new();
    let mut stack = vec![entry_block];
    while let Some(b) = stack.pop() {
        if !visited.insert(b) {
            continue;
        }
        order.push(b);
        let succs: Vec<BlockId> = program.blocks[b]
            .out_edges
            .iter()
            .filter(|(l, _)| l.is_local() || *l == EdgeLabel::Call)
            .map(|(_, to)| *to)
            .collect();
        for s in succs {
            if !visited.contains(&s) {
                stack.push(s);
            }
        }
    }

    for (dfn, &b) in order.iter().enumerate() {
        let block = &mut program.blocks[b];
        block.reachable = true;
        block.dfn = dfn as u32;
    }

    // Blocks never reached keep `reachable = false` and a stable but
    // otherwise meaningless dfn (their relative order among themselves).
    let mut next_dfn = order.len() as u32;
    for b in program.all_blocks().collect::<Vec<_>>() {
        if !visited.contains(&b) {
            program.blocks[b].dfn = next_dfn;
            next_dfn += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Instruction, Operand};
    use crate::symbol::{LabelTarget, SymbolTable};

    fn push(instrs: &mut InstrList, opcode: Opcode, ops: Vec<Operand>) -> crate::ir::InstrId {
        instrs.push(Instruction::new(opcode, ops))
    }

    #[test]
    fn straight_line_program_is_one_block() {
        let mut symtab = SymbolTable::new();
        let mut instrs = InstrList::new();
        let t = symtab.new_temporary(crate::types::Type::bool_scalar_public());
        push(&mut instrs, Opcode::Declare, vec![Operand::Symbol(t)]);
        push(&mut instrs, Opcode::End, vec![]);
        let program = build(&instrs, &[ProcBoundary { symbol: None, start: 0 }], &symtab);
        assert_eq!(program.all_blocks().count(), 1);
    }

    #[test]
    fn conditional_jump_splits_into_three_blocks_with_true_false_edges() {
        let mut symtab = SymbolTable::new();
        let mut instrs = InstrList::new();
        let cond = symtab.new_temporary(crate::types::Type::bool_scalar_public());
        let label = symtab.new_label();

        push(&mut instrs, Opcode::Jt, vec![Operand::Symbol(label), Operand::Symbol(cond)]);
        push(&mut instrs, Opcode::Comment, vec![]); // false-branch body
        let merge_pos = instrs.len();
        symtab.bind_label(label, LabelTarget::Instruction(merge_pos as u64));
        push(&mut instrs, Opcode::End, vec![]);

        let program = build(&instrs, &[ProcBoundary { symbol: None, start: 0 }], &symtab);
        assert_eq!(program.all_blocks().count(), 3);
        let entry = program.procs.iter().next().unwrap().1.entry.unwrap();
        let out: Vec<_> = program.block(entry).out_edges.iter().map(|(l, _)| *l).collect();
        assert!(out.contains(&EdgeLabel::True));
        assert!(out.contains(&EdgeLabel::False));
    }
}
