//! Copy propagation (forward), grounded on `original_source/src/libscc/
//! analysis/CopyPropagation.{h,cpp}`: tracks the set of `COPY` instructions
//! still valid (neither operand redefined since) at each program point, so
//! `crate::optimize` can rewrite later uses of a copy's destination to its
//! source and drop the now-redundant copy.
//!
//! The original's block join is set *intersection* over local predecessors
//! (a copy survives only where every path agrees it still holds), not the
//! union every other analysis here uses — modeled as `Fact = Option<Set>`
//! where `None` is the identity element for intersection (no predecessor
//! merged in yet) and `Some(set)` narrows with every further predecessor.

use std::collections::BTreeSet;

use crate::cfg::{BlockId, EdgeLabel};
use crate::dataflow::{Analysis, AnalysisCtx, Direction};
use crate::ir::{InstrId, Instruction, Opcode};

use super::is_global;

pub type CopySet = BTreeSet<InstrId>;

#[derive(Debug, Default)]
pub struct CopyPropagation;

impl Analysis for CopyPropagation {
    type Fact = Option<CopySet>;

    fn direction(&self) -> Direction {
        Direction::Forward
    }

    fn bottom(&self) -> Self::Fact {
        None
    }

    fn merge(&self, ctx: &AnalysisCtx, into: &mut Self::Fact, other: &Self::Fact, label: EdgeLabel) {
        let filtered: CopySet = match other {
            Some(set) => set
                .iter()
                .copied()
                .filter(|&id| !label.is_global() || copy_operands_global(ctx, id))
                .collect(),
            None => CopySet::new(),
        };
        match into {
            slot @ None => *slot = Some(filtered),
            Some(existing) => existing.retain(|id| filtered.contains(id)),
        }
    }

    fn transfer(&mut self, ctx: &AnalysisCtx, block: BlockId, input: &Self::Fact) -> Self::Fact {
        let mut copies = input.clone().unwrap_or_default();
        for &instr_id in ctx.program.block(block).instructions.iter() {
            update(ctx, instr_id, ctx.instrs.get(instr_id), &mut copies);
        }
        Some(copies)
    }
}

fn copy_operands_global(ctx: &AnalysisCtx, copy_id: InstrId) -> bool {
    let instr = ctx.instrs.get(copy_id);
    let (Some(dest), Some(src)) = (instr.dest().and_then(|o| o.as_symbol()), instr.operands.get(1).and_then(|o| o.as_symbol())) else {
        return false;
    };
    is_global(ctx.symtab, dest) && is_global(ctx.symtab, src)
}

/// `CopyPropagation::update` from the original: a copy is killed as soon as
/// either side is redefined (by this instruction's own dest, or by any of
/// its defs/uses under a CALL, which may alias anything non-local).
pub(crate) fn update(ctx: &AnalysisCtx, _this_id: InstrId, instr: &Instruction, copies: &mut CopySet) {
    let dest_security = |sym: crate::symbol::SymbolId| ctx.symtab.get(sym).ty().map(|t| t.security());
    let touches = |copy_id: &InstrId, sym: crate::symbol::SymbolId| -> bool {
        let copy = ctx.instrs.get(*copy_id);
        let copy_dest = copy.dest().and_then(|o| o.as_symbol());
        let copy_src = copy.operands.get(1).and_then(|o| o.as_symbol());
        copy_dest == Some(sym) || copy_src == Some(sym)
    };

    let mut kill = CopySet::new();
    for d in instr.defs(dest_security) {
        for &c in copies.iter() {
            if touches(&c, d) {
                kill.insert(c);
            }
        }
    }
    if instr.opcode == Opcode::Call {
        for u in instr.uses(dest_security) {
            for &c in copies.iter() {
                if touches(&c, u) {
                    kill.insert(c);
                }
            }
        }
    }
    for c in kill {
        copies.remove(&c);
    }

    if instr.opcode == Opcode::Copy {
        copies.insert(_this_id);
    }
}
