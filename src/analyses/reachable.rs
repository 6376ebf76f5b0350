//! Reachable definitions / uses / returns (backward), grounded on
//! `original_source/src/libscc/analysis/AbstractReachable.h` (the shared
//! `AbstractReachable<VisitImop>` template) plus the three thin
//! `ReachableDefinitions`/`ReachableUses`/`ReachableReturns` specializations
//! in the same directory.
//!
//! Rather than a C++ template parameterized by a `VisitImop` policy struct,
//! one `Reachable` analysis takes a `Kind` enum and branches on it; the
//! three public type aliases below give each kind its own name so call
//! sites read the same as the original's three classes.

use std::collections::{BTreeSet, HashMap};

use crate::cfg::{BlockId, EdgeLabel};
use crate::dataflow::{Analysis, AnalysisCtx, Direction};
use crate::ir::{InstrId, Instruction, Opcode};
use crate::symbol::SymbolId;

use super::is_global;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Definitions,
    Uses,
    Returns,
}

/// For each symbol, the set of not-yet-superseded instructions of the
/// relevant kind that may still be "reached" going forward from this
/// program point (read backward, since the analysis itself runs backward).
pub type ReachableFact = HashMap<SymbolId, BTreeSet<InstrId>>;

fn gen_kill(kind: Kind, instr_id: InstrId, instr: &Instruction, dest_security: &impl Fn(SymbolId) -> Option<crate::types::SecurityType>) -> (Vec<(SymbolId, InstrId)>, Vec<SymbolId>) {
    match kind {
        Kind::Definitions => {
            let defs = instr.defs(dest_security);
            (defs.iter().map(|&s| (s, instr_id)).collect(), defs)
        }
        Kind::Uses => {
            // A use "kills" the previous reaching use the same way a
            // redefinition kills a reaching definition: once `sym` is
            // redefined, its prior uses are no longer reachable without an
            // intervening kill, so defs() still drives the kill set.
            let uses = instr.uses(dest_security);
            let defs = instr.defs(dest_security);
            (uses.iter().map(|&s| (s, instr_id)).collect(), defs)
        }
        Kind::Returns => {
            if instr.opcode == Opcode::Return {
                let rets = instr.uses(dest_security);
                (rets.iter().map(|&s| (s, instr_id)).collect(), Vec::new())
            } else {
                (Vec::new(), instr.defs(dest_security))
            }
        }
    }
}

fn step(ctx: &AnalysisCtx, kind: Kind, instr_id: InstrId, instr: &Instruction, facts: &mut ReachableFact) {
    let dest_security = |sym: SymbolId| ctx.symtab.get(sym).ty().map(|t| t.security());
    let (gens, kills) = gen_kill(kind, instr_id, instr, &dest_security);
    for k in kills {
        facts.remove(&k);
    }
    for (sym, id) in gens {
        facts.entry(sym).or_default().insert(id);
    }
}

/// Replays one instruction's effect on a reaching-definitions fact outside
/// the worklist, e.g. to walk backward from a block's exit state to the
/// state just after a specific instruction (`crate::optimize`'s dead-alloc
/// and copy-elimination passes).
pub(crate) fn step_definitions(ctx: &AnalysisCtx, instr_id: InstrId, instr: &Instruction, facts: &mut ReachableFact) {
    step(ctx, Kind::Definitions, instr_id, instr, facts)
}

pub(crate) fn step_uses(ctx: &AnalysisCtx, instr_id: InstrId, instr: &Instruction, facts: &mut ReachableFact) {
    step(ctx, Kind::Uses, instr_id, instr, facts)
}

pub(crate) fn step_returns(ctx: &AnalysisCtx, instr_id: InstrId, instr: &Instruction, facts: &mut ReachableFact) {
    step(ctx, Kind::Returns, instr_id, instr, facts)
}

struct Reachable {
    kind: Kind,
}

impl Analysis for Reachable {
    type Fact = ReachableFact;

    fn direction(&self) -> Direction {
        Direction::Backward
    }

    fn bottom(&self) -> Self::Fact {
        ReachableFact::new()
    }

    fn merge(&self, ctx: &AnalysisCtx, into: &mut Self::Fact, other: &Self::Fact, label: EdgeLabel) {
        for (&sym, ids) in other {
            if label.is_global() && !is_global(ctx.symtab, sym) {
                continue;
            }
            into.entry(sym).or_default().extend(ids.iter().copied());
        }
    }

    fn transfer(&mut self, ctx: &AnalysisCtx, block: BlockId, input: &Self::Fact) -> Self::Fact {
        let mut facts = input.clone();
        for &instr_id in ctx.program.block(block).instructions.iter().rev() {
            let instr = ctx.instrs.get(instr_id);
            step(ctx, self.kind, instr_id, instr, &mut facts);
        }
        facts
    }
}

macro_rules! reachable_analysis {
    ($name:ident, $kind:expr, $doc:literal) => {
        #[doc = $doc]
        #[derive(Debug, Default)]
        pub struct $name;

        impl Analysis for $name {
            type Fact = ReachableFact;

            fn direction(&self) -> Direction {
                Direction::Backward
            }

            fn bottom(&self) -> Self::Fact {
                ReachableFact::new()
            }

            fn merge(&self, ctx: &AnalysisCtx, into: &mut Self::Fact, other: &Self::Fact, label: EdgeLabel) {
                Reachable { kind: $kind }.merge(ctx, into, other, label)
            }

            fn transfer(&mut self, ctx: &AnalysisCtx, block: BlockId, input: &Self::Fact) -> Self::Fact {
                Reachable { kind: $kind }.transfer(ctx, block, input)
            }
        }
    };
}

reachable_analysis!(
    ReachableDefinitions,
    Kind::Definitions,
    "Reaching definitions: for each symbol, the defining instructions still live at this point."
);
reachable_analysis!(
    ReachableUses,
    Kind::Uses,
    "Reaching uses: for each symbol, the using instructions not yet superseded by a redefinition."
);
reachable_analysis!(
    ReachableReturns,
    Kind::Returns,
    "Reaching returns: for each symbol, the RETURN instructions that may still read it."
);
