//! Generic dataflow framework (C8, spec.md §4.7).
//!
//! Grounded on `original_source/src/libscc/DataflowAnalysis.h`/`.cpp`
//! (`DataFlowAnalysis`'s `start`/`startBlock`/`inFrom`/`outTo`/
//! `finishBlock`/`finish` hooks and the depth-first-number-keyed worklist
//! in `DataFlowAnalysisRunner::run`), restated as one generic `Analysis`
//! trait parameterized by an associated lattice `Fact` type instead of a
//! hand-rolled `std::set<Imop const*>` per concrete analysis — the six
//! analyses in `crate::analyses` each pick their own `Fact`.
//!
//! spec.md §5 / SPEC_FULL.md §5: independent analyses run as parallel
//! `rayon` tasks since each owns its own facts and only reads the shared,
//! immutable CFG; `run_sequential` is kept for deterministic test output.

use std::collections::{HashMap, VecDeque};

use crate::cfg::{BlockId, EdgeLabel, Program};
use crate::ir::InstrList;
use crate::symbol::SymbolTable;

/// Everything an analysis's transfer function needs to read: the CFG, the
/// instructions it references, and the symbol table (for operand types,
/// e.g. the private-destination use/def rule).
pub struct AnalysisCtx<'a> {
    pub program: &'a Program,
    pub instrs: &'a InstrList,
    pub symtab: &'a SymbolTable,
}

/// Direction an analysis runs in (spec.md §4.7 "Two abstract base drivers
/// — forward and backward").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

/// One dataflow analysis: a lattice `Fact`, a meet/join over edges, and a
/// per-block transfer function (spec.md §4.7's callback set, collapsed
/// into `merge` + `transfer` since `start`/`startBlock`/`finish` are pure
/// bookkeeping the generic driver already performs).
pub trait Analysis {
    type Fact: Clone + PartialEq;

    fn direction(&self) -> Direction;

    /// The identity element blocks with no (relevant) predecessors/
    /// successors start from.
    fn bottom(&self) -> Self::Fact;

    /// Joins `other` (arriving over an edge labelled `label`) into `into`
    /// (spec.md §4.7 `inFrom`/`outTo`: "join over an incoming edge").
    /// Analyses that propagate a reduced fact along global (call/ret)
    /// edges — e.g. live memory propagating only the globally-visible
    /// subset — branch on `label.is_global()` here.
    fn merge(&self, ctx: &AnalysisCtx, into: &mut Self::Fact, other: &Self::Fact, label: EdgeLabel);

    /// Recomputes this block's downstream fact from its upstream fact by
    /// scanning its instructions (spec.md §4.7 `finishBlock`).
    fn transfer(&mut self, ctx: &AnalysisCtx, block: BlockId, input: &Self::Fact) -> Self::Fact;

    /// Called once before the worklist starts (spec.md §4.7 `start`).
    fn on_start(&mut self, _ctx: &AnalysisCtx) {}

    /// Called once after the worklist empties (spec.md §4.7 `finish`).
    fn on_finish(&mut self, _ctx: &AnalysisCtx, _results: &Results<Self::Fact>) {}
}

/// Per-block facts computed by a completed analysis run. For a forward
/// analysis `in_` is joined from predecessors and `out` is the transfer's
/// result; for a backward analysis the roles invert (`out` joined from
/// successors, `in_` is the transfer's result) — callers read whichever
/// side matches the direction they care about.
#[derive(Debug, Clone, Default)]
pub struct Results<F> {
    pub in_: HashMap<BlockId, F>,
    pub out: HashMap<BlockId, F>,
}

/// Runs `analysis` to a fixed point over `ctx.program`'s reachable blocks
/// (spec.md §3 invariant: unreachable blocks are excluded from analyses).
/// The worklist is a `BlockId` queue seeded in depth-first-number order,
/// ascending for forward analyses and descending for backward ones (spec.md
/// §4.7 "a priority queue of blocks keyed by depth-first number").
pub fn run_sequential<A: Analysis>(ctx: &AnalysisCtx, analysis: &mut A) -> Results<A::Fact> {
    let forward = analysis.direction() == Direction::Forward;
    let mut blocks: Vec<BlockId> = ctx.program.reachable_blocks().collect();
    blocks.sort_by_key(|b| {
        let dfn = ctx.program.block(*b).dfn;
        if forward {
            dfn as i64
        } else {
            -(dfn as i64)
        }
    });

    let mut results: Results<A::Fact> = Results::default();
    for &b in &blocks {
        results.in_.insert(b, analysis.bottom());
        results.out.insert(b, analysis.bottom());
    }

    analysis.on_start(ctx);

    let mut queued: std::collections::HashSet<BlockId> = blocks.iter().copied().collect();
    let mut queue: VecDeque<BlockId> = blocks.into_iter().collect();

    while let Some(b) = queue.pop_front() {
        queued.remove(&b);
        let block = ctx.program.block(b);

        let mut input = analysis.bottom();
        if forward {
            for (label, pred) in block.in_edges.iter().copied() {
                if let Some(f) = results.out.get(&pred) {
                    analysis.merge(ctx, &mut input, f, label);
                }
            }
        } else {
            for (label, succ) in block.out_edges.iter().copied() {
                if let Some(f) = results.in_.get(&succ) {
                    analysis.merge(ctx, &mut input, f, label);
                }
            }
        }

        let upstream_slot = if forward { &mut results.in_ } else { &mut results.out };
        upstream_slot.insert(b, input.clone());

        let output = analysis.transfer(ctx, b, &input);
        let downstream_slot = if forward { &mut results.out } else { &mut results.in_ };
        let changed = downstream_slot.get(&b) != Some(&output);
        downstream_slot.insert(b, output);

        if changed {
            let neighbours: Vec<BlockId> = if forward {
                ctx.program.block(b).out_edges.iter().map(|(_, n)| *n).collect()
            } else {
                ctx.program.block(b).in_edges.iter().map(|(_, n)| *n).collect()
            };
            for n in neighbours {
                if ctx.program.block(n).reachable && queued.insert(n) {
                    queue.push_back(n);
                }
            }
        }
    }

    analysis.on_finish(ctx, &results);
    results
}

/// Runs every analysis in `analyses` on its own `rayon` task (spec.md §5:
/// "independent analyses ... run as parallel threads because each owns its
/// own mutable state and reads only the immutable CFG").
pub fn run_concurrent<'a, A, F>(ctx: &AnalysisCtx<'a>, analyses: &mut [A]) -> Vec<Results<F>>
where
    A: Analysis<Fact = F> + Send,
    F: Send,
{
    let mut results: Vec<Option<Results<F>>> = (0..analyses.len()).map(|_| None).collect();
    rayon::scope(|scope| {
        for (analysis, slot) in analyses.iter_mut().zip(results.iter_mut()) {
            scope.spawn(move |_| {
                *slot = Some(run_sequential(ctx, analysis));
            });
        }
    });
    results.into_iter().map(|r| r.expect("every rayon task populates its slot")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cfg::ProcBoundary;
    use crate::ir::{Instruction, Opcode, Operand};
    use crate::symbol::SymbolTable;
    use crate::types::Type;

    struct CountBlocks;

    impl Analysis for CountBlocks {
        type Fact = u32;

        fn direction(&self) -> Direction {
            Direction::Forward
        }

        fn bottom(&self) -> Self::Fact {
            0
        }

        fn merge(&self, _ctx: &AnalysisCtx, into: &mut Self::Fact, other: &Self::Fact, _label: EdgeLabel) {
            *into = (*into).max(*other);
        }

        fn transfer(&mut self, _ctx: &AnalysisCtx, _block: BlockId, input: &Self::Fact) -> Self::Fact {
            input + 1
        }
    }

    #[test]
    fn fixed_point_terminates_on_straight_line() {
        let mut symtab = SymbolTable::new();
        let mut instrs = InstrList::new();
        let t = symtab.new_temporary(Type::bool_scalar_public());
        instrs.push(Instruction::new(Opcode::Declare, vec![Operand::Symbol(t)]));
        instrs.push(Instruction::new(Opcode::End, vec![]));
        let program = crate::cfg::build(&instrs, &[ProcBoundary { symbol: None, start: 0 }], &symtab);
        let ctx = AnalysisCtx { program: &program, instrs: &instrs, symtab: &symtab };
        let mut analysis = CountBlocks;
        let results = run_sequential(&ctx, &mut analysis);
        assert_eq!(results.out.len(), 1);
    }

    /// Testable property 4 (spec.md §8): repeating a fixpoint analysis on
    /// the same program changes nothing.
    #[test]
    fn rerunning_after_fixpoint_yields_identical_facts() {
        let mut symtab = SymbolTable::new();
        let mut instrs = InstrList::new();
        let cond = symtab.new_temporary(Type::bool_scalar_public());
        let label = symtab.new_label();
        instrs.push(Instruction::new(Opcode::Jt, vec![Operand::Symbol(label), Operand::Symbol(cond)]));
        instrs.push(Instruction::new(Opcode::Comment, vec![]));
        let merge_pos = instrs.len();
        symtab.bind_label(label, crate::symbol::LabelTarget::Instruction(merge_pos as u64));
        instrs.push(Instruction::new(Opcode::End, vec![]));

        let program = crate::cfg::build(&instrs, &[ProcBoundary { symbol: None, start: 0 }], &symtab);
        let ctx = AnalysisCtx { program: &program, instrs: &instrs, symtab: &symtab };

        let first = run_sequential(&ctx, &mut CountBlocks);
        let second = run_sequential(&ctx, &mut CountBlocks);
        assert_eq!(first.in_, second.in_);
        assert_eq!(first.out, second.out);
    }
}
