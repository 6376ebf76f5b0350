//! Optimizer (C10, spec.md §4.9): iterates the concrete analyses in
//! `crate::analyses` to a fixed point, rewriting the CFG in place.
//!
//! Grounded on `original_source/src/libscc/Optimizer.cpp`'s `optimizeCode`
//! driver loop; the six per-pass files under `original_source/src/libscc/
//! optimizer/` are split the same way here (`unreachable`, `dce`,
//! `copy_elim`, `structural`, `inline`) rather than folded into one pass.

mod copy_elim;
mod dce;
mod inline;
mod structural;
mod unreachable;

use std::collections::HashSet;

use crate::cfg::{BlockId, Program};
use crate::ir::{InstrId, InstrList};
use crate::symbol::SymbolTable;

/// Per-run statistics (SPEC_FULL.md §4.9a), logged at `info` level once per
/// full iteration of the loop. Not a feature of its own, only observability
/// of the fixed-point loop spec.md §4.9 already mandates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OptimizationReport {
    pub passes_run: u32,
    pub removed_blocks: usize,
    pub removed_instructions: usize,
    pub inlined_calls: usize,
}

/// Ambient configuration for the optional inlining pass (spec.md §4.9 item
/// 6's "default 50 instructions"), kept out of `optimize`'s argument list
/// the way `src/typecheck/options.rs` keeps `max_errors` out of the
/// checker's entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptimizeOptions {
    pub inline: bool,
    pub inline_threshold: usize,
}

impl Default for OptimizeOptions {
    fn default() -> Self {
        OptimizeOptions { inline: true, inline_threshold: 50 }
    }
}

/// Runs the fixed-point loop described by spec.md §4.9 over `program`,
/// mutating it and `instrs` in place. Re-numbers instructions and
/// recomputes depth-first numbers on every full iteration that makes a
/// change.
pub fn optimize(program: &mut Program, instrs: &mut InstrList, symtab: &mut SymbolTable, options: &OptimizeOptions) -> OptimizationReport {
    let mut report = OptimizationReport::default();

    loop {
        report.passes_run += 1;
        let mut changed = false;

        let removed = unreachable::remove_unreachable_blocks(program);
        if removed > 0 {
            report.removed_blocks += removed;
            changed = true;
            renumber(program);
            log::info!(target: "secrec_core::optimize", "pass {}: removed {removed} unreachable block(s)", report.passes_run);
            continue;
        }

        let folded = dce::eliminate_constant_expressions(program, instrs, symtab);
        let dead_vars = dce::eliminate_dead_variables(program, instrs, symtab);
        if folded > 0 || dead_vars > 0 {
            report.removed_instructions += dead_vars;
            changed = true;
            log::info!(
                target: "secrec_core::optimize",
                "pass {}: folded {folded} constant expression(s), removed {dead_vars} dead variable(s)",
                report.passes_run
            );
            continue;
        }

        let dead_mem = dce::eliminate_dead_memory(program, instrs, symtab);
        if dead_mem > 0 {
            report.removed_instructions += dead_mem;
            changed = true;
            log::info!(target: "secrec_core::optimize", "pass {}: removed {dead_mem} dead store(s)/alloc(s)", report.passes_run);
            continue;
        }

        let copies = copy_elim::eliminate_redundant_copies(program, instrs, symtab);
        if copies > 0 {
            report.removed_instructions += copies;
            changed = true;
            log::info!(target: "secrec_core::optimize", "pass {}: eliminated {copies} redundant copy/copies", report.passes_run);
            continue;
        }

        let (empty_blocks, empty_procs) = structural::remove_empty(program, instrs, symtab);
        if empty_blocks > 0 || empty_procs > 0 {
            report.removed_blocks += empty_blocks;
            changed = true;
            renumber(program);
            log::info!(
                target: "secrec_core::optimize",
                "pass {}: removed {empty_blocks} empty block(s), {empty_procs} empty procedure(s)",
                report.passes_run
            );
            continue;
        }

        if options.inline {
            let inlined = inline::inline_small_callees(program, instrs, symtab, options.inline_threshold);
            if inlined > 0 {
                report.inlined_calls += inlined;
                changed = true;
                renumber(program);
                log::info!(target: "secrec_core::optimize", "pass {}: inlined {inlined} call(s)", report.passes_run);
                continue;
            }
        }

        if !changed {
            break;
        }
    }

    report
}

fn renumber(program: &mut Program) {
    crate::cfg::mark_reachable_and_number(program);
}


/// Drops every instruction in `dead` from whichever block currently owns
/// it. Shared by every pass that marks instructions dead rather than
/// mutating them in place.
pub(crate) fn remove_instructions(program: &mut Program, dead: &HashSet<InstrId>) -> usize {
    if dead.is_empty() {
        return 0;
    }
    let mut removed = 0;
    for b in program.all_blocks().collect::<Vec<_>>() {
        let block = program.block_mut(b);
        let before = block.instructions.len();
        block.instructions.retain(|id| !dead.contains(id));
        removed += before - block.instructions.len();
    }
    removed
}

/// Drops every block in `dead` from its owning procedure's block list (and
/// from `exits` if present there). The arena slot itself is left allocated;
/// nothing keeps iterating it once it falls out of every `Vec`/`BTreeSet`
/// that drives `Program::all_blocks`.
pub(crate) fn remove_blocks(program: &mut Program, dead: &HashSet<BlockId>) -> usize {
    if dead.is_empty() {
        return 0;
    }
    let proc_ids: Vec<_> = program.proc_order.clone();
    let mut removed = 0;
    for p in proc_ids {
        let proc = program.proc_mut(p);
        let before = proc.blocks.len();
        proc.blocks.retain(|b| !dead.contains(b));
        removed += before - proc.blocks.len();
        proc.exits.retain(|b| !dead.contains(b));
        proc.call_from.retain(|b| !dead.contains(b));
        proc.return_to.retain(|b| !dead.contains(b));
    }
    for b in program.all_blocks().collect::<Vec<_>>() {
        let block = program.block_mut(b);
        block.out_edges.retain(|(_, to)| !dead.contains(to));
        block.in_edges.retain(|(_, from)| !dead.contains(from));
    }
    removed
}
