//! Live variables (backward), grounded on `original_source/src/libscc/
//! analysis/LiveVariables.{h,cpp}`: `live := (live ∪ uses(i)) \ defs(i)`
//! scanned in reverse per block, joined over predecessors (successors,
//! since this runs backward) with only globals crossing a global edge.

use std::collections::BTreeSet;

use crate::cfg::{BlockId, EdgeLabel};
use crate::dataflow::{Analysis, AnalysisCtx, Direction};
use crate::symbol::SymbolId;
use crate::types::SecurityType;

use super::is_global;

/// Set of symbols live on entry to (read: "live on exit from", depending on
/// which side of `Results` the caller reads) a block.
pub type LiveSet = BTreeSet<SymbolId>;

#[derive(Debug, Default)]
pub struct LiveVariables;

impl Analysis for LiveVariables {
    type Fact = LiveSet;

    fn direction(&self) -> Direction {
        Direction::Backward
    }

    fn bottom(&self) -> Self::Fact {
        LiveSet::new()
    }

    fn merge(&self, ctx: &AnalysisCtx, into: &mut Self::Fact, other: &Self::Fact, label: EdgeLabel) {
        if label.is_global() {
            into.extend(other.iter().copied().filter(|&s| is_global(ctx.symtab, s)));
        } else {
            into.extend(other.iter().copied());
        }
    }

    fn transfer(&mut self, ctx: &AnalysisCtx, block: BlockId, input: &Self::Fact) -> Self::Fact {
        let mut live = input.clone();
        let dest_security = |sym: SymbolId| -> Option<SecurityType> { ctx.symtab.get(sym).ty().map(|t| t.security()) };
        for &instr_id in ctx.program.block(block).instructions.iter().rev() {
            let instr = ctx.instrs.get(instr_id);
            for d in instr.defs(dest_security) {
                live.remove(&d);
            }
            for u in instr.uses(dest_security) {
                live.insert(u);
            }
        }
        live
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cfg::ProcBoundary;
    use crate::ir::{InstrList, Instruction, Opcode, Operand};
    use crate::symbol::SymbolTable;
    use crate::types::Type;

    #[test]
    fn variable_used_after_def_is_live_before_def() {
        let mut symtab = SymbolTable::new();
        let mut instrs = InstrList::new();
        let a = symtab.new_temporary(Type::new(SecurityType::Public, crate::types::data::DataType::Primitive(crate::types::data::PrimitiveType::Int64), 0));
        let b = symtab.new_temporary(Type::new(SecurityType::Public, crate::types::data::DataType::Primitive(crate::types::data::PrimitiveType::Int64), 0));
        instrs.push(Instruction::new(Opcode::Declare, vec![Operand::Symbol(a)]));
        instrs.push(Instruction::new(Opcode::Assign, vec![Operand::Symbol(a), Operand::Symbol(b)]));
        instrs.push(Instruction::new(Opcode::Print, vec![Operand::Symbol(a)]));
        instrs.push(Instruction::new(Opcode::End, vec![]));

        let program = crate::cfg::build(&instrs, &[ProcBoundary { symbol: None, start: 0 }], &symtab);
        let ctx = AnalysisCtx { program: &program, instrs: &instrs, symtab: &symtab };
        let mut analysis = LiveVariables;
        let results = crate::dataflow::run_sequential(&ctx, &mut analysis);

        let entry = program.entry_proc();
        let block = program.proc(entry).entry.unwrap();
        // `in_` for a backward analysis is the block's transfer output: b is
        // live on entry (used by the ASSIGN before a is used), a is not (its
        // only use is after its own definition inside the same block).
        let in_fact = &results.in_[&block];
        assert!(in_fact.contains(&b));
        assert!(!in_fact.contains(&a));
    }
}
