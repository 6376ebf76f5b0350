//! Live memory (backward), grounded on `original_source/src/libscc/
//! analysis/LiveMemory.{h,cpp}`: tracks, per array-typed symbol, how the
//! memory it backs is used downstream — `Dead` (never touched again before
//! release), `Read`, `Write`, or `Live` (both). Feeds dead-store,
//! dead-alloc and redundant-copy elimination in `crate::optimize`.

use std::collections::HashMap;

use crate::cfg::{BlockId, EdgeLabel};
use crate::dataflow::{Analysis, AnalysisCtx, Direction};
use crate::ir::{Instruction, Opcode, Operand};
use crate::symbol::{Symbol, SymbolId};

use super::is_global;

/// `LiveMemory::Domain` from the original: a two-bit lattice, `Live` is the
/// join of `Read` and `Write`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemDomain {
    Dead,
    Read,
    Write,
    Live,
}

impl MemDomain {
    pub fn join(self, other: MemDomain) -> MemDomain {
        use MemDomain::*;
        match (self, other) {
            (Dead, x) | (x, Dead) => x,
            (Live, _) | (_, Live) => Live,
            (Read, Write) | (Write, Read) => Live,
            (Read, Read) => Read,
            (Write, Write) => Write,
        }
    }

    pub fn has_read(self) -> bool {
        matches!(self, MemDomain::Read | MemDomain::Live)
    }

    pub fn has_write(self) -> bool {
        matches!(self, MemDomain::Write | MemDomain::Live)
    }
}

pub type MemFact = HashMap<SymbolId, MemDomain>;

fn is_array_symbol(symtab: &crate::symbol::SymbolTable, sym: SymbolId) -> bool {
    match symtab.get(sym) {
        Symbol::Variable(v) | Symbol::Temporary(v) => v.is_array(),
        _ => false,
    }
}

fn gen(into: &mut MemFact, symtab: &crate::symbol::SymbolTable, sym: SymbolId, dom: MemDomain) {
    if is_array_symbol(symtab, sym) {
        let entry = into.entry(sym).or_insert(MemDomain::Dead);
        *entry = entry.join(dom);
    }
}

/// `visitImop` from the original: per-opcode gen/kill of memory facts. Used
/// both to precompute each block's local gen/kill set and, by
/// `crate::optimize`, to replay facts instruction-by-instruction within a
/// block when deciding which COPYs are redundant.
pub(crate) fn visit(
    instr: &Instruction,
    symtab: &crate::symbol::SymbolTable,
    mut on_gen: impl FnMut(SymbolId, MemDomain),
    mut on_kill: impl FnMut(SymbolId),
) {
    match instr.opcode {
        Opcode::Store => {
            // operands = [base, index, value]; STORE never sets
            // `writes_dest`, so the base is read off position 0 directly.
            if let Some(&Operand::Symbol(base)) = instr.operands.first() {
                on_gen(base, MemDomain::Write);
            }
        }
        Opcode::Load => {
            if let Some(&Operand::Symbol(base)) = instr.operands.get(1) {
                on_gen(base, MemDomain::Read);
            }
        }
        Opcode::Copy => {
            if let Some(&Operand::Symbol(src)) = instr.operands.get(1) {
                on_gen(src, MemDomain::Read);
            }
        }
        Opcode::Alloc | Opcode::Param => {}
        Opcode::Syscall => {
            for so in &instr.syscall_operands {
                match so.role {
                    crate::ir::SyscallRole::Return => {
                        if let Some(s) = so.operand.as_symbol() {
                            on_kill(s);
                        }
                    }
                    crate::ir::SyscallRole::PushRef { read_only: false } | crate::ir::SyscallRole::PushCRef => {
                        if let Some(s) = so.operand.as_symbol() {
                            on_gen(s, MemDomain::Write);
                        }
                    }
                    crate::ir::SyscallRole::Push | crate::ir::SyscallRole::PushRef { read_only: true } => {
                        if let Some(s) = so.operand.as_symbol() {
                            on_gen(s, MemDomain::Live);
                        }
                    }
                }
            }
        }
        Opcode::Call => {
            let dest_security = |sym: SymbolId| symtab.get(sym).ty().map(|t| t.security());
            for u in instr.uses(dest_security) {
                on_gen(u, MemDomain::Read);
            }
            for d in instr.defs(dest_security) {
                on_kill(d);
            }
        }
        _ => {}
    }
}

#[derive(Debug, Default)]
pub struct LiveMemory;

impl Analysis for LiveMemory {
    type Fact = MemFact;

    fn direction(&self) -> Direction {
        Direction::Backward
    }

    fn bottom(&self) -> Self::Fact {
        MemFact::new()
    }

    fn merge(&self, ctx: &AnalysisCtx, into: &mut Self::Fact, other: &Self::Fact, label: EdgeLabel) {
        for (&sym, &dom) in other {
            if label.is_global() && !is_global(ctx.symtab, sym) {
                continue;
            }
            let entry = into.entry(sym).or_insert(MemDomain::Dead);
            *entry = entry.join(dom);
        }
    }

    fn transfer(&mut self, ctx: &AnalysisCtx, block: BlockId, input: &Self::Fact) -> Self::Fact {
        let mut facts = input.clone();
        for &instr_id in ctx.program.block(block).instructions.iter().rev() {
            let instr = ctx.instrs.get(instr_id);
            let mut killed = Vec::new();
            let mut gens = Vec::new();
            visit(instr, ctx.symtab, |s, d| gens.push((s, d)), |s| killed.push(s));
            for s in killed {
                facts.remove(&s);
            }
            for (s, d) in gens {
                gen(&mut facts, ctx.symtab, s, d);
            }
        }
        facts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cfg::ProcBoundary;
    use crate::ir::{InstrList, Instruction, Operand};
    use crate::symbol::{SymbolTable, VariableSymbol};
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
                    storage: crate::symbol::Storage::Local,
                    parent: None,
                    dims: vec![dim],
                    size: Some(dim),
                    fields: Vec::new(),
                })
            })
            .unwrap()
    }

    #[test]
    fn store_then_no_later_read_marks_dead_after_release() {
        let mut symtab = SymbolTable::new();
        let mut instrs = InstrList::new();
        let idx = symtab.new_temporary(Type::new(SecurityType::Public, DataType::Primitive(PrimitiveType::UInt64), 0));
        let val = symtab.new_temporary(Type::new(SecurityType::Public, DataType::Primitive(PrimitiveType::Int64), 0));
        let arr = array_var(&mut symtab, "a");

        instrs.push(Instruction::new(Opcode::Declare, vec![Operand::Symbol(arr)]));
        instrs.push(Instruction::new(Opcode::Store, vec![Operand::Symbol(arr), Operand::Symbol(idx), Operand::Symbol(val)]));
        instrs.push(Instruction::new(Opcode::Release, vec![Operand::Symbol(arr)]));
        instrs.push(Instruction::new(Opcode::End, vec![]));

        let program = crate::cfg::build(&instrs, &[ProcBoundary { symbol: None, start: 0 }], &symtab);
        let ctx = AnalysisCtx { program: &program, instrs: &instrs, symtab: &symtab };
        let mut analysis = LiveMemory;
        let results = crate::dataflow::run_sequential(&ctx, &mut analysis);

        let entry = program.entry_proc();
        let block = program.proc(entry).entry.unwrap();
        // Nothing downstream of the STORE reads `arr`, so its fact just
        // after the store (reading backward) is absent/Dead: `in_` for the
        // whole block only reflects facts generated strictly after the
        // block's own STORE since RELEASE carries no gen for `arr`.
        let in_fact = &results.in_[&block];
        assert!(in_fact.get(&arr).copied().unwrap_or(MemDomain::Dead) == MemDomain::Write);
    }
}
