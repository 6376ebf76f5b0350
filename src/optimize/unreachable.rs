//! Grounded on `original_source/src/libscc/optimizer/RemoveUnreachableBlocks.cpp`:
//! a block that `cfg::build`'s reachability pass never visited carries no
//! analysis facts and can simply be dropped.

use std::collections::HashSet;

use crate::cfg::Program;

pub(crate) fn remove_unreachable_blocks(program: &mut Program) -> usize {
    let dead: HashSet<_> = program.all_blocks().filter(|&b| !program.block(b).reachable).collect();
    super::remove_blocks(program, &dead)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cfg::ProcBoundary;
    use crate::ir::{InstrList, Instruction, Opcode, Operand};
    use crate::symbol::SymbolTable;

    #[test]
    fn block_past_an_unconditional_jump_is_removed() {
        let mut symtab = SymbolTable::new();
        let mut instrs = InstrList::new();
        let label = symtab.new_label();
        instrs.push(Instruction::new(Opcode::Jump, vec![Operand::Symbol(label)]));
        // Dead block: falls after an unconditional jump with no other entry.
        instrs.push(Instruction::new(Opcode::Comment, vec![]));
        let end_pos = instrs.len();
        instrs.push(Instruction::new(Opcode::End, vec![]));
        symtab.bind_label(label, crate::symbol::LabelTarget::Instruction(end_pos as u64));

        let mut program = crate::cfg::build(&instrs, &[ProcBoundary { symbol: None, start: 0 }], &symtab);
        let before = program.all_blocks().count();
        let removed = remove_unreachable_blocks(&mut program);
        assert!(removed > 0);
        assert_eq!(program.all_blocks().count(), before - removed);
    }
}
