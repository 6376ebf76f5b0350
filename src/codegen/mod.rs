//! AST-directed code generation (C6, spec.md §4.5).
//!
//! Grounded on `original_source/src/libscc/codegen/{Expression,Assign,
//! LValue,Program}.cpp` (`CodeGen::cg*` visitor methods emitting into a flat
//! `ImopList`), restated as ordinary recursive-descent methods over the
//! closed `ExprKind`/`StmtKind`/`DeclKind` enums, the way `typecheck/` is
//! split into `mod.rs` (declarations/statements), `expr.rs` (expressions)
//! and `lvalue.rs`/`program.rs` mirror `Assign`/`LValue.cpp` and
//! `Program.cpp`.
//!
//! One structural simplification from the C++ original: rather than
//! threading next-instruction/true/false patch lists through three result
//! structs (`SubscriptInfo`, `CGBranchResult`, `CGStmtResult`), every jump
//! target here is a `Symbol::Label` that can be bound to its instruction
//! position *after* the jump referencing it has already been emitted
//! (`SymbolTable::bind_label`, read later by `cfg::build`). Labels are
//! therefore forward-referenced the same way an assembler's forward label
//! works, and no backpatch bookkeeping is needed in the generator itself.

pub mod expr;
pub mod lvalue;
pub mod program;
pub mod stmt;

pub use program::generate;

use std::collections::HashMap;

use crate::ast::{Ast, NodeId};
use crate::cfg::ProcBoundary;
use crate::ir::{InstrId, InstrList, Instruction, Opcode, Operand};
use crate::symbol::{LabelTarget, SymbolId, SymbolTable};
use crate::types::Type;

/// The flat instruction stream plus the procedure boundaries `cfg::build`
/// needs, produced by one `generate()` call (SPEC_FULL.md §2: `src/ir/`,
/// `src/cfg/` own the data these feed).
#[derive(Debug, Default)]
pub struct GeneratedProgram {
    pub instrs: InstrList,
    pub boundaries: Vec<ProcBoundary>,
}

/// A loop's break/continue targets plus the scope-stack depth it was
/// entered at, so `break`/`continue` can release exactly the locals
/// introduced since loop entry before jumping out (spec.md §4.5 "resource
/// release... at scope exit", extended to early exits).
#[derive(Debug, Clone, Copy)]
struct LoopLabels {
    break_label: SymbolId,
    continue_label: SymbolId,
    scope_depth: usize,
}

/// Threads the mutable state one code-generation run needs (SPEC_FULL.md
/// Design Notes: "global mutable state becomes a `Context` value passed
/// explicitly"), mirroring `typecheck::TypeChecker`'s shape.
pub struct Generator<'a> {
    ast: &'a Ast,
    symtab: &'a mut SymbolTable,
    call_targets: &'a HashMap<NodeId, SymbolId>,
    var_symbols: &'a HashMap<NodeId, SymbolId>,
    instrs: InstrList,
    boundaries: Vec<ProcBoundary>,
    /// `(CALL handle, callee)` pairs patched onto the instruction once every
    /// procedure body (including template instances) has been emitted
    /// (SPEC_FULL.md §4.6a): a template instance may be called before its
    /// own body is lowered, so the callee's `ProcBoundary` cannot be
    /// resolved to a block until `cfg::build` runs anyway, but recording the
    /// callee here keeps instruction emission itself independent of
    /// emission order.
    pending_calls: Vec<(InstrId, SymbolId)>,
    /// Locals (including compiler temporaries) declared in each currently
    /// open lexical scope, innermost last, released in reverse declaration
    /// order when the scope closes.
    scopes: Vec<Vec<SymbolId>>,
    loops: Vec<LoopLabels>,
}

impl<'a> Generator<'a> {
    fn new(
        ast: &'a Ast,
        symtab: &'a mut SymbolTable,
        call_targets: &'a HashMap<NodeId, SymbolId>,
        var_symbols: &'a HashMap<NodeId, SymbolId>,
    ) -> Self {
        Generator {
            ast,
            symtab,
            call_targets,
            var_symbols,
            instrs: InstrList::new(),
            boundaries: Vec::new(),
            pending_calls: Vec::new(),
            scopes: Vec::new(),
            loops: Vec::new(),
        }
    }

    fn emit(&mut self, creator: Option<NodeId>, opcode: Opcode, operands: Vec<Operand>) -> InstrId {
        let mut instr = Instruction::new(opcode, operands);
        if let Some(c) = creator {
            instr = instr.with_creator(c);
        }
        self.instrs.push(instr)
    }

    /// Allocates a fresh temporary and records it in the innermost open
    /// scope so it is released along with ordinary locals when that scope
    /// closes (a coarser lifetime than the original's per-expression
    /// `SubscriptInfo` clean-up lists, but one that preserves the "every
    /// temporary is eventually released" invariant).
    fn new_temp(&mut self, ty: Type) -> SymbolId {
        let sym = self.symtab.new_temporary(ty);
        if let Some(scope) = self.scopes.last_mut() {
            scope.push(sym);
        }
        sym
    }

    fn bind_label(&mut self, label: SymbolId) {
        let pos = self.instrs.len() as u64;
        self.symtab.bind_label(label, LabelTarget::Instruction(pos));
    }

    /// Emits a runtime trap: `ERROR` carrying `message` (spec.md §3
    /// "Runtime-triggered errors... are compiled into explicit ERROR
    /// instructions whose single operand is the string message").
    fn gen_error(&mut self, creator: NodeId, message: String) -> InstrId {
        let id = self.emit(Some(creator), Opcode::Error, vec![]);
        self.instrs.get_mut(id).error_message = Some(message);
        id
    }

    /// Releases every local declared since `depth` scopes were open,
    /// innermost-scope-first and reverse-declaration-order within each
    /// scope, without popping them from `self.scopes` (control does not
    /// actually leave those scopes here; `break`/`continue` jump past their
    /// normal exit, so the scopes are still closed properly afterwards,
    /// this just emits the releases early).
    fn release_locals_above(&mut self, creator: Option<NodeId>, depth: usize) {
        let tail: Vec<Vec<SymbolId>> = self.scopes[depth..].to_vec();
        for scope in tail.iter().rev() {
            for &sym in scope.iter().rev() {
                self.emit(creator, Opcode::Release, vec![Operand::Symbol(sym)]);
            }
        }
    }
}
