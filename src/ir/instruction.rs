//! Three-address instructions (spec.md §3 "Instructions").
//!
//! Grounded on `original_source/src/libscc/Imop.h`/`Imop.cpp`: a flat
//! operand vector plus opcode-driven accessors, restated here as a typed
//! `operands: Vec<Operand>` with named accessors instead of `arg(i)`
//! bounds-checked indexing, and the use/def derivation ported from
//! `Imop::useRange`/`Imop::defRange`.

use std::fmt;

use crate::ast::NodeId;
use crate::ir::opcode::Opcode;
use crate::ir::operand::Operand;
use crate::symbol::SymbolId;
use crate::types::SecurityType;
use crate::utils::arena::Handle;

/// Per-operand passing convention for `SYSCALL` arguments (spec.md §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyscallRole {
    Return,
    Push,
    PushRef { read_only: bool },
    PushCRef,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyscallOperand {
    pub operand: Operand,
    pub role: SyscallRole,
}

pub type InstrId = Handle<Instruction>;

/// One three-address instruction (spec.md §3). The opcode plus operand
/// list fully determines the instruction's shape; `dest`/`args` are
/// convenience views, not separate storage.
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    pub opcode: Opcode,
    /// Flat operand list, `[dest?, arg1, arg2, ...]` matching
    /// `original_source`'s `Imop::OperandList` layout; `dest()` indexes
    /// position 0 when `opcode.writes_dest()`.
    pub operands: Vec<Operand>,
    /// Present only on `SYSCALL`; carries the per-operand passing
    /// convention (spec.md §3).
    pub syscall_name: Option<String>,
    pub syscall_operands: Vec<SyscallOperand>,
    /// `CALL`'s callee, patched in once all procedure bodies are emitted
    /// (spec.md §4.5 "A map from pending procedure-call instructions to
    /// their callee symbol"); `None` until then.
    pub call_callee: Option<SymbolId>,
    /// `RETCLEAN`'s paired `CALL` (GLOSSARY "Reclean").
    pub retclean_call: Option<InstrId>,
    /// Present only on `ERROR`: the message a runtime trap (shape
    /// mismatch, failed assertion, ...) reports, carrying the source
    /// location of the check that failed (spec.md §3 "Runtime-triggered
    /// errors... are compiled into explicit ERROR instructions whose single
    /// operand is the string message").
    pub error_message: Option<String>,
    /// Source back-reference for diagnostics (spec.md §3).
    pub creator: Option<NodeId>,
}

impl Instruction {
    pub fn new(opcode: Opcode, operands: Vec<Operand>) -> Self {
        Instruction {
            opcode,
            operands,
            syscall_name: None,
            syscall_operands: Vec::new(),
            call_callee: None,
            retclean_call: None,
            error_message: None,
            creator: None,
        }
    }

    pub fn with_creator(mut self, creator: NodeId) -> Self {
        self.creator = Some(creator);
        self
    }

    pub fn with_error_message(mut self, message: String) -> Self {
        self.error_message = Some(message);
        self
    }

    pub fn dest(&self) -> Option<Operand> {
        self.opcode.writes_dest().then(|| self.operands[0])
    }

    pub fn set_dest(&mut self, dest: Operand) {
        assert!(self.opcode.writes_dest());
        self.operands[0] = dest;
    }

    /// Arguments after the destination (empty if `opcode` has none).
    pub fn args(&self) -> &[Operand] {
        if self.opcode.writes_dest() {
            &self.operands[1..]
        } else {
            &self.operands[..]
        }
    }

    /// `jumpDest`: the label destination of a jump-family instruction.
    pub fn jump_target(&self) -> Option<SymbolId> {
        if !self.opcode.is_jump() {
            return None;
        }
        self.operands.first().and_then(|op| op.as_symbol())
    }

    /// The USE range: symbols read by this instruction (spec.md §3).
    /// Ported from `Imop::useRange`, plus the "private destination under a
    /// non-defining opcode counts as a use" adjustment (GLOSSARY "Use /
    /// def") — the other half of the rule `defs()` applies by removing that
    /// same symbol from the DEF set. `dest_security` mirrors `defs()`'s
    /// parameter.
    pub fn uses(&self, dest_security: impl Fn(SymbolId) -> Option<SecurityType>) -> Vec<SymbolId> {
        use Opcode::*;
        let mut out = Vec::new();
        match self.opcode {
            Declare | Comment | End => {}
            Store => {
                // d[arg1] = arg2 {arg3}: all operands including `d` are read.
                out.extend(self.operands.iter().filter_map(|o| o.as_symbol()));
            }
            Jt | Jf => {
                // operands = [label, cond]; only `cond` is read.
                if let Some(cond) = self.operands.get(1).and_then(|o| o.as_symbol()) {
                    out.push(cond);
                }
            }
            Jump => {}
            Call => {
                // dest_0..dest_k, callee-marker(skipped), arg_0..arg_n: only
                // the trailing arguments (after the nullptr separator) are
                // uses; the leading ret-slots are defs. `args()` can't be
                // used here (it only strips a leading dest for
                // `writes_dest()` opcodes, and `Call` isn't one), so the
                // separator is found explicitly.
                let mut past_separator = false;
                for op in &self.operands {
                    if past_separator {
                        if let Some(s) = op.as_symbol() {
                            out.push(s);
                        }
                    } else if op.is_literal() {
                        past_separator = true;
                    }
                }
            }
            Return => {
                out.extend(self.operands.iter().filter_map(|o| o.as_symbol()));
            }
            Error => {}
            RetClean => {}
            Print => {
                out.extend(self.operands.iter().filter_map(|o| o.as_symbol()));
            }
            Syscall => {
                for so in &self.syscall_operands {
                    if !matches!(so.role, SyscallRole::Return) {
                        if let Some(s) = so.operand.as_symbol() {
                            out.push(s);
                        }
                    }
                }
            }
            _ if self.opcode.writes_dest() => {
                out.extend(self.args().iter().filter_map(|o| o.as_symbol()));
                if let Some(Operand::Symbol(id)) = self.dest() {
                    let define_on_private = matches!(self.opcode, Classify | Declassify | Declare);
                    let is_private = dest_security(id).map(|s| !s.is_public()).unwrap_or(false);
                    if is_private && !define_on_private {
                        out.push(id);
                    }
                }
            }
            _ => {
                out.extend(self.operands.iter().filter_map(|o| o.as_symbol()));
            }
        }
        out
    }

    /// The DEF range: symbols written by this instruction, after the
    /// "private destination under a non-defining opcode counts as a use"
    /// adjustment (spec.md §3 GLOSSARY "Use / def"). `dest_security` is
    /// supplied by the caller (it needs the symbol table to look up the
    /// destination's type).
    pub fn defs(&self, dest_security: impl Fn(SymbolId) -> Option<SecurityType>) -> Vec<SymbolId> {
        use Opcode::*;
        let mut out = Vec::new();
        match self.opcode {
            Call => {
                // Leading operands up to (not including) the `None`
                // separator are return slots.
                for op in &self.operands {
                    match op {
                        Operand::Symbol(_) => {}
                        Operand::Literal(_) => break,
                    }
                    if let Some(s) = op.as_symbol() {
                        out.push(s);
                    } else {
                        break;
                    }
                }
            }
            Syscall => {
                for so in &self.syscall_operands {
                    if matches!(so.role, SyscallRole::Return) {
                        if let Some(s) = so.operand.as_symbol() {
                            out.push(s);
                        }
                    }
                }
            }
            _ if self.opcode.writes_dest() => {
                if let Some(Operand::Symbol(id)) = self.dest() {
                    let define_on_private = matches!(self.opcode, Classify | Declassify | Declare);
                    let is_private = dest_security(id).map(|s| !s.is_public()).unwrap_or(false);
                    if is_private && !define_on_private {
                        // Reclassified as a use (spec.md §3 "special rule").
                    } else {
                        out.push(id);
                    }
                }
            }
            _ => {}
        }
        out
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.opcode)?;
        for op in &self.operands {
            write!(f, " {op}")?;
        }
        if let Some(msg) = &self.error_message {
            write!(f, " {msg:?}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::opcode::Opcode;
    use crate::symbol::SymbolId;

    #[test]
    fn public_add_defs_destination() {
        let instr = Instruction::new(
            Opcode::Add,
            vec![Operand::Symbol(SymbolId(0)), Operand::Symbol(SymbolId(1)), Operand::Symbol(SymbolId(2))],
        );
        let defs = instr.defs(|_| Some(SecurityType::Public));
        assert_eq!(defs, vec![SymbolId(0)]);
        assert_eq!(instr.uses(|_| Some(SecurityType::Public)), vec![SymbolId(1), SymbolId(2)]);
    }

    #[test]
    fn private_destination_is_reclassified_as_use() {
        let dom = SymbolId(9);
        let instr = Instruction::new(
            Opcode::Add,
            vec![Operand::Symbol(SymbolId(0)), Operand::Symbol(SymbolId(1)), Operand::Symbol(SymbolId(2))],
        );
        let dest_security = |_: SymbolId| Some(SecurityType::Private(dom));
        let defs = instr.defs(dest_security);
        assert!(defs.is_empty());
        assert_eq!(instr.uses(dest_security), vec![SymbolId(1), SymbolId(2), SymbolId(0)]);
    }

    #[test]
    fn classify_defines_private_destination_despite_the_rule() {
        let dom = SymbolId(9);
        let instr = Instruction::new(Opcode::Classify, vec![Operand::Symbol(SymbolId(0)), Operand::Symbol(SymbolId(1))]);
        let dest_security = |_: SymbolId| Some(SecurityType::Private(dom));
        let defs = instr.defs(dest_security);
        assert_eq!(defs, vec![SymbolId(0)]);
        assert_eq!(
            instr.uses(dest_security),
            vec![SymbolId(1)],
            "classify always defines its destination, so it's never folded into uses"
        );
    }
}
