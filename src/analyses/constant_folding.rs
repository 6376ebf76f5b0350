//! Constant folding (forward), grounded on `original_source/src/libscc/
//! analysis/ConstantFolding.h`'s three-level `Value` lattice ({UNDEF,
//! CONSTANT, NAC}) and `original_source/src/libscc/optimizer/
//! ConstantFolding.cpp`'s driver loop (`eliminateConstantExpressions`).
//!
//! The original represents a constant as an opaque `AbstractValue*`
//! produced by a `ValueFactory`; here a constant is just the `Literal`
//! already carried by `crate::ir::Operand`; no separate value-interning
//! table is needed since `Literal` is `Copy` and cheap to compare directly.

use std::collections::HashMap;

use crate::cfg::{BlockId, EdgeLabel};
use crate::dataflow::{Analysis, AnalysisCtx, Direction};
use crate::ir::{Instruction, Literal, Opcode, Operand};
use crate::symbol::SymbolId;
use crate::types::data::PrimitiveType;

/// `Value` from the original: `Undef` is the lattice bottom (not yet
/// visited / unreachable), `NotAConstant` is top, `Constant` sits between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstValue {
    Undef,
    Constant(Literal),
    NotAConstant,
}

impl ConstValue {
    /// Lattice meet: equal constants stay constant, anything else collapses
    /// towards `NotAConstant` (the usual three-level meet the original's
    /// `operator<` comment notes is *not* itself the lattice order).
    pub fn meet(self, other: ConstValue) -> ConstValue {
        use ConstValue::*;
        match (self, other) {
            (Undef, x) | (x, Undef) => x,
            (Constant(a), Constant(b)) if a == b => Constant(a),
            _ => NotAConstant,
        }
    }
}

pub type ConstFact = HashMap<SymbolId, ConstValue>;

fn operand_value(facts: &ConstFact, op: Operand) -> ConstValue {
    match op {
        Operand::Literal(lit) => ConstValue::Constant(lit),
        Operand::Symbol(sym) => facts.get(&sym).copied().unwrap_or(ConstValue::Undef),
    }
}

fn as_bool(v: ConstValue) -> Option<bool> {
    match v {
        ConstValue::Constant(lit) => lit.as_bool(),
        _ => None,
    }
}

fn as_int(v: ConstValue) -> Option<i128> {
    match v {
        ConstValue::Constant(lit) => lit.as_i128(),
        _ => None,
    }
}

fn as_float(v: ConstValue) -> Option<f64> {
    match v {
        ConstValue::Constant(lit) => lit.as_f64(),
        _ => None,
    }
}

/// Evaluates a pure opcode given its already-resolved operand values,
/// returning `None` when the opcode isn't foldable or an operand isn't
/// (yet) constant. Mirrors the arithmetic/logical/bitwise/shift group
/// `Opcode::is_expr` already names, minus `Cast`/`Classify`/`Declassify`/
/// `ToString`/`StrLen` (security- or representation-changing, not pure
/// value computation in the sense spec.md §4.8 describes).
fn fold(opcode: Opcode, ty: PrimitiveType, args: &[ConstValue]) -> Option<Literal> {
    use Opcode::*;
    match opcode {
        Assign => match args.first()? {
            ConstValue::Constant(lit) => Some(*lit),
            _ => None,
        },
        Neg => {
            if ty.is_integer() {
                Some(Literal::int(-as_int(args[0])?, ty))
            } else {
                Some(Literal::float(-as_float(args[0])?, ty))
            }
        }
        Not => Some(Literal::bool(!as_bool(args[0])?)),
        BitNot => Some(Literal::int(!as_int(args[0])?, ty)),
        Add | Sub | Mul | Div | Mod => {
            let (a, b) = (args[0], args[1]);
            if ty.is_integer() {
                let (x, y) = (as_int(a)?, as_int(b)?);
                let r = match opcode {
                    Add => x.checked_add(y)?,
                    Sub => x.checked_sub(y)?,
                    Mul => x.checked_mul(y)?,
                    Div => {
                        if y == 0 {
                            return None;
                        }
                        x.checked_div(y)?
                    }
                    Mod => {
                        if y == 0 {
                            return None;
                        }
                        x.checked_rem(y)?
                    }
                    _ => unreachable!(),
                };
                Some(Literal::int(r, ty))
            } else {
                let (x, y) = (as_float(a)?, as_float(b)?);
                let r = match opcode {
                    Add => x + y,
                    Sub => x - y,
                    Mul => x * y,
                    Div => x / y,
                    Mod => x % y,
                    _ => unreachable!(),
                };
                Some(Literal::float(r, ty))
            }
        }
        Eq | Ne | Le | Lt | Ge | Gt => {
            let (a, b) = (args[0], args[1]);
            let ord = if let (Some(x), Some(y)) = (as_int(a), as_int(b)) {
                x.partial_cmp(&y)?
            } else {
                as_float(a)?.partial_cmp(&as_float(b)?)?
            };
            use std::cmp::Ordering::*;
            let r = match opcode {
                Eq => ord == Equal,
                Ne => ord != Equal,
                Le => ord != Greater,
                Lt => ord == Less,
                Ge => ord != Less,
                Gt => ord == Greater,
                _ => unreachable!(),
            };
            Some(Literal::bool(r))
        }
        And => Some(Literal::bool(as_bool(args[0])? && as_bool(args[1])?)),
        Or => Some(Literal::bool(as_bool(args[0])? || as_bool(args[1])?)),
        BitAnd => Some(Literal::int(as_int(args[0])? & as_int(args[1])?, ty)),
        BitOr => Some(Literal::int(as_int(args[0])? | as_int(args[1])?, ty)),
        BitXor => Some(Literal::int(as_int(args[0])? ^ as_int(args[1])?, ty)),
        Shl => Some(Literal::int(as_int(args[0])?.checked_shl(as_int(args[1])? as u32)?, ty)),
        Shr => Some(Literal::int(as_int(args[0])?.checked_shr(as_int(args[1])? as u32)?, ty)),
        _ => None,
    }
}

#[derive(Debug, Default)]
pub struct ConstantFolding;

impl Analysis for ConstantFolding {
    type Fact = ConstFact;

    fn direction(&self) -> Direction {
        Direction::Forward
    }

    fn bottom(&self) -> Self::Fact {
        ConstFact::new()
    }

    fn merge(&self, ctx: &AnalysisCtx, into: &mut Self::Fact, other: &Self::Fact, label: EdgeLabel) {
        for (&sym, &val) in other {
            if label.is_global() && !super::is_global(ctx.symtab, sym) {
                continue;
            }
            let entry = into.entry(sym).or_insert(ConstValue::Undef);
            *entry = entry.meet(val);
        }
    }

    fn transfer(&mut self, ctx: &AnalysisCtx, block: BlockId, input: &Self::Fact) -> Self::Fact {
        let mut facts = input.clone();
        for &instr_id in ctx.program.block(block).instructions.iter() {
            let instr = ctx.instrs.get(instr_id);
            step(ctx, instr, &mut facts);
        }
        facts
    }
}

/// Evaluates one instruction's effect on `facts`. `pub(crate)` so
/// `crate::optimize` can replay it when rewriting a block in place after
/// the analysis reaches a fixed point.
pub(crate) fn step(ctx: &AnalysisCtx, instr: &Instruction, facts: &mut ConstFact) {
    let dest_security = |sym: SymbolId| ctx.symtab.get(sym).ty().map(|t| t.security());
    let defined = instr.defs(dest_security);

    if !instr.opcode.writes_dest() {
        // CALL/SYSCALL-style destinations: definitely redefined, never
        // statically known here.
        for d in defined {
            facts.insert(d, ConstValue::NotAConstant);
        }
        return;
    }

    let Some(Operand::Symbol(dest)) = instr.dest() else { return };
    if !defined.contains(&dest) {
        // Private destination reclassified as a use (spec.md §3): leave
        // whatever fact it already has untouched.
        return;
    }

    let ty = ctx
        .symtab
        .get(dest)
        .ty()
        .and_then(|t| match t.data() {
            crate::types::data::DataType::Primitive(p) => Some(*p),
            _ => None,
        })
        .unwrap_or(PrimitiveType::Int64);
    let args: Vec<ConstValue> = instr.args().iter().map(|&op| operand_value(facts, op)).collect();
    let value = if args.iter().all(|v| !matches!(v, ConstValue::Undef)) {
        match fold(instr.opcode, ty, &args) {
            Some(lit) => ConstValue::Constant(lit),
            None => ConstValue::NotAConstant,
        }
    } else if args.iter().any(|v| matches!(v, ConstValue::NotAConstant)) {
        ConstValue::NotAConstant
    } else {
        ConstValue::Undef
    };
    facts.insert(dest, value);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cfg::ProcBoundary;
    use crate::ir::{InstrList, Instruction};
    use crate::symbol::SymbolTable;
    use crate::types::{SecurityType, Type};

    #[test]
    fn add_of_two_literals_is_constant() {
        let mut symtab = SymbolTable::new();
        let mut instrs = InstrList::new();
        let ty = Type::new(SecurityType::Public, crate::types::data::DataType::Primitive(PrimitiveType::Int64), 0);
        let dest = symtab.new_temporary(ty);
        instrs.push(Instruction::new(
            Opcode::Add,
            vec![Operand::Symbol(dest), Operand::Literal(Literal::int(2, PrimitiveType::Int64)), Operand::Literal(Literal::int(3, PrimitiveType::Int64))],
        ));
        instrs.push(Instruction::new(Opcode::End, vec![]));

        let program = crate::cfg::build(&instrs, &[ProcBoundary { symbol: None, start: 0 }], &symtab);
        let ctx = AnalysisCtx { program: &program, instrs: &instrs, symtab: &symtab };
        let mut analysis = ConstantFolding;
        let results = crate::dataflow::run_sequential(&ctx, &mut analysis);
        let entry = program.entry_proc();
        let block = program.proc(entry).entry.unwrap();
        let out = &results.out[&block];
        assert_eq!(out.get(&dest), Some(&ConstValue::Constant(Literal::int(5, PrimitiveType::Int64))));
    }

    #[test]
    fn division_by_zero_is_not_a_constant() {
        let mut symtab = SymbolTable::new();
        let mut instrs = InstrList::new();
        let ty = Type::new(SecurityType::Public, crate::types::data::DataType::Primitive(PrimitiveType::Int64), 0);
        let dest = symtab.new_temporary(ty);
        instrs.push(Instruction::new(
            Opcode::Div,
            vec![Operand::Symbol(dest), Operand::Literal(Literal::int(2, PrimitiveType::Int64)), Operand::Literal(Literal::int(0, PrimitiveType::Int64))],
        ));
        instrs.push(Instruction::new(Opcode::End, vec![]));

        let program = crate::cfg::build(&instrs, &[ProcBoundary { symbol: None, start: 0 }], &symtab);
        let ctx = AnalysisCtx { program: &program, instrs: &instrs, symtab: &symtab };
        let mut analysis = ConstantFolding;
        let results = crate::dataflow::run_sequential(&ctx, &mut analysis);
        let entry = program.entry_proc();
        let block = program.proc(entry).entry.unwrap();
        assert_eq!(results.out[&block].get(&dest), Some(&ConstValue::NotAConstant));
    }
}
