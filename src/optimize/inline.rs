//! Call-site inlining, grounded on `original_source/src/libscc/optimizer/
//! Inline.cpp`'s `Inliner`/`shouldInline`.
//!
//! The original clones a callee's whole (possibly multi-block) body,
//! splitting and re-threading jumps as it goes, and binds arguments through
//! its `PARAM` opcode. This codegen never emits a `PARAM`-style binding
//! instruction (spec.md's codegen only `DECLARE`s parameters) and
//! `SymbolTable::new_temporary` always produces scalar symbols, so cloning
//! an arbitrary multi-block, array-touching callee body is not safe here.
//! This scopes inlining to non-recursive, single-block callees under the
//! instruction threshold whose body touches no array-backed symbol —
//! `crate::optimize::structural::remove_empty_procedures` drops a callee
//! left with no remaining callers afterward.

use std::collections::HashMap;

use crate::cfg::{BlockId, EdgeLabel, Program};
use crate::ir::{InstrId, InstrList, Opcode, Operand};
use crate::symbol::{Symbol, SymbolId, SymbolTable};

/// Opcodes a single-block callee body may contain besides its trailing
/// `RETURN` for this pass to consider cloning it at all.
fn eligible_opcode(op: Opcode) -> bool {
    use Opcode::*;
    matches!(
        op,
        Declare
            | Assign
            | Cast
            | Classify
            | Declassify
            | BitNot
            | Not
            | Neg
            | ToString
            | StrLen
            | Mul
            | Div
            | Mod
            | Add
            | Sub
            | Eq
            | Ne
            | Le
            | Lt
            | Ge
            | Gt
            | And
            | Or
            | BitAnd
            | BitOr
            | BitXor
            | Shl
            | Shr
            | Release
            | DomainId
            | Comment
            | Print
    )
}

fn is_array_symbol(symtab: &SymbolTable, sym: SymbolId) -> bool {
    match symtab.get(sym) {
        Symbol::Variable(v) | Symbol::Temporary(v) => v.is_array(),
        _ => false,
    }
}

fn body_references_array(symtab: &SymbolTable, instrs: &InstrList, body: &[InstrId]) -> bool {
    body.iter().any(|&id| instrs.get(id).operands.iter().filter_map(|o| o.as_symbol()).any(|s| is_array_symbol(symtab, s)))
}

struct Candidate {
    call_block: BlockId,
    call_id: InstrId,
    clean_block: BlockId,
    retclean_id: InstrId,
    callee_proc: crate::cfg::ProcId,
    params: Vec<SymbolId>,
    ret: Option<SymbolId>,
    body: Vec<InstrId>,
}

fn find_candidates(program: &Program, instrs: &InstrList, symtab: &SymbolTable, threshold: usize) -> Vec<Candidate> {
    let mut out = Vec::new();
    for b in program.reachable_blocks() {
        for &id in &program.block(b).instructions {
            let instr = instrs.get(id);
            if instr.opcode != Opcode::Call {
                continue;
            }
            let Some(callee) = instr.call_callee else { continue };
            let Symbol::Procedure(p) = symtab.get(callee) else { continue };
            if p.name == "main" {
                continue;
            }
            let Some(callee_proc) = program.proc_order.iter().copied().find(|&pid| program.proc(pid).symbol == Some(callee)) else { continue };
            if program.proc(callee_proc).blocks.len() != 1 {
                continue;
            }
            let Some(entry) = program.proc(callee_proc).entry else { continue };
            if !program.block(entry).reachable {
                continue;
            }

            let body: Vec<InstrId> = program.block(entry).instructions.clone();
            let Some((&last, rest)) = body.split_last() else { continue };
            if instrs.get(last).opcode != Opcode::Return {
                continue;
            }
            if !rest.iter().all(|&id| eligible_opcode(instrs.get(id).opcode)) {
                continue;
            }
            if body_references_array(symtab, instrs, &body) {
                continue;
            }
            let recursive = body.iter().any(|&bid| {
                let bi = instrs.get(bid);
                bi.opcode == Opcode::Call && bi.call_callee == Some(callee)
            });
            if recursive {
                continue;
            }

            let dest_security = |sym: SymbolId| symtab.get(sym).ty().map(|t| t.security());
            let cost = instr.uses(dest_security).len() + body.len();
            if cost >= threshold {
                continue;
            }

            let Some(clean_block) = program.block(b).out_edges.iter().find(|(l, _)| *l == EdgeLabel::CallPass).map(|&(_, to)| to) else { continue };
            let Some(retclean_id) = program.block(clean_block).instructions.iter().copied().find(|&rid| {
                let r = instrs.get(rid);
                r.opcode == Opcode::RetClean && r.retclean_call == Some(id)
            }) else {
                continue;
            };

            let ret = instrs.get(last).operands.first().and_then(|op| op.as_symbol());

            out.push(Candidate { call_block: b, call_id: id, clean_block, retclean_id, callee_proc, params: p.params.clone(), ret, body });
        }
    }
    out
}

/// `CALL`'s leading return-slot symbol (`Instruction::defs`'s `Call` arm
/// strips the privacy reclassification that rule doesn't apply to `Call`
/// operands anyway; `dest()` itself is useless here since `Call.writes_dest()`
/// is `false`).
fn call_ret_slot(call: &crate::ir::Instruction) -> Option<SymbolId> {
    for op in &call.operands {
        match op {
            Operand::Symbol(s) => return Some(*s),
            Operand::Literal(_) => return None,
        }
    }
    None
}

fn clone_operand(sym_map: &HashMap<SymbolId, SymbolId>, op: Operand) -> Operand {
    match op {
        Operand::Symbol(s) => Operand::Symbol(sym_map.get(&s).copied().unwrap_or(s)),
        Operand::Literal(_) => op,
    }
}

/// Splices `candidate`'s callee body into its call site, dissolving the
/// `RETCLEAN` block into the call's block (`mergeCallSucc` in the
/// original), and returns whether the inline actually happened.
fn inline_one(program: &mut Program, instrs: &mut InstrList, symtab: &mut SymbolTable, candidate: &Candidate) {
    let Candidate { call_block, call_id, clean_block, retclean_id, callee_proc, params, ret, body } = candidate;
    let call_instr = instrs.get(*call_id).clone();
    let args = call_instr.uses(|sym: SymbolId| symtab.get(sym).ty().map(|t| t.security()));
    let param_set: std::collections::HashSet<SymbolId> = params.iter().copied().collect();

    let mut sym_map: HashMap<SymbolId, SymbolId> = HashMap::new();
    for (&param, &arg) in params.iter().zip(args.iter()) {
        sym_map.insert(param, arg);
    }

    let mut cloned = Vec::new();
    for &id in body.iter() {
        let instr = instrs.get(id);
        if instr.opcode == Opcode::Return {
            continue;
        }
        if instr.opcode == Opcode::Declare {
            if let Some(Operand::Symbol(dest)) = instr.dest() {
                if param_set.contains(&dest) {
                    continue;
                }
            }
        }

        let mut new_operands = Vec::new();
        if instr.opcode.writes_dest() {
            if let Some(Operand::Symbol(dest)) = instr.dest() {
                let new_dest = if let Some(&existing) = sym_map.get(&dest) {
                    existing
                } else {
                    let ty = symtab.get(dest).ty().unwrap_or_else(crate::types::Type::void);
                    let fresh = symtab.new_temporary(ty);
                    sym_map.insert(dest, fresh);
                    fresh
                };
                new_operands.push(Operand::Symbol(new_dest));
            }
            for &op in instr.args() {
                new_operands.push(clone_operand(&sym_map, op));
            }
        } else {
            for &op in &instr.operands {
                new_operands.push(clone_operand(&sym_map, op));
            }
        }

        let mut new_instr = crate::ir::Instruction::new(instr.opcode, new_operands);
        new_instr.creator = instr.creator;
        cloned.push(instrs.push(new_instr));
    }

    if let (Some(call_dest), Some(ret_sym)) = (call_ret_slot(&call_instr), ret) {
        let translated = sym_map.get(ret_sym).copied().unwrap_or(*ret_sym);
        let assign = crate::ir::Instruction::new(Opcode::Assign, vec![Operand::Symbol(call_dest), Operand::Symbol(translated)]);
        cloned.push(instrs.push(assign));
    }

    // Splice the clone in place of the CALL, dropping the call and the
    // clean block's RETCLEAN; the rest of the clean block's instructions
    // move into the call's block right after the clone.
    let clean_rest: Vec<InstrId> = program.block(*clean_block).instructions.iter().copied().filter(|&id| id != *retclean_id).collect();
    {
        let block = program.block_mut(*call_block);
        let pos = block.instructions.iter().position(|&id| id == *call_id).expect("call still owns its instruction");
        let mut new_instructions = block.instructions[..pos].to_vec();
        new_instructions.extend(cloned);
        new_instructions.extend(clean_rest);
        block.instructions = new_instructions;
    }
    program.block_mut(*clean_block).instructions.clear();

    // Remove Call/CallPass edges between the call block and the callee.
    let entry = program.proc(*callee_proc).entry.unwrap();
    program.block_mut(*call_block).out_edges.retain(|&(l, to)| !(l == EdgeLabel::Call && to == entry) && !(l == EdgeLabel::CallPass && to == *clean_block));
    program.block_mut(entry).in_edges.retain(|&(l, from)| !(l == EdgeLabel::Call && from == *call_block));
    program.proc_mut(*callee_proc).call_from.remove(call_block);

    // Move the clean block's outgoing edges onto the call block, and any
    // Ret edges from the callee's exits straight onto the call block too.
    let clean_out: Vec<(EdgeLabel, BlockId)> = program.block(*clean_block).out_edges.drain(..).collect();
    for (label, to) in &clean_out {
        program.block_mut(*call_block).out_edges.push((*label, *to));
        let target = program.block_mut(*to);
        target.in_edges.retain(|&(l, from)| !(l == *label && from == *clean_block));
        target.in_edges.push((*label, *call_block));
    }

    let exits: Vec<BlockId> = program.proc(*callee_proc).exits.iter().copied().collect();
    for exit in exits {
        program.block_mut(exit).out_edges.retain(|&(l, to)| !(l == EdgeLabel::Ret && to == *clean_block));
    }
    program.proc_mut(*callee_proc).return_to.remove(clean_block);
}

/// Inlines at most one call per invocation: inlining one candidate can
/// dissolve a block another candidate's bookkeeping pointed at (e.g. a
/// chain of two calls whose clean blocks and call blocks coincide), so the
/// fixed-point loop in `crate::optimize::optimize` re-finds candidates
/// against fresh CFG state after every successful inline instead.
pub(crate) fn inline_small_callees(program: &mut Program, instrs: &mut InstrList, symtab: &mut SymbolTable, threshold: usize) -> usize {
    let candidates = find_candidates(program, instrs, symtab, threshold);
    match candidates.first() {
        Some(candidate) => {
            inline_one(program, instrs, symtab, candidate);
            1
        }
        None => 0,
    }
}
