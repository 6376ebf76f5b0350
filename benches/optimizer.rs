use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use secrec_core::cfg::{self, ProcBoundary};
use secrec_core::ir::{Instruction, InstrList, Literal, Opcode, Operand};
use secrec_core::optimize::{optimize, OptimizeOptions};
use secrec_core::symbol::SymbolTable;
use secrec_core::types::data::{DataType, PrimitiveType};
use secrec_core::types::{SecurityType, Type};

/// Builds a straight-line procedure with `n` redundant copy/constant chains:
/// `DECLARE a, b`; `a = 41 + 1`; `b = a`; `PRINT b` repeated, followed by an
/// `END`. Every copy is dead by the time the next iteration's `DECLARE`
/// shadows it, so the optimizer's fixed-point loop has real work on every
/// pass instead of converging after one.
fn build_program(n: usize) -> (InstrList, SymbolTable, cfg::Program) {
    let mut symtab = SymbolTable::new();
    let mut instrs = InstrList::new();
    let int_ty = Type::new(SecurityType::Public, DataType::Primitive(PrimitiveType::Int64), 0);

    for _ in 0..n {
        let a = symtab.new_temporary(int_ty);
        let b = symtab.new_temporary(int_ty);
        instrs.push(Instruction::new(Opcode::Declare, vec![Operand::Symbol(a)]));
        instrs.push(Instruction::new(Opcode::Declare, vec![Operand::Symbol(b)]));
        instrs.push(Instruction::new(
            Opcode::Add,
            vec![Operand::Symbol(a), Operand::Literal(Literal::int(41, PrimitiveType::Int64)), Operand::Literal(Literal::int(1, PrimitiveType::Int64))],
        ));
        instrs.push(Instruction::new(Opcode::Copy, vec![Operand::Symbol(b), Operand::Symbol(a)]));
        instrs.push(Instruction::new(Opcode::Print, vec![Operand::Symbol(b)]));
        instrs.push(Instruction::new(Opcode::Release, vec![Operand::Symbol(b)]));
        instrs.push(Instruction::new(Opcode::Release, vec![Operand::Symbol(a)]));
    }
    instrs.push(Instruction::new(Opcode::End, vec![]));

    let program = cfg::build(&instrs, &[ProcBoundary { symbol: None, start: 0 }], &symtab);
    (instrs, symtab, program)
}

fn bench_optimize_size(c: &mut Criterion, size: usize) {
    c.bench_with_input(BenchmarkId::new("optimize fixed-point loop", size), &size, |b, &size| {
        b.iter_batched(
            || build_program(size),
            |(mut instrs, mut symtab, mut program)| {
                let report = optimize(black_box(&mut program), black_box(&mut instrs), black_box(&mut symtab), &OptimizeOptions::default());
                black_box(report);
            },
            criterion::BatchSize::SmallInput,
        )
    });
}

fn bench_optimize(c: &mut Criterion) {
    for &size in &[8usize, 64, 256] {
        bench_optimize_size(c, size);
    }
}

criterion_group!(optimizer, bench_optimize);
criterion_main!(optimizer);
