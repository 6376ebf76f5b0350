//! Concrete dataflow analyses (C9, spec.md §4.8).
//!
//! Grounded on `original_source/src/libscc/analysis/{LiveVariables,
//! LiveMemory,ConstantFolding,ReachableDefinitions,ReachableUses,
//! ReachableReturns,CopyPropagation}.{h,cpp}`: each analysis there is its
//! own `DataFlowAnalysis` subclass with a hand-written `gen`/`kill` visitor;
//! here each is instead one `crate::dataflow::Analysis` impl parameterized
//! over the `Fact` the shared worklist in `dataflow::run_sequential`
//! already drives to a fixed point.

pub mod constant_folding;
pub mod copy_propagation;
pub mod live_memory;
pub mod live_variables;
pub mod reachable;

pub use constant_folding::{ConstValue, ConstantFolding};
pub use copy_propagation::CopyPropagation;
pub use live_memory::{LiveMemory, MemDomain};
pub use live_variables::LiveVariables;
pub use reachable::{ReachableDefinitions, ReachableReturns, ReachableUses};

use crate::symbol::{Storage, Symbol, SymbolId, SymbolTable};

/// `Symbol::isGlobal` from `original_source/src/libscc/Symbol.h`: only
/// variables/temporaries carry storage class, everything else (labels,
/// constants, procedures, ...) is never a dataflow fact and is treated as
/// not global.
pub(crate) fn is_global(symtab: &SymbolTable, sym: SymbolId) -> bool {
    match symtab.get(sym) {
        Symbol::Variable(v) | Symbol::Temporary(v) => v.storage == Storage::Global,
        _ => false,
    }
}
