//! Basic blocks, edges and procedures (spec.md §3 "Blocks, edges,
//! procedures, program").
//!
//! Grounded on `original_source/src/libscc/Blocks.h` (`Edge::Label`,
//! `Block`, `Procedure`, `Program`), restated per spec.md Design Notes:
//! the intrusive pointer graph becomes an arena keyed by `Handle`, and
//! per-block edge sets become explicit `Vec<(EdgeLabel, BlockId)>` pairs
//! instead of heterogeneous `boost::intrusive` hooks.

use std::collections::BTreeSet;
use std::fmt;

use crate::ir::InstrId;
use crate::symbol::SymbolId;
use crate::utils::arena::Handle;

pub type BlockId = Handle<Block>;
pub type ProcId = Handle<Procedure>;

/// CFG edge kinds (spec.md §3). `Jump`/`True`/`False`/`CallPass` are local;
/// `Call`/`Ret` are global (cross-procedure).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EdgeLabel {
    Jump,
    True,
    False,
    Call,
    Ret,
    CallPass,
}

impl EdgeLabel {
    pub fn is_local(self) -> bool {
        matches!(self, EdgeLabel::Jump | EdgeLabel::True | EdgeLabel::False | EdgeLabel::CallPass)
    }

    pub fn is_global(self) -> bool {
        matches!(self, EdgeLabel::Call | EdgeLabel::Ret)
    }
}

impl fmt::Display for EdgeLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EdgeLabel::Jump => "jump",
            EdgeLabel::True => "true",
            EdgeLabel::False => "false",
            EdgeLabel::Call => "call",
            EdgeLabel::Ret => "ret",
            EdgeLabel::CallPass => "call-pass",
        };
        f.write_str(s)
    }
}

/// A maximal run of instructions with a single entry and single exit
/// (spec.md §3, GLOSSARY "Basic block"). Instructions are referenced by
/// `InstrId`, not owned here (spec.md §3: "Instructions and blocks are
/// created by C6 and C7, mutated by C10").
#[derive(Debug, Clone, Default)]
pub struct Block {
    pub instructions: Vec<InstrId>,
    pub proc: Option<ProcId>,
    /// Depth-first number (spec.md §3, GLOSSARY "Depth-first number").
    pub dfn: u32,
    /// Unreachable blocks are retained but excluded from analyses (spec.md
    /// §3 invariant).
    pub reachable: bool,
    pub out_edges: Vec<(EdgeLabel, BlockId)>,
    pub in_edges: Vec<(EdgeLabel, BlockId)>,
}

impl Block {
    pub fn out_edges_with(&self, label: EdgeLabel) -> impl Iterator<Item = BlockId> + '_ {
        self.out_edges.iter().filter(move |(l, _)| *l == label).map(|(_, b)| *b)
    }

    pub fn in_edges_with(&self, label: EdgeLabel) -> impl Iterator<Item = BlockId> + '_ {
        self.in_edges.iter().filter(move |(l, _)| *l == label).map(|(_, b)| *b)
    }

    pub fn local_predecessors(&self) -> impl Iterator<Item = BlockId> + '_ {
        self.in_edges.iter().filter(|(l, _)| l.is_local()).map(|(_, b)| *b)
    }

    pub fn local_successors(&self) -> impl Iterator<Item = BlockId> + '_ {
        self.out_edges.iter().filter(|(l, _)| l.is_local()).map(|(_, b)| *b)
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }
}

/// Owns the blocks of one procedure (spec.md §3): entry block, exit-block
/// set, the set of blocks that call into it, and the set of blocks its
/// returns go to.
#[derive(Debug, Clone, Default)]
pub struct Procedure {
    /// `None` for the anonymous top-level procedure that holds global
    /// initialization (spec.md §3 "A program owns its procedures, leading
    /// with an anonymous procedure").
    pub symbol: Option<SymbolId>,
    pub blocks: Vec<BlockId>,
    pub entry: Option<BlockId>,
    pub exits: BTreeSet<BlockId>,
    pub call_from: BTreeSet<BlockId>,
    pub return_to: BTreeSet<BlockId>,
}

impl Procedure {
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}
