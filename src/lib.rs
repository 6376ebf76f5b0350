//! SecreC compiler middle-end core: type checker, template/operator
//! instantiation, IR lowering, CFG construction, dataflow framework and
//! optimizer. See `README.md`/`DESIGN.md` for module grounding.

pub mod analyses;
pub mod ast;
pub mod cfg;
pub mod codegen;
pub mod dataflow;
pub mod diagnostics;
pub mod error;
pub mod instantiate;
pub mod ir;
pub mod location;
pub mod module_map;
pub mod optimize;
pub mod symbol;
pub mod typecheck;
pub mod types;
pub mod utils;
