//! Type checker configuration (SPEC_FULL.md §4.3b).
//!
//! Grounded on the teacher's `precompiler/options.rs`/`decompiler/options.rs`
//! one-field options structs: small, `Default`-able, passed by value into
//! the phase that reads them rather than threaded through global state.

/// Ambient configuration for one `TypeChecker` run. Neither field is a
/// feature spec.md's Non-goals exclude — both are knobs on how the checker
/// reports its results, not on what it checks.
#[derive(Debug, Clone, Copy)]
pub struct TypeCheckOptions {
    /// Stop checking (return `Status::ErrorFatal`) after this many errors.
    /// `None` means unbounded (spec.md §7 "sibling subtrees may still be
    /// processed so more errors can be reported in one run").
    pub max_errors: Option<usize>,
    pub warnings_as_errors: bool,
}

impl Default for TypeCheckOptions {
    fn default() -> Self {
        TypeCheckOptions { max_errors: None, warnings_as_errors: false }
    }
}
