//! Error taxonomy (spec.md §7) and the three-valued phase status.
//!
//! Grounded on the teacher's `compiler/error.rs` (`CompilerError` enum,
//! `Display` impl broken out by variant) and on spec.md §7's five error
//! classes (syntactic, semantic, template instantiation, ICE, resource).
//! Syntactic errors are out of scope (parser is an external collaborator);
//! the remaining four classes are modeled here.

use thiserror::Error;

use crate::location::SourceLocation;
use crate::types::Type;

/// The three-valued status every phase returns (spec.md §7, Design Notes
/// "three-valued status codes become a sum type").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    ErrorContinue,
    ErrorFatal,
}

impl Status {
    pub fn is_ok(self) -> bool {
        matches!(self, Status::Ok)
    }

    pub fn is_fatal(self) -> bool {
        matches!(self, Status::ErrorFatal)
    }

    /// Combine two statuses the way sibling-subtree checking does:
    /// fatal dominates, then error-continue, then ok.
    pub fn join(self, other: Status) -> Status {
        use Status::*;
        match (self, other) {
            (ErrorFatal, _) | (_, ErrorFatal) => ErrorFatal,
            (ErrorContinue, _) | (_, ErrorContinue) => ErrorContinue,
            (Ok, Ok) => Ok,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SemanticError {
    #[error("undefined name: {0}")]
    UndefinedName(String),
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },
    #[error("ambiguous call to '{0}'")]
    AmbiguousCall(String),
    #[error("non-scalar value used in scalar context")]
    NonScalarInScalarContext,
    #[error("void value used in value context")]
    VoidInValueContext,
    #[error("cyclic struct definition: {0}")]
    CyclicStruct(String),
    #[error("no overload of '{0}' matches the given argument types")]
    NoMatchingOverload(String),
    #[error("array shape mismatch: {lhs:?} vs {rhs:?}")]
    ShapeMismatch { lhs: Vec<u32>, rhs: Vec<u32> },
    #[error("declassification of a private {0} is not admissible from a public-incompatible data type")]
    InadmissibleDeclassify(String),
    #[error("domain '{0}' does not admit data type '{1}'")]
    KindMismatch(String, String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TemplateError {
    #[error("no template candidate matches the given type arguments")]
    NoMatchingCandidate,
    #[error("cyclic template instantiation detected for '{0}'")]
    CyclicInstantiation(String),
    #[error("type argument kind mismatch: expected {expected:?}, found {found:?}")]
    QuantifierKindMismatch {
        expected: crate::types::TypeArgKind,
        found: crate::types::TypeArgKind,
    },
    #[error("quantifier name '{0}' shadows another quantifier in the same template")]
    ShadowedQuantifier(String),
    #[error("unused type variable '{0}' in template declaration")]
    UnusedTypeVariable(String),
    #[error("operator templates may not declare a dimensionality variable")]
    OperatorTemplateHasDimVariable,
    #[error("operator template's declared return type is not the join of its operand types")]
    OperatorReturnTypeNotJoin,
    #[error("cast templates may only use vector-or-scalar operand and return types")]
    CastTemplateBadDimensionality,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResourceError {
    #[error("module not found: {0}")]
    ModuleNotFound(String),
    #[error("recursive import detected: {0}")]
    RecursiveImport(String),
}

#[derive(Debug, Error, Clone)]
pub enum CompileError {
    #[error("{1}: {0}")]
    Semantic(SemanticError, SourceLocation),
    #[error("{1}: {0}")]
    Template(TemplateError, SourceLocation),
    #[error("internal compiler error: {0}")]
    Ice(String),
    #[error("{0}")]
    Resource(#[from] ResourceError),
}

impl CompileError {
    pub fn semantic(err: SemanticError, location: SourceLocation) -> Self {
        CompileError::Semantic(err, location)
    }

    pub fn template(err: TemplateError, location: SourceLocation) -> Self {
        CompileError::Template(err, location)
    }

    pub fn location(&self) -> Option<&SourceLocation> {
        match self {
            CompileError::Semantic(_, loc) | CompileError::Template(_, loc) => Some(loc),
            CompileError::Ice(_) | CompileError::Resource(_) => None,
        }
    }
}

/// Convenience for messages that need to name a `Type` without importing
/// the full pretty-printer.
pub fn describe(ty: &Type) -> String {
    format!("{ty}")
}
