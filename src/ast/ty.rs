//! Syntactic type expressions as written in source, before the type
//! checker resolves names to symbols and interned `Type`s (spec.md §4.3
//! runs over "the raw tree"; this is that raw, pre-resolution shape).
//!
//! Grounded on `original_source/include/libscc/secrec/treenodetypebasic.h` /
//! `treenodetypearray.h` / `treenodetypevoid.h` (the three syntactic type
//! node kinds: basic, array, void).

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecurityExpr {
    Public,
    Named(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DimExpr {
    Scalar,
    Fixed(u32),
    /// A dimensionality quantifier name, valid only inside a template
    /// declaration (spec.md §4.4).
    Variable(String),
}

/// A type as written in source: a security name (or `public`), a data-type
/// name, and a dimensionality — each fragment possibly a quantifier name
/// (spec.md §3 "Each fragment may also appear as a type variable").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeExpr {
    pub security: SecurityExpr,
    pub data: String,
    pub dim: DimExpr,
}

impl TypeExpr {
    pub fn scalar_public(data: impl Into<String>) -> Self {
        TypeExpr { security: SecurityExpr::Public, data: data.into(), dim: DimExpr::Scalar }
    }
}
