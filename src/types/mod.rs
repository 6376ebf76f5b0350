//! The SecreC type model (spec.md §3 "Type fragments").
//!
//! A type is the triple (security, data, dimensionality). Types are
//! interned so that equal types share a pointer (spec.md §3); grounded on
//! `original_source/include/libscc/secrec/types.h`'s `TypeBasic` flyweight
//! table, realized here with `internment::Intern` instead of a hand-rolled
//! interning map.

pub mod data;
pub mod pattern;
pub mod security;

pub use data::{CompositeType, DataType, PrimitiveType, ProcSignature};
pub use pattern::{unify, Substitution, TypeArg, TypePattern, UnifyError};
pub use security::{DomainDef, KindDef, SecurityType};

use std::fmt;

use internment::Intern;

/// Array rank; `0` means scalar (spec.md §3).
pub type Dimensionality = u32;

/// The kind of a template type-argument/quantifier (spec.md §3: "Type
/// arguments used to instantiate templates have kind SEC, DATA, or DIM").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeArgKind {
    Sec,
    Data,
    Dim,
}

impl fmt::Display for TypeArgKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeArgKind::Sec => write!(f, "SEC"),
            TypeArgKind::Data => write!(f, "DATA"),
            TypeArgKind::Dim => write!(f, "DIM"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct TypeData {
    security: SecurityType,
    data: DataType,
    dim: Dimensionality,
}

/// An interned SecreC type. `Copy`, and equal whenever the underlying
/// fragments are equal (spec.md §3: "two equal types share a pointer").
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Type(Intern<TypeData>);

impl Type {
    pub fn new(security: SecurityType, data: DataType, dim: Dimensionality) -> Self {
        Type(Intern::new(TypeData { security, data, dim }))
    }

    pub fn void() -> Self {
        Type::new(SecurityType::Public, DataType::Void, 0)
    }

    pub fn bool_scalar_public() -> Self {
        Type::new(SecurityType::Public, DataType::Primitive(PrimitiveType::Bool), 0)
    }

    pub fn security(self) -> SecurityType {
        self.0.security
    }

    pub fn data(&self) -> &DataType {
        &self.0.data
    }

    pub fn dim(self) -> Dimensionality {
        self.0.dim
    }

    pub fn is_scalar(self) -> bool {
        self.dim() == 0
    }

    pub fn is_array(self) -> bool {
        self.dim() > 0
    }

    pub fn is_void(self) -> bool {
        matches!(self.data(), DataType::Void)
    }

    pub fn is_string(self) -> bool {
        matches!(self.data(), DataType::Primitive(PrimitiveType::String))
    }

    pub fn is_numeric(self) -> bool {
        matches!(self.data(), DataType::Primitive(p) if p.is_numeric())
    }

    pub fn is_signed(self) -> bool {
        matches!(self.data(), DataType::Primitive(p) if p.is_signed())
    }

    pub fn is_composite(self) -> bool {
        self.data().is_composite()
    }

    pub fn is_public(self) -> bool {
        self.security().is_public()
    }

    /// Least-upper-bound used to type binary expressions and to validate
    /// operator template return types (spec.md §3, §4.4
    /// "OperatorReturnTypeNotJoin"). The data fragment must match exactly;
    /// only security and dimensionality are joined, and dimensionality only
    /// joins when equal (shape checks happen separately at codegen time).
    pub fn join(self, other: Type) -> Option<Type> {
        if self.data() != other.data() || self.dim() != other.dim() {
            return None;
        }
        let security = self.security().join(other.security())?;
        Some(Type::new(security, self.data().clone(), self.dim()))
    }
}

impl fmt::Debug for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Type({self})")
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_array() {
            write!(f, "{} {}[{}]", self.security(), self.data(), self.dim())
        } else {
            write!(f, "{} {}", self.security(), self.data())
        }
    }
}
