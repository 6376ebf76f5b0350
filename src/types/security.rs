//! Security type fragment (spec.md §3 "Security").
//!
//! Grounded on `original_source/include/libscc/secrec/types.h`'s
//! `BasicType::SecType` split and `original_source/src/libscc/Symbol.h`'s
//! domain/kind symbols.

use std::fmt;

use crate::symbol::SymbolId;

/// A named kind: a family of private data types that may be declared
/// together and that share a common public representation and size
/// (spec.md GLOSSARY "Kind").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KindDef {
    pub id: SymbolId,
    pub name: String,
    /// The data types this kind admits (spec.md §4.1 "Classification... is
    /// only admissible on public-compatible data types").
    pub admitted: Vec<super::data::DataType>,
}

impl KindDef {
    pub fn admits(&self, data_type: &super::data::DataType) -> bool {
        self.admitted.iter().any(|d| d == data_type)
    }
}

/// A named private security domain (spec.md GLOSSARY "Domain").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainDef {
    pub id: SymbolId,
    pub name: String,
    pub kind: SymbolId,
}

/// The security fragment of a `Type` (spec.md §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SecurityType {
    Public,
    Private(SymbolId),
}

impl SecurityType {
    pub fn is_public(self) -> bool {
        matches!(self, SecurityType::Public)
    }

    pub fn domain(self) -> Option<SymbolId> {
        match self {
            SecurityType::Private(id) => Some(id),
            SecurityType::Public => None,
        }
    }

    /// Least-upper-bound of two security types, used to type binary
    /// expressions (spec.md §4.1 "a join (least-upper-bound) on
    /// security/dim pairs used by operator return-type inference").
    /// Two distinct private domains have no join (the caller must reject
    /// the expression); `Public` joined with anything yields the other
    /// operand.
    pub fn join(self, other: SecurityType) -> Option<SecurityType> {
        match (self, other) {
            (SecurityType::Public, x) | (x, SecurityType::Public) => Some(x),
            (SecurityType::Private(a), SecurityType::Private(b)) if a == b => {
                Some(SecurityType::Private(a))
            }
            _ => None,
        }
    }
}

impl fmt::Display for SecurityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SecurityType::Public => write!(f, "public"),
            SecurityType::Private(id) => write!(f, "domain#{}", id.0),
        }
    }
}
