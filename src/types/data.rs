//! Data type fragment (spec.md §3 "Data").
//!
//! Grounded on `original_source/include/libscc/secrec/types.h`
//! (`BasicType::VarType`, `ArrayType`, `FunctionType`) generalized into one
//! flat `DataType` enum per spec.md's own flattening of array rank into a
//! separate `Dimensionality` fragment.

use std::fmt;
use std::sync::Arc;

use crate::symbol::SymbolId;
use crate::types::Type;

/// The built-in primitive data types (spec.md §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveType {
    Bool,
    String,
    Float32,
    Float64,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
}

impl PrimitiveType {
    pub fn is_numeric(self) -> bool {
        !matches!(self, PrimitiveType::Bool | PrimitiveType::String)
    }

    pub fn is_signed(self) -> bool {
        matches!(
            self,
            PrimitiveType::Float32
                | PrimitiveType::Float64
                | PrimitiveType::Int8
                | PrimitiveType::Int16
                | PrimitiveType::Int32
                | PrimitiveType::Int64
        )
    }

    pub fn is_integer(self) -> bool {
        self.is_numeric() && !matches!(self, PrimitiveType::Float32 | PrimitiveType::Float64)
    }

    pub fn bit_width(self) -> u32 {
        match self {
            PrimitiveType::Bool => 1,
            PrimitiveType::String => 0,
            PrimitiveType::Int8 | PrimitiveType::UInt8 => 8,
            PrimitiveType::Int16 | PrimitiveType::UInt16 => 16,
            PrimitiveType::Int32 | PrimitiveType::UInt32 | PrimitiveType::Float32 => 32,
            PrimitiveType::Int64 | PrimitiveType::UInt64 | PrimitiveType::Float64 => 64,
        }
    }
}

impl fmt::Display for PrimitiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PrimitiveType::Bool => "bool",
            PrimitiveType::String => "string",
            PrimitiveType::Float32 => "float32",
            PrimitiveType::Float64 => "float64",
            PrimitiveType::Int8 => "int8",
            PrimitiveType::Int16 => "int16",
            PrimitiveType::Int32 => "int32",
            PrimitiveType::Int64 => "int64",
            PrimitiveType::UInt8 => "uint8",
            PrimitiveType::UInt16 => "uint16",
            PrimitiveType::UInt32 => "uint32",
            PrimitiveType::UInt64 => "uint64",
        };
        f.write_str(s)
    }
}

/// A named procedure signature (used as the data type of a procedure-typed
/// value; spec.md §3 "procedure (parameter-type list and return type)").
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProcSignature {
    pub params: Vec<Type>,
    pub ret: Type,
}

/// A composite data type: struct or procedure (spec.md §3).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CompositeType {
    Struct(SymbolId),
    Procedure(Arc<ProcSignature>),
}

/// The data fragment of a `Type`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DataType {
    Primitive(PrimitiveType),
    /// A user-declared primitive: a member of a `Kind` (spec.md §3).
    UserPrimitive(SymbolId),
    Composite(CompositeType),
    Void,
}

impl DataType {
    pub fn is_scalar_compatible(&self) -> bool {
        !matches!(self, DataType::Void)
    }

    pub fn is_composite(&self) -> bool {
        matches!(self, DataType::Composite(_))
    }

    pub fn as_struct(&self) -> Option<SymbolId> {
        match self {
            DataType::Composite(CompositeType::Struct(id)) => Some(*id),
            _ => None,
        }
    }

    pub fn as_procedure(&self) -> Option<&ProcSignature> {
        match self {
            DataType::Composite(CompositeType::Procedure(sig)) => Some(sig),
            _ => None,
        }
    }
}

impl From<PrimitiveType> for DataType {
    fn from(p: PrimitiveType) -> Self {
        DataType::Primitive(p)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Primitive(p) => write!(f, "{p}"),
            DataType::UserPrimitive(id) => write!(f, "primitive#{}", id.0),
            DataType::Composite(CompositeType::Struct(id)) => write!(f, "struct#{}", id.0),
            DataType::Composite(CompositeType::Procedure(sig)) => {
                write!(f, "proc(")?;
                for (i, p) in sig.params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{p}")?;
                }
                write!(f, ") -> {}", sig.ret)
            }
            DataType::Void => write!(f, "void"),
        }
    }
}
