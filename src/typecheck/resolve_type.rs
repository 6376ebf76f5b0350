//! Resolving a syntactic `TypeExpr` (as written in source) to a
//! `TypePattern` (spec.md §4.3/§4.4), recognizing quantifier names when a
//! set of them is in scope (inside a template declaration) and otherwise
//! requiring every fragment to resolve to a concrete symbol.
//!
//! Grounded on `original_source/src/libscc/TreeNodeSecTypeF.cpp` /
//! `TreeNodeType*.cpp`'s name-to-symbol resolution for security/data/dim
//! fragments.

use std::collections::HashSet;

use crate::ast::{DimExpr, SecurityExpr, TypeExpr};
use crate::error::{CompileError, SemanticError};
use crate::location::SourceLocation;
use crate::symbol::{Symbol, SymbolCategory, SymbolTable};
use crate::types::data::{CompositeType, DataType, PrimitiveType};
use crate::types::pattern::{DataPattern, DimPattern, SecurityPattern, TypePattern};
use crate::types::security::SecurityType;

fn primitive_named(name: &str) -> Option<PrimitiveType> {
    Some(match name {
        "bool" => PrimitiveType::Bool,
        "string" => PrimitiveType::String,
        "float32" => PrimitiveType::Float32,
        "float64" | "float" => PrimitiveType::Float64,
        "int8" => PrimitiveType::Int8,
        "int16" => PrimitiveType::Int16,
        "int32" => PrimitiveType::Int32,
        "int64" | "int" => PrimitiveType::Int64,
        "uint8" => PrimitiveType::UInt8,
        "uint16" => PrimitiveType::UInt16,
        "uint32" => PrimitiveType::UInt32,
        "uint64" | "uint" => PrimitiveType::UInt64,
        _ => return None,
    })
}

/// Exposes the builtin-primitive name table to callers that only need to
/// compare two type names syntactically (e.g. checking an operator
/// template's declared return type against its operand types) without
/// going through the full `resolve_type_expr` pipeline.
pub fn primitive_type_name(name: &str) -> Option<PrimitiveType> {
    primitive_named(name)
}

/// Resolves a bare data-type name (as used in `kind` admission lists,
/// spec.md §4.1) to a `DataType`, without going through `TypeExpr`/pattern
/// machinery: kind declarations only ever admit concrete, non-generic data
/// types.
pub fn resolve_data_name(symtab: &SymbolTable, name: &str) -> Option<DataType> {
    if let Some(prim) = primitive_named(name) {
        return Some(DataType::Primitive(prim));
    }
    if let Some(id) = symtab.find(SymbolCategory::Struct, name) {
        return Some(DataType::Composite(CompositeType::Struct(id)));
    }
    if let Some(id) = symtab.find(SymbolCategory::DataTypeAlias, name) {
        return Some(DataType::UserPrimitive(id));
    }
    None
}

/// Resolves `ty` to a `TypePattern`. `quantifiers`, when `Some`, is the set
/// of quantifier names valid in the current template declaration (spec.md
/// §4.4); a name found there resolves to a pattern variable rather than
/// requiring a concrete symbol.
pub fn resolve_type_expr(
    symtab: &SymbolTable,
    ty: &TypeExpr,
    quantifiers: Option<&HashSet<String>>,
    location: &SourceLocation,
) -> Result<TypePattern, CompileError> {
    let security = match &ty.security {
        SecurityExpr::Public => SecurityPattern::Concrete(SecurityType::Public),
        SecurityExpr::Named(name) => {
            if quantifiers.is_some_and(|qs| qs.contains(name)) {
                SecurityPattern::Var(name.clone())
            } else {
                match symtab.find(SymbolCategory::Domain, name) {
                    Some(id) => SecurityPattern::Concrete(SecurityType::Private(id)),
                    None => {
                        return Err(CompileError::semantic(
                            SemanticError::UndefinedName(name.clone()),
                            location.clone(),
                        ))
                    }
                }
            }
        }
    };

    let data = if quantifiers.is_some_and(|qs| qs.contains(&ty.data)) {
        DataPattern::Var(ty.data.clone())
    } else if let Some(prim) = primitive_named(&ty.data) {
        DataPattern::Concrete(DataType::Primitive(prim))
    } else if let Some(id) = symtab.find(SymbolCategory::Struct, &ty.data) {
        DataPattern::Concrete(DataType::Composite(CompositeType::Struct(id)))
    } else if let Some(id) = symtab.find(SymbolCategory::DataTypeAlias, &ty.data) {
        match symtab.get(id) {
            Symbol::DataTypeAlias { .. } => DataPattern::Concrete(DataType::UserPrimitive(id)),
            _ => unreachable!("DataTypeAlias category always holds a DataTypeAlias symbol"),
        }
    } else {
        return Err(CompileError::semantic(SemanticError::UndefinedName(ty.data.clone()), location.clone()));
    };

    let dim = match &ty.dim {
        DimExpr::Scalar => DimPattern::Concrete(0),
        DimExpr::Fixed(n) => DimPattern::Concrete(*n),
        DimExpr::Variable(name) => {
            if quantifiers.is_some_and(|qs| qs.contains(name)) {
                DimPattern::Var(name.clone())
            } else {
                return Err(CompileError::semantic(SemanticError::UndefinedName(name.clone()), location.clone()));
            }
        }
    };

    Ok(TypePattern { security, data, dim })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol::{Symbol, SymbolCategory};
    use crate::types::security::DomainDef;

    #[test]
    fn resolves_builtin_primitive() {
        let symtab = SymbolTable::new();
        let ty = TypeExpr::scalar_public("int32");
        let pattern = resolve_type_expr(&symtab, &ty, None, &SourceLocation::synthetic()).unwrap();
        assert_eq!(pattern.as_concrete().unwrap().data(), &DataType::Primitive(PrimitiveType::Int32));
    }

    #[test]
    fn unknown_domain_is_undefined_name() {
        let symtab = SymbolTable::new();
        let ty = TypeExpr { security: SecurityExpr::Named("priv".into()), data: "int32".into(), dim: DimExpr::Scalar };
        assert!(resolve_type_expr(&symtab, &ty, None, &SourceLocation::synthetic()).is_err());
    }

    #[test]
    fn quantifier_name_resolves_to_a_variable_pattern() {
        let symtab = SymbolTable::new();
        let ty = TypeExpr { security: SecurityExpr::Named("D".into()), data: "T".into(), dim: DimExpr::Variable("N".into()) };
        let mut quantifiers = HashSet::new();
        quantifiers.insert("D".to_string());
        quantifiers.insert("T".to_string());
        quantifiers.insert("N".to_string());
        let pattern = resolve_type_expr(&symtab, &ty, Some(&quantifiers), &SourceLocation::synthetic()).unwrap();
        assert!(pattern.depends_on_variable());
        assert!(pattern.as_concrete().is_none());
    }

    #[test]
    fn declared_domain_resolves_to_private_security() {
        let mut symtab = SymbolTable::new();
        let kind = symtab
            .declare(SymbolCategory::Kind, "additive3pp", |id| {
                Symbol::Kind(crate::types::security::KindDef { id, name: "additive3pp".into(), admitted: vec![] })
            })
            .unwrap();
        let domain = symtab
            .declare(SymbolCategory::Domain, "priv", |id| Symbol::Domain(DomainDef { id, name: "priv".into(), kind }))
            .unwrap();
        let ty = TypeExpr { security: SecurityExpr::Named("priv".into()), data: "int32".into(), dim: DimExpr::Scalar };
        let pattern = resolve_type_expr(&symtab, &ty, None, &SourceLocation::synthetic()).unwrap();
        assert_eq!(pattern.as_concrete().unwrap().security(), SecurityType::Private(domain));
    }
}
