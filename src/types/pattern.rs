//! Type patterns and the unifier (spec.md §3 "a *type unifier* that takes a
//! pattern type ... and a concrete type, producing a substitution mapping
//! variable names to type arguments, or failing").
//!
//! Grounded on `original_source/src/libscc/typechecker/Templates.cpp`'s
//! quantifier-binding loop, restated as an explicit `unify` function rather
//! than accumulated side effects on a checker instance.

use std::collections::HashMap;
use std::fmt;

use crate::types::data::DataType;
use crate::types::security::SecurityType;
use crate::types::{Dimensionality, Type, TypeArgKind};

/// A concrete type argument bound to a quantifier during instantiation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeArg {
    Sec(SecurityType),
    Data(DataType),
    Dim(Dimensionality),
}

impl TypeArg {
    pub fn kind(&self) -> TypeArgKind {
        match self {
            TypeArg::Sec(_) => TypeArgKind::Sec,
            TypeArg::Data(_) => TypeArgKind::Data,
            TypeArg::Dim(_) => TypeArgKind::Dim,
        }
    }
}

impl fmt::Display for TypeArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeArg::Sec(s) => write!(f, "{s}"),
            TypeArg::Data(d) => write!(f, "{d}"),
            TypeArg::Dim(d) => write!(f, "{d}"),
        }
    }
}

/// One fragment of a type pattern: either a concrete value or a named
/// quantifier of the matching kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecurityPattern {
    Concrete(SecurityType),
    Var(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataPattern {
    Concrete(DataType),
    Var(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DimPattern {
    Concrete(Dimensionality),
    Var(String),
}

/// A type with some fragments possibly left as quantifier names, as found in
/// a template declaration's parameter and return types (spec.md §4.4).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypePattern {
    pub security: SecurityPattern,
    pub data: DataPattern,
    pub dim: DimPattern,
}

impl TypePattern {
    pub fn concrete(ty: Type) -> Self {
        TypePattern {
            security: SecurityPattern::Concrete(ty.security()),
            data: DataPattern::Concrete(ty.data().clone()),
            dim: DimPattern::Concrete(ty.dim()),
        }
    }

    /// `Some(ty)` iff every fragment is concrete (no quantifier), i.e. this
    /// pattern came from a non-template declaration.
    pub fn as_concrete(&self) -> Option<Type> {
        let SecurityPattern::Concrete(security) = &self.security else { return None };
        let DataPattern::Concrete(data) = &self.data else { return None };
        let DimPattern::Concrete(dim) = &self.dim else { return None };
        Some(Type::new(*security, data.clone(), *dim))
    }

    /// Every quantifier name this pattern mentions, used by the overload
    /// ranking weight's "parameters whose type depends on a variable"
    /// count (spec.md §4.3).
    pub fn depends_on_variable(&self) -> bool {
        matches!(self.security, SecurityPattern::Var(_))
            || matches!(self.data, DataPattern::Var(_))
            || matches!(self.dim, DimPattern::Var(_))
    }
}

/// A binding from quantifier name to the type argument it was unified with.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Substitution {
    bindings: HashMap<String, TypeArg>,
}

impl Substitution {
    pub fn new() -> Self {
        Substitution { bindings: HashMap::new() }
    }

    pub fn get(&self, name: &str) -> Option<&TypeArg> {
        self.bindings.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &TypeArg)> {
        self.bindings.iter()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Binds `name` to `arg`, failing if `name` is already bound to a
    /// different argument (spec.md §4.4: every occurrence of a quantifier
    /// must unify consistently).
    pub(crate) fn bind(&mut self, name: &str, arg: TypeArg) -> Result<(), UnifyError> {
        match self.bindings.get(name) {
            Some(existing) if *existing != arg => Err(UnifyError::Inconsistent {
                name: name.to_string(),
                first: existing.to_string(),
                second: arg.to_string(),
            }),
            Some(_) => Ok(()),
            None => {
                self.bindings.insert(name.to_string(), arg);
                Ok(())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UnifyError {
    #[error("security type mismatch: expected {expected}, found {found}")]
    SecurityMismatch { expected: String, found: String },
    #[error("data type mismatch: expected {expected}, found {found}")]
    DataMismatch { expected: String, found: String },
    #[error("dimensionality mismatch: expected {expected}, found {found}")]
    DimMismatch { expected: Dimensionality, found: Dimensionality },
    #[error("quantifier '{name}' bound to both {first} and {second}")]
    Inconsistent { name: String, first: String, second: String },
}

/// Unifies a pattern type against a concrete type, extending `subst` in
/// place. On success every quantifier in `pattern` is bound in `subst`
/// (spec.md §3 "a type unifier ... producing a substitution ... or
/// failing").
pub fn unify(pattern: &TypePattern, concrete: Type, subst: &mut Substitution) -> Result<(), UnifyError> {
    match &pattern.security {
        SecurityPattern::Concrete(s) if *s == concrete.security() => {}
        SecurityPattern::Concrete(s) => {
            return Err(UnifyError::SecurityMismatch {
                expected: s.to_string(),
                found: concrete.security().to_string(),
            })
        }
        SecurityPattern::Var(name) => subst.bind(name, TypeArg::Sec(concrete.security()))?,
    }

    match &pattern.data {
        DataPattern::Concrete(d) if *d == *concrete.data() => {}
        DataPattern::Concrete(d) => {
            return Err(UnifyError::DataMismatch {
                expected: d.to_string(),
                found: concrete.data().to_string(),
            })
        }
        DataPattern::Var(name) => subst.bind(name, TypeArg::Data(concrete.data().clone()))?,
    }

    match &pattern.dim {
        DimPattern::Concrete(d) if *d == concrete.dim() => {}
        DimPattern::Concrete(d) => {
            return Err(UnifyError::DimMismatch { expected: *d, found: concrete.dim() })
        }
        DimPattern::Var(name) => subst.bind(name, TypeArg::Dim(concrete.dim()))?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::data::PrimitiveType;

    #[test]
    fn unify_binds_quantifiers() {
        let pattern = TypePattern {
            security: SecurityPattern::Var("D".into()),
            data: DataPattern::Var("T".into()),
            dim: DimPattern::Var("N".into()),
        };
        let concrete = Type::new(SecurityType::Public, DataType::Primitive(PrimitiveType::Int32), 1);
        let mut subst = Substitution::new();
        unify(&pattern, concrete, &mut subst).unwrap();
        assert_eq!(subst.get("D"), Some(&TypeArg::Sec(SecurityType::Public)));
        assert_eq!(subst.get("N"), Some(&TypeArg::Dim(1)));
    }

    #[test]
    fn unify_rejects_inconsistent_rebinding() {
        let pattern_component = DataPattern::Var("T".into());
        let a = Type::new(SecurityType::Public, DataType::Primitive(PrimitiveType::Int32), 0);
        let b = Type::new(SecurityType::Public, DataType::Primitive(PrimitiveType::Bool), 0);
        let mut subst = Substitution::new();
        let pat_a = TypePattern {
            security: SecurityPattern::Concrete(SecurityType::Public),
            data: pattern_component.clone(),
            dim: DimPattern::Concrete(0),
        };
        unify(&pat_a, a, &mut subst).unwrap();
        let pat_b = TypePattern {
            security: SecurityPattern::Concrete(SecurityType::Public),
            data: pattern_component,
            dim: DimPattern::Concrete(0),
        };
        assert!(unify(&pat_b, b, &mut subst).is_err());
    }

    #[test]
    fn unify_rejects_concrete_mismatch() {
        let pattern = TypePattern {
            security: SecurityPattern::Concrete(SecurityType::Public),
            data: DataPattern::Concrete(DataType::Primitive(PrimitiveType::Bool)),
            dim: DimPattern::Concrete(0),
        };
        let concrete = Type::new(SecurityType::Public, DataType::Primitive(PrimitiveType::Int32), 0);
        let mut subst = Substitution::new();
        assert!(unify(&pattern, concrete, &mut subst).is_err());
    }
}
