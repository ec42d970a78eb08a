//! Static types and the type provider used by the resolver

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// Core type representation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Type {
    /// Not inferred (yet). Every untyped declaration starts here.
    Unknown,
    /// Explicit `dynamic` annotation
    Dynamic,
    /// Type of `null` and `throw`
    Bottom,
    Void,
    Object,
    Num,
    Int,
    Double,
    Bool,
    String,

    /// Class or interface type, by name
    Interface(String),
    List(Box<Type>),
    Function {
        params: Vec<Type>,
        ret: Box<Type>,
    },
}

impl Type {
    pub fn interface(name: impl Into<String>) -> Self {
        Type::Interface(name.into())
    }

    pub fn list(element: Type) -> Self {
        Type::List(Box::new(element))
    }

    pub fn function(params: Vec<Type>, ret: Type) -> Self {
        Type::Function {
            params,
            ret: Box::new(ret),
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Type::Unknown)
    }

    /// Unknown or explicit dynamic: carries no static information
    pub fn is_dynamic(&self) -> bool {
        matches!(self, Type::Unknown | Type::Dynamic)
    }

    pub fn is_bottom(&self) -> bool {
        matches!(self, Type::Bottom)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Type::Num | Type::Int | Type::Double)
    }

    /// Whether inference may adopt this type for a declaration
    pub fn is_inferable(&self) -> bool {
        !self.is_dynamic() && !self.is_bottom()
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Unknown => write!(f, "<unknown>"),
            Type::Dynamic => write!(f, "dynamic"),
            Type::Bottom => write!(f, "Never"),
            Type::Void => write!(f, "void"),
            Type::Object => write!(f, "Object"),
            Type::Num => write!(f, "num"),
            Type::Int => write!(f, "int"),
            Type::Double => write!(f, "double"),
            Type::Bool => write!(f, "bool"),
            Type::String => write!(f, "String"),
            Type::Interface(name) => write!(f, "{}", name),
            Type::List(element) => write!(f, "List<{}>", element),
            Type::Function { params, ret } => {
                write!(f, "(")?;
                for (i, param) in params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", param)?;
                }
                write!(f, ") -> {}", ret)
            }
        }
    }
}

/// Parses source-level type annotations such as `int`, `List<num>` or `Widget`.
impl FromStr for Type {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(CoreError::InvalidType("empty annotation".to_string()));
        }

        if let Some(inner) = s.strip_prefix("List<") {
            let inner = inner
                .strip_suffix('>')
                .ok_or_else(|| CoreError::InvalidType(s.to_string()))?;
            return Ok(Type::list(inner.parse()?));
        }

        let ty = match s {
            "dynamic" => Type::Dynamic,
            "Never" | "Null" => Type::Bottom,
            "void" => Type::Void,
            "Object" => Type::Object,
            "num" => Type::Num,
            "int" => Type::Int,
            "double" => Type::Double,
            "bool" => Type::Bool,
            "String" => Type::String,
            "List" => Type::list(Type::Dynamic),
            name if name.chars().all(|c| c.is_alphanumeric() || c == '_') => {
                Type::Interface(name.to_string())
            }
            other => return Err(CoreError::InvalidType(other.to_string())),
        };
        Ok(ty)
    }
}

/// Canonical types and subtype queries supplied by the front end
pub trait TypeProvider {
    fn int_type(&self) -> Type {
        Type::Int
    }

    fn double_type(&self) -> Type {
        Type::Double
    }

    fn num_type(&self) -> Type {
        Type::Num
    }

    fn bool_type(&self) -> Type {
        Type::Bool
    }

    fn string_type(&self) -> Type {
        Type::String
    }

    fn object_type(&self) -> Type {
        Type::Object
    }

    /// The dynamic sentinel
    fn dynamic_type(&self) -> Type {
        Type::Dynamic
    }

    /// Type of `null` and unreachable expressions
    fn bottom_type(&self) -> Type {
        Type::Bottom
    }

    fn is_subtype(&self, sub: &Type, sup: &Type) -> bool;

    fn least_upper_bound(&self, a: &Type, b: &Type) -> Type;
}

/// Default type provider: built-in lattice plus a nominal class hierarchy
#[derive(Debug, Clone, Default)]
pub struct CoreTypes {
    /// Direct supertypes (superclass first, then interfaces) by class name
    supertypes: BTreeMap<String, Vec<String>>,
}

impl CoreTypes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_class_hierarchy(supertypes: BTreeMap<String, Vec<String>>) -> Self {
        Self { supertypes }
    }

    pub fn add_class(&mut self, name: impl Into<String>, supertypes: Vec<String>) {
        self.supertypes.insert(name.into(), supertypes);
    }

    /// All transitive supertypes of `class`, nearest first, without duplicates
    pub fn ancestors_of(&self, class: &str) -> Vec<String> {
        let mut result = Vec::new();
        let mut seen = BTreeSet::new();
        let mut queue: VecDeque<&str> = VecDeque::new();
        queue.push_back(class);

        while let Some(current) = queue.pop_front() {
            if let Some(direct) = self.supertypes.get(current) {
                for sup in direct {
                    if sup != class && seen.insert(sup.clone()) {
                        result.push(sup.clone());
                        queue.push_back(sup);
                    }
                }
            }
        }
        result
    }

    fn is_class_subtype(&self, sub: &str, sup: &str) -> bool {
        sub == sup || self.ancestors_of(sub).iter().any(|a| a == sup)
    }
}

impl TypeProvider for CoreTypes {
    fn is_subtype(&self, sub: &Type, sup: &Type) -> bool {
        if sub == sup {
            return true;
        }
        match (sub, sup) {
            (_, Type::Dynamic | Type::Unknown) => true,
            (Type::Bottom, _) => true,
            (Type::Void, _) => false,
            (_, Type::Object) => true,
            (Type::Dynamic | Type::Unknown, _) => false,
            (Type::Int | Type::Double, Type::Num) => true,
            (Type::Interface(a), Type::Interface(b)) => self.is_class_subtype(a, b),
            (Type::List(a), Type::List(b)) => self.is_subtype(a, b),
            (
                Type::Function {
                    params: sub_params,
                    ret: sub_ret,
                },
                Type::Function {
                    params: sup_params,
                    ret: sup_ret,
                },
            ) => {
                sub_params.len() == sup_params.len()
                    && sub_params
                        .iter()
                        .zip(sup_params)
                        .all(|(s, t)| self.is_subtype(t, s))
                    && self.is_subtype(sub_ret, sup_ret)
            }
            _ => false,
        }
    }

    fn least_upper_bound(&self, a: &Type, b: &Type) -> Type {
        if a == b {
            return a.clone();
        }
        match (a, b) {
            (Type::Bottom, other) | (other, Type::Bottom) => other.clone(),
            (x, y) if x.is_dynamic() || y.is_dynamic() => Type::Dynamic,
            (x, y) if self.is_subtype(x, y) => y.clone(),
            (x, y) if self.is_subtype(y, x) => x.clone(),
            (x, y) if x.is_numeric() && y.is_numeric() => Type::Num,
            (Type::Interface(x), Type::Interface(y)) => self
                .ancestors_of(x)
                .into_iter()
                .find(|candidate| self.is_class_subtype(y, candidate))
                .map(Type::Interface)
                .unwrap_or(Type::Object),
            (Type::List(x), Type::List(y)) => Type::list(self.least_upper_bound(x, y)),
            _ => Type::Object,
        }
    }
}
