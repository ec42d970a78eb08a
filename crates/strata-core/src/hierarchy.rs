//! Classes declared outside the library cycle
//!
//! Override search never re-visits classes from other cycles; it asks an
//! [`ExternalHierarchy`] for their members instead.

use std::collections::{BTreeMap, BTreeSet};

use crate::element::{MemberKind, MemberSignature, OBJECT_CLASS};
use crate::types::Type;

pub trait ExternalHierarchy {
    /// Member `name` of `class` or of any of its ancestors, nearest first
    fn lookup_member(&self, class: &str, name: &str, kind: MemberKind) -> Option<MemberSignature>;

    /// Direct supertypes of `class`, superclass first
    fn supertypes(&self, class: &str) -> Vec<String>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExternalClass {
    pub name: String,
    pub supertype: Option<String>,
    pub interfaces: Vec<String>,
    pub members: Vec<MemberSignature>,
}

impl ExternalClass {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            supertype: Some(OBJECT_CLASS.to_string()),
            interfaces: Vec::new(),
            members: Vec::new(),
        }
    }

    pub fn extends(mut self, supertype: impl Into<String>) -> Self {
        self.supertype = Some(supertype.into());
        self
    }

    pub fn implements(mut self, interface: impl Into<String>) -> Self {
        self.interfaces.push(interface.into());
        self
    }

    pub fn getter(mut self, name: &str, ty: Type) -> Self {
        self.members.push(MemberSignature::getter(&self.name, name, ty));
        self
    }

    pub fn setter(mut self, name: &str, ty: Type) -> Self {
        self.members.push(MemberSignature::setter(&self.name, name, ty));
        self
    }

    /// A mutable field: getter plus setter
    pub fn field(self, name: &str, ty: Type) -> Self {
        self.getter(name, ty.clone()).setter(name, ty)
    }

    pub fn method(mut self, name: &str, params: Vec<Type>, return_type: Type) -> Self {
        self.members
            .push(MemberSignature::method(&self.name, name, params, return_type));
        self
    }
}

/// Map-backed hierarchy, seeded with the `Object` root
#[derive(Debug, Clone)]
pub struct StaticHierarchy {
    classes: BTreeMap<String, ExternalClass>,
}

impl Default for StaticHierarchy {
    fn default() -> Self {
        Self::new()
    }
}

impl StaticHierarchy {
    pub fn new() -> Self {
        let mut object = ExternalClass::new(OBJECT_CLASS)
            .getter("hashCode", Type::Int)
            .getter("runtimeType", Type::interface("Type"))
            .method("toString", vec![], Type::String)
            .method("noSuchMethod", vec![Type::interface("Invocation")], Type::Dynamic);
        object.supertype = None;

        let mut classes = BTreeMap::new();
        classes.insert(OBJECT_CLASS.to_string(), object);
        Self { classes }
    }

    /// Hierarchy with no classes at all, not even `Object`
    pub fn empty() -> Self {
        Self {
            classes: BTreeMap::new(),
        }
    }

    pub fn with_class(mut self, class: ExternalClass) -> Self {
        self.add_class(class);
        self
    }

    pub fn add_class(&mut self, class: ExternalClass) {
        self.classes.insert(class.name.clone(), class);
    }

    pub fn class(&self, name: &str) -> Option<&ExternalClass> {
        self.classes.get(name)
    }

    pub fn class_names(&self) -> impl Iterator<Item = &str> {
        self.classes.keys().map(String::as_str)
    }

    fn lookup_from(
        &self,
        class: &str,
        name: &str,
        kind: MemberKind,
        visited: &mut BTreeSet<String>,
    ) -> Option<MemberSignature> {
        if !visited.insert(class.to_string()) {
            return None;
        }
        let node = self.classes.get(class)?;
        if let Some(member) = node
            .members
            .iter()
            .find(|m| m.name == name && m.kind == kind)
        {
            return Some(member.clone());
        }
        node.supertype
            .iter()
            .chain(node.interfaces.iter())
            .find_map(|ancestor| self.lookup_from(ancestor, name, kind, visited))
    }
}

impl ExternalHierarchy for StaticHierarchy {
    fn lookup_member(&self, class: &str, name: &str, kind: MemberKind) -> Option<MemberSignature> {
        self.lookup_from(class, name, kind, &mut BTreeSet::new())
    }

    fn supertypes(&self, class: &str) -> Vec<String> {
        self.classes
            .get(class)
            .map(|c| c.supertype.iter().chain(c.interfaces.iter()).cloned().collect())
            .unwrap_or_default()
    }
}
