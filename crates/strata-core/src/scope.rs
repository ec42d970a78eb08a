//! Persistent lexical scopes and type fact chains
//!
//! Both structures are immutable linked frames behind `Arc`: pushing a frame
//! or adding a fact produces a new value and leaves the old one intact, so a
//! copy taken at any point is a cheap, read-only checkpoint.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::element::{ClassId, DeclId};
use crate::types::Type;

/// What a name resolves to
#[derive(Debug, Clone, PartialEq)]
pub enum Binding {
    Declaration(DeclId),
    Class(ClassId),
    /// Top-level function, with its function type
    Function(Type),
    /// Parameter or local variable with a fixed type
    Local(Type),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Library,
    Class(ClassId),
    Function,
    Block,
}

#[derive(Debug)]
struct Frame {
    kind: ScopeKind,
    bindings: BTreeMap<String, Binding>,
    parent: Scope,
}

#[derive(Debug, Clone, Default)]
pub struct Scope {
    frame: Option<Arc<Frame>>,
}

impl Scope {
    pub fn empty() -> Self {
        Self::default()
    }

    /// New child scope; `self` is left untouched
    pub fn push(&self, kind: ScopeKind, bindings: BTreeMap<String, Binding>) -> Scope {
        Scope {
            frame: Some(Arc::new(Frame {
                kind,
                bindings,
                parent: self.clone(),
            })),
        }
    }

    /// Child block scope holding one extra binding
    pub fn with_binding(&self, name: impl Into<String>, binding: Binding) -> Scope {
        let mut bindings = BTreeMap::new();
        bindings.insert(name.into(), binding);
        self.push(ScopeKind::Block, bindings)
    }

    pub fn lookup(&self, name: &str) -> Option<&Binding> {
        let mut current = self.frame.as_deref();
        while let Some(frame) = current {
            if let Some(binding) = frame.bindings.get(name) {
                return Some(binding);
            }
            current = frame.parent.frame.as_deref();
        }
        None
    }

    pub fn kind(&self) -> Option<ScopeKind> {
        self.frame.as_ref().map(|f| f.kind)
    }

    /// Innermost enclosing class, if any
    pub fn enclosing_class(&self) -> Option<ClassId> {
        let mut current = self.frame.as_deref();
        while let Some(frame) = current {
            if let ScopeKind::Class(id) = frame.kind {
                return Some(id);
            }
            current = frame.parent.frame.as_deref();
        }
        None
    }

    pub fn depth(&self) -> usize {
        let mut depth = 0;
        let mut current = self.frame.as_deref();
        while let Some(frame) = current {
            depth += 1;
            current = frame.parent.frame.as_deref();
        }
        depth
    }

    /// Identity comparison: both values share the same innermost frame
    pub fn same_as(&self, other: &Scope) -> bool {
        match (&self.frame, &other.frame) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }
}

#[derive(Debug)]
struct Fact {
    name: String,
    ty: Type,
    next: TypeFacts,
}

/// Chain of `name: Type` facts; the most recent fact for a name wins.
///
/// Used both for type promotions (`x is T`) and for type overrides
/// (assignments to locals).
#[derive(Debug, Clone, Default)]
pub struct TypeFacts {
    head: Option<Arc<Fact>>,
}

impl TypeFacts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(&self, name: impl Into<String>, ty: Type) -> Self {
        TypeFacts {
            head: Some(Arc::new(Fact {
                name: name.into(),
                ty,
                next: self.clone(),
            })),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Type> {
        let mut current = self.head.as_deref();
        while let Some(fact) = current {
            if fact.name == name {
                return Some(&fact.ty);
            }
            current = fact.next.head.as_deref();
        }
        None
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    pub fn len(&self) -> usize {
        let mut len = 0;
        let mut current = self.head.as_deref();
        while let Some(fact) = current {
            len += 1;
            current = fact.next.head.as_deref();
        }
        len
    }

    pub fn same_as(&self, other: &TypeFacts) -> bool {
        match (&self.head, &other.head) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }
}
