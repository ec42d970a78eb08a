//! Candidate collection for the inference phase

use strata_core::{ClassId, DeclId, DeclKind, Declaration, ElementStore};

/// Declarations and classes handed to inference, in source order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Collected {
    /// Untyped globals and statics that have an initializer
    pub variables: Vec<DeclId>,
    pub classes: Vec<ClassId>,
}

/// Pure scan of the element store; never mutates it
pub struct DeclarationCollector<'a> {
    store: &'a ElementStore,
}

impl<'a> DeclarationCollector<'a> {
    pub fn new(store: &'a ElementStore) -> Self {
        Self { store }
    }

    pub fn collect(&self) -> Collected {
        let variables: Vec<DeclId> = self
            .store
            .declarations()
            .filter(|decl| is_candidate(decl))
            .map(|decl| decl.id)
            .collect();
        let classes: Vec<ClassId> = self.store.classes().map(|class| class.id).collect();

        tracing::debug!(
            "Collected {} candidate variables and {} classes",
            variables.len(),
            classes.len()
        );
        Collected { variables, classes }
    }

    /// Instance fields of `class`, in declaration order
    pub fn instance_fields(&self, class: ClassId) -> Vec<DeclId> {
        self.members(class, |decl| decl.kind == DeclKind::InstanceField)
    }

    /// Non-static methods, getters and setters of `class`
    pub fn instance_methods(&self, class: ClassId) -> Vec<DeclId> {
        self.members(class, |decl| decl.kind == DeclKind::Method && !decl.is_static)
    }

    fn members(&self, class: ClassId, keep: impl Fn(&Declaration) -> bool) -> Vec<DeclId> {
        self.store
            .class(class)
            .map(|node| {
                node.members
                    .iter()
                    .filter_map(|&id| self.store.declaration(id))
                    .filter(|decl| keep(decl))
                    .map(|decl| decl.id)
                    .collect()
            })
            .unwrap_or_default()
    }
}

fn is_candidate(decl: &Declaration) -> bool {
    matches!(decl.kind, DeclKind::Global | DeclKind::Static)
        && !decl.has_declared_type()
        && decl.initializer.is_some()
}
