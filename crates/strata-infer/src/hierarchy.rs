//! Supertype-first class ordering

use std::collections::HashSet;

use strata_core::element::ClassRef;
use strata_core::{ClassId, ElementStore};

use crate::error::InferenceError;

/// Depth-first walk over in-set classes, memoized by class identity.
///
/// Each class appears exactly once in the resulting order, after every in-set
/// supertype and interface. External ancestors are not walked.
pub struct HierarchyWalker<'a> {
    store: &'a ElementStore,
    visited: HashSet<ClassId>,
    order: Vec<ClassId>,
}

impl<'a> HierarchyWalker<'a> {
    pub fn new(store: &'a ElementStore) -> Self {
        Self {
            store,
            visited: HashSet::new(),
            order: Vec::new(),
        }
    }

    /// Visit every class in `classes`, in the given order
    pub fn walk(mut self, classes: &[ClassId]) -> Result<Vec<ClassId>, InferenceError> {
        for &class in classes {
            self.visit(class)?;
        }
        Ok(self.order)
    }

    fn visit(&mut self, class: ClassId) -> Result<(), InferenceError> {
        if !self.visited.insert(class) {
            return Ok(());
        }
        let store = self.store;
        let node = store.class(class).ok_or_else(|| {
            InferenceError::structural(format!("<class {}>", class.0), "class not in element store")
        })?;
        for ancestor in node.ancestors() {
            if let ClassRef::InSet(id) = ancestor {
                self.visit(*id)?;
            }
        }
        tracing::trace!("Hierarchy visit {}", node.name);
        self.order.push(class);
        Ok(())
    }
}
