//! Scope snapshots keyed by declaration site
//!
//! The first pass captures the resolution context active at every variable
//! and field list. Inference later restores one of those contexts to
//! re-resolve a single initializer, out of source order, without replaying
//! the rest of the unit.

use std::collections::BTreeMap;

use strata_core::scope::{Scope, TypeFacts};
use strata_core::NodeId;

/// Mutable state of the resolution visitor that affects name and type lookup
#[derive(Debug, Clone, Default)]
pub struct ResolutionContext {
    pub names: Scope,
    /// Type promotions from `is` checks
    pub promotions: TypeFacts,
    /// Type overrides from assignments to locals
    pub overrides: TypeFacts,
}

impl ResolutionContext {
    pub fn new(names: Scope) -> Self {
        Self {
            names,
            promotions: TypeFacts::new(),
            overrides: TypeFacts::new(),
        }
    }
}

/// Immutable checkpoint of a [`ResolutionContext`]
#[derive(Debug, Clone)]
pub struct ScopeSnapshot {
    names: Scope,
    promotions: TypeFacts,
    overrides: TypeFacts,
}

impl ScopeSnapshot {
    pub fn capture(context: &ResolutionContext) -> Self {
        Self {
            names: context.names.clone(),
            promotions: context.promotions.clone(),
            overrides: context.overrides.clone(),
        }
    }

    pub fn names(&self) -> &Scope {
        &self.names
    }

    pub fn promotions(&self) -> &TypeFacts {
        &self.promotions
    }

    pub fn overrides(&self) -> &TypeFacts {
        &self.overrides
    }

    /// Install this snapshot as the active context, returning the previous one.
    ///
    /// The caller must put the returned context back once the targeted
    /// resolution is done.
    pub fn restore_into(&self, context: &mut ResolutionContext) -> ResolutionContext {
        std::mem::replace(
            context,
            ResolutionContext {
                names: self.names.clone(),
                promotions: self.promotions.clone(),
                overrides: self.overrides.clone(),
            },
        )
    }
}

/// Snapshots by declaration site, each captured at most once
#[derive(Debug, Clone, Default)]
pub struct SnapshotStore {
    snapshots: BTreeMap<NodeId, ScopeSnapshot>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Capture the context for `site`; a second capture returns the first one
    pub fn capture(&mut self, site: NodeId, context: &ResolutionContext) -> &ScopeSnapshot {
        self.snapshots.entry(site).or_insert_with(|| {
            tracing::trace!("Captured scope snapshot for site {:?}", site);
            ScopeSnapshot::capture(context)
        })
    }

    pub fn get(&self, site: NodeId) -> Option<&ScopeSnapshot> {
        self.snapshots.get(&site)
    }

    pub fn contains(&self, site: NodeId) -> bool {
        self.snapshots.contains_key(&site)
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::{Binding, Type};

    fn context_with(name: &str, ty: Type) -> ResolutionContext {
        ResolutionContext::new(Scope::empty().with_binding(name, Binding::Local(ty)))
    }

    #[test]
    fn test_capture_is_idempotent() {
        let mut store = SnapshotStore::new();
        let first = context_with("a", Type::Int);
        let second = context_with("a", Type::String);

        store.capture(NodeId(7), &first);
        let snapshot = store.capture(NodeId(7), &second);

        assert_eq!(snapshot.names().lookup("a"), Some(&Binding::Local(Type::Int)));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_restore_returns_previous_context() {
        let mut store = SnapshotStore::new();
        let captured = context_with("a", Type::Int);
        store.capture(NodeId(1), &captured);

        let mut active = context_with("b", Type::Bool);
        let snapshot = store.get(NodeId(1)).unwrap();
        let previous = snapshot.restore_into(&mut active);

        assert!(active.names.lookup("a").is_some());
        assert!(active.names.lookup("b").is_none());
        assert!(previous.names.lookup("b").is_some());

        // mutating the active context does not reach the snapshot
        active.promotions = active.promotions.with("a", Type::Num);
        assert!(snapshot.promotions().is_empty());
        assert!(snapshot.names().same_as(&captured.names));
    }
}
