//! Initializer-based inference for a single declaration

use strata_core::{
    DeclId, ElementStore, ExternalHierarchy, LibraryCycle, Type, TypeProvider,
};

use crate::error::InferenceError;
use crate::report::{DeclineReason, InferenceSource};
use crate::resolver::{ExpressionResolver, ResolveMode, Resolver, TypeTable};
use crate::snapshot::SnapshotStore;

/// Outcome of resolving an initializer, before anything is assigned
#[derive(Debug, Clone, PartialEq)]
pub enum Evaluation {
    Type(Type),
    Declined(DeclineReason),
}

impl Evaluation {
    fn classify(ty: Type) -> Self {
        if ty.is_bottom() {
            Evaluation::Declined(DeclineReason::Bottom)
        } else if ty.is_dynamic() {
            Evaluation::Declined(DeclineReason::Uninformative)
        } else {
            Evaluation::Type(ty)
        }
    }
}

pub struct InitializerInferencer<'a> {
    cycle: &'a LibraryCycle,
    snapshots: &'a SnapshotStore,
    provider: &'a dyn TypeProvider,
    external: &'a dyn ExternalHierarchy,
    table: &'a mut TypeTable,
}

impl<'a> InitializerInferencer<'a> {
    pub fn new(
        cycle: &'a LibraryCycle,
        snapshots: &'a SnapshotStore,
        provider: &'a dyn TypeProvider,
        external: &'a dyn ExternalHierarchy,
        table: &'a mut TypeTable,
    ) -> Self {
        Self {
            cycle,
            snapshots,
            provider,
            external,
            table,
        }
    }

    /// Re-resolve the initializer of `id` under its captured scope
    pub fn evaluate(&mut self, store: &ElementStore, id: DeclId) -> Result<Evaluation, InferenceError> {
        let decl = store
            .declaration(id)
            .ok_or_else(|| InferenceError::structural(format!("<decl {}>", id.0), "not in element store"))?;
        let Some(initializer) = decl.initializer else {
            return Ok(Evaluation::Declined(DeclineReason::NoInitializer));
        };
        let expr = initializer.resolve(self.cycle).ok_or_else(|| {
            InferenceError::structural(store.qualified_name(id), "initializer not found in cycle")
        })?;
        let snapshot = self.snapshots.get(decl.site).ok_or_else(|| {
            InferenceError::structural(store.qualified_name(id), "no scope snapshot for declaration site")
        })?;

        let mut resolver = Resolver::new(
            store,
            self.provider,
            self.external,
            ResolveMode::signatures_only(),
            &mut *self.table,
        );
        let ty = resolver.resolve_under(snapshot, expr);
        tracing::trace!("Initializer of {} resolved to {}", store.qualified_name(id), ty);
        Ok(Evaluation::classify(ty))
    }

    /// Infer `id` from its initializer and assign the result
    pub fn infer(&mut self, store: &mut ElementStore, id: DeclId) -> Result<InferenceSource, InferenceError> {
        if store.declaration(id).is_some_and(|d| d.has_declared_type()) {
            return Ok(InferenceSource::Declared);
        }
        let evaluation = self.evaluate(store, id)?;
        Ok(commit(store, id, evaluation))
    }
}

/// Assign an evaluated initializer type and mark the initializer finalized
pub(crate) fn commit(store: &mut ElementStore, id: DeclId, evaluation: Evaluation) -> InferenceSource {
    match (evaluation, store.declaration_mut(id)) {
        (Evaluation::Type(ty), Some(decl)) => {
            if decl.assign_inferred(ty) {
                decl.mark_resolved();
                InferenceSource::Initializer
            } else {
                InferenceSource::Declined {
                    reason: DeclineReason::Uninformative,
                }
            }
        }
        (Evaluation::Declined(reason), _) => InferenceSource::Declined { reason },
        (Evaluation::Type(_), None) => InferenceSource::Declined {
            reason: DeclineReason::NoInitializer,
        },
    }
}
