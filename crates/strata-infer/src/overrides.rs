//! Override-based inference for instance fields and methods
//!
//! Both inferencers expect ancestors to be processed already, so they must be
//! driven in hierarchy walk order.

use strata_core::{ClassId, DeclId, Declaration, ElementStore, ExternalHierarchy, MemberKind};

use crate::error::InferenceError;
use crate::initializer::{commit, InitializerInferencer};
use crate::lookup::MemberLookup;
use crate::report::{DeclineReason, InferenceSource};

fn enclosing_class(store: &ElementStore, decl: &Declaration) -> Result<ClassId, InferenceError> {
    let class = decl.enclosing_class.ok_or_else(|| {
        InferenceError::structural(&decl.name, "instance member without enclosing class")
    })?;
    match store.class(class) {
        Some(node) if node.members.contains(&decl.id) => Ok(class),
        Some(_) => Err(InferenceError::structural(
            store.qualified_name(decl.id),
            "member not listed by its enclosing class",
        )),
        None => Err(InferenceError::structural(
            &decl.name,
            "enclosing class not in element store",
        )),
    }
}

pub struct OverrideFieldInferencer<'a> {
    external: &'a dyn ExternalHierarchy,
}

impl<'a> OverrideFieldInferencer<'a> {
    pub fn new(external: &'a dyn ExternalHierarchy) -> Self {
        Self { external }
    }

    /// Infer an untyped instance field from the getter it overrides, falling
    /// back to its initializer.
    ///
    /// The initializer is evaluated first as a baseline, and the field is
    /// assigned at most once from whichever source wins.
    pub fn infer(
        &self,
        initializers: &mut InitializerInferencer<'_>,
        store: &mut ElementStore,
        id: DeclId,
    ) -> Result<InferenceSource, InferenceError> {
        let decl = store
            .declaration(id)
            .ok_or_else(|| InferenceError::structural(format!("<decl {}>", id.0), "not in element store"))?;
        if decl.has_declared_type() {
            return Ok(InferenceSource::Declared);
        }
        let class = enclosing_class(store, decl)?;
        let is_final = decl.is_final;
        let has_initializer = decl.initializer.is_some();
        let name = decl.name.clone();

        let baseline = initializers.evaluate(store, id)?;
        let overridden = MemberLookup::new(store, self.external).overridden(class, &name, MemberKind::Getter);

        let source = match overridden {
            None => commit(store, id, baseline),
            Some(member) if member.return_type.is_inferable() => {
                let adopted = store
                    .declaration_mut(id)
                    .is_some_and(|decl| decl.assign_inferred(member.return_type.clone()));
                if adopted {
                    InferenceSource::Override {
                        ancestor: member.owner,
                    }
                } else {
                    InferenceSource::Declined {
                        reason: DeclineReason::NoUsableOverride,
                    }
                }
            }
            // a dynamic or bottom getter says nothing; a narrower type is only
            // safe for a field that can never be reassigned
            Some(_) if is_final && has_initializer => commit(store, id, baseline),
            Some(_) => InferenceSource::Declined {
                reason: DeclineReason::DynamicOverride,
            },
        };
        Ok(source)
    }
}

/// Inferred parts of one method signature
#[derive(Debug, Clone, PartialEq)]
pub struct MethodInference {
    pub return_type: InferenceSource,
    /// Omitted parameters only, by position
    pub params: Vec<(usize, InferenceSource)>,
}

pub struct OverrideMethodInferencer<'a> {
    external: &'a dyn ExternalHierarchy,
}

impl<'a> OverrideMethodInferencer<'a> {
    pub fn new(external: &'a dyn ExternalHierarchy) -> Self {
        Self { external }
    }

    /// Fill in an omitted return type and omitted parameter types from the
    /// overridden signature. Each part is inferred independently.
    ///
    /// Static methods are not inferred and yield `None`.
    pub fn infer(&self, store: &mut ElementStore, id: DeclId) -> Result<Option<MethodInference>, InferenceError> {
        let decl = store
            .declaration(id)
            .ok_or_else(|| InferenceError::structural(format!("<decl {}>", id.0), "not in element store"))?;
        if decl.is_static {
            return Ok(None);
        }
        let class = enclosing_class(store, decl)?;
        let signature = decl.signature.as_ref().ok_or_else(|| {
            InferenceError::structural(store.qualified_name(id), "method without signature")
        })?;
        let kind = MemberKind::from(signature.kind);
        let omitted: Vec<usize> = signature
            .params
            .iter()
            .enumerate()
            .filter(|(_, p)| p.declared_type.is_none())
            .map(|(i, _)| i)
            .collect();
        let declared_return = decl.has_declared_type();
        let name = decl.name.clone();

        let overridden = MemberLookup::new(store, self.external).overridden(class, &name, kind);
        let Some(decl) = store.declaration_mut(id) else {
            return Ok(None);
        };

        let return_type = if declared_return {
            InferenceSource::Declared
        } else {
            match &overridden {
                Some(member) if member.return_type.is_inferable() => {
                    if decl.assign_inferred(member.return_type.clone()) {
                        InferenceSource::Override {
                            ancestor: member.owner.clone(),
                        }
                    } else {
                        InferenceSource::Declined {
                            reason: DeclineReason::NoUsableOverride,
                        }
                    }
                }
                Some(_) => InferenceSource::Declined {
                    reason: DeclineReason::DynamicOverride,
                },
                None => InferenceSource::Declined {
                    reason: DeclineReason::NoUsableOverride,
                },
            }
        };

        let params = omitted
            .into_iter()
            .map(|index| {
                let source = match overridden.as_ref().and_then(|m| Some((m, m.params.get(index)?))) {
                    Some((member, ty)) if decl.assign_param(index, ty.clone()) => {
                        InferenceSource::Override {
                            ancestor: member.owner.clone(),
                        }
                    }
                    Some((_, ty)) if !ty.is_inferable() => InferenceSource::Declined {
                        reason: DeclineReason::DynamicOverride,
                    },
                    _ => InferenceSource::Declined {
                        reason: DeclineReason::NoUsableOverride,
                    },
                };
                (index, source)
            })
            .collect();

        Ok(Some(MethodInference { return_type, params }))
    }
}
