//! Resolution driver
//!
//! Runs one library cycle through its four states, in order and exactly once:
//!
//! 1. `VariablesResolved`: elements have been read from the syntax tree
//! 2. `BodiesSkippedResolved`: signatures and initializers resolved, scope
//!    snapshots captured
//! 3. `Inferred`: initializer and override inference applied in place
//! 4. `FullyResolved`: everything resolved again, bodies included

use std::collections::{BTreeMap, VecDeque};
use std::fmt;

use tracing::{debug, info, instrument};

use strata_core::{
    CoreTypes, DeclId, DeclKind, ElementStore, ExternalHierarchy, InferenceOptions, LibraryCycle,
    NodeId, Type, TypeProvider,
};

use crate::collector::DeclarationCollector;
use crate::error::InferenceError;
use crate::graph::DependencyGraph;
use crate::hierarchy::HierarchyWalker;
use crate::initializer::InitializerInferencer;
use crate::overrides::{OverrideFieldInferencer, OverrideMethodInferencer};
use crate::report::{fingerprint, InferenceReport, InferenceSource};
use crate::resolver::{ResolveMode, Resolver, TypeTable};
use crate::snapshot::SnapshotStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    VariablesResolved,
    BodiesSkippedResolved,
    Inferred,
    FullyResolved,
}

impl DriverState {
    pub fn next(self) -> Option<DriverState> {
        match self {
            DriverState::VariablesResolved => Some(DriverState::BodiesSkippedResolved),
            DriverState::BodiesSkippedResolved => Some(DriverState::Inferred),
            DriverState::Inferred => Some(DriverState::FullyResolved),
            DriverState::FullyResolved => None,
        }
    }
}

impl fmt::Display for DriverState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DriverState::VariablesResolved => "VariablesResolved",
            DriverState::BodiesSkippedResolved => "BodiesSkippedResolved",
            DriverState::Inferred => "Inferred",
            DriverState::FullyResolved => "FullyResolved",
        };
        write!(f, "{}", s)
    }
}

/// Final state of a library cycle after the driver has run
#[derive(Debug, Clone)]
pub struct ResolvedCycle {
    pub elements: ElementStore,
    /// Expression types from the final pass.
    ///
    /// Initializers finalized during inference are not visited again, so
    /// their entries are the ones recorded at inference time. Inside a cyclic
    /// component those may still name a peer's type as `Unknown`.
    pub types: TypeTable,
    pub report: InferenceReport,
}

impl ResolvedCycle {
    /// Hash of all final declaration types
    pub fn fingerprint(&self) -> String {
        fingerprint(&self.elements)
    }

    pub fn type_of(&self, node: NodeId) -> Option<&Type> {
        self.types.get(node)
    }
}

pub struct ResolutionDriver<'a> {
    cycle: &'a LibraryCycle,
    external: &'a dyn ExternalHierarchy,
    options: InferenceOptions,
    provider: CoreTypes,
    store: ElementStore,
    snapshots: SnapshotStore,
    inference_types: TypeTable,
    types: TypeTable,
    report: InferenceReport,
    state: DriverState,
}

impl<'a> ResolutionDriver<'a> {
    pub fn new(
        cycle: &'a LibraryCycle,
        external: &'a dyn ExternalHierarchy,
        options: InferenceOptions,
    ) -> Result<Self, InferenceError> {
        let store = ElementStore::build(cycle)?;
        let provider = provider_for(&store, external);
        Ok(Self {
            cycle,
            external,
            options,
            provider,
            store,
            snapshots: SnapshotStore::new(),
            inference_types: TypeTable::new(),
            types: TypeTable::new(),
            report: InferenceReport::new(),
            state: DriverState::VariablesResolved,
        })
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    pub fn elements(&self) -> &ElementStore {
        &self.store
    }

    pub fn snapshots(&self) -> &SnapshotStore {
        &self.snapshots
    }

    pub fn report(&self) -> &InferenceReport {
        &self.report
    }

    fn expect_next(&self, to: DriverState) -> Result<(), InferenceError> {
        if self.state.next() == Some(to) {
            Ok(())
        } else {
            Err(InferenceError::InvalidTransition {
                from: self.state,
                to,
            })
        }
    }

    /// `VariablesResolved -> BodiesSkippedResolved`
    #[instrument(skip(self), level = "debug")]
    pub fn resolve_signatures(&mut self) -> Result<(), InferenceError> {
        self.expect_next(DriverState::BodiesSkippedResolved)?;
        let mut table = TypeTable::new();
        Resolver::new(
            &self.store,
            &self.provider,
            self.external,
            ResolveMode::signatures_only(),
            &mut table,
        )
        .resolve_cycle(self.cycle, &mut self.snapshots);
        debug!("Captured {} scope snapshots", self.snapshots.len());
        self.state = DriverState::BodiesSkippedResolved;
        Ok(())
    }

    /// `BodiesSkippedResolved -> Inferred`
    #[instrument(skip(self), level = "debug")]
    pub fn infer(&mut self) -> Result<(), InferenceError> {
        self.expect_next(DriverState::Inferred)?;
        let mut table = TypeTable::new();
        self.report = run_inference(
            self.cycle,
            &mut self.store,
            &self.snapshots,
            &self.provider,
            self.external,
            &self.options,
            &mut table,
        )?;
        self.inference_types = table;
        self.state = DriverState::Inferred;
        Ok(())
    }

    /// `Inferred -> FullyResolved`
    #[instrument(skip(self), level = "debug")]
    pub fn resolve_bodies(&mut self) -> Result<(), InferenceError> {
        self.expect_next(DriverState::FullyResolved)?;
        // initializers finalized during inference are not re-visited
        let mut table = self.inference_types.clone();
        Resolver::new(
            &self.store,
            &self.provider,
            self.external,
            ResolveMode::full(),
            &mut table,
        )
        .resolve_cycle(self.cycle, &mut self.snapshots);
        self.types = table;

        if self.options.report.include_expression_types {
            self.report.expression_types = Some(self.types.clone());
        }
        if let Some(path) = &self.options.report.export_path {
            self.report.export_to_file(path)?;
        }
        self.state = DriverState::FullyResolved;
        Ok(())
    }

    /// Walk all remaining states in order
    pub fn run(mut self) -> Result<ResolvedCycle, InferenceError> {
        self.resolve_signatures()?;
        self.infer()?;
        self.resolve_bodies()?;
        self.finish()
    }

    pub fn finish(self) -> Result<ResolvedCycle, InferenceError> {
        if self.state != DriverState::FullyResolved {
            return Err(InferenceError::InvalidTransition {
                from: self.state,
                to: DriverState::FullyResolved,
            });
        }
        info!(
            "Resolved cycle of {} units: {} inferred, {} declined",
            self.cycle.unit_count(),
            self.report.inferred().count(),
            self.report.declined().count()
        );
        Ok(ResolvedCycle {
            elements: self.store,
            types: self.types,
            report: self.report,
        })
    }
}

/// Run the inference phase over a cycle whose signatures have been resolved
/// and whose scope snapshots have been captured. Declarations are updated in
/// place.
#[instrument(skip_all, level = "debug")]
pub fn infer_types(
    cycle: &LibraryCycle,
    store: &mut ElementStore,
    snapshots: &SnapshotStore,
    external: &dyn ExternalHierarchy,
    options: &InferenceOptions,
) -> Result<InferenceReport, InferenceError> {
    let provider = provider_for(store, external);
    let mut table = TypeTable::new();
    run_inference(cycle, store, snapshots, &provider, external, options, &mut table)
}

/// Resolve independent cycles one after another, each with its own state
pub fn resolve_cycles(
    cycles: &[LibraryCycle],
    external: &dyn ExternalHierarchy,
    options: &InferenceOptions,
) -> Result<Vec<ResolvedCycle>, InferenceError> {
    cycles
        .iter()
        .map(|cycle| ResolutionDriver::new(cycle, external, options.clone())?.run())
        .collect()
}

fn run_inference(
    cycle: &LibraryCycle,
    store: &mut ElementStore,
    snapshots: &SnapshotStore,
    provider: &dyn TypeProvider,
    external: &dyn ExternalHierarchy,
    options: &InferenceOptions,
    table: &mut TypeTable,
) -> Result<InferenceReport, InferenceError> {
    let mut report = InferenceReport::new();
    let collected = DeclarationCollector::new(store).collect();
    let mut initializers = InitializerInferencer::new(cycle, snapshots, provider, external, table);

    if options.infer_top_level {
        let graph = DependencyGraph::build(cycle, store, snapshots, &collected.variables)?;
        report.edges = graph
            .edges()
            .into_iter()
            .map(|(from, to)| (store.qualified_name(from), store.qualified_name(to)))
            .collect();

        for component in graph.components() {
            let names: Vec<String> = component.iter().map(|&id| store.qualified_name(id)).collect();
            if graph.is_cyclic(&component) {
                debug!("Cyclic initializer component [{}]", names.join(", "));
            }
            report.components.push(names);
            for id in component {
                let source = initializers.infer(store, id)?;
                record(&mut report, store, id, source);
            }
        }
    } else {
        debug!("Top-level inference disabled");
    }

    if options.infer_instance_members {
        let order = HierarchyWalker::new(store).walk(&collected.classes)?;
        report.class_order = order
            .iter()
            .filter_map(|&id| store.class(id).map(|c| c.name.clone()))
            .collect();

        let fields = OverrideFieldInferencer::new(external);
        let methods = OverrideMethodInferencer::new(external);
        for class in order {
            let collector = DeclarationCollector::new(store);
            let field_ids = collector.instance_fields(class);
            let method_ids = collector.instance_methods(class);

            for id in field_ids {
                let source = fields.infer(&mut initializers, store, id)?;
                record(&mut report, store, id, source);
            }
            for id in method_ids {
                let Some(inference) = methods.infer(store, id)? else {
                    continue;
                };
                if inference.return_type != InferenceSource::Declared {
                    record(&mut report, store, id, inference.return_type);
                }
                for (index, source) in inference.params {
                    record_param(&mut report, store, id, index, source);
                }
            }
        }
    } else {
        debug!("Instance member inference disabled");
    }

    Ok(report)
}

fn record(report: &mut InferenceReport, store: &ElementStore, id: DeclId, source: InferenceSource) {
    if let Some(decl) = store.declaration(id) {
        report.record(store.qualified_name(id), decl.kind, decl.current_type.clone(), source);
    }
}

fn record_param(
    report: &mut InferenceReport,
    store: &ElementStore,
    id: DeclId,
    index: usize,
    source: InferenceSource,
) {
    let Some(param) = store
        .declaration(id)
        .and_then(|d| d.signature.as_ref())
        .and_then(|s| s.params.get(index))
    else {
        return;
    };
    report.record(
        format!("{}({})", store.qualified_name(id), param.name),
        DeclKind::Method,
        param.current_type.clone(),
        source,
    );
}

/// Type provider over the cycle's classes plus their external ancestors
fn provider_for(store: &ElementStore, external: &dyn ExternalHierarchy) -> CoreTypes {
    let mut supertypes: BTreeMap<String, Vec<String>> = store.supertype_names();
    let mut pending: VecDeque<String> = supertypes.values().flatten().cloned().collect();
    while let Some(name) = pending.pop_front() {
        if supertypes.contains_key(&name) {
            continue;
        }
        let direct = external.supertypes(&name);
        pending.extend(direct.iter().cloned());
        supertypes.insert(name, direct);
    }
    CoreTypes::with_class_hierarchy(supertypes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::hierarchy::ExternalClass;
    use strata_core::StaticHierarchy;
    use strata_test_fixtures::scenarios;

    #[test]
    fn test_states_advance_in_order() {
        let lib = scenarios::sum_initializer();
        let hierarchy = StaticHierarchy::new();
        let mut driver = ResolutionDriver::new(&lib, &hierarchy, InferenceOptions::default()).unwrap();

        assert_eq!(driver.state(), DriverState::VariablesResolved);
        driver.resolve_signatures().unwrap();
        assert_eq!(driver.state(), DriverState::BodiesSkippedResolved);
        assert_eq!(driver.snapshots().len(), 1);
        driver.infer().unwrap();
        assert_eq!(driver.state(), DriverState::Inferred);
        assert_eq!(driver.elements().find("x").unwrap().current_type, Type::Int);
        driver.resolve_bodies().unwrap();
        assert_eq!(driver.state(), DriverState::FullyResolved);
    }

    #[test]
    fn test_out_of_order_transitions_are_rejected() {
        let lib = scenarios::sum_initializer();
        let hierarchy = StaticHierarchy::new();
        let mut driver = ResolutionDriver::new(&lib, &hierarchy, InferenceOptions::default()).unwrap();

        let err = driver.infer().unwrap_err();
        assert!(matches!(
            err,
            InferenceError::InvalidTransition {
                from: DriverState::VariablesResolved,
                to: DriverState::Inferred
            }
        ));

        driver.resolve_signatures().unwrap();
        // no state is revisited
        assert!(driver.resolve_signatures().is_err());
        assert!(driver.resolve_bodies().is_err());
        assert_eq!(driver.state(), DriverState::BodiesSkippedResolved);
    }

    #[test]
    fn test_finish_requires_fully_resolved() {
        let lib = scenarios::sum_initializer();
        let hierarchy = StaticHierarchy::new();
        let driver = ResolutionDriver::new(&lib, &hierarchy, InferenceOptions::default()).unwrap();
        assert!(driver.finish().is_err());
    }

    #[test]
    fn test_provider_includes_external_ancestors() {
        let s = strata_test_fixtures::SyntaxBuilder::new();
        let lib = strata_test_fixtures::cycle(vec![strata_test_fixtures::unit(
            "lib/a.dart",
            vec![s.class("Circle").extends("Shape").build()],
        )]);
        let store = ElementStore::build(&lib).unwrap();
        let hierarchy = StaticHierarchy::new().with_class(ExternalClass::new("Shape").implements("Named"));
        let provider = provider_for(&store, &hierarchy);

        assert!(provider.is_subtype(&Type::interface("Circle"), &Type::interface("Named")));
        assert_eq!(provider.ancestors_of("Circle"), vec!["Shape", "Object", "Named"]);
    }
}
