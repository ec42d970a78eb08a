//! Initializer dependency graph
//!
//! An edge `from -> to` means the initializer of `from` reads the current
//! value of `to`. Only references between members of the same batch become
//! edges; anything else is treated as already resolved.

use std::collections::{BTreeMap, BTreeSet};

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;

use strata_core::{Binding, DeclId, ElementStore, ExprKind, LibraryCycle};

use crate::error::InferenceError;
use crate::snapshot::SnapshotStore;

pub struct DependencyGraph {
    graph: DiGraph<DeclId, ()>,
    indices: BTreeMap<DeclId, NodeIndex>,
    /// Collection position of each batch member
    positions: BTreeMap<DeclId, usize>,
}

impl DependencyGraph {
    pub fn build(
        cycle: &LibraryCycle,
        store: &ElementStore,
        snapshots: &SnapshotStore,
        batch: &[DeclId],
    ) -> Result<Self, InferenceError> {
        let mut graph = DiGraph::new();
        let mut indices = BTreeMap::new();
        let mut positions = BTreeMap::new();

        for (position, &id) in batch.iter().enumerate() {
            indices.insert(id, graph.add_node(id));
            positions.insert(id, position);
        }

        for &id in batch {
            let decl = store
                .declaration(id)
                .ok_or_else(|| InferenceError::structural(format!("<decl {}>", id.0), "not in element store"))?;
            let Some(initializer) = decl.initializer else {
                continue;
            };
            let expr = initializer.resolve(cycle).ok_or_else(|| {
                InferenceError::structural(store.qualified_name(id), "initializer not found in cycle")
            })?;
            let snapshot = snapshots.get(decl.site).ok_or_else(|| {
                InferenceError::structural(store.qualified_name(id), "no scope snapshot for declaration site")
            })?;

            let mut targets = BTreeSet::new();
            expr.walk(&mut |e| match &e.kind {
                ExprKind::Identifier(name) => {
                    if let Some(Binding::Declaration(target)) = snapshot.names().lookup(name) {
                        targets.insert(*target);
                    }
                }
                ExprKind::StaticGet { class, name } => {
                    let target = store
                        .class_by_name(class)
                        .and_then(|c| store.class(c))
                        .and_then(|node| {
                            node.members
                                .iter()
                                .copied()
                                .find(|&m| store.declaration(m).is_some_and(|d| d.is_static && d.name == *name))
                        });
                    if let Some(target) = target {
                        targets.insert(target);
                    }
                }
                _ => {}
            });

            let from = indices[&id];
            for target in targets {
                if let Some(&to) = indices.get(&target) {
                    tracing::trace!(
                        "Dependency edge {} -> {}",
                        store.qualified_name(id),
                        store.qualified_name(target)
                    );
                    graph.add_edge(from, to, ());
                }
            }
        }

        Ok(Self {
            graph,
            indices,
            positions,
        })
    }

    /// Strongly connected components, dependencies first.
    ///
    /// Members of a component are listed in collection order.
    pub fn components(&self) -> Vec<Vec<DeclId>> {
        tarjan_scc(&self.graph)
            .into_iter()
            .map(|component| {
                let mut members: Vec<DeclId> = component.into_iter().map(|n| self.graph[n]).collect();
                members.sort_by_key(|id| self.positions.get(id).copied().unwrap_or(usize::MAX));
                members
            })
            .collect()
    }

    /// Batch members the initializer of `id` reads
    pub fn dependencies(&self, id: DeclId) -> Vec<DeclId> {
        let Some(&node) = self.indices.get(&id) else {
            return Vec::new();
        };
        let mut deps: Vec<DeclId> = self
            .graph
            .neighbors_directed(node, Direction::Outgoing)
            .map(|n| self.graph[n])
            .collect();
        deps.sort_by_key(|dep| self.positions.get(dep).copied().unwrap_or(usize::MAX));
        deps
    }

    pub fn edges(&self) -> Vec<(DeclId, DeclId)> {
        self.graph
            .edge_references()
            .map(|edge| (self.graph[edge.source()], self.graph[edge.target()]))
            .collect()
    }

    /// Whether the component has more than one member or a self-reference
    pub fn is_cyclic(&self, component: &[DeclId]) -> bool {
        match component {
            [single] => self
                .indices
                .get(single)
                .is_some_and(|&n| self.graph.contains_edge(n, n)),
            members => members.len() > 1,
        }
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::DeclarationCollector;
    use crate::resolver::{ResolveMode, Resolver, TypeTable};
    use strata_core::{CoreTypes, StaticHierarchy};
    use strata_test_fixtures::{cycle, scenarios, unit, SyntaxBuilder};

    fn graph_for(lib: &LibraryCycle) -> (ElementStore, DependencyGraph) {
        let store = ElementStore::build(lib).unwrap();
        let provider = CoreTypes::new();
        let hierarchy = StaticHierarchy::new();
        let mut table = TypeTable::new();
        let mut snapshots = SnapshotStore::new();
        Resolver::new(&store, &provider, &hierarchy, ResolveMode::signatures_only(), &mut table)
            .resolve_cycle(lib, &mut snapshots);
        let batch = DeclarationCollector::new(&store).collect().variables;
        let graph = DependencyGraph::build(lib, &store, &snapshots, &batch).unwrap();
        (store, graph)
    }

    fn names(store: &ElementStore, components: Vec<Vec<DeclId>>) -> Vec<Vec<String>> {
        components
            .into_iter()
            .map(|c| c.into_iter().map(|id| store.qualified_name(id)).collect())
            .collect()
    }

    #[test]
    fn test_forward_reference_orders_dependency_first() {
        let lib = scenarios::forward_reference();
        let (store, graph) = graph_for(&lib);
        assert_eq!(names(&store, graph.components()), vec![vec!["b"], vec!["a"]]);
        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn test_mutual_references_form_one_component() {
        let lib = scenarios::mutual_cycle();
        let (store, graph) = graph_for(&lib);
        let components = graph.components();
        let cyclic: Vec<_> = components.iter().filter(|c| graph.is_cyclic(c)).collect();
        assert_eq!(cyclic.len(), 1);
        assert_eq!(names(&store, vec![cyclic[0].clone()]), vec![vec!["a", "b"]]);
    }

    #[test]
    fn test_call_initializer_has_no_edges() {
        let lib = scenarios::call_initializer();
        let (store, graph) = graph_for(&lib);
        assert_eq!(graph.edge_count(), 0);
        assert_eq!(names(&store, graph.components()), vec![vec!["y"], vec!["z"]]);
    }

    #[test]
    fn test_static_get_and_self_reference() {
        let s = SyntaxBuilder::new();
        let lib = cycle(vec![unit(
            "lib/a.dart",
            vec![
                s.class("C").static_field("seed", Some(s.int(1))).build(),
                s.top_var("x", s.static_get("C", "seed")),
                s.top_var("loop", s.add(s.ident("loop"), s.int(1))),
            ],
        )]);
        let (store, graph) = graph_for(&lib);

        let x = store.top_level("x").unwrap();
        let seed = store.find("C.seed").unwrap().id;
        assert_eq!(graph.dependencies(x), vec![seed]);

        let looped = vec![store.top_level("loop").unwrap()];
        assert!(graph.is_cyclic(&looped));
        assert!(!graph.is_cyclic(&[x]));
    }
}
