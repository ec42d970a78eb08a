//! Staged type inference for library cycles
//!
//! Fills in omitted static types on top-level and static variables, instance
//! fields, and overriding method signatures. Two sources feed inference:
//! initializer expressions, ordered through a dependency graph of strongly
//! connected components, and overridden members, propagated down the class
//! hierarchy in supertype-first order.
//!
//! [`ResolutionDriver`] runs the whole sequence for one cycle. [`infer_types`]
//! exposes only the inference phase for callers that run their own resolution
//! passes.

pub mod collector;
pub mod driver;
pub mod error;
pub mod graph;
pub mod hierarchy;
pub mod initializer;
pub mod lookup;
pub mod overrides;
pub mod report;
pub mod resolver;
pub mod snapshot;

pub use collector::{Collected, DeclarationCollector};
pub use driver::{infer_types, resolve_cycles, DriverState, ResolutionDriver, ResolvedCycle};
pub use error::InferenceError;
pub use graph::DependencyGraph;
pub use hierarchy::HierarchyWalker;
pub use initializer::{Evaluation, InitializerInferencer};
pub use overrides::{MethodInference, OverrideFieldInferencer, OverrideMethodInferencer};
pub use report::{fingerprint, DeclineReason, InferenceRecord, InferenceReport, InferenceSource};
pub use resolver::{ExpressionResolver, ResolveMode, Resolver, TypeTable};
pub use snapshot::{ResolutionContext, ScopeSnapshot, SnapshotStore};
