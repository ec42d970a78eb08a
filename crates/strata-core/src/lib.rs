//! Core type model, syntax model and element store for strata
//!
//! Everything the staged inference resolver reads or mutates lives here: the
//! static [`Type`] lattice, the syntax tree handed over by the front end, the
//! element arena ([`ElementStore`]) holding declarations and classes, and the
//! persistent lexical scopes used to checkpoint resolution state.

pub mod ast;
pub mod config;
pub mod element;
pub mod error;
pub mod hierarchy;
pub mod scope;
pub mod types;

pub use ast::{CompilationUnit, Expr, ExprKind, LibraryCycle, NodeId};
pub use config::InferenceOptions;
pub use element::{
    ClassId, ClassNode, ClassRef, DeclId, DeclKind, Declaration, ElementStore, MemberKind,
    MemberSignature, ResolutionState,
};
pub use error::CoreError;
pub use hierarchy::{ExternalHierarchy, StaticHierarchy};
pub use scope::{Binding, Scope, TypeFacts};
pub use types::{CoreTypes, Type, TypeProvider};
