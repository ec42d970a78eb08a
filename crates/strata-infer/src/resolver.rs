//! Resolution visitor
//!
//! One traversal serves both passes over a library cycle. [`ResolveMode`]
//! decides whether method and function bodies are visited and whether scope
//! snapshots are captured at declaration sites. Resolved static types go into
//! a [`TypeTable`] keyed by expression node.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use strata_core::ast::{
    BinaryOp, Block, ClassDecl, ClassMember, FunctionDecl, Item, MethodDecl, MethodKind, Param,
    Stmt, VariableList,
};
use strata_core::element::OBJECT_CLASS;
use strata_core::scope::ScopeKind;
use strata_core::{
    Binding, ClassId, ElementStore, Expr, ExprKind, ExternalHierarchy, LibraryCycle, MemberKind,
    NodeId, Type, TypeProvider,
};

use crate::lookup::MemberLookup;
use crate::snapshot::{ResolutionContext, ScopeSnapshot, SnapshotStore};

/// Pass configuration for the resolution visitor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolveMode {
    /// Elide method, function and constructor bodies
    pub skip_bodies: bool,
    /// Capture a scope snapshot at every variable and field list
    pub capture_snapshots: bool,
}

impl ResolveMode {
    pub fn signatures_only() -> Self {
        Self {
            skip_bodies: true,
            capture_snapshots: true,
        }
    }

    pub fn full() -> Self {
        Self {
            skip_bodies: false,
            capture_snapshots: false,
        }
    }
}

/// Static type of every resolved expression, by node
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TypeTable(BTreeMap<NodeId, Type>);

impl TypeTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, node: NodeId, ty: Type) {
        self.0.insert(node, ty);
    }

    pub fn get(&self, node: NodeId) -> Option<&Type> {
        self.0.get(&node)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NodeId, &Type)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Expression resolution capability used by the inferencers
pub trait ExpressionResolver {
    fn resolve_expression(&mut self, expr: &Expr) -> Type;

    fn context_mut(&mut self) -> &mut ResolutionContext;

    /// Resolve `expr` under a restored snapshot, then put the previous
    /// context back so sibling resolutions are unaffected.
    fn resolve_under(&mut self, snapshot: &ScopeSnapshot, expr: &Expr) -> Type {
        let previous = snapshot.restore_into(self.context_mut());
        let ty = self.resolve_expression(expr);
        *self.context_mut() = previous;
        ty
    }
}

pub struct Resolver<'a> {
    store: &'a ElementStore,
    provider: &'a dyn TypeProvider,
    lookup: MemberLookup<'a>,
    mode: ResolveMode,
    context: ResolutionContext,
    table: &'a mut TypeTable,
}

impl<'a> Resolver<'a> {
    pub fn new(
        store: &'a ElementStore,
        provider: &'a dyn TypeProvider,
        external: &'a dyn ExternalHierarchy,
        mode: ResolveMode,
        table: &'a mut TypeTable,
    ) -> Self {
        Self {
            store,
            provider,
            lookup: MemberLookup::new(store, external),
            mode,
            context: ResolutionContext::new(store.library_scope()),
            table,
        }
    }

    pub fn mode(&self) -> ResolveMode {
        self.mode
    }

    /// Resolve every unit of the cycle in source order
    pub fn resolve_cycle(&mut self, cycle: &LibraryCycle, snapshots: &mut SnapshotStore) {
        let library = self.store.library_scope();
        for unit in &cycle.units {
            tracing::trace!("Resolving {} (skip_bodies={})", unit.uri, self.mode.skip_bodies);
            self.context = ResolutionContext::new(library.clone());
            for item in &unit.items {
                match item {
                    Item::Variables(list) => self.resolve_variable_list(list, snapshots),
                    Item::Function(function) => self.resolve_function(function),
                    Item::Class(class) => self.resolve_class(class, snapshots),
                }
            }
        }
    }

    fn resolve_variable_list(&mut self, list: &VariableList, snapshots: &mut SnapshotStore) {
        if self.mode.capture_snapshots {
            snapshots.capture(list.id, &self.context);
        }
        for variable in &list.variables {
            let Some(initializer) = &variable.initializer else {
                continue;
            };
            let finalized = self
                .store
                .declaration_for_node(variable.id)
                .and_then(|id| self.store.declaration(id))
                .is_some_and(|decl| decl.is_resolved());
            if finalized {
                tracing::trace!("Skipping finalized initializer of {}", variable.name);
                continue;
            }
            self.resolve_expression(initializer);
        }
    }

    fn resolve_class(&mut self, class: &ClassDecl, snapshots: &mut SnapshotStore) {
        let Some(id) = self.store.class_by_name(&class.name) else {
            return;
        };
        // a duplicate declaration of an already-registered class name
        if self.store.class(id).map(|node| node.site) != Some(class.id) {
            return;
        }

        let saved = self.context.clone();
        self.context.names = self.store.class_scope(id, &saved.names);
        for member in &class.members {
            match member {
                ClassMember::Fields(fields) => {
                    self.resolve_variable_list(&fields.variables, snapshots)
                }
                ClassMember::Method(method) => self.resolve_method(method, id),
            }
        }
        self.context = saved;
    }

    fn resolve_method(&mut self, method: &MethodDecl, class: ClassId) {
        if self.mode.skip_bodies {
            return;
        }
        let Some(body) = &method.body else {
            return;
        };
        let params: Vec<(String, Type)> = match self
            .store
            .declaration_for_node(method.id)
            .and_then(|id| self.store.declaration(id))
            .and_then(|decl| decl.signature.as_ref())
        {
            Some(signature) => signature
                .params
                .iter()
                .map(|p| (p.name.clone(), p.current_type.clone()))
                .collect(),
            // constructors have no declaration of their own
            None => declared_params(&method.params),
        };
        tracing::trace!(
            "Resolving body of {}.{}",
            self.store.class(class).map_or("?", |node| node.name.as_str()),
            method.name
        );
        self.resolve_body(params, body);
    }

    fn resolve_function(&mut self, function: &FunctionDecl) {
        if self.mode.skip_bodies {
            return;
        }
        if let Some(body) = &function.body {
            self.resolve_body(declared_params(&function.params), body);
        }
    }

    fn resolve_body(&mut self, params: Vec<(String, Type)>, body: &Block) {
        let saved = self.context.clone();
        let bindings = params
            .into_iter()
            .map(|(name, ty)| (name, Binding::Local(local_type(ty))))
            .collect();
        self.context.names = saved.names.push(ScopeKind::Function, bindings);
        self.resolve_block(body);
        self.context = saved;
    }

    fn resolve_block(&mut self, block: &Block) {
        let saved = self.context.clone();
        self.context.names = saved.names.push(ScopeKind::Block, BTreeMap::new());
        for statement in &block.statements {
            self.resolve_statement(statement);
        }
        self.context = saved;
    }

    fn resolve_statement(&mut self, statement: &Stmt) {
        match statement {
            Stmt::Expr(expr) | Stmt::Return(Some(expr)) => {
                self.resolve_expression(expr);
            }
            Stmt::Return(None) => {}
            Stmt::Local(list) => {
                for variable in &list.variables {
                    let inferred = variable
                        .initializer
                        .as_ref()
                        .map(|init| self.resolve_expression(init));
                    let ty = match (&list.declared_type, inferred) {
                        (Some(declared), _) => declared.clone(),
                        (None, Some(ty)) if ty.is_inferable() => ty,
                        _ => self.provider.dynamic_type(),
                    };
                    self.context.names = self
                        .context
                        .names
                        .with_binding(variable.name.clone(), Binding::Local(ty));
                }
            }
            Stmt::Assign { name, value } => {
                let ty = self.resolve_expression(value);
                if matches!(self.context.names.lookup(name), Some(Binding::Local(_))) {
                    self.context.overrides = self.context.overrides.with(name.clone(), ty);
                }
            }
            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.resolve_expression(condition);
                let saved = self.context.clone();
                if let Some((name, ty)) = self.promotion(condition) {
                    self.context.promotions = self.context.promotions.with(name, ty);
                }
                self.resolve_block(then_branch);
                self.context = saved;
                if let Some(else_branch) = else_branch {
                    self.resolve_block(else_branch);
                }
            }
        }
    }

    /// `x is T` on a local or parameter promotes `x` to `T`
    fn promotion(&self, condition: &Expr) -> Option<(String, Type)> {
        let ExprKind::IsCheck { expr, ty } = &condition.kind else {
            return None;
        };
        let ExprKind::Identifier(name) = &expr.kind else {
            return None;
        };
        match self.context.names.lookup(name) {
            Some(Binding::Local(_)) => Some((name.clone(), ty.clone())),
            _ => None,
        }
    }

    fn type_of(&mut self, expr: &Expr) -> Type {
        match &expr.kind {
            ExprKind::Int(_) => self.provider.int_type(),
            ExprKind::Double(_) => self.provider.double_type(),
            ExprKind::Str(_) => self.provider.string_type(),
            ExprKind::Bool(_) => self.provider.bool_type(),
            ExprKind::Null => self.provider.bottom_type(),
            ExprKind::Throw(inner) => {
                self.resolve_expression(inner);
                self.provider.bottom_type()
            }
            ExprKind::Identifier(name) => self.identifier_type(name),
            ExprKind::StaticGet { class, name } => self.static_get_type(class, name),
            ExprKind::PropertyGet { target, name } => {
                let target = self.resolve_expression(target);
                self.property_type(&target, name)
            }
            ExprKind::Call { callee, args } => {
                for arg in args {
                    self.resolve_expression(arg);
                }
                self.call_type(callee)
            }
            ExprKind::Binary { op, lhs, rhs } => {
                let lhs = self.resolve_expression(lhs);
                let rhs = self.resolve_expression(rhs);
                self.binary_type(*op, &lhs, &rhs)
            }
            ExprKind::List(elements) => {
                let mut element = None;
                for expr in elements {
                    let ty = self.resolve_expression(expr);
                    element = Some(match element {
                        None => ty,
                        Some(acc) => self.provider.least_upper_bound(&acc, &ty),
                    });
                }
                Type::list(element.unwrap_or_else(|| self.provider.dynamic_type()))
            }
            ExprKind::Conditional {
                condition,
                then_expr,
                else_expr,
            } => {
                self.resolve_expression(condition);
                let saved = self.context.promotions.clone();
                if let Some((name, ty)) = self.promotion(condition) {
                    self.context.promotions = self.context.promotions.with(name, ty);
                }
                let then_ty = self.resolve_expression(then_expr);
                self.context.promotions = saved;
                let else_ty = self.resolve_expression(else_expr);
                self.provider.least_upper_bound(&then_ty, &else_ty)
            }
            ExprKind::IsCheck { expr, .. } => {
                self.resolve_expression(expr);
                self.provider.bool_type()
            }
        }
    }

    fn identifier_type(&self, name: &str) -> Type {
        if let Some(promoted) = self.context.promotions.get(name) {
            return promoted.clone();
        }
        if let Some(assigned) = self.context.overrides.get(name) {
            return assigned.clone();
        }
        match self.context.names.lookup(name) {
            Some(Binding::Declaration(id)) => match self.store.declaration(*id) {
                Some(decl) => match &decl.signature {
                    Some(signature) if signature.kind == MethodKind::Method => {
                        Type::function(signature.param_types(), decl.current_type.clone())
                    }
                    _ => decl.getter_type().clone(),
                },
                None => self.provider.dynamic_type(),
            },
            Some(Binding::Class(_)) => Type::interface("Type"),
            Some(Binding::Function(ty)) | Some(Binding::Local(ty)) => ty.clone(),
            None => self.provider.dynamic_type(),
        }
    }

    fn static_get_type(&self, class: &str, name: &str) -> Type {
        let member = self
            .store
            .class_by_name(class)
            .and_then(|id| self.store.class(id))
            .and_then(|node| {
                node.members
                    .iter()
                    .filter_map(|&id| self.store.declaration(id))
                    .find(|decl| decl.is_static && decl.name == name)
            });
        match member {
            Some(decl) => decl.getter_type().clone(),
            None => self.provider.dynamic_type(),
        }
    }

    fn property_type(&self, target: &Type, name: &str) -> Type {
        let class = match target {
            Type::Interface(class) => class.as_str(),
            Type::String if name == "length" => return self.provider.int_type(),
            Type::String if name == "isEmpty" => return self.provider.bool_type(),
            Type::List(_) if name == "length" => return self.provider.int_type(),
            Type::List(_) if name == "isEmpty" => return self.provider.bool_type(),
            ty if ty.is_dynamic() || ty.is_bottom() => return self.provider.dynamic_type(),
            _ => OBJECT_CLASS,
        };
        match self
            .lookup
            .find(&self.lookup.class_ref(class), name, MemberKind::Getter)
        {
            Some(member) if !member.return_type.is_unknown() => member.return_type,
            _ => self.provider.dynamic_type(),
        }
    }

    fn call_type(&self, callee: &str) -> Type {
        match self.identifier_type(callee) {
            Type::Function { ret, .. } if !ret.is_unknown() => *ret,
            _ => self.provider.dynamic_type(),
        }
    }

    fn binary_type(&self, op: BinaryOp, lhs: &Type, rhs: &Type) -> Type {
        if op.is_comparison() || op.is_logical() {
            return self.provider.bool_type();
        }
        if lhs.is_dynamic() || rhs.is_dynamic() {
            return self.provider.dynamic_type();
        }
        let numeric = lhs.is_numeric() && rhs.is_numeric();
        match op {
            BinaryOp::Add if *lhs == Type::String && *rhs == Type::String => {
                self.provider.string_type()
            }
            BinaryOp::Div if numeric => self.provider.double_type(),
            BinaryOp::IntDiv if numeric => self.provider.int_type(),
            op if op.is_arithmetic() && numeric => match (lhs, rhs) {
                (Type::Int, Type::Int) => self.provider.int_type(),
                (Type::Double, _) | (_, Type::Double) => self.provider.double_type(),
                _ => self.provider.num_type(),
            },
            _ => self.provider.dynamic_type(),
        }
    }
}

impl ExpressionResolver for Resolver<'_> {
    fn resolve_expression(&mut self, expr: &Expr) -> Type {
        let ty = self.type_of(expr);
        self.table.insert(expr.id, ty.clone());
        ty
    }

    fn context_mut(&mut self) -> &mut ResolutionContext {
        &mut self.context
    }
}

fn declared_params(params: &[Param]) -> Vec<(String, Type)> {
    params
        .iter()
        .map(|p| (p.name.clone(), p.declared_type.clone().unwrap_or(Type::Dynamic)))
        .collect()
}

fn local_type(ty: Type) -> Type {
    if ty.is_unknown() {
        Type::Dynamic
    } else {
        ty
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::{CoreTypes, StaticHierarchy};
    use strata_test_fixtures::{block, cycle, param, unit, SyntaxBuilder};

    struct Harness {
        store: ElementStore,
        provider: CoreTypes,
        hierarchy: StaticHierarchy,
    }

    impl Harness {
        fn new(lib: &LibraryCycle) -> Self {
            let store = ElementStore::build(lib).unwrap();
            let provider = CoreTypes::with_class_hierarchy(store.supertype_names());
            Self {
                store,
                provider,
                hierarchy: StaticHierarchy::new(),
            }
        }

        fn resolve(&self, lib: &LibraryCycle, mode: ResolveMode) -> (TypeTable, SnapshotStore) {
            let mut table = TypeTable::new();
            let mut snapshots = SnapshotStore::new();
            Resolver::new(&self.store, &self.provider, &self.hierarchy, mode, &mut table)
                .resolve_cycle(lib, &mut snapshots);
            (table, snapshots)
        }
    }

    #[test]
    fn test_expression_typing() {
        let s = SyntaxBuilder::new();
        let sum = s.add(s.int(1), s.double(2.0));
        let concat = s.add(s.string("a"), s.string("b"));
        let cmp = s.binary(BinaryOp::Lt, s.int(1), s.int(2));
        let div = s.binary(BinaryOp::Div, s.int(1), s.int(2));
        let list = s.list(vec![s.int(1), s.double(2.0)]);
        let empty = s.list(vec![]);
        let null = s.null();
        let ids = [sum.id, concat.id, cmp.id, div.id, list.id, empty.id, null.id];
        let lib = cycle(vec![unit(
            "lib/a.dart",
            vec![s.top_vars(vec![
                ("a", sum),
                ("b", concat),
                ("c", cmp),
                ("d", div),
                ("e", list),
                ("f", empty),
                ("g", null),
            ])],
        )]);

        let harness = Harness::new(&lib);
        let (table, _) = harness.resolve(&lib, ResolveMode::signatures_only());
        let types: Vec<_> = ids.iter().map(|id| table.get(*id).cloned().unwrap()).collect();
        assert_eq!(
            types,
            vec![
                Type::Double,
                Type::String,
                Type::Bool,
                Type::Double,
                Type::list(Type::Num),
                Type::list(Type::Dynamic),
                Type::Bottom,
            ]
        );
    }

    #[test]
    fn test_skip_bodies_and_snapshot_capture() {
        let s = SyntaxBuilder::new();
        let inner = s.int(1);
        let inner_id = inner.id;
        let body = block(vec![Stmt::Return(Some(inner))]);
        let lib = cycle(vec![unit(
            "lib/a.dart",
            vec![
                s.function("f", Some("int"), vec![], Some(body)),
                s.top_var("x", s.int(2)),
            ],
        )]);
        let harness = Harness::new(&lib);

        let (table, snapshots) = harness.resolve(&lib, ResolveMode::signatures_only());
        assert!(table.get(inner_id).is_none());
        assert_eq!(snapshots.len(), 1);

        let (table, snapshots) = harness.resolve(&lib, ResolveMode::full());
        assert_eq!(table.get(inner_id), Some(&Type::Int));
        assert!(snapshots.is_empty());
    }

    #[test]
    fn test_full_pass_skips_finalized_initializers() {
        let s = SyntaxBuilder::new();
        let finalized = s.add(s.int(1), s.int(2));
        let finalized_id = finalized.id;
        let open = s.string("b");
        let open_id = open.id;
        let lib = cycle(vec![unit(
            "lib/a.dart",
            vec![s.top_var("a", finalized), s.top_var("b", open)],
        )]);
        let mut harness = Harness::new(&lib);
        let a = harness.store.find("a").unwrap().id;
        harness.store.declaration_mut(a).unwrap().mark_resolved();

        let mut table = TypeTable::new();
        table.insert(finalized_id, Type::Num);
        let mut snapshots = SnapshotStore::new();
        Resolver::new(
            &harness.store,
            &harness.provider,
            &harness.hierarchy,
            ResolveMode::full(),
            &mut table,
        )
        .resolve_cycle(&lib, &mut snapshots);

        // the earlier entry survives and the operands are never visited
        assert_eq!(table.get(finalized_id), Some(&Type::Num));
        assert_eq!(table.len(), 2);
        assert_eq!(table.get(open_id), Some(&Type::String));
    }

    #[test]
    fn test_promotion_and_assignment_in_bodies() {
        let s = SyntaxBuilder::new();
        let promoted = s.ident("value");
        let promoted_id = promoted.id;
        let after = s.ident("count");
        let after_id = after.id;
        let outside = s.ident("value");
        let outside_id = outside.id;
        let body = block(vec![
            Stmt::If {
                condition: s.is_check(s.ident("value"), "int"),
                then_branch: block(vec![Stmt::Expr(promoted)]),
                else_branch: None,
            },
            s.local("count", None, s.int(0)),
            Stmt::Assign {
                name: "count".to_string(),
                value: s.double(1.5),
            },
            Stmt::Expr(after),
            Stmt::Expr(outside),
        ]);
        let lib = cycle(vec![unit(
            "lib/a.dart",
            vec![s.function("f", None, vec![param("value", Some("Object"))], Some(body))],
        )]);
        let harness = Harness::new(&lib);
        let (table, _) = harness.resolve(&lib, ResolveMode::full());

        assert_eq!(table.get(promoted_id), Some(&Type::Int));
        assert_eq!(table.get(outside_id), Some(&Type::Object));
        assert_eq!(table.get(after_id), Some(&Type::Double));
    }

    #[test]
    fn test_resolve_under_restores_previous_context() {
        let s = SyntaxBuilder::new();
        let lib = cycle(vec![unit("lib/a.dart", vec![s.top_var("x", s.int(1))])]);
        let harness = Harness::new(&lib);
        let mut table = TypeTable::new();
        let mut snapshots = SnapshotStore::new();

        let mut captured = ResolutionContext::new(harness.store.library_scope());
        captured.promotions = captured.promotions.with("y", Type::String);
        snapshots.capture(NodeId(100), &captured);

        let mut resolver = Resolver::new(
            &harness.store,
            &harness.provider,
            &harness.hierarchy,
            ResolveMode::signatures_only(),
            &mut table,
        );
        let before = resolver.context_mut().clone();
        let promoted = s.ident("y");
        let snapshot = snapshots.get(NodeId(100)).unwrap();

        assert_eq!(resolver.resolve_under(snapshot, &promoted), Type::String);
        assert!(resolver.context_mut().names.same_as(&before.names));
        assert!(resolver.context_mut().promotions.is_empty());
        assert!(snapshot.promotions().get("y").is_some());
    }

    #[test]
    fn test_property_access_uses_member_lookup() {
        let s = SyntaxBuilder::new();
        let get = s.get(s.call("make", vec![]), "size");
        let get_id = get.id;
        let hash = s.get(s.string("a"), "hashCode");
        let hash_id = hash.id;
        let lib = cycle(vec![unit(
            "lib/a.dart",
            vec![
                s.class("Box").getter("size", Some("int"), None).build(),
                s.function("make", Some("Box"), vec![], None),
                s.top_vars(vec![("a", get), ("b", hash)]),
            ],
        )]);
        let harness = Harness::new(&lib);
        let (table, _) = harness.resolve(&lib, ResolveMode::signatures_only());

        assert_eq!(table.get(get_id), Some(&Type::Int));
        assert_eq!(table.get(hash_id), Some(&Type::Int));
    }
}
