//! Element store: declarations and classes read from a library cycle
//!
//! Declarations and class nodes live in flat arenas and reference each other
//! by [`DeclId`] / [`ClassId`]. The store is built once per resolution run and
//! then mutated in place by the inference phase.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::ast::{ClassMember, Expr, Item, LibraryCycle, MethodDecl, MethodKind, NodeId, Param};
use crate::error::CoreError;
use crate::scope::{Binding, Scope, ScopeKind};
use crate::types::Type;

/// Name of the implicit root class
pub const OBJECT_CLASS: &str = "Object";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeclId(pub u32);

impl DeclId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClassId(pub u32);

impl ClassId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeclKind {
    Global,
    Static,
    InstanceField,
    Method,
}

impl fmt::Display for DeclKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DeclKind::Global => "global",
            DeclKind::Static => "static",
            DeclKind::InstanceField => "field",
            DeclKind::Method => "method",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResolutionState {
    Unresolved,
    /// Initializer already finalized; the full pass must not re-visit it
    Resolved,
}

/// Location of an initializer expression inside the cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExprRef {
    TopLevel {
        unit: usize,
        item: usize,
        variable: usize,
    },
    Member {
        unit: usize,
        item: usize,
        member: usize,
        variable: usize,
    },
}

impl ExprRef {
    pub fn resolve<'a>(&self, cycle: &'a LibraryCycle) -> Option<&'a Expr> {
        match *self {
            ExprRef::TopLevel {
                unit,
                item,
                variable,
            } => match cycle.units.get(unit)?.items.get(item)? {
                Item::Variables(list) => list.variables.get(variable)?.initializer.as_ref(),
                _ => None,
            },
            ExprRef::Member {
                unit,
                item,
                member,
                variable,
            } => match cycle.units.get(unit)?.items.get(item)? {
                Item::Class(class) => match class.members.get(member)? {
                    ClassMember::Fields(fields) => fields
                        .variables
                        .variables
                        .get(variable)?
                        .initializer
                        .as_ref(),
                    ClassMember::Method(_) => None,
                },
                _ => None,
            },
        }
    }
}

/// Types of the getter/setter synthesized for a variable or field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessorTypes {
    pub getter: Type,
    /// `None` for read-only variables
    pub setter: Option<Type>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamSignature {
    pub name: String,
    pub declared_type: Option<Type>,
    pub current_type: Type,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodSignature {
    pub kind: MethodKind,
    pub params: Vec<ParamSignature>,
}

impl MethodSignature {
    fn from_params(kind: MethodKind, params: &[Param]) -> Self {
        Self {
            kind,
            params: params
                .iter()
                .map(|p| ParamSignature {
                    name: p.name.clone(),
                    declared_type: p.declared_type.clone(),
                    current_type: p.declared_type.clone().unwrap_or(Type::Unknown),
                })
                .collect(),
        }
    }

    pub fn param_types(&self) -> Vec<Type> {
        self.params.iter().map(|p| p.current_type.clone()).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Declaration {
    pub id: DeclId,
    pub name: String,
    pub kind: DeclKind,
    pub declared_type: Option<Type>,
    pub initializer: Option<ExprRef>,
    pub enclosing_class: Option<ClassId>,
    pub current_type: Type,
    pub state: ResolutionState,
    /// Variable/field list (or method) this declaration was read from
    pub site: NodeId,
    /// The declaring node itself
    pub node: NodeId,
    pub is_static: bool,
    pub is_final: bool,
    pub accessors: Option<AccessorTypes>,
    pub signature: Option<MethodSignature>,
}

impl Declaration {
    pub fn has_declared_type(&self) -> bool {
        self.declared_type.is_some()
    }

    /// Type seen by readers of this declaration through its getter
    pub fn getter_type(&self) -> &Type {
        match &self.accessors {
            Some(accessors) => &accessors.getter,
            None => &self.current_type,
        }
    }

    /// Adopt an inferred type for a variable, field or method return type.
    ///
    /// Declared types are never touched, uninformative types are never
    /// adopted, and a type is only ever assigned over the `Unknown` sentinel.
    /// Returns whether the assignment happened.
    pub fn assign_inferred(&mut self, ty: Type) -> bool {
        if self.has_declared_type() || !ty.is_inferable() || !self.current_type.is_unknown() {
            return false;
        }
        if let Some(accessors) = self.accessors.as_mut() {
            accessors.getter = ty.clone();
            if let Some(setter) = accessors.setter.as_mut() {
                *setter = ty.clone();
            }
        }
        self.current_type = ty;
        true
    }

    /// Adopt an inferred type for an untyped parameter
    pub fn assign_param(&mut self, index: usize, ty: Type) -> bool {
        let Some(param) = self
            .signature
            .as_mut()
            .and_then(|s| s.params.get_mut(index))
        else {
            return false;
        };
        if param.declared_type.is_some() || !ty.is_inferable() || !param.current_type.is_unknown()
        {
            return false;
        }
        param.current_type = ty;
        true
    }

    pub fn mark_resolved(&mut self) {
        self.state = ResolutionState::Resolved;
    }

    pub fn is_resolved(&self) -> bool {
        self.state == ResolutionState::Resolved
    }

    /// Signature this declaration exposes as a member of the given kind
    pub fn member_signature(&self, owner: &str, kind: MemberKind) -> Option<MemberSignature> {
        if self.is_static {
            return None;
        }
        let (return_type, params) = match (kind, &self.accessors, &self.signature) {
            (MemberKind::Getter, Some(accessors), _) => (accessors.getter.clone(), Vec::new()),
            (MemberKind::Setter, Some(accessors), _) => {
                let setter = accessors.setter.clone()?;
                (Type::Void, vec![setter])
            }
            (_, None, Some(signature)) if MemberKind::from(signature.kind) == kind => {
                (self.current_type.clone(), signature.param_types())
            }
            _ => return None,
        };
        Some(MemberSignature {
            owner: owner.to_string(),
            name: self.name.clone(),
            kind,
            return_type,
            params,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MemberKind {
    Getter,
    Setter,
    Method,
}

impl From<MethodKind> for MemberKind {
    fn from(kind: MethodKind) -> Self {
        match kind {
            MethodKind::Getter => MemberKind::Getter,
            MethodKind::Setter => MemberKind::Setter,
            MethodKind::Method | MethodKind::Constructor => MemberKind::Method,
        }
    }
}

/// A member as seen from a subclass looking for what it overrides
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberSignature {
    pub owner: String,
    pub name: String,
    pub kind: MemberKind,
    pub return_type: Type,
    pub params: Vec<Type>,
}

impl MemberSignature {
    pub fn getter(owner: impl Into<String>, name: impl Into<String>, ty: Type) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
            kind: MemberKind::Getter,
            return_type: ty,
            params: Vec::new(),
        }
    }

    pub fn setter(owner: impl Into<String>, name: impl Into<String>, ty: Type) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
            kind: MemberKind::Setter,
            return_type: Type::Void,
            params: vec![ty],
        }
    }

    pub fn method(
        owner: impl Into<String>,
        name: impl Into<String>,
        params: Vec<Type>,
        return_type: Type,
    ) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
            kind: MemberKind::Method,
            return_type,
            params,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClassRef {
    InSet(ClassId),
    /// Declared outside the cycle; answered by the external hierarchy
    External(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassNode {
    pub id: ClassId,
    pub name: String,
    pub site: NodeId,
    pub supertype: Option<ClassRef>,
    pub interfaces: Vec<ClassRef>,
    pub members: Vec<DeclId>,
}

impl ClassNode {
    /// Supertype first, then interfaces in declaration order
    pub fn ancestors(&self) -> impl Iterator<Item = &ClassRef> {
        self.supertype.iter().chain(self.interfaces.iter())
    }
}

/// Signature of a top-level function; never inferred
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionSignature {
    pub name: String,
    pub params: Vec<Type>,
    pub return_type: Type,
}

impl FunctionSignature {
    pub fn as_type(&self) -> Type {
        Type::function(self.params.clone(), self.return_type.clone())
    }
}

/// Arena of all declarations and classes of one library cycle
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ElementStore {
    declarations: Vec<Declaration>,
    classes: Vec<ClassNode>,
    top_level: BTreeMap<String, DeclId>,
    class_index: BTreeMap<String, ClassId>,
    functions: BTreeMap<String, FunctionSignature>,
    by_node: BTreeMap<NodeId, DeclId>,
}

impl ElementStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read every declaration and class out of the cycle, in source order
    pub fn build(cycle: &LibraryCycle) -> Result<Self, CoreError> {
        let mut store = Self::new();

        // Classes first so supertypes can be referenced before they are declared
        for unit in &cycle.units {
            for item in &unit.items {
                if let Item::Class(class) = item {
                    if store.class_index.contains_key(&class.name) {
                        tracing::warn!("Duplicate class {} in {}, keeping first", class.name, unit.uri);
                        continue;
                    }
                    let id = ClassId(store.classes.len() as u32);
                    store.class_index.insert(class.name.clone(), id);
                    store.classes.push(ClassNode {
                        id,
                        name: class.name.clone(),
                        site: class.id,
                        supertype: None,
                        interfaces: Vec::new(),
                        members: Vec::new(),
                    });
                }
            }
        }

        for (unit_idx, unit) in cycle.units.iter().enumerate() {
            for (item_idx, item) in unit.items.iter().enumerate() {
                match item {
                    Item::Variables(list) => {
                        for (var_idx, var) in list.variables.iter().enumerate() {
                            store.check_unique(var.id, &var.name)?;
                            let id = store.push_variable(
                                &var.name,
                                DeclKind::Global,
                                list.declared_type.clone(),
                                list.is_read_only(),
                                false,
                                (list.id, var.id),
                                None,
                                var.initializer.as_ref().map(|_| ExprRef::TopLevel {
                                    unit: unit_idx,
                                    item: item_idx,
                                    variable: var_idx,
                                }),
                            );
                            if store.top_level.contains_key(&var.name) {
                                tracing::warn!("Duplicate top-level {} in {}", var.name, unit.uri);
                            } else {
                                store.top_level.insert(var.name.clone(), id);
                            }
                        }
                    }
                    Item::Function(function) => {
                        store.functions.entry(function.name.clone()).or_insert_with(|| {
                            FunctionSignature {
                                name: function.name.clone(),
                                params: function
                                    .params
                                    .iter()
                                    .map(|p| p.declared_type.clone().unwrap_or(Type::Dynamic))
                                    .collect(),
                                return_type: function.return_type.clone().unwrap_or(Type::Dynamic),
                            }
                        });
                    }
                    Item::Class(class) => {
                        let class_id = match store.class_index.get(&class.name) {
                            Some(&id) if store.classes[id.index()].site == class.id => id,
                            _ => continue,
                        };
                        let supertype = match &class.supertype {
                            Some(name) => Some(store.class_ref(name)),
                            None if class.name != OBJECT_CLASS => {
                                Some(ClassRef::External(OBJECT_CLASS.to_string()))
                            }
                            None => None,
                        };
                        let interfaces = class
                            .interfaces
                            .iter()
                            .map(|name| store.class_ref(name))
                            .collect();

                        let mut members = Vec::new();
                        for (member_idx, member) in class.members.iter().enumerate() {
                            match member {
                                ClassMember::Fields(fields) => {
                                    let kind = if fields.is_static {
                                        DeclKind::Static
                                    } else {
                                        DeclKind::InstanceField
                                    };
                                    for (var_idx, var) in fields.variables.variables.iter().enumerate()
                                    {
                                        store.check_unique(var.id, &var.name)?;
                                        members.push(store.push_variable(
                                            &var.name,
                                            kind,
                                            fields.variables.declared_type.clone(),
                                            fields.variables.is_read_only(),
                                            fields.is_static,
                                            (fields.variables.id, var.id),
                                            Some(class_id),
                                            var.initializer.as_ref().map(|_| ExprRef::Member {
                                                unit: unit_idx,
                                                item: item_idx,
                                                member: member_idx,
                                                variable: var_idx,
                                            }),
                                        ));
                                    }
                                }
                                ClassMember::Method(method) => {
                                    if method.kind != MethodKind::Constructor {
                                        store.check_unique(method.id, &method.name)?;
                                        members.push(store.push_method(method, class_id));
                                    }
                                }
                            }
                        }

                        let node = &mut store.classes[class_id.index()];
                        node.supertype = supertype;
                        node.interfaces = interfaces;
                        node.members = members;
                    }
                }
            }
        }

        tracing::debug!(
            "Built element store: {} declarations, {} classes, {} functions",
            store.declarations.len(),
            store.classes.len(),
            store.functions.len()
        );
        Ok(store)
    }

    /// Snapshots and the finalized-initializer marker are keyed by node id
    fn check_unique(&self, node: NodeId, name: &str) -> Result<(), CoreError> {
        if self.by_node.contains_key(&node) {
            return Err(CoreError::InvalidModel(format!(
                "node {} of {} is already used by another declaration",
                node.0, name
            )));
        }
        Ok(())
    }

    fn class_ref(&self, name: &str) -> ClassRef {
        match self.class_index.get(name) {
            Some(&id) => ClassRef::InSet(id),
            None => ClassRef::External(name.to_string()),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn push_variable(
        &mut self,
        name: &str,
        kind: DeclKind,
        declared_type: Option<Type>,
        read_only: bool,
        is_static: bool,
        (site, node): (NodeId, NodeId),
        enclosing_class: Option<ClassId>,
        initializer: Option<ExprRef>,
    ) -> DeclId {
        let id = DeclId(self.declarations.len() as u32);
        self.by_node.insert(node, id);
        let current_type = declared_type.clone().unwrap_or(Type::Unknown);
        self.declarations.push(Declaration {
            id,
            name: name.to_string(),
            kind,
            declared_type,
            initializer,
            enclosing_class,
            current_type: current_type.clone(),
            state: ResolutionState::Unresolved,
            site,
            node,
            is_static,
            is_final: read_only,
            accessors: Some(AccessorTypes {
                getter: current_type.clone(),
                setter: (!read_only).then_some(current_type),
            }),
            signature: None,
        });
        id
    }

    fn push_method(&mut self, method: &MethodDecl, class_id: ClassId) -> DeclId {
        let id = DeclId(self.declarations.len() as u32);
        self.by_node.insert(method.id, id);
        self.declarations.push(Declaration {
            id,
            name: method.name.clone(),
            kind: DeclKind::Method,
            declared_type: method.return_type.clone(),
            initializer: None,
            enclosing_class: Some(class_id),
            current_type: method.return_type.clone().unwrap_or(Type::Unknown),
            state: ResolutionState::Unresolved,
            site: method.id,
            node: method.id,
            is_static: method.is_static,
            is_final: true,
            accessors: None,
            signature: Some(MethodSignature::from_params(method.kind, &method.params)),
        });
        id
    }

    pub fn declaration(&self, id: DeclId) -> Option<&Declaration> {
        self.declarations.get(id.index())
    }

    pub fn declaration_mut(&mut self, id: DeclId) -> Option<&mut Declaration> {
        self.declarations.get_mut(id.index())
    }

    pub fn declarations(&self) -> impl Iterator<Item = &Declaration> {
        self.declarations.iter()
    }

    /// Declaration read from the given variable or method node
    pub fn declaration_for_node(&self, node: NodeId) -> Option<DeclId> {
        self.by_node.get(&node).copied()
    }

    pub fn class(&self, id: ClassId) -> Option<&ClassNode> {
        self.classes.get(id.index())
    }

    pub fn classes(&self) -> impl Iterator<Item = &ClassNode> {
        self.classes.iter()
    }

    pub fn class_by_name(&self, name: &str) -> Option<ClassId> {
        self.class_index.get(name).copied()
    }

    pub fn top_level(&self, name: &str) -> Option<DeclId> {
        self.top_level.get(name).copied()
    }

    pub fn function(&self, name: &str) -> Option<&FunctionSignature> {
        self.functions.get(name)
    }

    /// Find a declaration by `name` or `Class.name`, for tests and reports
    pub fn find(&self, path: &str) -> Option<&Declaration> {
        match path.split_once('.') {
            Some((class, member)) => {
                let class = self.class(self.class_by_name(class)?)?;
                class
                    .members
                    .iter()
                    .filter_map(|&id| self.declaration(id))
                    .find(|d| d.name == member)
            }
            None => self.declaration(self.top_level(path)?),
        }
    }

    /// Qualified display name: `x` or `Class.x`
    pub fn qualified_name(&self, id: DeclId) -> String {
        match self.declaration(id) {
            Some(decl) => match decl.enclosing_class.and_then(|c| self.class(c)) {
                Some(class) => format!("{}.{}", class.name, decl.name),
                None => decl.name.clone(),
            },
            None => format!("<decl {}>", id.0),
        }
    }

    /// Member of `class` itself (not its ancestors) matching `name` and `kind`
    pub fn own_member(&self, class: ClassId, name: &str, kind: MemberKind) -> Option<MemberSignature> {
        let node = self.class(class)?;
        node.members
            .iter()
            .filter_map(|&id| self.declaration(id))
            .filter(|decl| decl.name == name)
            .find_map(|decl| decl.member_signature(&node.name, kind))
    }

    /// Direct supertype names of every class in the store
    pub fn supertype_names(&self) -> BTreeMap<String, Vec<String>> {
        self.classes
            .iter()
            .map(|class| {
                let names = class
                    .ancestors()
                    .map(|ancestor| match ancestor {
                        ClassRef::InSet(id) => self.classes[id.index()].name.clone(),
                        ClassRef::External(name) => name.clone(),
                    })
                    .collect();
                (class.name.clone(), names)
            })
            .collect()
    }

    /// Scope holding every top-level variable, function and class
    pub fn library_scope(&self) -> Scope {
        let mut bindings = BTreeMap::new();
        for class in &self.classes {
            bindings.insert(class.name.clone(), Binding::Class(class.id));
        }
        for function in self.functions.values() {
            bindings.insert(function.name.clone(), Binding::Function(function.as_type()));
        }
        for (name, &id) in &self.top_level {
            bindings.insert(name.clone(), Binding::Declaration(id));
        }
        Scope::empty().push(ScopeKind::Library, bindings)
    }

    /// Scope of a class body nested in `parent`.
    ///
    /// In-set ancestors contribute their instance members first so that the
    /// class's own members shadow inherited ones.
    pub fn class_scope(&self, class: ClassId, parent: &Scope) -> Scope {
        let mut bindings = BTreeMap::new();
        let mut chain = Vec::new();
        self.collect_in_set_chain(class, &mut chain);
        for &ancestor in chain.iter().rev() {
            if let Some(node) = self.class(ancestor) {
                for &member in &node.members {
                    if let Some(decl) = self.declaration(member) {
                        if ancestor == class || !decl.is_static {
                            bindings.insert(decl.name.clone(), Binding::Declaration(member));
                        }
                    }
                }
            }
        }
        parent.push(ScopeKind::Class(class), bindings)
    }

    fn collect_in_set_chain(&self, class: ClassId, chain: &mut Vec<ClassId>) {
        if chain.contains(&class) {
            return;
        }
        chain.push(class);
        if let Some(node) = self.class(class) {
            for ancestor in node.ancestors() {
                if let ClassRef::InSet(id) = ancestor {
                    self.collect_in_set_chain(*id, chain);
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.declarations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }
}
