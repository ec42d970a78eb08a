//! Test fixtures for strata
//!
//! Provides a small syntax tree builder standing in for the front end, plus
//! ready-made library cycles for the scenarios the resolver must handle.

use std::cell::Cell;

use strata_core::ast::{
    BinaryOp, Block, ClassDecl, ClassMember, CompilationUnit, Expr, ExprKind, FieldList,
    FunctionDecl, Item, MethodDecl, MethodKind, NodeId, Param, Stmt, VariableDecl, VariableList,
};
use strata_core::{LibraryCycle, Type};

pub mod scenarios;

/// Parse a type annotation; fixtures only use well-formed names
pub fn ty(annotation: &str) -> Type {
    annotation
        .parse()
        .unwrap_or_else(|e| panic!("bad fixture annotation {:?}: {}", annotation, e))
}

pub fn param(name: &str, annotation: Option<&str>) -> Param {
    Param {
        name: name.to_string(),
        declared_type: annotation.map(ty),
    }
}

pub fn unit(uri: &str, items: Vec<Item>) -> CompilationUnit {
    CompilationUnit {
        uri: uri.to_string(),
        items,
    }
}

pub fn cycle(units: Vec<CompilationUnit>) -> LibraryCycle {
    LibraryCycle::new(units)
}

pub fn block(statements: Vec<Stmt>) -> Block {
    Block { statements }
}

/// Allocates node ids and builds syntax nodes
#[derive(Debug, Default)]
pub struct SyntaxBuilder {
    next_id: Cell<u32>,
}

impl SyntaxBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id(&self) -> NodeId {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        NodeId(id)
    }

    fn expr(&self, kind: ExprKind) -> Expr {
        Expr { id: self.id(), kind }
    }

    // Expressions

    pub fn int(&self, value: i64) -> Expr {
        self.expr(ExprKind::Int(value))
    }

    pub fn double(&self, value: f64) -> Expr {
        self.expr(ExprKind::Double(value))
    }

    pub fn string(&self, value: &str) -> Expr {
        self.expr(ExprKind::Str(value.to_string()))
    }

    pub fn boolean(&self, value: bool) -> Expr {
        self.expr(ExprKind::Bool(value))
    }

    pub fn null(&self) -> Expr {
        self.expr(ExprKind::Null)
    }

    pub fn throw(&self, value: Expr) -> Expr {
        self.expr(ExprKind::Throw(Box::new(value)))
    }

    pub fn ident(&self, name: &str) -> Expr {
        self.expr(ExprKind::Identifier(name.to_string()))
    }

    pub fn static_get(&self, class: &str, name: &str) -> Expr {
        self.expr(ExprKind::StaticGet {
            class: class.to_string(),
            name: name.to_string(),
        })
    }

    pub fn get(&self, target: Expr, name: &str) -> Expr {
        self.expr(ExprKind::PropertyGet {
            target: Box::new(target),
            name: name.to_string(),
        })
    }

    pub fn call(&self, callee: &str, args: Vec<Expr>) -> Expr {
        self.expr(ExprKind::Call {
            callee: callee.to_string(),
            args,
        })
    }

    pub fn binary(&self, op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
        self.expr(ExprKind::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        })
    }

    pub fn add(&self, lhs: Expr, rhs: Expr) -> Expr {
        self.binary(BinaryOp::Add, lhs, rhs)
    }

    pub fn list(&self, elements: Vec<Expr>) -> Expr {
        self.expr(ExprKind::List(elements))
    }

    pub fn conditional(&self, condition: Expr, then_expr: Expr, else_expr: Expr) -> Expr {
        self.expr(ExprKind::Conditional {
            condition: Box::new(condition),
            then_expr: Box::new(then_expr),
            else_expr: Box::new(else_expr),
        })
    }

    pub fn is_check(&self, value: Expr, annotation: &str) -> Expr {
        self.expr(ExprKind::IsCheck {
            expr: Box::new(value),
            ty: ty(annotation),
        })
    }

    // Declarations

    pub fn variable(&self, name: &str, initializer: Option<Expr>) -> VariableDecl {
        VariableDecl {
            id: self.id(),
            name: name.to_string(),
            initializer,
        }
    }

    pub fn variable_list(
        &self,
        annotation: Option<&str>,
        is_final: bool,
        variables: Vec<VariableDecl>,
    ) -> VariableList {
        VariableList {
            id: self.id(),
            declared_type: annotation.map(ty),
            is_final,
            is_const: false,
            variables,
        }
    }

    /// `var name = init;`
    pub fn top_var(&self, name: &str, initializer: Expr) -> Item {
        let variable = self.variable(name, Some(initializer));
        Item::Variables(self.variable_list(None, false, vec![variable]))
    }

    /// `final name = init;`
    pub fn final_var(&self, name: &str, initializer: Expr) -> Item {
        let variable = self.variable(name, Some(initializer));
        Item::Variables(self.variable_list(None, true, vec![variable]))
    }

    /// `T name = init;`
    pub fn typed_var(&self, annotation: &str, name: &str, initializer: Option<Expr>) -> Item {
        let variable = self.variable(name, initializer);
        Item::Variables(self.variable_list(Some(annotation), false, vec![variable]))
    }

    /// `var a = .., b = ..;` in one list
    pub fn top_vars(&self, variables: Vec<(&str, Expr)>) -> Item {
        let variables = variables
            .into_iter()
            .map(|(name, init)| self.variable(name, Some(init)))
            .collect();
        Item::Variables(self.variable_list(None, false, variables))
    }

    pub fn function(
        &self,
        name: &str,
        return_type: Option<&str>,
        params: Vec<Param>,
        body: Option<Block>,
    ) -> Item {
        Item::Function(FunctionDecl {
            id: self.id(),
            name: name.to_string(),
            return_type: return_type.map(ty),
            params,
            body,
        })
    }

    pub fn local(&self, name: &str, annotation: Option<&str>, initializer: Expr) -> Stmt {
        let variable = self.variable(name, Some(initializer));
        Stmt::Local(self.variable_list(annotation, false, vec![variable]))
    }

    pub fn class(&self, name: &str) -> ClassBuilder<'_> {
        ClassBuilder {
            syntax: self,
            decl: ClassDecl {
                id: self.id(),
                name: name.to_string(),
                supertype: None,
                interfaces: Vec::new(),
                members: Vec::new(),
            },
        }
    }
}

pub struct ClassBuilder<'a> {
    syntax: &'a SyntaxBuilder,
    decl: ClassDecl,
}

impl ClassBuilder<'_> {
    pub fn extends(mut self, supertype: &str) -> Self {
        self.decl.supertype = Some(supertype.to_string());
        self
    }

    pub fn implements(mut self, interface: &str) -> Self {
        self.decl.interfaces.push(interface.to_string());
        self
    }

    fn fields(
        mut self,
        is_static: bool,
        annotation: Option<&str>,
        is_final: bool,
        name: &str,
        initializer: Option<Expr>,
    ) -> Self {
        let variable = self.syntax.variable(name, initializer);
        let variables = self
            .syntax
            .variable_list(annotation, is_final, vec![variable]);
        self.decl.members.push(ClassMember::Fields(FieldList {
            is_static,
            variables,
        }));
        self
    }

    /// `var name = init;`
    pub fn field(self, name: &str, initializer: Option<Expr>) -> Self {
        self.fields(false, None, false, name, initializer)
    }

    /// `final name = init;`
    pub fn final_field(self, name: &str, initializer: Option<Expr>) -> Self {
        self.fields(false, None, true, name, initializer)
    }

    /// `T name = init;`
    pub fn typed_field(self, annotation: &str, name: &str, initializer: Option<Expr>) -> Self {
        self.fields(false, Some(annotation), false, name, initializer)
    }

    /// `static var name = init;`
    pub fn static_field(self, name: &str, initializer: Option<Expr>) -> Self {
        self.fields(true, None, false, name, initializer)
    }

    fn member(mut self, method: MethodDecl) -> Self {
        self.decl.members.push(ClassMember::Method(method));
        self
    }

    fn method_decl(
        &self,
        kind: MethodKind,
        is_static: bool,
        name: &str,
        return_type: Option<&str>,
        params: Vec<Param>,
        body: Option<Block>,
    ) -> MethodDecl {
        MethodDecl {
            id: self.syntax.id(),
            name: name.to_string(),
            kind,
            is_static,
            return_type: return_type.map(ty),
            params,
            body,
        }
    }

    pub fn method(
        self,
        name: &str,
        return_type: Option<&str>,
        params: Vec<Param>,
        body: Option<Block>,
    ) -> Self {
        let method = self.method_decl(MethodKind::Method, false, name, return_type, params, body);
        self.member(method)
    }

    pub fn static_method(
        self,
        name: &str,
        return_type: Option<&str>,
        params: Vec<Param>,
        body: Option<Block>,
    ) -> Self {
        let method = self.method_decl(MethodKind::Method, true, name, return_type, params, body);
        self.member(method)
    }

    pub fn getter(self, name: &str, return_type: Option<&str>, body: Option<Block>) -> Self {
        let method = self.method_decl(MethodKind::Getter, false, name, return_type, vec![], body);
        self.member(method)
    }

    pub fn setter(self, name: &str, value: Param) -> Self {
        let method =
            self.method_decl(MethodKind::Setter, false, name, None, vec![value], Some(Block::default()));
        self.member(method)
    }

    pub fn constructor(self, params: Vec<Param>, body: Option<Block>) -> Self {
        let name = self.decl.name.clone();
        let method = self.method_decl(MethodKind::Constructor, false, &name, None, params, body);
        self.member(method)
    }

    pub fn build(self) -> Item {
        Item::Class(self.decl)
    }
}
