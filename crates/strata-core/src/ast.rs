//! Syntax tree handed over by the front end
//!
//! The parser is not part of strata. This module only fixes the shape of the
//! tree the resolver walks: compilation units grouped into a [`LibraryCycle`],
//! with a [`NodeId`] on every declaration site and every expression so that
//! scope snapshots and resolved static types can be keyed without holding
//! references into the tree.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::CoreError;
use crate::types::Type;

/// Stable identity of a syntax node, assigned by whoever builds the tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u32);

/// A maximal set of mutually referencing compilation units
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LibraryCycle {
    pub units: Vec<CompilationUnit>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompilationUnit {
    pub uri: String,
    pub items: Vec<Item>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Item {
    Variables(VariableList),
    Class(ClassDecl),
    Function(FunctionDecl),
}

/// `var a = 1, b = 2;` style declaration list; also used for fields and locals
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariableList {
    pub id: NodeId,
    pub declared_type: Option<Type>,
    pub is_final: bool,
    pub is_const: bool,
    pub variables: Vec<VariableDecl>,
}

impl VariableList {
    /// `final` and `const` variables have no setter
    pub fn is_read_only(&self) -> bool {
        self.is_final || self.is_const
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariableDecl {
    pub id: NodeId,
    pub name: String,
    pub initializer: Option<Expr>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassDecl {
    pub id: NodeId,
    pub name: String,
    pub supertype: Option<String>,
    pub interfaces: Vec<String>,
    pub members: Vec<ClassMember>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ClassMember {
    Fields(FieldList),
    Method(MethodDecl),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldList {
    pub is_static: bool,
    pub variables: VariableList,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MethodKind {
    Method,
    Getter,
    Setter,
    Constructor,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MethodDecl {
    pub id: NodeId,
    pub name: String,
    pub kind: MethodKind,
    pub is_static: bool,
    pub return_type: Option<Type>,
    pub params: Vec<Param>,
    pub body: Option<Block>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    pub declared_type: Option<Type>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionDecl {
    pub id: NodeId,
    pub name: String,
    pub return_type: Option<Type>,
    pub params: Vec<Param>,
    pub body: Option<Block>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Block {
    pub statements: Vec<Stmt>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Stmt {
    Expr(Expr),
    Return(Option<Expr>),
    Local(VariableList),
    Assign {
        name: String,
        value: Expr,
    },
    If {
        condition: Expr,
        then_branch: Block,
        else_branch: Option<Block>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expr {
    pub id: NodeId,
    pub kind: ExprKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExprKind {
    Int(i64),
    Double(f64),
    Str(String),
    Bool(bool),
    Null,
    Throw(Box<Expr>),
    /// Simple identifier
    Identifier(String),
    /// `Class.member`
    StaticGet {
        class: String,
        name: String,
    },
    /// `target.name`
    PropertyGet {
        target: Box<Expr>,
        name: String,
    },
    Call {
        callee: String,
        args: Vec<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    List(Vec<Expr>),
    Conditional {
        condition: Box<Expr>,
        then_expr: Box<Expr>,
        else_expr: Box<Expr>,
    },
    /// `expr is T`
    IsCheck {
        expr: Box<Expr>,
        ty: Type,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    IntDiv,
    Rem,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    And,
    Or,
}

impl BinaryOp {
    pub fn is_arithmetic(self) -> bool {
        matches!(
            self,
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::IntDiv | BinaryOp::Rem
        )
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge | BinaryOp::Eq | BinaryOp::Ne
        )
    }

    pub fn is_logical(self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or)
    }
}

impl Expr {
    /// Pre-order walk over this expression and all of its subexpressions
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a Expr)) {
        visit(self);
        match &self.kind {
            ExprKind::Throw(inner) => inner.walk(visit),
            ExprKind::PropertyGet { target, .. } => target.walk(visit),
            ExprKind::Call { args, .. } => {
                for arg in args {
                    arg.walk(visit);
                }
            }
            ExprKind::Binary { lhs, rhs, .. } => {
                lhs.walk(visit);
                rhs.walk(visit);
            }
            ExprKind::List(elements) => {
                for element in elements {
                    element.walk(visit);
                }
            }
            ExprKind::Conditional {
                condition,
                then_expr,
                else_expr,
            } => {
                condition.walk(visit);
                then_expr.walk(visit);
                else_expr.walk(visit);
            }
            ExprKind::IsCheck { expr, .. } => expr.walk(visit),
            ExprKind::Int(_)
            | ExprKind::Double(_)
            | ExprKind::Str(_)
            | ExprKind::Bool(_)
            | ExprKind::Null
            | ExprKind::Identifier(_)
            | ExprKind::StaticGet { .. } => {}
        }
    }
}

impl LibraryCycle {
    pub fn new(units: Vec<CompilationUnit>) -> Self {
        Self { units }
    }

    /// Load a cycle serialized by the front end
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&content).map_err(|e| {
            CoreError::InvalidModel(format!("{}: {}", path.as_ref().display(), e))
        })
    }

    pub fn unit_count(&self) -> usize {
        self.units.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expr(id: u32, kind: ExprKind) -> Expr {
        Expr {
            id: NodeId(id),
            kind,
        }
    }

    #[test]
    fn test_walk_visits_in_pre_order() {
        // f(a + b, [c])
        let call = expr(
            1,
            ExprKind::Call {
                callee: "f".to_string(),
                args: vec![
                    expr(
                        2,
                        ExprKind::Binary {
                            op: BinaryOp::Add,
                            lhs: Box::new(expr(3, ExprKind::Identifier("a".to_string()))),
                            rhs: Box::new(expr(4, ExprKind::Identifier("b".to_string()))),
                        },
                    ),
                    expr(
                        5,
                        ExprKind::List(vec![expr(6, ExprKind::Identifier("c".to_string()))]),
                    ),
                ],
            },
        );

        let mut seen = Vec::new();
        call.walk(&mut |e| seen.push(e.id.0));
        assert_eq!(seen, vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_operator_classes() {
        assert!(BinaryOp::Add.is_arithmetic());
        assert!(!BinaryOp::Div.is_arithmetic());
        assert!(BinaryOp::Ne.is_comparison());
        assert!(BinaryOp::Or.is_logical());
    }

    #[test]
    fn test_cycle_json_roundtrip_shape() {
        let json = r#"{"units":[{"uri":"lib/a.dart","items":[]}]}"#;
        let cycle = LibraryCycle::from_json(json).unwrap();
        assert_eq!(cycle.unit_count(), 1);
        assert_eq!(cycle.units[0].uri, "lib/a.dart");
    }
}
