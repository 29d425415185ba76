//! # plwasm_ast
//!
//! Syntax tree definitions for the pattern language.
//!
//! This crate provides the node types produced by `plwasm_parser` and
//! consumed by the evaluator in `plwasm_runtime`. Every node carries the
//! [`Position`] of the token that started it so that errors raised while
//! evaluating can point back into the script.
//!
//! ## Example
//!
//! ```rust
//! use plwasm_ast::{Expr, ExprKind, Literal, Position};
//!
//! let expr = Expr::new(ExprKind::Literal(Literal::Integer(1)), Position::new(1, 1));
//! assert!(expr.is_constant());
//! ```

mod node;
mod position;

pub use node::{
    ArraySize, AssignOp, AssignTarget, Attribute, BinaryOp, BitfieldDecl, BitfieldEntry, Block, EnumDecl,
    EnumVariant, Expr, ExprKind, FunctionDecl, Item, Literal, Param, Pragma, Program, Stmt,
    StmtKind, StructDecl, TypeRef, UnaryOp, UsingDecl, VarDecl,
};
pub use position::{Endian, Position};
