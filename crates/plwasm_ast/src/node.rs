//! Syntax tree node definitions.
//!
//! Nodes own their children. Every statement and expression records the
//! [`Position`] of its first token.

use crate::{Endian, Position};

/// A parsed script, with all `#include`d files spliced in.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Program {
    /// Top-level items in source order.
    pub items: Vec<Item>,
    /// `#pragma` directives, in the order they were encountered.
    pub pragmas: Vec<Pragma>,
}

impl Program {
    /// Returns the value of the last pragma with the given key.
    pub fn pragma(&self, key: &str) -> Option<&Pragma> {
        self.pragmas.iter().rev().find(|p| p.key == key)
    }
}

/// A `#pragma key value` directive.
#[derive(Debug, Clone, PartialEq)]
pub struct Pragma {
    pub key: String,
    pub value: Option<String>,
    pub pos: Position,
}

/// A top-level item.
#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    Struct(StructDecl),
    Enum(EnumDecl),
    Bitfield(BitfieldDecl),
    Using(UsingDecl),
    Function(FunctionDecl),
    Statement(Stmt),
}

/// A sequence of statements.
pub type Block = Vec<Stmt>;

/// `struct Name { ... };` or `union Name { ... };`
#[derive(Debug, Clone, PartialEq)]
pub struct StructDecl {
    pub name: String,
    pub is_union: bool,
    pub body: Block,
    pub pos: Position,
}

/// `enum Name : Type { A, B = expr };`
#[derive(Debug, Clone, PartialEq)]
pub struct EnumDecl {
    pub name: String,
    pub underlying: TypeRef,
    pub variants: Vec<EnumVariant>,
    pub pos: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumVariant {
    pub name: String,
    /// Explicit value; implicit variants continue from the previous one.
    pub value: Option<Expr>,
    pub pos: Position,
}

/// `bitfield Name { a : 4; padding : 4; };`
#[derive(Debug, Clone, PartialEq)]
pub struct BitfieldDecl {
    pub name: String,
    pub entries: Vec<BitfieldEntry>,
    pub pos: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BitfieldEntry {
    /// `None` for `padding` entries.
    pub name: Option<String>,
    pub bits: Expr,
    pub pos: Position,
}

/// `using Alias = Type;`
#[derive(Debug, Clone, PartialEq)]
pub struct UsingDecl {
    pub name: String,
    pub target: TypeRef,
    pub pos: Position,
}

/// `fn name(Type a, Type b) { ... };`
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl {
    pub name: String,
    pub params: Vec<Param>,
    pub body: Block,
    pub pos: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub ty: TypeRef,
    pub name: String,
}

/// A reference to a named type, optionally with an endianness override.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeRef {
    /// Type name; namespaced names keep their `::` separators.
    pub name: String,
    pub endian: Option<Endian>,
    pub pos: Position,
}

impl TypeRef {
    pub fn new(name: impl Into<String>, pos: Position) -> Self {
        Self {
            name: name.into(),
            endian: None,
            pos,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub pos: Position,
}

impl Stmt {
    pub fn new(kind: StmtKind, pos: Position) -> Self {
        Self { kind, pos }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    /// Field, placement or local variable declaration.
    Var(VarDecl),
    /// `padding[size];`
    Padding(Expr),
    Assign {
        target: AssignTarget,
        op: AssignOp,
        value: Expr,
    },
    Expr(Expr),
    If {
        cond: Expr,
        then_branch: Block,
        else_branch: Option<Block>,
    },
    While {
        cond: Expr,
        body: Block,
    },
    Break,
    Continue,
    Return(Option<Expr>),
}

/// `Type name[size] @ placement = init [[attributes]];`
#[derive(Debug, Clone, PartialEq)]
pub struct VarDecl {
    pub ty: TypeRef,
    pub name: String,
    pub array: Option<ArraySize>,
    pub placement: Option<Expr>,
    pub init: Option<Expr>,
    pub attributes: Vec<Attribute>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ArraySize {
    /// `[count]`
    Count(Expr),
    /// `[while(condition)]`, re-evaluated before each entry.
    While(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub enum AssignTarget {
    Variable(String),
    /// `$`, the current read offset.
    Cursor,
}

/// `[[name(args...)]]`
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub name: String,
    pub args: Vec<Expr>,
    pub pos: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub pos: Position,
}

impl Expr {
    pub fn new(kind: ExprKind, pos: Position) -> Self {
        Self { kind, pos }
    }

    /// Returns true for literals, which evaluate without touching any state.
    pub fn is_constant(&self) -> bool {
        matches!(self.kind, ExprKind::Literal(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Literal(Literal),
    /// A possibly namespaced identifier such as `x` or `Color::Red`.
    Ident(String),
    /// `$`
    Cursor,
    Member {
        base: Box<Expr>,
        field: String,
    },
    Index {
        base: Box<Expr>,
        index: Box<Expr>,
    },
    Call {
        callee: String,
        args: Vec<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Ternary {
        cond: Box<Expr>,
        then_expr: Box<Expr>,
        else_expr: Box<Expr>,
    },
    SizeOf(Box<Expr>),
    AddressOf(Box<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Integer(u128),
    Float(f64),
    Str(String),
    Char(char),
    Bool(bool),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
    BitNot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Shl,
    Shr,
    BitAnd,
    BitOr,
    BitXor,
    And,
    Or,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl BinaryOp {
    /// Binding power used by the expression parser; higher binds tighter.
    pub const fn precedence(&self) -> u8 {
        match self {
            BinaryOp::Or => 1,
            BinaryOp::And => 2,
            BinaryOp::BitOr => 3,
            BinaryOp::BitXor => 4,
            BinaryOp::BitAnd => 5,
            BinaryOp::Eq | BinaryOp::Ne => 6,
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => 7,
            BinaryOp::Shl | BinaryOp::Shr => 8,
            BinaryOp::Add | BinaryOp::Sub => 9,
            BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => 10,
        }
    }

    pub const fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitOr => "|",
            BinaryOp::BitXor => "^",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Assign,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Shl,
    Shr,
    BitAnd,
    BitOr,
    BitXor,
}

impl AssignOp {
    /// The binary operator a compound assignment applies, if any.
    pub const fn binary(&self) -> Option<BinaryOp> {
        match self {
            AssignOp::Assign => None,
            AssignOp::Add => Some(BinaryOp::Add),
            AssignOp::Sub => Some(BinaryOp::Sub),
            AssignOp::Mul => Some(BinaryOp::Mul),
            AssignOp::Div => Some(BinaryOp::Div),
            AssignOp::Rem => Some(BinaryOp::Rem),
            AssignOp::Shl => Some(BinaryOp::Shl),
            AssignOp::Shr => Some(BinaryOp::Shr),
            AssignOp::BitAnd => Some(BinaryOp::BitAnd),
            AssignOp::BitOr => Some(BinaryOp::BitOr),
            AssignOp::BitXor => Some(BinaryOp::BitXor),
        }
    }
}
