//! Abstract Syntax Tree for the C subset.
//!
//! The AST is the provider surface the extractor consumes: every node
//! carries a span (for expression-as-source-text and diagnostics) and a
//! stable [`NodeId`]. Statement and expression kinds form closed sums;
//! the extractor dispatches on them with plain matches.

use crate::utils::location::{SourceMap, Span};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A stable identifier for an AST node, assigned by the parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u64);

impl NodeId {
    /// Create a new node ID.
    pub fn new(id: u64) -> Self {
        Self(id)
    }
}

/// A complete translation unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Program {
    /// Functions in the program
    pub functions: Vec<Function>,
    /// Source span
    pub span: Span,
}

impl Program {
    /// Find a function definition by name.
    pub fn find_function(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|f| f.name == name)
    }
}

/// A function definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Function {
    /// Function name
    pub name: String,
    /// Return type
    pub return_type: Type,
    /// Parameters
    pub params: Vec<Parameter>,
    /// Function body
    pub body: Block,
    /// Source span
    pub span: Span,
}

/// A function parameter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Parameter {
    /// Parameter name
    pub name: String,
    /// Scalar element type
    pub ty: Type,
    /// Array dimensions (empty for scalars)
    pub dimensions: Vec<Expr>,
    /// Source span
    pub span: Span,
}

impl Parameter {
    /// Check if this parameter is an array.
    pub fn is_array(&self) -> bool {
        !self.dimensions.is_empty()
    }

    /// Render the declared type as a string, like `int[a][b]`.
    pub fn type_string(&self, source: &SourceMap) -> String {
        let mut s = self.ty.to_string();
        for dim in &self.dimensions {
            s.push('[');
            s.push_str(source.span_text(&dim.span));
            s.push(']');
        }
        s
    }
}

/// A scalar type in the language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Type {
    /// 32-bit integer
    Int,
    /// 32-bit floating point
    Float,
    /// 64-bit floating point
    Double,
    /// Void (function returns only)
    Void,
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Int => write!(f, "int"),
            Type::Float => write!(f, "float"),
            Type::Double => write!(f, "double"),
            Type::Void => write!(f, "void"),
        }
    }
}

/// A block of statements.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    /// Statements in the block
    pub statements: Vec<Stmt>,
    /// Source span
    pub span: Span,
}

/// A statement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stmt {
    /// The kind of statement
    pub kind: StmtKind,
    /// Source span
    pub span: Span,
    /// Stable node identifier
    pub id: NodeId,
}

/// The kind of a statement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StmtKind {
    /// Scalar variable declaration: `int x;` or `int x = e;`
    Declaration {
        ty: Type,
        name: String,
        init: Option<Expr>,
    },

    /// Expression statement: assignment, call, or other expression
    Expr { expr: Expr },

    /// For loop: `for (init; cond; inc) body`
    For {
        init: ForInit,
        cond: Expr,
        inc: Expr,
        body: Block,
    },

    /// If statement: `if (cond) then else else`
    If {
        condition: Expr,
        then_branch: Block,
        else_branch: Option<Block>,
    },

    /// While loop (recognized so the extractor can reject it by name)
    While { condition: Expr, body: Block },

    /// Do-while loop (recognized so the extractor can reject it by name)
    DoWhile { body: Block, condition: Expr },

    /// Return statement: `return;` or `return e;`
    Return { value: Option<Expr> },

    /// Nested block statement
    Block { block: Block },

    /// `break;`
    Break,

    /// `continue;`
    Continue,

    /// Empty statement (just a semicolon)
    Empty,
}

impl StmtKind {
    /// A short name for the statement kind, used in diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            StmtKind::Declaration { .. } => "declaration",
            StmtKind::Expr { .. } => "expression",
            StmtKind::For { .. } => "for",
            StmtKind::If { .. } => "if",
            StmtKind::While { .. } => "while",
            StmtKind::DoWhile { .. } => "do-while",
            StmtKind::Return { .. } => "return",
            StmtKind::Block { .. } => "block",
            StmtKind::Break => "break",
            StmtKind::Continue => "continue",
            StmtKind::Empty => "empty",
        }
    }
}

/// The initializer clause of a `for` loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ForInit {
    /// `i = 0`
    Assign { target: Expr, value: Expr },
    /// `int i = 0`
    Decl { ty: Type, name: String, init: Expr },
}

/// An expression.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Expr {
    /// The kind of expression
    pub kind: ExprKind,
    /// Source span
    pub span: Span,
    /// Stable node identifier
    pub id: NodeId,
}

impl Expr {
    /// Strip any number of surrounding parentheses.
    pub fn ignore_parens(&self) -> &Expr {
        match &self.kind {
            ExprKind::Grouped(inner) => inner.ignore_parens(),
            _ => self,
        }
    }

    /// The variable name, if this (paren-stripped) expression is a bare
    /// variable reference.
    pub fn as_variable(&self) -> Option<&str> {
        match &self.ignore_parens().kind {
            ExprKind::Variable(name) => Some(name),
            _ => None,
        }
    }

    /// Check if this expression is a bare variable or a numeric literal.
    pub fn is_var_or_literal(&self) -> bool {
        matches!(
            self.ignore_parens().kind,
            ExprKind::Variable(_) | ExprKind::IntLiteral(_) | ExprKind::FloatLiteral(_)
        )
    }

    /// Evaluate this expression as an integer constant, if possible.
    pub fn eval_int(&self) -> Option<i64> {
        match &self.kind {
            ExprKind::IntLiteral(v) => Some(*v),
            ExprKind::Grouped(inner) => inner.eval_int(),
            ExprKind::Unary { op: UnaryOp::Neg, operand } => Some(-operand.eval_int()?),
            ExprKind::Binary { op, left, right } => {
                let l = left.eval_int()?;
                let r = right.eval_int()?;
                match op {
                    BinaryOp::Add => Some(l + r),
                    BinaryOp::Sub => Some(l - r),
                    BinaryOp::Mul => Some(l * r),
                    BinaryOp::Div => (r != 0).then(|| l / r),
                    BinaryOp::Mod => (r != 0).then(|| l % r),
                    _ => None,
                }
            }
            _ => None,
        }
    }
}

/// The kind of an expression.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ExprKind {
    /// Integer literal
    IntLiteral(i64),
    /// Floating-point literal
    FloatLiteral(f64),

    /// Variable reference
    Variable(String),

    /// Single subscript: `base[index]`; chains nest through `base`
    Subscript { base: Box<Expr>, index: Box<Expr> },

    /// Binary operation: `left op right`
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },

    /// Unary operation: `op operand` (or postfix increment/decrement)
    Unary { op: UnaryOp, operand: Box<Expr> },

    /// Assignment expression: `target op value`
    Assign {
        op: AssignOp,
        target: Box<Expr>,
        value: Box<Expr>,
    },

    /// Function call: `callee(args)`
    Call { callee: String, args: Vec<Expr> },

    /// Parenthesized expression
    Grouped(Box<Expr>),
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Mod,

    // Comparison
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,

    // Logical
    And,
    Or,
}

impl BinaryOp {
    /// Check if this is a comparison operator.
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge
        )
    }

    /// Negate a comparison operator, for inverted `else` conditions.
    /// Returns `None` for non-comparisons.
    pub fn negate_comparison(&self) -> Option<BinaryOp> {
        match self {
            BinaryOp::Lt => Some(BinaryOp::Ge),
            BinaryOp::Le => Some(BinaryOp::Gt),
            BinaryOp::Gt => Some(BinaryOp::Le),
            BinaryOp::Ge => Some(BinaryOp::Lt),
            BinaryOp::Eq => Some(BinaryOp::Ne),
            BinaryOp::Ne => Some(BinaryOp::Eq),
            _ => None,
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BinaryOp::Add => write!(f, "+"),
            BinaryOp::Sub => write!(f, "-"),
            BinaryOp::Mul => write!(f, "*"),
            BinaryOp::Div => write!(f, "/"),
            BinaryOp::Mod => write!(f, "%"),
            BinaryOp::Eq => write!(f, "=="),
            BinaryOp::Ne => write!(f, "!="),
            BinaryOp::Lt => write!(f, "<"),
            BinaryOp::Le => write!(f, "<="),
            BinaryOp::Gt => write!(f, ">"),
            BinaryOp::Ge => write!(f, ">="),
            BinaryOp::And => write!(f, "&&"),
            BinaryOp::Or => write!(f, "||"),
        }
    }
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    /// Negation: `-x`
    Neg,
    /// Logical not: `!x`
    Not,
    /// Prefix increment: `++x`
    PreInc,
    /// Postfix increment: `x++`
    PostInc,
    /// Prefix decrement: `--x`
    PreDec,
    /// Postfix decrement: `x--`
    PostDec,
}

impl UnaryOp {
    /// Check if this is an increment (either fixity).
    pub fn is_increment(&self) -> bool {
        matches!(self, UnaryOp::PreInc | UnaryOp::PostInc)
    }
}

/// Assignment operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssignOp {
    /// `=`
    Assign,
    /// `+=`
    AddAssign,
    /// `-=`
    SubAssign,
    /// `*=`
    MulAssign,
    /// `/=`
    DivAssign,
}

impl AssignOp {
    /// Check if this is a compound (read-modify-write) assignment.
    pub fn is_compound(&self) -> bool {
        !matches!(self, AssignOp::Assign)
    }
}

impl fmt::Display for AssignOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssignOp::Assign => write!(f, "="),
            AssignOp::AddAssign => write!(f, "+="),
            AssignOp::SubAssign => write!(f, "-="),
            AssignOp::MulAssign => write!(f, "*="),
            AssignOp::DivAssign => write!(f, "/="),
        }
    }
}
