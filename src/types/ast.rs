//! AST representing a template.
//!
//! Both template syntaxes are parsed into this one representation so that a
//! single compiler and renderer can serve them.

use crate::types::span::Span;
use crate::Value;

#[cfg_attr(internal_debug, derive(Debug))]
pub struct Template {
    pub scope: Scope,
}

#[cfg_attr(internal_debug, derive(Debug))]
pub struct Scope {
    pub stmts: Vec<Stmt>,
}

#[cfg_attr(internal_debug, derive(Debug))]
pub enum Stmt {
    /// Literal template text.
    Raw(String),
    /// An expression whose value is written to the output.
    Emit(Expr),
    /// An expression evaluated only for its side effects.
    Eval(Expr),
    /// An element attribute with a dynamic value, e.g. `%a{ href: url }`.
    Attr(String, Expr),
    /// A local variable assignment.
    Assign(Ident, Expr),
    /// An assignment to the output accumulator, the value is discarded.
    ResetBuffer,
    ForceEncoding(String),
    IfElse(IfElse),
    /// A call with an attached body, e.g. `items.each do |item| ... end`.
    Block(Block),
}

#[cfg_attr(internal_debug, derive(Debug))]
pub struct IfElse {
    pub not: bool,
    pub cond: Expr,
    pub then_branch: Scope,
    pub else_branch: Option<Scope>,
}

#[cfg_attr(internal_debug, derive(Debug))]
pub struct Block {
    pub call: Call,
    pub params: Vec<Ident>,
    pub body: Scope,
}

#[derive(Clone)]
#[cfg_attr(internal_debug, derive(Debug))]
pub enum Expr {
    Literal(Literal),
    Interp(Interp),
    Var(Ident),
    List(List),
    Map(Map),
    Index(Index),
    Call(Call),
    Not(Not),
    Binary(Binary),
}

#[derive(Clone)]
#[cfg_attr(internal_debug, derive(Debug))]
pub struct Literal {
    pub value: Value,
    pub span: Span,
}

/// A string with `#{...}` interpolation.
#[derive(Clone)]
#[cfg_attr(internal_debug, derive(Debug))]
pub struct Interp {
    pub parts: Vec<Part>,
    pub span: Span,
}

#[derive(Clone)]
#[cfg_attr(internal_debug, derive(Debug))]
pub enum Part {
    Str(String),
    Expr(Expr),
}

#[derive(Clone)]
#[cfg_attr(internal_debug, derive(Debug))]
pub struct List {
    pub items: Vec<Expr>,
    pub span: Span,
}

#[derive(Clone)]
#[cfg_attr(internal_debug, derive(Debug))]
pub struct Map {
    pub entries: Vec<(String, Expr)>,
    pub span: Span,
}

#[derive(Clone)]
#[cfg_attr(internal_debug, derive(Debug))]
pub struct Index {
    pub receiver: Box<Expr>,
    pub index: Box<Expr>,
    pub span: Span,
}

/// A method or function call.
///
/// Member access such as `user.name` is also a call without arguments; the
/// renderer decides whether it is a map lookup or a method.
#[derive(Clone)]
#[cfg_attr(internal_debug, derive(Debug))]
pub struct Call {
    pub receiver: Option<Box<Expr>>,
    pub name: Ident,
    pub args: Option<Args>,
    pub span: Span,
}

#[derive(Clone)]
#[cfg_attr(internal_debug, derive(Debug))]
pub struct Args {
    pub positional: Vec<Expr>,
    pub keywords: Vec<(String, Expr)>,
    pub span: Span,
}

#[derive(Clone)]
#[cfg_attr(internal_debug, derive(Debug))]
pub struct Not {
    pub expr: Box<Expr>,
    pub span: Span,
}

#[derive(Clone)]
#[cfg_attr(internal_debug, derive(Debug))]
pub struct Binary {
    pub op: BinOp,
    pub lhs: Box<Expr>,
    pub rhs: Box<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    And,
    Or,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
}

#[derive(Clone)]
#[cfg_attr(internal_debug, derive(Debug))]
pub struct Ident {
    pub name: String,
    pub span: Span,
}

impl Scope {
    pub const fn new() -> Self {
        Self { stmts: Vec::new() }
    }
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Self::Literal(lit) => lit.span,
            Self::Interp(interp) => interp.span,
            Self::Var(var) => var.span,
            Self::List(list) => list.span,
            Self::Map(map) => map.span,
            Self::Index(index) => index.span,
            Self::Call(call) => call.span,
            Self::Not(not) => not.span,
            Self::Binary(bin) => bin.span,
        }
    }
}

impl Args {
    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.keywords.is_empty()
    }
}

impl BinOp {
    pub fn human(&self) -> &'static str {
        match self {
            Self::And => "&&",
            Self::Or => "||",
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Add => "+",
            Self::Sub => "-",
        }
    }
}
