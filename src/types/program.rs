//! Defines a compiled [`Template`] which is a sequence of [`Instr`] that can be
//! executed by the renderer.

use crate::types::ast;
use crate::Syntax;

pub const FIXME: usize = !0;

#[cfg_attr(internal_debug, derive(Debug))]
pub struct Template {
    pub source: String,
    pub syntax: Syntax,
    pub instrs: Vec<Instr>,
}

#[cfg_attr(internal_debug, derive(Debug))]
pub enum Instr {
    /// Initialize the output accumulator
    ResetBuffer,

    /// Declare the encoding of the output accumulator
    ForceEncoding(String),

    /// Jump to an instruction
    Jump(usize),

    /// Jump to the instruction if the expression is truthy
    JumpIfTrue(usize, ast::Expr),

    /// Jump to the instruction if the expression is falsy
    JumpIfFalse(usize, ast::Expr),

    /// Emit raw template
    EmitRaw(String),

    /// Evaluate and emit the expression
    Emit(ast::Expr),

    /// Evaluate and emit the expression as an element attribute
    EmitAttr(String, ast::Expr),

    /// Evaluate the expression and discard the result
    Eval(ast::Expr),

    /// Evaluate the expression and bind it to a local variable
    Assign(ast::Ident, ast::Expr),

    /// Invoke a call with the body that follows, the body ends at the given
    /// instruction
    Block(ast::Call, Vec<ast::Ident>, usize),
}

#[cfg(not(internal_debug))]
impl std::fmt::Debug for Template {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("<compiled>")
    }
}
