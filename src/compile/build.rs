use std::mem;

use crate::compile::parse::Code;
use crate::types::ast;
use crate::types::span::Span;
use crate::{Error, Result};

/// Assembles statement fragments into an AST.
///
/// The template front-ends feed text, output expressions and code fragments
/// in source order. Fragments that open a block push a state to the block
/// stack and the statements that follow are collected into the scope of the
/// innermost block until it is closed.
#[cfg_attr(internal_debug, derive(Debug))]
pub struct Builder<'a> {
    source: &'a str,
    root: ast::Scope,
    blocks: Vec<State>,
}

#[cfg_attr(internal_debug, derive(Debug))]
enum State {
    If {
        /// Whether this was opened by an `elsif` and so is closed by the
        /// same `end` as the enclosing `if`.
        chained: bool,
        not: bool,
        cond: ast::Expr,
        span: Span,
        then_branch: Option<ast::Scope>,
        scope: ast::Scope,
    },
    Body {
        call: ast::Call,
        params: Vec<ast::Ident>,
        brace: bool,
        span: Span,
        scope: ast::Scope,
    },
}

impl<'a> Builder<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            root: ast::Scope::new(),
            blocks: Vec::new(),
        }
    }

    /// Literal template text, adjacent text is merged.
    pub fn raw(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        let scope = self.scope_mut();
        match scope.stmts.last_mut() {
            Some(ast::Stmt::Raw(raw)) => raw.push_str(text),
            _ => scope.stmts.push(ast::Stmt::Raw(text.to_owned())),
        }
    }

    /// Text with interpolated expressions.
    pub fn parts(&mut self, parts: Vec<ast::Part>) {
        for part in parts {
            match part {
                ast::Part::Str(s) => self.raw(&s),
                ast::Part::Expr(expr) => self.push(ast::Stmt::Emit(expr)),
            }
        }
    }

    pub fn emit(&mut self, expr: ast::Expr) {
        self.push(ast::Stmt::Emit(expr));
    }

    pub fn attr(&mut self, name: String, expr: ast::Expr) {
        self.push(ast::Stmt::Attr(name, expr));
    }

    pub fn code(&mut self, code: Code, span: Span) -> Result<()> {
        match code {
            Code::If { not, cond } => {
                self.blocks.push(State::If {
                    chained: false,
                    not,
                    cond,
                    span,
                    then_branch: None,
                    scope: ast::Scope::new(),
                });
            }

            // `elsif` is desugared into an `if` statement in the else branch
            // of the enclosing `if` statement.
            Code::Elsif(cond) => {
                self.start_else("unexpected `elsif`", span)?;
                self.blocks.push(State::If {
                    chained: true,
                    not: false,
                    cond,
                    span,
                    then_branch: None,
                    scope: ast::Scope::new(),
                });
            }

            Code::Else => {
                self.start_else("unexpected `else`", span)?;
            }

            Code::End => {
                if let Some(State::Body { brace: true, .. }) = self.blocks.last() {
                    return Err(Error::syntax(
                        "unexpected `end`, expected `}`",
                        self.source,
                        span,
                    ));
                }
                self.close(span, "unexpected `end`")?;
            }

            Code::CloseBrace => match self.blocks.last() {
                Some(State::Body { brace: true, .. }) => self.close(span, "unexpected `}`")?,
                _ => {
                    return Err(Error::syntax("unexpected `}`", self.source, span));
                }
            },

            Code::Open {
                call,
                params,
                brace,
            } => {
                self.blocks.push(State::Body {
                    call,
                    params,
                    brace,
                    span,
                    scope: ast::Scope::new(),
                });
            }

            Code::Assign(name, expr) => self.push(ast::Stmt::Assign(name, expr)),
            Code::ResetBuffer => self.push(ast::Stmt::ResetBuffer),
            Code::ForceEncoding(encoding) => self.push(ast::Stmt::ForceEncoding(encoding)),
            Code::Emit(expr) => self.push(ast::Stmt::Emit(expr)),
            Code::Eval(expr) => self.push(ast::Stmt::Eval(expr)),
        }
        Ok(())
    }

    /// Closes the innermost open block, an `if` statement is closed together
    /// with all of its `elsif` clauses.
    pub fn close(&mut self, span: Span, msg: &str) -> Result<()> {
        loop {
            match self.blocks.pop() {
                Some(State::If {
                    chained,
                    not,
                    cond,
                    then_branch,
                    scope,
                    ..
                }) => {
                    let (then_branch, else_branch) = match then_branch {
                        Some(then_branch) => (then_branch, Some(scope)),
                        None => (scope, None),
                    };
                    self.push(ast::Stmt::IfElse(ast::IfElse {
                        not,
                        cond,
                        then_branch,
                        else_branch,
                    }));
                    if !chained {
                        return Ok(());
                    }
                }
                Some(State::Body {
                    call,
                    params,
                    scope,
                    ..
                }) => {
                    self.push(ast::Stmt::Block(ast::Block {
                        call,
                        params,
                        body: scope,
                    }));
                    return Ok(());
                }
                None => return Err(Error::syntax(msg, self.source, span)),
            }
        }
    }

    pub fn finish(self) -> Result<ast::Template> {
        if let Some(block) = self.blocks.first() {
            let (msg, span) = match block {
                State::If { span, .. } => ("unclosed `if` block", span),
                State::Body { brace: true, span, .. } => ("unclosed `{` block", span),
                State::Body { span, .. } => ("unclosed `do` block", span),
            };
            return Err(Error::syntax(msg, self.source, *span));
        }
        Ok(ast::Template { scope: self.root })
    }

    /// Moves the statements collected so far into the then branch of the
    /// innermost `if` statement.
    fn start_else(&mut self, msg: &str, span: Span) -> Result<()> {
        match self.blocks.last_mut() {
            Some(State::If {
                then_branch: then_branch @ None,
                scope,
                ..
            }) => {
                *then_branch = Some(mem::replace(scope, ast::Scope::new()));
                Ok(())
            }
            _ => Err(Error::syntax(msg, self.source, span)),
        }
    }

    fn push(&mut self, stmt: ast::Stmt) {
        self.scope_mut().stmts.push(stmt);
    }

    fn scope_mut(&mut self) -> &mut ast::Scope {
        match self.blocks.last_mut() {
            Some(State::If { scope, .. } | State::Body { scope, .. }) => scope,
            None => &mut self.root,
        }
    }
}
