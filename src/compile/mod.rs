//! Compile the template into a program that can be executed by the renderer.
//!
//! This process has three stages:
//! - A front-end for each syntax splits the template into text and embedded
//!   code, the code is tokenized by the lexer and parsed into statement
//!   fragments by the parser.
//! - The builder assembles the fragments into an AST.
//! - The compiler takes the AST and constructs the program.

mod build;
mod erb;
mod haml;
mod lex;
mod parse;

use crate::types::ast;
use crate::types::program::{Instr, Template, FIXME};
use crate::{Engine, Result, Syntax};

/// Compile a template into a program.
pub fn template(engine: &Engine, syntax: Syntax, source: String) -> Result<Template> {
    log::debug!("compiling {} template ({} bytes)", syntax.human(), source.len());
    let mut compiler = Compiler::new();
    let ast = match syntax {
        Syntax::Erb => {
            let options = engine.erb_options();
            compiler.push(Instr::ResetBuffer);
            if let Some(encoding) = &options.encoding {
                compiler.push(Instr::ForceEncoding(encoding.to_string()));
            }
            erb::parse_template(&source, options)?
        }
        Syntax::Haml => haml::parse_template(&source, engine.haml_options())?,
    };
    compiler.compile_scope(ast.scope);
    Ok(Template {
        source,
        syntax,
        instrs: compiler.instrs,
    })
}

/// A compiler that constructs a program from an AST.
struct Compiler {
    instrs: Vec<Instr>,
}

impl Compiler {
    fn new() -> Self {
        Self { instrs: Vec::new() }
    }

    fn compile_scope(&mut self, scope: ast::Scope) {
        for stmt in scope.stmts {
            self.compile_stmt(stmt);
        }
    }

    fn compile_stmt(&mut self, stmt: ast::Stmt) {
        match stmt {
            ast::Stmt::Raw(raw) => {
                self.push(Instr::EmitRaw(raw));
            }

            ast::Stmt::Emit(expr) => {
                self.push(Instr::Emit(expr));
            }

            ast::Stmt::Eval(expr) => {
                self.push(Instr::Eval(expr));
            }

            ast::Stmt::Attr(name, expr) => {
                self.push(Instr::EmitAttr(name, expr));
            }

            ast::Stmt::Assign(name, expr) => {
                self.push(Instr::Assign(name, expr));
            }

            ast::Stmt::ResetBuffer => {
                self.push(Instr::ResetBuffer);
            }

            ast::Stmt::ForceEncoding(encoding) => {
                self.push(Instr::ForceEncoding(encoding));
            }

            ast::Stmt::IfElse(ast::IfElse {
                not,
                cond,
                then_branch,
                else_branch,
            }) => {
                // then branch
                let instr = if not {
                    Instr::JumpIfTrue(FIXME, cond)
                } else {
                    Instr::JumpIfFalse(FIXME, cond)
                };
                let j = self.push(instr);
                self.compile_scope(then_branch);

                match else_branch {
                    Some(else_branch) => {
                        // else branch
                        let j2 = self.push(Instr::Jump(FIXME));
                        self.update_jump(j);
                        self.compile_scope(else_branch);
                        self.update_jump(j2)
                    }
                    None => {
                        self.update_jump(j);
                    }
                }
            }

            // The body follows the block instruction and the renderer
            // continues after it once the call returns.
            ast::Stmt::Block(ast::Block { call, params, body }) => {
                let j = self.push(Instr::Block(call, params, FIXME));
                self.compile_scope(body);
                self.update_jump(j);
            }
        }
    }

    fn update_jump(&mut self, i: usize) {
        let n = self.instrs.len();
        match &mut self.instrs[i] {
            Instr::Jump(j)
            | Instr::JumpIfTrue(j, _)
            | Instr::JumpIfFalse(j, _)
            | Instr::Block(_, _, j) => *j = n,
            _ => panic!("not a jump instr"),
        }
    }

    fn push(&mut self, instr: Instr) -> usize {
        let i = self.instrs.len();
        self.instrs.push(instr);
        i
    }
}
