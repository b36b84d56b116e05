use std::fmt::Display;

use crate::compile::lex::{Keyword, Lexer, Token};
use crate::types::ast;
use crate::types::span::Span;
use crate::{Error, Result, Value};

/// A parser for the code embedded in a template.
///
/// Both template front-ends hand ranges of the template source to this parser,
/// e.g. the inside of `<% %>` tags or the remainder of a Haml `-` line, and get
/// back statement fragments. A fragment such as `if user` or `end` doesn't form
/// a complete statement on its own, assembling fragments into an AST is the
/// job of the [`Builder`][crate::compile::build::Builder].
#[cfg_attr(internal_debug, derive(Debug))]
pub struct Parser<'a> {
    /// A lexer that tokenizes the code.
    tokens: Lexer<'a>,

    /// The name of the output accumulator, writes to it are output.
    buffer: &'a str,

    /// A buffer to store the next token.
    peeked: Option<Option<(Token, Span)>>,
}

/// A statement fragment.
#[cfg_attr(internal_debug, derive(Debug))]
pub enum Code {
    /// `if cond` or `unless cond`
    If { not: bool, cond: ast::Expr },
    /// `elsif cond`
    Elsif(ast::Expr),
    /// `else`
    Else,
    /// `end`
    End,
    /// A call that opens a body, e.g. `items.each do |item|`
    Open {
        call: ast::Call,
        params: Vec<ast::Ident>,
        brace: bool,
    },
    /// `}`
    CloseBrace,
    /// `name = expr`
    Assign(ast::Ident, ast::Expr),
    /// `_erbout = expr`, the accumulator initialization
    ResetBuffer,
    /// `_erbout.force_encoding("UTF-8")`
    ForceEncoding(String),
    /// An expression written to the output, e.g. `_erbout.concat(expr)`
    Emit(ast::Expr),
    /// An expression evaluated for its side effects.
    Eval(ast::Expr),
}

impl<'a> Parser<'a> {
    /// Construct a new parser over the given range of the source.
    pub fn new(source: &'a str, span: impl Into<Span>, buffer: &'a str) -> Self {
        Self {
            tokens: Lexer::new(source, span),
            buffer,
            peeked: None,
        }
    }

    /// Parses any number of statement fragments separated by newlines or
    /// semicolons.
    pub fn parse_codes(mut self) -> Result<Vec<(Code, Span)>> {
        let mut codes = Vec::new();
        loop {
            self.skip_separators()?;
            if self.peek()?.is_none() {
                break;
            }
            self.parse_code(&mut codes)?;
            self.expect_end_of_statement()?;
        }
        Ok(codes)
    }

    /// Parses the contents of an output tag, this is a single expression
    /// which may open a body.
    pub fn parse_output(mut self) -> Result<(Code, Span)> {
        self.skip_separators()?;
        let expr = self.parse_expr()?;
        let code = match self.parse_block_opener(expr)? {
            Ok(code) => code,
            Err(expr) => {
                let span = expr.span();
                (Code::Emit(expr), span)
            }
        };
        self.skip_separators()?;
        if let Some((tk, span)) = self.next()? {
            return Err(self.err_unexpected_token("end of expression", tk, span));
        }
        Ok(code)
    }

    /// Parses a single expression spanning the entire range.
    pub fn parse_only_expr(mut self) -> Result<ast::Expr> {
        let expr = self.parse_expr()?;
        if let Some((tk, span)) = self.next()? {
            return Err(self.err_unexpected_token("end of expression", tk, span));
        }
        Ok(expr)
    }

    /// Parses a Haml attribute hash, e.g. `{ href: url, "data-x" => 1 }`.
    ///
    /// Returns the entries and the offset just after the closing brace.
    pub fn parse_attrs(mut self) -> Result<(Vec<(String, ast::Expr)>, usize)> {
        let begin = self.expect(Token::OpenBrace)?;
        let map = self.parse_map(begin)?;
        Ok((map.entries, self.tokens.offset()))
    }

    /// Parses text with `#{..}` interpolation, only `\#` and `\\` are escapes.
    pub fn parse_text(&self, span: Span) -> Result<Vec<ast::Part>> {
        self.parse_interp(span, |_, c| match c {
            '#' | '\\' => Ok(Some(c)),
            _ => Ok(None),
        })
    }

    fn parse_code(&mut self, codes: &mut Vec<(Code, Span)>) -> Result<()> {
        if let Some((Token::Keyword, span)) = self.peek()? {
            let kw = self.keyword(span);
            let code = match kw {
                Keyword::If | Keyword::Unless => {
                    self.next()?;
                    let cond = self.parse_expr()?;
                    let not = kw == Keyword::Unless;
                    Some(Code::If { not, cond })
                }
                Keyword::Elsif => {
                    self.next()?;
                    Some(Code::Elsif(self.parse_expr()?))
                }
                Keyword::Else => {
                    self.next()?;
                    Some(Code::Else)
                }
                Keyword::End => {
                    self.next()?;
                    Some(Code::End)
                }
                Keyword::Do => {
                    return Err(self.err_unexpected_keyword(kw.human(), span));
                }
                // a literal starts an expression statement
                Keyword::Nil | Keyword::True | Keyword::False => None,
            };
            if let Some(code) = code {
                let chains = matches!(code, Code::ForceEncoding(_));
                codes.push((code, span));
                // force_encoding returns the accumulator
                if chains && self.is_next(Token::Shl)? {
                    return self.parse_appends(codes);
                }
                return Ok(());
            }
        }

        if let Some((Token::CloseBrace, span)) = self.peek()? {
            self.next()?;
            codes.push((Code::CloseBrace, span));
            return Ok(());
        }

        let expr = self.parse_expr()?;

        // name = expr
        if self.is_next(Token::Assign)? {
            let assign = self.expect(Token::Assign)?;
            if self.is_buffer(&expr) {
                // The initial value is discarded, the accumulator owns it.
                let value = self.parse_expr()?;
                codes.push((Code::ResetBuffer, expr.span().combine(value.span())));
                return Ok(());
            }
            let ident = match expr {
                ast::Expr::Var(ident) => ident,
                expr => {
                    return Err(Error::syntax(
                        "expected variable name before `=`",
                        self.source(),
                        expr.span().combine(assign),
                    ));
                }
            };
            let value = self.parse_expr()?;
            let span = ident.span.combine(value.span());
            codes.push((Code::Assign(ident, value), span));
            return Ok(());
        }

        // _erbout << a << b
        if self.is_buffer(&expr) && self.is_next(Token::Shl)? {
            return self.parse_appends(codes);
        }

        // _erbout.concat(expr) or _erbout.force_encoding(name)
        if let ast::Expr::Call(call) = &expr {
            let on_buffer = call.receiver.as_deref().map_or(false, |r| self.is_buffer(r));
            let method = call.name.name.as_str();
            if on_buffer && matches!(method, "concat" | "force_encoding") {
                let span = call.span;
                let mut args = call.args.clone().map(|a| a.positional).unwrap_or_default();
                if args.len() != 1 {
                    return Err(Error::syntax(
                        format!("expected exactly one argument to `{method}`"),
                        self.source(),
                        span,
                    ));
                }
                let arg = args.remove(0);
                let code = match (method, arg) {
                    ("concat", arg) => Code::Emit(arg),
                    (
                        _,
                        ast::Expr::Literal(ast::Literal {
                            value: Value::String(encoding),
                            ..
                        }),
                    ) => Code::ForceEncoding(encoding),
                    (_, arg) => {
                        return Err(Error::syntax(
                            "expected encoding name",
                            self.source(),
                            arg.span(),
                        ));
                    }
                };
                let chains = matches!(code, Code::ForceEncoding(_));
                codes.push((code, span));
                // force_encoding returns the accumulator
                if chains && self.is_next(Token::Shl)? {
                    return self.parse_appends(codes);
                }
                return Ok(());
            }
        }

        match self.parse_block_opener(expr)? {
            Ok(code) => codes.push(code),
            Err(expr) => {
                let span = expr.span();
                codes.push((Code::Eval(expr), span));
            }
        }
        Ok(())
    }

    /// Parses `<< a << b` after the accumulator, each operand is output.
    fn parse_appends(&mut self, codes: &mut Vec<(Code, Span)>) -> Result<()> {
        while self.is_next(Token::Shl)? {
            self.next()?;
            let value = self.parse_expr()?;
            let span = value.span();
            codes.push((Code::Emit(value), span));
        }
        Ok(())
    }

    /// Parses `do |params|` or `{ |params|` following a call.
    ///
    /// Returns the expression back if it is not followed by a body.
    fn parse_block_opener(
        &mut self,
        expr: ast::Expr,
    ) -> Result<std::result::Result<(Code, Span), ast::Expr>> {
        let (brace, opener) = match self.peek()? {
            Some((Token::Keyword, span)) if self.keyword(span) == Keyword::Do => (false, span),
            Some((Token::OpenBrace, span)) => (true, span),
            _ => return Ok(Err(expr)),
        };
        self.next()?;

        let call = match expr {
            ast::Expr::Call(call) => call,
            ast::Expr::Var(name) => {
                let span = name.span;
                ast::Call {
                    receiver: None,
                    name,
                    args: None,
                    span,
                }
            }
            expr => {
                return Err(Error::syntax(
                    "expected method call before body",
                    self.source(),
                    expr.span().combine(opener),
                ));
            }
        };

        let mut params = Vec::new();
        let mut span = call.span.combine(opener);
        if self.is_next(Token::Pipe)? {
            self.next()?;
            loop {
                params.push(self.parse_ident()?);
                if self.is_next(Token::Comma)? {
                    self.next()?;
                    continue;
                }
                break;
            }
            span = span.combine(self.expect(Token::Pipe)?);
        } else if self.is_next(Token::Or)? {
            // `do ||`
            span = span.combine(self.expect(Token::Or)?);
        }

        Ok(Ok((
            Code::Open {
                call,
                params,
                brace,
            },
            span,
        )))
    }

    /// Parses an expression.
    ///
    /// This is an expression that can be emitted, assigned or used as a
    /// condition.
    pub fn parse_expr(&mut self) -> Result<ast::Expr> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<ast::Expr> {
        let mut lhs = self.parse_and()?;
        while self.is_next(Token::Or)? {
            self.next()?;
            let rhs = self.parse_and()?;
            lhs = binary(ast::BinOp::Or, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<ast::Expr> {
        let mut lhs = self.parse_equality()?;
        while self.is_next(Token::And)? {
            self.next()?;
            let rhs = self.parse_equality()?;
            lhs = binary(ast::BinOp::And, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_equality(&mut self) -> Result<ast::Expr> {
        let lhs = self.parse_comparison()?;
        let op = match self.peek()? {
            Some((Token::Eq, _)) => ast::BinOp::Eq,
            Some((Token::Ne, _)) => ast::BinOp::Ne,
            _ => return Ok(lhs),
        };
        self.next()?;
        let rhs = self.parse_comparison()?;
        Ok(binary(op, lhs, rhs))
    }

    fn parse_comparison(&mut self) -> Result<ast::Expr> {
        let lhs = self.parse_additive()?;
        let op = match self.peek()? {
            Some((Token::Lt, _)) => ast::BinOp::Lt,
            Some((Token::Le, _)) => ast::BinOp::Le,
            Some((Token::Gt, _)) => ast::BinOp::Gt,
            Some((Token::Ge, _)) => ast::BinOp::Ge,
            _ => return Ok(lhs),
        };
        self.next()?;
        let rhs = self.parse_additive()?;
        Ok(binary(op, lhs, rhs))
    }

    fn parse_additive(&mut self) -> Result<ast::Expr> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek()? {
                Some((Token::Plus, _)) => ast::BinOp::Add,
                Some((Token::Minus, _)) => ast::BinOp::Sub,
                _ => return Ok(lhs),
            };
            self.next()?;
            let rhs = self.parse_unary()?;
            lhs = binary(op, lhs, rhs);
        }
    }

    fn parse_unary(&mut self) -> Result<ast::Expr> {
        match self.peek()? {
            Some((Token::Not, span)) => {
                self.next()?;
                let expr = self.parse_unary()?;
                let span = span.combine(expr.span());
                Ok(ast::Expr::Not(ast::Not {
                    expr: Box::new(expr),
                    span,
                }))
            }
            Some((Token::Minus, span)) => {
                self.next()?;
                let expr = self.parse_unary()?;
                match expr {
                    ast::Expr::Literal(ast::Literal {
                        value: Value::Integer(n),
                        span: sp,
                    }) => {
                        let value = n.checked_neg().map(Value::Integer).ok_or_else(|| {
                            Error::syntax("integer literal out of range", self.source(), sp)
                        })?;
                        let span = span.combine(sp);
                        Ok(ast::Expr::Literal(ast::Literal { value, span }))
                    }
                    ast::Expr::Literal(ast::Literal {
                        value: Value::Float(n),
                        span: sp,
                    }) => {
                        let span = span.combine(sp);
                        let value = Value::Float(-n);
                        Ok(ast::Expr::Literal(ast::Literal { value, span }))
                    }
                    expr => {
                        let zero = ast::Expr::Literal(ast::Literal {
                            value: Value::Integer(0),
                            span,
                        });
                        Ok(binary(ast::BinOp::Sub, zero, expr))
                    }
                }
            }
            // `+''` is an unfrozen string, which is the same thing here
            Some((Token::Plus, _)) => {
                self.next()?;
                self.parse_unary()
            }
            _ => self.parse_postfix(),
        }
    }

    /// Parses member access, method calls and indexing.
    fn parse_postfix(&mut self) -> Result<ast::Expr> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.peek()? {
                Some((Token::Dot, _)) => {
                    self.next()?;
                    let name = self.parse_method_name()?;
                    let args = self.parse_args_opt()?;
                    let end = args.as_ref().map(|a| a.span).unwrap_or(name.span);
                    let span = expr.span().combine(end);
                    expr = ast::Expr::Call(ast::Call {
                        receiver: Some(Box::new(expr)),
                        name,
                        args,
                        span,
                    });
                }
                Some((Token::OpenBracket, _)) => {
                    self.next()?;
                    self.skip_newlines()?;
                    let index = self.parse_expr()?;
                    self.skip_newlines()?;
                    let end = self.expect(Token::CloseBracket)?;
                    let span = expr.span().combine(end);
                    expr = ast::Expr::Index(ast::Index {
                        receiver: Box::new(expr),
                        index: Box::new(index),
                        span,
                    });
                }
                _ => return Ok(expr),
            }
        }
    }

    fn parse_primary(&mut self) -> Result<ast::Expr> {
        let (tk, span) = self.parse()?;
        let expr = match tk {
            Token::Keyword => {
                let value = match self.keyword(span) {
                    Keyword::Nil => Value::None,
                    Keyword::True => Value::Bool(true),
                    Keyword::False => Value::Bool(false),
                    kw => return Err(self.err_unexpected_keyword(kw.human(), span)),
                };
                ast::Expr::Literal(ast::Literal { value, span })
            }

            Token::Ident => {
                let name = ast::Ident {
                    name: self.source()[span].to_owned(),
                    span,
                };
                match self.parse_args_opt()? {
                    Some(args) => {
                        let span = span.combine(args.span);
                        ast::Expr::Call(ast::Call {
                            receiver: None,
                            name,
                            args: Some(args),
                            span,
                        })
                    }
                    None => ast::Expr::Var(name),
                }
            }

            Token::Number => ast::Expr::Literal(self.parse_literal_number(span)?),

            Token::String => {
                let parts = self.parse_string(span)?;
                into_string_expr(parts, span)
            }

            Token::RawString => {
                let value = Value::String(self.parse_raw_string(span)?);
                ast::Expr::Literal(ast::Literal { value, span })
            }

            Token::Symbol => {
                let value = Value::String(self.source()[span.m + 1..span.n].to_owned());
                ast::Expr::Literal(ast::Literal { value, span })
            }

            Token::OpenParen => {
                self.skip_newlines()?;
                let expr = self.parse_expr()?;
                self.skip_newlines()?;
                self.expect(Token::CloseParen)?;
                expr
            }

            Token::OpenBracket => {
                let mut items = Vec::new();
                let end = loop {
                    self.skip_newlines()?;
                    if let Some((Token::CloseBracket, end)) = self.peek()? {
                        self.next()?;
                        break end;
                    }
                    items.push(self.parse_expr()?);
                    self.skip_newlines()?;
                    match self.parse()? {
                        (Token::Comma, _) => continue,
                        (Token::CloseBracket, end) => break end,
                        (tk, sp) => return Err(self.err_unexpected_token("`]`", tk, sp)),
                    }
                };
                ast::Expr::List(ast::List {
                    items,
                    span: span.combine(end),
                })
            }

            Token::OpenBrace => ast::Expr::Map(self.parse_map(span)?),

            tk => {
                return Err(self.err_unexpected_token("expression", tk, span));
            }
        };
        Ok(expr)
    }

    /// Parses the entries of a hash literal, the opening brace has already
    /// been consumed.
    fn parse_map(&mut self, begin: Span) -> Result<ast::Map> {
        let mut entries = Vec::new();
        let end = loop {
            self.skip_newlines()?;
            if let Some((Token::CloseBrace, end)) = self.peek()? {
                self.next()?;
                break end;
            }
            entries.push(self.parse_entry()?);
            self.skip_newlines()?;
            match self.parse()? {
                (Token::Comma, _) => continue,
                (Token::CloseBrace, end) => break end,
                (tk, sp) => return Err(self.err_unexpected_token("`}`", tk, sp)),
            }
        };
        Ok(ast::Map {
            entries,
            span: begin.combine(end),
        })
    }

    /// Parses `key: value`, `:key => value` or `"key" => value`.
    fn parse_entry(&mut self) -> Result<(String, ast::Expr)> {
        if let Some((Token::Label, span)) = self.peek()? {
            self.next()?;
            let key = self.source()[span.m..span.n - 1].to_owned();
            let value = self.parse_expr()?;
            return Ok((key, value));
        }
        let key = self.parse_expr()?;
        self.expect(Token::Arrow)?;
        let key = match key {
            ast::Expr::Literal(ast::Literal {
                value: Value::String(s),
                ..
            }) => s,
            key => {
                return Err(Error::syntax(
                    "expected string or symbol key",
                    self.source(),
                    key.span(),
                ));
            }
        };
        let value = self.parse_expr()?;
        Ok((key, value))
    }

    /// Parses the arguments to a call if the next token is `(`.
    fn parse_args_opt(&mut self) -> Result<Option<ast::Args>> {
        let begin = match self.peek()? {
            Some((Token::OpenParen, span)) => span,
            _ => return Ok(None),
        };
        self.next()?;

        let mut positional = Vec::new();
        let mut keywords = Vec::new();
        let end = loop {
            self.skip_newlines()?;
            if let Some((Token::CloseParen, end)) = self.peek()? {
                self.next()?;
                break end;
            }

            if let Some((Token::Label, _)) = self.peek()? {
                keywords.push(self.parse_entry()?);
            } else {
                let expr = self.parse_expr()?;
                if self.is_next(Token::Arrow)? {
                    let span = expr.span();
                    match expr {
                        ast::Expr::Literal(ast::Literal {
                            value: Value::String(key),
                            ..
                        }) => {
                            self.next()?;
                            keywords.push((key, self.parse_expr()?));
                        }
                        _ => {
                            return Err(Error::syntax(
                                "expected string or symbol key",
                                self.source(),
                                span,
                            ));
                        }
                    }
                } else if !keywords.is_empty() {
                    return Err(Error::syntax(
                        "positional argument after keyword arguments",
                        self.source(),
                        expr.span(),
                    ));
                } else {
                    positional.push(expr);
                }
            }

            self.skip_newlines()?;
            match self.parse()? {
                (Token::Comma, _) => continue,
                (Token::CloseParen, end) => break end,
                (tk, sp) => return Err(self.err_unexpected_token("`)`", tk, sp)),
            }
        };

        Ok(Some(ast::Args {
            positional,
            keywords,
            span: begin.combine(end),
        }))
    }

    /// Parses a method name, keywords are allowed after a `.`.
    fn parse_method_name(&mut self) -> Result<ast::Ident> {
        match self.parse()? {
            (Token::Ident | Token::Keyword, span) => Ok(ast::Ident {
                name: self.source()[span].to_owned(),
                span,
            }),
            (tk, span) => Err(self.err_unexpected_token("method name", tk, span)),
        }
    }

    /// Parses an integer or a float.
    fn parse_literal_number(&self, span: Span) -> Result<ast::Literal> {
        let raw: String = self.source()[span].chars().filter(|&c| c != '_').collect();
        let value = if raw.contains('.') {
            let float: f64 = raw
                .parse()
                .map_err(|_| Error::syntax("invalid float literal", self.source(), span))?;
            Value::Float(float)
        } else {
            let int: i64 = raw.parse().map_err(|_| {
                Error::syntax(
                    "base 10 literal out of range for 64-bit integer",
                    self.source(),
                    span,
                )
            })?;
            Value::Integer(int)
        };
        Ok(ast::Literal { value, span })
    }

    /// Parses a double quoted string, handling escape characters and
    /// interpolation.
    fn parse_string(&self, span: Span) -> Result<Vec<ast::Part>> {
        let inner = Span::from(span.m + 1..span.n - 1);
        self.parse_interp(inner, |i, esc| match esc {
            'n' => Ok(Some('\n')),
            'r' => Ok(Some('\r')),
            't' => Ok(Some('\t')),
            '0' => Ok(Some('\0')),
            '\\' | '"' | '#' | '\'' => Ok(Some(esc)),
            _ => Err(Error::syntax(
                "unknown escape character",
                self.source(),
                i..i + 1 + esc.len_utf8(),
            )),
        })
    }

    /// Parses a single quoted string, only `\\` and `\'` are escapes.
    fn parse_raw_string(&self, span: Span) -> Result<String> {
        let raw = &self.source()[span.m + 1..span.n - 1];
        let mut string = String::with_capacity(raw.len());
        let mut iter = raw.chars().peekable();
        while let Some(c) = iter.next() {
            match (c, iter.peek()) {
                ('\\', Some(&next @ ('\\' | '\''))) => {
                    iter.next();
                    string.push(next);
                }
                (c, _) => string.push(c),
            }
        }
        Ok(string)
    }

    /// Splits the text in the span into literal and `#{..}` parts.
    ///
    /// The `escape` function receives the offset of each backslash and the
    /// character following it, returning `None` keeps both characters as is.
    fn parse_interp<F>(&self, span: Span, escape: F) -> Result<Vec<ast::Part>>
    where
        F: Fn(usize, char) -> Result<Option<char>>,
    {
        let source = self.source();
        let mut parts = Vec::new();
        let mut string = String::new();
        let mut iter = source[span].char_indices().map(|(d, c)| (span.m + d, c)).peekable();

        while let Some((i, c)) = iter.next() {
            match c {
                '\\' => match iter.next() {
                    Some((_, esc)) => match escape(i, esc)? {
                        Some(c) => string.push(c),
                        None => {
                            string.push('\\');
                            string.push(esc);
                        }
                    },
                    None => string.push('\\'),
                },
                '#' if matches!(iter.peek(), Some((_, '{'))) => {
                    iter.next();
                    let m = i + 2;
                    let n = find_interp_end(source, m, span.n).ok_or_else(|| {
                        Error::syntax("unclosed interpolation", source, i..span.n)
                    })?;
                    if !string.is_empty() {
                        parts.push(ast::Part::Str(std::mem::take(&mut string)));
                    }
                    let expr = Parser::new(source, m..n, self.buffer).parse_only_expr()?;
                    parts.push(ast::Part::Expr(expr));
                    while matches!(iter.peek(), Some((j, _)) if *j <= n) {
                        iter.next();
                    }
                }
                c => string.push(c),
            }
        }
        if !string.is_empty() {
            parts.push(ast::Part::Str(string));
        }
        Ok(parts)
    }

    /// Expects a semicolon, newline or the end of the code.
    fn expect_end_of_statement(&mut self) -> Result<()> {
        match self.peek()? {
            None | Some((Token::Semi | Token::Newline, _)) => Ok(()),
            Some((tk, span)) => Err(self.err_unexpected_token("end of statement", tk, span)),
        }
    }

    fn skip_separators(&mut self) -> Result<()> {
        while let Some((Token::Semi | Token::Newline, _)) = self.peek()? {
            self.next()?;
        }
        Ok(())
    }

    fn skip_newlines(&mut self) -> Result<()> {
        while self.is_next(Token::Newline)? {
            self.next()?;
        }
        Ok(())
    }

    fn is_buffer(&self, expr: &ast::Expr) -> bool {
        matches!(expr, ast::Expr::Var(ident) if ident.name == self.buffer)
    }

    fn keyword(&self, span: Span) -> Keyword {
        // The lexer only emits keyword tokens for valid keywords.
        Keyword::from_str(&self.source()[span]).unwrap_or(Keyword::End)
    }

    /// Parses an identifier.
    fn parse_ident(&mut self) -> Result<ast::Ident> {
        let span = self.expect(Token::Ident)?;
        Ok(ast::Ident {
            name: self.source()[span].to_owned(),
            span,
        })
    }

    /// Parses any token.
    fn parse(&mut self) -> Result<(Token, Span)> {
        match self.next()? {
            Some((tk, sp)) => Ok((tk, sp)),
            None => Err(self.err_unexpected_eof("token")),
        }
    }

    /// Parses the specified token and returns its span.
    fn expect(&mut self, exp: Token) -> Result<Span> {
        match self.next()? {
            Some((tk, span)) if tk == exp => Ok(span),
            Some((tk, span)) => Err(self.err_unexpected_token(exp.human(), tk, span)),
            None => Err(self.err_unexpected_eof(exp.human())),
        }
    }

    /// Returns `true` if the next token is equal to the provided one.
    fn is_next(&mut self, token: Token) -> Result<bool> {
        Ok(self.peek()?.map(|(tk, _)| tk == token).unwrap_or(false))
    }

    /// Returns a copy of the next token without affecting the result of the
    /// following `.next()` call.
    fn peek(&mut self) -> Result<Option<(Token, Span)>> {
        match self.peeked {
            Some(peeked) => Ok(peeked),
            None => {
                let next = self.tokens.next()?;
                self.peeked = Some(next);
                Ok(next)
            }
        }
    }

    /// Returns the next token and span in the stream.
    fn next(&mut self) -> Result<Option<(Token, Span)>> {
        match self.peeked.take() {
            Some(v) => Ok(v),
            None => self.tokens.next(),
        }
    }

    fn source(&self) -> &'a str {
        self.tokens.source
    }

    fn err_unexpected_eof(&self, exp: impl Display) -> Error {
        let n = self.tokens.offset();
        Error::syntax(format!("expected {exp}, found EOF"), self.source(), n..n)
    }

    fn err_unexpected_token(&self, exp: impl Display, got: Token, span: Span) -> Error {
        let got = got.human();
        Error::syntax(format!("expected {exp}, found {got}"), self.source(), span)
    }

    fn err_unexpected_keyword(&self, kw: impl Display, span: Span) -> Error {
        Error::syntax(format!("unexpected keyword `{kw}`"), self.source(), span)
    }
}

fn binary(op: ast::BinOp, lhs: ast::Expr, rhs: ast::Expr) -> ast::Expr {
    let span = lhs.span().combine(rhs.span());
    ast::Expr::Binary(ast::Binary {
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
        span,
    })
}

/// Returns a plain string literal when there is nothing to interpolate.
pub fn into_string_expr(parts: Vec<ast::Part>, span: Span) -> ast::Expr {
    if parts.iter().any(|p| matches!(p, ast::Part::Expr(_))) {
        return ast::Expr::Interp(ast::Interp { parts, span });
    }
    let value = parts
        .into_iter()
        .map(|part| match part {
            ast::Part::Str(s) => s,
            ast::Part::Expr(_) => String::new(),
        })
        .collect();
    ast::Expr::Literal(ast::Literal {
        value: Value::String(value),
        span,
    })
}

/// Finds the `}` that closes an interpolation starting at `i`.
///
/// Nested braces and quoted strings inside the interpolation are skipped.
pub fn find_interp_end(source: &str, i: usize, end: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (d, c) in source[i..end].char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match (c, quote) {
            ('\\', Some(_)) => escaped = true,
            (c, Some(q)) if c == q => quote = None,
            (_, Some(_)) => {}
            ('"' | '\'', None) => quote = Some(c),
            ('{', None) => depth += 1,
            ('}', None) if depth == 0 => return Some(i + d),
            ('}', None) => depth -= 1,
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codes(source: &str) -> Result<Vec<Code>> {
        let codes = Parser::new(source, 0..source.len(), "_erbout").parse_codes()?;
        Ok(codes.into_iter().map(|(code, _)| code).collect())
    }

    fn expr(source: &str) -> Result<ast::Expr> {
        Parser::new(source, 0..source.len(), "_erbout").parse_only_expr()
    }

    #[test]
    fn parse_if_and_end() {
        let codes = codes("if user.admin?; x = 1\nend").unwrap();
        assert!(matches!(codes[0], Code::If { not: false, .. }));
        assert!(matches!(&codes[1], Code::Assign(ident, _) if ident.name == "x"));
        assert!(matches!(codes[2], Code::End));
        assert_eq!(codes.len(), 3);
    }

    #[test]
    fn parse_unless() {
        let codes = codes("unless done").unwrap();
        assert!(matches!(codes[0], Code::If { not: true, .. }));
    }

    #[test]
    fn parse_block_with_params() {
        let codes = codes("items.each do |k, v|").unwrap();
        match &codes[0] {
            Code::Open {
                call,
                params,
                brace,
            } => {
                assert_eq!(call.name.name, "each");
                assert_eq!(params.len(), 2);
                assert_eq!(params[1].name, "v");
                assert!(!brace);
            }
            _ => panic!("expected block opener"),
        }
    }

    #[test]
    fn parse_brace_block() {
        let codes = codes("3.times { |i|").unwrap();
        assert!(matches!(&codes[0], Code::Open { brace: true, .. }));
        let codes = self::codes("}").unwrap();
        assert!(matches!(&codes[0], Code::CloseBrace));
    }

    #[test]
    fn parse_buffer_writes() {
        let codes = codes("_erbout.concat(\"a\"); _erbout << b << \"c\"").unwrap();
        assert_eq!(codes.len(), 3);
        assert!(codes.iter().all(|c| matches!(c, Code::Emit(_))));
    }

    #[test]
    fn parse_buffer_setup() {
        let codes = codes("_erbout = +''; _erbout.force_encoding(\"UTF-8\") << a").unwrap();
        assert!(matches!(codes[0], Code::ResetBuffer));
        assert!(matches!(&codes[1], Code::ForceEncoding(enc) if enc == "UTF-8"));
        assert!(matches!(codes[2], Code::Emit(_)));
        assert_eq!(codes.len(), 3);
    }

    #[test]
    fn parse_err_force_encoding_not_a_name() {
        let err = codes("_erbout.force_encoding(enc)").unwrap_err();
        assert_eq!(err.message(), "expected encoding name");
    }

    #[test]
    fn parse_tag_call_with_keywords() {
        let expr = expr("f.entry(title: \"Name\", :field => 'name')").unwrap();
        match expr {
            ast::Expr::Call(call) => {
                let args = call.args.unwrap();
                assert!(args.positional.is_empty());
                let keys: Vec<_> = args.keywords.iter().map(|(k, _)| k.as_str()).collect();
                assert_eq!(keys, ["title", "field"]);
            }
            _ => panic!("expected call"),
        }
    }

    #[test]
    fn parse_interpolation() {
        let expr = expr(r#""Hello #{user["name"]}!\n""#).unwrap();
        match expr {
            ast::Expr::Interp(interp) => {
                assert_eq!(interp.parts.len(), 3);
                assert!(matches!(&interp.parts[0], ast::Part::Str(s) if s == "Hello "));
                assert!(matches!(&interp.parts[1], ast::Part::Expr(ast::Expr::Index(_))));
                assert!(matches!(&interp.parts[2], ast::Part::Str(s) if s == "!\n"));
            }
            _ => panic!("expected interpolation"),
        }
    }

    #[test]
    fn parse_precedence() {
        let expr = expr("!a || b && c == 1 + 2").unwrap();
        match expr {
            ast::Expr::Binary(bin) => {
                assert_eq!(bin.op, ast::BinOp::Or);
                assert!(matches!(*bin.lhs, ast::Expr::Not(_)));
                assert!(matches!(&*bin.rhs, ast::Expr::Binary(b) if b.op == ast::BinOp::And));
            }
            _ => panic!("expected binary"),
        }
    }

    #[test]
    fn parse_negative_literal() {
        let expr = expr("-5").unwrap();
        assert!(matches!(
            expr,
            ast::Expr::Literal(ast::Literal {
                value: Value::Integer(-5),
                ..
            })
        ));
    }

    #[test]
    fn parse_attrs_returns_offset() {
        let source = "%a{ href: url, \"data-x\" => 1 } text";
        let (entries, end) = Parser::new(source, 2..source.len(), "haml_buffer")
            .parse_attrs()
            .unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(&source[end..], " text");
    }

    #[test]
    fn parse_err_assign_to_call() {
        let err = codes("a.b = 1").unwrap_err();
        assert_eq!(err.message(), "expected variable name before `=`");
    }

    #[test]
    fn parse_err_trailing_tokens() {
        let err = codes("a b").unwrap_err();
        assert_eq!(
            format!("{err:#}"),
            "
   |
 1 | a b
   |   ^ expected end of statement, found identifier
"
        );
    }

    #[test]
    fn parse_err_unknown_escape() {
        let err = expr(r#""\q""#).unwrap_err();
        assert_eq!(err.message(), "unknown escape character");
    }
}
