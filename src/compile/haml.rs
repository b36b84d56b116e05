//! The Haml front-end.
//!
//! Haml is line oriented and nesting is expressed by indentation. Every line
//! is translated to text, output expressions and code fragments and fed to
//! the builder. Blocks opened by `-` lines are closed when the indentation
//! returns to the level of the line that opened them, unless the next line is
//! an `else` or `elsif` clause continuing the same `if` statement.

use crate::compile::build::Builder;
use crate::compile::parse::{into_string_expr, Code, Parser};
use crate::types::ast;
use crate::types::options::HamlOptions;
use crate::types::span::Span;
use crate::{Error, Result, Value};

/// Elements that never have content or a closing tag.
const VOID: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

#[derive(Clone, Copy)]
#[cfg_attr(internal_debug, derive(Debug))]
struct Line {
    /// The width of the leading whitespace.
    indent: usize,
    /// The line after the indentation, without the line break.
    span: Span,
}

#[cfg_attr(internal_debug, derive(Debug))]
struct HamlParser<'a> {
    source: &'a str,
    buffer: &'a str,
    lines: Vec<Line>,
    pos: usize,
    builder: Builder<'a>,
}

pub fn parse_template(source: &str, options: &HamlOptions) -> Result<ast::Template> {
    let mut parser = HamlParser {
        source,
        buffer: options.buffer(),
        lines: lines(source),
        pos: 0,
        builder: Builder::new(source),
    };
    parser.parse_children(None)?;
    parser.builder.finish()
}

/// Splits the source into non-blank lines.
fn lines(source: &str) -> Vec<Line> {
    let mut lines = Vec::new();
    let mut offset = 0;
    for raw in source.split_inclusive('\n') {
        let line = raw.trim_end_matches(['\n', '\r']);
        let content = line.trim_start_matches([' ', '\t']);
        let indent = line.len() - content.len();
        if !content.trim().is_empty() {
            let m = offset + indent;
            lines.push(Line {
                indent,
                span: Span::from(m..m + content.trim_end().len()),
            });
        }
        offset += raw.len();
    }
    lines
}

impl<'a> HamlParser<'a> {
    /// Parses the lines nested below a line with the given indentation, or all
    /// lines when there is no parent.
    fn parse_children(&mut self, parent: Option<usize>) -> Result<()> {
        let level = match self.lines.get(self.pos) {
            Some(line) if parent.map_or(true, |p| line.indent > p) => line.indent,
            _ => return Ok(()),
        };
        while let Some(&line) = self.lines.get(self.pos) {
            if parent.map_or(false, |p| line.indent <= p) {
                break;
            }
            if line.indent != level {
                return Err(Error::syntax(
                    "inconsistent indentation",
                    self.source,
                    line.span.m - line.indent..line.span.m,
                ));
            }
            self.pos += 1;
            self.parse_line(line)?;
        }
        Ok(())
    }

    fn parse_line(&mut self, line: Line) -> Result<()> {
        let source = self.source;
        let content = &source[line.span];
        let m = line.span.m;
        let n = line.span.n;

        match content.as_bytes() {
            [b'-', b'#', ..] => {
                self.skip_children(line);
                Ok(())
            }

            [b'-', ..] => self.parse_code(line, m + 1),

            [b'=', ..] => self.parse_output(line, m + 1),
            [b'!' | b'&', b'=', ..] => self.parse_output(line, m + 2),

            [b'!', b'!', b'!', ..] => {
                let doctype = match content[3..].trim() {
                    "XML" | "xml" => "<?xml version='1.0' encoding='utf-8' ?>\n",
                    _ => "<!DOCTYPE html>\n",
                };
                self.builder.raw(doctype);
                self.expect_no_children(line)
            }

            [b'/', ..] => {
                let text = content[1..].trim();
                if self.has_children(line) {
                    self.builder.raw("<!--\n");
                    self.parse_children(Some(line.indent))?;
                    self.builder.raw("-->\n");
                } else {
                    self.builder.raw(&format!("<!-- {text} -->\n"));
                }
                Ok(())
            }

            [b'\\', ..] => self.parse_plain(line, Span::from(m + 1..n)),

            [b'%', ..] => self.parse_element(line),
            [b'.' | b'#', c, ..] if is_name(*c as char) => self.parse_element(line),

            _ => self.parse_plain(line, line.span),
        }
    }

    /// A `-` line, nested lines form the body of the block it opens.
    fn parse_code(&mut self, line: Line, m: usize) -> Result<()> {
        let codes = Parser::new(self.source, m..line.span.n, self.buffer).parse_codes()?;
        let opens = match codes.last() {
            Some((Code::If { .. } | Code::Elsif(_) | Code::Else, _)) => Some(true),
            Some((Code::Open { .. }, _)) => Some(false),
            _ => None,
        };
        for (code, span) in codes {
            self.builder.code(code, span)?;
        }
        match opens {
            Some(is_if) => {
                self.parse_children(Some(line.indent))?;
                if !(is_if && self.is_continuation(line.indent)) {
                    self.builder.close(line.span, "unexpected end of block")?;
                }
                Ok(())
            }
            None => self.expect_no_children(line),
        }
    }

    /// A `=` line.
    fn parse_output(&mut self, line: Line, m: usize) -> Result<()> {
        let (code, span) = Parser::new(self.source, m..line.span.n, self.buffer).parse_output()?;
        match code {
            Code::Open { .. } => {
                self.builder.code(code, span)?;
                self.parse_children(Some(line.indent))?;
                self.builder.close(line.span, "unexpected end of block")
            }
            code => {
                self.builder.code(code, span)?;
                self.builder.raw("\n");
                self.expect_no_children(line)
            }
        }
    }

    /// Plain text with interpolation.
    fn parse_plain(&mut self, line: Line, span: Span) -> Result<()> {
        let parts = Parser::new(self.source, span, self.buffer).parse_text(span)?;
        self.builder.parts(parts);
        self.builder.raw("\n");
        self.expect_no_children(line)
    }

    /// An element, e.g. `%a.link#home{ href: url }= title`.
    fn parse_element(&mut self, line: Line) -> Result<()> {
        let source = self.source;
        let n = line.span.n;
        let mut i = line.span.m;

        let name = if source[i..].starts_with('%') {
            let j = self.scan_name(i + 1, n);
            if j == i + 1 {
                return Err(Error::syntax("invalid element name", source, i..i + 1));
            }
            let name = &source[i + 1..j];
            i = j;
            name
        } else {
            "div"
        };

        let mut classes = Vec::new();
        let mut id = None;
        while let Some(c @ ('.' | '#')) = source[i..n].chars().next() {
            let j = self.scan_name(i + 1, n);
            if j == i + 1 {
                return Err(Error::syntax("expected class or id name", source, i..i + 1));
            }
            if c == '.' {
                classes.push(&source[i + 1..j]);
            } else {
                id = Some(&source[i + 1..j]);
            }
            i = j;
        }

        let mut attrs = Vec::new();
        loop {
            let (entries, j) = match source[i..n].chars().next() {
                Some('{') => Parser::new(source, i..n, self.buffer).parse_attrs()?,
                Some('(') => self.parse_html_attrs(i, n)?,
                _ => break,
            };
            attrs.extend(entries);
            i = j;
        }

        let self_closing = source[i..n].starts_with('/');
        if self_closing {
            i += 1;
        }

        self.builder.raw(&format!("<{name}"));
        self.static_attrs(&classes, id, &mut attrs);
        for (key, expr) in attrs {
            match expr {
                ast::Expr::Literal(ast::Literal { value, .. }) => match value {
                    Value::None | Value::Bool(false) => {}
                    Value::Bool(true) => self.builder.raw(&format!(" {key}")),
                    Value::String(s) => self.builder.raw(&format!(" {key}='{s}'")),
                    Value::Integer(n) => self.builder.raw(&format!(" {key}='{n}'")),
                    Value::Float(n) => self.builder.raw(&format!(" {key}='{n}'")),
                    value => {
                        let span = Span::from(i..i);
                        self.builder.attr(key, ast::Expr::Literal(ast::Literal { value, span }))
                    }
                },
                expr => self.builder.attr(key, expr),
            }
        }

        let rest = &source[i..n];
        if self_closing || VOID.contains(&name) {
            if !rest.trim().is_empty() || self.has_children(line) {
                return Err(Error::syntax(
                    "illegal nesting: self-closing elements can't have content",
                    source,
                    line.span,
                ));
            }
            self.builder.raw(">\n");
            return Ok(());
        }

        let inline_expr = match rest.as_bytes() {
            [b'=', ..] => Some(i + 1),
            [b'!' | b'&', b'=', ..] => Some(i + 2),
            _ => None,
        };

        if let Some(m) = inline_expr {
            let (code, span) = Parser::new(source, m..n, self.buffer).parse_output()?;
            let expr = match code {
                Code::Emit(expr) => expr,
                _ => {
                    return Err(Error::syntax("unexpected block", source, span));
                }
            };
            self.builder.raw(">");
            self.builder.emit(expr);
            self.builder.raw(&format!("</{name}>\n"));
            return self.expect_no_children(line);
        }

        let text = rest.trim_start();
        if !text.is_empty() {
            let m = n - text.len();
            let span = Span::from(m..n);
            let parts = Parser::new(source, span, self.buffer).parse_text(span)?;
            self.builder.raw(">");
            self.builder.parts(parts);
            self.builder.raw(&format!("</{name}>\n"));
            return self.expect_no_children(line);
        }

        if self.has_children(line) {
            self.builder.raw(">\n");
            self.parse_children(Some(line.indent))?;
            self.builder.raw(&format!("</{name}>\n"));
        } else {
            self.builder.raw(&format!("></{name}>\n"));
        }
        Ok(())
    }

    /// Writes the `.class` and `#id` shortcuts, merging them with a dynamic
    /// `class` or `id` attribute if there is one.
    fn static_attrs(&mut self, classes: &[&str], id: Option<&str>, attrs: &mut Vec<(String, ast::Expr)>) {
        if !classes.is_empty() {
            let static_classes = classes.join(" ");
            match attrs.iter().position(|(k, _)| k == "class") {
                Some(idx) => {
                    let (_, expr) = attrs.remove(idx);
                    let span = expr.span();
                    let parts = vec![
                        ast::Part::Str(format!("{static_classes} ")),
                        ast::Part::Expr(expr),
                    ];
                    self.builder.attr("class".to_owned(), into_string_expr(parts, span));
                }
                None => self.builder.raw(&format!(" class='{static_classes}'")),
            }
        }
        if let Some(id) = id {
            if !attrs.iter().any(|(k, _)| k == "id") {
                self.builder.raw(&format!(" id='{id}'"));
            }
        }
    }

    /// Returns whether the next line continues the `if` statement at the
    /// given indentation.
    fn is_continuation(&self, indent: usize) -> bool {
        let line = match self.lines.get(self.pos) {
            Some(line) if line.indent == indent => line,
            _ => return false,
        };
        let code = match self.source[line.span].strip_prefix('-') {
            Some(code) => code.trim_start(),
            None => return false,
        };
        ["else", "elsif"].iter().any(|kw| {
            code.strip_prefix(kw)
                .map_or(false, |rest| !rest.starts_with(is_name))
        })
    }

    fn has_children(&self, line: Line) -> bool {
        self.lines
            .get(self.pos)
            .map_or(false, |next| next.indent > line.indent)
    }

    fn skip_children(&mut self, line: Line) {
        while self.has_children(line) {
            self.pos += 1;
        }
    }

    fn expect_no_children(&self, line: Line) -> Result<()> {
        match self.lines.get(self.pos) {
            Some(next) if next.indent > line.indent => Err(Error::syntax(
                "illegal nesting: content can't be both given on the same line and nested",
                self.source,
                next.span,
            )),
            _ => Ok(()),
        }
    }

    /// Parses HTML style attributes, e.g. `(href=url title="#{t}" checked)`.
    ///
    /// Returns the entries and the offset just after the closing parenthesis.
    fn parse_html_attrs(&self, m: usize, n: usize) -> Result<(Vec<(String, ast::Expr)>, usize)> {
        let source = self.source;
        let skip_ws = |i: usize| {
            source[i..n]
                .find(|c: char| !c.is_whitespace())
                .map_or(n, |d| i + d)
        };

        let mut entries = Vec::new();
        let mut i = skip_ws(m + 1);
        loop {
            match source[i..n].chars().next() {
                Some(')') => return Ok((entries, i + 1)),
                None => return Err(Error::syntax("unclosed attribute list", source, m..n)),
                Some(_) => {}
            }

            let j = self.scan_name(i, n);
            if j == i {
                return Err(Error::syntax("expected attribute name", source, i..i + 1));
            }
            let key = source[i..j].to_owned();
            i = skip_ws(j);

            if !source[i..n].starts_with('=') {
                let span = Span::from(m..j);
                let value = ast::Expr::Literal(ast::Literal { value: Value::Bool(true), span });
                entries.push((key, value));
                continue;
            }
            i = skip_ws(i + 1);

            let end = match source[i..n].chars().next() {
                Some(q @ ('\'' | '"')) => find_quote_end(source, i + 1, n, q)
                    .ok_or_else(|| Error::syntax("unclosed string", source, i..n))?,
                Some(c) if c.is_alphabetic() || c == '_' => source[i..n]
                    .find(|c: char| !(c.is_alphanumeric() || c == '_'))
                    .map_or(n, |d| i + d),
                _ => return Err(Error::syntax("expected attribute value", source, i..i + 1)),
            };
            let value = Parser::new(source, i..end, self.buffer).parse_only_expr()?;
            entries.push((key, value));
            i = skip_ws(end);
        }
    }

    fn scan_name(&self, i: usize, n: usize) -> usize {
        self.source[i..n]
            .find(|c: char| !is_name(c))
            .map_or(n, |d| i + d)
    }
}

fn is_name(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | ':')
}

/// Returns the offset just after the quote that closes a string starting at
/// `i`, backslashes escape the next character.
fn find_quote_end(source: &str, i: usize, n: usize, quote: char) -> Option<usize> {
    let mut escaped = false;
    for (d, c) in source[i..n].char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' => escaped = true,
            c if c == quote => return Some(i + d + 1),
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lines_skips_blank() {
        let source = "%p\n\n  text\r\n";
        let lines = lines(source);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1].indent, 2);
        assert_eq!(&source[lines[1].span], "text");
    }

    #[test]
    fn parse_err_inconsistent_indentation() {
        let err = parse_template("%div\n    %p\n  %p", &HamlOptions::default()).unwrap_err();
        assert_eq!(err.message(), "inconsistent indentation");
    }

    #[test]
    fn parse_err_illegal_nesting() {
        let err = parse_template("%p text\n  %b", &HamlOptions::default()).unwrap_err();
        assert_eq!(
            err.message(),
            "illegal nesting: content can't be both given on the same line and nested"
        );
    }

    #[test]
    fn parse_err_html_attrs() {
        let options = HamlOptions::default();
        let err = parse_template("%p(a='1'", &options).unwrap_err();
        assert_eq!(err.message(), "unclosed attribute list");
        let err = parse_template("%p(a=1)", &options).unwrap_err();
        assert_eq!(err.message(), "expected attribute value");
        let err = parse_template("%p(a='1)", &options).unwrap_err();
        assert_eq!(err.message(), "unclosed string");
    }

    #[test]
    fn parse_else_continues_if() {
        let template =
            parse_template("- if a\n  x\n- else\n  y\nz", &HamlOptions::default()).unwrap();
        match &template.scope.stmts[..] {
            [ast::Stmt::IfElse(if_else), ast::Stmt::Raw(z)] => {
                assert!(if_else.else_branch.is_some());
                assert_eq!(z, "z\n");
            }
            _ => panic!("expected if followed by text"),
        }
    }
}
