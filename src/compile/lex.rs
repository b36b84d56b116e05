use crate::types::span::Span;
use crate::{Error, Result};

/// A lexer that tokenizes embedded code into distinct chunks so that the
/// parser doesn't have to operate on raw text.
///
/// The lexer only ever looks at a range of the template source, e.g. the
/// inside of a `<% %>` tag or the remainder of a Haml line. All spans it
/// produces are offsets into the full template source so that errors point to
/// the right place.
///
/// The lexer is implemented as a fallible iterator. The parser should
/// repeatedly call the [`.next()?`][Lexer::next] method to return the next
/// token until [`None`] is returned.
#[cfg_attr(internal_debug, derive(Debug))]
pub struct Lexer<'source> {
    /// The original template source.
    pub source: &'source str,

    /// A cursor over the template source.
    cursor: usize,

    /// The end of the range being tokenized.
    end: usize,
}

/// The unit yielded by the lexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    /// `.`
    Dot,
    /// `,`
    Comma,
    /// `;`
    Semi,
    /// A line break
    Newline,
    /// `(`
    OpenParen,
    /// `)`
    CloseParen,
    /// `[`
    OpenBracket,
    /// `]`
    CloseBracket,
    /// `{`
    OpenBrace,
    /// `}`
    CloseBrace,
    /// `|`
    Pipe,
    /// `=`
    Assign,
    /// `=>`
    Arrow,
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `!`
    Not,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `<<`
    Shl,
    /// `+`
    Plus,
    /// `-`
    Minus,
    /// `&&`
    And,
    /// `||`
    Or,
    /// A keyword like `if` or `end`
    Keyword,
    /// A variable or method name, e.g. `user` or `empty?`
    Ident,
    /// A hash key written as a label, e.g. `title:`
    Label,
    /// A symbol, e.g. `:title`
    Symbol,
    /// An integer or float literal, e.g. `19` or `0.5`
    Number,
    /// A double quoted string literal, e.g. `"Hello #{name}!\n"`
    String,
    /// A single quoted string literal, e.g. `'Hello'`
    RawString,
}

impl<'source> Lexer<'source> {
    /// Construct a new lexer over the given range of the source.
    pub fn new(source: &'source str, span: impl Into<Span>) -> Self {
        let span = span.into();
        Self {
            source,
            cursor: span.m,
            end: span.n,
        }
    }

    /// Returns the offset just after the last token returned.
    pub fn offset(&self) -> usize {
        self.cursor
    }

    /// Returns the next token and span.
    pub fn next(&mut self) -> Result<Option<(Token, Span)>> {
        self.skip_whitespace();

        let i = self.cursor;
        let mut iter = self.source[i..self.end]
            .char_indices()
            .map(|(d, c)| (i + d, c));

        let c = match iter.next() {
            Some((_, c)) => c,
            None => return Ok(None),
        };

        let lookahead = iter.clone().next().map(|(_, c)| c);

        let (tk, j) = match (c, lookahead) {
            ('=', Some('=')) => (Token::Eq, i + 2),
            ('=', Some('>')) => (Token::Arrow, i + 2),
            ('!', Some('=')) => (Token::Ne, i + 2),
            ('<', Some('=')) => (Token::Le, i + 2),
            ('<', Some('<')) => (Token::Shl, i + 2),
            ('>', Some('=')) => (Token::Ge, i + 2),
            ('&', Some('&')) => (Token::And, i + 2),
            ('|', Some('|')) => (Token::Or, i + 2),
            ('.', _) => (Token::Dot, i + 1),
            (',', _) => (Token::Comma, i + 1),
            (';', _) => (Token::Semi, i + 1),
            ('\n', _) => (Token::Newline, i + 1),
            ('(', _) => (Token::OpenParen, i + 1),
            (')', _) => (Token::CloseParen, i + 1),
            ('[', _) => (Token::OpenBracket, i + 1),
            (']', _) => (Token::CloseBracket, i + 1),
            ('{', _) => (Token::OpenBrace, i + 1),
            ('}', _) => (Token::CloseBrace, i + 1),
            ('|', _) => (Token::Pipe, i + 1),
            ('=', _) => (Token::Assign, i + 1),
            ('!', _) => (Token::Not, i + 1),
            ('<', _) => (Token::Lt, i + 1),
            ('>', _) => (Token::Gt, i + 1),
            ('+', _) => (Token::Plus, i + 1),
            ('-', _) => (Token::Minus, i + 1),
            (':', Some(c)) if is_ident_start(c) => {
                iter.next();
                (Token::Symbol, self.lex_while(iter, is_ident))
            }
            ('"', _) => (Token::String, self.lex_string(iter, '"', i)?),
            ('\'', _) => (Token::RawString, self.lex_string(iter, '\'', i)?),
            (c, _) if c.is_ascii_digit() => (Token::Number, self.lex_number(iter)),
            (c, _) if is_ident_start(c) => self.lex_ident(iter, i),
            _ => {
                let j = i + c.len_utf8();
                return Err(Error::syntax("unexpected character", self.source, i..j));
            }
        };

        self.cursor = j;
        Ok(Some((tk, Span::from(i..j))))
    }

    /// Advances the cursor past spaces, tabs and `#` comments.
    ///
    /// Line breaks are tokens because they separate statements.
    fn skip_whitespace(&mut self) {
        let mut in_comment = false;
        for (d, c) in self.source[self.cursor..self.end].char_indices() {
            match c {
                '\n' => {
                    self.cursor += d;
                    return;
                }
                '#' => in_comment = true,
                ' ' | '\t' | '\r' => {}
                _ if in_comment => {}
                _ => {
                    self.cursor += d;
                    return;
                }
            }
        }
        self.cursor = self.end;
    }

    fn lex_ident<I>(&mut self, iter: I, i: usize) -> (Token, usize)
    where
        I: Iterator<Item = (usize, char)> + Clone,
    {
        let mut j = self.lex_while(iter, is_ident);
        let rest = &self.source[j..self.end];
        let mut chars = rest.chars();
        match (chars.next(), chars.next()) {
            // `empty?` and `save!` but not `a!=b`
            (Some('?'), _) => j += 1,
            (Some('!'), next) if next != Some('=') => j += 1,
            // `title: value` but not `A::B`
            (Some(':'), next) if next != Some(':') => return (Token::Label, j + 1),
            _ => {}
        }
        let tk = if Keyword::from_str(&self.source[i..j]).is_some() {
            Token::Keyword
        } else {
            Token::Ident
        };
        (tk, j)
    }

    fn lex_number<I>(&mut self, iter: I) -> usize
    where
        I: Iterator<Item = (usize, char)> + Clone,
    {
        let j = self.lex_while(iter, |c| c.is_ascii_digit() || c == '_');
        // A fraction must start with a digit so that `3.times` is a call.
        let rest = &self.source[j..self.end];
        let mut chars = rest.chars();
        match (chars.next(), chars.next()) {
            (Some('.'), Some(d)) if d.is_ascii_digit() => {
                let k = rest[1..]
                    .find(|c: char| !(c.is_ascii_digit() || c == '_'))
                    .map(|k| k + 1)
                    .unwrap_or(rest.len());
                j + k
            }
            _ => j,
        }
    }

    /// Lexes a quoted string, `#{..}` interpolations are skipped over as a
    /// whole so that they may contain quotes and braces.
    fn lex_string<I>(&mut self, mut iter: I, quote: char, i: usize) -> Result<usize>
    where
        I: Iterator<Item = (usize, char)> + Clone,
    {
        let mut depth = 0usize;
        let mut inner: Option<char> = None;
        let mut escaped = false;
        loop {
            let (j, c) = match iter.next() {
                Some(next) => next,
                None => return Err(self.err_undelimited_string(i..self.end)),
            };
            if escaped {
                escaped = false;
                continue;
            }
            match (c, inner) {
                ('\\', _) => escaped = true,
                (c, Some(q)) if c == q => inner = None,
                (_, Some(_)) => {}
                ('"' | '\'', None) if depth > 0 => inner = Some(c),
                ('#', None) if quote == '"' && depth == 0 => {
                    if let Some((_, '{')) = iter.clone().next() {
                        iter.next();
                        depth = 1;
                    }
                }
                ('{', None) if depth > 0 => depth += 1,
                ('}', None) if depth > 0 => depth -= 1,
                (c, None) if c == quote => return Ok(j + 1),
                _ => {}
            }
        }
    }

    fn lex_while<I, P>(&mut self, mut iter: I, pred: P) -> usize
    where
        I: Iterator<Item = (usize, char)> + Clone,
        P: Fn(char) -> bool + Copy,
    {
        loop {
            match iter.clone().next() {
                Some((_, c)) if pred(c) => {
                    iter.next();
                }
                Some((j, _)) => return j,
                None => return self.end,
            }
        }
    }

    fn err_undelimited_string(&self, span: impl Into<Span>) -> Error {
        Error::syntax("undelimited string", self.source, span)
    }
}

/// A reserved word of the embedded code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    If,
    Unless,
    Elsif,
    Else,
    End,
    Do,
    Nil,
    True,
    False,
}

impl Keyword {
    pub fn from_str(s: &str) -> Option<Self> {
        let kw = match s {
            "if" => Self::If,
            "unless" => Self::Unless,
            "elsif" => Self::Elsif,
            "else" => Self::Else,
            "end" => Self::End,
            "do" => Self::Do,
            "nil" => Self::Nil,
            "true" => Self::True,
            "false" => Self::False,
            _ => return None,
        };
        Some(kw)
    }

    pub const fn human(&self) -> &'static str {
        match self {
            Self::If => "if",
            Self::Unless => "unless",
            Self::Elsif => "elsif",
            Self::Else => "else",
            Self::End => "end",
            Self::Do => "do",
            Self::Nil => "nil",
            Self::True => "true",
            Self::False => "false",
        }
    }
}

impl Token {
    /// Returns a human readable version of the token.
    pub fn human(&self) -> &'static str {
        match self {
            Self::Dot => "member access operator",
            Self::Comma => "comma",
            Self::Semi => "semicolon",
            Self::Newline => "newline",
            Self::OpenParen => "`(`",
            Self::CloseParen => "`)`",
            Self::OpenBracket => "`[`",
            Self::CloseBracket => "`]`",
            Self::OpenBrace => "`{`",
            Self::CloseBrace => "`}`",
            Self::Pipe => "pipe",
            Self::Assign => "`=`",
            Self::Arrow => "`=>`",
            Self::Eq => "`==`",
            Self::Ne => "`!=`",
            Self::Not => "`!`",
            Self::Lt => "`<`",
            Self::Le => "`<=`",
            Self::Gt => "`>`",
            Self::Ge => "`>=`",
            Self::Shl => "`<<`",
            Self::Plus => "`+`",
            Self::Minus => "`-`",
            Self::And => "`&&`",
            Self::Or => "`||`",
            Self::Keyword => "keyword",
            Self::Ident => "identifier",
            Self::Label => "label",
            Self::Symbol => "symbol",
            Self::Number => "number",
            Self::String => "string",
            Self::RawString => "string",
        }
    }
}

#[cfg(feature = "unicode")]
fn is_ident_start(c: char) -> bool {
    c == '_' || unicode_ident::is_xid_start(c)
}

#[cfg(feature = "unicode")]
fn is_ident(c: char) -> bool {
    unicode_ident::is_xid_continue(c)
}

#[cfg(not(feature = "unicode"))]
fn is_ident_start(c: char) -> bool {
    matches!(c, 'A'..='Z' | 'a'..='z' | '_')
}

#[cfg(not(feature = "unicode"))]
fn is_ident(c: char) -> bool {
    matches!(c, '0'..='9' | 'A'..='Z' | 'a'..='z' | '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(source: &str) -> Result<Vec<(Token, &str)>> {
        let mut lexer = Lexer::new(source, 0..source.len());
        let mut tokens = Vec::new();
        while let Some((tk, sp)) = lexer.next()? {
            tokens.push((tk, &source[sp]));
        }
        Ok(tokens)
    }

    #[test]
    fn lex_empty() {
        let tokens = lex("").unwrap();
        assert_eq!(tokens, []);
    }

    #[test]
    fn lex_call_with_block() {
        let tokens = lex("items.each do |item, i|").unwrap();
        assert_eq!(
            tokens,
            [
                (Token::Ident, "items"),
                (Token::Dot, "."),
                (Token::Ident, "each"),
                (Token::Keyword, "do"),
                (Token::Pipe, "|"),
                (Token::Ident, "item"),
                (Token::Comma, ","),
                (Token::Ident, "i"),
                (Token::Pipe, "|"),
            ]
        );
    }

    #[test]
    fn lex_operators() {
        let tokens = lex("a == b != c <= d << e >= f => g && h || !i = j").unwrap();
        let kinds: Vec<_> = tokens.into_iter().map(|(tk, _)| tk).collect();
        assert_eq!(
            kinds,
            [
                Token::Ident,
                Token::Eq,
                Token::Ident,
                Token::Ne,
                Token::Ident,
                Token::Le,
                Token::Ident,
                Token::Shl,
                Token::Ident,
                Token::Ge,
                Token::Ident,
                Token::Arrow,
                Token::Ident,
                Token::And,
                Token::Ident,
                Token::Or,
                Token::Not,
                Token::Ident,
                Token::Assign,
                Token::Ident,
            ]
        );
    }

    #[test]
    fn lex_labels_and_symbols() {
        let tokens = lex("f.entry(title: 'x', :field => 1)").unwrap();
        assert_eq!(
            tokens,
            [
                (Token::Ident, "f"),
                (Token::Dot, "."),
                (Token::Ident, "entry"),
                (Token::OpenParen, "("),
                (Token::Label, "title:"),
                (Token::RawString, "'x'"),
                (Token::Comma, ","),
                (Token::Symbol, ":field"),
                (Token::Arrow, "=>"),
                (Token::Number, "1"),
                (Token::CloseParen, ")"),
            ]
        );
    }

    #[test]
    fn lex_predicate_methods() {
        let tokens = lex("list.empty? && a!=b").unwrap();
        assert_eq!(
            tokens,
            [
                (Token::Ident, "list"),
                (Token::Dot, "."),
                (Token::Ident, "empty?"),
                (Token::And, "&&"),
                (Token::Ident, "a"),
                (Token::Ne, "!="),
                (Token::Ident, "b"),
            ]
        );
    }

    #[test]
    fn lex_numbers() {
        let tokens = lex("3.times 0.5 1_000").unwrap();
        assert_eq!(
            tokens,
            [
                (Token::Number, "3"),
                (Token::Dot, "."),
                (Token::Ident, "times"),
                (Token::Number, "0.5"),
                (Token::Number, "1_000"),
            ]
        );
    }

    #[test]
    fn lex_string_with_interpolation() {
        let tokens = lex(r#""a #{h["}"]} b" 'c'"#).unwrap();
        assert_eq!(
            tokens,
            [
                (Token::String, r#""a #{h["}"]} b""#),
                (Token::RawString, "'c'"),
            ]
        );
    }

    #[test]
    fn lex_newlines_and_comments() {
        let tokens = lex("x = 1 # one\ny = 2").unwrap();
        assert_eq!(
            tokens,
            [
                (Token::Ident, "x"),
                (Token::Assign, "="),
                (Token::Number, "1"),
                (Token::Newline, "\n"),
                (Token::Ident, "y"),
                (Token::Assign, "="),
                (Token::Number, "2"),
            ]
        );
    }

    #[test]
    fn lex_sub_range_spans_are_absolute() {
        let source = "<%= name %>";
        let mut lexer = Lexer::new(source, 3..9);
        let (tk, span) = lexer.next().unwrap().unwrap();
        assert_eq!(tk, Token::Ident);
        assert_eq!(span, Span::from(4..8));
        assert!(lexer.next().unwrap().is_none());
    }

    #[test]
    fn lex_err_undelimited_string() {
        let err = lex("\"hello").unwrap_err();
        assert_eq!(
            format!("{err:#}"),
            r#"
   |
 1 | "hello
   | ^^^^^^ undelimited string
"#
        );
    }

    #[test]
    fn lex_err_unexpected_character() {
        let err = lex("a @ b").unwrap_err();
        assert_eq!(err.message(), "unexpected character");
    }
}
