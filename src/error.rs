use std::cmp::max;
use std::fmt;
use std::io;

use crate::types::span::Span;

/// An error that can occur during template compilation, template evaluation
/// or a remote method call.
///
/// Every failure that happens while a template is running is reported as
/// [`ErrorKind::Evaluation`]. The failure that caused it is available through
/// [`.cause()`][Error::cause] and its kind through
/// [`.root_kind()`][Error::root_kind].
#[derive(Clone)]
pub struct Error {
    kind: ErrorKind,
    msg: String,
    span: Option<(String, Span)>,
    cause: Option<Box<Error>>,
}

/// The category of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The template source could not be compiled.
    Syntax,
    /// An identifier has no local binding and no context variable.
    SymbolNotFound,
    /// The tag library failed to perform a tag invocation.
    TagInvocation,
    /// A failure during template execution.
    Evaluation,
    /// Writing to the output failed.
    Io,
    /// A remote method call failed.
    Remote,
    /// A failure reported by host code, e.g. a tag library or helper.
    Custom,
}

impl Error {
    /// Construct a new error reported by host code.
    pub fn custom(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Custom, msg)
    }

    pub(crate) fn new(kind: ErrorKind, msg: impl Into<String>) -> Self {
        Self {
            kind,
            msg: msg.into(),
            span: None,
            cause: None,
        }
    }

    pub(crate) fn spanned(
        kind: ErrorKind,
        msg: impl Into<String>,
        source: &str,
        span: impl Into<Span>,
    ) -> Self {
        Self {
            kind,
            msg: msg.into(),
            span: Some((source.to_owned(), span.into())),
            cause: None,
        }
    }

    /// Construct a new syntax error.
    pub(crate) fn syntax(msg: impl Into<String>, source: &str, span: impl Into<Span>) -> Self {
        Self::spanned(ErrorKind::Syntax, msg, source, span)
    }

    /// Construct a new error for an identifier that could not be resolved.
    pub(crate) fn symbol_not_found(name: &str, source: &str, span: impl Into<Span>) -> Self {
        Self::spanned(
            ErrorKind::SymbolNotFound,
            format!("undefined local variable or method `{name}`"),
            source,
            span,
        )
    }

    /// Construct a new error raised by the evaluated template logic.
    pub(crate) fn render(msg: impl Into<String>, source: &str, span: impl Into<Span>) -> Self {
        Self::spanned(ErrorKind::Evaluation, msg, source, span)
    }

    /// Construct a new error from a value formatter failure.
    pub(crate) fn format(err: crate::fmt::Error, source: &str, span: impl Into<Span>) -> Self {
        let msg = err
            .message()
            .unwrap_or_else(|| String::from("format error"));
        Self::spanned(ErrorKind::Evaluation, msg, source, span)
    }

    /// Wrap a failure reported by the tag library, located at the tag call.
    ///
    /// Failures that already have a location, such as the ones raised while
    /// running the tag body, are returned as they are.
    pub(crate) fn tag_invocation(cause: Error, source: &str, span: impl Into<Span>) -> Self {
        if cause.span.is_some() {
            return cause;
        }
        Self {
            kind: ErrorKind::TagInvocation,
            msg: cause.msg.clone(),
            span: Some((source.to_owned(), span.into())),
            cause: Some(Box::new(cause)),
        }
    }

    /// Wrap any failure that happened while running a template.
    pub(crate) fn evaluation(cause: Error) -> Self {
        Self {
            kind: ErrorKind::Evaluation,
            msg: cause.msg.clone(),
            span: cause.span.clone(),
            cause: Some(Box::new(cause)),
        }
    }

    /// Construct a new remote method call error.
    pub(crate) fn remote(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Remote, msg)
    }

    /// Attach the source location if the error does not have one yet.
    pub(crate) fn enrich(mut self, source: &str, span: impl Into<Span>) -> Self {
        if self.span.is_none() {
            self.span = Some((source.to_owned(), span.into()));
        }
        self
    }

    /// Returns the category of this error.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the category of the innermost cause of this error.
    pub fn root_kind(&self) -> ErrorKind {
        let mut err = self;
        while let Some(cause) = &err.cause {
            err = cause;
        }
        err.kind
    }

    /// Returns the error that caused this one, if any.
    pub fn cause(&self) -> Option<&Error> {
        self.cause.as_deref()
    }

    /// Returns the error message without any source location.
    pub fn message(&self) -> &str {
        &self.msg
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Self::new(ErrorKind::Io, format!("io error: {err}"))
    }
}

impl From<fmt::Error> for Error {
    fn from(_: fmt::Error) -> Self {
        Self::new(ErrorKind::Io, "format error")
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::new(ErrorKind::Remote, format!("json error: {err}"))
    }
}

#[cfg(feature = "http")]
impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Self::new(ErrorKind::Remote, format!("http error: {err}"))
    }
}

impl From<String> for Error {
    fn from(msg: String) -> Self {
        Self::custom(msg)
    }
}

impl From<&str> for Error {
    fn from(msg: &str) -> Self {
        Self::custom(msg)
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.span {
            Some((source, span)) => fmt_pretty(&self.msg, source, *span, f),
            None => write!(f, "{}", self.msg),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.span {
            Some((source, span)) => {
                if f.alternate() {
                    fmt_pretty(&self.msg, source, *span, f)
                } else {
                    write!(f, "{} between bytes {} and {}", self.msg, span.m, span.n)
                }
            }
            None => write!(f, "{}", self.msg),
        }
    }
}

fn fmt_pretty(msg: &str, source: &str, span: Span, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let lines: Vec<_> = source.split_terminator('\n').collect();
    let (line, col) = to_line_col(&lines, span.m);
    let width = max(1, width(&source[span]));
    let code = lines
        .get(line)
        .or_else(|| lines.last())
        .copied()
        .unwrap_or_default();

    let num = (line + 1).to_string();
    let pad = width_of(&num);
    let pipe = "|";
    let underline = "^".repeat(width);

    write!(
        f,
        "\n \
        {0:pad$} {pipe}\n \
        {num:>} {pipe} {code}\n \
        {0:pad$} {pipe} {underline:>width$} {msg}\n",
        "",
        pad = pad,
        pipe = pipe,
        num = num,
        code = code,
        underline = underline,
        width = col + width,
        msg = msg
    )
}

fn to_line_col(lines: &[&str], offset: usize) -> (usize, usize) {
    let mut n = 0;
    for (i, line) in lines.iter().enumerate() {
        let len = line.len() + 1;
        if n + len > offset {
            return (i, width(&line[..offset - n]));
        }
        n += len;
    }
    (lines.len(), lines.last().map(|l| width(l)).unwrap_or(0))
}

fn width(s: &str) -> usize {
    // Only the first line of a multi-line span is underlined.
    width_of(s.split('\n').next().unwrap_or_default())
}

#[cfg(feature = "unicode")]
fn width_of(s: &str) -> usize {
    unicode_width::UnicodeWidthStr::width(s)
}

#[cfg(not(feature = "unicode"))]
fn width_of(s: &str) -> usize {
    s.chars().count()
}
