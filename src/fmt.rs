//! Output formatting.
//!
//! Every `<%= expr %>` and `%p= expr` writes `expr.to_s` to the accumulator.
//! The conversion is done by the engine's default formatter, [`default`],
//! which prints values the way Ruby's `to_s` does. It can be replaced with
//! [`Engine::set_default_formatter`][crate::Engine::set_default_formatter],
//! for example to fix the precision of floats.
//!
//! ```
//! use std::fmt::Write;
//! use viewbridge::{fmt, Engine, Syntax, Value};
//!
//! let mut engine = Engine::new();
//! engine.set_default_formatter(|f, value| match value {
//!     Value::Float(n) => write!(f, "{n:.3}").map_err(fmt::Error::from),
//!     v => fmt::default(f, v),
//! });
//!
//! let template = engine.compile(Syntax::Erb, "<%= 2.5 %> <%= 7 %>")?;
//! assert_eq!(template.render(&Value::None)?, "2.500 7");
//! # Ok::<(), viewbridge::Error>(())
//! ```

use std::fmt;
use std::fmt::Write;

use crate::Value;

pub(crate) type FormatFn = dyn Fn(&mut Formatter<'_>, &Value) -> Result + Sync + Send + 'static;

/// Where a formatter writes its text.
pub struct Formatter<'a> {
    buf: &'a mut (dyn fmt::Write + 'a),
}

/// What a formatter returns.
pub type Result = std::result::Result<(), Error>;

/// A formatter failure, the message becomes the render error message.
#[derive(Debug, Clone)]
pub struct Error(Option<String>);

impl<'a> Formatter<'a> {
    pub(crate) fn with_string(buf: &'a mut String) -> Self {
        Self { buf }
    }
}

impl fmt::Write for Formatter<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.buf.write_str(s)
    }
}

impl Error {
    pub(crate) fn message(self) -> Option<String> {
        self.0
    }
}

impl std::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_deref().unwrap_or("format error"))
    }
}

impl From<&str> for Error {
    fn from(msg: &str) -> Self {
        Self(Some(msg.to_owned()))
    }
}

impl From<String> for Error {
    fn from(msg: String) -> Self {
        Self(Some(msg))
    }
}

impl From<fmt::Error> for Error {
    fn from(_: fmt::Error) -> Self {
        Self(None)
    }
}

/// Formats a value like Ruby's `to_s`: `nil` is empty, floats always carry a
/// decimal and strings are written unescaped. Lists, maps and tag library
/// namespaces have no output form.
pub fn default(f: &mut Formatter<'_>, value: &Value) -> Result {
    match value {
        Value::None => {}
        Value::Bool(b) => write!(f, "{b}")?,
        Value::Integer(n) => write!(f, "{n}")?,
        Value::Float(n) => write_float(f, *n)?,
        Value::String(s) => write!(f, "{s}")?,
        value => {
            return Err(Error::from(format!(
                "expression evaluated to unformattable type {}",
                value.human()
            )));
        }
    }
    Ok(())
}

/// Writes a float the way Ruby prints it, e.g. `2.0`, `0.5`, `Infinity`.
pub(crate) fn write_float(f: &mut impl fmt::Write, n: f64) -> fmt::Result {
    if n.is_nan() {
        f.write_str("NaN")
    } else if n.is_infinite() {
        f.write_str(if n > 0.0 { "Infinity" } else { "-Infinity" })
    } else if n.fract() == 0.0 && n.abs() < 1e16 {
        write!(f, "{n:.1}")
    } else {
        write!(f, "{n}")
    }
}
