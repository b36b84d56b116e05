//! Tag library invocation.
//!
//! Templates obtain a namespace handle with `taglib(uri)` and then call tags
//! on it as methods, optionally with a body:
//!
//! ```text
//! <% f = taglib("/lib/form") %>
//! <% f.entry(title: "Name") do %>
//!   <input name="name">
//! <% end %>
//! ```
//!
//! Tag libraries are registered at runtime so every call on a namespace handle
//! goes through the single [`TagLibrary::invoke`] funnel.

use std::collections::BTreeMap;
use std::fmt;

use crate::context::Variables;
use crate::sink::OutputSink;
use crate::value::Map;
use crate::{Engine, Error, Result, Value};

/// A reference to a tag library namespace from within a template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagNamespace {
    uri: String,
}

/// A single tag call.
#[derive(Debug, Clone)]
pub struct TagInvocation<'a> {
    uri: &'a str,
    name: &'a str,
    attrs: Map<String, Value>,
}

/// The body attached to a tag call.
///
/// A tag library can run the body any number of times, each time against the
/// variables and sink of its choosing.
pub trait Body {
    /// Run the body, writing its output to the given sink.
    fn run(&mut self, vars: &dyn Variables, sink: &mut dyn OutputSink) -> Result<()>;
}

/// Everything a tag library needs to perform a tag call.
pub struct TagContext<'a> {
    /// The engine running the calling template, for rendering nested
    /// templates.
    pub engine: &'a Engine,
    /// The variables visible to the calling template.
    pub vars: &'a dyn Variables,
    /// The innermost active sink.
    pub sink: &'a mut dyn OutputSink,
    /// The tag body, if any.
    pub body: Option<&'a mut dyn Body>,
}

/// The mechanism that performs tag calls.
pub trait TagLibrary: Send + Sync {
    /// Perform the tag call, writing any markup to `cx.sink`.
    fn invoke(&self, tag: &TagInvocation<'_>, cx: &mut TagContext<'_>) -> Result<()>;
}

/// A tag implementation registered in a [`TagRegistry`].
type TagFn = dyn Fn(&TagInvocation<'_>, &mut TagContext<'_>) -> Result<()> + Send + Sync;

/// A [`TagLibrary`] made of closures registered per namespace URI.
///
/// A tag called as `some_tag` is also looked up as `some-tag`, since tag names
/// with hyphens can't be written as method names.
///
/// # Examples
///
/// ```
/// use viewbridge::{Engine, Syntax, TagRegistry};
///
/// let mut tags = TagRegistry::new();
/// tags.register("/lib/html", "bold", |_, cx| {
///     cx.write("<b>")?;
///     cx.run_body()?;
///     cx.write("</b>")
/// });
///
/// let mut engine = Engine::new();
/// engine.set_tag_library(tags);
///
/// let template = engine.compile(
///     Syntax::Erb,
///     r#"<% h = taglib("/lib/html") %><% h.bold do %>hi<% end %>"#,
/// )?;
/// assert_eq!(template.render(&viewbridge::Value::None)?, "<b>hi</b>");
/// # Ok::<(), viewbridge::Error>(())
/// ```
#[derive(Default)]
pub struct TagRegistry {
    namespaces: BTreeMap<String, BTreeMap<String, Box<TagFn>>>,
}

impl TagNamespace {
    /// Construct a new handle for the namespace URI.
    pub fn new(uri: impl Into<String>) -> Self {
        Self { uri: uri.into() }
    }

    /// Returns the namespace URI.
    pub fn uri(&self) -> &str {
        &self.uri
    }
}

impl<'a> TagInvocation<'a> {
    pub(crate) fn new(uri: &'a str, name: &'a str, attrs: Map<String, Value>) -> Self {
        Self { uri, name, attrs }
    }

    /// The namespace URI.
    pub fn uri(&self) -> &str {
        self.uri
    }

    /// The tag name, as written in the template.
    pub fn name(&self) -> &str {
        self.name
    }

    /// All the attributes passed to the tag.
    pub fn attrs(&self) -> &Map<String, Value> {
        &self.attrs
    }

    /// Returns a single attribute.
    pub fn attr(&self, name: &str) -> Option<&Value> {
        self.attrs.get(name)
    }
}

impl TagContext<'_> {
    /// Write a chunk to the innermost active sink.
    pub fn write(&mut self, chunk: &str) -> Result<()> {
        if chunk.is_empty() {
            return Ok(());
        }
        self.sink.write(chunk)
    }

    /// Returns whether the tag was called with a body.
    pub fn has_body(&self) -> bool {
        self.body.is_some()
    }

    /// Run the body against the caller's variables and the current sink.
    ///
    /// Does nothing if the tag was called without a body.
    pub fn run_body(&mut self) -> Result<()> {
        let vars = self.vars;
        self.run_body_with(vars)
    }

    /// Run the body against other variables and the current sink.
    pub fn run_body_with(&mut self, vars: &dyn Variables) -> Result<()> {
        match &mut self.body {
            Some(body) => body.run(vars, &mut *self.sink),
            None => Ok(()),
        }
    }

    /// Run the body against the given variables and sink.
    pub fn run_body_into(&mut self, vars: &dyn Variables, sink: &mut dyn OutputSink) -> Result<()> {
        match &mut self.body {
            Some(body) => body.run(vars, sink),
            None => Ok(()),
        }
    }
}

impl TagRegistry {
    /// Construct a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tag in a namespace.
    pub fn register<F>(&mut self, uri: impl Into<String>, name: impl Into<String>, f: F)
    where
        F: Fn(&TagInvocation<'_>, &mut TagContext<'_>) -> Result<()> + Send + Sync + 'static,
    {
        self.namespaces
            .entry(uri.into())
            .or_default()
            .insert(name.into(), Box::new(f));
    }
}

impl TagLibrary for TagRegistry {
    fn invoke(&self, tag: &TagInvocation<'_>, cx: &mut TagContext<'_>) -> Result<()> {
        let tags = self.namespaces.get(tag.uri()).ok_or_else(|| {
            Error::custom(format!(
                "undefined tag library namespace URI: {}",
                tag.uri()
            ))
        })?;
        let f = match tags.get(tag.name()) {
            Some(f) => f,
            None => tags.get(&tag.name().replace('_', "-")).ok_or_else(|| {
                Error::custom(format!(
                    "name '{}' not found for '{}'",
                    tag.name(),
                    tag.uri()
                ))
            })?,
        };
        f(tag, cx)
    }
}

impl fmt::Debug for TagRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut m = f.debug_map();
        for (uri, tags) in &self.namespaces {
            m.entry(uri, &tags.keys());
        }
        m.finish()
    }
}

impl fmt::Debug for TagContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TagContext")
            .field("engine", &self.engine)
            .field("has_body", &self.body.is_some())
            .finish_non_exhaustive()
    }
}
