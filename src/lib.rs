//! Evaluates ERB and Haml view templates against host owned variables,
//! bridging calls on tag library namespaces to a pluggable tag library.
//!
//! # Features
//!
//! ### Templates
//!
//! - ERB: `<%= user.name %>`, `<% if admin %> ... <% end %>`,
//!   `<% items.each do |item| %> ... <% end %>`
//! - Haml: `%p.greeting= user.name`, `- items.each do |item|` with the body
//!   nested by indentation
//! - Tag libraries: `<% f = taglib("/lib/form") %><% f.entry(title: "Name") do %> ... <% end %>`
//!
//! ### Engine
//!
//! - Identifiers resolve to template locals first and then to the host's
//!   [`Variables`], an unbound identifier is an error rather than `nil`
//! - Output streams straight to any [`OutputSink`], nothing is buffered
//! - Tag calls dispatch to the registered [`TagLibrary`], nested tags always
//!   write to the innermost active sink
//! - Render using any [`serde`] serializable values
//! - Client proxies for remote methods, see the [`proxy`] module
//!
//! # Getting started
//!
//! Your entry point is the [`Engine`] struct. The engine stores the compile
//! options, helpers, the tag library and named templates. Generally, you only
//! need to construct one engine during the lifetime of a program.
//!
//! ```
//! let engine = viewbridge::Engine::new();
//! ```
//!
//! Templates are compiled with [`.compile`][Engine::compile] and run
//! against a table of variables.
//!
//! ```
//! use viewbridge::{Engine, Syntax, Value};
//!
//! let engine = Engine::new();
//! let template = engine.compile(Syntax::Erb, "Hello <%= name %>")?;
//! let vars = Value::from([("name", "Bob")]);
//! assert_eq!(template.render(&vars)?, "Hello Bob");
//! # Ok::<(), viewbridge::Error>(())
//! ```
//!
//! Templates can also be stored in the engine by name, the syntax is chosen
//! by the file extension.
//!
//! ```
//! use viewbridge::{Engine, Scope};
//!
//! let mut engine = Engine::new();
//! engine.add_template("greeting.haml", "%p Hello #{name}")?;
//!
//! let mut vars = Scope::new();
//! vars.set_variable("name", "Bob");
//!
//! let template = engine.get_template("greeting.haml").unwrap();
//! assert_eq!(template.render(&vars)?, "<p>Hello Bob</p>\n");
//! # Ok::<(), viewbridge::Error>(())
//! ```
//!
//! # Examples
//!
//! ### Stream to a sink
//!
//! [`.run`][Template::run] writes every chunk to the sink as soon as it is
//! produced. On failure the chunks written so far stay in the sink.
//!
//! ```
//! use viewbridge::{Engine, ErrorKind, Syntax, Value};
//!
//! let engine = Engine::new();
//! let template = engine.compile(Syntax::Erb, "a<%= missing %>b")?;
//!
//! let mut out = String::new();
//! let err = template.run(&Value::None, &mut out).unwrap_err();
//! assert_eq!(out, "a");
//! assert_eq!(err.kind(), ErrorKind::Evaluation);
//! assert_eq!(err.root_kind(), ErrorKind::SymbolNotFound);
//! # Ok::<(), viewbridge::Error>(())
//! ```
//!
//! ### Add a helper
//!
//! Helpers are called like functions, or like methods in which case the
//! receiver is the first argument.
//!
//! ```
//! use viewbridge::{Engine, Syntax, Value};
//!
//! let mut engine = Engine::new();
//! engine.add_helper("shout", |args| match args {
//!     [Value::String(s)] => Ok(Value::from(format!("{}!", s.to_uppercase()))),
//!     _ => Err(viewbridge::Error::custom("expected a string")),
//! });
//!
//! let template = engine.compile(Syntax::Erb, r#"<%= shout("hi") %> <%= "bye".shout %>"#)?;
//! assert_eq!(template.render(&Value::None)?, "HI! BYE!");
//! # Ok::<(), viewbridge::Error>(())
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]

mod compile;
mod context;
mod error;
pub mod fmt;
pub mod progressive;
pub mod proxy;
mod render;
mod sink;
mod taglib;
mod types;
mod value;

use std::collections::BTreeMap;
use std::io;

pub use crate::context::{Scope, Variables};
pub use crate::error::{Error, ErrorKind};
pub use crate::sink::{AppendBuffer, ConcatBuffer, IoSink, OutputSink};
pub use crate::taglib::{Body, TagContext, TagInvocation, TagLibrary, TagNamespace, TagRegistry};
pub use crate::types::options::{ErbOptions, ErbOptionsBuilder, HamlOptions, HamlOptionsBuilder};
pub use crate::types::syntax::Syntax;
#[cfg(feature = "serde")]
pub use crate::value::to_value;
pub use crate::value::{List, Map, Value};

use crate::fmt::FormatFn;
use crate::types::program;

/// A type alias for results in this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// A helper function or closure.
type HelperFn = dyn Fn(&[Value]) -> Result<Value> + Send + Sync + 'static;

/// The compilation and evaluation engine.
pub struct Engine {
    erb: ErbOptions,
    haml: HamlOptions,
    default_formatter: Box<FormatFn>,
    helpers: BTreeMap<String, Box<HelperFn>>,
    tag_library: Option<Box<dyn TagLibrary>>,
    templates: BTreeMap<String, program::Template>,
}

/// A compiled template.
pub struct Template<'engine> {
    engine: &'engine Engine,
    template: program::Template,
}

/// A reference to a compiled template in an [`Engine`].
#[derive(Clone, Copy)]
pub struct TemplateRef<'engine> {
    engine: &'engine Engine,
    template: &'engine program::Template,
}

impl Default for Engine {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    /// Construct a new engine.
    #[inline]
    pub fn new() -> Self {
        Self::with_options(ErbOptions::default(), HamlOptions::default())
    }

    /// Construct a new engine with custom compile options.
    ///
    /// # Examples
    ///
    /// ```
    /// use viewbridge::{Engine, ErbOptions, HamlOptions};
    ///
    /// let erb = ErbOptions::builder().buffer("@output_buffer").build();
    /// let engine = Engine::with_options(erb, HamlOptions::default());
    /// ```
    #[inline]
    pub fn with_options(erb: ErbOptions, haml: HamlOptions) -> Self {
        Self {
            erb,
            haml,
            default_formatter: Box::new(fmt::default),
            helpers: BTreeMap::new(),
            tag_library: None,
            templates: BTreeMap::new(),
        }
    }

    /// Set the default formatter, used for every output expression.
    #[inline]
    pub fn set_default_formatter<F>(&mut self, f: F)
    where
        F: Fn(&mut fmt::Formatter<'_>, &Value) -> fmt::Result + Sync + Send + 'static,
    {
        self.default_formatter = Box::new(f);
    }

    /// Add a helper, replacing any helper with the same name.
    #[inline]
    pub fn add_helper<F>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn(&[Value]) -> Result<Value> + Send + Sync + 'static,
    {
        self.helpers.insert(name.into(), Box::new(f));
    }

    /// Set the tag library that performs tag calls.
    #[inline]
    pub fn set_tag_library<T>(&mut self, library: T)
    where
        T: TagLibrary + 'static,
    {
        self.tag_library = Some(Box::new(library));
    }

    /// Returns the tag library, if one is set.
    #[inline]
    pub fn tag_library(&self) -> Option<&dyn TagLibrary> {
        self.tag_library.as_deref()
    }

    /// Returns the ERB compile options.
    #[inline]
    pub fn erb_options(&self) -> &ErbOptions {
        &self.erb
    }

    /// Returns the Haml compile options.
    #[inline]
    pub fn haml_options(&self) -> &HamlOptions {
        &self.haml
    }

    /// Returns the template file extensions the engine can compile, without
    /// the dot.
    #[inline]
    pub fn supported_extensions(&self) -> &'static [&'static str] {
        &["erb", "haml"]
    }

    /// Add a template to the engine.
    ///
    /// The syntax is chosen by the extension of the name, e.g. `index.erb`.
    /// The template will be compiled and stored under the given name.
    pub fn add_template(&mut self, name: impl Into<String>, source: impl Into<String>) -> Result<()> {
        let name = name.into();
        let syntax = Syntax::from_path(&name).ok_or_else(|| {
            Error::custom(format!(
                "unsupported template extension for `{name}`, expected one of: {}",
                self.supported_extensions().join(", ")
            ))
        })?;
        self.add_template_with_syntax(name, syntax, source)
    }

    /// Add a template to the engine using the given syntax.
    pub fn add_template_with_syntax(
        &mut self,
        name: impl Into<String>,
        syntax: Syntax,
        source: impl Into<String>,
    ) -> Result<()> {
        let template = compile::template(self, syntax, source.into())?;
        self.templates.insert(name.into(), template);
        Ok(())
    }

    /// Lookup a template by name.
    #[inline]
    pub fn get_template(&self, name: &str) -> Option<TemplateRef<'_>> {
        self.templates.get(name).map(|template| TemplateRef {
            engine: self,
            template,
        })
    }

    /// Remove a template from the engine.
    #[inline]
    pub fn remove_template(&mut self, name: &str) -> bool {
        self.templates.remove(name).is_some()
    }

    /// Compile a template.
    ///
    /// The template will not be stored in the engine.
    #[inline]
    pub fn compile(&self, syntax: Syntax, source: impl Into<String>) -> Result<Template<'_>> {
        let template = compile::template(self, syntax, source.into())?;
        Ok(Template {
            engine: self,
            template,
        })
    }

    pub(crate) fn helper(&self, name: &str) -> Option<&HelperFn> {
        self.helpers.get(name).map(|f| &**f)
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("erb", &self.erb)
            .field("haml", &self.haml)
            .field("helpers", &self.helpers.keys())
            .field("tag_library", &self.tag_library.is_some())
            .field("templates", &self.templates.keys())
            .finish()
    }
}

impl<'engine> Template<'engine> {
    /// Run the template, writing all output to the sink.
    #[inline]
    pub fn run(&self, vars: &dyn Variables, sink: &mut dyn OutputSink) -> Result<()> {
        render::run(self.engine, &self.template, vars, sink)
    }

    /// Render the template to a string.
    #[inline]
    pub fn render(&self, vars: &dyn Variables) -> Result<String> {
        render_to_string(self.engine, &self.template, vars)
    }

    /// Render the template to a writer.
    #[inline]
    pub fn render_to_writer<W>(&self, writer: W, vars: &dyn Variables) -> Result<()>
    where
        W: io::Write,
    {
        self.run(vars, &mut IoSink::new(writer))
    }

    /// Render the template to a string using any serializable data.
    #[cfg(feature = "serde")]
    #[cfg_attr(docsrs, doc(cfg(feature = "serde")))]
    #[inline]
    pub fn render_from<S>(&self, ctx: &S) -> Result<String>
    where
        S: serde::Serialize + ?Sized,
    {
        self.render(&to_value(ctx)?)
    }

    /// Returns the syntax of the template.
    #[inline]
    pub fn syntax(&self) -> Syntax {
        self.template.syntax
    }

    /// Returns the original template source.
    #[inline]
    pub fn source(&self) -> &str {
        &self.template.source
    }
}

impl std::fmt::Debug for Template<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Template")
            .field("engine", &self.engine)
            .field("syntax", &self.template.syntax)
            .finish_non_exhaustive()
    }
}

impl<'engine> TemplateRef<'engine> {
    /// Run the template, writing all output to the sink.
    #[inline]
    pub fn run(&self, vars: &dyn Variables, sink: &mut dyn OutputSink) -> Result<()> {
        render::run(self.engine, self.template, vars, sink)
    }

    /// Render the template to a string.
    #[inline]
    pub fn render(&self, vars: &dyn Variables) -> Result<String> {
        render_to_string(self.engine, self.template, vars)
    }

    /// Render the template to a writer.
    #[inline]
    pub fn render_to_writer<W>(&self, writer: W, vars: &dyn Variables) -> Result<()>
    where
        W: io::Write,
    {
        self.run(vars, &mut IoSink::new(writer))
    }

    /// Render the template to a string using any serializable data.
    #[cfg(feature = "serde")]
    #[cfg_attr(docsrs, doc(cfg(feature = "serde")))]
    #[inline]
    pub fn render_from<S>(&self, ctx: &S) -> Result<String>
    where
        S: serde::Serialize + ?Sized,
    {
        self.render(&to_value(ctx)?)
    }

    /// Returns the syntax of the template.
    #[inline]
    pub fn syntax(&self) -> Syntax {
        self.template.syntax
    }

    /// Returns the original template source.
    #[inline]
    pub fn source(&self) -> &'engine str {
        &self.template.source
    }
}

impl std::fmt::Debug for TemplateRef<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateRef")
            .field("engine", &self.engine)
            .field("syntax", &self.template.syntax)
            .finish_non_exhaustive()
    }
}

fn render_to_string(engine: &Engine, template: &program::Template, vars: &dyn Variables) -> Result<String> {
    let mut s = String::with_capacity(template.source.len());
    render::run(engine, template, vars, &mut s)?;
    Ok(s)
}
