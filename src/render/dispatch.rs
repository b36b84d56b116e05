//! Forwards calls on tag library namespace handles to the tag library.

use crate::context::Variables;
use crate::render::core::RendererImpl;
use crate::sink::{Accumulator, AppendBuffer, ConcatBuffer, OutputSink};
use crate::taglib::{Body, TagContext, TagInvocation, TagNamespace};
use crate::types::ast;
use crate::value::Map;
use crate::{Engine, Error, Result, Syntax, Value};

/// Perform a tag call.
///
/// The sink is always the innermost active one so the markup the tag
/// library writes lands in the same place as the surrounding output.
#[allow(clippy::too_many_arguments)]
pub fn dispatch_tag<'a>(
    engine: &'a Engine,
    source: &str,
    vars: &'a dyn Variables,
    sink: &'a mut dyn OutputSink,
    ns: &TagNamespace,
    call: &ast::Call,
    attrs: Map<String, Value>,
    body: Option<&'a mut dyn Body>,
) -> Result<()> {
    let name = call.name.name.as_str();
    let library = engine.tag_library().ok_or_else(|| {
        Error::tag_invocation(
            Error::custom("no tag library is registered"),
            source,
            call.span,
        )
    })?;
    log::debug!(
        "invoking tag `{name}` from `{}`{}",
        ns.uri(),
        if body.is_some() { " with a body" } else { "" }
    );
    let tag = TagInvocation::new(ns.uri(), name, attrs);
    let mut cx = TagContext {
        engine,
        vars,
        sink,
        body,
    };
    library
        .invoke(&tag, &mut cx)
        .map_err(|err| Error::tag_invocation(err, source, call.span))
}

/// The body of a tag call, which is a range of instructions in the calling
/// template.
pub struct BodyImpl<'a, 'render> {
    pub renderer: &'a mut RendererImpl<'render>,
    pub start: usize,
    pub end: usize,
}

impl Body for BodyImpl<'_, '_> {
    fn run(&mut self, vars: &dyn Variables, sink: &mut dyn OutputSink) -> Result<()> {
        let syntax = self.renderer.template.syntax;
        let (start, end) = (self.start, self.end);
        let renderer = &mut *self.renderer;
        with_accumulator(syntax, sink, |acc| {
            renderer.stack.push_boundary();
            let result = renderer.render_range(vars, acc, start, end);
            renderer.stack.pop_boundary();
            result
        })
    }
}

/// Runs the closure with the accumulator that the syntax writes through.
pub fn with_accumulator<R>(
    syntax: Syntax,
    sink: &mut dyn OutputSink,
    f: impl FnOnce(&mut dyn Accumulator) -> R,
) -> R {
    match syntax {
        Syntax::Erb => f(&mut ConcatBuffer::new(sink)),
        Syntax::Haml => f(&mut AppendBuffer::new(sink)),
    }
}
