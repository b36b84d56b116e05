//! Executes compiled templates.

mod core;
mod dispatch;
mod resolve;
mod stack;
mod value;

use crate::context::Variables;
use crate::render::core::RendererImpl;
use crate::render::dispatch::with_accumulator;
use crate::sink::OutputSink;
use crate::types::program::Template;
use crate::{Engine, Error, Result};

/// Run a compiled template against the variables, writing all output to the
/// sink through the accumulator of the template's syntax.
///
/// Any failure is returned as an evaluation error, with the original failure
/// as its cause. Output written before the failure stays in the sink.
pub(crate) fn run(
    engine: &Engine,
    template: &Template,
    vars: &dyn Variables,
    sink: &mut dyn OutputSink,
) -> Result<()> {
    log::debug!("running {} template", template.syntax.human());
    let mut renderer = RendererImpl::new(engine, template);
    with_accumulator(template.syntax, sink, |acc| {
        renderer.render_range(vars, acc, 0, template.instrs.len())
    })
    .map_err(Error::evaluation)
}
