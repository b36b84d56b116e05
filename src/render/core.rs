use crate::context::Variables;
use crate::fmt::Formatter;
use crate::render::dispatch::{dispatch_tag, BodyImpl};
use crate::render::resolve::resolve;
use crate::render::stack::Stack;
use crate::render::value::{binary, call_builtin, index, to_s};
use crate::sink::{Accumulator, OutputSink};
use crate::taglib::{Body, TagNamespace};
use crate::types::ast;
use crate::types::program::{Instr, Template};
use crate::types::span::Span;
use crate::value::Map;
use crate::{Engine, Error, Result, Value};

#[cfg_attr(internal_debug, derive(Debug))]
pub struct RendererImpl<'render> {
    pub(crate) engine: &'render Engine,
    pub(crate) template: &'render Template,
    pub(crate) stack: Stack,
}

impl<'render> RendererImpl<'render> {
    pub(crate) fn new(engine: &'render Engine, template: &'render Template) -> Self {
        Self {
            engine,
            template,
            stack: Stack::new(),
        }
    }

    /// Execute the instructions in `start..end`.
    pub(crate) fn render_range(
        &mut self,
        vars: &dyn Variables,
        acc: &mut dyn Accumulator,
        start: usize,
        end: usize,
    ) -> Result<()> {
        let t = self.template;
        let mut pc = start;

        while pc < end {
            match &t.instrs[pc] {
                Instr::ResetBuffer => acc.reset(),

                Instr::ForceEncoding(encoding) => acc.declare_encoding(encoding),

                Instr::Jump(j) => {
                    pc = *j;
                    continue;
                }

                Instr::JumpIfTrue(j, cond) => {
                    if self.eval(vars, acc.sink(), cond)?.is_truthy() {
                        pc = *j;
                        continue;
                    }
                }

                Instr::JumpIfFalse(j, cond) => {
                    if !self.eval(vars, acc.sink(), cond)?.is_truthy() {
                        pc = *j;
                        continue;
                    }
                }

                Instr::EmitRaw(raw) => acc.push(raw)?,

                Instr::Emit(expr) => {
                    let value = self.eval(vars, acc.sink(), expr)?;
                    let text = self.format(&value, expr.span())?;
                    acc.push(&text)?;
                }

                Instr::EmitAttr(name, expr) => match self.eval(vars, acc.sink(), expr)? {
                    Value::None | Value::Bool(false) => {}
                    Value::Bool(true) => acc.push(&format!(" {name}"))?,
                    Value::List(list) => {
                        let list: Vec<_> = list.iter().map(to_s).collect();
                        acc.push(&format!(" {name}='{}'", list.join(" ")))?;
                    }
                    value => acc.push(&format!(" {name}='{}'", to_s(&value)))?,
                },

                Instr::Eval(expr) => {
                    self.eval(vars, acc.sink(), expr)?;
                }

                Instr::Assign(name, expr) => {
                    let value = self.eval(vars, acc.sink(), expr)?;
                    self.stack.assign(&name.name, value);
                }

                Instr::Block(call, params, j) => {
                    self.render_block(vars, acc, call, params, pc + 1, *j)?;
                    pc = *j;
                    continue;
                }
            }
            pc += 1;
        }

        Ok(())
    }

    /// Execute a call with the body in `start..end` attached.
    fn render_block(
        &mut self,
        vars: &dyn Variables,
        acc: &mut dyn Accumulator,
        call: &ast::Call,
        params: &[ast::Ident],
        start: usize,
        end: usize,
    ) -> Result<()> {
        let t = self.template;
        let name = call.name.name.as_str();

        let receiver = match &call.receiver {
            Some(receiver) => self.eval(vars, acc.sink(), receiver)?,
            None => {
                return Err(Error::render(
                    format!("undefined method `{name}` with a block"),
                    &t.source,
                    call.name.span,
                ));
            }
        };

        if let Value::Namespace(ns) = &receiver {
            if let Some(param) = params.first() {
                return Err(Error::render(
                    "tag bodies don't take parameters",
                    &t.source,
                    param.span,
                ));
            }
            let attrs = self.eval_tag_attrs(vars, acc.sink(), call)?;
            let engine = self.engine;
            let mut body = BodyImpl {
                renderer: self,
                start,
                end,
            };
            let body: &mut dyn Body = &mut body;
            return dispatch_tag(engine, &t.source, vars, acc.sink(), ns, call, attrs, Some(body));
        }

        if let Some(args) = &call.args {
            if !args.is_empty() {
                return Err(Error::render(
                    format!("`{name}` takes no arguments"),
                    &t.source,
                    args.span,
                ));
            }
        }

        // Items are yielded one at a time, the receiver may be arbitrarily
        // large, e.g. `n.times`.
        let items: Box<dyn Iterator<Item = Vec<Value>>> = match (name, receiver) {
            ("each", Value::List(list)) => Box::new(list.into_iter().map(|v| vec![v])),
            ("each" | "each_pair", Value::Map(map)) => {
                Box::new(map.into_iter().map(|(k, v)| vec![Value::String(k), v]))
            }
            ("each_with_index", Value::List(list)) => Box::new(
                list.into_iter()
                    .enumerate()
                    .map(|(i, v)| vec![v, Value::from(i)]),
            ),
            ("times", Value::Integer(n)) => Box::new((0..n.max(0)).map(|i| vec![Value::Integer(i)])),
            (_, receiver) => {
                return Err(Error::render(
                    format!(
                        "undefined method `{name}` with a block for {}",
                        receiver.human()
                    ),
                    &t.source,
                    call.name.span,
                ));
            }
        };

        for item in items {
            self.stack.push_boundary();
            self.bind_params(params, item);
            let result = self.render_range(vars, acc, start, end);
            self.stack.pop_boundary();
            result?;
        }
        Ok(())
    }

    /// Bind block parameters, a single parameter receives all the yielded
    /// values as a list and missing values are `nil`.
    fn bind_params(&mut self, params: &[ast::Ident], mut item: Vec<Value>) {
        if let ([param], true) = (params, item.len() > 1) {
            self.stack.bind(&param.name, Value::List(item));
            return;
        }
        item.resize(params.len().max(item.len()), Value::None);
        for (param, value) in params.iter().zip(item) {
            self.stack.bind(&param.name, value);
        }
    }

    /// Evaluate an expression.
    ///
    /// The sink is where any tag called during the evaluation writes its
    /// markup.
    pub(crate) fn eval(
        &self,
        vars: &dyn Variables,
        sink: &mut dyn OutputSink,
        expr: &ast::Expr,
    ) -> Result<Value> {
        let t = self.template;
        match expr {
            ast::Expr::Literal(lit) => Ok(lit.value.clone()),

            ast::Expr::Interp(interp) => {
                let mut s = String::new();
                for part in &interp.parts {
                    match part {
                        ast::Part::Str(text) => s.push_str(text),
                        ast::Part::Expr(expr) => s.push_str(&to_s(&self.eval(vars, sink, expr)?)),
                    }
                }
                Ok(Value::String(s))
            }

            ast::Expr::Var(ident) => resolve(&self.stack, vars, &t.source, ident),

            ast::Expr::List(list) => list
                .items
                .iter()
                .map(|item| self.eval(vars, sink, item))
                .collect::<Result<_>>()
                .map(Value::List),

            ast::Expr::Map(map) => {
                let mut m = Map::new();
                for (key, value) in &map.entries {
                    m.insert(key.clone(), self.eval(vars, sink, value)?);
                }
                Ok(Value::Map(m))
            }

            ast::Expr::Index(ast::Index {
                receiver,
                index: i,
                span,
            }) => {
                let value = self.eval(vars, sink, receiver)?;
                let i = self.eval(vars, sink, i)?;
                index(&t.source, &value, &i, *span)
            }

            ast::Expr::Call(call) => self.call(vars, sink, call),

            ast::Expr::Not(not) => Ok(Value::Bool(!self.eval(vars, sink, &not.expr)?.is_truthy())),

            ast::Expr::Binary(bin) => {
                let lhs = self.eval(vars, sink, &bin.lhs)?;
                match bin.op {
                    ast::BinOp::And if !lhs.is_truthy() => Ok(lhs),
                    ast::BinOp::Or if lhs.is_truthy() => Ok(lhs),
                    ast::BinOp::And | ast::BinOp::Or => self.eval(vars, sink, &bin.rhs),
                    op => {
                        let rhs = self.eval(vars, sink, &bin.rhs)?;
                        binary(&t.source, op, lhs, rhs, bin.span)
                    }
                }
            }
        }
    }

    /// Evaluate a method or function call without a body.
    ///
    /// Calls on a tag library namespace are tags, their markup is written to
    /// the sink and the call evaluates to `nil`. Otherwise the call is a map
    /// member lookup, a builtin method or a helper, in that order.
    fn call(&self, vars: &dyn Variables, sink: &mut dyn OutputSink, call: &ast::Call) -> Result<Value> {
        let t = self.template;
        let name = call.name.name.as_str();

        let receiver = match &call.receiver {
            Some(receiver) => self.eval(vars, sink, receiver)?,
            None => {
                let args = self.eval_args(vars, sink, call)?;
                if name == "taglib" {
                    return self.taglib(&args, call.span);
                }
                return match self.engine.helper(name) {
                    Some(helper) => helper(&args).map_err(|err| err.enrich(&t.source, call.span)),
                    None => Err(Error::render(
                        format!("undefined method `{name}`"),
                        &t.source,
                        call.name.span,
                    )),
                };
            }
        };

        if let Value::Namespace(ns) = &receiver {
            let attrs = self.eval_tag_attrs(vars, sink, call)?;
            dispatch_tag(self.engine, &t.source, vars, sink, ns, call, attrs, None)?;
            return Ok(Value::None);
        }

        if call.args.is_none() {
            if let Some(value) = receiver.as_map().and_then(|map| map.get(name)) {
                return Ok(value.clone());
            }
        }

        let args = self.eval_args(vars, sink, call)?;
        if let Some(value) = call_builtin(&t.source, &receiver, name, &args, call.span)? {
            return Ok(value);
        }

        match self.engine.helper(name) {
            Some(helper) => {
                let mut all = Vec::with_capacity(args.len() + 1);
                all.push(receiver);
                all.extend(args);
                helper(&all).map_err(|err| err.enrich(&t.source, call.span))
            }
            None => Err(Error::render(
                format!("undefined method `{name}` for {}", receiver.human()),
                &t.source,
                call.name.span,
            )),
        }
    }

    /// The `taglib(uri)` builtin.
    fn taglib(&self, args: &[Value], span: Span) -> Result<Value> {
        match args {
            [Value::String(uri)] => Ok(Value::Namespace(TagNamespace::new(uri.as_str()))),
            _ => Err(Error::render(
                "`taglib` expects a single namespace URI",
                &self.template.source,
                span,
            )),
        }
    }

    /// Evaluate call arguments, keyword arguments are passed as a trailing
    /// map.
    fn eval_args(
        &self,
        vars: &dyn Variables,
        sink: &mut dyn OutputSink,
        call: &ast::Call,
    ) -> Result<Vec<Value>> {
        let args = match &call.args {
            Some(args) => args,
            None => return Ok(Vec::new()),
        };
        let mut values = Vec::with_capacity(args.positional.len() + 1);
        for arg in &args.positional {
            values.push(self.eval(vars, sink, arg)?);
        }
        if !args.keywords.is_empty() {
            values.push(Value::Map(self.eval_keywords(vars, sink, &args.keywords)?));
        }
        Ok(values)
    }

    fn eval_keywords(
        &self,
        vars: &dyn Variables,
        sink: &mut dyn OutputSink,
        keywords: &[(String, ast::Expr)],
    ) -> Result<Map<String, Value>> {
        let mut map = Map::new();
        for (key, expr) in keywords {
            map.insert(key.clone(), self.eval(vars, sink, expr)?);
        }
        Ok(map)
    }

    /// Evaluate the attributes of a tag call, given either as keyword
    /// arguments or as a single map.
    fn eval_tag_attrs(
        &self,
        vars: &dyn Variables,
        sink: &mut dyn OutputSink,
        call: &ast::Call,
    ) -> Result<Map<String, Value>> {
        let t = self.template;
        let args = match &call.args {
            Some(args) => args,
            None => return Ok(Map::new()),
        };
        match args.positional.as_slice() {
            [] => self.eval_keywords(vars, sink, &args.keywords),
            [expr] if args.keywords.is_empty() => match self.eval(vars, sink, expr)? {
                Value::Map(map) => Ok(map),
                value => Err(Error::tag_invocation(
                    Error::custom(format!(
                        "expected a map of tag attributes, found {}",
                        value.human()
                    )),
                    &t.source,
                    expr.span(),
                )),
            },
            _ => Err(Error::tag_invocation(
                Error::custom("tag attributes must be keyword arguments or a single map"),
                &t.source,
                args.span,
            )),
        }
    }

    /// Format a value using the engine's default formatter.
    fn format(&self, value: &Value, span: Span) -> Result<String> {
        let mut s = String::new();
        let mut f = Formatter::with_string(&mut s);
        (self.engine.default_formatter)(&mut f, value)
            .map_err(|err| Error::format(err, &self.template.source, span))?;
        Ok(s)
    }
}
