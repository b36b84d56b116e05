use crate::context::Variables;
use crate::render::stack::Stack;
use crate::types::ast;
use crate::{Error, Result, Value};

/// Resolve an identifier.
///
/// The template's locals are consulted first and then the host variables by
/// exact name. A variable bound to `nil` resolves to [`Value::None`], only an
/// absent variable is an error.
pub fn resolve(stack: &Stack, vars: &dyn Variables, source: &str, ident: &ast::Ident) -> Result<Value> {
    if let Some(value) = stack.lookup(&ident.name) {
        return Ok(value.clone());
    }
    match vars.get_variable(&ident.name) {
        Some(value) => {
            log::trace!("resolved `{}` from the variable table", ident.name);
            Ok(value)
        }
        None => {
            log::trace!("`{}` is not bound", ident.name);
            Err(Error::symbol_not_found(&ident.name, source, ident.span))
        }
    }
}
