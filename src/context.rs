//! The host side variable table that templates are evaluated against.

use std::collections::{BTreeMap, HashMap};

use crate::value::Map;
use crate::Value;

/// A table of variables owned by the host.
///
/// Templates consult it for every identifier that their own local scope
/// (assignments, loop variables and block parameters) does not bind.
///
/// Implementations must distinguish a variable that is absent from one that
/// is explicitly bound to [`Value::None`]: the former makes the template fail
/// while the latter evaluates to `nil`.
pub trait Variables {
    /// Lookup a variable by its exact name.
    fn get_variable(&self, name: &str) -> Option<Value>;

    /// Lookup a variable, returning `default` when it is absent.
    fn get_variable_or(&self, name: &str, default: &Value) -> Value {
        self.get_variable(name).unwrap_or_else(|| default.clone())
    }
}

/// A layered variable table.
///
/// Variables set on the scope shadow the ones in the parent, which makes it
/// convenient for tag libraries that run a tag body with extra variables.
///
/// # Examples
///
/// ```
/// use viewbridge::{Scope, Value, Variables};
///
/// let mut root = Scope::new();
/// root.set_variable("name", "Bob");
///
/// let mut child = Scope::with_parent(&root);
/// child.set_variable("greeting", "Hello");
///
/// assert_eq!(child.get_variable("name"), Some(Value::from("Bob")));
/// assert_eq!(root.get_variable("greeting"), None);
/// ```
#[derive(Default)]
pub struct Scope<'a> {
    vars: Map<String, Value>,
    parent: Option<&'a dyn Variables>,
}

impl<'a> Scope<'a> {
    /// Construct a new empty scope without a parent.
    pub fn new() -> Self {
        Self::default()
    }

    /// Construct a new empty scope on top of another variable table.
    pub fn with_parent(parent: &'a dyn Variables) -> Self {
        Self {
            vars: Map::new(),
            parent: Some(parent),
        }
    }

    /// Set a variable in this scope, shadowing any parent variable.
    pub fn set_variable(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.vars.insert(name.into(), value.into());
    }

    /// Remove a variable from this scope.
    pub fn remove_variable(&mut self, name: &str) -> Option<Value> {
        self.vars.remove(name)
    }
}

impl Variables for Scope<'_> {
    fn get_variable(&self, name: &str) -> Option<Value> {
        match self.vars.get(name) {
            Some(value) => Some(value.clone()),
            None => self.parent.and_then(|p| p.get_variable(name)),
        }
    }
}

impl std::fmt::Debug for Scope<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scope")
            .field("vars", &self.vars)
            .field("parent", &self.parent.is_some())
            .finish()
    }
}

/// Any map value is a variable table, other values have no variables.
impl Variables for Value {
    fn get_variable(&self, name: &str) -> Option<Value> {
        match self {
            Value::Map(map) => map.get(name).cloned(),
            _ => None,
        }
    }
}

impl Variables for BTreeMap<String, Value> {
    fn get_variable(&self, name: &str) -> Option<Value> {
        self.get(name).cloned()
    }
}

impl<S> Variables for HashMap<String, Value, S>
where
    S: std::hash::BuildHasher,
{
    fn get_variable(&self, name: &str) -> Option<Value> {
        self.get(name).cloned()
    }
}

impl<T> Variables for &T
where
    T: Variables + ?Sized,
{
    fn get_variable(&self, name: &str) -> Option<Value> {
        (**self).get_variable(name)
    }

    fn get_variable_or(&self, name: &str, default: &Value) -> Value {
        (**self).get_variable_or(name, default)
    }
}
