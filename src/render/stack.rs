use crate::Value;

/// The template's own local scope.
///
/// Holds the variables bound by assignments, loop variables and block
/// parameters. Block bodies see the locals of the enclosing code, anything
/// bound inside a body is dropped when the body ends.
#[derive(Default)]
#[cfg_attr(internal_debug, derive(Debug))]
pub struct Stack {
    stack: Vec<State>,
}

#[cfg_attr(internal_debug, derive(Debug))]
enum State {
    /// A single local variable.
    Var(String, Value),

    /// Marks the start of a block body.
    Boundary,
}

impl Stack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lookup the innermost binding of a local variable.
    pub fn lookup(&self, name: &str) -> Option<&Value> {
        self.stack.iter().rev().find_map(|state| match state {
            State::Var(n, value) if n == name => Some(value),
            _ => None,
        })
    }

    /// Assign to a local variable, updating the innermost existing binding
    /// or introducing a new one in the current body.
    pub fn assign(&mut self, name: &str, value: Value) {
        let existing = self.stack.iter_mut().rev().find_map(|state| match state {
            State::Var(n, v) if n == name => Some(v),
            _ => None,
        });
        match existing {
            Some(v) => *v = value,
            None => self.bind(name, value),
        }
    }

    /// Introduce a new binding that shadows any existing one.
    pub fn bind(&mut self, name: &str, value: Value) {
        self.stack.push(State::Var(name.to_owned(), value));
    }

    pub fn push_boundary(&mut self) {
        self.stack.push(State::Boundary);
    }

    /// Drop everything bound since the last boundary, including it.
    pub fn pop_boundary(&mut self) {
        while let Some(state) = self.stack.pop() {
            if let State::Boundary = state {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assign_updates_outer_binding() {
        let mut stack = Stack::new();
        stack.assign("a", Value::from(1));
        stack.push_boundary();
        stack.assign("a", Value::from(2));
        stack.assign("b", Value::from(3));
        stack.pop_boundary();
        assert_eq!(stack.lookup("a"), Some(&Value::from(2)));
        assert_eq!(stack.lookup("b"), None);
    }

    #[test]
    fn bind_shadows() {
        let mut stack = Stack::new();
        stack.bind("x", Value::from("outer"));
        stack.push_boundary();
        stack.bind("x", Value::from("inner"));
        assert_eq!(stack.lookup("x"), Some(&Value::from("inner")));
        stack.pop_boundary();
        assert_eq!(stack.lookup("x"), Some(&Value::from("outer")));
    }
}
