//! Operators and builtin methods on values.

use std::cmp::Ordering;
use std::fmt::Write;

use crate::types::ast::BinOp;
use crate::types::span::Span;
use crate::value::{List, Map};
use crate::{Error, Result, Value};

/// Converts a value to text the way `to_s` and `#{..}` interpolation do.
pub fn to_s(value: &Value) -> String {
    match value {
        Value::None => String::new(),
        Value::String(s) => s.clone(),
        value => inspect(value),
    }
}

/// Converts a value to its source-like representation.
pub fn inspect(value: &Value) -> String {
    let mut s = String::new();
    write_inspect(&mut s, value);
    s
}

fn write_inspect(s: &mut String, value: &Value) {
    // Writing to a `String` never fails.
    let _ = match value {
        Value::None => s.write_str("nil"),
        Value::Bool(b) => write!(s, "{b}"),
        Value::Integer(n) => write!(s, "{n}"),
        Value::Float(n) => crate::fmt::write_float(s, *n),
        Value::String(v) => write!(s, "{v:?}"),
        Value::List(list) => {
            s.push('[');
            for (i, item) in list.iter().enumerate() {
                if i > 0 {
                    s.push_str(", ");
                }
                write_inspect(s, item);
            }
            s.write_str("]")
        }
        Value::Map(map) => {
            s.push('{');
            for (i, (key, item)) in map.iter().enumerate() {
                if i > 0 {
                    s.push_str(", ");
                }
                let _ = write!(s, "{key:?}=>");
                write_inspect(s, item);
            }
            s.write_str("}")
        }
        Value::Namespace(ns) => write!(s, "#<taglib {}>", ns.uri()),
    };
}

/// Index into a list, map or string.
///
/// Negative list indices count from the end and a missing element is `nil`.
pub fn index(source: &str, value: &Value, index: &Value, span: Span) -> Result<Value> {
    match (value, index) {
        (Value::List(list), Value::Integer(i)) => Ok(list_get(list, *i).cloned().unwrap_or_default()),
        (Value::Map(map), Value::String(key)) => Ok(map.get(key).cloned().unwrap_or_default()),
        (Value::String(s), Value::Integer(i)) => {
            let chars: Vec<char> = s.chars().collect();
            Ok(list_get(&chars, *i)
                .map(|c| Value::String(c.to_string()))
                .unwrap_or_default())
        }
        (value, index) => Err(Error::render(
            format!("cannot index {} with {}", value.human(), index.human()),
            source,
            span,
        )),
    }
}

fn list_get<T>(list: &[T], i: i64) -> Option<&T> {
    let i = if i < 0 {
        list.len().checked_sub(i.unsigned_abs() as usize)?
    } else {
        i as usize
    };
    list.get(i)
}

/// Applies a binary operator, `&&` and `||` are handled by the caller since
/// they short circuit.
pub fn binary(source: &str, op: BinOp, lhs: Value, rhs: Value, span: Span) -> Result<Value> {
    let err = |lhs: &Value, rhs: &Value| {
        Error::render(
            format!(
                "cannot apply `{}` to {} and {}",
                op.human(),
                lhs.human(),
                rhs.human()
            ),
            source,
            span,
        )
    };
    let value = match op {
        BinOp::And | BinOp::Or => unreachable!(),
        BinOp::Eq => Value::Bool(lhs == rhs),
        BinOp::Ne => Value::Bool(lhs != rhs),
        BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => {
            let ord = compare(&lhs, &rhs).ok_or_else(|| err(&lhs, &rhs))?;
            Value::Bool(match op {
                BinOp::Lt => ord == Ordering::Less,
                BinOp::Le => ord != Ordering::Greater,
                BinOp::Gt => ord == Ordering::Greater,
                _ => ord != Ordering::Less,
            })
        }
        BinOp::Add => match (lhs, rhs) {
            (Value::Integer(a), Value::Integer(b)) => Value::Integer(
                a.checked_add(b)
                    .ok_or_else(|| Error::render("integer overflow", source, span))?,
            ),
            (Value::Integer(a), Value::Float(b)) => Value::Float(a as f64 + b),
            (Value::Float(a), Value::Integer(b)) => Value::Float(a + b as f64),
            (Value::Float(a), Value::Float(b)) => Value::Float(a + b),
            (Value::String(a), Value::String(b)) => Value::String(a + &b),
            (Value::List(mut a), Value::List(b)) => {
                a.extend(b);
                Value::List(a)
            }
            (lhs, rhs) => return Err(err(&lhs, &rhs)),
        },
        BinOp::Sub => match (lhs, rhs) {
            (Value::Integer(a), Value::Integer(b)) => Value::Integer(
                a.checked_sub(b)
                    .ok_or_else(|| Error::render("integer overflow", source, span))?,
            ),
            (Value::Integer(a), Value::Float(b)) => Value::Float(a as f64 - b),
            (Value::Float(a), Value::Integer(b)) => Value::Float(a - b as f64),
            (Value::Float(a), Value::Float(b)) => Value::Float(a - b),
            (lhs, rhs) => return Err(err(&lhs, &rhs)),
        },
    };
    Ok(value)
}

fn compare(lhs: &Value, rhs: &Value) -> Option<Ordering> {
    match (lhs, rhs) {
        (Value::Integer(a), Value::Integer(b)) => Some(a.cmp(b)),
        (Value::Integer(a), Value::Float(b)) => (*a as f64).partial_cmp(b),
        (Value::Float(a), Value::Integer(b)) => a.partial_cmp(&(*b as f64)),
        (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

/// Calls a builtin method on a value.
///
/// Returns `None` if there is no such builtin method for the value.
pub fn call_builtin(
    source: &str,
    receiver: &Value,
    name: &str,
    args: &[Value],
    span: Span,
) -> Result<Option<Value>> {
    let wrong = |n: usize| {
        Error::render(
            format!(
                "wrong number of arguments to `{name}` (given {}, expected {n})",
                args.len()
            ),
            source,
            span,
        )
    };
    let arity = |n: usize| if args.len() == n { Ok(()) } else { Err(wrong(n)) };

    let value = match (name, receiver) {
        ("to_s", v) => {
            arity(0)?;
            Value::String(to_s(v))
        }
        ("inspect", v) => {
            arity(0)?;
            Value::String(inspect(v))
        }
        ("nil?", v) => {
            arity(0)?;
            Value::Bool(matches!(v, Value::None))
        }
        ("upcase", Value::String(s)) => {
            arity(0)?;
            Value::String(s.to_uppercase())
        }
        ("downcase", Value::String(s)) => {
            arity(0)?;
            Value::String(s.to_lowercase())
        }
        ("capitalize", Value::String(s)) => {
            arity(0)?;
            let mut chars = s.chars();
            Value::String(match chars.next() {
                Some(c) => c.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            })
        }
        ("strip", Value::String(s)) => {
            arity(0)?;
            Value::String(s.trim().to_owned())
        }
        ("size" | "length", Value::String(s)) => {
            arity(0)?;
            Value::from(s.chars().count())
        }
        ("size" | "length", Value::List(list)) => {
            arity(0)?;
            Value::from(list.len())
        }
        ("size" | "length", Value::Map(map)) => {
            arity(0)?;
            Value::from(map.len())
        }
        ("empty?", Value::String(s)) => {
            arity(0)?;
            Value::Bool(s.is_empty())
        }
        ("empty?", Value::List(list)) => {
            arity(0)?;
            Value::Bool(list.is_empty())
        }
        ("empty?", Value::Map(map)) => {
            arity(0)?;
            Value::Bool(map.is_empty())
        }
        ("include?", Value::String(s)) => {
            arity(1)?;
            match &args[0] {
                Value::String(sub) => Value::Bool(s.contains(sub.as_str())),
                arg => {
                    return Err(Error::render(
                        format!("expected string argument, found {}", arg.human()),
                        source,
                        span,
                    ))
                }
            }
        }
        ("include?", Value::List(list)) => {
            arity(1)?;
            Value::Bool(list.contains(&args[0]))
        }
        ("include?" | "key?", Value::Map(map)) => {
            arity(1)?;
            Value::Bool(args[0].as_str().map_or(false, |k| map.contains_key(k)))
        }
        ("keys", Value::Map(map)) => {
            arity(0)?;
            Value::List(map.keys().cloned().map(Value::String).collect())
        }
        ("values", Value::Map(map)) => {
            arity(0)?;
            Value::List(map.values().cloned().collect())
        }
        ("first", Value::List(list)) => {
            arity(0)?;
            list.first().cloned().unwrap_or_default()
        }
        ("last", Value::List(list)) => {
            arity(0)?;
            list.last().cloned().unwrap_or_default()
        }
        ("reverse", Value::List(list)) => {
            arity(0)?;
            Value::List(list.iter().rev().cloned().collect())
        }
        ("reverse", Value::String(s)) => {
            arity(0)?;
            Value::String(s.chars().rev().collect())
        }
        ("join", Value::List(list)) => {
            let sep = match args {
                [] => String::new(),
                [sep] => to_s(sep),
                _ => return Err(wrong(1)),
            };
            let parts: List<String> = list.iter().map(to_s).collect();
            Value::String(parts.join(&sep))
        }
        ("to_i", Value::Integer(n)) => {
            arity(0)?;
            Value::Integer(*n)
        }
        ("to_i", Value::Float(n)) => {
            arity(0)?;
            Value::Integer(*n as i64)
        }
        ("to_i", Value::String(s)) => {
            arity(0)?;
            Value::Integer(s.trim().parse().unwrap_or(0))
        }
        ("to_a", Value::Map(map)) => {
            arity(0)?;
            Value::List(pairs(map))
        }
        _ => return Ok(None),
    };
    Ok(Some(value))
}

/// Returns the entries of a map as `[key, value]` lists.
pub fn pairs(map: &Map<String, Value>) -> List<Value> {
    map.iter()
        .map(|(k, v)| Value::List(vec![Value::String(k.clone()), v.clone()]))
        .collect()
}
