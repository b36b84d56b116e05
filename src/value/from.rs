//! Conversions from host data into template values.
//!
//! Absent host data (`None`) becomes `nil` and integers that don't fit in an
//! `i64` fall back to floats, the way Ruby numerics widen.

use crate::taglib::TagNamespace;
use crate::value::Map;
use crate::Value;

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Self::Integer(n.into())
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Integer(n)
    }
}

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        i64::try_from(n).map_or(Self::Float(n as f64), Self::Integer)
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Self::from(n as u64)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_owned())
    }
}

impl<V: Into<Value>> From<Option<V>> for Value {
    fn from(opt: Option<V>) -> Self {
        opt.map_or(Self::None, Into::into)
    }
}

impl<V: Into<Value>> From<Vec<V>> for Value {
    fn from(list: Vec<V>) -> Self {
        Self::List(list.into_iter().map(Into::into).collect())
    }
}

impl<V: Into<Value>, const N: usize> From<[V; N]> for Value {
    fn from(list: [V; N]) -> Self {
        Self::List(list.into_iter().map(Into::into).collect())
    }
}

/// A map from name/value pairs, e.g. the variables a template is rendered
/// with.
impl<V: Into<Value>, const N: usize> From<[(&str, V); N]> for Value {
    fn from(pairs: [(&str, V); N]) -> Self {
        Self::Map(pairs.into_iter().map(|(k, v)| (k.to_owned(), v.into())).collect())
    }
}

impl From<Map<String, Value>> for Value {
    fn from(map: Map<String, Value>) -> Self {
        Self::Map(map)
    }
}

impl From<TagNamespace> for Value {
    fn from(ns: TagNamespace) -> Self {
        Self::Namespace(ns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_host_numbers() {
        assert_eq!(Value::from(3usize), Value::Integer(3));
        assert_eq!(Value::from(u64::MAX), Value::Float(u64::MAX as f64));
    }

    #[test]
    fn from_absent_is_nil() {
        assert_eq!(Value::from(None::<&str>), Value::None);
        assert_eq!(Value::from(Some("x")), Value::from("x"));
    }
}
