//! Value coercers for path arguments, request content and response keys.

use serde_json::Value;
use std::{fmt, sync::Arc};
use thiserror::Error;

/// Why a value was rejected by a [`Coercer`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct CoerceError(pub String);

impl CoerceError {
    pub fn new<M: Into<String>>(message: M) -> Self {
        Self(message.into())
    }
}

type CustomFn = dyn Fn(&Value) -> Result<Value, CoerceError> + Send + Sync;

/// Converts an untyped input value into a typed one.
///
/// # Examples
/// ```
/// use micro_rest::{Coercer, Group};
/// use serde_json::json;
///
/// assert_eq!(Coercer::Int.apply(&json!("42")), Ok(json!(42)));
/// assert_eq!(Coercer::Bool.apply(&json!("t")), Ok(json!(true)));
///
/// let color = Coercer::Group(Group::new(["RED", "GREEN"]).uppercase());
/// assert_eq!(color.apply(&json!("red")), Ok(json!("RED")));
/// ```
#[derive(Clone)]
pub enum Coercer {
    /// Any value, as text
    Str,
    /// Integral number (`must be an int`)
    Int,
    /// Integral number above zero (`must be a positive int`)
    Count,
    /// `1`/`true`/`t` or `0`/`false`/`f`, any case (`must be a boolean`)
    Bool,
    /// One value of a fixed set
    Group(Group),
    Custom(Arc<CustomFn>),
}

impl Coercer {
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&Value) -> Result<Value, CoerceError> + Send + Sync + 'static,
    {
        Self::Custom(Arc::new(f))
    }

    pub fn apply(&self, value: &Value) -> Result<Value, CoerceError> {
        match self {
            Coercer::Str => Ok(Value::String(as_text(value))),
            Coercer::Int => as_int(value)
                .map(Value::from)
                .ok_or_else(|| CoerceError::new("must be an int")),
            Coercer::Count => as_int(value)
                .filter(|n| *n > 0)
                .map(Value::from)
                .ok_or_else(|| CoerceError::new("must be a positive int")),
            Coercer::Bool => as_bool(value)
                .map(Value::Bool)
                .ok_or_else(|| CoerceError::new("must be a boolean")),
            Coercer::Group(group) => group.apply(value),
            Coercer::Custom(f) => f(value),
        }
    }
}

impl fmt::Debug for Coercer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Coercer::Str => f.write_str("Str"),
            Coercer::Int => f.write_str("Int"),
            Coercer::Count => f.write_str("Count"),
            Coercer::Bool => f.write_str("Bool"),
            Coercer::Group(group) => f.debug_tuple("Group").field(group).finish(),
            Coercer::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Strings keep their own text; other values become their JSON text.
pub(crate) fn as_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn as_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && *f >= i64::MIN as f64 && *f <= i64::MAX as f64)
                .map(|f| f as i64)
        }),
        Value::Bool(b) => Some(i64::from(*b)),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

fn as_bool(value: &Value) -> Option<bool> {
    if let Value::Bool(b) = value {
        return Some(*b);
    }

    match as_text(value).to_ascii_uppercase().as_str() {
        "1" | "TRUE" | "T" => Some(true),
        "0" | "FALSE" | "F" => Some(false),
        _ => None,
    }
}

/// Membership check against a named set of values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    values: Vec<String>,
    case: Case,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Case {
    Keep,
    Upper,
    Lower,
}

impl Group {
    pub fn new<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            values: values.into_iter().map(Into::into).collect(),
            case: Case::Keep,
        }
    }

    /// Upper-case the input before the check.
    pub fn uppercase(mut self) -> Self {
        self.case = Case::Upper;
        self
    }

    /// Lower-case the input before the check.
    pub fn lowercase(mut self) -> Self {
        self.case = Case::Lower;
        self
    }

    fn apply(&self, value: &Value) -> Result<Value, CoerceError> {
        let text = as_text(value);
        let text = match self.case {
            Case::Keep => text,
            Case::Upper => text.to_uppercase(),
            Case::Lower => text.to_lowercase(),
        };

        match self.values.contains(&text) {
            true => Ok(Value::String(text)),
            false => Err(CoerceError(format!(
                "must be one of: {}",
                self.values.join(", ")
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn builtin() {
        #[rustfmt::skip]
        let cases = [
            (Coercer::Str,   json!("abc"),   Ok(json!("abc"))),
            (Coercer::Str,   json!(12),      Ok(json!("12"))),
            (Coercer::Str,   json!([1]),     Ok(json!("[1]"))),

            (Coercer::Int,   json!("42"),    Ok(json!(42))),
            (Coercer::Int,   json!(" -7 "),  Ok(json!(-7))),
            (Coercer::Int,   json!(3.0),     Ok(json!(3))),
            (Coercer::Int,   json!(true),    Ok(json!(1))),
            (Coercer::Int,   json!(3.5),     Err("must be an int")),
            (Coercer::Int,   json!("3.0"),   Err("must be an int")),
            (Coercer::Int,   json!("abc"),   Err("must be an int")),
            (Coercer::Int,   json!(null),    Err("must be an int")),

            (Coercer::Count, json!("5"),     Ok(json!(5))),
            (Coercer::Count, json!(0),       Err("must be a positive int")),
            (Coercer::Count, json!("-1"),    Err("must be a positive int")),
            (Coercer::Count, json!("x"),     Err("must be a positive int")),

            (Coercer::Bool,  json!("TRUE"),  Ok(json!(true))),
            (Coercer::Bool,  json!("t"),     Ok(json!(true))),
            (Coercer::Bool,  json!(1),       Ok(json!(true))),
            (Coercer::Bool,  json!("False"), Ok(json!(false))),
            (Coercer::Bool,  json!("0"),     Ok(json!(false))),
            (Coercer::Bool,  json!(false),   Ok(json!(false))),
            (Coercer::Bool,  json!("yes"),   Err("must be a boolean")),
        ];

        for (coercer, input, expected) in cases {
            let result = coercer.apply(&input);
            assert_eq!(result, expected.map_err(CoerceError::new), "{coercer:?} {input}");
        }
    }

    #[test]
    fn group() {
        let plain = Coercer::Group(Group::new(["a", "b"]));
        assert_eq!(plain.apply(&json!("a")), Ok(json!("a")));
        assert_eq!(
            plain.apply(&json!("A")),
            Err(CoerceError::new("must be one of: a, b"))
        );

        let upper = Coercer::Group(Group::new(["RED", "GREEN"]).uppercase());
        assert_eq!(upper.apply(&json!("green")), Ok(json!("GREEN")));

        let lower = Coercer::Group(Group::new(["x"]).lowercase());
        assert_eq!(lower.apply(&json!("X")), Ok(json!("x")));
    }

    #[test]
    fn custom() {
        let even = Coercer::custom(|value| match value.as_i64() {
            Some(n) if n % 2 == 0 => Ok(json!(n)),
            _ => Err(CoerceError::new("must be even")),
        });

        assert_eq!(even.apply(&json!(4)), Ok(json!(4)));
        assert_eq!(even.apply(&json!(3)), Err(CoerceError::new("must be even")));
    }
}
