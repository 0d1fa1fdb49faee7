//! The built-in `"coerce"` filter.
//!
//! Transport inputs arrive as strings (query strings, path parameters, form
//! bodies) or loosely-typed JSON. Coercion converts each declared argument
//! into the type its [`ArgSpec`] names, best effort:
//!
//! | Declared | Accepted raw forms |
//! |---|---|
//! | integer | `"10"`, `" 10 "`, `10.0` (whole floats below 2^53 only) |
//! | float | `"2.5"`, any JSON number |
//! | boolean | `"true"`/`"false"`, `"1"`/`"0"`, `"yes"`/`"no"`, `"on"`/`"off"`, `1`/`0` |
//! | string | any string, numbers and booleans rendered as text |
//! | list | an array (items coerced), or a single scalar wrapped into one |
//! | struct | an object (fields coerced recursively) |
//!
//! Anything else passes through unchanged. Arguments the schema does not
//! name are never touched.

use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::{Number, Value};

use crate::input::Input;
use crate::schema::{ArgSpec, ArgType, Schema};
use crate::strategy::Filter;

/// The default filter strategy.
pub struct Coerce;

impl Filter for Coerce {
    fn filter(&self, input: Input, schema: Arc<Schema>) -> BoxFuture<'static, Input> {
        Box::pin(async move { coerce(input, &schema) })
    }
}

/// Coerces every argument `schema` declares and fills in defaults.
pub fn coerce(mut input: Input, schema: &Schema) -> Input {
    for (name, spec) in schema.iter() {
        let coerced = match input.remove(name) {
            None => spec.default().cloned(),
            Some(Value::Null) => Some(spec.default().cloned().unwrap_or(Value::Null)),
            Some(raw) => Some(coerce_value(raw, spec)),
        };
        if let Some(value) = coerced {
            input.insert(name, value);
        }
    }
    input
}

fn coerce_value(raw: Value, spec: &ArgSpec) -> Value {
    match spec.ty() {
        ArgType::Any => raw,
        ArgType::String => to_string(raw),
        ArgType::Integer => to_integer(raw),
        ArgType::Float => to_float(raw),
        ArgType::Boolean => to_boolean(raw),
        ArgType::Struct(fields) => match raw {
            Value::Object(map) => Value::Object(coerce(Input::from(map), fields).into_map()),
            other => other,
        },
        ArgType::List(item) => match raw {
            Value::Array(items) => Value::Array(items.into_iter().map(|v| coerce_item(v, item)).collect()),
            scalar @ (Value::String(_) | Value::Number(_) | Value::Bool(_)) => {
                Value::Array(vec![coerce_item(scalar, item)])
            }
            other => other,
        },
    }
}

fn coerce_item(raw: Value, spec: &ArgSpec) -> Value {
    match raw {
        Value::Null => spec.default().cloned().unwrap_or(Value::Null),
        raw => coerce_value(raw, spec),
    }
}

fn to_string(raw: Value) -> Value {
    match raw {
        Value::Number(n) => Value::String(n.to_string()),
        Value::Bool(b) => Value::String(b.to_string()),
        other => other,
    }
}

fn to_integer(raw: Value) -> Value {
    match raw {
        Value::String(s) => {
            let trimmed = s.trim();
            if let Ok(n) = trimmed.parse::<i64>() {
                return Value::from(n);
            }
            if let Ok(n) = trimmed.parse::<u64>() {
                return Value::from(n);
            }
            match trimmed.parse::<f64>().ok().and_then(whole) {
                Some(n) => Value::from(n),
                None => Value::String(s),
            }
        }
        Value::Number(n) if n.as_i64().is_none() && n.as_u64().is_none() => {
            match n.as_f64().and_then(whole) {
                Some(i) => Value::from(i),
                None => Value::Number(n),
            }
        }
        other => other,
    }
}

/// Floats below 2^53 in magnitude convert exactly; beyond that an `f64`
/// no longer tells neighbouring integers apart.
const EXACT_LIMIT: f64 = 9_007_199_254_740_992.0;

/// `10.0` → `10`. Fractions, non-finite and inexact magnitudes stay
/// unconverted.
fn whole(f: f64) -> Option<i64> {
    (f.fract() == 0.0 && f.abs() < EXACT_LIMIT).then_some(f as i64)
}

fn to_float(raw: Value) -> Value {
    match raw {
        Value::String(s) => match s.trim().parse::<f64>().ok().and_then(Number::from_f64) {
            Some(n) => Value::Number(n),
            None => Value::String(s),
        },
        other => other,
    }
}

fn to_boolean(raw: Value) -> Value {
    match raw {
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Value::Bool(true),
            "false" | "0" | "no" | "off" => Value::Bool(false),
            _ => Value::String(s),
        },
        Value::Number(n) => match n.as_i64() {
            Some(1) => Value::Bool(true),
            Some(0) => Value::Bool(false),
            _ => Value::Number(n),
        },
        other => other,
    }
}
