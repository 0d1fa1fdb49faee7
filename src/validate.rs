//! The built-in `"schema"` validator.
//!
//! Checks typed input against the route's [`Schema`]: presence of required
//! arguments, type, then [`Rules`](crate::Rules). Errors are collected for
//! every argument, not just the first, and keyed by argument path so a
//! client can attach messages to form fields.
//!
//! A pure function of `(input, schema)`: the same input always yields the
//! same error set.

use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::Value;

use crate::context::Context;
use crate::failure::ErrorSet;
use crate::input::Input;
use crate::schema::{ArgSpec, ArgType, Schema};
use crate::strategy::Validate;

/// The default validate strategy.
pub struct SchemaCheck;

impl Validate for SchemaCheck {
    fn validate(&self, input: Input, schema: Arc<Schema>, _cx: Context) -> BoxFuture<'static, Option<ErrorSet>> {
        Box::pin(async move { check(&input, &schema) })
    }
}

/// Returns `None` when `input` satisfies `schema`.
pub fn check(input: &Input, schema: &Schema) -> Option<ErrorSet> {
    let mut errors = ErrorSet::new();
    check_fields(input.as_map(), schema, "", &mut errors);
    (!errors.is_empty()).then_some(errors)
}

fn check_fields(fields: &serde_json::Map<String, Value>, schema: &Schema, prefix: &str, errors: &mut ErrorSet) {
    for (name, spec) in schema.iter() {
        let path = if prefix.is_empty() { name.to_owned() } else { format!("{prefix}.{name}") };
        check_value(fields.get(name), spec, &path, errors);
    }
}

fn check_value(value: Option<&Value>, spec: &ArgSpec, path: &str, errors: &mut ErrorSet) {
    let value = match value {
        None | Some(Value::Null) => {
            if spec.is_required() {
                push(errors, path, "is required".to_owned());
            }
            return;
        }
        Some(v) => v,
    };

    let type_ok = match spec.ty() {
        ArgType::Any => true,
        ArgType::String => value.is_string(),
        ArgType::Integer => value.is_i64() || value.is_u64(),
        ArgType::Float => value.is_number(),
        ArgType::Boolean => value.is_boolean(),
        ArgType::Struct(_) => value.is_object(),
        ArgType::List(_) => value.is_array(),
    };
    if !type_ok {
        push(errors, path, format!("must be {}", spec.ty().describe()));
        return;
    }

    check_rules(value, spec, path, errors);

    match (spec.ty(), value) {
        (ArgType::Struct(fields), Value::Object(map)) => check_fields(map, fields, path, errors),
        (ArgType::List(item), Value::Array(items)) => {
            for (i, v) in items.iter().enumerate() {
                check_value(Some(v), item, &format!("{path}[{i}]"), errors);
            }
        }
        _ => {}
    }
}

fn check_rules(value: &Value, spec: &ArgSpec, path: &str, errors: &mut ErrorSet) {
    let rules = spec.rules();

    if let Some(n) = value.as_f64() {
        if let Some(min) = rules.min.filter(|min| n < *min) {
            push(errors, path, format!("must be at least {min}"));
        }
        if let Some(max) = rules.max.filter(|max| n > *max) {
            push(errors, path, format!("must be at most {max}"));
        }
    }

    let length = match value {
        Value::String(s) => Some((s.chars().count(), "characters")),
        Value::Array(items) => Some((items.len(), "items")),
        _ => None,
    };
    if let Some((len, unit)) = length {
        if let Some(min) = rules.min_length.filter(|min| len < *min) {
            push(errors, path, format!("must have at least {min} {unit}"));
        }
        if let Some(max) = rules.max_length.filter(|max| len > *max) {
            push(errors, path, format!("must have at most {max} {unit}"));
        }
    }

    if !rules.one_of.is_empty() && !rules.one_of.contains(value) {
        let allowed: Vec<String> = rules.one_of.iter().map(render).collect();
        push(errors, path, format!("must be one of: {}", allowed.join(", ")));
    }
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn push(errors: &mut ErrorSet, path: &str, message: String) {
    errors.entry(path.to_owned()).or_default().push(message);
}
