//! Argument schemas.
//!
//! A [`Schema`] names the arguments a route accepts. Each [`ArgSpec`] tells
//! the filter phase what to coerce a raw value into and the validate phase
//! what to accept.
//!
//! ```rust
//! use waypost::{ArgSpec, Schema};
//!
//! let schema = Schema::new()
//!     .arg("title", ArgSpec::string().required().max_length(120))
//!     .arg("page",  ArgSpec::integer().min(1.0).default_value(1))
//!     .arg("tags",  ArgSpec::list(ArgSpec::string()));
//!
//! assert_eq!(schema.len(), 3);
//! ```

use std::collections::BTreeMap;

use serde_json::Value;

/// What an argument is coerced to and checked against.
#[derive(Clone, Debug, PartialEq)]
pub enum ArgType {
    /// Accepted as-is. No coercion, no type check.
    Any,
    String,
    Integer,
    Float,
    Boolean,
    /// A JSON object described by a nested schema.
    Struct(Schema),
    /// A JSON array whose items all follow the element spec.
    List(Box<ArgSpec>),
}

impl ArgType {
    /// Human name used in validation messages.
    pub(crate) fn describe(&self) -> &'static str {
        match self {
            Self::Any       => "any value",
            Self::String    => "a string",
            Self::Integer   => "an integer",
            Self::Float     => "a number",
            Self::Boolean   => "a boolean",
            Self::Struct(_) => "an object",
            Self::List(_)   => "a list",
        }
    }
}

/// Acceptance rules checked by the built-in validator once the type matches.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Rules {
    pub min: Option<f64>,
    pub max: Option<f64>,
    /// Characters for strings, items for lists.
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    pub one_of: Vec<Value>,
}

/// One argument's declaration.
#[derive(Clone, Debug, PartialEq)]
pub struct ArgSpec {
    ty: ArgType,
    required: bool,
    rules: Rules,
    default: Option<Value>,
}

impl ArgSpec {
    pub fn new(ty: ArgType) -> Self {
        Self { ty, required: false, rules: Rules::default(), default: None }
    }

    pub fn any() -> Self { Self::new(ArgType::Any) }
    pub fn string() -> Self { Self::new(ArgType::String) }
    pub fn integer() -> Self { Self::new(ArgType::Integer) }
    pub fn float() -> Self { Self::new(ArgType::Float) }
    pub fn boolean() -> Self { Self::new(ArgType::Boolean) }
    pub fn object(schema: Schema) -> Self { Self::new(ArgType::Struct(schema)) }
    pub fn list(item: ArgSpec) -> Self { Self::new(ArgType::List(Box::new(item))) }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Fallback used when the argument is missing or `null` after coercion.
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn min(mut self, min: f64) -> Self {
        self.rules.min = Some(min);
        self
    }

    pub fn max(mut self, max: f64) -> Self {
        self.rules.max = Some(max);
        self
    }

    pub fn min_length(mut self, len: usize) -> Self {
        self.rules.min_length = Some(len);
        self
    }

    pub fn max_length(mut self, len: usize) -> Self {
        self.rules.max_length = Some(len);
        self
    }

    pub fn one_of<I, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.rules.one_of = values.into_iter().map(Into::into).collect();
        self
    }

    pub fn ty(&self) -> &ArgType { &self.ty }
    pub fn is_required(&self) -> bool { self.required }
    pub fn rules(&self) -> &Rules { &self.rules }
    pub fn default(&self) -> Option<&Value> { self.default.as_ref() }
}

/// Argument name → spec. Ordered so validation walks arguments the same way
/// every time.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Schema(BTreeMap<String, ArgSpec>);

impl Schema {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Adds an argument. Returns `self` for chaining.
    pub fn arg(mut self, name: impl Into<String>, spec: ArgSpec) -> Self {
        self.0.insert(name.into(), spec);
        self
    }

    pub(crate) fn insert(&mut self, name: String, spec: ArgSpec) {
        self.0.insert(name, spec);
    }

    pub fn get(&self, name: &str) -> Option<&ArgSpec> {
        self.0.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ArgSpec)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
