//! Declarative endpoint descriptions.
//!
//! A [`RouteDefinition`] says *what* an endpoint is: its verb, its
//! arguments, who may call it and the handler that serves it. It holds no
//! resolved strategies; the [`Builder`](crate::Builder) compiles it into a
//! [`Route`](crate::Route).
//!
//! Definitions are grouped into a [`RouteTree`]. A definition's location in
//! the tree gives its URL unless it carries an explicit `path`:
//!
//! | Location | Explicit path | URL (mount `/v1`) |
//! |---|---|---|
//! | `messages/index` | | `/v1/messages` |
//! | `messages/[id]` | | `/v1/messages/{id}` |
//! | `users/_id/avatar` | | `/v1/users/{id}/avatar` |
//! | `files/[...rest]` | | `/v1/files/{*rest}` |
//! | `messages/[id]` | `search` | `/v1/messages/search` |
//! | `posts/index` | `[slug]` | `/v1/posts/{slug}` |
//! | `messages/[id]` | `/ping` | `/ping` |

use std::fmt;
use std::sync::Arc;

use crate::authorize::AuthorizeRef;
use crate::handler::{BoxedHandler, Handler};
use crate::method::Method;
use crate::schema::{ArgSpec, Schema};
use crate::strategy::{Authenticate, Authorize};

/// Whether, and how, a route authenticates its caller.
#[derive(Clone, Default)]
pub enum Authentication {
    #[default]
    Off,
    /// Use the builder's global authenticate function.
    Global,
    /// Use a route-specific function instead of the global one.
    Custom(Arc<dyn Authenticate>),
}

/// The `authorize` field of a definition.
#[derive(Clone, Debug)]
pub enum AuthorizeSpec {
    One(AuthorizeRef),
    /// Compiled into an [`AnyOf`](crate::AnyOf) combinator.
    Any(Vec<AuthorizeRef>),
}

/// One endpoint, declared.
///
/// ```rust
/// use waypost::{ArgSpec, Context, Input, Rejection, RouteDefinition};
///
/// async fn create(input: Input, _cx: Context) -> Result<String, Rejection> {
///     Ok(format!("hello {}", input.str("name").unwrap_or_default()))
/// }
///
/// let def = RouteDefinition::post(create)
///     .arg("name", ArgSpec::string().required())
///     .authenticated();
/// ```
#[derive(Clone)]
pub struct RouteDefinition {
    method: Method,
    path: Option<String>,
    handler: BoxedHandler,
    args: Schema,
    authentication: Authentication,
    authorize: Option<AuthorizeSpec>,
}

impl RouteDefinition {
    pub fn new(method: Method, handler: impl Handler) -> Self {
        Self {
            method,
            path: None,
            handler: handler.into_boxed_handler(),
            args: Schema::new(),
            authentication: Authentication::Off,
            authorize: None,
        }
    }

    pub fn get(handler: impl Handler) -> Self { Self::new(Method::Get, handler) }
    pub fn post(handler: impl Handler) -> Self { Self::new(Method::Post, handler) }
    pub fn put(handler: impl Handler) -> Self { Self::new(Method::Put, handler) }
    pub fn patch(handler: impl Handler) -> Self { Self::new(Method::Patch, handler) }
    pub fn delete(handler: impl Handler) -> Self { Self::new(Method::Delete, handler) }

    /// Overrides the path derived from the tree location. Relative paths
    /// are appended to the location's directory and use the same segment
    /// syntax as locations (`[id]`, `_id`, `[...rest]`). Absolute ones
    /// replace everything and are taken as matcher syntax.
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn arg(mut self, name: impl Into<String>, spec: ArgSpec) -> Self {
        self.args.insert(name.into(), spec);
        self
    }

    pub fn args(mut self, schema: Schema) -> Self {
        self.args = schema;
        self
    }

    /// Requires the global authenticate function to produce an identity.
    pub fn authenticated(mut self) -> Self {
        self.authentication = Authentication::Global;
        self
    }

    /// Requires an identity from `f` instead of the global function.
    pub fn authenticate_with(mut self, f: impl Authenticate) -> Self {
        self.authentication = Authentication::Custom(Arc::new(f));
        self
    }

    /// A single authorize function, by registered name or embedded.
    pub fn authorize(mut self, rule: impl Into<AuthorizeRef>) -> Self {
        self.authorize = Some(AuthorizeSpec::One(rule.into()));
        self
    }

    pub fn authorize_with(self, f: impl Authorize) -> Self {
        self.authorize(AuthorizeRef::func(f))
    }

    /// Passes if any of `rules` allows.
    pub fn authorize_any<I, R>(mut self, rules: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<AuthorizeRef>,
    {
        self.authorize = Some(AuthorizeSpec::Any(rules.into_iter().map(Into::into).collect()));
        self
    }

    pub fn method(&self) -> Method { self.method }
    pub fn explicit_path(&self) -> Option<&str> { self.path.as_deref() }
    pub fn schema(&self) -> &Schema { &self.args }
    pub fn authentication(&self) -> &Authentication { &self.authentication }
    pub fn authorize_spec(&self) -> Option<&AuthorizeSpec> { self.authorize.as_ref() }
    pub(crate) fn handler(&self) -> &BoxedHandler { &self.handler }
}

impl fmt::Debug for RouteDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteDefinition")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("args", &self.args)
            .field("authorize", &self.authorize)
            .finish_non_exhaustive()
    }
}

// ── RouteTree ─────────────────────────────────────────────────────────────────

/// Definitions keyed by their location under a mount prefix.
#[derive(Debug, Default)]
pub struct RouteTree {
    mount: String,
    entries: Vec<(String, RouteDefinition)>,
}

impl RouteTree {
    pub fn new(mount: impl Into<String>) -> Self {
        Self { mount: mount.into(), entries: Vec::new() }
    }

    /// Places `definition` at `location` (slash-separated, e.g. `"messages/[id]"`).
    pub fn at(mut self, location: impl Into<String>, definition: RouteDefinition) -> Self {
        self.entries.push((location.into(), definition));
        self
    }

    /// Resolves every definition to its URL path.
    pub(crate) fn into_routes(self) -> impl Iterator<Item = (String, RouteDefinition)> {
        let mount = self.mount;
        self.entries.into_iter().map(move |(location, def)| {
            let path = derive_path(&mount, &location, def.explicit_path());
            (path, def)
        })
    }
}

/// Computes a definition's URL path from the mount prefix, its tree
/// location and its optional explicit path.
pub fn derive_path(mount: &str, location: &str, explicit: Option<&str>) -> String {
    if let Some(path) = explicit.filter(|p| p.starts_with('/')) {
        return join(segments(path).map(str::to_owned));
    }

    let mut location: Vec<&str> = segments(location).collect();
    let mount = segments(mount).map(str::to_owned);

    match explicit {
        Some(relative) => {
            location.pop();
            let dir = location.into_iter().map(url_segment);
            join(mount.chain(dir).chain(segments(relative).map(url_segment)))
        }
        None => {
            if location.last() == Some(&"index") {
                location.pop();
            }
            join(mount.chain(location.into_iter().map(url_segment)))
        }
    }
}

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

fn url_segment(segment: &str) -> String {
    if let Some(name) = segment.strip_prefix("[...").and_then(|s| s.strip_suffix(']')) {
        return format!("{{*{name}}}");
    }
    if let Some(name) = segment.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
        return format!("{{{name}}}");
    }
    match segment.strip_prefix('_') {
        Some(name) if !name.is_empty() => format!("{{{name}}}"),
        _ => segment.to_owned(),
    }
}

fn join(segments: impl Iterator<Item = String>) -> String {
    let mut path = String::new();
    for segment in segments {
        path.push('/');
        path.push_str(&segment);
    }
    if path.is_empty() {
        path.push('/');
    }
    path
}
