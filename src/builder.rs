//! Strategy registry and route compilation.
//!
//! The builder owns the one global strategy set of an application: the
//! filter and validate strategies, the authenticate function, the named
//! authorize functions and the transport. [`Builder::build`] resolves every
//! name a definition uses against that set, once. A name that does not
//! resolve fails the build; nothing is resolved per request.
//!
//! ```rust
//! use waypost::{Builder, Context, EngineOptions, Input, Rejection, RouteDefinition, RouteTree};
//!
//! async fn list(_input: Input, _cx: Context) -> Result<Vec<u32>, Rejection> {
//!     Ok(vec![1, 2, 3])
//! }
//!
//! let app = Builder::new()
//!     .select_engine("hyper", EngineOptions::default().prefix("/api"))
//!     .mount(RouteTree::new("/").at("messages/index", RouteDefinition::get(list)))
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(app.routes()[0].path(), "/api/messages");
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use http::Extensions;
use tracing::{debug, info};

use crate::authorize::{AnyOf, AuthorizeRef};
use crate::config::{Config, EngineOptions};
use crate::definition::{Authentication, AuthorizeSpec, RouteDefinition, RouteTree, derive_path};
use crate::engine::{Engine, Transport};
use crate::error::{ConfigError, Error};
use crate::filter::Coerce;
use crate::route::Route;
use crate::router::RouteTable;
use crate::server::Server;
use crate::strategy::{AcceptAll, Authenticate, Authorize, Filter, Passthrough, Validate};
use crate::validate::SchemaCheck;

/// A strategy chosen by registered name or supplied directly.
enum Choice<T: ?Sized> {
    Named(String),
    Given(Arc<T>),
}

impl<T: ?Sized> Choice<T> {
    fn resolve(
        &self,
        registry: &HashMap<String, Arc<T>>,
        unknown: impl FnOnce(String) -> ConfigError,
    ) -> Result<Arc<T>, ConfigError> {
        match self {
            Self::Given(strategy) => Ok(Arc::clone(strategy)),
            Self::Named(name) => registry.get(name).cloned().ok_or_else(|| unknown(name.clone())),
        }
    }
}

/// Named strategies, filled before [`Builder::build`] and read-only during it.
struct Registry {
    filters: HashMap<String, Arc<dyn Filter>>,
    validators: HashMap<String, Arc<dyn Validate>>,
    authorizers: HashMap<String, Arc<dyn Authorize>>,
    transports: HashMap<String, Arc<dyn Transport>>,
    authenticate: Option<Arc<dyn Authenticate>>,
}

impl Default for Registry {
    fn default() -> Self {
        let filters: HashMap<String, Arc<dyn Filter>> = HashMap::from([
            ("coerce".to_owned(), Arc::new(Coerce) as Arc<dyn Filter>),
            ("none".to_owned(), Arc::new(Passthrough) as Arc<dyn Filter>),
        ]);
        let validators: HashMap<String, Arc<dyn Validate>> = HashMap::from([
            ("schema".to_owned(), Arc::new(SchemaCheck) as Arc<dyn Validate>),
            ("none".to_owned(), Arc::new(AcceptAll) as Arc<dyn Validate>),
        ]);
        let transports: HashMap<String, Arc<dyn Transport>> =
            HashMap::from([("hyper".to_owned(), Arc::new(Server) as Arc<dyn Transport>)]);

        Self {
            filters,
            validators,
            authorizers: HashMap::new(),
            transports,
            authenticate: None,
        }
    }
}

/// Composes the global strategy set and compiles definitions into routes.
pub struct Builder {
    registry: Registry,
    filter: Choice<dyn Filter>,
    validate: Choice<dyn Validate>,
    engine: String,
    options: EngineOptions,
    extensions: Extensions,
    definitions: Vec<(String, RouteDefinition)>,
}

impl Builder {
    pub fn new() -> Self {
        Self {
            registry: Registry::default(),
            filter: Choice::Named("coerce".to_owned()),
            validate: Choice::Named("schema".to_owned()),
            engine: "hyper".to_owned(),
            options: EngineOptions::default(),
            extensions: Extensions::new(),
            definitions: Vec::new(),
        }
    }

    /// A builder with the strategy names and engine options of `config`.
    pub fn from_config(config: &Config) -> Self {
        Self::new()
            .set_filter(config.filter.clone())
            .set_validate(config.validate.clone())
            .select_engine(config.engine.name.clone(), config.engine.options())
    }

    /// The global authenticate function, used by every definition marked
    /// [`authenticated`](RouteDefinition::authenticated).
    pub fn set_authenticate(mut self, f: impl Authenticate) -> Self {
        self.registry.authenticate = Some(Arc::new(f));
        self
    }

    /// Registers an authorize function under `name`, replacing any
    /// previous one with that name.
    pub fn register_authorize(mut self, name: impl Into<String>, f: impl Authorize) -> Self {
        self.registry.authorizers.insert(name.into(), Arc::new(f));
        self
    }

    /// Registers a whole map of authorize functions.
    pub fn register_authorizers<I, N>(mut self, authorizers: I) -> Self
    where
        I: IntoIterator<Item = (N, Arc<dyn Authorize>)>,
        N: Into<String>,
    {
        self.registry
            .authorizers
            .extend(authorizers.into_iter().map(|(name, f)| (name.into(), f)));
        self
    }

    pub fn register_filter(mut self, name: impl Into<String>, f: impl Filter) -> Self {
        self.registry.filters.insert(name.into(), Arc::new(f));
        self
    }

    pub fn register_validate(mut self, name: impl Into<String>, f: impl Validate) -> Self {
        self.registry.validators.insert(name.into(), Arc::new(f));
        self
    }

    pub fn register_transport(mut self, name: impl Into<String>, transport: impl Transport) -> Self {
        self.registry.transports.insert(name.into(), Arc::new(transport));
        self
    }

    /// Selects a registered filter by name (`"coerce"`, `"none"`, or one
    /// added with [`register_filter`](Self::register_filter)).
    pub fn set_filter(mut self, name: impl Into<String>) -> Self {
        self.filter = Choice::Named(name.into());
        self
    }

    pub fn set_filter_fn(mut self, f: impl Filter) -> Self {
        self.filter = Choice::Given(Arc::new(f));
        self
    }

    /// Selects a registered validator by name (`"schema"`, `"none"`, or one
    /// added with [`register_validate`](Self::register_validate)).
    pub fn set_validate(mut self, name: impl Into<String>) -> Self {
        self.validate = Choice::Named(name.into());
        self
    }

    pub fn set_validate_fn(mut self, f: impl Validate) -> Self {
        self.validate = Choice::Given(Arc::new(f));
        self
    }

    pub fn select_engine(mut self, name: impl Into<String>, options: EngineOptions) -> Self {
        self.engine = name.into();
        self.options = options;
        self
    }

    /// Shares `value` with every request: strategies and handlers read it
    /// back with [`Context::extension`](crate::Context::extension). One
    /// value per type; a later call replaces an earlier one.
    pub fn extension<T: Clone + Send + Sync + 'static>(mut self, value: T) -> Self {
        self.extensions.insert(value);
        self
    }

    /// Adds a definition outside any tree. Its explicit path (or `/`) is
    /// used as-is.
    pub fn route(mut self, definition: RouteDefinition) -> Self {
        let path = derive_path("", "", definition.explicit_path());
        self.definitions.push((path, definition));
        self
    }

    /// Adds every definition of `tree`.
    pub fn mount(mut self, tree: RouteTree) -> Self {
        self.definitions.extend(tree.into_routes());
        self
    }

    /// Resolves every strategy and compiles every definition.
    ///
    /// Fails on the first unresolvable name, missing authenticate function
    /// or conflicting path. No endpoint is bound unless the whole build
    /// succeeds.
    pub fn build(self) -> Result<App, ConfigError> {
        let registry = &self.registry;

        let filter = self.filter.resolve(&registry.filters, ConfigError::UnknownFilter)?;
        let validate = self.validate.resolve(&registry.validators, ConfigError::UnknownValidate)?;
        let transport = registry
            .transports
            .get(&self.engine)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownEngine(self.engine.clone()))?;

        let mut table = RouteTable::default();
        let mut routes = Vec::with_capacity(self.definitions.len());

        for (path, definition) in &self.definitions {
            let path = join_prefix(&self.options.prefix, path);
            let label = format!("{} {}", definition.method(), path);

            let authenticate = match definition.authentication() {
                Authentication::Off => None,
                Authentication::Global => Some(
                    registry
                        .authenticate
                        .clone()
                        .ok_or_else(|| ConfigError::MissingAuthenticate { route: label.clone() })?,
                ),
                Authentication::Custom(f) => Some(Arc::clone(f)),
            };

            let authorize = match definition.authorize_spec() {
                None => None,
                Some(AuthorizeSpec::One(rule)) => Some(resolve_authorize(registry, rule, &label)?),
                Some(AuthorizeSpec::Any(rules)) => {
                    let mut members = rules
                        .iter()
                        .map(|rule| resolve_authorize(registry, rule, &label))
                        .collect::<Result<Vec<_>, _>>()?;
                    if members.len() == 1 {
                        members.pop()
                    } else {
                        Some(Arc::new(AnyOf::new(members)) as Arc<dyn Authorize>)
                    }
                }
            };

            let route = Arc::new(Route {
                method: definition.method(),
                path,
                schema: Arc::new(definition.schema().clone()),
                filter: Arc::clone(&filter),
                authenticate,
                authorize,
                validate: Arc::clone(&validate),
                handler: Arc::clone(definition.handler()),
            });
            table.insert(Arc::clone(&route))?;
            debug!(route = %route, "route compiled");
            routes.push(route);
        }

        info!(routes = routes.len(), engine = %self.engine, "routes compiled");

        let engine = Arc::new(Engine::new(
            self.engine.clone(),
            self.options.clone(),
            self.extensions.clone(),
            table,
        ));
        Ok(App { routes, engine, transport })
    }
}

impl Default for Builder {
    fn default() -> Self { Self::new() }
}

fn resolve_authorize(
    registry: &Registry,
    rule: &AuthorizeRef,
    route: &str,
) -> Result<Arc<dyn Authorize>, ConfigError> {
    match rule {
        AuthorizeRef::Func(f) => Ok(Arc::clone(f)),
        AuthorizeRef::Named(name) => registry.authorizers.get(name).cloned().ok_or_else(|| {
            ConfigError::UnknownAuthorize { route: route.to_owned(), name: name.clone() }
        }),
    }
}

/// `"/api"` + `"/messages"` → `"/api/messages"`; `"/api"` + `"/"` → `"/api"`.
fn join_prefix(prefix: &str, path: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    match (prefix.is_empty(), path) {
        (true, _) => path.to_owned(),
        (false, "/") => {
            if prefix.starts_with('/') { prefix.to_owned() } else { format!("/{prefix}") }
        }
        (false, _) => {
            if prefix.starts_with('/') { format!("{prefix}{path}") } else { format!("/{prefix}{path}") }
        }
    }
}

// ── App ───────────────────────────────────────────────────────────────────────

/// The result of a successful build: compiled routes and the engine they
/// are bound to.
pub struct App {
    routes: Vec<Arc<Route>>,
    engine: Arc<Engine>,
    transport: Arc<dyn Transport>,
}

impl App {
    pub fn routes(&self) -> &[Arc<Route>] { &self.routes }

    pub fn engine(&self) -> &Arc<Engine> { &self.engine }

    /// Serves the engine over the selected transport until it shuts down.
    pub async fn serve(self) -> Result<(), Error> {
        self.transport.serve(self.engine).await
    }
}
