//! Per-request context and the caller identity.
//!
//! The engine builds one [`Context`] per inbound request from owned copies
//! of the transport inputs. Nothing in it points back into the transport,
//! and no two requests ever share one. The authenticate phase is the only
//! writer after construction: it attaches the [`Identity`].

use std::collections::HashMap;

use http::{Extensions, HeaderMap};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::method::Method;

// ── Identity ──────────────────────────────────────────────────────────────────

/// Who is calling. Opaque to the framework; produced by the authenticate
/// function and read by authorize functions and handlers.
#[derive(Clone, Debug, PartialEq)]
pub struct Identity(Value);

impl Identity {
    pub fn new(value: impl Into<Value>) -> Self {
        Self(value.into())
    }

    /// Builds an identity from any serializable user record.
    pub fn from_serialize<T: Serialize>(user: &T) -> Result<Self, serde_json::Error> {
        serde_json::to_value(user).map(Self)
    }

    pub fn value(&self) -> &Value {
        &self.0
    }

    /// Field lookup for object identities (`identity.get("id")`).
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(self.0.clone())
    }
}

// ── Context ───────────────────────────────────────────────────────────────────

/// Everything the transport knew about one request, plus the identity.
#[derive(Clone, Debug)]
pub struct Context {
    method: Method,
    path: String,
    headers: HeaderMap,
    cookies: HashMap<String, String>,
    params: HashMap<String, String>,
    query: Map<String, Value>,
    body: Value,
    identity: Option<Identity>,
    extensions: Extensions,
}

impl Context {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HeaderMap::new(),
            cookies: HashMap::new(),
            params: HashMap::new(),
            query: Map::new(),
            body: Value::Null,
            identity: None,
            extensions: Extensions::new(),
        }
    }

    /// Sets the request headers and re-reads cookies from them.
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.cookies = parse_cookies(&headers);
        self.headers = headers;
        self
    }

    pub fn with_params(mut self, params: HashMap<String, String>) -> Self {
        self.params = params;
        self
    }

    pub fn with_query(mut self, query: Map<String, Value>) -> Self {
        self.query = query;
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = body;
        self
    }

    /// Stores an arbitrary typed value for handlers (a database pool
    /// handle, a request id). One value per type.
    pub fn with_extension<T: Clone + Send + Sync + 'static>(mut self, value: T) -> Self {
        self.extensions.insert(value);
        self
    }

    /// Seeds the context with the values registered through
    /// [`Builder::extension`](crate::Builder::extension).
    pub(crate) fn with_extensions(mut self, extensions: Extensions) -> Self {
        self.extensions.extend(extensions);
        self
    }

    pub fn method(&self) -> Method { self.method }
    pub fn path(&self) -> &str { &self.path }
    pub fn headers(&self) -> &HeaderMap { &self.headers }
    pub fn cookies(&self) -> &HashMap<String, String> { &self.cookies }
    pub fn params(&self) -> &HashMap<String, String> { &self.params }
    pub fn query(&self) -> &Map<String, Value> { &self.query }
    pub fn body(&self) -> &Value { &self.body }
    pub fn extensions(&self) -> &Extensions { &self.extensions }

    /// Header lookup by name (case-insensitive); non-UTF-8 values read as absent.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    /// Returns a named path parameter.
    ///
    /// For a route `/messages/{id}`, `cx.param("id")` on `/messages/7` returns `Some("7")`.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    pub fn extension<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.extensions.get::<T>()
    }

    /// The authenticated caller, `None` while anonymous.
    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    pub(crate) fn set_identity(&mut self, identity: Identity) {
        self.identity = Some(identity);
    }
}

fn parse_cookies(headers: &HeaderMap) -> HashMap<String, String> {
    headers
        .get_all(http::header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| {
            let (name, value) = pair.trim().split_once('=')?;
            let name = name.trim();
            if name.is_empty() {
                return None;
            }
            Some((name.to_owned(), value.trim().trim_matches('"').to_owned()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use http::HeaderValue;
    use serde_json::json;

    use super::*;

    #[test]
    fn cookies_are_parsed_from_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(http::header::COOKIE, HeaderValue::from_static("session=abc; theme=\"dark\"; =skip"));

        let cx = Context::new(Method::Get, "/").with_headers(headers);

        assert_eq!(cx.cookie("session"), Some("abc"));
        assert_eq!(cx.cookie("theme"), Some("dark"));
        assert_eq!(cx.cookies().len(), 2);
    }

    #[test]
    fn clones_do_not_share_identity() {
        let original = Context::new(Method::Get, "/me");
        let mut copy = original.clone();
        copy.set_identity(Identity::new(json!({ "id": 1 })));

        assert!(original.identity().is_none());
        assert_eq!(copy.identity().and_then(|i| i.get("id")), Some(&json!(1)));
    }

    #[test]
    fn extensions_are_typed() {
        #[derive(Clone)]
        struct RequestId(&'static str);

        let cx = Context::new(Method::Get, "/").with_extension(RequestId("r-1"));
        assert_eq!(cx.extension::<RequestId>().map(|r| r.0), Some("r-1"));
        assert!(cx.extension::<u32>().is_none());
    }
}
