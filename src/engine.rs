//! The engine: binds compiled routes to a transport.
//!
//! The engine is transport-agnostic. It takes a fully-read
//! `http::Request<Bytes>`, finds the route, turns the request into
//! [`Input`] + [`Context`], runs the pipeline and renders the envelope.
//! A [`Transport`] is what feeds it requests: the built-in `"hyper"`
//! transport ([`Server`](crate::Server)) does so from a TCP listener, tests
//! call [`Engine::dispatch`] directly.
//!
//! # Input merging
//!
//! Query string, body fields and path parameters collapse into one
//! argument mapping. On key collision path parameters win over body fields,
//! which win over the query string.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use futures::future::BoxFuture;
use http::{Extensions, HeaderMap, HeaderValue, header};
use serde_json::{Map, Value};
use tracing::{debug, error};

use crate::config::EngineOptions;
use crate::context::Context;
use crate::error::Error;
use crate::failure::Failure;
use crate::input::Input;
use crate::method::Method;
use crate::response::Response;
use crate::route::Route;
use crate::router::{Lookup, RouteTable};

/// Serves an engine. Registered on the builder by name and selected with
/// [`Builder::select_engine`](crate::Builder::select_engine).
pub trait Transport: Send + Sync + 'static {
    /// Runs until the transport shuts down.
    fn serve(&self, engine: Arc<Engine>) -> BoxFuture<'static, Result<(), Error>>;
}

/// Compiled routes bound to their endpoints.
pub struct Engine {
    name: String,
    options: EngineOptions,
    extensions: Extensions,
    table: RouteTable,
}

impl Engine {
    pub(crate) fn new(
        name: String,
        options: EngineOptions,
        extensions: Extensions,
        table: RouteTable,
    ) -> Self {
        Self { name, options, extensions, table }
    }

    /// Name of the selected transport.
    pub fn name(&self) -> &str { &self.name }

    pub fn options(&self) -> &EngineOptions { &self.options }

    /// Answers one request. Always produces exactly one response.
    ///
    /// The pipeline runs on its own task: if the caller stops polling (the
    /// client went away), phases already in flight still run to completion
    /// and their result is discarded.
    pub async fn dispatch(&self, req: http::Request<Bytes>) -> Response {
        let (parts, body) = req.into_parts();
        let path = parts.uri.path().to_owned();

        let (method, lookup) = match Method::try_from(&parts.method) {
            Ok(method) => (method, self.table.lookup(method, &path)),
            Err(_) => {
                debug!(method = %parts.method, path = %path, "unsupported method");
                return unmatched(self.table.unmatched(&path));
            }
        };
        let (route, params) = match lookup {
            Lookup::Found(route, params) => (route, params),
            other => {
                debug!(method = %method, path = %path, "no route matched");
                return unmatched(other);
            }
        };

        let query = parts.uri.query().map(|q| parse_pairs(q.as_bytes())).unwrap_or_default();
        let body = match parse_body(&parts.headers, &body) {
            Ok(body) => body,
            Err(failure) => {
                debug!(route = %route, "unreadable body");
                return Response::failure(&failure);
            }
        };

        let input = Input::merge(&query, &body, &params);
        let cx = Context::new(method, path)
            .with_extensions(self.extensions.clone())
            .with_headers(parts.headers)
            .with_params(params)
            .with_query(query)
            .with_body(body);

        let label = route.to_string();
        let task = tokio::spawn(async move {
            let mut cx = cx;
            route.run(input, &mut cx).await
        });

        match task.await {
            Ok(Ok(data)) => Response::success(&data),
            Ok(Err(failure)) => Response::failure(&failure),
            Err(e) => {
                error!(route = %label, "pipeline task failed: {e}");
                Response::failure(&Failure::internal())
            }
        }
    }

    /// The compiled route bound to `method` and `path`, if any.
    pub fn route(&self, method: Method, path: &str) -> Option<Arc<Route>> {
        match self.table.lookup(method, path) {
            Lookup::Found(route, _) => Some(route),
            _ => None,
        }
    }
}

/// Envelope for a request line no route accepts.
fn unmatched(lookup: Lookup) -> Response {
    match lookup {
        Lookup::MethodNotAllowed(allowed) => {
            let list = allowed.iter().map(|m| m.as_str()).collect::<Vec<_>>().join(", ");
            let response = Response::failure(&Failure::method_not_allowed(&allowed));
            match HeaderValue::from_str(&list) {
                Ok(value) => response.with_header(header::ALLOW, value),
                Err(_) => response,
            }
        }
        Lookup::BadParam(name) => {
            debug!(param = %name, "path parameter is not valid UTF-8");
            Response::failure(&Failure::bad_request("invalid path parameter"))
        }
        Lookup::Found(..) | Lookup::NotFound => Response::failure(&Failure::not_found()),
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("name", &self.name)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// `application/x-www-form-urlencoded` pairs. Repeated keys collect into
/// an array.
fn parse_pairs(raw: &[u8]) -> Map<String, Value> {
    let mut map = Map::new();
    for (key, value) in url::form_urlencoded::parse(raw) {
        let value = Value::String(value.into_owned());
        match map.get_mut(key.as_ref()) {
            Some(Value::Array(items)) => items.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
            None => {
                map.insert(key.into_owned(), value);
            }
        }
    }
    map
}

fn parse_body(headers: &HeaderMap, body: &Bytes) -> Result<Value, Failure> {
    if body.is_empty() {
        return Ok(Value::Null);
    }

    let mime = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(|v| v.trim().to_ascii_lowercase())
        .unwrap_or_default();

    match mime.as_str() {
        "application/x-www-form-urlencoded" => Ok(Value::Object(parse_pairs(body))),
        "" | "application/json" => {
            serde_json::from_slice(body).map_err(|_| Failure::bad_request("malformed JSON body"))
        }
        m if m.ends_with("+json") => {
            serde_json::from_slice(body).map_err(|_| Failure::bad_request("malformed JSON body"))
        }
        _ => Ok(std::str::from_utf8(body).map(|s| Value::String(s.to_owned())).unwrap_or(Value::Null)),
    }
}

#[cfg(test)]
mod tests {
    use http::HeaderValue;
    use serde_json::json;

    use super::*;

    #[test]
    fn repeated_query_keys_become_arrays() {
        let map = parse_pairs(b"tag=a&tag=b&tag=c%20d&q=x");
        assert_eq!(Value::Object(map), json!({ "tag": ["a", "b", "c d"], "q": "x" }));
    }

    #[test]
    fn body_parsing_follows_content_type() {
        let mut headers = HeaderMap::new();
        assert_eq!(parse_body(&headers, &Bytes::from_static(b"{\"a\":1}")).unwrap(), json!({ "a": 1 }));

        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/x-www-form-urlencoded"));
        assert_eq!(parse_body(&headers, &Bytes::from_static(b"a=1&b=2")).unwrap(), json!({ "a": "1", "b": "2" }));

        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"));
        assert_eq!(parse_body(&headers, &Bytes::from_static(b"hi")).unwrap(), json!("hi"));

        assert_eq!(parse_body(&headers, &Bytes::new()).unwrap(), Value::Null);
    }

    #[test]
    fn malformed_json_is_rejected() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let failure = parse_body(&headers, &Bytes::from_static(b"{oops")).unwrap_err();
        assert_eq!(failure.code(), 400);
    }
}
