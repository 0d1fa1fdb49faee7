//! Shared utilities for integration tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use bytes::Bytes;
use serde_json::Value;
use waypost::{App, BoxError, Context, Identity, Input, StatusCode};

/// Build a request with an optional JSON body.
pub fn request(method: &str, uri: &str, body: Option<Value>) -> http::Request<Bytes> {
    let builder = http::Request::builder().method(method).uri(uri);
    match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Bytes::from(body.to_string()))
            .unwrap(),
        None => builder.body(Bytes::new()).unwrap(),
    }
}

/// Same as [`request`], sent as user `id` via the `x-user` header.
#[allow(dead_code)]
pub fn request_as(id: i64, method: &str, uri: &str, body: Option<Value>) -> http::Request<Bytes> {
    let mut req = request(method, uri, body);
    req.headers_mut().insert("x-user", id.to_string().parse().unwrap());
    req
}

/// Dispatch through the engine and parse the envelope.
pub async fn send(app: &App, req: http::Request<Bytes>) -> (StatusCode, Value) {
    let res = app.engine().dispatch(req).await;
    let body = res.json().expect("envelope is JSON");
    (res.status(), body)
}

/// Authenticate from the `x-user` header: `{ "id": <n> }`, anonymous when
/// the header is absent.
#[allow(dead_code)]
pub async fn header_identity(_input: Input, cx: Context) -> Result<Option<Identity>, BoxError> {
    match cx.header("x-user") {
        Some(raw) => Ok(Some(Identity::new(serde_json::json!({ "id": raw.parse::<i64>()? })))),
        None => Ok(None),
    }
}

/// Shared call counter.
#[derive(Clone, Default)]
pub struct Calls(Arc<AtomicUsize>);

#[allow(dead_code)]
impl Calls {
    pub fn hit(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

#[allow(dead_code)]
pub fn caller(cx: &Context) -> Option<i64> {
    cx.identity()?.get("id")?.as_i64()
}
