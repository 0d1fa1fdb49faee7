//! The response envelope.
//!
//! Every request the engine answers gets one of two JSON shapes:
//!
//! ```text
//! 200  {"success": true,  "data": <handler result>}
//! 4xx  {"success": false, "error": {"code": 403, "message": "access denied", "data": null}}
//! ```
//!
//! The failure status is the one the failure carries; `code` repeats it.

use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header};
use http_body_util::Full;
use serde::Serialize;
use serde_json::Value;

use crate::failure::Failure;

#[derive(Serialize)]
struct SuccessEnvelope<'a> {
    success: bool,
    data: &'a Value,
}

#[derive(Serialize)]
struct FailureEnvelope<'a> {
    success: bool,
    error: ErrorBody<'a>,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    code: u16,
    message: &'a str,
    data: &'a Value,
}

/// A rendered response: status plus a JSON envelope body.
#[derive(Clone, Debug)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl Response {
    /// `200 OK` carrying `data`.
    pub fn success(data: &Value) -> Self {
        Self::render(StatusCode::OK, &SuccessEnvelope { success: true, data })
    }

    pub fn failure(failure: &Failure) -> Self {
        let envelope = FailureEnvelope {
            success: false,
            error: ErrorBody { code: failure.code(), message: failure.message(), data: failure.data() },
        };
        Self::render(failure.status(), &envelope)
    }

    fn render(status: StatusCode, envelope: &impl Serialize) -> Self {
        match serde_json::to_vec(envelope) {
            Ok(body) => Self { status, headers: HeaderMap::new(), body: Bytes::from(body) },
            Err(e) => {
                tracing::error!("envelope serialization failed: {e}");
                Self {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    headers: HeaderMap::new(),
                    body: Bytes::from_static(
                        br#"{"success":false,"error":{"code":500,"message":"internal error","data":null}}"#,
                    ),
                }
            }
        }
    }

    /// Adds a header next to `content-type`, e.g. `Allow` on a 405.
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn status(&self) -> StatusCode { self.status }
    pub fn headers(&self) -> &HeaderMap { &self.headers }
    pub fn body(&self) -> &[u8] { &self.body }

    /// Parses the envelope back into JSON.
    pub fn json(&self) -> Result<Value, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    pub(crate) fn into_inner(self) -> http::Response<Full<Bytes>> {
        let mut res = http::Response::new(Full::new(self.body));
        *res.status_mut() = self.status;
        *res.headers_mut() = self.headers;
        res.headers_mut()
            .insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        res
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn success_envelope() {
        let res = Response::success(&json!({ "id": 7 }));
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.json().unwrap(), json!({ "success": true, "data": { "id": 7 } }));
    }

    #[test]
    fn failure_envelope() {
        let res = Response::failure(&Failure::unauthorized());
        assert_eq!(res.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            res.json().unwrap(),
            json!({ "success": false, "error": { "code": 403, "message": "access denied", "data": null } }),
        );
    }

    #[test]
    fn hyper_response_is_json() {
        let res = Response::success(&Value::Null).into_inner();
        assert_eq!(res.headers()[header::CONTENT_TYPE], "application/json");
    }

    #[test]
    fn extra_headers_are_kept() {
        let res = Response::failure(&Failure::method_not_allowed(&[crate::Method::Get]))
            .with_header(header::ALLOW, HeaderValue::from_static("GET"))
            .into_inner();
        assert_eq!(res.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(res.headers()[header::ALLOW], "GET");
        assert_eq!(res.headers()[header::CONTENT_TYPE], "application/json");
    }
}
