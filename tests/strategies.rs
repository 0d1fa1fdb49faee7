//! Strategies supplied as functions or registered by name, driven end to end.

use std::future::{Ready, ready};
use std::sync::{Arc, Mutex};

use futures::future::BoxFuture;
use serde_json::{Value, json};
use waypost::{
    ArgSpec, Authorize, AuthorizeRef, BoxError, Builder, Context, Decision, Engine, EngineOptions,
    Error, ErrorSet, Input, Rejection, RouteDefinition, RouteTree, Schema, StatusCode, Transport,
};

mod common;

use common::{Calls, caller, header_identity, request, request_as, send};

fn echo_name() -> RouteDefinition {
    RouteDefinition::post(|input: Input, _: Context| async move {
        Ok::<_, Rejection>(json!({ "name": input.str("name") }))
    })
    .arg("name", ArgSpec::string())
}

fn whoami() -> RouteDefinition {
    RouteDefinition::get(|_: Input, cx: Context| async move { Ok::<_, Rejection>(json!({ "id": caller(&cx) })) })
}

/// Upper-cases `name` and ignores the schema.
fn shout(mut input: Input, _: Arc<Schema>) -> Ready<Input> {
    if let Some(name) = input.str("name").map(str::to_uppercase) {
        input.insert("name", Value::String(name));
    }
    ready(input)
}

/// Rejects names shorter than three characters.
fn long_names(input: Input, _: Arc<Schema>, _: Context) -> Ready<Option<ErrorSet>> {
    let short = input.str("name").is_some_and(|name| name.chars().count() < 3);
    let errors = short.then(|| ErrorSet::from([("name".to_owned(), vec!["is too short".to_owned()])]));
    ready(errors)
}

fn admin_only(_: Input, cx: Context) -> Ready<Result<Decision, BoxError>> {
    ready(Ok(Decision::from(caller(&cx) == Some(1))))
}

#[tokio::test]
async fn route_authenticate_function_needs_no_global_one() {
    let app = Builder::new()
        .mount(RouteTree::new("/").at("me", whoami().authenticate_with(header_identity)))
        .build()
        .unwrap();

    let (status, body) = send(&app, request_as(5, "GET", "/me", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!({ "id": 5 }));

    let (status, _) = send(&app, request("GET", "/me", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn route_authenticate_function_overrides_global_one() {
    let global = Calls::default();
    let app = Builder::new()
        .set_authenticate({
            let global = global.clone();
            move |input: Input, cx: Context| {
                global.hit();
                header_identity(input, cx)
            }
        })
        .mount(RouteTree::new("/").at(
            "me",
            whoami().authenticate_with(|_: Input, _: Context| async {
                Ok::<_, BoxError>(Some(waypost::Identity::new(json!({ "id": 42 }))))
            }),
        ))
        .build()
        .unwrap();

    let (status, body) = send(&app, request_as(5, "GET", "/me", None)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!({ "id": 42 }));
    assert_eq!(global.count(), 0);
}

#[tokio::test]
async fn embedded_authorize_function_gates_the_route() {
    let app = Builder::new()
        .set_authenticate(header_identity)
        .mount(RouteTree::new("/").at("admin", whoami().authenticated().authorize_with(admin_only)))
        .build()
        .unwrap();

    assert_eq!(send(&app, request_as(1, "GET", "/admin", None)).await.0, StatusCode::OK);
    assert_eq!(send(&app, request_as(2, "GET", "/admin", None)).await.0, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn any_of_mixes_names_and_functions() {
    let app = Builder::new()
        .set_authenticate(header_identity)
        .register_authorize("isAdmin", admin_only)
        .mount(RouteTree::new("/").at(
            "reports/[id]",
            whoami().authenticated().authorize_any([
                AuthorizeRef::named("isAdmin"),
                AuthorizeRef::func(|input: Input, cx: Context| {
                    ready(Ok::<_, BoxError>(Decision::from(input.i64("id") == caller(&cx))))
                }),
            ]),
        ))
        .build()
        .unwrap();

    assert_eq!(send(&app, request_as(1, "GET", "/reports/9", None)).await.0, StatusCode::OK);
    assert_eq!(send(&app, request_as(9, "GET", "/reports/9", None)).await.0, StatusCode::OK);
    assert_eq!(send(&app, request_as(4, "GET", "/reports/9", None)).await.0, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn authorizers_register_as_a_map() {
    let app = Builder::new()
        .set_authenticate(header_identity)
        .register_authorizers([
            ("isAdmin", Arc::new(admin_only) as Arc<dyn Authorize>),
            (
                "nobody",
                Arc::new(|_: Input, _: Context| ready(Ok::<_, BoxError>(Decision::Deny))) as Arc<dyn Authorize>,
            ),
        ])
        .mount(
            RouteTree::new("/")
                .at("admin", whoami().authenticated().authorize("isAdmin"))
                .at("closed", whoami().authenticated().authorize("nobody")),
        )
        .build()
        .unwrap();

    assert_eq!(send(&app, request_as(1, "GET", "/admin", None)).await.0, StatusCode::OK);
    assert_eq!(send(&app, request_as(1, "GET", "/closed", None)).await.0, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn validate_function_errors_become_bad_request() {
    let handled = Calls::default();
    let app = Builder::new()
        .set_validate_fn(long_names)
        .mount(RouteTree::new("/").at("users/index", {
            let handled = handled.clone();
            RouteDefinition::post(move |_: Input, _: Context| {
                handled.hit();
                async { Ok::<_, Rejection>(()) }
            })
        }))
        .build()
        .unwrap();

    let (status, body) = send(&app, request("POST", "/users", Some(json!({ "name": "al" })))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["data"], json!({ "name": ["is too short"] }));
    assert_eq!(handled.count(), 0);

    let (status, _) = send(&app, request("POST", "/users", Some(json!({ "name": "ada" })))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(handled.count(), 1);
}

#[tokio::test]
async fn registered_validate_is_selected_by_name() {
    let app = Builder::new()
        .register_validate("lengths", long_names)
        .set_validate("lengths")
        .mount(RouteTree::new("/").at("users/index", echo_name()))
        .build()
        .unwrap();

    let (status, body) = send(&app, request("POST", "/users", Some(json!({ "name": "al" })))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["data"]["name"], json!(["is too short"]));
}

#[tokio::test]
async fn registered_filter_is_selected_by_name() {
    let app = Builder::new()
        .register_filter("shout", shout)
        .set_filter("shout")
        .mount(RouteTree::new("/").at("users/index", echo_name()))
        .build()
        .unwrap();

    let (status, body) = send(&app, request("POST", "/users", Some(json!({ "name": "ada" })))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!({ "name": "ADA" }));
}

#[tokio::test]
async fn filter_function_replaces_coercion() {
    let app = Builder::new()
        .set_filter_fn(shout)
        .mount(RouteTree::new("/").at(
            "items/index",
            RouteDefinition::get(|input: Input, _: Context| async move {
                Ok::<_, Rejection>(Value::Object(input.into_map()))
            })
            .arg("limit", ArgSpec::integer()),
        ))
        .build()
        .unwrap();

    let (status, body) = send(&app, request("GET", "/items?limit=5&name=bo", None)).await;

    // No coercion ran, so the query value stays a string; validation then rejects it.
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]["data"]["limit"].is_array());

    let (status, body) = send(&app, request("GET", "/items?name=bo", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!({ "name": "BO" }));
}

/// Answers one request in-process and records the envelope.
struct Loopback {
    seen: Arc<Mutex<Option<Value>>>,
}

impl Transport for Loopback {
    fn serve(&self, engine: Arc<Engine>) -> BoxFuture<'static, Result<(), Error>> {
        let seen = Arc::clone(&self.seen);
        Box::pin(async move {
            let res = engine.dispatch(request("GET", "/rpc/ping", None)).await;
            let body = res.json().unwrap_or(Value::Null);
            *seen.lock().unwrap() = Some(json!({ "engine": engine.name(), "body": body }));
            Ok(())
        })
    }
}

#[tokio::test]
async fn registered_transport_serves_the_app() {
    let seen = Arc::new(Mutex::new(None));
    let app = Builder::new()
        .register_transport("loopback", Loopback { seen: Arc::clone(&seen) })
        .select_engine("loopback", EngineOptions::default().prefix("/rpc"))
        .mount(RouteTree::new("/").at(
            "ping",
            RouteDefinition::get(|_: Input, _: Context| async { Ok::<_, Rejection>("pong") }),
        ))
        .build()
        .unwrap();

    app.serve().await.unwrap();

    assert_eq!(
        seen.lock().unwrap().take(),
        Some(json!({ "engine": "loopback", "body": { "success": true, "data": "pong" } })),
    );
}

#[derive(Clone)]
struct Tenant(&'static str);

#[tokio::test]
async fn builder_extensions_reach_strategies_and_handlers() {
    let app = Builder::new()
        .extension(Tenant("acme"))
        .set_authenticate(header_identity)
        .mount(RouteTree::new("/").at(
            "tenant",
            RouteDefinition::get(|_: Input, cx: Context| async move {
                Ok::<_, Rejection>(json!({ "tenant": cx.extension::<Tenant>().map(|t| t.0) }))
            })
            .authenticated()
            .authorize_with(|_: Input, cx: Context| {
                ready(Ok::<_, BoxError>(Decision::from(cx.extension::<Tenant>().is_some_and(|t| t.0 == "acme"))))
            }),
        ))
        .build()
        .unwrap();

    let (status, body) = send(&app, request_as(3, "GET", "/tenant", None)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!({ "tenant": "acme" }));
}
