//! Minimal waypost demo: a tiny message board with ownership checks.
//!
//! Run with:
//!   RUST_LOG=waypost=debug cargo run --example basic
//!
//! Try:
//!   curl http://localhost:3000/api/messages
//!   curl -X POST http://localhost:3000/api/messages \
//!        -H 'authorization: Bearer 2' \
//!        -H 'content-type: application/json' \
//!        -d '{"text":"hello"}'
//!   curl -X DELETE http://localhost:3000/api/messages/1 -H 'authorization: Bearer 2'   # 403, owned by 9
//!   curl http://localhost:3000/api/healthz

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use serde::Serialize;
use serde_json::json;
use tracing_subscriber::EnvFilter;
use waypost::{
    ArgSpec, BoxError, Builder, Context, Decision, EngineOptions, Identity, Input, Rejection,
    RouteDefinition, RouteTree, StatusCode, health,
};

#[derive(Clone, Serialize)]
struct Message {
    id: i64,
    user_id: i64,
    text: String,
}

#[derive(Clone, Default)]
struct Store(Arc<Mutex<BTreeMap<i64, Message>>>);

impl Store {
    fn seeded() -> Self {
        let store = Self::default();
        store.insert(9, "first!".to_owned());
        store
    }

    fn insert(&self, user_id: i64, text: String) -> Message {
        let mut messages = self.0.lock().unwrap_or_else(|e| e.into_inner());
        let id = messages.keys().next_back().map_or(1, |last| last + 1);
        let message = Message { id, user_id, text };
        messages.insert(id, message.clone());
        message
    }

    fn get(&self, id: i64) -> Option<Message> {
        self.0.lock().unwrap_or_else(|e| e.into_inner()).get(&id).cloned()
    }

    fn remove(&self, id: i64) -> Option<Message> {
        self.0.lock().unwrap_or_else(|e| e.into_inner()).remove(&id)
    }

    fn all(&self) -> Vec<Message> {
        self.0.lock().unwrap_or_else(|e| e.into_inner()).values().cloned().collect()
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let store = Store::seeded();

    let routes = RouteTree::new("/")
        .at("messages/index", RouteDefinition::get({
            let store = store.clone();
            move |_: Input, _: Context| {
                let store = store.clone();
                async move { Ok::<_, Rejection>(store.all()) }
            }
        }))
        .at("messages/create", RouteDefinition::post({
            let store = store.clone();
            move |input: Input, cx: Context| {
                let store = store.clone();
                async move {
                    let user_id = caller(&cx).ok_or_else(|| Rejection::new("no caller"))?;
                    let text = input.str("text").unwrap_or_default().to_owned();
                    Ok::<_, Rejection>(store.insert(user_id, text))
                }
            }
        })
        .path("/messages")
        .arg("text", ArgSpec::string().required().min_length(1).max_length(280))
        .authenticated())
        .at("messages/[id]", RouteDefinition::delete({
            let store = store.clone();
            move |input: Input, _: Context| {
                let store = store.clone();
                async move {
                    let id = input.i64("id").unwrap_or_default();
                    store
                        .remove(id)
                        .map(|m| json!({ "deleted": m.id }))
                        .ok_or_else(|| Rejection::new("message not found").status(StatusCode::NOT_FOUND))
                }
            }
        })
        .arg("id", ArgSpec::integer().required())
        .authenticated()
        .authorize("isOwner"));

    let is_owner = {
        let store = store.clone();
        move |input: Input, cx: Context| {
            let store = store.clone();
            async move {
                let owner = input.i64("id").and_then(|id| store.get(id)).map(|m| m.user_id);
                Ok::<_, BoxError>(Decision::from(owner.is_some() && owner == caller(&cx)))
            }
        }
    };

    let app = Builder::new()
        .set_authenticate(bearer)
        .register_authorize("isOwner", is_owner)
        .select_engine("hyper", EngineOptions::default().prefix("/api").bind("0.0.0.0:3000"))
        .mount(routes)
        .route(health::liveness())
        .route(health::readiness())
        .build()
        .expect("invalid route configuration");

    app.serve().await.expect("server error");
}

// `Authorization: Bearer <user id>`. A real service would verify a token.
async fn bearer(_input: Input, cx: Context) -> Result<Option<Identity>, BoxError> {
    let Some(token) = cx.header("authorization").and_then(|h| h.strip_prefix("Bearer ")) else {
        return Ok(None);
    };
    let id: i64 = token.trim().parse()?;
    Ok(Some(Identity::new(json!({ "id": id }))))
}

fn caller(cx: &Context) -> Option<i64> {
    cx.identity()?.get("id")?.as_i64()
}
