//! A small user service over an in-memory store with transactional cursors.
//!
//! ```text
//! curl -d '{"name":"ann","role":"admin"}' -H 'Content-Type: application/json' localhost:8080/users
//! curl localhost:8080/users/1
//! curl 'localhost:8080/users?active=t'
//! curl -X DELETE localhost:8080/users/1
//! ```

use futures_util::future::{self, BoxFuture, FutureExt};
use micro_rest::{
    handler_fn, Coercer, Content, Cursor, Group, HandlerError, Key, MethodBinding, Reply,
    Request, Resource, ResourceError, Resources, ResponseCoercer, Route, RouteTable, Server,
    StatusCode,
};
use serde_json::{json, Map, Value};
use std::{
    any::Any,
    collections::BTreeMap,
    sync::{Arc, Mutex},
};
use tracing_subscriber::EnvFilter;

type Users = BTreeMap<i64, Value>;

#[derive(Clone, Default)]
struct Store(Arc<Mutex<Users>>);

/// Works on a copy of the store; `commit` publishes it.
struct StoreCursor {
    store: Store,
    staged: Users,
}

impl Resource for Store {
    fn acquire(&self) -> BoxFuture<'_, Result<Box<dyn Cursor>, ResourceError>> {
        let cursor: Box<dyn Cursor> = Box::new(StoreCursor {
            store: self.clone(),
            staged: Users::new(),
        });
        future::ok(cursor).boxed()
    }
}

impl Cursor for StoreCursor {
    fn start_transaction(&mut self) -> BoxFuture<'_, Result<(), ResourceError>> {
        let result = match self.store.0.lock() {
            Ok(users) => {
                self.staged = users.clone();
                Ok(())
            }
            Err(_) => Err(ResourceError("store poisoned".into())),
        };
        future::ready(result).boxed()
    }

    fn commit(&mut self) -> BoxFuture<'_, Result<(), ResourceError>> {
        let result = match self.store.0.lock() {
            Ok(mut users) => {
                *users = std::mem::take(&mut self.staged);
                Ok(())
            }
            Err(_) => Err(ResourceError("store poisoned".into())),
        };
        future::ready(result).boxed()
    }

    fn close(self: Box<Self>) -> BoxFuture<'static, Result<(), ResourceError>> {
        future::ok(()).boxed()
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

fn users(request: &mut Request) -> Result<&mut Users, HandlerError> {
    request
        .cursor_as::<StoreCursor>()
        .map(|cursor| &mut cursor.staged)
        .ok_or_else(|| HandlerError::internal("store cursor missing"))
}

fn not_found() -> HandlerError {
    HandlerError::status(StatusCode::NotFound, "")
}

fn list(request: &mut Request, _: Vec<Value>, content: Map<String, Value>) -> Result<Value, HandlerError> {
    let active = content.get("active").and_then(Value::as_bool);
    let users = users(request)?;

    Ok(users
        .values()
        .filter(|user| active.map_or(true, |active| user["active"] == active))
        .cloned()
        .collect())
}

fn create(request: &mut Request, _: Vec<Value>, mut content: Map<String, Value>) -> Result<Reply, HandlerError> {
    let users = users(request)?;
    let id = users.keys().next_back().map_or(1, |id| id + 1);

    content.insert("id".into(), json!(id));
    content.entry("role").or_insert_with(|| json!("USER"));
    content.entry("active").or_insert(Value::Bool(true));
    users.insert(id, Value::Object(content.clone()));

    Ok(Reply::new(Value::Object(content))
        .status(StatusCode::Created)
        .header("Location", format!("/users/{id}")))
}

fn fetch(request: &mut Request, args: Vec<Value>, _: Map<String, Value>) -> Result<Value, HandlerError> {
    let id = args[0].as_i64().unwrap_or_default();
    users(request)?.get(&id).cloned().ok_or_else(not_found)
}

fn delete(request: &mut Request, args: Vec<Value>, _: Map<String, Value>) -> Result<Value, HandlerError> {
    let id = args[0].as_i64().unwrap_or_default();
    users(request)?.remove(&id).ok_or_else(not_found)?;
    Ok(Value::Null)
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let user = ResponseCoercer::keyed([
        Key::new("id").typed(Coercer::Int),
        Key::new("name"),
        Key::new("role").default(json!("USER")),
        Key::new("active").typed(Coercer::Bool).default(json!(true)),
    ]);

    let routes = RouteTable::new()
        .route(
            Route::new("/users$")
                .unwrap()
                .get(
                    MethodBinding::new(handler_fn(list))
                        .resource("store")
                        .content(Content::new("active", Coercer::Bool).optional()),
                )
                .post(
                    MethodBinding::new(handler_fn(create))
                        .resource("store")
                        .content(Content::new("name", Coercer::Str))
                        .content(
                            Content::new("role", Coercer::Group(Group::new(["ADMIN", "USER"]).uppercase()))
                                .optional(),
                        )
                        .content(Content::new("active", Coercer::Bool).optional())
                        .response(user.clone()),
                ),
        )
        .route(
            Route::new(r"/users/(\d+)$")
                .unwrap()
                .arg(Coercer::Count)
                .get(MethodBinding::new(handler_fn(fetch)).resource("store").response(user))
                .delete(
                    MethodBinding::new(handler_fn(delete))
                        .resource("store")
                        .response(ResponseCoercer::string("deleted")),
                ),
        )
        .route(
            Route::new("/health$")
                .unwrap()
                .get(MethodBinding::new(handler_fn(|_, _, _| Ok(json!("ok")))).silent()),
        );

    Server::builder()
        .bind("127.0.0.1:8080".parse().unwrap())
        .unwrap()
        .routes(routes)
        .resources(Resources::new().register("store", Store::default()))
        .name("users")
        .build()
        .launch()
        .await;
}
