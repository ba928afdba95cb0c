//! micro_rest - Minimal HTTP/1.1 server core for small REST services
//!
//! An incremental request parser, a per-connection request/response loop and
//! a route table that turns parsed requests into typed handler calls and
//! typed responses.
//!
//! # Protocol Support
//!
//! - **HTTP/1.1** and **HTTP/1.0** with keep-alive by default
//! - `application/json` and `application/x-www-form-urlencoded` request bodies
//! - `gzip` request and response bodies
//!
//! Chunked transfer-encoding, pipelining, TLS and HTTP/2 are not supported.
//!
//! # Examples
//!
//! Quick start:
//! ```no_run
//! use micro_rest::{handler_fn, MethodBinding, Route, RouteTable, Server};
//! use serde_json::json;
//! use tokio::net::TcpListener;
//!
//! #[tokio::main]
//! async fn main() {
//!     let routes = RouteTable::new().route(
//!         Route::new("/hello$")
//!             .unwrap()
//!             .get(MethodBinding::new(handler_fn(|_, _, _| Ok(json!("Hello World!"))))),
//!     );
//!
//!     Server::builder()
//!         .listener(TcpListener::bind("127.0.0.1:8080").await.unwrap())
//!         .routes(routes)
//!         .build()
//!         .launch()
//!         .await;
//! }
//! ```
//! Typed arguments, content and responses:
//! ```no_run
//! use micro_rest::{
//!     handler_fn, Coercer, Content, Group, Key, MethodBinding, ResponseCoercer, Route,
//!     RouteTable, Server,
//! };
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() {
//!     let update = MethodBinding::new(handler_fn(|_, args, content| {
//!         Ok(json!({"id": args[0], "color": content["color"]}))
//!     }))
//!     .content(Content::new("color", Coercer::Group(Group::new(["RED", "BLUE"]).uppercase())))
//!     .content(Content::new("note", Coercer::Str).optional())
//!     .response(ResponseCoercer::keyed([
//!         Key::new("id").typed(Coercer::Int),
//!         Key::new("color"),
//!         Key::new("note").default(json!("")),
//!     ]));
//!
//!     let routes = RouteTable::new()
//!         .route(Route::new(r"/items/(\d+)$").unwrap().arg(Coercer::Count).put(update));
//!
//!     Server::builder()
//!         .bind("127.0.0.1:8080".parse().unwrap())
//!         .unwrap()
//!         .routes(routes)
//!         .build()
//!         .launch()
//!         .await;
//! }
//! ```

pub(crate) mod http {
    pub mod query;
    pub(crate) mod reader;
    pub(crate) mod request;
    pub(crate) mod response;
    pub(crate) mod types;
}
pub(crate) mod router {
    pub(crate) mod coerce;
    pub(crate) mod matcher;
    pub(crate) mod route;
}
pub(crate) mod server {
    pub(crate) mod connection;
    pub(crate) mod resource;
    pub(crate) mod sequence;
    pub(crate) mod server_impl;
}
pub(crate) mod errors;
pub mod limits;

pub use crate::{
    errors::{ErrorKind, HandlerError, IoError, ResourceError},
    http::{
        query,
        request::Request,
        response::{Reply, Response},
        types::{ContentType, Method, StatusCode, Version},
    },
    router::{
        coerce::{CoerceError, Coercer, Group},
        matcher::Match,
        route::{
            handler_fn, Content, Handler, HandlerFn, Key, MethodBinding, ResponseCoercer, Route,
            RouteTable,
        },
    },
    server::{
        resource::{Cursor, Resource, Resources},
        sequence::{ConnectionId, RequestId},
        server_impl::{Server, ServerBuilder},
    },
};
