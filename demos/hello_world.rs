use micro_rest::{handler_fn, MethodBinding, Route, RouteTable, Server};
use serde_json::json;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let routes = RouteTable::new().route(
        Route::new("/$")
            .unwrap()
            .get(MethodBinding::new(handler_fn(|_, _, _| Ok(json!("Hello, world!"))))),
    );

    Server::builder()
        .listener(TcpListener::bind("127.0.0.1:8080").await.unwrap())
        .routes(routes)
        .name("hello_world")
        .build()
        .launch()
        .await;
}
