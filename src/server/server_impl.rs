use crate::{
    http::response::Response,
    limits::{ConnLimits, ReqLimits, RespLimits, ServerLimits},
    router::route::RouteTable,
    server::{connection::HttpConnection, resource::Resources},
    StatusCode,
};
use serde_json::Value;
use socket2::{Domain, Protocol, Socket, Type};
use std::{io, net::SocketAddr, sync::Arc};
use tokio::{
    io::AsyncWriteExt,
    net::{TcpListener, TcpStream},
    sync::Semaphore,
    time::timeout,
};
use tracing::{debug, info, warn};

/// Everything a connection task needs, shared read-only by all of them.
#[derive(Debug)]
pub(crate) struct Service {
    pub(crate) name: String,
    pub(crate) routes: RouteTable,
    pub(crate) resources: Resources,

    pub(crate) conn_limits: ConnLimits,
    pub(crate) req_limits: ReqLimits,
    pub(crate) resp_limits: RespLimits,
}

impl Service {
    pub(crate) fn new<N: Into<String>>(name: N, routes: RouteTable) -> Self {
        Self {
            name: name.into(),
            routes,
            resources: Resources::new(),

            conn_limits: ConnLimits::default(),
            req_limits: ReqLimits::default(),
            resp_limits: RespLimits::default(),
        }
    }
}

/// An HTTP server running one task per accepted connection.
///
/// # Examples
///
/// ```no_run
/// use micro_rest::{handler_fn, MethodBinding, Route, RouteTable, Server};
/// use serde_json::json;
/// use tokio::net::TcpListener;
///
/// #[tokio::main]
/// async fn main() {
///     let routes = RouteTable::new().route(
///         Route::new("/hello$")
///             .unwrap()
///             .get(MethodBinding::new(handler_fn(|_, _, _| Ok(json!("Hello world!"))))),
///     );
///
///     Server::builder()
///         .listener(TcpListener::bind("127.0.0.1:8080").await.unwrap())
///         .routes(routes)
///         .build()
///         .launch()
///         .await
/// }
/// ```
pub struct Server {
    listener: TcpListener,
    service: Arc<Service>,
    permits: Arc<Semaphore>,
}

impl Server {
    /// Creates a new builder for configuring the server instance.
    #[inline]
    pub fn builder() -> ServerBuilder {
        ServerBuilder {
            listener: None,
            routes: None,
            resources: Resources::new(),
            name: None,

            server_limits: None,
            request_limits: None,
            response_limits: None,
            connection_limits: None,
        }
    }

    #[inline]
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Starts accepting connections. Never returns.
    pub async fn launch(self) {
        match self.listener.local_addr() {
            Ok(addr) => info!(
                server = %self.service.name,
                %addr,
                routes = self.service.routes.len(),
                "listening"
            ),
            Err(err) => warn!(server = %self.service.name, error = %err, "listening on unknown address"),
        }

        loop {
            let (stream, peer) = match self.listener.accept().await {
                Ok(value) => value,
                Err(err) => {
                    debug!(error = %err, "accept failed");
                    continue;
                }
            };

            match self.permits.clone().try_acquire_owned() {
                Ok(permit) => {
                    let service = self.service.clone();

                    tokio::spawn(async move {
                        HttpConnection::new(service, stream, Some(peer)).run().await;
                        drop(permit);
                    });
                }
                Err(_) => {
                    warn!(%peer, "connection limit reached");
                    tokio::spawn(Self::unavailable(stream, self.service.clone()));
                }
            }
        }
    }

    // Answers an over-limit connection with 503 and drops it.
    async fn unavailable(mut stream: TcpStream, service: Arc<Service>) {
        let mut response = Response::new(Value::Null);
        response.status(StatusCode::ServiceUnavailable).close();

        let Ok(bytes) = response.encode(&service.resp_limits) else {
            return;
        };
        let _ = timeout(service.conn_limits.write_timeout, stream.write_all(&bytes)).await;
        let _ = stream.shutdown().await;
    }
}

/// Builder for configuring and creating [`Server`] instances.
pub struct ServerBuilder {
    listener: Option<TcpListener>,
    routes: Option<RouteTable>,
    resources: Resources,
    name: Option<String>,

    server_limits: Option<ServerLimits>,
    request_limits: Option<ReqLimits>,
    response_limits: Option<RespLimits>,
    connection_limits: Option<ConnLimits>,
}

impl ServerBuilder {
    /// Sets the TCP listener that the server will use to accept connections.
    ///
    /// **Either this or [`bind`](Self::bind) is required.**
    #[inline(always)]
    pub fn listener(mut self, listener: TcpListener) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Binds a listener with `SO_REUSEADDR` and the backlog from
    /// [`ServerLimits::backlog`]. Set the server limits first to change it.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn bind(mut self, addr: SocketAddr) -> io::Result<Self> {
        let backlog = self
            .server_limits
            .as_ref()
            .map_or(ServerLimits::default().backlog, |limits| limits.backlog);

        let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
        socket.set_reuse_address(true)?;
        socket.set_nonblocking(true)?;
        socket.bind(&addr.into())?;
        socket.listen(backlog)?;

        self.listener = Some(TcpListener::from_std(socket.into())?);
        Ok(self)
    }

    /// Sets the route table.
    ///
    /// **This is a required component.**
    #[inline(always)]
    pub fn routes(mut self, routes: RouteTable) -> Self {
        self.routes = Some(routes);
        self
    }

    /// Sets the resources method bindings may name.
    #[inline(always)]
    pub fn resources(mut self, resources: Resources) -> Self {
        self.resources = resources;
        self
    }

    /// Server name used in connection logs (default: `micro_rest`).
    #[inline(always)]
    pub fn name<N: Into<String>>(mut self, name: N) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Configures the connection cap and listen backlog.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # #[tokio::main]
    /// # async fn main() {
    /// use micro_rest::{RouteTable, Server, limits::ServerLimits};
    /// use tokio::net::TcpListener;
    ///
    /// let server = Server::builder()
    ///     .listener(TcpListener::bind("127.0.0.1:8080").await.unwrap())
    ///     .routes(RouteTable::new())
    ///     .server_limits(ServerLimits {
    ///         max_connections: 2500,
    ///         ..ServerLimits::default() // Required line
    ///     })
    ///     .build();
    /// # }
    /// ```
    #[inline(always)]
    pub fn server_limits(mut self, limits: ServerLimits) -> Self {
        self.server_limits = Some(limits);
        self
    }

    /// Configures connection timeouts and the error policy.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # #[tokio::main]
    /// # async fn main() {
    /// use micro_rest::{RouteTable, Server, limits::ConnLimits};
    /// use tokio::net::TcpListener;
    /// use std::time::Duration;
    ///
    /// let server = Server::builder()
    ///     .listener(TcpListener::bind("127.0.0.1:8080").await.unwrap())
    ///     .routes(RouteTable::new())
    ///     .connection_limits(ConnLimits {
    ///         read_timeout: Duration::from_secs(10),
    ///         keep_alive_on_error: true,
    ///         ..ConnLimits::default() // Required line
    ///     })
    ///     .build();
    /// # }
    /// ```
    #[inline(always)]
    pub fn connection_limits(mut self, limits: ConnLimits) -> Self {
        self.connection_limits = Some(limits);
        self
    }

    /// Configures request parsing limits.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # #[tokio::main]
    /// # async fn main() {
    /// use micro_rest::{RouteTable, Server, limits::ReqLimits};
    /// use tokio::net::TcpListener;
    ///
    /// let server = Server::builder()
    ///     .listener(TcpListener::bind("127.0.0.1:8080").await.unwrap())
    ///     .routes(RouteTable::new())
    ///     .request_limits(ReqLimits {
    ///         max_header_count: 32,
    ///         max_content_length: 64 * 1024,
    ///         ..ReqLimits::default() // Required line
    ///     })
    ///     .build();
    /// # }
    /// ```
    #[inline(always)]
    pub fn request_limits(mut self, limits: ReqLimits) -> Self {
        self.request_limits = Some(limits);
        self
    }

    /// Configures response serialization.
    #[inline(always)]
    pub fn response_limits(mut self, limits: RespLimits) -> Self {
        self.response_limits = Some(limits);
        self
    }

    /// Finalizes the builder and constructs a [`Server`] instance.
    ///
    /// # Panics
    ///
    /// Panics when:
    /// - Neither `listener` nor `bind` was called.
    /// - The `routes` method was not called.
    #[inline]
    #[track_caller]
    pub fn build(self) -> Server {
        let listener = self
            .listener
            .expect("The `listener` or `bind` method must be called to create");
        let routes = self
            .routes
            .expect("The `routes` method must be called to create");
        let server_limits = self.server_limits.unwrap_or_default();

        for binding in routes.routes().iter().flat_map(|route| route.methods.values()) {
            if let Some(name) = binding.resource_name().filter(|name| !self.resources.contains(name)) {
                warn!(resource = name, "route names an unregistered resource");
            }
        }

        let name = self.name.unwrap_or_else(|| env!("CARGO_PKG_NAME").to_string());
        let service = Service {
            resources: self.resources,

            conn_limits: self.connection_limits.unwrap_or_default(),
            req_limits: self.request_limits.unwrap_or_default(),
            resp_limits: self.response_limits.unwrap_or_default(),
            ..Service::new(name, routes)
        };

        Server {
            listener,
            service: Arc::new(service),
            permits: Arc::new(Semaphore::new(server_limits.max_connections)),
        }
    }
}
