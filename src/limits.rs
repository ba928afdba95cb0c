//! Server configuration limits and timeouts
//!
//! Every struct here implements [`Default`] with values suited to small REST
//! services; override single fields with struct update syntax.
//!
//! # Examples
//!
//! ```no_run
//! use micro_rest::{Server, RouteTable, limits::{ConnLimits, ReqLimits, ServerLimits}};
//! use tokio::net::TcpListener;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() {
//!     Server::builder()
//!         .listener(TcpListener::bind("127.0.0.1:8080").await.unwrap())
//!         .routes(RouteTable::new())
//!         .server_limits(ServerLimits {
//!             max_connections: 5000,
//!             ..ServerLimits::default()
//!         })
//!         .connection_limits(ConnLimits {
//!             read_timeout: Duration::from_secs(2),
//!             ..ConnLimits::default()
//!         })
//!         .request_limits(ReqLimits {
//!             max_content_length: 16 * 1024,
//!             ..ReqLimits::default()
//!         })
//!         .build()
//!         .launch()
//!         .await;
//! }
//! ```

use std::time::Duration;

/// Controls server-level concurrency.
///
/// # Connection management
/// ```text
///                         [------------]
///                         [ Tcp accept ]
///                         [------------]
///                               ||
///                               \/
/// [-------------]   Yes   /-------------\   No   [-------------]
/// [ Spawn task  ] <====== | Free permit? | =====> [ Sending 503 ]
/// [-------------]         \-------------/        [-------------]
/// ```
///
/// Every accepted connection runs in its own task and holds one permit until
/// it closes.
#[derive(Debug, Clone)]
pub struct ServerLimits {
    /// Maximum number of concurrently served connections (default: `1024`).
    ///
    /// Connections accepted beyond this receive an immediate
    /// [503](crate::StatusCode::ServiceUnavailable) and are closed.
    pub max_connections: usize,

    /// Backlog passed to `listen(2)` when the server binds its own socket
    /// (default: `1024`).
    pub backlog: i32,

    #[doc(hidden)]
    #[allow(dead_code)]
    pub _priv: (),
}

impl Default for ServerLimits {
    fn default() -> Self {
        Self {
            max_connections: 1024,
            backlog: 1024,

            _priv: (),
        }
    }
}

/// Connection-level timeouts and error policy
#[derive(Debug, Clone)]
pub struct ConnLimits {
    /// Maximum duration of a single read from the socket (default: `5 seconds`)
    ///
    /// A timeout in the middle of a request is answered with `400`. A timeout
    /// while the connection sits idle between requests closes it silently.
    pub read_timeout: Duration,

    /// Maximum duration to write one response (default: `5 seconds`)
    pub write_timeout: Duration,

    /// Keep the connection open after a malformed request (default: `false`)
    ///
    /// Errors after which the stream can't be resynchronised (an over-long
    /// line or an oversized body) always close the connection. So does a
    /// failure before the body when the broken message has not visibly ended
    /// (the buffered bytes do not end with an empty line): its remainder may
    /// still be in flight.
    ///
    /// A message that fails in its header block but still carries a body is
    /// not detected; the body is then read as the next request.
    pub keep_alive_on_error: bool,

    #[doc(hidden)]
    #[allow(dead_code)]
    pub _priv: (),
}

impl Default for ConnLimits {
    #[inline(always)]
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_secs(5),
            write_timeout: Duration::from_secs(5),
            keep_alive_on_error: false,

            _priv: (),
        }
    }
}

/// HTTP request parsing limits
///
/// 🔧 **You MAY need to increase these if you see:**
/// - `413 Payload Too Large` for legitimate requests
/// - `431 Request Header Fields Too Large`
/// - `400` with `max header count exceeded`
#[derive(Debug, Clone)]
pub struct ReqLimits {
    /// Maximum length of the status line or of one header line, excluding the
    /// line terminator (default: `10_000 B`)
    pub max_line_length: usize,
    /// Maximum number of header lines per request (default: `100`)
    pub max_header_count: usize,
    /// Maximum accepted `Content-Length` (default: `1_000_000 B`)
    pub max_content_length: usize,
    /// Size of one socket read (default: `5_000 B`)
    pub read_chunk: usize,

    #[doc(hidden)]
    #[allow(dead_code)]
    pub _priv: (),
}

impl Default for ReqLimits {
    fn default() -> Self {
        Self {
            max_line_length: 10_000,
            max_header_count: 100,
            max_content_length: 1_000_000,
            read_chunk: 5_000,

            _priv: (),
        }
    }
}

/// Response serialization settings
#[derive(Debug, Clone)]
pub struct RespLimits {
    /// Charset appended to the inferred `Content-Type` (default: `utf-8`)
    pub charset: &'static str,
    /// Gzip every response body (default: `false`)
    ///
    /// Single bindings can opt in with
    /// [`MethodBinding::compress`](crate::MethodBinding::compress).
    pub compress: bool,

    #[doc(hidden)]
    #[allow(dead_code)]
    pub _priv: (),
}

impl Default for RespLimits {
    fn default() -> Self {
        Self {
            charset: "utf-8",
            compress: false,

            _priv: (),
        }
    }
}
