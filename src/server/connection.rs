use crate::{
    errors::{ErrorKind, IoError},
    http::{
        reader::FrameReader,
        request::read_request,
        response::{Reply, Response},
    },
    server::{
        sequence::{ConnectionId, RequestId},
        server_impl::Service,
    },
    Method, Request, StatusCode,
};
use std::{
    io,
    net::SocketAddr,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::{
    io::{AsyncRead, AsyncWrite, AsyncWriteExt},
    time::timeout,
};
use tracing::{debug, error, info, warn};

/// One accepted connection: `OPEN -> {PROCESS -> RESPOND}* -> CLOSED`.
pub(crate) struct HttpConnection<S> {
    service: Arc<Service>,
    reader: FrameReader<S>,
    cid: ConnectionId,
    peer: Option<SocketAddr>,
}

impl<S: AsyncRead + AsyncWrite + Unpin> HttpConnection<S> {
    pub(crate) fn new(service: Arc<Service>, stream: S, peer: Option<SocketAddr>) -> Self {
        let reader = FrameReader::new(
            stream,
            &service.req_limits,
            service.conn_limits.read_timeout,
        );

        Self {
            service,
            reader,
            cid: ConnectionId::next(),
            peer,
        }
    }

    /// Serves requests until the peer leaves or keep-alive ends.
    pub(crate) async fn run(mut self) {
        let started = Instant::now();
        let mut announced = false;
        let mut silent = false;

        loop {
            let outcome = match self.exchange().await {
                Ok(outcome) => outcome,
                Err(err) => {
                    debug!(cid = %self.cid, error = %err, "connection error");
                    break;
                }
            };

            let Outcome::Responded {
                keep_alive,
                silent: quiet,
                report,
            } = outcome
            else {
                break;
            };

            silent = quiet;
            if !silent {
                if !announced {
                    self.announce();
                    announced = true;
                }
                report.log(self.cid);
            }

            if !keep_alive {
                break;
            }
        }

        let _ = self.reader.get_mut().shutdown().await;

        if announced && !silent {
            info!(cid = %self.cid, elapsed = ?started.elapsed(), "close");
        }
    }

    fn announce(&self) {
        match self.peer {
            Some(peer) => info!(server = %self.service.name, %peer, cid = %self.cid, "open"),
            None => info!(server = %self.service.name, cid = %self.cid, "open"),
        }
    }

    async fn exchange(&mut self) -> Result<Outcome, ErrorKind> {
        match self.reader.ready().await {
            Ok(()) => {}
            Err(ErrorKind::UnexpectedEof) => {
                debug!(cid = %self.cid, "remote close");
                return Ok(Outcome::Closed);
            }
            Err(ErrorKind::ReadTimeout) => {
                debug!(cid = %self.cid, "idle timeout");
                return Ok(Outcome::Closed);
            }
            Err(err) => return Err(err),
        }

        let started = Instant::now();
        let ctx = match read_request(&mut self.reader, &self.service.req_limits).await {
            Ok(ctx) => ctx,
            Err(ErrorKind::UnexpectedEof) => {
                debug!(cid = %self.cid, "remote close mid-request");
                return Ok(Outcome::Closed);
            }
            Err(err @ ErrorKind::Io(_)) => return Err(err),
            Err(err) => return self.reject(err).await,
        };

        let mut request = Request::new(ctx, self.cid, RequestId::next());
        let dispatched = self.service.dispatch(&mut request).await;

        let mut response = match dispatched.result {
            Ok(reply) => Response::from(reply),
            Err(err) => {
                if err.status().is_server_error() {
                    error!(cid = %self.cid, rid = %request.rid(), error = %err, "internal error");
                }
                Response::from_error(&err)
            }
        };
        response.compress(dispatched.compress);

        let keep_alive = request.is_keep_alive();
        if !keep_alive {
            response.close();
        }

        let written = self.write(&response).await;

        if let Some(cursor) = request.take_cursor() {
            if let Err(err) = cursor.close().await {
                error!(cid = %self.cid, rid = %request.rid(), error = %err, "cursor close failed");
            }
        }
        written?;

        Ok(Outcome::Responded {
            keep_alive,
            silent: dispatched.silent,
            report: Report::Exchange {
                rid: request.rid(),
                method: request.method().clone(),
                resource: request.resource().to_string(),
                status: response.status_code(),
                elapsed: started.elapsed(),
            },
        })
    }

    /// Answers a request that failed to parse.
    ///
    /// The connection is only kept when the broken message is known to have
    /// ended, otherwise its remainder would be read as the next request.
    async fn reject(&mut self, err: ErrorKind) -> Result<Outcome, ErrorKind> {
        let at_boundary = self.reader.discard();

        let keep_alive = self.service.conn_limits.keep_alive_on_error
            && at_boundary
            && !err.closes_connection();

        let mut response = Response::from_error(&err);
        if !keep_alive {
            response.close();
        }
        self.write(&response).await?;

        Ok(Outcome::Responded {
            keep_alive,
            silent: false,
            report: Report::Malformed(err),
        })
    }

    async fn write(&mut self, response: &Response) -> Result<(), ErrorKind> {
        let bytes = response.encode(&self.service.resp_limits)?;
        let stream = self.reader.get_mut();

        match timeout(self.service.conn_limits.write_timeout, stream.write_all(&bytes)).await {
            Ok(written) => Ok(written?),
            Err(_) => Err(ErrorKind::Io(IoError(io::ErrorKind::TimedOut.into()))),
        }
    }
}

enum Outcome {
    /// Peer went away or stayed idle; nothing was written.
    Closed,
    Responded {
        keep_alive: bool,
        silent: bool,
        report: Report,
    },
}

enum Report {
    Exchange {
        rid: RequestId,
        method: Method,
        resource: String,
        status: StatusCode,
        elapsed: Duration,
    },
    Malformed(ErrorKind),
}

impl Report {
    fn log(&self, cid: ConnectionId) {
        match self {
            Report::Exchange {
                rid,
                method,
                resource,
                status,
                elapsed,
            } => info!(
                %cid,
                %rid,
                %method,
                resource = %resource,
                status = status.as_u16(),
                ?elapsed,
                "request"
            ),
            Report::Malformed(err) => match err.explanation() {
                explanation if explanation.is_empty() => {
                    warn!(code = err.status().as_u16(), %cid, "malformed request")
                }
                explanation => {
                    warn!(code = err.status().as_u16(), %explanation, %cid, "malformed request")
                }
            },
        }
    }
}

/// Result of matching and running one handler.
pub(crate) struct Dispatched {
    pub(crate) result: Result<Reply, ErrorKind>,
    pub(crate) silent: bool,
    pub(crate) compress: bool,
}

impl Service {
    /// Matches `request`, runs its handler inside the resource scope and
    /// commits on success. The cursor stays attached to the request so the
    /// caller can close it after the response is written.
    pub(crate) async fn dispatch(&self, request: &mut Request) -> Dispatched {
        let matched = match self.routes.match_request(request) {
            Ok(matched) => matched,
            Err(err) => {
                return Dispatched {
                    result: Err(err),
                    silent: false,
                    compress: false,
                }
            }
        };

        let silent = matched.is_silent();
        let compress = matched.compress();

        if let Some(name) = matched.resource() {
            match self.resources.open(name).await {
                Ok(cursor) => request.attach_cursor(cursor),
                Err(err) => {
                    return Dispatched {
                        result: Err(err),
                        silent,
                        compress,
                    }
                }
            }
        }

        let result = match (matched.call(request).await, request.cursor()) {
            (Ok(reply), Some(cursor)) => cursor.commit().await.map(|()| reply).map_err(Into::into),
            (result, _) => result,
        };

        Dispatched {
            result,
            silent,
            compress,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        limits::ConnLimits,
        router::{
            coerce::Coercer,
            route::{handler_fn, Content, MethodBinding, Route, RouteTable},
        },
        server::{resource::tests::Journal, resource::Resources, server_impl::Service},
        HandlerError,
    };
    use serde_json::{json, Value};
    use std::sync::Mutex;
    use tokio::io::{duplex, AsyncReadExt};
    use tracing::Level;

    fn routes() -> RouteTable {
        RouteTable::new()
            .route(
                Route::new("/hello$")
                    .unwrap()
                    .get(MethodBinding::new(handler_fn(|_, _, _| Ok(json!("hi"))))),
            )
            .route(
                Route::new(r"/items/(\d+)$").unwrap().arg(Coercer::Int).put(
                    MethodBinding::new(handler_fn(|_, args, content| {
                        Ok(json!({"id": args[0], "n": content["n"]}))
                    }))
                    .content(Content::new("n", Coercer::Str))
                    .resource("db"),
                ),
            )
            .route(
                Route::new("/fail$").unwrap().get(
                    MethodBinding::new(handler_fn(|_, _, _| {
                        Err::<Value, _>(HandlerError::internal("database exploded"))
                    }))
                    .resource("db"),
                ),
            )
            .route(
                Route::new("/panic$").unwrap().get(
                    MethodBinding::new(handler_fn(|_, _, _| -> Result<Value, HandlerError> {
                        panic!("handler bug")
                    }))
                    .resource("db"),
                ),
            )
            .route(
                Route::new("/items$").unwrap().post(
                    MethodBinding::new(handler_fn(|_, _, content| {
                        Ok(Reply::new(Value::Object(content))
                            .status(StatusCode::Created)
                            .header("Location", "/items/1"))
                    }))
                    .content(Content::new("n", Coercer::Str))
                    .resource("db"),
                ),
            )
            .route(
                Route::new("/health$")
                    .unwrap()
                    .get(MethodBinding::new(handler_fn(|_, _, _| Ok(Value::Null))).silent()),
            )
    }

    fn service(journal: &Journal, conn_limits: ConnLimits) -> Arc<Service> {
        Arc::new(Service {
            conn_limits,
            resources: Resources::new().register("db", journal.clone()),
            ..Service::new("test", routes())
        })
    }

    fn quick() -> ConnLimits {
        ConnLimits {
            read_timeout: Duration::from_millis(200),
            ..ConnLimits::default()
        }
    }

    // Sends `input`, returns everything the server wrote until it closed.
    async fn converse(service: Arc<Service>, input: &[u8]) -> String {
        let (mut client, server) = duplex(64 * 1024);
        let task = tokio::spawn(HttpConnection::new(service, server, None).run());

        client.write_all(input).await.unwrap();

        let mut output = Vec::new();
        client.read_to_end(&mut output).await.unwrap();
        task.await.unwrap();

        String::from_utf8(output).unwrap()
    }

    // Status of every response in `output`, in order.
    fn statuses(output: &str) -> Vec<&str> {
        output
            .split("HTTP/1.1 ")
            .skip(1)
            .filter_map(|response| response.split("\r\n").next())
            .collect()
    }

    #[tokio::test]
    async fn keep_alive_until_close() {
        let journal = Journal::default();
        let output = converse(
            service(&journal, quick()),
            concat!(
                "GET /hello HTTP/1.1\r\n\r\n",
                "GET /missing HTTP/1.1\r\n\r\n",
                "GET /hello HTTP/1.1\r\nConnection: close\r\n\r\n",
                "GET /hello HTTP/1.1\r\n\r\n",
            )
            .as_bytes(),
        )
        .await;

        assert_eq!(
            statuses(&output),
            ["200 OK", "404 Not Found", "200 OK"]
        );
        assert_eq!(output.matches("Connection: close").count(), 1);
        assert!(output.ends_with("Connection: close\r\n\r\nhi"));
    }

    #[tokio::test]
    async fn idle_connection_closes_silently() {
        let journal = Journal::default();
        let output = converse(service(&journal, quick()), b"GET /hello HTTP/1.1\r\n\r\n").await;

        assert_eq!(statuses(&output), ["200 OK"]);
        assert!(!output.contains("Connection: close"));
    }

    #[tokio::test]
    async fn empty_connection() {
        let journal = Journal::default();
        assert_eq!(converse(service(&journal, quick()), b"").await, "");
    }

    #[tokio::test]
    async fn timeout_mid_request() {
        let journal = Journal::default();
        let output = converse(service(&journal, quick()), b"GET /hello HTTP/1.1\r\nHost: x").await;

        assert_eq!(statuses(&output), ["400 Bad Request"]);
        assert!(output.ends_with("\r\n\r\ntimeout reading HTTP document"));
    }

    #[tokio::test]
    async fn resource_scope() {
        let journal = Journal::default();
        let output = converse(
            service(&journal, quick()),
            concat!(
                "PUT /items/5 HTTP/1.1\r\n",
                "Content-Type: application/x-www-form-urlencoded\r\n",
                "Content-Length: 6\r\n",
                "Connection: close\r\n",
                "\r\n",
                "n=bolt",
            )
            .as_bytes(),
        )
        .await;

        assert_eq!(statuses(&output), ["200 OK"]);
        assert!(output.ends_with(r#"{"id":5,"n":"bolt"}"#));
        assert_eq!(journal.events(), ["acquire", "begin", "commit", "close"]);
    }

    #[tokio::test]
    async fn failures_skip_commit_and_close() {
        for path in ["/fail", "/panic"] {
            let journal = Journal::default();
            let input = format!("GET {path} HTTP/1.1\r\nConnection: close\r\n\r\n");
            let output = converse(service(&journal, quick()), input.as_bytes()).await;

            assert_eq!(statuses(&output), ["500 Internal Server Error"], "{path}");
            assert!(output.ends_with("Content-Length: 0\r\nConnection: close\r\n\r\n"), "{path}");
            assert_eq!(journal.events(), ["acquire", "begin", "close"], "{path}");
        }
    }

    #[tokio::test]
    async fn commit_failure() {
        let journal = Journal {
            fail_commit: true,
            ..Journal::default()
        };
        let output = converse(
            service(&journal, quick()),
            concat!(
                "PUT /items/5 HTTP/1.1\r\n",
                "Content-Type: application/json\r\n",
                "Content-Length: 8\r\n",
                "Connection: close\r\n",
                "\r\n",
                r#"{"n":""}"#,
            )
            .as_bytes(),
        )
        .await;

        assert_eq!(statuses(&output), ["500 Internal Server Error"]);
        assert_eq!(journal.events(), ["acquire", "begin", "commit", "close"]);
    }

    #[tokio::test]
    async fn client_error_skips_resource() {
        let journal = Journal::default();
        let output = converse(
            service(&journal, quick()),
            b"PUT /items/5 HTTP/1.1\r\nConnection: close\r\n\r\n",
        )
        .await;

        assert_eq!(statuses(&output), ["400 Bad Request"]);
        assert!(output.ends_with("missing required content 'n'"));
        assert!(journal.events().is_empty());
    }

    #[tokio::test]
    async fn malformed_request_closes() {
        let journal = Journal::default();
        let output = converse(
            service(&journal, quick()),
            b"GET /hello\r\n\r\nGET /hello HTTP/1.1\r\n\r\n",
        )
        .await;

        assert_eq!(statuses(&output), ["400 Bad Request"]);
        assert!(output.contains("Connection: close\r\n"));
        assert!(output.ends_with("malformed status line"));
    }

    #[tokio::test]
    async fn malformed_request_keep_alive() {
        let journal = Journal::default();
        let limits = ConnLimits {
            keep_alive_on_error: true,
            ..quick()
        };

        // The second request arrives after the broken one was discarded.
        let (mut client, server) = duplex(64 * 1024);
        let task = tokio::spawn(HttpConnection::new(service(&journal, limits), server, None).run());

        client.write_all(b"BREW /pot HTTP/2.0\r\n\r\n").await.unwrap();
        let mut buffer = vec![0; 1024];
        let n = client.read(&mut buffer).await.unwrap();
        let first = String::from_utf8_lossy(&buffer[..n]).to_string();
        assert!(first.starts_with("HTTP/1.1 400 Bad Request\r\n"));
        assert!(!first.contains("Connection: close"));

        client
            .write_all(b"GET /hello HTTP/1.1\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        let mut rest = Vec::new();
        client.read_to_end(&mut rest).await.unwrap();
        task.await.unwrap();

        assert!(String::from_utf8(rest).unwrap().starts_with("HTTP/1.1 200 OK\r\n"));
    }

    #[tokio::test]
    async fn fatal_errors_always_close() {
        let journal = Journal::default();
        let limits = ConnLimits {
            keep_alive_on_error: true,
            ..quick()
        };
        let output = converse(
            service(&journal, limits),
            b"POST /hello HTTP/1.1\r\nContent-Length: 99999999\r\n\r\n",
        )
        .await;

        assert_eq!(statuses(&output), ["413 Request Entity Too Large"]);
        assert!(output.ends_with("Content-Length: 0\r\nConnection: close\r\n\r\n"));
    }

    #[tokio::test]
    async fn silent_route() {
        let journal = Journal::default();
        let output = converse(
            service(&journal, quick()),
            b"GET /health HTTP/1.1\r\nConnection: close\r\n\r\n",
        )
        .await;

        assert_eq!(statuses(&output), ["200 OK"]);
        assert!(output.ends_with("Content-Length: 0\r\nConnection: close\r\n\r\n"));
    }

    #[tokio::test]
    async fn reply_status_and_headers() {
        let journal = Journal::default();
        let output = converse(
            service(&journal, quick()),
            concat!(
                "POST /items HTTP/1.1\r\n",
                "Content-Type: application/json\r\n",
                "Content-Length: 12\r\n",
                "Connection: close\r\n",
                "\r\n",
                r#"{"n":"bolt"}"#,
            )
            .as_bytes(),
        )
        .await;

        assert_eq!(statuses(&output), ["201 Created"]);
        assert!(output.contains("\r\nLocation: /items/1\r\n"));
        assert!(output.ends_with(r#"{"n":"bolt"}"#));
        assert_eq!(journal.events(), ["acquire", "begin", "commit", "close"]);
    }

    #[tokio::test]
    async fn write_failure_closes_cursor() {
        let journal = Journal::default();
        let logs = Logs::default();
        let _guard = logs.capture(Level::DEBUG);

        let (mut client, server) = duplex(64 * 1024);
        client
            .write_all(b"PUT /items/5 HTTP/1.1\r\nContent-Type: application/x-www-form-urlencoded\r\nContent-Length: 6\r\n\r\nn=bolt")
            .await
            .unwrap();
        drop(client);

        HttpConnection::new(service(&journal, quick()), server, None).run().await;

        assert_eq!(journal.events(), ["acquire", "begin", "commit", "close"]);
        assert!(logs.messages().contains(&"connection error".to_string()));
        assert!(!logs.messages().contains(&"request".to_string()));
    }

    #[tokio::test]
    async fn broken_message_in_flight_closes() {
        let journal = Journal::default();
        let limits = ConnLimits {
            keep_alive_on_error: true,
            ..quick()
        };

        // The rest of the header block has not arrived yet.
        let output = converse(
            service(&journal, limits.clone()),
            b"GET /hello HTTP/1.1\r\nno colon here\r\nHost: x",
        )
        .await;
        assert_eq!(statuses(&output), ["400 Bad Request"]);
        assert!(output.contains("Connection: close\r\n"));

        // A bad body is fully consumed, so the next request survives.
        let output = converse(
            service(&journal, limits),
            concat!(
                "POST /hello HTTP/1.1\r\n",
                "Content-Type: application/json\r\n",
                "Content-Length: 3\r\n",
                "\r\n",
                "abc",
                "GET /hello HTTP/1.1\r\nConnection: close\r\n\r\n",
            )
            .as_bytes(),
        )
        .await;
        assert_eq!(statuses(&output), ["400 Bad Request", "200 OK"]);
        assert_eq!(output.matches("Connection: close").count(), 1);
        assert!(output.ends_with("hi"));
    }

    /// Formatted events recorded while a [`Logs::capture`] guard is alive.
    #[derive(Clone, Default)]
    struct Logs(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Logs {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Logs {
        fn capture(&self, level: Level) -> tracing::subscriber::DefaultGuard {
            let logs = self.clone();
            let subscriber = tracing_subscriber::fmt()
                .with_writer(move || logs.clone())
                .with_max_level(level)
                .with_ansi(false)
                .with_target(false)
                .without_time()
                .finish();

            tracing::subscriber::set_default(subscriber)
        }

        fn lines(&self) -> Vec<String> {
            let bytes = self.0.lock().unwrap().clone();
            String::from_utf8(bytes).unwrap().lines().map(str::to_string).collect()
        }

        // Event messages in order: the words between the level and the
        // first `key=value` field.
        fn messages(&self) -> Vec<String> {
            self.lines()
                .iter()
                .map(|line| {
                    line.split_whitespace()
                        .skip(1)
                        .take_while(|word| !word.contains('='))
                        .collect::<Vec<_>>()
                        .join(" ")
                })
                .collect()
        }
    }

    // Like `converse`, but polls the connection on this task so that the
    // thread-local subscriber sees its events.
    async fn converse_logged(service: Arc<Service>, input: &[u8]) -> String {
        let (mut client, server) = duplex(64 * 1024);
        let connection = HttpConnection::new(service, server, None).run();

        let talk = async move {
            client.write_all(input).await.unwrap();
            let mut output = Vec::new();
            client.read_to_end(&mut output).await.unwrap();
            output
        };

        let ((), output) = tokio::join!(connection, talk);
        String::from_utf8(output).unwrap()
    }

    #[tokio::test]
    async fn silent_route_logs_nothing() {
        let journal = Journal::default();
        let logs = Logs::default();
        let _guard = logs.capture(Level::INFO);

        let output = converse_logged(
            service(&journal, quick()),
            b"GET /health HTTP/1.1\r\nConnection: close\r\n\r\n",
        )
        .await;

        assert_eq!(statuses(&output), ["200 OK"]);
        assert!(logs.lines().is_empty(), "{:?}", logs.lines());
    }

    #[tokio::test]
    async fn open_is_deferred_to_first_logged_exchange() {
        let journal = Journal::default();
        let logs = Logs::default();
        let _guard = logs.capture(Level::INFO);

        let output = converse_logged(
            service(&journal, quick()),
            concat!(
                "GET /health HTTP/1.1\r\n\r\n",
                "GET /hello HTTP/1.1\r\n\r\n",
                "GET /health HTTP/1.1\r\nConnection: close\r\n\r\n",
            )
            .as_bytes(),
        )
        .await;

        assert_eq!(statuses(&output), ["200 OK", "200 OK", "200 OK"]);
        // The last exchange was silent, so there is no close event.
        assert_eq!(logs.messages(), ["open", "request"]);

        let lines = logs.lines();
        assert!(lines[0].contains("server=test"));
        assert!(lines[1].contains("resource=/hello"));
        assert!(lines[1].contains("status=200"));
    }

    #[tokio::test]
    async fn close_event_after_logged_exchange() {
        let journal = Journal::default();
        let logs = Logs::default();
        let _guard = logs.capture(Level::INFO);

        converse_logged(
            service(&journal, quick()),
            b"GET /hello HTTP/1.1\r\nConnection: close\r\n\r\n",
        )
        .await;

        assert_eq!(logs.messages(), ["open", "request", "close"]);
        assert!(logs.lines()[2].contains("elapsed="));
    }

    #[tokio::test]
    async fn malformed_request_warns() {
        let journal = Journal::default();
        let logs = Logs::default();
        let _guard = logs.capture(Level::INFO);

        converse_logged(service(&journal, quick()), b"GET /hello\r\n\r\n").await;

        assert_eq!(logs.messages(), ["open", "malformed request", "close"]);

        let warning = &logs.lines()[1];
        assert!(warning.contains("WARN"), "{warning}");
        assert!(warning.contains("code=400"), "{warning}");
        assert!(warning.contains("explanation=malformed status line"), "{warning}");
    }
}
