use crate::{
    errors::ErrorKind,
    http::{
        reader::FrameReader,
        types::{self, ContentType},
    },
    limits::ReqLimits,
    query::Query,
    server::{
        resource::Cursor,
        sequence::{ConnectionId, RequestId},
    },
    Method, Version,
};
use flate2::read::GzDecoder;
use serde_json::{Map, Value};
use std::{collections::HashMap, fmt, io::Read, sync::LazyLock};
use tokio::io::AsyncRead;
use url::Url;

// Origin-form targets are resolved against this base; only the path and
// query of the result are used.
static BASE: LazyLock<Url> =
    LazyLock::new(|| Url::parse("http://localhost/").expect("base url is valid"));

/// Fields of one request as they are parsed.
///
/// Filled stage by stage by [`Parser`]; once the parser reaches its terminal
/// state the context is moved into a [`Request`] and never changes again.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ParserContext {
    max_header_count: usize,
    max_content_length: usize,

    pub(crate) method: Method,
    pub(crate) resource: String,
    pub(crate) version: Version,
    pub(crate) query_string: String,
    pub(crate) query: Map<String, Value>,

    pub(crate) header_count: usize,
    pub(crate) headers: HashMap<String, String>,
    pub(crate) keep_alive: bool,
    pub(crate) content_length: usize,
    pub(crate) content_type: Option<ContentType>,
    pub(crate) encoding: Option<String>,

    pub(crate) body: Option<String>,
    pub(crate) content: Value,
}

impl ParserContext {
    pub(crate) fn new(limits: &ReqLimits) -> Self {
        Self {
            max_header_count: limits.max_header_count,
            max_content_length: limits.max_content_length,

            method: Method::Get,
            resource: String::new(),
            version: Version::Http11,
            query_string: String::new(),
            query: Map::new(),

            header_count: 0,
            headers: HashMap::new(),
            keep_alive: true,
            content_length: 0,
            content_type: None,
            encoding: None,

            body: None,
            content: Value::Object(Map::new()),
        }
    }

    // METHOD SP TARGET SP VERSION
    fn status_line(&mut self, line: &str) -> Result<(), ErrorKind> {
        let tokens: [&str; 3] = line
            .split_whitespace()
            .collect::<Vec<_>>()
            .try_into()
            .map_err(|_| ErrorKind::MalformedStatusLine)?;
        let [method, target, version] = tokens;

        self.version = Version::from_bytes(version.as_bytes())?;
        self.method = Method::from_token(method);

        let url = Url::options()
            .base_url(Some(&BASE))
            .parse(target)
            .map_err(|_| ErrorKind::InvalidTarget)?;

        self.resource = url.path().to_string();
        if let Some(query) = url.query().filter(|q| !q.is_empty()) {
            self.query_string = query.to_string();
            self.query = Query::parse(query.as_bytes());
        }

        Ok(())
    }

    fn header(&mut self, line: &str) -> Result<(), ErrorKind> {
        if self.header_count == self.max_header_count {
            return Err(ErrorKind::TooManyHeaders);
        }
        self.header_count += 1;

        let (name, value) = line.split_once(':').ok_or(ErrorKind::MissingColon)?;
        self.headers
            .insert(name.trim().to_ascii_lowercase(), value.trim().to_string());

        Ok(())
    }

    fn end_headers(&mut self) -> Result<(), ErrorKind> {
        self.keep_alive = self.headers.get("connection").map(String::as_str) != Some("close");

        if let Some(length) = self.headers.get("content-length") {
            self.content_length = types::slice_to_usize(length.as_bytes())
                .ok_or(ErrorKind::InvalidContentLength)?;
        }
        if self.content_length > self.max_content_length {
            return Err(ErrorKind::EntityTooLarge);
        }

        if let Some(content_type) = self.headers.get("content-type") {
            self.content_type = Some(ContentType::parse(content_type)?);
        }

        for (header, label) in [
            ("content-encoding", "content"),
            ("transfer-encoding", "transfer"),
        ] {
            match self.headers.get(header).map(String::as_str) {
                None => {}
                Some("gzip") => self.encoding = Some("gzip".to_string()),
                Some(_) => return Err(ErrorKind::UnsupportedEncoding(label)),
            }
        }

        Ok(())
    }

    fn body(&mut self, data: Vec<u8>) -> Result<(), ErrorKind> {
        if !data.is_empty() {
            let data = match self.encoding.as_deref() {
                Some("gzip") => {
                    let mut decoded = Vec::new();
                    GzDecoder::new(data.as_slice())
                        .read_to_end(&mut decoded)
                        .map_err(|_| ErrorKind::MalformedCompressedBody)?;
                    decoded
                }
                _ => data,
            };

            let charset = self.content_type.as_ref().and_then(|c| c.charset.as_deref());
            self.body = Some(types::decode_text(&data, charset)?);
        }

        self.content = match (&self.method, &self.content_type, &self.body) {
            (Method::Get, _, _) => Value::Object(self.query.clone()),
            (method, Some(content_type), Some(body)) if method.has_body_content() => {
                if content_type.is("application/json") {
                    serde_json::from_str(body).map_err(|_| ErrorKind::InvalidJson)?
                } else if content_type.is("application/x-www-form-urlencoded") {
                    Value::Object(Query::parse(body.as_bytes()))
                } else {
                    Value::Object(Map::new())
                }
            }
            _ => Value::Object(Map::new()),
        };

        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum State {
    Status,
    Headers,
    Body,
    Complete,
}

#[derive(Debug)]
pub(crate) enum Input {
    Line(String),
    Body(Vec<u8>),
}

/// What the parser needs next from the frame reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Want {
    Line,
    Bytes(usize),
    Nothing,
}

impl State {
    fn next(self, ctx: &mut ParserContext, input: Input) -> Result<State, ErrorKind> {
        match (self, input) {
            (State::Status, Input::Line(line)) => {
                ctx.status_line(&line)?;
                Ok(State::Headers)
            }
            (State::Headers, Input::Line(line)) if line.is_empty() => {
                ctx.end_headers()?;
                Ok(State::Body)
            }
            (State::Headers, Input::Line(line)) => {
                ctx.header(&line)?;
                Ok(State::Headers)
            }
            (State::Body, Input::Body(data)) => {
                ctx.body(data)?;
                Ok(State::Complete)
            }
            (state, input) => Err(ErrorKind::Internal(format!(
                "parser in state {state:?} got {input:?}"
            ))),
        }
    }
}

/// Incremental request parser: `Status -> Headers -> Body -> Complete`.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Parser {
    state: State,
    ctx: ParserContext,
}

impl Parser {
    pub(crate) fn new(limits: &ReqLimits) -> Self {
        Self {
            state: State::Status,
            ctx: ParserContext::new(limits),
        }
    }

    #[inline]
    pub(crate) fn want(&self) -> Want {
        match self.state {
            State::Status | State::Headers => Want::Line,
            State::Body => Want::Bytes(self.ctx.content_length),
            State::Complete => Want::Nothing,
        }
    }

    #[inline]
    pub(crate) fn feed(&mut self, input: Input) -> Result<(), ErrorKind> {
        self.state = self.state.next(&mut self.ctx, input)?;
        Ok(())
    }

    #[inline]
    pub(crate) fn is_complete(&self) -> bool {
        self.state == State::Complete
    }

    pub(crate) fn into_context(self) -> Option<ParserContext> {
        self.is_complete().then_some(self.ctx)
    }
}

/// Pulls lines and bytes from `reader` until one request is parsed.
///
/// Bytes after the end of the body stay buffered for the next request.
pub(crate) async fn read_request<R: AsyncRead + Unpin>(
    reader: &mut FrameReader<R>,
    limits: &ReqLimits,
) -> Result<ParserContext, ErrorKind> {
    let mut parser = Parser::new(limits);

    loop {
        let input = match parser.want() {
            Want::Line => Input::Line(reader.read_line().await?),
            Want::Bytes(len) => Input::Body(reader.read_exact(len).await?),
            Want::Nothing => break,
        };
        parser.feed(input)?;
    }

    parser
        .into_context()
        .ok_or_else(|| ErrorKind::Internal("parser stopped before completion".into()))
}

/// A fully parsed HTTP request.
///
/// Handlers receive it by mutable reference; everything but the attached
/// cursor is read-only.
pub struct Request {
    ctx: ParserContext,
    cid: ConnectionId,
    rid: RequestId,
    cursor: Option<Box<dyn Cursor>>,
}

impl Request {
    pub(crate) fn new(ctx: ParserContext, cid: ConnectionId, rid: RequestId) -> Self {
        Self {
            ctx,
            cid,
            rid,
            cursor: None,
        }
    }

    #[inline(always)]
    pub(crate) fn attach_cursor(&mut self, cursor: Box<dyn Cursor>) {
        self.cursor = Some(cursor);
    }

    #[inline(always)]
    pub(crate) fn take_cursor(&mut self) -> Option<Box<dyn Cursor>> {
        self.cursor.take()
    }
}

// Public API
impl Request {
    /// Upper-cased request method.
    #[inline(always)]
    pub const fn method(&self) -> &Method {
        &self.ctx.method
    }

    /// Path of the request target, without the query string.
    #[inline(always)]
    pub fn resource(&self) -> &str {
        &self.ctx.resource
    }

    #[inline(always)]
    pub const fn version(&self) -> Version {
        self.ctx.version
    }

    /// Raw query string (without `?`), empty if none was given.
    #[inline(always)]
    pub fn query_string(&self) -> &str {
        &self.ctx.query_string
    }

    /// Decoded query string, see [`Query::parse`].
    #[inline(always)]
    pub const fn query(&self) -> &Map<String, Value> {
        &self.ctx.query
    }

    /// Header value by case-insensitive name. Later duplicates overwrite
    /// earlier ones.
    #[inline]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.ctx
            .headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// All headers, names lower-cased.
    #[inline(always)]
    pub const fn headers(&self) -> &HashMap<String, String> {
        &self.ctx.headers
    }

    #[inline(always)]
    pub const fn content_length(&self) -> usize {
        self.ctx.content_length
    }

    /// `type/subtype` of the `Content-Type` header.
    #[inline]
    pub fn content_type(&self) -> Option<&str> {
        self.ctx.content_type.as_ref().map(|c| c.media_type.as_str())
    }

    #[inline]
    pub fn charset(&self) -> Option<&str> {
        self.ctx.content_type.as_ref()?.charset.as_deref()
    }

    /// `gzip` when the body arrived compressed.
    #[inline]
    pub fn encoding(&self) -> Option<&str> {
        self.ctx.encoding.as_deref()
    }

    /// Body after decompression and charset decoding.
    #[inline]
    pub fn body(&self) -> Option<&str> {
        self.ctx.body.as_deref()
    }

    /// Query mapping for `GET`, decoded JSON or form body for
    /// `PATCH`/`POST`/`PUT`, an empty mapping otherwise.
    #[inline(always)]
    pub const fn content(&self) -> &Value {
        &self.ctx.content
    }

    /// `false` only when the `Connection` header is exactly `close`.
    #[inline(always)]
    pub const fn is_keep_alive(&self) -> bool {
        self.ctx.keep_alive
    }

    #[inline(always)]
    pub const fn cid(&self) -> ConnectionId {
        self.cid
    }

    #[inline(always)]
    pub const fn rid(&self) -> RequestId {
        self.rid
    }

    /// Cursor acquired for this request, if the route declared a resource.
    #[inline]
    pub fn cursor(&mut self) -> Option<&mut (dyn Cursor + 'static)> {
        self.cursor.as_deref_mut()
    }

    /// Cursor downcast to its concrete type.
    pub fn cursor_as<C: Cursor + 'static>(&mut self) -> Option<&mut C> {
        self.cursor.as_mut()?.as_any_mut().downcast_mut::<C>()
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("cid", &self.cid)
            .field("rid", &self.rid)
            .field("method", &self.ctx.method)
            .field("resource", &self.ctx.resource)
            .field("keep_alive", &self.ctx.keep_alive)
            .field("has_cursor", &self.cursor.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::tools::ChunkedStream;
    use flate2::{write::GzEncoder, Compression};
    use serde_json::json;
    use std::{io::Write, time::Duration};

    pub(crate) async fn parse_chunks<I, C>(chunks: I, limits: &ReqLimits) -> Result<ParserContext, ErrorKind>
    where
        I: IntoIterator<Item = C>,
        C: AsRef<[u8]>,
    {
        let mut reader = FrameReader::new(ChunkedStream::new(chunks), limits, Duration::from_secs(1));
        read_request(&mut reader, limits).await
    }

    async fn parse(data: &str) -> Result<ParserContext, ErrorKind> {
        parse_chunks([data], &ReqLimits::default()).await
    }

    #[tokio::test]
    async fn status_line() {
        #[rustfmt::skip]
        let cases = [
            ("GET / HTTP/1.1",                  Ok((Method::Get, "/", Version::Http11))),
            ("get /users HTTP/1.0",             Ok((Method::Get, "/users", Version::Http10))),
            ("POST  /items\tHTTP/1.1",          Ok((Method::Post, "/items", Version::Http11))),
            ("PURGE /cache HTTP/1.1",           Ok((Method::Extension("PURGE".into()), "/cache", Version::Http11))),
            ("GET http://example.com/a/b?x=1 HTTP/1.1", Ok((Method::Get, "/a/b", Version::Http11))),

            ("GET / HTTP/1.1 extra",            Err(ErrorKind::MalformedStatusLine)),
            ("GET /",                           Err(ErrorKind::MalformedStatusLine)),
            ("",                                Err(ErrorKind::MalformedStatusLine)),
            ("GET / HTTP/2.0",                  Err(ErrorKind::UnsupportedProtocol)),
            ("GET / http/1.1",                  Err(ErrorKind::UnsupportedProtocol)),
            ("GET http://[::1 HTTP/1.1",        Err(ErrorKind::InvalidTarget)),
        ];

        for (line, expected) in cases {
            let result = parse(&format!("{line}\r\n\r\n")).await;
            match expected {
                Ok((method, resource, version)) => {
                    let ctx = result.unwrap();
                    assert_eq!(ctx.method, method, "{line:?}");
                    assert_eq!(ctx.resource, resource, "{line:?}");
                    assert_eq!(ctx.version, version, "{line:?}");
                }
                Err(err) => assert_eq!(result, Err(err), "{line:?}"),
            }
        }
    }

    #[tokio::test]
    async fn query_becomes_get_content() {
        let ctx = parse("GET /users?active=1 HTTP/1.1\r\n\r\n").await.unwrap();

        assert_eq!(ctx.resource, "/users");
        assert_eq!(ctx.query_string, "active=1");
        assert_eq!(ctx.content, json!({"active": "1"}));

        let ctx = parse("GET /t?a=1&b=2&a=3 HTTP/1.1\r\n\r\n").await.unwrap();
        assert_eq!(ctx.content, json!({"a": ["1", "3"], "b": "2"}));
    }

    #[tokio::test]
    async fn headers() {
        let ctx = parse(
            "GET / HTTP/1.1\r\nHost:  localhost \r\nX-Value: a:b\r\nx-value: last\r\nEmpty:\r\n\r\n",
        )
        .await
        .unwrap();

        assert_eq!(ctx.headers.get("host").map(String::as_str), Some("localhost"));
        assert_eq!(ctx.headers.get("x-value").map(String::as_str), Some("last"));
        assert_eq!(ctx.headers.get("empty").map(String::as_str), Some(""));
        assert_eq!(ctx.header_count, 4);

        assert_eq!(
            parse("GET / HTTP/1.1\r\nNo-Colon value\r\n\r\n").await,
            Err(ErrorKind::MissingColon)
        );
    }

    #[tokio::test]
    async fn header_count_boundary() {
        let limits = ReqLimits {
            max_header_count: 3,
            ..ReqLimits::default()
        };
        let headers = |n: usize| {
            (0..n)
                .map(|i| format!("H{i}: v\r\n"))
                .collect::<String>()
        };

        let exact = format!("GET / HTTP/1.1\r\n{}\r\n", headers(3));
        assert!(parse_chunks([exact], &limits).await.is_ok());

        let over = format!("GET / HTTP/1.1\r\n{}\r\n", headers(4));
        assert_eq!(
            parse_chunks([over], &limits).await,
            Err(ErrorKind::TooManyHeaders)
        );
    }

    #[tokio::test]
    async fn header_line_length_boundary() {
        let limits = ReqLimits {
            max_line_length: 32,
            ..ReqLimits::default()
        };
        let header = |len: usize| format!("X: {}", "v".repeat(len - 3));

        let exact = format!("GET / HTTP/1.1\r\n{}\r\n\r\n", header(32));
        assert!(parse_chunks([exact], &limits).await.is_ok());

        let over = format!("GET / HTTP/1.1\r\n{}\r\n\r\n", header(33));
        assert_eq!(
            parse_chunks([over], &limits).await,
            Err(ErrorKind::LineTooLong {
                unterminated: false
            })
        );
    }

    #[tokio::test]
    async fn keep_alive() {
        #[rustfmt::skip]
        let cases = [
            ("",                              true),
            ("Connection: keep-alive\r\n",    true),
            ("Connection: close\r\n",         false),
            ("Connection: Close\r\n",         true),
            ("Connection: upgrade\r\n",       true),
        ];

        for (header, expected) in cases {
            let ctx = parse(&format!("GET / HTTP/1.1\r\n{header}\r\n")).await.unwrap();
            assert_eq!(ctx.keep_alive, expected, "{header:?}");
        }
    }

    #[tokio::test]
    async fn header_errors() {
        #[rustfmt::skip]
        let cases = [
            ("Content-Length: 12asd\r\n",       ErrorKind::InvalidContentLength),
            ("Content-Length: -1\r\n",          ErrorKind::InvalidContentLength),
            ("Content-Length: 1.5\r\n",         ErrorKind::InvalidContentLength),
            ("Content-Length: 99999999\r\n",    ErrorKind::EntityTooLarge),
            ("Content-Type: garbage\r\n",       ErrorKind::InvalidContentType),
            ("Content-Type:\r\n",               ErrorKind::InvalidContentType),
            ("Content-Encoding: br\r\n",        ErrorKind::UnsupportedEncoding("content")),
            ("Transfer-Encoding: chunked\r\n",  ErrorKind::UnsupportedEncoding("transfer")),
        ];

        for (header, expected) in cases {
            let result = parse(&format!("POST / HTTP/1.1\r\n{header}\r\n")).await;
            assert_eq!(result, Err(expected), "{header:?}");
        }
    }

    #[tokio::test]
    async fn json_body() {
        let ctx = parse(
            "POST /items HTTP/1.1\r\nContent-Type: application/json\r\nContent-Length: 14\r\n\r\n{\"n\":\"widget\"}",
        )
        .await
        .unwrap();

        assert_eq!(ctx.body.as_deref(), Some("{\"n\":\"widget\"}"));
        assert_eq!(ctx.content, json!({"n": "widget"}));

        let result = parse(
            "PUT /items HTTP/1.1\r\nContent-Type: application/json\r\nContent-Length: 5\r\n\r\n{\"n\":",
        )
        .await;
        assert_eq!(result, Err(ErrorKind::InvalidJson));
    }

    #[tokio::test]
    async fn form_body() {
        let body = "name=a+b&tag=x&tag=y";
        let ctx = parse(&format!(
            "PATCH /f HTTP/1.1\r\nContent-Type: application/x-www-form-urlencoded\r\nContent-Length: {}\r\n\r\n{body}",
            body.len()
        ))
        .await
        .unwrap();

        assert_eq!(ctx.content, json!({"name": "a b", "tag": ["x", "y"]}));
    }

    #[tokio::test]
    async fn body_ignored_for_other_methods() {
        let ctx = parse(
            "DELETE /items?id=1 HTTP/1.1\r\nContent-Type: application/json\r\nContent-Length: 2\r\n\r\n{}",
        )
        .await
        .unwrap();

        assert_eq!(ctx.body.as_deref(), Some("{}"));
        assert_eq!(ctx.content, json!({}));

        let ctx = parse("POST /items HTTP/1.1\r\nContent-Type: text/csv\r\nContent-Length: 3\r\n\r\na,b")
            .await
            .unwrap();
        assert_eq!(ctx.content, json!({}));
    }

    #[tokio::test]
    async fn gzip_body() {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(br#"{"n":"zipped"}"#).unwrap();
        let data = encoder.finish().unwrap();

        let mut request = format!(
            "POST /z HTTP/1.1\r\nContent-Type: application/json\r\nContent-Encoding: gzip\r\nContent-Length: {}\r\n\r\n",
            data.len()
        )
        .into_bytes();
        request.extend_from_slice(&data);

        let ctx = parse_chunks([request], &ReqLimits::default()).await.unwrap();
        assert_eq!(ctx.encoding.as_deref(), Some("gzip"));
        assert_eq!(ctx.content, json!({"n": "zipped"}));

        let result = parse(
            "POST /z HTTP/1.1\r\nContent-Encoding: gzip\r\nContent-Length: 4\r\n\r\nnope",
        )
        .await;
        assert_eq!(result, Err(ErrorKind::MalformedCompressedBody));
    }

    #[tokio::test]
    async fn charset_body() {
        let mut request =
            b"POST /c HTTP/1.1\r\nContent-Type: text/plain; charset=iso-8859-1\r\nContent-Length: 2\r\n\r\n"
                .to_vec();
        request.extend_from_slice(&[0x68, 0xE9]);

        let ctx = parse_chunks([request], &ReqLimits::default()).await.unwrap();
        assert_eq!(ctx.body.as_deref(), Some("hé"));

        let result = parse(
            "POST /c HTTP/1.1\r\nContent-Type: text/plain; charset=koi8-r\r\nContent-Length: 1\r\n\r\nx",
        )
        .await;
        assert_eq!(result, Err(ErrorKind::UnsupportedCharset("koi8-r".into())));
    }

    #[tokio::test]
    async fn chunk_boundary_independence() {
        let requests = [
            "GET /users?active=1&tag=a&tag=b HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
            "POST /items HTTP/1.1\r\nContent-Type: application/json; charset=utf-8\r\nContent-Length: 14\r\n\r\n{\"n\":\"widget\"}",
            "PUT /f HTTP/1.0\nContent-Type: application/x-www-form-urlencoded\nContent-Length: 7\n\na=1&b=2",
        ];

        for request in requests {
            let whole = parse(request).await.unwrap();

            for size in 1..request.len() {
                let chunks: Vec<&[u8]> = request.as_bytes().chunks(size).collect();
                let split = parse_chunks(chunks, &ReqLimits::default()).await.unwrap();
                assert_eq!(split, whole, "chunk size {size} of {request:?}");
            }
        }
    }

    #[tokio::test]
    async fn trailing_bytes_stay_buffered() {
        let limits = ReqLimits::default();
        let stream = ChunkedStream::new([
            "POST /a HTTP/1.1\r\nContent-Length: 3\r\n\r\nabcGET /b HTTP/1.1\r\n\r\n",
        ]);
        let mut reader = FrameReader::new(stream, &limits, Duration::from_secs(1));

        let first = read_request(&mut reader, &limits).await.unwrap();
        assert_eq!(first.body.as_deref(), Some("abc"));
        assert!(!reader.is_idle());

        let second = read_request(&mut reader, &limits).await.unwrap();
        assert_eq!(second.resource, "/b");
        assert!(reader.is_idle());
    }

    #[test]
    fn parser_states() {
        let mut parser = Parser::new(&ReqLimits::default());
        assert_eq!(parser.want(), Want::Line);

        parser.feed(Input::Line("POST /x HTTP/1.1".into())).unwrap();
        parser.feed(Input::Line("Content-Length: 2".into())).unwrap();
        assert_eq!(parser.want(), Want::Line);

        parser.feed(Input::Line(String::new())).unwrap();
        assert_eq!(parser.want(), Want::Bytes(2));
        assert!(parser.feed(Input::Line("oops".into())).is_err());

        parser.feed(Input::Body(b"hi".to_vec())).unwrap();
        assert_eq!(parser.want(), Want::Nothing);
        assert!(parser.clone().into_context().is_some());
        assert!(parser.feed(Input::Body(Vec::new())).is_err());
    }
}
