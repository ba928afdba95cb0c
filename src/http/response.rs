//! HTTP response serialization.

use crate::{errors::ErrorKind, http::types::StatusCode, limits::RespLimits};
use flate2::{write::GzEncoder, Compression};
use serde_json::Value;
use std::{io::Write, time::SystemTime};

/// HTTP response ready to be written to the wire.
///
/// The body is derived from a JSON value: arrays and objects are sent as
/// `application/json`, everything else as `text/plain`. `null` and the empty
/// string produce a response without a body. `Date` and `Content-Length` are
/// added unless a header of the same name was set explicitly.
///
/// # Examples
/// ```
/// use micro_rest::{Response, StatusCode, limits::RespLimits};
/// use serde_json::json;
///
/// let bytes = Response::new(json!({"id": 7}))
///     .status(StatusCode::Created)
///     .header("X-Trace", "abc")
///     .encode(&RespLimits::default())
///     .unwrap();
///
/// assert!(bytes.starts_with(b"HTTP/1.1 201 Created\r\n"));
/// assert!(bytes.ends_with(b"\r\n\r\n{\"id\":7}"));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    status: StatusCode,
    reason: Option<String>,
    headers: Vec<(String, String)>,
    content: Value,
    close: bool,
    compress: bool,
}

impl Response {
    #[inline]
    pub fn new(content: Value) -> Self {
        Self {
            status: StatusCode::Ok,
            reason: None,
            headers: Vec::new(),
            content,
            close: false,
            compress: false,
        }
    }

    /// Response for a failed request: the error's status with its
    /// explanation as a `text/plain` body.
    pub fn from_error(err: &ErrorKind) -> Self {
        let mut response = Self::new(Value::String(err.explanation()));
        response.status(err.status());
        response
    }

    #[inline]
    pub fn status(&mut self, status: StatusCode) -> &mut Self {
        self.status = status;
        self
    }

    /// Replaces the standard reason phrase of the status line.
    #[inline]
    pub fn reason<R: Into<String>>(&mut self, reason: R) -> &mut Self {
        self.reason = Some(reason.into());
        self
    }

    /// Adds a header. A `Content-Type`, `Date` or `Content-Length` set here
    /// replaces the generated one.
    #[inline]
    pub fn header<N: Into<String>, V: ToString>(&mut self, name: N, value: V) -> &mut Self {
        self.headers.push((name.into(), value.to_string()));
        self
    }

    /// Adds `Connection: close`.
    #[inline]
    pub fn close(&mut self) -> &mut Self {
        self.close = true;
        self
    }

    /// Gzip the body and add `Content-Encoding: gzip`.
    #[inline]
    pub fn compress(&mut self, compress: bool) -> &mut Self {
        self.compress = compress;
        self
    }

    #[inline(always)]
    pub const fn status_code(&self) -> StatusCode {
        self.status
    }

    #[inline(always)]
    pub const fn content(&self) -> &Value {
        &self.content
    }

    #[inline(always)]
    pub const fn is_close(&self) -> bool {
        self.close
    }

    fn has_header(&self, name: &str) -> bool {
        self.headers.iter().any(|(n, _)| n.eq_ignore_ascii_case(name))
    }

    fn body(&self) -> (Vec<u8>, Option<&'static str>) {
        match &self.content {
            Value::Null => (Vec::new(), None),
            Value::String(text) if text.is_empty() => (Vec::new(), None),
            Value::String(text) => (text.as_bytes().to_vec(), Some("text/plain")),
            Value::Array(_) | Value::Object(_) => {
                (self.content.to_string().into_bytes(), Some("application/json"))
            }
            other => (other.to_string().into_bytes(), Some("text/plain")),
        }
    }

    /// Serializes status line, headers and body.
    pub fn encode(&self, limits: &RespLimits) -> Result<Vec<u8>, ErrorKind> {
        let (mut body, content_type) = self.body();
        let mut headers: Vec<(&str, String)> = Vec::with_capacity(self.headers.len() + 5);

        if let Some(content_type) = content_type.filter(|_| !self.has_header("content-type")) {
            let value = match limits.charset {
                "" => content_type.to_string(),
                charset => format!("{content_type}; charset={charset}"),
            };
            headers.push(("Content-Type", value));
        }

        if self.compress || limits.compress {
            let mut encoder = GzEncoder::new(Vec::with_capacity(body.len()), Compression::default());
            encoder
                .write_all(&body)
                .map_err(|err| ErrorKind::Internal(err.to_string()))?;
            body = encoder
                .finish()
                .map_err(|err| ErrorKind::Internal(err.to_string()))?;
            headers.push(("Content-Encoding", "gzip".to_string()));
        }

        if !self.has_header("date") {
            headers.push(("Date", httpdate::fmt_http_date(SystemTime::now())));
        }
        if !self.has_header("content-length") {
            headers.push(("Content-Length", body.len().to_string()));
        }
        if self.close {
            headers.push(("Connection", "close".to_string()));
        }

        let mut buffer = Vec::with_capacity(128 + body.len());
        match &self.reason {
            None => buffer.extend_from_slice(self.status.into_first_line()),
            Some(reason) => {
                let line = format!("HTTP/1.1 {} {reason}\r\n", self.status.as_u16());
                buffer.extend_from_slice(line.as_bytes());
            }
        }

        let custom = self.headers.iter().map(|(n, v)| (n.as_str(), v));
        for (name, value) in custom.chain(headers.iter().map(|(n, v)| (*n, v))) {
            buffer.extend_from_slice(name.as_bytes());
            buffer.extend_from_slice(b": ");
            buffer.extend_from_slice(value.as_bytes());
            buffer.extend_from_slice(b"\r\n");
        }

        buffer.extend_from_slice(b"\r\n");
        buffer.extend_from_slice(&body);

        Ok(buffer)
    }
}

/// Successful handler result.
///
/// Plain JSON values convert into a `200 OK` reply. The content goes through
/// the binding's response coercer; status, reason and headers are applied to
/// the response as given.
///
/// ```
/// use micro_rest::{Reply, StatusCode};
/// use serde_json::json;
///
/// let reply = Reply::new(json!({"id": 7}))
///     .status(StatusCode::Created)
///     .header("Location", "/items/7");
///
/// assert_eq!(reply.status_code(), StatusCode::Created);
/// assert_eq!(Reply::from(json!("ok")).status_code(), StatusCode::Ok);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub(crate) status: StatusCode,
    pub(crate) reason: Option<String>,
    pub(crate) headers: Vec<(String, String)>,
    pub(crate) content: Value,
}

impl Reply {
    #[inline]
    pub fn new(content: Value) -> Self {
        Self {
            status: StatusCode::Ok,
            reason: None,
            headers: Vec::new(),
            content,
        }
    }

    #[inline]
    pub fn status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    #[inline]
    pub fn reason<R: Into<String>>(mut self, reason: R) -> Self {
        self.reason = Some(reason.into());
        self
    }

    #[inline]
    pub fn header<N: Into<String>, V: ToString>(mut self, name: N, value: V) -> Self {
        self.headers.push((name.into(), value.to_string()));
        self
    }

    #[inline(always)]
    pub const fn status_code(&self) -> StatusCode {
        self.status
    }

    #[inline(always)]
    pub const fn content(&self) -> &Value {
        &self.content
    }
}

impl From<Value> for Reply {
    #[inline]
    fn from(content: Value) -> Self {
        Self::new(content)
    }
}

impl From<Reply> for Response {
    fn from(reply: Reply) -> Self {
        Self {
            status: reply.status,
            reason: reply.reason,
            headers: reply.headers,
            ..Self::new(reply.content)
        }
    }
}
