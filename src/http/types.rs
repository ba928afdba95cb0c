#![allow(rustdoc::bare_urls)]

//! Core HTTP protocol types and utilities

use crate::errors::ErrorKind;
use regex::Regex;
use std::{fmt, sync::LazyLock};

#[inline(always)]
pub(crate) fn slice_to_usize(bytes: &[u8]) -> Option<usize> {
    if bytes.is_empty() {
        return None;
    }

    let mut result: usize = 0;

    for &byte in bytes {
        if !byte.is_ascii_digit() {
            return None;
        }

        result = result
            .checked_mul(10)?
            .checked_add((byte - b'0') as usize)?;
    }

    Some(result)
}

// METHOD

/// HTTP request methods
///
/// The method token of the status line is upper-cased before it is matched,
/// so `get` and `GET` are the same method. Tokens outside the well-known set
/// are kept as [`Method::Extension`]; they can still be bound by a route.
///
/// # References
///
/// - [RFC 7231, Section 4](https://datatracker.ietf.org/doc/html/rfc7231#section-4)
/// - [RFC 5789](https://datatracker.ietf.org/doc/html/rfc5789) (PATCH method)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Method {
    /// GET method - the query mapping becomes the request content
    Get,
    Put,
    Post,
    Head,
    Patch,
    Delete,
    Options,
    /// Any other upper-cased token
    Extension(String),
}

impl Method {
    pub(crate) fn from_token(token: &str) -> Self {
        match token.to_ascii_uppercase().as_str() {
            "GET" => Method::Get,
            "PUT" => Method::Put,
            "POST" => Method::Post,
            "HEAD" => Method::Head,
            "PATCH" => Method::Patch,
            "DELETE" => Method::Delete,
            "OPTIONS" => Method::Options,
            other => Method::Extension(other.to_string()),
        }
    }

    /// Upper-case method name as it appears on the wire.
    pub fn as_str(&self) -> &str {
        match self {
            Method::Get => "GET",
            Method::Put => "PUT",
            Method::Post => "POST",
            Method::Head => "HEAD",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
            Method::Options => "OPTIONS",
            Method::Extension(name) => name,
        }
    }

    /// `PATCH`, `POST` and `PUT` derive their content from the body.
    #[inline(always)]
    pub(crate) const fn has_body_content(&self) -> bool {
        matches!(self, Method::Patch | Method::Post | Method::Put)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// VERSION

/// HTTP protocol version
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Version {
    /// HTTP/1.0 - [RFC 1945](https://tools.ietf.org/html/rfc1945)
    Http10,
    /// HTTP/1.1 - [RFC 7230](https://tools.ietf.org/html/rfc7230) and related
    Http11,
}

impl Version {
    #[inline(always)]
    pub(crate) const fn from_bytes(src: &[u8]) -> Result<Self, ErrorKind> {
        match src {
            b"HTTP/1.1" => Ok(Self::Http11),
            b"HTTP/1.0" => Ok(Self::Http10),
            _ => Err(ErrorKind::UnsupportedProtocol),
        }
    }
}

// STATUS_CODE

macro_rules! set_status_codes {
    ($(
        $(#[$docs:meta])*
        $name:ident = ($num:literal, $str:literal);
    )+) => {
        /// HTTP status codes
        ///
        /// Represents valid HTTP status codes as defined in
        /// [RFC 9110](https://datatracker.ietf.org/doc/html/rfc9110#section-15).
        /// Responses are always written as `HTTP/1.1`.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum StatusCode { $(
            #[doc = concat!(stringify!($num), " ", $str)]
            $(#[$docs])*
            $name = $num,
        )+ }

        impl StatusCode {
            // Returns the HTTP first line as bytes (e.g., `b"HTTP/1.1 200 OK\r\n"`).
            #[inline]
            pub(crate) const fn into_first_line(self) -> &'static [u8] {
                match self { $(
                    StatusCode::$name => concat!("HTTP/1.1 ", $num, " ", $str, "\r\n").as_bytes(),
                )+ }
            }

            /// Reason phrase (e.g., `"Not Found"`).
            pub const fn reason(self) -> &'static str {
                match self { $(
                    StatusCode::$name => $str,
                )+ }
            }

            /// Looks up a status by its numeric code.
            pub const fn from_u16(code: u16) -> Option<Self> {
                match code { $(
                    $num => Some(StatusCode::$name),
                )+
                    _ => None,
                }
            }
        }
    }
}

impl StatusCode {
    #[inline(always)]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }

    #[inline(always)]
    pub const fn is_client_error(self) -> bool {
        matches!(self.as_u16(), 400..=499)
    }

    #[inline(always)]
    pub const fn is_server_error(self) -> bool {
        matches!(self.as_u16(), 500..=599)
    }
}

set_status_codes! {
    Ok = (200, "OK");
    Created = (201, "Created");
    Accepted = (202, "Accepted");
    NoContent = (204, "No Content");

    MovedPermanently = (301, "Moved Permanently");
    Found = (302, "Found");
    SeeOther = (303, "See Other");
    NotModified = (304, "Not Modified");
    TemporaryRedirect = (307, "Temporary Redirect");
    PermanentRedirect = (308, "Permanent Redirect");

    BadRequest = (400, "Bad Request");
    Unauthorized = (401, "Unauthorized");
    Forbidden = (403, "Forbidden");
    NotFound = (404, "Not Found");
    MethodNotAllowed = (405, "Method Not Allowed");
    NotAcceptable = (406, "Not Acceptable");
    RequestTimeout = (408, "Request Timeout");
    Conflict = (409, "Conflict");
    Gone = (410, "Gone");
    LengthRequired = (411, "Length Required");
    PreconditionFailed = (412, "Precondition Failed");
    /// Sent when `Content-Length` is above
    /// [`ReqLimits::max_content_length`](crate::limits::ReqLimits::max_content_length)
    PayloadTooLarge = (413, "Request Entity Too Large");
    UnsupportedMediaType = (415, "Unsupported Media Type");
    UnprocessableEntity = (422, "Unprocessable Entity");
    TooManyRequests = (429, "Too Many Requests");
    /// Sent when a status or header line is above
    /// [`ReqLimits::max_line_length`](crate::limits::ReqLimits::max_line_length)
    RequestHeaderFieldsTooLarge = (431, "Request Header Fields Too Long");

    InternalServerError = (500, "Internal Server Error");
    NotImplemented = (501, "Not Implemented");
    BadGateway = (502, "Bad Gateway");
    ServiceUnavailable = (503, "Service Unavailable");
    GatewayTimeout = (504, "Gateway Timeout");
}

// CONTENT TYPE

// type "/" subtype [";" attribute "=" value], spaces allowed around every token
static CONTENT_TYPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\s*(?P<type>.+?)\s*/\s*(?P<subtype>[^;]+?)(?:\s*;\s*(?P<attribute>.+?)\s*=\s*(?P<value>.+?))?\s*$",
    )
    .expect("content-type grammar is a valid regex")
});

/// A `Content-Type` header parsed with the lenient grammar
/// `type "/" subtype [";" attribute "=" value]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentType {
    /// `type/subtype`, lower-cased
    pub media_type: String,
    /// Value of the `charset` attribute, if that is the attribute given
    pub charset: Option<String>,
}

impl ContentType {
    pub(crate) fn parse(value: &str) -> Result<Self, ErrorKind> {
        let captures = CONTENT_TYPE
            .captures(value)
            .ok_or(ErrorKind::InvalidContentType)?;

        let media_type = format!("{}/{}", &captures["type"], &captures["subtype"]);
        let charset = match captures.name("attribute") {
            Some(attribute) if attribute.as_str() == "charset" => {
                captures.name("value").map(|v| v.as_str().to_string())
            }
            _ => None,
        };

        Ok(Self {
            media_type: media_type.to_ascii_lowercase(),
            charset,
        })
    }

    #[inline]
    pub(crate) fn is(&self, media_type: &str) -> bool {
        self.media_type == media_type
    }
}

// CHARSET

/// Decodes a body under the charset named in `Content-Type` (`utf-8` when
/// absent).
pub(crate) fn decode_text(data: &[u8], charset: Option<&str>) -> Result<String, ErrorKind> {
    let charset = charset.map(str::to_ascii_lowercase);

    match charset.as_deref().unwrap_or("utf-8") {
        "utf-8" | "utf8" => simdutf8::basic::from_utf8(data)
            .map(str::to_owned)
            .map_err(|_| ErrorKind::InvalidEncoding),
        "us-ascii" | "ascii" => match data.is_ascii() {
            true => simdutf8::basic::from_utf8(data)
                .map(str::to_owned)
                .map_err(|_| ErrorKind::InvalidEncoding),
            false => Err(ErrorKind::InvalidEncoding),
        },
        "iso-8859-1" | "latin-1" | "latin1" => Ok(data.iter().map(|&b| b as char).collect()),
        other => Err(ErrorKind::UnsupportedCharset(other.to_string())),
    }
}
