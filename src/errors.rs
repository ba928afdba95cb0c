use crate::StatusCode;
use std::{error, io};
use thiserror::Error;

/// Every failure the request pipeline can produce.
///
/// Reader, parser, router and dispatch all return `Result<_, ErrorKind>`;
/// the connection loop inspects the value once and turns it into a response
/// (or into a silent close for [`ErrorKind::UnexpectedEof`]).
#[derive(Debug, Error, PartialEq)]
pub enum ErrorKind {
    #[error("line too long")]
    LineTooLong { unterminated: bool },
    #[error("malformed status line")]
    MalformedStatusLine,
    #[error("unsupported HTTP protocol")]
    UnsupportedProtocol,
    #[error("invalid request target")]
    InvalidTarget,
    #[error("header missing colon")]
    MissingColon,
    #[error("max header count exceeded")]
    TooManyHeaders,
    #[error("invalid content-length")]
    InvalidContentLength,
    #[error("entity too large")]
    EntityTooLarge,
    #[error("invalid content-type header")]
    InvalidContentType,
    #[error("unsupported {0} encoding")]
    UnsupportedEncoding(&'static str),
    #[error("unsupported charset '{0}'")]
    UnsupportedCharset(String),
    #[error("invalid character encoding")]
    InvalidEncoding,
    #[error("malformed gzip data")]
    MalformedCompressedBody,
    #[error("invalid json content")]
    InvalidJson,

    #[error("missing required content '{0}'")]
    MissingRequiredField(String),
    #[error("{}", coercion_message(.field, .reason))]
    ArgumentCoercion {
        field: Option<String>,
        reason: String,
    },
    #[error("not found")]
    NotFound,

    #[error("timeout reading HTTP document")]
    ReadTimeout,
    #[error("unexpected end of stream")]
    UnexpectedEof,

    #[error("route expects {expected} arguments, pattern captured {captured}")]
    ArgumentCountMismatch { expected: usize, captured: usize },
    #[error("unexpected response key '{0}'")]
    UnexpectedKey(String),
    #[error("response key '{key}': {reason}")]
    ResponseCoercion { key: String, reason: String },
    #[error("response is not a mapping")]
    ResponseNotMapping,
    #[error("resource '{0}' is not registered")]
    MissingResource(String),
    #[error("resource failure: {0}")]
    Resource(String),
    #[error("{status:?}: {explanation}")]
    Status {
        status: StatusCode,
        explanation: String,
    },
    #[error("internal error: {0}")]
    Internal(String),
    #[error("i/o error: {0}")]
    Io(IoError),
}

fn coercion_message(field: &Option<String>, reason: &str) -> String {
    match field {
        Some(field) => format!("'{field}': {reason}"),
        None => reason.to_string(),
    }
}

impl ErrorKind {
    /// HTTP status used for the error response.
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::LineTooLong { .. } => StatusCode::RequestHeaderFieldsTooLarge,
            Self::EntityTooLarge => StatusCode::PayloadTooLarge,
            Self::NotFound => StatusCode::NotFound,
            Self::Status { status, .. } => *status,

            Self::MalformedStatusLine
            | Self::UnsupportedProtocol
            | Self::InvalidTarget
            | Self::MissingColon
            | Self::TooManyHeaders
            | Self::InvalidContentLength
            | Self::InvalidContentType
            | Self::UnsupportedEncoding(_)
            | Self::UnsupportedCharset(_)
            | Self::InvalidEncoding
            | Self::MalformedCompressedBody
            | Self::InvalidJson
            | Self::MissingRequiredField(_)
            | Self::ArgumentCoercion { .. }
            | Self::ReadTimeout
            | Self::UnexpectedEof => StatusCode::BadRequest,

            Self::ArgumentCountMismatch { .. }
            | Self::UnexpectedKey(_)
            | Self::ResponseCoercion { .. }
            | Self::ResponseNotMapping
            | Self::MissingResource(_)
            | Self::Resource(_)
            | Self::Internal(_)
            | Self::Io(_) => StatusCode::InternalServerError,
        }
    }

    /// Machine-readable explanation sent as the body of a client error.
    ///
    /// Server errors never leak their cause.
    pub fn explanation(&self) -> String {
        match self {
            Self::LineTooLong { unterminated: true } => "no end of line encountered".into(),
            Self::LineTooLong { unterminated: false } | Self::EntityTooLarge | Self::NotFound => {
                String::new()
            }
            Self::Status {
                status,
                explanation,
            } if status.is_client_error() => explanation.clone(),
            _ if self.status().is_client_error() => self.to_string(),
            _ => String::new(),
        }
    }

    /// The byte stream can't be resynchronised after these errors.
    pub const fn closes_connection(&self) -> bool {
        matches!(
            self,
            Self::LineTooLong { .. } | Self::EntityTooLarge | Self::Io(_)
        )
    }

    pub(crate) fn coercion(field: Option<&str>, err: impl ToString) -> Self {
        Self::ArgumentCoercion {
            field: field.map(str::to_string),
            reason: err.to_string(),
        }
    }
}

impl From<io::Error> for ErrorKind {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::TimedOut => ErrorKind::ReadTimeout,
            io::ErrorKind::UnexpectedEof => ErrorKind::UnexpectedEof,
            _ => ErrorKind::Io(IoError(err)),
        }
    }
}

#[derive(Debug, Error)]
#[error(transparent)]
pub struct IoError(pub(crate) io::Error);

impl PartialEq for IoError {
    fn eq(&self, other: &Self) -> bool {
        self.0.kind() == other.0.kind()
    }
}

/// Failure returned by a route handler.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// Answer with this status; the explanation is sent for `4xx` only.
    #[error("{status:?}: {explanation}")]
    Status {
        status: StatusCode,
        explanation: String,
    },
    #[error("{0}")]
    Internal(Box<dyn error::Error + Send + Sync>),
}

impl HandlerError {
    pub fn status<E: Into<String>>(status: StatusCode, explanation: E) -> Self {
        Self::Status {
            status,
            explanation: explanation.into(),
        }
    }

    pub fn internal<E: Into<Box<dyn error::Error + Send + Sync>>>(err: E) -> Self {
        Self::Internal(err.into())
    }
}

impl From<HandlerError> for ErrorKind {
    fn from(err: HandlerError) -> Self {
        match err {
            HandlerError::Status {
                status,
                explanation,
            } => ErrorKind::Status {
                status,
                explanation,
            },
            HandlerError::Internal(err) => ErrorKind::Internal(err.to_string()),
        }
    }
}

/// Failure of a scoped resource (acquire, transaction start, commit, close).
#[derive(Debug, Error, Clone, PartialEq)]
#[error("{0}")]
pub struct ResourceError(pub String);

impl From<ResourceError> for ErrorKind {
    fn from(err: ResourceError) -> Self {
        ErrorKind::Resource(err.0)
    }
}
