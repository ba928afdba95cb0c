//! Process-wide connection and request identifiers for log correlation.

use std::{
    fmt,
    sync::atomic::{AtomicU64, Ordering},
};

// Relaxed is enough: ids only have to be unique and increasing per counter.
static CONNECTION_SEQUENCE: AtomicU64 = AtomicU64::new(1);
static REQUEST_SEQUENCE: AtomicU64 = AtomicU64::new(1);

/// Identifier of an accepted connection, starting at `1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    #[inline]
    pub(crate) fn next() -> Self {
        Self(CONNECTION_SEQUENCE.fetch_add(1, Ordering::Relaxed))
    }

    #[inline(always)]
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a parsed request.
///
/// Drawn from one counter shared by all connections, so the ids seen on a
/// single connection are increasing but not contiguous.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestId(u64);

impl RequestId {
    #[inline]
    pub(crate) fn next() -> Self {
        Self(REQUEST_SEQUENCE.fetch_add(1, Ordering::Relaxed))
    }

    #[inline(always)]
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
