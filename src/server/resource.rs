//! Scoped per-request resources.
//!
//! A [`MethodBinding`](crate::MethodBinding) may name a resource. For every
//! matching request the connection loop acquires a [`Cursor`] from it, starts
//! a transaction, commits only after the handler and response shaping
//! succeeded, and closes the cursor exactly once on every path.

use crate::errors::{ErrorKind, ResourceError};
use futures_util::future::BoxFuture;
use std::{any::Any, collections::HashMap, fmt, sync::Arc};

/// Handle exclusively owned by one request, for example a database cursor.
///
/// # Examples
/// ```
/// use micro_rest::{Cursor, ResourceError};
/// use futures_util::future::{self, BoxFuture, FutureExt};
/// use std::any::Any;
///
/// #[derive(Default)]
/// struct Log(Vec<&'static str>);
///
/// impl Cursor for Log {
///     fn start_transaction(&mut self) -> BoxFuture<'_, Result<(), ResourceError>> {
///         self.0.push("begin");
///         future::ok(()).boxed()
///     }
///
///     fn commit(&mut self) -> BoxFuture<'_, Result<(), ResourceError>> {
///         self.0.push("commit");
///         future::ok(()).boxed()
///     }
///
///     fn close(self: Box<Self>) -> BoxFuture<'static, Result<(), ResourceError>> {
///         future::ok(()).boxed()
///     }
///
///     fn as_any_mut(&mut self) -> &mut dyn Any {
///         self
///     }
/// }
/// ```
pub trait Cursor: Send {
    fn start_transaction(&mut self) -> BoxFuture<'_, Result<(), ResourceError>>;

    fn commit(&mut self) -> BoxFuture<'_, Result<(), ResourceError>>;

    /// Releases the handle. Called once, whether or not `commit` ran.
    fn close(self: Box<Self>) -> BoxFuture<'static, Result<(), ResourceError>>;

    /// Used by [`Request::cursor_as`](crate::Request::cursor_as).
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Source of cursors, shared by all connections.
pub trait Resource: Send + Sync {
    fn acquire(&self) -> BoxFuture<'_, Result<Box<dyn Cursor>, ResourceError>>;
}

/// Named resources available to method bindings.
#[derive(Clone, Default)]
pub struct Resources {
    items: HashMap<String, Arc<dyn Resource>>,
}

impl Resources {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `resource` under `name`, replacing an earlier one.
    pub fn register<N: Into<String>, R: Resource + 'static>(mut self, name: N, resource: R) -> Self {
        self.items.insert(name.into(), Arc::new(resource));
        self
    }

    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.items.contains_key(name)
    }

    pub(crate) fn get(&self, name: &str) -> Result<&Arc<dyn Resource>, ErrorKind> {
        self.items
            .get(name)
            .ok_or_else(|| ErrorKind::MissingResource(name.to_string()))
    }

    /// Acquires a cursor from `name` and opens its transaction.
    ///
    /// The cursor is closed again if the transaction can't be started.
    pub(crate) async fn open(&self, name: &str) -> Result<Box<dyn Cursor>, ErrorKind> {
        let mut cursor = self.get(name)?.acquire().await?;

        if let Err(err) = cursor.start_transaction().await {
            if let Err(close_err) = cursor.close().await {
                tracing::error!(resource = name, error = %close_err, "cursor close failed");
            }
            return Err(err.into());
        }

        Ok(cursor)
    }
}

impl fmt::Debug for Resources {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.items.keys()).finish()
    }
}
