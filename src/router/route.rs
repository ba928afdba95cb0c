use crate::{
    errors::{ErrorKind, HandlerError},
    http::response::Reply,
    router::coerce::{as_text, Coercer},
    Method, Request,
};
use futures_util::future::{self, BoxFuture, FutureExt};
use regex::Regex;
use serde_json::{Map, Value};
use std::{collections::HashMap, fmt, marker::PhantomData, sync::Arc};

/// Application code bound to one method of one route.
///
/// `args` holds the coerced path captures in order, `content` the coerced
/// named fields of the body (or of the query string for `GET`).
///
/// # Examples
/// ```
/// use micro_rest::{Handler, HandlerError, Reply, Request, StatusCode};
/// use futures_util::future::BoxFuture;
/// use serde_json::{json, Map, Value};
///
/// struct Echo;
///
/// impl Handler for Echo {
///     fn call<'a>(
///         &'a self,
///         request: &'a mut Request,
///         args: Vec<Value>,
///         content: Map<String, Value>,
///     ) -> BoxFuture<'a, Result<Reply, HandlerError>> {
///         Box::pin(async move {
///             let echo = json!({"resource": request.resource(), "args": args, "content": content});
///             Ok(Reply::new(echo).status(StatusCode::Accepted))
///         })
///     }
/// }
/// ```
pub trait Handler: Send + Sync {
    fn call<'a>(
        &'a self,
        request: &'a mut Request,
        args: Vec<Value>,
        content: Map<String, Value>,
    ) -> BoxFuture<'a, Result<Reply, HandlerError>>;
}

/// [`Handler`] built from a synchronous closure, see [`handler_fn`].
pub struct HandlerFn<F, R> {
    f: F,
    _reply: PhantomData<fn() -> R>,
}

/// Adapts a synchronous closure into a [`Handler`].
///
/// The closure returns a plain JSON value or a [`Reply`].
///
/// ```
/// use micro_rest::{handler_fn, Reply, StatusCode};
/// use serde_json::json;
///
/// let hello = handler_fn(|_, _, _| Ok(json!("Hello world!")));
/// let created = handler_fn(|_, _, _| Ok(Reply::new(json!({"id": 1})).status(StatusCode::Created)));
/// ```
pub fn handler_fn<F, R>(f: F) -> HandlerFn<F, R>
where
    F: Fn(&mut Request, Vec<Value>, Map<String, Value>) -> Result<R, HandlerError>
        + Send
        + Sync,
    R: Into<Reply>,
{
    HandlerFn {
        f,
        _reply: PhantomData,
    }
}

impl<F, R> Handler for HandlerFn<F, R>
where
    F: Fn(&mut Request, Vec<Value>, Map<String, Value>) -> Result<R, HandlerError>
        + Send
        + Sync,
    R: Into<Reply>,
{
    fn call<'a>(
        &'a self,
        request: &'a mut Request,
        args: Vec<Value>,
        content: Map<String, Value>,
    ) -> BoxFuture<'a, Result<Reply, HandlerError>> {
        future::ready((self.f)(request, args, content).map(Into::into)).boxed()
    }
}

// ROUTE TABLE

/// Ordered list of routes, read-only once the server is built.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    pub(crate) routes: Vec<Route>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a route. Routes are tried in the order they were added.
    pub fn route(mut self, route: Route) -> Self {
        self.routes.push(route);
        self
    }

    #[inline(always)]
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

/// A path pattern with its argument coercers and method bindings.
///
/// The pattern is a regular expression anchored at the start of the path
/// only, so `/users` also matches `/users/7`. End it with `$` to match the
/// whole path.
#[derive(Clone)]
pub struct Route {
    pub(crate) pattern: Regex,
    source: String,
    pub(crate) args: Vec<Coercer>,
    pub(crate) methods: HashMap<Method, MethodBinding>,
}

impl Route {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(&format!("^(?:{pattern})"))?,
            source: pattern.to_string(),
            args: Vec::new(),
            methods: HashMap::new(),
        })
    }

    /// Coercer for the next capture group.
    pub fn arg(mut self, coercer: Coercer) -> Self {
        self.args.push(coercer);
        self
    }

    /// Binds `method`, replacing an earlier binding of the same method.
    pub fn method(mut self, method: Method, binding: MethodBinding) -> Self {
        self.methods.insert(method, binding);
        self
    }

    pub fn get(self, binding: MethodBinding) -> Self {
        self.method(Method::Get, binding)
    }

    pub fn post(self, binding: MethodBinding) -> Self {
        self.method(Method::Post, binding)
    }

    pub fn put(self, binding: MethodBinding) -> Self {
        self.method(Method::Put, binding)
    }

    pub fn patch(self, binding: MethodBinding) -> Self {
        self.method(Method::Patch, binding)
    }

    pub fn delete(self, binding: MethodBinding) -> Self {
        self.method(Method::Delete, binding)
    }

    /// Pattern as it was given to [`Route::new`].
    #[inline(always)]
    pub fn pattern(&self) -> &str {
        &self.source
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("pattern", &self.source)
            .field("args", &self.args)
            .field("methods", &self.methods.keys().collect::<Vec<_>>())
            .finish()
    }
}

// METHOD BINDING

/// Handler and declarations for one method of a route.
#[derive(Clone)]
pub struct MethodBinding {
    pub(crate) handler: Arc<dyn Handler>,
    pub(crate) silent: bool,
    pub(crate) resource: Option<String>,
    pub(crate) content: Vec<Content>,
    pub(crate) response: Option<ResponseCoercer>,
    pub(crate) compress: bool,
}

impl MethodBinding {
    pub fn new<H: Handler + 'static>(handler: H) -> Self {
        Self {
            handler: Arc::new(handler),
            silent: false,
            resource: None,
            content: Vec::new(),
            response: None,
            compress: false,
        }
    }

    /// Suppress the per-request log line.
    pub fn silent(mut self) -> Self {
        self.silent = true;
        self
    }

    /// Acquire a cursor from the named resource for every call.
    pub fn resource<N: Into<String>>(mut self, name: N) -> Self {
        self.resource = Some(name.into());
        self
    }

    /// Declares a named content field. Only declared fields reach the handler.
    pub fn content(mut self, content: Content) -> Self {
        self.content.push(content);
        self
    }

    pub fn response(mut self, response: ResponseCoercer) -> Self {
        self.response = Some(response);
        self
    }

    /// Gzip the response body.
    pub fn compress(mut self) -> Self {
        self.compress = true;
        self
    }

    #[inline(always)]
    pub fn is_silent(&self) -> bool {
        self.silent
    }

    #[inline]
    pub fn resource_name(&self) -> Option<&str> {
        self.resource.as_deref()
    }

    /// Runs the content of a handler reply through the response coercer.
    pub(crate) fn coerce_response(&self, mut reply: Reply) -> Result<Reply, ErrorKind> {
        if let Some(response) = &self.response {
            reply.content = response.apply(reply.content)?;
        }
        Ok(reply)
    }
}

impl fmt::Debug for MethodBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodBinding")
            .field("silent", &self.silent)
            .field("resource", &self.resource)
            .field("content", &self.content)
            .field("response", &self.response)
            .field("compress", &self.compress)
            .finish_non_exhaustive()
    }
}

/// A named field of the request content.
#[derive(Debug, Clone)]
pub struct Content {
    pub(crate) name: String,
    pub(crate) coercer: Coercer,
    pub(crate) required: bool,
}

impl Content {
    /// Required field.
    pub fn new<N: Into<String>>(name: N, coercer: Coercer) -> Self {
        Self {
            name: name.into(),
            coercer,
            required: true,
        }
    }

    /// Field that is simply left out when absent.
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }
}

// RESPONSE

/// Shapes a handler result before it is serialized.
#[derive(Debug, Clone)]
pub enum ResponseCoercer {
    /// Any result as text; `null` becomes the default.
    Str { default: String },
    /// Object restricted to the declared keys, in declaration order.
    Keyed(Vec<Key>),
}

impl ResponseCoercer {
    pub fn string<D: Into<String>>(default: D) -> Self {
        Self::Str {
            default: default.into(),
        }
    }

    pub fn keyed<I: IntoIterator<Item = Key>>(keys: I) -> Self {
        Self::Keyed(keys.into_iter().collect())
    }

    /// Output for a `null` result.
    pub fn default_value(&self) -> Value {
        match self {
            Self::Str { default } => Value::String(default.clone()),
            Self::Keyed(keys) => Value::Object(keyed_defaults(keys)),
        }
    }

    pub fn apply(&self, result: Value) -> Result<Value, ErrorKind> {
        if result.is_null() {
            return Ok(self.default_value());
        }

        let keys = match self {
            Self::Str { .. } => return Ok(Value::String(as_text(&result))),
            Self::Keyed(keys) => keys,
        };

        let Value::Object(result) = result else {
            return Err(ErrorKind::ResponseNotMapping);
        };

        let mut response = keyed_defaults(keys);

        for (name, value) in result {
            let key = keys
                .iter()
                .find(|key| key.name == name)
                .ok_or_else(|| ErrorKind::UnexpectedKey(name.clone()))?;

            let value = match value {
                Value::Null => Value::Null,
                value => key
                    .coercer
                    .apply(&value)
                    .map_err(|err| ErrorKind::ResponseCoercion {
                        key: name.clone(),
                        reason: err.to_string(),
                    })?,
            };

            response.insert(name, value);
        }

        Ok(Value::Object(response))
    }
}

fn keyed_defaults(keys: &[Key]) -> Map<String, Value> {
    keys.iter()
        .map(|key| (key.name.clone(), key.default.clone()))
        .collect()
}

/// A declared key of a keyed response.
#[derive(Debug, Clone)]
pub struct Key {
    pub(crate) name: String,
    pub(crate) coercer: Coercer,
    pub(crate) default: Value,
}

impl Key {
    /// String-typed key defaulting to `null`.
    pub fn new<N: Into<String>>(name: N) -> Self {
        Self {
            name: name.into(),
            coercer: Coercer::Str,
            default: Value::Null,
        }
    }

    pub fn typed(mut self, coercer: Coercer) -> Self {
        self.coercer = coercer;
        self
    }

    pub fn default(mut self, default: Value) -> Self {
        self.default = default;
        self
    }
}
