use crate::{
    errors::ErrorKind,
    http::response::Reply,
    router::route::{MethodBinding, RouteTable},
    Request,
};
use futures_util::FutureExt;
use serde_json::{Map, Value};
use std::panic::AssertUnwindSafe;

/// A route and method resolved for one request, with its arguments coerced.
///
/// Consumed by [`Match::call`].
#[derive(Debug)]
pub struct Match<'r> {
    args: Vec<Value>,
    content: Map<String, Value>,
    binding: &'r MethodBinding,
}

impl RouteTable {
    /// Resolves `request` against the table.
    ///
    /// The first route whose pattern matches the path is selected; if it has
    /// no binding for the request method the result is
    /// [`ErrorKind::NotFound`] and later routes are not tried.
    pub fn match_request(&self, request: &Request) -> Result<Match<'_>, ErrorKind> {
        let path = request.resource();
        let (route, captures) = self
            .routes
            .iter()
            .find_map(|route| route.pattern.captures(path).map(|caps| (route, caps)))
            .ok_or(ErrorKind::NotFound)?;

        let binding = route
            .methods
            .get(request.method())
            .ok_or(ErrorKind::NotFound)?;

        let captured = captures.len() - 1;
        if captured < route.args.len() {
            return Err(ErrorKind::ArgumentCountMismatch {
                expected: route.args.len(),
                captured,
            });
        }

        let mut args = Vec::with_capacity(captured);
        for (i, capture) in captures.iter().skip(1).enumerate() {
            let value = match (capture, route.args.get(i)) {
                (None, _) => Value::Null,
                (Some(raw), None) => Value::String(raw.as_str().to_string()),
                (Some(raw), Some(coercer)) => coercer
                    .apply(&Value::String(raw.as_str().to_string()))
                    .map_err(|err| ErrorKind::coercion(None, err))?,
            };
            args.push(value);
        }

        let fields = request.content().as_object();
        let mut content = Map::new();
        for field in &binding.content {
            match fields.and_then(|fields| fields.get(&field.name)) {
                Some(value) => {
                    let value = field
                        .coercer
                        .apply(value)
                        .map_err(|err| ErrorKind::coercion(Some(&field.name), err))?;
                    content.insert(field.name.clone(), value);
                }
                None if field.required => {
                    return Err(ErrorKind::MissingRequiredField(field.name.clone()))
                }
                None => {}
            }
        }

        Ok(Match {
            args,
            content,
            binding,
        })
    }
}

impl Match<'_> {
    #[inline(always)]
    pub fn args(&self) -> &[Value] {
        &self.args
    }

    #[inline(always)]
    pub fn content(&self) -> &Map<String, Value> {
        &self.content
    }

    #[inline(always)]
    pub fn is_silent(&self) -> bool {
        self.binding.silent
    }

    #[inline]
    pub fn resource(&self) -> Option<&str> {
        self.binding.resource.as_deref()
    }

    #[inline(always)]
    pub fn compress(&self) -> bool {
        self.binding.compress
    }

    /// Invokes the handler and shapes its reply content with the response
    /// coercer.
    ///
    /// A panicking handler is reported as [`ErrorKind::Internal`].
    pub async fn call(self, request: &mut Request) -> Result<Reply, ErrorKind> {
        let Match {
            args,
            content,
            binding,
        } = self;

        // Deferred so a synchronous handler panics inside `catch_unwind`.
        let call = async move { binding.handler.call(request, args, content).await };

        let result = match AssertUnwindSafe(call).catch_unwind().await {
            Ok(result) => result?,
            Err(_) => return Err(ErrorKind::Internal("handler panicked".into())),
        };

        binding.coerce_response(result)
    }
}
