//! URL query string and `application/x-www-form-urlencoded` decoding.

use serde_json::{map::Entry, Map, Value};
use url::form_urlencoded;

/// Query string parser with multi-value collapsing.
///
/// Names and values are percent-decoded (`+` is a space). Pairs without a
/// value (`flag`, `name=`) are dropped. A name that appears once keeps a
/// scalar string value; a repeated name collapses into an array holding every
/// value in order of appearance.
///
/// # Examples
/// ```rust
/// use micro_rest::query::Query;
/// use serde_json::json;
///
/// let params = Query::parse(b"tag=a&name=john%20doe&tag=b&debug");
/// assert_eq!(
///     serde_json::Value::Object(params),
///     json!({"tag": ["a", "b"], "name": "john doe"})
/// );
/// ```
pub struct Query;

impl Query {
    /// Parses a query string (leading `?` is ignored) into an ordered mapping.
    pub fn parse(query: &[u8]) -> Map<String, Value> {
        let query = query.strip_prefix(b"?").unwrap_or(query);
        let mut result = Map::new();

        for (name, value) in form_urlencoded::parse(query) {
            if value.is_empty() {
                continue;
            }

            match result.entry(name.into_owned()) {
                Entry::Vacant(entry) => {
                    entry.insert(Value::String(value.into_owned()));
                }
                Entry::Occupied(mut entry) => match entry.get_mut() {
                    Value::Array(values) => values.push(Value::String(value.into_owned())),
                    single => {
                        let first = single.take();
                        *single = Value::Array(vec![first, Value::String(value.into_owned())]);
                    }
                },
            }
        }

        result
    }
}
