//! Inbound request representation.
//!
//! The host HTTP layer terminates TLS, parses headers and hands the raw body
//! bytes over unmodified. Signature verification depends on receiving exactly
//! the bytes that were transmitted.

use bytes::Bytes;

/// Ordered, case-insensitive multi-map of HTTP headers.
///
/// Insertion order is preserved and repeated header names are kept as
/// separate entries. Lookups compare names ASCII case-insensitively.
///
/// # Examples
///
/// ```rust
/// use webhook_intake_core::HeaderList;
///
/// let mut headers = HeaderList::new();
/// headers.append("X-Event", "push");
/// headers.append("x-event", "ping");
///
/// assert_eq!(headers.get("X-EVENT"), Some("push"));
/// assert_eq!(headers.get_all("x-event").collect::<Vec<_>>(), vec!["push", "ping"]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderList {
    entries: Vec<(String, String)>,
}

impl HeaderList {
    /// Create an empty header list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a header, keeping any existing values for the same name.
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.entries.push((name.into(), value.into()));
        self
    }

    /// First value for `name`, if any.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// All values for `name`, in insertion order.
    pub fn get_all<'s, 'n>(&'s self, name: &'n str) -> impl Iterator<Item = &'s str> + 'n
    where
        's: 'n,
    {
        self.entries
            .iter()
            .filter(move |(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Whether at least one header named `name` is present.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Iterate over `(name, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<N, V> FromIterator<(N, V)> for HeaderList
where
    N: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(n, v)| (n.into(), v.into()))
                .collect(),
        }
    }
}

/// A single inbound webhook request, read-only to the pipeline.
#[derive(Debug, Clone)]
pub struct IncomingRequest {
    headers: HeaderList,
    body: Bytes,
    content_type: Option<String>,
}

impl IncomingRequest {
    /// Create a request, taking the content type from the `Content-Type` header.
    pub fn new(headers: HeaderList, body: impl Into<Bytes>) -> Self {
        let content_type = headers.get("content-type").map(str::to_string);
        Self {
            headers,
            body: body.into(),
            content_type,
        }
    }

    /// Override the content type, e.g. when the host has already normalised it.
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn headers(&self) -> &HeaderList {
        &self.headers
    }

    /// Raw body bytes exactly as received.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// Media type portion of the content type, lowercased, without parameters.
    ///
    /// `"Application/JSON; charset=utf-8"` becomes `"application/json"`.
    pub fn media_type(&self) -> Option<String> {
        self.content_type
            .as_deref()
            .and_then(|ct| ct.split(';').next())
            .map(|mt| mt.trim().to_ascii_lowercase())
            .filter(|mt| !mt.is_empty())
    }
}

#[cfg(test)]
#[path = "request_tests.rs"]
mod tests;
