//! Body verification and parsing.
//!
//! [`verify`] runs three checks in order and stops at the first failure:
//!
//! 1. the request's media type matches the receiver's [`BodyEncoding`];
//! 2. the signature, when the receiver requires one, authenticates the raw bytes;
//! 3. the body parses as the declared encoding.
//!
//! Parsing is strict: a JSON document posted to a form receiver is malformed
//! even though every byte sequence is technically a form body.

use crate::{
    descriptor::{BodyEncoding, ReceiverDescriptor},
    outcome::RejectionReason,
    path::{PathSegment, PropertyPath},
    request::IncomingRequest,
    verifier,
};
use bytes::Bytes;
use percent_encoding::percent_decode_str;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

// ============================================================================
// ParsedBody
// ============================================================================

/// A body that passed verification, parsed according to its encoding.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedBody {
    Json(Value),
    Form(FormData),
    Xml(XmlElement),
    Raw(Bytes),
}

impl ParsedBody {
    pub fn encoding(&self) -> BodyEncoding {
        match self {
            Self::Json(_) => BodyEncoding::Json,
            Self::Form(_) => BodyEncoding::Form,
            Self::Xml(_) => BodyEncoding::Xml,
            Self::Raw(_) => BodyEncoding::Raw,
        }
    }

    /// JSON rendering for logs and tooling.
    ///
    /// Form bodies become an object (repeated fields become arrays), XML
    /// elements become `{name, attributes, text, children}` objects, and raw
    /// bodies become a lossy UTF-8 string.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Json(value) => value.clone(),
            Self::Form(form) => form.to_json(),
            Self::Xml(element) => serde_json::to_value(element).unwrap_or(Value::Null),
            Self::Raw(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        }
    }
}

// ============================================================================
// FormData
// ============================================================================

/// Decoded `application/x-www-form-urlencoded` fields, in body order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FormData {
    fields: Vec<(String, String)>,
}

impl FormData {
    /// First value of `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// All values of `key`, in body order.
    pub fn get_all<'s, 'k>(&'s self, key: &'k str) -> impl Iterator<Item = &'s str> + 'k
    where
        's: 'k,
    {
        self.fields
            .iter()
            .filter(move |(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Resolve `key` or `key[n]` to a non-blank value.
    pub fn resolve(&self, path: &PropertyPath) -> Option<&str> {
        let value = match path.segments() {
            [PathSegment::Key(key)] => self.get(key),
            [PathSegment::Key(key), PathSegment::Index(index)] => self
                .fields
                .iter()
                .filter(|(k, _)| k == key)
                .map(|(_, v)| v.as_str())
                .nth(*index),
            _ => None,
        }?;
        (!value.trim().is_empty()).then_some(value)
    }

    fn to_json(&self) -> Value {
        let mut object = Map::new();
        for (key, value) in &self.fields {
            match object.get_mut(key) {
                Some(Value::Array(values)) => values.push(Value::String(value.clone())),
                Some(existing) => {
                    let first = existing.take();
                    *existing = Value::Array(vec![first, Value::String(value.clone())]);
                }
                None => {
                    object.insert(key.clone(), Value::String(value.clone()));
                }
            }
        }
        Value::Object(object)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for FormData {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

// ============================================================================
// XmlElement
// ============================================================================

/// One element of a parsed XML document.
///
/// `text` holds the concatenated character data directly inside the element
/// (CDATA included); whitespace-only text nodes are dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct XmlElement {
    name: String,
    attributes: Vec<(String, String)>,
    text: String,
    children: Vec<XmlElement>,
}

impl XmlElement {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((name.into(), value.into()));
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn with_child(mut self, child: XmlElement) -> Self {
        self.children.push(child);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Text content with surrounding whitespace removed.
    pub fn text(&self) -> &str {
        self.text.trim()
    }

    pub fn children(&self) -> &[XmlElement] {
        &self.children
    }

    /// The `index`-th child element named `name`.
    pub fn child(&self, name: &str, index: usize) -> Option<&XmlElement> {
        self.children.iter().filter(|c| c.name == name).nth(index)
    }

    /// Resolve a path whose first key names this (root) element.
    ///
    /// Keys select child elements, an index after a key selects among
    /// same-named siblings, and a trailing `@name` key reads an attribute.
    /// Returns the trimmed text or attribute value when non-blank.
    pub fn resolve(&self, path: &PropertyPath) -> Option<&str> {
        let segments = path.segments();
        let mut current: Option<&XmlElement> = None;
        let mut i = 0;

        while i < segments.len() {
            let PathSegment::Key(key) = &segments[i] else {
                return None;
            };
            let index = match segments.get(i + 1) {
                Some(PathSegment::Index(n)) => {
                    i += 1;
                    *n
                }
                _ => 0,
            };
            i += 1;

            if let Some(attribute) = key.strip_prefix('@') {
                if i != segments.len() {
                    return None;
                }
                let value = current?.attribute(attribute)?.trim();
                return (!value.is_empty()).then_some(value);
            }

            current = match current {
                None if key == &self.name && index == 0 => Some(self),
                None => None,
                Some(element) => element.child(key, index),
            };
            current?;
        }

        let text = current?.text();
        (!text.is_empty()).then_some(text)
    }
}

// ============================================================================
// Verification
// ============================================================================

/// Failure to parse a body as its declared encoding.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed {encoding} body: {message}")]
pub struct BodyParseError {
    pub encoding: BodyEncoding,
    pub message: String,
}

/// Verify `request` against `descriptor` and parse its body.
///
/// # Errors
///
/// Returns the first failing check as a [`RejectionReason`]:
/// `UnsupportedContentType`, `SignatureMissing`, `SignatureMismatch` or
/// `MalformedBody`.
pub fn verify(
    descriptor: &ReceiverDescriptor,
    request: &IncomingRequest,
) -> Result<ParsedBody, RejectionReason> {
    let encoding = descriptor.body_encoding();
    let media_type = request.media_type();

    if !encoding.accepts_media_type(media_type.as_deref()) {
        debug!(
            receiver = %descriptor.name(),
            expected = %encoding,
            content_type = ?media_type,
            "content type does not match body encoding"
        );
        return Err(RejectionReason::UnsupportedContentType);
    }

    verifier::check_signature(descriptor.signature(), request.headers(), request.body())?;

    parse_body(encoding, request.body()).map_err(|e| {
        debug!(receiver = %descriptor.name(), error = %e, "body rejected");
        RejectionReason::MalformedBody
    })
}

/// Parse `body` strictly as `encoding`.
///
/// # Errors
///
/// Returns [`BodyParseError`] when the bytes are not a well-formed instance
/// of the encoding.
pub fn parse_body(encoding: BodyEncoding, body: &Bytes) -> Result<ParsedBody, BodyParseError> {
    let malformed = |message: String| BodyParseError { encoding, message };

    match encoding {
        BodyEncoding::Raw => Ok(ParsedBody::Raw(body.clone())),
        BodyEncoding::Json => {
            let value: Value =
                serde_json::from_slice(body).map_err(|e| malformed(e.to_string()))?;
            if !value.is_object() {
                return Err(malformed("top-level value must be an object".to_string()));
            }
            Ok(ParsedBody::Json(value))
        }
        BodyEncoding::Form => parse_form(body).map(ParsedBody::Form).map_err(malformed),
        BodyEncoding::Xml => parse_xml(body).map(ParsedBody::Xml).map_err(malformed),
    }
}

/// Characters allowed in an undecoded form body.
fn is_form_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || "-._~%+*=&!$'(),;:@/?[]|".contains(c)
}

fn parse_form(body: &[u8]) -> Result<FormData, String> {
    let text = std::str::from_utf8(body).map_err(|_| "body is not valid UTF-8".to_string())?;
    if text.is_empty() {
        return Err("body is empty".to_string());
    }
    if let Some(c) = text.chars().find(|c| !is_form_char(*c)) {
        return Err(format!("unexpected character {c:?}"));
    }

    let form = text
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| -> Result<(String, String), String> {
            match pair.split_once('=') {
                Some((key, value)) if !key.is_empty() => {
                    Ok((decode_form_component(key)?, decode_form_component(value)?))
                }
                Some(_) => Err("field with an empty name".to_string()),
                None => Err(format!("field '{pair}' has no '='")),
            }
        })
        .collect::<Result<FormData, String>>()?;
    if form.is_empty() {
        return Err("body contains no fields".to_string());
    }
    Ok(form)
}

/// Decode one form key or value. `+` is a space and percent-escapes must
/// decode to UTF-8.
fn decode_form_component(raw: &str) -> Result<String, String> {
    let spaced = raw.replace('+', " ");
    percent_decode_str(&spaced)
        .decode_utf8()
        .map(|decoded| decoded.into_owned())
        .map_err(|_| format!("'{raw}' does not decode to valid UTF-8"))
}

fn element_from_start(start: &BytesStart<'_>) -> Result<XmlElement, String> {
    let name = String::from_utf8(start.name().as_ref().to_vec())
        .map_err(|_| "element name is not valid UTF-8".to_string())?;
    let mut element = XmlElement::new(name);

    for attribute in start.attributes() {
        let attribute = attribute.map_err(|e| e.to_string())?;
        let key = String::from_utf8(attribute.key.as_ref().to_vec())
            .map_err(|_| "attribute name is not valid UTF-8".to_string())?;
        let value = attribute.unescape_value().map_err(|e| e.to_string())?;
        element.attributes.push((key, value.into_owned()));
    }

    Ok(element)
}

/// Attach a completed element to its parent, or make it the document root.
fn attach(
    element: XmlElement,
    stack: &mut [XmlElement],
    root: &mut Option<XmlElement>,
) -> Result<(), String> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None if root.is_some() => return Err("document has more than one root element".to_string()),
        None => *root = Some(element),
    }
    Ok(())
}

fn parse_xml(body: &[u8]) -> Result<XmlElement, String> {
    let text = std::str::from_utf8(body).map_err(|_| "body is not valid UTF-8".to_string())?;
    let mut reader = Reader::from_str(text);
    reader.trim_text(true);

    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root: Option<XmlElement> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                if stack.is_empty() && root.is_some() {
                    return Err("document has more than one root element".to_string());
                }
                stack.push(element_from_start(e)?);
            }
            Ok(Event::Empty(ref e)) => {
                let element = element_from_start(e)?;
                attach(element, &mut stack, &mut root)?;
            }
            Ok(Event::End(_)) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| "closing tag without matching opening tag".to_string())?;
                attach(element, &mut stack, &mut root)?;
            }
            Ok(Event::Text(e)) => {
                let content = e.unescape().map_err(|e| e.to_string())?;
                match stack.last_mut() {
                    Some(element) => element.text.push_str(&content),
                    None if content.trim().is_empty() => {}
                    None => return Err("text outside the root element".to_string()),
                }
            }
            Ok(Event::CData(e)) => {
                let content = e.into_inner();
                match stack.last_mut() {
                    Some(element) => element.text.push_str(&String::from_utf8_lossy(&content)),
                    None => return Err("CDATA outside the root element".to_string()),
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(format!("XML parsing error: {}", e)),
        }
        buf.clear();
    }

    if !stack.is_empty() {
        return Err("document ended before all elements were closed".to_string());
    }
    root.ok_or_else(|| "document has no root element".to_string())
}

#[cfg(test)]
#[path = "body_tests.rs"]
mod tests;
