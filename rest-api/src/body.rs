//! Request body parsing for both supported wire formats.
//!
//! Bodies are lowered into the core [`Payload`] representation before
//! validation. JSON is the default; XML is selected by `Content-Type`.
//! An empty body is an empty payload, not a parse failure: a POST with no
//! body against a missing item must fall through to the 404, not die here
//! with a 400.

use axum::http::{header, HeaderMap};
use quick_xml::events::Event;
use quick_xml::Reader;
use serde_json::Value;
use todo_core::{Payload, PayloadSource, RawValue};

use crate::error::ApiError;

/// Wire format of a request body, from `Content-Type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyFormat {
    Json,
    Xml,
}

impl BodyFormat {
    /// Anything mentioning xml parses as XML; everything else as JSON,
    /// including requests with no `Content-Type` at all.
    pub fn from_headers(headers: &HeaderMap) -> BodyFormat {
        let content_type = headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        if content_type.contains("xml") {
            BodyFormat::Xml
        } else {
            BodyFormat::Json
        }
    }
}

/// Parse a raw body into a flat payload in the format the headers declare.
pub fn parse_body(headers: &HeaderMap, bytes: &[u8]) -> Result<Payload, ApiError> {
    let format = BodyFormat::from_headers(headers);
    let text = std::str::from_utf8(bytes)
        .map_err(|_| ApiError::MalformedBody("body is not valid utf-8".into()))?;

    if text.trim().is_empty() {
        let source = match format {
            BodyFormat::Json => PayloadSource::Json,
            BodyFormat::Xml => PayloadSource::Xml,
        };
        return Ok(Payload::new(source));
    }

    match format {
        BodyFormat::Json => parse_json(text),
        BodyFormat::Xml => parse_xml(text),
    }
}

fn parse_json(text: &str) -> Result<Payload, ApiError> {
    let value: Value = serde_json::from_str(text)
        .map_err(|e| ApiError::MalformedBody(format!("invalid json: {e}")))?;

    let Value::Object(map) = value else {
        return Err(ApiError::MalformedBody(
            "request body must be a json object".into(),
        ));
    };

    let mut payload = Payload::new(PayloadSource::Json);
    for (name, value) in map {
        let raw = match value {
            Value::String(s) => RawValue::Text(s),
            Value::Bool(b) => RawValue::Flag(b),
            Value::Number(n) => RawValue::Number(n.to_string()),
            Value::Null => RawValue::Null,
            Value::Array(_) | Value::Object(_) => {
                return Err(ApiError::MalformedBody(format!(
                    "field '{name}' must be a scalar value"
                )));
            }
        };
        payload.insert(name, raw);
    }
    Ok(payload)
}

/// Lower an XML document of the shape `<todo><title>x</title>…</todo>`
/// into a payload. The root element name is ignored; each child element
/// becomes a field carrying its text content. Nesting below one level is
/// rejected, as are unclosed or mismatched tags.
fn parse_xml(text: &str) -> Result<Payload, ApiError> {
    let mut reader = Reader::from_str(text);
    let config = reader.config_mut();
    config.trim_text_start = true;
    config.trim_text_end = true;

    let mut payload = Payload::new(PayloadSource::Xml);
    let mut depth = 0usize;
    let mut roots_seen = 0usize;
    let mut current: Option<String> = None;
    let mut value = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(start)) => {
                depth += 1;
                match depth {
                    1 => {
                        if roots_seen > 0 {
                            return Err(ApiError::MalformedBody(
                                "multiple root elements".into(),
                            ));
                        }
                        roots_seen += 1;
                    }
                    2 => {
                        let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
                        current = Some(name);
                        value.clear();
                    }
                    _ => {
                        return Err(ApiError::MalformedBody(
                            "nested elements are not supported".into(),
                        ));
                    }
                }
            }
            Ok(Event::Empty(empty)) => match depth {
                1 => {
                    let name = String::from_utf8_lossy(empty.name().as_ref()).into_owned();
                    payload.insert(name, RawValue::Text(String::new()));
                }
                0 => {
                    if roots_seen > 0 {
                        return Err(ApiError::MalformedBody("multiple root elements".into()));
                    }
                    roots_seen += 1;
                }
                _ => {
                    return Err(ApiError::MalformedBody(
                        "nested elements are not supported".into(),
                    ));
                }
            },
            Ok(Event::Text(text)) => {
                if depth == 2 {
                    let chunk = text
                        .unescape()
                        .map_err(|e| ApiError::MalformedBody(format!("invalid xml: {e}")))?;
                    value.push_str(&chunk);
                }
            }
            Ok(Event::CData(data)) => {
                if depth == 2 {
                    value.push_str(&String::from_utf8_lossy(&data));
                }
            }
            Ok(Event::End(_)) => {
                if depth == 2 {
                    if let Some(name) = current.take() {
                        payload.insert(name, RawValue::Text(value.clone()));
                    }
                }
                depth = depth.saturating_sub(1);
            }
            Ok(Event::Eof) => break,
            Ok(Event::Decl(_) | Event::Comment(_) | Event::PI(_) | Event::DocType(_)) => {}
            Err(e) => return Err(ApiError::MalformedBody(format!("invalid xml: {e}"))),
        }
    }

    if depth != 0 {
        return Err(ApiError::MalformedBody("unclosed xml element".into()));
    }
    if roots_seen == 0 {
        return Err(ApiError::MalformedBody("missing root element".into()));
    }
    Ok(payload)
}
