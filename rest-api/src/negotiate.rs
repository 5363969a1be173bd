//! Response-side content negotiation and serialization.
//!
//! JSON is the default representation; `Accept: application/xml` switches
//! the whole response, error bodies included. Collections are wrapped
//! under the plural kind name, single entities are bare objects.

use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use serde_json::{json, Map, Value};
use todo_core::{Edge, Entity, EntityKind, FieldValue};

/// Negotiated response representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Representation {
    Json,
    Xml,
}

impl Representation {
    /// Pick the representation from the `Accept` header. Only an explicit
    /// xml media type switches away from JSON.
    pub fn negotiate(headers: &HeaderMap) -> Representation {
        let accept = headers
            .get(header::ACCEPT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        if accept.contains("application/xml") || accept.contains("text/xml") {
            Representation::Xml
        } else {
            Representation::Json
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Representation::Json => "application/json",
            Representation::Xml => "application/xml",
        }
    }
}

fn field_to_json(value: &FieldValue) -> Value {
    match value {
        FieldValue::Text(s) => json!(s),
        FieldValue::Flag(b) => json!(b),
    }
}

/// `{"id": 1, "title": "...", ...}` with real JSON types throughout.
pub fn entity_to_json(entity: &Entity) -> Value {
    let mut map = Map::new();
    map.insert("id".into(), json!(entity.id));
    for (name, value) in entity.ordered_fields() {
        map.insert(name.into(), field_to_json(value));
    }
    Value::Object(map)
}

fn write_text_element(writer: &mut Writer<Vec<u8>>, name: &str, text: &str) {
    // writing into a Vec cannot fail
    let _ = writer.write_event(Event::Start(BytesStart::new(name)));
    let _ = writer.write_event(Event::Text(BytesText::new(text)));
    let _ = writer.write_event(Event::End(BytesEnd::new(name)));
}

fn write_entity_xml(writer: &mut Writer<Vec<u8>>, entity: &Entity) {
    let tag = entity.kind.singular();
    let _ = writer.write_event(Event::Start(BytesStart::new(tag)));
    write_text_element(writer, "id", &entity.id.to_string());
    for (name, value) in entity.ordered_fields() {
        write_text_element(writer, name, &value.render());
    }
    let _ = writer.write_event(Event::End(BytesEnd::new(tag)));
}

fn xml_document(build: impl FnOnce(&mut Writer<Vec<u8>>)) -> String {
    let mut writer = Writer::new(Vec::new());
    build(&mut writer);
    String::from_utf8(writer.into_inner()).unwrap_or_default()
}

fn body_response(repr: Representation, status: StatusCode, body: String) -> Response {
    (
        status,
        [(header::CONTENT_TYPE, repr.content_type())],
        body,
    )
        .into_response()
}

/// Single entity, bare object / single element.
pub fn entity_response(repr: Representation, status: StatusCode, entity: &Entity) -> Response {
    let body = match repr {
        Representation::Json => entity_to_json(entity).to_string(),
        Representation::Xml => xml_document(|w| write_entity_xml(w, entity)),
    };
    body_response(repr, status, body)
}

/// Collection wrapped under the plural kind name.
pub fn collection_response(repr: Representation, kind: EntityKind, entities: &[Entity]) -> Response {
    let body = match repr {
        Representation::Json => {
            let items: Vec<Value> = entities.iter().map(entity_to_json).collect();
            let mut wrapper = Map::new();
            wrapper.insert(kind.collection().to_string(), Value::Array(items));
            Value::Object(wrapper).to_string()
        }
        Representation::Xml => xml_document(|w| {
            let tag = kind.collection();
            let _ = w.write_event(Event::Start(BytesStart::new(tag)));
            for entity in entities {
                write_entity_xml(w, entity);
            }
            let _ = w.write_event(Event::End(BytesEnd::new(tag)));
        }),
    };
    body_response(repr, StatusCode::OK, body)
}

/// Created association edge: its synthetic row id.
pub fn link_response(repr: Representation, edge: &Edge) -> Response {
    let body = match repr {
        Representation::Json => json!({ "id": edge.id }).to_string(),
        Representation::Xml => xml_document(|w| {
            let _ = w.write_event(Event::Start(BytesStart::new("link")));
            write_text_element(w, "id", &edge.id.to_string());
            let _ = w.write_event(Event::End(BytesEnd::new("link")));
        }),
    };
    body_response(repr, StatusCode::CREATED, body)
}

/// Diagnostic body: `{"errorMessages": [...]}` or the XML equivalent.
pub fn error_response(repr: Representation, status: StatusCode, messages: &[String]) -> Response {
    let body = match repr {
        Representation::Json => json!({ "errorMessages": messages }).to_string(),
        Representation::Xml => xml_document(|w| {
            let _ = w.write_event(Event::Start(BytesStart::new("errorMessages")));
            for message in messages {
                write_text_element(w, "errorMessage", message);
            }
            let _ = w.write_event(Event::End(BytesEnd::new("errorMessages")));
        }),
    };
    body_response(repr, status, body)
}
