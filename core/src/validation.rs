//! Schema-driven validation of request payloads.
//!
//! The router parses a body into a [`Payload`] of raw wire values; this
//! module checks it against the entity kind's field schema and produces the
//! typed patch the store applies. The same pipeline gates create, partial
//! update and full replace, with the mode deciding which presence rules
//! apply.

use std::collections::BTreeMap;

use crate::{
    error::{Result, StoreError},
    model::{EntityKind, FieldKind, FieldValue},
};

/// Wire format a payload was parsed from.
///
/// XML has no native booleans, so flag fields accept the literal element
/// text `true`/`false` there; in JSON a quoted boolean stays a string and
/// fails the type check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadSource {
    Json,
    Xml,
}

/// A scalar value as it arrived on the wire, before schema checks.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Text(String),
    Flag(bool),
    /// JSON number, kept in its source rendering
    Number(String),
    Null,
}

/// Parsed request body: a flat map of field name to scalar.
#[derive(Debug, Clone, PartialEq)]
pub struct Payload {
    source: PayloadSource,
    fields: BTreeMap<String, RawValue>,
}

impl Payload {
    pub fn new(source: PayloadSource) -> Self {
        Payload {
            source,
            fields: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, name: impl Into<String>, value: RawValue) {
        self.fields.insert(name.into(), value);
    }

    pub fn source(&self) -> PayloadSource {
        self.source
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&RawValue> {
        self.fields.get(name)
    }

    fn iter(&self) -> impl Iterator<Item = (&str, &RawValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Which presence rules apply to a mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// POST to a collection: id forbidden, required fields mandatory
    Create,
    /// POST to an item: only supplied fields checked
    Partial,
    /// PUT to an item: required fields mandatory again
    Replace,
}

/// Validated output: field name to new value, `None` clearing an optional
/// field that was explicitly nulled.
pub type FieldPatch = BTreeMap<&'static str, Option<FieldValue>>;

/// Check a payload against the kind's schema and produce the typed patch.
///
/// Rules, in order:
/// 1. a create body must not carry an `id`;
/// 2. every supplied name must exist in the schema;
/// 3. values must match the field's wire type (strict booleans in JSON,
///    lexical `true`/`false` accepted from XML; numbers are stringified
///    into text fields);
/// 4. a required field supplied blank (or null) is rejected in every mode;
/// 5. on Create and Replace every required field must be present.
pub fn validate(kind: EntityKind, payload: &Payload, mode: WriteMode) -> Result<FieldPatch> {
    if mode == WriteMode::Create && payload.get("id").is_some() {
        return Err(StoreError::client_supplied_id());
    }

    let mut patch = FieldPatch::new();
    for (name, raw) in payload.iter() {
        let spec = kind.field(name).ok_or_else(|| StoreError::unknown_field(name))?;
        let value = match (spec.kind, raw) {
            (FieldKind::Text, RawValue::Text(s)) => Some(FieldValue::Text(s.clone())),
            (FieldKind::Text, RawValue::Number(n)) => Some(FieldValue::Text(n.clone())),
            (FieldKind::Flag, RawValue::Flag(b)) => Some(FieldValue::Flag(*b)),
            (FieldKind::Flag, RawValue::Text(s)) if payload.source() == PayloadSource::Xml => {
                match s.as_str() {
                    "true" => Some(FieldValue::Flag(true)),
                    "false" => Some(FieldValue::Flag(false)),
                    _ => return Err(StoreError::wrong_type(spec.name, "BOOLEAN")),
                }
            }
            (FieldKind::Flag | FieldKind::Text, RawValue::Null) => {
                if spec.required {
                    return Err(StoreError::mandatory_field(spec.name));
                }
                None
            }
            (FieldKind::Flag, _) => return Err(StoreError::wrong_type(spec.name, "BOOLEAN")),
            (FieldKind::Text, _) => return Err(StoreError::wrong_type(spec.name, "STRING")),
        };

        if spec.required {
            match &value {
                Some(FieldValue::Text(s)) if s.trim().is_empty() => {
                    return Err(StoreError::mandatory_field(spec.name));
                }
                _ => {}
            }
        }

        patch.insert(spec.name, value);
    }

    if matches!(mode, WriteMode::Create | WriteMode::Replace) {
        for spec in kind.schema() {
            if spec.required && !matches!(patch.get(spec.name), Some(Some(_))) {
                return Err(StoreError::mandatory_field(spec.name));
            }
        }
    }

    Ok(patch)
}

/// Extract the related-entity id from a link body.
///
/// The original wire format spells the key `id`, `Id` or `ID` and the value
/// as either a number or a numeric string. A syntactically valid but
/// negative id resolves to "no such entity" rather than a validation
/// failure, so linking to `-1` yields 404.
pub fn related_id(payload: &Payload) -> Result<u64> {
    let raw = ["id", "Id", "ID"]
        .into_iter()
        .find_map(|key| payload.get(key))
        .ok_or_else(|| StoreError::Validation("link body must supply an id".into()))?;

    let text = match raw {
        RawValue::Number(n) => n.clone(),
        RawValue::Text(s) => s.trim().to_string(),
        _ => return Err(StoreError::wrong_type("id", "ID")),
    };

    match text.parse::<i64>() {
        Ok(n) if n >= 0 => Ok(n as u64),
        Ok(_) => Err(StoreError::unresolvable_id(&text)),
        Err(_) => Err(StoreError::wrong_type("id", "ID")),
    }
}
