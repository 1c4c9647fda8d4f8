//! Envelope codec - raw bus message <-> `Envelope`.
//!
//! Two wire layouts are understood:
//!
//! - **Structured mode**: the body is a JSON object carrying every attribute
//!   (`specversion`, `id`, `type`, `source`, `time`, `datacontenttype`) plus
//!   either inline `data` or `data_base64`.
//! - **Binary mode**: attributes travel as `ce-*` message properties and the
//!   body is the raw payload, typed by the message content type.
//!
//! Decoding never panics on malformed input; every failure is a `DecodeError`.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde_json::{Map, Value as JsonValue};
use std::collections::BTreeMap;
use thiserror::Error;

use super::cloud_event::{Envelope, EnvelopeData};
use super::raw_message::RawMessage;
use crate::domain::foundation::{EventId, Timestamp};

/// The only cloud-event spec version accepted.
pub const SPEC_VERSION: &str = "1.0";

/// Content type of a structured-mode message body.
pub const STRUCTURED_CONTENT_TYPE: &str = "application/cloudevents+json; charset=utf-8";

/// Prefix of binary-mode attribute properties.
pub const BINARY_ATTRIBUTE_PREFIX: &str = "ce-";

const CORE_ATTRIBUTES: [&str; 8] = [
    "specversion",
    "id",
    "type",
    "source",
    "time",
    "datacontenttype",
    "data",
    "data_base64",
];

/// Errors produced while decoding an envelope or its payload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("message body is not valid JSON: {0}")]
    NotJson(String),

    #[error("message body is not a JSON object")]
    NotAnObject,

    #[error("required attribute '{0}' is missing")]
    MissingAttribute(&'static str),

    #[error("attribute '{attribute}' is invalid: {reason}")]
    InvalidAttribute { attribute: String, reason: String },

    #[error("unsupported specversion '{0}'")]
    UnsupportedSpecVersion(String),

    #[error("envelope carries both 'data' and 'data_base64'")]
    ConflictingData,

    #[error("data_base64 is not valid base64: {0}")]
    InvalidBase64(String),

    #[error("payload does not match {type_name}: {reason}")]
    Payload { type_name: String, reason: String },

    #[error("payload has members unknown to {type_name}: {}", members.join(", "))]
    UnknownMembers {
        type_name: String,
        members: Vec<String>,
    },
}

impl DecodeError {
    fn invalid(attribute: impl Into<String>, reason: impl Into<String>) -> Self {
        DecodeError::InvalidAttribute {
            attribute: attribute.into(),
            reason: reason.into(),
        }
    }
}

/// Decodes a raw bus message in either structured or binary mode.
pub fn decode(raw: &RawMessage) -> Result<Envelope, DecodeError> {
    if is_binary_mode(raw) {
        decode_binary(raw)
    } else {
        decode_structured(&raw.body)
    }
}

/// Encodes an envelope as a structured-mode message.
///
/// The bus message id is the envelope id.
pub fn encode(envelope: &Envelope) -> RawMessage {
    let mut object = Map::new();
    object.insert("specversion".into(), JsonValue::from(SPEC_VERSION));
    object.insert("id".into(), JsonValue::from(envelope.id.as_str()));
    object.insert("type".into(), JsonValue::from(envelope.event_type.as_str()));
    object.insert("source".into(), JsonValue::from(envelope.source.as_str()));
    if let Some(time) = &envelope.time {
        object.insert("time".into(), JsonValue::from(time.to_rfc3339()));
    }
    if let Some(content_type) = &envelope.data_content_type {
        object.insert("datacontenttype".into(), JsonValue::from(content_type.as_str()));
    }
    match &envelope.data {
        EnvelopeData::Empty => {}
        EnvelopeData::Json(value) => {
            object.insert("data".into(), value.clone());
        }
        EnvelopeData::Binary(bytes) => {
            object.insert("data_base64".into(), JsonValue::from(BASE64.encode(bytes)));
        }
    }
    for (name, value) in &envelope.extensions {
        object.entry(name.clone()).or_insert_with(|| value.clone());
    }

    let body = JsonValue::Object(object).to_string().into_bytes();
    RawMessage::new(envelope.id.as_str(), body).with_content_type(STRUCTURED_CONTENT_TYPE)
}

/// Encodes an envelope in binary mode: attributes as `ce-*` properties,
/// payload as the raw body.
///
/// Non-string extension values are carried as their JSON text.
pub fn encode_binary(envelope: &Envelope) -> RawMessage {
    let body = match &envelope.data {
        EnvelopeData::Empty => Vec::new(),
        EnvelopeData::Json(value) => value.to_string().into_bytes(),
        EnvelopeData::Binary(bytes) => bytes.clone(),
    };
    let mut raw = RawMessage::new(envelope.id.as_str(), body)
        .with_property("ce-specversion", SPEC_VERSION)
        .with_property("ce-id", envelope.id.as_str())
        .with_property("ce-type", envelope.event_type.as_str())
        .with_property("ce-source", envelope.source.as_str());
    if let Some(time) = &envelope.time {
        raw = raw.with_property("ce-time", time.to_rfc3339());
    }
    if let Some(content_type) = &envelope.data_content_type {
        raw = raw.with_content_type(content_type.as_str());
    }
    for (name, value) in &envelope.extensions {
        let text = match value {
            JsonValue::String(s) => s.clone(),
            other => other.to_string(),
        };
        raw = raw.with_property(format!("{}{}", BINARY_ATTRIBUTE_PREFIX, name), text);
    }
    raw
}

fn is_binary_mode(raw: &RawMessage) -> bool {
    raw.properties.contains_key("ce-id")
}

fn decode_structured(body: &[u8]) -> Result<Envelope, DecodeError> {
    let value: JsonValue =
        serde_json::from_slice(body).map_err(|e| DecodeError::NotJson(e.to_string()))?;
    let JsonValue::Object(mut object) = value else {
        return Err(DecodeError::NotAnObject);
    };

    let spec_version = required_string(&object, "specversion")?;
    if spec_version != SPEC_VERSION {
        return Err(DecodeError::UnsupportedSpecVersion(spec_version));
    }

    let id = required_string(&object, "id")?;
    let event_type = required_string(&object, "type")?;
    let source = required_string(&object, "source")?;
    let time = optional_string(&object, "time")?
        .map(|raw| parse_time(&raw))
        .transpose()?;
    let data_content_type = optional_string(&object, "datacontenttype")?;

    let inline = object.remove("data").filter(|v| !v.is_null());
    let encoded = object.remove("data_base64").filter(|v| !v.is_null());
    let data = match (inline, encoded) {
        (Some(_), Some(_)) => return Err(DecodeError::ConflictingData),
        (Some(value), None) => EnvelopeData::from_json(value),
        (None, Some(JsonValue::String(encoded))) => {
            let bytes = BASE64
                .decode(encoded.as_bytes())
                .map_err(|e| DecodeError::InvalidBase64(e.to_string()))?;
            EnvelopeData::from_bytes(data_content_type.as_deref(), bytes)
        }
        (None, Some(_)) => {
            return Err(DecodeError::invalid("data_base64", "expected a string"));
        }
        (None, None) => EnvelopeData::Empty,
    };

    let extensions: BTreeMap<String, JsonValue> = object
        .into_iter()
        .filter(|(name, _)| !CORE_ATTRIBUTES.contains(&name.as_str()))
        .collect();

    Ok(Envelope {
        id: EventId::from_string(id),
        event_type,
        source,
        time,
        data_content_type,
        data,
        extensions,
    })
}

fn decode_binary(raw: &RawMessage) -> Result<Envelope, DecodeError> {
    if let Some(version) = raw.property("ce-specversion") {
        if version != SPEC_VERSION {
            return Err(DecodeError::UnsupportedSpecVersion(version.to_string()));
        }
    }
    let id = required_property(raw, "ce-id", "id")?;
    let event_type = required_property(raw, "ce-type", "type")?;
    let source = required_property(raw, "ce-source", "source")?;
    let time = raw.property("ce-time").map(parse_time).transpose()?;

    let extensions = raw
        .properties
        .iter()
        .filter_map(|(key, value)| {
            let name = key.strip_prefix(BINARY_ATTRIBUTE_PREFIX)?;
            if CORE_ATTRIBUTES.contains(&name) {
                return None;
            }
            Some((name.to_string(), JsonValue::from(value.as_str())))
        })
        .collect();

    Ok(Envelope {
        id: EventId::from_string(id),
        event_type,
        source,
        time,
        data_content_type: raw.content_type.clone(),
        data: EnvelopeData::from_bytes(raw.content_type.as_deref(), raw.body.clone()),
        extensions,
    })
}

fn required_string(
    object: &Map<String, JsonValue>,
    attribute: &'static str,
) -> Result<String, DecodeError> {
    match optional_string(object, attribute)? {
        Some(value) if !value.trim().is_empty() => Ok(value),
        Some(_) => Err(DecodeError::invalid(attribute, "must not be empty")),
        None => Err(DecodeError::MissingAttribute(attribute)),
    }
}

fn optional_string(
    object: &Map<String, JsonValue>,
    attribute: &str,
) -> Result<Option<String>, DecodeError> {
    match object.get(attribute) {
        None | Some(JsonValue::Null) => Ok(None),
        Some(JsonValue::String(value)) => Ok(Some(value.clone())),
        Some(_) => Err(DecodeError::invalid(attribute, "expected a string")),
    }
}

fn required_property(
    raw: &RawMessage,
    key: &str,
    attribute: &'static str,
) -> Result<String, DecodeError> {
    match raw.property(key) {
        Some(value) if !value.trim().is_empty() => Ok(value.to_string()),
        Some(_) => Err(DecodeError::invalid(attribute, "must not be empty")),
        None => Err(DecodeError::MissingAttribute(attribute)),
    }
}

fn parse_time(raw: &str) -> Result<Timestamp, DecodeError> {
    Timestamp::parse_rfc3339(raw).map_err(|e| DecodeError::invalid("time", e.to_string()))
}
