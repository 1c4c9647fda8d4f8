//! The wire envelope: a cloud event wrapping an arbitrary payload.

use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

use crate::domain::foundation::{EventId, Timestamp};

/// Payload carried by an envelope.
///
/// Inline JSON `data`, a `data_base64` attribute holding JSON, and a
/// binary-mode JSON body all normalize to `Json`. Only bytes that are not
/// JSON (by content type or by content) stay `Binary`.
#[derive(Debug, Clone, PartialEq)]
pub enum EnvelopeData {
    Empty,
    Json(JsonValue),
    Binary(Vec<u8>),
}

impl EnvelopeData {
    /// Builds the canonical representation of a byte payload.
    pub fn from_bytes(content_type: Option<&str>, bytes: Vec<u8>) -> Self {
        if bytes.is_empty() {
            return EnvelopeData::Empty;
        }
        if content_type.map_or(true, is_json_content_type) {
            if let Ok(value) = serde_json::from_slice::<JsonValue>(&bytes) {
                return EnvelopeData::from_json(value);
            }
        }
        EnvelopeData::Binary(bytes)
    }

    /// Builds the canonical representation of a JSON payload.
    pub fn from_json(value: JsonValue) -> Self {
        match value {
            JsonValue::Null => EnvelopeData::Empty,
            value => EnvelopeData::Json(value),
        }
    }

    /// The payload as a JSON tree, for typed deserialization.
    ///
    /// Binary payloads are parsed as JSON regardless of content type; `None`
    /// when they are not JSON at all.
    pub fn to_json(&self) -> Option<JsonValue> {
        match self {
            EnvelopeData::Empty => Some(JsonValue::Null),
            EnvelopeData::Json(value) => Some(value.clone()),
            EnvelopeData::Binary(bytes) => serde_json::from_slice(bytes).ok(),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, EnvelopeData::Empty)
    }
}

/// Returns true for `application/json`, `text/json` and any `+json` media type.
pub fn is_json_content_type(content_type: &str) -> bool {
    let media_type = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    media_type == "application/json" || media_type == "text/json" || media_type.ends_with("+json")
}

/// Self-describing event wrapper: id, type, source, time and payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub id: EventId,
    pub event_type: String,
    pub source: String,
    pub time: Option<Timestamp>,
    pub data_content_type: Option<String>,
    pub data: EnvelopeData,
    /// Extension attributes, kept so re-encoding is lossless.
    pub extensions: BTreeMap<String, JsonValue>,
}

impl Envelope {
    /// Creates an envelope without payload, stamped with the current time.
    pub fn new(id: EventId, event_type: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            id,
            event_type: event_type.into(),
            source: source.into(),
            time: Some(Timestamp::now()),
            data_content_type: None,
            data: EnvelopeData::Empty,
            extensions: BTreeMap::new(),
        }
    }

    pub fn with_time(mut self, time: Option<Timestamp>) -> Self {
        self.time = time;
        self
    }

    /// Attaches an inline JSON payload (`datacontenttype: application/json`).
    pub fn with_json_data(mut self, value: JsonValue) -> Self {
        self.data_content_type = Some("application/json".to_string());
        self.data = EnvelopeData::from_json(value);
        self
    }

    /// Attaches a byte payload; JSON bytes are normalized to `Json`.
    pub fn with_binary_data(mut self, content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        let content_type = content_type.into();
        self.data = EnvelopeData::from_bytes(Some(&content_type), bytes);
        self.data_content_type = Some(content_type);
        self
    }

    pub fn with_extension(mut self, name: impl Into<String>, value: JsonValue) -> Self {
        self.extensions.insert(name.into(), value);
        self
    }
}
