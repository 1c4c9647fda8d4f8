//! Raw bus message as handed over by a receiver adapter.

use std::collections::BTreeMap;

/// A message exactly as it came off (or goes onto) the bus.
///
/// `message_id` is the bus-level handle used for settlement and lease
/// renewal; it is unrelated to the envelope id inside the body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage {
    pub message_id: String,
    pub body: Vec<u8>,
    pub content_type: Option<String>,
    /// Application properties (binary-mode `ce-*` attributes, `operation_id`, ...).
    pub properties: BTreeMap<String, String>,
    /// How many times the bus has handed this message out, starting at 1.
    pub delivery_count: u32,
}

impl RawMessage {
    pub fn new(message_id: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        Self {
            message_id: message_id.into(),
            body: body.into(),
            content_type: None,
            properties: BTreeMap::new(),
            delivery_count: 1,
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn with_delivery_count(mut self, delivery_count: u32) -> Self {
        self.delivery_count = delivery_count;
        self
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }
}
