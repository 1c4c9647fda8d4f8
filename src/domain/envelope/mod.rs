//! Envelope module - the cloud-event wrapper around every bus payload.
//!
//! - `RawMessage` - bytes plus properties as the bus delivers them
//! - `Envelope` / `EnvelopeData` - decoded attributes and payload
//! - `decode` / `encode` - structured and binary content modes
//! - `decode_payload` - typed payload with strict or lenient members

mod cloud_event;
mod codec;
mod payload;
mod raw_message;

pub use cloud_event::{is_json_content_type, Envelope, EnvelopeData};
pub use codec::{
    decode, encode, encode_binary, DecodeError, BINARY_ATTRIBUTE_PREFIX, SPEC_VERSION,
    STRUCTURED_CONTENT_TYPE,
};
pub use payload::{decode_payload, AdditionalMembers, Payload};
pub use raw_message::RawMessage;
