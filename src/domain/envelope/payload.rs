//! Typed payload decoding with strict or lenient member handling.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use super::cloud_event::Envelope;
use super::codec::DecodeError;

/// Marker for types that can be carried as an envelope payload.
pub trait Payload: DeserializeOwned + Serialize + Send + Sync + 'static {}

impl<T> Payload for T where T: DeserializeOwned + Serialize + Send + Sync + 'static {}

/// How members in the payload that the target type does not know are treated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdditionalMembers {
    /// Unknown members fail decoding.
    #[default]
    Error,
    /// Unknown members are dropped.
    Ignore,
}

impl std::str::FromStr for AdditionalMembers {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "error" => Ok(AdditionalMembers::Error),
            "ignore" => Ok(AdditionalMembers::Ignore),
            other => Err(format!("expected 'error' or 'ignore', got '{}'", other)),
        }
    }
}

/// Deserializes the envelope payload into `T`.
///
/// In `Error` mode the payload is re-serialized from `T` and every member
/// present in the input must survive. Members set to `null` are tolerated.
///
/// Only the serialized names of `T` count as known. A member accepted through
/// `#[serde(alias = "...")]` comes back under its primary name, so strict mode
/// reports the alias as unknown. Payload types that accept aliases should be
/// registered with `AdditionalMembers::Ignore`, or carry
/// `#[serde(deny_unknown_fields)]` themselves.
pub fn decode_payload<T: Payload>(
    envelope: &Envelope,
    members: AdditionalMembers,
) -> Result<T, DecodeError> {
    let type_name = std::any::type_name::<T>();
    let input = envelope.data.to_json().ok_or_else(|| DecodeError::Payload {
        type_name: type_name.to_string(),
        reason: "payload is not JSON".to_string(),
    })?;

    let value: T = serde_json::from_value(input.clone()).map_err(|e| DecodeError::Payload {
        type_name: type_name.to_string(),
        reason: e.to_string(),
    })?;

    if members == AdditionalMembers::Error {
        let known = serde_json::to_value(&value).map_err(|e| DecodeError::Payload {
            type_name: type_name.to_string(),
            reason: e.to_string(),
        })?;
        let mut unknown = Vec::new();
        collect_unknown(&input, &known, "", &mut unknown);
        if !unknown.is_empty() {
            return Err(DecodeError::UnknownMembers {
                type_name: type_name.to_string(),
                members: unknown,
            });
        }
    }

    Ok(value)
}

fn collect_unknown(input: &JsonValue, known: &JsonValue, path: &str, out: &mut Vec<String>) {
    match (input, known) {
        (JsonValue::Object(input), JsonValue::Object(known)) => {
            for (name, value) in input {
                let member_path = if path.is_empty() {
                    name.clone()
                } else {
                    format!("{}.{}", path, name)
                };
                match known.get(name) {
                    Some(known_value) => collect_unknown(value, known_value, &member_path, out),
                    None if value.is_null() => {}
                    None => out.push(member_path),
                }
            }
        }
        (JsonValue::Array(input), JsonValue::Array(known)) => {
            for (index, (value, known_value)) in input.iter().zip(known).enumerate() {
                collect_unknown(value, known_value, &format!("{}[{}]", path, index), out);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::EventId;
    use serde_json::json;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct SecretChanged {
        name: String,
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Order {
        id: String,
        lines: Vec<Line>,
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Line {
        sku: String,
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Renamed {
        #[serde(alias = "secretName")]
        name: String,
    }

    fn envelope(data: JsonValue) -> Envelope {
        Envelope::new(EventId::from_string("E-1"), "t", "s").with_json_data(data)
    }

    #[test]
    fn exact_payload_decodes_in_strict_mode() {
        let decoded: SecretChanged =
            decode_payload(&envelope(json!({"name": "db-password"})), AdditionalMembers::Error)
                .unwrap();
        assert_eq!(decoded.name, "db-password");
    }

    #[test]
    fn unknown_member_fails_strict_mode() {
        let result: Result<SecretChanged, _> = decode_payload(
            &envelope(json!({"name": "db", "vault": "main"})),
            AdditionalMembers::Error,
        );
        assert!(matches!(
            result,
            Err(DecodeError::UnknownMembers { members, .. }) if members == vec!["vault".to_string()]
        ));
    }

    #[test]
    fn unknown_member_is_ignored_in_lenient_mode() {
        let decoded: SecretChanged = decode_payload(
            &envelope(json!({"name": "db", "vault": "main"})),
            AdditionalMembers::Ignore,
        )
        .unwrap();
        assert_eq!(decoded.name, "db");
    }

    #[test]
    fn nested_unknown_members_are_reported_with_path() {
        let result: Result<Order, _> = decode_payload(
            &envelope(json!({"id": "o-1", "lines": [{"sku": "a"}, {"sku": "b", "qty": 2}]})),
            AdditionalMembers::Error,
        );
        assert!(matches!(
            result,
            Err(DecodeError::UnknownMembers { members, .. }) if members == vec!["lines[1].qty".to_string()]
        ));
    }

    #[test]
    fn null_unknown_member_is_tolerated() {
        let decoded: SecretChanged = decode_payload(
            &envelope(json!({"name": "db", "comment": null})),
            AdditionalMembers::Error,
        )
        .unwrap();
        assert_eq!(decoded.name, "db");
    }

    #[test]
    fn aliased_member_counts_as_unknown_in_strict_mode() {
        let result: Result<Renamed, _> = decode_payload(
            &envelope(json!({"secretName": "db"})),
            AdditionalMembers::Error,
        );
        assert!(matches!(
            result,
            Err(DecodeError::UnknownMembers { members, .. }) if members == vec!["secretName".to_string()]
        ));

        let primary: Renamed =
            decode_payload(&envelope(json!({"name": "db"})), AdditionalMembers::Error).unwrap();
        assert_eq!(primary.name, "db");
    }

    #[test]
    fn aliased_member_decodes_in_lenient_mode() {
        let decoded: Renamed = decode_payload(
            &envelope(json!({"secretName": "db"})),
            AdditionalMembers::Ignore,
        )
        .unwrap();
        assert_eq!(decoded.name, "db");
    }

    #[test]
    fn missing_member_is_a_payload_error() {
        let result: Result<SecretChanged, _> =
            decode_payload(&envelope(json!({"other": 1})), AdditionalMembers::Ignore);
        assert!(matches!(result, Err(DecodeError::Payload { .. })));
    }

    #[test]
    fn json_value_accepts_anything_strictly() {
        let data = json!({"anything": [1, {"goes": true}]});
        let decoded: JsonValue =
            decode_payload(&envelope(data.clone()), AdditionalMembers::Error).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn non_json_binary_payload_is_rejected() {
        let env = Envelope::new(EventId::from_string("E-1"), "t", "s")
            .with_binary_data("application/octet-stream", vec![0xff, 0xfe]);
        let result: Result<JsonValue, _> = decode_payload(&env, AdditionalMembers::Ignore);
        assert!(matches!(result, Err(DecodeError::Payload { .. })));
    }

    #[test]
    fn additional_members_parses_config_values() {
        assert_eq!("ignore".parse::<AdditionalMembers>(), Ok(AdditionalMembers::Ignore));
        assert_eq!(" Error ".parse::<AdditionalMembers>(), Ok(AdditionalMembers::Error));
        assert!("strict".parse::<AdditionalMembers>().is_err());
        assert_eq!(AdditionalMembers::default(), AdditionalMembers::Error);
    }
}
