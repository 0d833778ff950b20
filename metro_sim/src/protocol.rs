//! Text datagram protocol spoken by the PLC and RTU clients.
//!
//! Requests are `VERB;KEY;JSON`, replies `REP;KEY;JSON`. Only the first two
//! separators count: the JSON field may itself contain `;`.

use serde_json::Value;
use thiserror::Error;

/// Reply sent for anything that cannot be routed.
pub const DENY: &[u8] = b"REP;deny;{}";

/// Protocol-level failures. None of these reach the socket loop: they are
/// logged and answered with `DENY` or a `{"result":"failed"}` payload.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProtocolError {
    /// Not valid UTF-8 or not three `;`-separated fields
    #[error("Malformed request: {0}")]
    Malformed(String),

    /// Verb/key combination the bridge does not serve
    #[error("Unknown resource: {verb};{key}")]
    UnknownResource { verb: String, key: String },

    /// JSON field did not decode into what the resource expects
    #[error("Bad payload for {key}: {reason}")]
    Payload { key: String, reason: String },
}

impl ProtocolError {
    /// Creates a payload error.
    pub fn payload(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Payload {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

/// Request verb.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Get,
    Post,
}

/// Everything the bridge serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Login,
    Sensors,
    BlockSensors,
    Stations,
    TrainsPlc,
    TrainsRtu,
    Signals,
    BlockSignals,
}

impl Resource {
    /// Wire key.
    pub fn key(&self) -> &'static str {
        match self {
            Resource::Login => "login",
            Resource::Sensors => "sensors",
            Resource::BlockSensors => "blockSensors",
            Resource::Stations => "stations",
            Resource::TrainsPlc => "trainsPlc",
            Resource::TrainsRtu => "trainsRtu",
            Resource::Signals => "signals",
            Resource::BlockSignals => "blockSignals",
        }
    }

    /// Resolves a verb/key pair. Keys are case-sensitive.
    pub fn route(verb: Verb, key: &str) -> Option<Resource> {
        let resource = match (verb, key) {
            (Verb::Get, "login") => Resource::Login,
            (Verb::Get, "sensors") => Resource::Sensors,
            (Verb::Get, "blockSensors") => Resource::BlockSensors,
            (Verb::Get, "stations") | (Verb::Post, "stations") => Resource::Stations,
            (Verb::Get, "trainsPlc") | (Verb::Post, "trainsPlc") => Resource::TrainsPlc,
            (Verb::Get, "trainsRtu") => Resource::TrainsRtu,
            (Verb::Post, "signals") => Resource::Signals,
            (Verb::Post, "blockSignals") => Resource::BlockSignals,
            _ => return None,
        };
        Some(resource)
    }
}

/// A routed request.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub verb: Verb,
    pub resource: Resource,
    /// Raw JSON field, decoded by the handler
    pub payload: String,
}

impl Request {
    /// Parses and routes one datagram.
    pub fn parse(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| ProtocolError::Malformed(format!("not UTF-8: {}", e)))?;

        let mut fields = text.splitn(3, ';');
        let (verb, key, payload) = match (fields.next(), fields.next(), fields.next()) {
            (Some(verb), Some(key), Some(payload)) => (verb.trim(), key.trim(), payload),
            _ => {
                return Err(ProtocolError::Malformed(format!(
                    "expected VERB;KEY;JSON, got {:?}",
                    text
                )))
            }
        };

        let unknown = || ProtocolError::UnknownResource {
            verb: verb.to_string(),
            key: key.to_string(),
        };
        let verb = match verb {
            "GET" => Verb::Get,
            "POST" => Verb::Post,
            _ => return Err(unknown()),
        };
        let resource = Resource::route(verb, key).ok_or_else(unknown)?;

        Ok(Self {
            verb,
            resource,
            payload: payload.to_string(),
        })
    }
}

/// Encodes `REP;KEY;JSON`.
pub fn reply(resource: Resource, body: &Value) -> Vec<u8> {
    format!("REP;{};{}", resource.key(), body).into_bytes()
}

/// `{"result": "success"}` or `{"result": "failed"}`.
pub fn outcome(success: bool) -> Value {
    let result = if success { "success" } else { "failed" };
    serde_json::json!({ "result": result })
}

/// Reads a wire value as a boolean the way the PLC ladder does: `true`/`false`,
/// or any number where non-zero is on. `null` reads as off.
pub fn truthy(key: &str, value: &Value) -> Result<bool, ProtocolError> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::Null => Ok(false),
        Value::Number(n) => Ok(n.as_f64().is_some_and(|f| f != 0.0)),
        other => Err(ProtocolError::payload(
            key,
            format!("expected a 0/1 state, got {}", other),
        )),
    }
}

/// Decodes a JSON list of states.
pub fn truthy_list(key: &str, value: &Value) -> Result<Vec<bool>, ProtocolError> {
    match value {
        Value::Array(items) => items.iter().map(|v| truthy(key, v)).collect(),
        other => Err(ProtocolError::payload(
            key,
            format!("expected a list, got {}", other),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn test_parse_splits_on_first_two_separators() {
        let req = Request::parse(b" GET ; sensors ;{\"weline\":\"a;b\"}").unwrap();
        assert_eq!(req.verb, Verb::Get);
        assert_eq!(req.resource, Resource::Sensors);
        assert_eq!(req.payload, "{\"weline\":\"a;b\"}");
    }

    #[test]
    fn test_parse_rejects_bad_shapes() {
        assert!(matches!(
            Request::parse(b"GET;sensors"),
            Err(ProtocolError::Malformed(_))
        ));
        assert!(matches!(
            Request::parse(&[0x47, 0xff, 0x3b, 0x3b]),
            Err(ProtocolError::Malformed(_))
        ));
        assert!(matches!(
            Request::parse(b"PUT;sensors;{}"),
            Err(ProtocolError::UnknownResource { .. })
        ));
        // Signals are write-only
        assert!(matches!(
            Request::parse(b"GET;signals;{}"),
            Err(ProtocolError::UnknownResource { .. })
        ));
        assert!(Request::parse(b"get;sensors;{}").is_err());
    }

    #[test]
    fn test_route_covers_every_resource() {
        assert_eq!(Resource::route(Verb::Post, "stations"), Some(Resource::Stations));
        assert_eq!(Resource::route(Verb::Post, "blockSensors"), None);
        assert_eq!(Resource::route(Verb::Get, "trainsRtu"), Some(Resource::TrainsRtu));
        assert_eq!(Resource::BlockSignals.key(), "blockSignals");
    }

    #[test]
    fn test_reply_encoding() {
        assert_eq!(
            reply(Resource::Login, &json!({"state": "ready"})),
            b"REP;login;{\"state\":\"ready\"}".to_vec()
        );
        assert_eq!(outcome(false), json!({"result": "failed"}));
    }

    #[test]
    fn test_truthy_values() {
        assert_eq!(
            truthy_list("weline", &json!([1, 0, true, false, null, 2.5])).unwrap(),
            vec![true, false, true, false, false, true]
        );
        assert!(truthy_list("weline", &json!("on")).is_err());
        assert!(truthy_list("weline", &json!([[1]])).is_err());
    }

    proptest! {
        #[test]
        fn prop_parse_never_panics(bytes in proptest::collection::vec(any::<u8>(), 0..64)) {
            let _ = Request::parse(&bytes);
        }

        #[test]
        fn prop_payload_passes_through_untouched(payload in "[ -~]{0,40}") {
            let line = format!("POST;signals;{}", payload);
            let request = Request::parse(line.as_bytes()).unwrap();
            prop_assert_eq!(request.resource, Resource::Signals);
            prop_assert_eq!(request.payload, payload);
        }
    }
}
