//! WRP (Web Routing Protocol) envelope.
//!
//! The gateway speaks the JSON encoding of WRP to the device-communication
//! cluster. Byte payloads are carried as standard base64 strings.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::ids::{DeviceId, TransactionId};

/// Content type of a JSON-encoded WRP message.
pub const WRP_JSON_CONTENT_TYPE: &str = "application/json";

/// Default content type for a payload when the REST request declared none.
pub const DEFAULT_PAYLOAD_CONTENT_TYPE: &str = "application/json";

/// WRP message types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum MessageType {
    /// Authorization status.
    Authorization,
    /// Request that expects exactly one response.
    SimpleRequestResponse,
    /// Fire-and-forget event.
    SimpleEvent,
    /// CRUD create.
    Create,
    /// CRUD retrieve.
    Retrieve,
    /// CRUD update.
    Update,
    /// CRUD delete.
    Delete,
    /// Service registration.
    ServiceRegistration,
    /// Service keep-alive.
    ServiceAlive,
    /// Unknown message.
    Unknown,
}

impl From<MessageType> for u8 {
    fn from(t: MessageType) -> Self {
        match t {
            MessageType::Authorization => 2,
            MessageType::SimpleRequestResponse => 3,
            MessageType::SimpleEvent => 4,
            MessageType::Create => 5,
            MessageType::Retrieve => 6,
            MessageType::Update => 7,
            MessageType::Delete => 8,
            MessageType::ServiceRegistration => 9,
            MessageType::ServiceAlive => 10,
            MessageType::Unknown => 11,
        }
    }
}

impl TryFrom<u8> for MessageType {
    type Error = String;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        Ok(match value {
            2 => Self::Authorization,
            3 => Self::SimpleRequestResponse,
            4 => Self::SimpleEvent,
            5 => Self::Create,
            6 => Self::Retrieve,
            7 => Self::Update,
            8 => Self::Delete,
            9 => Self::ServiceRegistration,
            10 => Self::ServiceAlive,
            11 => Self::Unknown,
            other => return Err(format!("unknown wrp message type {other}")),
        })
    }
}

/// A WRP message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Message type.
    pub msg_type: MessageType,
    /// Originating locator.
    pub source: String,
    /// Destination locator (`{device}/{service}`).
    pub dest: String,
    /// Correlation ID.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_uuid: Option<String>,
    /// Content type of `payload`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    /// Free-form header strings.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub headers: Vec<String>,
    /// Key/value metadata.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
    /// Opaque payload bytes.
    #[serde(default, with = "base64_bytes", skip_serializing_if = "Vec::is_empty")]
    pub payload: Vec<u8>,
    /// Response status, set in the device-to-gateway direction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<i64>,
}

impl Message {
    /// Build a simple request/response message addressed to `service` on `device`.
    #[must_use]
    pub fn simple_request(
        source: impl Into<String>,
        device: &DeviceId,
        service: &str,
        transaction_id: TransactionId,
    ) -> Self {
        Self {
            msg_type: MessageType::SimpleRequestResponse,
            source: source.into(),
            dest: destination(device, service),
            transaction_uuid: Some(transaction_id.to_string()),
            content_type: None,
            headers: Vec::new(),
            metadata: BTreeMap::new(),
            payload: Vec::new(),
            status: None,
        }
    }

    /// Set the payload and its content type.
    #[must_use]
    pub fn with_payload(mut self, content_type: impl Into<String>, payload: Vec<u8>) -> Self {
        self.content_type = Some(content_type.into());
        self.payload = payload;
        self
    }

    /// Attach a metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Encode as JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| CoreError::Encoding(e.to_string()))
    }

    /// Decode from JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not a valid JSON WRP message.
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| CoreError::Encoding(e.to_string()))
    }
}

/// Build the WRP destination locator for a device service.
#[must_use]
pub fn destination(device: &DeviceId, service: &str) -> String {
    format!("{device}/{service}")
}

mod base64_bytes {
    use base64::prelude::*;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&BASE64_STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        BASE64_STANDARD
            .decode(encoded)
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(s: &str) -> DeviceId {
        DeviceId::parse(s).unwrap()
    }

    #[test]
    fn destination_is_device_slash_service() {
        assert_eq!(destination(&device("D"), "config"), "D/config");
        assert_eq!(
            destination(&device("mac:11-22-33-44-55-66"), "stat"),
            "mac:112233445566/stat"
        );
    }

    #[test]
    fn simple_request_fields() {
        let tid = TransactionId::generate();
        let msg = Message::simple_request("dns:localhost", &device("D"), "config", tid)
            .with_payload("application/json", b"{\"a\":1}".to_vec())
            .with_metadata("method", "PUT");

        assert_eq!(msg.msg_type, MessageType::SimpleRequestResponse);
        assert_eq!(msg.source, "dns:localhost");
        assert_eq!(msg.dest, "D/config");
        assert_eq!(msg.transaction_uuid, Some(tid.to_string()));
        assert_eq!(msg.content_type.as_deref(), Some("application/json"));
        assert_eq!(msg.metadata.get("method").map(String::as_str), Some("PUT"));
    }

    #[test]
    fn json_encoding_uses_numeric_type_and_base64_payload() {
        let msg = Message::simple_request(
            "dns:localhost",
            &device("D"),
            "config",
            TransactionId::generate(),
        )
        .with_payload("text/plain", b"hi".to_vec());

        let value: serde_json::Value = serde_json::from_slice(&msg.to_json().unwrap()).unwrap();
        assert_eq!(value["msg_type"], 3);
        assert_eq!(value["payload"], "aGk=");
        assert!(value.get("status").is_none());
        assert!(value.get("headers").is_none());
    }

    #[test]
    fn decodes_response_message() {
        let raw = br#"{"msg_type":3,"source":"D/config","dest":"dns:localhost","status":200,"payload":"e30="}"#;
        let msg = Message::from_json(raw).unwrap();
        assert_eq!(msg.status, Some(200));
        assert_eq!(msg.payload, b"{}");
        assert!(msg.transaction_uuid.is_none());
    }

    #[test]
    fn rejects_unknown_message_type() {
        let raw = br#"{"msg_type":42,"source":"a","dest":"b"}"#;
        assert!(Message::from_json(raw).is_err());
    }
}
