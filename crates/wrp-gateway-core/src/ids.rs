//! Identifier types for wrp-gateway.
//!
//! Device IDs address a single device behind the downstream cluster.
//! Transaction IDs correlate one REST request with its WRP exchange.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Maximum accepted length of a device ID, in bytes.
const MAX_DEVICE_ID_LEN: usize = 256;

/// A validated device identifier taken from a request path.
///
/// Device IDs take the form `scheme:id` (for example `mac:112233445566`) or
/// an opaque token without a scheme. The scheme is lower-cased, and `mac`
/// IDs are normalized by dropping separators and lower-casing the hex
/// digits, so `mac:11:22:33:44:55:66` and `MAC:112233445566` name the same
/// device.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DeviceId(String);

impl DeviceId {
    /// Parse and normalize a device ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the ID is empty, too long, contains a URL
    /// delimiter (`/`, `?`, `#`, `%`), whitespace or control characters, or
    /// is a malformed
    /// `mac` ID.
    pub fn parse(s: &str) -> Result<Self, IdError> {
        if s.is_empty() {
            return Err(IdError::Empty);
        }
        if s.len() > MAX_DEVICE_ID_LEN {
            return Err(IdError::TooLong {
                max: MAX_DEVICE_ID_LEN,
                got: s.len(),
            });
        }
        if let Some(c) = s
            .chars()
            .find(|c| matches!(*c, '/' | '?' | '#' | '%') || c.is_whitespace() || c.is_control())
        {
            return Err(IdError::InvalidCharacter(c));
        }

        let Some((scheme, id)) = s.split_once(':') else {
            return Ok(Self(s.to_string()));
        };

        let scheme = scheme.to_ascii_lowercase();
        if scheme == "mac" {
            let digits: String = id
                .chars()
                .filter(|c| !matches!(c, ':' | '-' | '.' | ','))
                .collect();
            if digits.len() != 12 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(IdError::InvalidMac(id.to_string()));
            }
            return Ok(Self(format!("mac:{}", digits.to_ascii_lowercase())));
        }

        if id.is_empty() {
            return Err(IdError::Empty);
        }
        Ok(Self(format!("{scheme}:{id}")))
    }

    /// Return the normalized string form.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Return the scheme, if the ID carries one.
    #[must_use]
    pub fn scheme(&self) -> Option<&str> {
        self.0.split_once(':').map(|(scheme, _)| scheme)
    }
}

impl fmt::Debug for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DeviceId({})", self.0)
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for DeviceId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for DeviceId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<DeviceId> for String {
    fn from(id: DeviceId) -> Self {
        id.0
    }
}

/// A per-request transaction identifier (random UUID v4).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TransactionId(uuid::Uuid);

impl TransactionId {
    /// Create a new `TransactionId` from a UUID.
    #[must_use]
    pub const fn from_uuid(uuid: uuid::Uuid) -> Self {
        Self(uuid)
    }

    /// Generate a new random `TransactionId`.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// Return the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &uuid::Uuid {
        &self.0
    }
}

impl FromStr for TransactionId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let uuid = uuid::Uuid::parse_str(s).map_err(|_| IdError::InvalidUuid)?;
        Ok(Self(uuid))
    }
}

impl fmt::Debug for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TransactionId({})", self.0)
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for TransactionId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_str(&value)
    }
}

impl From<TransactionId> for String {
    fn from(id: TransactionId) -> Self {
        id.0.to_string()
    }
}

/// Errors that can occur when parsing identifiers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    /// The identifier is empty.
    #[error("identifier is empty")]
    Empty,

    /// The identifier exceeds the maximum length.
    #[error("identifier too long: max {max} bytes, got {got}")]
    TooLong {
        /// The maximum accepted length.
        max: usize,
        /// The actual length.
        got: usize,
    },

    /// The identifier contains a character that cannot appear in a path segment.
    #[error("invalid character {0:?}")]
    InvalidCharacter(char),

    /// A `mac` identifier is not 12 hexadecimal digits.
    #[error("invalid mac address: {0}")]
    InvalidMac(String),

    /// The input is not a valid UUID.
    #[error("invalid UUID format")]
    InvalidUuid,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opaque_device_id_kept_verbatim() {
        let id = DeviceId::parse("D").unwrap();
        assert_eq!(id.as_str(), "D");
        assert_eq!(id.scheme(), None);

        let id = DeviceId::parse("123").unwrap();
        assert_eq!(id.to_string(), "123");
    }

    #[test]
    fn mac_device_id_normalized() {
        let a = DeviceId::parse("mac:11:22:33:44:AA:BB").unwrap();
        let b = DeviceId::parse("MAC:112233-44aabb").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "mac:11223344aabb");
        assert_eq!(a.scheme(), Some("mac"));
    }

    #[test]
    fn other_schemes_lowercase_scheme_only() {
        let id = DeviceId::parse("Serial:ABC123").unwrap();
        assert_eq!(id.as_str(), "serial:ABC123");
    }

    #[test]
    fn rejects_malformed_device_ids() {
        assert_eq!(DeviceId::parse(""), Err(IdError::Empty));
        assert_eq!(DeviceId::parse("uuid:"), Err(IdError::Empty));
        assert_eq!(
            DeviceId::parse("mac:1122"),
            Err(IdError::InvalidMac("1122".to_string()))
        );
        assert_eq!(
            DeviceId::parse("mac:zz2233445566"),
            Err(IdError::InvalidMac("zz2233445566".to_string()))
        );
        assert_eq!(DeviceId::parse("a/b"), Err(IdError::InvalidCharacter('/')));
        assert_eq!(DeviceId::parse("a b"), Err(IdError::InvalidCharacter(' ')));
        assert_eq!(DeviceId::parse("abc?"), Err(IdError::InvalidCharacter('?')));
        assert_eq!(DeviceId::parse("abc#x"), Err(IdError::InvalidCharacter('#')));
        assert_eq!(DeviceId::parse("abc%3F"), Err(IdError::InvalidCharacter('%')));
        assert!(matches!(
            DeviceId::parse(&"x".repeat(300)),
            Err(IdError::TooLong { .. })
        ));
    }

    #[test]
    fn device_id_serde_json() {
        let json = serde_json::to_string(&DeviceId::parse("mac:112233445566").unwrap()).unwrap();
        assert_eq!(json, "\"mac:112233445566\"");

        let parsed: DeviceId = serde_json::from_str("\"MAC:11-22-33-44-55-66\"").unwrap();
        assert_eq!(parsed.as_str(), "mac:112233445566");

        assert!(serde_json::from_str::<DeviceId>("\"a/b\"").is_err());
    }

    #[test]
    fn transaction_id_roundtrip() {
        let id = TransactionId::generate();
        let parsed = TransactionId::from_str(&id.to_string()).unwrap();
        assert_eq!(id, parsed);
        assert_eq!(id.as_uuid().get_version_num(), 4);
    }

    #[test]
    fn transaction_ids_are_unique() {
        assert_ne!(TransactionId::generate(), TransactionId::generate());
    }

    #[test]
    fn transaction_id_invalid_uuid() {
        let result = TransactionId::from_str("not-a-uuid");
        assert!(matches!(result, Err(IdError::InvalidUuid)));
    }
}
