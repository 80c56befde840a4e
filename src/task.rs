//! Task definitions
//!
//! A [`Task`] is the unit of work the control plane hands to the agent. Its
//! `data` and `config` are opaque JSON kept byte-for-byte as received; only the
//! router rewrites `data`, after expression resolution.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::value::RawValue;

use crate::error::Result;

/// Driver name whose handlers answer with a CGI envelope
pub const CGI_DRIVER: &str = "cgi";

/// A unit of work: typed, with an opaque payload
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Task {
    /// Unique task identifier
    #[serde(default)]
    pub id: String,

    /// Task type, selects the handler
    #[serde(default, rename = "type")]
    pub kind: String,

    /// Task execution data
    #[serde(default)]
    pub data: Payload,

    /// Execution driver hint (informational to the router)
    #[serde(default)]
    pub driver: String,

    /// Execution driver configuration
    #[serde(default)]
    pub config: Payload,

    /// Instructions for forwarding the task to another runner node
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forward: Option<Forward>,

    /// Instructions on where to ship task output
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logger: Option<Logger>,
}

impl Task {
    pub fn new(id: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            ..Default::default()
        }
    }

    pub fn with_data(mut self, data: impl Into<Payload>) -> Self {
        self.data = data.into();
        self
    }

    pub fn with_driver(mut self, driver: impl Into<String>) -> Self {
        self.driver = driver.into();
        self
    }

    /// True when the task runs through a subprocess adapter that wraps its
    /// output in a `{StatusCode, Body, Headers}` envelope.
    pub fn is_cgi(&self) -> bool {
        self.driver.eq_ignore_ascii_case(CGI_DRIVER)
    }
}

/// Instructions for forwarding a task to another runner node
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Forward {
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub insecure: bool,
    #[serde(default)]
    pub certs: Certs,
}

/// Where to ship the output of a task execution
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Logger {
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub insecure: bool,
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub account: String,
}

/// TLS material, PEM encoded
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Certs {
    #[serde(default)]
    pub public: String,
    #[serde(default)]
    pub private: String,
    #[serde(default)]
    pub ca: String,
}

// ═══════════════════════════════════════════════════════════════
// PAYLOAD
// ═══════════════════════════════════════════════════════════════

/// Opaque JSON bytes.
///
/// Serialized as embedded raw JSON, so a request file round-trips without
/// reformatting the payload. An empty payload encodes as `null`.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Payload(Vec<u8>);

impl Payload {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Decode the payload into a typed value
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.0)?)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Payload({})", String::from_utf8_lossy(&self.0))
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl From<&[u8]> for Payload {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

impl From<&str> for Payload {
    fn from(s: &str) -> Self {
        Self(s.as_bytes().to_vec())
    }
}

impl From<String> for Payload {
    fn from(s: String) -> Self {
        Self(s.into_bytes())
    }
}

impl From<serde_json::Value> for Payload {
    fn from(value: serde_json::Value) -> Self {
        Self(value.to_string().into_bytes())
    }
}

impl Serialize for Payload {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        if self.0.is_empty() {
            return serializer.serialize_none();
        }
        let raw: &RawValue = serde_json::from_slice(&self.0).map_err(serde::ser::Error::custom)?;
        raw.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Payload {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw: Option<Box<RawValue>> = Option::deserialize(deserializer)?;
        Ok(Self(
            raw.map(|r| r.get().as_bytes().to_vec()).unwrap_or_default(),
        ))
    }
}
