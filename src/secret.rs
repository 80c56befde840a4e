//! Secret values and the wire shapes secret-producing tasks answer with
//!
//! A secret sub-task replies either with the plain form `{"id", "value"}` or,
//! when it runs behind a subprocess adapter, with a CGI envelope whose
//! base64 `Body` decodes to the plain form.

use std::collections::HashMap;
use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TaskError};
use crate::task::Task;

/// An identified sensitive value produced by a sub-task
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Secret {
    #[serde(default)]
    pub id: String,
    pub value: String,
}

impl Secret {
    pub fn new(id: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            value: value.into(),
        }
    }
}

// Never print the value, even in debug output.
impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Secret")
            .field("id", &self.id)
            .field("value", &"[redacted]")
            .finish()
    }
}

/// Response shape of handlers implemented as subprocess (CGI) adapters
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CgiEnvelope {
    #[serde(rename = "StatusCode")]
    pub status_code: i64,
    /// Standard base64 of the subprocess response body
    #[serde(rename = "Body", default)]
    pub body: String,
    #[serde(rename = "Headers", default)]
    pub headers: HashMap<String, Vec<String>>,
}

impl CgiEnvelope {
    /// Wrap a raw body the way a CGI adapter would
    pub fn new(status_code: i64, body: &[u8]) -> Self {
        Self {
            status_code,
            body: STANDARD.encode(body),
            headers: HashMap::new(),
        }
    }

    /// Check the status and return the decoded body
    pub fn into_body(self) -> Result<Vec<u8>> {
        if self.status_code > 299 {
            return Err(TaskError::Status {
                code: self.status_code,
            });
        }
        Ok(STANDARD.decode(self.body.as_bytes())?)
    }
}

/// Either body shape a secret sub-task may answer with
#[derive(Deserialize)]
#[serde(untagged)]
enum SecretBody {
    Envelope(CgiEnvelope),
    Plain(Secret),
}

/// Interpret a sub-task response body as a secret.
///
/// CGI-driven tasks must answer with an envelope. Other tasks may answer with
/// either shape; an envelope is recognised by its `StatusCode` and its status
/// is always checked. The sub-task ID is authoritative: whatever `id` the
/// handler reported is replaced by `task.id`.
pub fn decode_secret(task: &Task, body: &[u8]) -> Result<Secret> {
    let parsed = if task.is_cgi() {
        SecretBody::Envelope(serde_json::from_slice(body)?)
    } else {
        serde_json::from_slice(body)?
    };

    let mut secret: Secret = match parsed {
        SecretBody::Envelope(envelope) => serde_json::from_slice(&envelope.into_body()?)?,
        SecretBody::Plain(secret) => secret,
    };
    secret.id = task.id.clone();
    Ok(secret)
}
