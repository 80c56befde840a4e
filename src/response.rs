//! Handler responses

use serde::Serialize;

use crate::error::TaskError;

/// The result of handling one task: an optional body and an optional error.
///
/// A failed response may still carry a descriptive body.
#[derive(Debug, Default)]
pub struct Response {
    body: Option<Vec<u8>>,
    error: Option<TaskError>,
}

impl Response {
    /// Respond with a JSON-encoded value. Encoding failures become error responses.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Self {
        match serde_json::to_vec(value) {
            Ok(body) => Self::bytes(body),
            Err(err) => Self::error(err),
        }
    }

    pub fn text(body: impl Into<String>) -> Self {
        Self::bytes(body.into().into_bytes())
    }

    pub fn bytes(body: impl Into<Vec<u8>>) -> Self {
        Self {
            body: Some(body.into()),
            error: None,
        }
    }

    /// A successful response with no body
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn error(err: impl Into<TaskError>) -> Self {
        Self {
            body: None,
            error: Some(err.into()),
        }
    }

    /// A failed response that still describes what happened
    pub fn failure_with_body(err: impl Into<TaskError>, body: impl Into<Vec<u8>>) -> Self {
        Self {
            body: Some(body.into()),
            error: Some(err.into()),
        }
    }

    pub fn body(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }

    pub fn error_ref(&self) -> Option<&TaskError> {
        self.error.as_ref()
    }

    pub fn is_err(&self) -> bool {
        self.error.is_some()
    }

    pub fn into_parts(self) -> (Option<Vec<u8>>, Option<TaskError>) {
        (self.body, self.error)
    }

    /// Collapse into a `Result`, dropping the body of failed responses
    pub fn into_result(self) -> Result<Option<Vec<u8>>, TaskError> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.body),
        }
    }
}

/// Shorthand for a handler failure with a formatted message
#[macro_export]
macro_rules! errorf {
    ($($arg:tt)*) => {
        $crate::response::Response::error($crate::error::TaskError::Handler(format!($($arg)*)))
    };
}
