use serde_json::Value;
use std::fmt;

/// Errors that might occur when using the library.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Attempted to send a message with no body, attachments, sticker, or link.
    #[error("message is empty (no body, attachments, sticker, or url)")]
    EmptyMessage,

    /// Attempted to post a comment with no text.
    #[error("comment is empty")]
    EmptyComment,

    /// Attempted to start a group thread with no members.
    #[error("group destination has no members")]
    EmptyGroup,

    /// Attempted to send an [`Attachment`][`crate::Attachment`] whose stream was consumed by an
    /// earlier failed upload.
    #[error("attempted to use message with failed attachment")]
    FailedAttachment,

    /// The session is no longer logged in.
    #[error("not logged in")]
    NotLoggedIn,

    /// The service answered with an error payload.
    #[error("{0}")]
    Service(ServiceError),

    /// The link preview endpoint did not produce preview parameters for the URL.
    #[error("invalid url")]
    InvalidUrl,

    /// The service returned an empty body for a message or comment submission.
    #[error("send failed (empty response)")]
    SendFailed,

    /// The message or comment was created, but the response did not describe it in the expected
    /// shape.
    #[error("submission succeeded but its result could not be parsed")]
    ResultParse,

    /// A response was missing something the library needs to continue.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(&'static str),

    /// An error while decoding a JSON response body.
    #[error("json decode error: {0}")]
    Json(#[from] serde_json::Error),

    /// An invalid base URL.
    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    /// An I/O error.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// An HTTP client error (including status codes indicating failure).
    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),
}

impl Error {
    /// Returns true if the service performed the requested change even though this call failed.
    #[must_use]
    pub fn is_partial_success(&self) -> bool {
        matches!(self, Error::ResultParse)
    }

    /// The service error code, if this is a service error.
    #[must_use]
    pub fn service_code(&self) -> Option<i64> {
        match self {
            Error::Service(error) => error.code,
            _ => None,
        }
    }
}

/// An error payload returned by the service, such as `{"error": 1545012, "errorSummary": ...}`.
#[derive(Debug, Clone)]
pub struct ServiceError {
    /// Numeric error code, if the payload carried one.
    pub code: Option<i64>,
    /// Short human-readable summary.
    pub summary: Option<String>,
    /// Longer description.
    pub description: Option<String>,
    /// The complete response the error was found in.
    pub payload: Value,
}

impl ServiceError {
    /// Returns the error carried by `payload`, if its `error` field is set to anything truthy.
    pub(crate) fn from_payload(payload: &Value) -> Option<ServiceError> {
        let error = payload.get("error")?;
        let code = match error {
            Value::Null | Value::Bool(false) => return None,
            Value::String(s) if s.is_empty() => return None,
            Value::Number(n) => match n.as_i64() {
                Some(0) => return None,
                code => code,
            },
            Value::String(s) => s.parse().ok(),
            _ => None,
        };
        let text = |key: &str| payload.get(key).and_then(Value::as_str).map(str::to_owned);
        Some(ServiceError {
            code,
            summary: text("errorSummary").or_else(|| error.as_str().map(str::to_owned)),
            description: text("errorDescription"),
            payload: payload.clone(),
        })
    }
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "service error")?;
        if let Some(code) = self.code {
            write!(f, " {code}")?;
        }
        if let Some(summary) = &self.summary {
            write!(f, ": {summary}")?;
        }
        if let Some(description) = &self.description {
            write!(f, " ({description})")?;
        }
        Ok(())
    }
}

impl std::error::Error for ServiceError {}
