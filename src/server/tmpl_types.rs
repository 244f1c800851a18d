// Wire types for the /tmpl control endpoint
//
// Shared by the control server and the `worker tmpl` command.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Request body for POST /tmpl
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TmplRequest {
    /// File to read the template from
    pub path: String,
    /// File to write the substituted result to
    pub destination: String,
}

impl TmplRequest {
    pub fn new(path: impl Into<String>, destination: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            destination: destination.into(),
        }
    }

    /// Name of the first empty field, if any
    pub fn missing_field(&self) -> Option<&'static str> {
        if self.path.is_empty() {
            Some("path")
        } else if self.destination.is_empty() {
            Some("destination")
        } else {
            None
        }
    }
}

/// Machine-readable error classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Caused by the request or the files it names
    WrongRequest,
    /// Caused by the worker itself
    InternalError,
    /// Sent by a daemon newer than this command
    #[serde(other)]
    Unknown,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::WrongRequest => "wrong request",
            ErrorKind::InternalError => "internal error",
            ErrorKind::Unknown => "unknown error",
        };
        f.write_str(s)
    }
}

/// Structured error returned with any status >= 300
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireError {
    pub kind: ErrorKind,
    pub message: String,
    /// Which step of the handler failed (read_body, decode, source_read, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
}

impl fmt::Display for WireError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// Envelope for error responses
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: WireError,
}
