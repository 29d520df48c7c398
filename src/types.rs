//! Types for the persistence adapter API

use serde::{Deserialize, Serialize};
use std::fmt;

/// Message code used when a save fails without a server-supplied message
pub const SAVE_COULD_NOT_BE_COMPLETED: &str = "SAVE_COULD_NOT_BE_COMPLETED";

/// Message code used when the server rejects a save because the session ended
pub const SESSION_EXPIRED: &str = "SESSION_EXPIRED";

/// Adapter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    /// Base URL that relative document templates are resolved against
    pub origin: String,
    /// Document URL template with a single `{id}` placeholder
    pub document_url: String,
    /// HTTP request timeout in seconds (default: 30)
    pub timeout_secs: u64,
    /// Delay after which a stuck save releases the guard (default: 10000)
    pub save_guard_timeout_ms: u64,
    /// Cookie holding the CSRF token
    pub xsrf_cookie: String,
    /// Header the CSRF token is sent in
    pub xsrf_header: String,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            origin: "http://localhost:8080".to_string(),
            document_url: "/quentin/api/file/{id}".to_string(),
            timeout_secs: 30,
            save_guard_timeout_ms: 10_000,
            xsrf_cookie: "XSRF-TOKEN".to_string(),
            xsrf_header: "X-XSRF-TOKEN".to_string(),
        }
    }
}

/// JSON wrapper carrying a serialized map on the wire
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentEnvelope {
    /// Serialized XML text of the map
    pub blob: String,
}

/// Error payload the backend returns for rejected saves
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerErrorBody {
    pub global_severity: Option<String>,
    /// First entry of `globalErrors`
    pub first_error: Option<String>,
}

impl ServerErrorBody {
    /// Parse a response body, accepting only objects that carry at least one
    /// of the global error fields. Fields of an unexpected type count as absent.
    pub fn recognize(body: &str) -> Option<Self> {
        let value: serde_json::Value = serde_json::from_str(body).ok()?;
        let object = value.as_object()?;
        if !object.contains_key("globalSeverity") && !object.contains_key("globalErrors") {
            return None;
        }

        let non_empty = |v: &serde_json::Value| {
            v.as_str().filter(|s| !s.is_empty()).map(str::to_string)
        };
        Some(Self {
            global_severity: object.get("globalSeverity").and_then(non_empty),
            first_error: object
                .get("globalErrors")
                .and_then(|errors| errors.as_array())
                .and_then(|errors| errors.first())
                .and_then(non_empty),
        })
    }
}

/// Severity attached to a user-facing error
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Severity {
    Severe,
    Warn,
    Info,
    /// Any other level reported by the server
    Other(String),
}

impl From<String> for Severity {
    fn from(value: String) -> Self {
        match value.as_str() {
            "SEVERE" => Severity::Severe,
            "WARN" => Severity::Warn,
            "INFO" => Severity::Info,
            _ => Severity::Other(value),
        }
    }
}

impl From<Severity> for String {
    fn from(value: Severity) -> Self {
        value.to_string()
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Severe => f.write_str("SEVERE"),
            Severity::Warn => f.write_str("WARN"),
            Severity::Info => f.write_str("INFO"),
            Severity::Other(level) => f.write_str(level),
        }
    }
}

/// Category of a locally classified error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorType {
    SessionExpired,
    Generic,
}

/// Error surfaced to the editor when a save fails
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserError {
    pub severity: Severity,
    /// Message code for the editor to translate
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<ErrorType>,
}

impl UserError {
    /// The session ended server side (HTTP 405)
    pub fn session_expired() -> Self {
        Self {
            severity: Severity::Severe,
            message: SESSION_EXPIRED.to_string(),
            error_type: Some(ErrorType::SessionExpired),
        }
    }

    /// The request never produced an HTTP response
    pub fn transport() -> Self {
        Self {
            severity: Severity::Severe,
            message: SAVE_COULD_NOT_BE_COMPLETED.to_string(),
            error_type: Some(ErrorType::Generic),
        }
    }

    /// Build from a server payload, filling absent parts with defaults
    pub fn from_server(body: ServerErrorBody) -> Self {
        let message = body
            .first_error
            .unwrap_or_else(|| SAVE_COULD_NOT_BE_COMPLETED.to_string());
        let severity = body
            .global_severity
            .map(Severity::from)
            .unwrap_or(Severity::Info);

        Self {
            severity,
            message,
            error_type: None,
        }
    }
}

impl fmt::Display for UserError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.severity, self.message)
    }
}
