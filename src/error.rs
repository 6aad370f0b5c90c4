//! Error taxonomy for calls made against the KYC backend.

/// Message shown when a case transition is rejected without an explanation.
pub const CASE_VALIDATION_FAILED: &str =
    "Case validation failed. Ensure all mandatory requirements are met.";

/// Errors produced by the API client and the service wrappers.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// The request never produced an HTTP response.
    #[error("network error calling {endpoint}: {message}")]
    Transport {
        /// Path of the endpoint that was called.
        endpoint: String,
        /// Description of the underlying failure.
        message: String,
    },

    /// The backend rejected the credentials (401) or the caller's role (403).
    #[error("{message}")]
    Unauthorized {
        /// HTTP status code, 401 or 403.
        status: u16,
        /// Normalized backend message.
        message: String,
    },

    /// Any other 4xx response.
    #[error("{message}")]
    Client {
        /// HTTP status code.
        status: u16,
        /// Normalized backend message.
        message: String,
    },

    /// A 5xx response.
    #[error("{message}")]
    Server {
        /// HTTP status code.
        status: u16,
        /// Normalized backend message.
        message: String,
    },

    /// The response body did not have the expected shape.
    #[error("unexpected response from {endpoint}: {message}")]
    Decode {
        /// Path of the endpoint that was called.
        endpoint: String,
        /// Decoder error.
        message: String,
    },

    /// Input was rejected before any request was sent.
    #[error("{0}")]
    Validation(String),
}

impl ApiError {
    /// Classifies a non-success status together with its normalized message.
    #[must_use]
    pub fn from_status(status: u16, message: String) -> Self {
        match status {
            401 | 403 => Self::Unauthorized { status, message },
            400..=499 => Self::Client { status, message },
            _ => Self::Server { status, message },
        }
    }

    /// The HTTP status carried by the error, if the backend answered at all.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Unauthorized { status, .. }
            | Self::Client { status, .. }
            | Self::Server { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// True for every 4xx response, including authorization failures.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        self.status().is_some_and(|s| (400..500).contains(&s))
    }

    /// True when the backend refused the current token.
    #[must_use]
    pub const fn is_auth_failure(&self) -> bool {
        matches!(self, Self::Unauthorized { .. })
    }
}

/// Builds the user-facing message for a failed response.
///
/// A JSON body yields its `message`, else its `error` prefixed with the
/// body's `status`, else `API Error <status>`. A body that is not JSON is used
/// verbatim. An empty body falls back to the status alone.
#[must_use]
pub fn error_message(status: u16, body: &str) -> String {
    let fallback = format!("API Error {status}");
    let Ok(json) = serde_json::from_str::<serde_json::Value>(body) else {
        let trimmed = body.trim();
        return if trimmed.is_empty() {
            fallback
        } else {
            trimmed.to_string()
        };
    };

    if let Some(message) = json.get("message").and_then(non_empty_str) {
        return message.to_string();
    }
    if let Some(error) = json.get("error").and_then(non_empty_str) {
        let reported = match json.get("status") {
            Some(serde_json::Value::Number(n)) => n.to_string(),
            Some(serde_json::Value::String(s)) if !s.is_empty() => s.clone(),
            _ => status.to_string(),
        };
        return format!("{reported} {error}");
    }
    fallback
}

fn non_empty_str(value: &serde_json::Value) -> Option<&str> {
    value.as_str().filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test_case(400, r#"{"message":"Task missing"}"#, "Task missing"; "json message wins")]
    #[test_case(404, r#"{"error":"Not Found","status":404}"#, "404 Not Found"; "json error with status")]
    #[test_case(500, "boom", "boom"; "plain text body")]
    #[test_case(502, "", "API Error 502"; "empty body")]
    #[test_case(400, r#"{"message":"","error":"Bad Request"}"#, "400 Bad Request"; "empty message falls through")]
    #[test_case(502, r#"{"error":"Bad Gateway","status":503}"#, "503 Bad Gateway"; "body status wins over http status")]
    #[test_case(500, r#"{"timestamp":"2024-01-01T00:00:00","path":"/api/x"}"#, "API Error 500"; "json without message or error")]
    #[test_case(500, "[1,2]", "API Error 500"; "json array")]
    fn normalizes_error_bodies(status: u16, body: &str, expected: &str) {
        assert_eq!(error_message(status, body), expected);
    }

    #[test]
    fn classifies_statuses() {
        assert!(ApiError::from_status(401, String::new()).is_auth_failure());
        assert!(ApiError::from_status(403, String::new()).is_auth_failure());
        assert!(matches!(
            ApiError::from_status(409, String::new()),
            ApiError::Client { status: 409, .. }
        ));
        assert!(matches!(
            ApiError::from_status(503, String::new()),
            ApiError::Server { status: 503, .. }
        ));
        assert!(ApiError::from_status(403, String::new()).is_client_error());
        assert!(!ApiError::Validation("x".into()).is_client_error());
    }
}
