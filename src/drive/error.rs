use serde_json::Value;

/// Reasons Drive attaches to a 403 when the caller is being throttled rather
/// than refused.
const RATE_LIMIT_REASONS: [&str; 2] = ["rateLimitExceeded", "userRateLimitExceeded"];

const TRANSIENT_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

#[derive(Debug, thiserror::Error)]
pub enum DriveError {
    #[error("drive api returned {status}: {message}")]
    Api {
        status: u16,
        reason: Option<String>,
        message: String,
    },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("invalid response: {0}")]
    Invalid(String),

    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl DriveError {
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        DriveError::Api {
            status,
            reason: None,
            message: message.into(),
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            DriveError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether retrying the same call may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            DriveError::Api { status, reason, .. } => {
                TRANSIENT_STATUSES.contains(status)
                    || (*status == 403
                        && reason
                            .as_deref()
                            .is_some_and(|r| RATE_LIMIT_REASONS.contains(&r)))
            }
            DriveError::Transport(_) => true,
            DriveError::Invalid(_) | DriveError::Unexpected(_) => false,
        }
    }

    /// Build from a Google JSON error body:
    /// `{"error": {"code": 403, "message": "...", "errors": [{"reason": "..."}]}}`.
    pub fn from_error_body(body: &Value) -> Self {
        let error = &body["error"];
        let status = error["code"].as_u64().unwrap_or(0) as u16;
        let message = error["message"]
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| body.to_string());
        let reason = error["errors"][0]["reason"].as_str().map(str::to_string);
        DriveError::Api {
            status,
            reason,
            message,
        }
    }
}

impl From<google_drive3::Error> for DriveError {
    fn from(err: google_drive3::Error) -> Self {
        match err {
            google_drive3::Error::BadRequest(body) => DriveError::from_error_body(&body),
            google_drive3::Error::Failure(response) => {
                let status = response.status();
                DriveError::api(
                    status.as_u16(),
                    status.canonical_reason().unwrap_or("request failed"),
                )
            }
            google_drive3::Error::HttpError(e) => DriveError::Transport(e.to_string()),
            other => DriveError::Unexpected(other.to_string()),
        }
    }
}

// `google_sheets4::Error` is the same type as `google_drive3::Error` (both
// re-export `google_apis_common::Error`), so the impl above covers Sheets too.

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn classifies_statuses() {
        assert!(DriveError::api(429, "slow down").is_transient());
        assert!(DriveError::api(503, "unavailable").is_transient());
        assert!(!DriveError::api(404, "not found").is_transient());
        assert!(!DriveError::api(400, "bad").is_transient());
        assert!(DriveError::Transport("reset".into()).is_transient());
    }

    #[test]
    fn forbidden_is_transient_only_when_rate_limited() {
        let throttled = DriveError::from_error_body(&json!({
            "error": {
                "code": 403,
                "message": "User Rate Limit Exceeded",
                "errors": [{ "reason": "userRateLimitExceeded" }]
            }
        }));
        assert_eq!(throttled.status(), Some(403));
        assert!(throttled.is_transient());

        let refused = DriveError::from_error_body(&json!({
            "error": {
                "code": 403,
                "message": "The user does not have sufficient permissions",
                "errors": [{ "reason": "insufficientFilePermissions" }]
            }
        }));
        assert!(!refused.is_transient());
    }

    #[test]
    fn malformed_body_keeps_the_raw_text() {
        let err = DriveError::from_error_body(&json!({ "oops": true }));
        assert_eq!(err.status(), Some(0));
        assert!(err.to_string().contains("oops"));
    }
}
