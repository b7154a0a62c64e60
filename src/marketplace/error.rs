//! Marketplace order failures
//!
//! Classifies OpenSea and LooksRare error responses into structured
//! variants so the executor can report them per asset.

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum OrderError {
    /// Offerer lacks WETH balance or approval
    #[error("insufficient WETH balance or approval")]
    InsufficientFunds,

    #[error("rate limited by marketplace")]
    RateLimited,

    /// API key or order signature rejected
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("order rejected: {0}")]
    Rejected(String),

    #[error("network error: {0}")]
    NetworkError(String),

    /// Could not assemble or sign the order locally
    #[error("failed to build order: {0}")]
    Build(String),

    #[error("marketplace error {status}: {body}")]
    Unknown { status: u16, body: String },
}

/// Error payload shapes used by both marketplaces
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    #[serde(default)]
    errors: Option<Value>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

fn error_message(body: &str) -> String {
    let Ok(parsed) = serde_json::from_str::<ErrorResponse>(body) else {
        return body.to_string();
    };

    let from_errors = parsed.errors.and_then(|errors| match errors {
        Value::Array(list) => list.first().map(|e| match e {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }),
        Value::String(s) => Some(s),
        _ => None,
    });

    from_errors
        .or(parsed.message)
        .or(parsed.error)
        .or(parsed.name)
        .unwrap_or_else(|| body.to_string())
}

impl OrderError {
    /// Classify a failed HTTP response
    pub fn from_response(status: u16, body: &str) -> Self {
        let error_msg = error_message(body);
        let msg_lower = error_msg.to_lowercase();

        if status == 429 || msg_lower.contains("rate limit") || msg_lower.contains("too many requests") {
            return OrderError::RateLimited;
        }

        if status == 401
            || status == 403
            || msg_lower.contains("unauthorized")
            || msg_lower.contains("invalid api key")
            || msg_lower.contains("signature")
        {
            return OrderError::AuthenticationFailed(error_msg);
        }

        if msg_lower.contains("insufficient") || msg_lower.contains("balance") || msg_lower.contains("approv") {
            return OrderError::InsufficientFunds;
        }

        if (400..500).contains(&status) {
            return OrderError::Rejected(error_msg);
        }

        OrderError::Unknown {
            status,
            body: error_msg,
        }
    }

    /// A 2xx response that still reports failure (`success: false`)
    pub fn rejected_by(name: Option<&str>) -> Self {
        OrderError::Rejected(name.unwrap_or("unknown error").to_string())
    }

    pub fn from_network_error(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            OrderError::NetworkError("Request timed out".to_string())
        } else if err.is_connect() {
            OrderError::NetworkError("Connection failed".to_string())
        } else {
            OrderError::NetworkError(err.to_string())
        }
    }

    /// Transient failures; reported only, orders are not resubmitted
    pub fn is_retryable(&self) -> bool {
        matches!(self, OrderError::RateLimited | OrderError::NetworkError(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limited() {
        let err = OrderError::from_response(429, "");
        assert!(err.is_retryable());
        assert!(matches!(err, OrderError::RateLimited));
    }

    #[test]
    fn test_opensea_errors_array() {
        let err = OrderError::from_response(400, r#"{"errors":["Insufficient balance for WETH"]}"#);
        assert!(matches!(err, OrderError::InsufficientFunds));
        assert!(!err.is_retryable());

        let err = OrderError::from_response(400, r#"{"errors":["Offer amount below collection floor"]}"#);
        assert!(matches!(err, OrderError::Rejected(ref m) if m == "Offer amount below collection floor"));
    }

    #[test]
    fn test_auth_failed() {
        let err = OrderError::from_response(401, r#"{"message":"Invalid API key"}"#);
        assert!(matches!(err, OrderError::AuthenticationFailed(_)));
    }

    #[test]
    fn test_looksrare_name() {
        let err = OrderError::from_response(422, r#"{"success":false,"name":"MakerOrder_Expired"}"#);
        assert!(matches!(err, OrderError::Rejected(ref m) if m == "MakerOrder_Expired"));
        assert_eq!(OrderError::rejected_by(None).to_string(), "order rejected: unknown error");
    }

    #[test]
    fn test_unknown() {
        let err = OrderError::from_response(500, "Internal server error");
        assert!(!err.is_retryable());
        assert!(matches!(err, OrderError::Unknown { status: 500, .. }));
    }
}
