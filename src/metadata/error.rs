//! Structured metadata resolution failures

use super::fetch::{FetchError, FetchResponse};
use super::uri::TokenUri;
use crate::chain::ChainError;
use crate::types::TokenId;
use thiserror::Error;

/// What went wrong while resolving one token
#[derive(Debug, Error)]
pub enum ResolutionErrorKind {
    #[error("tokenURI request failed: {0}")]
    TokenUri(#[from] ChainError),

    #[error("invalid token URI: {0}")]
    InvalidUri(String),

    #[error("unsupported URI scheme {0:?}")]
    UnsupportedScheme(String),

    #[error("no IPFS gateways configured")]
    NoGateways,

    #[error("{0}")]
    Fetch(#[from] FetchError),

    #[error("IPFS metadata error, gateway rejected the path (canonical URL {fallback_url})")]
    InvalidIpfsPath { fallback_url: String },

    #[error("failed to decode data URI: {0}")]
    DataUri(String),

    #[error("invalid metadata JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("metadata document is not a JSON object")]
    NotAnObject,
}

/// A failed resolution with everything known at the point of failure
#[derive(Debug, Error)]
#[error("token {token_id}: {kind}")]
pub struct ResolutionError {
    pub token_id: TokenId,
    /// Token URI as returned by the contract
    pub token_uri: Option<String>,
    /// URL actually requested, if any
    pub called_url: Option<String>,
    pub parsed_uri: Option<TokenUri>,
    /// Raw response, if one was received
    pub response: Option<FetchResponse>,
    #[source]
    pub kind: ResolutionErrorKind,
}

impl ResolutionError {
    pub fn new(token_id: TokenId, kind: impl Into<ResolutionErrorKind>) -> Self {
        Self {
            token_id,
            token_uri: None,
            called_url: None,
            parsed_uri: None,
            response: None,
            kind: kind.into(),
        }
    }

    pub fn with_token_uri(mut self, uri: &str) -> Self {
        self.token_uri = Some(uri.to_string());
        self
    }

    pub fn with_parsed_uri(mut self, parsed: TokenUri) -> Self {
        self.parsed_uri = Some(parsed);
        self
    }

    pub fn with_call(mut self, called_url: Option<String>, response: Option<FetchResponse>) -> Self {
        self.called_url = called_url;
        self.response = response;
        self
    }

    /// Revert reason of the failing `tokenURI` call
    pub fn reason(&self) -> Option<&str> {
        match &self.kind {
            ResolutionErrorKind::TokenUri(e) => e.reason(),
            _ => None,
        }
    }

    /// Whether the failure matches the caller's allow-list and should stay silent
    pub fn is_allowed(&self, allowed_errors: &[String]) -> bool {
        self.reason()
            .map(|reason| allowed_errors.iter().any(|a| a == reason))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn revert(reason: &str) -> ResolutionError {
        ResolutionError::new(
            TokenId::from(9),
            ChainError::Rpc {
                code: 3,
                message: format!("execution reverted: {}", reason),
                reason: Some(reason.to_string()),
            },
        )
    }

    #[test]
    fn test_allowed_reason_is_suppressed() {
        let allowed = vec!["ERC721: invalid token ID".to_string()];
        assert!(revert("ERC721: invalid token ID").is_allowed(&allowed));
        assert!(!revert("paused").is_allowed(&allowed));
    }

    #[test]
    fn test_non_chain_errors_are_never_allowed() {
        let err = ResolutionError::new(TokenId::from(1), ResolutionErrorKind::NoGateways);
        assert!(!err.is_allowed(&["".to_string()]));
    }

    #[test]
    fn test_display_includes_token() {
        let err = ResolutionError::new(TokenId::from(4), ResolutionErrorKind::UnsupportedScheme("ar".into()));
        assert_eq!(err.to_string(), "token 4: unsupported URI scheme \"ar\"");
    }
}
