//! Read-only contract calls over Ethereum JSON-RPC
//!
//! Calls are ABI-encoded with `sol!`, sent as `eth_call`, and retried on
//! transient transport failures. Reverts surface with their decoded reason
//! so callers can match them against the allowed-error list.

use crate::services::retry::{with_retry, RetryConfig, Retryable};
use crate::types::{TokenId, TokenStandard};
use alloy::primitives::{Address, FixedBytes, U256};
use alloy::sol;
use alloy::sol_types::{Revert, SolCall, SolError, SolValue};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// ERC-165 interface id of ERC-1155
pub const ERC1155_INTERFACE_ID: [u8; 4] = [0xd9, 0xb6, 0x7a, 0x26];

sol! {
    function totalSupply() external view returns (uint256);
    function tokenURI(uint256 tokenId) external view returns (string);
    function uri(uint256 id) external view returns (string);
    function supportsInterface(bytes4 interfaceId) external view returns (bool);
    function getCounter(address offerer) external view returns (uint256);
}

/// Failure of a contract read
#[derive(Debug, Error)]
pub enum ChainError {
    #[error("RPC transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("RPC HTTP error {status}: {body}")]
    Http { status: u16, body: String },

    #[error("RPC error {code}: {message}")]
    Rpc {
        code: i64,
        message: String,
        /// Decoded revert reason, if the call reverted with one
        reason: Option<String>,
    },

    #[error("Failed to decode call result: {0}")]
    Decode(String),
}

impl ChainError {
    /// Revert reason reported by the contract
    pub fn reason(&self) -> Option<&str> {
        match self {
            ChainError::Rpc { reason, .. } => reason.as_deref(),
            _ => None,
        }
    }
}

impl Retryable for ChainError {
    fn is_retryable(&self) -> bool {
        match self {
            ChainError::Transport(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            ChainError::Http { status, .. } => *status == 429 || *status >= 500,
            // Reverts are deterministic
            ChainError::Rpc { .. } | ChainError::Decode(_) => false,
        }
    }
}

/// Contract reads the bot needs
#[async_trait]
pub trait ChainClient: Send + Sync {
    async fn total_supply(&self, contract: Address) -> Result<U256, ChainError>;

    /// `tokenURI(id)` for ERC-721, `uri(id)` for ERC-1155
    async fn token_uri(
        &self,
        contract: Address,
        token_id: TokenId,
        standard: TokenStandard,
    ) -> Result<String, ChainError>;

    async fn supports_interface(&self, contract: Address, interface_id: [u8; 4]) -> Result<bool, ChainError>;

    /// Seaport order counter of an offerer
    async fn seaport_counter(&self, seaport: Address, offerer: Address) -> Result<U256, ChainError>;
}

/// Detect the token standard once per run through ERC-165
pub async fn detect_standard(chain: &dyn ChainClient, contract: Address) -> TokenStandard {
    match chain.supports_interface(contract, ERC1155_INTERFACE_ID).await {
        Ok(true) => TokenStandard::Erc1155,
        Ok(false) => TokenStandard::Erc721,
        Err(e) => {
            debug!("[Chain] supportsInterface failed ({}), assuming ERC721", e);
            TokenStandard::Erc721
        }
    }
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<String>,
    #[serde(default)]
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    #[serde(default)]
    message: String,
    #[serde(default)]
    data: Option<serde_json::Value>,
}

/// `ChainClient` over a JSON-RPC HTTP endpoint
pub struct JsonRpcChain {
    client: reqwest::Client,
    url: String,
    retry: RetryConfig,
    next_id: AtomicU64,
}

impl JsonRpcChain {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| anyhow!("Failed to create HTTP client: {}", e))?;

        Ok(Self {
            client,
            url: url.into(),
            retry: RetryConfig::default(),
            next_id: AtomicU64::new(1),
        })
    }

    async fn eth_call(&self, to: Address, calldata: Vec<u8>) -> Result<Vec<u8>, ChainError> {
        with_retry(&self.retry, "eth_call", || self.eth_call_once(to, &calldata)).await
    }

    async fn eth_call_once(&self, to: Address, calldata: &[u8]) -> Result<Vec<u8>, ChainError> {
        let rpc_payload = serde_json::json!({
            "jsonrpc": "2.0",
            "method": "eth_call",
            "params": [{
                "to": format!("{:?}", to),
                "data": format!("0x{}", hex::encode(calldata)),
            }, "latest"],
            "id": self.next_id.fetch_add(1, Ordering::Relaxed)
        });

        let resp = self.client.post(&self.url).json(&rpc_payload).send().await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(ChainError::Http { status, body });
        }

        let body: RpcResponse = resp.json().await?;

        if let Some(error) = body.error {
            let data = error.data.as_ref().and_then(|d| match d {
                serde_json::Value::String(s) => Some(s.as_str()),
                other => other.get("data").and_then(|v| v.as_str()),
            });
            let reason = revert_reason(&error.message, data);
            return Err(ChainError::Rpc {
                code: error.code,
                message: error.message,
                reason,
            });
        }

        let result = body.result.unwrap_or_default();
        decode_hex(&result)
    }

    async fn call_u256(&self, to: Address, calldata: Vec<u8>) -> Result<U256, ChainError> {
        let raw = self.eth_call(to, calldata).await?;
        if raw.is_empty() {
            return Err(ChainError::Decode("empty result".to_string()));
        }
        Ok(U256::from_be_slice(&raw[..raw.len().min(32)]))
    }

    async fn call_string(&self, to: Address, calldata: Vec<u8>) -> Result<String, ChainError> {
        let raw = self.eth_call(to, calldata).await?;
        <(String,)>::abi_decode_params(&raw)
            .map(|(s,)| s)
            .map_err(|e| ChainError::Decode(e.to_string()))
    }
}

#[async_trait]
impl ChainClient for JsonRpcChain {
    async fn total_supply(&self, contract: Address) -> Result<U256, ChainError> {
        self.call_u256(contract, totalSupplyCall {}.abi_encode()).await
    }

    async fn token_uri(
        &self,
        contract: Address,
        token_id: TokenId,
        standard: TokenStandard,
    ) -> Result<String, ChainError> {
        let calldata = match standard {
            TokenStandard::Erc721 => tokenURICall { tokenId: token_id.0 }.abi_encode(),
            TokenStandard::Erc1155 => uriCall { id: token_id.0 }.abi_encode(),
        };
        self.call_string(contract, calldata).await
    }

    async fn supports_interface(&self, contract: Address, interface_id: [u8; 4]) -> Result<bool, ChainError> {
        let call = supportsInterfaceCall {
            interfaceId: FixedBytes::from(interface_id),
        };
        Ok(!self.call_u256(contract, call.abi_encode()).await?.is_zero())
    }

    async fn seaport_counter(&self, seaport: Address, offerer: Address) -> Result<U256, ChainError> {
        self.call_u256(seaport, getCounterCall { offerer }.abi_encode()).await
    }
}

fn decode_hex(raw: &str) -> Result<Vec<u8>, ChainError> {
    let hex_str = raw.strip_prefix("0x").unwrap_or(raw);
    hex::decode(hex_str).map_err(|e| ChainError::Decode(format!("invalid hex result: {}", e)))
}

/// Extract a revert reason from a JSON-RPC error.
///
/// Prefers ABI-decoding `Error(string)` from the error data and falls back
/// to the `execution reverted: <reason>` message form.
pub fn revert_reason(message: &str, data: Option<&str>) -> Option<String> {
    if let Some(bytes) = data.and_then(|d| decode_hex(d).ok()) {
        if let Ok(revert) = Revert::abi_decode(&bytes) {
            return Some(revert.reason);
        }
    }

    message
        .strip_prefix("execution reverted:")
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty())
}

/// Validate an address and return it with its EIP-55 checksum form.
///
/// Mixed-case input must carry a valid checksum.
pub fn checksum_address(input: &str) -> Result<(Address, String)> {
    let trimmed = input.trim();
    let body = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    let mixed_case = body.chars().any(|c| c.is_ascii_uppercase()) && body.chars().any(|c| c.is_ascii_lowercase());

    let address = if mixed_case {
        Address::parse_checksummed(trimmed, None).map_err(|e| anyhow!("Invalid contract address {}: {}", input, e))?
    } else {
        trimmed
            .parse::<Address>()
            .map_err(|e| anyhow!("Invalid contract address {}: {}", input, e))?
    };

    Ok((address, address.to_checksum(None)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_revert_reason_from_data() {
        let data = format!("0x{}", hex::encode(
            Revert {
                reason: "ERC721: invalid token ID".to_string(),
            }
            .abi_encode(),
        ));
        let reason = revert_reason("execution reverted", Some(&data));
        assert_eq!(reason.as_deref(), Some("ERC721: invalid token ID"));
    }

    #[test]
    fn test_revert_reason_from_message() {
        let reason = revert_reason("execution reverted: URI query for nonexistent token", None);
        assert_eq!(reason.as_deref(), Some("URI query for nonexistent token"));
        assert_eq!(revert_reason("header not found", None), None);
    }

    #[test]
    fn test_checksum_address() {
        let (_, checksummed) = checksum_address("0xbc4ca0eda7647a8ab7c2061c2e118a18a936f13d").unwrap();
        assert_eq!(checksummed, "0xBC4CA0EdA7647A8aB7C2061c2E118A18a936f13D");

        // Already checksummed input round-trips
        let (_, again) = checksum_address(&checksummed).unwrap();
        assert_eq!(again, checksummed);
    }

    #[test]
    fn test_checksum_address_rejects_bad_input() {
        assert!(checksum_address("not-an-address").is_err());
        // Mixed case with a broken checksum
        assert!(checksum_address("0xBC4CA0EdA7647A8aB7C2061c2E118A18a936f13d").is_err());
    }

    #[test]
    fn test_revert_is_not_retryable() {
        let err = ChainError::Rpc {
            code: 3,
            message: "execution reverted".to_string(),
            reason: Some("nope".to_string()),
        };
        assert!(!err.is_retryable());
        assert_eq!(err.reason(), Some("nope"));
        assert!(ChainError::Http { status: 429, body: String::new() }.is_retryable());
        assert!(ChainError::Http { status: 503, body: String::new() }.is_retryable());
        assert!(!ChainError::Http { status: 400, body: String::new() }.is_retryable());
    }

    #[tokio::test]
    async fn test_detect_standard_via_erc165() {
        use crate::testing::FakeChain;

        let erc721 = FakeChain::new(1);
        let erc1155 = FakeChain::new(1).erc1155();
        assert_eq!(detect_standard(&erc721, Address::ZERO).await, TokenStandard::Erc721);
        assert_eq!(detect_standard(&erc1155, Address::ZERO).await, TokenStandard::Erc1155);
    }
}
