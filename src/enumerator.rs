//! Token id enumeration for a collection
//!
//! Ids run from the starting id up to `totalSupply` (exclusive). Contracts
//! whose ids start at 1 are detected with a single probe of id 0.

use crate::chain::ChainClient;
use crate::types::{TokenId, TokenStandard};
use alloy::primitives::{Address, U256};
use anyhow::{anyhow, Result};
use tracing::debug;

/// Half-open range `[start, end)` of token ids
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenRange {
    pub start: u64,
    pub end: u64,
}

impl TokenRange {
    pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn ids(&self) -> impl Iterator<Item = TokenId> {
        (self.start..self.end).map(TokenId::from)
    }
}

/// Work out which ids exist for a contract with the given supply.
///
/// A failed read of id 0 moves the start to 1; the probe is not repeated.
pub async fn token_range(
    chain: &dyn ChainClient,
    contract: Address,
    standard: TokenStandard,
    total_supply: U256,
) -> Result<TokenRange> {
    let end: u64 = total_supply
        .try_into()
        .map_err(|_| anyhow!("totalSupply {} is too large to enumerate", total_supply))?;

    let start = match chain.token_uri(contract, TokenId::from(0), standard).await {
        Ok(_) => 0,
        Err(e) => {
            debug!("[Enumerator] Token 0 unreadable ({}), starting at 1", e);
            1
        }
    };

    Ok(TokenRange { start, end })
}
