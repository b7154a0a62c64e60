//! Marketplace adapters
//!
//! Each selected marketplace is one [`Bidder`]. Adapters build, sign and
//! submit one offer per asset; the executor owns scheduling.

pub mod error;
pub mod looksrare;
pub mod opensea;

pub use error::OrderError;
pub use looksrare::LooksRareBidder;
pub use opensea::OpenSeaBidder;

use crate::chain::ChainClient;
use crate::config::Config;
use crate::services::rate_limiter::{Quota, RateLimiter};
use crate::types::Asset;
use alloy::primitives::utils::parse_ether;
use alloy::primitives::{address, Address, U256};
use alloy::signers::local::PrivateKeySigner;
use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::ValueEnum;
use rust_decimal::Decimal;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Wrapped ether on mainnet, the offer currency on both marketplaces
pub const WETH: Address = address!("C02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2");

/// Longest accepted offer lifetime (one year)
pub const MAX_EXPIRATION_MINUTES: u64 = 365 * 24 * 60;

/// Supported marketplaces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum Marketplace {
    #[value(name = "opensea", alias = "Opensea")]
    OpenSea,
    #[value(name = "looksrare", alias = "Looksrare")]
    LooksRare,
}

impl fmt::Display for Marketplace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Marketplace::OpenSea => write!(f, "OpenSea"),
            Marketplace::LooksRare => write!(f, "LooksRare"),
        }
    }
}

/// Offer terms shared by every asset in a run
#[derive(Debug, Clone)]
pub struct BidContext {
    pub offerer: Address,
    /// Bid in ether, as given on the command line
    pub bid: Decimal,
    pub price_wei: U256,
    pub quantity: u64,
    pub expiration_minutes: u64,
}

impl BidContext {
    pub fn new(offerer: Address, bid: Decimal, quantity: u64, expiration_minutes: u64) -> Result<Self> {
        if bid <= Decimal::ZERO {
            anyhow::bail!("Bid must be positive, got {}", bid);
        }
        if quantity == 0 {
            anyhow::bail!("Quantity must be at least 1");
        }
        if expiration_minutes > MAX_EXPIRATION_MINUTES {
            anyhow::bail!(
                "Offer expiration must be at most {} minutes, got {}",
                MAX_EXPIRATION_MINUTES,
                expiration_minutes
            );
        }

        let price_wei = parse_ether(&bid.normalize().to_string())
            .with_context(|| format!("Bid {} is not a valid ether amount", bid))?;

        Ok(Self {
            offerer,
            bid,
            price_wei,
            quantity,
            expiration_minutes,
        })
    }

    /// `(startTime, endTime)` for an order created at `now` (unix seconds)
    pub fn validity(&self, now: u64) -> (u64, u64) {
        (now, now.saturating_add(self.expiration_minutes * 60))
    }

    pub fn validity_from_now(&self) -> (u64, u64) {
        self.validity(chrono::Utc::now().timestamp().max(0) as u64)
    }
}

/// Marketplace acknowledgement of a placed offer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderReceipt {
    pub order_hash: Option<String>,
}

/// One marketplace's offer submission
#[async_trait]
pub trait Bidder: Send + Sync {
    fn marketplace(&self) -> Marketplace;

    /// Governor admitting this marketplace's submissions
    fn limiter(&self) -> &RateLimiter;

    async fn place_offer(&self, ctx: &BidContext, asset: &Asset) -> Result<OrderReceipt, OrderError>;
}

/// Construct the adapters for the selected marketplaces (duplicates ignored)
pub fn build_bidders(
    selected: &[Marketplace],
    config: &Config,
    signer: PrivateKeySigner,
    chain: Arc<dyn ChainClient>,
) -> Result<Vec<Arc<dyn Bidder>>> {
    let mut seen = Vec::new();
    let mut bidders: Vec<Arc<dyn Bidder>> = Vec::new();

    for &marketplace in selected {
        if seen.contains(&marketplace) {
            continue;
        }
        seen.push(marketplace);

        match marketplace {
            Marketplace::OpenSea => {
                let api_key = config
                    .opensea
                    .api_key
                    .clone()
                    .context("OPENSEA_API_KEY required for OpenSea offers")?;
                let limiter = RateLimiter::new("opensea", Quota::per_minute(config.opensea.ratelimit_min).uniform());
                bidders.push(Arc::new(OpenSeaBidder::new(
                    api_key,
                    signer.clone(),
                    config.chain_id,
                    config.opensea.fee_bps,
                    Arc::clone(&chain),
                    limiter,
                )?));
            }
            Marketplace::LooksRare => {
                let api_key = config
                    .looksrare
                    .api_key
                    .clone()
                    .context("LOOKSRARE_API_KEY required for LooksRare offers")?;
                let limiter =
                    RateLimiter::new("looksrare", Quota::per_minute(config.looksrare.ratelimit_min).uniform());
                bidders.push(Arc::new(LooksRareBidder::new(
                    api_key,
                    signer.clone(),
                    config.chain_id,
                    limiter,
                )?));
            }
        }
    }

    Ok(bidders)
}

/// Send a prepared request and classify any failure
pub(crate) async fn send_json(request: reqwest::RequestBuilder) -> Result<Value, OrderError> {
    let response = request
        .send()
        .await
        .map_err(|e| OrderError::from_network_error(&e))?;

    let status = response.status().as_u16();
    let body = response
        .text()
        .await
        .map_err(|e| OrderError::from_network_error(&e))?;

    if !(200..300).contains(&status) {
        return Err(OrderError::from_response(status, &body));
    }

    serde_json::from_str(&body).map_err(|_| OrderError::Unknown { status, body })
}

/// Signature as 0x-prefixed `r || s || v`
pub(crate) fn signature_hex(signature: &alloy::primitives::Signature) -> String {
    format!("0x{}", hex::encode(signature.as_bytes()))
}
