//! LooksRare v1 collection-token offers

use super::{send_json, signature_hex, BidContext, Bidder, Marketplace, OrderError, OrderReceipt, WETH};
use crate::config::LooksRareApi;
use crate::services::rate_limiter::RateLimiter;
use crate::types::Asset;
use alloy::primitives::{address, Address, Bytes, U256};
use alloy::signers::{local::PrivateKeySigner, Signer};
use alloy::sol;
use alloy::sol_types::{eip712_domain, SolStruct};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info};

/// LooksRare v1 exchange
pub const LOOKSRARE_EXCHANGE: Address = address!("59728544B08AB483533076417FbBB2fD0B17CE3a");

/// Fixed-price standard sale strategy
pub const STRATEGY_STANDARD_SALE: Address = address!("56244Bb70CbD3EA9Dc8007399F61dFC065190031");

/// Minimum share of the price the seller must receive, in basis points
const MIN_PERCENTAGE_TO_ASK: u64 = 8500;

sol! {
    struct MakerOrder {
        bool isOrderAsk;
        address signer;
        address collection;
        uint256 price;
        uint256 tokenId;
        uint256 amount;
        address strategy;
        address currency;
        uint256 nonce;
        uint256 startTime;
        uint256 endTime;
        uint256 minPercentageToAsk;
        bytes params;
    }
}

pub struct LooksRareBidder {
    client: reqwest::Client,
    api_key: String,
    signer: PrivateKeySigner,
    chain_id: u64,
    limiter: RateLimiter,
}

impl LooksRareBidder {
    pub fn new(api_key: String, signer: PrivateKeySigner, chain_id: u64, limiter: RateLimiter) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            api_key,
            signer,
            chain_id,
            limiter,
        })
    }

    async fn fetch_nonce(&self, offerer: Address) -> Result<U256, OrderError> {
        let request = self
            .client
            .get(LooksRareApi::nonce_url(&format!("{:?}", offerer)))
            .header("X-Looks-Api-Key", &self.api_key);

        parse_nonce(&send_json(request).await?)
    }

    fn build_order(&self, ctx: &BidContext, asset: &Asset, nonce: U256, now: u64) -> Result<MakerOrder, OrderError> {
        let collection: Address = asset
            .contract_address
            .parse()
            .map_err(|e| OrderError::Build(format!("invalid contract address: {}", e)))?;
        let (start_time, end_time) = ctx.validity(now);

        Ok(MakerOrder {
            isOrderAsk: false,
            signer: ctx.offerer,
            collection,
            price: ctx.price_wei,
            tokenId: asset.token_id.0,
            amount: U256::from(ctx.quantity),
            strategy: STRATEGY_STANDARD_SALE,
            currency: WETH,
            nonce,
            startTime: U256::from(start_time),
            endTime: U256::from(end_time),
            minPercentageToAsk: U256::from(MIN_PERCENTAGE_TO_ASK),
            params: Bytes::new(),
        })
    }

    async fn sign(&self, order: &MakerOrder) -> Result<String, OrderError> {
        let domain = eip712_domain! {
            name: "LooksRareExchange",
            version: "1",
            chain_id: self.chain_id,
            verifying_contract: LOOKSRARE_EXCHANGE,
        };

        let signature = self
            .signer
            .sign_hash(&order.eip712_signing_hash(&domain))
            .await
            .map_err(|e| OrderError::Build(format!("signing failed: {}", e)))?;

        Ok(signature_hex(&signature))
    }
}

/// `{"data": "<nonce>"}`, the nonce as a decimal string or number
fn parse_nonce(response: &Value) -> Result<U256, OrderError> {
    let raw = match response.get("data") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => return Err(OrderError::Build(format!("unexpected nonce response: {}", response))),
    };

    U256::from_str_radix(raw.trim(), 10).map_err(|e| OrderError::Build(format!("invalid nonce {:?}: {}", raw, e)))
}

fn order_json(order: &MakerOrder, signature: &str) -> Value {
    json!({
        "signature": signature,
        "isOrderAsk": order.isOrderAsk,
        "signer": format!("{:?}", order.signer),
        "collection": format!("{:?}", order.collection),
        "price": order.price.to_string(),
        "tokenId": order.tokenId.to_string(),
        "amount": order.amount.to_string(),
        "strategy": format!("{:?}", order.strategy),
        "currency": format!("{:?}", order.currency),
        "nonce": order.nonce.to_string(),
        "startTime": order.startTime.to_string(),
        "endTime": order.endTime.to_string(),
        "minPercentageToAsk": order.minPercentageToAsk.to_string(),
        "params": [],
    })
}

/// Unwrap `{"success": bool, "name": ..., "data": {...}}`
fn accepted(response: Value) -> Result<OrderReceipt, OrderError> {
    if response.get("success").and_then(Value::as_bool) == Some(false) {
        return Err(OrderError::rejected_by(response.get("name").and_then(Value::as_str)));
    }

    Ok(OrderReceipt {
        order_hash: response
            .pointer("/data/hash")
            .and_then(Value::as_str)
            .map(str::to_string),
    })
}

#[async_trait]
impl Bidder for LooksRareBidder {
    fn marketplace(&self) -> Marketplace {
        Marketplace::LooksRare
    }

    fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    async fn place_offer(&self, ctx: &BidContext, asset: &Asset) -> Result<OrderReceipt, OrderError> {
        let nonce = self.fetch_nonce(ctx.offerer).await?;
        let (now, _) = ctx.validity_from_now();
        let order = self.build_order(ctx, asset, nonce, now)?;
        let signature = self.sign(&order).await?;

        debug!("[LooksRare] Submitting offer for token {} (nonce {})", asset.token_id, nonce);
        let request = self
            .client
            .post(LooksRareApi::orders_url())
            .header("X-Looks-Api-Key", &self.api_key)
            .json(&order_json(&order, &signature));

        let receipt = accepted(send_json(request).await?)?;

        info!(
            "[LooksRare] Offer placed, expires in {}min: token {} hash {}",
            ctx.expiration_minutes,
            asset.token_id,
            receipt.order_hash.as_deref().unwrap_or("-")
        );
        Ok(receipt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::rate_limiter::Quota;
    use crate::types::{TokenId, TokenStandard};
    use rust_decimal_macros::dec;

    fn bidder() -> LooksRareBidder {
        LooksRareBidder::new(
            "key".to_string(),
            PrivateKeySigner::random(),
            1,
            RateLimiter::new("looksrare", Quota::per_minute(60)),
        )
        .unwrap()
    }

    #[test]
    fn test_maker_order_is_a_bid() {
        let b = bidder();
        let ctx = BidContext::new(b.signer.address(), dec!(0.25), 2, 10).unwrap();
        let asset = Asset::bare(TokenId::from(7), "0xBC4CA0EdA7647A8aB7C2061c2E118A18a936f13D", TokenStandard::Erc721);

        let order = b.build_order(&ctx, &asset, U256::from(12), 100).unwrap();
        assert!(!order.isOrderAsk);
        assert_eq!(order.price, U256::from(250_000_000_000_000_000u64));
        assert_eq!(order.amount, U256::from(2));
        assert_eq!(order.currency, WETH);
        assert_eq!(order.strategy, STRATEGY_STANDARD_SALE);
        assert_eq!(order.minPercentageToAsk, U256::from(8500));
        assert_eq!(order.endTime - order.startTime, U256::from(600));

        let body = order_json(&order, "0xsig");
        assert_eq!(body["tokenId"], "7");
        assert_eq!(body["nonce"], "12");
        assert_eq!(body["isOrderAsk"], false);
    }

    #[tokio::test]
    async fn test_signature_recovers_signer() {
        let b = bidder();
        let ctx = BidContext::new(b.signer.address(), dec!(1), 1, 15).unwrap();
        let asset = Asset::bare(TokenId::from(1), "0xBC4CA0EdA7647A8aB7C2061c2E118A18a936f13D", TokenStandard::Erc721);
        let order = b.build_order(&ctx, &asset, U256::ZERO, 0).unwrap();

        let signature = b.sign(&order).await.unwrap();
        let bytes = hex::decode(signature.trim_start_matches("0x")).unwrap();
        let parsed = alloy::primitives::Signature::try_from(bytes.as_slice()).unwrap();

        let domain = eip712_domain! {
            name: "LooksRareExchange",
            version: "1",
            chain_id: 1,
            verifying_contract: LOOKSRARE_EXCHANGE,
        };
        let recovered = parsed
            .recover_address_from_prehash(&order.eip712_signing_hash(&domain))
            .unwrap();
        assert_eq!(recovered, b.signer.address());
    }

    #[test]
    fn test_parse_nonce() {
        assert_eq!(parse_nonce(&json!({"success": true, "data": "41"})).unwrap(), U256::from(41));
        assert_eq!(parse_nonce(&json!({"data": 3})).unwrap(), U256::from(3));
        assert!(parse_nonce(&json!({"data": null})).is_err());
    }

    #[test]
    fn test_success_false_is_rejected() {
        let err = accepted(json!({"success": false, "name": "MakerOrder_InvalidNonce"})).unwrap_err();
        assert!(matches!(err, OrderError::Rejected(ref name) if name == "MakerOrder_InvalidNonce"));

        let receipt = accepted(json!({"success": true, "data": {"hash": "0x01"}})).unwrap();
        assert_eq!(receipt.order_hash.as_deref(), Some("0x01"));
    }
}
