//! OpenSea offers via Seaport 1.6
//!
//! Flow per asset:
//! 1. Read the offerer's Seaport counter on-chain
//! 2. Build `OrderComponents` (WETH offered, token + marketplace fee asked)
//! 3. Sign EIP-712 and POST to the OpenSea offers endpoint

use super::{send_json, signature_hex, BidContext, Bidder, Marketplace, OrderError, OrderReceipt, WETH};
use crate::chain::ChainClient;
use crate::config::OpenSeaApi;
use crate::services::rate_limiter::RateLimiter;
use crate::types::{Asset, TokenStandard};
use alloy::primitives::{address, b256, Address, FixedBytes, U256};
use alloy::signers::{local::PrivateKeySigner, Signer};
use alloy::sol;
use alloy::sol_types::{eip712_domain, SolStruct};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Seaport 1.6
pub const SEAPORT: Address = address!("0000000000000068F116a894984e2DB1123eB395");

/// OpenSea conduit key
pub const OPENSEA_CONDUIT_KEY: FixedBytes<32> =
    b256!("0000007b02230091a7ed01230072f7006a004d60a8d4e71d599b8104250f0000");

/// OpenSea fee recipient
pub const OPENSEA_FEE_RECIPIENT: Address = address!("0000a26b00c1F0DF003000390027140000fAa719");

const ITEM_ERC20: u8 = 1;
const ITEM_ERC721: u8 = 2;
const ITEM_ERC1155: u8 = 3;

const ORDER_FULL_OPEN: u8 = 0;
const ORDER_PARTIAL_OPEN: u8 = 1;

sol! {
    struct OfferItem {
        uint8 itemType;
        address token;
        uint256 identifierOrCriteria;
        uint256 startAmount;
        uint256 endAmount;
    }

    struct ConsiderationItem {
        uint8 itemType;
        address token;
        uint256 identifierOrCriteria;
        uint256 startAmount;
        uint256 endAmount;
        address recipient;
    }

    struct OrderComponents {
        address offerer;
        address zone;
        OfferItem[] offer;
        ConsiderationItem[] consideration;
        uint8 orderType;
        uint256 startTime;
        uint256 endTime;
        bytes32 zoneHash;
        uint256 salt;
        bytes32 conduitKey;
        uint256 counter;
    }
}

/// OpenSea chain slug for the API path
fn chain_slug(chain_id: u64) -> &'static str {
    match chain_id {
        11155111 => "sepolia",
        _ => "ethereum",
    }
}

pub struct OpenSeaBidder {
    client: reqwest::Client,
    api_key: String,
    signer: PrivateKeySigner,
    chain_id: u64,
    fee_bps: u32,
    chain: Arc<dyn ChainClient>,
    limiter: RateLimiter,
}

impl OpenSeaBidder {
    pub fn new(
        api_key: String,
        signer: PrivateKeySigner,
        chain_id: u64,
        fee_bps: u32,
        chain: Arc<dyn ChainClient>,
        limiter: RateLimiter,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            api_key,
            signer,
            chain_id,
            fee_bps,
            chain,
            limiter,
        })
    }

    /// Assemble the Seaport order for one asset
    fn build_order(
        &self,
        ctx: &BidContext,
        asset: &Asset,
        counter: U256,
        salt: U256,
        now: u64,
    ) -> Result<OrderComponents, OrderError> {
        let collection: Address = asset
            .contract_address
            .parse()
            .map_err(|e| OrderError::Build(format!("invalid contract address: {}", e)))?;

        let (start_time, end_time) = ctx.validity(now);
        let fee = ctx.price_wei * U256::from(self.fee_bps) / U256::from(10_000u64);
        let quantity = U256::from(ctx.quantity);

        let item_type = match asset.schema {
            TokenStandard::Erc721 => ITEM_ERC721,
            TokenStandard::Erc1155 => ITEM_ERC1155,
        };

        let mut consideration = vec![ConsiderationItem {
            itemType: item_type,
            token: collection,
            identifierOrCriteria: asset.token_id.0,
            startAmount: quantity,
            endAmount: quantity,
            recipient: ctx.offerer,
        }];

        if !fee.is_zero() {
            consideration.push(ConsiderationItem {
                itemType: ITEM_ERC20,
                token: WETH,
                identifierOrCriteria: U256::ZERO,
                startAmount: fee,
                endAmount: fee,
                recipient: OPENSEA_FEE_RECIPIENT,
            });
        }

        Ok(OrderComponents {
            offerer: ctx.offerer,
            zone: Address::ZERO,
            offer: vec![OfferItem {
                itemType: ITEM_ERC20,
                token: WETH,
                identifierOrCriteria: U256::ZERO,
                startAmount: ctx.price_wei,
                endAmount: ctx.price_wei,
            }],
            consideration,
            orderType: if ctx.quantity > 1 { ORDER_PARTIAL_OPEN } else { ORDER_FULL_OPEN },
            startTime: U256::from(start_time),
            endTime: U256::from(end_time),
            zoneHash: FixedBytes::ZERO,
            salt,
            conduitKey: OPENSEA_CONDUIT_KEY,
            counter,
        })
    }

    async fn sign(&self, order: &OrderComponents) -> Result<String, OrderError> {
        let domain = eip712_domain! {
            name: "Seaport",
            version: "1.6",
            chain_id: self.chain_id,
            verifying_contract: SEAPORT,
        };

        let hash = order.eip712_signing_hash(&domain);
        let signature = self
            .signer
            .sign_hash(&hash)
            .await
            .map_err(|e| OrderError::Build(format!("signing failed: {}", e)))?;

        Ok(signature_hex(&signature))
    }
}

/// Offer request body as the OpenSea API expects it
fn order_json(order: &OrderComponents, signature: &str) -> Value {
    let offer: Vec<Value> = order
        .offer
        .iter()
        .map(|item| {
            json!({
                "itemType": item.itemType,
                "token": format!("{:?}", item.token),
                "identifierOrCriteria": item.identifierOrCriteria.to_string(),
                "startAmount": item.startAmount.to_string(),
                "endAmount": item.endAmount.to_string(),
            })
        })
        .collect();

    let consideration: Vec<Value> = order
        .consideration
        .iter()
        .map(|item| {
            json!({
                "itemType": item.itemType,
                "token": format!("{:?}", item.token),
                "identifierOrCriteria": item.identifierOrCriteria.to_string(),
                "startAmount": item.startAmount.to_string(),
                "endAmount": item.endAmount.to_string(),
                "recipient": format!("{:?}", item.recipient),
            })
        })
        .collect();

    json!({
        "parameters": {
            "offerer": format!("{:?}", order.offerer),
            "zone": format!("{:?}", order.zone),
            "offer": offer,
            "consideration": consideration,
            "orderType": order.orderType,
            "startTime": order.startTime.to_string(),
            "endTime": order.endTime.to_string(),
            "zoneHash": format!("{}", order.zoneHash),
            "salt": order.salt.to_string(),
            "conduitKey": format!("{}", order.conduitKey),
            "totalOriginalConsiderationItems": order.consideration.len(),
            "counter": order.counter.to_string(),
        },
        "signature": signature,
        "protocol_address": format!("{:?}", SEAPORT),
    })
}

fn order_hash(response: &Value) -> Option<String> {
    response
        .pointer("/order/order_hash")
        .or_else(|| response.get("order_hash"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

#[async_trait]
impl Bidder for OpenSeaBidder {
    fn marketplace(&self) -> Marketplace {
        Marketplace::OpenSea
    }

    fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    async fn place_offer(&self, ctx: &BidContext, asset: &Asset) -> Result<OrderReceipt, OrderError> {
        let counter = self
            .chain
            .seaport_counter(SEAPORT, ctx.offerer)
            .await
            .map_err(|e| OrderError::Build(format!("failed to read Seaport counter: {}", e)))?;

        let salt = U256::from_be_bytes(rand::random::<[u8; 32]>());
        let (now, _) = ctx.validity_from_now();
        let order = self.build_order(ctx, asset, counter, salt, now)?;
        let signature = self.sign(&order).await?;

        debug!("[OpenSea] Submitting offer for token {}", asset.token_id);
        let request = self
            .client
            .post(OpenSeaApi::offers_url(chain_slug(self.chain_id)))
            .header("x-api-key", &self.api_key)
            .json(&order_json(&order, &signature));

        let response = send_json(request).await?;
        let receipt = OrderReceipt {
            order_hash: order_hash(&response),
        };

        info!(
            "[OpenSea] Offer placed, expires in {}min: token {} hash {}",
            ctx.expiration_minutes,
            asset.token_id,
            receipt.order_hash.as_deref().unwrap_or("-")
        );
        Ok(receipt)
    }
}
