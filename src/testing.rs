//! In-memory stand-ins for the network collaborators, shared by unit tests

use crate::chain::{ChainClient, ChainError};
use crate::marketplace::{BidContext, Bidder, Marketplace, OrderError, OrderReceipt};
use crate::metadata::fetch::{FetchError, FetchResponse, HttpFetcher};
use crate::prompt::Confirm;
use crate::services::rate_limiter::{Quota, RateLimiter};
use crate::types::{Asset, TokenId, TokenStandard};
use alloy::primitives::{Address, U256};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Chain with a fixed supply and per-token URIs.
/// Ids without a URI revert with "nonexistent token".
pub struct FakeChain {
    supply: U256,
    uris: HashMap<TokenId, Result<String, String>>,
    erc1155: bool,
    counter: U256,
    uri_calls: AtomicUsize,
}

impl FakeChain {
    pub fn new(supply: u64) -> Self {
        Self {
            supply: U256::from(supply),
            uris: HashMap::new(),
            erc1155: false,
            counter: U256::ZERO,
            uri_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_uri(mut self, id: u64, uri: &str) -> Self {
        self.uris.insert(TokenId::from(id), Ok(uri.to_string()));
        self
    }

    pub fn with_revert(mut self, id: u64, reason: &str) -> Self {
        self.uris.insert(TokenId::from(id), Err(reason.to_string()));
        self
    }

    pub fn erc1155(mut self) -> Self {
        self.erc1155 = true;
        self
    }

    pub fn with_counter(mut self, counter: u64) -> Self {
        self.counter = U256::from(counter);
        self
    }

    pub fn uri_calls(&self) -> usize {
        self.uri_calls.load(Ordering::SeqCst)
    }
}

fn revert(reason: &str) -> ChainError {
    ChainError::Rpc {
        code: 3,
        message: format!("execution reverted: {}", reason),
        reason: Some(reason.to_string()),
    }
}

#[async_trait]
impl ChainClient for FakeChain {
    async fn total_supply(&self, _contract: Address) -> Result<U256, ChainError> {
        Ok(self.supply)
    }

    async fn token_uri(
        &self,
        _contract: Address,
        token_id: TokenId,
        _standard: TokenStandard,
    ) -> Result<String, ChainError> {
        self.uri_calls.fetch_add(1, Ordering::SeqCst);
        match self.uris.get(&token_id) {
            Some(Ok(uri)) => Ok(uri.clone()),
            Some(Err(reason)) => Err(revert(reason)),
            None => Err(revert("nonexistent token")),
        }
    }

    async fn supports_interface(&self, _contract: Address, _interface_id: [u8; 4]) -> Result<bool, ChainError> {
        Ok(self.erc1155)
    }

    async fn seaport_counter(&self, _seaport: Address, _offerer: Address) -> Result<U256, ChainError> {
        Ok(self.counter)
    }
}

struct Route {
    status: u16,
    body: String,
    delay: Duration,
}

/// Fetcher answering from a URL table after a per-route delay.
/// Unknown URLs fail at the transport level.
#[derive(Default)]
pub struct FakeFetcher {
    routes: HashMap<String, Route>,
    /// url -> (failures left, status served while failing)
    flaky: HashMap<String, (AtomicUsize, u16)>,
    calls: AtomicUsize,
}

impl FakeFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(mut self, url: &str, status: u16, body: &str, delay: Duration) -> Self {
        self.routes.insert(
            url.to_string(),
            Route {
                status,
                body: body.to_string(),
                delay,
            },
        );
        self
    }

    /// Answer the first `times` requests for `url` with `status`
    pub fn flaky(mut self, url: &str, times: usize, status: u16) -> Self {
        self.flaky.insert(url.to_string(), (AtomicUsize::new(times), status));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HttpFetcher for FakeFetcher {
    async fn get(&self, url: &str) -> Result<FetchResponse, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some((left, status)) = self.flaky.get(url) {
            if left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Ok(FetchResponse {
                    status: *status,
                    body: "unavailable".to_string(),
                });
            }
        }
        let route = self.routes.get(url).ok_or_else(|| FetchError::Transport {
            url: url.to_string(),
            message: "connection refused".to_string(),
        })?;

        if !route.delay.is_zero() {
            tokio::time::sleep(route.delay).await;
        }

        Ok(FetchResponse {
            status: route.status,
            body: route.body.clone(),
        })
    }
}

/// Bidder that counts submissions and fails chosen token ids
pub struct RecordingBidder {
    marketplace: Marketplace,
    limiter: RateLimiter,
    failing: Vec<TokenId>,
    calls: AtomicUsize,
}

impl RecordingBidder {
    pub fn new(marketplace: Marketplace) -> Self {
        Self {
            marketplace,
            limiter: RateLimiter::new("test", Quota::per_second(10_000)),
            failing: Vec::new(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing_on(mut self, id: u64) -> Self {
        self.failing.push(TokenId::from(id));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Bidder for RecordingBidder {
    fn marketplace(&self) -> Marketplace {
        self.marketplace
    }

    fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    async fn place_offer(&self, _ctx: &BidContext, asset: &Asset) -> Result<OrderReceipt, OrderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.contains(&asset.token_id) {
            return Err(OrderError::Rejected("test failure".to_string()));
        }
        Ok(OrderReceipt {
            order_hash: Some(format!("0x{}", asset.token_id)),
        })
    }
}

/// Confirmation with a fixed answer that counts how often it was asked
pub struct ScriptedConfirm {
    answer: bool,
    asked: Arc<AtomicUsize>,
}

impl ScriptedConfirm {
    pub fn new(answer: bool) -> (Self, Arc<AtomicUsize>) {
        let asked = Arc::new(AtomicUsize::new(0));
        (
            Self {
                answer,
                asked: Arc::clone(&asked),
            },
            asked,
        )
    }
}

#[async_trait]
impl Confirm for ScriptedConfirm {
    async fn confirm(&self, _question: &str) -> bool {
        self.asked.fetch_add(1, Ordering::SeqCst);
        self.answer
    }
}
