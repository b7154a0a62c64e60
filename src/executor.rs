//! Offer execution across marketplaces (dry run or live)

use crate::marketplace::{BidContext, Bidder, Marketplace, OrderError, OrderReceipt};
use crate::types::{Asset, TokenId};
use std::fmt;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

/// Executor fans assets out to every selected marketplace
pub struct Executor {
    bidders: Vec<Arc<dyn Bidder>>,
    dry_run: bool,
}

impl Executor {
    pub fn new(bidders: Vec<Arc<dyn Bidder>>) -> Self {
        Self {
            bidders,
            dry_run: false,
        }
    }

    /// In dry-run mode no bidder is ever called
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Place one offer per asset on each marketplace.
    ///
    /// Marketplaces run side by side. Within one, each submission waits for
    /// a governor slot, then runs without blocking the next. Every attempt is
    /// reported; failures are not retried.
    pub async fn execute(&self, ctx: &BidContext, assets: &[Asset]) -> BidReport {
        if self.dry_run {
            info!("[DRY RUN] Not executing bids for {} assets", assets.len());
            return BidReport {
                dry_run: true,
                outcomes: Vec::new(),
            };
        }

        let ctx = Arc::new(ctx.clone());
        let assets: Arc<[Asset]> = assets.into();
        let mut runs = JoinSet::new();

        for bidder in &self.bidders {
            info!("[{}] Placing {} offers at {} WETH", bidder.marketplace(), assets.len(), ctx.bid);
            runs.spawn(run_marketplace(Arc::clone(bidder), Arc::clone(&ctx), Arc::clone(&assets)));
        }

        let mut outcomes = Vec::new();
        while let Some(joined) = runs.join_next().await {
            match joined {
                Ok(batch) => outcomes.extend(batch),
                Err(e) => warn!("[Executor] Marketplace run aborted: {}", e),
            }
        }

        outcomes.sort_by_key(|o| o.token_id);
        BidReport {
            dry_run: false,
            outcomes,
        }
    }
}

async fn run_marketplace(bidder: Arc<dyn Bidder>, ctx: Arc<BidContext>, assets: Arc<[Asset]>) -> Vec<OrderOutcome> {
    let marketplace = bidder.marketplace();
    let mut submissions = JoinSet::new();

    for index in 0..assets.len() {
        bidder.limiter().acquire().await;

        let bidder = Arc::clone(&bidder);
        let ctx = Arc::clone(&ctx);
        let assets = Arc::clone(&assets);
        submissions.spawn(async move {
            let asset = &assets[index];
            let result = bidder.place_offer(&ctx, asset).await;
            if let Err(e) = &result {
                error!("[{}] Offer failed for token {}: {}", marketplace, asset.token_id, e);
            }
            OrderOutcome {
                marketplace,
                token_id: asset.token_id,
                result,
            }
        });
    }

    let mut outcomes = Vec::with_capacity(assets.len());
    while let Some(joined) = submissions.join_next().await {
        match joined {
            Ok(outcome) => outcomes.push(outcome),
            Err(e) => warn!("[{}] Offer task aborted: {}", marketplace, e),
        }
    }
    outcomes
}

/// Result of one offer submission
#[derive(Debug)]
pub struct OrderOutcome {
    pub marketplace: Marketplace,
    pub token_id: TokenId,
    pub result: Result<OrderReceipt, OrderError>,
}

/// Per-asset outcomes of a bidding pass
#[derive(Debug)]
pub struct BidReport {
    pub dry_run: bool,
    pub outcomes: Vec<OrderOutcome>,
}

impl BidReport {
    pub fn placed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.placed()
    }
}

impl fmt::Display for BidReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.dry_run {
            return write!(f, "Dry run, no offers submitted");
        }
        write!(
            f,
            "Offers: {} placed, {} failed ({} attempted)",
            self.placed(),
            self.failed(),
            self.outcomes.len()
        )
    }
}
