//! Asset pipeline: enumerate → resolve → cache → filter
//!
//! The result is threaded back to the caller as a [`PipelineOutput`]; no
//! stage shares mutable state with another.

use crate::cache::{fingerprint, DiskCache};
use crate::chain::{checksum_address, detect_standard, ChainClient};
use crate::config::Config;
use crate::enumerator::token_range;
use crate::filter::{self, TraitFilter};
use crate::indexer::AlchemyIndexer;
use crate::metadata::{HttpFetcher, MetadataResolver};
use crate::prompt::Confirm;
use crate::services::rate_limiter::{Quota, RateLimiter};
use crate::types::{Asset, TokenStandard};
use alloy::primitives::Address;
use anyhow::{Context, Result};
use clap::ValueEnum;
use std::sync::Arc;
use tracing::{info, warn};

const OVERWRITE_QUESTION: &str = "Are you sure that you want to overwrite existing data and fetch everything again?";

/// Where the asset list comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum AssetSource {
    /// Enumerate on-chain and resolve token URIs
    #[default]
    Chain,
    /// Alchemy NFT API
    Alchemy,
}

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub source: AssetSource,
    /// Resolve everything even without a filter, and offer to refresh the cache
    pub prefetch: bool,
    pub filter: Option<TraitFilter>,
}

/// Collection identity for one run
#[derive(Debug, Clone)]
pub struct Collection {
    pub address: Address,
    /// EIP-55 form, used in assets and the cache fingerprint
    pub checksummed: String,
    /// Decimal `totalSupply`
    pub total_supply: String,
    pub standard: TokenStandard,
}

#[derive(Debug)]
pub struct PipelineOutput {
    pub collection: Collection,
    /// Filtered assets, ready for bidding
    pub assets: Vec<Asset>,
    pub from_cache: bool,
    /// Unexpected per-token resolution failures
    pub failed: usize,
    /// Failures matched by the allowed-error list
    pub suppressed: usize,
}

pub struct Pipeline {
    chain: Arc<dyn ChainClient>,
    resolver: Arc<MetadataResolver>,
    indexer: Option<AlchemyIndexer>,
    cache: DiskCache,
    confirm: Box<dyn Confirm>,
    provider_limiter: RateLimiter,
    allowed_errors: Vec<String>,
}

impl Pipeline {
    pub fn new(
        config: &Config,
        chain: Arc<dyn ChainClient>,
        fetcher: Arc<dyn HttpFetcher>,
        confirm: Box<dyn Confirm>,
    ) -> Result<Self> {
        let indexer = config
            .alchemy_api_key
            .as_deref()
            .map(|key| AlchemyIndexer::new(key, Arc::clone(&fetcher)));

        Ok(Self {
            resolver: Arc::new(MetadataResolver::new(
                Arc::clone(&chain),
                fetcher,
                config.ipfs_hosts.clone(),
            )),
            chain,
            indexer,
            cache: DiskCache::new(&config.cache_dir),
            confirm,
            provider_limiter: RateLimiter::new("provider", Quota::per_second(config.provider_ratelimit_sec)),
            allowed_errors: config.allowed_errors.clone(),
        })
    }

    pub async fn run(&self, contract: &str, options: &RunOptions) -> Result<PipelineOutput> {
        let (address, checksummed) = checksum_address(contract)?;

        let collection = match options.source {
            AssetSource::Chain => self.chain_collection(address, checksummed).await?,
            AssetSource::Alchemy => self.indexed_collection(address, checksummed).await?,
        };
        info!(
            "[Pipeline] {} ({}) totalSupply {}",
            collection.checksummed, collection.standard, collection.total_supply
        );

        let key = fingerprint(&collection.checksummed, &collection.total_supply);
        let mut output = PipelineOutput {
            collection,
            assets: Vec::new(),
            from_cache: false,
            failed: 0,
            suppressed: 0,
        };

        let assets = if self.use_cache(&key, options.prefetch).await {
            info!("[Cache] Loading assets from cache file");
            output.from_cache = true;
            self.cache.load(&key).await?
        } else {
            match options.source {
                AssetSource::Chain => self.collect_from_chain(&key, options, &mut output).await?,
                AssetSource::Alchemy => {
                    let assets = self
                        .indexer()?
                        .fetch_assets(&output.collection.checksummed)
                        .await?;
                    self.cache.store(&key, &assets).await?;
                    assets
                }
            }
        };

        output.assets = filter::apply(assets, options.filter.as_ref());
        info!("[Pipeline] Processing total of {}", output.assets.len());
        Ok(output)
    }

    async fn chain_collection(&self, address: Address, checksummed: String) -> Result<Collection> {
        let total_supply = self
            .chain
            .total_supply(address)
            .await
            .with_context(|| format!("Failed to read totalSupply of {}", checksummed))?;

        Ok(Collection {
            address,
            checksummed,
            total_supply: total_supply.to_string(),
            standard: detect_standard(self.chain.as_ref(), address).await,
        })
    }

    async fn indexed_collection(&self, address: Address, checksummed: String) -> Result<Collection> {
        let (total_supply, metadata) = self.indexer()?.indexed_supply(&checksummed).await?;

        Ok(Collection {
            address,
            checksummed,
            total_supply,
            standard: metadata.standard(),
        })
    }

    fn indexer(&self) -> Result<&AlchemyIndexer> {
        self.indexer
            .as_ref()
            .context("ALCHEMY_API_KEY required for the alchemy source")
    }

    /// Existing cache is used unless a prefetch was requested and confirmed
    async fn use_cache(&self, key: &str, prefetch: bool) -> bool {
        if !self.cache.has(key).await {
            return false;
        }
        if prefetch && self.confirm.confirm(OVERWRITE_QUESTION).await {
            info!("[Cache] Refreshing cached assets");
            return false;
        }
        true
    }

    async fn collect_from_chain(&self, key: &str, options: &RunOptions, output: &mut PipelineOutput) -> Result<Vec<Asset>> {
        let collection = &output.collection;
        let range = token_range(
            self.chain.as_ref(),
            collection.address,
            collection.standard,
            collection.total_supply.parse().context("Invalid totalSupply")?,
        )
        .await?;

        if options.filter.is_none() && !options.prefetch {
            // Nothing needs attributes; skip resolution entirely
            return Ok(range
                .ids()
                .map(|id| Asset::bare(id, &collection.checksummed, collection.standard))
                .collect());
        }

        info!("[Resolver] Resolving metadata for {} tokens", range.len());
        let batch = Arc::clone(&self.resolver)
            .resolve_batch(
                collection.address,
                &collection.checksummed,
                collection.standard,
                range.ids(),
                &self.provider_limiter,
                &self.allowed_errors,
            )
            .await;

        if !batch.failures.is_empty() {
            warn!(
                "[Resolver] {} of {} tokens failed to resolve",
                batch.failures.len(),
                range.len()
            );
        }
        output.failed = batch.failures.len();
        output.suppressed = batch.suppressed;

        self.cache.store(key, &batch.assets).await?;
        Ok(batch.assets)
    }
}
