//! Alchemy NFT API asset source
//!
//! Replaces chain enumeration + metadata resolution with the indexer's
//! view of a collection. Collections the indexer has not seen yet have no
//! `totalSupply`; a reindex is requested and the run aborts.

use crate::config::AlchemyApi;
use crate::metadata::fetch::{FetchError, HttpFetcher};
use crate::services::retry::{with_retry, RetryConfig, Retryable};
use crate::types::{attributes_from_value, Asset, TokenId, TokenStandard};
use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error};

const PAGE_SIZE: u32 = 100;

/// Contract summary from `getContractMetadata`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractMetadata {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub total_supply: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
}

impl ContractMetadata {
    pub fn standard(&self) -> TokenStandard {
        self.token_type
            .as_deref()
            .and_then(|t| t.parse().ok())
            .unwrap_or_default()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NftPage {
    #[serde(default)]
    nfts: Vec<IndexedNft>,
    #[serde(default)]
    page_key: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IndexedNft {
    token_id: TokenId,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default, alias = "title")]
    name: Option<String>,
    #[serde(default)]
    raw: Option<RawNft>,
}

#[derive(Debug, Deserialize)]
struct RawNft {
    #[serde(default)]
    metadata: Value,
}

impl IndexedNft {
    /// `None` when the indexer has no attribute list for the token
    fn into_asset(self, contract_address: &str) -> Option<Asset> {
        let raw_attributes = self.raw.as_ref().and_then(|r| r.metadata.get("attributes"))?;
        if raw_attributes.is_null() {
            return None;
        }

        Some(Asset {
            token_id: self.token_id,
            contract_address: contract_address.to_string(),
            title: self.name.filter(|n| !n.is_empty()),
            schema: self
                .token_type
                .as_deref()
                .and_then(|t| t.parse().ok())
                .unwrap_or_default(),
            attributes: attributes_from_value(Some(raw_attributes)),
        })
    }
}

#[derive(Debug, Error)]
pub enum IndexerError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("Alchemy API error {status}: {body}")]
    Http { status: u16, body: String },

    #[error("invalid response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl Retryable for IndexerError {
    fn is_retryable(&self) -> bool {
        match self {
            IndexerError::Fetch(FetchError::Transport { .. }) => true,
            IndexerError::Fetch(FetchError::Status { status, .. }) | IndexerError::Http { status, .. } => {
                *status == 429 || *status >= 500
            }
            IndexerError::Decode(_) => false,
        }
    }
}

/// Client for the Alchemy NFT API
pub struct AlchemyIndexer {
    fetcher: Arc<dyn HttpFetcher>,
    api_key: String,
    retry: RetryConfig,
}

impl AlchemyIndexer {
    pub fn new(api_key: impl Into<String>, fetcher: Arc<dyn HttpFetcher>) -> Self {
        Self {
            fetcher,
            api_key: api_key.into(),
            retry: RetryConfig::default(),
        }
    }

    async fn get_json_once<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, IndexerError> {
        let response = self.fetcher.get(url).await?;
        if !(200..300).contains(&response.status) {
            return Err(IndexerError::Http {
                status: response.status,
                body: response.body,
            });
        }
        Ok(serde_json::from_str(&response.body)?)
    }

    /// GET with backoff on transport failures, 429 and 5xx
    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str, what: &str) -> Result<T> {
        with_retry(&self.retry, what, || self.get_json_once::<T>(url))
            .await
            .with_context(|| format!("Failed to fetch {}", what))
    }

    pub async fn contract_metadata(&self, contract_address: &str) -> Result<ContractMetadata> {
        let url = format!(
            "{}?contractAddress={}",
            AlchemyApi::v3_url(&self.api_key, "getContractMetadata"),
            contract_address
        );
        self.get_json(&url, "contract metadata").await
    }

    /// Ask the indexer to (re)ingest a contract
    pub async fn refresh_contract(&self, contract_address: &str) -> Result<Value> {
        let url = format!(
            "{}?contractAddress={}",
            AlchemyApi::v2_url(&self.api_key, "reingestContract"),
            contract_address
        );
        self.get_json(&url, "contract refresh").await
    }

    /// Total supply as a decimal string; a missing supply triggers a reindex and fails
    pub async fn indexed_supply(&self, contract_address: &str) -> Result<(String, ContractMetadata)> {
        let metadata = self.contract_metadata(contract_address).await?;

        match metadata.total_supply.clone() {
            Some(supply) => Ok((supply, metadata)),
            None => {
                let status = self.refresh_contract(contract_address).await?;
                error!("[Indexer] Alchemy is indexing the contract: {}", status);
                anyhow::bail!("Contract {} is not indexed yet", contract_address)
            }
        }
    }

    /// Page through every NFT of a contract
    pub async fn fetch_assets(&self, contract_address: &str) -> Result<Vec<Asset>> {
        let mut assets = Vec::new();
        let mut page_key: Option<String> = None;

        loop {
            let mut url = format!(
                "{}?contractAddress={}&withMetadata=true&limit={}",
                AlchemyApi::v3_url(&self.api_key, "getNFTsForContract"),
                contract_address,
                PAGE_SIZE
            );
            if let Some(key) = &page_key {
                url.push_str(&format!("&pageKey={}", urlencoding::encode(key)));
            }

            let page: NftPage = self.get_json(&url, "NFT page").await?;
            let fetched = page.nfts.len();
            assets.extend(collect_page(page.nfts, contract_address));
            debug!("[Indexer] Fetched {} NFTs ({} usable so far)", fetched, assets.len());

            match page.page_key {
                Some(key) if !key.is_empty() => page_key = Some(key),
                _ => break,
            }
        }

        Ok(assets)
    }
}

fn collect_page(nfts: Vec<IndexedNft>, contract_address: &str) -> Vec<Asset> {
    nfts.into_iter()
        .filter_map(|nft| {
            let asset = nft.into_asset(contract_address)?;
            debug!("[Indexer] {}", asset.title.as_deref().unwrap_or("<untitled>"));
            Some(asset)
        })
        .collect()
}
