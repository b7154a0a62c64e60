//! Configuration management for the bidding bot

use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;

/// Bot configuration loaded from environment
#[derive(Debug, Clone)]
pub struct Config {
    /// Ethereum JSON-RPC endpoint
    pub rpc_url: String,

    /// Private key for signing offers (only needed when bidding)
    pub private_key: Option<String>,

    /// Chain id used in EIP-712 domains
    pub chain_id: u64,

    /// IPFS gateway hosts raced for every `ipfs://` token URI
    pub ipfs_hosts: Vec<String>,

    /// Revert reasons that are expected and never logged
    pub allowed_errors: Vec<String>,

    /// Metadata resolutions admitted per second
    pub provider_ratelimit_sec: u32,

    /// Directory for cached asset lists
    pub cache_dir: PathBuf,

    /// Alchemy NFT API key (for the indexer source)
    pub alchemy_api_key: Option<String>,

    /// OpenSea settings
    pub opensea: MarketplaceConfig,

    /// LooksRare settings
    pub looksrare: MarketplaceConfig,
}

/// Per-marketplace credentials and limits
#[derive(Debug, Clone)]
pub struct MarketplaceConfig {
    pub api_key: Option<String>,
    /// Orders per minute, spread uniformly
    pub ratelimit_min: u32,
    /// Marketplace fee in basis points added to the offer consideration
    pub fee_bps: u32,
}

impl Default for MarketplaceConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            ratelimit_min: 30,
            fee_bps: 0,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();

        Self::from_vars(|key| env::var(key).ok())
    }

    /// Build configuration from any key lookup (the environment in production)
    pub fn from_vars<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|s| !s.trim().is_empty());

        let rpc_url = var("PROVIDER").context("PROVIDER (Ethereum JSON-RPC URL) is required")?;

        let private_key = var("PRIVATE_KEY");

        let chain_id = parse_or(var("CHAIN_ID"), "CHAIN_ID", 1)?;

        let ipfs_hosts = var("IPFS_HOSTS")
            .map(|v| {
                v.split_whitespace()
                    .map(|h| h.trim_end_matches('/').to_string())
                    .collect::<Vec<_>>()
            })
            .filter(|hosts| !hosts.is_empty())
            .unwrap_or_else(|| vec!["https://ipfs.io".to_string()]);

        let allowed_errors = var("ALLOWED_ERRORS")
            .map(|v| {
                v.split(';')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let provider_ratelimit_sec = parse_or(var("PROVIDER_RATELIMIT_SEC"), "PROVIDER_RATELIMIT_SEC", 10)?;

        let cache_dir = var("CACHE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("cache"));

        let alchemy_api_key = var("ALCHEMY_API_KEY");

        let opensea = MarketplaceConfig {
            api_key: var("OPENSEA_API_KEY"),
            ratelimit_min: parse_or(var("OPENSEA_RATELIMIT_MIN"), "OPENSEA_RATELIMIT_MIN", 30)?,
            fee_bps: parse_or(var("OPENSEA_FEE_BPS"), "OPENSEA_FEE_BPS", 250)?, // Default 2.5%
        };

        let looksrare = MarketplaceConfig {
            api_key: var("LOOKSRARE_API_KEY"),
            ratelimit_min: parse_or(var("LOOKSRARE_RATELIMIT_MIN"), "LOOKSRARE_RATELIMIT_MIN", 30)?,
            fee_bps: 0,
        };

        // Validate configuration
        if provider_ratelimit_sec == 0 {
            anyhow::bail!("PROVIDER_RATELIMIT_SEC must be at least 1");
        }
        if opensea.ratelimit_min == 0 || looksrare.ratelimit_min == 0 {
            anyhow::bail!("Marketplace rate limits must be at least 1 per minute");
        }

        Ok(Self {
            rpc_url,
            private_key,
            chain_id,
            ipfs_hosts,
            allowed_errors,
            provider_ratelimit_sec,
            cache_dir,
            alchemy_api_key,
            opensea,
            looksrare,
        })
    }

    /// Private key, required once bidding starts
    pub fn require_private_key(&self) -> Result<&str> {
        self.private_key
            .as_deref()
            .context("PRIVATE_KEY required for placing offers")
    }
}

fn parse_or<T: std::str::FromStr>(raw: Option<String>, key: &str, default: T) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    match raw {
        Some(v) => v
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid {}={:?}: {}", key, v, e)),
        None => Ok(default),
    }
}

/// OpenSea API configuration
pub struct OpenSeaApi;

impl OpenSeaApi {
    pub const BASE_URL: &'static str = "https://api.opensea.io";

    pub fn offers_url(chain: &str) -> String {
        format!("{}/api/v2/orders/{}/seaport/offers", Self::BASE_URL, chain)
    }
}

/// LooksRare API configuration
pub struct LooksRareApi;

impl LooksRareApi {
    pub const BASE_URL: &'static str = "https://api.looksrare.org/api/v1";

    pub fn nonce_url(address: &str) -> String {
        format!("{}/orders/nonce?address={}", Self::BASE_URL, address)
    }

    pub fn orders_url() -> String {
        format!("{}/orders", Self::BASE_URL)
    }
}

/// Alchemy NFT API configuration
pub struct AlchemyApi;

impl AlchemyApi {
    pub const BASE_URL: &'static str = "https://eth-mainnet.g.alchemy.com/nft";

    pub fn v3_url(api_key: &str, method: &str) -> String {
        format!("{}/v3/{}/{}", Self::BASE_URL, api_key, method)
    }

    pub fn v2_url(api_key: &str, method: &str) -> String {
        format!("{}/v2/{}/{}", Self::BASE_URL, api_key, method)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_vars(|k| vars.get(k).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[("PROVIDER", "http://localhost:8545")]).unwrap();
        assert_eq!(config.ipfs_hosts, vec!["https://ipfs.io".to_string()]);
        assert!(config.allowed_errors.is_empty());
        assert_eq!(config.provider_ratelimit_sec, 10);
        assert_eq!(config.cache_dir, PathBuf::from("cache"));
        assert_eq!(config.opensea.fee_bps, 250);
        assert_eq!(config.chain_id, 1);
        assert!(config.require_private_key().is_err());
    }

    #[test]
    fn test_lists_are_split() {
        let config = config_from(&[
            ("PROVIDER", "http://localhost:8545"),
            ("IPFS_HOSTS", "https://a.example/ https://b.example"),
            ("ALLOWED_ERRORS", "ERC721: invalid token ID; nonexistent token;"),
        ])
        .unwrap();
        assert_eq!(config.ipfs_hosts, vec!["https://a.example", "https://b.example"]);
        assert_eq!(
            config.allowed_errors,
            vec!["ERC721: invalid token ID".to_string(), "nonexistent token".to_string()]
        );
    }

    #[test]
    fn test_missing_provider_fails() {
        assert!(config_from(&[]).is_err());
        assert!(config_from(&[("PROVIDER", "  ")]).is_err());
    }

    #[test]
    fn test_invalid_number_fails() {
        let result = config_from(&[
            ("PROVIDER", "http://localhost:8545"),
            ("OPENSEA_RATELIMIT_MIN", "fast"),
        ]);
        assert!(result.is_err());
    }
}
