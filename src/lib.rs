//! NFT Bidding Bot Library
//!
//! Places bulk offers on every token of an ERC-721/ERC-1155 collection:
//!
//! 1. **Assets**: enumerate token ids on-chain (or through the Alchemy index),
//!    resolve each token's metadata over IPFS/HTTP/data URIs, and cache the
//!    result on disk keyed by collection address and supply.
//!
//! 2. **Offers**: keep the assets matching a trait filter and sign one
//!    WETH offer per asset on OpenSea and LooksRare, rate limited per
//!    marketplace.

pub mod cache;
pub mod chain;
pub mod config;
pub mod enumerator;
pub mod executor;
pub mod filter;
pub mod indexer;
pub mod marketplace;
pub mod metadata;
pub mod pipeline;
pub mod prompt;
pub mod services;
pub mod types;
pub mod wallet;

#[cfg(test)]
pub(crate) mod testing;

pub use cache::DiskCache;
pub use chain::{ChainClient, JsonRpcChain};
pub use config::Config;
pub use executor::{BidReport, Executor};
pub use filter::TraitFilter;
pub use marketplace::{build_bidders, BidContext, Bidder, Marketplace};
pub use metadata::{MetadataResolver, ReqwestFetcher, ResolutionError};
pub use pipeline::{AssetSource, Pipeline, PipelineOutput, RunOptions};
pub use prompt::{AlwaysDecline, Confirm, StdinConfirm};
pub use types::{Asset, Attribute, TokenId, TokenStandard};
pub use wallet::{load_signer, wallet_address};
