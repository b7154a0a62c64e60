//! Metadata Resolver
//!
//! Follows a token's URI to its JSON metadata document:
//! - `ipfs:` races every configured gateway; the first HTTP 200 wins and
//!   non-200 answers reject their branch
//! - `http(s):` is a single fetch
//! - `data:` is decoded locally
//!
//! Batches fan out one task per token behind the provider rate limiter
//! and collect results into a [`ResolutionBatch`].

use super::error::{ResolutionError, ResolutionErrorKind};
use super::fetch::{FetchError, FetchResponse, HttpFetcher};
use super::uri::TokenUri;
use crate::chain::ChainClient;
use crate::services::rate_limiter::RateLimiter;
use crate::types::{Asset, Metadata, TokenId, TokenStandard};
use alloy::primitives::Address;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use futures::future::select_ok;
use serde_json::Value;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, error, warn};

/// Body marker some gateways send with a 200 instead of an error status
pub const INVALID_IPFS_PATH: &str = "invalid ipfs path: ";

/// Standard alphabet, `=` padding optional
const DATA_URI_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Failure inside one scheme handler, before token context is attached
struct Failure {
    kind: ResolutionErrorKind,
    called_url: Option<String>,
    response: Option<FetchResponse>,
}

impl Failure {
    fn local(kind: impl Into<ResolutionErrorKind>) -> Self {
        Self {
            kind: kind.into(),
            called_url: None,
            response: None,
        }
    }

    fn fetch(err: FetchError) -> Self {
        Self {
            called_url: Some(err.url().to_string()),
            response: err.response(),
            kind: err.into(),
        }
    }
}

/// Resolved assets and the failures worth reporting
#[derive(Debug, Default)]
pub struct ResolutionBatch {
    /// Sorted by token id
    pub assets: Vec<Asset>,
    pub failures: Vec<ResolutionError>,
    /// Failures matched by the allowed-error list
    pub suppressed: usize,
}

pub struct MetadataResolver {
    chain: Arc<dyn ChainClient>,
    fetcher: Arc<dyn HttpFetcher>,
    ipfs_hosts: Vec<String>,
}

impl MetadataResolver {
    pub fn new(chain: Arc<dyn ChainClient>, fetcher: Arc<dyn HttpFetcher>, ipfs_hosts: Vec<String>) -> Self {
        Self {
            chain,
            fetcher,
            ipfs_hosts,
        }
    }

    /// Resolve one token's metadata document
    pub async fn resolve(
        &self,
        contract: Address,
        token_id: TokenId,
        standard: TokenStandard,
    ) -> Result<Metadata, ResolutionError> {
        let raw = self
            .chain
            .token_uri(contract, token_id, standard)
            .await
            .map_err(|e| ResolutionError::new(token_id, e))?;

        let uri = match standard {
            TokenStandard::Erc1155 => raw.replace("{id}", &token_id.to_hex64()),
            TokenStandard::Erc721 => raw,
        };

        self.resolve_uri(token_id, &uri).await
    }

    /// Resolve a token URI that is already known
    pub async fn resolve_uri(&self, token_id: TokenId, uri: &str) -> Result<Metadata, ResolutionError> {
        let parsed = TokenUri::parse(uri).map_err(|kind| ResolutionError::new(token_id, kind).with_token_uri(uri))?;

        let outcome = match &parsed {
            TokenUri::Ipfs { cid, path } => self.fetch_ipfs(cid, path).await,
            TokenUri::Http(url) => self.fetch_http(url).await,
            TokenUri::Data {
                base64, payload, ..
            } => decode_data(*base64, payload),
        };

        let document = outcome.and_then(|doc| inject_token_id(doc, token_id)).map_err(|f| {
            ResolutionError::new(token_id, f.kind)
                .with_token_uri(uri)
                .with_parsed_uri(parsed.clone())
                .with_call(f.called_url, f.response)
        })?;

        Ok(Metadata { token_id, document })
    }

    async fn fetch_ipfs(&self, cid: &str, path: &str) -> Result<Value, Failure> {
        if self.ipfs_hosts.is_empty() {
            return Err(Failure::local(ResolutionErrorKind::NoGateways));
        }

        let candidates: Vec<String> = self
            .ipfs_hosts
            .iter()
            .map(|host| TokenUri::gateway_url(host, cid, path))
            .collect();

        // Losing branches are dropped as soon as one gateway answers 200
        let race = candidates.iter().map(|url| Box::pin(self.fetch_ok(url)));
        let (url, response) = match select_ok(race).await {
            Ok((winner, _pending)) => winner,
            Err(last) => return Err(Failure::fetch(last)),
        };

        if response.body.contains(INVALID_IPFS_PATH) {
            return Err(Failure {
                kind: ResolutionErrorKind::InvalidIpfsPath {
                    fallback_url: TokenUri::canonical_ipfs_url(cid, path),
                },
                called_url: Some(url),
                response: Some(response),
            });
        }

        parse_json(&response.body).map_err(|kind| Failure {
            kind,
            called_url: Some(url),
            response: Some(response),
        })
    }

    async fn fetch_http(&self, url: &str) -> Result<Value, Failure> {
        let response = self.fetch_ok(url).await.map_err(Failure::fetch)?.1;

        parse_json(&response.body).map_err(|kind| Failure {
            kind,
            called_url: Some(url.to_string()),
            response: Some(response),
        })
    }

    /// GET that treats anything but 200 as a rejection
    async fn fetch_ok(&self, url: &str) -> Result<(String, FetchResponse), FetchError> {
        let response = self.fetcher.get(url).await?;
        if !response.is_ok() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: response.status,
                body: response.body,
            });
        }
        Ok((url.to_string(), response))
    }

    /// Resolve every id, at most one launch per limiter slot.
    ///
    /// All tasks are awaited; one token failing never affects another.
    pub async fn resolve_batch(
        self: Arc<Self>,
        contract: Address,
        contract_address: &str,
        standard: TokenStandard,
        ids: impl IntoIterator<Item = TokenId>,
        limiter: &RateLimiter,
        allowed_errors: &[String],
    ) -> ResolutionBatch {
        let mut tasks = JoinSet::new();

        for token_id in ids {
            limiter.acquire().await;
            let resolver = Arc::clone(&self);
            tasks.spawn(async move { resolver.resolve(contract, token_id, standard).await });
        }

        let mut batch = ResolutionBatch::default();

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(metadata)) => {
                    debug!("[Resolver] Fetched metadata {} {}", contract_address, metadata.token_id);
                    batch
                        .assets
                        .push(Asset::from_metadata(&metadata, contract_address, standard));
                }
                Ok(Err(e)) if e.is_allowed(allowed_errors) => {
                    batch.suppressed += 1;
                }
                Ok(Err(e)) => {
                    error!("[Resolver] Error while fetching metadata {}: {}", contract_address, e);
                    if let Some(url) = &e.called_url {
                        debug!("[Resolver]   called url: {}", url);
                    }
                    if let Some(response) = &e.response {
                        debug!("[Resolver]   response {}: {}", response.status, response.body);
                    }
                    batch.failures.push(e);
                }
                Err(e) => {
                    warn!("[Resolver] Resolution task aborted: {}", e);
                }
            }
        }

        batch.assets.sort_by_key(|a| a.token_id);
        batch
    }
}

fn decode_data(is_base64: bool, payload: &str) -> Result<Value, Failure> {
    let text = if is_base64 {
        let compact: String = payload.chars().filter(|c| !c.is_ascii_whitespace()).collect();
        let bytes = DATA_URI_BASE64
            .decode(compact)
            .map_err(|e| Failure::local(ResolutionErrorKind::DataUri(e.to_string())))?;
        String::from_utf8(bytes).map_err(|e| Failure::local(ResolutionErrorKind::DataUri(e.to_string())))?
    } else {
        urlencoding::decode(payload)
            .map_err(|e| Failure::local(ResolutionErrorKind::DataUri(e.to_string())))?
            .into_owned()
    };

    parse_json(&text).map_err(Failure::local)
}

fn parse_json(body: &str) -> Result<Value, ResolutionErrorKind> {
    Ok(serde_json::from_str(body)?)
}

fn inject_token_id(mut document: Value, token_id: TokenId) -> Result<Value, Failure> {
    match document.as_object_mut() {
        Some(map) => {
            map.insert("tokenId".to_string(), Value::String(token_id.to_string()));
            Ok(document)
        }
        None => Err(Failure::local(ResolutionErrorKind::NotAnObject)),
    }
}
