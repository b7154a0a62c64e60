//! Disk cache of resolved assets
//!
//! One JSON file per `(contract, totalSupply)` pair, named by
//! [`fingerprint`]. A changed supply yields a new file instead of
//! invalidating the old one.

use crate::types::Asset;
use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use tracing::debug;

/// Hex SHA-256 of the checksummed address followed by the decimal supply
pub fn fingerprint(contract_address: &str, total_supply: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(contract_address.as_bytes());
    hasher.update(total_supply.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[derive(Debug, Clone)]
pub struct DiskCache {
    dir: PathBuf,
}

impl DiskCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, fingerprint: &str) -> PathBuf {
        self.dir.join(format!("{}.json", fingerprint))
    }

    pub async fn has(&self, fingerprint: &str) -> bool {
        tokio::fs::try_exists(self.path_for(fingerprint))
            .await
            .unwrap_or(false)
    }

    pub async fn load(&self, fingerprint: &str) -> Result<Vec<Asset>> {
        let path = self.path_for(fingerprint);
        let raw = tokio::fs::read(&path)
            .await
            .with_context(|| format!("Failed to read cache file {}", path.display()))?;

        let assets: Vec<Asset> = serde_json::from_slice(&raw)
            .with_context(|| format!("Corrupt cache file {}", path.display()))?;

        debug!("[Cache] Loaded {} assets from {}", assets.len(), path.display());
        Ok(assets)
    }

    /// Write the full asset list in one go (temp file, then rename)
    pub async fn store(&self, fingerprint: &str, assets: &[Asset]) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("Failed to create cache directory {}", self.dir.display()))?;

        let path = self.path_for(fingerprint);
        let tmp = self.dir.join(format!(".{}.json.tmp", fingerprint));
        let json = serde_json::to_vec(assets).context("Failed to serialize assets")?;

        tokio::fs::write(&tmp, &json)
            .await
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .with_context(|| format!("Failed to move cache file into {}", path.display()))?;

        debug!("[Cache] Stored {} assets in {}", assets.len(), path.display());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Attribute, TokenId, TokenStandard};

    fn asset(id: u64, attrs: Vec<Attribute>) -> Asset {
        Asset {
            token_id: TokenId::from(id),
            contract_address: "0xBC4CA0EdA7647A8aB7C2061c2E118A18a936f13D".to_string(),
            title: Some(format!("#{}", id)),
            schema: TokenStandard::Erc721,
            attributes: attrs,
        }
    }

    #[test]
    fn test_fingerprint_is_sha256_of_concatenation() {
        // sha256("abc")
        assert_eq!(
            fingerprint("a", "bc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_ne!(fingerprint("0xabc", "100"), fingerprint("0xabc", "101"));
    }

    #[tokio::test]
    async fn test_store_then_load_preserves_order() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::new(dir.path().join("cache"));
        let key = fingerprint("0xabc", "3");

        assert!(!cache.has(&key).await);

        let assets = vec![
            asset(2, vec![Attribute::new("Hat", "Red")]),
            asset(0, vec![]),
            asset(1, vec![Attribute::new("Fur", "Gold"), Attribute::new("Eyes", "Blue")]),
        ];
        cache.store(&key, &assets).await.unwrap();

        assert!(cache.has(&key).await);
        assert_eq!(cache.load(&key).await.unwrap(), assets);
    }

    #[tokio::test]
    async fn test_store_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::new(dir.path());
        let key = fingerprint("0xabc", "1");

        cache.store(&key, &[asset(0, vec![])]).await.unwrap();
        cache.store(&key, &[asset(5, vec![])]).await.unwrap();

        let loaded = cache.load(&key).await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].token_id, TokenId::from(5));
    }

    #[tokio::test]
    async fn test_load_rejects_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::new(dir.path());
        std::fs::write(cache.path_for("bad"), b"{not json").unwrap();
        assert!(cache.load("bad").await.is_err());
    }
}
