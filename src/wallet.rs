//! Offer-signing wallet

use alloy::signers::{local::PrivateKeySigner, Signer};
use anyhow::{Context, Result};

/// Signer for EIP-712 orders on the configured chain
pub fn load_signer(private_key: &str, chain_id: u64) -> Result<PrivateKeySigner> {
    let signer: PrivateKeySigner = private_key.trim().parse().context("Failed to parse private key")?;

    Ok(signer.with_chain_id(Some(chain_id)))
}

/// Wallet address (0x prefixed, checksummed)
pub fn wallet_address(signer: &PrivateKeySigner) -> String {
    signer.address().to_checksum(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Well-known first Hardhat account
    const KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    #[test]
    fn test_load_signer() {
        let signer = load_signer(KEY, 1).unwrap();
        assert_eq!(wallet_address(&signer), "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266");
        assert_eq!(signer.chain_id(), Some(1));
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(load_signer("not-a-key", 1).is_err());
    }
}
