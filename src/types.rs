//! Core types for the bidding bot

use alloy::primitives::U256;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Token id within a contract.
///
/// Serialized as a decimal string so ids beyond `u64` survive the cache
/// file; numbers and `0x` strings are accepted when reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct TokenId(pub U256);

impl TokenId {
    /// Lowercase 64-digit hex form used for ERC-1155 `{id}` substitution
    pub fn to_hex64(&self) -> String {
        hex::encode(self.0.to_be_bytes::<32>())
    }
}

impl From<u64> for TokenId {
    fn from(id: u64) -> Self {
        Self(U256::from(id))
    }
}

impl FromStr for TokenId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            Some(hex) => U256::from_str_radix(hex, 16),
            None => U256::from_str_radix(s, 10),
        };
        parsed
            .map(TokenId)
            .map_err(|e| format!("invalid token id {:?}: {}", s, e))
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for TokenId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for TokenId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::String(s) => s.parse().map_err(de::Error::custom),
            Value::Number(n) => n
                .as_u64()
                .map(TokenId::from)
                .ok_or_else(|| de::Error::custom(format!("token id {} is not a u64", n))),
            other => Err(de::Error::custom(format!("invalid token id: {}", other))),
        }
    }
}

/// Token standard of a collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum TokenStandard {
    #[default]
    #[serde(rename = "ERC721")]
    Erc721,
    #[serde(rename = "ERC1155")]
    Erc1155,
}

impl fmt::Display for TokenStandard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenStandard::Erc721 => write!(f, "ERC721"),
            TokenStandard::Erc1155 => write!(f, "ERC1155"),
        }
    }
}

impl FromStr for TokenStandard {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().replace('-', "").as_str() {
            "ERC721" => Ok(TokenStandard::Erc721),
            "ERC1155" => Ok(TokenStandard::Erc1155),
            other => Err(format!("unknown token standard: {}", other)),
        }
    }
}

/// One `trait_type`/`value` pair from a metadata document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    pub trait_type: String,
    #[serde(deserialize_with = "string_or_scalar")]
    pub value: String,
}

impl Attribute {
    pub fn new(trait_type: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            trait_type: trait_type.into(),
            value: value.into(),
        }
    }

    /// Normalize a raw JSON attribute entry.
    /// Entries without a string `trait_type` are dropped.
    fn from_value(raw: &Value) -> Option<Self> {
        let trait_type = raw.get("trait_type")?.as_str()?.to_string();
        let value = raw.get("value").map(scalar_to_string).unwrap_or_default();
        Some(Self { trait_type, value })
    }
}

fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn string_or_scalar<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(scalar_to_string(&Value::deserialize(deserializer)?))
}

/// Normalize the `attributes` array of a metadata document
pub fn attributes_from_value(raw: Option<&Value>) -> Vec<Attribute> {
    raw.and_then(Value::as_array)
        .map(|entries| entries.iter().filter_map(Attribute::from_value).collect())
        .unwrap_or_default()
}

/// Bidding-relevant state of one token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    pub token_id: TokenId,
    /// Checksummed contract address
    pub contract_address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub schema: TokenStandard,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
}

impl Asset {
    /// Asset with no resolved metadata
    pub fn bare(token_id: TokenId, contract_address: &str, schema: TokenStandard) -> Self {
        Self {
            token_id,
            contract_address: contract_address.to_string(),
            title: None,
            schema,
            attributes: Vec::new(),
        }
    }

    /// Build an asset from a resolved metadata document
    pub fn from_metadata(metadata: &Metadata, contract_address: &str, schema: TokenStandard) -> Self {
        Self {
            token_id: metadata.token_id,
            contract_address: contract_address.to_string(),
            title: metadata.title(),
            schema,
            attributes: metadata.attributes(),
        }
    }

    pub fn has_attribute(&self, trait_type: &str, value: &str) -> bool {
        self.attributes
            .iter()
            .any(|a| a.trait_type == trait_type && a.value == value)
    }
}

/// A resolved metadata document with the token id injected as `tokenId`
#[derive(Debug, Clone, PartialEq)]
pub struct Metadata {
    pub token_id: TokenId,
    pub document: Value,
}

impl Metadata {
    pub fn title(&self) -> Option<String> {
        self.document
            .get("name")
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    pub fn attributes(&self) -> Vec<Attribute> {
        attributes_from_value(self.document.get("attributes"))
    }
}
