//! Attribute Filter

use crate::types::Asset;

/// Keep assets carrying one exact `trait_type`/`value` pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraitFilter {
    pub trait_type: String,
    pub value: String,
}

impl TraitFilter {
    pub fn new(trait_type: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            trait_type: trait_type.into(),
            value: value.into(),
        }
    }

    pub fn matches(&self, asset: &Asset) -> bool {
        asset.has_attribute(&self.trait_type, &self.value)
    }
}

/// Filter preserving input order; no filter keeps everything
pub fn apply(assets: Vec<Asset>, filter: Option<&TraitFilter>) -> Vec<Asset> {
    match filter {
        Some(f) => assets.into_iter().filter(|a| f.matches(a)).collect(),
        None => assets,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Attribute, TokenId, TokenStandard};

    fn asset(id: u64, trait_type: &str, value: &str) -> Asset {
        let mut a = Asset::bare(TokenId::from(id), "0xabc", TokenStandard::Erc721);
        a.attributes.push(Attribute::new(trait_type, value));
        a
    }

    #[test]
    fn test_hat_red() {
        let assets = vec![asset(0, "Hat", "Red"), asset(1, "Hat", "Blue")];
        let filtered = apply(assets.clone(), Some(&TraitFilter::new("Hat", "Red")));
        assert_eq!(filtered, vec![assets[0].clone()]);
    }

    #[test]
    fn test_both_fields_must_match_the_same_attribute() {
        let mut a = asset(0, "Hat", "Blue");
        a.attributes.push(Attribute::new("Shirt", "Red"));
        assert!(!TraitFilter::new("Hat", "Red").matches(&a));
        // Trait name used as value never matches
        assert!(!TraitFilter::new("Hat", "Hat").matches(&a));
    }

    #[test]
    fn test_no_filter_is_identity() {
        let assets = vec![asset(3, "Hat", "Red"), asset(1, "Fur", "Gold")];
        assert_eq!(apply(assets.clone(), None), assets);
    }
}
