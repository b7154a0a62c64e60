//! Token URI classification

use super::error::ResolutionErrorKind;
use reqwest::Url;

/// Where a token's metadata document lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenUri {
    /// `ipfs://[ipfs/]<cid><path>`
    Ipfs { cid: String, path: String },
    /// Plain `http(s)://` URL
    Http(String),
    /// Inline `data:<media type>[;base64],<payload>`
    Data {
        media_type: String,
        base64: bool,
        payload: String,
    },
}

impl TokenUri {
    pub fn parse(raw: &str) -> Result<Self, ResolutionErrorKind> {
        let raw = raw.trim();
        let (scheme, rest) = raw
            .split_once(':')
            .ok_or_else(|| ResolutionErrorKind::InvalidUri(format!("missing scheme in {:?}", raw)))?;

        match scheme.to_ascii_lowercase().as_str() {
            "ipfs" => Self::parse_ipfs(rest),
            "http" | "https" => Url::parse(raw)
                .map(|url| TokenUri::Http(url.to_string()))
                .map_err(|e| ResolutionErrorKind::InvalidUri(e.to_string())),
            "data" => Self::parse_data(rest),
            other => Err(ResolutionErrorKind::UnsupportedScheme(other.to_string())),
        }
    }

    fn parse_ipfs(rest: &str) -> Result<Self, ResolutionErrorKind> {
        let rest = rest.trim_start_matches('/');
        let rest = rest.strip_prefix("ipfs/").unwrap_or(rest);

        let (cid, path) = match rest.find('/') {
            Some(idx) => (&rest[..idx], &rest[idx..]),
            None => (rest, ""),
        };

        if cid.is_empty() {
            return Err(ResolutionErrorKind::InvalidUri("IPFS URI without CID".to_string()));
        }

        Ok(TokenUri::Ipfs {
            cid: cid.to_string(),
            path: path.to_string(),
        })
    }

    fn parse_data(rest: &str) -> Result<Self, ResolutionErrorKind> {
        let (header, payload) = rest
            .split_once(',')
            .ok_or_else(|| ResolutionErrorKind::InvalidUri("data URI without payload".to_string()))?;

        let mut parts = header.split(';');
        let media_type = parts.next().unwrap_or_default().trim().to_string();
        let base64 = parts.any(|p| p.trim().eq_ignore_ascii_case("base64"));

        Ok(TokenUri::Data {
            media_type,
            base64,
            payload: payload.to_string(),
        })
    }

    /// Candidate URL on one gateway host
    pub fn gateway_url(host: &str, cid: &str, path: &str) -> String {
        format!("{}/ipfs/{}{}", host.trim_end_matches('/'), cid, path)
    }

    /// Canonical public-gateway URL, reported when a gateway rejects the path
    pub fn canonical_ipfs_url(cid: &str, path: &str) -> String {
        Self::gateway_url("https://ipfs.io", cid, path)
    }
}
