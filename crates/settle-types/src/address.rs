//! Addresses, assets and asset pairs.
//!
//! ```text
//! address  = user "@" mint                 e.g. alice@m0.example
//! asset    = address ":" code "." scale    e.g. alice@m0.example:USD.2
//! pair     = asset "/" asset
//! ```
//!
//! Mint names are resolvable host names (optionally with a port); user and
//! mint parts never contain whitespace, `/` or a second `@`.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Result, SettleError};

/// Maximum decimal scale an asset may declare.
pub const MAX_ASSET_SCALE: u8 = 24;

fn check_part(kind: &str, part: &str) -> Result<()> {
    if part.is_empty() {
        return Err(SettleError::invalid(format!("empty {kind}")));
    }
    if part
        .chars()
        .any(|c| c.is_whitespace() || c == '/' || c == '@')
    {
        return Err(SettleError::invalid(format!("illegal character in {kind}: {part}")));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Address
// ---------------------------------------------------------------------------

/// A `user@mint` address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address {
    user: String,
    mint: String,
}

impl Address {
    pub fn new(user: impl Into<String>, mint: impl Into<String>) -> Result<Self> {
        let (user, mint) = (user.into(), mint.into());
        check_part("user", &user)?;
        check_part("mint", &mint)?;
        Ok(Self { user, mint })
    }

    #[must_use]
    pub fn user(&self) -> &str {
        &self.user
    }

    /// The mint this address authenticates against.
    #[must_use]
    pub fn mint(&self) -> &str {
        &self.mint
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.user, self.mint)
    }
}

impl FromStr for Address {
    type Err = SettleError;

    fn from_str(s: &str) -> Result<Self> {
        let (user, mint) = s
            .split_once('@')
            .ok_or_else(|| SettleError::invalid(format!("address without mint: {s}")))?;
        Self::new(user, mint)
    }
}

impl TryFrom<String> for Address {
    type Error = SettleError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<Address> for String {
    fn from(a: Address) -> Self {
        a.to_string()
    }
}

// ---------------------------------------------------------------------------
// Asset
// ---------------------------------------------------------------------------

/// An asset `issuer@mint:code.scale`. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Asset {
    issuer: Address,
    code: String,
    scale: u8,
}

impl Asset {
    pub fn new(issuer: Address, code: impl Into<String>, scale: u8) -> Result<Self> {
        let code = code.into();
        if code.is_empty() || !code.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(SettleError::invalid(format!("bad asset code: {code:?}")));
        }
        if scale > MAX_ASSET_SCALE {
            return Err(SettleError::invalid(format!(
                "asset scale {scale} above {MAX_ASSET_SCALE}"
            )));
        }
        Ok(Self {
            issuer,
            code,
            scale,
        })
    }

    #[must_use]
    pub fn issuer(&self) -> &Address {
        &self.issuer
    }

    /// The mint that issues (and keeps the ledger of) this asset.
    #[must_use]
    pub fn mint(&self) -> &str {
        self.issuer.mint()
    }

    #[must_use]
    pub fn code(&self) -> &str {
        &self.code
    }

    #[must_use]
    pub fn scale(&self) -> u8 {
        self.scale
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}.{}", self.issuer, self.code, self.scale)
    }
}

impl FromStr for Asset {
    type Err = SettleError;

    fn from_str(s: &str) -> Result<Self> {
        let (issuer, rest) = s
            .rsplit_once(':')
            .ok_or_else(|| SettleError::invalid(format!("asset without code: {s}")))?;
        let (code, scale) = rest
            .rsplit_once('.')
            .ok_or_else(|| SettleError::invalid(format!("asset without scale: {s}")))?;
        let scale = scale
            .parse::<u8>()
            .map_err(|e| SettleError::invalid(format!("bad asset scale in {s}: {e}")))?;
        Self::new(issuer.parse()?, code, scale)
    }
}

impl TryFrom<String> for Asset {
    type Error = SettleError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<Asset> for String {
    fn from(a: Asset) -> Self {
        a.to_string()
    }
}

/// An asset registered on its issuing mint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetRecord {
    pub asset: Asset,
    pub owner: Address,
    pub created: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Pair
// ---------------------------------------------------------------------------

/// An ordered pair of assets, `base/quote`.
///
/// On an offer the owner sells `base` and buys `quote`. On a transaction
/// `base` is the asset the initiator sends and `quote` the asset the
/// destination receives.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Pair {
    pub base: Asset,
    pub quote: Asset,
}

impl Pair {
    #[must_use]
    pub fn new(base: Asset, quote: Asset) -> Self {
        Self { base, quote }
    }
}

impl fmt::Display for Pair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.base, self.quote)
    }
}

impl FromStr for Pair {
    type Err = SettleError;

    fn from_str(s: &str) -> Result<Self> {
        let (base, quote) = s
            .split_once('/')
            .ok_or_else(|| SettleError::invalid(format!("pair without '/': {s}")))?;
        Ok(Self::new(base.parse()?, quote.parse()?))
    }
}

impl TryFrom<String> for Pair {
    type Error = SettleError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<Pair> for String {
    fn from(p: Pair) -> Self {
        p.to_string()
    }
}
