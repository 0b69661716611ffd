//! Hop layout of a transaction path.
//!
//! A path of `n` offers yields `n + 1` hops:
//!
//! ```text
//!   hop 0   initiating mint   initiator ──amount──▶ path[0].owner      (source asset)
//!   hop i   mint of path[i-1] path[i-1].owner ──out_i──▶ path[i].owner (path[i-1] base)
//!   hop n   mint of path[n-1] path[n-1].owner ──out_n──▶ destination   (destination asset)
//! ```
//!
//! `out_0 = amount` and `out_i = price(path[i-1]).apply(out_{i-1})`, rounded
//! down, so the offer owner absorbs any rounding deficit.

use settle_types::{
    Address, Amount, Asset, Offer, Pair, Result, SettleError, constants::MAX_PATH_LENGTH,
};

/// One planned hop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HopPlan {
    pub hop: u8,
    /// Mint keeping the records of this hop.
    pub mint: String,
    /// The crossed offer; `None` for hop 0.
    pub offer: Option<Offer>,
    /// Asset moved by the hop's operation.
    pub asset: Asset,
    /// Quote units flowing into the hop (equal to `amount` for hop 0).
    pub amount_in: Amount,
    /// Units of `asset` moved from `source` to `destination`.
    pub amount: Amount,
    pub source: Address,
    pub destination: Address,
}

/// Every hop of a transaction, in path order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub hops: Vec<HopPlan>,
}

impl Route {
    /// Amount arriving at the destination.
    #[must_use]
    pub fn delivered(&self) -> Amount {
        self.hops.last().map_or(Amount::ZERO, |h| h.amount)
    }

    /// Hops whose records live on `mint`.
    pub fn hops_on<'a>(&'a self, mint: &'a str) -> impl Iterator<Item = &'a HopPlan> + 'a {
        self.hops.iter().filter(move |h| h.mint == mint)
    }
}

fn invalid_path(reason: impl Into<String>) -> SettleError {
    SettleError::PathInvalid {
        reason: reason.into(),
    }
}

/// Validate a path against `pair` and compute every hop.
///
/// `pair.base` is the source asset and `pair.quote` the destination asset.
/// Offers may be canonical or propagated copies; their status is not
/// checked here.
pub fn plan_route(
    initiator: &Address,
    pair: &Pair,
    amount: Amount,
    destination: &Address,
    path: &[Offer],
) -> Result<Route> {
    if amount.is_zero() {
        return Err(SettleError::InvalidRequest {
            reason: "amount must be positive".into(),
        });
    }
    if path.len() > MAX_PATH_LENGTH {
        return Err(invalid_path(format!(
            "{} offers exceed the limit of {MAX_PATH_LENGTH}",
            path.len()
        )));
    }
    if pair.base.mint() != initiator.mint() {
        return Err(SettleError::InvalidRequest {
            reason: format!(
                "source asset {} is not issued on the initiating mint {}",
                pair.base,
                initiator.mint()
            ),
        });
    }

    let Some(first) = path.first() else {
        if pair.base != pair.quote {
            return Err(invalid_path(format!(
                "empty path cannot convert {} into {}",
                pair.base, pair.quote
            )));
        }
        return Ok(Route {
            hops: vec![HopPlan {
                hop: 0,
                mint: initiator.mint().to_owned(),
                offer: None,
                asset: pair.base.clone(),
                amount_in: amount,
                amount,
                source: initiator.clone(),
                destination: destination.clone(),
            }],
        });
    };

    let mut expected_quote = &pair.base;
    for (i, offer) in path.iter().enumerate() {
        if &offer.pair.quote != expected_quote {
            return Err(invalid_path(format!(
                "offer {} at position {i} buys {} but receives {}",
                offer.id, offer.pair.quote, expected_quote
            )));
        }
        if offer.pair.base.mint() != offer.mint() {
            return Err(invalid_path(format!(
                "offer {} sells {} which is not issued on its owner's mint {}",
                offer.id,
                offer.pair.base,
                offer.mint()
            )));
        }
        expected_quote = &offer.pair.base;
    }
    if expected_quote != &pair.quote {
        return Err(invalid_path(format!(
            "path ends in {expected_quote}, destination asset is {}",
            pair.quote
        )));
    }

    let recipient = |i: usize| -> Address {
        path.get(i)
            .map_or_else(|| destination.clone(), |o| o.owner.clone())
    };

    let mut hops = Vec::with_capacity(path.len() + 1);
    hops.push(HopPlan {
        hop: 0,
        mint: initiator.mint().to_owned(),
        offer: None,
        asset: pair.base.clone(),
        amount_in: amount,
        amount,
        source: initiator.clone(),
        destination: first.owner.clone(),
    });

    let mut flowing = amount;
    for (i, offer) in path.iter().enumerate() {
        let out = offer.price.apply(flowing)?;
        if out.is_zero() {
            return Err(invalid_path(format!(
                "offer {} pays nothing for {flowing} at {}",
                offer.id, offer.price
            )));
        }
        let hop = u8::try_from(i + 1)
            .map_err(|_| invalid_path("too many hops"))?;
        hops.push(HopPlan {
            hop,
            mint: offer.mint().to_owned(),
            offer: Some(offer.clone()),
            asset: offer.pair.base.clone(),
            amount_in: flowing,
            amount: out,
            source: offer.owner.clone(),
            destination: recipient(i + 1),
        });
        flowing = out;
    }

    Ok(Route { hops })
}
