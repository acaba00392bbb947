//! Strike / expiration-year window over discovered contracts.

use chrono::Datelike;

use crate::error::Result;
use crate::symbol;
use crate::types::{Contract, PriceRange, YearRange};

/// Keep contracts whose strike lies in `price_range` and whose decoded
/// expiration year lies in `year_range`. Bounds are inclusive and a missing
/// range places no constraint.
pub fn within_range(
    contracts: Vec<Contract>,
    price_range: Option<PriceRange>,
    year_range: Option<YearRange>,
) -> Result<Vec<Contract>> {
    let mut kept = Vec::with_capacity(contracts.len());

    for contract in contracts {
        if let Some(range) = price_range {
            if !range.contains(contract.strike) {
                continue;
            }
        }

        if let Some(range) = year_range {
            let decoded = symbol::decode(&contract.ticker, &contract.underlying)?;
            if !range.contains(decoded.expiration.year()) {
                continue;
            }
        }

        kept.push(contract);
    }

    Ok(kept)
}
