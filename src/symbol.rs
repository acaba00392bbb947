//! Option symbol codec.
//!
//! Layout: `[XX:]<UNDERLYING><YYMMDD><C|P><STRIKE*1000, 8 digits>`, e.g.
//! `O:SE250808C00165000` is the SE call expiring 2025-08-08 struck at 165.
//! The underlying has no delimiter, so decoding needs its length from a hint.

use std::fmt;

use chrono::{Datelike, NaiveDate};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::constants::OPTION_TICKER_PREFIX;
use crate::error::{Error, Result};
use crate::types::ContractType;

const DATE_LEN: usize = 6;
const STRIKE_LEN: usize = 8;
const STRIKE_SCALE: u32 = 3;
const MAX_STRIKE_MILLIS: u64 = 99_999_999;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OptionSymbol {
    pub underlying: String,
    pub expiration: NaiveDate,
    pub contract_type: ContractType,
    /// Fixed-point, at most three decimals
    pub strike: Decimal,
}

impl OptionSymbol {
    pub fn new(
        underlying: impl Into<String>,
        expiration: NaiveDate,
        contract_type: ContractType,
        strike: Decimal,
    ) -> Self {
        Self {
            underlying: underlying.into(),
            expiration,
            contract_type,
            strike,
        }
    }

    /// Provider ticker: the encoded symbol with the `O:` prefix.
    pub fn ticker(&self) -> Result<String> {
        Ok(format!("{}{}", OPTION_TICKER_PREFIX, encode(self)?))
    }
}

impl fmt::Display for OptionSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {}",
            self.underlying, self.expiration, self.contract_type, self.strike
        )
    }
}

/// Strip an optional two-character provider prefix such as `O:`.
fn strip_provider_prefix(raw: &str) -> &str {
    match raw.as_bytes() {
        [_, b':', ..] => &raw[2..],
        _ => raw,
    }
}

fn parse_digits(field: &str, what: &str, raw: &str) -> Result<u64> {
    if field.is_empty() || !field.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::Format(format!("Invalid {} '{}' in symbol '{}'", what, field, raw)));
    }
    field
        .parse::<u64>()
        .map_err(|e| Error::Format(format!("Invalid {} in symbol '{}': {}", what, raw, e)))
}

/// Decode `raw` into its components. `underlying_hint` is the expected
/// underlying and fixes where the date begins.
pub fn decode(raw: &str, underlying_hint: &str) -> Result<OptionSymbol> {
    let body = strip_provider_prefix(raw);
    if !body.is_ascii() {
        return Err(Error::Format(format!("Non-ASCII symbol '{}'", raw)));
    }

    let date_start = underlying_hint.len();
    let type_idx = date_start + DATE_LEN;
    let strike_start = type_idx + 1;

    if body.len() != strike_start + STRIKE_LEN {
        return Err(Error::Format(format!(
            "Symbol '{}' has unexpected length for underlying '{}'",
            raw, underlying_hint
        )));
    }

    let underlying = &body[..date_start];
    if underlying != underlying_hint {
        return Err(Error::Format(format!(
            "Symbol underlying '{}' doesn't match expected '{}'",
            underlying, underlying_hint
        )));
    }

    let date = &body[date_start..type_idx];
    let yy = parse_digits(&date[0..2], "year", raw)?;
    let mm = parse_digits(&date[2..4], "month", raw)?;
    let dd = parse_digits(&date[4..6], "day", raw)?;
    let expiration = NaiveDate::from_ymd_opt(2000 + yy as i32, mm as u32, dd as u32)
        .ok_or_else(|| Error::Format(format!("Invalid expiration date in symbol '{}'", raw)))?;

    let code = body[type_idx..strike_start].chars().next().unwrap_or_default();
    let contract_type = ContractType::from_code(code)
        .ok_or_else(|| Error::Format(format!("Invalid contract type '{}' in symbol '{}'", code, raw)))?;

    let millis = parse_digits(&body[strike_start..], "strike", raw)?;
    let strike = Decimal::new(millis as i64, STRIKE_SCALE);

    Ok(OptionSymbol {
        underlying: underlying.to_string(),
        expiration,
        contract_type,
        strike,
    })
}

/// Encode without a provider prefix. Fails for values the fixed-width
/// layout cannot carry.
pub fn encode(symbol: &OptionSymbol) -> Result<String> {
    let year = symbol.expiration.year();
    if !(2000..=2099).contains(&year) {
        return Err(Error::Format(format!("Expiration year {} out of range", year)));
    }

    let millis = symbol.strike * Decimal::from(1000);
    if millis.is_sign_negative() || !millis.fract().is_zero() {
        return Err(Error::Format(format!(
            "Strike {} is negative or has more than three decimals",
            symbol.strike
        )));
    }
    let millis = millis
        .to_u64()
        .filter(|m| *m <= MAX_STRIKE_MILLIS)
        .ok_or_else(|| Error::Format(format!("Strike {} out of range", symbol.strike)))?;

    Ok(format!(
        "{}{:02}{:02}{:02}{}{:0width$}",
        symbol.underlying,
        year - 2000,
        symbol.expiration.month(),
        symbol.expiration.day(),
        symbol.contract_type.code(),
        millis,
        width = STRIKE_LEN,
    ))
}
