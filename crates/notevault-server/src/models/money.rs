//! INR amounts.
//!
//! Prices are stored as NUMERIC and carried as `BigDecimal`, but the
//! storefront reads them as plain JSON numbers, so they serialize as f64.

use bigdecimal::{BigDecimal, RoundingMode, ToPrimitive, Zero};
use serde::{Deserialize, Deserializer, Serializer};
use std::str::FromStr;

/// Converts rupees to paise (the gateway's amount unit), rounding half away from zero.
pub fn to_paise(amount: &BigDecimal) -> Option<i64> {
    (amount * BigDecimal::from(100))
        .with_scale_round(0, RoundingMode::HalfUp)
        .to_i64()
}

/// Parses a user-supplied price. Empty input means free.
pub fn parse_price(raw: &str) -> Result<BigDecimal, String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(BigDecimal::zero());
    }
    let price = BigDecimal::from_str(raw).map_err(|e| format!("Invalid price: {}", e))?;
    if price < BigDecimal::zero() {
        return Err("Price must not be negative".to_string());
    }
    Ok(price.with_scale(2))
}

pub fn serialize<S: Serializer>(amount: &BigDecimal, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(amount.to_f64().unwrap_or_default())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(f64),
    Text(String),
}

pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<BigDecimal, D::Error> {
    match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Number(n) => BigDecimal::from_str(&n.to_string()),
        NumberOrString::Text(s) => BigDecimal::from_str(s.trim()),
    }
    .map_err(serde::de::Error::custom)
}

/// Optional amounts (e.g. partial refunds).
pub mod option {
    use super::*;

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<BigDecimal>, D::Error> {
        match Option::<NumberOrString>::deserialize(deserializer)? {
            None => Ok(None),
            Some(NumberOrString::Text(s)) if s.trim().is_empty() => Ok(None),
            Some(NumberOrString::Text(s)) => BigDecimal::from_str(s.trim())
                .map(Some)
                .map_err(serde::de::Error::custom),
            Some(NumberOrString::Number(n)) => BigDecimal::from_str(&n.to_string())
                .map(Some)
                .map_err(serde::de::Error::custom),
        }
    }
}
