//! Exact conversion between decimal currency amounts and base units

use crate::error::{GatewayError, GatewayResult};

use ethers::types::U256;
use lazy_static::lazy_static;
use regex::Regex;

/// Fractional digits of the native currency (1 ether = 10^18 wei)
pub const BASE_UNIT_DECIMALS: usize = 18;

lazy_static! {
    static ref DECIMAL_LITERAL: Regex = Regex::new(r"^([0-9]*)(?:\.([0-9]*))?$").unwrap();
}

/// Convert a non-negative decimal literal such as `"1.5"` into base units
pub fn to_base_units(amount: &str) -> GatewayResult<U256> {
    let trimmed = amount.trim();

    let caps = DECIMAL_LITERAL
        .captures(trimmed)
        .ok_or_else(|| GatewayError::Format(format!("`{}` is not a decimal number", amount)))?;

    let whole = caps.get(1).map_or("", |m| m.as_str());
    let fraction = caps.get(2).map_or("", |m| m.as_str());

    if whole.is_empty() && fraction.is_empty() {
        return Err(GatewayError::Format(format!(
            "`{}` is not a decimal number",
            amount
        )));
    }

    if fraction.len() > BASE_UNIT_DECIMALS {
        return Err(GatewayError::Precision {
            digits: fraction.len(),
            max: BASE_UNIT_DECIMALS,
        });
    }

    let digits = format!(
        "{}{:0<width$}",
        whole,
        fraction,
        width = BASE_UNIT_DECIMALS
    );

    U256::from_dec_str(&digits)
        .map_err(|_| GatewayError::Format(format!("`{}` does not fit in 256 bits", amount)))
}

/// Render base units as the shortest exact decimal literal
pub fn from_base_units(value: U256) -> String {
    let scale = U256::exp10(BASE_UNIT_DECIMALS);
    let whole = value / scale;
    let fraction = value % scale;

    if fraction.is_zero() {
        return whole.to_string();
    }

    let fraction = format!("{:0>width$}", fraction.to_string(), width = BASE_UNIT_DECIMALS);
    format!("{}.{}", whole, fraction.trim_end_matches('0'))
}
