//! Exact conversions between display amounts and base units.
//!
//! Amounts typed by a user are decimal strings. They are scaled by `10^decimals`
//! with integer arithmetic only, so `"0.1"` USDT is always exactly `100000` base
//! units and never `99999`.

use alloy_primitives::{Address, U256};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AmountError {
    #[error("amount is empty")]
    Empty,

    #[error("{0:?} is not a plain decimal number")]
    Malformed(String),

    #[error("at most {decimals} decimal places are allowed")]
    TooPrecise { decimals: u8 },

    #[error("amount does not fit in 256 bits")]
    Overflow,
}

/// Parses a non-negative decimal string into base units.
///
/// Accepts `"12"`, `"12.5"`, `".5"` and `"12."`. Signs, exponents, separators and
/// whitespace inside the number are rejected. Fractional digits beyond `decimals`
/// are only accepted when they are all zero.
pub fn parse_units(amount: &str, decimals: u8) -> Result<U256, AmountError> {
    let amount = amount.trim();
    if amount.is_empty() {
        return Err(AmountError::Empty);
    }

    let (whole, fraction) = match amount.split_once('.') {
        Some((whole, fraction)) => (whole, fraction),
        None => (amount, ""),
    };
    let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if (whole.is_empty() && fraction.is_empty()) || !all_digits(whole) || !all_digits(fraction) {
        return Err(AmountError::Malformed(amount.to_string()));
    }

    let decimals_len = decimals as usize;
    let fraction = if fraction.len() > decimals_len {
        let (kept, excess) = fraction.split_at(decimals_len);
        if excess.bytes().any(|b| b != b'0') {
            return Err(AmountError::TooPrecise { decimals });
        }
        kept
    } else {
        fraction
    };

    let mut digits = String::with_capacity(whole.len() + decimals_len);
    digits.push_str(whole);
    digits.push_str(fraction);
    digits.extend(std::iter::repeat('0').take(decimals_len - fraction.len()));
    let digits = digits.trim_start_matches('0');
    if digits.is_empty() {
        return Ok(U256::ZERO);
    }

    U256::from_str_radix(digits, 10).map_err(|_| AmountError::Overflow)
}

/// Renders base units as a display amount, trimming trailing fractional zeros.
pub fn format_units(value: U256, decimals: u8) -> String {
    let digits = value.to_string();
    let decimals = decimals as usize;
    if decimals == 0 {
        return digits;
    }

    let padded = if digits.len() <= decimals {
        format!("{}{}", "0".repeat(decimals - digits.len() + 1), digits)
    } else {
        digits
    };
    let (whole, fraction) = padded.split_at(padded.len() - decimals);
    let fraction = fraction.trim_end_matches('0');
    if fraction.is_empty() {
        whole.to_string()
    } else {
        format!("{whole}.{fraction}")
    }
}

/// `0x83d4...c37d` form used next to each comment.
pub fn short_address(address: &Address) -> String {
    let full = address.to_checksum(None);
    format!("{}...{}", &full[..6], &full[full.len() - 4..])
}
