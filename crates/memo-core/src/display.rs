//! Display helpers shared by frontends.
//!
//! Balances are formatted with integer arithmetic only, so values of any
//! size render exactly.

use chrono::{DateTime, TimeZone, Utc};

use crate::types::Balance;

/// Decimal separator used for display.
pub const DECIMAL_SEPARATOR: char = '.';

/// Default number of characters kept on each side by [`trim_address`].
pub const DEFAULT_TRIM_LENGTH: usize = 4;

/// Format a planck amount as a decimal token amount.
///
/// `n_decimals` limits the number of fractional digits (rounding half up);
/// `None` shows every digit the token supports.
pub fn format_balance(value: Balance, decimals: u8, n_decimals: Option<u8>) -> String {
    let decimals = u32::from(decimals);
    let shown = n_decimals.map(u32::from).unwrap_or(decimals);

    let Some(precision) = 10u128.checked_pow(decimals) else {
        return value.to_string();
    };

    let (integer, fraction) = if shown >= decimals {
        let fraction = format!(
            "{:0width$}",
            value % precision,
            width = decimals as usize
        );
        (value / precision, pad_right(fraction, shown as usize))
    } else {
        let scale = 10u128.pow(decimals - shown);
        let remainder = value % scale;
        let mut rounded = value / scale;
        if remainder >= scale - remainder {
            rounded += 1;
        }
        let shown_precision = 10u128.pow(shown);
        let fraction = format!(
            "{:0width$}",
            rounded % shown_precision,
            width = shown as usize
        );
        (rounded / shown_precision, fraction)
    };

    if shown == 0 {
        integer.to_string()
    } else {
        format!("{integer}{DECIMAL_SEPARATOR}{fraction}")
    }
}

/// Format a balance followed by its unit, e.g. `1.2500 KSM`.
pub fn format_balance_with_unit(
    value: Balance,
    decimals: u8,
    n_decimals: Option<u8>,
    unit: &str,
) -> String {
    format!("{} {}", format_balance(value, decimals, n_decimals), unit)
}

fn pad_right(mut digits: String, width: usize) -> String {
    while digits.len() < width {
        digits.push('0');
    }
    digits
}

/// Shorten an address to `head...tail`.
pub fn trim_address(address: &str, length: Option<usize>) -> String {
    let length = match length {
        Some(0) | None => DEFAULT_TRIM_LENGTH,
        Some(n) => n,
    };
    let chars: Vec<char> = address.chars().collect();
    if chars.len() <= length * 2 {
        return address.to_string();
    }
    let head: String = chars[..length].iter().collect();
    let tail: String = chars[chars.len() - length..].iter().collect();
    format!("{head}...{tail}")
}

/// Human readable "last updated" text, relative to `now`'s time zone.
///
/// Same-day updates show the time only.
pub fn format_last_updated<Tz>(updated: Option<DateTime<Utc>>, now: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let Some(updated) = updated else {
        return "Not yet updated".to_string();
    };
    let local = updated.with_timezone(&now.timezone());
    if local.date_naive() == now.date_naive() {
        local.format("%H:%M:%S").to_string()
    } else {
        local.format("%b %-d, %Y, %H:%M:%S").to_string()
    }
}
