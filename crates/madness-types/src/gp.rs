//! GP amount parsing and formatting.
//!
//! Players type amounts the way the game displays them: `12,000`,
//! `250k`, `1.5m`, `2B`. The accepted grammar is `^[0-9,.]+[kmb]?$`
//! (case-insensitive). Suffixes are decimal multipliers (1e3, 1e6, 1e9)
//! and the math is done in [`Decimal`] so `1.1m` is exactly 1,100,000.
//! Fractions of a coin are truncated.

use core::str::FromStr;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

/// Parse a GP string, returning `None` if it does not match the grammar
/// or does not fit in a `u64`.
pub fn parse_gp(raw: &str) -> Option<u64> {
    let trimmed = raw.trim();
    let (digits, multiplier) = split_suffix(trimmed)?;

    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit() || c == ',' || c == '.') {
        return None;
    }

    let cleaned: String = digits.chars().filter(|&c| c != ',').collect();
    if cleaned.is_empty() || cleaned == "." {
        return None;
    }

    let value = Decimal::from_str(&cleaned).ok()?;
    value.checked_mul(multiplier)?.trunc().to_u64()
}

/// Split an optional `k`/`m`/`b` suffix off the amount.
fn split_suffix(raw: &str) -> Option<(&str, Decimal)> {
    let last = raw.chars().last()?;
    let multiplier = match last.to_ascii_lowercase() {
        'k' => Decimal::from(1_000_u64),
        'm' => Decimal::from(1_000_000_u64),
        'b' => Decimal::from(1_000_000_000_u64),
        _ => return Some((raw, Decimal::ONE)),
    };
    let digits = raw.get(..raw.len().saturating_sub(1))?;
    Some((digits, multiplier))
}

/// Format a GP amount with thousands separators (`1234567` -> `1,234,567`).
pub fn format_gp(gp: u64) -> String {
    let digits = gp.to_string();
    let mut out = String::with_capacity(digits.len().saturating_add(digits.len() / 3));
    let lead = digits.len() % 3;

    for (i, c) in digits.chars().enumerate() {
        if i != 0 && i % 3 == lead {
            out.push(',');
        }
        out.push(c);
    }

    out
}
