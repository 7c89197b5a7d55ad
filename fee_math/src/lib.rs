//! Shared fee and bonus arithmetic for the Oasis vault and the OTC escrow.
//!
//! Everything here is pure integer math over `i128` base units. Fee rates
//! are expressed in basis points over a caller-chosen denominator (the
//! escrow uses 10_000, the vault uses 1_000) and extracted with ceiling
//! rounding so the protocol never under-collects by a fractional unit.
//! Bonus rates are a fixed table keyed by the timelock duration.

#![no_std]

/// Denominator for the timelock bonus table (rates are bps of 10_000).
pub const BONUS_DENOMINATOR: i128 = 10_000;

/// Ceiling fee extraction: `ceil(amount * bps / denom)`.
///
/// Returns `Some(0)` when `bps` or `amount` is non-positive, and `None`
/// when `denom` is non-positive or the product overflows `i128`.
pub fn ceil_fee(amount: i128, bps: i128, denom: i128) -> Option<i128> {
    if denom <= 0 {
        return None;
    }
    if bps <= 0 || amount <= 0 {
        return Some(0);
    }
    let numerator = amount.checked_mul(bps)?.checked_add(denom - 1)?;
    Some(numerator / denom)
}

/// Bonus rate in bps of [`BONUS_DENOMINATOR`] for a timelock duration.
///
/// Only 6, 9, and 12 months are valid; anything else is a hard failure
/// at the call site.
pub fn bonus_rate_bps(timelock_months: u32) -> Option<i128> {
    match timelock_months {
        6 => Some(1_000),
        9 => Some(1_500),
        12 => Some(2_000),
        _ => None,
    }
}

/// Bonus granted for locking `amount` for `timelock_months`:
/// `amount * rate / 10_000`, floored.
pub fn timelock_bonus(timelock_months: u32, amount: i128) -> Option<i128> {
    let rate = bonus_rate_bps(timelock_months)?;
    if amount <= 0 {
        return Some(0);
    }
    Some(amount.checked_mul(rate)? / BONUS_DENOMINATOR)
}
