//! Integer helpers for share accounting and basis merging.
//!
//! Liquidity shares are scaled by 10^20, so products routinely exceed
//! i128; the helpers route intermediates through U256 and floor every
//! division, matching the accounting semantics of the vault.

use crate::error::VaultError;
use crate::storage::{MIN_RELOCK_SECONDS, MONTH_SECONDS};
use soroban_sdk::{Env, U256};

fn to_u256(env: &Env, value: i128) -> Result<U256, VaultError> {
    if value < 0 {
        return Err(VaultError::Overflow);
    }
    Ok(U256::from_u128(env, value as u128))
}

fn to_i128(value: &U256) -> Result<i128, VaultError> {
    let v = value.to_u128().ok_or(VaultError::Overflow)?;
    if v > i128::MAX as u128 {
        return Err(VaultError::Overflow);
    }
    Ok(v as i128)
}

/// `a * b / denom` with a 256-bit intermediate product, floored.
pub fn mul_div_floor(env: &Env, a: i128, b: i128, denom: i128) -> Result<i128, VaultError> {
    if denom <= 0 {
        return Err(VaultError::Overflow);
    }
    let product = to_u256(env, a)?.mul(&to_u256(env, b)?);
    to_i128(&product.div(&to_u256(env, denom)?))
}

/// Weight-averaged merge of two non-negative values:
/// `(old*old_weight + new*new_weight) / (old_weight + new_weight)`, floored.
pub fn weighted_average(
    env: &Env,
    old_value: i128,
    old_weight: i128,
    new_value: i128,
    new_weight: i128,
) -> Result<i128, VaultError> {
    let total_weight = old_weight
        .checked_add(new_weight)
        .ok_or(VaultError::Overflow)?;
    if total_weight <= 0 {
        return Err(VaultError::Overflow);
    }
    let numerator = to_u256(env, old_value)?
        .mul(&to_u256(env, old_weight)?)
        .add(&to_u256(env, new_value)?.mul(&to_u256(env, new_weight)?));
    to_i128(&numerator.div(&to_u256(env, total_weight)?))
}

/// Merge an existing position's unlock time with a new deposit's lock.
///
/// The remaining lock duration (which may already have run out, hence the
/// signed arithmetic and euclidean floor) and the requested lock are
/// averaged weighted by the respective principal amounts. The result is
/// clamped to at least four months from now, so a repeat deposit can only
/// extend the effective unlock, and one second is added for safe rounding.
pub fn merge_unlock_time(
    now: u64,
    current_unlock: u64,
    old_deposit: i128,
    new_lock_months: u32,
    new_deposit: i128,
) -> Result<u64, VaultError> {
    let total = old_deposit
        .checked_add(new_deposit)
        .ok_or(VaultError::Overflow)?;
    if total <= 0 {
        return Err(VaultError::Overflow);
    }

    let remaining = (current_unlock as i128) - (now as i128);
    let new_lock_secs = (new_lock_months as i128) * (MONTH_SECONDS as i128);
    let numerator = remaining
        .checked_mul(old_deposit)
        .ok_or(VaultError::Overflow)?
        .checked_add(
            new_lock_secs
                .checked_mul(new_deposit)
                .ok_or(VaultError::Overflow)?,
        )
        .ok_or(VaultError::Overflow)?;
    let weighted = numerator.div_euclid(total);

    let lock_secs = weighted.max(MIN_RELOCK_SECONDS as i128) as u64;
    Ok(now + lock_secs + 1)
}
