#![no_std]

mod error;
mod math;
mod pool;
mod storage;

use error::VaultError;
use fee_math::{bonus_rate_bps, ceil_fee, timelock_bonus};
use math::{merge_unlock_time, mul_div_floor, weighted_average};
use pool::{PoolKey, PoolManagerClient, PoolPosition};
use soroban_sdk::{contract, contractimpl, token, Address, Env};
use storage::{
    DataKey, Position, UserInfo, VaultInfo, MAX_PROTOCOL_FEE, MONTH_SECONDS, PRECISION,
    PRICE_PRECISION, PROTOCOL_FEE_DENOMINATOR,
};

/// Oasis Vault Contract
///
/// Accepts single-sided quote-token deposits, converts them into a
/// two-sided position at an external AMM pool manager, grants a
/// time-locked HTR bonus out of its own reserve, and settles positions
/// with impermanent-loss protection when they close.
///
/// Key features:
/// - HTR reserve funded by the dev/owner, debited for bonuses and IL
///   compensation
/// - Proportional liquidity ledger scaled by 10^20 shared across users
/// - Deposit merging: amount-weighted price bases and a
///   remaining-time-weighted unlock schedule with a 4-month floor
/// - Two-step exit: close_position settles against live pool reserves,
///   user_withdraw drains the closed balances and resets the record
#[contract]
pub struct OasisVault;

#[contractimpl]
impl OasisVault {
    /// Initialize the vault. The caller becomes dev (immutable) and the
    /// initial owner, and seeds the HTR reserve with `initial_reserve`.
    ///
    /// # Arguments
    /// * `pool_manager` - External AMM manager holding the HTR/quote pool
    /// * `htr_token` / `quote_token` - The pool pair; deposits are quote-side
    /// * `pool_fee` - Fee tier identifying the pool at the manager
    /// * `protocol_fee` - Deposit fee in per mille, bounded by 500 (50%)
    pub fn initialize(
        env: Env,
        dev: Address,
        pool_manager: Address,
        htr_token: Address,
        quote_token: Address,
        pool_fee: u32,
        protocol_fee: i128,
        initial_reserve: i128,
    ) -> Result<(), VaultError> {
        if env.storage().instance().has(&DataKey::Dev) {
            return Err(VaultError::AlreadyInitialized);
        }
        if !(0..=MAX_PROTOCOL_FEE).contains(&protocol_fee) {
            return Err(VaultError::InvalidProtocolFee);
        }
        if initial_reserve <= 0 {
            return Err(VaultError::InvalidAmount);
        }

        dev.require_auth();
        token::Client::new(&env, &htr_token).transfer(
            &dev,
            &env.current_contract_address(),
            &initial_reserve,
        );

        env.storage().instance().set(&DataKey::Dev, &dev);
        env.storage().instance().set(&DataKey::Owner, &dev);
        env.storage()
            .instance()
            .set(&DataKey::PoolManager, &pool_manager);
        env.storage().instance().set(&DataKey::HtrToken, &htr_token);
        env.storage()
            .instance()
            .set(&DataKey::QuoteToken, &quote_token);
        env.storage().instance().set(&DataKey::PoolFee, &pool_fee);
        env.storage()
            .instance()
            .set(&DataKey::ProtocolFee, &protocol_fee);
        env.storage().instance().set(&DataKey::Paused, &false);
        env.storage()
            .instance()
            .set(&DataKey::HtrBalance, &initial_reserve);
        env.storage()
            .instance()
            .set(&DataKey::TotalLiquidity, &0i128);

        Ok(())
    }

    /// Dev or owner tops up the HTR reserve.
    pub fn owner_deposit(env: Env, caller: Address, amount: i128) -> Result<(), VaultError> {
        Self::require_initialized(&env)?;
        Self::require_not_paused(&env)?;
        Self::require_dev_or_owner(&env, &caller)?;
        if amount <= 0 {
            return Err(VaultError::InvalidAmount);
        }

        caller.require_auth();
        let htr_token = Self::htr_token(&env)?;
        token::Client::new(&env, &htr_token).transfer(
            &caller,
            &env.current_contract_address(),
            &amount,
        );

        let reserve = Self::htr_balance(&env)?;
        Self::set_htr_balance(&env, reserve.checked_add(amount).ok_or(VaultError::Overflow)?);
        Ok(())
    }

    /// Owner-only: withdraw uncommitted HTR from the reserve.
    pub fn owner_withdraw(env: Env, caller: Address, amount: i128) -> Result<(), VaultError> {
        Self::require_initialized(&env)?;
        Self::require_not_paused(&env)?;
        let owner = Self::owner(&env)?;
        if caller != owner {
            return Err(VaultError::Unauthorized);
        }
        if amount <= 0 {
            return Err(VaultError::InvalidAmount);
        }

        let reserve = Self::htr_balance(&env)?;
        if amount > reserve {
            return Err(VaultError::WithdrawalTooHigh);
        }

        caller.require_auth();
        let htr_token = Self::htr_token(&env)?;
        token::Client::new(&env, &htr_token).transfer(
            &env.current_contract_address(),
            &caller,
            &amount,
        );
        Self::set_htr_balance(&env, reserve - amount);
        Ok(())
    }

    /// Dev or current owner hands the owner role to a new address.
    /// Deliberately not gated by the pause flag so control can move while
    /// the vault is frozen.
    pub fn update_owner_address(
        env: Env,
        caller: Address,
        new_owner: Address,
    ) -> Result<(), VaultError> {
        Self::require_initialized(&env)?;
        Self::require_dev_or_owner(&env, &caller)?;
        caller.require_auth();
        env.storage().instance().set(&DataKey::Owner, &new_owner);
        Ok(())
    }

    /// Dev-only: withdraw accrued protocol fees (quote token).
    pub fn dev_withdraw_fee(env: Env, caller: Address, amount: i128) -> Result<(), VaultError> {
        Self::require_initialized(&env)?;
        Self::require_not_paused(&env)?;
        let dev = Self::dev(&env)?;
        if caller != dev {
            return Err(VaultError::Unauthorized);
        }
        if amount <= 0 {
            return Err(VaultError::InvalidAmount);
        }

        let mut pos = Self::position(&env, &dev);
        if amount > pos.balance_b {
            return Err(VaultError::WithdrawalTooHigh);
        }

        caller.require_auth();
        let quote_token = Self::quote_token(&env)?;
        token::Client::new(&env, &quote_token).transfer(
            &env.current_contract_address(),
            &caller,
            &amount,
        );
        pos.balance_b -= amount;
        Self::save_position(&env, &dev, &pos);
        Ok(())
    }

    /// Dev-only: update the deposit protocol fee (per mille, max 500).
    pub fn update_protocol_fee(env: Env, caller: Address, new_fee: i128) -> Result<(), VaultError> {
        Self::require_initialized(&env)?;
        Self::require_not_paused(&env)?;
        let dev = Self::dev(&env)?;
        if caller != dev {
            return Err(VaultError::Unauthorized);
        }
        if !(0..=MAX_PROTOCOL_FEE).contains(&new_fee) {
            return Err(VaultError::InvalidProtocolFee);
        }
        caller.require_auth();
        env.storage().instance().set(&DataKey::ProtocolFee, &new_fee);
        Ok(())
    }

    /// Deposit quote tokens under a 6/9/12-month timelock.
    ///
    /// The net deposit (after the protocol fee) is quoted into HTR at the
    /// pool manager, both sides are supplied from the vault, a bonus is
    /// granted from the reserve, and the position's liquidity share,
    /// price bases, and unlock schedule are created or merged.
    pub fn user_deposit(
        env: Env,
        user: Address,
        amount: i128,
        timelock: u32,
    ) -> Result<(), VaultError> {
        Self::require_initialized(&env)?;
        Self::require_not_paused(&env)?;
        if bonus_rate_bps(timelock).is_none() {
            return Err(VaultError::InvalidTimelock);
        }
        if amount <= 0 {
            return Err(VaultError::InvalidAmount);
        }

        let mut pos = Self::position(&env, &user);
        if pos.position_closed {
            return Err(VaultError::WithdrawPending);
        }

        let protocol_fee = Self::protocol_fee(&env)?;
        let fee = ceil_fee(amount, protocol_fee, PROTOCOL_FEE_DENOMINATOR)
            .ok_or(VaultError::Overflow)?;
        let net = amount - fee;
        if net <= 0 {
            return Err(VaultError::InvalidAmount);
        }

        let manager_addr = Self::pool_manager(&env)?;
        let manager = PoolManagerClient::new(&env, &manager_addr);
        let key = Self::pool_key(&env)?;
        let quote_token = Self::quote_token(&env)?;
        let htr_token = Self::htr_token(&env)?;

        let htr_amount = manager.quote_add_liquidity_in(&quote_token, &net, &key);
        if htr_amount <= 0 {
            return Err(VaultError::InvalidQuote);
        }

        let bonus = timelock_bonus(timelock, htr_amount).ok_or(VaultError::InvalidTimelock)?;
        let reserve = Self::htr_balance(&env)?;
        let committed = htr_amount.checked_add(bonus).ok_or(VaultError::Overflow)?;
        if reserve < committed {
            return Err(VaultError::InsufficientReserve);
        }

        user.require_auth();
        let vault = env.current_contract_address();
        token::Client::new(&env, &quote_token).transfer(&user, &vault, &amount);

        // The vault's quote-side pool reserve before this deposit is the
        // denominator for proportional share minting.
        let pooled_before: PoolPosition = manager.position_of(&vault, &key);
        manager.add_liquidity(&vault, &key, &htr_amount, &net);

        let total = Self::total_liquidity(&env)?;
        let minted = if total == 0 {
            net.checked_mul(PRECISION).ok_or(VaultError::Overflow)?
        } else {
            if pooled_before.reserve_b <= 0 {
                return Err(VaultError::InvalidQuote);
            }
            mul_div_floor(&env, total, net, pooled_before.reserve_b)?
        };
        pos.liquidity = pos
            .liquidity
            .checked_add(minted)
            .ok_or(VaultError::Overflow)?;
        Self::set_total_liquidity(&env, total.checked_add(minted).ok_or(VaultError::Overflow)?);

        let now = env.ledger().timestamp();
        let htr_price_now = manager.token_price_in_reference(&htr_token);
        let token_price_now = mul_div_floor(&env, net, PRICE_PRECISION, htr_amount)?;
        if pos.deposit_b == 0 {
            pos.htr_price_in_deposit = htr_price_now;
            pos.token_price_in_htr_in_deposit = token_price_now;
            pos.withdrawal_time = now + (timelock as u64) * MONTH_SECONDS;
        } else {
            pos.htr_price_in_deposit = weighted_average(
                &env,
                pos.htr_price_in_deposit,
                pos.deposit_b,
                htr_price_now,
                net,
            )?;
            pos.token_price_in_htr_in_deposit = weighted_average(
                &env,
                pos.token_price_in_htr_in_deposit,
                pos.deposit_b,
                token_price_now,
                net,
            )?;
            pos.withdrawal_time =
                merge_unlock_time(now, pos.withdrawal_time, pos.deposit_b, timelock, net)?;
        }

        pos.balance_a = pos
            .balance_a
            .checked_add(bonus)
            .ok_or(VaultError::Overflow)?;
        pos.deposit_b = pos.deposit_b.checked_add(net).ok_or(VaultError::Overflow)?;
        Self::set_htr_balance(&env, reserve - committed);

        // The protocol fee accrues in the dev's quote-token bucket.
        if fee > 0 {
            let dev = Self::dev(&env)?;
            if dev == user {
                pos.balance_b = pos.balance_b.checked_add(fee).ok_or(VaultError::Overflow)?;
            } else {
                let mut dev_pos = Self::position(&env, &dev);
                dev_pos.balance_b = dev_pos
                    .balance_b
                    .checked_add(fee)
                    .ok_or(VaultError::Overflow)?;
                Self::save_position(&env, &dev, &dev_pos);
            }
        }
        Self::save_position(&env, &user, &pos);
        Ok(())
    }

    /// Withdraw some or all of the unclaimed HTR bonus of an open position.
    pub fn user_withdraw_bonus(env: Env, user: Address, amount: i128) -> Result<(), VaultError> {
        Self::require_initialized(&env)?;
        Self::require_not_paused(&env)?;
        if amount <= 0 {
            return Err(VaultError::InvalidAmount);
        }

        let mut pos = Self::position(&env, &user);
        if pos.position_closed {
            return Err(VaultError::PositionAlreadyClosed);
        }
        if amount > pos.balance_a {
            return Err(VaultError::WithdrawalTooHigh);
        }

        user.require_auth();
        let htr_token = Self::htr_token(&env)?;
        token::Client::new(&env, &htr_token).transfer(
            &env.current_contract_address(),
            &user,
            &amount,
        );
        pos.balance_a -= amount;
        Self::save_position(&env, &user, &pos);
        Ok(())
    }

    /// Settle the caller's position against the current pool reserves.
    ///
    /// Only possible at or after the unlock time. The vault's pooled
    /// position is unwound proportionally to the caller's liquidity
    /// share; the HTR side returns to the reserve, and a quote-token
    /// quantity shortfall relative to the recorded principal is
    /// compensated in HTR at the close-time pool price, capped by the
    /// reserve. Quantity gains are never clawed back.
    pub fn close_position(env: Env, user: Address) -> Result<(), VaultError> {
        Self::require_initialized(&env)?;
        Self::require_not_paused(&env)?;

        let mut pos = Self::position(&env, &user);
        if pos.position_closed {
            return Err(VaultError::PositionAlreadyClosed);
        }
        if pos.liquidity <= 0 {
            return Err(VaultError::NoPosition);
        }
        let now = env.ledger().timestamp();
        if now < pos.withdrawal_time {
            return Err(VaultError::PositionLocked);
        }

        user.require_auth();

        let total = Self::total_liquidity(&env)?;
        if total <= 0 {
            return Err(VaultError::StorageCorrupted);
        }

        let manager_addr = Self::pool_manager(&env)?;
        let manager = PoolManagerClient::new(&env, &manager_addr);
        let key = Self::pool_key(&env)?;
        let vault = env.current_contract_address();

        let pooled: PoolPosition = manager.position_of(&vault, &key);
        let share_a = mul_div_floor(&env, pooled.reserve_a, pos.liquidity, total)?;
        let share_b = mul_div_floor(&env, pooled.reserve_b, pos.liquidity, total)?;
        manager.remove_liquidity(&vault, &key, &share_a, &share_b);

        // The withdrawn HTR side flows back into the reserve before any
        // compensation is paid out of it.
        let mut reserve = Self::htr_balance(&env)?
            .checked_add(share_a)
            .ok_or(VaultError::Overflow)?;

        let mut compensation = 0i128;
        if share_b < pos.deposit_b {
            let shortfall = pos.deposit_b - share_b;
            let quote_token = Self::quote_token(&env)?;
            let price = manager.token_price_in_reference(&quote_token);
            if price > 0 {
                compensation = mul_div_floor(&env, shortfall, price, PRICE_PRECISION)?;
                if compensation > reserve {
                    compensation = reserve;
                }
            }
        }
        reserve -= compensation;

        Self::set_htr_balance(&env, reserve);
        Self::set_total_liquidity(&env, total - pos.liquidity);

        pos.closed_balance_a = pos
            .balance_a
            .checked_add(compensation)
            .ok_or(VaultError::Overflow)?;
        pos.closed_balance_b = share_b;
        pos.balance_a = 0;
        pos.deposit_b = 0;
        pos.liquidity = 0;
        pos.position_closed = true;
        Self::save_position(&env, &user, &pos);
        Ok(())
    }

    /// Drain a closed position, partially or in full.
    ///
    /// Each requested amount must not exceed the corresponding closed
    /// balance. Once both balances reach zero the record resets and the
    /// user can start a fresh deposit cycle.
    pub fn user_withdraw(
        env: Env,
        user: Address,
        htr_amount: i128,
        token_amount: i128,
    ) -> Result<(), VaultError> {
        Self::require_initialized(&env)?;
        Self::require_not_paused(&env)?;

        let mut pos = Self::position(&env, &user);
        if !pos.position_closed {
            return Err(VaultError::PositionNotClosed);
        }
        if htr_amount < 0 || token_amount < 0 {
            return Err(VaultError::InvalidAmount);
        }
        if htr_amount == 0 && token_amount == 0 {
            return Err(VaultError::InvalidAmount);
        }
        if htr_amount > pos.closed_balance_a {
            return Err(VaultError::InsufficientHtrBalance);
        }
        if token_amount > pos.closed_balance_b {
            return Err(VaultError::InsufficientTokenBalance);
        }

        user.require_auth();
        let vault = env.current_contract_address();
        if htr_amount > 0 {
            let htr_token = Self::htr_token(&env)?;
            token::Client::new(&env, &htr_token).transfer(&vault, &user, &htr_amount);
            pos.closed_balance_a -= htr_amount;
        }
        if token_amount > 0 {
            let quote_token = Self::quote_token(&env)?;
            token::Client::new(&env, &quote_token).transfer(&vault, &user, &token_amount);
            pos.closed_balance_b -= token_amount;
        }

        if pos.closed_balance_a == 0 && pos.closed_balance_b == 0 {
            // The record resets for a fresh cycle; the dev's fee bucket
            // is not part of the position lifecycle.
            let fee_bucket = pos.balance_b;
            pos = Position::empty();
            pos.balance_b = fee_bucket;
        }
        Self::save_position(&env, &user, &pos);
        Ok(())
    }

    /// Dev-only: freeze every mutating entry point except unpause and
    /// owner handover.
    pub fn pause(env: Env, caller: Address) -> Result<(), VaultError> {
        Self::require_initialized(&env)?;
        let dev = Self::dev(&env)?;
        if caller != dev {
            return Err(VaultError::Unauthorized);
        }
        caller.require_auth();
        env.storage().instance().set(&DataKey::Paused, &true);
        Ok(())
    }

    /// Dev-only: lift the pause.
    pub fn unpause(env: Env, caller: Address) -> Result<(), VaultError> {
        Self::require_initialized(&env)?;
        let dev = Self::dev(&env)?;
        if caller != dev {
            return Err(VaultError::Unauthorized);
        }
        caller.require_auth();
        env.storage().instance().set(&DataKey::Paused, &false);
        Ok(())
    }

    /// One user's position plus the vault globals.
    pub fn user_info(env: Env, address: Address) -> Result<UserInfo, VaultError> {
        Self::require_initialized(&env)?;
        let pos = Self::position(&env, &address);
        let total = Self::total_liquidity(&env)?;

        let user_lp_b = if pos.liquidity > 0 && total > 0 {
            let manager_addr = Self::pool_manager(&env)?;
            let manager = PoolManagerClient::new(&env, &manager_addr);
            let key = Self::pool_key(&env)?;
            let pooled: PoolPosition = manager.position_of(&env.current_contract_address(), &key);
            mul_div_floor(&env, pooled.reserve_b, pos.liquidity, total)?
        } else {
            0
        };

        Ok(UserInfo {
            user_deposit_b: pos.deposit_b,
            user_balance_a: pos.balance_a,
            user_balance_b: pos.balance_b,
            user_liquidity: pos.liquidity,
            user_withdrawal_time: pos.withdrawal_time,
            user_lp_b,
            htr_price_in_deposit: pos.htr_price_in_deposit,
            token_price_in_htr_in_deposit: pos.token_price_in_htr_in_deposit,
            position_closed: pos.position_closed,
            closed_balance_a: pos.closed_balance_a,
            closed_balance_b: pos.closed_balance_b,
            oasis_htr_balance: Self::htr_balance(&env)?,
            total_liquidity: total,
        })
    }

    /// Vault configuration and globals.
    pub fn oasis_info(env: Env) -> Result<VaultInfo, VaultError> {
        Self::require_initialized(&env)?;
        Ok(VaultInfo {
            dev: Self::dev(&env)?,
            owner: Self::owner(&env)?,
            pool_manager: Self::pool_manager(&env)?,
            htr_token: Self::htr_token(&env)?,
            quote_token: Self::quote_token(&env)?,
            pool_fee: Self::pool_fee(&env)?,
            protocol_fee: Self::protocol_fee(&env)?,
            paused: Self::paused(&env)?,
            oasis_htr_balance: Self::htr_balance(&env)?,
            total_liquidity: Self::total_liquidity(&env)?,
        })
    }

    // --- Internal helpers ---

    fn require_initialized(env: &Env) -> Result<(), VaultError> {
        if !env.storage().instance().has(&DataKey::Dev) {
            return Err(VaultError::NotInitialized);
        }
        Ok(())
    }

    fn require_not_paused(env: &Env) -> Result<(), VaultError> {
        if Self::paused(env)? {
            return Err(VaultError::ContractPaused);
        }
        Ok(())
    }

    fn require_dev_or_owner(env: &Env, caller: &Address) -> Result<(), VaultError> {
        let dev = Self::dev(env)?;
        let owner = Self::owner(env)?;
        if *caller != dev && *caller != owner {
            return Err(VaultError::Unauthorized);
        }
        Ok(())
    }

    fn dev(env: &Env) -> Result<Address, VaultError> {
        env.storage()
            .instance()
            .get(&DataKey::Dev)
            .ok_or(VaultError::StorageCorrupted)
    }

    fn owner(env: &Env) -> Result<Address, VaultError> {
        env.storage()
            .instance()
            .get(&DataKey::Owner)
            .ok_or(VaultError::StorageCorrupted)
    }

    fn pool_manager(env: &Env) -> Result<Address, VaultError> {
        env.storage()
            .instance()
            .get(&DataKey::PoolManager)
            .ok_or(VaultError::StorageCorrupted)
    }

    fn htr_token(env: &Env) -> Result<Address, VaultError> {
        env.storage()
            .instance()
            .get(&DataKey::HtrToken)
            .ok_or(VaultError::StorageCorrupted)
    }

    fn quote_token(env: &Env) -> Result<Address, VaultError> {
        env.storage()
            .instance()
            .get(&DataKey::QuoteToken)
            .ok_or(VaultError::StorageCorrupted)
    }

    fn pool_fee(env: &Env) -> Result<u32, VaultError> {
        env.storage()
            .instance()
            .get(&DataKey::PoolFee)
            .ok_or(VaultError::StorageCorrupted)
    }

    fn protocol_fee(env: &Env) -> Result<i128, VaultError> {
        env.storage()
            .instance()
            .get(&DataKey::ProtocolFee)
            .ok_or(VaultError::StorageCorrupted)
    }

    fn paused(env: &Env) -> Result<bool, VaultError> {
        env.storage()
            .instance()
            .get(&DataKey::Paused)
            .ok_or(VaultError::StorageCorrupted)
    }

    fn htr_balance(env: &Env) -> Result<i128, VaultError> {
        env.storage()
            .instance()
            .get(&DataKey::HtrBalance)
            .ok_or(VaultError::StorageCorrupted)
    }

    fn set_htr_balance(env: &Env, value: i128) {
        env.storage().instance().set(&DataKey::HtrBalance, &value);
    }

    fn total_liquidity(env: &Env) -> Result<i128, VaultError> {
        env.storage()
            .instance()
            .get(&DataKey::TotalLiquidity)
            .ok_or(VaultError::StorageCorrupted)
    }

    fn set_total_liquidity(env: &Env, value: i128) {
        env.storage()
            .instance()
            .set(&DataKey::TotalLiquidity, &value);
    }

    fn position(env: &Env, address: &Address) -> Position {
        env.storage()
            .instance()
            .get(&DataKey::Position(address.clone()))
            .unwrap_or_else(Position::empty)
    }

    fn save_position(env: &Env, address: &Address, pos: &Position) {
        env.storage()
            .instance()
            .set(&DataKey::Position(address.clone()), pos);
    }

    fn pool_key(env: &Env) -> Result<PoolKey, VaultError> {
        Ok(PoolKey {
            token_a: Self::htr_token(env)?,
            token_b: Self::quote_token(env)?,
            fee: Self::pool_fee(env)?,
        })
    }
}
