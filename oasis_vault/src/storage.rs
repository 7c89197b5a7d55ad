use soroban_sdk::{contracttype, Address};

/// Storage keys for the contract.
/// Using enum with variants for type-safe storage access.
#[derive(Clone)]
#[contracttype]
pub enum DataKey {
    /// Immutable creator; collects protocol fees and controls pause
    Dev,
    /// Mutable admin for reserve deposits/withdrawals
    Owner,
    /// External AMM pool manager contract
    PoolManager,
    /// HTR token contract (reserve and bonus denomination)
    HtrToken,
    /// Single-sided deposit token (token_b)
    QuoteToken,
    /// Fee tier identifying the HTR/quote pool at the manager
    PoolFee,
    /// Protocol fee in per mille (0..=500)
    ProtocolFee,
    /// Pause flag gating mutating entry points
    Paused,
    /// HTR reserve backing bonuses and IL compensation
    HtrBalance,
    /// Sum of all open users' scaled liquidity
    TotalLiquidity,
    /// Per-user position record: Position(user)
    Position(Address),
}

/// Fixed-point scale for liquidity shares. Protects proportional share
/// accounting against dilution rounding loss.
pub const PRECISION: i128 = 100_000_000_000_000_000_000; // 10^20

/// Fixed-point scale for price bases (8 decimal places).
pub const PRICE_PRECISION: i128 = 100_000_000; // 10^8

/// Approximate number of seconds in a month.
pub const MONTH_SECONDS: u64 = 30 * 24 * 60 * 60;

/// Minimum effective lock, measured from the deposit time, enforced when
/// a repeat deposit merges into an existing position.
pub const MIN_RELOCK_SECONDS: u64 = 4 * MONTH_SECONDS;

/// Protocol fee cap: 500 per mille = 50%.
pub const MAX_PROTOCOL_FEE: i128 = 500;

/// Protocol fee denominator (per mille).
pub const PROTOCOL_FEE_DENOMINATOR: i128 = 1_000;

/// One user's position in the vault.
///
/// Created on first deposit, merged on repeat deposits, frozen by
/// `close_position`, and reset to defaults once both closed balances are
/// fully withdrawn. The dev's record doubles as the protocol-fee bucket
/// through `balance_b`.
#[derive(Clone)]
#[contracttype]
pub struct Position {
    /// Net quote-token principal (fees excluded)
    pub deposit_b: i128,
    /// Unclaimed HTR bonus
    pub balance_a: i128,
    /// Quote-token bucket; only the dev's record accrues protocol fees here
    pub balance_b: i128,
    /// Scaled liquidity share (PRECISION fixed point)
    pub liquidity: i128,
    /// Unix timestamp after which the position may be closed
    pub withdrawal_time: u64,
    /// Deposit-weighted HTR price basis (PRICE_PRECISION scale)
    pub htr_price_in_deposit: i128,
    /// Deposit-weighted quote/HTR price basis (PRICE_PRECISION scale)
    pub token_price_in_htr_in_deposit: i128,
    pub position_closed: bool,
    /// HTR owed after close (bonus remainder plus IL compensation)
    pub closed_balance_a: i128,
    /// Quote tokens owed after close
    pub closed_balance_b: i128,
}

impl Position {
    pub fn empty() -> Self {
        Position {
            deposit_b: 0,
            balance_a: 0,
            balance_b: 0,
            liquidity: 0,
            withdrawal_time: 0,
            htr_price_in_deposit: 0,
            token_price_in_htr_in_deposit: 0,
            position_closed: false,
            closed_balance_a: 0,
            closed_balance_b: 0,
        }
    }
}

/// Read-only projection of one user's position plus the vault globals.
#[derive(Clone)]
#[contracttype]
pub struct UserInfo {
    pub user_deposit_b: i128,
    pub user_balance_a: i128,
    pub user_balance_b: i128,
    pub user_liquidity: i128,
    pub user_withdrawal_time: u64,
    /// Live quote-token share of the pooled position
    pub user_lp_b: i128,
    pub htr_price_in_deposit: i128,
    pub token_price_in_htr_in_deposit: i128,
    pub position_closed: bool,
    pub closed_balance_a: i128,
    pub closed_balance_b: i128,
    pub oasis_htr_balance: i128,
    pub total_liquidity: i128,
}

/// Read-only projection of the vault configuration and globals.
#[derive(Clone)]
#[contracttype]
pub struct VaultInfo {
    pub dev: Address,
    pub owner: Address,
    pub pool_manager: Address,
    pub htr_token: Address,
    pub quote_token: Address,
    pub pool_fee: u32,
    pub protocol_fee: i128,
    pub paused: bool,
    pub oasis_htr_balance: i128,
    pub total_liquidity: i128,
}
