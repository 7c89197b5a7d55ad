use soroban_sdk::{contractclient, contracttype, Address, Env};

/// Identifies one two-sided pool at the manager: token pair plus fee tier.
#[derive(Clone)]
#[contracttype]
pub struct PoolKey {
    pub token_a: Address,
    pub token_b: Address,
    pub fee: u32,
}

/// A provider's proportional claim on the pool reserves.
#[derive(Clone)]
#[contracttype]
pub struct PoolPosition {
    pub reserve_a: i128,
    pub reserve_b: i128,
}

/// Surface of the external AMM pool manager the vault depends on.
///
/// The manager is a black box: calls are synchronous, atomic on failure,
/// and never re-enter the vault. `token_price_in_reference` returns the
/// HTR-denominated price for pool tokens and the reference-currency price
/// for HTR itself, scaled by 10^8.
#[contractclient(name = "PoolManagerClient")]
pub trait PoolManager {
    /// Quote the other-side amount needed to add `amount_in` of `token_in`.
    fn quote_add_liquidity_in(env: Env, token_in: Address, amount_in: i128, pool: PoolKey) -> i128;

    /// Supply both sides from `from`; returns the LP share minted.
    fn add_liquidity(env: Env, from: Address, pool: PoolKey, amount_a: i128, amount_b: i128)
        -> i128;

    /// Withdraw both sides to `to`, burning the matching LP share.
    fn remove_liquidity(env: Env, to: Address, pool: PoolKey, amount_a: i128, amount_b: i128);

    /// The provider's current claim on the pool reserves.
    fn position_of(env: Env, provider: Address, pool: PoolKey) -> PoolPosition;

    /// Price of `token` scaled by 10^8.
    fn token_price_in_reference(env: Env, token: Address) -> i128;
}
