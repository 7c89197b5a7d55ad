#![no_std]

mod error;
mod storage;

use error::EscrowError;
use fee_math::ceil_fee;
use soroban_sdk::{contract, contractimpl, token, Address, Env, Vec};
use storage::{
    ConfigView, Counters, DataKey, Escrow, EscrowDetails, EscrowDetailsFull, EscrowIdsPage,
    FeeQuoteView, FEE_DENOMINATOR, MAX_PAGE_LIMIT, MAX_PROTOCOL_FEE_BPS, STATUS_ACCEPTED,
    STATUS_CANCELLED, STATUS_EXECUTED, STATUS_FUNDED_BOTH, STATUS_FUNDED_MAKER, STATUS_NOT_FOUND,
    STATUS_OPEN, STATUS_REFUNDED,
};

/// OTC Escrow Swap Contract
///
/// Coordinates a 1-for-1 swap of two different tokens between a maker and
/// a taker, with protocol fees realized only on successful settlement.
///
/// Key features:
/// - Public escrows and directed escrows (maker restricts the taker identity)
/// - Stage-based expiry (OPEN/ACCEPTED use the open expiry; FUNDED_MAKER
///   uses the maker-funded expiry; FUNDED_BOTH commits to settlement)
/// - Maker-first funding order
/// - Cancel-before-funding (maker-only)
/// - Settlement withdrawals with ceil-rounded bps fees
/// - Refunds after stage expiry, fee-free
/// - Aggregate counters and escrow-id pagination for off-chain consumers
#[contract]
pub struct OtcEscrowSwap;

#[contractimpl]
impl OtcEscrowSwap {
    /// Initialize contract configuration.
    ///
    /// # Arguments
    /// * `owner` - Admin for fee/expiry configuration (must authorize)
    /// * `fee_recipient` - Only identity allowed to collect protocol fees
    /// * `protocol_fee_bps` - Fee rate, bounded by 200 bp (2%)
    /// * expiry args - Must satisfy 0 < min <= default <= max
    pub fn initialize(
        env: Env,
        owner: Address,
        fee_recipient: Address,
        protocol_fee_bps: i128,
        default_open_expiry_secs: u64,
        default_maker_funded_expiry_secs: u64,
        min_expiry_secs: u64,
        max_expiry_secs: u64,
    ) -> Result<(), EscrowError> {
        if env.storage().instance().has(&DataKey::Owner) {
            return Err(EscrowError::AlreadyInitialized);
        }
        if !(0..=MAX_PROTOCOL_FEE_BPS).contains(&protocol_fee_bps) {
            return Err(EscrowError::InvalidFeeBps);
        }
        Self::check_expiry_bounds(
            default_open_expiry_secs,
            default_maker_funded_expiry_secs,
            min_expiry_secs,
            max_expiry_secs,
        )?;

        owner.require_auth();

        env.storage().instance().set(&DataKey::Owner, &owner);
        env.storage()
            .instance()
            .set(&DataKey::FeeRecipient, &fee_recipient);
        env.storage()
            .instance()
            .set(&DataKey::ProtocolFeeBps, &protocol_fee_bps);
        env.storage()
            .instance()
            .set(&DataKey::DefaultOpenExpirySecs, &default_open_expiry_secs);
        env.storage().instance().set(
            &DataKey::DefaultMakerFundedExpirySecs,
            &default_maker_funded_expiry_secs,
        );
        env.storage()
            .instance()
            .set(&DataKey::MinExpirySecs, &min_expiry_secs);
        env.storage()
            .instance()
            .set(&DataKey::MaxExpirySecs, &max_expiry_secs);
        env.storage().instance().set(&DataKey::NextEscrowId, &0u64);
        env.storage()
            .instance()
            .set(&DataKey::Counters, &Counters::zero());

        Ok(())
    }

    /// Owner-only: update fee recipient and protocol fee rate within bounds.
    pub fn set_fee_config(
        env: Env,
        caller: Address,
        fee_recipient: Address,
        protocol_fee_bps: i128,
    ) -> Result<(), EscrowError> {
        Self::require_owner(&env, &caller)?;
        caller.require_auth();

        if !(0..=MAX_PROTOCOL_FEE_BPS).contains(&protocol_fee_bps) {
            return Err(EscrowError::InvalidFeeBps);
        }

        env.storage()
            .instance()
            .set(&DataKey::FeeRecipient, &fee_recipient);
        env.storage()
            .instance()
            .set(&DataKey::ProtocolFeeBps, &protocol_fee_bps);
        Ok(())
    }

    /// Owner-only: update expiry defaults and bounds.
    pub fn set_expiry_config(
        env: Env,
        caller: Address,
        default_open_expiry_secs: u64,
        default_maker_funded_expiry_secs: u64,
        min_expiry_secs: u64,
        max_expiry_secs: u64,
    ) -> Result<(), EscrowError> {
        Self::require_owner(&env, &caller)?;
        caller.require_auth();

        Self::check_expiry_bounds(
            default_open_expiry_secs,
            default_maker_funded_expiry_secs,
            min_expiry_secs,
            max_expiry_secs,
        )?;

        env.storage()
            .instance()
            .set(&DataKey::DefaultOpenExpirySecs, &default_open_expiry_secs);
        env.storage().instance().set(
            &DataKey::DefaultMakerFundedExpirySecs,
            &default_maker_funded_expiry_secs,
        );
        env.storage()
            .instance()
            .set(&DataKey::MinExpirySecs, &min_expiry_secs);
        env.storage()
            .instance()
            .set(&DataKey::MaxExpirySecs, &max_expiry_secs);
        Ok(())
    }

    /// Open a public escrow using the contract's default open expiry.
    ///
    /// # Returns
    /// The new escrow id (monotonic, dense from 0)
    pub fn open_escrow(
        env: Env,
        maker: Address,
        maker_token: Address,
        maker_amount: i128,
        taker_token: Address,
        taker_amount: i128,
    ) -> Result<u64, EscrowError> {
        Self::create_escrow(
            &env,
            maker,
            maker_token,
            maker_amount,
            taker_token,
            taker_amount,
            0,
            None,
        )
    }

    /// Open a public escrow with an explicit expiry timestamp.
    ///
    /// Convention: `expiry_timestamp == 0` means "now + default open
    /// expiry"; a nonzero value is an absolute unix timestamp that must
    /// land within [now+min, now+max].
    pub fn open_escrow_with_expiry(
        env: Env,
        maker: Address,
        maker_token: Address,
        maker_amount: i128,
        taker_token: Address,
        taker_amount: i128,
        expiry_timestamp: u64,
    ) -> Result<u64, EscrowError> {
        Self::create_escrow(
            &env,
            maker,
            maker_token,
            maker_amount,
            taker_token,
            taker_amount,
            expiry_timestamp,
            None,
        )
    }

    /// Open a directed escrow using the contract's default open expiry.
    pub fn open_escrow_directed(
        env: Env,
        maker: Address,
        maker_token: Address,
        maker_amount: i128,
        taker_token: Address,
        taker_amount: i128,
        directed_taker: Address,
    ) -> Result<u64, EscrowError> {
        Self::create_escrow(
            &env,
            maker,
            maker_token,
            maker_amount,
            taker_token,
            taker_amount,
            0,
            Some(directed_taker),
        )
    }

    /// Open a directed escrow with an explicit expiry timestamp.
    pub fn open_escrow_directed_with_expiry(
        env: Env,
        maker: Address,
        maker_token: Address,
        maker_amount: i128,
        taker_token: Address,
        taker_amount: i128,
        expiry_timestamp: u64,
        directed_taker: Address,
    ) -> Result<u64, EscrowError> {
        Self::create_escrow(
            &env,
            maker,
            maker_token,
            maker_amount,
            taker_token,
            taker_amount,
            expiry_timestamp,
            Some(directed_taker),
        )
    }

    /// Maker-only: retarget the directed taker while the escrow is OPEN.
    pub fn set_directed_taker(
        env: Env,
        caller: Address,
        escrow_id: u64,
        new_directed_taker: Address,
    ) -> Result<(), EscrowError> {
        Self::require_initialized(&env)?;
        let mut escrow = Self::load_escrow(&env, escrow_id)?;

        if caller != escrow.maker {
            return Err(EscrowError::Unauthorized);
        }
        caller.require_auth();

        if !escrow.is_directed {
            return Err(EscrowError::NotDirected);
        }
        if escrow.status != STATUS_OPEN {
            return Err(EscrowError::WrongStage);
        }
        if Self::stage_expired(&env, &escrow) {
            return Err(EscrowError::EscrowExpired);
        }
        if new_directed_taker == escrow.maker {
            return Err(EscrowError::SelfCounterparty);
        }

        escrow.directed_taker = Some(new_directed_taker);
        // No taker may be recorded while still OPEN.
        escrow.taker = None;
        Self::save_escrow(&env, escrow_id, &escrow);
        Ok(())
    }

    /// The taker accepts the terms; no tokens move here.
    ///
    /// Allowed from OPEN, ACCEPTED, and FUNDED_MAKER (re-acceptance
    /// confirmation); idempotent for the same taker; only OPEN -> ACCEPTED
    /// changes status.
    pub fn accept_escrow(env: Env, caller: Address, escrow_id: u64) -> Result<(), EscrowError> {
        Self::require_initialized(&env)?;
        let mut escrow = Self::load_escrow(&env, escrow_id)?;

        if escrow.is_directed {
            let directed = escrow
                .directed_taker
                .clone()
                .ok_or(EscrowError::StorageCorrupted)?;
            if caller != directed {
                return Err(EscrowError::Unauthorized);
            }
        }
        if caller == escrow.maker {
            return Err(EscrowError::SelfCounterparty);
        }
        if escrow.status == STATUS_CANCELLED {
            return Err(EscrowError::EscrowCancelled);
        }
        if Self::stage_expired(&env, &escrow) {
            return Err(EscrowError::EscrowExpired);
        }
        if !matches!(
            escrow.status,
            STATUS_OPEN | STATUS_ACCEPTED | STATUS_FUNDED_MAKER
        ) {
            return Err(EscrowError::WrongStage);
        }

        caller.require_auth();

        match &escrow.taker {
            None => escrow.taker = Some(caller),
            Some(existing) => {
                if caller != *existing {
                    return Err(EscrowError::AlreadyAccepted);
                }
            }
        }

        if escrow.status == STATUS_OPEN {
            Self::set_status(&env, &mut escrow, STATUS_ACCEPTED)?;
        }
        Self::save_escrow(&env, escrow_id, &escrow);
        Ok(())
    }

    /// Maker-only cancellation before any funding has occurred.
    pub fn cancel_before_funding(
        env: Env,
        caller: Address,
        escrow_id: u64,
    ) -> Result<(), EscrowError> {
        Self::require_initialized(&env)?;
        let mut escrow = Self::load_escrow(&env, escrow_id)?;

        if caller != escrow.maker {
            return Err(EscrowError::Unauthorized);
        }
        caller.require_auth();

        if !matches!(escrow.status, STATUS_OPEN | STATUS_ACCEPTED) {
            return Err(EscrowError::WrongStage);
        }
        if escrow.maker_funded || escrow.taker_funded {
            return Err(EscrowError::AlreadyFunded);
        }

        Self::set_status(&env, &mut escrow, STATUS_CANCELLED)?;
        Self::save_escrow(&env, escrow_id, &escrow);
        Ok(())
    }

    /// Maker deposits exactly `maker_amount` of `maker_token`.
    ///
    /// Transitions to FUNDED_MAKER and arms the maker-funded expiry clock.
    pub fn fund_maker(env: Env, caller: Address, escrow_id: u64) -> Result<(), EscrowError> {
        Self::require_initialized(&env)?;
        let mut escrow = Self::load_escrow(&env, escrow_id)?;

        if escrow.status == STATUS_CANCELLED {
            return Err(EscrowError::EscrowCancelled);
        }
        if !matches!(escrow.status, STATUS_OPEN | STATUS_ACCEPTED) {
            return Err(EscrowError::WrongStage);
        }
        if Self::stage_expired(&env, &escrow) {
            return Err(EscrowError::EscrowExpired);
        }
        if escrow.maker_funded {
            return Err(EscrowError::AlreadyFunded);
        }
        if caller != escrow.maker {
            return Err(EscrowError::Unauthorized);
        }

        caller.require_auth();
        token::Client::new(&env, &escrow.maker_token).transfer(
            &caller,
            &env.current_contract_address(),
            &escrow.maker_amount,
        );

        escrow.maker_funded = true;
        Self::set_status(&env, &mut escrow, STATUS_FUNDED_MAKER)?;
        escrow.maker_funded_expiry =
            env.ledger().timestamp() + Self::default_maker_funded_expiry(&env)?;
        Self::save_escrow(&env, escrow_id, &escrow);
        Ok(())
    }

    /// Taker deposits exactly `taker_amount` of `taker_token`.
    ///
    /// Only possible after the maker has funded; transitions to FUNDED_BOTH.
    pub fn fund_taker(env: Env, caller: Address, escrow_id: u64) -> Result<(), EscrowError> {
        Self::require_initialized(&env)?;
        let mut escrow = Self::load_escrow(&env, escrow_id)?;

        if escrow.status == STATUS_CANCELLED {
            return Err(EscrowError::EscrowCancelled);
        }
        if escrow.status != STATUS_FUNDED_MAKER {
            return Err(EscrowError::WrongStage);
        }
        if Self::stage_expired(&env, &escrow) {
            return Err(EscrowError::EscrowExpired);
        }
        if escrow.taker_funded {
            return Err(EscrowError::AlreadyFunded);
        }

        if escrow.is_directed {
            let directed = escrow
                .directed_taker
                .clone()
                .ok_or(EscrowError::StorageCorrupted)?;
            if caller != directed {
                return Err(EscrowError::Unauthorized);
            }
        }
        let taker = escrow.taker.clone().ok_or(EscrowError::NotAccepted)?;
        if caller != taker {
            return Err(EscrowError::Unauthorized);
        }

        caller.require_auth();
        token::Client::new(&env, &escrow.taker_token).transfer(
            &caller,
            &env.current_contract_address(),
            &escrow.taker_amount,
        );

        escrow.taker_funded = true;
        Self::set_status(&env, &mut escrow, STATUS_FUNDED_BOTH)?;
        Self::save_escrow(&env, escrow_id, &escrow);
        Ok(())
    }

    /// Settlement withdrawal for the maker or taker of a FUNDED_BOTH escrow.
    ///
    /// The maker receives `taker_amount - ceil_fee(taker_amount)` of
    /// taker_token; the taker receives `maker_amount - ceil_fee(maker_amount)`
    /// of maker_token. Each fee accrues to the aggregated ledger under the
    /// paid-out token. Once both sides have withdrawn the escrow is EXECUTED.
    pub fn withdraw(env: Env, caller: Address, escrow_id: u64) -> Result<(), EscrowError> {
        Self::require_initialized(&env)?;
        let mut escrow = Self::load_escrow(&env, escrow_id)?;

        if escrow.status == STATUS_CANCELLED {
            return Err(EscrowError::EscrowCancelled);
        }
        if matches!(escrow.status, STATUS_EXECUTED | STATUS_REFUNDED) {
            return Err(EscrowError::EscrowClosed);
        }
        if escrow.status != STATUS_FUNDED_BOTH {
            return Err(EscrowError::WrongStage);
        }

        let taker = escrow.taker.clone().ok_or(EscrowError::NotAccepted)?;
        let bps = Self::protocol_fee_bps(&env)?;
        let maker_fee =
            ceil_fee(escrow.maker_amount, bps, FEE_DENOMINATOR).ok_or(EscrowError::Overflow)?;
        let taker_fee =
            ceil_fee(escrow.taker_amount, bps, FEE_DENOMINATOR).ok_or(EscrowError::Overflow)?;

        if caller == escrow.maker {
            if escrow.maker_withdrawn {
                return Err(EscrowError::AlreadyWithdrawn);
            }
            let payout = escrow.taker_amount - taker_fee;
            if payout < 0 {
                return Err(EscrowError::FeeExceedsAmount);
            }

            caller.require_auth();
            token::Client::new(&env, &escrow.taker_token).transfer(
                &env.current_contract_address(),
                &caller,
                &payout,
            );
            escrow.maker_withdrawn = true;
            if taker_fee > 0 {
                Self::credit_fee(&env, &escrow.taker_token, taker_fee)?;
            }
        } else if caller == taker {
            if escrow.taker_withdrawn {
                return Err(EscrowError::AlreadyWithdrawn);
            }
            let payout = escrow.maker_amount - maker_fee;
            if payout < 0 {
                return Err(EscrowError::FeeExceedsAmount);
            }

            caller.require_auth();
            token::Client::new(&env, &escrow.maker_token).transfer(
                &env.current_contract_address(),
                &caller,
                &payout,
            );
            escrow.taker_withdrawn = true;
            if maker_fee > 0 {
                Self::credit_fee(&env, &escrow.maker_token, maker_fee)?;
            }
        } else {
            return Err(EscrowError::Unauthorized);
        }

        if escrow.maker_withdrawn && escrow.taker_withdrawn {
            Self::set_status(&env, &mut escrow, STATUS_EXECUTED)?;
        }
        Self::save_escrow(&env, escrow_id, &escrow);
        Ok(())
    }

    /// Fee-recipient-only: withdraw the entire accumulated protocol fee
    /// balance for one token; the balance is zeroed atomically.
    ///
    /// # Returns
    /// Amount paid out
    pub fn withdraw_protocol_fees(
        env: Env,
        caller: Address,
        token: Address,
    ) -> Result<i128, EscrowError> {
        Self::require_initialized(&env)?;

        let recipient: Address = env
            .storage()
            .instance()
            .get(&DataKey::FeeRecipient)
            .ok_or(EscrowError::StorageCorrupted)?;
        if caller != recipient {
            return Err(EscrowError::Unauthorized);
        }

        let key = DataKey::FeeBalance(token.clone());
        let balance: i128 = env.storage().instance().get(&key).unwrap_or(0);
        if balance <= 0 {
            return Err(EscrowError::NoFeesAccrued);
        }

        caller.require_auth();
        env.storage().instance().set(&key, &0i128);
        token::Client::new(&env, &token).transfer(
            &env.current_contract_address(),
            &caller,
            &balance,
        );
        Ok(balance)
    }

    /// Refund a funded side after the escrow expired for its current stage.
    ///
    /// Each side recovers only its own deposited token, fee-free. Once
    /// every funded side has been refunded the escrow becomes REFUNDED.
    /// A FUNDED_BOTH escrow never reports expired, so refund is
    /// unreachable once both sides fund.
    pub fn refund(env: Env, caller: Address, escrow_id: u64) -> Result<(), EscrowError> {
        Self::require_initialized(&env)?;
        let mut escrow = Self::load_escrow(&env, escrow_id)?;

        if escrow.status == STATUS_CANCELLED {
            return Err(EscrowError::EscrowCancelled);
        }
        if matches!(escrow.status, STATUS_EXECUTED | STATUS_REFUNDED) {
            return Err(EscrowError::EscrowClosed);
        }
        if !Self::stage_expired(&env, &escrow) {
            return Err(EscrowError::EscrowNotExpired);
        }

        if caller == escrow.maker {
            if !escrow.maker_funded {
                return Err(EscrowError::NotFunded);
            }
            if escrow.maker_refunded {
                return Err(EscrowError::AlreadyRefunded);
            }
            if escrow.maker_withdrawn {
                return Err(EscrowError::AlreadyWithdrawn);
            }

            caller.require_auth();
            token::Client::new(&env, &escrow.maker_token).transfer(
                &env.current_contract_address(),
                &caller,
                &escrow.maker_amount,
            );
            escrow.maker_refunded = true;
        } else if Some(caller.clone()) == escrow.taker {
            if !escrow.taker_funded {
                return Err(EscrowError::NotFunded);
            }
            if escrow.taker_refunded {
                return Err(EscrowError::AlreadyRefunded);
            }
            if escrow.taker_withdrawn {
                return Err(EscrowError::AlreadyWithdrawn);
            }

            caller.require_auth();
            token::Client::new(&env, &escrow.taker_token).transfer(
                &env.current_contract_address(),
                &caller,
                &escrow.taker_amount,
            );
            escrow.taker_refunded = true;
        } else {
            return Err(EscrowError::Unauthorized);
        }

        let maker_done = !escrow.maker_funded || escrow.maker_refunded;
        let taker_done = !escrow.taker_funded || escrow.taker_refunded;
        if maker_done && taker_done {
            Self::set_status(&env, &mut escrow, STATUS_REFUNDED)?;
        }
        Self::save_escrow(&env, escrow_id, &escrow);
        Ok(())
    }

    // --- Views ---

    /// Get the contract configuration.
    pub fn get_config(env: Env) -> Result<ConfigView, EscrowError> {
        Self::require_initialized(&env)?;
        Ok(ConfigView {
            owner: env
                .storage()
                .instance()
                .get(&DataKey::Owner)
                .ok_or(EscrowError::StorageCorrupted)?,
            fee_recipient: env
                .storage()
                .instance()
                .get(&DataKey::FeeRecipient)
                .ok_or(EscrowError::StorageCorrupted)?,
            protocol_fee_bps: Self::protocol_fee_bps(&env)?,
            default_open_expiry_secs: env
                .storage()
                .instance()
                .get(&DataKey::DefaultOpenExpirySecs)
                .ok_or(EscrowError::StorageCorrupted)?,
            default_maker_funded_expiry_secs: Self::default_maker_funded_expiry(&env)?,
            min_expiry_secs: env
                .storage()
                .instance()
                .get(&DataKey::MinExpirySecs)
                .ok_or(EscrowError::StorageCorrupted)?,
            max_expiry_secs: env
                .storage()
                .instance()
                .get(&DataKey::MaxExpirySecs)
                .ok_or(EscrowError::StorageCorrupted)?,
        })
    }

    /// Aggregated protocol fee balance for a given token.
    pub fn get_protocol_fee_balance(env: Env, token: Address) -> i128 {
        env.storage()
            .instance()
            .get(&DataKey::FeeBalance(token))
            .unwrap_or(0)
    }

    /// Quote protocol fees for hypothetical amounts (base units).
    pub fn get_fee_quote(
        env: Env,
        maker_amount: i128,
        taker_amount: i128,
    ) -> Result<FeeQuoteView, EscrowError> {
        Self::require_initialized(&env)?;
        if maker_amount < 0 || taker_amount < 0 {
            return Err(EscrowError::InvalidAmount);
        }

        let bps = Self::protocol_fee_bps(&env)?;
        let maker_fee =
            ceil_fee(maker_amount, bps, FEE_DENOMINATOR).ok_or(EscrowError::Overflow)?;
        let taker_fee =
            ceil_fee(taker_amount, bps, FEE_DENOMINATOR).ok_or(EscrowError::Overflow)?;

        let maker_net_receive = taker_amount - taker_fee;
        let taker_net_receive = maker_amount - maker_fee;
        if maker_net_receive < 0 || taker_net_receive < 0 {
            return Err(EscrowError::FeeExceedsAmount);
        }

        Ok(FeeQuoteView {
            maker_fee,
            taker_fee,
            maker_net_receive,
            taker_net_receive,
        })
    }

    /// Summary escrow view; unknown ids return a sentinel with status -1.
    pub fn get_escrow(env: Env, escrow_id: u64) -> EscrowDetails {
        let escrow: Escrow = match env.storage().instance().get(&DataKey::Escrow(escrow_id)) {
            Some(e) => e,
            None => return EscrowDetails::not_found(),
        };
        EscrowDetails {
            maker: Some(escrow.maker),
            taker: escrow.taker,
            maker_token: Some(escrow.maker_token),
            maker_amount: escrow.maker_amount,
            taker_token: Some(escrow.taker_token),
            taker_amount: escrow.taker_amount,
            maker_funded: escrow.maker_funded,
            taker_funded: escrow.taker_funded,
            maker_withdrawn: escrow.maker_withdrawn,
            taker_withdrawn: escrow.taker_withdrawn,
            is_cancelled: escrow.status == STATUS_CANCELLED,
            status: escrow.status,
        }
    }

    /// Extended escrow view including stage expiry state, evaluated
    /// against the current ledger time.
    pub fn get_escrow_full(env: Env, escrow_id: u64) -> EscrowDetailsFull {
        let escrow: Escrow = match env.storage().instance().get(&DataKey::Escrow(escrow_id)) {
            Some(e) => e,
            None => return EscrowDetailsFull::not_found(),
        };
        let now = env.ledger().timestamp();

        let is_open_expired = escrow.open_expiry > 0 && now >= escrow.open_expiry;
        let is_maker_funded_expired =
            escrow.maker_funded_expiry > 0 && now >= escrow.maker_funded_expiry;
        let is_expired = match escrow.status {
            STATUS_OPEN | STATUS_ACCEPTED => is_open_expired,
            STATUS_FUNDED_MAKER => is_maker_funded_expired,
            _ => false,
        };

        EscrowDetailsFull {
            maker: Some(escrow.maker),
            taker: escrow.taker,
            maker_token: Some(escrow.maker_token),
            maker_amount: escrow.maker_amount,
            taker_token: Some(escrow.taker_token),
            taker_amount: escrow.taker_amount,
            maker_funded: escrow.maker_funded,
            taker_funded: escrow.taker_funded,
            maker_withdrawn: escrow.maker_withdrawn,
            taker_withdrawn: escrow.taker_withdrawn,
            maker_refunded: escrow.maker_refunded,
            taker_refunded: escrow.taker_refunded,
            open_expiry_timestamp: escrow.open_expiry,
            maker_funded_expiry_timestamp: escrow.maker_funded_expiry,
            is_open_expired,
            is_maker_funded_expired,
            is_expired,
            is_directed: escrow.is_directed,
            directed_taker: escrow.directed_taker,
            is_cancelled: escrow.status == STATUS_CANCELLED,
            is_refunded: escrow.status == STATUS_REFUNDED,
            status: escrow.status,
        }
    }

    /// True if an escrow record exists for this id.
    pub fn get_escrow_exists(env: Env, escrow_id: u64) -> bool {
        env.storage().instance().has(&DataKey::Escrow(escrow_id))
    }

    /// Escrow status, or -1 if not found.
    pub fn get_escrow_status(env: Env, escrow_id: u64) -> i32 {
        env.storage()
            .instance()
            .get(&DataKey::Escrow(escrow_id))
            .map(|e: Escrow| e.status)
            .unwrap_or(STATUS_NOT_FOUND)
    }

    /// Lightweight aggregate counters for off-chain stats.
    pub fn get_counters(env: Env) -> Result<Counters, EscrowError> {
        Self::require_initialized(&env)?;
        Self::counters(&env)
    }

    /// A page of escrow ids for index-cursor pagination.
    ///
    /// Ids form a dense monotonic sequence, so the index cursor doubles
    /// as the first id of the page. `next_cursor == 0` means no more data.
    pub fn get_escrow_ids_page(
        env: Env,
        cursor: u64,
        limit: u64,
    ) -> Result<EscrowIdsPage, EscrowError> {
        Self::require_initialized(&env)?;
        if limit == 0 || limit > MAX_PAGE_LIMIT {
            return Err(EscrowError::InvalidLimit);
        }

        let total: u64 = env
            .storage()
            .instance()
            .get(&DataKey::NextEscrowId)
            .ok_or(EscrowError::StorageCorrupted)?;

        let mut ids = Vec::new(&env);
        if cursor >= total {
            return Ok(EscrowIdsPage {
                cursor_in: cursor,
                limit,
                next_cursor: 0,
                ids,
            });
        }

        let end = cursor.saturating_add(limit).min(total);
        let mut i = cursor;
        while i < end {
            ids.push_back(i);
            i += 1;
        }

        Ok(EscrowIdsPage {
            cursor_in: cursor,
            limit,
            next_cursor: if end >= total { 0 } else { end },
            ids,
        })
    }

    // --- Internal helpers ---

    fn require_initialized(env: &Env) -> Result<(), EscrowError> {
        if !env.storage().instance().has(&DataKey::Owner) {
            return Err(EscrowError::NotInitialized);
        }
        Ok(())
    }

    fn require_owner(env: &Env, caller: &Address) -> Result<(), EscrowError> {
        Self::require_initialized(env)?;
        let owner: Address = env
            .storage()
            .instance()
            .get(&DataKey::Owner)
            .ok_or(EscrowError::StorageCorrupted)?;
        if *caller != owner {
            return Err(EscrowError::Unauthorized);
        }
        Ok(())
    }

    fn protocol_fee_bps(env: &Env) -> Result<i128, EscrowError> {
        env.storage()
            .instance()
            .get(&DataKey::ProtocolFeeBps)
            .ok_or(EscrowError::StorageCorrupted)
    }

    fn default_maker_funded_expiry(env: &Env) -> Result<u64, EscrowError> {
        env.storage()
            .instance()
            .get(&DataKey::DefaultMakerFundedExpirySecs)
            .ok_or(EscrowError::StorageCorrupted)
    }

    fn check_expiry_bounds(
        default_open: u64,
        default_maker_funded: u64,
        min: u64,
        max: u64,
    ) -> Result<(), EscrowError> {
        if min == 0 {
            return Err(EscrowError::InvalidExpiryConfig);
        }
        if max < min {
            return Err(EscrowError::InvalidExpiryConfig);
        }
        if default_open < min || default_open > max {
            return Err(EscrowError::InvalidExpiryConfig);
        }
        if default_maker_funded < min || default_maker_funded > max {
            return Err(EscrowError::InvalidExpiryConfig);
        }
        Ok(())
    }

    /// Normalize an explicit expiry: 0 means "now + default open expiry";
    /// otherwise the absolute timestamp must land within [now+min, now+max].
    fn normalize_expiry(env: &Env, expiry_timestamp: u64) -> Result<u64, EscrowError> {
        let now = env.ledger().timestamp();
        if expiry_timestamp == 0 {
            let default_open: u64 = env
                .storage()
                .instance()
                .get(&DataKey::DefaultOpenExpirySecs)
                .ok_or(EscrowError::StorageCorrupted)?;
            return Ok(now + default_open);
        }

        let min: u64 = env
            .storage()
            .instance()
            .get(&DataKey::MinExpirySecs)
            .ok_or(EscrowError::StorageCorrupted)?;
        let max: u64 = env
            .storage()
            .instance()
            .get(&DataKey::MaxExpirySecs)
            .ok_or(EscrowError::StorageCorrupted)?;

        let delta = (expiry_timestamp as i128) - (now as i128);
        if delta < min as i128 || delta > max as i128 {
            return Err(EscrowError::InvalidExpiry);
        }
        Ok(expiry_timestamp)
    }

    #[allow(clippy::too_many_arguments)]
    fn create_escrow(
        env: &Env,
        maker: Address,
        maker_token: Address,
        maker_amount: i128,
        taker_token: Address,
        taker_amount: i128,
        expiry_timestamp: u64,
        directed_taker: Option<Address>,
    ) -> Result<u64, EscrowError> {
        Self::require_initialized(env)?;

        if let Some(directed) = &directed_taker {
            if *directed == maker {
                return Err(EscrowError::SelfCounterparty);
            }
        }
        if maker_amount <= 0 || taker_amount <= 0 {
            return Err(EscrowError::InvalidAmount);
        }
        if maker_token == taker_token {
            return Err(EscrowError::SameToken);
        }

        let open_expiry = Self::normalize_expiry(env, expiry_timestamp)?;
        maker.require_auth();

        let escrow_id: u64 = env
            .storage()
            .instance()
            .get(&DataKey::NextEscrowId)
            .ok_or(EscrowError::StorageCorrupted)?;

        let is_directed = directed_taker.is_some();
        let escrow = Escrow {
            maker,
            taker: None,
            is_directed,
            directed_taker,
            maker_token,
            maker_amount,
            taker_token,
            taker_amount,
            maker_funded: false,
            taker_funded: false,
            maker_withdrawn: false,
            taker_withdrawn: false,
            maker_refunded: false,
            taker_refunded: false,
            open_expiry,
            maker_funded_expiry: 0,
            status: STATUS_OPEN,
        };
        Self::save_escrow(env, escrow_id, &escrow);
        env.storage()
            .instance()
            .set(&DataKey::NextEscrowId, &(escrow_id + 1));

        let mut counters = Self::counters(env)?;
        counters.total_escrows += 1;
        counters.count_open += 1;
        if is_directed {
            counters.count_directed += 1;
        } else {
            counters.count_public += 1;
        }
        Self::save_counters(env, &counters);

        Ok(escrow_id)
    }

    fn load_escrow(env: &Env, escrow_id: u64) -> Result<Escrow, EscrowError> {
        env.storage()
            .instance()
            .get(&DataKey::Escrow(escrow_id))
            .ok_or(EscrowError::EscrowNotFound)
    }

    fn save_escrow(env: &Env, escrow_id: u64, escrow: &Escrow) {
        env.storage()
            .instance()
            .set(&DataKey::Escrow(escrow_id), escrow);
    }

    fn counters(env: &Env) -> Result<Counters, EscrowError> {
        env.storage()
            .instance()
            .get(&DataKey::Counters)
            .ok_or(EscrowError::StorageCorrupted)
    }

    fn save_counters(env: &Env, counters: &Counters) {
        env.storage().instance().set(&DataKey::Counters, counters);
    }

    fn bump_counter(counters: &mut Counters, status: i32, up: bool) {
        let bucket = match status {
            STATUS_OPEN => &mut counters.count_open,
            STATUS_ACCEPTED => &mut counters.count_accepted,
            STATUS_FUNDED_MAKER => &mut counters.count_funded_maker,
            STATUS_FUNDED_BOTH => &mut counters.count_funded_both,
            STATUS_EXECUTED => &mut counters.count_executed,
            STATUS_REFUNDED => &mut counters.count_refunded,
            STATUS_CANCELLED => &mut counters.count_cancelled,
            _ => return,
        };
        if up {
            *bucket += 1;
        } else {
            *bucket = bucket.saturating_sub(1);
        }
    }

    /// Transition an escrow's status, keeping the counters consistent.
    /// Counters are adjusted incrementally, never recomputed by scanning.
    fn set_status(env: &Env, escrow: &mut Escrow, new_status: i32) -> Result<(), EscrowError> {
        if escrow.status == new_status {
            return Ok(());
        }
        let mut counters = Self::counters(env)?;
        Self::bump_counter(&mut counters, escrow.status, false);
        Self::bump_counter(&mut counters, new_status, true);
        Self::save_counters(env, &counters);
        escrow.status = new_status;
        Ok(())
    }

    /// Expiry applicable to the escrow's current stage.
    ///
    /// OPEN/ACCEPTED use the open expiry; FUNDED_MAKER uses the
    /// maker-funded expiry; FUNDED_BOTH and terminal states never expire.
    fn stage_expired(env: &Env, escrow: &Escrow) -> bool {
        let now = env.ledger().timestamp();
        match escrow.status {
            STATUS_OPEN | STATUS_ACCEPTED => escrow.open_expiry > 0 && now >= escrow.open_expiry,
            STATUS_FUNDED_MAKER => {
                escrow.maker_funded_expiry > 0 && now >= escrow.maker_funded_expiry
            }
            _ => false,
        }
    }

    fn credit_fee(env: &Env, token: &Address, amount: i128) -> Result<(), EscrowError> {
        let key = DataKey::FeeBalance(token.clone());
        let balance: i128 = env.storage().instance().get(&key).unwrap_or(0);
        let updated = balance.checked_add(amount).ok_or(EscrowError::Overflow)?;
        env.storage().instance().set(&key, &updated);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use soroban_sdk::{
        testutils::{Address as _, Ledger},
        token::StellarAssetClient,
        Env,
    };
    use super::storage::{DEFAULT_MAKER_FUNDED_EXPIRY_SECS, DEFAULT_MIN_EXPIRY_SECS};

    const START_TS: u64 = 1_700_000_000;
    const FEE_BPS: i128 = 100; // 1%

    struct Setup {
        env: Env,
        contract_id: Address,
        owner: Address,
        fee_recipient: Address,
        token_m: Address,
        token_t: Address,
        alice: Address,
        bob: Address,
    }

    /// Register an initialized contract with two funded parties.
    /// alice is the maker (holds token_m), bob the taker (holds token_t).
    fn setup() -> Setup {
        let env = Env::default();
        env.mock_all_auths();
        env.ledger().with_mut(|li| li.timestamp = START_TS);

        let owner = Address::generate(&env);
        let fee_recipient = Address::generate(&env);
        let alice = Address::generate(&env);
        let bob = Address::generate(&env);

        let token_m = env
            .register_stellar_asset_contract_v2(Address::generate(&env))
            .address();
        let token_t = env
            .register_stellar_asset_contract_v2(Address::generate(&env))
            .address();
        StellarAssetClient::new(&env, &token_m).mint(&alice, &1_000_000);
        StellarAssetClient::new(&env, &token_t).mint(&bob, &1_000_000);

        let contract_id = env.register(OtcEscrowSwap, ());
        let client = OtcEscrowSwapClient::new(&env, &contract_id);
        client.initialize(
            &owner,
            &fee_recipient,
            &FEE_BPS,
            &storage::DEFAULT_OPEN_EXPIRY_SECS,
            &DEFAULT_MAKER_FUNDED_EXPIRY_SECS,
            &DEFAULT_MIN_EXPIRY_SECS,
            &storage::DEFAULT_MAX_EXPIRY_SECS,
        );

        Setup {
            env,
            contract_id,
            owner,
            fee_recipient,
            token_m,
            token_t,
            alice,
            bob,
        }
    }

    fn client(s: &Setup) -> OtcEscrowSwapClient<'_> {
        OtcEscrowSwapClient::new(&s.env, &s.contract_id)
    }

    fn set_time(env: &Env, ts: u64) {
        env.ledger().with_mut(|li| li.timestamp = ts);
    }

    fn token_balance(env: &Env, token: &Address, who: &Address) -> i128 {
        token::Client::new(env, token).balance(who)
    }

    /// Open a public escrow and drive it to FUNDED_BOTH.
    fn open_and_fund_both(s: &Setup, maker_amount: i128, taker_amount: i128) -> u64 {
        let c = client(s);
        let id = c.open_escrow(&s.alice, &s.token_m, &maker_amount, &s.token_t, &taker_amount);
        c.accept_escrow(&s.bob, &id);
        c.fund_maker(&s.alice, &id);
        c.fund_taker(&s.bob, &id);
        id
    }

    #[test]
    fn test_initialize_and_config() {
        let s = setup();
        let cfg = client(&s).get_config();
        assert_eq!(cfg.owner, s.owner);
        assert_eq!(cfg.fee_recipient, s.fee_recipient);
        assert_eq!(cfg.protocol_fee_bps, FEE_BPS);
        assert_eq!(cfg.default_open_expiry_secs, storage::DEFAULT_OPEN_EXPIRY_SECS);
        assert_eq!(
            cfg.default_maker_funded_expiry_secs,
            DEFAULT_MAKER_FUNDED_EXPIRY_SECS
        );
        assert_eq!(cfg.min_expiry_secs, DEFAULT_MIN_EXPIRY_SECS);
        assert_eq!(cfg.max_expiry_secs, storage::DEFAULT_MAX_EXPIRY_SECS);
    }

    #[test]
    #[should_panic(expected = "Error(Contract, #1)")] // AlreadyInitialized = 1
    fn test_double_initialize() {
        let s = setup();
        client(&s).initialize(
            &s.owner,
            &s.fee_recipient,
            &FEE_BPS,
            &storage::DEFAULT_OPEN_EXPIRY_SECS,
            &DEFAULT_MAKER_FUNDED_EXPIRY_SECS,
            &DEFAULT_MIN_EXPIRY_SECS,
            &storage::DEFAULT_MAX_EXPIRY_SECS,
        );
    }

    #[test]
    #[should_panic(expected = "Error(Contract, #4)")] // InvalidFeeBps = 4
    fn test_initialize_fee_over_cap() {
        let env = Env::default();
        env.mock_all_auths();
        let contract_id = env.register(OtcEscrowSwap, ());
        let c = OtcEscrowSwapClient::new(&env, &contract_id);
        c.initialize(
            &Address::generate(&env),
            &Address::generate(&env),
            &(MAX_PROTOCOL_FEE_BPS + 1),
            &storage::DEFAULT_OPEN_EXPIRY_SECS,
            &DEFAULT_MAKER_FUNDED_EXPIRY_SECS,
            &DEFAULT_MIN_EXPIRY_SECS,
            &storage::DEFAULT_MAX_EXPIRY_SECS,
        );
    }

    #[test]
    #[should_panic(expected = "Error(Contract, #5)")] // InvalidExpiryConfig = 5
    fn test_initialize_zero_min_expiry() {
        let env = Env::default();
        env.mock_all_auths();
        let contract_id = env.register(OtcEscrowSwap, ());
        let c = OtcEscrowSwapClient::new(&env, &contract_id);
        c.initialize(
            &Address::generate(&env),
            &Address::generate(&env),
            &FEE_BPS,
            &storage::DEFAULT_OPEN_EXPIRY_SECS,
            &DEFAULT_MAKER_FUNDED_EXPIRY_SECS,
            &0u64,
            &storage::DEFAULT_MAX_EXPIRY_SECS,
        );
    }

    #[test]
    fn test_public_complete_lifecycle_with_fees() {
        let s = setup();
        let c = client(&s);

        let id = c.open_escrow(&s.alice, &s.token_m, &100, &s.token_t, &125);
        assert_eq!(c.get_escrow_status(&id), STATUS_OPEN);

        c.accept_escrow(&s.bob, &id);
        assert_eq!(c.get_escrow_status(&id), STATUS_ACCEPTED);

        c.fund_maker(&s.alice, &id);
        assert_eq!(c.get_escrow_status(&id), STATUS_FUNDED_MAKER);

        c.fund_taker(&s.bob, &id);
        assert_eq!(c.get_escrow_status(&id), STATUS_FUNDED_BOTH);

        let quote = c.get_fee_quote(&100, &125);
        assert_eq!(quote.maker_fee, 1);
        assert_eq!(quote.taker_fee, 2);
        assert_eq!(quote.maker_net_receive, 123);
        assert_eq!(quote.taker_net_receive, 99);

        let alice_t_before = token_balance(&s.env, &s.token_t, &s.alice);
        let bob_m_before = token_balance(&s.env, &s.token_m, &s.bob);

        c.withdraw(&s.alice, &id);
        c.withdraw(&s.bob, &id);
        assert_eq!(c.get_escrow_status(&id), STATUS_EXECUTED);

        // Maker received taker_amount net of taker_fee, and vice versa.
        assert_eq!(token_balance(&s.env, &s.token_t, &s.alice), alice_t_before + 123);
        assert_eq!(token_balance(&s.env, &s.token_m, &s.bob), bob_m_before + 99);

        // Fees accrued under the paid-out tokens.
        assert_eq!(c.get_protocol_fee_balance(&s.token_m), 1);
        assert_eq!(c.get_protocol_fee_balance(&s.token_t), 2);

        // Fee recipient collects each balance in full.
        assert_eq!(c.withdraw_protocol_fees(&s.fee_recipient, &s.token_m), 1);
        assert_eq!(c.withdraw_protocol_fees(&s.fee_recipient, &s.token_t), 2);
        assert_eq!(c.get_protocol_fee_balance(&s.token_m), 0);
        assert_eq!(c.get_protocol_fee_balance(&s.token_t), 0);
        assert_eq!(token_balance(&s.env, &s.token_m, &s.fee_recipient), 1);
        assert_eq!(token_balance(&s.env, &s.token_t, &s.fee_recipient), 2);
    }

    #[test]
    fn test_directed_complete_lifecycle() {
        let s = setup();
        let c = client(&s);

        let id = c.open_escrow_directed(&s.alice, &s.token_m, &50, &s.token_t, &70, &s.bob);
        c.accept_escrow(&s.bob, &id);
        c.fund_maker(&s.alice, &id);
        c.fund_taker(&s.bob, &id);
        assert_eq!(c.get_escrow_status(&id), STATUS_FUNDED_BOTH);

        let quote = c.get_fee_quote(&50, &70);
        assert_eq!(quote.maker_fee, 1);
        assert_eq!(quote.taker_fee, 1);
        assert_eq!(quote.maker_net_receive, 69);
        assert_eq!(quote.taker_net_receive, 49);

        c.withdraw(&s.alice, &id);
        c.withdraw(&s.bob, &id);
        assert_eq!(c.get_escrow_status(&id), STATUS_EXECUTED);

        let full = c.get_escrow_full(&id);
        assert!(full.is_directed);
        assert_eq!(full.directed_taker, Some(s.bob.clone()));
    }

    #[test]
    #[should_panic(expected = "Error(Contract, #7)")] // InvalidAmount = 7
    fn test_open_zero_maker_amount() {
        let s = setup();
        client(&s).open_escrow(&s.alice, &s.token_m, &0, &s.token_t, &125);
    }

    #[test]
    #[should_panic(expected = "Error(Contract, #8)")] // SameToken = 8
    fn test_open_same_token() {
        let s = setup();
        client(&s).open_escrow(&s.alice, &s.token_m, &100, &s.token_m, &125);
    }

    #[test]
    #[should_panic(expected = "Error(Contract, #9)")] // SelfCounterparty = 9
    fn test_open_directed_at_self() {
        let s = setup();
        client(&s).open_escrow_directed(&s.alice, &s.token_m, &100, &s.token_t, &125, &s.alice);
    }

    #[test]
    fn test_open_with_explicit_expiry() {
        let s = setup();
        let c = client(&s);
        let expiry = START_TS + 3_600;
        let id =
            c.open_escrow_with_expiry(&s.alice, &s.token_m, &100, &s.token_t, &125, &expiry);
        let full = c.get_escrow_full(&id);
        assert_eq!(full.open_expiry_timestamp, expiry);
        assert!(!full.is_expired);
    }

    #[test]
    #[should_panic(expected = "Error(Contract, #6)")] // InvalidExpiry = 6
    fn test_open_expiry_below_min() {
        let s = setup();
        client(&s).open_escrow_with_expiry(
            &s.alice,
            &s.token_m,
            &100,
            &s.token_t,
            &125,
            &(START_TS + DEFAULT_MIN_EXPIRY_SECS - 1),
        );
    }

    #[test]
    #[should_panic(expected = "Error(Contract, #6)")] // InvalidExpiry = 6
    fn test_open_expiry_above_max() {
        let s = setup();
        client(&s).open_escrow_with_expiry(
            &s.alice,
            &s.token_m,
            &100,
            &s.token_t,
            &125,
            &(START_TS + storage::DEFAULT_MAX_EXPIRY_SECS + 1),
        );
    }

    #[test]
    fn test_set_directed_taker_retarget() {
        let s = setup();
        let c = client(&s);
        let carol = Address::generate(&s.env);

        let id = c.open_escrow_directed(&s.alice, &s.token_m, &100, &s.token_t, &125, &s.bob);
        c.set_directed_taker(&s.alice, &id, &carol);

        let full = c.get_escrow_full(&id);
        assert_eq!(full.directed_taker, Some(carol.clone()));

        // The new target can accept; no tokens needed for that.
        c.accept_escrow(&carol, &id);
        assert_eq!(c.get_escrow_status(&id), STATUS_ACCEPTED);
    }

    #[test]
    #[should_panic(expected = "Error(Contract, #3)")] // Unauthorized = 3
    fn test_set_directed_taker_not_maker() {
        let s = setup();
        let c = client(&s);
        let id = c.open_escrow_directed(&s.alice, &s.token_m, &100, &s.token_t, &125, &s.bob);
        c.set_directed_taker(&s.bob, &id, &Address::generate(&s.env));
    }

    #[test]
    #[should_panic(expected = "Error(Contract, #16)")] // NotDirected = 16
    fn test_set_directed_taker_on_public_escrow() {
        let s = setup();
        let c = client(&s);
        let id = c.open_escrow(&s.alice, &s.token_m, &100, &s.token_t, &125);
        c.set_directed_taker(&s.alice, &id, &s.bob);
    }

    #[test]
    #[should_panic(expected = "Error(Contract, #15)")] // WrongStage = 15
    fn test_set_directed_taker_after_accept() {
        let s = setup();
        let c = client(&s);
        let id = c.open_escrow_directed(&s.alice, &s.token_m, &100, &s.token_t, &125, &s.bob);
        c.accept_escrow(&s.bob, &id);
        c.set_directed_taker(&s.alice, &id, &Address::generate(&s.env));
    }

    #[test]
    #[should_panic(expected = "Error(Contract, #3)")] // Unauthorized = 3
    fn test_accept_wrong_directed_taker() {
        let s = setup();
        let c = client(&s);
        let id = c.open_escrow_directed(&s.alice, &s.token_m, &100, &s.token_t, &125, &s.bob);
        c.accept_escrow(&Address::generate(&s.env), &id);
    }

    #[test]
    #[should_panic(expected = "Error(Contract, #9)")] // SelfCounterparty = 9
    fn test_accept_own_escrow() {
        let s = setup();
        let c = client(&s);
        let id = c.open_escrow(&s.alice, &s.token_m, &100, &s.token_t, &125);
        c.accept_escrow(&s.alice, &id);
    }

    #[test]
    fn test_accept_idempotent_for_same_taker() {
        let s = setup();
        let c = client(&s);
        let id = c.open_escrow(&s.alice, &s.token_m, &100, &s.token_t, &125);
        c.accept_escrow(&s.bob, &id);
        c.accept_escrow(&s.bob, &id);
        assert_eq!(c.get_escrow_status(&id), STATUS_ACCEPTED);

        // Re-acceptance confirmation is also allowed after maker funding.
        c.fund_maker(&s.alice, &id);
        c.accept_escrow(&s.bob, &id);
        assert_eq!(c.get_escrow_status(&id), STATUS_FUNDED_MAKER);
    }

    #[test]
    #[should_panic(expected = "Error(Contract, #17)")] // AlreadyAccepted = 17
    fn test_accept_by_different_taker() {
        let s = setup();
        let c = client(&s);
        let id = c.open_escrow(&s.alice, &s.token_m, &100, &s.token_t, &125);
        c.accept_escrow(&s.bob, &id);
        c.accept_escrow(&Address::generate(&s.env), &id);
    }

    #[test]
    #[should_panic(expected = "Error(Contract, #11)")] // EscrowCancelled = 11
    fn test_accept_after_cancel() {
        let s = setup();
        let c = client(&s);
        let id = c.open_escrow(&s.alice, &s.token_m, &100, &s.token_t, &125);
        c.cancel_before_funding(&s.alice, &id);
        c.accept_escrow(&s.bob, &id);
    }

    #[test]
    #[should_panic(expected = "Error(Contract, #13)")] // EscrowExpired = 13
    fn test_accept_after_open_expiry() {
        let s = setup();
        let c = client(&s);
        let id = c.open_escrow(&s.alice, &s.token_m, &100, &s.token_t, &125);
        set_time(&s.env, START_TS + storage::DEFAULT_OPEN_EXPIRY_SECS);
        c.accept_escrow(&s.bob, &id);
    }

    #[test]
    fn test_cancel_from_open_and_accepted() {
        let s = setup();
        let c = client(&s);

        let id0 = c.open_escrow(&s.alice, &s.token_m, &100, &s.token_t, &125);
        c.cancel_before_funding(&s.alice, &id0);
        assert_eq!(c.get_escrow_status(&id0), STATUS_CANCELLED);

        let id1 = c.open_escrow(&s.alice, &s.token_m, &100, &s.token_t, &125);
        c.accept_escrow(&s.bob, &id1);
        c.cancel_before_funding(&s.alice, &id1);
        assert_eq!(c.get_escrow_status(&id1), STATUS_CANCELLED);

        let counters = c.get_counters();
        assert_eq!(counters.count_cancelled, 2);
        assert_eq!(counters.count_open, 0);
        assert_eq!(counters.count_accepted, 0);
    }

    #[test]
    #[should_panic(expected = "Error(Contract, #3)")] // Unauthorized = 3
    fn test_cancel_by_non_maker() {
        let s = setup();
        let c = client(&s);
        let id = c.open_escrow(&s.alice, &s.token_m, &100, &s.token_t, &125);
        c.cancel_before_funding(&s.bob, &id);
    }

    #[test]
    #[should_panic(expected = "Error(Contract, #15)")] // WrongStage = 15
    fn test_cancel_after_maker_funded() {
        let s = setup();
        let c = client(&s);
        let id = c.open_escrow(&s.alice, &s.token_m, &100, &s.token_t, &125);
        c.fund_maker(&s.alice, &id);
        c.cancel_before_funding(&s.alice, &id);
    }

    #[test]
    #[should_panic(expected = "Error(Contract, #3)")] // Unauthorized = 3
    fn test_fund_maker_wrong_caller() {
        let s = setup();
        let c = client(&s);
        let id = c.open_escrow(&s.alice, &s.token_m, &100, &s.token_t, &125);
        c.fund_maker(&s.bob, &id);
    }

    #[test]
    fn test_fund_maker_moves_tokens_and_arms_expiry() {
        let s = setup();
        let c = client(&s);
        let id = c.open_escrow(&s.alice, &s.token_m, &100, &s.token_t, &125);
        c.fund_maker(&s.alice, &id);

        assert_eq!(token_balance(&s.env, &s.token_m, &s.contract_id), 100);
        let full = c.get_escrow_full(&id);
        assert!(full.maker_funded);
        assert_eq!(
            full.maker_funded_expiry_timestamp,
            START_TS + DEFAULT_MAKER_FUNDED_EXPIRY_SECS
        );
    }

    #[test]
    #[should_panic(expected = "Error(Contract, #15)")] // WrongStage = 15
    fn test_fund_taker_before_maker() {
        let s = setup();
        let c = client(&s);
        let id = c.open_escrow(&s.alice, &s.token_m, &100, &s.token_t, &125);
        c.accept_escrow(&s.bob, &id);
        c.fund_taker(&s.bob, &id);
    }

    #[test]
    #[should_panic(expected = "Error(Contract, #19)")] // NotAccepted = 19
    fn test_fund_taker_without_acceptance() {
        let s = setup();
        let c = client(&s);
        let id = c.open_escrow(&s.alice, &s.token_m, &100, &s.token_t, &125);
        c.fund_maker(&s.alice, &id);
        c.fund_taker(&s.bob, &id);
    }

    #[test]
    #[should_panic(expected = "Error(Contract, #3)")] // Unauthorized = 3
    fn test_fund_taker_wrong_directed_funder() {
        let s = setup();
        let c = client(&s);
        let carol = Address::generate(&s.env);
        StellarAssetClient::new(&s.env, &s.token_t).mint(&carol, &1_000);

        let id = c.open_escrow_directed(&s.alice, &s.token_m, &100, &s.token_t, &125, &s.bob);
        c.accept_escrow(&s.bob, &id);
        c.fund_maker(&s.alice, &id);
        c.fund_taker(&carol, &id);
    }

    #[test]
    #[should_panic(expected = "Error(Contract, #13)")] // EscrowExpired = 13
    fn test_fund_maker_after_open_expiry() {
        let s = setup();
        let c = client(&s);
        let id = c.open_escrow(&s.alice, &s.token_m, &100, &s.token_t, &125);
        set_time(&s.env, START_TS + storage::DEFAULT_OPEN_EXPIRY_SECS);
        c.fund_maker(&s.alice, &id);
    }

    #[test]
    #[should_panic(expected = "Error(Contract, #13)")] // EscrowExpired = 13
    fn test_fund_taker_after_maker_funded_expiry() {
        let s = setup();
        let c = client(&s);
        let id = c.open_escrow(&s.alice, &s.token_m, &100, &s.token_t, &125);
        c.accept_escrow(&s.bob, &id);
        c.fund_maker(&s.alice, &id);
        set_time(&s.env, START_TS + DEFAULT_MAKER_FUNDED_EXPIRY_SECS);
        c.fund_taker(&s.bob, &id);
    }

    #[test]
    fn test_maker_funded_expiry_then_refund() {
        let s = setup();
        let c = client(&s);
        let id = c.open_escrow(&s.alice, &s.token_m, &21, &s.token_t, &30);
        c.accept_escrow(&s.bob, &id);
        c.fund_maker(&s.alice, &id);

        let alice_m_before = token_balance(&s.env, &s.token_m, &s.alice);
        set_time(&s.env, START_TS + DEFAULT_MAKER_FUNDED_EXPIRY_SECS + 1);

        c.refund(&s.alice, &id);
        assert_eq!(c.get_escrow_status(&id), STATUS_REFUNDED);
        // The full deposit comes back; refunds are fee-free.
        assert_eq!(token_balance(&s.env, &s.token_m, &s.alice), alice_m_before + 21);
        assert_eq!(c.get_protocol_fee_balance(&s.token_m), 0);
    }

    #[test]
    #[should_panic(expected = "Error(Contract, #14)")] // EscrowNotExpired = 14
    fn test_refund_before_expiry() {
        let s = setup();
        let c = client(&s);
        let id = c.open_escrow(&s.alice, &s.token_m, &100, &s.token_t, &125);
        c.fund_maker(&s.alice, &id);
        c.refund(&s.alice, &id);
    }

    #[test]
    #[should_panic(expected = "Error(Contract, #14)")] // EscrowNotExpired = 14
    fn test_refund_unreachable_once_fully_funded() {
        let s = setup();
        let id = open_and_fund_both(&s, 40, 60);
        // FUNDED_BOTH never reports stage expiry, no matter how far the
        // clock advances; the escrow is committed to settlement.
        set_time(&s.env, START_TS + storage::DEFAULT_MAX_EXPIRY_SECS * 2);
        client(&s).refund(&s.alice, &id);
    }

    #[test]
    #[should_panic(expected = "Error(Contract, #12)")] // EscrowClosed = 12
    fn test_refund_twice() {
        let s = setup();
        let c = client(&s);
        let id = c.open_escrow(&s.alice, &s.token_m, &100, &s.token_t, &125);
        c.fund_maker(&s.alice, &id);
        set_time(&s.env, START_TS + DEFAULT_MAKER_FUNDED_EXPIRY_SECS + 1);
        c.refund(&s.alice, &id);
        // The only funded side was refunded, so the escrow is REFUNDED.
        c.refund(&s.alice, &id);
    }

    #[test]
    #[should_panic(expected = "Error(Contract, #22)")] // NotFunded = 22
    fn test_refund_unfunded_side() {
        let s = setup();
        let c = client(&s);
        let id = c.open_escrow(&s.alice, &s.token_m, &100, &s.token_t, &125);
        set_time(&s.env, START_TS + storage::DEFAULT_OPEN_EXPIRY_SECS + 1);
        c.refund(&s.alice, &id);
    }

    #[test]
    #[should_panic(expected = "Error(Contract, #20)")] // AlreadyWithdrawn = 20
    fn test_withdraw_twice_same_side() {
        let s = setup();
        let id = open_and_fund_both(&s, 100, 125);
        let c = client(&s);
        c.withdraw(&s.alice, &id);
        c.withdraw(&s.alice, &id);
    }

    #[test]
    #[should_panic(expected = "Error(Contract, #15)")] // WrongStage = 15
    fn test_withdraw_before_fully_funded() {
        let s = setup();
        let c = client(&s);
        let id = c.open_escrow(&s.alice, &s.token_m, &100, &s.token_t, &125);
        c.accept_escrow(&s.bob, &id);
        c.fund_maker(&s.alice, &id);
        c.withdraw(&s.alice, &id);
    }

    #[test]
    #[should_panic(expected = "Error(Contract, #3)")] // Unauthorized = 3
    fn test_withdraw_by_stranger() {
        let s = setup();
        let id = open_and_fund_both(&s, 100, 125);
        client(&s).withdraw(&Address::generate(&s.env), &id);
    }

    #[test]
    #[should_panic(expected = "Error(Contract, #12)")] // EscrowClosed = 12
    fn test_withdraw_after_executed() {
        let s = setup();
        let id = open_and_fund_both(&s, 100, 125);
        let c = client(&s);
        c.withdraw(&s.alice, &id);
        c.withdraw(&s.bob, &id);
        c.withdraw(&s.alice, &id);
    }

    #[test]
    #[should_panic(expected = "Error(Contract, #3)")] // Unauthorized = 3
    fn test_withdraw_fees_by_non_recipient() {
        let s = setup();
        let id = open_and_fund_both(&s, 100, 125);
        let c = client(&s);
        c.withdraw(&s.alice, &id);
        c.withdraw_protocol_fees(&s.alice, &s.token_m);
    }

    #[test]
    #[should_panic(expected = "Error(Contract, #23)")] // NoFeesAccrued = 23
    fn test_withdraw_fees_nothing_accrued() {
        let s = setup();
        client(&s).withdraw_protocol_fees(&s.fee_recipient, &s.token_m);
    }

    #[test]
    fn test_zero_fee_settlement() {
        let s = setup();
        let c = client(&s);
        c.set_fee_config(&s.owner, &s.fee_recipient, &0);

        let id = open_and_fund_both(&s, 100, 125);
        c.withdraw(&s.alice, &id);
        c.withdraw(&s.bob, &id);

        assert_eq!(c.get_protocol_fee_balance(&s.token_m), 0);
        assert_eq!(c.get_protocol_fee_balance(&s.token_t), 0);
        // Nets are the full amounts.
        assert_eq!(token_balance(&s.env, &s.token_t, &s.alice), 125);
        assert_eq!(token_balance(&s.env, &s.token_m, &s.bob), 100);
    }

    #[test]
    fn test_fee_ledger_aggregates_across_escrows() {
        let s = setup();
        let c = client(&s);

        let id0 = open_and_fund_both(&s, 100, 125);
        c.withdraw(&s.alice, &id0);
        c.withdraw(&s.bob, &id0);

        let id1 = open_and_fund_both(&s, 300, 500);
        c.withdraw(&s.alice, &id1);
        c.withdraw(&s.bob, &id1);

        // ceil(1% of 100) + ceil(1% of 300) on maker_token,
        // ceil(1% of 125) + ceil(1% of 500) on taker_token.
        assert_eq!(c.get_protocol_fee_balance(&s.token_m), 1 + 3);
        assert_eq!(c.get_protocol_fee_balance(&s.token_t), 2 + 5);
    }

    #[test]
    #[should_panic(expected = "Error(Contract, #7)")] // InvalidAmount = 7
    fn test_fee_quote_negative_amount() {
        let s = setup();
        client(&s).get_fee_quote(&-1, &100);
    }

    #[test]
    #[should_panic(expected = "Error(Contract, #3)")] // Unauthorized = 3
    fn test_set_fee_config_by_non_owner() {
        let s = setup();
        client(&s).set_fee_config(&s.bob, &s.fee_recipient, &50);
    }

    #[test]
    #[should_panic(expected = "Error(Contract, #4)")] // InvalidFeeBps = 4
    fn test_set_fee_config_over_cap() {
        let s = setup();
        client(&s).set_fee_config(&s.owner, &s.fee_recipient, &(MAX_PROTOCOL_FEE_BPS + 1));
    }

    #[test]
    fn test_set_fee_config_applies() {
        let s = setup();
        let c = client(&s);
        c.set_fee_config(&s.owner, &s.fee_recipient, &50);
        assert_eq!(c.get_config().protocol_fee_bps, 50);
    }

    #[test]
    #[should_panic(expected = "Error(Contract, #3)")] // Unauthorized = 3
    fn test_set_expiry_config_by_non_owner() {
        let s = setup();
        client(&s).set_expiry_config(&s.bob, &100, &100, &10, &1_000);
    }

    #[test]
    #[should_panic(expected = "Error(Contract, #5)")] // InvalidExpiryConfig = 5
    fn test_set_expiry_config_default_out_of_bounds() {
        let s = setup();
        client(&s).set_expiry_config(&s.owner, &5, &100, &10, &1_000);
    }

    #[test]
    fn test_get_escrow_not_found_sentinel() {
        let s = setup();
        let c = client(&s);
        assert!(!c.get_escrow_exists(&999_999));
        assert_eq!(c.get_escrow_status(&999_999), STATUS_NOT_FOUND);
        let details = c.get_escrow(&999_999);
        assert_eq!(details.status, STATUS_NOT_FOUND);
        assert_eq!(details.maker, None);
        let full = c.get_escrow_full(&999_999);
        assert_eq!(full.status, STATUS_NOT_FOUND);
    }

    #[test]
    fn test_expiry_flags_in_full_view() {
        let s = setup();
        let c = client(&s);
        let id = c.open_escrow(&s.alice, &s.token_m, &100, &s.token_t, &125);

        set_time(&s.env, START_TS + storage::DEFAULT_OPEN_EXPIRY_SECS);
        let full = c.get_escrow_full(&id);
        assert!(full.is_open_expired);
        assert!(full.is_expired);
        assert!(!full.is_maker_funded_expired);
        // Still OPEN: expiry only gates actions, it is not a transition.
        assert_eq!(full.status, STATUS_OPEN);
    }

    #[test]
    fn test_counters_track_transitions() {
        let s = setup();
        let c = client(&s);

        let executed = open_and_fund_both(&s, 100, 125);
        c.withdraw(&s.alice, &executed);
        c.withdraw(&s.bob, &executed);

        c.open_escrow(&s.alice, &s.token_m, &10, &s.token_t, &20);
        let directed =
            c.open_escrow_directed(&s.alice, &s.token_m, &10, &s.token_t, &20, &s.bob);
        c.accept_escrow(&s.bob, &directed);

        let counters = c.get_counters();
        assert_eq!(counters.total_escrows, 3);
        assert_eq!(counters.count_executed, 1);
        assert_eq!(counters.count_open, 1);
        assert_eq!(counters.count_accepted, 1);
        assert_eq!(counters.count_public, 2);
        assert_eq!(counters.count_directed, 1);
        assert_eq!(counters.count_funded_both, 0);
    }

    #[test]
    fn test_pagination_walk() {
        let s = setup();
        let c = client(&s);
        for _ in 0..5 {
            c.open_escrow(&s.alice, &s.token_m, &10, &s.token_t, &20);
        }

        let page0 = c.get_escrow_ids_page(&0, &2);
        assert_eq!(page0.cursor_in, 0);
        assert_eq!(page0.limit, 2);
        assert_eq!(page0.ids.len(), 2);
        assert_eq!(page0.next_cursor, 2);

        let page1 = c.get_escrow_ids_page(&page0.next_cursor, &2);
        assert_eq!(page1.ids.len(), 2);
        assert_eq!(page1.next_cursor, 4);

        let page2 = c.get_escrow_ids_page(&page1.next_cursor, &2);
        assert_eq!(page2.ids.len(), 1);
        assert_eq!(page2.ids.get(0), Some(4));
        assert_eq!(page2.next_cursor, 0);

        let beyond = c.get_escrow_ids_page(&100, &2);
        assert_eq!(beyond.ids.len(), 0);
        assert_eq!(beyond.next_cursor, 0);
    }

    #[test]
    #[should_panic(expected = "Error(Contract, #25)")] // InvalidLimit = 25
    fn test_pagination_zero_limit() {
        let s = setup();
        client(&s).get_escrow_ids_page(&0, &0);
    }

    #[test]
    #[should_panic(expected = "Error(Contract, #25)")] // InvalidLimit = 25
    fn test_pagination_limit_too_large() {
        let s = setup();
        client(&s).get_escrow_ids_page(&0, &(MAX_PAGE_LIMIT + 1));
    }
}
