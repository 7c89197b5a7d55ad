use soroban_sdk::{contracttype, Address, Vec};

/// Storage keys for the contract.
/// Using enum with variants for type-safe storage access.
#[derive(Clone)]
#[contracttype]
pub enum DataKey {
    /// Contract owner (admin for fee/expiry config)
    Owner,
    /// Identity allowed to collect aggregated protocol fees
    FeeRecipient,
    /// Protocol fee rate in bps of 10_000
    ProtocolFeeBps,
    /// Default open-stage expiry window in seconds
    DefaultOpenExpirySecs,
    /// Default maker-funded-stage expiry window in seconds
    DefaultMakerFundedExpirySecs,
    /// Minimum allowed explicit expiry window in seconds
    MinExpirySecs,
    /// Maximum allowed explicit expiry window in seconds
    MaxExpirySecs,
    /// Next escrow id (monotonic counter; ids are dense from 0)
    NextEscrowId,
    /// Aggregate status counters
    Counters,
    /// Escrow record: Escrow(escrow_id)
    Escrow(u64),
    /// Aggregated protocol fee balance per token: FeeBalance(token)
    FeeBalance(Address),
}

/// Escrow lifecycle statuses.
/// Kept as plain integers so views can also report the -1 "not found"
/// sentinel without a separate type.
pub const STATUS_OPEN: i32 = 0;
pub const STATUS_ACCEPTED: i32 = 1;
pub const STATUS_FUNDED_MAKER: i32 = 2;
pub const STATUS_FUNDED_BOTH: i32 = 3;
pub const STATUS_EXECUTED: i32 = 4;
pub const STATUS_REFUNDED: i32 = 5;
pub const STATUS_CANCELLED: i32 = -2;
pub const STATUS_NOT_FOUND: i32 = -1;

/// Protocol fee cap: 200 bp = 2.00%.
pub const MAX_PROTOCOL_FEE_BPS: i128 = 200;

/// Basis points denominator (100% = 10000 bp).
pub const FEE_DENOMINATOR: i128 = 10_000;

/// Expiry defaults; initialize() and set_expiry_config() may override
/// the per-instance values within the min/max bounds.
pub const DEFAULT_OPEN_EXPIRY_SECS: u64 = 30 * 24 * 60 * 60;
pub const DEFAULT_MAKER_FUNDED_EXPIRY_SECS: u64 = 7 * 24 * 60 * 60;
pub const DEFAULT_MIN_EXPIRY_SECS: u64 = 60;
pub const DEFAULT_MAX_EXPIRY_SECS: u64 = 365 * 24 * 60 * 60;

/// Hard cap for a single pagination request.
pub const MAX_PAGE_LIMIT: u64 = 200;

/// One escrow between a maker and a taker.
///
/// Records are created by the open entry points, mutated through
/// accept/fund/withdraw/refund/cancel, and never deleted.
#[derive(Clone)]
#[contracttype]
pub struct Escrow {
    pub maker: Address,
    pub taker: Option<Address>,
    pub is_directed: bool,
    pub directed_taker: Option<Address>,
    pub maker_token: Address,
    pub maker_amount: i128,
    pub taker_token: Address,
    pub taker_amount: i128,
    pub maker_funded: bool,
    pub taker_funded: bool,
    pub maker_withdrawn: bool,
    pub taker_withdrawn: bool,
    pub maker_refunded: bool,
    pub taker_refunded: bool,
    /// Applies while OPEN/ACCEPTED (unix seconds; 0 means not set)
    pub open_expiry: u64,
    /// Applies while FUNDED_MAKER (unix seconds; 0 means not set)
    pub maker_funded_expiry: u64,
    pub status: i32,
}

/// Aggregate stats maintained incrementally on every status transition.
#[derive(Clone)]
#[contracttype]
pub struct Counters {
    pub total_escrows: u64,
    pub count_open: u64,
    pub count_accepted: u64,
    pub count_funded_maker: u64,
    pub count_funded_both: u64,
    pub count_executed: u64,
    pub count_refunded: u64,
    pub count_cancelled: u64,
    pub count_public: u64,
    pub count_directed: u64,
}

impl Counters {
    pub fn zero() -> Self {
        Counters {
            total_escrows: 0,
            count_open: 0,
            count_accepted: 0,
            count_funded_maker: 0,
            count_funded_both: 0,
            count_executed: 0,
            count_refunded: 0,
            count_cancelled: 0,
            count_public: 0,
            count_directed: 0,
        }
    }
}

/// Contract configuration projection.
#[derive(Clone)]
#[contracttype]
pub struct ConfigView {
    pub owner: Address,
    pub fee_recipient: Address,
    pub protocol_fee_bps: i128,
    pub default_open_expiry_secs: u64,
    pub default_maker_funded_expiry_secs: u64,
    pub min_expiry_secs: u64,
    pub max_expiry_secs: u64,
}

/// Pure fee preview for hypothetical amounts.
#[derive(Clone)]
#[contracttype]
pub struct FeeQuoteView {
    pub maker_fee: i128,
    pub taker_fee: i128,
    /// maker receives taker_token net of taker_fee
    pub maker_net_receive: i128,
    /// taker receives maker_token net of maker_fee
    pub taker_net_receive: i128,
}

/// Summary escrow view. `status == -1` means "escrow not found" and all
/// other fields hold defaults.
#[derive(Clone)]
#[contracttype]
pub struct EscrowDetails {
    pub maker: Option<Address>,
    pub taker: Option<Address>,
    pub maker_token: Option<Address>,
    pub maker_amount: i128,
    pub taker_token: Option<Address>,
    pub taker_amount: i128,
    pub maker_funded: bool,
    pub taker_funded: bool,
    pub maker_withdrawn: bool,
    pub taker_withdrawn: bool,
    pub is_cancelled: bool,
    pub status: i32,
}

/// Extended escrow view including refund flags and stage expiry state,
/// evaluated against the current ledger time.
#[derive(Clone)]
#[contracttype]
pub struct EscrowDetailsFull {
    pub maker: Option<Address>,
    pub taker: Option<Address>,
    pub maker_token: Option<Address>,
    pub maker_amount: i128,
    pub taker_token: Option<Address>,
    pub taker_amount: i128,
    pub maker_funded: bool,
    pub taker_funded: bool,
    pub maker_withdrawn: bool,
    pub taker_withdrawn: bool,
    pub maker_refunded: bool,
    pub taker_refunded: bool,
    pub open_expiry_timestamp: u64,
    pub maker_funded_expiry_timestamp: u64,
    pub is_open_expired: bool,
    pub is_maker_funded_expired: bool,
    pub is_expired: bool,
    pub is_directed: bool,
    pub directed_taker: Option<Address>,
    pub is_cancelled: bool,
    pub is_refunded: bool,
    pub status: i32,
}

/// One page of escrow ids for index-cursor pagination.
/// `next_cursor == 0` means no more data.
#[derive(Clone)]
#[contracttype]
pub struct EscrowIdsPage {
    pub cursor_in: u64,
    pub limit: u64,
    pub next_cursor: u64,
    pub ids: Vec<u64>,
}

impl EscrowDetails {
    pub fn not_found() -> Self {
        EscrowDetails {
            maker: None,
            taker: None,
            maker_token: None,
            maker_amount: 0,
            taker_token: None,
            taker_amount: 0,
            maker_funded: false,
            taker_funded: false,
            maker_withdrawn: false,
            taker_withdrawn: false,
            is_cancelled: false,
            status: STATUS_NOT_FOUND,
        }
    }
}

impl EscrowDetailsFull {
    pub fn not_found() -> Self {
        EscrowDetailsFull {
            maker: None,
            taker: None,
            maker_token: None,
            maker_amount: 0,
            taker_token: None,
            taker_amount: 0,
            maker_funded: false,
            taker_funded: false,
            maker_withdrawn: false,
            taker_withdrawn: false,
            maker_refunded: false,
            taker_refunded: false,
            open_expiry_timestamp: 0,
            maker_funded_expiry_timestamp: 0,
            is_open_expired: false,
            is_maker_funded_expired: false,
            is_expired: false,
            is_directed: false,
            directed_taker: None,
            is_cancelled: false,
            is_refunded: false,
            status: STATUS_NOT_FOUND,
        }
    }
}
