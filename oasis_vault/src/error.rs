use soroban_sdk::contracterror;

#[contracterror]
#[derive(Copy, Clone, Debug, Eq, PartialEq, PartialOrd, Ord)]
#[repr(u32)]
pub enum VaultError {
    /// Contract already initialized
    AlreadyInitialized = 1,
    /// Contract not initialized
    NotInitialized = 2,
    /// Caller lacks permission for this operation
    Unauthorized = 3,
    /// Contract is paused
    ContractPaused = 4,
    /// Protocol fee outside 0..=500 per mille
    InvalidProtocolFee = 5,
    /// Timelock must be 6, 9, or 12 months
    InvalidTimelock = 6,
    /// Amount must be positive
    InvalidAmount = 7,
    /// Need to withdraw before making a new deposit
    WithdrawPending = 8,
    /// Not enough balance: the reserve cannot cover the quoted HTR plus bonus
    InsufficientReserve = 9,
    /// Withdrawal amount too high
    WithdrawalTooHigh = 10,
    /// Position is still timelocked
    PositionLocked = 11,
    /// Caller has no open position
    NoPosition = 12,
    /// Position is already closed
    PositionAlreadyClosed = 13,
    /// Position must be closed before withdrawing
    PositionNotClosed = 14,
    /// Not enough HTR balance for the requested closed-position withdrawal
    InsufficientHtrBalance = 15,
    /// Not enough token balance for the requested closed-position withdrawal
    InsufficientTokenBalance = 16,
    /// Pool manager returned an unusable quote or reserve
    InvalidQuote = 17,
    /// Arithmetic overflow
    Overflow = 18,
    /// Critical storage data missing (contract state corrupted)
    StorageCorrupted = 19,
}
