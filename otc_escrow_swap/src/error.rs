use soroban_sdk::contracterror;

#[contracterror]
#[derive(Copy, Clone, Debug, Eq, PartialEq, PartialOrd, Ord)]
#[repr(u32)]
pub enum EscrowError {
    /// Contract already initialized
    AlreadyInitialized = 1,
    /// Contract not initialized
    NotInitialized = 2,
    /// Caller lacks permission for this operation
    Unauthorized = 3,
    /// protocol_fee_bps out of bounds
    InvalidFeeBps = 4,
    /// Expiry defaults/bounds violate 0 < min <= default <= max
    InvalidExpiryConfig = 5,
    /// Explicit expiry timestamp outside the min/max window from now
    InvalidExpiry = 6,
    /// Amount must be positive
    InvalidAmount = 7,
    /// Maker and taker tokens must differ
    SameToken = 8,
    /// Maker and the counterparty must be different identities
    SelfCounterparty = 9,
    /// Escrow ID does not exist
    EscrowNotFound = 10,
    /// Escrow has been cancelled
    EscrowCancelled = 11,
    /// Escrow is already closed (executed or refunded)
    EscrowClosed = 12,
    /// Escrow has expired for its current stage
    EscrowExpired = 13,
    /// Escrow has not expired for its current stage
    EscrowNotExpired = 14,
    /// Escrow is not in a state that allows this action
    WrongStage = 15,
    /// Escrow is not directed
    NotDirected = 16,
    /// Escrow already accepted by another taker
    AlreadyAccepted = 17,
    /// This side is already funded
    AlreadyFunded = 18,
    /// Escrow has not been accepted by a taker
    NotAccepted = 19,
    /// This side has already withdrawn
    AlreadyWithdrawn = 20,
    /// This side has already been refunded
    AlreadyRefunded = 21,
    /// This side is not funded
    NotFunded = 22,
    /// No protocol fees available for this token
    NoFeesAccrued = 23,
    /// Fee exceeds the settled amount
    FeeExceedsAmount = 24,
    /// Page limit must be in (0, 200]
    InvalidLimit = 25,
    /// Arithmetic overflow
    Overflow = 26,
    /// Critical storage data missing (contract state corrupted)
    StorageCorrupted = 27,
}
