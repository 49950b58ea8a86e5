//! Ledger Errors

use crate::Amount;
use thiserror::Error;

/// A submission was rejected before touching any state
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Amount must be positive, got {0}")]
    NonPositiveAmount(Amount),

    #[error("Sender address is empty")]
    EmptySender,

    #[error("Receiver address is empty")]
    EmptyReceiver,

    #[error("Sender and receiver are the same wallet: {0}")]
    SelfTransfer(String),

    #[error("The mint address may only send during onboarding")]
    MintNotAllowed,

    #[error("The mint address cannot receive funds")]
    MintReceiver,

    #[error("Expected a mint transaction")]
    ExpectedMint,

    #[error("Invalid wallet address: {0}")]
    InvalidAddress(String),

    #[error("Invalid signature for transaction {0}")]
    InvalidSignature(String),

    #[error("No signing authority held for wallet {0}")]
    UnknownSigner(String),

    #[error("Expected sequence number {expected}, got {actual}")]
    SequenceMismatch { expected: u64, actual: u64 },

    #[error("Transaction id does not match its content")]
    IdMismatch,

    #[error("Timestamp {actual} is earlier than the last accepted timestamp {last}")]
    StaleTimestamp { last: i64, actual: i64 },

    #[error("Insufficient funds in {wallet}: balance {balance}, requested {requested}")]
    InsufficientFunds {
        wallet: String,
        balance: Amount,
        requested: Amount,
    },

    #[error("Balance overflow for wallet {0}")]
    BalanceOverflow(String),

    #[error("Transaction would land at level {0}, deeper than the tree can address")]
    TreeDepthExceeded(u32),
}

/// An operation was called in the wrong onboarding state
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PreconditionError {
    #[error("Founder onboarding has not been performed")]
    NotOnboarded,

    #[error("Founder onboarding has already been completed")]
    AlreadyOnboarded,

    #[error("The genesis triad requires an empty, undivided root")]
    RootNotEmpty,

    #[error("The ledger was imported with a mint authority this instance does not hold")]
    ForeignMintAuthority,
}

/// A snapshot could not be turned back into a ledger
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SnapshotError {
    #[error("Unsupported snapshot version {0}")]
    UnsupportedVersion(u32),

    #[error("Node ({level}, {index}) has {count} children, expected 0 or 3")]
    ChildCount { level: u32, index: u64, count: usize },

    #[error("Node ({level}, {index}) found where ({expected_level}, {expected_index}) was expected")]
    Coordinate {
        level: u32,
        index: u64,
        expected_level: u32,
        expected_index: u64,
    },

    #[error("Node ({level}, {index}) holds {count} transactions, capacity is {capacity}")]
    OverCapacity {
        level: u32,
        index: u64,
        count: usize,
        capacity: usize,
    },

    #[error("Node ({level}, {index}) has a malformed hash")]
    MalformedHash { level: u32, index: u64 },

    #[error("Transaction sequence numbers are not contiguous at {0}")]
    SequenceGap(u64),

    #[error("Invalid capacity {0}")]
    InvalidCapacity(usize),

    #[error("Node ({level}, {index}) has children deeper than the tree can address")]
    TooDeep { level: u32, index: u64 },

    #[error("Node ({level}, {index}) does not match the layout its history produces")]
    Layout { level: u32, index: u64 },

    #[error("Snapshot history is invalid: {0}")]
    InvalidHistory(ValidationError),

    #[error("Foundational wallet does not match the genesis transaction")]
    FounderMismatch,
}

/// Invalid ledger configuration
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Node capacity must be at least 1")]
    ZeroCapacity,

    #[error("Founder grant must be positive, got {0}")]
    FounderGrant(Amount),

    #[error("Standard grant must be positive, got {0}")]
    StandardGrant(Amount),
}

/// Top-level ledger error
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Precondition failed: {0}")]
    Precondition(#[from] PreconditionError),

    #[error("Invalid snapshot: {0}")]
    Snapshot(#[from] SnapshotError),

    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

pub type LedgerResult<T> = Result<T, LedgerError>;
