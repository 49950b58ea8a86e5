//! Fractal Ledger Runtime - triangulated ledger core
//!
//! This crate provides the core of the Fractal Ledger:
//! - Signed transactions and custodial wallet keys
//! - A recursive ternary tree of Triangle Nodes, each a container of
//!   transactions and a hash commitment over its children
//! - Wallet index for balances and per-wallet history
//! - Founder and standard onboarding
//! - Full-tree verification, JSON snapshots and sled persistence

pub mod amount;
pub mod config;
pub mod engine;
pub mod error;
pub mod keyring;
pub mod ledger;
pub mod onboarding;
pub mod persistence;
pub mod snapshot;
pub mod transaction;
pub mod triangle;
pub mod visualize;
pub mod wallet_index;


pub use amount::Amount;
pub use config::LedgerConfig;
pub use engine::{LedgerEngine, VerifyReport};
pub use error::{
    ConfigError, LedgerError, LedgerResult, PreconditionError, SnapshotError, ValidationError,
};
pub use keyring::Keyring;
pub use ledger::{Ledger, LedgerState};
pub use onboarding::{FounderOnboarding, LedgerStage, OnboardingService, StandardOnboarding};
pub use persistence::{LedgerMetadata, LedgerPersistence, PersistentStore};
pub use snapshot::{LedgerSnapshot, NodeSnapshot, SNAPSHOT_VERSION};
pub use transaction::{address_of, parse_address, Transaction, TxSignature, MINT_ADDRESS};
pub use triangle::{NodeCoord, Placement, TriangleNode};
pub use visualize::render_tree;
pub use wallet_index::{WalletEntry, WalletIndex};

/// Default node capacity `C`
pub const DEFAULT_NODE_CAPACITY: usize = 3;

/// Units minted to the foundational wallet
pub const FOUNDER_GRANT: i64 = 100;

/// Units minted by each standard onboarding
pub const STANDARD_GRANT: i64 = 10;
