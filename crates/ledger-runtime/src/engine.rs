//! Ledger Engine
//!
//! Owns the root Triangle Node and the Wallet Ledger Index. Every mutation
//! validates first and commits second; the commit path cannot fail, so an
//! accepted transaction is fully inserted, rehashed and indexed, and a
//! rejected one leaves no trace.

use crate::{
    error::{LedgerError, PreconditionError, SnapshotError, ValidationError},
    triangle::{NodeCoord, Route, TriangleNode, MAX_LEVEL},
    wallet_index::WalletIndex,
    Amount, Transaction, MINT_ADDRESS,
};
use ed25519_dalek::{SigningKey, VerifyingKey};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Result of a full-tree verification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyReport {
    pub valid: bool,
    /// First node (post-order) whose stored hash is wrong
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mismatch: Option<NodeCoord>,
}

/// The Fractal Ledger engine
#[derive(Debug, Clone)]
pub struct LedgerEngine {
    root: TriangleNode,
    index: WalletIndex,
    capacity: usize,
    mint_authority: VerifyingKey,
    next_seq: u64,
    last_timestamp: i64,
}

impl LedgerEngine {
    /// Create an engine with an empty root leaf. `capacity` must be at
    /// least 1; [`LedgerConfig::validate`](crate::LedgerConfig::validate)
    /// enforces this for every ledger.
    pub fn new(capacity: usize, mint_authority: VerifyingKey) -> Self {
        debug_assert!(capacity > 0, "node capacity must be at least 1");
        Self {
            root: TriangleNode::root(),
            index: WalletIndex::new(),
            capacity,
            mint_authority,
            next_seq: 0,
            last_timestamp: i64::MIN,
        }
    }

    /// Rebuild an engine by replaying a history in order. The first
    /// transaction, if it is a mint, forms the genesis triad.
    pub fn replay<I>(capacity: usize, mint_authority: VerifyingKey, history: I) -> Result<Self, LedgerError>
    where
        I: IntoIterator<Item = Transaction>,
    {
        let mut engine = Self::new(capacity, mint_authority);
        for tx in history {
            if tx.seq == 0 && tx.is_mint() {
                engine.genesis(tx)?;
            } else if tx.is_mint() {
                engine.mint(tx)?;
            } else {
                engine.submit(tx)?;
            }
        }
        Ok(engine)
    }

    /// Rebuild an engine from an imported tree. Its transactions are
    /// replayed through full validation, the replayed tree must have the
    /// imported layout, and the imported stored hashes are then kept
    /// as-is so that [`verify`](Self::verify) reports any forged ones.
    pub(crate) fn import(
        root: &TriangleNode,
        capacity: usize,
        mint_authority: VerifyingKey,
    ) -> Result<Self, LedgerError> {
        let mut transactions = Vec::with_capacity(root.transaction_count());
        root.walk(&mut |node| transactions.extend(node.transactions().iter().cloned()));
        transactions.sort_by_key(|tx| tx.seq);

        for (expected, tx) in transactions.iter().enumerate() {
            if tx.seq != expected as u64 {
                return Err(SnapshotError::SequenceGap(expected as u64).into());
            }
        }

        let history = transactions.iter().map(|tx| (**tx).clone());
        let mut engine = Self::replay(capacity, mint_authority, history).map_err(|e| match e {
            LedgerError::Validation(e) => SnapshotError::InvalidHistory(e).into(),
            other => other,
        })?;
        engine.root.adopt_stored_hashes(root)?;
        Ok(engine)
    }

    /// Overwrite stored hashes with previously persisted ones. Every
    /// coordinate must name a node of the current tree.
    pub(crate) fn restore_stored_hashes(
        &mut self,
        hashes: &[(NodeCoord, blake3::Hash)],
    ) -> Result<(), SnapshotError> {
        for (coord, hash) in hashes {
            let node = self.root.find_mut(*coord).ok_or(SnapshotError::Layout {
                level: coord.level,
                index: coord.index,
            })?;
            node.overwrite_hash(*hash);
        }
        Ok(())
    }

    /// Current root, read-only
    pub fn root(&self) -> &TriangleNode {
        &self.root
    }

    pub fn index(&self) -> &WalletIndex {
        &self.index
    }

    /// Node capacity `C`
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn mint_authority(&self) -> VerifyingKey {
        self.mint_authority
    }

    /// Sequence number the next transaction must carry
    pub fn next_seq(&self) -> u64 {
        self.next_seq
    }

    /// Timestamp for a transaction created now: wall clock, clamped so that
    /// timestamps never go backwards.
    pub fn next_timestamp(&self) -> i64 {
        chrono::Utc::now().timestamp_millis().max(self.last_timestamp)
    }

    /// Build and sign the next transaction from `sender`
    pub fn prepare(&self, sender: &str, receiver: &str, amount: Amount, key: &SigningKey) -> Transaction {
        Transaction::new_signed(
            self.next_seq,
            sender,
            receiver,
            amount,
            self.next_timestamp(),
            key,
        )
    }

    /// Submit a signed transfer between two wallets
    pub fn submit(&mut self, tx: Transaction) -> Result<Arc<Transaction>, ValidationError> {
        if tx.is_mint() {
            return Err(ValidationError::MintNotAllowed);
        }
        self.validate(&tx)?;

        let balance = self.index.balance_for(&tx.sender);
        if balance < tx.amount {
            return Err(ValidationError::InsufficientFunds {
                wallet: tx.sender.clone(),
                balance,
                requested: tx.amount,
            });
        }

        Ok(self.commit(tx))
    }

    /// Credit a wallet from the mint. Onboarding only.
    pub(crate) fn mint(&mut self, tx: Transaction) -> Result<Arc<Transaction>, ValidationError> {
        if !tx.is_mint() {
            return Err(ValidationError::ExpectedMint);
        }
        self.validate(&tx)?;
        Ok(self.commit(tx))
    }

    /// Subdivide the empty root into the genesis triad, then credit the
    /// foundational wallet.
    pub(crate) fn genesis(&mut self, tx: Transaction) -> Result<Arc<Transaction>, LedgerError> {
        if !self.root.is_leaf() || !self.root.transactions().is_empty() {
            return Err(PreconditionError::RootNotEmpty.into());
        }
        if !tx.is_mint() {
            return Err(ValidationError::ExpectedMint.into());
        }
        self.validate(&tx)?;

        self.root.subdivide();
        tracing::info!("Genesis triad formed under root {}", self.root.coord());

        Ok(self.commit(tx))
    }

    /// Content checks that need no signature: amount and parties
    pub fn check_parties(sender: &str, receiver: &str, amount: Amount) -> Result<(), ValidationError> {
        if !amount.is_positive() {
            return Err(ValidationError::NonPositiveAmount(amount));
        }
        if sender.is_empty() {
            return Err(ValidationError::EmptySender);
        }
        if receiver.is_empty() {
            return Err(ValidationError::EmptyReceiver);
        }
        if sender == receiver {
            return Err(ValidationError::SelfTransfer(sender.to_string()));
        }
        if receiver == MINT_ADDRESS {
            return Err(ValidationError::MintReceiver);
        }
        Ok(())
    }

    fn validate(&self, tx: &Transaction) -> Result<(), ValidationError> {
        Self::check_parties(&tx.sender, &tx.receiver, tx.amount)?;
        if tx.seq != self.next_seq {
            return Err(ValidationError::SequenceMismatch {
                expected: self.next_seq,
                actual: tx.seq,
            });
        }
        tx.verify_id()?;
        if tx.timestamp < self.last_timestamp {
            return Err(ValidationError::StaleTimestamp {
                last: self.last_timestamp,
                actual: tx.timestamp,
            });
        }
        tx.verify_signature(&self.mint_authority)?;
        self.index.check(tx)?;

        let level = self
            .root
            .landing_level(&Route::for_transaction(tx), self.capacity);
        if level > MAX_LEVEL {
            return Err(ValidationError::TreeDepthExceeded(level));
        }
        Ok(())
    }

    fn commit(&mut self, tx: Transaction) -> Arc<Transaction> {
        let tx = Arc::new(tx);
        let route = Route::for_transaction(&tx);
        let placement = self.root.insert(Arc::clone(&tx), &route, self.capacity);
        self.index.record(&tx);
        self.next_seq += 1;
        self.last_timestamp = tx.timestamp;

        if let Some(coord) = placement.subdivided {
            tracing::debug!("Node {} subdivided", coord);
        }
        tracing::debug!(
            "Accepted tx {} (seq {}) into node {}: {} -> {} {}",
            tx.id,
            tx.seq,
            placement.node,
            tx.sender,
            tx.receiver,
            tx.amount
        );

        tx
    }

    /// Recompute every hash bottom-up and compare with the stored ones.
    /// Read-only: a mismatch is reported, never repaired.
    pub fn verify(&self) -> VerifyReport {
        let mismatch = self.root.first_mismatch();
        if let Some(coord) = mismatch {
            tracing::warn!("Integrity check failed at node {}", coord);
        }
        VerifyReport {
            valid: mismatch.is_none(),
            mismatch,
        }
    }

    pub fn transactions_for(&self, address: &str) -> &[Arc<Transaction>] {
        self.index.transactions_for(address)
    }

    pub fn balance_for(&self, address: &str) -> Amount {
        self.index.balance_for(address)
    }

    /// Every transaction in history order
    pub fn history(&self) -> Vec<Arc<Transaction>> {
        let mut transactions = Vec::with_capacity(self.root.transaction_count());
        self.root
            .walk(&mut |node| transactions.extend(node.transactions().iter().cloned()));
        transactions.sort_by_key(|tx| tx.seq);
        transactions
    }

    #[cfg(test)]
    pub(crate) fn root_mut(&mut self) -> &mut TriangleNode {
        &mut self.root
    }
}
