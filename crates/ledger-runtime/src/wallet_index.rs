//! Wallet Ledger Index
//!
//! A cache over the transaction history: for every address, the
//! transactions touching it (shared references into the tree, not copies)
//! and a running balance.

use crate::{error::ValidationError, Amount, Transaction, MINT_ADDRESS};
use std::{collections::HashMap, sync::Arc};

/// Index entry for one wallet
#[derive(Debug, Clone, Default)]
pub struct WalletEntry {
    transactions: Vec<Arc<Transaction>>,
    balance: Amount,
}

impl WalletEntry {
    pub fn transactions(&self) -> &[Arc<Transaction>] {
        &self.transactions
    }

    pub fn balance(&self) -> Amount {
        self.balance
    }
}

/// Address -> transactions and balance
#[derive(Debug, Clone, Default)]
pub struct WalletIndex {
    entries: HashMap<String, WalletEntry>,
}

impl WalletIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check that applying `tx` keeps both balances representable.
    /// Sufficient-funds policy is the engine's concern, not the index's.
    pub fn check(&self, tx: &Transaction) -> Result<(), ValidationError> {
        for address in [tx.sender.as_str(), tx.receiver.as_str()] {
            if address == MINT_ADDRESS {
                continue;
            }
            self.balance_for(address)
                .checked_add(tx.delta_for(address))
                .ok_or_else(|| ValidationError::BalanceOverflow(address.to_string()))?;
        }
        Ok(())
    }

    /// Record an accepted transaction for its sender and receiver.
    /// Call [`WalletIndex::check`] first; arithmetic saturates here.
    pub fn record(&mut self, tx: &Arc<Transaction>) {
        for address in [tx.sender.as_str(), tx.receiver.as_str()] {
            if address == MINT_ADDRESS {
                continue;
            }
            let entry = self.entries.entry(address.to_string()).or_default();
            entry.transactions.push(Arc::clone(tx));
            entry.balance = Amount::from_micros(
                entry.balance.micros().saturating_add(tx.delta_for(address).micros()),
            );
        }
    }

    /// Transactions touching `address`, oldest first. Empty for unknown
    /// addresses.
    pub fn transactions_for(&self, address: &str) -> &[Arc<Transaction>] {
        self.entries
            .get(address)
            .map(|e| e.transactions())
            .unwrap_or(&[])
    }

    /// Balance of `address`; zero for unknown addresses
    pub fn balance_for(&self, address: &str) -> Amount {
        self.entries
            .get(address)
            .map(|e| e.balance)
            .unwrap_or(Amount::ZERO)
    }

    pub fn entry(&self, address: &str) -> Option<&WalletEntry> {
        self.entries.get(address)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::SigningKey;

    fn tx(seq: u64, sender: &str, receiver: &str, units: i64) -> Arc<Transaction> {
        let key = SigningKey::from_bytes(&[1u8; 32]);
        Arc::new(Transaction::new_signed(
            seq,
            sender,
            receiver,
            Amount::from_units(units),
            seq as i64,
            &key,
        ))
    }

    #[test]
    fn test_unknown_wallet_is_empty() {
        let index = WalletIndex::new();
        assert!(index.transactions_for("nobody").is_empty());
        assert_eq!(index.balance_for("nobody"), Amount::ZERO);
    }

    #[test]
    fn test_record_updates_both_parties() {
        let mut index = WalletIndex::new();
        index.record(&tx(0, MINT_ADDRESS, "alice", 100));
        index.record(&tx(1, "alice", "bob", 30));

        assert_eq!(index.balance_for("alice"), Amount::from_units(70));
        assert_eq!(index.balance_for("bob"), Amount::from_units(30));
        assert_eq!(index.transactions_for("alice").len(), 2);
        assert_eq!(index.transactions_for("bob").len(), 1);
        assert!(index.entry(MINT_ADDRESS).is_none());
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn test_entries_share_the_transaction() {
        let mut index = WalletIndex::new();
        let shared = tx(0, "alice", "bob", 1);
        index.record(&shared);

        assert!(Arc::ptr_eq(&index.transactions_for("alice")[0], &shared));
        assert!(Arc::ptr_eq(&index.transactions_for("bob")[0], &shared));
    }

    #[test]
    fn test_check_rejects_overflow() {
        let mut index = WalletIndex::new();
        let key = SigningKey::from_bytes(&[1u8; 32]);
        let huge = Amount::from_micros(i64::MAX);
        index.record(&Arc::new(Transaction::new_signed(0, MINT_ADDRESS, "alice", huge, 0, &key)));

        let more = Transaction::new_signed(1, MINT_ADDRESS, "alice", Amount::from_units(1), 1, &key);
        assert_eq!(
            index.check(&more),
            Err(ValidationError::BalanceOverflow("alice".to_string()))
        );
    }
}
