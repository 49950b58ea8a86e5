//! Thread-safe ledger facade
//!
//! One `RwLock` guards the engine, the keyring and the onboarding stage
//! together. A mutation holds the write guard for its whole
//! validate -> insert -> rehash -> index sequence; queries share the read
//! guard and never see a half-applied transaction.

use crate::{
    config::LedgerConfig,
    engine::{LedgerEngine, VerifyReport},
    error::{LedgerResult, PreconditionError, SnapshotError, ValidationError},
    keyring::Keyring,
    onboarding::{FounderOnboarding, LedgerStage, OnboardingService, StandardOnboarding},
    snapshot::{LedgerSnapshot, NodeSnapshot, SNAPSHOT_VERSION},
    transaction::{address_of, parse_address},
    triangle::{NodeCoord, TriangleNode},
    Amount, Transaction,
};
use parking_lot::{RwLock, RwLockReadGuard};
use std::sync::Arc;

/// Everything a mutation touches
pub struct LedgerState {
    pub(crate) engine: LedgerEngine,
    pub(crate) keyring: Keyring,
    pub(crate) stage: LedgerStage,
}

impl LedgerState {
    pub fn engine(&self) -> &LedgerEngine {
        &self.engine
    }

    pub fn keyring(&self) -> &Keyring {
        &self.keyring
    }

    pub fn stage(&self) -> &LedgerStage {
        &self.stage
    }
}

/// A Fractal Ledger instance
pub struct Ledger {
    config: LedgerConfig,
    onboarding: OnboardingService,
    state: RwLock<LedgerState>,
}

impl Ledger {
    /// Create an empty, uninitialized ledger with a fresh mint authority
    pub fn new(config: LedgerConfig) -> LedgerResult<Self> {
        Self::with_keyring(config, Keyring::new())
    }

    /// Create an empty ledger around an existing keyring
    pub fn with_keyring(config: LedgerConfig, keyring: Keyring) -> LedgerResult<Self> {
        config.validate()?;
        let engine = LedgerEngine::new(config.node_capacity, keyring.mint_authority());
        Ok(Self::from_state(
            config,
            LedgerState {
                engine,
                keyring,
                stage: LedgerStage::Uninitialized,
            },
        ))
    }

    fn from_state(config: LedgerConfig, state: LedgerState) -> Self {
        Self {
            onboarding: OnboardingService::new(config.founder_grant, config.standard_grant),
            config,
            state: RwLock::new(state),
        }
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Shared read access to the whole state
    pub fn read(&self) -> RwLockReadGuard<'_, LedgerState> {
        self.state.read()
    }

    /// Swap in a new state wholesale (restore or import)
    pub(crate) fn replace_state(&self, state: LedgerState) {
        *self.state.write() = state;
    }

    // ============ Onboarding ============

    pub fn founder_onboarding(&self) -> LedgerResult<FounderOnboarding> {
        let mut guard = self.state.write();
        let state = &mut *guard;
        self.onboarding
            .founder_onboarding(&mut state.engine, &mut state.keyring, &mut state.stage)
    }

    pub fn standard_onboarding(&self) -> LedgerResult<StandardOnboarding> {
        let mut guard = self.state.write();
        let state = &mut *guard;
        self.onboarding
            .standard_onboarding(&mut state.engine, &mut state.keyring, &state.stage)
    }

    /// Generate an unfunded custodial wallet. Available in any stage.
    pub fn create_wallet(&self) -> String {
        let address = self.state.write().keyring.create_wallet();
        tracing::info!("Created wallet {}", address);
        address
    }

    pub fn stage(&self) -> LedgerStage {
        self.state.read().stage.clone()
    }

    pub fn foundational_wallet(&self) -> Option<String> {
        self.state.read().stage.foundational_wallet().map(String::from)
    }

    // ============ Submission ============

    /// Transfer between wallets, signed with the sender's custodial key
    pub fn transfer(&self, sender: &str, receiver: &str, amount: Amount) -> LedgerResult<Transaction> {
        let mut guard = self.state.write();
        let state = &mut *guard;
        state.stage.require_onboarded()?;
        if sender == crate::MINT_ADDRESS {
            return Err(ValidationError::MintNotAllowed.into());
        }
        LedgerEngine::check_parties(sender, receiver, amount)?;

        let key = state
            .keyring
            .signer_for(sender)
            .ok_or_else(|| ValidationError::UnknownSigner(sender.to_string()))?;
        let tx = state.engine.prepare(sender, receiver, amount, key);

        Self::accept(&mut state.engine, tx)
    }

    /// Submit a transaction signed elsewhere
    pub fn submit(&self, tx: Transaction) -> LedgerResult<Transaction> {
        let mut guard = self.state.write();
        guard.stage.require_onboarded()?;
        Self::accept(&mut guard.engine, tx)
    }

    fn accept(engine: &mut LedgerEngine, tx: Transaction) -> LedgerResult<Transaction> {
        match engine.submit(tx) {
            Ok(accepted) => Ok((*accepted).clone()),
            Err(e) => {
                tracing::warn!("Rejected transaction: {}", e);
                Err(e.into())
            }
        }
    }

    // ============ Queries ============

    /// Read-only copy of the current tree
    pub fn tree(&self) -> TriangleNode {
        self.state.read().engine.root().clone()
    }

    /// Serializable view of the current tree
    pub fn tree_snapshot(&self) -> NodeSnapshot {
        NodeSnapshot::from(self.state.read().engine.root())
    }

    pub fn root_hash(&self) -> blake3::Hash {
        self.state.read().engine.root().hash()
    }

    pub fn verify(&self) -> VerifyReport {
        self.state.read().engine.verify()
    }

    pub fn transactions_for(&self, address: &str) -> Vec<Arc<Transaction>> {
        self.state.read().engine.transactions_for(address).to_vec()
    }

    pub fn balance_for(&self, address: &str) -> Amount {
        self.state.read().engine.balance_for(address)
    }

    /// Every transaction in history order
    pub fn history(&self) -> Vec<Arc<Transaction>> {
        self.state.read().engine.history()
    }

    /// Look up a node for display
    pub fn node(&self, coord: NodeCoord) -> Option<NodeSnapshot> {
        self.state.read().engine.root().find(coord).map(NodeSnapshot::from)
    }

    // ============ Snapshots ============

    pub fn export_snapshot(&self) -> LedgerSnapshot {
        let state = self.state.read();
        LedgerSnapshot {
            version: SNAPSHOT_VERSION,
            capacity: state.engine.capacity(),
            mint_authority: address_of(&state.engine.mint_authority()),
            foundational_wallet: state.stage.foundational_wallet().map(String::from),
            root: NodeSnapshot::from(state.engine.root()),
        }
    }

    /// Replace the tree with an imported one. The imported history is
    /// replayed through full validation and must rebuild the same layout;
    /// stored hashes are then taken as-is. Wallet keys already in the
    /// keyring are kept. On error the current ledger is untouched.
    pub fn import_snapshot(&self, snapshot: LedgerSnapshot) -> LedgerResult<()> {
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(SnapshotError::UnsupportedVersion(snapshot.version).into());
        }
        if snapshot.capacity == 0 {
            return Err(SnapshotError::InvalidCapacity(snapshot.capacity).into());
        }
        let mint_authority = parse_address(&snapshot.mint_authority)?;
        let root = snapshot.root.into_node(NodeCoord::ROOT, snapshot.capacity)?;
        let engine = LedgerEngine::import(&root, snapshot.capacity, mint_authority)?;

        let genesis = engine.history().first().cloned();
        let stage = match (snapshot.foundational_wallet, genesis) {
            (None, None) => LedgerStage::Uninitialized,
            (Some(foundational_wallet), Some(genesis))
                if genesis.is_mint() && genesis.receiver == foundational_wallet =>
            {
                LedgerStage::FounderOnboarded { foundational_wallet }
            }
            _ => return Err(SnapshotError::FounderMismatch.into()),
        };

        let mut state = self.state.write();
        if mint_authority != state.keyring.mint_authority() {
            tracing::warn!("Imported ledger uses a foreign mint authority; onboarding is disabled");
        }
        tracing::info!(
            "Imported ledger: {} transactions, {} nodes",
            engine.root().transaction_count(),
            engine.root().node_count()
        );
        state.engine = engine;
        state.stage = stage;
        Ok(())
    }

    /// Rebuild from persisted parts by replaying the history
    pub fn restore<I>(
        config: LedgerConfig,
        keyring: Keyring,
        mint_authority: ed25519_dalek::VerifyingKey,
        foundational_wallet: Option<String>,
        history: I,
    ) -> LedgerResult<Self>
    where
        I: IntoIterator<Item = Transaction>,
    {
        config.validate()?;
        let engine = LedgerEngine::replay(config.node_capacity, mint_authority, history)?;
        let stage = match foundational_wallet {
            Some(foundational_wallet) => LedgerStage::FounderOnboarded { foundational_wallet },
            None if engine.next_seq() > 0 => return Err(PreconditionError::NotOnboarded.into()),
            None => LedgerStage::Uninitialized,
        };
        Ok(Self::from_state(
            config,
            LedgerState {
                engine,
                keyring,
                stage,
            },
        ))
    }

    /// Overwrite stored node hashes with persisted ones
    pub(crate) fn restore_stored_hashes(&self, hashes: &[(NodeCoord, blake3::Hash)]) -> LedgerResult<()> {
        self.state.write().engine.restore_stored_hashes(hashes)?;
        Ok(())
    }

    /// Take over the state of another ledger (used after a restore)
    pub fn adopt(&self, other: Ledger) {
        self.replace_state(other.state.into_inner());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LedgerError;

    fn ledger() -> Ledger {
        Ledger::new(LedgerConfig::default()).unwrap()
    }

    #[test]
    fn test_transfer_before_onboarding_fails() {
        let ledger = ledger();
        let a = ledger.create_wallet();
        let b = ledger.create_wallet();

        assert_eq!(
            ledger.transfer(&a, &b, Amount::from_units(1)),
            Err(LedgerError::Precondition(PreconditionError::NotOnboarded))
        );
    }

    #[test]
    fn test_transfer_from_unknown_signer() {
        let ledger = ledger();
        let founder = ledger.founder_onboarding().unwrap().foundational_wallet;
        let stranger = address_of(&ed25519_dalek::SigningKey::from_bytes(&[9u8; 32]).verifying_key());

        assert_eq!(
            ledger.transfer(&stranger, &founder, Amount::from_units(1)),
            Err(LedgerError::Validation(ValidationError::UnknownSigner(stranger.clone())))
        );
    }

    #[test]
    fn test_transfer_from_mint_is_rejected() {
        let ledger = ledger();
        let founder = ledger.founder_onboarding().unwrap().foundational_wallet;

        assert_eq!(
            ledger.transfer(crate::MINT_ADDRESS, &founder, Amount::from_units(1)),
            Err(LedgerError::Validation(ValidationError::MintNotAllowed))
        );
        assert_eq!(ledger.balance_for(&founder), Amount::from_units(100));
    }

    #[test]
    fn test_export_import_round_trip() {
        let source = ledger();
        let founder = source.founder_onboarding().unwrap().foundational_wallet;
        let wallet = source.standard_onboarding().unwrap().wallet;
        source.transfer(&founder, &wallet, Amount::from_units(7)).unwrap();

        let json = source.export_snapshot().to_json().unwrap();
        let target = ledger();
        target
            .import_snapshot(LedgerSnapshot::from_json(&json).unwrap())
            .unwrap();

        assert_eq!(target.root_hash(), source.root_hash());
        assert_eq!(target.balance_for(&wallet), Amount::from_units(17));
        assert_eq!(target.foundational_wallet(), Some(founder));
        assert!(target.verify().valid);
    }

    #[test]
    fn test_import_rejects_unknown_version() {
        let ledger = ledger();
        let mut snapshot = ledger.export_snapshot();
        snapshot.version = 99;

        assert!(matches!(
            ledger.import_snapshot(snapshot),
            Err(LedgerError::Snapshot(_))
        ));
    }

    #[test]
    fn test_zero_capacity_is_rejected() {
        let config = LedgerConfig {
            node_capacity: 0,
            ..LedgerConfig::default()
        };
        assert_eq!(
            Ledger::new(config).err(),
            Some(LedgerError::Config(crate::error::ConfigError::ZeroCapacity))
        );

        let ledger = ledger();
        let mut snapshot = ledger.export_snapshot();
        snapshot.capacity = 0;
        assert_eq!(
            ledger.import_snapshot(snapshot),
            Err(LedgerError::Snapshot(SnapshotError::InvalidCapacity(0)))
        );
    }

    #[test]
    fn test_import_rejects_edited_amount_and_keeps_ledger() {
        let source = ledger();
        let founder = source.founder_onboarding().unwrap().foundational_wallet;
        let mut snapshot = source.export_snapshot();
        let child = snapshot
            .root
            .children
            .iter_mut()
            .find(|child| !child.transactions.is_empty())
            .unwrap();
        child.transactions[0].amount = Amount::from_units(1_000_000);

        let target = ledger();
        let before = target.root_hash();
        assert_eq!(
            target.import_snapshot(snapshot),
            Err(LedgerError::Snapshot(SnapshotError::InvalidHistory(
                ValidationError::IdMismatch
            )))
        );
        assert_eq!(target.root_hash(), before);
        assert_eq!(target.foundational_wallet(), None);
        assert_eq!(source.foundational_wallet(), Some(founder));
    }

    #[test]
    fn test_import_requires_matching_founder() {
        let source = ledger();
        source.founder_onboarding().unwrap();

        let mut missing = source.export_snapshot();
        missing.foundational_wallet = None;
        assert_eq!(
            ledger().import_snapshot(missing),
            Err(LedgerError::Snapshot(SnapshotError::FounderMismatch))
        );

        let mut other = source.export_snapshot();
        other.foundational_wallet = Some(source.create_wallet());
        assert_eq!(
            ledger().import_snapshot(other),
            Err(LedgerError::Snapshot(SnapshotError::FounderMismatch))
        );

        let mut empty = ledger().export_snapshot();
        empty.foundational_wallet = Some(source.create_wallet());
        assert_eq!(
            ledger().import_snapshot(empty),
            Err(LedgerError::Snapshot(SnapshotError::FounderMismatch))
        );
    }

    #[test]
    fn test_concurrent_transfers_keep_ledger_consistent() {
        let ledger = Arc::new(ledger());
        let founder = ledger.founder_onboarding().unwrap().foundational_wallet;
        let wallets: Vec<String> = (0..4)
            .map(|_| ledger.standard_onboarding().unwrap().wallet)
            .collect();

        let handles: Vec<_> = wallets
            .iter()
            .cloned()
            .map(|wallet| {
                let ledger = Arc::clone(&ledger);
                let founder = founder.clone();
                std::thread::spawn(move || {
                    for _ in 0..5 {
                        ledger.transfer(&wallet, &founder, Amount::from_units(1)).unwrap();
                        assert!(ledger.verify().valid);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(ledger.balance_for(&founder), Amount::from_units(120));
        for wallet in &wallets {
            assert_eq!(ledger.balance_for(wallet), Amount::from_units(5));
        }
        assert_eq!(ledger.history().len(), 1 + 4 + 20);
        assert!(ledger.verify().valid);
    }
}
