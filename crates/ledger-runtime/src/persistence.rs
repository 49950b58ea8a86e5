//! Persistence Layer for ledger state
//!
//! Uses sled embedded database to persist the transaction history, the
//! custodial keys, every node's stored hash and chain metadata across
//! restarts. Loading replays the history to rebuild the tree, then puts
//! the stored hashes back, so a tampered node still fails verification
//! after a restart.

use crate::{
    config::LedgerConfig,
    keyring::Keyring,
    ledger::Ledger,
    transaction::{address_of, parse_address},
    triangle::NodeCoord,
    Transaction, MINT_ADDRESS,
};
use serde::{Deserialize, Serialize};
use sled::Db;
use std::path::Path;

/// Metadata about the persisted ledger
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct LedgerMetadata {
    /// Node capacity the history was built with
    pub capacity: usize,
    /// Base58 key that verifies mint transactions
    pub mint_authority: String,
    /// Set once founder onboarding has run
    pub foundational_wallet: Option<String>,
    /// Transactions stored
    pub transaction_count: u64,
    /// Custodial wallets stored
    pub wallet_count: u64,
    /// Root hash at save time (hex)
    pub root_hash: String,
    /// Last save timestamp
    pub last_save_ts: i64,
}

/// Persistent storage for ledger state
pub struct PersistentStore {
    /// Sled database instance
    db: Db,
    /// seq (big-endian) -> bincode transaction
    history: sled::Tree,
    /// address -> 32-byte signing seed
    keys: sled::Tree,
    /// level ++ index (big-endian) -> 32-byte stored hash
    nodes: sled::Tree,
    /// Metadata tree
    metadata: sled::Tree,
}

impl PersistentStore {
    /// Open or create a persistent store at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let db = sled::open(&path)?;
        let history = db.open_tree("history")?;
        let keys = db.open_tree("keys")?;
        let nodes = db.open_tree("nodes")?;
        let metadata = db.open_tree("metadata")?;

        tracing::info!("Opened persistent store at {:?}", path.as_ref());

        Ok(Self {
            db,
            history,
            keys,
            nodes,
            metadata,
        })
    }

    /// Store a transaction under its sequence number
    pub fn store_transaction(&self, tx: &Transaction) -> anyhow::Result<()> {
        let bytes = bincode::serialize(tx)?;
        self.history.insert(tx.seq.to_be_bytes(), bytes)?;
        Ok(())
    }

    /// All transactions in sequence order
    pub fn get_history(&self) -> anyhow::Result<Vec<Transaction>> {
        let mut transactions = Vec::with_capacity(self.history.len());
        for result in self.history.iter() {
            let (_, value) = result?;
            transactions.push(bincode::deserialize(&value)?);
        }
        Ok(transactions)
    }

    /// Store a signing seed
    pub fn store_key(&self, address: &str, seed: &[u8; 32]) -> anyhow::Result<()> {
        self.keys.insert(address.as_bytes(), seed.as_slice())?;
        Ok(())
    }

    /// Get a signing seed
    pub fn get_key(&self, address: &str) -> anyhow::Result<Option<[u8; 32]>> {
        match self.keys.get(address.as_bytes())? {
            Some(bytes) => {
                let seed: [u8; 32] = bytes
                    .as_ref()
                    .try_into()
                    .map_err(|_| anyhow::anyhow!("Invalid seed length for {}", address))?;
                Ok(Some(seed))
            }
            None => Ok(None),
        }
    }

    /// All wallet seeds (the mint seed excluded)
    pub fn get_wallet_keys(&self) -> anyhow::Result<Vec<(String, [u8; 32])>> {
        let mut keys = Vec::new();
        for result in self.keys.iter() {
            let (key, value) = result?;
            let address = String::from_utf8(key.to_vec())?;
            if address == MINT_ADDRESS {
                continue;
            }
            let seed: [u8; 32] = value
                .as_ref()
                .try_into()
                .map_err(|_| anyhow::anyhow!("Invalid seed length for {}", address))?;
            keys.push((address, seed));
        }
        Ok(keys)
    }

    /// Replace all stored node hashes
    pub fn store_node_hashes(&self, hashes: &[(NodeCoord, blake3::Hash)]) -> anyhow::Result<()> {
        self.nodes.clear()?;
        for (coord, hash) in hashes {
            self.nodes.insert(node_key(*coord), hash.as_bytes().as_slice())?;
        }
        Ok(())
    }

    /// All stored node hashes, ordered by level then index
    pub fn get_node_hashes(&self) -> anyhow::Result<Vec<(NodeCoord, blake3::Hash)>> {
        let mut hashes = Vec::with_capacity(self.nodes.len());
        for result in self.nodes.iter() {
            let (key, value) = result?;
            let key: [u8; 12] = key
                .as_ref()
                .try_into()
                .map_err(|_| anyhow::anyhow!("Invalid node key length {}", key.len()))?;
            let hash: [u8; 32] = value
                .as_ref()
                .try_into()
                .map_err(|_| anyhow::anyhow!("Invalid node hash length {}", value.len()))?;
            hashes.push((coord_from_key(key), blake3::Hash::from(hash)));
        }
        Ok(hashes)
    }

    /// Save ledger metadata
    pub fn save_metadata(&self, metadata: &LedgerMetadata) -> anyhow::Result<()> {
        let bytes = bincode::serialize(metadata)?;
        self.metadata.insert("ledger", bytes)?;
        Ok(())
    }

    /// Load ledger metadata
    pub fn load_metadata(&self) -> anyhow::Result<Option<LedgerMetadata>> {
        match self.metadata.get("ledger")? {
            Some(bytes) => {
                let metadata: LedgerMetadata = bincode::deserialize(&bytes)?;
                Ok(Some(metadata))
            }
            None => Ok(None),
        }
    }

    /// Flush all pending writes to disk
    pub fn flush(&self) -> anyhow::Result<()> {
        self.db.flush()?;
        Ok(())
    }

    /// Get the number of stored transactions
    pub fn transaction_count(&self) -> usize {
        self.history.len()
    }

    /// Drop the stored history (keys are kept)
    pub fn clear_history(&self) -> anyhow::Result<()> {
        self.history.clear()?;
        Ok(())
    }
}

fn node_key(coord: NodeCoord) -> [u8; 12] {
    let mut key = [0u8; 12];
    key[..4].copy_from_slice(&coord.level.to_be_bytes());
    key[4..].copy_from_slice(&coord.index.to_be_bytes());
    key
}

fn coord_from_key(key: [u8; 12]) -> NodeCoord {
    let mut level = [0u8; 4];
    let mut index = [0u8; 8];
    level.copy_from_slice(&key[..4]);
    index.copy_from_slice(&key[4..]);
    NodeCoord::new(u32::from_be_bytes(level), u64::from_be_bytes(index))
}

/// Extension trait to add persistence to a Ledger
pub trait LedgerPersistence {
    /// Save history, keys, node hashes and metadata; returns the number of
    /// transactions
    fn save_to_disk(&self, store: &PersistentStore) -> anyhow::Result<usize>;

    /// Replace this ledger's state with the persisted one; returns the
    /// number of transactions replayed
    fn load_from_disk(&self, store: &PersistentStore) -> anyhow::Result<usize>;
}

impl LedgerPersistence for Ledger {
    fn save_to_disk(&self, store: &PersistentStore) -> anyhow::Result<usize> {
        // Collect under one read guard so history, keys and metadata agree
        let (history, seeds, hashes, metadata) = {
            let state = self.read();
            let engine = state.engine();
            let keyring = state.keyring();

            let history = engine.history();
            let mut seeds: Vec<(String, [u8; 32])> = keyring
                .wallet_seeds()
                .map(|(address, seed)| (address.to_string(), seed))
                .collect();
            seeds.push((MINT_ADDRESS.to_string(), keyring.mint_seed()));

            let mut hashes = Vec::with_capacity(engine.root().node_count());
            engine
                .root()
                .walk(&mut |node| hashes.push((node.coord(), node.hash())));

            let metadata = LedgerMetadata {
                capacity: engine.capacity(),
                mint_authority: address_of(&engine.mint_authority()),
                foundational_wallet: state.stage().foundational_wallet().map(String::from),
                transaction_count: history.len() as u64,
                wallet_count: keyring.len() as u64,
                root_hash: engine.root().hash().to_hex().to_string(),
                last_save_ts: chrono::Utc::now().timestamp(),
            };
            (history, seeds, hashes, metadata)
        };

        if history.len() < store.transaction_count() {
            // An import replaced a longer history
            store.clear_history()?;
        }
        for tx in &history {
            store.store_transaction(tx)?;
        }
        for (address, seed) in &seeds {
            store.store_key(address, seed)?;
        }
        store.store_node_hashes(&hashes)?;
        store.save_metadata(&metadata)?;
        store.flush()?;

        tracing::info!(
            "Saved {} transactions and {} wallets to disk",
            history.len(),
            metadata.wallet_count
        );

        Ok(history.len())
    }

    fn load_from_disk(&self, store: &PersistentStore) -> anyhow::Result<usize> {
        let Some(metadata) = store.load_metadata()? else {
            tracing::info!("No persisted ledger found");
            return Ok(0);
        };

        let mut keyring = match store.get_key(MINT_ADDRESS)? {
            Some(seed) => Keyring::with_mint_seed(seed),
            None => anyhow::bail!("Persisted ledger has no mint authority seed"),
        };
        for (_, seed) in store.get_wallet_keys()? {
            keyring.insert_seed(seed);
        }

        let mint_authority = parse_address(&metadata.mint_authority)?;
        let history = store.get_history()?;
        let count = history.len();

        let config = LedgerConfig {
            node_capacity: metadata.capacity,
            ..*self.config()
        };
        let restored = Ledger::restore(
            config,
            keyring,
            mint_authority,
            metadata.foundational_wallet.clone(),
            history,
        )?;

        let hashes = store.get_node_hashes()?;
        let node_count = restored.tree().node_count();
        if hashes.len() != node_count {
            anyhow::bail!(
                "Persisted ledger stores {} node hashes but its history builds {} nodes",
                hashes.len(),
                node_count
            );
        }
        restored.restore_stored_hashes(&hashes)?;

        let root_hash = restored.root_hash().to_hex().to_string();
        if root_hash != metadata.root_hash {
            anyhow::bail!(
                "Persisted root hash {} differs from the saved metadata {}",
                root_hash,
                metadata.root_hash
            );
        }

        self.adopt(restored);
        tracing::info!("Loaded {} transactions from disk", count);

        Ok(count)
    }
}
