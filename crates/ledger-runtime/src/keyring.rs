//! Custodial key storage
//!
//! The ledger signs transfers on behalf of wallets it created. The keyring
//! holds those signing keys plus the mint authority that signs onboarding
//! credits.

use crate::transaction::{address_of, MINT_ADDRESS};
use ed25519_dalek::{SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use std::collections::BTreeMap;

/// Signing keys indexed by wallet address
pub struct Keyring {
    mint_authority: SigningKey,
    wallets: BTreeMap<String, SigningKey>,
}

impl Keyring {
    /// Create a keyring with a fresh mint authority and no wallets
    pub fn new() -> Self {
        Self::with_mint_seed(SigningKey::generate(&mut OsRng).to_bytes())
    }

    /// Create a keyring around an existing mint authority seed
    pub fn with_mint_seed(seed: [u8; 32]) -> Self {
        Self {
            mint_authority: SigningKey::from_bytes(&seed),
            wallets: BTreeMap::new(),
        }
    }

    /// Generate a new wallet and return its address
    pub fn create_wallet(&mut self) -> String {
        self.insert_seed(SigningKey::generate(&mut OsRng).to_bytes())
    }

    /// Register a wallet from its 32-byte seed and return its address
    pub fn insert_seed(&mut self, seed: [u8; 32]) -> String {
        let key = SigningKey::from_bytes(&seed);
        let address = address_of(&key.verifying_key());
        self.wallets.insert(address.clone(), key);
        address
    }

    /// Key that signs for `address`, if held
    pub fn signer_for(&self, address: &str) -> Option<&SigningKey> {
        if address == MINT_ADDRESS {
            Some(&self.mint_authority)
        } else {
            self.wallets.get(address)
        }
    }

    pub fn mint_signer(&self) -> &SigningKey {
        &self.mint_authority
    }

    pub fn mint_authority(&self) -> VerifyingKey {
        self.mint_authority.verifying_key()
    }

    pub fn mint_seed(&self) -> [u8; 32] {
        self.mint_authority.to_bytes()
    }

    /// Wallet seeds in address order (for persistence)
    pub fn wallet_seeds(&self) -> impl Iterator<Item = (&str, [u8; 32])> {
        self.wallets.iter().map(|(a, k)| (a.as_str(), k.to_bytes()))
    }

    pub fn contains(&self, address: &str) -> bool {
        self.wallets.contains_key(address)
    }

    pub fn len(&self) -> usize {
        self.wallets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wallets.is_empty()
    }

    /// Remove a wallet key (used to undo a creation that could not complete)
    pub(crate) fn remove(&mut self, address: &str) -> Option<SigningKey> {
        self.wallets.remove(address)
    }
}

impl Default for Keyring {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::parse_address;

    #[test]
    fn test_create_wallet_addresses_are_fresh() {
        let mut keyring = Keyring::new();
        let a = keyring.create_wallet();
        let b = keyring.create_wallet();

        assert_ne!(a, b);
        assert_eq!(keyring.len(), 2);
        assert!(keyring.contains(&a));
        assert!(parse_address(&a).is_ok());
    }

    #[test]
    fn test_seed_round_trip() {
        let mut keyring = Keyring::new();
        let address = keyring.create_wallet();
        let (_, seed) = keyring.wallet_seeds().next().unwrap();

        let mut restored = Keyring::with_mint_seed(keyring.mint_seed());
        assert_eq!(restored.insert_seed(seed), address);
        assert_eq!(restored.mint_authority(), keyring.mint_authority());
    }

    #[test]
    fn test_mint_address_resolves_to_authority() {
        let keyring = Keyring::new();
        let signer = keyring.signer_for(MINT_ADDRESS).unwrap();
        assert_eq!(signer.verifying_key(), keyring.mint_authority());
        assert!(keyring.signer_for("unknown").is_none());
    }
}
