//! Signed transfer records

use crate::{error::ValidationError, Amount};
use borsh::{BorshDeserialize, BorshSerialize};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Sender of mint transactions. Not a real wallet: it never has a balance
/// and is only accepted on the onboarding path.
pub const MINT_ADDRESS: &str = "genesis";

const TX_ID_CONTEXT: &str = "fractal-ledger 2026-01-05 transaction id";
const TX_DIGEST_CONTEXT: &str = "fractal-ledger 2026-01-05 transaction digest";

/// Encode a verifying key as a wallet address
pub fn address_of(key: &VerifyingKey) -> String {
    bs58::encode(key.as_bytes()).into_string()
}

/// Decode a wallet address back into the key that signs for it
pub fn parse_address(address: &str) -> Result<VerifyingKey, ValidationError> {
    let invalid = || ValidationError::InvalidAddress(address.to_string());
    let bytes: [u8; 32] = bs58::decode(address)
        .into_vec()
        .map_err(|_| invalid())?
        .try_into()
        .map_err(|_| invalid())?;
    VerifyingKey::from_bytes(&bytes).map_err(|_| invalid())
}

/// 64-byte ed25519 signature, base58 on the wire
#[derive(Clone, Copy, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct TxSignature([u8; 64]);

impl TxSignature {
    pub fn to_bytes(self) -> [u8; 64] {
        self.0
    }
}

impl From<Signature> for TxSignature {
    fn from(sig: Signature) -> Self {
        Self(sig.to_bytes())
    }
}

impl fmt::Display for TxSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&bs58::encode(self.0).into_string())
    }
}

impl fmt::Debug for TxSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TxSignature({})", self)
    }
}

impl Serialize for TxSignature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for TxSignature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let encoded = <String as Deserialize>::deserialize(deserializer)?;
        let bytes: [u8; 64] = bs58::decode(&encoded)
            .into_vec()
            .map_err(de::Error::custom)?
            .try_into()
            .map_err(|_| de::Error::custom("signature must be 64 bytes"))?;
        Ok(Self(bytes))
    }
}

/// Fields covered by the transaction id
#[derive(BorshSerialize)]
struct IdContent<'a> {
    seq: u64,
    sender: &'a str,
    receiver: &'a str,
    amount: Amount,
    timestamp: i64,
}

/// Fields covered by the signature
#[derive(BorshSerialize)]
struct SignedContent<'a> {
    id: &'a str,
    seq: u64,
    sender: &'a str,
    receiver: &'a str,
    amount: Amount,
    timestamp: i64,
}

/// An atomic, signed transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct Transaction {
    /// Hex blake3 digest of the content, see [`Transaction::derive_id`]
    pub id: String,
    /// Position in the ledger's global history
    pub seq: u64,
    pub sender: String,
    pub receiver: String,
    pub amount: Amount,
    /// Unix milliseconds
    pub timestamp: i64,
    pub signature: TxSignature,
}

impl Transaction {
    /// Build and sign a transaction. The caller picks `seq` and `timestamp`;
    /// the engine decides whether they are acceptable.
    pub fn new_signed(
        seq: u64,
        sender: &str,
        receiver: &str,
        amount: Amount,
        timestamp: i64,
        key: &SigningKey,
    ) -> Self {
        let id = Self::derive_id(seq, sender, receiver, amount, timestamp);
        let mut tx = Self {
            id,
            seq,
            sender: sender.to_string(),
            receiver: receiver.to_string(),
            amount,
            timestamp,
            signature: TxSignature([0u8; 64]),
        };
        tx.signature = key.sign(&tx.signing_bytes()).into();
        tx
    }

    /// Deterministic id for the given content
    pub fn derive_id(seq: u64, sender: &str, receiver: &str, amount: Amount, timestamp: i64) -> String {
        let content = IdContent {
            seq,
            sender,
            receiver,
            amount,
            timestamp,
        };
        let bytes = borsh::to_vec(&content).expect("id content serialization should not fail");
        blake3::derive_key(TX_ID_CONTEXT, &bytes)
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect()
    }

    /// Whether this is a mint (onboarding credit)
    pub fn is_mint(&self) -> bool {
        self.sender == MINT_ADDRESS
    }

    /// Whether `address` is the sender or receiver
    pub fn touches(&self, address: &str) -> bool {
        self.sender == address || self.receiver == address
    }

    /// Signed effect of this transaction on `address`
    pub fn delta_for(&self, address: &str) -> Amount {
        if self.receiver == address {
            self.amount
        } else if self.sender == address {
            Amount::from_micros(-self.amount.micros())
        } else {
            Amount::ZERO
        }
    }

    /// Canonical bytes the sender signs
    pub fn signing_bytes(&self) -> Vec<u8> {
        let content = SignedContent {
            id: &self.id,
            seq: self.seq,
            sender: &self.sender,
            receiver: &self.receiver,
            amount: self.amount,
            timestamp: self.timestamp,
        };
        borsh::to_vec(&content).expect("signed content serialization should not fail")
    }

    /// Digest committed into the owning node's hash
    pub fn digest(&self) -> [u8; 32] {
        let bytes = borsh::to_vec(self).expect("transaction serialization should not fail");
        blake3::derive_key(TX_DIGEST_CONTEXT, &bytes)
    }

    /// Check the id derivation
    pub fn verify_id(&self) -> Result<(), ValidationError> {
        let expected = Self::derive_id(
            self.seq,
            &self.sender,
            &self.receiver,
            self.amount,
            self.timestamp,
        );
        if expected == self.id {
            Ok(())
        } else {
            Err(ValidationError::IdMismatch)
        }
    }

    /// Check the signature against the sender's address, or against the
    /// mint authority for mint transactions.
    pub fn verify_signature(&self, mint_authority: &VerifyingKey) -> Result<(), ValidationError> {
        let key = if self.is_mint() {
            *mint_authority
        } else {
            parse_address(&self.sender)?
        };
        let signature = Signature::from_bytes(&self.signature.0);
        key.verify(&self.signing_bytes(), &signature)
            .map_err(|_| ValidationError::InvalidSignature(self.id.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;

    fn keypair() -> (SigningKey, String) {
        let key = SigningKey::generate(&mut OsRng);
        let address = address_of(&key.verifying_key());
        (key, address)
    }

    #[test]
    fn test_sign_and_verify() {
        let (key, sender) = keypair();
        let (_, receiver) = keypair();
        let mint = SigningKey::generate(&mut OsRng).verifying_key();

        let tx = Transaction::new_signed(7, &sender, &receiver, Amount::from_units(5), 1_000, &key);
        assert_eq!(tx.id.len(), 64);
        assert!(tx.verify_id().is_ok());
        assert!(tx.verify_signature(&mint).is_ok());
    }

    #[test]
    fn test_tampered_amount_fails() {
        let (key, sender) = keypair();
        let (_, receiver) = keypair();
        let mint = SigningKey::generate(&mut OsRng).verifying_key();

        let mut tx = Transaction::new_signed(0, &sender, &receiver, Amount::from_units(5), 1_000, &key);
        tx.amount = Amount::from_units(500);

        assert_eq!(tx.verify_id(), Err(ValidationError::IdMismatch));
        assert!(matches!(
            tx.verify_signature(&mint),
            Err(ValidationError::InvalidSignature(_))
        ));
    }

    #[test]
    fn test_wrong_signer_fails() {
        let (_, sender) = keypair();
        let (impostor, receiver) = keypair();
        let mint = SigningKey::generate(&mut OsRng).verifying_key();

        let tx = Transaction::new_signed(0, &sender, &receiver, Amount::from_units(1), 0, &impostor);
        assert!(tx.verify_signature(&mint).is_err());
    }

    #[test]
    fn test_mint_checked_against_authority() {
        let authority = SigningKey::generate(&mut OsRng);
        let (_, receiver) = keypair();

        let tx = Transaction::new_signed(0, MINT_ADDRESS, &receiver, Amount::from_units(10), 0, &authority);
        assert!(tx.is_mint());
        assert!(tx.verify_signature(&authority.verifying_key()).is_ok());

        let other = SigningKey::generate(&mut OsRng).verifying_key();
        assert!(tx.verify_signature(&other).is_err());
    }

    #[test]
    fn test_invalid_address() {
        assert!(matches!(
            parse_address("not-base58-0OIl"),
            Err(ValidationError::InvalidAddress(_))
        ));
        assert!(parse_address("abc").is_err());
    }

    #[test]
    fn test_json_shape() {
        let (key, sender) = keypair();
        let (_, receiver) = keypair();
        let tx = Transaction::new_signed(3, &sender, &receiver, Amount::from_micros(2_500_000), 42, &key);

        let value = serde_json::to_value(&tx).unwrap();
        assert_eq!(value["amount"], serde_json::json!(2.5));
        assert!(value["signature"].is_string());

        let back: Transaction = serde_json::from_value(value).unwrap();
        assert_eq!(back, tx);
    }

    #[test]
    fn test_signature_must_be_64_bytes() {
        let short = serde_json::json!(bs58::encode([7u8; 32]).into_string());
        assert!(serde_json::from_value::<TxSignature>(short).is_err());
        assert!(serde_json::from_value::<TxSignature>(serde_json::json!("0OIl")).is_err());

        let full = serde_json::json!(bs58::encode([7u8; 64]).into_string());
        let signature: TxSignature = serde_json::from_value(full.clone()).unwrap();
        assert_eq!(serde_json::to_value(signature).unwrap(), full);
    }

    #[test]
    fn test_delta_for() {
        let (key, sender) = keypair();
        let (_, receiver) = keypair();
        let tx = Transaction::new_signed(0, &sender, &receiver, Amount::from_units(4), 0, &key);

        assert_eq!(tx.delta_for(&receiver), Amount::from_units(4));
        assert_eq!(tx.delta_for(&sender), Amount::from_units(-4));
        assert_eq!(tx.delta_for("someone-else"), Amount::ZERO);
    }
}
